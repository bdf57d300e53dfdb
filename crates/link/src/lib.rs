pub mod config;
pub mod emitter;
pub mod error;
pub mod session;

pub use config::{LinkConfig, ReconnectPolicy};
pub use emitter::{BrightnessEmitter, DebounceSlot, ToggleEmitter};
pub use error::LinkError;
pub use session::{Session, SessionEvent, UiEvent};
