pub mod commands;
pub mod endpoint;
pub mod render;
pub mod state;

pub use commands::OutboundCommand;
pub use endpoint::{control_url, strip_port, DEFAULT_CONTROL_PORT};
pub use render::{render_gauge, GaugeView, Paint, PanelView, SliderView, GAUGE_ARC_LEN, SLIDER_DEFAULT};
pub use state::{ConnectionState, DeviceState, ReconcileError, StateDelta};
