pub mod config;
pub mod device;
pub mod routes;

pub use config::SimConfig;
pub use device::{pot_reading, sensor_loop, DeviceFrame, DeviceSim, Snapshot};
pub use routes::router;
