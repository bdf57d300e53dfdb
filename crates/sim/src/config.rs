use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct SimConfig {
    pub addr: String,
    pub sensor_interval: Duration,
    /// Period of the simulated potentiometer sweep.
    pub sensor_period: Duration,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:81".to_string(),
            sensor_interval: Duration::from_millis(250),
            sensor_period: Duration::from_secs(20),
        }
    }
}

impl SimConfig {
    pub fn from_env() -> Self {
        let mut cfg = SimConfig::default();

        if let Ok(v) = env::var("IOTDASH_SIM_ADDR") {
            if !v.is_empty() {
                cfg.addr = v;
            }
        }
        if let Ok(v) = env::var("IOTDASH_SIM_SENSOR_MS") {
            if let Ok(ms) = v.parse::<u64>() {
                if ms > 0 {
                    cfg.sensor_interval = Duration::from_millis(ms);
                }
            }
        }

        cfg
    }
}
