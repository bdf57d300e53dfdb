use std::env;
use std::time::Duration;

use iotdash_core::DEFAULT_CONTROL_PORT;

#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    /// Attempts after a drop before giving up. Zero disables reconnecting.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl ReconnectPolicy {
    pub fn disabled() -> Self {
        Self { max_attempts: 0, ..Self::default() }
    }

    /// Delay before attempt number `attempt` (zero based), doubling with a cap.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.min(16)).unwrap_or(u32::MAX);
        self.initial_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Host the dashboard was loaded from, optionally with the page's port.
    pub page_host: String,
    pub control_port: u16,
    pub debounce: Duration,
    pub reconnect: ReconnectPolicy,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            page_host: "192.168.4.1".to_string(),
            control_port: DEFAULT_CONTROL_PORT,
            debounce: Duration::from_millis(40),
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl LinkConfig {
    pub fn from_env() -> Self {
        let mut cfg = LinkConfig::default();

        if let Ok(v) = env::var("IOTDASH_PAGE_HOST") {
            if !v.is_empty() {
                cfg.page_host = v;
            }
        }
        if let Ok(v) = env::var("IOTDASH_CONTROL_PORT") {
            if let Ok(p) = v.parse::<u16>() {
                cfg.control_port = p;
            }
        }
        if let Ok(v) = env::var("IOTDASH_DEBOUNCE_MS") {
            if let Ok(ms) = v.parse::<u64>() {
                cfg.debounce = Duration::from_millis(ms);
            }
        }
        if let Ok(v) = env::var("IOTDASH_RECONNECT_ATTEMPTS") {
            if let Ok(n) = v.parse::<u32>() {
                cfg.reconnect.max_attempts = n;
            }
        }
        if let Ok(v) = env::var("IOTDASH_RECONNECT_MAX_SECS") {
            if let Ok(s) = v.parse::<u64>() {
                cfg.reconnect.max_backoff = Duration::from_secs(s);
            }
        }

        cfg
    }

    pub fn endpoint(&self) -> String {
        iotdash_core::control_url(&self.page_host, self.control_port)
    }
}
