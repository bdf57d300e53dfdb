// Control endpoint helpers. The device serves the page on one port and the
// control socket on another, so the page's port must never leak into the URL.

pub const DEFAULT_CONTROL_PORT: u16 = 81;

/// Host part of a `host[:port]` string. Only a trailing `:<digits>` suffix is
/// removed, so bracketed IPv6 literals without a port pass through untouched.
pub fn strip_port(page_host: &str) -> &str {
    match page_host.rfind(':') {
        Some(idx) => {
            let suffix = &page_host[idx + 1..];
            if !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_digit()) {
                &page_host[..idx]
            } else {
                page_host
            }
        }
        None => page_host,
    }
}

pub fn control_url(page_host: &str, control_port: u16) -> String {
    format!("ws://{}:{}/", strip_port(page_host), control_port)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_port_is_replaced_by_control_port() {
        assert_eq!(control_url("192.168.4.1:80", 81), "ws://192.168.4.1:81/");
        assert_eq!(control_url("esp32.local", 81), "ws://esp32.local:81/");
        assert_eq!(control_url("[fe80::1]:8080", 9000), "ws://[fe80::1]:9000/");
    }

    #[test]
    fn non_numeric_suffix_is_kept() {
        assert_eq!(strip_port("[::1]"), "[::1]");
        assert_eq!(strip_port("host:"), "host:");
    }
}
