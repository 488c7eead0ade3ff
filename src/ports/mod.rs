//! Port registry (C4): environment-derived `service -> port` map.

use std::collections::HashMap;

pub const FRONTEND_PORT_ENV: &str = "GESTALT_PORT";
pub const BACKEND_PORT_ENV: &str = "GESTALT_BACKEND_PORT";
pub const TEMPORAL_HOST_ENV: &str = "GESTALT_TEMPORAL_HOST";
pub const OTEL_HTTP_ENDPOINT_ENV: &str = "GESTALT_OTEL_HTTP_ENDPOINT";

const DEFAULT_FRONTEND_PORT: u16 = 57417;
const DEFAULT_TEMPORAL_PORT: u16 = 7233;
const DEFAULT_OTEL_PORT: u16 = 4318;

/// A keyed integer store of service -> TCP port, resolved once from the
/// process environment.
#[derive(Debug, Clone)]
pub struct PortRegistry {
    ports: HashMap<String, u16>,
}

impl PortRegistry {
    /// Builds the registry from the process environment, per §4.4.
    pub fn from_env() -> Self {
        Self::from_getter(|key| std::env::var(key).ok())
    }

    /// Testable variant that takes an explicit environment lookup function.
    pub fn from_getter(get: impl Fn(&str) -> Option<String>) -> Self {
        let frontend = get(FRONTEND_PORT_ENV)
            .and_then(|v| parse_port(&v))
            .unwrap_or(DEFAULT_FRONTEND_PORT);
        let backend = get(BACKEND_PORT_ENV)
            .and_then(|v| parse_port(&v))
            .unwrap_or(frontend);
        let temporal = get(TEMPORAL_HOST_ENV)
            .and_then(|v| parse_port(&v))
            .unwrap_or(DEFAULT_TEMPORAL_PORT);
        let otel = get(OTEL_HTTP_ENDPOINT_ENV)
            .and_then(|v| parse_port(&v))
            .unwrap_or(DEFAULT_OTEL_PORT);

        let mut ports = HashMap::new();
        ports.insert("frontend".to_string(), frontend);
        ports.insert("backend".to_string(), backend);
        ports.insert("temporal".to_string(), temporal);
        ports.insert("otel".to_string(), otel);
        Self { ports }
    }

    /// Looks up a service's port.
    pub fn get(&self, service: &str) -> Option<u16> {
        self.ports.get(service).copied()
    }
}

/// Parses a bare integer, `host:port`, `scheme://host:port[/path]`, or
/// `host:port/path` into a port number. Rejects (returns `None`) any value
/// outside `1..=65535`.
pub fn parse_port(raw: &str) -> Option<u16> {
    let raw = raw.trim();

    let without_scheme = match raw.split_once("://") {
        Some((_, rest)) => rest,
        None => raw,
    };
    let host_port = without_scheme.split('/').next().unwrap_or(without_scheme);

    let port_str = if let Some((_, port)) = host_port.rsplit_once(':') {
        port
    } else {
        host_port
    };

    let value: i64 = port_str.parse().ok()?;
    if (1..=65535).contains(&value) {
        Some(value as u16)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_address_form_from_p8() {
        let cases = [
            ("7233", 7233u16),
            ("localhost:7233", 7233),
            (":4318", 4318),
            ("http://127.0.0.1:9998", 9998),
            ("h:7/path", 7),
        ];
        for (input, expected) in cases {
            assert_eq!(parse_port(input), Some(expected), "input={input}");
        }
    }

    #[test]
    fn rejects_out_of_range_ports() {
        assert_eq!(parse_port("0"), None);
        assert_eq!(parse_port("70000"), None);
        assert_eq!(parse_port("not-a-port"), None);
    }

    #[test]
    fn backend_defaults_to_frontend_when_unset() {
        let registry = PortRegistry::from_getter(|key| match key {
            "GESTALT_PORT" => Some("1234".to_string()),
            _ => None,
        });
        assert_eq!(registry.get("frontend"), Some(1234));
        assert_eq!(registry.get("backend"), Some(1234));
        assert_eq!(registry.get("temporal"), Some(7233));
        assert_eq!(registry.get("otel"), Some(4318));
    }
}
