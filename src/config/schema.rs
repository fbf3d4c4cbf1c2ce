//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::net::options::{TrackOptions, DEFAULT_NAME};

/// Root configuration for the `conntrack` binary.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ConntrackConfig {
    /// Tracked listeners to bind.
    pub listeners: Vec<ListenerConfig>,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// One tracked listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Tracker name: metric label and event family suffix.
    pub name: String,

    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maintain accepted/closed/open series.
    pub metrics: bool,

    /// Publish a live trace event per connection.
    pub tracing: bool,

    /// TCP keep-alive idle period in seconds; 0 leaves the OS default.
    pub tcp_keepalive_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            bind_address: "127.0.0.1:8080".to_string(),
            metrics: true,
            tracing: false,
            tcp_keepalive_secs: 0,
        }
    }
}

impl ListenerConfig {
    /// Tracking options for this listener.
    pub fn track_options(&self) -> TrackOptions {
        let mut opts = TrackOptions::new()
            .name(self.name.clone())
            .tcp_keepalive(Duration::from_secs(self.tcp_keepalive_secs));
        if !self.metrics {
            opts = opts.without_metrics();
        }
        if self.tracing {
            opts = opts.with_tracing();
        }
        opts
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Install the Prometheus recorder.
    pub metrics_enabled: bool,

    /// Bind address for `/metrics` and `/debug/events`.
    pub debug_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
            debug_address: "127.0.0.1:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_uses_defaults() {
        let config: ConntrackConfig = toml::from_str("[[listeners]]\nname = \"svc\"\n").unwrap();
        assert_eq!(config.listeners.len(), 1);
        assert_eq!(config.listeners[0].name, "svc");
        assert!(config.listeners[0].metrics);
        assert!(!config.listeners[0].tracing);
        assert_eq!(config.observability.log_format, LogFormat::Pretty);
    }

    #[test]
    fn listener_config_maps_to_options() {
        let listener = ListenerConfig {
            name: "edge".into(),
            metrics: false,
            tracing: true,
            tcp_keepalive_secs: 30,
            ..Default::default()
        };
        let opts = listener.track_options();
        assert_eq!(opts.tracker_name(), "edge");
        assert!(!opts.metrics_enabled());
        assert!(opts.tracing_enabled());
        assert_eq!(opts.keepalive(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn json_log_format_parses() {
        let config: ConntrackConfig = toml::from_str("[observability]\nlog_format = \"json\"\n").unwrap();
        assert_eq!(config.observability.log_format, LogFormat::Json);
        assert!(config.listeners.is_empty());
    }
}
