//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.
//! Every section and field has a default, so an empty file is a valid config.

use std::path::PathBuf;

use serde::{Deserialize, Deserializer, Serialize};

use crate::output::{DatagramTarget, PublisherConfig, DEFAULT_UDPJSON_PORT};

/// Root configuration for the tap.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct TapConfig {
    /// Listener configuration for the bundled server.
    pub listener: ListenerConfig,

    /// Where transaction records are published.
    pub output: OutputConfig,

    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "127.0.0.1:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".to_string(),
        }
    }
}

/// Sink configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Host of the datagram listener. Empty or absent disables the datagram sink.
    #[serde(deserialize_with = "empty_as_none")]
    pub udpjson_host: Option<String>,

    /// Port of the datagram listener.
    pub udpjson_port: u16,

    /// File that receives one JSON record per line. Empty or absent disables it.
    #[serde(deserialize_with = "empty_path_as_none")]
    pub store_in_file: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            udpjson_host: Some("127.0.0.1".to_string()),
            udpjson_port: DEFAULT_UDPJSON_PORT,
            store_in_file: None,
        }
    }
}

impl OutputConfig {
    /// Sink selection for `Publisher::new`.
    pub fn publisher_config(&self) -> PublisherConfig {
        PublisherConfig {
            datagram_target: self
                .udpjson_host
                .as_ref()
                .map(|host| DatagramTarget::new(host.clone(), self.udpjson_port)),
            file_path: self.store_in_file.clone(),
        }
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

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

fn empty_path_as_none<'de, D>(deserializer: D) -> Result<Option<PathBuf>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(empty_as_none(deserializer)?.map(PathBuf::from))
}
