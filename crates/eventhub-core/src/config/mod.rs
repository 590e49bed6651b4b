//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section.

pub mod logging;
pub mod transport;

use serde::{Deserialize, Serialize};
use tracing::debug;

use self::logging::LoggingConfig;
use self::transport::TransportConfig;

use crate::error::AppError;

/// Root application configuration.
///
/// Every section has defaults, so an empty file (or no file at all) yields
/// an in-memory hub with the JSON codec.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    /// Wire codec used for every channel of a registry.
    #[serde(default)]
    pub codec: CodecKind,
    /// Delimiter used when building channel names from path segments.
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
    /// Pub/sub transport settings.
    #[serde(default)]
    pub transport: TransportConfig,
    /// Channels the relay binary keeps open with catch-all listeners.
    #[serde(default)]
    pub monitor: MonitorConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Wire codec selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecKind {
    /// Human-readable JSON.
    #[default]
    Json,
    /// Compact MessagePack.
    #[serde(alias = "binary")]
    Msgpack,
}

/// Monitoring channels for the relay process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Channel names or glob patterns to keep subscribed.
    #[serde(default)]
    pub channels: Vec<String>,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            codec: CodecKind::default(),
            delimiter: default_delimiter(),
            transport: TransportConfig::default(),
            monitor: MonitorConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl HubConfig {
    /// Load configuration from a TOML file.
    ///
    /// Merges `config/default` (if present), the given file, and environment
    /// variables prefixed with `EVENTHUB__`.
    pub fn load(path: &str) -> Result<Self, AppError> {
        debug!(path, "Loading hub configuration");

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("EVENTHUB")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))
    }

    /// Parse configuration from an in-memory TOML document.
    pub fn from_toml(source: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()?;
        Ok(config.try_deserialize()?)
    }
}

fn default_delimiter() -> String {
    ".".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = HubConfig::from_toml("").expect("parse");
        assert_eq!(config.codec, CodecKind::Json);
        assert_eq!(config.delimiter, ".");
        assert_eq!(config.transport.provider, "memory");
        assert!(config.monitor.channels.is_empty());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_sections_override_defaults() {
        let config = HubConfig::from_toml(
            r#"
            codec = "msgpack"
            delimiter = ":"

            [transport]
            provider = "redis"

            [transport.redis]
            url = "redis://cache:6380"

            [monitor]
            channels = ["room.*", "alerts"]
            "#,
        )
        .expect("parse");

        assert_eq!(config.codec, CodecKind::Msgpack);
        assert_eq!(config.delimiter, ":");
        assert_eq!(config.transport.provider, "redis");
        assert_eq!(config.transport.redis.url, "redis://cache:6380");
        assert_eq!(config.monitor.channels, vec!["room.*", "alerts"]);
    }

    #[test]
    fn test_binary_alias_selects_msgpack() {
        let config = HubConfig::from_toml(r#"codec = "binary""#).expect("parse");
        assert_eq!(config.codec, CodecKind::Msgpack);
    }
}
