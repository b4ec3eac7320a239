//! # Configuration Management
//!
//! Loads application configuration from multiple sources:
//! - TOML configuration files (config.toml)
//! - Environment variables (with APP_ prefix)
//! - Default values (built into the code)
//!
//! ## Configuration Priority (highest to lowest):
//! 1. Environment variables (APP_SERVER__HOST, APP_RELAY__PORT, etc.)
//! 2. Configuration file (config.toml)
//! 3. Default values (defined in the Default impl)
//!
//! `HOST` and `PORT` are honored as deployment-platform overrides for the
//! HTTP listener.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Main application configuration that contains all settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub relay: RelayConfig,
    pub scoring: ScoringConfig,
}

/// HTTP listener settings (health, metrics, similarity scoring).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Call-audio WebSocket listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    pub host: String,
    pub port: u16,

    /// Path of the audio artifact replayed to every caller. The file may be
    /// absent; calls then receive no outbound audio.
    pub payload_path: String,

    /// Directory that accumulates one recording per call token.
    pub received_dir: String,

    /// Seconds between outbound payload transmissions.
    pub stream_interval_secs: u64,
}

/// Similarity scoring stub settings.
///
/// The fake model "thinks" for a uniformly random duration drawn from
/// `[min_delay_secs, max_delay_secs]` before answering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub min_delay_secs: f64,
    pub max_delay_secs: f64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8001,
            },
            relay: RelayConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                payload_path: "dummy_audio.mp3".to_string(),
                received_dir: "received_audio".to_string(),
                stream_interval_secs: 5,
            },
            scoring: ScoringConfig {
                min_delay_secs: 5.0,
                max_delay_secs: 12.0,
            },
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl RelayConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn stream_interval(&self) -> Duration {
        Duration::from_secs(self.stream_interval_secs)
    }
}

impl AppConfig {
    /// Load configuration from defaults, then config.toml, then environment.
    ///
    /// ## Environment Variable Examples:
    /// - `APP_SERVER__PORT=3000`: override the HTTP port
    /// - `APP_RELAY__PAYLOAD_PATH=/srv/fixtures/reply.mp3`: override the payload
    /// - `HOST=0.0.0.0` / `PORT=3000`: deployment-platform overrides
    pub fn load() -> Result<Self> {
        let mut settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"));

        // Platform-assigned host/port don't follow the APP_ prefix convention
        if let Ok(host) = env::var("HOST") {
            settings = settings.set_override("server.host", host)?;
        }

        if let Ok(port) = env::var("PORT") {
            settings = settings.set_override("server.port", port)?;
        }

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Validate that the configuration values make sense.
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("HTTP server port cannot be 0"));
        }

        if self.relay.port == 0 {
            return Err(anyhow::anyhow!("Call-audio relay port cannot be 0"));
        }

        if self.relay.received_dir.is_empty() {
            return Err(anyhow::anyhow!("Recording directory must not be empty"));
        }

        if self.relay.payload_path.is_empty() {
            return Err(anyhow::anyhow!("Payload path must not be empty"));
        }

        if self.relay.stream_interval_secs == 0 {
            return Err(anyhow::anyhow!("Stream interval must be greater than 0"));
        }

        if self.scoring.min_delay_secs < 0.0 {
            return Err(anyhow::anyhow!("Scoring delay must not be negative"));
        }

        if self.scoring.min_delay_secs > self.scoring.max_delay_secs {
            return Err(anyhow::anyhow!(
                "Scoring min delay ({}) exceeds max delay ({})",
                self.scoring.min_delay_secs,
                self.scoring.max_delay_secs
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8001);
        assert_eq!(config.relay.port, 8080);
        assert_eq!(config.relay.stream_interval_secs, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_port_validation() {
        let mut config = AppConfig::default();
        config.relay.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_delay_range_validation() {
        let mut config = AppConfig::default();
        config.scoring.min_delay_secs = 3.0;
        config.scoring.max_delay_secs = 1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_interval_rejected() {
        let mut config = AppConfig::default();
        config.relay.stream_interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bind_addrs() {
        let config = AppConfig::default();
        assert_eq!(config.server.bind_addr(), "127.0.0.1:8001");
        assert_eq!(config.relay.bind_addr(), "127.0.0.1:8080");
    }
}
