//! Server configuration.
//!
//! Loaded from three layers (lowest to highest priority):
//! 1. **Compiled defaults**: [`TetherConfig::default()`]
//! 2. **JSON file**: optional, passed by the caller
//! 3. **Environment variables**: `TETHER_*` (e.g. `TETHER_PORT=9000`)

use std::path::Path;
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Prefix of environment variable overrides.
pub const ENV_PREFIX: &str = "TETHER_";

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A layer could not be read or did not match the schema.
    #[error("failed to load configuration: {0}")]
    Figment(#[from] Box<figment::Error>),
    /// A value was well-typed but unusable.
    #[error("invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Configuration for the tether server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TetherConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Capacity of each connection's outbound channel.
    pub outbound_buffer: usize,
    /// Read idle limit for a socket until the endpoint registers it
    /// (`0` disables).
    pub idle_timeout_secs: u64,
    /// Max WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Default log filter when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for TetherConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            outbound_buffer: 1024,
            idle_timeout_secs: 300,
            max_message_size: 16 * 1024 * 1024, // 16 MB
            log_level: "info".into(),
        }
    }
}

impl TetherConfig {
    /// Load defaults, then `path` if given, then `TETHER_*` env vars.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            debug!(?path, "loading configuration file");
            figment = figment.merge(Json::file(path));
        }
        Self::from_figment(figment.merge(Env::prefixed(ENV_PREFIX)))
    }

    /// Extract and validate a configuration from an assembled figment.
    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract().map_err(Box::new)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the server cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.outbound_buffer == 0 {
            return Err(ConfigError::InvalidValue(
                "outbound_buffer must be at least 1".into(),
            ));
        }
        if self.max_message_size == 0 {
            return Err(ConfigError::InvalidValue(
                "max_message_size must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Idle limit as a duration, `None` when disabled.
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_secs > 0).then(|| Duration::from_secs(self.idle_timeout_secs))
    }

    /// `host:port` bind address. IPv6 hosts are bracketed.
    pub fn bind_addr(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn defaults() {
        let cfg = TetherConfig::default();
        assert_eq!(cfg.host, "127.0.0.1");
        assert_eq!(cfg.port, 0);
        assert_eq!(cfg.outbound_buffer, 1024);
        assert_eq!(cfg.idle_timeout(), Some(Duration::from_secs(300)));
        assert_eq!(cfg.max_message_size, 16 * 1024 * 1024);
        assert_eq!(cfg.bind_addr(), "127.0.0.1:0");
    }

    #[test]
    fn ipv6_bind_addr_is_bracketed() {
        let cfg = TetherConfig {
            host: "::1".into(),
            port: 9000,
            ..TetherConfig::default()
        };
        assert_eq!(cfg.bind_addr(), "[::1]:9000");
    }

    #[test]
    fn zero_idle_timeout_disables() {
        let cfg = TetherConfig {
            idle_timeout_secs: 0,
            ..TetherConfig::default()
        };
        assert_eq!(cfg.idle_timeout(), None);
    }

    #[test]
    fn validate_rejects_zero_buffer() {
        let cfg = TetherConfig {
            outbound_buffer: 0,
            ..TetherConfig::default()
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("outbound_buffer"));
    }

    #[test]
    fn load_without_file_uses_defaults() {
        Jail::expect_with(|_jail| {
            let cfg = TetherConfig::load(None).map_err(|e| e.to_string())?;
            assert_eq!(cfg, TetherConfig::default());
            Ok(())
        });
    }

    #[test]
    fn file_overrides_defaults_and_env_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "tether.json",
                r#"{"host":"0.0.0.0","port":8080,"outbound_buffer":16}"#,
            )?;
            jail.set_env("TETHER_PORT", "9090");

            let cfg = TetherConfig::load(Some(Path::new("tether.json")))
                .map_err(|e| e.to_string())?;
            assert_eq!(cfg.host, "0.0.0.0");
            assert_eq!(cfg.port, 9090);
            assert_eq!(cfg.outbound_buffer, 16);
            assert_eq!(cfg.log_level, "info");
            Ok(())
        });
    }

    #[test]
    fn missing_file_is_ignored() {
        Jail::expect_with(|_jail| {
            let cfg = TetherConfig::load(Some(Path::new("absent.json")))
                .map_err(|e| e.to_string())?;
            assert_eq!(cfg.port, 0);
            Ok(())
        });
    }

    #[test]
    fn invalid_env_value_is_error() {
        Jail::expect_with(|jail| {
            jail.set_env("TETHER_PORT", "not-a-port");
            assert!(matches!(
                TetherConfig::load(None),
                Err(ConfigError::Figment(_))
            ));
            Ok(())
        });
    }

    #[test]
    fn invalid_file_value_fails_validation() {
        Jail::expect_with(|jail| {
            jail.create_file("tether.json", r#"{"outbound_buffer":0}"#)?;
            assert!(matches!(
                TetherConfig::load(Some(Path::new("tether.json"))),
                Err(ConfigError::InvalidValue(_))
            ));
            Ok(())
        });
    }

    #[test]
    fn serde_roundtrip() {
        let cfg = TetherConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: TetherConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cfg);
    }
}
