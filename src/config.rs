//! Configuration management for any-exporter
//!
//! Parses TOML configuration files and provides typed access to settings.
//! Every section is optional; a missing file section falls back to defaults.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::Path;
use std::str::FromStr;

use crate::error::{AppError, AppResult};

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Largest recipe body accepted by `POST /recipe`, in bytes
    #[serde(default = "default_max_recipe_bytes")]
    pub max_recipe_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_recipe_bytes: default_max_recipe_bytes(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_max_recipe_bytes() -> usize {
    1024 * 1024
}

/// Observability configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// - [`AppError::ConfigFileRead`] if the file cannot be read
    /// - [`AppError::ConfigParseFailed`] if it is not valid TOML for this schema
    /// - [`AppError::ConfigValidationFailed`] if a value is out of range
    pub fn from_file<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let path_display = path.as_ref().display().to_string();

        let content = std::fs::read_to_string(path.as_ref()).map_err(|source| {
            AppError::ConfigFileRead {
                path: path_display.clone(),
                source,
            }
        })?;

        let config: Self = toml::from_str(&content).map_err(|source| AppError::ConfigParseFailed {
            path: path_display.clone(),
            source,
        })?;

        config
            .validate()
            .map_err(|e| AppError::ConfigValidationFailed {
                path: path_display,
                reason: e.to_string(),
            })?;

        Ok(config)
    }

    /// Address the HTTP server binds to
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Config`] if `server.host` is not an IP address.
    pub fn listen_addr(&self) -> AppResult<std::net::SocketAddr> {
        let ip: IpAddr = self.server.host.parse().map_err(|_| {
            AppError::Config(format!(
                "server.host must be an IP address, got {:?}",
                self.server.host
            ))
        })?;
        Ok(std::net::SocketAddr::new(ip, self.server.port))
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Config`] describing the first invalid value.
    pub fn validate(&self) -> AppResult<()> {
        self.listen_addr()?;

        if self.server.port == 0 {
            return Err(AppError::Config("server.port must be non-zero".to_string()));
        }

        if self.server.max_recipe_bytes == 0 {
            return Err(AppError::Config(
                "server.max_recipe_bytes must be greater than 0".to_string(),
            ));
        }

        if !LOG_LEVELS.contains(&self.observability.log_level.as_str()) {
            return Err(AppError::Config(format!(
                "observability.log_level must be one of {:?}, got {:?}",
                LOG_LEVELS, self.observability.log_level
            )));
        }

        Ok(())
    }
}

impl FromStr for Config {
    type Err = AppError;

    fn from_str(toml_str: &str) -> Result<Self, Self::Err> {
        let config: Config =
            toml::from_str(toml_str).map_err(|source| AppError::ConfigParseFailed {
                path: "<string>".to_string(),
                source,
            })?;

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_str("").unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.max_recipe_bytes, 1024 * 1024);
        assert_eq!(config.observability.log_level, "info");
    }

    #[test]
    fn test_config_parses_all_sections() {
        let config = Config::from_str(
            r#"
            [server]
            host = "127.0.0.1"
            port = 9100
            max_recipe_bytes = 4096

            [observability]
            log_level = "debug"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.server.max_recipe_bytes, 4096);
        assert_eq!(config.observability.log_level, "debug");
        assert_eq!(
            config.listen_addr().unwrap(),
            "127.0.0.1:9100".parse().unwrap()
        );
    }

    #[test]
    fn test_config_partial_section_keeps_other_defaults() {
        let config = Config::from_str("[server]\nport = 9000\n").unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
    }

    #[test]
    fn test_config_validation_zero_port_fails() {
        let result = Config::from_str("[server]\nport = 0\n");
        assert!(result.unwrap_err().to_string().contains("server.port"));
    }

    #[test]
    fn test_config_validation_hostname_fails() {
        let result = Config::from_str("[server]\nhost = \"localhost\"\n");
        assert!(result.unwrap_err().to_string().contains("server.host"));
    }

    #[test]
    fn test_config_validation_zero_body_limit_fails() {
        let result = Config::from_str("[server]\nmax_recipe_bytes = 0\n");
        assert!(result.unwrap_err().to_string().contains("max_recipe_bytes"));
    }

    #[test]
    fn test_config_validation_unknown_log_level_fails() {
        let result = Config::from_str("[observability]\nlog_level = \"loud\"\n");
        assert!(result.unwrap_err().to_string().contains("log_level"));
    }

    #[test]
    fn test_config_rejects_unknown_fields() {
        let result = Config::from_str("[server]\nprot = 9000\n");
        assert!(matches!(result, Err(AppError::ConfigParseFailed { .. })));
    }

    #[test]
    fn test_config_rejects_out_of_range_port() {
        let result = Config::from_str("[server]\nport = 70000\n");
        assert!(matches!(result, Err(AppError::ConfigParseFailed { .. })));
    }
}
