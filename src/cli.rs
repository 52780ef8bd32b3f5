//! Command-line interface for any-exporter
//!
//! Provides argument parsing and subcommand handling for the binary.

use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::error::AppResult;

/// Scriptable Prometheus exporter for end-to-end tests
#[derive(Parser)]
#[command(name = "any-exporter")]
#[command(version)]
#[command(about = "Scriptable Prometheus exporter for end-to-end tests")]
#[command(
    long_about = "any-exporter serves metrics whose values are scripted by recipes. \
    POST a recipe to /recipe, then every GET /metrics advances each series by one value."
)]
pub struct Cli {
    /// Path to configuration file (built-in defaults when omitted)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Address to bind to, overrides server.host
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on, overrides server.port
    #[arg(short, long)]
    pub port: Option<u16>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Generate a template configuration file
    Config {
        /// Output file path (prints to stdout if not specified)
        #[arg(short, long)]
        output: Option<String>,
    },
}

impl Cli {
    /// Resolve the effective configuration: file (or defaults), then flags
    ///
    /// # Errors
    ///
    /// Returns the config loading error, or a validation error if a flag
    /// override produces an invalid configuration.
    pub fn load_config(&self) -> AppResult<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };

        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }

        config.validate()?;
        Ok(config)
    }
}

/// Generate template configuration content
pub fn generate_config_template() -> &'static str {
    r#"# any-exporter configuration
#
# Every section and key is optional; the values below are the defaults.

[server]
# IP address to bind to (0.0.0.0 for all interfaces, 127.0.0.1 for localhost only)
host = "0.0.0.0"

# Port to listen on (--port overrides this)
port = 8080

# Largest recipe body accepted by POST /recipe, in bytes
max_recipe_bytes = 1048576

[observability]
# Log level: "trace", "debug", "info", "warn", "error"
# RUST_LOG takes precedence when set
log_level = "info"
"#
}
