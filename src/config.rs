//! Server Configuration
//!
//! Parsed from command-line flags:
//!
//! ```text
//! -h, --host <HOST>             Host to bind to (default: 127.0.0.1)
//! -p, --port <PORT>             Port to listen on (default: 6379)
//!     --databases <N>           Number of databases (default: 16)
//!     --sweep-interval <MS>     Initial expiry sweep interval (default: 100)
//!     --no-sweeper              Only expire keys lazily
//!     --help, --version
//! ```

use crate::storage::{ExpiryConfig, DEFAULT_DATABASES};
use std::time::Duration;
use thiserror::Error;

/// The default port (same as Redis)
pub const DEFAULT_PORT: u16 = 6379;

/// The default host
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default starting interval of the expiry sweeper, in milliseconds
pub const DEFAULT_SWEEP_INTERVAL_MS: u64 = 100;

/// Errors in command-line arguments.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} requires a value")]
    MissingValue(String),

    #[error("invalid value for {flag}: {value}")]
    InvalidValue { flag: String, value: String },

    #[error("unknown argument: {0}")]
    UnknownArgument(String),
}

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Number of logical databases, at least 1
    pub databases: usize,
    /// Starting interval of the expiry sweeper; `None` disables it
    pub sweep_interval_ms: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            databases: DEFAULT_DATABASES,
            sweep_interval_ms: Some(DEFAULT_SWEEP_INTERVAL_MS),
        }
    }
}

/// What the command line asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliAction {
    Run(Config),
    Help,
    Version,
}

impl Config {
    /// Parses command-line arguments, not including the program name.
    pub fn from_args<I>(args: I) -> Result<CliAction, ConfigError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut config = Config::default();
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--host" | "-h" => config.host = value(&arg, args.next())?,
                "--port" | "-p" => config.port = parse(&arg, args.next())?,
                "--databases" => {
                    config.databases = parse(&arg, args.next())?;
                    if config.databases == 0 {
                        return Err(ConfigError::InvalidValue {
                            flag: arg,
                            value: "0".to_string(),
                        });
                    }
                }
                "--sweep-interval" => {
                    let ms: u64 = parse(&arg, args.next())?;
                    if ms == 0 {
                        return Err(ConfigError::InvalidValue {
                            flag: arg,
                            value: "0".to_string(),
                        });
                    }
                    config.sweep_interval_ms = Some(ms);
                }
                "--no-sweeper" => config.sweep_interval_ms = None,
                "--help" => return Ok(CliAction::Help),
                "--version" | "-v" => return Ok(CliAction::Version),
                _ => return Err(ConfigError::UnknownArgument(arg)),
            }
        }

        Ok(CliAction::Run(config))
    }

    /// Returns the bind address as a string
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Sweeper settings, or `None` when the sweeper is disabled.
    pub fn expiry_config(&self) -> Option<ExpiryConfig> {
        let base_interval = Duration::from_millis(self.sweep_interval_ms?);
        let defaults = ExpiryConfig::default();

        Some(ExpiryConfig {
            base_interval,
            min_interval: defaults.min_interval.min(base_interval),
            max_interval: defaults.max_interval.max(base_interval),
            ..defaults
        })
    }
}

fn value(flag: &str, next: Option<String>) -> Result<String, ConfigError> {
    next.ok_or_else(|| ConfigError::MissingValue(flag.to_string()))
}

fn parse<T: std::str::FromStr>(flag: &str, next: Option<String>) -> Result<T, ConfigError> {
    let raw = value(flag, next)?;
    raw.parse().map_err(|_| ConfigError::InvalidValue {
        flag: flag.to_string(),
        value: raw,
    })
}
