//! Telemetry bootstrap
//!
//! TigerStyle: Explicit telemetry configuration, installed once per process.
//!
//! Library code only emits `tracing` events. Binaries and tests that want to
//! see them call [`init_telemetry`] once at startup.

use crate::error::{Error, Result};

/// Default log filter when neither `RUST_LOG` nor a level is configured
const LOG_LEVEL_DEFAULT: &str = "info";

/// Telemetry configuration
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to the startup event
    pub service_name: String,
    /// Log level filter (EnvFilter syntax)
    pub log_level: String,
    /// Include the event target (module path) in output
    pub with_target: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "beacon".to_string(),
            log_level: LOG_LEVEL_DEFAULT.to_string(),
            with_target: true,
        }
    }
}

impl TelemetryConfig {
    /// Create a new configuration with the given service name
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            ..Default::default()
        }
    }

    /// Set the log level filter
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Create from environment variables
    ///
    /// Reads:
    /// - `BEACON_SERVICE_NAME`: Service name (default: "beacon")
    /// - `RUST_LOG`: Log level filter (default: "info")
    pub fn from_env() -> Self {
        let service_name =
            std::env::var("BEACON_SERVICE_NAME").unwrap_or_else(|_| "beacon".to_string());
        let log_level =
            std::env::var("RUST_LOG").unwrap_or_else(|_| LOG_LEVEL_DEFAULT.to_string());

        Self {
            service_name,
            log_level,
            with_target: true,
        }
    }
}

/// Install a `fmt` subscriber filtered by `RUST_LOG` or the configured level
///
/// # Errors
/// Returns `InvalidConfiguration` if the filter does not parse, and
/// `Internal` if a global subscriber is already installed.
pub fn init_telemetry(config: TelemetryConfig) -> Result<()> {
    use tracing_subscriber::EnvFilter;

    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.log_level).map_err(|e| {
            Error::InvalidConfiguration {
                field: "log_level".into(),
                reason: e.to_string(),
            }
        })?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(config.with_target)
        .try_init()
        .map_err(|e| Error::internal(format!("failed to install subscriber: {}", e)))?;

    tracing::info!(service = %config.service_name, "telemetry initialized");
    Ok(())
}
