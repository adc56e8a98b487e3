/*!
 * Logging functionality for GridLink.
 *
 * This module sets up `tracing` and offers span helpers so that every log line
 * emitted while talking to a device carries the device identification.
 */
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LoggingConfig;
use crate::error::{Error, Result};

/// Initialize the logging system with default configuration
pub fn init() -> Result<()> {
    init_with_config(&LoggingConfig::default())
}

/// Initialize the logging system with a specific filter
///
/// # Arguments
///
/// * `filter` - The log filter string (e.g., "info", "debug", "gridlink_adapter=trace")
pub fn init_with_filter(filter: &str) -> Result<()> {
    init_with_config(&LoggingConfig {
        level: filter.to_string(),
        ..LoggingConfig::default()
    })
}

/// Initialize the logging system from the `[logging]` configuration section.
///
/// `RUST_LOG` takes precedence over the configured level when it is set.
pub fn init_with_config(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| Error::config(format!("Invalid log filter '{}': {}", config.level, e)))?;

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(config.with_target)
                .with_ansi(config.ansi),
        )
        .with(filter)
        .try_init()
        .map_err(|e| Error::runtime(format!("Failed to initialize logging: {}", e)))?;

    Ok(())
}

/// A convenience macro for creating structured logs with fields
#[macro_export]
macro_rules! log_with_fields {
    ($level:expr, $message:expr, $($field:tt)+) => {
        tracing::event!($level, $($field)+, message = $message)
    };
}

/// A type alias for a tracing span
pub type Span = tracing::Span;

/// Create a span for work done on behalf of a device
///
/// # Arguments
///
/// * `device` - The device identification
/// * `server` - The server (IED) name, when known
pub fn device_span(device: &str, server: Option<&str>) -> Span {
    match server {
        Some(server) => tracing::info_span!("device", id = %device, server = %server),
        None => tracing::info_span!("device", id = %device),
    }
}

/// Create a span for a single device operation
pub fn operation_span(name: &str, device: &str) -> Span {
    tracing::info_span!("operation", name = %name, device = %device)
}
