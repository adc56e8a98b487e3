/*!
 * Prelude module for GridLink Core.
 *
 * This module re-exports commonly used types and functions from the GridLink Core crate
 * to make them easier to import.
 */

// Re-export error types
pub use crate::error::{Error, Result};

// Re-export core types
pub use crate::types::Id;

// Re-export the value codec
pub use crate::decimal::Decimal;

// Re-export config types
pub use crate::config::{Config, ConfigBuilder, SharedConfig};

// Re-export utility functions
pub use crate::utils::{spawn_and_log, with_retry_when, with_timeout};

// Re-export logging macros
pub use crate::log_with_fields;
pub use tracing::{debug, error, info, trace, warn};

// Re-export core initialization
pub use crate::init;
