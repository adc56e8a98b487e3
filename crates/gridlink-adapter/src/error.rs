/*!
 * Error types for the GridLink adapter crate.
 */
use thiserror::Error;

use gridlink_core::error::Error as CoreError;
use gridlink_devices::DeviceError;

/// Error type for GridLink adapter operations
#[derive(Error, Debug)]
pub enum Error {
    /// The device session could not be (re)established within the retry policy
    #[error("Connection failure: {0}")]
    ConnectionFailure(String),

    /// Device data could not be translated
    #[error("Translation error: {0}")]
    Translation(String),

    /// Not found error
    #[error("Not found: {0}")]
    NotFound(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Device error
    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    /// Core error
    #[error("Core error: {0}")]
    Core(#[from] CoreError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Other error
    #[error("Other error: {0}")]
    Other(String),
}

/// Result type for GridLink adapter operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a new connection failure
    pub fn connection_failure<S: AsRef<str>>(msg: S) -> Self {
        Error::ConnectionFailure(msg.as_ref().to_string())
    }

    /// Create a new translation error
    pub fn translation<S: AsRef<str>>(msg: S) -> Self {
        Error::Translation(msg.as_ref().to_string())
    }

    /// Create a new not found error
    pub fn not_found<S: AsRef<str>>(msg: S) -> Self {
        Error::NotFound(msg.as_ref().to_string())
    }

    /// Create a new validation error
    pub fn validation<S: AsRef<str>>(msg: S) -> Self {
        Error::Validation(msg.as_ref().to_string())
    }

    /// Create a new other error
    pub fn other<S: AsRef<str>>(msg: S) -> Self {
        Error::Other(msg.as_ref().to_string())
    }

    /// Whether the error concerns the device connection rather than the data
    pub fn is_connection_error(&self) -> bool {
        match self {
            Error::ConnectionFailure(_) => true,
            Error::Device(e) => e.is_connection_error(),
            Error::Core(CoreError::Timeout(_)) => true,
            _ => false,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
