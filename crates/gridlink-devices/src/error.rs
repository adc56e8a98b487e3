/*!
 * Error types for device communication.
 */
use thiserror::Error;

use gridlink_core::error::Error as CoreError;

/// Error type for device operations
#[derive(Error, Debug)]
pub enum DeviceError {
    /// No session is established with the device
    #[error("Device not connected: {0}")]
    NotConnected(String),

    /// The association with the device could not be established
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// An established association was lost
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// The device did not answer in time
    #[error("Timeout error: {0}")]
    Timeout(String),

    /// The requested node does not exist in the device model
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    /// The device rejected a service request
    #[error("Service error: {0}")]
    Service(String),

    /// Core error
    #[error("Core error: {0}")]
    Core(#[from] CoreError),
}

/// Result type for device operations
pub type Result<T> = std::result::Result<T, DeviceError>;

impl DeviceError {
    /// Create a new not-connected error
    pub fn not_connected<S: AsRef<str>>(msg: S) -> Self {
        DeviceError::NotConnected(msg.as_ref().to_string())
    }

    /// Create a new connection-failed error
    pub fn connection_failed<S: AsRef<str>>(msg: S) -> Self {
        DeviceError::ConnectionFailed(msg.as_ref().to_string())
    }

    /// Create a new connection-lost error
    pub fn connection_lost<S: AsRef<str>>(msg: S) -> Self {
        DeviceError::ConnectionLost(msg.as_ref().to_string())
    }

    /// Create a new timeout error
    pub fn timeout<S: AsRef<str>>(msg: S) -> Self {
        DeviceError::Timeout(msg.as_ref().to_string())
    }

    /// Create a new node-not-found error
    pub fn node_not_found<S: AsRef<str>>(msg: S) -> Self {
        DeviceError::NodeNotFound(msg.as_ref().to_string())
    }

    /// Create a new service error
    pub fn service<S: AsRef<str>>(msg: S) -> Self {
        DeviceError::Service(msg.as_ref().to_string())
    }

    /// Whether the error means the session is unusable and a reconnect may help
    pub fn is_connection_error(&self) -> bool {
        match self {
            DeviceError::NotConnected(_)
            | DeviceError::ConnectionFailed(_)
            | DeviceError::ConnectionLost(_)
            | DeviceError::Timeout(_) => true,
            DeviceError::Core(CoreError::Timeout(_)) => true,
            _ => false,
        }
    }
}
