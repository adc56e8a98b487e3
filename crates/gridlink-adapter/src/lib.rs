/*!
 * GridLink Adapter
 *
 * This crate bridges RTUs speaking an IEC 61850 style protocol and the
 * upstream platform: it extracts power quality values from device models,
 * translates asynchronous reports into normalized measurements and runs
 * get/set/reboot commands with connection retries.
 */

#![warn(missing_docs)]

// Re-export core types
pub use gridlink_core::prelude;

// Re-export types from gridlink_core for convenience
pub use gridlink_core::types::Id;

pub mod connection;
pub mod error;
pub mod executor;
pub mod pq;
pub mod profile;
pub mod reporting;
pub mod service;
pub mod sink;
pub mod system;
pub mod types;

// Re-export main types for convenience
pub use connection::{DeviceConnection, DeviceConnectionService, DeviceSession};
pub use error::{Error, Result};
pub use executor::{DeviceFunction, RetryCommandExecutor};
pub use pq::extract_pq_values;
pub use reporting::{ReportDispatcher, ReportHandler, ReportListener, SequenceState, SequenceStatus};
pub use service::RtuDeviceService;
pub use sink::{ChannelMeasurementSink, DeviceResponseHandler, MeasurementSink};
pub use system::{SystemService, SystemServiceFactory};
pub use types::{
    DataSample, DeviceClass, DeviceMessageStatus, DeviceRequest, DeviceResponse, GetDataDeviceRequest,
    GetDataRequest, GetDataResponse, GetPqValuesResponse, Measurement, ReportMetadata, ResponsePayload,
    SetDataDeviceRequest, SetDataRequest, SystemResult,
};

/// GridLink adapter crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the adapter
pub fn init() -> Result<()> {
    tracing::info!("GridLink Adapter {} initialized", VERSION);
    Ok(())
}
