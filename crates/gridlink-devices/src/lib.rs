/*!
 * GridLink Devices
 *
 * This crate describes the device side of the GridLink adapter: the IEC 61850
 * style object model, asynchronous reports, and the [`DeviceClient`] trait
 * through which the adapter reaches the wire protocol.
 */

#![warn(missing_docs)]

// Re-export core types
pub use gridlink_core::prelude;

pub mod client;
pub mod error;
pub mod model;
pub mod report;
pub mod simulator;

pub use client::{ConnectionParams, DeviceClient, ReportSubscription, Session, SharedDeviceClient};
pub use error::{DeviceError, Result};
pub use model::{FunctionalConstraint, LogicalDevice, LogicalNode, ModelNode, NodeKind, NodeReference, ServerModel};
pub use report::{DataSet, OptFields, ReasonCode, Report, ReportMember, DEVICE_EPOCH_OFFSET_MS};
pub use simulator::SimulatedDeviceClient;

/// GridLink devices crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the device layer
pub fn init() -> std::result::Result<(), gridlink_core::error::Error> {
    tracing::info!("GridLink Devices {} initialized", VERSION);
    Ok(())
}
