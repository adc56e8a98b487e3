/*!
 * Upstream delivery boundary.
 *
 * Translated report measurements leave the adapter through a
 * [`MeasurementSink`]; command outcomes through a [`DeviceResponseHandler`].
 * The upstream transport implements both.
 */
use std::fmt::Debug;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use gridlink_core::types::Id;

use crate::error::{Error, Result};
use crate::types::{DeviceResponse, GetDataResponse};

/// Receives measurements translated from device reports
#[async_trait]
pub trait MeasurementSink: Send + Sync + Debug {
    /// Deliver the measurements of one report of `device_identification`
    async fn send_measurements(&self, device_identification: &Id, response: GetDataResponse) -> Result<()>;
}

/// Receives the single response of every device command
pub trait DeviceResponseHandler: Send + Sync {
    /// The command completed
    fn handle_response(&self, response: DeviceResponse);

    /// The device could not be reached within the retry policy
    fn handle_connection_failure(&self, error: &Error, response: DeviceResponse);

    /// The command failed for any other reason
    fn handle_exception(&self, error: &Error, response: DeviceResponse);
}

/// Sink forwarding measurements into a tokio channel
#[derive(Debug, Clone)]
pub struct ChannelMeasurementSink {
    sender: mpsc::Sender<(Id, GetDataResponse)>,
}

impl ChannelMeasurementSink {
    /// Create a sink and the receiving end of its channel
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<(Id, GetDataResponse)>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }

    /// Create a sink around an existing sender
    pub fn new(sender: mpsc::Sender<(Id, GetDataResponse)>) -> Self {
        Self { sender }
    }
}

#[async_trait]
impl MeasurementSink for ChannelMeasurementSink {
    async fn send_measurements(&self, device_identification: &Id, response: GetDataResponse) -> Result<()> {
        debug!(
            "Forwarding {} system results of {}",
            response.system_identifiers.len(),
            device_identification
        );
        self.sender
            .send((device_identification.clone(), response))
            .await
            .map_err(|_| Error::other("Measurement channel closed"))
    }
}
