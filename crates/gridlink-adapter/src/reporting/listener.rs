/*!
 * Per-connection report listener.
 */
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace};

use gridlink_core::types::Id;
use gridlink_core::utils::spawn_and_log;
use gridlink_devices::{DeviceError, Report};

use crate::connection::DeviceConnection;
use crate::error::Result;
use crate::reporting::dispatcher::ReportDispatcher;

/// Drains the report channel of one connection
#[derive(Debug)]
pub struct ReportListener {
    device_identification: Id,
    connection: Arc<DeviceConnection>,
    dispatcher: Arc<ReportDispatcher>,
}

impl ReportListener {
    /// Create a listener for `connection`
    pub fn new(
        device_identification: Id,
        connection: Arc<DeviceConnection>,
        dispatcher: Arc<ReportDispatcher>,
    ) -> Self {
        Self {
            device_identification,
            connection,
            dispatcher,
        }
    }

    /// Run the listener in a background task
    pub fn spawn(self, reports: mpsc::Receiver<Report>) -> JoinHandle<()> {
        let name = format!("report-listener-{}", self.device_identification);
        spawn_and_log(&name, self.run(reports))
    }

    /// Process reports until the channel closes.
    ///
    /// A closed channel means the association is gone; the connection is then
    /// flagged so the next command reconnects.
    pub async fn run(self, mut reports: mpsc::Receiver<Report>) -> Result<()> {
        info!("Listening for reports of {}", self.device_identification);

        while let Some(report) = reports.recv().await {
            trace!("{} received from {}", report, self.device_identification);
            match self.dispatcher.process(&self.connection, &report).await {
                Ok(true) => debug!("{} of {} dispatched", report, self.device_identification),
                Ok(false) => {}
                Err(e) => error!(
                    "Failed to process {} of {}: {}",
                    report, self.device_identification, e
                ),
            }
        }

        self.connection.mark_broken();
        Err(DeviceError::connection_lost(format!(
            "Report stream of {} closed",
            self.device_identification
        ))
        .into())
    }
}
