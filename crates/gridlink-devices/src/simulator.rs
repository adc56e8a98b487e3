/*!
 * Simulated device client.
 *
 * An in-memory [`DeviceClient`] serving a fixed [`ServerModel`]. Reports are
 * injected with [`SimulatedDeviceClient::push_report`], and connection
 * failures can be scripted to exercise reconnect and retry paths.
 */
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info};

use gridlink_core::types::Id;

use crate::client::{ConnectionParams, DeviceClient, ReportSubscription, Session};
use crate::error::{DeviceError, Result};
use crate::model::{ModelNode, NodeReference, ServerModel};
use crate::report::Report;

/// In-memory device client
#[derive(Debug)]
pub struct SimulatedDeviceClient {
    model: RwLock<ServerModel>,
    first_new_sq_num: RwLock<Option<u32>>,
    open_sessions: RwLock<HashSet<Id>>,
    report_sender: RwLock<Option<mpsc::Sender<Report>>>,
    writes: RwLock<Vec<(NodeReference, ModelNode)>>,
    connect_failures: AtomicUsize,
    operation_failures: AtomicUsize,
    connects: AtomicUsize,
}

impl SimulatedDeviceClient {
    /// Create a client serving `model`
    pub fn new(model: ServerModel) -> Self {
        Self {
            model: RwLock::new(model),
            first_new_sq_num: RwLock::new(None),
            open_sessions: RwLock::new(HashSet::new()),
            report_sender: RwLock::new(None),
            writes: RwLock::new(Vec::new()),
            connect_failures: AtomicUsize::new(0),
            operation_failures: AtomicUsize::new(0),
            connects: AtomicUsize::new(0),
        }
    }

    /// Set the first new sequence number announced when reporting is enabled
    pub async fn set_first_new_sq_num(&self, sq_num: Option<u32>) {
        *self.first_new_sq_num.write().await = sq_num;
    }

    /// Make the next `count` connect attempts fail
    pub fn fail_connects(&self, count: usize) {
        self.connect_failures.store(count, Ordering::SeqCst);
    }

    /// Make the next `count` model operations fail with a lost connection
    pub fn fail_operations(&self, count: usize) {
        self.operation_failures.store(count, Ordering::SeqCst);
    }

    /// Number of successful associations so far
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Data objects written so far, in write order
    pub async fn writes(&self) -> Vec<(NodeReference, ModelNode)> {
        self.writes.read().await.clone()
    }

    /// Snapshot of the served model
    pub async fn model(&self) -> ServerModel {
        self.model.read().await.clone()
    }

    /// Deliver a report on the most recent subscription
    pub async fn push_report(&self, report: Report) -> Result<()> {
        let sender = self
            .report_sender
            .read()
            .await
            .clone()
            .ok_or_else(|| DeviceError::not_connected("reporting is not enabled"))?;
        sender
            .send(report)
            .await
            .map_err(|_| DeviceError::connection_lost("report subscription closed"))
    }

    /// Stop delivering reports, as if the association dropped
    pub async fn drop_subscription(&self) {
        self.report_sender.write().await.take();
    }

    async fn check_session(&self, session: &Session) -> Result<()> {
        if !self.open_sessions.read().await.contains(session.id()) {
            return Err(DeviceError::not_connected(session.device_identification().as_str()));
        }
        if take_one(&self.operation_failures) {
            return Err(DeviceError::connection_lost("simulated connection loss"));
        }
        Ok(())
    }
}

fn take_one(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[async_trait]
impl DeviceClient for SimulatedDeviceClient {
    async fn connect(&self, params: &ConnectionParams) -> Result<Session> {
        if take_one(&self.connect_failures) {
            return Err(DeviceError::connection_failed(format!(
                "{}:{} refused the association",
                params.ip_address, params.port
            )));
        }

        let session = Session::new(params.device_identification.clone(), &params.server_name);
        self.open_sessions.write().await.insert(session.id().clone());
        self.connects.fetch_add(1, Ordering::SeqCst);
        info!(
            "Simulated association with {} ({}) established",
            params.device_identification, params.server_name
        );
        Ok(session)
    }

    async fn discover_model(&self, session: &Session) -> Result<ServerModel> {
        self.check_session(session).await?;
        Ok(self.model.read().await.clone())
    }

    async fn read_values(&self, session: &Session, reference: &NodeReference) -> Result<ModelNode> {
        self.check_session(session).await?;
        self.model
            .read()
            .await
            .find(reference)
            .cloned()
            .ok_or_else(|| DeviceError::node_not_found(reference.to_string()))
    }

    async fn write_values(
        &self,
        session: &Session,
        reference: &NodeReference,
        node: &ModelNode,
    ) -> Result<()> {
        self.check_session(session).await?;
        {
            let mut model = self.model.write().await;
            let target = model
                .find_mut(reference)
                .ok_or_else(|| DeviceError::node_not_found(reference.to_string()))?;
            target.merge_values(node);
        }
        debug!("Simulated write to {}", reference);
        self.writes.write().await.push((reference.clone(), node.clone()));
        Ok(())
    }

    async fn enable_reporting(
        &self,
        session: &Session,
        channel_capacity: usize,
    ) -> Result<ReportSubscription> {
        self.check_session(session).await?;
        let (tx, rx) = mpsc::channel(channel_capacity.max(1));
        *self.report_sender.write().await = Some(tx);
        Ok(ReportSubscription {
            first_new_sq_num: *self.first_new_sq_num.read().await,
            reports: rx,
        })
    }

    async fn close(&self, session: &Session) -> Result<()> {
        self.open_sessions.write().await.remove(session.id());
        Ok(())
    }
}
