/*!
 * Device client boundary.
 *
 * The wire protocol (association setup, read/write services, model discovery
 * and report control blocks) is provided by an implementation of
 * [`DeviceClient`]. The adapter only talks to devices through this trait.
 */
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use gridlink_core::types::Id;

use crate::error::Result;
use crate::model::{ModelNode, NodeReference, ServerModel};
use crate::report::Report;

/// Parameters for establishing an association with a device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionParams {
    /// Device identification
    pub device_identification: Id,
    /// Network address of the device
    pub ip_address: String,
    /// MMS port
    pub port: u16,
    /// Server (IED) name
    pub server_name: String,
    /// Timeout for establishing the association
    pub connect_timeout: Duration,
}

/// Handle of an established association
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    id: Id,
    device_identification: Id,
    server_name: String,
    established_at: DateTime<Utc>,
}

impl Session {
    /// Create a handle for a freshly established association
    pub fn new(device_identification: Id, server_name: impl Into<String>) -> Self {
        Self {
            id: Id::new(),
            device_identification,
            server_name: server_name.into(),
            established_at: Utc::now(),
        }
    }

    /// Unique id of this association
    pub fn id(&self) -> &Id {
        &self.id
    }

    /// Device the association belongs to
    pub fn device_identification(&self) -> &Id {
        &self.device_identification
    }

    /// Server (IED) name
    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    /// When the association was established
    pub fn established_at(&self) -> DateTime<Utc> {
        self.established_at
    }
}

/// Reports delivered for an association after reporting was enabled
#[derive(Debug)]
pub struct ReportSubscription {
    /// Smallest sequence number that counts as new data, when the device told us
    pub first_new_sq_num: Option<u32>,
    /// Reports in arrival order
    pub reports: mpsc::Receiver<Report>,
}

/// Client for the device communication protocol
#[async_trait]
pub trait DeviceClient: Send + Sync + Debug {
    /// Establish an association with a device
    async fn connect(&self, params: &ConnectionParams) -> Result<Session>;

    /// Discover the full object model of the server
    async fn discover_model(&self, session: &Session) -> Result<ServerModel>;

    /// Read the current values of a data object
    async fn read_values(&self, session: &Session, reference: &NodeReference) -> Result<ModelNode>;

    /// Write the attributes present in `node` to a data object
    async fn write_values(
        &self,
        session: &Session,
        reference: &NodeReference,
        node: &ModelNode,
    ) -> Result<()>;

    /// Enable all report control blocks of the server.
    ///
    /// Reports are pushed into a channel of `channel_capacity` entries.
    async fn enable_reporting(
        &self,
        session: &Session,
        channel_capacity: usize,
    ) -> Result<ReportSubscription>;

    /// Release the association
    async fn close(&self, session: &Session) -> Result<()>;
}

/// A thread-safe reference to a device client
pub type SharedDeviceClient = Arc<dyn DeviceClient>;
