/*!
 * Device connection management.
 *
 * A [`DeviceConnection`] owns the live association with one device together
 * with its cached model and report sequence state, all behind a single async
 * mutex. The [`DeviceConnectionService`] establishes connections on demand,
 * starts a report listener for each and tears them down again.
 */
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::{Mutex, MutexGuard, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn, Instrument};

use gridlink_core::config::SharedConfig;
use gridlink_core::logging::device_span;
use gridlink_core::types::Id;
use gridlink_core::utils::with_timeout;
use gridlink_devices::{
    ConnectionParams, DeviceClient, NodeReference, ReportMember, ReportSubscription,
    ServerModel, Session, SharedDeviceClient,
};

use crate::error::Result;
use crate::reporting::{ReportDispatcher, ReportListener, SequenceState};

/// State guarded by the per-device lock
#[derive(Debug)]
pub struct DeviceSession {
    /// The association handle
    pub session: Session,
    /// Model discovered at connect, kept current by reports
    pub model: ServerModel,
    /// Report sequence tracking for this association
    pub sequence: SequenceState,
}

impl DeviceSession {
    /// Create the state of a fresh association
    pub fn new(session: Session, model: ServerModel) -> Self {
        Self {
            session,
            model,
            sequence: SequenceState::new(),
        }
    }

    /// Merge report members into the cached model.
    ///
    /// Returns the number of members that matched a data object.
    pub fn merge_members(&mut self, members: &[ReportMember]) -> usize {
        let mut merged = 0;
        for member in members {
            let target = NodeReference::parse(&member.reference, member.fc)
                .and_then(|reference| self.model.find_mut(&reference));
            match target {
                Some(node) => {
                    node.merge_values(&member.node);
                    merged += 1;
                }
                None => debug!("No model node for report member {}", member.reference),
            }
        }
        merged
    }
}

/// Live connection with one device
#[derive(Debug)]
pub struct DeviceConnection {
    device_identification: Id,
    server_name: String,
    session: Mutex<DeviceSession>,
    broken: AtomicBool,
}

impl DeviceConnection {
    /// Wrap an established session
    pub fn new(device_identification: Id, server_name: impl Into<String>, session: DeviceSession) -> Self {
        Self {
            device_identification,
            server_name: server_name.into(),
            session: Mutex::new(session),
            broken: AtomicBool::new(false),
        }
    }

    /// Device identification
    pub fn device_identification(&self) -> &Id {
        &self.device_identification
    }

    /// Server (IED) name
    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    /// Lock the session; commands and report dispatch for the device are serialized here
    pub async fn lock(&self) -> MutexGuard<'_, DeviceSession> {
        self.session.lock().await
    }

    /// Flag the connection as unusable, e.g. when its report stream ended
    pub fn mark_broken(&self) {
        self.broken.store(true, Ordering::SeqCst);
    }

    /// Whether the connection must be re-established before use
    pub fn is_broken(&self) -> bool {
        self.broken.load(Ordering::SeqCst)
    }
}

struct ConnectionEntry {
    connection: Arc<DeviceConnection>,
    listener: JoinHandle<()>,
}

/// Establishes, caches and releases device connections
pub struct DeviceConnectionService {
    client: SharedDeviceClient,
    dispatcher: Arc<ReportDispatcher>,
    config: SharedConfig,
    connections: RwLock<HashMap<Id, ConnectionEntry>>,
    connecting: Mutex<HashMap<Id, Arc<Mutex<()>>>>,
}

impl DeviceConnectionService {
    /// Create a service connecting through `client`
    pub fn new(client: SharedDeviceClient, dispatcher: Arc<ReportDispatcher>, config: SharedConfig) -> Self {
        Self {
            client,
            dispatcher,
            config,
            connections: RwLock::new(HashMap::new()),
            connecting: Mutex::new(HashMap::new()),
        }
    }

    /// The device client
    pub fn client(&self) -> &SharedDeviceClient {
        &self.client
    }

    /// Connection parameters for a device, using the configured port, server name and timeout
    pub fn params(&self, device_identification: &Id, ip_address: &str) -> ConnectionParams {
        let config = self.config.get();
        ConnectionParams {
            device_identification: device_identification.clone(),
            ip_address: ip_address.to_string(),
            port: config.connection.port,
            server_name: config
                .devices
                .server_name(device_identification.as_str())
                .to_string(),
            connect_timeout: config.connection.connect_timeout(),
        }
    }

    /// The usable connection of a device, if any
    pub async fn connection(&self, device_identification: &Id) -> Option<Arc<DeviceConnection>> {
        self.connections
            .read()
            .await
            .get(device_identification)
            .map(|entry| Arc::clone(&entry.connection))
            .filter(|connection| !connection.is_broken())
    }

    /// Number of cached connections
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Return the cached connection of a device or establish a new one
    pub async fn get_or_connect(&self, params: &ConnectionParams) -> Result<Arc<DeviceConnection>> {
        if let Some(connection) = self.connection(&params.device_identification).await {
            return Ok(connection);
        }

        let device_lock = {
            let mut connecting = self.connecting.lock().await;
            Arc::clone(
                connecting
                    .entry(params.device_identification.clone())
                    .or_insert_with(|| Arc::new(Mutex::new(()))),
            )
        };
        let _guard = device_lock.lock().await;

        // Another task may have connected while we waited
        if let Some(connection) = self.connection(&params.device_identification).await {
            return Ok(connection);
        }
        self.connect(params).await
    }

    /// Establish a new connection, replacing any existing one
    pub async fn connect(&self, params: &ConnectionParams) -> Result<Arc<DeviceConnection>> {
        let span = device_span(params.device_identification.as_str(), Some(params.server_name.as_str()));
        self.establish(params).instrument(span).await
    }

    async fn establish(&self, params: &ConnectionParams) -> Result<Arc<DeviceConnection>> {
        info!(
            "Connecting to {} at {}:{}",
            params.device_identification, params.ip_address, params.port
        );

        let session = with_timeout(params.connect_timeout, self.client.connect(params)).await?;

        let (model, subscription) = match self.prepare(&session).await {
            Ok(prepared) => prepared,
            Err(e) => {
                close_quietly(self.client.as_ref(), &session).await;
                return Err(e);
            }
        };

        let mut device_session = DeviceSession::new(session, model);
        if let Some(sq_num) = subscription.first_new_sq_num {
            device_session.sequence.initialize(sq_num);
        }

        let connection = Arc::new(DeviceConnection::new(
            params.device_identification.clone(),
            &params.server_name,
            device_session,
        ));
        let listener = ReportListener::new(
            params.device_identification.clone(),
            Arc::clone(&connection),
            Arc::clone(&self.dispatcher),
        )
        .spawn(subscription.reports);

        let previous = self.connections.write().await.insert(
            params.device_identification.clone(),
            ConnectionEntry {
                connection: Arc::clone(&connection),
                listener,
            },
        );
        if let Some(previous) = previous {
            debug!("Replacing previous connection of {}", params.device_identification);
            self.release(previous).await;
        }

        info!("Connected to {}", params.device_identification);
        Ok(connection)
    }

    async fn prepare(&self, session: &Session) -> Result<(ServerModel, ReportSubscription)> {
        let model = self.client.discover_model(session).await?;
        debug!(
            "Discovered {} logical devices on {}",
            model.logical_devices.len(),
            session.server_name()
        );
        let capacity = self.config.get().reporting.channel_capacity;
        let subscription = self.client.enable_reporting(session, capacity).await?;
        Ok((model, subscription))
    }

    /// Drop `connection` after a connection error; the next command reconnects.
    ///
    /// Only this connection is released. When the device has been reconnected
    /// in the meantime, the newer connection stays in place.
    pub async fn invalidate(&self, connection: &Arc<DeviceConnection>) {
        connection.mark_broken();
        let device_identification = connection.device_identification();
        let removed = {
            let mut connections = self.connections.write().await;
            match connections.get(device_identification) {
                Some(entry) if Arc::ptr_eq(&entry.connection, connection) => {
                    connections.remove(device_identification)
                }
                _ => None,
            }
        };
        match removed {
            Some(entry) => {
                warn!("Invalidating connection of {}", device_identification);
                self.release(entry).await;
            }
            None => debug!("Connection of {} was already replaced", device_identification),
        }
    }

    /// Disconnect a device; returns whether it was connected
    pub async fn disconnect(&self, device_identification: &Id) -> Result<bool> {
        let removed = self.connections.write().await.remove(device_identification);
        let Some(entry) = removed else {
            return Ok(false);
        };
        entry.listener.abort();
        entry.connection.mark_broken();
        let session = entry.connection.lock().await;
        self.client.close(&session.session).await?;
        info!("Disconnected from {}", device_identification);
        Ok(true)
    }

    /// Disconnect every device
    pub async fn disconnect_all(&self) {
        let devices: Vec<Id> = self.connections.read().await.keys().cloned().collect();
        let results = join_all(devices.iter().map(|device| self.disconnect(device))).await;
        for (device, result) in devices.iter().zip(results) {
            if let Err(e) = result {
                warn!("Failed to disconnect {}: {}", device, e);
            }
        }
    }

    async fn release(&self, entry: ConnectionEntry) {
        entry.listener.abort();
        let session = entry.connection.lock().await;
        close_quietly(self.client.as_ref(), &session.session).await;
    }
}

impl std::fmt::Debug for DeviceConnectionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceConnectionService")
            .field("client", &self.client)
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}

async fn close_quietly(client: &dyn DeviceClient, session: &Session) {
    if let Err(e) = client.close(session).await {
        warn!(
            "Failed to close session of {}: {}",
            session.device_identification(),
            e
        );
    }
}
