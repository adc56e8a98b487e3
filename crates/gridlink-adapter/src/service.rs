/*!
 * RTU device service.
 *
 * Entry point for commands from the platform. Every command is run through
 * the [`RetryCommandExecutor`] and answered with exactly one response on the
 * given [`DeviceResponseHandler`].
 */
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info, warn};

use gridlink_core::config::SharedConfig;
use gridlink_devices::{
    ConnectionParams, DeviceClient, FunctionalConstraint, ModelNode, NodeReference, SharedDeviceClient,
};

use crate::connection::{DeviceConnectionService, DeviceSession};
use crate::error::{Error, Result};
use crate::executor::{DeviceFunction, RetryCommandExecutor};
use crate::pq::extract_pq_values;
use crate::reporting::ReportDispatcher;
use crate::sink::{DeviceResponseHandler, MeasurementSink};
use crate::system::SystemServiceFactory;
use crate::types::{
    DeviceClass, DeviceRequest, DeviceResponse, GetDataDeviceRequest, GetDataRequest, GetDataResponse,
    GetPqValuesResponse, ResponsePayload, SetDataDeviceRequest, SetDataRequest,
};

/// Logical node holding the reboot control of the RTU
const REBOOT_LOGICAL_NODE: &str = "CSLC";
/// Data object controlling a reboot
const REBOOT_DATA_OBJECT: &str = "Rbt";

/// Handles get data, set data, power quality and reboot commands for RTUs
#[derive(Debug)]
pub struct RtuDeviceService {
    connections: Arc<DeviceConnectionService>,
    executor: RetryCommandExecutor,
    systems: SystemServiceFactory,
}

impl RtuDeviceService {
    /// Create a service on top of `connections`
    pub fn new(config: SharedConfig, connections: Arc<DeviceConnectionService>) -> Self {
        let executor = RetryCommandExecutor::new(Arc::clone(&connections), &config.get().connection);
        Self::with_executor(connections, executor)
    }

    /// Wire a service, its connection service and report dispatcher from their parts
    pub fn build(config: SharedConfig, client: SharedDeviceClient, sink: Arc<dyn MeasurementSink>) -> Self {
        let dispatcher = Arc::new(ReportDispatcher::new(
            sink,
            config.get().reporting.log_report_details,
        ));
        let connections = Arc::new(DeviceConnectionService::new(client, dispatcher, config.clone()));
        Self::new(config, connections)
    }

    /// Create a service with a custom executor
    pub fn with_executor(connections: Arc<DeviceConnectionService>, executor: RetryCommandExecutor) -> Self {
        Self {
            connections,
            executor,
            systems: SystemServiceFactory::new(),
        }
    }

    /// The connection service
    pub fn connections(&self) -> &Arc<DeviceConnectionService> {
        &self.connections
    }

    /// Read measurements of the requested subsystems
    pub async fn get_data(&self, request: GetDataDeviceRequest, handler: &dyn DeviceResponseHandler) {
        let params = self.params(&request.device);
        let function = GetData {
            systems: &self.systems,
            server_name: &params.server_name,
            request: &request.data,
        };
        let result = self
            .executor
            .execute(&params, &function)
            .await
            .map(ResponsePayload::GetData);
        respond(&request.device, "get data", result, handler);
    }

    /// Write set points of the requested subsystems
    pub async fn set_data(&self, request: SetDataDeviceRequest, handler: &dyn DeviceResponseHandler) {
        let params = self.params(&request.device);
        let function = SetData {
            systems: &self.systems,
            server_name: &params.server_name,
            request: &request.data,
        };
        let result = self
            .executor
            .execute(&params, &function)
            .await
            .map(|_| ResponsePayload::Empty);
        respond(&request.device, "set data", result, handler);
    }

    /// Extract the power quality values of the device model
    pub async fn get_pq_values(&self, request: DeviceRequest, handler: &dyn DeviceResponseHandler) {
        let params = self.params(&request);
        let result = self
            .executor
            .execute(&params, &PqValues)
            .await
            .map(ResponsePayload::PqValues);
        respond(&request, "get power quality values", result, handler);
    }

    /// Reboot the RTU
    pub async fn reboot(&self, request: DeviceRequest, handler: &dyn DeviceResponseHandler) {
        let params = self.params(&request);
        let function = Reboot {
            server_name: &params.server_name,
        };
        let result = self
            .executor
            .execute(&params, &function)
            .await
            .map(|_| ResponsePayload::Empty);
        respond(&request, "reboot", result, handler);
    }

    fn params(&self, request: &DeviceRequest) -> ConnectionParams {
        let params = self
            .connections
            .params(&request.device_identification, &request.ip_address);
        info!(
            "Command for {} of {} (correlation {}) on server {}",
            request.device_identification,
            request.organisation_identification,
            request.correlation_uid,
            params.server_name
        );
        params
    }
}

fn respond(
    request: &DeviceRequest,
    command: &str,
    result: Result<ResponsePayload>,
    handler: &dyn DeviceResponseHandler,
) {
    match result {
        Ok(payload) => {
            info!("{} for {} succeeded", command, request.device_identification);
            handler.handle_response(DeviceResponse::ok(request, payload));
        }
        Err(e) if e.is_connection_error() => {
            error!("{} for {} failed to connect: {}", command, request.device_identification, e);
            handler.handle_connection_failure(&e, DeviceResponse::failure(request));
        }
        Err(e) => {
            error!("{} for {} failed: {}", command, request.device_identification, e);
            handler.handle_exception(&e, DeviceResponse::failure(request));
        }
    }
}

struct GetData<'a> {
    systems: &'a SystemServiceFactory,
    server_name: &'a str,
    request: &'a GetDataRequest,
}

#[async_trait]
impl<'a> DeviceFunction for GetData<'a> {
    type Output = GetDataResponse;

    fn name(&self) -> &str {
        "get data"
    }

    /// Subsystems that fail are left out; connection errors abort the whole batch
    async fn apply(&self, client: &dyn DeviceClient, session: &mut DeviceSession) -> Result<GetDataResponse> {
        let mut system_identifiers = Vec::new();
        let mut failed = Vec::new();

        for filter in &self.request.system_filters {
            let outcome = match self.systems.service_for(&filter.system_type) {
                Ok(service) => {
                    service
                        .get_data(client, &session.session, self.server_name, filter)
                        .await
                }
                Err(e) => Err(e),
            };
            match outcome {
                Ok(result) => system_identifiers.push(result),
                Err(e) if e.is_connection_error() => return Err(e),
                Err(e) => {
                    warn!("Skipping {}{}: {}", filter.system_type, filter.id, e);
                    failed.push(format!("{}{}", filter.system_type, filter.id));
                }
            }
        }

        if system_identifiers.is_empty() && !failed.is_empty() {
            return Err(Error::translation(format!(
                "No subsystem could be read: {}",
                failed.join(", ")
            )));
        }
        Ok(GetDataResponse {
            system_identifiers,
            report: None,
        })
    }
}

struct SetData<'a> {
    systems: &'a SystemServiceFactory,
    server_name: &'a str,
    request: &'a SetDataRequest,
}

#[async_trait]
impl<'a> DeviceFunction for SetData<'a> {
    type Output = ();

    fn name(&self) -> &str {
        "set data"
    }

    /// Every subsystem is attempted; any failure fails the command
    async fn apply(&self, client: &dyn DeviceClient, session: &mut DeviceSession) -> Result<()> {
        let mut failed = Vec::new();

        for system in &self.request.set_data_system_identifiers {
            let outcome = match self.systems.service_for(&system.system_type) {
                Ok(service) => {
                    service
                        .set_data(client, &session.session, self.server_name, system)
                        .await
                }
                Err(e) => Err(e),
            };
            match outcome {
                Ok(()) => {}
                Err(e) if e.is_connection_error() => return Err(e),
                Err(e) => {
                    error!("Failed to set data on {}{}: {}", system.system_type, system.id, e);
                    failed.push(format!("{}{}", system.system_type, system.id));
                }
            }
        }

        if failed.is_empty() {
            Ok(())
        } else {
            Err(Error::other(format!("Set data failed for {}", failed.join(", "))))
        }
    }
}

struct PqValues;

#[async_trait]
impl DeviceFunction for PqValues {
    type Output = GetPqValuesResponse;

    fn name(&self) -> &str {
        "get power quality values"
    }

    async fn apply(&self, _client: &dyn DeviceClient, session: &mut DeviceSession) -> Result<GetPqValuesResponse> {
        Ok(extract_pq_values(&session.model))
    }
}

struct Reboot<'a> {
    server_name: &'a str,
}

#[async_trait]
impl<'a> DeviceFunction for Reboot<'a> {
    type Output = ();

    fn name(&self) -> &str {
        "reboot"
    }

    async fn apply(&self, client: &dyn DeviceClient, session: &mut DeviceSession) -> Result<()> {
        let reference = NodeReference::new(
            DeviceClass::Rtu.logical_device(self.server_name, 1),
            REBOOT_LOGICAL_NODE,
            REBOOT_DATA_OBJECT,
            FunctionalConstraint::CO,
        );

        let current = client.read_values(&session.session, &reference).await?;
        if current.find("Oper.ctlVal").and_then(ModelNode::as_bool).is_none() {
            return Err(Error::translation(format!(
                "{} has no boolean Oper.ctlVal",
                reference
            )));
        }

        let command = ModelNode::composite(
            REBOOT_DATA_OBJECT,
            vec![ModelNode::composite("Oper", vec![ModelNode::boolean("ctlVal", true)])],
        )
        .with_fc(FunctionalConstraint::CO);
        client.write_values(&session.session, &reference, &command).await?;
        info!("Reboot requested through {}", reference);
        Ok(())
    }
}
