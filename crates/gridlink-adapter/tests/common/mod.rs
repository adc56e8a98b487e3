//! Shared fixtures for the adapter integration tests.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::mpsc;

use gridlink_adapter::{
    ChannelMeasurementSink, DeviceConnection, DeviceRequest, DeviceResponse, DeviceResponseHandler,
    Error, GetDataResponse, Id, RtuDeviceService,
};
use gridlink_core::config::{Config, SharedConfig};
use gridlink_devices::{
    DataSet, FunctionalConstraint, LogicalDevice, LogicalNode, ModelNode, Report, ReportMember,
    ServerModel, SimulatedDeviceClient,
};

pub const DEVICE: &str = "RTU-0001";

pub fn time() -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(1_500_000_000, 0).single()
}

/// `<name> { stVal, q, t }`
pub fn status(name: &str, value: i64) -> ModelNode {
    ModelNode::composite(
        name,
        vec![
            ModelNode::integer("stVal", value),
            ModelNode::quality("q", 0),
            ModelNode::timestamp("t", time()),
        ],
    )
    .with_fc(FunctionalConstraint::ST)
}

/// `<name> { mag { f }, q, t }`
pub fn measured(name: &str, value: f32) -> ModelNode {
    ModelNode::composite(
        name,
        vec![
            ModelNode::composite("mag", vec![ModelNode::float("f", value)]),
            ModelNode::quality("q", 0),
            ModelNode::timestamp("t", time()),
        ],
    )
    .with_fc(FunctionalConstraint::MX)
}

/// `<name> { phsA { cVal { mag { f } }, q, t }, ... }`
pub fn phases(name: &str, values: &[(&str, f32)]) -> ModelNode {
    let children = values
        .iter()
        .map(|(phase, value)| {
            ModelNode::composite(
                *phase,
                vec![
                    ModelNode::composite(
                        "cVal",
                        vec![ModelNode::composite("mag", vec![ModelNode::float("f", *value)])],
                    ),
                    ModelNode::quality("q", 0),
                    ModelNode::timestamp("t", time()),
                ],
            )
        })
        .collect();
    ModelNode::composite(name, children).with_fc(FunctionalConstraint::MX)
}

fn set_point(name: &str) -> ModelNode {
    ModelNode::composite(
        name,
        vec![ModelNode::composite("setMag", vec![ModelNode::float("f", 0.0)])],
    )
    .with_fc(FunctionalConstraint::SP)
}

fn generator(prefix: &str, id: u32) -> LogicalDevice {
    LogicalDevice::new(
        format!("ZOWN_RTU{}{}", prefix, id),
        vec![
            LogicalNode::new("LLN0", vec![status("Beh", 1), status("Health", 1)]),
            LogicalNode::new(
                "DGEN1",
                vec![status("GnOpSt", 1), status("OpTmh", 1200), measured("GnSpd", 1500.0)],
            ),
            LogicalNode::new(
                "MMXU1",
                vec![
                    measured("TotW", 1234.5),
                    phases("PhV", &[("phsA", 230.4), ("phsB", 229.6)]),
                ],
            ),
            LogicalNode::new("MMTR1", vec![status("TotWh", 98765)]),
            LogicalNode::new("DRCC1", vec![set_point("OutWSet")]),
        ],
    )
}

/// An RTU with a PV installation and a battery
pub fn rtu_model() -> ServerModel {
    let rtu = LogicalDevice::new(
        "ZOWN_RTURTU1",
        vec![
            LogicalNode::new("LLN0", vec![status("Beh", 1), status("Health", 1)]),
            LogicalNode::new(
                "GGIO1",
                vec![
                    status("Alm1", 0),
                    status("Alm2", 1),
                    status("Alm3", 0),
                    status("Alm4", 0),
                ],
            ),
            LogicalNode::new(
                "CSLC",
                vec![ModelNode::composite(
                    "Rbt",
                    vec![ModelNode::composite("Oper", vec![ModelNode::boolean("ctlVal", false)])],
                )
                .with_fc(FunctionalConstraint::CO)],
            ),
        ],
    );

    ServerModel::new(vec![rtu, generator("PV", 1), generator("BATTERY", 2)])
}

/// Response handler remembering every response it was given
#[derive(Default)]
pub struct RecordingResponseHandler {
    responses: Mutex<Vec<(Outcome, DeviceResponse)>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Response,
    ConnectionFailure,
    Exception,
}

impl RecordingResponseHandler {
    pub fn responses(&self) -> Vec<(Outcome, DeviceResponse)> {
        self.responses.lock().unwrap().clone()
    }

    /// The single recorded response
    pub fn single(&self) -> (Outcome, DeviceResponse) {
        let responses = self.responses();
        assert_eq!(responses.len(), 1, "expected exactly one response");
        responses.into_iter().next().unwrap()
    }

    fn record(&self, outcome: Outcome, response: DeviceResponse) {
        self.responses.lock().unwrap().push((outcome, response));
    }
}

impl DeviceResponseHandler for RecordingResponseHandler {
    fn handle_response(&self, response: DeviceResponse) {
        self.record(Outcome::Response, response);
    }

    fn handle_connection_failure(&self, _error: &Error, response: DeviceResponse) {
        self.record(Outcome::ConnectionFailure, response);
    }

    fn handle_exception(&self, _error: &Error, response: DeviceResponse) {
        self.record(Outcome::Exception, response);
    }
}

/// A service wired to a simulated RTU
pub struct Harness {
    pub client: Arc<SimulatedDeviceClient>,
    pub service: RtuDeviceService,
    pub measurements: mpsc::Receiver<(Id, GetDataResponse)>,
}

impl Harness {
    pub fn new(model: ServerModel) -> Self {
        let mut config = Config::default();
        config.connection.retry_delay_ms = 10;
        config.connection.operation_timeout_ms = 2_000;
        Self::with_config(model, config)
    }

    pub fn with_config(model: ServerModel, config: Config) -> Self {
        let client = Arc::new(SimulatedDeviceClient::new(model));
        let (sink, measurements) = ChannelMeasurementSink::channel(16);
        let service = RtuDeviceService::build(
            SharedConfig::new(config),
            client.clone(),
            Arc::new(sink),
        );
        Self {
            client,
            service,
            measurements,
        }
    }

    /// Establish the connection, enabling reporting
    pub async fn connect(&self) -> Arc<DeviceConnection> {
        let connections = self.service.connections();
        let params = connections.params(&Id::from(DEVICE), "127.0.0.1");
        connections.get_or_connect(&params).await.unwrap()
    }

    /// Next measurements sent upstream
    pub async fn next_measurements(&mut self) -> GetDataResponse {
        let (device, response) = tokio::time::timeout(Duration::from_secs(2), self.measurements.recv())
            .await
            .expect("measurements within two seconds")
            .expect("measurement channel open");
        assert_eq!(device.as_str(), DEVICE);
        response
    }
}

pub fn request() -> DeviceRequest {
    DeviceRequest {
        organisation_identification: Id::from("test-org"),
        device_identification: Id::from(DEVICE),
        correlation_uid: Id::from("corr-1"),
        ip_address: "127.0.0.1".to_string(),
    }
}

pub fn member(logical_device: &str, logical_node: &str, node: ModelNode) -> ReportMember {
    let fc = node.fc.unwrap_or(FunctionalConstraint::ST);
    ReportMember::new(
        format!("{}/{}.{}", logical_device, logical_node, node.name),
        fc,
        node,
    )
}

pub fn report(data_set_ref: &str, sq_num: Option<u32>, members: Vec<ReportMember>) -> Report {
    Report {
        rpt_id: "brcb01".to_string(),
        data_set_ref: data_set_ref.to_string(),
        sq_num,
        entry_time: Some(1_000),
        data_set: Some(DataSet {
            reference: data_set_ref.to_string(),
            members,
        }),
        ..Report::default()
    }
}
