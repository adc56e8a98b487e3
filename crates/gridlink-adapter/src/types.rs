/*!
 * Upstream message types.
 *
 * Requests arriving from the platform and the normalized results sent back:
 * measurements grouped per subsystem, power quality samples and command
 * responses. Everything here is serializable for the upstream transport.
 */
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use gridlink_core::decimal::Decimal;
use gridlink_core::types::Id;

use crate::error::Error;

/// Class of a subsystem behind an RTU
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceClass {
    /// The RTU itself
    Rtu,
    /// Photovoltaic installation
    Pv,
    /// Battery
    Battery,
    /// Engine
    Engine,
    /// Load
    Load,
    /// Combined heat and power
    Chp,
    /// Heat buffer
    HeatBuffer,
    /// Gas furnace
    GasFurnace,
    /// Heat pump
    HeatPump,
    /// Boiler
    Boiler,
}

impl DeviceClass {
    /// All device classes
    pub const ALL: [DeviceClass; 10] = [
        DeviceClass::Rtu,
        DeviceClass::Pv,
        DeviceClass::Battery,
        DeviceClass::Engine,
        DeviceClass::Load,
        DeviceClass::Chp,
        DeviceClass::HeatBuffer,
        DeviceClass::GasFurnace,
        DeviceClass::HeatPump,
        DeviceClass::Boiler,
    ];

    /// Token used in dataset references and system types
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceClass::Rtu => "RTU",
            DeviceClass::Pv => "PV",
            DeviceClass::Battery => "BATTERY",
            DeviceClass::Engine => "ENGINE",
            DeviceClass::Load => "LOAD",
            DeviceClass::Chp => "CHP",
            DeviceClass::HeatBuffer => "HEAT_BUFFER",
            DeviceClass::GasFurnace => "GAS_FURNACE",
            DeviceClass::HeatPump => "HEAT_PUMP",
            DeviceClass::Boiler => "BOILER",
        }
    }

    /// Logical device name of subsystem `id` on server `server_name`, e.g. `ZOWN_RTUPV1`
    pub fn logical_device(&self, server_name: &str, id: u32) -> String {
        format!("{}{}{}", server_name, self.as_str(), id)
    }
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceClass {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DeviceClass::ALL
            .iter()
            .copied()
            .find(|class| class.as_str() == s)
            .ok_or_else(|| Error::not_found(format!("Unknown system type: {}", s)))
    }
}

/// A single normalized measurement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    /// Instance number of the measured point (numeric suffix of the data object)
    pub id: i32,
    /// Data object name without the instance number
    pub node: String,
    /// Quality bits
    pub qualifier: i32,
    /// Time of the value
    pub time: Option<DateTime<Utc>>,
    /// The value
    pub value: f64,
}

/// Measurements of one subsystem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemResult {
    /// Subsystem instance id
    pub id: u32,
    /// Subsystem class token
    pub system_type: String,
    /// Measurements in member order
    pub measurements: Vec<Measurement>,
}

impl SystemResult {
    /// Create a system result
    pub fn new(id: u32, class: DeviceClass, measurements: Vec<Measurement>) -> Self {
        Self {
            id,
            system_type: class.as_str().to_string(),
            measurements,
        }
    }
}

/// Report the measurements were taken from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Sequence number of the report
    pub sequence_number: Option<u32>,
    /// Entry time of the report
    pub time_stamp: Option<DateTime<Utc>>,
    /// Report identifier
    pub report_identifier: String,
}

/// Measurements sent upstream, either as a get-data answer or for a report
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GetDataResponse {
    /// One entry per subsystem
    pub system_identifiers: Vec<SystemResult>,
    /// Set when the measurements come from a report
    pub report: Option<ReportMetadata>,
}

/// Selects measurements of a subsystem by data object name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeasurementFilter {
    /// Data object name without instance number, e.g. `Alm`
    pub node: String,
}

/// Selects the measurements to read from one subsystem
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemFilter {
    /// Subsystem instance id
    pub id: u32,
    /// Subsystem class token
    pub system_type: String,
    /// Requested measurements; ignored when `all` is set
    #[serde(default)]
    pub measurement_filters: Vec<MeasurementFilter>,
    /// Read every known measurement of the subsystem
    #[serde(default)]
    pub all: bool,
}

/// Get-data command payload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetDataRequest {
    /// One filter per subsystem
    pub system_filters: Vec<SystemFilter>,
}

/// A value to write to a set point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetPoint {
    /// Set point data object name, e.g. `OutWSet`
    pub node: String,
    /// The value
    pub value: f64,
}

/// Set points for one subsystem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetDataSystemIdentifier {
    /// Subsystem instance id
    pub id: u32,
    /// Subsystem class token
    pub system_type: String,
    /// Set points to write
    pub set_points: Vec<SetPoint>,
}

/// Set-data command payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SetDataRequest {
    /// One entry per subsystem
    pub set_data_system_identifiers: Vec<SetDataSystemIdentifier>,
}

/// A power quality value extracted from the device model.
///
/// The qualified name is present exactly when a value is present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSample {
    qualified_name: Option<String>,
    timestamp: Option<DateTime<Utc>>,
    value: Option<Decimal>,
}

impl DataSample {
    /// Create a sample holding a value
    pub fn new(qualified_name: String, timestamp: Option<DateTime<Utc>>, value: Decimal) -> Self {
        Self {
            qualified_name: Some(qualified_name),
            timestamp,
            value: Some(value),
        }
    }

    /// Create a sample for a branch without a value
    pub fn empty(timestamp: Option<DateTime<Utc>>) -> Self {
        Self {
            qualified_name: None,
            timestamp,
            value: None,
        }
    }

    /// Whether nothing was extracted
    pub fn is_empty(&self) -> bool {
        self.value.is_none()
    }

    /// Qualified name, e.g. `TotW.mag.f`
    pub fn qualified_name(&self) -> Option<&str> {
        self.qualified_name.as_deref()
    }

    /// Timestamp of the value
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }

    /// Rounded value
    pub fn value(&self) -> Option<Decimal> {
        self.value
    }
}

/// Samples of one logical node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicalNodeSample {
    /// Logical node name
    pub name: String,
    /// Non-empty samples in model order
    pub samples: Vec<DataSample>,
}

/// Samples of one logical device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicalDeviceSample {
    /// Logical device name
    pub name: String,
    /// Logical nodes with at least one sample
    pub logical_nodes: Vec<LogicalNodeSample>,
}

/// Power quality values of a whole device
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetPqValuesResponse {
    /// Logical devices with at least one sample
    pub logical_devices: Vec<LogicalDeviceSample>,
}

/// Identification carried by every device command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRequest {
    /// Organisation on whose behalf the command runs
    pub organisation_identification: Id,
    /// Target device
    pub device_identification: Id,
    /// Correlates the response with the request
    pub correlation_uid: Id,
    /// Network address of the device
    pub ip_address: String,
}

/// Get-data command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetDataDeviceRequest {
    /// Device identification
    pub device: DeviceRequest,
    /// What to read
    pub data: GetDataRequest,
}

/// Set-data command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetDataDeviceRequest {
    /// Device identification
    pub device: DeviceRequest,
    /// What to write
    pub data: SetDataRequest,
}

/// Outcome of a device command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceMessageStatus {
    /// The command succeeded
    Ok,
    /// The command failed
    Failure,
}

/// Data returned with a device response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ResponsePayload {
    /// Acknowledgement without data
    #[default]
    Empty,
    /// Get-data answer
    GetData(GetDataResponse),
    /// Power quality values
    PqValues(GetPqValuesResponse),
}

/// Response to a device command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceResponse {
    /// Organisation of the request
    pub organisation_identification: Id,
    /// Device of the request
    pub device_identification: Id,
    /// Correlation uid of the request
    pub correlation_uid: Id,
    /// Outcome
    pub status: DeviceMessageStatus,
    /// Returned data
    pub payload: ResponsePayload,
}

impl DeviceResponse {
    /// Successful response for `request`
    pub fn ok(request: &DeviceRequest, payload: ResponsePayload) -> Self {
        Self::with_status(request, DeviceMessageStatus::Ok, payload)
    }

    /// Failed response for `request`
    pub fn failure(request: &DeviceRequest) -> Self {
        Self::with_status(request, DeviceMessageStatus::Failure, ResponsePayload::Empty)
    }

    fn with_status(request: &DeviceRequest, status: DeviceMessageStatus, payload: ResponsePayload) -> Self {
        Self {
            organisation_identification: request.organisation_identification.clone(),
            device_identification: request.device_identification.clone(),
            correlation_uid: request.correlation_uid.clone(),
            status,
            payload,
        }
    }
}
