/*!
 * Report handlers per device class.
 *
 * A handler translates the members of one report into [`Measurement`]s and
 * wraps them in the [`SystemResult`] of its subsystem. Handlers are looked up
 * in a static registry keyed by [`DeviceClass`] and created per report for the
 * instance number found in the dataset reference.
 */
use std::collections::HashMap;
use std::fmt::Debug;

use once_cell::sync::Lazy;

use gridlink_core::decimal::Decimal;
use gridlink_devices::{ModelNode, NodeKind, ReportMember};

use crate::error::{Error, Result};
use crate::profile::{profile, split_instance, SystemProfile};
use crate::types::{DeviceClass, Measurement, SystemResult};

/// Attributes that can hold the value of a data object, in lookup order
const VALUE_ATTRIBUTES: [&str; 4] = ["stVal", "mag.f", "actVal", "setMag.f"];

/// Translates report members of one subsystem
pub trait ReportHandler: Send + Sync + Debug {
    /// Class of the subsystem
    fn device_class(&self) -> DeviceClass;

    /// Instance id of the subsystem
    fn system_id(&self) -> u32;

    /// Translate one member; `Ok(None)` when the member is not recognized
    fn handle_member(&self, member: &ReportMember) -> Result<Option<Measurement>>;

    /// Wrap the translated measurements
    fn create_result(&self, measurements: Vec<Measurement>) -> SystemResult {
        SystemResult::new(self.system_id(), self.device_class(), measurements)
    }
}

/// Constructor of a handler for a subsystem instance
pub type HandlerConstructor = fn(u32) -> Box<dyn ReportHandler>;

static HANDLERS: Lazy<HashMap<DeviceClass, HandlerConstructor>> = Lazy::new(|| {
    let mut handlers: HashMap<DeviceClass, HandlerConstructor> = HashMap::new();
    handlers.insert(DeviceClass::Rtu, |id| profile_handler(DeviceClass::Rtu, id));
    handlers.insert(DeviceClass::Pv, |id| profile_handler(DeviceClass::Pv, id));
    handlers.insert(DeviceClass::Battery, |id| profile_handler(DeviceClass::Battery, id));
    handlers.insert(DeviceClass::Engine, |id| profile_handler(DeviceClass::Engine, id));
    handlers.insert(DeviceClass::Load, |id| profile_handler(DeviceClass::Load, id));
    handlers.insert(DeviceClass::Chp, |id| profile_handler(DeviceClass::Chp, id));
    handlers.insert(DeviceClass::HeatBuffer, |id| profile_handler(DeviceClass::HeatBuffer, id));
    handlers.insert(DeviceClass::GasFurnace, |id| profile_handler(DeviceClass::GasFurnace, id));
    handlers.insert(DeviceClass::HeatPump, |id| profile_handler(DeviceClass::HeatPump, id));
    handlers.insert(DeviceClass::Boiler, |id| profile_handler(DeviceClass::Boiler, id));
    handlers
});

fn profile_handler(class: DeviceClass, system_id: u32) -> Box<dyn ReportHandler> {
    Box::new(ProfileReportHandler::new(class, system_id))
}

/// Create the handler for subsystem `system_id` of `class`
pub fn handler_for(class: DeviceClass, system_id: u32) -> Option<Box<dyn ReportHandler>> {
    HANDLERS.get(&class).map(|constructor| constructor(system_id))
}

/// Handler recognizing the data objects listed in the class profile
#[derive(Debug)]
pub struct ProfileReportHandler {
    profile: &'static SystemProfile,
    system_id: u32,
}

impl ProfileReportHandler {
    /// Create a handler for subsystem `system_id` of `class`
    pub fn new(class: DeviceClass, system_id: u32) -> Self {
        Self {
            profile: profile(class),
            system_id,
        }
    }
}

impl ReportHandler for ProfileReportHandler {
    fn device_class(&self) -> DeviceClass {
        self.profile.class
    }

    fn system_id(&self) -> u32 {
        self.system_id
    }

    fn handle_member(&self, member: &ReportMember) -> Result<Option<Measurement>> {
        if self.profile.data_object(member.name()).is_none() {
            return Ok(None);
        }
        translate_data_object(&member.node).map(Some)
    }
}

/// Translate a data object into a measurement.
///
/// The value comes from `stVal`, `mag.f`, `actVal` or `setMag.f`, the quality
/// from `q` and the time from `t`. Float values pass through the decimal codec.
pub fn translate_data_object(node: &ModelNode) -> Result<Measurement> {
    let (base, id) = split_instance(&node.name);

    let leaf = VALUE_ATTRIBUTES
        .iter()
        .find_map(|path| node.find(path))
        .ok_or_else(|| Error::translation(format!("No value attribute in {}", node.name)))?;
    let value = leaf_value(leaf)
        .ok_or_else(|| Error::translation(format!("Unusable value in {}.{}", node.name, leaf.name)))?;

    Ok(Measurement {
        id,
        node: base.to_string(),
        qualifier: node
            .find("q")
            .and_then(ModelNode::as_quality)
            .map(i32::from)
            .unwrap_or(0),
        time: node.find("t").and_then(ModelNode::as_timestamp),
        value,
    })
}

fn leaf_value(leaf: &ModelNode) -> Option<f64> {
    match leaf.kind {
        NodeKind::Float(f) => Decimal::from_f32(f).map(|d| d.to_f64()),
        _ => leaf.as_f64(),
    }
}
