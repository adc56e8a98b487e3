/*!
 * Data object tables per device class.
 *
 * Every subsystem class exposes a fixed set of data objects in its logical
 * device. The tables drive both report translation (which members are
 * recognized) and get/set commands (which nodes to read or write).
 */
use gridlink_devices::FunctionalConstraint::{self, MX, SP, ST};

use crate::types::DeviceClass;

/// A data object of a subsystem logical device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataObjectSpec {
    /// Data object name, including its instance number, e.g. `Alm2`
    pub name: &'static str,
    /// Logical node holding the data object
    pub logical_node: &'static str,
    /// Functional constraint of the data object
    pub fc: FunctionalConstraint,
}

const fn spec(name: &'static str, logical_node: &'static str, fc: FunctionalConstraint) -> DataObjectSpec {
    DataObjectSpec {
        name,
        logical_node,
        fc,
    }
}

/// Data objects and set points of one device class
#[derive(Debug)]
pub struct SystemProfile {
    /// The device class
    pub class: DeviceClass,
    /// Readable and reported data objects
    pub data_objects: &'static [DataObjectSpec],
    /// Writable set points
    pub set_points: &'static [DataObjectSpec],
}

impl SystemProfile {
    /// Data object by full name
    pub fn data_object(&self, name: &str) -> Option<&DataObjectSpec> {
        self.data_objects.iter().find(|d| d.name == name)
    }

    /// Set point by name
    pub fn set_point(&self, name: &str) -> Option<&DataObjectSpec> {
        self.set_points.iter().find(|d| d.name == name)
    }
}

const BEHAVIOR: DataObjectSpec = spec("Beh", "LLN0", ST);
const HEALTH: DataObjectSpec = spec("Health", "LLN0", ST);
const GENERATOR_STATE: DataObjectSpec = spec("GnOpSt", "DGEN1", ST);
const OPERATIONAL_HOURS: DataObjectSpec = spec("OpTmh", "DGEN1", ST);
const GENERATOR_SPEED: DataObjectSpec = spec("GnSpd", "DGEN1", MX);
const ACTUAL_POWER: DataObjectSpec = spec("TotW", "MMXU1", MX);
const TOTAL_ENERGY: DataObjectSpec = spec("TotWh", "MMTR1", ST);
const FLOW_TEMPERATURE: DataObjectSpec = spec("FlwTmp1", "TTMP1", MX);
const RETURN_TEMPERATURE: DataObjectSpec = spec("RtnTmp1", "TTMP1", MX);

const POWER_SET_POINTS: &[DataObjectSpec] = &[spec("OutWSet", "DRCC1", SP)];
const TEMPERATURE_SET_POINTS: &[DataObjectSpec] = &[spec("TmpSet", "DRCC1", SP)];

static RTU: SystemProfile = SystemProfile {
    class: DeviceClass::Rtu,
    data_objects: &[
        BEHAVIOR,
        HEALTH,
        spec("Alm1", "GGIO1", ST),
        spec("Alm2", "GGIO1", ST),
        spec("Alm3", "GGIO1", ST),
        spec("Alm4", "GGIO1", ST),
        spec("IntIn1", "GGIO1", ST),
        spec("IntIn2", "GGIO1", ST),
    ],
    set_points: &[],
};

static PV: SystemProfile = SystemProfile {
    class: DeviceClass::Pv,
    data_objects: &[
        BEHAVIOR,
        HEALTH,
        GENERATOR_STATE,
        OPERATIONAL_HOURS,
        GENERATOR_SPEED,
        ACTUAL_POWER,
        TOTAL_ENERGY,
    ],
    set_points: POWER_SET_POINTS,
};

static BATTERY: SystemProfile = SystemProfile {
    class: DeviceClass::Battery,
    data_objects: &[
        BEHAVIOR,
        HEALTH,
        GENERATOR_STATE,
        OPERATIONAL_HOURS,
        ACTUAL_POWER,
        TOTAL_ENERGY,
    ],
    set_points: POWER_SET_POINTS,
};

static ENGINE: SystemProfile = SystemProfile {
    class: DeviceClass::Engine,
    data_objects: &[
        BEHAVIOR,
        HEALTH,
        GENERATOR_STATE,
        OPERATIONAL_HOURS,
        GENERATOR_SPEED,
        ACTUAL_POWER,
        TOTAL_ENERGY,
    ],
    set_points: POWER_SET_POINTS,
};

static LOAD: SystemProfile = SystemProfile {
    class: DeviceClass::Load,
    data_objects: &[BEHAVIOR, HEALTH, ACTUAL_POWER, TOTAL_ENERGY],
    set_points: POWER_SET_POINTS,
};

static CHP: SystemProfile = SystemProfile {
    class: DeviceClass::Chp,
    data_objects: &[
        BEHAVIOR,
        HEALTH,
        GENERATOR_STATE,
        OPERATIONAL_HOURS,
        ACTUAL_POWER,
        TOTAL_ENERGY,
        FLOW_TEMPERATURE,
        RETURN_TEMPERATURE,
    ],
    set_points: POWER_SET_POINTS,
};

static HEAT_BUFFER: SystemProfile = SystemProfile {
    class: DeviceClass::HeatBuffer,
    data_objects: &[
        BEHAVIOR,
        HEALTH,
        spec("Tmp1", "TTMP1", MX),
        spec("Tmp2", "TTMP1", MX),
        spec("Tmp3", "TTMP1", MX),
    ],
    set_points: &[],
};

static GAS_FURNACE: SystemProfile = SystemProfile {
    class: DeviceClass::GasFurnace,
    data_objects: &[
        BEHAVIOR,
        HEALTH,
        OPERATIONAL_HOURS,
        FLOW_TEMPERATURE,
        RETURN_TEMPERATURE,
    ],
    set_points: TEMPERATURE_SET_POINTS,
};

static HEAT_PUMP: SystemProfile = SystemProfile {
    class: DeviceClass::HeatPump,
    data_objects: &[
        BEHAVIOR,
        HEALTH,
        OPERATIONAL_HOURS,
        ACTUAL_POWER,
        FLOW_TEMPERATURE,
        RETURN_TEMPERATURE,
    ],
    set_points: TEMPERATURE_SET_POINTS,
};

static BOILER: SystemProfile = SystemProfile {
    class: DeviceClass::Boiler,
    data_objects: &[
        BEHAVIOR,
        HEALTH,
        GENERATOR_STATE,
        OPERATIONAL_HOURS,
        FLOW_TEMPERATURE,
        RETURN_TEMPERATURE,
    ],
    set_points: TEMPERATURE_SET_POINTS,
};

/// Profile of a device class
pub fn profile(class: DeviceClass) -> &'static SystemProfile {
    match class {
        DeviceClass::Rtu => &RTU,
        DeviceClass::Pv => &PV,
        DeviceClass::Battery => &BATTERY,
        DeviceClass::Engine => &ENGINE,
        DeviceClass::Load => &LOAD,
        DeviceClass::Chp => &CHP,
        DeviceClass::HeatBuffer => &HEAT_BUFFER,
        DeviceClass::GasFurnace => &GAS_FURNACE,
        DeviceClass::HeatPump => &HEAT_PUMP,
        DeviceClass::Boiler => &BOILER,
    }
}

/// Split a data object name into its base name and instance number.
///
/// `Alm3` becomes `("Alm", 3)`; names without a numeric suffix get instance 1.
pub fn split_instance(name: &str) -> (&str, i32) {
    let base = name.trim_end_matches(|c: char| c.is_ascii_digit());
    if base.is_empty() || base.len() == name.len() {
        return (name, 1);
    }
    match name[base.len()..].parse() {
        Ok(id) => (base, id),
        Err(_) => (name, 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_class_has_a_profile() {
        for class in DeviceClass::ALL {
            let profile = profile(class);
            assert_eq!(profile.class, class);
            assert!(profile.data_object("Beh").is_some());
            assert!(profile.data_object("Health").is_some());
        }
    }

    #[test]
    fn test_lookup() {
        let rtu = profile(DeviceClass::Rtu);
        assert_eq!(rtu.data_object("Alm3").map(|d| d.logical_node), Some("GGIO1"));
        assert!(rtu.data_object("TotW").is_none());
        assert!(rtu.set_point("OutWSet").is_none());

        let pv = profile(DeviceClass::Pv);
        assert_eq!(pv.data_object("TotW").map(|d| d.fc), Some(MX));
        assert_eq!(pv.set_point("OutWSet").map(|d| d.fc), Some(SP));
    }

    #[test]
    fn test_split_instance() {
        assert_eq!(split_instance("Alm3"), ("Alm", 3));
        assert_eq!(split_instance("Tmp12"), ("Tmp", 12));
        assert_eq!(split_instance("TotWh"), ("TotWh", 1));
        assert_eq!(split_instance("FlwTmp1"), ("FlwTmp", 1));
        assert_eq!(split_instance("123"), ("123", 1));
    }
}
