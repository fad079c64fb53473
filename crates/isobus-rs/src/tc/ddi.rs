//! A representative slice of the ISO 11783-11 Data Dictionary. The full
//! database carries several hundred entries; this keeps the DDIs exercised by
//! DDOP construction and the test scenarios plus their surrounding family.

pub type Ddi = u16;

pub const SETPOINT_VOLUME_PER_AREA_APPLICATION_RATE: Ddi = 1;
pub const ACTUAL_VOLUME_PER_AREA_APPLICATION_RATE: Ddi = 2;
pub const DEFAULT_VOLUME_PER_AREA_APPLICATION_RATE: Ddi = 3;
pub const MINIMUM_VOLUME_PER_AREA_APPLICATION_RATE: Ddi = 4;
pub const MAXIMUM_VOLUME_PER_AREA_APPLICATION_RATE: Ddi = 5;
pub const SETPOINT_MASS_PER_AREA_APPLICATION_RATE: Ddi = 6;
pub const ACTUAL_MASS_PER_AREA_APPLICATION_RATE: Ddi = 7;
pub const SETPOINT_COUNT_PER_AREA_APPLICATION_RATE: Ddi = 11;
pub const ACTUAL_COUNT_PER_AREA_APPLICATION_RATE: Ddi = 12;
pub const SETPOINT_VOLUME_PER_TIME_APPLICATION_RATE: Ddi = 36;
pub const ACTUAL_VOLUME_PER_TIME_APPLICATION_RATE: Ddi = 37;
pub const SETPOINT_WORKING_WIDTH: Ddi = 66;
pub const ACTUAL_WORKING_WIDTH: Ddi = 67;
pub const ACTUAL_WORKING_STATE: Ddi = 141;
pub const SETPOINT_WORKING_STATE: Ddi = 142;
pub const ACTUAL_LIFETIME_APPLICATION_AREA_TOTAL: Ddi = 112;
pub const ACTUAL_LIFETIME_VOLUME_APPLICATION_TOTAL: Ddi = 113;
pub const ACTUAL_AREA_TOTAL: Ddi = 116;
pub const ACTUAL_AREA_PER_HOUR_TOTAL: Ddi = 117;
pub const LIFETIME_APPLICATION_DISTANCE_TOTAL: Ddi = 114;
pub const ACTUAL_DISTANCE_TOTAL: Ddi = 136;
pub const GROUND_BASED_SPEED: Ddi = 146;
pub const WHEEL_BASED_SPEED: Ddi = 147;
pub const ACTUAL_TANK_VOLUME: Ddi = 176;
pub const ACTUAL_TANK_MASS: Ddi = 177;
pub const MAXIMUM_TANK_VOLUME: Ddi = 181;
pub const MAXIMUM_TANK_MASS: Ddi = 182;
pub const PRESCRIPTION_CONTROL_STATE: Ddi = 118;
pub const CONNECTOR_TYPE: Ddi = 134;
pub const DEVICE_ELEMENT_OFFSET_X: Ddi = 86;
pub const DEVICE_ELEMENT_OFFSET_Y: Ddi = 87;
pub const DEVICE_ELEMENT_OFFSET_Z: Ddi = 88;
pub const SECTION_CONDENSED_WORKING_STATE_1_16: Ddi = 287;
pub const SECTION_CONDENSED_WORKING_STATE_17_32: Ddi = 288;
pub const ACTUAL_NUMBER_OF_SUB_UNITS: Ddi = 115;
pub const RELATIVE_HUMIDITY: Ddi = 299;
pub const AMBIENT_TEMPERATURE: Ddi = 33;

/// Static metadata for the DDIs named above. Not every constant here has a
/// matching entry; only those used by the shipped DDOP examples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DdiInfo {
    pub ddi: Ddi,
    pub name: &'static str,
    pub unit: &'static str,
    pub resolution: f64,
}

macro_rules! ddi_table {
    ($(($ddi:expr, $name:expr, $unit:expr, $res:expr)),* $(,)?) => {
        pub static DDI_TABLE: &[DdiInfo] = &[
            $(DdiInfo { ddi: $ddi, name: $name, unit: $unit, resolution: $res }),*
        ];
    };
}

ddi_table![
    (SETPOINT_VOLUME_PER_AREA_APPLICATION_RATE, "Setpoint Volume Per Area Application Rate", "mL/m2", 0.01),
    (ACTUAL_VOLUME_PER_AREA_APPLICATION_RATE, "Actual Volume Per Area Application Rate", "mL/m2", 0.01),
    (SETPOINT_WORKING_WIDTH, "Setpoint Working Width", "mm", 1.0),
    (ACTUAL_WORKING_WIDTH, "Actual Working Width", "mm", 1.0),
    (ACTUAL_WORKING_STATE, "Actual Working State", "", 1.0),
    (SETPOINT_WORKING_STATE, "Setpoint Working State", "", 1.0),
    (ACTUAL_AREA_TOTAL, "Actual Area Total", "m2", 1.0),
    (GROUND_BASED_SPEED, "Ground Based Speed", "mm/s", 1.0),
    (ACTUAL_TANK_VOLUME, "Actual Tank Volume", "mL", 1.0),
    (MAXIMUM_TANK_VOLUME, "Maximum Tank Volume", "mL", 1.0),
    (SECTION_CONDENSED_WORKING_STATE_1_16, "Section Condensed Working State 1-16", "", 1.0),
];

pub fn lookup(ddi: Ddi) -> Option<DdiInfo> {
    DDI_TABLE.iter().find(|d| d.ddi == ddi).copied()
}
