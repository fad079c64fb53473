//! DDOP object types (§3 Data Model, §4.5), grounded on the original's
//! `objects.hpp`.

use alloc::string::String;
use alloc::vec::Vec;

pub type ObjectId = u16;
pub type ElementNumber = u16;

/// `0xFFFF` means "no presentation object".
pub const NO_PRESENTATION: ObjectId = 0xFFFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceElementType {
    Device = 1,
    Function = 2,
    Bin = 3,
    Section = 4,
    Unit = 5,
    Connector = 6,
    NavigationReference = 7,
}

impl DeviceElementType {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(DeviceElementType::Device),
            2 => Some(DeviceElementType::Function),
            3 => Some(DeviceElementType::Bin),
            4 => Some(DeviceElementType::Section),
            5 => Some(DeviceElementType::Unit),
            6 => Some(DeviceElementType::Connector),
            7 => Some(DeviceElementType::NavigationReference),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerMethods(pub u8);

impl TriggerMethods {
    pub const TIME_INTERVAL: u8 = 0x01;
    pub const DISTANCE_INTERVAL: u8 = 0x02;
    pub const THRESHOLD_LIMITS: u8 = 0x04;
    pub const ON_CHANGE: u8 = 0x08;
    pub const TOTAL: u8 = 0x10;

    pub fn with(mut self, flag: u8) -> Self {
        self.0 |= flag;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Device {
    pub id: ObjectId,
    pub designator: String,
    pub software_version: String,
    pub serial_number: String,
    pub structure_label: [u8; 7],
    pub localization_label: [u8; 7],
}

impl Device {
    pub fn with_id(mut self, id: ObjectId) -> Self {
        self.id = id;
        self
    }

    pub fn with_designator(mut self, designator: impl Into<String>) -> Self {
        self.designator = designator.into();
        self
    }

    pub fn with_software_version(mut self, version: impl Into<String>) -> Self {
        self.software_version = version.into();
        self
    }

    pub fn with_serial_number(mut self, serial: impl Into<String>) -> Self {
        self.serial_number = serial.into();
        self
    }

    pub fn with_structure_label(mut self, label: [u8; 7]) -> Self {
        self.structure_label = label;
        self
    }

    pub fn with_localization_label(mut self, label: [u8; 7]) -> Self {
        self.localization_label = label;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeviceElement {
    pub id: ObjectId,
    pub kind: DeviceElementType,
    pub designator: String,
    pub number: ElementNumber,
    pub parent: ObjectId,
    pub children: Vec<ObjectId>,
}

impl Default for DeviceElement {
    fn default() -> Self {
        DeviceElement {
            id: 0,
            kind: DeviceElementType::Device,
            designator: String::new(),
            number: 0,
            parent: 0,
            children: Vec::new(),
        }
    }
}

impl DeviceElement {
    pub fn with_id(mut self, id: ObjectId) -> Self {
        self.id = id;
        self
    }

    pub fn with_kind(mut self, kind: DeviceElementType) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_designator(mut self, designator: impl Into<String>) -> Self {
        self.designator = designator.into();
        self
    }

    pub fn with_number(mut self, number: ElementNumber) -> Self {
        self.number = number;
        self
    }

    pub fn with_parent(mut self, parent: ObjectId) -> Self {
        self.parent = parent;
        self
    }

    pub fn with_child(mut self, child: ObjectId) -> Self {
        self.children.push(child);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessData {
    pub id: ObjectId,
    pub ddi: u16,
    pub triggers: u8,
    pub presentation: ObjectId,
    pub designator: String,
}

impl Default for ProcessData {
    fn default() -> Self {
        ProcessData {
            id: 0,
            ddi: 0,
            triggers: 0,
            presentation: NO_PRESENTATION,
            designator: String::new(),
        }
    }
}

impl ProcessData {
    pub fn with_id(mut self, id: ObjectId) -> Self {
        self.id = id;
        self
    }

    pub fn with_ddi(mut self, ddi: u16) -> Self {
        self.ddi = ddi;
        self
    }

    pub fn with_triggers(mut self, triggers: u8) -> Self {
        self.triggers = triggers;
        self
    }

    pub fn with_presentation(mut self, presentation: ObjectId) -> Self {
        self.presentation = presentation;
        self
    }

    pub fn with_designator(mut self, designator: impl Into<String>) -> Self {
        self.designator = designator.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub id: ObjectId,
    pub ddi: u16,
    pub value: i32,
    pub presentation: ObjectId,
    pub designator: String,
}

impl Default for Property {
    fn default() -> Self {
        Property {
            id: 0,
            ddi: 0,
            value: 0,
            presentation: NO_PRESENTATION,
            designator: String::new(),
        }
    }
}

impl Property {
    pub fn with_id(mut self, id: ObjectId) -> Self {
        self.id = id;
        self
    }

    pub fn with_ddi(mut self, ddi: u16) -> Self {
        self.ddi = ddi;
        self
    }

    pub fn with_value(mut self, value: i32) -> Self {
        self.value = value;
        self
    }

    pub fn with_presentation(mut self, presentation: ObjectId) -> Self {
        self.presentation = presentation;
        self
    }

    pub fn with_designator(mut self, designator: impl Into<String>) -> Self {
        self.designator = designator.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValuePresentation {
    pub id: ObjectId,
    pub offset: i32,
    pub scale: f32,
    pub decimals: u8,
    pub unit: String,
}

impl Default for ValuePresentation {
    fn default() -> Self {
        ValuePresentation {
            id: 0,
            offset: 0,
            scale: 1.0,
            decimals: 0,
            unit: String::new(),
        }
    }
}

impl ValuePresentation {
    pub fn with_id(mut self, id: ObjectId) -> Self {
        self.id = id;
        self
    }

    pub fn with_offset(mut self, offset: i32) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_decimals(mut self, decimals: u8) -> Self {
        self.decimals = decimals;
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }
}
