//! Device Descriptor Object Pool: builder, binary codec, ISOXML export
//! (§4.5), grounded on the original's `ddop.hpp`.

use alloc::string::String;
use alloc::vec::Vec;

use crate::error::{IsobusError, PoolValidationError, Result};

use super::objects::{Device, DeviceElement, DeviceElementType, ObjectId, ProcessData, Property, ValuePresentation, NO_PRESENTATION};

const TYPE_DEVICE: u8 = 0;
const TYPE_ELEMENT: u8 = 1;
const TYPE_PROCESS_DATA: u8 = 2;
const TYPE_PROPERTY: u8 = 3;
const TYPE_PRESENTATION: u8 = 4;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ddop {
    devices: Vec<Device>,
    elements: Vec<DeviceElement>,
    process_data: Vec<ProcessData>,
    properties: Vec<Property>,
    presentations: Vec<ValuePresentation>,
    next_id: ObjectId,
}

impl Ddop {
    pub fn new() -> Self {
        Ddop::default()
    }

    fn next_id(&mut self) -> ObjectId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn add_device(&mut self, mut device: Device) -> ObjectId {
        if device.id == 0 {
            device.id = self.next_id();
        }
        let id = device.id;
        self.devices.push(device);
        id
    }

    pub fn add_element(&mut self, mut element: DeviceElement) -> ObjectId {
        if element.id == 0 {
            element.id = self.next_id();
        }
        let id = element.id;
        self.elements.push(element);
        id
    }

    pub fn add_process_data(&mut self, mut pd: ProcessData) -> ObjectId {
        if pd.id == 0 {
            pd.id = self.next_id();
        }
        let id = pd.id;
        self.process_data.push(pd);
        id
    }

    pub fn add_property(&mut self, mut prop: Property) -> ObjectId {
        if prop.id == 0 {
            prop.id = self.next_id();
        }
        let id = prop.id;
        self.properties.push(prop);
        id
    }

    pub fn add_presentation(&mut self, mut vp: ValuePresentation) -> ObjectId {
        if vp.id == 0 {
            vp.id = self.next_id();
        }
        let id = vp.id;
        self.presentations.push(vp);
        id
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    pub fn elements(&self) -> &[DeviceElement] {
        &self.elements
    }

    pub fn process_data(&self) -> &[ProcessData] {
        &self.process_data
    }

    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    pub fn presentations(&self) -> &[ValuePresentation] {
        &self.presentations
    }

    pub fn object_count(&self) -> usize {
        self.devices.len() + self.elements.len() + self.process_data.len() + self.properties.len() + self.presentations.len()
    }

    fn object_exists(&self, id: ObjectId) -> bool {
        self.devices.iter().any(|d| d.id == id)
            || self.elements.iter().any(|e| e.id == id)
            || self.process_data.iter().any(|p| p.id == id)
            || self.properties.iter().any(|p| p.id == id)
    }

    fn presentation_exists(&self, id: ObjectId) -> bool {
        self.presentations.iter().any(|p| p.id == id)
    }

    pub fn validate(&self) -> core::result::Result<(), PoolValidationError> {
        if self.devices.is_empty() {
            return Err(PoolValidationError::NoDevice);
        }
        if self.elements.is_empty() {
            return Err(PoolValidationError::NoElement);
        }
        for elem in &self.elements {
            if elem.parent != 0 && !self.object_exists(elem.parent) {
                return Err(PoolValidationError::DanglingParent);
            }
            for &child in &elem.children {
                if !self.object_exists(child) {
                    return Err(PoolValidationError::DanglingChild);
                }
            }
        }
        for pd in &self.process_data {
            if pd.presentation != NO_PRESENTATION && pd.presentation != 0 && !self.presentation_exists(pd.presentation) {
                return Err(PoolValidationError::DanglingPresentation);
            }
        }
        for prop in &self.properties {
            if prop.presentation != NO_PRESENTATION && prop.presentation != 0 && !self.presentation_exists(prop.presentation) {
                return Err(PoolValidationError::DanglingPresentation);
            }
        }
        Ok(())
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for d in &self.devices {
            out.push(TYPE_DEVICE);
            out.extend_from_slice(&d.id.to_le_bytes());
            push_string(&mut out, &d.designator);
            push_string(&mut out, &d.software_version);
            push_string(&mut out, &d.serial_number);
            out.extend_from_slice(&d.structure_label);
            out.extend_from_slice(&d.localization_label);
        }
        for e in &self.elements {
            out.push(TYPE_ELEMENT);
            out.extend_from_slice(&e.id.to_le_bytes());
            out.push(e.kind.code());
            push_string(&mut out, &e.designator);
            out.extend_from_slice(&e.number.to_le_bytes());
            out.extend_from_slice(&e.parent.to_le_bytes());
            out.extend_from_slice(&(e.children.len() as u16).to_le_bytes());
            for &child in &e.children {
                out.extend_from_slice(&child.to_le_bytes());
            }
        }
        for pd in &self.process_data {
            out.push(TYPE_PROCESS_DATA);
            out.extend_from_slice(&pd.id.to_le_bytes());
            out.extend_from_slice(&pd.ddi.to_le_bytes());
            out.push(pd.triggers);
            out.extend_from_slice(&pd.presentation.to_le_bytes());
            push_string(&mut out, &pd.designator);
        }
        for prop in &self.properties {
            out.push(TYPE_PROPERTY);
            out.extend_from_slice(&prop.id.to_le_bytes());
            out.extend_from_slice(&prop.ddi.to_le_bytes());
            out.extend_from_slice(&prop.value.to_le_bytes());
            out.extend_from_slice(&prop.presentation.to_le_bytes());
            push_string(&mut out, &prop.designator);
        }
        for vp in &self.presentations {
            out.push(TYPE_PRESENTATION);
            out.extend_from_slice(&vp.id.to_le_bytes());
            out.extend_from_slice(&vp.offset.to_le_bytes());
            out.extend_from_slice(&vp.scale.to_le_bytes());
            out.push(vp.decimals);
            push_string(&mut out, &vp.unit);
        }
        out
    }

    pub fn deserialize(data: &[u8]) -> Result<Ddop> {
        let mut pool = Ddop::new();
        let mut offset = 0usize;
        while offset < data.len() {
            if offset + 3 > data.len() {
                return Err(truncated());
            }
            let record_type = data[offset];
            let id = u16::from_le_bytes([data[offset + 1], data[offset + 2]]);
            offset += 3;
            match record_type {
                TYPE_DEVICE => {
                    let designator = read_string(data, &mut offset)?;
                    let software_version = read_string(data, &mut offset)?;
                    let serial_number = read_string(data, &mut offset)?;
                    let structure_label = read_array7(data, &mut offset)?;
                    let localization_label = read_array7(data, &mut offset)?;
                    pool.devices.push(Device {
                        id,
                        designator,
                        software_version,
                        serial_number,
                        structure_label,
                        localization_label,
                    });
                }
                TYPE_ELEMENT => {
                    let kind_code = read_u8(data, &mut offset)?;
                    let kind = DeviceElementType::from_code(kind_code).ok_or_else(truncated)?;
                    let designator = read_string(data, &mut offset)?;
                    let number = read_u16(data, &mut offset)?;
                    let parent = read_u16(data, &mut offset)?;
                    let num_children = read_u16(data, &mut offset)?;
                    let mut children = Vec::with_capacity(num_children as usize);
                    for _ in 0..num_children {
                        children.push(read_u16(data, &mut offset)?);
                    }
                    pool.elements.push(DeviceElement { id, kind, designator, number, parent, children });
                }
                TYPE_PROCESS_DATA => {
                    let ddi = read_u16(data, &mut offset)?;
                    let triggers = read_u8(data, &mut offset)?;
                    let presentation = read_u16(data, &mut offset)?;
                    let designator = read_string(data, &mut offset)?;
                    pool.process_data.push(ProcessData { id, ddi, triggers, presentation, designator });
                }
                TYPE_PROPERTY => {
                    let ddi = read_u16(data, &mut offset)?;
                    let value = read_i32(data, &mut offset)?;
                    let presentation = read_u16(data, &mut offset)?;
                    let designator = read_string(data, &mut offset)?;
                    pool.properties.push(Property { id, ddi, value, presentation, designator });
                }
                TYPE_PRESENTATION => {
                    let presentation_offset = read_i32(data, &mut offset)?;
                    let scale_bits = read_u32(data, &mut offset)?;
                    let scale = f32::from_bits(scale_bits);
                    let decimals = read_u8(data, &mut offset)?;
                    let unit = read_string(data, &mut offset)?;
                    pool.presentations.push(ValuePresentation { id, offset: presentation_offset, scale, decimals, unit });
                }
                _ => return Err(IsobusError::PoolValidation(PoolValidationError::UnknownRecord)),
            }
            if id >= pool.next_id {
                pool.next_id = id + 1;
            }
        }
        Ok(pool)
    }

    /// ISO 11783-10 TASKDATA.xml fragment: DVC -> DET -> DPD/DPT subtree, DVP standalone.
    pub fn to_isoxml(&self) -> String {
        let mut xml = String::new();
        xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        xml.push_str("<ISO11783_TaskData VersionMajor=\"4\" VersionMinor=\"0\" DataTransferOrigin=\"1\">\n");

        for dev in &self.devices {
            xml.push_str("  <DVC A=\"DVC-");
            push_num(&mut xml, dev.id as u32);
            xml.push_str("\" B=\"");
            xml_escape_into(&mut xml, &dev.designator);
            xml.push_str("\" C=\"");
            xml_escape_into(&mut xml, &dev.software_version);
            xml.push_str("\" D=\"");
            xml_escape_into(&mut xml, &dev.serial_number);
            xml.push_str("\">\n");
            for elem in &self.elements {
                self.emit_element_xml(&mut xml, elem);
            }
            xml.push_str("  </DVC>\n");
        }

        for vp in &self.presentations {
            xml.push_str("  <DVP A=\"DVP-");
            push_num(&mut xml, vp.id as u32);
            xml.push_str("\" B=\"");
            push_signed(&mut xml, vp.offset);
            xml.push_str("\" C=\"");
            push_float(&mut xml, vp.scale);
            xml.push_str("\" D=\"");
            push_num(&mut xml, vp.decimals as u32);
            xml.push_str("\" E=\"");
            xml_escape_into(&mut xml, &vp.unit);
            xml.push_str("\"/>\n");
        }

        xml.push_str("</ISO11783_TaskData>\n");
        xml
    }

    fn emit_element_xml(&self, xml: &mut String, elem: &DeviceElement) {
        xml.push_str("    <DET A=\"DET-");
        push_num(xml, elem.id as u32);
        xml.push_str("\" B=\"");
        push_num(xml, elem.kind.code() as u32);
        xml.push_str("\" C=\"");
        xml_escape_into(xml, &elem.designator);
        xml.push_str("\" D=\"");
        push_num(xml, elem.number as u32);
        xml.push_str("\" E=\"DET-");
        push_num(xml, elem.parent as u32);
        xml.push_str("\">\n");

        for &child in &elem.children {
            if let Some(pd) = self.process_data.iter().find(|p| p.id == child) {
                xml.push_str("      <DPD A=\"DPD-");
                push_num(xml, pd.id as u32);
                xml.push_str("\" B=\"");
                push_num(xml, pd.ddi as u32);
                xml.push_str("\" C=\"");
                push_num(xml, pd.triggers as u32);
                xml.push_str("\" D=\"");
                xml_escape_into(xml, &pd.designator);
                xml.push('"');
                if pd.presentation != NO_PRESENTATION {
                    xml.push_str(" E=\"DVP-");
                    push_num(xml, pd.presentation as u32);
                    xml.push('"');
                }
                xml.push_str("/>\n");
            }
            if let Some(prop) = self.properties.iter().find(|p| p.id == child) {
                xml.push_str("      <DPT A=\"DPT-");
                push_num(xml, prop.id as u32);
                xml.push_str("\" B=\"");
                push_num(xml, prop.ddi as u32);
                xml.push_str("\" C=\"");
                push_signed(xml, prop.value);
                xml.push_str("\" D=\"");
                xml_escape_into(xml, &prop.designator);
                xml.push('"');
                if prop.presentation != NO_PRESENTATION {
                    xml.push_str(" E=\"DVP-");
                    push_num(xml, prop.presentation as u32);
                    xml.push('"');
                }
                xml.push_str("/>\n");
            }
        }

        xml.push_str("    </DET>\n");
    }
}

fn truncated() -> IsobusError {
    IsobusError::PoolValidation(PoolValidationError::UnknownRecord)
}

fn push_string(out: &mut Vec<u8>, s: &str) {
    out.push(s.len() as u8);
    out.extend_from_slice(s.as_bytes());
}

fn read_u8(data: &[u8], offset: &mut usize) -> Result<u8> {
    if *offset >= data.len() {
        return Err(truncated());
    }
    let v = data[*offset];
    *offset += 1;
    Ok(v)
}

fn read_u16(data: &[u8], offset: &mut usize) -> Result<u16> {
    if *offset + 2 > data.len() {
        return Err(truncated());
    }
    let v = u16::from_le_bytes([data[*offset], data[*offset + 1]]);
    *offset += 2;
    Ok(v)
}

fn read_u32(data: &[u8], offset: &mut usize) -> Result<u32> {
    if *offset + 4 > data.len() {
        return Err(truncated());
    }
    let v = u32::from_le_bytes([data[*offset], data[*offset + 1], data[*offset + 2], data[*offset + 3]]);
    *offset += 4;
    Ok(v)
}

fn read_i32(data: &[u8], offset: &mut usize) -> Result<i32> {
    read_u32(data, offset).map(|v| v as i32)
}

fn read_array7(data: &[u8], offset: &mut usize) -> Result<[u8; 7]> {
    if *offset + 7 > data.len() {
        return Err(truncated());
    }
    let mut buf = [0u8; 7];
    buf.copy_from_slice(&data[*offset..*offset + 7]);
    *offset += 7;
    Ok(buf)
}

fn read_string(data: &[u8], offset: &mut usize) -> Result<String> {
    let len = read_u8(data, offset)? as usize;
    if *offset + len > data.len() {
        return Err(truncated());
    }
    let s = core::str::from_utf8(&data[*offset..*offset + len]).map_err(|_| truncated())?;
    *offset += len;
    Ok(String::from(s))
}

fn xml_escape_into(out: &mut String, s: &str) {
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
}

fn push_num(out: &mut String, mut v: u32) {
    if v == 0 {
        out.push('0');
        return;
    }
    let mut digits = Vec::new();
    while v > 0 {
        digits.push(b'0' + (v % 10) as u8);
        v /= 10;
    }
    digits.reverse();
    out.push_str(core::str::from_utf8(&digits).unwrap());
}

fn push_signed(out: &mut String, v: i32) {
    if v < 0 {
        out.push('-');
        push_num(out, (-(v as i64)) as u32);
    } else {
        push_num(out, v as u32);
    }
}

fn push_float(out: &mut String, v: f32) {
    let scaled_f = v * 1000.0;
    let scaled = (scaled_f + if scaled_f >= 0.0 { 0.5 } else { -0.5 }) as i64;
    let whole = scaled / 1000;
    let frac = (scaled % 1000).unsigned_abs();
    if scaled < 0 && whole == 0 {
        out.push('-');
    }
    push_signed(out, whole as i32);
    out.push('.');
    let frac_str = alloc::format!("{:03}", frac);
    out.push_str(&frac_str);
}
