//! Register image of one simulated device.

use std::collections::BTreeMap;

use pasd_domain::catalogue::{AttributeDefinition, register_map};
use pasd_domain::conversion::Conversion;
use pasd_domain::device::{DeviceId, DeviceKind};
use pasd_domain::value::AttributeValue;

/// Sparse holding-register file; unset registers read as zero.
#[derive(Debug, Clone, Default)]
pub(crate) struct RegisterImage {
    words: BTreeMap<u16, u16>,
}

impl RegisterImage {
    /// An image with every catalogue attribute at its power-up value.
    pub(crate) fn seeded(device: DeviceId) -> Self {
        let kind = device.kind();
        let mut image = Self::default();
        for definition in register_map().attributes(kind) {
            let Some(value) = seed(kind, device, definition) else {
                continue;
            };
            match definition.encode(&value) {
                Ok(words) => image.write(definition.address, &words),
                Err(err) => {
                    tracing::warn!(attribute = definition.name, error = %err, "unusable seed value");
                }
            }
        }
        image
    }

    pub(crate) fn read(&self, definition: &AttributeDefinition) -> Vec<u16> {
        (u32::from(definition.address)..definition.end())
            .map(|register| {
                u16::try_from(register)
                    .ok()
                    .and_then(|register| self.words.get(&register).copied())
                    .unwrap_or(0)
            })
            .collect()
    }

    pub(crate) fn write(&mut self, address: u16, words: &[u16]) {
        for (register, word) in (address..).zip(words) {
            self.words.insert(register, *word);
        }
    }

    /// Store `words` for `definition`, replacing only a projection's own bits.
    pub(crate) fn store(&mut self, definition: &AttributeDefinition, words: &[u16]) {
        let Conversion::Port(field) = definition.conversion else {
            self.write(definition.address, words);
            return;
        };
        let mask = field.mask();
        for (register, word) in (definition.address..).zip(words) {
            let slot = self.words.entry(register).or_insert(0);
            *slot = (*slot & !mask) | (word & mask);
        }
    }

    pub(crate) fn get(&self, address: u16) -> u16 {
        self.words.get(&address).copied().unwrap_or(0)
    }
}

fn list(values: &[f64]) -> AttributeValue {
    AttributeValue::from(values.to_vec())
}

/// Power-up value of one attribute; `None` leaves its registers at zero.
fn seed(kind: DeviceKind, device: DeviceId, definition: &AttributeDefinition) -> Option<AttributeValue> {
    let name = definition.name;
    if name.ends_with("_thresholds") && name != "port_current_trip_thresholds" {
        return Some(threshold_seed(definition));
    }
    let value = match (kind, name) {
        (_, "modbus_register_map_revision") => AttributeValue::Int(1),
        (_, "pcb_revision") => AttributeValue::Int(2),
        (_, "cpu_id") => AttributeValue::from("0x204"),
        (_, "chip_id") => AttributeValue::Text(format!("{:032X}", u128::from(device.get()) + 1)),
        (_, "firmware_version") => AttributeValue::Int(258),
        (_, "sys_address") => AttributeValue::Int(i64::from(device.get())),
        (_, "status") => AttributeValue::from("UNINITIALISED"),
        (DeviceKind::Hub, "psu48v_voltages") => list(&[48.0, 48.1]),
        (DeviceKind::Hub, "psu48v_current") => AttributeValue::Float(12.5),
        (DeviceKind::Hub, "psu48v_temperatures") => list(&[41.0, 42.5]),
        (DeviceKind::Hub, "panel_temperature") => AttributeValue::Float(31.2),
        (DeviceKind::Hub, "fncb_temperature") => AttributeValue::Float(29.8),
        (DeviceKind::Hub, "fncb_humidity") => AttributeValue::Int(46),
        (DeviceKind::Hub, "comms_gateway_temperature") => AttributeValue::Float(35.0),
        (DeviceKind::Hub, "power_module_temperature") => AttributeValue::Float(38.4),
        (DeviceKind::Hub, "outside_temperature") => AttributeValue::Float(21.3),
        (DeviceKind::Hub, "internal_ambient_temperature") => AttributeValue::Float(27.5),
        (DeviceKind::Smartbox, "input_voltage") => AttributeValue::Float(47.9),
        (DeviceKind::Smartbox, "power_supply_output_voltage") => AttributeValue::Float(5.1),
        (DeviceKind::Smartbox, "power_supply_temperature") => AttributeValue::Float(42.0),
        (DeviceKind::Smartbox, "pcb_temperature") => AttributeValue::Float(38.5),
        (DeviceKind::Smartbox, "fem_ambient_temperature") => AttributeValue::Float(31.0),
        (DeviceKind::Smartbox, "fem_case_temperatures") => list(&[32.0, 32.5]),
        (DeviceKind::Smartbox, "fem_heatsink_temperatures") => list(&[44.0, 45.5]),
        (DeviceKind::Smartbox, "port_current_trip_thresholds") => AttributeValue::List(vec![
            AttributeValue::Int(496);
            usize::from(kind.port_count())
        ]),
        _ => return None,
    };
    Some(value)
}

fn threshold_seed(definition: &AttributeDefinition) -> AttributeValue {
    let name = definition.name;
    match definition.conversion {
        Conversion::Raw => AttributeValue::from(vec![85_i64, 70, 10, 5]),
        _ if name.contains("voltage") => list(&[52.0, 50.0, 45.0, 40.0]),
        _ if name.contains("current") => list(&[20.0, 18.0, 0.0, 0.0]),
        _ => list(&[85.0, 70.0, 0.0, -5.0]),
    }
}
