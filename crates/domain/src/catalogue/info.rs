//! Information block shared by the hub and smartboxes (registers 0..=15).

use super::AttributeDefinition;
use crate::conversion::{CENTI, Conversion};
use crate::device::DeviceKind;
use crate::port_status::PortField;

pub(super) const VOLTS: Conversion = Conversion::Scaled { divisor: CENTI };
pub(super) const AMPS: Conversion = Conversion::Scaled { divisor: CENTI };
pub(super) const CELSIUS: Conversion = Conversion::SignedScaled { divisor: CENTI };

/// Alarm and warning thresholds: high alarm, high warning, low warning, low alarm.
pub(super) const THRESHOLD_ELEMENTS: u16 = 4;

pub(super) fn definitions(kind: DeviceKind) -> Vec<AttributeDefinition> {
    vec![
        AttributeDefinition::new(kind, "modbus_register_map_revision", 0, Conversion::Raw),
        AttributeDefinition::new(kind, "pcb_revision", 1, Conversion::Raw),
        AttributeDefinition::new(kind, "cpu_id", 2, Conversion::CpuId),
        AttributeDefinition::new(kind, "chip_id", 4, Conversion::ChipId),
        AttributeDefinition::new(kind, "firmware_version", 12, Conversion::Raw),
        AttributeDefinition::new(kind, "uptime", 13, Conversion::Uptime),
        AttributeDefinition::new(kind, "sys_address", 15, Conversion::Raw),
    ]
}

/// Writable threshold blocks, one per sensor, packed from `base`.
pub(super) fn thresholds(
    kind: DeviceKind,
    base: u16,
    sensors: &[(&'static str, Conversion)],
) -> Vec<AttributeDefinition> {
    (0..)
        .step_by(usize::from(THRESHOLD_ELEMENTS))
        .zip(sensors)
        .map(|(offset, (name, conversion))| {
            AttributeDefinition::new(kind, *name, base + offset, *conversion)
                .array(THRESHOLD_ELEMENTS)
                .writable()
        })
        .collect()
}

/// Field projections of the port-status words, all sharing one range.
pub(super) fn port_fields(
    kind: DeviceKind,
    base: u16,
    ports: u16,
    fields: &[(&'static str, PortField)],
) -> Vec<AttributeDefinition> {
    fields
        .iter()
        .map(|(name, field)| {
            let definition =
                AttributeDefinition::new(kind, *name, base, Conversion::Port(*field)).array(ports);
            match field {
                PortField::DesiredOnline | PortField::DesiredOffline => definition.writable(),
                PortField::PowerSensed | PortField::LocalPower | PortField::Forcing => definition,
            }
        })
        .collect()
}
