//! FNDH register map.

use super::AttributeDefinition;
use super::info::{self, AMPS, CELSIUS, VOLTS};
use crate::conversion::{Conversion, HUB_FLAGS};
use crate::device::DeviceKind;
use crate::port_status::PortField;

const KIND: DeviceKind = DeviceKind::Hub;
const PORT_BASE: u16 = 36;
const THRESHOLD_BASE: u16 = 1000;

pub(super) fn definitions() -> Vec<AttributeDefinition> {
    let mut definitions = info::definitions(KIND);
    definitions.extend([
        AttributeDefinition::new(KIND, "psu48v_voltages", 16, VOLTS).array(2),
        AttributeDefinition::new(KIND, "psu48v_current", 18, AMPS),
        AttributeDefinition::new(KIND, "psu48v_temperatures", 19, CELSIUS).array(2),
        AttributeDefinition::new(KIND, "panel_temperature", 21, CELSIUS),
        AttributeDefinition::new(KIND, "fncb_temperature", 22, CELSIUS),
        AttributeDefinition::new(KIND, "fncb_humidity", 23, Conversion::Raw),
        AttributeDefinition::new(KIND, "status", 24, Conversion::Status),
        AttributeDefinition::new(KIND, "led_pattern", 25, Conversion::LedPattern).writable(),
        AttributeDefinition::new(KIND, "comms_gateway_temperature", 26, CELSIUS),
        AttributeDefinition::new(KIND, "power_module_temperature", 27, CELSIUS),
        AttributeDefinition::new(KIND, "outside_temperature", 28, CELSIUS),
        AttributeDefinition::new(KIND, "internal_ambient_temperature", 29, CELSIUS),
        AttributeDefinition::new(KIND, "warning_flags", 10128, Conversion::Flags(&HUB_FLAGS)),
        AttributeDefinition::new(KIND, "alarm_flags", 10129, Conversion::Flags(&HUB_FLAGS)),
    ]);
    definitions.extend(info::port_fields(
        KIND,
        PORT_BASE,
        KIND.port_count(),
        &[
            ("ports_power_sensed", PortField::PowerSensed),
            ("ports_power_control", PortField::LocalPower),
            ("port_forcings", PortField::Forcing),
            ("ports_desired_power_when_online", PortField::DesiredOnline),
            ("ports_desired_power_when_offline", PortField::DesiredOffline),
        ],
    ));
    // Same order as the flag bits.
    definitions.extend(info::thresholds(
        KIND,
        THRESHOLD_BASE,
        &[
            ("psu48v1_voltage_thresholds", VOLTS),
            ("psu48v2_voltage_thresholds", VOLTS),
            ("psu48v_current_thresholds", AMPS),
            ("psu48v1_temperature_thresholds", CELSIUS),
            ("psu48v2_temperature_thresholds", CELSIUS),
            ("panel_temperature_thresholds", CELSIUS),
            ("fncb_temperature_thresholds", CELSIUS),
            ("fncb_humidity_thresholds", Conversion::Raw),
            ("comms_gateway_temperature_thresholds", CELSIUS),
            ("power_module_temperature_thresholds", CELSIUS),
            ("outside_temperature_thresholds", CELSIUS),
            ("internal_ambient_temperature_thresholds", CELSIUS),
        ],
    ));
    definitions
}
