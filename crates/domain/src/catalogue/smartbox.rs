//! Smartbox register map.

use super::AttributeDefinition;
use super::info::{self, CELSIUS, VOLTS};
use crate::conversion::{Conversion, SMARTBOX_FLAGS};
use crate::device::DeviceKind;
use crate::port_status::PortField;

const KIND: DeviceKind = DeviceKind::Smartbox;
const PORT_BASE: u16 = 35;
const CURRENT_BASE: u16 = 47;
const THRESHOLD_BASE: u16 = 1000;
const CURRENT_TRIP_BASE: u16 = 1040;

pub(super) fn definitions() -> Vec<AttributeDefinition> {
    let ports = KIND.port_count();
    let mut definitions = info::definitions(KIND);
    definitions.extend([
        AttributeDefinition::new(KIND, "input_voltage", 16, VOLTS),
        AttributeDefinition::new(KIND, "power_supply_output_voltage", 17, VOLTS),
        AttributeDefinition::new(KIND, "power_supply_temperature", 18, CELSIUS),
        AttributeDefinition::new(KIND, "pcb_temperature", 19, CELSIUS),
        AttributeDefinition::new(KIND, "fem_ambient_temperature", 20, CELSIUS),
        AttributeDefinition::new(KIND, "status", 21, Conversion::Status),
        AttributeDefinition::new(KIND, "led_pattern", 22, Conversion::LedPattern).writable(),
        AttributeDefinition::new(KIND, "fem_case_temperatures", 23, CELSIUS).array(2),
        AttributeDefinition::new(KIND, "fem_heatsink_temperatures", 25, CELSIUS).array(2),
        // Milliamps.
        AttributeDefinition::new(KIND, "ports_current_draw", CURRENT_BASE, Conversion::Raw)
            .array(ports),
        AttributeDefinition::new(KIND, "port_current_trip_thresholds", CURRENT_TRIP_BASE, Conversion::Raw)
            .array(ports)
            .writable(),
        AttributeDefinition::new(KIND, "warning_flags", 10128, Conversion::Flags(&SMARTBOX_FLAGS)),
        AttributeDefinition::new(KIND, "alarm_flags", 10129, Conversion::Flags(&SMARTBOX_FLAGS)),
    ]);
    // Bit 7 reports a tripped breaker here, and bit 6 is the sensed power.
    definitions.extend(info::port_fields(
        KIND,
        PORT_BASE,
        ports,
        &[
            ("port_breakers_tripped", PortField::PowerSensed),
            ("ports_power_sensed", PortField::LocalPower),
            ("port_forcings", PortField::Forcing),
            ("ports_desired_power_when_online", PortField::DesiredOnline),
            ("ports_desired_power_when_offline", PortField::DesiredOffline),
        ],
    ));
    definitions.extend(info::thresholds(
        KIND,
        THRESHOLD_BASE,
        &[
            ("input_voltage_thresholds", VOLTS),
            ("power_supply_output_voltage_thresholds", VOLTS),
            ("power_supply_temperature_thresholds", CELSIUS),
            ("pcb_temperature_thresholds", CELSIUS),
            ("fem_ambient_temperature_thresholds", CELSIUS),
            ("fem_case_temperature_1_thresholds", CELSIUS),
            ("fem_case_temperature_2_thresholds", CELSIUS),
            ("fem_heatsink_temperature_1_thresholds", CELSIUS),
            ("fem_heatsink_temperature_2_thresholds", CELSIUS),
        ],
    ));
    definitions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_keep_thresholds_clear_of_current_trip_block() {
        let definitions = definitions();
        let thresholds_end = definitions
            .iter()
            .filter(|d| d.name.ends_with("_thresholds") && d.address < CURRENT_TRIP_BASE)
            .map(AttributeDefinition::end)
            .max()
            .unwrap();
        assert!(thresholds_end <= u32::from(CURRENT_TRIP_BASE));
    }

    #[test]
    fn should_place_currents_after_port_words() {
        let definitions = definitions();
        let currents = definitions
            .iter()
            .find(|d| d.name == "ports_current_draw")
            .unwrap();
        assert_eq!(u32::from(currents.address), u32::from(PORT_BASE) + 12);
        assert_eq!(currents.end(), 59);
    }
}
