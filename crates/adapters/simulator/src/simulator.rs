//! The simulated hub and smartboxes.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use pasd_app::ports::Backend;
use pasd_domain::catalogue::register_map;
use pasd_domain::command::Command;
use pasd_domain::conversion::DeviceStatus;
use pasd_domain::device::{DeviceId, DeviceKind, Topology};
use pasd_domain::error::{AddressingError, ConversionError, PasdError};
use pasd_domain::port_status::{DesiredPower, PortStatus};
use pasd_domain::value::AttributeValue;

use crate::registers::RegisterImage;

const UPTIME: &str = "uptime";

/// In-memory backend for every device of a [`Topology`].
pub struct Simulator {
    topology: Topology,
    started: Instant,
    devices: Mutex<HashMap<DeviceId, RegisterImage>>,
}

impl Simulator {
    /// Power up every device of `topology`.
    #[must_use]
    pub fn new(topology: Topology) -> Self {
        let devices = topology
            .devices()
            .map(|device| (device, RegisterImage::seeded(device)))
            .collect();
        tracing::info!(smartboxes = topology.smartbox_count(), "simulator powered up");
        Self {
            topology,
            started: Instant::now(),
            devices: Mutex::new(devices),
        }
    }

    fn lock_devices(&self) -> MutexGuard<'_, HashMap<DeviceId, RegisterImage>> {
        self.devices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn with_device<T>(
        &self,
        device: DeviceId,
        f: impl FnOnce(DeviceKind, &mut RegisterImage) -> Result<T, PasdError>,
    ) -> Result<T, PasdError> {
        let kind = self.topology.resolve(device)?;
        let mut devices = self.lock_devices();
        let image = devices
            .get_mut(&device)
            .ok_or(AddressingError::UnknownDevice(device))?;
        f(kind, image)
    }

    /// Overwrite any attribute, writable or not.
    ///
    /// Used to stage device conditions (a tripped breaker, an alarm) that
    /// only the hardware could produce.
    ///
    /// # Errors
    ///
    /// Returns [`PasdError::Addressing`] for an unconfigured device,
    /// [`PasdError::UnknownAttribute`] for an unknown name, or
    /// [`PasdError::Conversion`] when `value` does not encode.
    pub fn set(&self, device: DeviceId, name: &str, value: &AttributeValue) -> Result<(), PasdError> {
        self.with_device(device, |kind, image| {
            let definition = register_map().resolve(kind, name)?;
            let words = definition.reencode(value)?;
            image.store(definition, &words);
            Ok(())
        })
    }

    fn uptime(&self) -> AttributeValue {
        AttributeValue::Int(i64::try_from(self.started.elapsed().as_secs()).unwrap_or(i64::MAX))
    }

    fn apply(kind: DeviceKind, image: &mut RegisterImage, command: Command) -> Result<(), PasdError> {
        let write = command.register_write(kind)?;
        let address = write.address;
        let requested = write.words.first().copied().unwrap_or_default();
        match command {
            Command::Initialize => image.write(address, &[DeviceStatus::Ok.code()]),
            Command::TurnPortOn { .. } | Command::TurnPortOff { .. } => {
                let request = PortStatus::decode(requested).map_err(ConversionError::from)?;
                let mut status = PortStatus::decode(image.get(address)).map_err(ConversionError::from)?;
                status.desired_online = request.desired_online;
                status.desired_offline = request.desired_offline;
                let powered = status.desired_online == DesiredPower::On;
                // The hub senses power on bit 7, a smartbox on bit 6.
                match kind {
                    DeviceKind::Hub => status.power_sensed = powered,
                    DeviceKind::Smartbox => status.local_power = powered,
                }
                image.write(address, &[status.encode()]);
            }
            Command::ResetPortBreaker { .. } => {
                let mut status = PortStatus::decode(image.get(address)).map_err(ConversionError::from)?;
                status.power_sensed = false;
                image.write(address, &[status.encode()]);
            }
            Command::SetLedPattern { .. } => {
                let word = (image.get(address) & 0x00FF) | requested;
                image.write(address, &[word]);
            }
        }
        Ok(())
    }
}

impl Backend for Simulator {
    async fn read_attribute(
        &self,
        device: DeviceId,
        name: &str,
    ) -> Result<AttributeValue, PasdError> {
        let value = self.with_device(device, |kind, image| {
            let definition = register_map().resolve(kind, name)?;
            if definition.name == UPTIME {
                return Ok(self.uptime());
            }
            Ok(definition.decode(&image.read(definition))?)
        })?;
        tracing::debug!(%device, attribute = name, %value, "read");
        Ok(value)
    }

    async fn write_attribute(
        &self,
        device: DeviceId,
        name: &str,
        value: AttributeValue,
    ) -> Result<(), PasdError> {
        self.with_device(device, |kind, image| {
            let definition = register_map().resolve_writable(kind, name)?;
            let words = definition.reencode(&value)?;
            image.store(definition, &words);
            Ok(())
        })?;
        tracing::debug!(%device, attribute = name, %value, "written");
        Ok(())
    }

    async fn execute(
        &self,
        device: DeviceId,
        name: &str,
        arguments: Vec<AttributeValue>,
    ) -> Result<AttributeValue, PasdError> {
        self.with_device(device, |kind, image| {
            let command = Command::parse(kind, name, &arguments)?;
            Self::apply(kind, image, command)
        })?;
        tracing::info!(%device, command = name, "executed");
        Ok(AttributeValue::Bool(true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pasd_domain::error::ErrorCode;

    fn simulator() -> Simulator {
        Simulator::new(Topology::new(2))
    }

    fn port_list(value: &AttributeValue, port: usize) -> AttributeValue {
        value.as_list().unwrap()[port - 1].clone()
    }

    #[tokio::test]
    async fn should_report_uninitialised_until_initialized() {
        let sim = simulator();
        let status = sim.read_attribute(DeviceId::new(1), "status").await.unwrap();
        assert_eq!(status, AttributeValue::from("UNINITIALISED"));

        sim.execute(DeviceId::new(1), "initialize", vec![]).await.unwrap();
        let status = sim.read_attribute(DeviceId::new(1), "status").await.unwrap();
        assert_eq!(status, AttributeValue::from("OK"));
    }

    #[tokio::test]
    async fn should_seed_engineering_values() {
        let sim = simulator();
        let voltages = sim
            .read_attribute(DeviceId::HUB, "psu48v_voltages")
            .await
            .unwrap();
        assert_eq!(voltages, AttributeValue::from(vec![48.0, 48.1]));
    }

    #[tokio::test]
    async fn should_reject_unconfigured_smartbox() {
        let sim = simulator();
        let err = sim
            .read_attribute(DeviceId::new(3), "status")
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Addressing);
    }

    #[tokio::test]
    async fn should_turn_hub_port_on_and_off() {
        let sim = simulator();
        sim.execute(DeviceId::HUB, "turn_port_on", vec![AttributeValue::Int(4)])
            .await
            .unwrap();
        let sensed = sim
            .read_attribute(DeviceId::HUB, "ports_power_sensed")
            .await
            .unwrap();
        assert_eq!(port_list(&sensed, 4), AttributeValue::Bool(true));
        assert_eq!(port_list(&sensed, 3), AttributeValue::Bool(false));
        let offline = sim
            .read_attribute(DeviceId::HUB, "ports_desired_power_when_offline")
            .await
            .unwrap();
        assert_eq!(port_list(&offline, 4), AttributeValue::Bool(true));

        sim.execute(DeviceId::HUB, "turn_port_off", vec![AttributeValue::Int(4)])
            .await
            .unwrap();
        let sensed = sim
            .read_attribute(DeviceId::HUB, "ports_power_sensed")
            .await
            .unwrap();
        assert_eq!(port_list(&sensed, 4), AttributeValue::Bool(false));
    }

    #[tokio::test]
    async fn should_reset_tripped_breaker() {
        let sim = simulator();
        let box1 = DeviceId::new(1);
        let mut tripped = vec![AttributeValue::Bool(false); 12];
        tripped[6] = AttributeValue::Bool(true);
        sim.set(box1, "port_breakers_tripped", &AttributeValue::List(tripped))
            .unwrap();

        sim.execute(box1, "reset_port_breaker", vec![AttributeValue::Int(7)])
            .await
            .unwrap();
        let breakers = sim
            .read_attribute(box1, "port_breakers_tripped")
            .await
            .unwrap();
        assert_eq!(port_list(&breakers, 7), AttributeValue::Bool(false));
    }

    #[tokio::test]
    async fn should_keep_status_led_when_setting_service_led() {
        let sim = simulator();
        sim.set(
            DeviceId::HUB,
            "led_pattern",
            &AttributeValue::from(vec!["OFF", "GREENFAST"]),
        )
        .unwrap();
        sim.execute(DeviceId::HUB, "set_led_pattern", vec!["ON".into()])
            .await
            .unwrap();
        let led = sim.read_attribute(DeviceId::HUB, "led_pattern").await.unwrap();
        assert_eq!(led, AttributeValue::from("service: ON, status: GREENFAST"));
    }

    #[tokio::test]
    async fn should_reject_write_to_read_only_attribute() {
        let sim = simulator();
        let err = sim
            .write_attribute(DeviceId::HUB, "psu48v_current", AttributeValue::Float(1.0))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotWritable);
    }

    #[tokio::test]
    async fn should_store_written_thresholds() {
        let sim = simulator();
        let thresholds = AttributeValue::from(vec![60.0, 55.5, 10.0, -20.0]);
        sim.write_attribute(DeviceId::new(2), "pcb_temperature_thresholds", thresholds.clone())
            .await
            .unwrap();
        let read = sim
            .read_attribute(DeviceId::new(2), "pcb_temperature_thresholds")
            .await
            .unwrap();
        assert_eq!(read, thresholds);
    }

    #[tokio::test]
    async fn should_report_flags_as_joined_names() {
        let sim = simulator();
        sim.set(
            DeviceId::new(1),
            "warning_flags",
            &AttributeValue::from(vec!["SYS_48V_V", "SYS_PCB_TEMP"]),
        )
        .unwrap();
        let flags = sim
            .read_attribute(DeviceId::new(1), "warning_flags")
            .await
            .unwrap();
        assert_eq!(flags, AttributeValue::from("SYS_48V_V,SYS_PCB_TEMP"));
    }
}
