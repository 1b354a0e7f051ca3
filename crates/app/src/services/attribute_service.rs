//! Attribute service: the use-cases both transports call.
//!
//! Name-level requests come from the JSON transport, register-level requests
//! from the Modbus transport. Both are checked against the shared catalogue
//! before any backend traffic and end up as name-level backend calls.

use pasd_domain::catalogue::{AttributeDefinition, register_map};
use pasd_domain::command::Command;
use pasd_domain::device::{DeviceId, DeviceKind, Topology};
use pasd_domain::error::{AddressingError, NotWritableError, PasdError};
use pasd_domain::planner::{MAX_READ_REGISTERS, MAX_WRITE_REGISTERS};
use pasd_domain::value::AttributeValue;

use crate::ports::Backend;

/// Application service translating requests into backend calls.
pub struct AttributeService<B> {
    backend: B,
    topology: Topology,
}

impl<B: Backend> AttributeService<B> {
    /// Create a new service for `topology` backed by `backend`.
    pub fn new(backend: B, topology: Topology) -> Self {
        Self { backend, topology }
    }

    #[must_use]
    pub fn topology(&self) -> Topology {
        self.topology
    }

    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn kind(&self, device: DeviceId) -> Result<DeviceKind, AddressingError> {
        self.topology.resolve(device)
    }

    /// Read one attribute by name.
    ///
    /// # Errors
    ///
    /// Returns [`PasdError::Addressing`] for an unconfigured device,
    /// [`PasdError::UnknownAttribute`] for an unknown name, or the backend's
    /// error.
    #[tracing::instrument(skip(self))]
    pub async fn read(&self, device: DeviceId, name: &str) -> Result<AttributeValue, PasdError> {
        let kind = self.kind(device)?;
        register_map().resolve(kind, name)?;
        self.backend.read_attribute(device, name).await
    }

    /// Execute a command by name.
    ///
    /// # Errors
    ///
    /// Returns [`PasdError::UnknownCommand`] for an unknown name,
    /// [`PasdError::Command`] for arguments that do not fit the command or a
    /// backend failure.
    #[tracing::instrument(skip(self, arguments), fields(arguments = arguments.len()))]
    pub async fn execute(
        &self,
        device: DeviceId,
        name: &str,
        arguments: Vec<AttributeValue>,
    ) -> Result<AttributeValue, PasdError> {
        let kind = self.kind(device)?;
        Command::parse(kind, name, &arguments)?;
        let result = self.backend.execute(device, name, arguments).await?;
        tracing::info!(%device, command = name, "command executed");
        Ok(result)
    }

    /// Read `count` holding registers as the device would report them.
    ///
    /// Every attribute covering the span is read from the backend and
    /// re-encoded, then the requested registers are sliced out. Port-field
    /// projections sharing a word are OR-ed back together.
    ///
    /// # Errors
    ///
    /// Returns [`PasdError::Addressing`] for an unconfigured device, a count
    /// outside `1..=125` or a register no attribute covers,
    /// [`PasdError::Conversion`] when a backend value does not encode, or the
    /// backend's error.
    #[tracing::instrument(skip(self))]
    pub async fn read_registers(
        &self,
        device: DeviceId,
        address: u16,
        count: u16,
    ) -> Result<Vec<u16>, PasdError> {
        check_quantity(count, MAX_READ_REGISTERS)?;
        let kind = self.kind(device)?;
        let definitions = register_map().attributes_in_span(kind, address, count)?;

        let image = self.image(device, &definitions).await?;
        Ok(image.slice(address, count))
    }

    /// Write holding registers starting at `address`.
    ///
    /// Each writable attribute the span touches is read, re-encoded, overlaid
    /// with the written words, decoded and forwarded as one
    /// `write_attribute` call. Writes the catalogue cannot hold but a command
    /// can express, such as a breaker reset, are executed as that command.
    ///
    /// # Errors
    ///
    /// Returns [`PasdError::NotWritable`] when any register in the span is
    /// not covered by a writable attribute or a written word sets bits only
    /// read-only port fields own, [`PasdError::Addressing`] for an
    /// unconfigured device, a count outside `1..=123` or an unmapped register,
    /// [`PasdError::Conversion`] when the written words do not decode, or the
    /// backend's error.
    #[tracing::instrument(skip(self, words), fields(count = words.len()))]
    pub async fn write_registers(
        &self,
        device: DeviceId,
        address: u16,
        words: &[u16],
    ) -> Result<(), PasdError> {
        let count = u16::try_from(words.len()).unwrap_or(u16::MAX);
        check_quantity(count, MAX_WRITE_REGISTERS)?;
        let kind = self.kind(device)?;
        if let Some(command) = Command::from_register_write(kind, address, words) {
            tracing::debug!(%device, command = command.name(), "register write carries a command");
            self.backend
                .execute(device, command.name(), command.arguments())
                .await?;
            return Ok(());
        }
        let definitions = register_map().attributes_in_span(kind, address, count)?;

        let writable: Vec<&AttributeDefinition> = definitions
            .iter()
            .copied()
            .filter(|definition| definition.is_writable())
            .collect();
        for (register, word) in (address..).zip(words) {
            check_writable(&definitions, &writable, register, *word)?;
        }

        let names: Vec<&str> = writable.iter().map(|definition| definition.name).collect();
        let current = self.backend.read_attributes(device, &names).await?;
        let mut updates = Vec::with_capacity(writable.len());
        for (definition, value) in writable.iter().zip(&current) {
            let mut encoded = definition.reencode(value)?;
            overlay(&mut encoded, definition.address, address, words);
            updates.push((definition.name, definition.decode(&encoded)?));
        }
        // Every update decoded before the first write goes out.
        for (name, value) in updates {
            tracing::debug!(%device, attribute = name, %value, "forwarding write");
            self.backend.write_attribute(device, name, value).await?;
        }
        Ok(())
    }

    async fn image(
        &self,
        device: DeviceId,
        definitions: &[&AttributeDefinition],
    ) -> Result<RegisterImage, PasdError> {
        let start = definitions.iter().map(|d| d.address).min().unwrap_or(0);
        let end = definitions.iter().map(|d| d.end()).max().unwrap_or(0);
        let mut image = RegisterImage {
            start,
            words: vec![0; usize::try_from(end - u32::from(start)).unwrap_or(0)],
        };
        let names: Vec<&str> = definitions.iter().map(|definition| definition.name).collect();
        let values = self.backend.read_attributes(device, &names).await?;
        for (definition, value) in definitions.iter().zip(&values) {
            let encoded = definition.reencode(value)?;
            image.merge(definition.address, &encoded);
        }
        Ok(image)
    }
}

/// Fail unless writable attributes own every bit set in `word`, or the whole
/// register when it is not a port word.
fn check_writable(
    definitions: &[&AttributeDefinition],
    writable: &[&AttributeDefinition],
    register: u16,
    word: u16,
) -> Result<(), NotWritableError> {
    let owned = writable
        .iter()
        .filter(|definition| definition.covers(register))
        .fold(0, |mask, definition| mask | definition.bit_mask());
    let stray = if owned == 0 { u16::MAX } else { word & !owned };
    if stray == 0 {
        return Ok(());
    }
    let covering: Vec<&AttributeDefinition> = definitions
        .iter()
        .copied()
        .filter(|definition| definition.covers(register))
        .collect();
    let name = covering
        .iter()
        .find(|definition| !definition.is_writable() && definition.bit_mask() & stray != 0)
        .or(covering.first())
        .map_or("", |definition| definition.name);
    Err(NotWritableError {
        name: name.to_string(),
    })
}

fn check_quantity(count: u16, max: u16) -> Result<(), AddressingError> {
    if (1..=max).contains(&count) {
        Ok(())
    } else {
        Err(AddressingError::InvalidQuantity { count, max })
    }
}

/// Copy the part of `written` (starting at `written_at`) that falls inside
/// `target` (starting at `target_at`).
fn overlay(target: &mut [u16], target_at: u16, written_at: u16, written: &[u16]) {
    for (offset, word) in written.iter().enumerate() {
        let register = usize::from(written_at) + offset;
        if let Some(index) = register.checked_sub(usize::from(target_at)) {
            if let Some(slot) = target.get_mut(index) {
                *slot = *word;
            }
        }
    }
}

struct RegisterImage {
    start: u16,
    words: Vec<u16>,
}

impl RegisterImage {
    fn merge(&mut self, address: u16, encoded: &[u16]) {
        let offset = usize::from(address - self.start);
        for (slot, word) in self.words[offset..].iter_mut().zip(encoded) {
            *slot |= *word;
        }
    }

    fn slice(&self, address: u16, count: u16) -> Vec<u16> {
        let offset = usize::from(address - self.start);
        self.words[offset..offset + usize::from(count)].to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pasd_domain::error::ErrorCode;
    use std::collections::HashMap;
    use std::future::Future;
    use std::sync::Mutex;

    #[derive(Default)]
    struct InMemoryBackend {
        values: Mutex<HashMap<(DeviceId, String), AttributeValue>>,
        writes: Mutex<Vec<(DeviceId, String, AttributeValue)>>,
        executed: Mutex<Vec<String>>,
    }

    impl InMemoryBackend {
        fn with(values: &[(u8, &str, AttributeValue)]) -> Self {
            let backend = Self::default();
            {
                let mut map = backend.values.lock().unwrap();
                for (device, name, value) in values {
                    map.insert((DeviceId::new(*device), (*name).to_string()), value.clone());
                }
            }
            backend
        }

        fn writes(&self) -> Vec<(DeviceId, String, AttributeValue)> {
            self.writes.lock().unwrap().clone()
        }
    }

    impl Backend for InMemoryBackend {
        fn read_attribute(
            &self,
            device: DeviceId,
            name: &str,
        ) -> impl Future<Output = Result<AttributeValue, PasdError>> + Send {
            let value = self
                .values
                .lock()
                .unwrap()
                .get(&(device, name.to_string()))
                .cloned()
                .ok_or_else(|| PasdError::command(format!("no value for {name}")));
            async move { value }
        }

        fn write_attribute(
            &self,
            device: DeviceId,
            name: &str,
            value: AttributeValue,
        ) -> impl Future<Output = Result<(), PasdError>> + Send {
            self.writes
                .lock()
                .unwrap()
                .push((device, name.to_string(), value.clone()));
            self.values
                .lock()
                .unwrap()
                .insert((device, name.to_string()), value);
            async { Ok(()) }
        }

        fn execute(
            &self,
            _device: DeviceId,
            name: &str,
            _arguments: Vec<AttributeValue>,
        ) -> impl Future<Output = Result<AttributeValue, PasdError>> + Send {
            self.executed.lock().unwrap().push(name.to_string());
            async { Ok(AttributeValue::Bool(true)) }
        }
    }

    /// Answers every port projection and records each batched read.
    #[derive(Default)]
    struct CountingBackend {
        batches: Mutex<Vec<Vec<String>>>,
    }

    impl Backend for CountingBackend {
        fn read_attribute(
            &self,
            _device: DeviceId,
            name: &str,
        ) -> impl Future<Output = Result<AttributeValue, PasdError>> + Send {
            let value = match name {
                "port_forcings" => ports(28, AttributeValue::from("NONE")),
                "ports_desired_power_when_online" | "ports_desired_power_when_offline" => {
                    ports(28, AttributeValue::Null)
                }
                _ => ports(28, AttributeValue::Bool(false)),
            };
            async { Ok(value) }
        }

        async fn read_attributes(
            &self,
            device: DeviceId,
            names: &[&str],
        ) -> Result<Vec<AttributeValue>, PasdError> {
            self.batches
                .lock()
                .unwrap()
                .push(names.iter().map(|name| (*name).to_string()).collect());
            let mut values = Vec::with_capacity(names.len());
            for name in names {
                values.push(self.read_attribute(device, name).await?);
            }
            Ok(values)
        }

        fn write_attribute(
            &self,
            _device: DeviceId,
            _name: &str,
            _value: AttributeValue,
        ) -> impl Future<Output = Result<(), PasdError>> + Send {
            async { Ok(()) }
        }

        fn execute(
            &self,
            _device: DeviceId,
            _name: &str,
            _arguments: Vec<AttributeValue>,
        ) -> impl Future<Output = Result<AttributeValue, PasdError>> + Send {
            async { Ok(AttributeValue::Bool(true)) }
        }
    }

    fn ports(len: usize, value: AttributeValue) -> AttributeValue {
        AttributeValue::List(vec![value; len])
    }

    fn hub_ports_backend() -> InMemoryBackend {
        InMemoryBackend::with(&[
            (0, "ports_power_sensed", ports(28, AttributeValue::Bool(true))),
            (0, "ports_power_control", ports(28, AttributeValue::Bool(false))),
            (0, "port_forcings", ports(28, AttributeValue::from("NONE"))),
            (0, "ports_desired_power_when_online", ports(28, AttributeValue::Bool(true))),
            (0, "ports_desired_power_when_offline", ports(28, AttributeValue::Null)),
        ])
    }

    #[tokio::test]
    async fn should_read_attribute_through_backend() {
        let backend = InMemoryBackend::with(&[(0, "uptime", AttributeValue::Int(42))]);
        let service = AttributeService::new(backend, Topology::default());
        let value = service.read(DeviceId::HUB, "uptime").await.unwrap();
        assert_eq!(value, AttributeValue::Int(42));
    }

    #[tokio::test]
    async fn should_reject_unknown_attribute_before_backend() {
        let service = AttributeService::new(InMemoryBackend::default(), Topology::default());
        let err = service.read(DeviceId::HUB, "flux_capacitor").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::Attribute);
    }

    #[tokio::test]
    async fn should_reject_unconfigured_device() {
        let service = AttributeService::new(InMemoryBackend::default(), Topology::new(2));
        let err = service.read(DeviceId::new(3), "uptime").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::Addressing);
    }

    #[tokio::test]
    async fn should_validate_command_arguments_before_backend() {
        let service = AttributeService::new(InMemoryBackend::default(), Topology::default());
        let err = service
            .execute(DeviceId::new(1), "turn_port_on", vec![AttributeValue::Int(99)])
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Command);
        assert!(service.backend().executed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn should_forward_valid_command() {
        let service = AttributeService::new(InMemoryBackend::default(), Topology::default());
        let result = service
            .execute(DeviceId::new(1), "reset_port_breaker", vec![AttributeValue::Int(4)])
            .await
            .unwrap();
        assert_eq!(result, AttributeValue::Bool(true));
        assert_eq!(
            *service.backend().executed.lock().unwrap(),
            vec!["reset_port_breaker".to_string()]
        );
    }

    #[tokio::test]
    async fn should_encode_registers_from_attribute_values() {
        let backend = InMemoryBackend::with(&[
            (0, "firmware_version", AttributeValue::Int(3)),
            (0, "uptime", AttributeValue::Int(65538)),
            (0, "sys_address", AttributeValue::Int(101)),
        ]);
        let service = AttributeService::new(backend, Topology::default());
        let words = service.read_registers(DeviceId::HUB, 12, 4).await.unwrap();
        assert_eq!(words, vec![3, 1, 2, 101]);
    }

    #[tokio::test]
    async fn should_slice_partially_requested_attribute() {
        let backend = InMemoryBackend::with(&[(0, "uptime", AttributeValue::Int(65538))]);
        let service = AttributeService::new(backend, Topology::default());
        let words = service.read_registers(DeviceId::HUB, 14, 1).await.unwrap();
        assert_eq!(words, vec![2]);
    }

    #[tokio::test]
    async fn should_or_merge_port_projections() {
        let service = AttributeService::new(hub_ports_backend(), Topology::default());
        let words = service.read_registers(DeviceId::HUB, 36, 2).await.unwrap();
        // Bit 7 sensed, bit 13 desired online.
        assert_eq!(words, vec![0x2080, 0x2080]);
    }

    #[tokio::test]
    async fn should_reject_read_of_unmapped_register() {
        let service = AttributeService::new(InMemoryBackend::default(), Topology::default());
        let err = service.read_registers(DeviceId::HUB, 30, 2).await.unwrap_err();
        assert!(matches!(
            err,
            PasdError::Addressing(AddressingError::UnmappedRegister { address: 30, .. })
        ));
    }

    #[tokio::test]
    async fn should_reject_read_quantity_above_limit() {
        let service = AttributeService::new(InMemoryBackend::default(), Topology::default());
        let err = service.read_registers(DeviceId::HUB, 0, 126).await.unwrap_err();
        assert!(matches!(
            err,
            PasdError::Addressing(AddressingError::InvalidQuantity { count: 126, max: 125 })
        ));
    }

    #[tokio::test]
    async fn should_reject_write_to_read_only_register() {
        let backend = InMemoryBackend::with(&[(0, "uptime", AttributeValue::Int(1))]);
        let service = AttributeService::new(backend, Topology::default());
        let err = service
            .write_registers(DeviceId::HUB, 13, &[0, 5])
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotWritable);
        assert!(service.backend().writes().is_empty());
    }

    #[tokio::test]
    async fn should_change_only_the_written_port() {
        let service = AttributeService::new(hub_ports_backend(), Topology::default());
        // Port 3: desired online OFF (bit 12), desired offline ON (bit 11).
        service
            .write_registers(DeviceId::HUB, 38, &[0x1800])
            .await
            .unwrap();

        let writes = service.backend().writes();
        assert_eq!(writes.len(), 2);

        let mut online = vec![AttributeValue::Bool(true); 28];
        online[2] = AttributeValue::Bool(false);
        let mut offline = vec![AttributeValue::Null; 28];
        offline[2] = AttributeValue::Bool(true);
        assert!(writes.contains(&(
            DeviceId::HUB,
            "ports_desired_power_when_online".to_string(),
            AttributeValue::List(online)
        )));
        assert!(writes.contains(&(
            DeviceId::HUB,
            "ports_desired_power_when_offline".to_string(),
            AttributeValue::List(offline)
        )));
    }

    #[tokio::test]
    async fn should_reject_port_word_setting_read_only_bits() {
        let service = AttributeService::new(hub_ports_backend(), Topology::default());
        for word in [0x0100, 0x0300, 0x2080, 0x0040] {
            let err = service
                .write_registers(DeviceId::HUB, 36, &[word])
                .await
                .unwrap_err();
            assert_eq!(err.code(), ErrorCode::NotWritable, "word {word:#06x}");
        }
        assert!(service.backend().writes().is_empty());
    }

    #[tokio::test]
    async fn should_name_read_only_field_owning_rejected_bits() {
        let service = AttributeService::new(hub_ports_backend(), Topology::default());
        let err = service
            .write_registers(DeviceId::HUB, 37, &[0x0200])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PasdError::NotWritable(NotWritableError { name }) if name == "port_forcings"
        ));
    }

    #[tokio::test]
    async fn should_execute_breaker_reset_written_to_smartbox_port() {
        let service = AttributeService::new(InMemoryBackend::default(), Topology::new(1));
        service
            .write_registers(DeviceId::new(1), 41, &[0x0080])
            .await
            .unwrap();
        assert_eq!(
            *service.backend().executed.lock().unwrap(),
            vec!["reset_port_breaker"]
        );
        assert!(service.backend().writes().is_empty());
    }

    #[tokio::test]
    async fn should_read_covering_attributes_in_one_backend_call() {
        let service = AttributeService::new(CountingBackend::default(), Topology::default());
        service.read_registers(DeviceId::HUB, 36, 28).await.unwrap();
        let batches = service.backend().batches.lock().unwrap().clone();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 5);
    }

    #[tokio::test]
    async fn should_write_threshold_element() {
        let backend = InMemoryBackend::with(&[(
            1,
            "input_voltage_thresholds",
            AttributeValue::from(vec![50.0, 49.0, 45.0, 40.0]),
        )]);
        let service = AttributeService::new(backend, Topology::default());
        service
            .write_registers(DeviceId::new(1), 1001, &[4850])
            .await
            .unwrap();
        assert_eq!(
            service.backend().writes(),
            vec![(
                DeviceId::new(1),
                "input_voltage_thresholds".to_string(),
                AttributeValue::from(vec![50.0, 48.5, 45.0, 40.0])
            )]
        );
    }

    #[tokio::test]
    async fn should_write_led_pattern_from_display_text() {
        let backend = InMemoryBackend::with(&[(
            0,
            "led_pattern",
            AttributeValue::from("service: OFF, status: GREEN"),
        )]);
        let service = AttributeService::new(backend, Topology::default());
        service
            .write_registers(DeviceId::HUB, 25, &[0x0101])
            .await
            .unwrap();
        assert_eq!(
            service.backend().writes()[0].2,
            AttributeValue::from("service: ON, status: GREEN")
        );
    }

    #[tokio::test]
    async fn should_execute_initialize_written_to_status_register() {
        let service = AttributeService::new(InMemoryBackend::default(), Topology::new(1));
        service
            .write_registers(DeviceId::new(1), 21, &[1])
            .await
            .unwrap();
        assert_eq!(*service.backend().executed.lock().unwrap(), vec!["initialize"]);
        assert!(service.backend().writes().is_empty());
    }

    #[tokio::test]
    async fn should_reject_other_status_writes() {
        let service = AttributeService::new(InMemoryBackend::default(), Topology::new(1));
        let err = service
            .write_registers(DeviceId::new(1), 21, &[3])
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotWritable);
    }
}
