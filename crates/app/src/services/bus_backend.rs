//! A [`Backend`] that talks to real devices through a [`RegisterBus`].
//!
//! Reads are planned against the catalogue so several attributes sharing a
//! span cost a single bus transaction. Writes and commands become register
//! writes.

use pasd_domain::catalogue::register_map;
use pasd_domain::command::Command;
use pasd_domain::device::DeviceId;
use pasd_domain::error::PasdError;
use pasd_domain::planner::ReadPlan;
use pasd_domain::value::AttributeValue;

use crate::ports::{Backend, RegisterBus};

/// Backend translating names into register traffic on `R`.
pub struct BusBackend<R> {
    bus: R,
}

impl<R: RegisterBus> BusBackend<R> {
    pub fn new(bus: R) -> Self {
        Self { bus }
    }

    #[must_use]
    pub fn bus(&self) -> &R {
        &self.bus
    }
}

impl<R: RegisterBus> Backend for BusBackend<R> {
    async fn read_attribute(
        &self,
        device: DeviceId,
        name: &str,
    ) -> Result<AttributeValue, PasdError> {
        let mut values = self.read_attributes(device, &[name]).await?;
        Ok(values.pop().unwrap_or(AttributeValue::Null))
    }

    /// Plans the names against the catalogue so attributes sharing or
    /// adjoining a span cost a single bus read.
    #[tracing::instrument(skip(self, names), fields(names = names.len()))]
    async fn read_attributes(
        &self,
        device: DeviceId,
        names: &[&str],
    ) -> Result<Vec<AttributeValue>, PasdError> {
        let plan = ReadPlan::for_names(device.kind(), names)?;
        let mut reads = Vec::with_capacity(plan.spans().len());
        for span in plan.spans() {
            tracing::debug!(address = span.address, count = span.count, "reading span");
            reads.push(
                self.bus
                    .read_registers(device, span.address, span.count)
                    .await?,
            );
        }
        Ok(plan.decode(&reads)?)
    }

    async fn write_attribute(
        &self,
        device: DeviceId,
        name: &str,
        value: AttributeValue,
    ) -> Result<(), PasdError> {
        let definition = register_map().resolve_writable(device.kind(), name)?;
        // A port projection encodes only its own bits; a zero pair means "no change".
        let words = definition.reencode(&value)?;
        self.bus
            .write_registers(device, definition.address, &words)
            .await
    }

    async fn execute(
        &self,
        device: DeviceId,
        name: &str,
        arguments: Vec<AttributeValue>,
    ) -> Result<AttributeValue, PasdError> {
        let kind = device.kind();
        let command = Command::parse(kind, name, &arguments)?;
        let write = command.register_write(kind)?;
        self.bus
            .write_registers(device, write.address, &write.words)
            .await?;
        Ok(AttributeValue::Bool(true))
    }
}
