//! Register bus port: raw holding-register access to one device.

use std::future::Future;

use pasd_domain::device::DeviceId;
use pasd_domain::error::PasdError;

pub trait RegisterBus: Send + Sync {
    /// Read `count` consecutive registers starting at `address`.
    fn read_registers(
        &self,
        device: DeviceId,
        address: u16,
        count: u16,
    ) -> impl Future<Output = Result<Vec<u16>, PasdError>> + Send;

    /// Write `words` to consecutive registers starting at `address`.
    fn write_registers(
        &self,
        device: DeviceId,
        address: u16,
        words: &[u16],
    ) -> impl Future<Output = Result<(), PasdError>> + Send;
}
