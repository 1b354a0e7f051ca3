//! Backend port: the device state behind both transports.
//!
//! A backend is either a register bus driven through the catalogue
//! ([`BusBackend`](crate::services::bus_backend::BusBackend)) or a simulator.
//! It only ever sees names and semantic values, never register addresses.

use std::future::Future;
use std::sync::Arc;

use pasd_domain::device::DeviceId;
use pasd_domain::error::PasdError;
use pasd_domain::value::AttributeValue;

pub trait Backend: Send + Sync {
    /// Current value of an attribute.
    ///
    /// Fails with [`PasdError::UnknownAttribute`] for names the device lacks.
    fn read_attribute(
        &self,
        device: DeviceId,
        name: &str,
    ) -> impl Future<Output = Result<AttributeValue, PasdError>> + Send;

    /// Current values of several attributes of one device, in the order of
    /// `names`.
    ///
    /// Reads one name at a time unless the backend can do better.
    fn read_attributes(
        &self,
        device: DeviceId,
        names: &[&str],
    ) -> impl Future<Output = Result<Vec<AttributeValue>, PasdError>> + Send {
        async move {
            let mut values = Vec::with_capacity(names.len());
            for name in names {
                values.push(self.read_attribute(device, name).await?);
            }
            Ok(values)
        }
    }

    /// Store a new value for a writable attribute.
    ///
    /// Values may be in the form `encode` takes or in the display form a
    /// read returned.
    fn write_attribute(
        &self,
        device: DeviceId,
        name: &str,
        value: AttributeValue,
    ) -> impl Future<Output = Result<(), PasdError>> + Send;

    /// Run a command with positional arguments.
    fn execute(
        &self,
        device: DeviceId,
        name: &str,
        arguments: Vec<AttributeValue>,
    ) -> impl Future<Output = Result<AttributeValue, PasdError>> + Send;
}

impl<B: Backend> Backend for Arc<B> {
    fn read_attribute(
        &self,
        device: DeviceId,
        name: &str,
    ) -> impl Future<Output = Result<AttributeValue, PasdError>> + Send {
        self.as_ref().read_attribute(device, name)
    }

    fn read_attributes(
        &self,
        device: DeviceId,
        names: &[&str],
    ) -> impl Future<Output = Result<Vec<AttributeValue>, PasdError>> + Send {
        self.as_ref().read_attributes(device, names)
    }

    fn write_attribute(
        &self,
        device: DeviceId,
        name: &str,
        value: AttributeValue,
    ) -> impl Future<Output = Result<(), PasdError>> + Send {
        self.as_ref().write_attribute(device, name, value)
    }

    fn execute(
        &self,
        device: DeviceId,
        name: &str,
        arguments: Vec<AttributeValue>,
    ) -> impl Future<Output = Result<AttributeValue, PasdError>> + Send {
        self.as_ref().execute(device, name, arguments)
    }
}
