//! Modbus ASCII client, the register bus of the bus backend.
//!
//! One transaction at a time over a single connection. Only opening the
//! connection is retried; a request that was sent is never repeated, so a
//! write reaches the device at most once.

use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::Mutex;

use pasd_app::ports::RegisterBus;
use pasd_domain::device::DeviceId;
use pasd_domain::error::PasdError;

use crate::config::ModbusClientConfig;
use crate::error::ModbusError;
use crate::frame::{self, AsciiFrame};
use crate::pdu::{Request, Response};

struct Connection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Connection {
    async fn open(address: &str) -> Result<Self, ModbusError> {
        let stream = TcpStream::connect(address).await?;
        stream.set_nodelay(true)?;
        let (reader, writer) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(reader),
            writer,
        })
    }

    async fn exchange(&mut self, frame: &[u8]) -> Result<AsciiFrame, ModbusError> {
        self.writer.write_all(frame).await?;
        self.writer.flush().await?;
        let mut line = Vec::new();
        loop {
            if !frame::read_line(&mut self.reader, &mut line).await? {
                return Err(ModbusError::Closed);
            }
            if !line.trim_ascii().is_empty() {
                return Ok(AsciiFrame::decode(&line)?);
            }
        }
    }
}

/// Register bus speaking Modbus ASCII over TCP.
pub struct ModbusClient {
    config: ModbusClientConfig,
    connection: Mutex<Option<Connection>>,
}

impl ModbusClient {
    #[must_use]
    pub fn new(config: ModbusClientConfig) -> Self {
        Self {
            config,
            connection: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ModbusClientConfig {
        &self.config
    }

    async fn connect(&self) -> Result<Connection, ModbusError> {
        let address = self.config.address.as_str();
        let connection = self.config.retry.run(move || Connection::open(address)).await?;
        tracing::debug!(address, "modbus client connected");
        Ok(connection)
    }

    /// Send one request to `unit` and return its response.
    ///
    /// The connection is dropped after a transport failure or timeout, so a
    /// late reply cannot be taken for the answer to the next request.
    ///
    /// # Errors
    ///
    /// Returns [`ModbusError::Exception`] when the device answers with an
    /// exception, [`ModbusError::Timeout`] when it does not answer in time,
    /// or the transport error.
    #[tracing::instrument(skip(self))]
    pub async fn transact(&self, unit: u8, request: &Request) -> Result<Response, ModbusError> {
        let frame = AsciiFrame::new(unit, request.encode()).encode();
        let timeout = self.config.timeout();
        let mut connection = self.connection.lock().await;
        let mut current = match connection.take() {
            Some(current) => current,
            None => self.connect().await?,
        };
        let reply = tokio::time::timeout(timeout, current.exchange(&frame))
            .await
            .unwrap_or(Err(ModbusError::Timeout(timeout)))?;
        *connection = Some(current);
        drop(connection);

        if reply.unit != unit {
            return Err(ModbusError::Mismatch("unit"));
        }
        match Response::decode(&reply.pdu)? {
            Response::Exception { function, code } => Err(ModbusError::Exception { function, code }),
            response => Ok(response),
        }
    }

    /// Read holding registers.
    ///
    /// # Errors
    ///
    /// Same as [`ModbusClient::transact`], plus [`ModbusError::Mismatch`]
    /// when the reply carries the wrong number of registers.
    pub async fn read_holding_registers(
        &self,
        unit: u8,
        address: u16,
        count: u16,
    ) -> Result<Vec<u16>, ModbusError> {
        let request = Request::ReadHoldingRegisters { address, count };
        match self.transact(unit, &request).await? {
            Response::ReadHoldingRegisters(words) if words.len() == usize::from(count) => Ok(words),
            Response::ReadHoldingRegisters(_) => Err(ModbusError::Mismatch("register count")),
            _ => Err(ModbusError::Mismatch("function")),
        }
    }

    /// Write registers: function 0x06 for one word, 0x10 otherwise.
    ///
    /// # Errors
    ///
    /// Same as [`ModbusClient::transact`], plus [`ModbusError::Mismatch`]
    /// when the echo does not match the request.
    pub async fn write_holding_registers(
        &self,
        unit: u8,
        address: u16,
        words: &[u16],
    ) -> Result<(), ModbusError> {
        let request = match words {
            [value] => Request::WriteSingleRegister {
                address,
                value: *value,
            },
            _ => Request::WriteMultipleRegisters {
                address,
                values: words.to_vec(),
            },
        };
        let response = self.transact(unit, &request).await?;
        let echoed = match (&request, response) {
            (
                Request::WriteSingleRegister { address, value },
                Response::WriteSingleRegister {
                    address: echo_address,
                    value: echo_value,
                },
            ) => *address == echo_address && *value == echo_value,
            (
                Request::WriteMultipleRegisters { address, values },
                Response::WriteMultipleRegisters {
                    address: echo_address,
                    count,
                },
            ) => *address == echo_address && values.len() == usize::from(count),
            _ => false,
        };
        if echoed {
            Ok(())
        } else {
            Err(ModbusError::Mismatch("write echo"))
        }
    }
}

impl RegisterBus for ModbusClient {
    async fn read_registers(
        &self,
        device: DeviceId,
        address: u16,
        count: u16,
    ) -> Result<Vec<u16>, PasdError> {
        Ok(self
            .read_holding_registers(device.get(), address, count)
            .await?)
    }

    async fn write_registers(
        &self,
        device: DeviceId,
        address: u16,
        words: &[u16],
    ) -> Result<(), PasdError> {
        Ok(self
            .write_holding_registers(device.get(), address, words)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use pasd_adapter_simulator::Simulator;
    use pasd_app::retry::RetryPolicy;
    use pasd_app::services::AttributeService;
    use pasd_domain::device::Topology;
    use pasd_domain::error::ErrorCode;
    use tokio::net::TcpListener;

    use crate::ModbusServer;
    use crate::pdu::ExceptionCode;

    async fn start_server() -> String {
        let topology = Topology::new(1);
        let server =
            ModbusServer::new(Arc::new(AttributeService::new(Simulator::new(topology), topology)));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        tokio::spawn(server.serve(listener));
        address
    }

    fn client(address: String) -> ModbusClient {
        ModbusClient::new(ModbusClientConfig {
            address,
            timeout_ms: 1_000,
            retry: RetryPolicy::none(),
        })
    }

    #[tokio::test]
    async fn should_read_registers_from_server() {
        let client = client(start_server().await);
        let words = client.read_holding_registers(1, 0, 2).await.unwrap();
        assert_eq!(words, vec![1, 2]);
    }

    #[tokio::test]
    async fn should_write_and_read_back_threshold() {
        let client = client(start_server().await);
        client
            .write_holding_registers(0, 1004, &[5000, 4900, 4600, 4500])
            .await
            .unwrap();
        let words = client.read_holding_registers(0, 1004, 4).await.unwrap();
        assert_eq!(words, vec![5000, 4900, 4600, 4500]);
    }

    #[tokio::test]
    async fn should_use_single_register_write_for_one_word() {
        let client = client(start_server().await);
        // smartbox port 1 desired offline ON
        client.write_holding_registers(1, 35, &[0x0800]).await.unwrap();
        let words = client.read_holding_registers(1, 35, 1).await.unwrap();
        assert_eq!(words[0] & 0x0C00, 0x0800);
    }

    #[tokio::test]
    async fn should_surface_exception_from_server() {
        let client = client(start_server().await);
        let err = client.read_holding_registers(0, 900, 1).await.unwrap_err();
        assert!(matches!(
            err,
            ModbusError::Exception {
                function: 0x03,
                code: ExceptionCode::IllegalDataAddress
            }
        ));
    }

    #[tokio::test]
    async fn should_report_exception_as_command_error_through_bus_port() {
        let client = client(start_server().await);
        let err = client
            .read_registers(DeviceId::new(4), 0, 1)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Command);
        assert!(err.detail().contains("gateway target device failed to respond"));
    }

    #[tokio::test]
    async fn should_time_out_when_device_stays_silent() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let silent = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(stream);
        });
        let client = ModbusClient::new(ModbusClientConfig {
            address,
            timeout_ms: 50,
            retry: RetryPolicy::none(),
        });
        let err = client.read_holding_registers(0, 0, 1).await.unwrap_err();
        assert!(matches!(err, ModbusError::Timeout(_)));
        silent.abort();
    }

    #[tokio::test]
    async fn should_fail_to_connect_when_nobody_listens() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);
        let err = client(address).read_holding_registers(0, 0, 1).await.unwrap_err();
        assert!(matches!(err, ModbusError::Io(_)));
    }
}
