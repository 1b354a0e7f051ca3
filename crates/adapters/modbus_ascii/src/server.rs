//! Modbus ASCII server over the attribute service.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

use pasd_app::ports::Backend;
use pasd_app::services::AttributeService;
use pasd_domain::device::DeviceId;
use pasd_domain::error::PasdError;

use crate::frame::{self, AsciiFrame};
use crate::pdu::{ExceptionCode, Request, Response};

/// Answers register requests, unit 0 being the hub and unit N smartbox N.
pub struct ModbusServer<B> {
    service: Arc<AttributeService<B>>,
}

impl<B> Clone for ModbusServer<B> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
        }
    }
}

impl<B: Backend + 'static> ModbusServer<B> {
    #[must_use]
    pub fn new(service: Arc<AttributeService<B>>) -> Self {
        Self { service }
    }

    /// Answer one request PDU addressed to `unit`.
    ///
    /// Every failure becomes an exception response.
    pub async fn respond(&self, unit: u8, pdu: &[u8]) -> Response {
        let request = match Request::decode(pdu) {
            Ok(request) => request,
            Err(err) => {
                tracing::debug!(unit, error = %err, "rejecting PDU");
                return Response::Exception {
                    function: pdu.first().copied().unwrap_or_default(),
                    code: err.exception(),
                };
            }
        };
        let function = request.function().code();
        match self.dispatch(DeviceId::new(unit), &request).await {
            Ok(response) => response,
            Err(err) => {
                let code = ExceptionCode::from(&err);
                tracing::debug!(unit, function, %code, error = %err.detail(), "request failed");
                Response::Exception { function, code }
            }
        }
    }

    async fn dispatch(&self, device: DeviceId, request: &Request) -> Result<Response, PasdError> {
        match request {
            Request::ReadHoldingRegisters { address, count } => {
                let words = self.service.read_registers(device, *address, *count).await?;
                Ok(Response::ReadHoldingRegisters(words))
            }
            Request::WriteSingleRegister { address, value } => {
                self.service.write_registers(device, *address, &[*value]).await?;
                Ok(Response::WriteSingleRegister {
                    address: *address,
                    value: *value,
                })
            }
            Request::WriteMultipleRegisters { address, values } => {
                self.service.write_registers(device, *address, values).await?;
                Ok(Response::WriteMultipleRegisters {
                    address: *address,
                    count: u16::try_from(values.len()).unwrap_or(u16::MAX),
                })
            }
        }
    }

    /// Answer one line, terminator included.
    ///
    /// Returns `None` for a line that is not a valid frame: without a
    /// trustworthy unit id there is nobody to answer.
    pub async fn handle_frame(&self, line: &[u8]) -> Option<Vec<u8>> {
        let request = match AsciiFrame::decode(line) {
            Ok(request) => request,
            Err(err) => {
                tracing::warn!(error = %err, "dropping frame");
                return None;
            }
        };
        let response = self.respond(request.unit, &request.pdu).await;
        Some(AsciiFrame::new(request.unit, response.encode()).encode())
    }

    /// Answer frames on `stream` until it closes.
    ///
    /// # Errors
    ///
    /// Returns the I/O error that ended the connection.
    pub async fn serve_connection<S>(&self, stream: S) -> std::io::Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let (reader, mut writer) = tokio::io::split(stream);
        let mut reader = BufReader::new(reader);
        let mut line = Vec::new();
        while frame::read_line(&mut reader, &mut line).await? {
            if line.trim_ascii().is_empty() {
                continue;
            }
            if let Some(reply) = self.handle_frame(&line).await {
                writer.write_all(&reply).await?;
                writer.flush().await?;
            }
        }
        Ok(())
    }

    /// Accept connections on `listener` forever, one task per connection.
    ///
    /// # Errors
    ///
    /// Returns the error of a failed `accept`.
    pub async fn serve(self, listener: TcpListener) -> std::io::Result<()> {
        if let Ok(addr) = listener.local_addr() {
            tracing::info!(%addr, "modbus transport listening");
        }
        loop {
            let (stream, peer) = listener.accept().await?;
            tracing::debug!(%peer, "modbus client connected");
            let server = self.clone();
            tokio::spawn(async move {
                if let Err(err) = server.serve_connection(stream).await {
                    tracing::warn!(%peer, error = %err, "modbus connection failed");
                }
                tracing::debug!(%peer, "modbus client disconnected");
            });
        }
    }
}
