//! Line client for the JSON transport.
//!
//! Holds one connection, opened lazily under the [`RetryPolicy`] and reopened
//! after a failure.

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::Mutex;

use pasd_app::retry::RetryPolicy;
use pasd_domain::device::DeviceId;
use pasd_domain::value::AttributeValue;

use crate::error::JsonApiError;
use crate::protocol::{Request, Response};
use crate::server::MAX_REQUEST_LEN;

struct Connection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Connection {
    async fn open(addr: &str) -> Result<Self, JsonApiError> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        let (reader, writer) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(reader),
            writer,
        })
    }

    async fn exchange(&mut self, line: &[u8]) -> Result<Response, JsonApiError> {
        self.writer.write_all(line).await?;
        self.writer.flush().await?;
        let limit = u64::try_from(MAX_REQUEST_LEN + 1).unwrap_or(u64::MAX);
        let mut reply = Vec::new();
        if (&mut self.reader).take(limit).read_until(b'\n', &mut reply).await? == 0 {
            return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into());
        }
        if reply.len() > MAX_REQUEST_LEN && !reply.ends_with(b"\n") {
            return Err(JsonApiError::TooLong {
                limit: MAX_REQUEST_LEN,
            });
        }
        serde_json::from_slice(reply.trim_ascii()).map_err(JsonApiError::Reply)
    }
}

/// Client sending read and execute requests to a [`JsonApi`](crate::JsonApi) server.
pub struct JsonClient {
    addr: String,
    retry: RetryPolicy,
    connection: Mutex<Option<Connection>>,
}

impl JsonClient {
    #[must_use]
    pub fn new(addr: impl Into<String>, retry: RetryPolicy) -> Self {
        Self {
            addr: addr.into(),
            retry,
            connection: Mutex::new(None),
        }
    }

    /// Read one attribute.
    ///
    /// # Errors
    ///
    /// Returns [`JsonApiError::Remote`] carrying the server's error code, or
    /// a connection error once the retry policy is exhausted.
    pub async fn read(&self, device: DeviceId, name: &str) -> Result<AttributeValue, JsonApiError> {
        match self.request(&Request::read(device, name)).await? {
            Response::Read(response) => Ok(response.value),
            other => Err(unexpected(other)),
        }
    }

    /// Execute one command.
    ///
    /// # Errors
    ///
    /// Same as [`JsonClient::read`].
    pub async fn execute(
        &self,
        device: DeviceId,
        name: &str,
        arguments: Vec<AttributeValue>,
    ) -> Result<AttributeValue, JsonApiError> {
        match self.request(&Request::execute(device, name, arguments)).await? {
            Response::Execute(response) => Ok(response.result),
            other => Err(unexpected(other)),
        }
    }

    /// Send `request` and wait for its envelope.
    ///
    /// Only opening the connection is retried; a request is never sent
    /// twice. After a transport failure the connection is dropped and the
    /// next request reconnects.
    ///
    /// # Errors
    ///
    /// Returns a connection error once the retry policy is exhausted, or the
    /// error of the failed exchange.
    #[tracing::instrument(skip(self))]
    pub async fn request(&self, request: &Request) -> Result<Response, JsonApiError> {
        let mut line = serde_json::to_vec(request).map_err(JsonApiError::Schema)?;
        line.push(b'\n');
        let mut connection = self.connection.lock().await;
        let mut current = match connection.take() {
            Some(current) => current,
            None => self.connect().await?,
        };
        let result = current.exchange(&line).await;
        if result.is_ok() {
            *connection = Some(current);
        }
        result
    }

    async fn connect(&self) -> Result<Connection, JsonApiError> {
        let addr = self.addr.as_str();
        let connection = self.retry.run(move || Connection::open(addr)).await?;
        tracing::debug!(addr, "connected");
        Ok(connection)
    }
}

fn unexpected(response: Response) -> JsonApiError {
    match response {
        Response::Error(err) => JsonApiError::Remote {
            code: err.error,
            detail: err.detail,
        },
        other => JsonApiError::Reply(serde::de::Error::custom(format!(
            "unexpected envelope: {other:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use pasd_adapter_simulator::Simulator;
    use pasd_app::services::AttributeService;
    use pasd_domain::device::Topology;
    use pasd_domain::error::ErrorCode;
    use tokio::net::TcpListener;

    use crate::JsonApi;

    async fn start_server() -> String {
        let topology = Topology::new(1);
        let api = JsonApi::new(Arc::new(AttributeService::new(Simulator::new(topology), topology)));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(api.serve(listener));
        addr
    }

    #[tokio::test]
    async fn should_read_attribute_over_tcp() {
        let addr = start_server().await;
        let client = JsonClient::new(addr, RetryPolicy::none());
        let value = client.read(DeviceId::HUB, "firmware_version").await.unwrap();
        assert_eq!(value, AttributeValue::Int(258));
    }

    #[tokio::test]
    async fn should_reuse_connection_for_several_requests() {
        let addr = start_server().await;
        let client = JsonClient::new(addr, RetryPolicy::none());
        let result = client
            .execute(DeviceId::new(1), "initialize", vec![])
            .await
            .unwrap();
        assert_eq!(result, AttributeValue::Bool(true));
        let status = client.read(DeviceId::new(1), "status").await.unwrap();
        assert_eq!(status, AttributeValue::from("OK"));
    }

    #[tokio::test]
    async fn should_surface_remote_error_code() {
        let addr = start_server().await;
        let client = JsonClient::new(addr, RetryPolicy::none());
        let err = client.read(DeviceId::HUB, "nonsense").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::Attribute);
        assert!(matches!(err, JsonApiError::Remote { .. }));
    }

    #[tokio::test]
    async fn should_fail_with_connection_error_when_nobody_listens() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);
        let client = JsonClient::new(addr, RetryPolicy::none());
        let err = client.read(DeviceId::HUB, "uptime").await.unwrap_err();
        assert!(matches!(err, JsonApiError::Io(_)));
    }
}
