//! Line-delimited JSON server.

use std::sync::Arc;

use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::net::TcpListener;

use pasd_app::ports::Backend;
use pasd_app::services::AttributeService;

use crate::error::JsonApiError;
use crate::protocol::{Request, Response};

/// Envelope sent if an envelope itself cannot be serialized.
const FALLBACK_ENVELOPE: &[u8] =
    br#"{"status":"error","error":"command","detail":"reply could not be encoded","timestamp":null}"#;

/// Longest request line accepted, terminator excluded.
pub const MAX_REQUEST_LEN: usize = 64 * 1024;

/// Answers JSON requests through an [`AttributeService`].
pub struct JsonApi<B> {
    service: Arc<AttributeService<B>>,
}

impl<B> Clone for JsonApi<B> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
        }
    }
}

impl<B: Backend + 'static> JsonApi<B> {
    #[must_use]
    pub fn new(service: Arc<AttributeService<B>>) -> Self {
        Self { service }
    }

    /// Answer one request document. Never fails: every problem becomes an
    /// error envelope.
    pub async fn handle(&self, bytes: &[u8]) -> Vec<u8> {
        let response = match self.dispatch(bytes).await {
            Ok(response) => response,
            Err(err) => {
                tracing::debug!(code = %err.code(), error = %err.detail(), "request failed");
                Response::error(&err)
            }
        };
        encode(&response)
    }

    async fn dispatch(&self, bytes: &[u8]) -> Result<Response, JsonApiError> {
        match Request::decode(bytes)? {
            Request::Read(request) => {
                let value = self.service.read(request.device_id, &request.read).await?;
                Ok(Response::read(request.read, value))
            }
            Request::Execute(request) => {
                let result = self
                    .service
                    .execute(request.device_id, &request.execute, request.arguments)
                    .await?;
                Ok(Response::execute(request.execute, result))
            }
        }
    }

    /// Answer newline-terminated requests on `stream` until it closes.
    ///
    /// Blank lines are skipped. A line longer than [`MAX_REQUEST_LEN`] is
    /// answered with a decode error and discarded up to its newline.
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
        let limit = u64::try_from(MAX_REQUEST_LEN + 1).unwrap_or(u64::MAX);
        let mut line = Vec::new();
        loop {
            line.clear();
            if (&mut reader).take(limit).read_until(b'\n', &mut line).await? == 0 {
                return Ok(());
            }
            let overlong = line.len() > MAX_REQUEST_LEN && !line.ends_with(b"\n");
            let mut reply = if overlong {
                let err = JsonApiError::TooLong {
                    limit: MAX_REQUEST_LEN,
                };
                tracing::warn!(limit = MAX_REQUEST_LEN, "discarding overlong request");
                encode(&Response::error(&err))
            } else {
                let request = line.trim_ascii();
                if request.is_empty() {
                    continue;
                }
                self.handle(request).await
            };
            reply.push(b'\n');
            writer.write_all(&reply).await?;
            writer.flush().await?;
            if overlong && !skip_line(&mut reader).await? {
                return Ok(());
            }
        }
    }

    /// Accept connections on `listener` forever, one task per connection.
    ///
    /// # Errors
    ///
    /// Returns the error of a failed `accept`.
    pub async fn serve(self, listener: TcpListener) -> std::io::Result<()> {
        if let Ok(addr) = listener.local_addr() {
            tracing::info!(%addr, "json transport listening");
        }
        loop {
            let (stream, peer) = listener.accept().await?;
            tracing::debug!(%peer, "json client connected");
            let api = self.clone();
            tokio::spawn(async move {
                if let Err(err) = api.serve_connection(stream).await {
                    tracing::warn!(%peer, error = %err, "json connection failed");
                }
                tracing::debug!(%peer, "json client disconnected");
            });
        }
    }
}

fn encode(response: &Response) -> Vec<u8> {
    serde_json::to_vec(response).unwrap_or_else(|err| {
        tracing::error!(error = %err, "failed to encode reply");
        FALLBACK_ENVELOPE.to_vec()
    })
}

/// Consume input up to and including the next newline. Returns `false` if
/// the stream ends first.
async fn skip_line<R>(reader: &mut R) -> std::io::Result<bool>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let buffer = reader.fill_buf().await?;
        if buffer.is_empty() {
            return Ok(false);
        }
        let (used, found) = match buffer.iter().position(|byte| *byte == b'\n') {
            Some(end) => (end + 1, true),
            None => (buffer.len(), false),
        };
        reader.consume(used);
        if found {
            return Ok(true);
        }
    }
}
