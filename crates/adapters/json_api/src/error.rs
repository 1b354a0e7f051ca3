//! JSON transport error types.

use pasd_domain::error::{ErrorCode, PasdError};

/// Errors specific to the JSON transport.
#[derive(Debug, thiserror::Error)]
pub enum JsonApiError {
    /// The request bytes are not UTF-8.
    #[error("request is not valid UTF-8")]
    Utf8(#[source] std::str::Utf8Error),

    /// The request line is longer than the server accepts.
    #[error("request exceeds {limit} bytes")]
    TooLong { limit: usize },

    /// The request text is not a JSON document.
    #[error("request is not valid JSON")]
    Json(#[source] serde_json::Error),

    /// The document is JSON but not a read or execute request.
    #[error("request does not match the read or execute schema")]
    Schema(#[source] serde_json::Error),

    /// The connection to the server failed.
    #[error("connection error")]
    Io(#[from] std::io::Error),

    /// The server answered something other than an envelope.
    #[error("unexpected reply from server")]
    Reply(#[source] serde_json::Error),

    /// The server answered with an error envelope.
    #[error("server reported {code}: {detail}")]
    Remote { code: ErrorCode, detail: String },

    /// A domain-level error (unknown attribute, conversion, ...).
    #[error("domain error")]
    Domain(#[source] PasdError),
}

impl JsonApiError {
    /// Wire-level code for this error.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Utf8(_) | Self::TooLong { .. } | Self::Json(_) => ErrorCode::Decode,
            Self::Schema(_) => ErrorCode::Schema,
            Self::Io(_) | Self::Reply(_) => ErrorCode::Command,
            Self::Remote { code, .. } => *code,
            Self::Domain(err) => err.code(),
        }
    }

    /// Detail text for an error envelope.
    #[must_use]
    pub fn detail(&self) -> String {
        match self {
            Self::Domain(err) => err.detail(),
            Self::Remote { detail, .. } => detail.clone(),
            other => {
                let mut detail = other.to_string();
                let mut source = std::error::Error::source(other);
                while let Some(err) = source {
                    detail.push_str(": ");
                    detail.push_str(&err.to_string());
                    source = err.source();
                }
                detail
            }
        }
    }

    /// Convert into a [`PasdError`] for propagation across port boundaries.
    pub fn into_domain(self) -> PasdError {
        match self {
            Self::Domain(err) => err,
            other => PasdError::command(other),
        }
    }
}

impl From<PasdError> for JsonApiError {
    fn from(err: PasdError) -> Self {
        Self::Domain(err)
    }
}

impl From<JsonApiError> for PasdError {
    fn from(err: JsonApiError) -> Self {
        err.into_domain()
    }
}
