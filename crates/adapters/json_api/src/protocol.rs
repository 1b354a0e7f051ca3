//! Request and envelope documents of the JSON transport.
//!
//! A request is exactly one of
//!
//! ```json
//! {"read": "<attribute>", "device_id": 0}
//! {"execute": "<command>", "arguments": [...], "device_id": 0}
//! ```
//!
//! with `device_id` defaulting to the hub and `arguments` to no arguments.
//! Every reply carries an RFC 3339 UTC timestamp.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pasd_domain::device::DeviceId;
use pasd_domain::error::ErrorCode;
use pasd_domain::value::AttributeValue;

use crate::error::JsonApiError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReadRequest {
    pub read: String,
    #[serde(default)]
    pub device_id: DeviceId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExecuteRequest {
    pub execute: String,
    #[serde(default)]
    pub arguments: Vec<AttributeValue>,
    #[serde(default)]
    pub device_id: DeviceId,
}

/// One validated request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Request {
    Read(ReadRequest),
    Execute(ExecuteRequest),
}

impl Request {
    /// Decode raw request bytes.
    ///
    /// # Errors
    ///
    /// Returns [`JsonApiError::Utf8`] or [`JsonApiError::Json`] when the bytes
    /// are not a JSON document, and [`JsonApiError::Schema`] when the document
    /// is neither a read nor an execute request.
    pub fn decode(bytes: &[u8]) -> Result<Self, JsonApiError> {
        let text = std::str::from_utf8(bytes).map_err(JsonApiError::Utf8)?;
        let document: serde_json::Value =
            serde_json::from_str(text).map_err(JsonApiError::Json)?;
        serde_json::from_value(document).map_err(JsonApiError::Schema)
    }

    #[must_use]
    pub fn read(device: DeviceId, name: impl Into<String>) -> Self {
        Self::Read(ReadRequest {
            read: name.into(),
            device_id: device,
        })
    }

    #[must_use]
    pub fn execute(device: DeviceId, name: impl Into<String>, arguments: Vec<AttributeValue>) -> Self {
        Self::Execute(ExecuteRequest {
            execute: name.into(),
            arguments,
            device_id: device,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadResponse {
    pub attribute: String,
    pub value: AttributeValue,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecuteResponse {
    pub command: String,
    pub result: AttributeValue,
    pub timestamp: DateTime<Utc>,
}

/// Always `"error"`; present only in error envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: Status,
    pub error: ErrorCode,
    pub detail: String,
    pub timestamp: DateTime<Utc>,
}

/// Any reply the server sends.
///
/// Error envelopes are tried first: they are the only ones with `status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    Error(ErrorResponse),
    Read(ReadResponse),
    Execute(ExecuteResponse),
}

impl Response {
    #[must_use]
    pub fn read(attribute: impl Into<String>, value: AttributeValue) -> Self {
        Self::Read(ReadResponse {
            attribute: attribute.into(),
            value,
            timestamp: Utc::now(),
        })
    }

    #[must_use]
    pub fn execute(command: impl Into<String>, result: AttributeValue) -> Self {
        Self::Execute(ExecuteResponse {
            command: command.into(),
            result,
            timestamp: Utc::now(),
        })
    }

    #[must_use]
    pub fn error(err: &JsonApiError) -> Self {
        Self::Error(ErrorResponse {
            status: Status::Error,
            error: err.code(),
            detail: err.detail(),
            timestamp: Utc::now(),
        })
    }

    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::Error(response) => response.timestamp,
            Self::Read(response) => response.timestamp,
            Self::Execute(response) => response.timestamp,
        }
    }
}
