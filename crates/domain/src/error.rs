//! Error taxonomy shared by every layer and both transports.
//!
//! Each failure kind has its own typed error; [`PasdError`] gathers them via
//! `#[from]` and maps them onto the closed wire-level [`ErrorCode`] set.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::device::{DeviceId, DeviceKind};
use crate::port_status::PortStatusError;

/// Closed set of error codes reported in response envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCode {
    /// Malformed input bytes or text.
    Decode,
    /// Well-formed but structurally invalid request.
    Schema,
    /// Unknown attribute or command name.
    Attribute,
    /// The backend raised while executing.
    Command,
    /// A register payload could not be decoded or encoded.
    Conversion,
    /// Unknown device id or unmapped register span.
    Addressing,
    /// Write attempted on a read-only attribute.
    NotWritable,
}

impl ErrorCode {
    /// Wire spelling of the code.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Decode => "decode",
            Self::Schema => "schema",
            Self::Attribute => "attribute",
            Self::Command => "command",
            Self::Conversion => "conversion",
            Self::Addressing => "addressing",
            Self::NotWritable => "not-writable",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-level error for the translation layer.
#[derive(Debug, thiserror::Error)]
pub enum PasdError {
    #[error("unknown attribute")]
    UnknownAttribute(#[from] UnknownAttributeError),

    #[error("unknown command")]
    UnknownCommand(#[from] UnknownCommandError),

    #[error("attribute not writable")]
    NotWritable(#[from] NotWritableError),

    #[error("conversion failed")]
    Conversion(#[from] ConversionError),

    #[error("addressing error")]
    Addressing(#[from] AddressingError),

    #[error("register map inconsistency")]
    Configuration(#[from] ConfigurationError),

    /// The backend (or the bus behind it) failed while executing.
    #[error("command failed")]
    Command(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl PasdError {
    /// Wrap any backend failure as a [`PasdError::Command`].
    pub fn command(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Command(err.into())
    }

    /// Wire-level code for this error.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::UnknownAttribute(_) | Self::UnknownCommand(_) => ErrorCode::Attribute,
            Self::NotWritable(_) => ErrorCode::NotWritable,
            Self::Conversion(_) => ErrorCode::Conversion,
            Self::Addressing(_) | Self::Configuration(_) => ErrorCode::Addressing,
            Self::Command(_) => ErrorCode::Command,
        }
    }

    /// Human-readable detail: this error followed by its source chain.
    #[must_use]
    pub fn detail(&self) -> String {
        let mut detail = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(err) = source {
            detail.push_str(": ");
            detail.push_str(&err.to_string());
            source = err.source();
        }
        detail
    }
}

/// No attribute with the given name exists for the device kind.
#[derive(Debug, thiserror::Error)]
#[error("no attribute named {name:?} on {kind}")]
pub struct UnknownAttributeError {
    pub kind: DeviceKind,
    pub name: String,
}

/// No command with the given name exists for the device kind.
#[derive(Debug, thiserror::Error)]
#[error("no command named {name:?} on {kind}")]
pub struct UnknownCommandError {
    pub kind: DeviceKind,
    pub name: String,
}

/// The attribute exists but is read-only.
#[derive(Debug, thiserror::Error)]
#[error("attribute {name:?} is read-only")]
pub struct NotWritableError {
    pub name: String,
}

/// Device or register addressing failures.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum AddressingError {
    #[error("device {0} is not configured")]
    UnknownDevice(DeviceId),

    #[error("register {address} is not mapped on {kind}")]
    UnmappedRegister { kind: DeviceKind, address: u16 },

    #[error("{count} registers at {address} exceed the address space")]
    SpanOverflow { address: u16, count: u16 },

    #[error("register count {count} is outside 1..={max}")]
    InvalidQuantity { count: u16, max: u16 },
}

/// The register map itself is inconsistent.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("{first} and {second} both start at register {address} with different lengths")]
    ConflictingLength {
        address: u16,
        first: &'static str,
        second: &'static str,
    },
}

/// A register payload could not be decoded, or a value could not be encoded.
#[derive(Debug, PartialEq, thiserror::Error)]
pub enum ConversionError {
    #[error("expected {expected} register words, got {actual}")]
    WordCount { expected: usize, actual: usize },

    #[error("expected {expected} elements, got {actual}")]
    ElementCount { expected: usize, actual: usize },

    #[error("expected a {expected} value")]
    UnexpectedType { expected: &'static str },

    #[error("value {value} does not fit the register range")]
    OutOfRange { value: f64 },

    #[error("unknown enumerated code {code}")]
    UnknownCode { code: u16 },

    #[error("undefined flag bits {bits:#06x}")]
    UndefinedFlags { bits: u16 },

    #[error("unknown enumeration member {name:?}")]
    UnknownMember { name: String },

    #[error("invalid hexadecimal identifier {text:?}")]
    InvalidHex { text: String },

    #[error("invalid port status word")]
    PortStatus(#[from] PortStatusError),
}
