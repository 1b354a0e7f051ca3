//! Modbus adapter error types.

use std::time::Duration;

use pasd_domain::error::PasdError;

use crate::frame::FrameError;
use crate::pdu::{ExceptionCode, PduError};

/// Errors specific to the Modbus transport.
#[derive(Debug, thiserror::Error)]
pub enum ModbusError {
    /// A line on the wire is not a valid ASCII frame.
    #[error("invalid frame")]
    Frame(#[from] FrameError),

    /// A frame carries a PDU that does not parse.
    #[error("invalid PDU")]
    Pdu(#[from] PduError),

    /// The device answered with an exception.
    #[error("function {function:#04x} failed with {code}")]
    Exception { function: u8, code: ExceptionCode },

    /// The response does not answer the request that was sent.
    #[error("response does not match request: {0}")]
    Mismatch(&'static str),

    /// The connection failed.
    #[error("connection error")]
    Io(#[from] std::io::Error),

    /// The peer closed the connection mid-transaction.
    #[error("connection closed by peer")]
    Closed,

    /// No response arrived in time.
    #[error("no response within {0:?}")]
    Timeout(Duration),
}

/// Every transport failure reaches the service as [`PasdError::Command`].
impl From<ModbusError> for PasdError {
    fn from(err: ModbusError) -> Self {
        PasdError::command(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pasd_domain::error::ErrorCode;

    #[test]
    fn should_display_exception_with_code() {
        let err = ModbusError::Exception {
            function: 0x03,
            code: ExceptionCode::IllegalDataAddress,
        };
        assert_eq!(
            err.to_string(),
            "function 0x03 failed with illegal data address (0x02)"
        );
    }

    #[test]
    fn should_convert_transport_error_to_command_error() {
        let err: PasdError = ModbusError::Timeout(Duration::from_millis(500)).into();
        assert_eq!(err.code(), ErrorCode::Command);
        assert!(err.detail().contains("500ms"));
    }

    #[test]
    fn should_report_remote_exception_as_command_error() {
        let err: PasdError = ModbusError::Exception {
            function: 0x06,
            code: ExceptionCode::IllegalDataAddress,
        }
        .into();
        assert_eq!(err.code(), ErrorCode::Command);
        assert!(err.detail().contains("function 0x06 failed"));
    }

    #[test]
    fn should_include_frame_cause_in_detail() {
        let err: PasdError = ModbusError::from(FrameError::MissingStart).into();
        assert!(err.detail().contains("missing ':' start character"));
    }
}
