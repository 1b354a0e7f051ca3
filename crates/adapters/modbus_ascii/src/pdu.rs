//! Protocol data units for the supported function subset.

use std::fmt;

use pasd_domain::error::{AddressingError, PasdError};

/// Supported function codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FunctionCode {
    ReadHoldingRegisters = 0x03,
    WriteSingleRegister = 0x06,
    WriteMultipleRegisters = 0x10,
}

impl FunctionCode {
    #[must_use]
    pub fn from_u8(code: u8) -> Option<Self> {
        match code {
            0x03 => Some(Self::ReadHoldingRegisters),
            0x06 => Some(Self::WriteSingleRegister),
            0x10 => Some(Self::WriteMultipleRegisters),
            _ => None,
        }
    }

    #[must_use]
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Standard exception codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExceptionCode {
    IllegalFunction = 0x01,
    IllegalDataAddress = 0x02,
    IllegalDataValue = 0x03,
    SlaveDeviceFailure = 0x04,
    Acknowledge = 0x05,
    SlaveDeviceBusy = 0x06,
    MemoryParityError = 0x08,
    GatewayPathUnavailable = 0x0A,
    GatewayTargetDeviceFailedToRespond = 0x0B,
}

impl ExceptionCode {
    #[must_use]
    pub fn from_u8(code: u8) -> Option<Self> {
        match code {
            0x01 => Some(Self::IllegalFunction),
            0x02 => Some(Self::IllegalDataAddress),
            0x03 => Some(Self::IllegalDataValue),
            0x04 => Some(Self::SlaveDeviceFailure),
            0x05 => Some(Self::Acknowledge),
            0x06 => Some(Self::SlaveDeviceBusy),
            0x08 => Some(Self::MemoryParityError),
            0x0A => Some(Self::GatewayPathUnavailable),
            0x0B => Some(Self::GatewayTargetDeviceFailedToRespond),
            _ => None,
        }
    }

    #[must_use]
    pub fn code(self) -> u8 {
        self as u8
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::IllegalFunction => "illegal function",
            Self::IllegalDataAddress => "illegal data address",
            Self::IllegalDataValue => "illegal data value",
            Self::SlaveDeviceFailure => "slave device failure",
            Self::Acknowledge => "acknowledge",
            Self::SlaveDeviceBusy => "slave device busy",
            Self::MemoryParityError => "memory parity error",
            Self::GatewayPathUnavailable => "gateway path unavailable",
            Self::GatewayTargetDeviceFailedToRespond => "gateway target device failed to respond",
        }
    }
}

impl fmt::Display for ExceptionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:#04x})", self.name(), self.code())
    }
}

impl From<&PasdError> for ExceptionCode {
    fn from(err: &PasdError) -> Self {
        match err {
            PasdError::Addressing(AddressingError::UnknownDevice(_)) | PasdError::Command(_) => {
                Self::GatewayTargetDeviceFailedToRespond
            }
            PasdError::Addressing(_)
            | PasdError::Configuration(_)
            | PasdError::NotWritable(_)
            | PasdError::UnknownAttribute(_)
            | PasdError::UnknownCommand(_) => Self::IllegalDataAddress,
            PasdError::Conversion(_) => Self::IllegalDataValue,
        }
    }
}

/// A PDU that cannot be understood.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PduError {
    #[error("empty PDU")]
    Empty,

    #[error("unsupported function {0:#04x}")]
    UnsupportedFunction(u8),

    #[error("malformed PDU for function {0:#04x}")]
    Malformed(u8),

    #[error("unknown exception code {0:#04x}")]
    UnknownException(u8),
}

impl PduError {
    /// Exception reported back for this error.
    #[must_use]
    pub fn exception(&self) -> ExceptionCode {
        match self {
            Self::UnsupportedFunction(_) => ExceptionCode::IllegalFunction,
            Self::Empty | Self::Malformed(_) | Self::UnknownException(_) => {
                ExceptionCode::IllegalDataValue
            }
        }
    }
}

fn word(bytes: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([bytes[offset], bytes[offset + 1]])
}

fn words(bytes: &[u8]) -> Vec<u16> {
    bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect()
}

/// Register count of a PDU, saturating for lists no PDU can carry.
fn count_of(values: &[u16]) -> u16 {
    u16::try_from(values.len()).unwrap_or(u16::MAX)
}

/// A request PDU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    ReadHoldingRegisters { address: u16, count: u16 },
    WriteSingleRegister { address: u16, value: u16 },
    WriteMultipleRegisters { address: u16, values: Vec<u16> },
}

impl Request {
    #[must_use]
    pub fn function(&self) -> FunctionCode {
        match self {
            Self::ReadHoldingRegisters { .. } => FunctionCode::ReadHoldingRegisters,
            Self::WriteSingleRegister { .. } => FunctionCode::WriteSingleRegister,
            Self::WriteMultipleRegisters { .. } => FunctionCode::WriteMultipleRegisters,
        }
    }

    /// # Errors
    ///
    /// Returns [`PduError::UnsupportedFunction`] outside 0x03/0x06/0x10 and
    /// [`PduError::Malformed`] when the length or byte count is wrong.
    pub fn decode(pdu: &[u8]) -> Result<Self, PduError> {
        let (&code, body) = pdu.split_first().ok_or(PduError::Empty)?;
        let function = FunctionCode::from_u8(code).ok_or(PduError::UnsupportedFunction(code))?;
        let malformed = PduError::Malformed(code);
        match function {
            FunctionCode::ReadHoldingRegisters if body.len() == 4 => Ok(Self::ReadHoldingRegisters {
                address: word(body, 0),
                count: word(body, 2),
            }),
            FunctionCode::WriteSingleRegister if body.len() == 4 => Ok(Self::WriteSingleRegister {
                address: word(body, 0),
                value: word(body, 2),
            }),
            FunctionCode::WriteMultipleRegisters if body.len() >= 5 => {
                let count = usize::from(word(body, 2));
                let byte_count = usize::from(body[4]);
                let data = &body[5..];
                if byte_count != 2 * count || data.len() != byte_count {
                    return Err(malformed);
                }
                Ok(Self::WriteMultipleRegisters {
                    address: word(body, 0),
                    values: words(data),
                })
            }
            _ => Err(malformed),
        }
    }

    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut pdu = vec![self.function().code()];
        match self {
            Self::ReadHoldingRegisters { address, count } => {
                pdu.extend_from_slice(&address.to_be_bytes());
                pdu.extend_from_slice(&count.to_be_bytes());
            }
            Self::WriteSingleRegister { address, value } => {
                pdu.extend_from_slice(&address.to_be_bytes());
                pdu.extend_from_slice(&value.to_be_bytes());
            }
            Self::WriteMultipleRegisters { address, values } => {
                pdu.extend_from_slice(&address.to_be_bytes());
                pdu.extend_from_slice(&count_of(values).to_be_bytes());
                pdu.push(u8::try_from(values.len() * 2).unwrap_or(u8::MAX));
                for value in values {
                    pdu.extend_from_slice(&value.to_be_bytes());
                }
            }
        }
        pdu
    }
}

/// A response PDU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    ReadHoldingRegisters(Vec<u16>),
    WriteSingleRegister { address: u16, value: u16 },
    WriteMultipleRegisters { address: u16, count: u16 },
    Exception { function: u8, code: ExceptionCode },
}

impl Response {
    /// # Errors
    ///
    /// Returns a [`PduError`] for a response that does not parse.
    pub fn decode(pdu: &[u8]) -> Result<Self, PduError> {
        let (&code, body) = pdu.split_first().ok_or(PduError::Empty)?;
        if code & 0x80 != 0 {
            let &[exception] = body else {
                return Err(PduError::Malformed(code));
            };
            return Ok(Self::Exception {
                function: code & 0x7F,
                code: ExceptionCode::from_u8(exception)
                    .ok_or(PduError::UnknownException(exception))?,
            });
        }
        let function = FunctionCode::from_u8(code).ok_or(PduError::UnsupportedFunction(code))?;
        match function {
            FunctionCode::ReadHoldingRegisters => {
                let (&byte_count, data) = body.split_first().ok_or(PduError::Malformed(code))?;
                if data.len() != usize::from(byte_count) || !data.len().is_multiple_of(2) {
                    return Err(PduError::Malformed(code));
                }
                Ok(Self::ReadHoldingRegisters(words(data)))
            }
            FunctionCode::WriteSingleRegister if body.len() == 4 => Ok(Self::WriteSingleRegister {
                address: word(body, 0),
                value: word(body, 2),
            }),
            FunctionCode::WriteMultipleRegisters if body.len() == 4 => {
                Ok(Self::WriteMultipleRegisters {
                    address: word(body, 0),
                    count: word(body, 2),
                })
            }
            _ => Err(PduError::Malformed(code)),
        }
    }

    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Self::ReadHoldingRegisters(values) => {
                let mut pdu = vec![
                    FunctionCode::ReadHoldingRegisters.code(),
                    u8::try_from(values.len() * 2).unwrap_or(u8::MAX),
                ];
                for value in values {
                    pdu.extend_from_slice(&value.to_be_bytes());
                }
                pdu
            }
            Self::WriteSingleRegister { address, value } => {
                let mut pdu = vec![FunctionCode::WriteSingleRegister.code()];
                pdu.extend_from_slice(&address.to_be_bytes());
                pdu.extend_from_slice(&value.to_be_bytes());
                pdu
            }
            Self::WriteMultipleRegisters { address, count } => {
                let mut pdu = vec![FunctionCode::WriteMultipleRegisters.code()];
                pdu.extend_from_slice(&address.to_be_bytes());
                pdu.extend_from_slice(&count.to_be_bytes());
                pdu
            }
            Self::Exception { function, code } => vec![function | 0x80, code.code()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pasd_domain::device::{DeviceId, DeviceKind};
    use pasd_domain::error::{ConversionError, NotWritableError};

    #[test]
    fn should_decode_read_request() {
        assert_eq!(
            Request::decode(&[0x03, 0x00, 0x10, 0x00, 0x02]),
            Ok(Request::ReadHoldingRegisters {
                address: 16,
                count: 2
            })
        );
    }

    #[test]
    fn should_decode_write_multiple_request() {
        let pdu = [0x10, 0x03, 0xE8, 0x00, 0x02, 0x04, 0x14, 0x50, 0x13, 0x88];
        assert_eq!(
            Request::decode(&pdu),
            Ok(Request::WriteMultipleRegisters {
                address: 1000,
                values: vec![5200, 5000]
            })
        );
    }

    #[test]
    fn should_reject_unsupported_function() {
        let err = Request::decode(&[0x04, 0x00, 0x00, 0x00, 0x01]).unwrap_err();
        assert_eq!(err, PduError::UnsupportedFunction(0x04));
        assert_eq!(err.exception(), ExceptionCode::IllegalFunction);
    }

    #[test]
    fn should_reject_byte_count_mismatch() {
        let err = Request::decode(&[0x10, 0x00, 0x00, 0x00, 0x02, 0x02, 0x00, 0x01]).unwrap_err();
        assert_eq!(err, PduError::Malformed(0x10));
        assert_eq!(err.exception(), ExceptionCode::IllegalDataValue);
    }

    #[test]
    fn should_reject_truncated_read() {
        assert_eq!(
            Request::decode(&[0x03, 0x00, 0x00]),
            Err(PduError::Malformed(0x03))
        );
    }

    #[test]
    fn should_encode_requests_like_the_wire() {
        let read = Request::ReadHoldingRegisters {
            address: 0x6B,
            count: 3,
        };
        assert_eq!(read.encode(), vec![0x03, 0x00, 0x6B, 0x00, 0x03]);
        let write = Request::WriteMultipleRegisters {
            address: 1,
            values: vec![0x000A, 0x0102],
        };
        assert_eq!(
            write.encode(),
            vec![0x10, 0x00, 0x01, 0x00, 0x02, 0x04, 0x00, 0x0A, 0x01, 0x02]
        );
    }

    #[test]
    fn should_encode_read_response_with_byte_count() {
        let response = Response::ReadHoldingRegisters(vec![0x022B, 0x0000]);
        assert_eq!(response.encode(), vec![0x03, 0x04, 0x02, 0x2B, 0x00, 0x00]);
    }

    #[test]
    fn should_encode_exception_with_high_bit() {
        let response = Response::Exception {
            function: 0x03,
            code: ExceptionCode::IllegalDataAddress,
        };
        assert_eq!(response.encode(), vec![0x83, 0x02]);
        assert_eq!(Response::decode(&[0x83, 0x02]), Ok(response));
    }

    #[test]
    fn should_decode_write_echoes() {
        assert_eq!(
            Response::decode(&[0x06, 0x00, 0x24, 0x20, 0x00]),
            Ok(Response::WriteSingleRegister {
                address: 36,
                value: 0x2000
            })
        );
        assert_eq!(
            Response::decode(&[0x10, 0x03, 0xE8, 0x00, 0x04]),
            Ok(Response::WriteMultipleRegisters {
                address: 1000,
                count: 4
            })
        );
    }

    #[test]
    fn should_reject_read_response_with_wrong_byte_count() {
        assert_eq!(
            Response::decode(&[0x03, 0x04, 0x00, 0x01]),
            Err(PduError::Malformed(0x03))
        );
    }

    #[test]
    fn should_map_domain_errors_to_exceptions() {
        let unknown_device = PasdError::Addressing(AddressingError::UnknownDevice(DeviceId::new(7)));
        assert_eq!(
            ExceptionCode::from(&unknown_device),
            ExceptionCode::GatewayTargetDeviceFailedToRespond
        );
        let unmapped = PasdError::Addressing(AddressingError::UnmappedRegister {
            kind: DeviceKind::Hub,
            address: 500,
        });
        assert_eq!(ExceptionCode::from(&unmapped), ExceptionCode::IllegalDataAddress);
        let read_only = PasdError::NotWritable(NotWritableError {
            name: "uptime".to_string(),
        });
        assert_eq!(ExceptionCode::from(&read_only), ExceptionCode::IllegalDataAddress);
        let conversion = PasdError::Conversion(ConversionError::OutOfRange { value: 1e9 });
        assert_eq!(ExceptionCode::from(&conversion), ExceptionCode::IllegalDataValue);
        let backend = PasdError::command("bus down");
        assert_eq!(
            ExceptionCode::from(&backend),
            ExceptionCode::GatewayTargetDeviceFailedToRespond
        );
    }
}
