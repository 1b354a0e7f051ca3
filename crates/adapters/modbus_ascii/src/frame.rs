//! Modbus ASCII framing.
//!
//! ```text
//! : UU PDU... LL CR LF
//! ```
//!
//! Every byte travels as two hexadecimal characters. `LL` is the
//! longitudinal redundancy check: the two's complement of the sum of the
//! unit and PDU bytes.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

/// Longest frame on the wire: start, 255 hex pairs, CRLF.
pub const MAX_FRAME_LEN: usize = 1 + 2 * 255 + 2;

const START: u8 = b':';
const END: &[u8] = b"\r\n";

/// Why a line is not a usable frame.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("missing ':' start character")]
    MissingStart,

    #[error("missing CRLF terminator")]
    MissingEnd,

    #[error("frame of {0} characters is too long")]
    TooLong(usize),

    #[error("odd number of hex characters")]
    OddLength,

    #[error("invalid hex character {0:?}")]
    InvalidHex(char),

    #[error("frame too short for unit, function and LRC")]
    TooShort,

    #[error("LRC mismatch: expected {expected:#04x}, got {actual:#04x}")]
    Lrc { expected: u8, actual: u8 },
}

/// One decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsciiFrame {
    pub unit: u8,
    pub pdu: Vec<u8>,
}

/// Two's complement of the byte sum.
#[must_use]
pub fn lrc(bytes: &[u8]) -> u8 {
    bytes
        .iter()
        .fold(0_u8, |sum, byte| sum.wrapping_add(*byte))
        .wrapping_neg()
}

fn hex_digit(nibble: u8) -> u8 {
    match nibble {
        0..=9 => b'0' + nibble,
        _ => b'A' + nibble - 10,
    }
}

fn nibble(character: u8) -> Result<u8, FrameError> {
    match character {
        b'0'..=b'9' => Ok(character - b'0'),
        b'A'..=b'F' => Ok(character - b'A' + 10),
        b'a'..=b'f' => Ok(character - b'a' + 10),
        _ => Err(FrameError::InvalidHex(char::from(character))),
    }
}

impl AsciiFrame {
    #[must_use]
    pub fn new(unit: u8, pdu: Vec<u8>) -> Self {
        Self { unit, pdu }
    }

    /// Frame bytes including start character and CRLF.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut raw = Vec::with_capacity(self.pdu.len() + 2);
        raw.push(self.unit);
        raw.extend_from_slice(&self.pdu);
        raw.push(lrc(&raw));

        let mut frame = Vec::with_capacity(1 + 2 * raw.len() + END.len());
        frame.push(START);
        for byte in raw {
            frame.push(hex_digit(byte >> 4));
            frame.push(hex_digit(byte & 0x0F));
        }
        frame.extend_from_slice(END);
        frame
    }

    /// Decode one line, terminator included.
    ///
    /// Characters before the start character are skipped. Hex digits are
    /// accepted in either case.
    ///
    /// # Errors
    ///
    /// Returns a [`FrameError`] for anything but a well-formed frame with a
    /// matching LRC and at least a function byte.
    pub fn decode(line: &[u8]) -> Result<Self, FrameError> {
        if line.len() > MAX_FRAME_LEN {
            return Err(FrameError::TooLong(line.len()));
        }
        let start = line
            .iter()
            .position(|byte| *byte == START)
            .ok_or(FrameError::MissingStart)?;
        let body = line[start + 1..]
            .strip_suffix(END)
            .ok_or(FrameError::MissingEnd)?;
        if !body.len().is_multiple_of(2) {
            return Err(FrameError::OddLength);
        }
        let mut raw = body
            .chunks_exact(2)
            .map(|pair| -> Result<u8, FrameError> {
                Ok((nibble(pair[0])? << 4) | nibble(pair[1])?)
            })
            .collect::<Result<Vec<u8>, FrameError>>()?;
        if raw.len() < 3 {
            return Err(FrameError::TooShort);
        }
        let actual = raw.pop().unwrap_or_default();
        let expected = lrc(&raw);
        if actual != expected {
            return Err(FrameError::Lrc { expected, actual });
        }
        let pdu = raw.split_off(1);
        Ok(Self { unit: raw[0], pdu })
    }
}

/// Read one line of at most [`MAX_FRAME_LEN`] bytes into `line`, replacing
/// its contents. Longer lines are dropped up to their newline.
///
/// Returns `false` at end of stream.
///
/// # Errors
///
/// Returns the underlying I/O error.
pub async fn read_line<R>(reader: &mut R, line: &mut Vec<u8>) -> std::io::Result<bool>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        line.clear();
        let limit = u64::try_from(MAX_FRAME_LEN).unwrap_or(u64::MAX);
        if (&mut *reader).take(limit).read_until(b'\n', line).await? == 0 {
            return Ok(false);
        }
        if line.ends_with(b"\n") || line.len() < MAX_FRAME_LEN {
            return Ok(true);
        }
        tracing::warn!(limit = MAX_FRAME_LEN, "dropping overlong frame");
        if !skip_line(reader).await? {
            return Ok(false);
        }
    }
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
