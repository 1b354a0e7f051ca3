//! Conversions between raw register words and engineering values.
//!
//! Every [`Conversion`] is a pure `decode` / `encode` pair over one element of
//! [`Conversion::width`] words. For reversible conversions
//! `encode(decode(words)) == words` whenever `decode` succeeds. The flag and
//! LED decoders produce display text; their `encode` takes the member list
//! instead and rebuilds the same raw word from it.

mod enums;

pub use enums::{DeviceStatus, FlagSet, HUB_FLAGS, SMARTBOX_FLAGS, ServiceLed, StatusLed};

use crate::error::ConversionError;
use crate::port_status::PortField;
use crate::value::AttributeValue;

/// Conversion applied to one attribute element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Conversion {
    /// One word as an unsigned integer.
    Raw,
    /// Unsigned word divided by `divisor` (voltages, currents).
    Scaled { divisor: u16 },
    /// Two's-complement word divided by `divisor` (temperatures).
    SignedScaled { divisor: u16 },
    /// Two words rendered as `0x…`, the low word holding a single byte.
    CpuId,
    /// Eight words rendered as 32 hex digits.
    ChipId,
    /// Two words combined as `(high << 16) | low` seconds.
    Uptime,
    /// Direct [`DeviceStatus`] code.
    Status,
    /// Bitmask of named warning/alarm flags.
    Flags(&'static FlagSet),
    /// Service LED (high byte) and status LED pattern (low byte).
    LedPattern,
    /// One field of a port-status word.
    Port(PortField),
}

/// The usual divisor for voltages, currents and temperatures.
pub const CENTI: u16 = 100;

const CHIP_ID_WORDS: usize = 8;

impl Conversion {
    /// Number of register words consumed by one element.
    #[must_use]
    pub const fn width(&self) -> usize {
        match self {
            Self::CpuId | Self::Uptime => 2,
            Self::ChipId => CHIP_ID_WORDS,
            Self::Raw
            | Self::Scaled { .. }
            | Self::SignedScaled { .. }
            | Self::Status
            | Self::Flags(_)
            | Self::LedPattern
            | Self::Port(_) => 1,
        }
    }

    /// Whether `encode` accepts exactly what `decode` produces.
    #[must_use]
    pub const fn is_reversible(&self) -> bool {
        !matches!(self, Self::Flags(_) | Self::LedPattern)
    }

    /// Whether this conversion only owns part of each word it decodes.
    #[must_use]
    pub const fn is_projection(&self) -> bool {
        matches!(self, Self::Port(_))
    }

    /// Decode one element.
    ///
    /// # Errors
    ///
    /// Returns [`ConversionError::WordCount`] when `words` is not exactly
    /// [`width`](Self::width) long, or another [`ConversionError`] when the
    /// payload is outside the conversion's domain.
    pub fn decode(&self, words: &[u16]) -> Result<AttributeValue, ConversionError> {
        if words.len() != self.width() {
            return Err(ConversionError::WordCount {
                expected: self.width(),
                actual: words.len(),
            });
        }
        let word = words[0];
        match self {
            Self::Raw => Ok(AttributeValue::Int(i64::from(word))),
            Self::Scaled { divisor } => Ok(AttributeValue::Float(
                f64::from(word) / f64::from(*divisor),
            )),
            Self::SignedScaled { divisor } => Ok(AttributeValue::Float(
                f64::from(as_signed(word)) / f64::from(*divisor),
            )),
            Self::CpuId => decode_cpu_id(word, words[1]),
            Self::ChipId => Ok(AttributeValue::Text(
                words.iter().map(|w| format!("{w:04X}")).collect(),
            )),
            Self::Uptime => Ok(AttributeValue::Int(i64::from(
                (u32::from(word) << 16) | u32::from(words[1]),
            ))),
            Self::Status => DeviceStatus::from_code(word)
                .map(|status| AttributeValue::Text(status.as_str().to_string()))
                .ok_or(ConversionError::UnknownCode { code: word }),
            Self::Flags(flags) => decode_flags(flags, word),
            Self::LedPattern => decode_led_pattern(word),
            Self::Port(field) => field.decode(word),
        }
    }

    /// Encode one element.
    ///
    /// # Errors
    ///
    /// Returns a [`ConversionError`] when `value` has the wrong type or does
    /// not fit the register range.
    pub fn encode(&self, value: &AttributeValue) -> Result<Vec<u16>, ConversionError> {
        match self {
            Self::Raw => {
                let raw = value
                    .as_i64()
                    .ok_or(ConversionError::UnexpectedType { expected: "integer" })?;
                Ok(vec![fit_u16(raw)?])
            }
            Self::Scaled { divisor } => {
                let scaled = scale(value, *divisor)?;
                if !(0.0..=f64::from(u16::MAX)).contains(&scaled) {
                    return Err(out_of_range(value));
                }
                Ok(vec![truncate_u16(scaled)])
            }
            Self::SignedScaled { divisor } => {
                let scaled = scale(value, *divisor)?;
                if !(f64::from(i16::MIN)..=f64::from(i16::MAX)).contains(&scaled) {
                    return Err(out_of_range(value));
                }
                Ok(vec![as_unsigned(truncate_i16(scaled))])
            }
            Self::CpuId => encode_cpu_id(value),
            Self::ChipId => encode_chip_id(value),
            Self::Uptime => {
                let seconds = value
                    .as_i64()
                    .ok_or(ConversionError::UnexpectedType { expected: "integer" })?;
                let seconds = u32::try_from(seconds).map_err(|_| out_of_range(value))?;
                Ok(vec![high_word(seconds), low_word(seconds)])
            }
            Self::Status => {
                let name = expect_text(value)?;
                DeviceStatus::from_name(name)
                    .map(|status| vec![status.code()])
                    .ok_or_else(|| unknown_member(name))
            }
            Self::Flags(flags) => encode_flags(flags, value),
            Self::LedPattern => encode_led_pattern(value),
            Self::Port(field) => Ok(vec![field.encode(value)?]),
        }
    }

    /// Encode either what [`encode`](Self::encode) takes or the display text
    /// [`decode`](Self::decode) produced for a non-reversible conversion.
    ///
    /// # Errors
    ///
    /// Same as [`encode`](Self::encode), plus
    /// [`ConversionError::UnknownMember`] for unparseable display text.
    pub fn reencode(&self, value: &AttributeValue) -> Result<Vec<u16>, ConversionError> {
        match (self, value) {
            (Self::Flags(flags), AttributeValue::Text(text)) => {
                let members = text
                    .split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(AttributeValue::from)
                    .collect();
                encode_flags(flags, &AttributeValue::List(members))
            }
            (Self::LedPattern, AttributeValue::Text(text)) => {
                let members = text
                    .strip_prefix("service: ")
                    .and_then(|rest| rest.split_once(", status: "))
                    .ok_or_else(|| unknown_member(text))?;
                encode_led_pattern(&AttributeValue::from(vec![members.0, members.1]))
            }
            _ => self.encode(value),
        }
    }
}

fn as_signed(word: u16) -> i16 {
    i16::from_be_bytes(word.to_be_bytes())
}

fn as_unsigned(value: i16) -> u16 {
    u16::from_be_bytes(value.to_be_bytes())
}

fn scale(value: &AttributeValue, divisor: u16) -> Result<f64, ConversionError> {
    let number = value
        .as_f64()
        .ok_or(ConversionError::UnexpectedType { expected: "number" })?;
    Ok((number * f64::from(divisor)).round())
}

// Callers range-check before truncating.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn truncate_u16(value: f64) -> u16 {
    value as u16
}

#[allow(clippy::cast_possible_truncation)]
fn truncate_i16(value: f64) -> i16 {
    value as i16
}

#[allow(clippy::cast_possible_truncation)]
fn high_word(value: u32) -> u16 {
    (value >> 16) as u16
}

#[allow(clippy::cast_possible_truncation)]
fn low_word(value: u32) -> u16 {
    (value & 0xFFFF) as u16
}

fn fit_u16(raw: i64) -> Result<u16, ConversionError> {
    u16::try_from(raw).map_err(|_| ConversionError::OutOfRange {
        value: lossy(raw),
    })
}

#[allow(clippy::cast_precision_loss)]
fn lossy(raw: i64) -> f64 {
    raw as f64
}

fn out_of_range(value: &AttributeValue) -> ConversionError {
    ConversionError::OutOfRange {
        value: value.as_f64().unwrap_or(f64::NAN),
    }
}

fn unknown_member(name: &str) -> ConversionError {
    ConversionError::UnknownMember {
        name: name.to_string(),
    }
}

fn expect_text(value: &AttributeValue) -> Result<&str, ConversionError> {
    value
        .as_str()
        .ok_or(ConversionError::UnexpectedType { expected: "text" })
}

fn decode_cpu_id(high: u16, low: u16) -> Result<AttributeValue, ConversionError> {
    if low > 0xFF {
        return Err(ConversionError::OutOfRange {
            value: f64::from(low),
        });
    }
    let id = (u32::from(high) << 8) | u32::from(low);
    Ok(AttributeValue::Text(format!("{id:#x}")))
}

fn encode_cpu_id(value: &AttributeValue) -> Result<Vec<u16>, ConversionError> {
    let text = expect_text(value)?;
    let invalid = || ConversionError::InvalidHex {
        text: text.to_string(),
    };
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .ok_or_else(invalid)?;
    let id = u32::from_str_radix(digits, 16).map_err(|_| invalid())?;
    if id > 0x00FF_FFFF {
        return Err(invalid());
    }
    Ok(vec![low_word(id >> 8), low_word(id & 0xFF)])
}

fn encode_chip_id(value: &AttributeValue) -> Result<Vec<u16>, ConversionError> {
    let text = expect_text(value)?;
    let invalid = || ConversionError::InvalidHex {
        text: text.to_string(),
    };
    if text.len() != CHIP_ID_WORDS * 4 || !text.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(invalid());
    }
    text.as_bytes()
        .chunks(4)
        .map(|chunk| {
            std::str::from_utf8(chunk)
                .ok()
                .and_then(|digits| u16::from_str_radix(digits, 16).ok())
                .ok_or_else(invalid)
        })
        .collect()
}

fn decode_flags(flags: &FlagSet, bits: u16) -> Result<AttributeValue, ConversionError> {
    let undefined = bits & !flags.mask();
    if undefined != 0 {
        return Err(ConversionError::UndefinedFlags { bits: undefined });
    }
    Ok(AttributeValue::Text(
        flags.active(bits).collect::<Vec<_>>().join(","),
    ))
}

fn encode_flags(flags: &FlagSet, value: &AttributeValue) -> Result<Vec<u16>, ConversionError> {
    let members = value.as_list().ok_or(ConversionError::UnexpectedType {
        expected: "list of flag names",
    })?;
    let mut bits = 0;
    for member in members {
        let name = expect_text(member)?;
        bits |= flags.bit(name).ok_or_else(|| unknown_member(name))?;
    }
    Ok(vec![bits])
}

fn decode_led_pattern(word: u16) -> Result<AttributeValue, ConversionError> {
    let service = ServiceLed::from_code(word >> 8)
        .ok_or(ConversionError::UnknownCode { code: word >> 8 })?;
    let status = StatusLed::from_code(word & 0xFF)
        .ok_or(ConversionError::UnknownCode { code: word & 0xFF })?;
    Ok(AttributeValue::Text(format!(
        "service: {service}, status: {status}"
    )))
}

fn encode_led_pattern(value: &AttributeValue) -> Result<Vec<u16>, ConversionError> {
    let members = value.as_list().ok_or(ConversionError::UnexpectedType {
        expected: "[service, status] list",
    })?;
    let [service, status] = members else {
        return Err(ConversionError::ElementCount {
            expected: 2,
            actual: members.len(),
        });
    };
    let service_name = expect_text(service)?;
    let status_name = expect_text(status)?;
    let service = ServiceLed::from_name(service_name).ok_or_else(|| unknown_member(service_name))?;
    let status = StatusLed::from_name(status_name).ok_or_else(|| unknown_member(status_name))?;
    Ok(vec![(service.code() << 8) | status.code()])
}
