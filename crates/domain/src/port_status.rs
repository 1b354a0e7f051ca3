//! Port-status word codec.
//!
//! Every physical port reports one packed 16-bit word:
//!
//! | Bits | Field |
//! |------|-------|
//! | 0–5 | reserved |
//! | 6 | local power |
//! | 7 | power sensed (reads as "breaker tripped" on smartboxes) |
//! | 8–9 | forcing: bit 8 → ON, bit 9 → OFF |
//! | 10–11 | desired power when offline: bit 11 → ON, bit 10 → OFF |
//! | 12–13 | desired power when online: bit 13 → ON, bit 12 → OFF |
//! | 14–15 | reserved |
//!
//! Both forcing bits set is never a legal state and fails every decode of the
//! word. A desired-power pair with both bits set is kept as
//! [`DesiredPower::Conflicting`] and only fails the projection of that field.
//! When writing, a desired-power pair of `00` means "leave unchanged" and a
//! lone bit 7 requests a breaker reset.

use serde::{Deserialize, Serialize};

use crate::error::ConversionError;
use crate::value::AttributeValue;

const LOCAL_POWER: u16 = 1 << 6;
const POWER_SENSED: u16 = 1 << 7;
const FORCE_ON: u16 = 1 << 8;
const FORCE_OFF: u16 = 1 << 9;
const OFFLINE_OFF: u16 = 1 << 10;
const OFFLINE_ON: u16 = 1 << 11;
const ONLINE_OFF: u16 = 1 << 12;
const ONLINE_ON: u16 = 1 << 13;

/// Bits not owned by any named field.
pub const RESERVED_MASK: u16 = 0xC03F;

/// Operator override of a port's power state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Forcing {
    #[serde(rename = "ON")]
    On,
    #[serde(rename = "OFF")]
    Off,
    #[default]
    #[serde(rename = "NONE")]
    NotForced,
}

impl Forcing {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::On => "ON",
            Self::Off => "OFF",
            Self::NotForced => "NONE",
        }
    }

    fn parse(text: &str) -> Option<Self> {
        match text {
            "ON" => Some(Self::On),
            "OFF" => Some(Self::Off),
            "NONE" => Some(Self::NotForced),
            _ => None,
        }
    }
}

/// Requested power state for one bus mode (online or offline).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DesiredPower {
    On,
    Off,
    #[default]
    NoRequest,
    /// Both bits of the pair set.
    Conflicting,
}

impl DesiredPower {
    fn decode(word: u16, on: u16, off: u16) -> Self {
        match (word & on != 0, word & off != 0) {
            (true, false) => Self::On,
            (false, true) => Self::Off,
            (false, false) => Self::NoRequest,
            (true, true) => Self::Conflicting,
        }
    }

    fn encode(self, on: u16, off: u16) -> u16 {
        match self {
            Self::On => on,
            Self::Off => off,
            Self::NoRequest => 0,
            Self::Conflicting => on | off,
        }
    }

    fn to_value(self) -> Option<AttributeValue> {
        match self {
            Self::On => Some(AttributeValue::Bool(true)),
            Self::Off => Some(AttributeValue::Bool(false)),
            Self::NoRequest => Some(AttributeValue::Null),
            Self::Conflicting => None,
        }
    }

    fn from_value(value: &AttributeValue) -> Option<Self> {
        match value {
            AttributeValue::Bool(true) => Some(Self::On),
            AttributeValue::Bool(false) => Some(Self::Off),
            AttributeValue::Null => Some(Self::NoRequest),
            _ => None,
        }
    }
}

/// Illegal bit combinations in a port-status word.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortStatusError {
    #[error("both forcing bits are set in {word:#06x}")]
    ConflictingForcing { word: u16 },

    #[error("both desired-power-when-online bits are set in {word:#06x}")]
    ConflictingDesiredOnline { word: u16 },

    #[error("both desired-power-when-offline bits are set in {word:#06x}")]
    ConflictingDesiredOffline { word: u16 },
}

/// Decoded view of one port-status word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PortStatus {
    pub power_sensed: bool,
    pub local_power: bool,
    pub forcing: Forcing,
    pub desired_online: DesiredPower,
    pub desired_offline: DesiredPower,
    /// Bits outside every named field, carried through untouched.
    pub reserved: u16,
}

impl PortStatus {
    /// Decode a raw word, checking the forcing pair.
    ///
    /// # Errors
    ///
    /// Returns [`PortStatusError::ConflictingForcing`] when both forcing bits
    /// are set.
    pub fn decode(word: u16) -> Result<Self, PortStatusError> {
        let forcing = match (word & FORCE_ON != 0, word & FORCE_OFF != 0) {
            (true, true) => return Err(PortStatusError::ConflictingForcing { word }),
            (true, false) => Forcing::On,
            (false, true) => Forcing::Off,
            (false, false) => Forcing::NotForced,
        };
        Ok(Self {
            power_sensed: word & POWER_SENSED != 0,
            local_power: word & LOCAL_POWER != 0,
            forcing,
            desired_online: DesiredPower::decode(word, ONLINE_ON, ONLINE_OFF),
            desired_offline: DesiredPower::decode(word, OFFLINE_ON, OFFLINE_OFF),
            reserved: word & RESERVED_MASK,
        })
    }

    /// Pack the fields back into a word.
    #[must_use]
    pub fn encode(&self) -> u16 {
        let mut word = self.reserved & RESERVED_MASK;
        if self.power_sensed {
            word |= POWER_SENSED;
        }
        if self.local_power {
            word |= LOCAL_POWER;
        }
        word |= match self.forcing {
            Forcing::On => FORCE_ON,
            Forcing::Off => FORCE_OFF,
            Forcing::NotForced => 0,
        };
        word |= self.desired_online.encode(ONLINE_ON, ONLINE_OFF);
        word |= self.desired_offline.encode(OFFLINE_ON, OFFLINE_OFF);
        word
    }

    /// Write request switching a port on (always when online, optionally when offline).
    #[must_use]
    pub fn turn_on(stay_on_when_offline: bool) -> Self {
        Self {
            desired_online: DesiredPower::On,
            desired_offline: if stay_on_when_offline {
                DesiredPower::On
            } else {
                DesiredPower::Off
            },
            ..Self::default()
        }
    }

    /// Write request switching a port off in both modes.
    #[must_use]
    pub fn turn_off() -> Self {
        Self {
            desired_online: DesiredPower::Off,
            desired_offline: DesiredPower::Off,
            ..Self::default()
        }
    }

    /// Write request resetting a tripped breaker, leaving the desired state alone.
    #[must_use]
    pub fn reset_breaker() -> Self {
        Self {
            power_sensed: true,
            ..Self::default()
        }
    }
}

/// One field of the port-status word, exposed as its own array attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortField {
    /// Bit 7.
    PowerSensed,
    /// Bit 6.
    LocalPower,
    /// Bits 8–9, as `"ON"` / `"OFF"` / `"NONE"`.
    Forcing,
    /// Bits 12–13, as `true` / `false` / `null`.
    DesiredOnline,
    /// Bits 10–11, as `true` / `false` / `null`.
    DesiredOffline,
}

impl PortField {
    /// Bits owned by this field.
    #[must_use]
    pub const fn mask(self) -> u16 {
        match self {
            Self::PowerSensed => POWER_SENSED,
            Self::LocalPower => LOCAL_POWER,
            Self::Forcing => FORCE_ON | FORCE_OFF,
            Self::DesiredOnline => ONLINE_ON | ONLINE_OFF,
            Self::DesiredOffline => OFFLINE_ON | OFFLINE_OFF,
        }
    }

    /// Decode `word` and project this field.
    ///
    /// # Errors
    ///
    /// Returns [`ConversionError::PortStatus`] when both forcing bits are set,
    /// whichever field is projected, or when both bits of this field's own
    /// desired-power pair are set.
    pub fn decode(self, word: u16) -> Result<AttributeValue, ConversionError> {
        let status = PortStatus::decode(word)?;
        match self {
            Self::PowerSensed => Ok(AttributeValue::Bool(status.power_sensed)),
            Self::LocalPower => Ok(AttributeValue::Bool(status.local_power)),
            Self::Forcing => Ok(AttributeValue::Text(status.forcing.as_str().to_string())),
            Self::DesiredOnline => status
                .desired_online
                .to_value()
                .ok_or(PortStatusError::ConflictingDesiredOnline { word }.into()),
            Self::DesiredOffline => status
                .desired_offline
                .to_value()
                .ok_or(PortStatusError::ConflictingDesiredOffline { word }.into()),
        }
    }

    /// Encode a value for this field into a word with every other field zero.
    ///
    /// # Errors
    ///
    /// Returns [`ConversionError::UnexpectedType`] or
    /// [`ConversionError::UnknownMember`] when `value` is not valid for the field.
    pub fn encode(self, value: &AttributeValue) -> Result<u16, ConversionError> {
        let mut status = PortStatus::default();
        match self {
            Self::PowerSensed => status.power_sensed = expect_bool(value)?,
            Self::LocalPower => status.local_power = expect_bool(value)?,
            Self::Forcing => {
                let text = value
                    .as_str()
                    .ok_or(ConversionError::UnexpectedType { expected: "text" })?;
                status.forcing = Forcing::parse(text).ok_or_else(|| {
                    ConversionError::UnknownMember {
                        name: text.to_string(),
                    }
                })?;
            }
            Self::DesiredOnline => status.desired_online = expect_desired(value)?,
            Self::DesiredOffline => status.desired_offline = expect_desired(value)?,
        }
        Ok(status.encode())
    }
}

fn expect_bool(value: &AttributeValue) -> Result<bool, ConversionError> {
    value
        .as_bool()
        .ok_or(ConversionError::UnexpectedType { expected: "boolean" })
}

fn expect_desired(value: &AttributeValue) -> Result<DesiredPower, ConversionError> {
    DesiredPower::from_value(value).ok_or(ConversionError::UnexpectedType {
        expected: "boolean or null",
    })
}
