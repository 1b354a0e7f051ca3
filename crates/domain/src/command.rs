//! Commands a backend can execute, and the register writes that express them.

use crate::catalogue::register_map;
use crate::conversion::ServiceLed;
use crate::device::DeviceKind;
use crate::error::{PasdError, UnknownCommandError};
use crate::port_status::PortStatus;
use crate::value::AttributeValue;

/// A validated command for one device kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Leave the `UNINITIALISED` state.
    Initialize,
    TurnPortOn { port: u16, stay_on_when_offline: bool },
    TurnPortOff { port: u16 },
    /// Smartbox only.
    ResetPortBreaker { port: u16 },
    SetLedPattern { service: ServiceLed },
}

/// Command arguments that do not fit the command's signature.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArgumentError {
    #[error("{command} takes {expected}")]
    Signature {
        command: &'static str,
        expected: &'static str,
    },

    #[error("port {port} is outside 1..={ports}")]
    PortOutOfRange { port: i64, ports: u16 },

    #[error("unknown service LED state {0:?}")]
    ServiceLed(String),
}

impl From<ArgumentError> for PasdError {
    fn from(err: ArgumentError) -> Self {
        Self::command(err)
    }
}

/// Registers to write for one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterWrite {
    pub address: u16,
    pub words: Vec<u16>,
}

/// Written to the status register to leave `UNINITIALISED`.
const INITIALIZE_STATUS: u16 = 1;

const INITIALIZE: &str = "initialize";
const TURN_PORT_ON: &str = "turn_port_on";
const TURN_PORT_OFF: &str = "turn_port_off";
const RESET_PORT_BREAKER: &str = "reset_port_breaker";
const SET_LED_PATTERN: &str = "set_led_pattern";

/// Every command name, per kind.
#[must_use]
pub fn command_names(kind: DeviceKind) -> &'static [&'static str] {
    match kind {
        DeviceKind::Hub => &[INITIALIZE, TURN_PORT_ON, TURN_PORT_OFF, SET_LED_PATTERN],
        DeviceKind::Smartbox => &[
            INITIALIZE,
            TURN_PORT_ON,
            TURN_PORT_OFF,
            RESET_PORT_BREAKER,
            SET_LED_PATTERN,
        ],
    }
}

impl Command {
    /// Parse a command name and its positional arguments.
    ///
    /// # Errors
    ///
    /// Returns [`PasdError::UnknownCommand`] when `kind` has no such command
    /// and [`PasdError::Command`] wrapping an [`ArgumentError`] when the
    /// arguments do not match.
    pub fn parse(
        kind: DeviceKind,
        name: &str,
        arguments: &[AttributeValue],
    ) -> Result<Self, PasdError> {
        if !command_names(kind).iter().any(|candidate| *candidate == name) {
            return Err(UnknownCommandError {
                kind,
                name: name.to_string(),
            }
            .into());
        }
        let ports = kind.port_count();
        let command = match (name, arguments) {
            (INITIALIZE, []) => Self::Initialize,
            (TURN_PORT_ON, [port]) => Self::TurnPortOn {
                port: port_number(TURN_PORT_ON, port, ports)?,
                stay_on_when_offline: true,
            },
            (TURN_PORT_ON, [port, AttributeValue::Bool(stay)]) => Self::TurnPortOn {
                port: port_number(TURN_PORT_ON, port, ports)?,
                stay_on_when_offline: *stay,
            },
            (TURN_PORT_OFF, [port]) => Self::TurnPortOff {
                port: port_number(TURN_PORT_OFF, port, ports)?,
            },
            (RESET_PORT_BREAKER, [port]) => Self::ResetPortBreaker {
                port: port_number(RESET_PORT_BREAKER, port, ports)?,
            },
            (SET_LED_PATTERN, [AttributeValue::Text(state)]) => Self::SetLedPattern {
                service: ServiceLed::from_name(state)
                    .ok_or_else(|| ArgumentError::ServiceLed(state.clone()))?,
            },
            (command, _) => return Err(signature(command).into()),
        };
        Ok(command)
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Initialize => INITIALIZE,
            Self::TurnPortOn { .. } => TURN_PORT_ON,
            Self::TurnPortOff { .. } => TURN_PORT_OFF,
            Self::ResetPortBreaker { .. } => RESET_PORT_BREAKER,
            Self::SetLedPattern { .. } => SET_LED_PATTERN,
        }
    }

    /// The register write carrying this command on a device of `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`PasdError::UnknownAttribute`] if the catalogue lacks the
    /// register the command targets on `kind`.
    pub fn register_write(&self, kind: DeviceKind) -> Result<RegisterWrite, PasdError> {
        let map = register_map();
        let (address, word) = match self {
            Self::Initialize => (map.resolve(kind, "status")?.address, INITIALIZE_STATUS),
            Self::TurnPortOn {
                port,
                stay_on_when_offline,
            } => (
                port_address(kind, *port)?,
                PortStatus::turn_on(*stay_on_when_offline).encode(),
            ),
            Self::TurnPortOff { port } => {
                (port_address(kind, *port)?, PortStatus::turn_off().encode())
            }
            Self::ResetPortBreaker { port } => (
                port_address(kind, *port)?,
                PortStatus::reset_breaker().encode(),
            ),
            // The status byte belongs to the firmware.
            Self::SetLedPattern { service } => {
                (map.resolve(kind, "led_pattern")?.address, service.code() << 8)
            }
        };
        Ok(RegisterWrite {
            address,
            words: vec![word],
        })
    }

    /// Recognise a raw register write that only a command can express.
    ///
    /// The status register and the breaker bit are read-only as attributes,
    /// so writing the initialize code to the status register is taken as
    /// [`Command::Initialize`] and a lone bit 7 written to a smartbox port
    /// word as [`Command::ResetPortBreaker`]. Other command writes target
    /// writable attributes and need no translation.
    #[must_use]
    pub fn from_register_write(kind: DeviceKind, address: u16, words: &[u16]) -> Option<Self> {
        let map = register_map();
        let status = map.resolve(kind, "status").ok()?;
        if address == status.address && words == [INITIALIZE_STATUS] {
            return Some(Self::Initialize);
        }
        if kind == DeviceKind::Smartbox && words == [PortStatus::reset_breaker().encode()] {
            let ports = map.resolve(kind, "port_breakers_tripped").ok()?;
            if ports.covers(address) {
                return Some(Self::ResetPortBreaker {
                    port: address - ports.address + 1,
                });
            }
        }
        None
    }

    /// Positional arguments that [`Command::parse`] turns back into `self`.
    #[must_use]
    pub fn arguments(&self) -> Vec<AttributeValue> {
        match self {
            Self::Initialize => vec![],
            Self::TurnPortOn {
                port,
                stay_on_when_offline,
            } => vec![
                AttributeValue::Int(i64::from(*port)),
                AttributeValue::Bool(*stay_on_when_offline),
            ],
            Self::TurnPortOff { port } | Self::ResetPortBreaker { port } => {
                vec![AttributeValue::Int(i64::from(*port))]
            }
            Self::SetLedPattern { service } => vec![AttributeValue::from(service.as_str())],
        }
    }
}

fn port_address(kind: DeviceKind, port: u16) -> Result<u16, PasdError> {
    let ports = register_map().resolve(kind, "port_forcings")?;
    Ok(ports.address + port - 1)
}

fn port_number(
    command: &'static str,
    value: &AttributeValue,
    ports: u16,
) -> Result<u16, ArgumentError> {
    let port = value.as_i64().ok_or_else(|| signature(command))?;
    u16::try_from(port)
        .ok()
        .filter(|port| (1..=ports).contains(port))
        .ok_or(ArgumentError::PortOutOfRange { port, ports })
}

fn signature(command: &str) -> ArgumentError {
    let (command, expected) = match command {
        INITIALIZE => (INITIALIZE, "no arguments"),
        TURN_PORT_ON => (TURN_PORT_ON, "a port number and an optional stay_on_when_offline flag"),
        TURN_PORT_OFF => (TURN_PORT_OFF, "a port number"),
        RESET_PORT_BREAKER => (RESET_PORT_BREAKER, "a port number"),
        _ => (SET_LED_PATTERN, "a service LED state, ON or OFF"),
    };
    ArgumentError::Signature { command, expected }
}
