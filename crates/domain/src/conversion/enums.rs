//! Enumerations carried in status, LED and flag registers.

use std::fmt;

macro_rules! register_enum {
    ($(#[doc = $doc:expr])* $name:ident { $($variant:ident = $code:literal => $text:literal),+ $(,)? }) => {
        $(#[doc = $doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            /// Every member, in code order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// Raw register code.
            #[must_use]
            pub const fn code(self) -> u16 {
                match self {
                    $(Self::$variant => $code),+
                }
            }

            /// Member for a raw register code.
            #[must_use]
            pub fn from_code(code: u16) -> Option<Self> {
                match code {
                    $($code => Some(Self::$variant),)+
                    _ => None,
                }
            }

            /// Wire name of the member.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }

            /// Member for a wire name.
            #[must_use]
            pub fn from_name(name: &str) -> Option<Self> {
                Self::ALL.iter().copied().find(|member| member.as_str() == name)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

register_enum!(
    /// Value of the hub/smartbox `status` register.
    DeviceStatus {
        Ok = 0 => "OK",
        Warning = 1 => "WARNING",
        Alarm = 2 => "ALARM",
        Recovery = 3 => "RECOVERY",
        Uninitialised = 4 => "UNINITIALISED",
        PowerUp = 5 => "POWERUP",
    }
);

register_enum!(
    /// High byte of the LED register.
    ServiceLed {
        Off = 0 => "OFF",
        On = 1 => "ON",
    }
);

register_enum!(
    /// Low byte of the LED register.
    StatusLed {
        Off = 0 => "OFF",
        Green = 1 => "GREEN",
        GreenSlow = 2 => "GREENSLOW",
        GreenFast = 3 => "GREENFAST",
        GreenVeryFast = 4 => "GREENVFAST",
        GreenDotDash = 5 => "GREENDOTDASH",
        Yellow = 6 => "YELLOW",
        YellowSlow = 7 => "YELLOWSLOW",
        YellowFast = 8 => "YELLOWFAST",
        Red = 9 => "RED",
        RedSlow = 10 => "REDSLOW",
        RedFast = 11 => "REDFAST",
        GreenRed = 12 => "GREENRED",
        YellowRed = 13 => "YELLOWRED",
    }
);

/// Names of the bits in a warning/alarm flag register, bit 0 first.
#[derive(Debug, PartialEq, Eq)]
pub struct FlagSet {
    names: &'static [&'static str],
}

impl FlagSet {
    #[must_use]
    pub const fn new(names: &'static [&'static str]) -> Self {
        Self { names }
    }

    /// Mask of every defined bit.
    #[must_use]
    pub fn mask(&self) -> u16 {
        (0..self.names.len()).fold(0, |mask, bit| mask | (1 << bit))
    }

    /// Bit for a flag name.
    #[must_use]
    pub fn bit(&self, name: &str) -> Option<u16> {
        self.names
            .iter()
            .position(|candidate| *candidate == name)
            .map(|index| 1 << index)
    }

    /// Names of the bits set in `bits`, ascending.
    pub fn active(&self, bits: u16) -> impl Iterator<Item = &'static str> + '_ {
        self.names
            .iter()
            .enumerate()
            .filter(move |(index, _)| bits & (1 << index) != 0)
            .map(|(_, name)| *name)
    }
}

/// Hub sensors able to raise a warning or alarm.
pub static HUB_FLAGS: FlagSet = FlagSet::new(&[
    "SYS_48V1_V",
    "SYS_48V2_V",
    "SYS_48V_I",
    "SYS_48V1_TEMP",
    "SYS_48V2_TEMP",
    "SYS_PANELTEMP",
    "SYS_FNCBTEMP",
    "SYS_HUMIDITY",
    "SYS_SENSE01_COMMS_GATEWAY",
    "SYS_SENSE02_POWER_MODULE",
    "SYS_SENSE03_OUTSIDE",
    "SYS_SENSE04_INTERNAL",
]);

/// Smartbox sensors able to raise a warning or alarm.
pub static SMARTBOX_FLAGS: FlagSet = FlagSet::new(&[
    "SYS_48V_V",
    "SYS_PSU_V",
    "SYS_PSU_TEMP",
    "SYS_PCB_TEMP",
    "SYS_AMB_TEMP",
    "SYS_SENSE01_FEM_CASE1",
    "SYS_SENSE02_FEM_CASE2",
    "SYS_SENSE03_FEM_HEATSINK1",
    "SYS_SENSE04_FEM_HEATSINK2",
]);
