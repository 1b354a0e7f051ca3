//! Device identity: the hub (FNDH) and its smartboxes.
//!
//! A [`DeviceId`] is the logical bus address: `0` is always the hub, `1..=N`
//! is smartbox `N`. Whether an id is usable depends on the configured
//! [`Topology`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::AddressingError;

/// Maximum number of smartboxes a hub can power.
pub const MAX_SMARTBOXES: u8 = 24;

/// The two kinds of device on the bus; each has its own register map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    /// Field-node distribution hub (FNDH).
    Hub,
    /// Smartbox powering up to 12 antennas.
    Smartbox,
}

impl DeviceKind {
    /// Number of switchable ports on a device of this kind.
    #[must_use]
    pub const fn port_count(self) -> u16 {
        match self {
            Self::Hub => 28,
            Self::Smartbox => 12,
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hub => f.write_str("hub"),
            Self::Smartbox => f.write_str("smartbox"),
        }
    }
}

/// Logical bus address of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(u8);

impl DeviceId {
    /// The hub is always device `0`.
    pub const HUB: Self = Self(0);

    #[must_use]
    pub const fn new(id: u8) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }

    /// Kind implied by the id alone (`0` → hub, anything else → smartbox).
    #[must_use]
    pub const fn kind(self) -> DeviceKind {
        if self.0 == 0 {
            DeviceKind::Hub
        } else {
            DeviceKind::Smartbox
        }
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<u8> for DeviceId {
    fn from(id: u8) -> Self {
        Self(id)
    }
}

/// The set of devices actually present on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Topology {
    smartboxes: u8,
}

impl Default for Topology {
    fn default() -> Self {
        Self {
            smartboxes: MAX_SMARTBOXES,
        }
    }
}

impl Topology {
    /// A hub with `smartboxes` boxes attached, capped at [`MAX_SMARTBOXES`].
    #[must_use]
    pub fn new(smartboxes: u8) -> Self {
        Self {
            smartboxes: smartboxes.min(MAX_SMARTBOXES),
        }
    }

    #[must_use]
    pub fn smartbox_count(&self) -> u8 {
        self.smartboxes
    }

    /// Resolve a device id to its kind.
    ///
    /// # Errors
    ///
    /// Returns [`AddressingError::UnknownDevice`] when `id` names a smartbox
    /// that is not configured.
    pub fn resolve(&self, id: DeviceId) -> Result<DeviceKind, AddressingError> {
        if id.get() <= self.smartboxes {
            Ok(id.kind())
        } else {
            Err(AddressingError::UnknownDevice(id))
        }
    }

    /// Every configured device id, hub first.
    pub fn devices(&self) -> impl Iterator<Item = DeviceId> {
        (0..=self.smartboxes).map(DeviceId::new)
    }
}
