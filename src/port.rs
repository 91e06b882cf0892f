//! Port data model.
//!
//! A PDU has a fixed set of twelve switched outputs. Each port carries an
//! immutable index, a runtime [`PortState`] owned by the protection
//! supervisor, and a persisted [`BootState`] the runtime state is derived
//! from at power-up.

use serde::Serialize;

use crate::error::{Error, Result};

/// Number of switched outputs on the unit.
pub const PORT_COUNT: usize = 12;

/// A validated port index in `0..PORT_COUNT`.
///
/// Internally zero-based; [`PortId::number`] gives the one-based number
/// printed on the front panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct PortId(u8);

impl PortId {
    pub fn new(index: u8) -> Result<Self> {
        if usize::from(index) < PORT_COUNT {
            Ok(Self(index))
        } else {
            Err(Error::InvalidPort)
        }
    }

    /// Zero-based index, suitable for array access.
    pub fn index(self) -> usize {
        usize::from(self.0)
    }

    /// One-based port number as labelled on the chassis.
    pub fn number(self) -> u8 {
        self.0 + 1
    }

    /// Iterate over every port on the unit.
    pub fn all() -> impl Iterator<Item = PortId> {
        (0..PORT_COUNT as u8).map(PortId)
    }
}

/// A set of ports, stored as a bitmap (bit `i` = port index `i`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PortSet(u16);

impl PortSet {
    const MASK: u16 = (1 << PORT_COUNT) - 1;

    /// The empty set.
    pub const EMPTY: PortSet = PortSet(0);
    /// Every port on the unit.
    pub const ALL: PortSet = PortSet(Self::MASK);

    pub fn single(port: PortId) -> Self {
        Self(1 << port.0)
    }

    pub fn insert(&mut self, port: PortId) {
        self.0 |= 1 << port.0;
    }

    pub fn contains(self, port: PortId) -> bool {
        self.0 & (1 << port.0) != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 & Self::MASK == 0
    }

    pub fn iter(self) -> impl Iterator<Item = PortId> {
        PortId::all().filter(move |p| self.contains(*p))
    }
}

impl FromIterator<PortId> for PortSet {
    fn from_iter<I: IntoIterator<Item = PortId>>(iter: I) -> Self {
        let mut set = Self::EMPTY;
        for port in iter {
            set.insert(port);
        }
        set
    }
}

/// The power rail a port is referenced to, for voltage control and power
/// calculations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Bus {
    Main,
    Auxiliary,
}

/// Runtime voltage-control axis of a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VoltageControl {
    /// Not participating in voltage control.
    Disabled,
    /// Watching the bus; no threshold crossing observed yet.
    Armed,
    /// Threshold crossing observed once; acts if still true on the next
    /// voltage-check tick (two-phase debounce against relay chatter).
    Pending,
}

impl VoltageControl {
    /// True for `Armed` or `Pending`.
    pub fn is_active(self) -> bool {
        !matches!(self, Self::Disabled)
    }
}

/// Runtime operational state of one port. Owned and mutated exclusively
/// by the protection supervisor and explicit external commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortState {
    /// Relay closed, output powered.
    pub enabled: bool,
    /// Sticky overcurrent latch; cleared only by an explicit power set.
    pub overloaded: bool,
    pub voltage_control: VoltageControl,
    pub bus: Bus,
}

impl PortState {
    /// Derive the power-up operational state from the persisted defaults.
    pub fn from_boot(boot: BootState) -> Self {
        Self {
            enabled: boot.enabled,
            overloaded: false,
            voltage_control: if boot.voltage_control {
                VoltageControl::Armed
            } else {
                VoltageControl::Disabled
            },
            bus: boot.bus,
        }
    }
}

/// Persisted boot-default state for one port.
///
/// Stored as a single flag byte: bit 0 = enabled at boot, bit 1 =
/// voltage control enabled, bit 2 = referenced to the auxiliary bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootState {
    pub enabled: bool,
    pub voltage_control: bool,
    pub bus: Bus,
}

impl BootState {
    const BIT_ENABLED: u8 = 0b0000_0001;
    const BIT_VOLTAGE_CONTROL: u8 = 0b0000_0010;
    const BIT_AUX_BUS: u8 = 0b0000_0100;

    pub fn from_byte(byte: u8) -> Self {
        Self {
            enabled: byte & Self::BIT_ENABLED != 0,
            voltage_control: byte & Self::BIT_VOLTAGE_CONTROL != 0,
            bus: if byte & Self::BIT_AUX_BUS != 0 {
                Bus::Auxiliary
            } else {
                Bus::Main
            },
        }
    }

    pub fn to_byte(self) -> u8 {
        let mut byte = 0;
        if self.enabled {
            byte |= Self::BIT_ENABLED;
        }
        if self.voltage_control {
            byte |= Self::BIT_VOLTAGE_CONTROL;
        }
        if self.bus == Bus::Auxiliary {
            byte |= Self::BIT_AUX_BUS;
        }
        byte
    }
}

impl Default for BootState {
    /// Factory behavior: port enabled, voltage control off, main bus.
    fn default() -> Self {
        Self {
            enabled: true,
            voltage_control: false,
            bus: Bus::Main,
        }
    }
}
