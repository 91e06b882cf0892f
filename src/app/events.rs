//! Outbound events and status reporting.
//!
//! The protection supervisor and service emit [`PduEvent`]s through the
//! [`EventSink`](super::ports::EventSink) port. Adapters on the other
//! side decide what to do with them — print to the console, log, drive a
//! status line. [`StatusReport`] is the machine-readable snapshot
//! serialized for status queries.

use heapless::{String, Vec};
use serde::Serialize;

use crate::port::{Bus, PortId, PortSet, PORT_COUNT};

/// Structured events emitted by the control core.
#[derive(Debug, Clone, PartialEq)]
pub enum PduEvent {
    /// A port relay changed state (manual command, cycle, or voltage
    /// control).
    PowerChanged { port: PortId, on: bool },

    /// A port crossed its current limit and was latched off.
    OverloadLatched { port: PortId, amps: f32 },

    /// Voltage control switched a port off (bus below cut-off).
    VoltageCutoff { port: PortId, volts: f32 },

    /// Voltage control switched a port back on (bus above cut-on).
    VoltageCuton { port: PortId, volts: f32 },

    /// A timed power cycle started; the ports are now off.
    CycleStarted { ports: PortSet },

    /// A timed power cycle completed; the ports are back on.
    CycleCompleted { ports: PortSet },

    /// The persistent store was erased to factory defaults.
    FactoryReset,
}

/// Point-in-time status of one port, in engineering units.
#[derive(Debug, Clone, Serialize)]
pub struct PortStatus {
    /// One-based port number as labelled on the chassis.
    pub number: u8,
    pub name: String<15>,
    pub enabled: bool,
    pub overloaded: bool,
    pub voltage_control: bool,
    pub bus: Bus,
    pub current_a: f32,
    /// Bus voltage × port current.
    pub power_w: f32,
    /// Largest current ever observed on this port (advisory).
    pub high_water_a: f32,
}

/// Full unit status snapshot for reporting.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub unit_name: String<15>,
    pub main_voltage: f32,
    pub aux_voltage: f32,
    /// Die temperature, uncalibrated, ±10 °C.
    pub temperature_c: i16,
    pub ports: Vec<PortStatus, PORT_COUNT>,
}
