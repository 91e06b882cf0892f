//! Per-port relay driver.

use embedded_hal::digital::OutputPin;

use crate::app::ports::RelayPort;
use crate::port::{PortId, PORT_COUNT};

/// Twelve relay control lines, one per port, active high.
///
/// Keeps a shadow of the commanded state so repeated commands don't
/// touch the pin and the last commanded state can be inspected.
pub struct RelayBank<P: OutputPin> {
    pins: [P; PORT_COUNT],
    commanded: [bool; PORT_COUNT],
}

impl<P: OutputPin> RelayBank<P> {
    /// Takes ownership of the control lines and opens every relay.
    pub fn new(mut pins: [P; PORT_COUNT]) -> Self {
        for pin in &mut pins {
            let _ = pin.set_low();
        }
        Self {
            pins,
            commanded: [false; PORT_COUNT],
        }
    }

    /// Last commanded state for a port.
    pub fn commanded(&self, port: PortId) -> bool {
        self.commanded[port.index()]
    }
}

impl<P: OutputPin> RelayPort for RelayBank<P> {
    fn set(&mut self, port: PortId, on: bool) {
        if self.commanded[port.index()] == on {
            return;
        }
        // GPIO writes on this board are infallible; the pin types only
        // carry an error slot to satisfy the trait.
        let result = if on {
            self.pins[port.index()].set_high()
        } else {
            self.pins[port.index()].set_low()
        };
        let _ = result;
        self.commanded[port.index()] = on;
    }
}
