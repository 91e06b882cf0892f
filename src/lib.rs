//! Control core of a twelve-port switched power distribution unit.
//!
//! The unit switches twelve powered outputs across two supply buses,
//! measures per-port current and bus voltage through a shared ADC, and
//! protects each output with a latching overcurrent limit and debounced
//! voltage cut-off/cut-on thresholds. Calibration and per-port defaults
//! persist in a flat EEPROM image compatible with earlier firmware.
//!
//! The crate is organised hexagonally: the domain core ([`app::service`],
//! [`protection`], [`sensors`], [`settings`]) is hardware-free and talks
//! to the board exclusively through the port traits in [`app::ports`];
//! the [`drivers`] module adapts those traits onto `embedded-hal` pins.
//! [`scheduler::Scheduler`] is the one piece shared with interrupt
//! context and is therefore all atomics.

pub mod app;
pub mod drivers;
pub mod error;
pub mod port;
pub mod protection;
pub mod scheduler;
pub mod sensors;
pub mod settings;

pub use app::service::PduService;
pub use error::{Error, Result};
pub use port::{Bus, PortId, PortSet, PORT_COUNT};
pub use scheduler::Scheduler;
