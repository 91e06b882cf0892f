//! Port traits — the boundary between the control core and the board.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ PduService (domain)
//! ```
//!
//! Driven adapters (ADC front-end, relay drivers, indicator LED, EEPROM,
//! event sinks) implement these traits. The service consumes them via
//! generics, so the domain core never touches hardware directly and the
//! whole control loop runs against mocks on the host.
//!
//! Everything here is deliberately infallible: the transducers on this
//! board have no way to signal failure distinct from a zero reading, and
//! relay/EEPROM writes are fire-and-forget at this level.

use crate::app::events::PduEvent;
use crate::port::PortId;

// ───────────────────────────────────────────────────────────────
// ADC front-end (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// One raw transducer conversion per call.
///
/// Channels 0–11 are the per-port current-sense inputs, 12 is the main
/// bus voltage divider, 13 the auxiliary bus divider. The sensor hub
/// performs channel validation and averaging on top of this primitive.
pub trait AdcPort {
    /// Take a single 10-bit sample (0..=1023) from `channel`.
    fn sample(&mut self, channel: u8) -> u16;

    /// Take a single sample of the die-temperature channel.
    ///
    /// The multiplexer needs a conversion to settle after switching to
    /// this channel, so callers discard the first of two samples.
    fn sample_die_temperature(&mut self) -> u16;
}

// ───────────────────────────────────────────────────────────────
// Relay / indicator control (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

/// Drives the per-port power relays.
pub trait RelayPort {
    /// Close (`on = true`) or open the relay for `port`.
    fn set(&mut self, port: PortId, on: bool);
}

/// Drives the front-panel fault indicator.
pub trait IndicatorPort {
    /// Assert or clear the fault indicator. Called once per protection
    /// sweep with the current level; adapters may de-duplicate.
    fn set_fault(&mut self, asserted: bool);
}

// ───────────────────────────────────────────────────────────────
// Persistent storage (driven adapter: domain ↔ EEPROM)
// ───────────────────────────────────────────────────────────────

/// Flat, offset-addressed persistent byte region.
///
/// The settings store defines the field layout on top of this; the
/// backend knows nothing about fields. Reads beyond the region yield the
/// erased pattern; writes beyond it are ignored.
pub trait StorageBackend {
    /// Fill `buf` with the bytes at `offset`.
    fn read(&self, offset: usize, buf: &mut [u8]);

    /// Store `data` at `offset`.
    fn write(&mut self, offset: usize, data: &[u8]);

    /// Overwrite the entire region with `value` (factory reset).
    fn fill(&mut self, value: u8);
}

// ───────────────────────────────────────────────────────────────
// Event sink (driven adapter: domain → logging / reporting)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`PduEvent`]s through this port. Adapters
/// decide where they go (serial console, log, status line).
pub trait EventSink {
    fn emit(&mut self, event: &PduEvent);
}
