//! Persistent configuration and calibration store.
//!
//! A flat 512-byte EEPROM-style region with a fixed per-field layout,
//! compatible with the data persisted by earlier unit firmware. Every
//! read validates the stored value against the field's known-good range
//! and substitutes a documented default when it is out of range —
//! including the erased pattern (0xFF) — without repairing the stored
//! bytes. Every write stores exactly the field's byte width; setters
//! validate the semantic value first and reject out-of-range requests
//! with no state change.
//!
//! Fixed-point encodings at the storage boundary (×10 bytes, ×100
//! words) convert to floating-point engineering units at the API.

use heapless::String;
use log::{info, warn};

use crate::app::ports::StorageBackend;
use crate::error::{Error, Result};
use crate::port::{BootState, Bus, PortId};

/// Size of the backing region in bytes.
pub const STORE_SIZE: usize = 512;
/// Erased-storage pattern.
pub const ERASED: u8 = 0xFF;

// Field offsets. The gaps are regions earlier firmware revisions used
// and later abandoned; they are kept reserved for compatibility.
const OFFSET_PORT_DEFAULTS: usize = 0; // 12 × 1 byte flag bytes
const OFFSET_CYCLE_TIME: usize = 16; // 1 byte, seconds
const OFFSET_CURRENT_OFFSET: usize = 142; // 12 × 1 byte, raw ADC counts
const OFFSET_REF_VOLTAGE: usize = 154; // 4 bytes, f32 little-endian
const OFFSET_DIVIDER_MAIN: usize = 158; // 1 byte, ratio × 10
const OFFSET_DIVIDER_AUX: usize = 159; // 1 byte, ratio × 10
const OFFSET_CURRENT_GAIN: usize = 176; // 12 × 2 bytes, gain × 10 LE
const OFFSET_CURRENT_LIMIT: usize = 208; // 12 × 1 byte, amps × 10
const OFFSET_VOLTAGE_CUTOFF: usize = 240; // 12 × 2 bytes, volts × 100 LE
const OFFSET_VOLTAGE_CUTON: usize = 272; // 12 × 2 bytes, volts × 100 LE
const OFFSET_UNIT_NAME: usize = 304; // 16 bytes, NUL-terminated
const OFFSET_PORT_NAMES: usize = 320; // 12 × 16 bytes, NUL-terminated

const NAME_SLOT_LEN: usize = 16;
/// Maximum stored name length (one slot byte is reserved for the NUL).
pub const NAME_MAX_LEN: usize = 15;

// Valid ranges and defaults, in storage encoding.
/// Longest permitted power-cycle duration, seconds.
pub const CYCLE_TIME_MAX_SECS: u8 = 30;
const CYCLE_TIME_DEFAULT_SECS: u8 = 1;
const REF_VOLTAGE_MIN: f32 = 4.1;
const REF_VOLTAGE_MAX: f32 = 4.3;
const REF_VOLTAGE_DEFAULT: f32 = 4.2;
const DIVIDER_RAW_MIN: u8 = 130; // 13.0×
const DIVIDER_RAW_MAX: u8 = 170; // 17.0×
const DIVIDER_RAW_DEFAULT: u8 = 150; // 15.0×
const GAIN_RAW_MIN: u16 = 480; // 48.0×
const GAIN_RAW_MAX: u16 = 520; // 52.0×
const GAIN_RAW_DEFAULT: u16 = 500; // 50.0×
/// Largest valid current-sense zero offset, raw ADC counts.
pub const CURRENT_OFFSET_MAX: u8 = 100;
const LIMIT_RAW_MAX: u8 = 100; // 10.0 A
/// Largest representable voltage threshold, volts.
pub const VOLTAGE_MAX: f32 = 50.0;

/// Validated, persistent settings over a [`StorageBackend`].
pub struct SettingsStore<S: StorageBackend> {
    backend: S,
}

impl<S: StorageBackend> SettingsStore<S> {
    pub fn new(backend: S) -> Self {
        Self { backend }
    }

    /// Consume the store, returning the backing region (for re-boot in
    /// tests and tooling).
    pub fn into_inner(self) -> S {
        self.backend
    }

    // ── Raw accessors ─────────────────────────────────────────

    fn read_u8(&self, offset: usize) -> u8 {
        let mut buf = [ERASED];
        self.backend.read(offset, &mut buf);
        buf[0]
    }

    fn read_u16(&self, offset: usize) -> u16 {
        let mut buf = [ERASED; 2];
        self.backend.read(offset, &mut buf);
        u16::from_le_bytes(buf)
    }

    fn read_f32(&self, offset: usize) -> f32 {
        let mut buf = [ERASED; 4];
        self.backend.read(offset, &mut buf);
        f32::from_le_bytes(buf)
    }

    // ── Port boot defaults ────────────────────────────────────

    /// Stored boot-default state for a port. Erased storage boots the
    /// port enabled, voltage control off, on the main bus.
    pub fn boot_state(&self, port: PortId) -> BootState {
        let byte = self.read_u8(OFFSET_PORT_DEFAULTS + port.index());
        if byte == ERASED {
            BootState::default()
        } else {
            BootState::from_byte(byte)
        }
    }

    pub fn write_boot_state(&mut self, port: PortId, boot: BootState) {
        self.backend
            .write(OFFSET_PORT_DEFAULTS + port.index(), &[boot.to_byte()]);
    }

    // ── Power-cycle duration ──────────────────────────────────

    /// Power-cycle duration in seconds. Defaults to 1 s.
    pub fn cycle_time_secs(&self) -> u8 {
        let secs = self.read_u8(OFFSET_CYCLE_TIME);
        if secs > CYCLE_TIME_MAX_SECS {
            CYCLE_TIME_DEFAULT_SECS
        } else {
            secs
        }
    }

    pub fn set_cycle_time_secs(&mut self, secs: u8) -> Result<()> {
        if secs > CYCLE_TIME_MAX_SECS {
            warn!("rejected cycle time {secs}s");
            return Err(Error::ConfigRange("cycle time must be 0..=30 s"));
        }
        self.backend.write(OFFSET_CYCLE_TIME, &[secs]);
        info!("cycle time set to {secs}s");
        Ok(())
    }

    // ── Reference voltage ─────────────────────────────────────

    /// ADC reference voltage in volts. Defaults to 4.2 V.
    pub fn reference_voltage(&self) -> f32 {
        let volts = self.read_f32(OFFSET_REF_VOLTAGE);
        if volts.is_nan() || !(REF_VOLTAGE_MIN..=REF_VOLTAGE_MAX).contains(&volts) {
            REF_VOLTAGE_DEFAULT
        } else {
            volts
        }
    }

    pub fn set_reference_voltage(&mut self, volts: f32) -> Result<()> {
        if !(REF_VOLTAGE_MIN..=REF_VOLTAGE_MAX).contains(&volts) {
            warn!("rejected reference voltage {volts:.3}V");
            return Err(Error::ConfigRange("reference voltage must be 4.1..=4.3 V"));
        }
        self.backend
            .write(OFFSET_REF_VOLTAGE, &volts.to_le_bytes());
        info!("reference voltage set to {volts:.3}V");
        Ok(())
    }

    // ── Bus voltage dividers ──────────────────────────────────

    /// Voltage divider ratio for `bus`. Defaults to 15.0×.
    pub fn bus_divider(&self, bus: Bus) -> f32 {
        let raw = self.read_u8(self.divider_offset(bus));
        let raw = if (DIVIDER_RAW_MIN..=DIVIDER_RAW_MAX).contains(&raw) {
            raw
        } else {
            DIVIDER_RAW_DEFAULT
        };
        f32::from(raw) / 10.0
    }

    pub fn set_bus_divider(&mut self, bus: Bus, ratio: f32) -> Result<()> {
        let raw = (ratio * 10.0).round();
        if !(f32::from(DIVIDER_RAW_MIN)..=f32::from(DIVIDER_RAW_MAX)).contains(&raw) {
            warn!("rejected {bus:?} bus divider {ratio:.1}x");
            return Err(Error::ConfigRange("bus divider must be 13.0..=17.0"));
        }
        self.backend.write(self.divider_offset(bus), &[raw as u8]);
        info!("{bus:?} bus divider set to {ratio:.1}x");
        Ok(())
    }

    fn divider_offset(&self, bus: Bus) -> usize {
        match bus {
            Bus::Main => OFFSET_DIVIDER_MAIN,
            Bus::Auxiliary => OFFSET_DIVIDER_AUX,
        }
    }

    // ── Current-sense calibration ─────────────────────────────

    /// Current-sense gain factor for a port. Defaults to 50.0×.
    pub fn current_gain(&self, port: PortId) -> f32 {
        let raw = self.read_u16(OFFSET_CURRENT_GAIN + port.index() * 2);
        let raw = if (GAIN_RAW_MIN..=GAIN_RAW_MAX).contains(&raw) {
            raw
        } else {
            GAIN_RAW_DEFAULT
        };
        f32::from(raw) / 10.0
    }

    pub fn set_current_gain(&mut self, port: PortId, gain: f32) -> Result<()> {
        let raw = (gain * 10.0).round();
        if !(f32::from(GAIN_RAW_MIN)..=f32::from(GAIN_RAW_MAX)).contains(&raw) {
            warn!("rejected port {} current gain {gain:.1}x", port.number());
            return Err(Error::ConfigRange("current gain must be 48.0..=52.0"));
        }
        self.backend.write(
            OFFSET_CURRENT_GAIN + port.index() * 2,
            &(raw as u16).to_le_bytes(),
        );
        info!("port {} current gain set to {gain:.1}x", port.number());
        Ok(())
    }

    /// Current-sense zero offset for a port, raw ADC counts. Defaults
    /// to 0.
    pub fn current_offset(&self, port: PortId) -> u8 {
        let counts = self.read_u8(OFFSET_CURRENT_OFFSET + port.index());
        if counts > CURRENT_OFFSET_MAX {
            0
        } else {
            counts
        }
    }

    pub fn set_current_offset(&mut self, port: PortId, counts: u8) -> Result<()> {
        if counts > CURRENT_OFFSET_MAX {
            warn!("rejected port {} current offset {counts}", port.number());
            return Err(Error::ConfigRange("current offset must be 0..=100 counts"));
        }
        self.backend
            .write(OFFSET_CURRENT_OFFSET + port.index(), &[counts]);
        info!("port {} current offset set to {counts} counts", port.number());
        Ok(())
    }

    // ── Current limit ─────────────────────────────────────────

    /// Overcurrent trip threshold for a port, amps. Defaults to the
    /// 10.0 A hardware maximum.
    pub fn current_limit_amps(&self, port: PortId) -> f32 {
        let raw = self.read_u8(OFFSET_CURRENT_LIMIT + port.index());
        let raw = if raw > LIMIT_RAW_MAX { LIMIT_RAW_MAX } else { raw };
        f32::from(raw) / 10.0
    }

    pub fn set_current_limit_amps(&mut self, port: PortId, amps: f32) -> Result<()> {
        let raw = (amps * 10.0).round();
        if !(0.0..=f32::from(LIMIT_RAW_MAX)).contains(&raw) {
            warn!("rejected port {} current limit {amps:.1}A", port.number());
            return Err(Error::ConfigRange("current limit must be 0.0..=10.0 A"));
        }
        self.backend
            .write(OFFSET_CURRENT_LIMIT + port.index(), &[raw as u8]);
        info!("port {} current limit set to {amps:.1}A", port.number());
        Ok(())
    }

    // ── Voltage thresholds ────────────────────────────────────

    /// Voltage below which a voltage-controlled port switches off.
    /// Defaults to 0.0 V (never trips).
    pub fn voltage_cutoff(&self, port: PortId) -> f32 {
        let volts = f32::from(self.read_u16(OFFSET_VOLTAGE_CUTOFF + port.index() * 2)) / 100.0;
        if volts > VOLTAGE_MAX {
            0.0
        } else {
            volts
        }
    }

    pub fn set_voltage_cutoff(&mut self, port: PortId, volts: f32) -> Result<()> {
        let raw = self.validate_threshold(volts, "cut-off voltage must be 0.0..=50.0 V")?;
        self.backend.write(
            OFFSET_VOLTAGE_CUTOFF + port.index() * 2,
            &raw.to_le_bytes(),
        );
        info!("port {} cut-off set to {volts:.2}V", port.number());
        Ok(())
    }

    /// Voltage above which a voltage-controlled port switches back on.
    /// Defaults to 50.0 V (never re-enables).
    pub fn voltage_cuton(&self, port: PortId) -> f32 {
        let volts = f32::from(self.read_u16(OFFSET_VOLTAGE_CUTON + port.index() * 2)) / 100.0;
        if volts > VOLTAGE_MAX {
            VOLTAGE_MAX
        } else {
            volts
        }
    }

    pub fn set_voltage_cuton(&mut self, port: PortId, volts: f32) -> Result<()> {
        let raw = self.validate_threshold(volts, "cut-on voltage must be 0.0..=50.0 V")?;
        self.backend
            .write(OFFSET_VOLTAGE_CUTON + port.index() * 2, &raw.to_le_bytes());
        info!("port {} cut-on set to {volts:.2}V", port.number());
        Ok(())
    }

    fn validate_threshold(&self, volts: f32, msg: &'static str) -> Result<u16> {
        if !(0.0..=VOLTAGE_MAX).contains(&volts) {
            warn!("rejected voltage threshold {volts:.2}V");
            return Err(Error::ConfigRange(msg));
        }
        Ok((volts * 100.0).round() as u16)
    }

    // ── Display names ─────────────────────────────────────────

    /// Stored display name for a port. Erased storage yields an empty
    /// name.
    pub fn port_name(&self, port: PortId) -> String<NAME_MAX_LEN> {
        self.read_name(OFFSET_PORT_NAMES + port.index() * NAME_SLOT_LEN)
    }

    /// Store a port's display name, truncated to 15 characters.
    pub fn set_port_name(&mut self, port: PortId, name: &str) {
        self.write_name(OFFSET_PORT_NAMES + port.index() * NAME_SLOT_LEN, name);
        info!("port {} renamed", port.number());
    }

    /// Stored display name for the unit itself.
    pub fn unit_name(&self) -> String<NAME_MAX_LEN> {
        self.read_name(OFFSET_UNIT_NAME)
    }

    pub fn set_unit_name(&mut self, name: &str) {
        self.write_name(OFFSET_UNIT_NAME, name);
        info!("unit renamed");
    }

    fn read_name(&self, offset: usize) -> String<NAME_MAX_LEN> {
        let mut slot = [ERASED; NAME_SLOT_LEN];
        self.backend.read(offset, &mut slot);

        let mut name = String::new();
        for &byte in slot.iter().take(NAME_MAX_LEN) {
            // NUL and the erased pattern terminate; anything outside
            // printable ASCII is treated as corruption and ends the name.
            if !(0x20..0x7F).contains(&byte) {
                break;
            }
            if name.push(byte as char).is_err() {
                break;
            }
        }
        name
    }

    fn write_name(&mut self, offset: usize, name: &str) {
        let mut slot = [0u8; NAME_SLOT_LEN];
        for (dst, byte) in slot
            .iter_mut()
            .zip(name.bytes().filter(|b| (0x20..0x7F).contains(b)))
            .take(NAME_MAX_LEN)
        {
            *dst = byte;
        }
        self.backend.write(offset, &slot);
    }

    // ── Factory reset ─────────────────────────────────────────

    /// Overwrite the entire backing region with the erased pattern, so
    /// every subsequent read falls back to its documented default.
    pub fn factory_reset(&mut self) {
        self.backend.fill(ERASED);
        info!("settings store erased to factory defaults");
    }
}

// ───────────────────────────────────────────────────────────────
// In-memory backend (host / tests)
// ───────────────────────────────────────────────────────────────

/// Host-side backing region. Starts in the erased state, exactly like a
/// factory-fresh EEPROM.
pub struct MemoryBackend {
    bytes: [u8; STORE_SIZE],
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            bytes: [ERASED; STORE_SIZE],
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageBackend for MemoryBackend {
    fn read(&self, offset: usize, buf: &mut [u8]) {
        for (i, out) in buf.iter_mut().enumerate() {
            *out = self.bytes.get(offset + i).copied().unwrap_or(ERASED);
        }
    }

    fn write(&mut self, offset: usize, data: &[u8]) {
        for (i, &byte) in data.iter().enumerate() {
            if let Some(slot) = self.bytes.get_mut(offset + i) {
                *slot = byte;
            }
        }
    }

    fn fill(&mut self, value: u8) {
        self.bytes = [value; STORE_SIZE];
    }
}
