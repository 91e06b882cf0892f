//! Sensor pipeline: raw ADC counts → engineering units.
//!
//! Every reading starts as an average of five back-to-back conversions
//! from one multiplexer channel, then gets scaled by the stored
//! calibration. The hub also tracks a per-port high-water mark of the
//! largest current ever observed, in centiamps, saturating at 2.55 A.

use crate::app::ports::{AdcPort, StorageBackend};
use crate::port::{Bus, PortId, PORT_COUNT};
use crate::settings::SettingsStore;

/// Samples averaged per reading.
const AVG_POINTS: u16 = 5;
/// Full-scale ADC count (10-bit converter).
const ADC_FULL_SCALE: f32 = 1024.0;
/// Current-sense shunt resistance, ohms.
const SHUNT_OHMS: f32 = 0.02;
/// Die-sensor output is offset from absolute zero by this many kelvin
/// per count.
const DIE_TEMP_OFFSET_K: i16 = 273;

const CHANNEL_MAIN_VOLTAGE: u8 = 12;
const CHANNEL_AUX_VOLTAGE: u8 = 13;
const CHANNEL_MAX: u8 = 13;

/// Averaging, scaling, and high-water tracking over an [`AdcPort`].
pub struct SensorHub {
    /// Per-port maximum observed current, centiamps, saturating.
    high_water: [u8; PORT_COUNT],
}

impl SensorHub {
    pub const fn new() -> Self {
        Self {
            high_water: [0; PORT_COUNT],
        }
    }

    /// Averaged raw reading from one multiplexer channel. Channels
    /// beyond the board's multiplexer read as zero.
    pub fn read_raw(&self, adc: &mut impl AdcPort, channel: u8) -> u16 {
        if channel > CHANNEL_MAX {
            return 0;
        }
        let mut sum: u32 = 0;
        for _ in 0..AVG_POINTS {
            sum += u32::from(adc.sample(channel));
        }
        (sum / u32::from(AVG_POINTS)) as u16
    }

    /// Calibrated current draw on a port, amps.
    ///
    /// The stored zero offset is subtracted in raw counts (floored at
    /// zero, so an idle port never reads negative), then the count is
    /// converted through the reference voltage, the sense-amplifier
    /// gain, and the shunt resistance. Also advances the port's
    /// high-water mark.
    pub fn read_port_current<S: StorageBackend>(
        &mut self,
        adc: &mut impl AdcPort,
        settings: &SettingsStore<S>,
        port: PortId,
    ) -> f32 {
        let raw = self.read_raw(adc, port.index() as u8);
        let counts = raw.saturating_sub(u16::from(settings.current_offset(port)));

        let volts_per_count = settings.reference_voltage() / ADC_FULL_SCALE;
        let amps = f32::from(counts) * volts_per_count / settings.current_gain(port) / SHUNT_OHMS;

        let centiamps = (amps * 100.0).min(255.0) as u8;
        let slot = &mut self.high_water[port.index()];
        *slot = (*slot).max(centiamps);

        amps
    }

    /// Calibrated voltage on a power bus, volts.
    pub fn read_bus_voltage<S: StorageBackend>(
        &self,
        adc: &mut impl AdcPort,
        settings: &SettingsStore<S>,
        bus: Bus,
    ) -> f32 {
        let channel = match bus {
            Bus::Main => CHANNEL_MAIN_VOLTAGE,
            Bus::Auxiliary => CHANNEL_AUX_VOLTAGE,
        };
        let raw = self.read_raw(adc, channel);
        f32::from(raw) * (settings.reference_voltage() / ADC_FULL_SCALE)
            * settings.bus_divider(bus)
    }

    /// Uncalibrated die temperature, degrees Celsius (±10 °C).
    ///
    /// The multiplexer needs a conversion to settle on the temperature
    /// channel, so the first sample is discarded.
    pub fn read_temperature(&self, adc: &mut impl AdcPort) -> i16 {
        let _ = adc.sample_die_temperature();
        adc.sample_die_temperature() as i16 - DIE_TEMP_OFFSET_K
    }

    /// Largest current ever observed on a port, amps (0.01 A
    /// resolution, saturating at 2.55 A).
    pub fn high_water_amps(&self, port: PortId) -> f32 {
        f32::from(self.high_water[port.index()]) / 100.0
    }
}

impl Default for SensorHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::MemoryBackend;

    /// Replays a fixed count for every sample on a channel.
    struct FixedAdc {
        counts: [u16; 14],
        die: u16,
        die_first: u16,
        die_calls: usize,
    }

    impl FixedAdc {
        fn new() -> Self {
            Self {
                counts: [0; 14],
                die: 0,
                die_first: 0,
                die_calls: 0,
            }
        }
    }

    impl AdcPort for FixedAdc {
        fn sample(&mut self, channel: u8) -> u16 {
            self.counts[channel as usize]
        }

        fn sample_die_temperature(&mut self) -> u16 {
            self.die_calls += 1;
            if self.die_calls == 1 {
                self.die_first
            } else {
                self.die
            }
        }
    }

    fn erased_settings() -> SettingsStore<MemoryBackend> {
        SettingsStore::new(MemoryBackend::new())
    }

    fn port(index: u8) -> PortId {
        PortId::new(index).unwrap()
    }

    #[test]
    fn raw_read_averages_and_bounds_channels() {
        let hub = SensorHub::new();
        let mut adc = FixedAdc::new();
        adc.counts[3] = 700;
        assert_eq!(hub.read_raw(&mut adc, 3), 700);
        assert_eq!(hub.read_raw(&mut adc, 14), 0);
        assert_eq!(hub.read_raw(&mut adc, 255), 0);
    }

    #[test]
    fn current_conversion_with_default_calibration() {
        // Default calibration: 4.2 V reference, 50.0× gain, 0.02 Ω
        // shunt. One count is 4.2/1024/50/0.02 ≈ 4.102 mA.
        let mut hub = SensorHub::new();
        let mut adc = FixedAdc::new();
        adc.counts[0] = 488;
        let settings = erased_settings();

        let amps = hub.read_port_current(&mut adc, &settings, port(0));
        assert!((amps - 2.0018).abs() < 0.01, "got {amps}");
    }

    #[test]
    fn offset_is_subtracted_and_floored() {
        let mut hub = SensorHub::new();
        let mut adc = FixedAdc::new();
        adc.counts[2] = 10;
        let mut settings = erased_settings();
        settings.set_current_offset(port(2), 40).unwrap();

        // Raw below the offset must clamp to zero, never negative.
        let amps = hub.read_port_current(&mut adc, &settings, port(2));
        assert_eq!(amps, 0.0);
    }

    #[test]
    fn bus_voltage_conversion() {
        let hub = SensorHub::new();
        let mut adc = FixedAdc::new();
        adc.counts[12] = 780;
        let settings = erased_settings();

        // 780 × (4.2/1024) × 15.0 ≈ 47.99 V
        let volts = hub.read_bus_voltage(&mut adc, &settings, Bus::Main);
        assert!((volts - 47.99).abs() < 0.05, "got {volts}");
    }

    #[test]
    fn temperature_discards_settling_sample() {
        let hub = SensorHub::new();
        let mut adc = FixedAdc::new();
        adc.die_first = 999; // bogus settling value
        adc.die = 298;
        assert_eq!(hub.read_temperature(&mut adc), 25);
    }

    #[test]
    fn high_water_mark_only_rises() {
        let mut hub = SensorHub::new();
        let mut adc = FixedAdc::new();
        let settings = erased_settings();
        let p = port(5);

        adc.counts[5] = 300;
        hub.read_port_current(&mut adc, &settings, p);
        let peak = hub.high_water_amps(p);
        assert!(peak > 1.0);

        adc.counts[5] = 50;
        hub.read_port_current(&mut adc, &settings, p);
        assert_eq!(hub.high_water_amps(p), peak);
    }
}
