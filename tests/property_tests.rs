//! Property-based tests over the sensor conversions and the settings
//! store's validation rules.

use proptest::prelude::*;

use poepdu::app::ports::AdcPort;
use poepdu::port::Bus;
use poepdu::sensors::SensorHub;
use poepdu::settings::{MemoryBackend, SettingsStore};
use poepdu::PortId;

/// Replays one fixed count for every channel.
struct ConstantAdc(u16);

impl AdcPort for ConstantAdc {
    fn sample(&mut self, _channel: u8) -> u16 {
        self.0
    }
    fn sample_die_temperature(&mut self) -> u16 {
        self.0
    }
}

fn erased_settings() -> SettingsStore<MemoryBackend> {
    SettingsStore::new(MemoryBackend::new())
}

proptest! {
    /// Current readings never go negative, whatever the raw count and
    /// zero offset.
    #[test]
    fn current_is_never_negative(raw in 0u16..=1023, offset in 0u8..=100) {
        let mut settings = erased_settings();
        let p = PortId::new(0).unwrap();
        settings.set_current_offset(p, offset).unwrap();

        let mut hub = SensorHub::new();
        let amps = hub.read_port_current(&mut ConstantAdc(raw), &settings, p);
        prop_assert!(amps >= 0.0);
    }

    /// More raw counts never means less measured current.
    #[test]
    fn current_is_monotonic_in_raw_counts(
        raw in 0u16..1023,
        step in 1u16..=64,
        offset in 0u8..=100,
    ) {
        let raw_hi = (raw + step).min(1023);
        let mut settings = erased_settings();
        let p = PortId::new(0).unwrap();
        settings.set_current_offset(p, offset).unwrap();

        let mut hub = SensorHub::new();
        let lo = hub.read_port_current(&mut ConstantAdc(raw), &settings, p);
        let hi = hub.read_port_current(&mut ConstantAdc(raw_hi), &settings, p);
        prop_assert!(hi >= lo, "raw {raw}->{raw_hi} gave {lo} -> {hi}");
    }

    /// Bus voltage scales linearly with the divider ratio.
    #[test]
    fn bus_voltage_is_monotonic_in_divider(
        raw in 0u16..=1023,
        ratio_deci in 130u16..=169,
    ) {
        let mut settings = erased_settings();
        let hub = SensorHub::new();

        settings.set_bus_divider(Bus::Main, f32::from(ratio_deci) / 10.0).unwrap();
        let lo = hub.read_bus_voltage(&mut ConstantAdc(raw), &settings, Bus::Main);
        settings.set_bus_divider(Bus::Main, f32::from(ratio_deci + 1) / 10.0).unwrap();
        let hi = hub.read_bus_voltage(&mut ConstantAdc(raw), &settings, Bus::Main);
        prop_assert!(hi >= lo);
    }

    /// A rejected write never disturbs the stored value.
    #[test]
    fn rejected_limit_write_leaves_the_stored_value(
        good_deciamps in 0u16..=100,
        bad in 101u16..=1000,
    ) {
        let mut settings = erased_settings();
        let p = PortId::new(3).unwrap();
        let good = f32::from(good_deciamps) / 10.0;

        settings.set_current_limit_amps(p, good).unwrap();
        prop_assert!(settings.set_current_limit_amps(p, f32::from(bad) / 10.0).is_err());
        let read_back = settings.current_limit_amps(p);
        prop_assert!((read_back - good).abs() < 1e-6);
    }

    /// Every representable in-range limit survives a store/load pair.
    #[test]
    fn current_limit_round_trips_on_the_deciamp_grid(deciamps in 0u16..=100) {
        let mut settings = erased_settings();
        let p = PortId::new(7).unwrap();
        let amps = f32::from(deciamps) / 10.0;

        settings.set_current_limit_amps(p, amps).unwrap();
        prop_assert!((settings.current_limit_amps(p) - amps).abs() < 1e-6);
    }

    /// Every representable in-range threshold survives a store/load
    /// pair, at centivolt resolution.
    #[test]
    fn voltage_thresholds_round_trip_on_the_centivolt_grid(centivolts in 0u16..=5000) {
        let mut settings = erased_settings();
        let p = PortId::new(11).unwrap();
        let volts = f32::from(centivolts) / 100.0;

        settings.set_voltage_cutoff(p, volts).unwrap();
        settings.set_voltage_cuton(p, volts).unwrap();
        prop_assert!((settings.voltage_cutoff(p) - volts).abs() < 1e-4);
        prop_assert!((settings.voltage_cuton(p) - volts).abs() < 1e-4);
    }

    /// Names are always stored printable and at most fifteen bytes.
    #[test]
    fn stored_names_are_printable_and_bounded(name in "\\PC{0,40}") {
        let mut settings = erased_settings();
        let p = PortId::new(0).unwrap();

        settings.set_port_name(p, &name);
        let stored = settings.port_name(p);
        prop_assert!(stored.len() <= 15);
        prop_assert!(stored.chars().all(|c| (' '..='~').contains(&c)));
    }
}
