//! Port protection supervisor.
//!
//! Owns the runtime [`PortState`] of every output and enforces the three
//! protection behaviours:
//!
//! * **Overcurrent latch** — a port drawing above its stored limit is
//!   switched off and latched; only an explicit power command clears the
//!   latch. The front-panel fault indicator tracks whether any latch is
//!   set.
//! * **Voltage control** — ports armed for voltage control follow their
//!   bus: off below the cut-off threshold, back on above the cut-on
//!   threshold, with a two-phase debounce so a single noisy reading
//!   never toggles a relay.
//! * **Timed power cycle** — a set of ports switched off together and
//!   restored when the scheduler's countdown fires. At most one cycle
//!   can be outstanding.
//!
//! All hardware access goes through the port traits, so the whole state
//! machine runs against mocks on the host.

use log::{error, info, warn};

use crate::app::events::PduEvent;
use crate::app::ports::{AdcPort, EventSink, IndicatorPort, RelayPort, StorageBackend};
use crate::error::{Error, Result};
use crate::port::{Bus, PortId, PortSet, PortState, VoltageControl, PORT_COUNT};
use crate::sensors::SensorHub;
use crate::settings::SettingsStore;

pub struct ProtectionSupervisor {
    states: [PortState; PORT_COUNT],
    /// Ports held off by an outstanding power cycle.
    cycle: Option<PortSet>,
}

impl ProtectionSupervisor {
    /// Build the runtime state from the persisted boot defaults and
    /// drive every relay to its boot position.
    pub fn from_boot<S: StorageBackend>(
        settings: &SettingsStore<S>,
        relays: &mut impl RelayPort,
    ) -> Self {
        let mut states = [PortState::from_boot(Default::default()); PORT_COUNT];
        for port in PortId::all() {
            let state = PortState::from_boot(settings.boot_state(port));
            relays.set(port, state.enabled);
            states[port.index()] = state;
        }
        info!(
            "boot: {} of {PORT_COUNT} ports enabled",
            states.iter().filter(|s| s.enabled).count()
        );
        Self {
            states,
            cycle: None,
        }
    }

    pub fn port_state(&self, port: PortId) -> PortState {
        self.states[port.index()]
    }

    pub fn states(&self) -> &[PortState; PORT_COUNT] {
        &self.states
    }

    pub fn cycle_in_progress(&self) -> bool {
        self.cycle.is_some()
    }

    // ── Overcurrent ───────────────────────────────────────────

    /// One overcurrent sweep. Measures every powered port against its
    /// stored limit, latching violators off. Runs on every scheduler
    /// tick; every port is evaluated independently so a trip on one
    /// never shadows a trip on another.
    pub fn check_current_limits<S: StorageBackend, H: RelayPort + IndicatorPort>(
        &mut self,
        sensors: &mut SensorHub,
        adc: &mut impl AdcPort,
        settings: &SettingsStore<S>,
        hw: &mut H,
        sink: &mut impl EventSink,
    ) {
        for port in PortId::all() {
            let state = &mut self.states[port.index()];
            if !state.enabled || state.overloaded {
                continue;
            }
            let amps = sensors.read_port_current(adc, settings, port);
            if amps > settings.current_limit_amps(port) {
                hw.set(port, false);
                state.enabled = false;
                state.overloaded = true;
                // A latched port must stay off until an operator steps
                // in; voltage control would re-enable it at cut-on.
                state.voltage_control = VoltageControl::Disabled;
                error!(
                    "port {} overload: {amps:.2}A > {:.1}A limit, latched off",
                    port.number(),
                    settings.current_limit_amps(port)
                );
                sink.emit(&PduEvent::OverloadLatched { port, amps });
            }
        }
        let any_latched = self.states.iter().any(|s| s.overloaded);
        hw.set_fault(any_latched);
    }

    // ── Voltage control ───────────────────────────────────────

    /// One voltage-control sweep. Reads both bus voltages once, then
    /// walks every armed port through the two-phase debounce: a
    /// threshold crossing moves the port to `Pending`, and only a
    /// second consecutive crossing switches the relay.
    pub fn check_voltage_thresholds<S: StorageBackend>(
        &mut self,
        sensors: &SensorHub,
        adc: &mut impl AdcPort,
        settings: &SettingsStore<S>,
        relays: &mut impl RelayPort,
        sink: &mut impl EventSink,
    ) {
        let main_volts = sensors.read_bus_voltage(adc, settings, Bus::Main);
        let aux_volts = sensors.read_bus_voltage(adc, settings, Bus::Auxiliary);

        for port in PortId::all() {
            let state = &mut self.states[port.index()];
            if !state.voltage_control.is_active() {
                continue;
            }
            let volts = match state.bus {
                Bus::Main => main_volts,
                Bus::Auxiliary => aux_volts,
            };
            let below_cutoff = state.enabled && volts < settings.voltage_cutoff(port);
            let above_cuton = !state.enabled && volts > settings.voltage_cuton(port);

            if below_cutoff || above_cuton {
                match state.voltage_control {
                    VoltageControl::Armed => {
                        state.voltage_control = VoltageControl::Pending;
                        warn!(
                            "port {} voltage threshold crossed at {volts:.2}V, pending",
                            port.number()
                        );
                    }
                    VoltageControl::Pending => {
                        if below_cutoff {
                            relays.set(port, false);
                            state.enabled = false;
                            info!(
                                "port {} cut off at {volts:.2}V",
                                port.number()
                            );
                            sink.emit(&PduEvent::VoltageCutoff { port, volts });
                        } else {
                            relays.set(port, true);
                            state.enabled = true;
                            info!("port {} cut on at {volts:.2}V", port.number());
                            sink.emit(&PduEvent::VoltageCuton { port, volts });
                        }
                        state.voltage_control = VoltageControl::Armed;
                    }
                    VoltageControl::Disabled => unreachable!(),
                }
            } else if state.voltage_control == VoltageControl::Pending {
                // The crossing was transient; stand down.
                state.voltage_control = VoltageControl::Armed;
            }
        }
    }

    // ── Commands ──────────────────────────────────────────────

    /// Explicit power command. Clears any overload latch and any
    /// half-tripped voltage debounce, so the operator's intent always
    /// wins over in-flight protection state.
    pub fn set_power(
        &mut self,
        port: PortId,
        on: bool,
        relays: &mut impl RelayPort,
        sink: &mut impl EventSink,
    ) {
        let state = &mut self.states[port.index()];
        relays.set(port, on);
        state.enabled = on;
        state.overloaded = false;
        if state.voltage_control == VoltageControl::Pending {
            state.voltage_control = VoltageControl::Armed;
        }
        info!(
            "port {} switched {}",
            port.number(),
            if on { "on" } else { "off" }
        );
        sink.emit(&PduEvent::PowerChanged { port, on });
    }

    /// Switch a set of ports off for a timed power cycle. Fails if a
    /// cycle is already outstanding; the caller arms the scheduler
    /// countdown after this returns.
    pub fn begin_cycle(
        &mut self,
        ports: PortSet,
        relays: &mut impl RelayPort,
        sink: &mut impl EventSink,
    ) -> Result<()> {
        if self.cycle.is_some() {
            warn!("power cycle refused, one already in progress");
            return Err(Error::CycleInProgress);
        }
        for port in ports.iter() {
            let state = &mut self.states[port.index()];
            relays.set(port, false);
            state.enabled = false;
            state.overloaded = false;
            if state.voltage_control == VoltageControl::Pending {
                state.voltage_control = VoltageControl::Armed;
            }
        }
        self.cycle = Some(ports);
        info!("power cycle started on {} port(s)", ports.iter().count());
        sink.emit(&PduEvent::CycleStarted { ports });
        Ok(())
    }

    /// Restore the cycled ports. Called when the scheduler countdown
    /// fires; a spurious call with no cycle outstanding is a no-op.
    pub fn finish_cycle(&mut self, relays: &mut impl RelayPort, sink: &mut impl EventSink) {
        let Some(ports) = self.cycle.take() else {
            return;
        };
        for port in ports.iter() {
            let state = &mut self.states[port.index()];
            relays.set(port, true);
            state.enabled = true;
        }
        info!("power cycle complete, {} port(s) restored", ports.iter().count());
        sink.emit(&PduEvent::CycleCompleted { ports });
    }

    /// Arm or disarm voltage control on a port.
    pub fn set_voltage_control(&mut self, port: PortId, on: bool) {
        let state = &mut self.states[port.index()];
        state.voltage_control = if on {
            VoltageControl::Armed
        } else {
            VoltageControl::Disabled
        };
    }

    /// Re-reference a port to the other bus.
    pub fn set_bus_assignment(&mut self, port: PortId, bus: Bus) {
        self.states[port.index()].bus = bus;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::MemoryBackend;

    struct MockHw {
        relays: [bool; PORT_COUNT],
        fault: bool,
    }

    impl MockHw {
        fn new() -> Self {
            Self {
                relays: [false; PORT_COUNT],
                fault: false,
            }
        }
    }

    impl RelayPort for MockHw {
        fn set(&mut self, port: PortId, on: bool) {
            self.relays[port.index()] = on;
        }
    }

    impl IndicatorPort for MockHw {
        fn set_fault(&mut self, asserted: bool) {
            self.fault = asserted;
        }
    }

    struct ScriptedAdc {
        counts: [u16; 14],
    }

    impl AdcPort for ScriptedAdc {
        fn sample(&mut self, channel: u8) -> u16 {
            self.counts[channel as usize]
        }
        fn sample_die_temperature(&mut self) -> u16 {
            298
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        events: Vec<PduEvent>,
    }

    impl EventSink for RecordingSink {
        fn emit(&mut self, event: &PduEvent) {
            self.events.push(event.clone());
        }
    }

    fn port(index: u8) -> PortId {
        PortId::new(index).unwrap()
    }

    fn setup() -> (
        ProtectionSupervisor,
        SettingsStore<MemoryBackend>,
        SensorHub,
        MockHw,
        ScriptedAdc,
        RecordingSink,
    ) {
        let settings = SettingsStore::new(MemoryBackend::new());
        let mut hw = MockHw::new();
        let supervisor = ProtectionSupervisor::from_boot(&settings, &mut hw);
        (
            supervisor,
            settings,
            SensorHub::new(),
            hw,
            ScriptedAdc { counts: [0; 14] },
            RecordingSink::default(),
        )
    }

    #[test]
    fn boot_defaults_close_every_relay() {
        let (supervisor, _, _, hw, _, _) = setup();
        assert!(hw.relays.iter().all(|&on| on));
        assert!(supervisor.states().iter().all(|s| s.enabled));
    }

    #[test]
    fn overload_latches_port_off_and_asserts_fault() {
        let (mut sup, mut settings, mut sensors, mut hw, mut adc, mut sink) = setup();
        let p = port(4);
        settings.set_current_limit_amps(p, 3.0).unwrap();
        adc.counts[4] = 854; // ≈3.50 A at default calibration

        sup.check_current_limits(&mut sensors, &mut adc, &settings, &mut hw, &mut sink);

        let state = sup.port_state(p);
        assert!(!state.enabled);
        assert!(state.overloaded);
        assert_eq!(state.voltage_control, VoltageControl::Disabled);
        assert!(!hw.relays[4]);
        assert!(hw.fault);
        assert!(matches!(
            sink.events.as_slice(),
            [PduEvent::OverloadLatched { port, .. }] if *port == p
        ));

        // Latched ports are skipped; no duplicate events.
        sup.check_current_limits(&mut sensors, &mut adc, &settings, &mut hw, &mut sink);
        assert_eq!(sink.events.len(), 1);
        assert!(hw.fault);
    }

    #[test]
    fn manual_power_on_clears_the_latch() {
        let (mut sup, mut settings, mut sensors, mut hw, mut adc, mut sink) = setup();
        let p = port(0);
        settings.set_current_limit_amps(p, 3.0).unwrap();
        adc.counts[0] = 854;
        sup.check_current_limits(&mut sensors, &mut adc, &settings, &mut hw, &mut sink);
        assert!(sup.port_state(p).overloaded);

        sup.set_power(p, true, &mut hw, &mut sink);
        let state = sup.port_state(p);
        assert!(state.enabled);
        assert!(!state.overloaded);
        assert!(hw.relays[0]);

        // Fault indicator clears on the next sweep.
        adc.counts[0] = 0;
        sup.check_current_limits(&mut sensors, &mut adc, &settings, &mut hw, &mut sink);
        assert!(!hw.fault);
    }

    #[test]
    fn voltage_cutoff_requires_two_consecutive_crossings() {
        let (mut sup, mut settings, sensors, mut hw, mut adc, mut sink) = setup();
        let p = port(2);
        settings.set_voltage_cutoff(p, 48.0).unwrap();
        sup.set_voltage_control(p, true);

        adc.counts[12] = 764; // ≈47.0 V
        sup.check_voltage_thresholds(&sensors, &mut adc, &settings, &mut hw, &mut sink);
        assert!(sup.port_state(p).enabled, "first crossing must only arm");
        assert_eq!(sup.port_state(p).voltage_control, VoltageControl::Pending);

        sup.check_voltage_thresholds(&sensors, &mut adc, &settings, &mut hw, &mut sink);
        let state = sup.port_state(p);
        assert!(!state.enabled);
        assert_eq!(state.voltage_control, VoltageControl::Armed);
        assert!(matches!(
            sink.events.as_slice(),
            [PduEvent::VoltageCutoff { port, .. }] if *port == p
        ));
    }

    #[test]
    fn transient_dip_does_not_trip() {
        let (mut sup, mut settings, sensors, mut hw, mut adc, mut sink) = setup();
        let p = port(2);
        settings.set_voltage_cutoff(p, 48.0).unwrap();
        sup.set_voltage_control(p, true);

        adc.counts[12] = 764; // dip below cut-off
        sup.check_voltage_thresholds(&sensors, &mut adc, &settings, &mut hw, &mut sink);
        adc.counts[12] = 800; // recovered
        sup.check_voltage_thresholds(&sensors, &mut adc, &settings, &mut hw, &mut sink);

        let state = sup.port_state(p);
        assert!(state.enabled);
        assert_eq!(state.voltage_control, VoltageControl::Armed);
        assert!(sink.events.is_empty());
    }

    #[test]
    fn voltage_cuton_restores_an_off_port() {
        let (mut sup, mut settings, sensors, mut hw, mut adc, mut sink) = setup();
        let p = port(6);
        settings.set_voltage_cuton(p, 46.0).unwrap();
        sup.set_power(p, false, &mut hw, &mut sink);
        sup.set_voltage_control(p, true);
        sink.events.clear();

        adc.counts[12] = 780; // ≈48.0 V, above cut-on
        sup.check_voltage_thresholds(&sensors, &mut adc, &settings, &mut hw, &mut sink);
        sup.check_voltage_thresholds(&sensors, &mut adc, &settings, &mut hw, &mut sink);

        assert!(sup.port_state(p).enabled);
        assert!(hw.relays[6]);
        assert!(matches!(
            sink.events.as_slice(),
            [PduEvent::VoltageCuton { port, .. }] if *port == p
        ));
    }

    #[test]
    fn only_one_cycle_outstanding() {
        let (mut sup, _, _, mut hw, _, mut sink) = setup();
        let ports = PortSet::single(port(1));

        sup.begin_cycle(ports, &mut hw, &mut sink).unwrap();
        assert!(!hw.relays[1]);
        assert!(sup.cycle_in_progress());
        assert_eq!(
            sup.begin_cycle(PortSet::single(port(2)), &mut hw, &mut sink),
            Err(Error::CycleInProgress)
        );

        sup.finish_cycle(&mut hw, &mut sink);
        assert!(hw.relays[1]);
        assert!(!sup.cycle_in_progress());
        assert!(matches!(
            sink.events.as_slice(),
            [PduEvent::CycleStarted { .. }, PduEvent::CycleCompleted { .. }]
        ));

        // Spurious completion with nothing outstanding is a no-op.
        sup.finish_cycle(&mut hw, &mut sink);
        assert_eq!(sink.events.len(), 2);
    }
}
