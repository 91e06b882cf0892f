//! Control-core facade.
//!
//! [`PduService`] owns the settings store, the sensor hub, and the
//! protection supervisor, and exposes the operations the outside world
//! (serial console, control loop, tests) drives them through. Hardware
//! still arrives through the port traits on every call, so the service
//! itself stays hardware-free.

use log::info;

use crate::app::events::{PduEvent, PortStatus, StatusReport};
use crate::app::ports::{AdcPort, EventSink, IndicatorPort, RelayPort, StorageBackend};
use crate::error::Result;
use crate::port::{BootState, Bus, PortId, PortSet, PortState, VoltageControl};
use crate::protection::ProtectionSupervisor;
use crate::scheduler::Scheduler;
use crate::sensors::SensorHub;
use crate::settings::SettingsStore;

pub struct PduService<S: StorageBackend> {
    settings: SettingsStore<S>,
    sensors: SensorHub,
    protection: ProtectionSupervisor,
}

impl<S: StorageBackend> PduService<S> {
    /// Boot the control core: read the persisted defaults and drive
    /// every relay to its boot position.
    pub fn new(backend: S, relays: &mut impl RelayPort) -> Self {
        let settings = SettingsStore::new(backend);
        let protection = ProtectionSupervisor::from_boot(&settings, relays);
        Self {
            settings,
            sensors: SensorHub::new(),
            protection,
        }
    }

    /// One pass of the control loop. Consumes whichever scheduler flags
    /// are due and runs the corresponding checks. Called continuously
    /// from the main loop; does nothing when no flag is set.
    pub fn poll<H: RelayPort + IndicatorPort>(
        &mut self,
        scheduler: &Scheduler,
        adc: &mut impl AdcPort,
        hw: &mut H,
        sink: &mut impl EventSink,
    ) {
        if scheduler.take_cycle_due() {
            self.protection.finish_cycle(hw, sink);
        }
        if scheduler.take_current_due() {
            self.protection
                .check_current_limits(&mut self.sensors, adc, &self.settings, hw, sink);
        }
        if scheduler.take_voltage_due() {
            self.protection
                .check_voltage_thresholds(&self.sensors, adc, &self.settings, hw, sink);
        }
    }

    // ── Port commands ─────────────────────────────────────────

    /// Switch a set of ports on or off. Clears any overload latch on
    /// the targeted ports.
    pub fn set_power(
        &mut self,
        ports: PortSet,
        on: bool,
        relays: &mut impl RelayPort,
        sink: &mut impl EventSink,
    ) {
        for port in ports.iter() {
            self.protection.set_power(port, on, relays, sink);
        }
    }

    /// Start a timed power cycle on `ports`, using the stored cycle
    /// duration. Fails if a cycle is already outstanding.
    pub fn request_cycle(
        &mut self,
        ports: PortSet,
        scheduler: &Scheduler,
        relays: &mut impl RelayPort,
        sink: &mut impl EventSink,
    ) -> Result<()> {
        self.protection.begin_cycle(ports, relays, sink)?;
        scheduler.start_cycle(self.settings.cycle_time_secs());
        Ok(())
    }

    /// Arm or disarm voltage control on a port, and persist the choice
    /// as the port's boot default.
    pub fn set_voltage_control(&mut self, port: PortId, on: bool) {
        self.protection.set_voltage_control(port, on);
        let boot = BootState {
            voltage_control: on,
            ..self.settings.boot_state(port)
        };
        self.settings.write_boot_state(port, boot);
    }

    /// Re-reference a port to the other bus, and persist the choice as
    /// the port's boot default.
    pub fn set_bus_assignment(&mut self, port: PortId, bus: Bus) {
        self.protection.set_bus_assignment(port, bus);
        let boot = BootState {
            bus,
            ..self.settings.boot_state(port)
        };
        self.settings.write_boot_state(port, boot);
    }

    /// Persist whether a port powers up enabled. Affects the next boot
    /// only; the running state is untouched.
    pub fn set_boot_default(&mut self, port: PortId, enabled: bool) {
        let boot = BootState {
            enabled,
            ..self.settings.boot_state(port)
        };
        self.settings.write_boot_state(port, boot);
    }

    /// Persist every port's current on/off state as its boot default.
    pub fn save_boot_defaults(&mut self) {
        for port in PortId::all() {
            let state = self.protection.port_state(port);
            let boot = BootState {
                enabled: state.enabled,
                ..self.settings.boot_state(port)
            };
            self.settings.write_boot_state(port, boot);
        }
        info!("current port states saved as boot defaults");
    }

    /// Erase the persistent store. Takes effect fully at the next boot;
    /// the running port states are left as they are.
    pub fn factory_reset(&mut self, sink: &mut impl EventSink) {
        self.settings.factory_reset();
        sink.emit(&PduEvent::FactoryReset);
    }

    // ── Reporting ─────────────────────────────────────────────

    /// Calibrated current draw on one port, amps.
    pub fn read_current(&mut self, adc: &mut impl AdcPort, port: PortId) -> f32 {
        self.sensors.read_port_current(adc, &self.settings, port)
    }

    /// Calibrated voltage on one bus, volts.
    pub fn read_bus_voltage(&mut self, adc: &mut impl AdcPort, bus: Bus) -> f32 {
        self.sensors.read_bus_voltage(adc, &self.settings, bus)
    }

    /// Die temperature, degrees Celsius.
    pub fn read_temperature(&mut self, adc: &mut impl AdcPort) -> i16 {
        self.sensors.read_temperature(adc)
    }

    /// Full status snapshot in engineering units.
    pub fn status_report(&mut self, adc: &mut impl AdcPort) -> StatusReport {
        let main_voltage = self
            .sensors
            .read_bus_voltage(adc, &self.settings, Bus::Main);
        let aux_voltage = self
            .sensors
            .read_bus_voltage(adc, &self.settings, Bus::Auxiliary);
        let temperature_c = self.sensors.read_temperature(adc);

        let mut ports = heapless::Vec::new();
        for port in PortId::all() {
            let state = self.protection.port_state(port);
            let current_a = self
                .sensors
                .read_port_current(adc, &self.settings, port);
            let bus_voltage = match state.bus {
                Bus::Main => main_voltage,
                Bus::Auxiliary => aux_voltage,
            };
            let status = PortStatus {
                number: port.number(),
                name: self.settings.port_name(port),
                enabled: state.enabled,
                overloaded: state.overloaded,
                voltage_control: state.voltage_control != VoltageControl::Disabled,
                bus: state.bus,
                current_a,
                power_w: bus_voltage * current_a,
                high_water_a: self.sensors.high_water_amps(port),
            };
            // Cannot overflow: the Vec is sized to PORT_COUNT.
            let _ = ports.push(status);
        }

        StatusReport {
            unit_name: self.settings.unit_name(),
            main_voltage,
            aux_voltage,
            temperature_c,
            ports,
        }
    }

    pub fn port_state(&self, port: PortId) -> PortState {
        self.protection.port_state(port)
    }

    pub fn cycle_in_progress(&self) -> bool {
        self.protection.cycle_in_progress()
    }

    // ── Settings passthrough ──────────────────────────────────

    pub fn settings(&self) -> &SettingsStore<S> {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut SettingsStore<S> {
        &mut self.settings
    }

    /// Tear down the service and return the storage backend, so a test
    /// or tool can simulate a reboot by re-booting from the same bytes.
    pub fn into_backend(self) -> S {
        self.settings.into_inner()
    }
}
