//! Host-side simulator.
//!
//! Runs the control core against scripted hardware: a main bus that
//! sags and recovers, and one port whose load ramps past its current
//! limit. Useful for watching the protection behaviour end to end
//! without a board. Prints the final status report as JSON.
//!
//! ```text
//! RUST_LOG=info cargo run --bin poepdu-sim
//! ```

use anyhow::Context;
use log::info;

use poepdu::app::events::PduEvent;
use poepdu::app::ports::{AdcPort, EventSink, IndicatorPort, RelayPort};
use poepdu::settings::MemoryBackend;
use poepdu::{Bus, PduService, PortId, PortSet, Scheduler, PORT_COUNT};

/// Scripted transducers: a sagging main bus and a ramping load.
struct SimAdc {
    tick: u32,
}

impl SimAdc {
    /// Main bus counts for the current tick: nominal 48 V, a sag below
    /// 44 V between ticks 40 and 100, then recovery.
    fn main_bus_counts(&self) -> u16 {
        match self.tick {
            40..=99 => 700, // ≈43.1 V
            _ => 780,       // ≈48.0 V
        }
    }

    /// Port 3 load ramp: idle, then climbing past 3.0 A around tick 60.
    fn port3_counts(&self) -> u16 {
        (200 + self.tick * 10).min(900) as u16
    }
}

impl AdcPort for SimAdc {
    fn sample(&mut self, channel: u8) -> u16 {
        match channel {
            3 => self.port3_counts(),
            0..=11 => 250, // ≈1.0 A quiescent load
            12 => self.main_bus_counts(),
            13 => 780,
            _ => 0,
        }
    }

    fn sample_die_temperature(&mut self) -> u16 {
        301 // 28 °C
    }
}

/// Relays and fault LED as plain state.
struct SimBoard {
    relays: [bool; PORT_COUNT],
    fault: bool,
}

impl RelayPort for SimBoard {
    fn set(&mut self, port: PortId, on: bool) {
        self.relays[port.index()] = on;
    }
}

impl IndicatorPort for SimBoard {
    fn set_fault(&mut self, asserted: bool) {
        self.fault = asserted;
    }
}

/// Forwards every domain event to the log.
struct LogSink;

impl EventSink for LogSink {
    fn emit(&mut self, event: &PduEvent) {
        info!("event: {event:?}");
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let scheduler = Scheduler::new();
    let mut adc = SimAdc { tick: 0 };
    let mut board = SimBoard {
        relays: [false; PORT_COUNT],
        fault: false,
    };
    let mut sink = LogSink;

    let mut service = PduService::new(MemoryBackend::new(), &mut board);

    // Scenario: port 4 limited to 3 A, port 1 voltage-controlled with a
    // 44 V cut-off and 46 V cut-on against the sagging main bus.
    let ramping = PortId::new(3)?;
    let watched = PortId::new(0)?;
    service.settings_mut().set_current_limit_amps(ramping, 3.0)?;
    service.settings_mut().set_voltage_cutoff(watched, 44.0)?;
    service.settings_mut().set_voltage_cuton(watched, 46.0)?;
    service.settings_mut().set_unit_name("sim-bench");
    service.set_voltage_control(watched, true);
    service.set_bus_assignment(watched, Bus::Main);

    // A two-second power cycle on port 12, early in the run.
    service.settings_mut().set_cycle_time_secs(2)?;
    service
        .request_cycle(PortSet::single(PortId::new(11)?), &scheduler, &mut board, &mut sink)
        .context("arming power cycle")?;

    // 200 ticks = 50 simulated seconds.
    for tick in 0..200 {
        adc.tick = tick;
        scheduler.on_tick();
        service.poll(&scheduler, &mut adc, &mut board, &mut sink);
    }

    let report = service.status_report(&mut adc);
    let json = serde_json::to_string_pretty(&report).context("serializing status report")?;
    println!("{json}");

    info!(
        "run complete: fault indicator {}",
        if board.fault { "asserted" } else { "clear" }
    );
    Ok(())
}
