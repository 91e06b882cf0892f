//! Interrupt-side tick source.
//!
//! A hardware timer fires every 0.25 s and calls [`Scheduler::on_tick`].
//! The handler only increments the tick counter, raises "due" flags, and
//! counts down an armed power cycle — no calibration reads, no I/O, no
//! floating point. All fields are single atomics, so neither side can
//! ever observe a half-updated value.
//!
//! The control loop is the single consumer: it *takes* each flag with an
//! atomic swap and then performs the corresponding check. Flags are
//! levels, not counters — ticks that raise an already-raised flag
//! coalesce into one handling pass, which is sound because each check
//! reads live state rather than a queued snapshot.
//!
//! ```text
//! ┌─────────────┐  due flags (AtomicBool)   ┌──────────────┐
//! │ Timer ISR   │──────────────────────────▶│ Control loop │
//! │ on_tick()   │◀──────────────────────────│ poll()       │
//! └─────────────┘  start_cycle (AtomicU16)  └──────────────┘
//! ```

use core::sync::atomic::{AtomicBool, AtomicU16, AtomicU32, Ordering};

/// Timer interrupt rate.
pub const TICKS_PER_SECOND: u32 = 4;
/// Voltage cutoff/cuton check interval, in ticks (~5 s).
pub const VOLTAGE_CHECK_INTERVAL_TICKS: u32 = 20;
/// Current-limit check interval, in ticks (~0.25 s).
pub const CURRENT_CHECK_INTERVAL_TICKS: u32 = 1;

/// Shared tick state between the timer interrupt and the control loop.
///
/// The interrupt side is the sole writer of the due flags and the cycle
/// countdown; the loop side is the sole consumer, and the sole writer of
/// the cycle arm (a single release store in [`start_cycle`]).
///
/// [`start_cycle`]: Scheduler::start_cycle
pub struct Scheduler {
    tick: AtomicU32,
    voltage_due: AtomicBool,
    current_due: AtomicBool,
    cycle_due: AtomicBool,
    cycle_remaining_ticks: AtomicU16,
    cycle_active: AtomicBool,
}

impl Scheduler {
    pub const fn new() -> Self {
        Self {
            tick: AtomicU32::new(0),
            voltage_due: AtomicBool::new(false),
            current_due: AtomicBool::new(false),
            cycle_due: AtomicBool::new(false),
            cycle_remaining_ticks: AtomicU16::new(0),
            cycle_active: AtomicBool::new(false),
        }
    }

    /// Timer interrupt body. Integer-only, single atomic writes.
    pub fn on_tick(&self) {
        let tick = self.tick.fetch_add(1, Ordering::Relaxed).wrapping_add(1);

        if tick % VOLTAGE_CHECK_INTERVAL_TICKS == 0 {
            self.voltage_due.store(true, Ordering::Release);
        }
        if tick % CURRENT_CHECK_INTERVAL_TICKS == 0 {
            self.current_due.store(true, Ordering::Release);
        }

        if self.cycle_active.load(Ordering::Acquire) {
            let previous = self.cycle_remaining_ticks.fetch_sub(1, Ordering::AcqRel);
            if previous <= 1 {
                self.cycle_active.store(false, Ordering::Release);
                self.cycle_due.store(true, Ordering::Release);
            }
        }
    }

    /// Take the voltage-check due flag, clearing it.
    pub fn take_voltage_due(&self) -> bool {
        self.voltage_due.swap(false, Ordering::AcqRel)
    }

    /// Take the current-check due flag, clearing it.
    pub fn take_current_due(&self) -> bool {
        self.current_due.swap(false, Ordering::AcqRel)
    }

    /// Take the cycle-complete due flag, clearing it.
    pub fn take_cycle_due(&self) -> bool {
        self.cycle_due.swap(false, Ordering::AcqRel)
    }

    /// Arm the power-cycle countdown. Called from the control loop after
    /// it has switched the targeted ports off.
    ///
    /// A zero-second duration still takes one full tick, so the relays
    /// always see a visible off interval.
    pub fn start_cycle(&self, seconds: u8) {
        let ticks = (u16::from(seconds) * TICKS_PER_SECOND as u16).max(1);
        self.cycle_remaining_ticks.store(ticks, Ordering::Release);
        self.cycle_active.store(true, Ordering::Release);
    }

    /// Whether a power-cycle countdown is armed.
    pub fn cycle_active(&self) -> bool {
        self.cycle_active.load(Ordering::Acquire)
    }

    /// Monotonic tick count since power-up.
    pub fn tick_count(&self) -> u32 {
        self.tick.load(Ordering::Relaxed)
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_due_every_tick() {
        let sched = Scheduler::new();
        assert!(!sched.take_current_due());
        sched.on_tick();
        assert!(sched.take_current_due());
        assert!(!sched.take_current_due());
    }

    #[test]
    fn voltage_due_every_twenty_ticks() {
        let sched = Scheduler::new();
        for _ in 0..VOLTAGE_CHECK_INTERVAL_TICKS - 1 {
            sched.on_tick();
        }
        assert!(!sched.take_voltage_due());
        sched.on_tick();
        assert!(sched.take_voltage_due());
    }

    #[test]
    fn flags_coalesce() {
        let sched = Scheduler::new();
        sched.on_tick();
        sched.on_tick();
        sched.on_tick();
        // Three ticks raised the flag three times; one take drains it.
        assert!(sched.take_current_due());
        assert!(!sched.take_current_due());
    }

    #[test]
    fn cycle_countdown_fires_once() {
        let sched = Scheduler::new();
        sched.start_cycle(1); // 4 ticks
        for _ in 0..3 {
            sched.on_tick();
            assert!(!sched.take_cycle_due());
        }
        sched.on_tick();
        assert!(sched.take_cycle_due());
        assert!(!sched.cycle_active());

        // No further fires without re-arming.
        sched.on_tick();
        assert!(!sched.take_cycle_due());
    }

    #[test]
    fn zero_second_cycle_still_takes_a_tick() {
        let sched = Scheduler::new();
        sched.start_cycle(0);
        assert!(sched.cycle_active());
        sched.on_tick();
        assert!(sched.take_cycle_due());
    }
}
