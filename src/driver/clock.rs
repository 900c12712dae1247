//! Cycle counter abstraction for bounded busy-waits
//!
//! A [`Clock`] is a free-running counter plus its calibrated frequency. Timed
//! waits turn a [`Duration`] into a cycle budget once and then spin on a
//! predicate until it holds or the budget is spent.

use std::hint::spin_loop;
use std::time::{Duration, Instant};

#[cfg(target_arch = "x86_64")]
use log::info;

pub trait Clock {
    /// Current value of the counter.
    fn cycles(&self) -> u64;
    /// Counter ticks per second.
    fn frequency(&self) -> u64;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn cycles(&self) -> u64 {
        (**self).cycles()
    }

    fn frequency(&self) -> u64 {
        (**self).frequency()
    }
}

pub fn duration_to_cycles(timeout: Duration, frequency: u64) -> u64 {
    let cycles = timeout.as_nanos().saturating_mul(frequency as u128) / 1_000_000_000;
    cycles.min(u64::MAX as u128) as u64
}

/// Spin until `ready` returns true or `timeout` has elapsed on `clock`
///
/// `ready` is always evaluated at least once. Returns whether it succeeded.
pub fn poll_until<C, F>(clock: &C, timeout: Duration, mut ready: F) -> bool
where
    C: Clock + ?Sized,
    F: FnMut() -> bool,
{
    let budget = duration_to_cycles(timeout, clock.frequency());
    let start = clock.cycles();

    loop {
        if ready() {
            return true;
        }
        spin_loop();
        if clock.cycles().wrapping_sub(start) >= budget {
            return false;
        }
    }
}

/// Nanosecond clock on top of [`Instant`]
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        MonotonicClock {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn cycles(&self) -> u64 {
        self.origin.elapsed().as_nanos() as u64
    }

    fn frequency(&self) -> u64 {
        1_000_000_000
    }
}

/// The time-stamp counter, with a frequency measured once at construction
#[cfg(target_arch = "x86_64")]
#[derive(Debug, Clone, Copy)]
pub struct TscClock {
    frequency: u64,
}

#[cfg(target_arch = "x86_64")]
impl TscClock {
    /// Measure the TSC rate over `window` of the `reference` clock.
    pub fn calibrate<C: Clock + ?Sized>(reference: &C, window: Duration) -> Self {
        let budget = duration_to_cycles(window, reference.frequency());
        let ref_start = reference.cycles();
        let tsc_start = read_tsc();

        let mut elapsed = 0;
        while elapsed < budget {
            spin_loop();
            elapsed = reference.cycles().wrapping_sub(ref_start);
        }
        let tsc_delta = read_tsc().wrapping_sub(tsc_start);

        // Scale by what actually elapsed on the reference, not the request.
        let elapsed_ns = elapsed as u128 * 1_000_000_000 / reference.frequency().max(1) as u128;
        let frequency = (tsc_delta as u128 * 1_000_000_000 / elapsed_ns.max(1)) as u64;

        info!("tsc: calibrated at {} Hz", frequency);
        TscClock {
            frequency: frequency.max(1),
        }
    }
}

#[cfg(target_arch = "x86_64")]
fn read_tsc() -> u64 {
    // SAFETY: rdtsc has no preconditions on x86_64.
    unsafe { core::arch::x86_64::_rdtsc() }
}

#[cfg(target_arch = "x86_64")]
impl Clock for TscClock {
    fn cycles(&self) -> u64 {
        read_tsc()
    }

    fn frequency(&self) -> u64 {
        self.frequency
    }
}

/// Test clock that advances a fixed number of ticks on every read
#[cfg(test)]
pub(crate) struct StepClock {
    now: std::cell::Cell<u64>,
    step: u64,
    frequency: u64,
}

#[cfg(test)]
impl StepClock {
    pub(crate) fn new(step: u64, frequency: u64) -> Self {
        StepClock {
            now: std::cell::Cell::new(0),
            step,
            frequency,
        }
    }

    pub(crate) fn reads(&self) -> u64 {
        self.now.get() / self.step.max(1)
    }
}

#[cfg(test)]
impl Clock for StepClock {
    fn cycles(&self) -> u64 {
        let now = self.now.get();
        self.now.set(now + self.step);
        now
    }

    fn frequency(&self) -> u64 {
        self.frequency
    }
}
