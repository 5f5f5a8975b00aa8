//! Tick sources.
//!
//! Two ways to pace the pipeline:
//!
//! - [`Deadline`]: busy-poll a monotonic microsecond clock. Jitter is bounded
//!   by one main-loop iteration.
//! - [`ReadyFlag`] + [`FlagCadence`]: a periodic timer interrupt raises a
//!   flag that the main loop consumes. Jitter is bounded by interrupt latency.
//!
//! Neither queues work. At most one tick is ever pending; ticks that come due
//! while one is already pending are dropped and reported in [`Tick::missed`].

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::config::SamplerConfig;

/// One readiness event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Tick {
    /// Starts at 1 and increments per delivered tick.
    pub seq: u32,
    /// Clock reading when the tick was observed.
    pub at_us: u64,
    /// Ticks dropped since the previous delivered one.
    pub missed: u32,
}

/// Something that decides when the pipeline runs.
pub trait CadenceSource {
    /// Returns a tick if one is due at `now_us`.
    fn poll(&mut self, now_us: u64) -> Option<Tick>;

    fn period_us(&self) -> u32;
}

/// Monotonic microsecond clock.
pub trait Clock {
    fn now_us(&mut self) -> u64;
}

impl<F: FnMut() -> u64> Clock for F {
    fn now_us(&mut self) -> u64 {
        self()
    }
}

/// Busy-poll cadence against a deadline.
///
/// The deadline advances in whole periods so the long-run rate stays locked
/// to the clock. If the caller polls late by more than a period, the
/// deadlines that slipped by are skipped instead of fired back to back.
#[derive(Debug, Clone)]
pub struct Deadline {
    period_us: u64,
    next_us: u64,
    seq: u32,
}

impl Deadline {
    /// First tick is due one period after `now_us`.
    pub fn new(period_us: u32, now_us: u64) -> Self {
        debug_assert!(period_us > 0);
        let period_us = u64::from(period_us.max(1));
        Self {
            period_us,
            next_us: now_us + period_us,
            seq: 0,
        }
    }

    pub fn from_config(config: &SamplerConfig, now_us: u64) -> Self {
        Self::new(config.tick_period_us(), now_us)
    }

    pub fn next_deadline_us(&self) -> u64 {
        self.next_us
    }
}

impl CadenceSource for Deadline {
    fn poll(&mut self, now_us: u64) -> Option<Tick> {
        if now_us < self.next_us {
            return None;
        }
        let late = now_us - self.next_us;
        let missed = late / self.period_us;
        self.next_us += self.period_us * (missed + 1);
        self.seq = self.seq.wrapping_add(1);
        Some(Tick {
            seq: self.seq,
            at_us: now_us,
            missed: missed.min(u64::from(u32::MAX)) as u32,
        })
    }

    fn period_us(&self) -> u32 {
        self.period_us as u32
    }
}

/// Readiness flag shared between a timer interrupt and the main loop.
///
/// The interrupt is the only writer that sets it and the main loop the only
/// one that clears it. Needs native atomic swap (Cortex-M3 and up).
#[derive(Debug)]
pub struct ReadyFlag {
    ready: AtomicBool,
    overruns: AtomicU32,
}

impl ReadyFlag {
    pub const fn new() -> Self {
        Self {
            ready: AtomicBool::new(false),
            overruns: AtomicU32::new(0),
        }
    }

    /// Called from the timer interrupt. Returns `false` if the previous tick
    /// had not been taken yet; that tick stays pending and this one is
    /// counted as an overrun.
    pub fn signal(&self) -> bool {
        if self.ready.swap(true, Ordering::Release) {
            self.overruns.fetch_add(1, Ordering::Relaxed);
            false
        } else {
            true
        }
    }

    /// Called from the main loop; clears the flag.
    pub fn take(&self) -> bool {
        self.ready.swap(false, Ordering::Acquire)
    }

    /// Ticks dropped because the flag was still set.
    pub fn overruns(&self) -> u32 {
        self.overruns.load(Ordering::Relaxed)
    }
}

impl Default for ReadyFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// Main-loop side of a [`ReadyFlag`].
#[derive(Debug)]
pub struct FlagCadence<'a> {
    flag: &'a ReadyFlag,
    period_us: u32,
    seq: u32,
    seen_overruns: u32,
}

impl<'a> FlagCadence<'a> {
    pub fn new(flag: &'a ReadyFlag, period_us: u32) -> Self {
        Self {
            flag,
            period_us,
            seq: 0,
            seen_overruns: flag.overruns(),
        }
    }
}

impl CadenceSource for FlagCadence<'_> {
    fn poll(&mut self, now_us: u64) -> Option<Tick> {
        if !self.flag.take() {
            return None;
        }
        let overruns = self.flag.overruns();
        let missed = overruns.wrapping_sub(self.seen_overruns);
        self.seen_overruns = overruns;
        self.seq = self.seq.wrapping_add(1);
        Some(Tick {
            seq: self.seq,
            at_us: now_us,
            missed,
        })
    }

    fn period_us(&self) -> u32 {
        self.period_us
    }
}
