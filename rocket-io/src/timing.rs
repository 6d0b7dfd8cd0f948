//! Telemetry-synchronised command cadence.
//!
//! [`RateDivider`] turns the telemetry arrival stream into a slower command
//! stream without a wall clock: every `divisor` ticks (decoded packets) it
//! raises a single-slot fire flag and wakes one waiter.
//!
//! ```text
//! tick tick tick tick tick tick │ tick tick tick tick tick tick │
//!                           fire│                           fire│
//!       divisor = 6 (333 Hz telemetry → ~56 Hz commands)
//! ```
//!
//! The fire flag is level-triggered: fires raised while nobody is waiting
//! collapse into one pending fire instead of queueing. A waiter that sees no
//! fire within its timeout gets `false`, which turns a silent telemetry
//! outage into an observable condition.

use crate::error::{Error, Result};
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct DividerState {
    counter: u32,
    pending: bool,
}

/// Count-based rate divider with a blocking, timed wait for the next fire
#[derive(Debug)]
pub struct RateDivider {
    divisor: u32,
    state: Mutex<DividerState>,
    fired: Condvar,
    ticks_total: AtomicU64,
    fires_total: AtomicU64,
}

impl RateDivider {
    /// Create a divider that fires once per `divisor` ticks
    pub fn new(divisor: u32) -> Result<Self> {
        if divisor == 0 {
            return Err(Error::InvalidParameter(
                "rate divider divisor must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            divisor,
            state: Mutex::new(DividerState::default()),
            fired: Condvar::new(),
            ticks_total: AtomicU64::new(0),
            fires_total: AtomicU64::new(0),
        })
    }

    /// Configured decimation factor
    pub fn divisor(&self) -> u32 {
        self.divisor
    }

    /// Record one telemetry event; fires on every `divisor`-th call
    pub fn tick(&self) {
        self.ticks_total.fetch_add(1, Ordering::Relaxed);

        let mut state = self.state.lock();
        state.counter += 1;
        if state.counter < self.divisor {
            return;
        }
        state.counter = 0;
        state.pending = true;
        drop(state);

        self.fires_total.fetch_add(1, Ordering::Relaxed);
        self.fired.notify_one();
    }

    /// Block until a fire is pending or `timeout` elapses.
    ///
    /// Returns `true` and consumes the pending fire, or `false` on timeout.
    /// A `timeout` too large to form a deadline waits indefinitely.
    pub fn wait_for_fire(&self, timeout: Duration) -> bool {
        let mut state = self.state.lock();
        match Instant::now().checked_add(timeout) {
            Some(deadline) => {
                while !state.pending {
                    if self.fired.wait_until(&mut state, deadline).timed_out() {
                        break;
                    }
                }
            }
            // Deadline past the end of Instant: wait without one
            None => {
                while !state.pending {
                    self.fired.wait(&mut state);
                }
            }
        }
        std::mem::take(&mut state.pending)
    }

    /// Ticks since the last fire (always below the divisor)
    pub fn counter(&self) -> u32 {
        self.state.lock().counter
    }

    /// Total ticks recorded
    pub fn ticks_total(&self) -> u64 {
        self.ticks_total.load(Ordering::Relaxed)
    }

    /// Total fires raised, including ones that collapsed into a pending fire
    pub fn fires_total(&self) -> u64 {
        self.fires_total.load(Ordering::Relaxed)
    }
}
