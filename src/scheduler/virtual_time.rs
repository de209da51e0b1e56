//! Deterministic virtual-time scheduler for tests and simulations.
//!
//! Work runs only when the clock is advanced explicitly, in
//! (due time, scheduling order). No wall-clock dependencies:
//!
//! ```
//! use std::sync::atomic::{AtomicBool, Ordering};
//! use std::sync::Arc;
//! use std::time::Duration;
//! use rx_maybe::scheduler::{Scheduler, VirtualTimeScheduler};
//!
//! let lab = VirtualTimeScheduler::new();
//! let fired = Arc::new(AtomicBool::new(false));
//! let f = Arc::clone(&fired);
//! lab.schedule_after(Duration::from_millis(50), Box::new(move || f.store(true, Ordering::SeqCst)));
//!
//! lab.advance_by(Duration::from_millis(49));
//! assert!(!fired.load(Ordering::SeqCst));
//! lab.advance_by(Duration::from_millis(1));
//! assert!(fired.load(Ordering::SeqCst));
//! ```

use core::fmt;
use std::time::Duration;

use parking_lot::Mutex;

use super::queue::TimerQueue;
use super::{Scheduler, Task};
use crate::cancel::CancelToken;
use crate::tracing_compat::trace;

struct LabClock {
    now: Duration,
    queue: TimerQueue,
}

/// Lab scheduler driven by an explicit virtual clock.
pub struct VirtualTimeScheduler {
    clock: Mutex<LabClock>,
}

impl VirtualTimeScheduler {
    /// Creates a scheduler whose clock reads zero.
    #[must_use]
    pub fn new() -> Self {
        Self::starting_at(Duration::ZERO)
    }

    /// Creates a scheduler whose clock starts at `now`.
    #[must_use]
    pub fn starting_at(now: Duration) -> Self {
        Self {
            clock: Mutex::new(LabClock {
                now,
                queue: TimerQueue::new(),
            }),
        }
    }

    /// Number of scheduled, not yet cancelled, units of work.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.clock.lock().queue.live_count()
    }

    /// Returns true when no live work is queued.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.pending() == 0
    }

    /// Advances the clock by `delta`, running everything that becomes due.
    ///
    /// Returns how many units of work ran.
    pub fn advance_by(&self, delta: Duration) -> usize {
        let target = self.clock.lock().now.saturating_add(delta);
        self.advance_to(target)
    }

    /// Advances the clock to `target`, running everything due at or before
    /// it in order. Work scheduled while advancing runs too if it falls due
    /// within the window. The clock never moves backwards.
    pub fn advance_to(&self, target: Duration) -> usize {
        let mut ran = 0;
        loop {
            let entry = {
                let mut clock = self.clock.lock();
                match clock.queue.pop_due(target) {
                    Some(entry) => {
                        clock.now = clock.now.max(entry.due());
                        entry
                    }
                    None => {
                        clock.now = clock.now.max(target);
                        break;
                    }
                }
            };
            trace!(due = ?entry.due(), "lab: running work");
            entry.run();
            ran += 1;
        }
        ran
    }

    /// Runs everything already due at the current time.
    pub fn run_until_idle(&self) -> usize {
        let now = self.clock.lock().now;
        self.advance_to(now)
    }

    /// Jumps the clock to the next due unit of work and runs it.
    ///
    /// Returns false if nothing is queued.
    pub fn advance_to_next(&self) -> bool {
        let entry = {
            let mut clock = self.clock.lock();
            let Some(entry) = clock.queue.pop_next() else {
                return false;
            };
            clock.now = clock.now.max(entry.due());
            entry
        };
        entry.run();
        true
    }

    /// Runs queued work until the queue is empty, jumping the clock as
    /// needed. Returns how many units ran.
    pub fn run_all(&self) -> usize {
        let mut ran = 0;
        while self.advance_to_next() {
            ran += 1;
        }
        ran
    }
}

impl Default for VirtualTimeScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for VirtualTimeScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let clock = self.clock.lock();
        f.debug_struct("VirtualTimeScheduler")
            .field("now", &clock.now)
            .field("pending", &clock.queue.live_count())
            .finish()
    }
}

impl Scheduler for VirtualTimeScheduler {
    fn schedule_after(&self, delay: Duration, task: Task) -> CancelToken {
        let mut clock = self.clock.lock();
        let due = clock.now.saturating_add(delay);
        clock.queue.push(due, task)
    }

    fn now(&self) -> Duration {
        self.clock.lock().now
    }
}
