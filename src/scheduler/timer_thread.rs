//! Background timer-thread scheduler.
//!
//! One dedicated thread sleeps on a condition variable until the earliest
//! deadline in its queue, runs everything due, and goes back to sleep.
//! Scheduling from any thread inserts into the queue and wakes the timer
//! thread so it can re-evaluate its deadline.

use core::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};

use super::queue::TimerQueue;
use super::{Scheduler, Task};
use crate::cancel::CancelToken;
use crate::config::TimerConfig;
use crate::error::{Error, Result};
use crate::tracing_compat::{debug, warn};

struct TimerState {
    queue: TimerQueue,
    shutdown: bool,
}

struct Shared {
    state: Mutex<TimerState>,
    wakeup: Condvar,
    origin: Instant,
}

/// Runs work on a dedicated background thread at wall-clock deadlines.
pub struct TimerThreadScheduler {
    shared: Arc<Shared>,
    handle: Mutex<Option<JoinHandle<()>>>,
    config: TimerConfig,
}

impl TimerThreadScheduler {
    /// Spawns the timer thread described by `config`.
    pub fn new(config: TimerConfig) -> Result<Self> {
        config.validate()?;
        let shared = Arc::new(Shared {
            state: Mutex::new(TimerState {
                queue: TimerQueue::new(),
                shutdown: false,
            }),
            wakeup: Condvar::new(),
            origin: Instant::now(),
        });
        let worker = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name(config.thread_name.clone())
            .stack_size(config.thread_stack_size)
            .spawn(move || timer_loop(&worker))
            .map_err(|e| Error::from(e).with_message("failed to spawn timer thread"))?;
        debug!(thread = %config.thread_name, "timer thread started");
        Ok(Self {
            shared,
            handle: Mutex::new(Some(handle)),
            config,
        })
    }

    /// Spawns a timer thread with the default configuration overlaid with
    /// environment overrides.
    pub fn from_env() -> Result<Self> {
        Self::new(TimerConfig::from_env()?)
    }

    /// The configuration this scheduler was started with.
    #[must_use]
    pub fn config(&self) -> &TimerConfig {
        &self.config
    }

    /// Number of queued, not yet cancelled, units of work.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.shared.state.lock().queue.live_count()
    }

    /// Stops the timer thread. Queued work is cancelled and never runs.
    ///
    /// Returns how many queued entries were dropped. Idempotent.
    pub fn shutdown(&self) -> usize {
        let mut drained = {
            let mut state = self.shared.state.lock();
            if state.shutdown {
                return 0;
            }
            state.shutdown = true;
            std::mem::take(&mut state.queue)
        };
        let dropped = drained.clear();
        self.shared.wakeup.notify_all();
        if let Some(handle) = self.handle.lock().take() {
            if handle.thread().id() != thread::current().id() && handle.join().is_err() {
                warn!("timer thread terminated by panic");
            }
        }
        debug!(dropped, "timer thread stopped");
        dropped
    }
}

impl Drop for TimerThreadScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for TimerThreadScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerThreadScheduler")
            .field("config", &self.config)
            .field("pending", &self.pending())
            .finish()
    }
}

impl Scheduler for TimerThreadScheduler {
    fn schedule_after(&self, delay: Duration, task: Task) -> CancelToken {
        let mut state = self.shared.state.lock();
        if state.shutdown {
            warn!("timer thread is shut down; work dropped");
            return CancelToken::cancelled();
        }
        let due = self.shared.origin.elapsed().saturating_add(delay);
        let token = state.queue.push(due, task);
        drop(state);
        self.shared.wakeup.notify_one();
        token
    }

    fn now(&self) -> Duration {
        self.shared.origin.elapsed()
    }
}

fn timer_loop(shared: &Shared) {
    let mut state = shared.state.lock();
    loop {
        if state.shutdown {
            break;
        }
        let now = shared.origin.elapsed();
        if let Some(entry) = state.queue.pop_due(now) {
            MutexGuard::unlocked(&mut state, || entry.run());
            continue;
        }
        match state.queue.peek_due() {
            Some(due) => {
                let _ = shared.wakeup.wait_for(&mut state, due.saturating_sub(now));
            }
            None => shared.wakeup.wait(&mut state),
        }
    }
}
