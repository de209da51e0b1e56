//! Execution schedulers.
//!
//! The core never sleeps or spawns on its own: every combinator that defers
//! work (`subscribe_on`, `observe_on`, `delay`, `timeout`, ...) receives an
//! explicit [`Scheduler`] and asks it to run a unit of work, optionally after a
//! delay. Each unit of work is represented by a [`CancelToken`]; cancelling it
//! before the work runs means the work never runs.
//!
//! Implementations:
//!
//! | Scheduler | Runs work | Delays |
//! |-----------|-----------|--------|
//! | [`ImmediateScheduler`] | synchronously, on the caller | block the caller |
//! | [`TrampolineScheduler`] | on the caller, re-entrant calls queued | block the outermost caller |
//! | [`VirtualTimeScheduler`] | when the lab clock is advanced | virtual |
//! | [`TimerThreadScheduler`] | on a background timer thread | wall clock |

mod immediate;
mod queue;
mod timer_thread;
mod trampoline;
mod virtual_time;

use std::sync::Arc;
use std::time::Duration;

use crate::cancel::CancelToken;

pub use immediate::ImmediateScheduler;
pub use timer_thread::TimerThreadScheduler;
pub use trampoline::TrampolineScheduler;
pub use virtual_time::VirtualTimeScheduler;

/// A unit of scheduled work.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Shared handle to a scheduler, as accepted by the combinators.
pub type SharedScheduler = Arc<dyn Scheduler>;

/// Capability to run work now or later.
pub trait Scheduler: Send + Sync {
    /// Runs `task` as soon as the scheduler allows.
    fn schedule(&self, task: Task) -> CancelToken {
        self.schedule_after(Duration::ZERO, task)
    }

    /// Runs `task` once `delay` has elapsed on this scheduler's clock.
    ///
    /// The returned token revokes the work if it has not started yet.
    fn schedule_after(&self, delay: Duration, task: Task) -> CancelToken;

    /// Time elapsed on this scheduler's clock.
    fn now(&self) -> Duration;
}
