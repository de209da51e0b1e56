//! Current-thread trampoline scheduler.

use std::cell::RefCell;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use super::queue::TimerQueue;
use super::{Scheduler, Task};
use crate::cancel::CancelToken;
use crate::tracing_compat::trace;

struct Trampoline {
    queue: TimerQueue,
    draining: bool,
}

thread_local! {
    static TRAMPOLINE: RefCell<Trampoline> = RefCell::new(Trampoline {
        queue: TimerQueue::new(),
        draining: false,
    });
}

static ORIGIN: OnceLock<Instant> = OnceLock::new();

fn clock() -> Duration {
    ORIGIN.get_or_init(Instant::now).elapsed()
}

/// Runs work on the calling thread, flattening re-entrant scheduling.
///
/// The outermost `schedule` call on a thread drains that thread's queue;
/// work scheduled from inside running work is queued behind it instead of
/// recursing. Delayed entries run in due order, blocking the draining caller
/// until they are due.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrampolineScheduler;

impl TrampolineScheduler {
    /// Creates a trampoline handle. All handles on a thread share one queue.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn drain() {
        loop {
            let next = TRAMPOLINE.with(|t| {
                let mut t = t.borrow_mut();
                let next = t.queue.pop_next();
                if next.is_none() {
                    t.draining = false;
                }
                next
            });
            let Some(entry) = next else {
                break;
            };
            let now = clock();
            if entry.due() > now {
                std::thread::sleep(entry.due() - now);
            }
            entry.run();
        }
    }
}

impl Scheduler for TrampolineScheduler {
    fn schedule_after(&self, delay: Duration, task: Task) -> CancelToken {
        let due = clock().saturating_add(delay);
        let (token, outermost) = TRAMPOLINE.with(|t| {
            let mut t = t.borrow_mut();
            let token = t.queue.push(due, task);
            let outermost = !t.draining;
            t.draining = true;
            (token, outermost)
        });
        if outermost {
            Self::drain();
        } else {
            trace!(token = token.id(), "trampoline: queued re-entrant work");
        }
        token
    }

    fn now(&self) -> Duration {
        clock()
    }
}
