//! Synchronous scheduler.

use std::time::{Duration, Instant};

use super::queue::run_task;
use super::{Scheduler, Task};
use crate::cancel::CancelToken;

/// Runs work synchronously on the calling thread.
///
/// A non-zero delay blocks the caller for that long. The returned token is
/// only useful to work that checks it while running; by the time
/// `schedule_after` returns the work has already run.
#[derive(Debug, Clone, Copy)]
pub struct ImmediateScheduler {
    origin: Instant,
}

impl ImmediateScheduler {
    /// Creates a scheduler whose clock starts now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for ImmediateScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for ImmediateScheduler {
    fn schedule_after(&self, delay: Duration, task: Task) -> CancelToken {
        let token = CancelToken::new();
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        run_task(&token, task);
        token
    }

    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::init_test_logging;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn runs_before_returning() {
        init_test_logging();
        let ran = Arc::new(AtomicBool::new(false));
        let r = Arc::clone(&ran);
        let scheduler = ImmediateScheduler::new();
        scheduler.schedule(Box::new(move || r.store(true, Ordering::SeqCst)));
        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn delay_blocks_the_caller() {
        init_test_logging();
        let scheduler = ImmediateScheduler::new();
        let start = Instant::now();
        scheduler.schedule_after(Duration::from_millis(10), Box::new(|| {}));
        assert!(start.elapsed() >= Duration::from_millis(10));
        assert!(scheduler.now() >= Duration::from_millis(10));
    }
}
