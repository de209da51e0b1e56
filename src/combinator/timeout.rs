//! Deadline on the terminal signal.
//!
//! `timeout` is `amb` between the source and a timer source that errors with
//! [`ErrorKind::Timeout`](crate::ErrorKind::Timeout) when the scheduler fires.
//! Whichever signals first wins and cancels the other, so a source that
//! settles in time also cancels the pending timer entry.

use std::time::Duration;

use crate::emitter::Emitter;
use crate::error::Error;
use crate::maybe::Maybe;
use crate::scheduler::SharedScheduler;
use crate::tracing_compat::debug;

/// Source that errors with a timeout after `amount`.
fn timer<T: Send + 'static>(amount: Duration, scheduler: SharedScheduler) -> Maybe<T> {
    Maybe::create(move |emitter: &Emitter<T>| {
        let deadline = emitter.clone();
        let work = scheduler.schedule_after(
            amount,
            Box::new(move || {
                debug!(amount_ms = amount.as_millis() as u64, "timeout elapsed");
                deadline.on_error(Error::timeout(amount));
            }),
        );
        emitter.set_cancellable(work);
        Ok(())
    })
}

impl<T: Send + 'static> Maybe<T> {
    /// Errors with a `Timeout` error unless a terminal signal arrives within
    /// `amount` on `scheduler`'s clock.
    #[must_use]
    pub fn timeout(&self, amount: Duration, scheduler: SharedScheduler) -> Maybe<T> {
        Maybe::amb([self.clone(), timer(amount, scheduler)])
    }

    /// Switches to `fallback` instead of erroring when `amount` elapses.
    #[must_use]
    pub fn timeout_or(&self, amount: Duration, scheduler: SharedScheduler, fallback: Maybe<T>) -> Maybe<T> {
        self.timeout(amount, scheduler)
            .on_error_resume_next(move |error| {
                if error.is_timeout() {
                    fallback.clone()
                } else {
                    Maybe::error(error)
                }
            })
    }
}
