//! Shifting the terminal signal: `observe_on` and `delay`.
//!
//! The upstream is subscribed at once. When it signals, the signal is
//! captured and handed to the scheduler; the scheduled work's token replaces
//! the upstream token as the emitter's live resource, so cancelling the
//! downstream while the signal is in flight drops it.

use std::sync::Arc;
use std::time::Duration;

use crate::emitter::Emitter;
use crate::maybe::Maybe;
use crate::operator::Continue;
use crate::scheduler::{SharedScheduler, Task};
use crate::signal::Signal;
use crate::tracing_compat::trace;

fn shift<T: Send + 'static>(
    upstream: Maybe<T>,
    scheduler: SharedScheduler,
    amount: Duration,
    delay_error: bool,
) -> Maybe<T> {
    Maybe::create(move |emitter: &Emitter<T>| {
        let scheduler = Arc::clone(&scheduler);
        upstream.subscribe(Continue::new(
            emitter,
            move |signal: Signal<T>, emitter: &Emitter<T>| {
                if !signal.is_success() && !delay_error {
                    signal.deliver(emitter);
                    return;
                }
                trace!(delay_ms = amount.as_millis() as u64, "shifting terminal signal");
                let target = emitter.clone();
                let task: Task = Box::new(move || signal.deliver(&target));
                let work = if amount.is_zero() {
                    scheduler.schedule(task)
                } else {
                    scheduler.schedule_after(amount, task)
                };
                emitter.set_cancellable(work);
            },
        ));
        Ok(())
    })
}

impl<T: Send + 'static> Maybe<T> {
    /// Delivers the terminal signal as a unit of work on `scheduler`.
    #[must_use]
    pub fn observe_on(&self, scheduler: SharedScheduler) -> Maybe<T> {
        shift(self.clone(), scheduler, Duration::ZERO, true)
    }

    /// Delays the terminal signal by `amount`.
    ///
    /// With `delay_error == false` only a success is delayed; error and empty
    /// completion pass through at once. With `true` all three are delayed.
    #[must_use]
    pub fn delay(&self, amount: Duration, scheduler: SharedScheduler, delay_error: bool) -> Maybe<T> {
        shift(self.clone(), scheduler, amount, delay_error)
    }
}
