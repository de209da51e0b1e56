//! Predicate-driven resubscription.
//!
//! # Design
//!
//! Resubscription must not recurse: a source that fails synchronously would
//! otherwise grow the stack once per attempt. Every resubscribe request bumps
//! a work-in-progress counter, and only the caller that moved it off zero
//! runs the drain loop:
//!
//! ```text
//! resubscribe():
//!   if wip++ != 0: return        // an outer frame is draining
//!   missed = 1
//!   loop:
//!     subscribe(upstream)        // may fail synchronously and re-enter
//!     missed = (wip -= missed)
//!     if missed == 0: break
//! ```
//!
//! There is no backoff: attempts happen as fast as the upstream fails. Pair
//! with `delay_subscription` for spacing.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::cancel::CancelToken;
use crate::emitter::Emitter;
use crate::error::{catch_panic, Error};
use crate::maybe::Maybe;
use crate::observer::Observer;
use crate::tracing_compat::{debug, trace};

type Predicate = dyn Fn(u32, &Error) -> bool + Send + Sync;

struct RetryLoop<T> {
    upstream: Maybe<T>,
    predicate: Arc<Predicate>,
    emitter: Emitter<T>,
    wip: AtomicUsize,
    attempt: AtomicU32,
}

impl<T: Send + 'static> RetryLoop<T> {
    fn resubscribe(self: &Arc<Self>) {
        if self.wip.fetch_add(1, Ordering::AcqRel) != 0 {
            return;
        }
        let mut missed = 1;
        loop {
            if self.emitter.is_cancelled() {
                return;
            }
            self.upstream.subscribe(Attempt {
                state: Arc::clone(self),
            });
            missed = self.wip.fetch_sub(missed, Ordering::AcqRel) - missed;
            if missed == 0 {
                break;
            }
        }
    }
}

struct Attempt<T> {
    state: Arc<RetryLoop<T>>,
}

impl<T: Send + 'static> Observer<T> for Attempt<T> {
    fn on_subscribe(&mut self, token: CancelToken) {
        self.state.emitter.set_cancellable(token);
    }

    fn on_success(self: Box<Self>, value: T) {
        self.state.emitter.on_success(value);
    }

    fn on_error(self: Box<Self>, error: Error) {
        let attempt = self.state.attempt.fetch_add(1, Ordering::AcqRel);
        match catch_panic(|| (self.state.predicate)(attempt, &error)) {
            Ok(true) => {
                trace!(attempt, error = %error, "retry: resubscribing");
                self.state.resubscribe();
            }
            Ok(false) => {
                debug!(attempt, error = %error, "retry: giving up");
                self.state.emitter.on_error(error);
            }
            Err(panic) => {
                debug!(attempt, error = %panic, "retry predicate panicked");
                self.state.emitter.on_error(panic);
            }
        }
    }

    fn on_complete(self: Box<Self>) {
        self.state.emitter.on_complete();
    }
}

impl<T: Send + 'static> Maybe<T> {
    /// Resubscribes on error while `predicate(attempt, &error)` returns true.
    ///
    /// `attempt` is 0 for the first failure. A `false` forwards the error; a
    /// panicking predicate forwards a
    /// [`Panicked`](crate::ErrorKind::Panicked) error.
    pub fn retry<P>(&self, predicate: P) -> Maybe<T>
    where
        P: Fn(u32, &Error) -> bool + Send + Sync + 'static,
    {
        let upstream = self.clone();
        let predicate: Arc<Predicate> = Arc::new(predicate);
        Maybe::create(move |emitter| {
            Arc::new(RetryLoop {
                upstream: upstream.clone(),
                predicate: Arc::clone(&predicate),
                emitter: emitter.clone(),
                wip: AtomicUsize::new(0),
                attempt: AtomicU32::new(0),
            })
            .resubscribe();
            Ok(())
        })
    }

    /// Resubscribes on error up to `times` times.
    #[must_use]
    pub fn retry_times(&self, times: u32) -> Maybe<T> {
        self.retry(move |attempt, _| attempt < times)
    }
}
