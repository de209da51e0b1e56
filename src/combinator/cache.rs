//! Single upstream subscription, outcome replayed to every subscriber.
//!
//! ```text
//! Idle ──first subscribe──▶ Pending(waiters) ──upstream signal──▶ Done(signal)
//!                             ▲  later subscribers                 │ replay to
//!                             └─ queue here                        ▼ everyone
//! ```
//!
//! Cancelling one subscriber only detaches that subscriber: it is removed from
//! the waiter list at once, so subscribe/cancel churn against a slow upstream
//! does not accumulate. The upstream subscription is never cancelled.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::cancel::CancelToken;
use crate::emitter::Emitter;
use crate::error::Error;
use crate::maybe::{Maybe, Source};
use crate::observer::{Observer, Subscriber};
use crate::signal::Signal;
use crate::tracing_compat::trace;

enum CacheState<T> {
    Idle,
    Pending(Vec<Emitter<T>>),
    Done(Signal<T>),
}

struct Cache<T> {
    upstream: Maybe<T>,
    state: Arc<Mutex<CacheState<T>>>,
}

impl<T: Clone + Send + Sync + 'static> Source<T> for Cache<T> {
    fn subscribe_actual(&self, subscriber: Subscriber<T>) {
        let emitter = Emitter::subscribe(subscriber);
        let mut state = self.state.lock();
        match &mut *state {
            CacheState::Done(signal) => {
                let signal = signal.clone();
                drop(state);
                trace!("cache: replaying stored outcome");
                signal.deliver(&emitter);
                return;
            }
            CacheState::Pending(waiters) => {
                waiters.push(emitter.clone());
                drop(state);
                self.detach_on_cancel(&emitter);
                return;
            }
            CacheState::Idle => {}
        }
        *state = CacheState::Pending(vec![emitter.clone()]);
        drop(state);
        self.detach_on_cancel(&emitter);
        trace!("cache: subscribing upstream");
        self.upstream.subscribe(Fill {
            state: Arc::clone(&self.state),
        });
    }
}

impl<T: Clone + Send + Sync + 'static> Cache<T> {
    /// Removes the waiter from the pending list once its token is cancelled.
    ///
    /// Registered after the state lock is released: an already-cancelled
    /// token runs the hook inline.
    fn detach_on_cancel(&self, emitter: &Emitter<T>) {
        let state = Arc::downgrade(&self.state);
        let id = emitter.token().id();
        emitter.token().on_cancel(move || {
            let Some(state) = state.upgrade() else {
                return;
            };
            if let CacheState::Pending(waiters) = &mut *state.lock() {
                waiters.retain(|waiter| waiter.token().id() != id);
            };
        });
    }
}

struct Fill<T> {
    state: Arc<Mutex<CacheState<T>>>,
}

impl<T: Clone> Fill<T> {
    fn settle(self: Box<Self>, signal: Signal<T>) {
        let previous = std::mem::replace(&mut *self.state.lock(), CacheState::Done(signal.clone()));
        let CacheState::Pending(waiters) = previous else {
            return;
        };
        trace!(waiters = waiters.len(), "cache: upstream settled");
        for waiter in waiters {
            signal.clone().deliver(&waiter);
        }
    }
}

impl<T: Clone + Send> Observer<T> for Fill<T> {
    fn on_subscribe(&mut self, _token: CancelToken) {}

    fn on_success(self: Box<Self>, value: T) {
        self.settle(Signal::Success(value));
    }

    fn on_error(self: Box<Self>, error: Error) {
        self.settle(Signal::Error(error));
    }

    fn on_complete(self: Box<Self>) {
        self.settle(Signal::Complete);
    }
}

impl<T: Clone + Send + Sync + 'static> Maybe<T> {
    /// Memoizes the first subscription's outcome.
    ///
    /// The returned `Maybe` is hot after its first subscription: the upstream
    /// is subscribed exactly once, and every subscriber (present or future)
    /// sees the same signal. Each call to `cache` creates an independent
    /// memo.
    #[must_use]
    pub fn cache(&self) -> Maybe<T> {
        Maybe::from_source(Cache {
            upstream: self.clone(),
            state: Arc::new(Mutex::new(CacheState::Idle)),
        })
    }
}
