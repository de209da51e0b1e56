//! Shifting the upstream subscription: `subscribe_on`, `delay_subscription`
//! and `delay_until`.
//!
//! The wrapper hands its own fresh token downstream before anything is
//! scheduled, so the caller can cancel while the subscription is still queued.
//! The queued work checks that token first and is skipped once it is
//! cancelled. When the upstream does subscribe, its token is linked to the
//! wrapper's in both directions.

use std::time::Duration;

use crate::cancel::CancelToken;
use crate::emitter::Emitter;
use crate::error::Error;
use crate::maybe::{Maybe, Source};
use crate::observer::{Observer, Subscriber};
use crate::operator::Continue;
use crate::scheduler::{SharedScheduler, Task};
use crate::signal::Signal;
use crate::tracing_compat::trace;

struct SubscribeOn<T> {
    upstream: Maybe<T>,
    scheduler: SharedScheduler,
    delay: Duration,
}

impl<T: Send + 'static> Source<T> for SubscribeOn<T> {
    fn subscribe_actual(&self, subscriber: Subscriber<T>) {
        let token = CancelToken::new();
        subscriber.on_subscribe(token.clone());

        let upstream = self.upstream.clone();
        let wrapper = token.clone();
        let task: Task = Box::new(move || {
            if wrapper.is_cancelled() {
                trace!(token = wrapper.id(), "subscribe_on: cancelled before subscribing");
                return;
            }
            upstream.subscribe_with(Subscriber::new(Linked {
                token: wrapper,
                downstream: subscriber,
            }));
        });
        let scheduled = if self.delay.is_zero() {
            self.scheduler.schedule(task)
        } else {
            self.scheduler.schedule_after(self.delay, task)
        };
        token.link(&scheduled);
    }
}

/// Upstream observer that ties the upstream token to the wrapper token and
/// forwards to the downstream that already saw `on_subscribe`.
///
/// Delivery is claimed under the wrapper token's lock, like the emitter's,
/// and the wrapper is cancelled once the signal has been handed on.
struct Linked<T> {
    token: CancelToken,
    downstream: Subscriber<T>,
}

impl<T> Linked<T> {
    fn claim(&self) -> Option<Box<dyn Observer<T>>> {
        let downstream = &self.downstream;
        self.token.with_active(|| downstream.claim()).flatten()
    }
}

impl<T: Send> Observer<T> for Linked<T> {
    fn on_subscribe(&mut self, upstream: CancelToken) {
        self.token.link_both(&upstream);
    }

    fn on_success(self: Box<Self>, value: T) {
        if let Some(observer) = self.claim() {
            observer.on_success(value);
        }
        self.token.cancel();
    }

    fn on_error(self: Box<Self>, error: Error) {
        if let Some(observer) = self.claim() {
            observer.on_error(error);
        } else {
            trace!(error = %error, "subscribe_on: error dropped after cancel");
        }
        self.token.cancel();
    }

    fn on_complete(self: Box<Self>) {
        if let Some(observer) = self.claim() {
            observer.on_complete();
        }
        self.token.cancel();
    }
}

impl<T: Send + 'static> Maybe<T> {
    /// Performs the upstream subscription as a unit of work on `scheduler`.
    #[must_use]
    pub fn subscribe_on(&self, scheduler: SharedScheduler) -> Maybe<T> {
        self.delay_subscription(Duration::ZERO, scheduler)
    }

    /// Subscribes upstream only after `amount` has elapsed on `scheduler`.
    ///
    /// Only the subscription moves; the eventual signal is delivered as soon
    /// as the upstream produces it.
    #[must_use]
    pub fn delay_subscription(&self, amount: Duration, scheduler: SharedScheduler) -> Maybe<T> {
        Maybe::from_source(SubscribeOn {
            upstream: self.clone(),
            scheduler,
            delay: amount,
        })
    }

    /// Subscribes upstream once `other` succeeds or completes empty.
    ///
    /// An error from `other` is forwarded and this source is never
    /// subscribed.
    #[must_use]
    pub fn delay_until<U: Send + 'static>(&self, other: Maybe<U>) -> Maybe<T> {
        let upstream = self.clone();
        Maybe::create(move |emitter: &Emitter<T>| {
            let main = upstream.clone();
            other.subscribe(Continue::new(
                emitter,
                move |signal: Signal<U>, emitter: &Emitter<T>| match signal {
                    Signal::Error(error) => emitter.on_error(error),
                    Signal::Success(_) | Signal::Complete => {
                        trace!("delay_until: trigger fired");
                        main.subscribe(emitter.forwarder());
                    }
                },
            ));
            Ok(())
        })
    }
}
