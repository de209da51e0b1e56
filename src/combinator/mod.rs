//! Concurrency-coordinating combinators.
//!
//! This module provides the combinators that coordinate several
//! subscriptions, or shift a subscription in time:
//!
//! - [`amb`]: subscribe to all sources, the first terminal signal wins
//! - [`zip`]: wait for a success from every source, then combine
//! - [`switch_if_empty`]: fall back to another source on empty completion
//! - [`retry`]: resubscribe on error while a predicate allows it
//! - [`cache`]: one upstream subscription, outcome replayed to everyone
//! - [`timeout`]: race the source against a scheduler-driven error
//! - [`subscribe_on`]: defer the upstream subscription (`subscribe_on`,
//!   `delay_subscription`, `delay_until`)
//! - [`observe_on`]: defer delivery of the terminal signal (`observe_on`,
//!   `delay`)
//!
//! Every combinator is a method on [`Maybe`](crate::Maybe).

pub mod amb;
pub mod cache;
pub mod observe_on;
pub mod retry;
pub mod subscribe_on;
pub mod switch_if_empty;
pub mod timeout;
pub mod zip;

use crate::cancel::CancelToken;
use crate::emitter::Emitter;
use crate::error::Error;
use crate::observer::Observer;

/// Upstream observer for fan-out combinators.
///
/// Links the upstream token below the emitter root without displacing its
/// siblings, forwards error and completion straight into the emitter, and
/// hands a success to `on_value`.
pub(crate) struct Branch<V, R> {
    emitter: Emitter<R>,
    on_value: Box<dyn FnOnce(V) + Send>,
}

impl<V, R> Branch<V, R> {
    pub(crate) fn new(emitter: &Emitter<R>, on_value: impl FnOnce(V) + Send + 'static) -> Self {
        Self {
            emitter: emitter.clone(),
            on_value: Box::new(on_value),
        }
    }
}

impl<V: Send, R: Send> Observer<V> for Branch<V, R> {
    fn on_subscribe(&mut self, token: CancelToken) {
        self.emitter.add_cancellable(&token);
    }

    fn on_success(self: Box<Self>, value: V) {
        (self.on_value)(value);
    }

    fn on_error(self: Box<Self>, error: Error) {
        self.emitter.on_error(error);
    }

    fn on_complete(self: Box<Self>) {
        self.emitter.on_complete();
    }
}
