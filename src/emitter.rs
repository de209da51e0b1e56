//! Per-subscription bridge from imperative producer code to the protocol.
//!
//! An [`Emitter`] is created for every subscription to a
//! [`Maybe::create`](crate::Maybe::create) source. It owns the root
//! [`CancelToken`] handed to the downstream `on_subscribe`, and it guarantees:
//!
//! - the first terminal call wins, later calls are no-ops
//! - nothing is delivered once the token is cancelled
//! - a success without a value is reported as [`ErrorKind::MissingValue`]
//! - once a terminal signal is claimed, every resource linked below the root
//!   is cancelled before the signal is delivered, and the root itself is
//!   cancelled right after
//!
//! The check-then-claim step runs under the token lock, so a concurrent
//! `cancel` either happens before the claim (nothing is delivered) or after it
//! (the claimed signal is delivered). The root stays active until delivery
//! returns so a parent linked upward (see `subscribe_on`) does not revoke the
//! very signal it is about to receive.
//!
//! [`ErrorKind::MissingValue`]: crate::error::ErrorKind::MissingValue

use core::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::cancel::CancelToken;
use crate::error::Error;
use crate::observer::{Observer, Subscriber};
use crate::tracing_compat::trace;

struct EmitterInner<T> {
    subscriber: Subscriber<T>,
    token: CancelToken,
    resource: Mutex<Option<CancelToken>>,
}

/// Idempotent, cancellation-aware sink handed to producer code.
///
/// Cheap to clone; clones share the same subscription.
pub struct Emitter<T> {
    inner: Arc<EmitterInner<T>>,
}

impl<T> Clone for Emitter<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Emitter<T> {
    /// Creates an emitter for `subscriber` and performs `on_subscribe` with
    /// the emitter's root token.
    pub(crate) fn subscribe(subscriber: Subscriber<T>) -> Self {
        let token = CancelToken::new();
        let emitter = Self {
            inner: Arc::new(EmitterInner {
                subscriber,
                token: token.clone(),
                resource: Mutex::new(None),
            }),
        };
        emitter.inner.subscriber.on_subscribe(token);
        emitter
    }

    /// The root token handed downstream.
    #[must_use]
    pub fn token(&self) -> &CancelToken {
        &self.inner.token
    }

    /// Returns true once the subscription is cancelled or terminated.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.token.is_cancelled()
    }

    /// Cancels the subscription. Returns true iff this call cancelled it.
    pub fn cancel(&self) -> bool {
        self.inner.token.cancel()
    }

    /// Replaces the single live resource token.
    ///
    /// - emitter already cancelled: `token` is cancelled immediately
    /// - `token` already cancelled: the emitter cancels itself
    /// - otherwise `token` becomes the live resource and the previous one is
    ///   unlinked and cancelled
    pub fn set_cancellable(&self, token: CancelToken) {
        if self.is_cancelled() {
            token.cancel();
            return;
        }
        if token.is_cancelled() {
            self.cancel();
            return;
        }
        let previous = self.inner.resource.lock().replace(token.clone());
        self.inner.token.link(&token);
        if let Some(previous) = previous {
            if !previous.same_as(&token) {
                self.inner.token.unlink(&previous);
                previous.cancel();
            }
        }
    }

    /// Adds a token below the root without displacing the live resource.
    ///
    /// Used by combinators that fan out to several upstream subscriptions.
    pub fn add_cancellable(&self, token: &CancelToken) {
        self.inner.token.link(token);
    }

    /// Emits a success. `None` is a protocol violation and is routed to
    /// [`on_error`](Self::on_error).
    pub fn on_success(&self, value: impl Into<Option<T>>) {
        match value.into() {
            Some(value) => {
                if let Some(observer) = self.claim() {
                    observer.on_success(value);
                    self.cancel();
                }
            }
            None => self.on_error(Error::missing_value()),
        }
    }

    /// Emits an error. Anything convertible into [`Error`] is accepted.
    pub fn on_error(&self, error: impl Into<Error>) {
        let error = error.into();
        if let Some(observer) = self.claim() {
            observer.on_error(error);
            self.cancel();
        } else {
            trace!(error = %error, "error dropped after termination");
        }
    }

    /// Emits empty completion.
    pub fn on_complete(&self) {
        if let Some(observer) = self.claim() {
            observer.on_complete();
            self.cancel();
        }
    }

    /// Returns an observer that forwards every signal into this emitter,
    /// adopting the upstream token through
    /// [`set_cancellable`](Self::set_cancellable).
    #[must_use]
    pub fn forwarder(&self) -> Forward<T> {
        Forward {
            emitter: self.clone(),
        }
    }

    fn claim(&self) -> Option<Box<dyn Observer<T>>> {
        let subscriber = &self.inner.subscriber;
        let observer = self.inner.token.with_active(|| subscriber.claim()).flatten()?;
        self.inner.token.cancel_children();
        Some(observer)
    }
}

impl<T> fmt::Debug for Emitter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emitter")
            .field("token", &self.inner.token)
            .field("subscriber", &self.inner.subscriber)
            .finish()
    }
}

/// Observer that forwards into an [`Emitter`]. See [`Emitter::forwarder`].
pub struct Forward<T> {
    emitter: Emitter<T>,
}

impl<T: Send> Observer<T> for Forward<T> {
    fn on_subscribe(&mut self, token: CancelToken) {
        self.emitter.set_cancellable(token);
    }

    fn on_success(self: Box<Self>, value: T) {
        self.emitter.on_success(value);
    }

    fn on_error(self: Box<Self>, error: Error) {
        self.emitter.on_error(error);
    }

    fn on_complete(self: Box<Self>) {
        self.emitter.on_complete();
    }
}
