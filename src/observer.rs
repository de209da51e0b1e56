//! The emission protocol.
//!
//! An [`Observer`] receives `on_subscribe` first, then at most one terminal
//! signal: `on_success`, `on_error` or `on_complete`. Terminal methods consume
//! the boxed observer, so "at most once" is enforced by ownership rather than
//! by convention.
//!
//! [`Subscriber`] is the crate-side handle to a downstream observer. It is
//! clonable and thread-safe, and its terminal methods take the observer out of
//! a shared slot, so whichever caller gets there first delivers and everyone
//! else is a no-op.

use core::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::cancel::CancelToken;
use crate::error::Error;

/// Consumer of a single `Maybe` emission.
///
/// Every method defaults to a no-op, so implementors only override the
/// signals they care about.
pub trait Observer<T>: Send {
    /// Called exactly once, synchronously, before any terminal signal.
    fn on_subscribe(&mut self, token: CancelToken) {
        let _ = token;
    }

    /// The source produced a value.
    fn on_success(self: Box<Self>, value: T) {
        let _ = value;
    }

    /// The source failed.
    fn on_error(self: Box<Self>, error: Error) {
        let _ = error;
    }

    /// The source completed without a value.
    fn on_complete(self: Box<Self>) {}
}

type SubscribeFn = Box<dyn FnMut(CancelToken) + Send>;
type SuccessFn<T> = Box<dyn FnOnce(T) + Send>;
type ErrorFn = Box<dyn FnOnce(Error) + Send>;
type CompleteFn = Box<dyn FnOnce() + Send>;

/// An observer assembled from optional closures.
///
/// Missing callbacks are no-ops.
///
/// ```
/// use rx_maybe::{Callbacks, Maybe};
///
/// let token = Maybe::just(21).subscribe(
///     Callbacks::new()
///         .on_success(|v| assert_eq!(v * 2, 42))
///         .on_error(|e| panic!("unexpected {e}")),
/// );
/// assert!(token.is_cancelled());
/// ```
pub struct Callbacks<T> {
    subscribe: Option<SubscribeFn>,
    success: Option<SuccessFn<T>>,
    error: Option<ErrorFn>,
    complete: Option<CompleteFn>,
}

impl<T> Callbacks<T> {
    /// Creates an observer with every callback absent.
    #[must_use]
    pub fn new() -> Self {
        Self {
            subscribe: None,
            success: None,
            error: None,
            complete: None,
        }
    }

    /// Sets the subscribe hook.
    #[must_use]
    pub fn on_subscribe(mut self, f: impl FnMut(CancelToken) + Send + 'static) -> Self {
        self.subscribe = Some(Box::new(f));
        self
    }

    /// Sets the success callback.
    #[must_use]
    pub fn on_success(mut self, f: impl FnOnce(T) + Send + 'static) -> Self {
        self.success = Some(Box::new(f));
        self
    }

    /// Sets the error callback.
    #[must_use]
    pub fn on_error(mut self, f: impl FnOnce(Error) + Send + 'static) -> Self {
        self.error = Some(Box::new(f));
        self
    }

    /// Sets the completion callback.
    #[must_use]
    pub fn on_complete(mut self, f: impl FnOnce() + Send + 'static) -> Self {
        self.complete = Some(Box::new(f));
        self
    }
}

impl<T> Default for Callbacks<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Callbacks<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("on_subscribe", &self.subscribe.is_some())
            .field("on_success", &self.success.is_some())
            .field("on_error", &self.error.is_some())
            .field("on_complete", &self.complete.is_some())
            .finish()
    }
}

impl<T: Send> Observer<T> for Callbacks<T> {
    fn on_subscribe(&mut self, token: CancelToken) {
        if let Some(f) = self.subscribe.as_mut() {
            f(token);
        }
    }

    fn on_success(self: Box<Self>, value: T) {
        if let Some(f) = self.success {
            f(value);
        }
    }

    fn on_error(self: Box<Self>, error: Error) {
        if let Some(f) = self.error {
            f(error);
        }
    }

    fn on_complete(self: Box<Self>) {
        if let Some(f) = self.complete {
            f();
        }
    }
}

/// Observer that ignores every signal.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl<T> Observer<T> for NoopObserver {}

struct Slot<T> {
    observer: Option<Box<dyn Observer<T>>>,
    token: Option<CancelToken>,
}

/// Thread-safe, take-once handle to a downstream observer.
pub struct Subscriber<T> {
    slot: Arc<Mutex<Slot<T>>>,
}

impl<T> Clone for Subscriber<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T> Subscriber<T> {
    /// Wraps an observer.
    pub fn new(observer: impl Observer<T> + 'static) -> Self {
        Self::from_boxed(Box::new(observer))
    }

    /// Wraps an already boxed observer.
    #[must_use]
    pub fn from_boxed(observer: Box<dyn Observer<T>>) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Slot {
                observer: Some(observer),
                token: None,
            })),
        }
    }

    /// Forwards `on_subscribe`. Only the first call reaches the observer.
    pub fn on_subscribe(&self, token: CancelToken) {
        let mut slot = self.slot.lock();
        if slot.token.is_some() {
            return;
        }
        slot.token = Some(token.clone());
        if let Some(observer) = slot.observer.as_mut() {
            observer.on_subscribe(token);
        }
    }

    /// Returns true once `on_subscribe` has been forwarded.
    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.slot.lock().token.is_some()
    }

    /// The token handed to `on_subscribe`, if any.
    #[must_use]
    pub fn token(&self) -> Option<CancelToken> {
        self.slot.lock().token.clone()
    }

    /// Returns true once a terminal signal has been claimed.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.slot.lock().observer.is_none()
    }

    /// Takes the observer out of the slot, claiming the terminal signal.
    pub(crate) fn claim(&self) -> Option<Box<dyn Observer<T>>> {
        self.slot.lock().observer.take()
    }

    /// Delivers a success. Returns false if a terminal signal was already
    /// claimed.
    pub fn on_success(&self, value: T) -> bool {
        match self.claim() {
            Some(observer) => {
                observer.on_success(value);
                true
            }
            None => false,
        }
    }

    /// Delivers an error. Returns false if a terminal signal was already
    /// claimed.
    pub fn on_error(&self, error: Error) -> bool {
        match self.claim() {
            Some(observer) => {
                observer.on_error(error);
                true
            }
            None => false,
        }
    }

    /// Delivers completion. Returns false if a terminal signal was already
    /// claimed.
    pub fn on_complete(&self) -> bool {
        match self.claim() {
            Some(observer) => {
                observer.on_complete();
                true
            }
            None => false,
        }
    }

    /// Subscribes with a fresh token (if not yet subscribed) and fails
    /// immediately. Used when wiring fails before any upstream exists.
    pub fn fail_fast(&self, error: Error) {
        if !self.is_subscribed() {
            self.on_subscribe(CancelToken::new());
        }
        self.on_error(error);
    }
}

impl<T> fmt::Debug for Subscriber<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slot = self.slot.lock();
        f.debug_struct("Subscriber")
            .field("subscribed", &slot.token.is_some())
            .field("terminated", &slot.observer.is_none())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{init_test_logging, Recorder};

    #[test]
    fn callbacks_default_to_noops() {
        init_test_logging();
        let observer: Box<dyn Observer<i32>> = Box::new(Callbacks::new());
        observer.on_success(1);
        let observer: Box<dyn Observer<i32>> = Box::new(Callbacks::new());
        observer.on_error(Error::user("ignored"));
        let observer: Box<dyn Observer<i32>> = Box::new(Callbacks::<i32>::default());
        observer.on_complete();
    }

    #[test]
    fn subscriber_delivers_once() {
        init_test_logging();
        let recorder = Recorder::<i32>::new();
        let subscriber = Subscriber::new(recorder.observer());
        subscriber.on_subscribe(CancelToken::new());
        assert!(subscriber.on_success(1));
        assert!(!subscriber.on_success(2));
        assert!(!subscriber.on_error(Error::user("late")));
        assert!(!subscriber.on_complete());
        assert!(subscriber.is_terminated());
        assert_eq!(recorder.values(), vec![1]);
        assert_eq!(recorder.terminal_count(), 1);
    }

    #[test]
    fn subscriber_forwards_first_subscribe_only() {
        init_test_logging();
        let recorder = Recorder::<i32>::new();
        let subscriber = Subscriber::new(recorder.observer());
        let first = CancelToken::new();
        subscriber.on_subscribe(first.clone());
        subscriber.on_subscribe(CancelToken::new());
        assert_eq!(recorder.subscribe_count(), 1);
        assert!(subscriber.token().expect("token").same_as(&first));
    }

    #[test]
    fn fail_fast_subscribes_then_errors() {
        init_test_logging();
        let recorder = Recorder::<i32>::new();
        let subscriber = Subscriber::new(recorder.observer());
        subscriber.fail_fast(Error::user("wiring failed"));
        assert_eq!(recorder.subscribe_count(), 1);
        assert_eq!(recorder.errors().len(), 1);
    }
}
