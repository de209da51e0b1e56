//! The `Maybe` primitive.
//!
//! A [`Maybe<T>`] is an immutable, reusable description of a deferred
//! computation that produces at most one value. Building a `Maybe` does no
//! work; [`Maybe::subscribe`] performs the subscribe-time action of every node
//! in the graph and returns the root [`CancelToken`] of the subscription.
//!
//! Each combinator is its own [`Source`] implementation; `Maybe` only holds an
//! `Arc<dyn Source<T>>` and dispatches through it, so descriptors are cheap to
//! clone and safe to share across threads and subscriptions.

use core::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::cancel::CancelToken;
use crate::emitter::Emitter;
use crate::error::{Error, Result};
use crate::observer::{Observer, Subscriber};
use crate::tracing_compat::{debug, trace};

/// The subscribe-time action of one node in a `Maybe` graph.
///
/// Implementations must call `subscriber.on_subscribe` synchronously, before
/// returning, and deliver at most one terminal signal.
pub trait Source<T>: Send + Sync {
    /// Wires `subscriber` to this node.
    fn subscribe_actual(&self, subscriber: Subscriber<T>);
}

/// Deferred computation producing a value, an error, or nothing.
pub struct Maybe<T> {
    source: Arc<dyn Source<T>>,
}

impl<T> Clone for Maybe<T> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
        }
    }
}

impl<T> fmt::Debug for Maybe<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Maybe").finish_non_exhaustive()
    }
}

impl<T: Send + 'static> Maybe<T> {
    /// Wraps a [`Source`] implementation.
    pub fn from_source(source: impl Source<T> + 'static) -> Self {
        Self {
            source: Arc::new(source),
        }
    }

    /// Creates a `Maybe` from an imperative producer.
    ///
    /// The producer runs synchronously on every subscription with a fresh
    /// [`Emitter`]. Returning `Err` or panicking is converted into an
    /// `on_error` delivery; it never unwinds into the subscriber.
    ///
    /// ```
    /// use rx_maybe::{Callbacks, Maybe};
    ///
    /// let source = Maybe::<i32>::create(|emitter| {
    ///     emitter.on_success(7);
    ///     Ok(())
    /// });
    /// let token = source.subscribe(Callbacks::new().on_success(|v| assert_eq!(v, 7)));
    /// assert!(token.is_cancelled());
    /// ```
    pub fn create<F>(producer: F) -> Self
    where
        F: Fn(&Emitter<T>) -> Result<()> + Send + Sync + 'static,
    {
        Self::from_source(Create { producer })
    }

    /// Subscribes `observer` and returns the root cancellation token.
    pub fn subscribe(&self, observer: impl Observer<T> + 'static) -> CancelToken {
        self.subscribe_boxed(Box::new(observer))
    }

    /// Subscribes an already boxed observer.
    pub fn subscribe_boxed(&self, observer: Box<dyn Observer<T>>) -> CancelToken {
        let subscriber = Subscriber::from_boxed(observer);
        self.subscribe_with(subscriber.clone());
        if let Some(token) = subscriber.token() {
            token
        } else {
            subscriber.fail_fast(Error::internal("source did not call on_subscribe"));
            subscriber.token().unwrap_or_else(CancelToken::cancelled)
        }
    }

    /// Subscribes through an existing [`Subscriber`] handle.
    ///
    /// A panicking source is converted into an immediate error delivery.
    pub fn subscribe_with(&self, subscriber: Subscriber<T>) {
        trace!("subscribe");
        let result = catch_unwind(AssertUnwindSafe(|| {
            self.source.subscribe_actual(subscriber.clone());
        }));
        if let Err(payload) = result {
            let error = Error::panicked(payload.as_ref());
            debug!(error = %error, "source panicked during subscribe");
            subscriber.fail_fast(error);
        }
    }

    /// A `Maybe` that completes empty immediately.
    #[must_use]
    pub fn empty() -> Self {
        Self::from_source(Empty)
    }

    /// A `Maybe` that never signals.
    #[must_use]
    pub fn never() -> Self {
        Self::from_source(Never)
    }

    /// A `Maybe` that fails immediately with `error`.
    pub fn error(error: impl Into<Error>) -> Self {
        Self::from_source(Fail {
            error: error.into(),
        })
    }

    /// A `Maybe` whose `subscribe` calls `f`; `Ok(None)` completes empty.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn() -> Result<Option<T>> + Send + Sync + 'static,
    {
        Self::create(move |emitter| {
            match f()? {
                Some(value) => emitter.on_success(value),
                None => emitter.on_complete(),
            }
            Ok(())
        })
    }

    /// Builds a fresh `Maybe` per subscription.
    pub fn defer<F>(factory: F) -> Self
    where
        F: Fn() -> Maybe<T> + Send + Sync + 'static,
    {
        Self::from_source(Defer { factory })
    }
}

impl<T: Clone + Send + Sync + 'static> Maybe<T> {
    /// A `Maybe` that succeeds with a clone of `value` on every subscription.
    pub fn just(value: T) -> Self {
        Self::from_source(Just { value })
    }
}

struct Create<F> {
    producer: F,
}

impl<T, F> Source<T> for Create<F>
where
    T: Send + 'static,
    F: Fn(&Emitter<T>) -> Result<()> + Send + Sync,
{
    fn subscribe_actual(&self, subscriber: Subscriber<T>) {
        let emitter = Emitter::subscribe(subscriber);
        match catch_unwind(AssertUnwindSafe(|| (self.producer)(&emitter))) {
            Ok(Ok(())) => {}
            Ok(Err(error)) => emitter.on_error(error),
            Err(payload) => {
                let error = Error::panicked(payload.as_ref());
                debug!(error = %error, "producer panicked");
                emitter.on_error(error);
            }
        }
    }
}

struct Just<T> {
    value: T,
}

impl<T: Clone + Send + Sync + 'static> Source<T> for Just<T> {
    fn subscribe_actual(&self, subscriber: Subscriber<T>) {
        Emitter::subscribe(subscriber).on_success(self.value.clone());
    }
}

struct Empty;

impl<T: Send + 'static> Source<T> for Empty {
    fn subscribe_actual(&self, subscriber: Subscriber<T>) {
        Emitter::subscribe(subscriber).on_complete();
    }
}

struct Never;

impl<T: Send + 'static> Source<T> for Never {
    fn subscribe_actual(&self, subscriber: Subscriber<T>) {
        subscriber.on_subscribe(CancelToken::new());
    }
}

struct Fail {
    error: Error,
}

impl<T: Send + 'static> Source<T> for Fail {
    fn subscribe_actual(&self, subscriber: Subscriber<T>) {
        Emitter::subscribe(subscriber).on_error(self.error.clone());
    }
}

struct Defer<F> {
    factory: F,
}

impl<T, F> Source<T> for Defer<F>
where
    T: Send + 'static,
    F: Fn() -> Maybe<T> + Send + Sync,
{
    fn subscribe_actual(&self, subscriber: Subscriber<T>) {
        (self.factory)().subscribe_with(subscriber);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::test_utils::{init_test_logging, Recorder};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn init_test(name: &str) {
        init_test_logging();
        crate::test_phase!(name);
    }

    #[test]
    fn just_succeeds_on_every_subscription() {
        init_test("just_succeeds_on_every_subscription");
        let source = Maybe::just(42);
        for _ in 0..3 {
            let recorder = Recorder::new();
            let token = source.subscribe(recorder.observer());
            assert_eq!(recorder.values(), vec![42]);
            assert!(token.is_cancelled());
        }
        crate::test_complete!("just_succeeds_on_every_subscription");
    }

    #[test]
    fn empty_completes() {
        init_test("empty_completes");
        let recorder = Recorder::<i32>::new();
        Maybe::empty().subscribe(recorder.observer());
        assert_eq!(recorder.completions(), 1);
        assert_eq!(recorder.terminal_count(), 1);
        crate::test_complete!("empty_completes");
    }

    #[test]
    fn never_only_subscribes() {
        init_test("never_only_subscribes");
        let recorder = Recorder::<i32>::new();
        let token = Maybe::never().subscribe(recorder.observer());
        assert_eq!(recorder.subscribe_count(), 1);
        assert_eq!(recorder.terminal_count(), 0);
        assert!(!token.is_cancelled());
        assert!(token.cancel());
        crate::test_complete!("never_only_subscribes");
    }

    #[test]
    fn error_fails() {
        init_test("error_fails");
        let recorder = Recorder::<i32>::new();
        Maybe::error("boom").subscribe(recorder.observer());
        assert_eq!(recorder.errors()[0].message(), Some("boom"));
        crate::test_complete!("error_fails");
    }

    #[test]
    fn producer_err_becomes_on_error() {
        init_test("producer_err_becomes_on_error");
        let recorder = Recorder::<i32>::new();
        Maybe::create(|_| Err(Error::user("refused"))).subscribe(recorder.observer());
        assert_eq!(recorder.subscribe_count(), 1);
        assert_eq!(recorder.errors()[0].message(), Some("refused"));
        crate::test_complete!("producer_err_becomes_on_error");
    }

    #[test]
    fn producer_panic_becomes_on_error() {
        init_test("producer_panic_becomes_on_error");
        let recorder = Recorder::<i32>::new();
        Maybe::create(|_| panic!("producer exploded")).subscribe(recorder.observer());
        let errors = recorder.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind(), ErrorKind::Panicked);
        assert_eq!(errors[0].message(), Some("producer exploded"));
        crate::test_complete!("producer_panic_becomes_on_error");
    }

    #[test]
    fn error_after_success_is_ignored() {
        init_test("error_after_success_is_ignored");
        let recorder = Recorder::<i32>::new();
        Maybe::<i32>::create(|emitter| {
            emitter.on_success(1);
            Err(Error::user("after the fact"))
        })
        .subscribe(recorder.observer());
        assert_eq!(recorder.values(), vec![1]);
        assert_eq!(recorder.terminal_count(), 1);
        crate::test_complete!("error_after_success_is_ignored");
    }

    #[test]
    fn panicking_source_fails_fast() {
        init_test("panicking_source_fails_fast");
        struct Broken;
        impl Source<i32> for Broken {
            fn subscribe_actual(&self, _subscriber: Subscriber<i32>) {
                panic!("not a producer");
            }
        }
        let recorder = Recorder::<i32>::new();
        let token = Maybe::from_source(Broken).subscribe(recorder.observer());
        assert_eq!(recorder.subscribe_count(), 1);
        assert_eq!(recorder.errors()[0].kind(), ErrorKind::Panicked);
        assert!(!token.is_cancelled() || recorder.terminal_count() == 1);
        crate::test_complete!("panicking_source_fails_fast");
    }

    #[test]
    fn silent_source_is_reported() {
        init_test("silent_source_is_reported");
        struct Silent;
        impl Source<i32> for Silent {
            fn subscribe_actual(&self, _subscriber: Subscriber<i32>) {}
        }
        let recorder = Recorder::<i32>::new();
        Maybe::from_source(Silent).subscribe(recorder.observer());
        assert_eq!(recorder.subscribe_count(), 1);
        assert_eq!(recorder.errors()[0].kind(), ErrorKind::Internal);
        crate::test_complete!("silent_source_is_reported");
    }

    #[test]
    fn from_fn_runs_per_subscription() {
        init_test("from_fn_runs_per_subscription");
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);
        let source = Maybe::from_fn(move || {
            let n = c.fetch_add(1, Ordering::SeqCst);
            Ok(if n == 0 { Some(n) } else { None })
        });
        let first = Recorder::new();
        source.subscribe(first.observer());
        let second = Recorder::new();
        source.subscribe(second.observer());
        assert_eq!(first.values(), vec![0]);
        assert_eq!(second.completions(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        crate::test_complete!("from_fn_runs_per_subscription");
    }

    #[test]
    fn defer_builds_per_subscription() {
        init_test("defer_builds_per_subscription");
        let built = Arc::new(AtomicUsize::new(0));
        let b = Arc::clone(&built);
        let source = Maybe::defer(move || Maybe::just(b.fetch_add(1, Ordering::SeqCst)));
        assert_eq!(built.load(Ordering::SeqCst), 0);
        let recorder = Recorder::new();
        source.subscribe(recorder.observer());
        source.subscribe(Recorder::new().observer());
        assert_eq!(recorder.values(), vec![0]);
        assert_eq!(built.load(Ordering::SeqCst), 2);
        crate::test_complete!("defer_builds_per_subscription");
    }
}
