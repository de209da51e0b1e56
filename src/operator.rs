//! Operator composition.
//!
//! Two extension points build new `Maybe`s from existing ones:
//!
//! - [`Maybe::lift`] works at subscription time: the operator receives the
//!   downstream [`Subscriber`] and returns the observer to subscribe upstream
//!   with. If it fails, the downstream is failed immediately and the upstream
//!   is never subscribed.
//! - [`Maybe::compose`] works at assembly time: the transformer receives the
//!   whole `Maybe` and returns a new one. If it fails, the result is a `Maybe`
//!   that emits that failure.
//!
//! The everyday operators (`map`, `filter`, the `do_on_*` taps, ...) are
//! written on top of these two.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::cancel::CancelToken;
use crate::emitter::Emitter;
use crate::error::{catch_panic, Error, ErrorKind, Result};
use crate::maybe::{Maybe, Source};
use crate::observer::{Observer, Subscriber};
use crate::signal::Signal;
use crate::tracing_compat::debug;

type SignalFn<T, R> = Box<dyn FnOnce(Signal<T>, &Subscriber<R>) + Send>;

/// Upstream observer for lifted operators.
///
/// Forwards `on_subscribe` to the downstream unchanged and hands the terminal
/// signal, together with the downstream, to a closure. A panic inside the
/// closure is delivered downstream as [`ErrorKind::Panicked`].
pub struct Relay<T, R> {
    downstream: Subscriber<R>,
    on_signal: SignalFn<T, R>,
}

impl<T, R> Relay<T, R> {
    /// Creates a relay to `downstream`.
    pub fn new(
        downstream: Subscriber<R>,
        on_signal: impl FnOnce(Signal<T>, &Subscriber<R>) + Send + 'static,
    ) -> Self {
        Self {
            downstream,
            on_signal: Box::new(on_signal),
        }
    }

    /// Creates a relay already boxed as an upstream observer, the shape a
    /// [`Maybe::lift`] operator returns.
    pub fn boxed(
        downstream: Subscriber<R>,
        on_signal: impl FnOnce(Signal<T>, &Subscriber<R>) + Send + 'static,
    ) -> Box<dyn Observer<T>>
    where
        T: Send + 'static,
        R: Send + 'static,
    {
        Box::new(Self::new(downstream, on_signal))
    }

    fn dispatch(self: Box<Self>, signal: Signal<T>) {
        let Self {
            downstream,
            on_signal,
        } = *self;
        if let Err(error) = catch_panic(|| on_signal(signal, &downstream)) {
            debug!(error = %error, "operator callback panicked");
            downstream.on_error(error);
        }
    }
}

impl<T: Send, R: Send> Observer<T> for Relay<T, R> {
    fn on_subscribe(&mut self, token: CancelToken) {
        self.downstream.on_subscribe(token);
    }

    fn on_success(self: Box<Self>, value: T) {
        self.dispatch(Signal::Success(value));
    }

    fn on_error(self: Box<Self>, error: Error) {
        self.dispatch(Signal::Error(error));
    }

    fn on_complete(self: Box<Self>) {
        self.dispatch(Signal::Complete);
    }
}

/// Forwards error and completion to `downstream`, handing a success to
/// `on_value`.
fn pass_through<T, R>(signal: Signal<T>, downstream: &Subscriber<R>, on_value: impl FnOnce(T)) {
    match signal {
        Signal::Success(value) => on_value(value),
        Signal::Error(error) => {
            downstream.on_error(error);
        }
        Signal::Complete => {
            downstream.on_complete();
        }
    }
}

fn deliver<T>(signal: Signal<T>, downstream: &Subscriber<T>) {
    match signal {
        Signal::Success(value) => downstream.on_success(value),
        Signal::Error(error) => downstream.on_error(error),
        Signal::Complete => downstream.on_complete(),
    };
}

struct Lift<T, F> {
    upstream: Maybe<T>,
    operator: F,
}

impl<T, R, F> Source<R> for Lift<T, F>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(Subscriber<R>) -> Result<Box<dyn Observer<T>>> + Send + Sync,
{
    fn subscribe_actual(&self, subscriber: Subscriber<R>) {
        match catch_panic(|| (self.operator)(subscriber.clone())) {
            Ok(Ok(observer)) => self.upstream.subscribe_with(Subscriber::from_boxed(observer)),
            Ok(Err(error)) => {
                debug!(error = %error, "lift operator failed");
                subscriber.fail_fast(invalid(ErrorKind::InvalidOperator, error));
            }
            Err(error) => {
                debug!(error = %error, "lift operator panicked");
                subscriber.fail_fast(error);
            }
        }
    }
}

fn invalid(kind: ErrorKind, cause: Error) -> Error {
    Error::new(kind)
        .with_message(cause.to_string())
        .with_source(cause)
}

impl<T: Send + 'static> Maybe<T> {
    /// Builds a new `Maybe` by interposing a subscription-time operator.
    ///
    /// ```
    /// use rx_maybe::{Maybe, Relay, Signal};
    ///
    /// let doubled = Maybe::just(21).lift(|downstream| {
    ///     Ok(Relay::boxed(downstream, |signal: Signal<i32>, downstream| {
    ///         if let Signal::Success(v) = signal {
    ///             downstream.on_success(v * 2);
    ///         }
    ///     }))
    /// });
    /// assert_eq!(doubled.blocking_get().unwrap(), Some(42));
    /// ```
    pub fn lift<R, F>(&self, operator: F) -> Maybe<R>
    where
        R: Send + 'static,
        F: Fn(Subscriber<R>) -> Result<Box<dyn Observer<T>>> + Send + Sync + 'static,
    {
        Maybe::from_source(Lift {
            upstream: self.clone(),
            operator,
        })
    }

    /// Applies an assembly-time transformer once.
    ///
    /// An `Err` becomes a `Maybe` failing with [`ErrorKind::InvalidTransformer`];
    /// a panic becomes one failing with [`ErrorKind::Panicked`].
    pub fn compose<R, F>(&self, transformer: F) -> Maybe<R>
    where
        R: Send + 'static,
        F: FnOnce(Maybe<T>) -> Result<Maybe<R>>,
    {
        match catch_panic(|| transformer(self.clone())) {
            Ok(Ok(maybe)) => maybe,
            Ok(Err(error)) => {
                debug!(error = %error, "compose transformer failed");
                Maybe::error(invalid(ErrorKind::InvalidTransformer, error))
            }
            Err(error) => {
                debug!(error = %error, "compose transformer panicked");
                Maybe::error(error)
            }
        }
    }

    /// Transforms the success value.
    pub fn map<R, F>(&self, f: F) -> Maybe<R>
    where
        R: Send + 'static,
        F: Fn(T) -> R + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        self.lift(move |downstream| {
            let f = Arc::clone(&f);
            Ok(Relay::boxed(downstream, move |signal, downstream| {
                pass_through(signal, downstream, |value| {
                    downstream.on_success(f(value));
                });
            }))
        })
    }

    /// Completes empty when the success value fails `predicate`.
    pub fn filter<F>(&self, predicate: F) -> Maybe<T>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        let predicate = Arc::new(predicate);
        self.lift(move |downstream| {
            let predicate = Arc::clone(&predicate);
            Ok(Relay::boxed(downstream, move |signal, downstream| {
                pass_through(signal, downstream, |value| {
                    if predicate(&value) {
                        downstream.on_success(value);
                    } else {
                        downstream.on_complete();
                    }
                });
            }))
        })
    }

    /// Subscribes to the `Maybe` produced from the success value.
    pub fn flat_map<R, F>(&self, f: F) -> Maybe<R>
    where
        R: Send + 'static,
        F: Fn(T) -> Maybe<R> + Send + Sync + 'static,
    {
        let upstream = self.clone();
        let f = Arc::new(f);
        Maybe::create(move |emitter: &Emitter<R>| {
            let f = Arc::clone(&f);
            let inner = emitter.clone();
            upstream.subscribe(Continue::new(emitter, move |signal, emitter| {
                pass_through_emitter(signal, emitter, |value| match catch_panic(|| f(value)) {
                    Ok(next) => {
                        next.subscribe(inner.forwarder());
                    }
                    Err(error) => inner.on_error(error),
                });
            }));
            Ok(())
        })
    }

    /// Replaces empty completion with `value`.
    pub fn default_if_empty(&self, value: T) -> Maybe<T>
    where
        T: Clone + Sync,
    {
        self.lift(move |downstream| {
            let value = value.clone();
            Ok(Relay::boxed(downstream, move |signal, downstream| {
                if matches!(signal, Signal::Complete) {
                    downstream.on_success(value);
                } else {
                    deliver(signal, downstream);
                }
            }))
        })
    }

    /// Replaces an error with the value computed from it.
    pub fn on_error_return<F>(&self, f: F) -> Maybe<T>
    where
        F: Fn(Error) -> T + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        self.lift(move |downstream| {
            let f = Arc::clone(&f);
            Ok(Relay::boxed(downstream, move |signal, downstream| {
                match signal {
                    Signal::Error(error) => {
                        downstream.on_success(f(error));
                    }
                    other => deliver(other, downstream),
                }
            }))
        })
    }

    /// Replaces an error with a subscription to the `Maybe` computed from it.
    pub fn on_error_resume_next<F>(&self, f: F) -> Maybe<T>
    where
        F: Fn(Error) -> Maybe<T> + Send + Sync + 'static,
    {
        let upstream = self.clone();
        let f = Arc::new(f);
        Maybe::create(move |emitter: &Emitter<T>| {
            let f = Arc::clone(&f);
            let inner = emitter.clone();
            upstream.subscribe(Continue::new(emitter, move |signal, emitter| match signal {
                Signal::Error(error) => match catch_panic(|| f(error)) {
                    Ok(fallback) => {
                        fallback.subscribe(inner.forwarder());
                    }
                    Err(error) => inner.on_error(error),
                },
                other => other.deliver(emitter),
            }));
            Ok(())
        })
    }

    /// Calls `f` with the upstream token before forwarding `on_subscribe`.
    ///
    /// A panic cancels the upstream and fails the downstream.
    pub fn do_on_subscribe<F>(&self, f: F) -> Maybe<T>
    where
        F: Fn(&CancelToken) + Send + Sync + 'static,
    {
        let f: SubscribeHook = Arc::new(f);
        self.lift(move |downstream| {
            Ok(Box::new(SubscribeTap {
                downstream,
                hook: Some(Arc::clone(&f)),
            }))
        })
    }

    /// Calls `f` with the success value before forwarding it.
    pub fn do_on_success<F>(&self, f: F) -> Maybe<T>
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        self.lift(move |downstream| {
            let f = Arc::clone(&f);
            Ok(Relay::boxed(downstream, move |signal, downstream| {
                if let Signal::Success(value) = &signal {
                    f(value);
                }
                deliver(signal, downstream);
            }))
        })
    }

    /// Calls `f` with the error before forwarding it.
    pub fn do_on_error<F>(&self, f: F) -> Maybe<T>
    where
        F: Fn(&Error) + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        self.lift(move |downstream| {
            let f = Arc::clone(&f);
            Ok(Relay::boxed(downstream, move |signal, downstream| {
                if let Signal::Error(error) = &signal {
                    f(error);
                }
                deliver(signal, downstream);
            }))
        })
    }

    /// Calls `f` before forwarding any terminal signal.
    pub fn do_on_terminate<F>(&self, f: F) -> Maybe<T>
    where
        F: Fn() + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        self.lift(move |downstream| {
            let f = Arc::clone(&f);
            Ok(Relay::boxed(downstream, move |signal, downstream| {
                f();
                deliver(signal, downstream);
            }))
        })
    }

    /// Calls `f` when the downstream cancels before a terminal signal.
    ///
    /// Cancellation that follows a terminal signal does not invoke `f`.
    pub fn do_on_cancel<F>(&self, f: F) -> Maybe<T>
    where
        F: Fn() + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        self.lift(move |downstream| {
            let terminated = Arc::new(AtomicBool::new(false));
            let token = CancelToken::new();
            let hook = Arc::clone(&f);
            let done = Arc::clone(&terminated);
            token.on_cancel(move || {
                if !done.load(Ordering::Acquire) {
                    if let Err(error) = catch_panic(|| hook()) {
                        debug!(error = %error, "cancel hook panicked");
                    }
                }
            });
            Ok(Box::new(CancelTap {
                downstream,
                token,
                terminated,
            }))
        })
    }
}

/// Upstream observer for `create`-based operators that continue with a
/// second subscription: adopts the upstream token into the emitter and hands
/// the terminal signal to a closure.
pub(crate) struct Continue<T, R> {
    emitter: Emitter<R>,
    on_signal: Box<dyn FnOnce(Signal<T>, &Emitter<R>) + Send>,
}

impl<T, R> Continue<T, R> {
    pub(crate) fn new(
        emitter: &Emitter<R>,
        on_signal: impl FnOnce(Signal<T>, &Emitter<R>) + Send + 'static,
    ) -> Self {
        Self {
            emitter: emitter.clone(),
            on_signal: Box::new(on_signal),
        }
    }

    fn dispatch(self: Box<Self>, signal: Signal<T>) {
        let Self { emitter, on_signal } = *self;
        if let Err(error) = catch_panic(|| on_signal(signal, &emitter)) {
            emitter.on_error(error);
        }
    }
}

impl<T: Send, R: Send> Observer<T> for Continue<T, R> {
    fn on_subscribe(&mut self, token: CancelToken) {
        self.emitter.set_cancellable(token);
    }

    fn on_success(self: Box<Self>, value: T) {
        self.dispatch(Signal::Success(value));
    }

    fn on_error(self: Box<Self>, error: Error) {
        self.dispatch(Signal::Error(error));
    }

    fn on_complete(self: Box<Self>) {
        self.dispatch(Signal::Complete);
    }
}

fn pass_through_emitter<T, R>(signal: Signal<T>, emitter: &Emitter<R>, on_value: impl FnOnce(T)) {
    match signal {
        Signal::Success(value) => on_value(value),
        Signal::Error(error) => emitter.on_error(error),
        Signal::Complete => emitter.on_complete(),
    }
}

type SubscribeHook = Arc<dyn Fn(&CancelToken) + Send + Sync>;

struct SubscribeTap<T> {
    downstream: Subscriber<T>,
    hook: Option<SubscribeHook>,
}

impl<T: Send> Observer<T> for SubscribeTap<T> {
    fn on_subscribe(&mut self, token: CancelToken) {
        let outcome = match self.hook.take() {
            Some(hook) => catch_panic(|| hook(&token)),
            None => Ok(()),
        };
        match outcome {
            Ok(()) => self.downstream.on_subscribe(token),
            Err(error) => {
                token.cancel();
                self.downstream.fail_fast(error);
            }
        }
    }

    fn on_success(self: Box<Self>, value: T) {
        self.downstream.on_success(value);
    }

    fn on_error(self: Box<Self>, error: Error) {
        self.downstream.on_error(error);
    }

    fn on_complete(self: Box<Self>) {
        self.downstream.on_complete();
    }
}

struct CancelTap<T> {
    downstream: Subscriber<T>,
    token: CancelToken,
    terminated: Arc<AtomicBool>,
}

impl<T> CancelTap<T> {
    fn finish(&self) {
        self.terminated.store(true, Ordering::Release);
    }
}

impl<T: Send> Observer<T> for CancelTap<T> {
    fn on_subscribe(&mut self, upstream: CancelToken) {
        self.token.link(&upstream);
        self.downstream.on_subscribe(self.token.clone());
    }

    fn on_success(self: Box<Self>, value: T) {
        self.finish();
        self.downstream.on_success(value);
    }

    fn on_error(self: Box<Self>, error: Error) {
        self.finish();
        self.downstream.on_error(error);
    }

    fn on_complete(self: Box<Self>) {
        self.finish();
        self.downstream.on_complete();
    }
}
