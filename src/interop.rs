//! Adapters from `Maybe` to `std::future::Future` and to blocking callers.
//!
//! Both adapters collapse the three terminal signals into
//! `Result<Option<T>, Error>`: a success is `Ok(Some(value))`, empty
//! completion is `Ok(None)`, an error is `Err(error)`.
//!
//! # Example
//!
//! ```
//! use rx_maybe::Maybe;
//!
//! assert_eq!(Maybe::just(3).blocking_get().unwrap(), Some(3));
//! assert_eq!(Maybe::<i32>::empty().blocking_get().unwrap(), None);
//! ```

use core::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::cancel::CancelToken;
use crate::error::{Error, Result};
use crate::maybe::Maybe;
use crate::observer::Observer;
use crate::signal::Signal;
use crate::tracing_compat::trace;

struct FutureState<T> {
    result: Option<Result<Option<T>>>,
    waker: Option<Waker>,
}

/// Future returned by [`Maybe::to_future`].
///
/// Dropping it before it resolves cancels the subscription.
#[must_use = "futures do nothing unless polled; dropping cancels the subscription"]
pub struct MaybeFuture<T> {
    shared: Arc<Mutex<FutureState<T>>>,
    token: CancelToken,
    finished: bool,
}

impl<T> MaybeFuture<T> {
    /// The root token of the underlying subscription.
    pub fn token(&self) -> &CancelToken {
        &self.token
    }
}

impl<T> Future for MaybeFuture<T> {
    type Output = Result<Option<T>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(Err(Error::internal("MaybeFuture polled after completion")));
        }
        let mut state = this.shared.lock();
        if let Some(result) = state.result.take() {
            this.finished = true;
            return Poll::Ready(result);
        }
        match &state.waker {
            Some(waker) if waker.will_wake(cx.waker()) => {}
            _ => state.waker = Some(cx.waker().clone()),
        }
        Poll::Pending
    }
}

impl<T> Drop for MaybeFuture<T> {
    fn drop(&mut self) {
        if !self.finished && self.token.cancel() {
            trace!(token = self.token.id(), "MaybeFuture dropped before completion");
        }
    }
}

impl<T> fmt::Debug for MaybeFuture<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MaybeFuture")
            .field("token", &self.token)
            .field("finished", &self.finished)
            .finish()
    }
}

struct Settle<T> {
    shared: Arc<Mutex<FutureState<T>>>,
}

impl<T> Settle<T> {
    fn settle(self: Box<Self>, signal: Signal<T>) {
        let waker = {
            let mut state = self.shared.lock();
            state.result = Some(signal.into_result());
            state.waker.take()
        };
        if let Some(waker) = waker {
            waker.wake();
        }
    }
}

impl<T: Send> Observer<T> for Settle<T> {
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

type Parked<T> = Arc<(Mutex<Option<Result<Option<T>>>>, Condvar)>;

struct Park<T> {
    slot: Parked<T>,
}

impl<T> Park<T> {
    fn settle(self: Box<Self>, signal: Signal<T>) {
        let (lock, ready) = &*self.slot;
        *lock.lock() = Some(signal.into_result());
        ready.notify_all();
    }
}

impl<T: Send> Observer<T> for Park<T> {
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

impl<T: Send + 'static> Maybe<T> {
    /// Subscribes and returns a future of the terminal signal.
    ///
    /// The subscription starts immediately, not on first poll.
    pub fn to_future(&self) -> MaybeFuture<T> {
        let shared = Arc::new(Mutex::new(FutureState {
            result: None,
            waker: None,
        }));
        let token = self.subscribe(Settle {
            shared: Arc::clone(&shared),
        });
        MaybeFuture {
            shared,
            token,
            finished: false,
        }
    }

    /// Subscribes and parks the calling thread until the terminal signal.
    ///
    /// The signal must be produced by another thread (or synchronously during
    /// `subscribe`). Calling this for a source driven by a scheduler that
    /// only runs on the calling thread never returns.
    pub fn blocking_get(&self) -> Result<Option<T>> {
        let slot: Parked<T> = Arc::new((Mutex::new(None), Condvar::new()));
        self.subscribe(Park {
            slot: Arc::clone(&slot),
        });
        let (lock, ready) = &*slot;
        let mut result = lock.lock();
        loop {
            if let Some(result) = result.take() {
                return result;
            }
            ready.wait(&mut result);
        }
    }

    /// Like [`blocking_get`](Self::blocking_get), but gives up after
    /// `limit` of wall-clock time, cancelling the subscription and returning
    /// a [`Timeout`](crate::ErrorKind::Timeout) error.
    pub fn blocking_get_timeout(&self, limit: Duration) -> Result<Option<T>> {
        let slot: Parked<T> = Arc::new((Mutex::new(None), Condvar::new()));
        let token = self.subscribe(Park {
            slot: Arc::clone(&slot),
        });
        let (lock, ready) = &*slot;
        let mut result = lock.lock();
        if result.is_none() {
            ready.wait_while_for(&mut result, |pending| pending.is_none(), limit);
        }
        match result.take() {
            Some(result) => result,
            None => {
                drop(result);
                token.cancel();
                Err(Error::timeout(limit))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TimerConfig;
    use crate::error::ErrorKind;
    use crate::scheduler::{Scheduler, TimerThreadScheduler, VirtualTimeScheduler};
    use crate::test_utils::init_test_logging;
    use std::task::Wake;
    use std::thread::{self, Thread};

    fn init_test(name: &str) {
        init_test_logging();
        crate::test_phase!(name);
    }

    struct ThreadWaker(Thread);

    impl Wake for ThreadWaker {
        fn wake(self: Arc<Self>) {
            self.0.unpark();
        }
    }

    fn block_on<F: Future>(future: F) -> F::Output {
        let mut future = std::pin::pin!(future);
        let waker = Waker::from(Arc::new(ThreadWaker(thread::current())));
        let mut cx = Context::from_waker(&waker);
        loop {
            if let Poll::Ready(output) = future.as_mut().poll(&mut cx) {
                return output;
            }
            thread::park();
        }
    }

    fn timer() -> Arc<TimerThreadScheduler> {
        Arc::new(TimerThreadScheduler::new(TimerConfig::default()).expect("timer thread"))
    }

    #[test]
    fn future_resolves_each_signal_shape() {
        init_test("future_resolves_each_signal_shape");
        assert_eq!(block_on(Maybe::just(1).to_future()).expect("ok"), Some(1));
        assert_eq!(block_on(Maybe::<i32>::empty().to_future()).expect("ok"), None);
        let error = block_on(Maybe::<i32>::error("bad").to_future()).expect_err("error");
        assert_eq!(error.message(), Some("bad"));
        crate::test_complete!("future_resolves_each_signal_shape");
    }

    #[test]
    fn future_wakes_from_timer_thread() {
        init_test("future_wakes_from_timer_thread");
        let value = block_on(
            Maybe::just("tick")
                .delay(Duration::from_millis(20), timer(), true)
                .to_future(),
        );
        assert_eq!(value.expect("ok"), Some("tick"));
        crate::test_complete!("future_wakes_from_timer_thread");
    }

    #[test]
    fn pending_future_resolves_after_lab_advance() {
        init_test("pending_future_resolves_after_lab_advance");
        let lab = Arc::new(VirtualTimeScheduler::new());
        let mut future = Maybe::just(5)
            .delay(Duration::from_millis(10), lab.clone(), true)
            .to_future();
        let waker = Waker::from(Arc::new(ThreadWaker(thread::current())));
        let mut cx = Context::from_waker(&waker);
        assert!(Pin::new(&mut future).poll(&mut cx).is_pending());
        lab.advance_by(Duration::from_millis(10));
        match Pin::new(&mut future).poll(&mut cx) {
            Poll::Ready(result) => assert_eq!(result.expect("ok"), Some(5)),
            Poll::Pending => panic!("future should be ready"),
        }
        crate::test_complete!("pending_future_resolves_after_lab_advance");
    }

    #[test]
    fn dropping_future_cancels_subscription() {
        init_test("dropping_future_cancels_subscription");
        let lab = Arc::new(VirtualTimeScheduler::new());
        let future = Maybe::<i32>::never().timeout(Duration::from_millis(10), lab.clone()).to_future();
        let token = future.token().clone();
        assert_eq!(lab.pending(), 1);
        drop(future);
        assert!(token.is_cancelled());
        assert!(lab.is_idle());
        assert_eq!(lab.now(), Duration::ZERO);
        crate::test_complete!("dropping_future_cancels_subscription");
    }

    #[test]
    fn blocking_get_waits_for_other_thread() {
        init_test("blocking_get_waits_for_other_thread");
        let result = Maybe::just(11)
            .delay(Duration::from_millis(20), timer(), true)
            .blocking_get();
        assert_eq!(result.expect("ok"), Some(11));
        crate::test_complete!("blocking_get_waits_for_other_thread");
    }

    #[test]
    fn blocking_get_timeout_gives_up_and_cancels() {
        init_test("blocking_get_timeout_gives_up_and_cancels");
        let error = Maybe::<i32>::never()
            .blocking_get_timeout(Duration::from_millis(20))
            .expect_err("timed out");
        assert_eq!(error.kind(), ErrorKind::Timeout);

        let value = Maybe::just(2).blocking_get_timeout(Duration::from_millis(20));
        assert_eq!(value.expect("ok"), Some(2));
        crate::test_complete!("blocking_get_timeout_gives_up_and_cancels");
    }
}
