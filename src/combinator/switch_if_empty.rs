//! Fallback on empty completion.

use crate::emitter::Emitter;
use crate::maybe::Maybe;
use crate::operator::Continue;
use crate::signal::Signal;
use crate::tracing_compat::trace;

impl<T: Send + 'static> Maybe<T> {
    /// Subscribes to `other` if this source completes empty.
    ///
    /// Success and error pass through without switching. Both subscriptions
    /// hang off the same downstream token, so cancelling it reaches whichever
    /// one is live.
    #[must_use]
    pub fn switch_if_empty(&self, other: Maybe<T>) -> Maybe<T> {
        let upstream = self.clone();
        Maybe::create(move |emitter: &Emitter<T>| {
            let fallback = other.clone();
            upstream.subscribe(Continue::new(emitter, move |signal, emitter| match signal {
                Signal::Complete => {
                    trace!("switch_if_empty: switching to fallback");
                    fallback.subscribe(emitter.forwarder());
                }
                other => other.deliver(emitter),
            }));
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancelToken;
    use crate::test_utils::{init_test_logging, Recorder};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn init_test(name: &str) {
        init_test_logging();
        crate::test_phase!(name);
    }

    #[test]
    fn empty_switches_to_fallback() {
        init_test("empty_switches_to_fallback");
        let recorder = Recorder::new();
        Maybe::empty()
            .switch_if_empty(Maybe::just("fallback"))
            .subscribe(recorder.observer());
        assert_eq!(recorder.values(), vec!["fallback"]);
        crate::test_complete!("empty_switches_to_fallback");
    }

    #[test]
    fn success_and_error_do_not_switch() {
        init_test("success_and_error_do_not_switch");
        let switched = Arc::new(AtomicUsize::new(0));
        let s = Arc::clone(&switched);
        let fallback = Maybe::from_fn(move || {
            s.fetch_add(1, Ordering::SeqCst);
            Ok(Some(0))
        });

        let recorder = Recorder::new();
        Maybe::just(1)
            .switch_if_empty(fallback.clone())
            .subscribe(recorder.observer());
        assert_eq!(recorder.values(), vec![1]);

        let recorder = Recorder::new();
        Maybe::error("bad")
            .switch_if_empty(fallback)
            .subscribe(recorder.observer());
        assert_eq!(recorder.errors().len(), 1);
        assert_eq!(switched.load(Ordering::SeqCst), 0);
        crate::test_complete!("success_and_error_do_not_switch");
    }

    #[test]
    fn cancel_reaches_fallback() {
        init_test("cancel_reaches_fallback");
        let seen = Arc::new(Mutex::new(None::<CancelToken>));
        let slot = Arc::clone(&seen);
        let fallback = Maybe::<i32>::never().do_on_subscribe(move |t| *slot.lock() = Some(t.clone()));
        let recorder = Recorder::new();
        let root = Maybe::empty()
            .switch_if_empty(fallback)
            .subscribe(recorder.observer());
        let fallback_token = seen.lock().clone().expect("fallback subscribed");
        assert!(!fallback_token.is_cancelled());
        root.cancel();
        assert!(fallback_token.is_cancelled());
        assert_eq!(recorder.terminal_count(), 0);
        crate::test_complete!("cancel_reaches_fallback");
    }
}
