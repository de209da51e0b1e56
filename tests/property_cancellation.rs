//! Property tests for the cancellation and delivery invariants.
//!
//! - cancelling a token any number of times performs the transition once
//! - a subscriber sees at most one terminal signal however many the producer
//!   attempts, and none once cancelled first
//! - a fan-out of amb sources delivers exactly one signal at the earliest due
//!   time
//! - retry subscribes exactly `min(failures, allowed) + 1` times

#[macro_use]
mod common;

use common::*;
use parking_lot::Mutex;
use proptest::prelude::*;
use rx_maybe::{CancelToken, Error, Maybe, Scheduler, Signal};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
enum Attempt {
    Success(i32),
    Empty,
    Fail,
    Missing,
}

fn attempt_strategy() -> impl Strategy<Value = Attempt> {
    prop_oneof![
        any::<i32>().prop_map(Attempt::Success),
        Just(Attempt::Empty),
        Just(Attempt::Fail),
        Just(Attempt::Missing),
    ]
}

proptest! {
    #![proptest_config(test_proptest_config(128))]

    #[test]
    fn cancel_transitions_exactly_once(calls in 1usize..16, children in 0usize..6) {
        init_test_logging();
        let root = CancelToken::new();
        let leaves: Vec<CancelToken> = (0..children).map(|_| CancelToken::new()).collect();
        for leaf in &leaves {
            root.link(leaf);
        }
        let performed = (0..calls).filter(|_| root.cancel()).count();
        prop_assert_eq!(performed, 1);
        prop_assert!(root.is_cancelled());
        prop_assert!(leaves.iter().all(CancelToken::is_cancelled));
        prop_assert!(leaves.iter().all(|leaf| !leaf.cancel()));
    }

    #[test]
    fn emitter_delivers_at_most_once(
        attempts in prop::collection::vec(attempt_strategy(), 1..8),
        cancel_first in any::<bool>(),
    ) {
        init_test_logging();
        let script = attempts.clone();
        let source = Maybe::<i32>::create(move |emitter| {
            if cancel_first {
                emitter.cancel();
            }
            for attempt in &script {
                match *attempt {
                    Attempt::Success(v) => emitter.on_success(v),
                    Attempt::Empty => emitter.on_complete(),
                    Attempt::Fail => emitter.on_error("scripted failure"),
                    Attempt::Missing => emitter.on_success(None),
                }
            }
            Ok(())
        });
        let probe = Probe::new();
        source.subscribe(probe.clone());

        if cancel_first {
            prop_assert_eq!(probe.terminal_count(), 0);
        } else {
            prop_assert_eq!(probe.terminal_count(), 1);
            let delivered = probe.single();
            match (attempts[0], delivered) {
                (Attempt::Success(v), Signal::Success(got)) => prop_assert_eq!(v, got),
                (Attempt::Empty, Signal::Complete) => {}
                (Attempt::Fail, Signal::Error(error)) => {
                    prop_assert_eq!(error.message(), Some("scripted failure"));
                }
                (Attempt::Missing, Signal::Error(error)) => {
                    prop_assert!(error.is_protocol_violation());
                }
                (first, got) => prop_assert!(false, "first attempt {:?} delivered {:?}", first, got),
            }
        }
    }

    #[test]
    fn amb_delivers_earliest_exactly_once(delays in prop::collection::vec(1u64..500, 1..8)) {
        init_test_logging();
        let lab = test_lab();
        let tokens = Arc::new(Mutex::new(Vec::new()));
        let sources: Vec<Maybe<usize>> = delays
            .iter()
            .enumerate()
            .map(|(index, ms)| succeed_after(&lab, *ms, index, &tokens))
            .collect();
        let probe = Probe::new();
        Maybe::amb(sources).subscribe(probe.clone());
        lab.run_all();

        let earliest = *delays.iter().min().expect("non-empty");
        let winner = delays.iter().position(|ms| *ms == earliest).expect("present");
        prop_assert_eq!(probe.terminal_count(), 1);
        prop_assert!(matches!(probe.single(), Signal::Success(index) if index == winner));
        prop_assert_eq!(lab.now(), Duration::from_millis(earliest));
        prop_assert!(tokens.lock().iter().all(CancelToken::is_cancelled));
    }

    #[test]
    fn retry_subscribes_bounded_times(failures in 0usize..20, allowed in 0u32..20) {
        init_test_logging();
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);
        let source = Maybe::from_fn(move || {
            let n = c.fetch_add(1, Ordering::SeqCst);
            if n < failures {
                Err(Error::user("transient"))
            } else {
                Ok(Some(n))
            }
        });
        let probe = Probe::new();
        source.retry(move |attempt, _| attempt < allowed).subscribe(probe.clone());

        let expected = failures.min(allowed as usize) + 1;
        prop_assert_eq!(calls.load(Ordering::SeqCst), expected);
        if failures <= allowed as usize {
            prop_assert!(matches!(probe.single(), Signal::Success(n) if n == failures));
        } else {
            prop_assert!(matches!(probe.single(), Signal::Error(_)));
        }
    }
}

#[test]
fn concurrent_cancel_and_delivery_never_double_signal() {
    init_test_logging();
    test_phase!("concurrent_cancel_and_delivery_never_double_signal");
    for _ in 0..200 {
        let emitter_slot = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&emitter_slot);
        let probe = Probe::<u32>::new();
        let root = Maybe::<u32>::create(move |emitter| {
            *slot.lock() = Some(emitter.clone());
            Ok(())
        })
        .subscribe(probe.clone());
        let emitter = emitter_slot.lock().take().expect("producer ran");

        let deliver = std::thread::spawn(move || emitter.on_success(1));
        let cancel = std::thread::spawn(move || root.cancel());
        deliver.join().expect("deliver thread");
        cancel.join().expect("cancel thread");
        assert!(probe.terminal_count() <= 1);
    }
    test_complete!("concurrent_cancel_and_delivery_never_double_signal");
}
