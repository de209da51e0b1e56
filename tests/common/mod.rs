#![allow(dead_code)]
#![allow(unused_imports)]
//! Shared integration test utilities.
//!
//! Import with:
//! ```
//! #[macro_use]
//! mod common;
//! use common::*;
//! ```

use parking_lot::Mutex;
use proptest::prelude::ProptestConfig;
use proptest::test_runner::RngSeed;
use rx_maybe::{
    CancelToken, Error, Maybe, Observer, Scheduler, Signal, VirtualTimeScheduler,
};
use std::sync::{Arc, Once};
use std::time::Duration;

static INIT_LOGGING: Once = Once::new();

/// Default seed for property tests when running under CI.
pub const DEFAULT_PROPTEST_SEED: u64 = 0x5EED_5EED;

const PROPTEST_SEED_ENV: &str = "RX_MAYBE_PROPTEST_SEED";

/// Build a ProptestConfig with deterministic seed support for CI.
#[must_use]
pub fn test_proptest_config(cases: u32) -> ProptestConfig {
    let mut config = ProptestConfig::with_cases(cases);
    if matches!(config.rng_seed, RngSeed::Random) {
        if let Some(seed) = read_proptest_seed() {
            config.rng_seed = RngSeed::Fixed(seed);
        }
    }
    config
}

fn read_proptest_seed() -> Option<u64> {
    if let Ok(value) = std::env::var(PROPTEST_SEED_ENV) {
        return value.parse::<u64>().ok();
    }
    if std::env::var("CI").is_ok() {
        return Some(DEFAULT_PROPTEST_SEED);
    }
    None
}

/// Initialize test logging with trace-level output.
pub fn init_test_logging() {
    init_test_logging_with_level(tracing::Level::TRACE);
}

/// Initialize test logging with a custom level.
pub fn init_test_logging_with_level(level: tracing::Level) {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_test_writer()
            .with_file(true)
            .with_line_number(true)
            .with_target(true)
            .with_thread_ids(true)
            .with_ansi(false)
            .try_init();
    });
}

/// Fresh deterministic lab clock at time zero.
#[must_use]
pub fn test_lab() -> Arc<VirtualTimeScheduler> {
    Arc::new(VirtualTimeScheduler::new())
}

/// A source that succeeds with `value` after `ms` of `lab` time and pushes
/// its own upstream token into `tokens`.
pub fn succeed_after<T: Clone + Send + Sync + 'static>(
    lab: &Arc<VirtualTimeScheduler>,
    ms: u64,
    value: T,
    tokens: &Arc<Mutex<Vec<CancelToken>>>,
) -> Maybe<T> {
    let lab = Arc::clone(lab);
    let tokens = Arc::clone(tokens);
    Maybe::create(move |emitter| {
        tokens.lock().push(emitter.token().clone());
        let e = emitter.clone();
        let v = value.clone();
        let work = lab.schedule_after(Duration::from_millis(ms), Box::new(move || e.on_success(v)));
        emitter.set_cancellable(work);
        Ok(())
    })
}

struct ProbeLog<T> {
    subscribed: Option<CancelToken>,
    signals: Vec<Signal<T>>,
}

/// Observer that records everything it sees.
pub struct Probe<T> {
    log: Arc<Mutex<ProbeLog<T>>>,
}

impl<T> Clone for Probe<T> {
    fn clone(&self) -> Self {
        Self {
            log: Arc::clone(&self.log),
        }
    }
}

impl<T> Probe<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            log: Arc::new(Mutex::new(ProbeLog {
                subscribed: None,
                signals: Vec::new(),
            })),
        }
    }

    /// Every terminal signal seen so far, in order.
    pub fn signals(&self) -> Vec<Signal<T>>
    where
        T: Clone,
    {
        self.log.lock().signals.clone()
    }

    pub fn terminal_count(&self) -> usize {
        self.log.lock().signals.len()
    }

    pub fn token(&self) -> Option<CancelToken> {
        self.log.lock().subscribed.clone()
    }

    /// The single terminal signal; panics unless exactly one arrived.
    pub fn single(&self) -> Signal<T>
    where
        T: Clone,
    {
        let signals = self.signals();
        assert_eq!(signals.len(), 1, "expected exactly one terminal signal");
        signals.into_iter().next().expect("one signal")
    }
}

impl<T: Send> Observer<T> for Probe<T> {
    fn on_subscribe(&mut self, token: CancelToken) {
        let mut log = self.log.lock();
        assert!(log.subscribed.is_none(), "on_subscribe called twice");
        log.subscribed = Some(token);
    }

    fn on_success(self: Box<Self>, value: T) {
        self.log.lock().signals.push(Signal::Success(value));
    }

    fn on_error(self: Box<Self>, error: Error) {
        self.log.lock().signals.push(Signal::Error(error));
    }

    fn on_complete(self: Box<Self>) {
        self.log.lock().signals.push(Signal::Complete);
    }
}

/// Log a test phase transition with a visual separator.
#[macro_export]
macro_rules! test_phase {
    ($name:expr) => {
        tracing::info!(phase = %$name, "========================================");
        tracing::info!(phase = %$name, "TEST PHASE: {}", $name);
        tracing::info!(phase = %$name, "========================================");
    };
}

/// Log a section within a test phase.
#[macro_export]
macro_rules! test_section {
    ($name:expr) => {
        tracing::debug!(section = %$name, "--- {} ---", $name);
    };
}

/// Log test completion.
#[macro_export]
macro_rules! test_complete {
    ($name:expr) => {
        tracing::info!(test = %$name, "test completed successfully: {}", $name);
    };
}

/// Log before assertions for context.
#[macro_export]
macro_rules! assert_with_log {
    ($cond:expr, $msg:expr, $expected:expr, $actual:expr) => {
        tracing::debug!(
            expected = ?$expected,
            actual = ?$actual,
            "Asserting: {}",
            $msg
        );
        assert!($cond, "{}: expected {:?}, got {:?}", $msg, $expected, $actual);
    };
}
