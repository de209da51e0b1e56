//! Test utilities for rx-maybe.
//!
//! This module provides shared helpers for unit tests:
//! - Consistent tracing-based logging initialization
//! - Phase/section macros for readable test output
//! - [`Recorder`], an observer that records every signal it receives
//!
//! # Example
//! ```ignore
//! use rx_maybe::test_utils::{init_test_logging, Recorder};
//! use rx_maybe::Maybe;
//!
//! init_test_logging();
//! let recorder = Recorder::new();
//! Maybe::just(1).subscribe(recorder.observer());
//! assert_eq!(recorder.values(), vec![1]);
//! ```

use std::sync::{Arc, Once};

use parking_lot::{Mutex, MutexGuard};
use tracing_subscriber::fmt::format::FmtSpan;

use crate::cancel::CancelToken;
use crate::error::Error;
use crate::observer::Observer;

static INIT_LOGGING: Once = Once::new();
static ENV_LOCK: Mutex<()> = parking_lot::const_mutex(());

/// Initialize test logging with trace-level output.
///
/// Safe to call multiple times; only initializes once.
pub fn init_test_logging() {
    init_test_logging_with_level(tracing::Level::TRACE);
}

/// Initialize test logging with a custom level.
///
/// The first call wins; later calls are no-ops.
pub fn init_test_logging_with_level(level: tracing::Level) {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_test_writer()
            .with_file(true)
            .with_line_number(true)
            .with_target(true)
            .with_thread_ids(true)
            .with_span_events(FmtSpan::CLOSE)
            .with_ansi(false)
            .try_init();
    });
}

/// Acquire the global environment lock for tests that mutate env vars.
pub fn env_lock() -> MutexGuard<'static, ()> {
    ENV_LOCK.lock()
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

/// Log test completion with summary.
#[macro_export]
macro_rules! test_complete {
    ($name:expr) => {
        tracing::info!(test = %$name, "test completed successfully: {}", $name);
    };
    ($name:expr, $($key:ident = $value:expr),* $(,)?) => {
        tracing::info!(
            test = %$name,
            $($key = %$value,)*
            "test completed successfully: {}",
            $name
        );
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

struct Record<T> {
    subscribes: usize,
    token: Option<CancelToken>,
    values: Vec<T>,
    errors: Vec<Error>,
    completions: usize,
}

/// Shared log of every signal delivered to its observers.
///
/// Clones share the same log, so a test keeps one handle and subscribes with
/// [`Recorder::observer`].
pub struct Recorder<T> {
    record: Arc<Mutex<Record<T>>>,
}

impl<T> Clone for Recorder<T> {
    fn clone(&self) -> Self {
        Self {
            record: Arc::clone(&self.record),
        }
    }
}

impl<T> Default for Recorder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Recorder<T> {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            record: Arc::new(Mutex::new(Record {
                subscribes: 0,
                token: None,
                values: Vec::new(),
                errors: Vec::new(),
                completions: 0,
            })),
        }
    }

    /// Returns an observer that writes into this recorder.
    #[must_use]
    pub fn observer(&self) -> RecordingObserver<T> {
        RecordingObserver {
            record: Arc::clone(&self.record),
        }
    }

    /// Recorded errors, in delivery order.
    #[must_use]
    pub fn errors(&self) -> Vec<Error> {
        self.record.lock().errors.clone()
    }

    /// Number of `on_complete` deliveries.
    #[must_use]
    pub fn completions(&self) -> usize {
        self.record.lock().completions
    }

    /// Number of `on_subscribe` deliveries.
    #[must_use]
    pub fn subscribe_count(&self) -> usize {
        self.record.lock().subscribes
    }

    /// Total terminal deliveries of any kind.
    #[must_use]
    pub fn terminal_count(&self) -> usize {
        let record = self.record.lock();
        record.values.len() + record.errors.len() + record.completions
    }

    /// Returns true once any terminal signal was recorded.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.terminal_count() > 0
    }

    /// The token received by the first `on_subscribe`.
    #[must_use]
    pub fn token(&self) -> Option<CancelToken> {
        self.record.lock().token.clone()
    }
}

impl<T: Clone> Recorder<T> {
    /// Recorded success values, in delivery order.
    #[must_use]
    pub fn values(&self) -> Vec<T> {
        self.record.lock().values.clone()
    }
}

impl<T> std::fmt::Debug for Recorder<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let record = self.record.lock();
        f.debug_struct("Recorder")
            .field("subscribes", &record.subscribes)
            .field("values", &record.values.len())
            .field("errors", &record.errors)
            .field("completions", &record.completions)
            .finish()
    }
}

/// Observer half of a [`Recorder`].
pub struct RecordingObserver<T> {
    record: Arc<Mutex<Record<T>>>,
}

impl<T: Send> Observer<T> for RecordingObserver<T> {
    fn on_subscribe(&mut self, token: CancelToken) {
        let mut record = self.record.lock();
        record.subscribes += 1;
        if record.token.is_none() {
            record.token = Some(token);
        }
    }

    fn on_success(self: Box<Self>, value: T) {
        tracing::trace!("recorder: success");
        self.record.lock().values.push(value);
    }

    fn on_error(self: Box<Self>, error: Error) {
        tracing::trace!(error = %error, "recorder: error");
        self.record.lock().errors.push(error);
    }

    fn on_complete(self: Box<Self>) {
        tracing::trace!("recorder: complete");
        self.record.lock().completions += 1;
    }
}
