//! rx-maybe: deferred, cancel-correct zero-or-one asynchronous computations.
//!
//! # Overview
//!
//! A [`Maybe<T>`] is an immutable description of a computation that, once
//! subscribed, produces exactly one terminal signal: a value, an error, or
//! empty completion. Nothing runs until [`Maybe::subscribe`] is called, and the
//! same `Maybe` may be subscribed any number of times.
//!
//! # Core Guarantees
//!
//! - **Exactly once**: an observer sees `on_subscribe` first and then at most
//!   one terminal signal
//! - **Cancel-correct**: cancelling the returned [`CancelToken`] tears down every
//!   upstream subscription and every queued unit of scheduled work below it,
//!   and no terminal signal is delivered afterwards
//! - **No undefined successes**: a success without a value is reported as
//!   [`ErrorKind::MissingValue`]
//! - **Injected time**: the core never sleeps or spawns; every time-shifting
//!   combinator takes an explicit [`Scheduler`]
//!
//! # Module Structure
//!
//! - [`maybe`]: the core primitive and its constructors
//! - [`observer`]: the observer protocol and the take-once [`Subscriber`]
//! - [`emitter`]: the bridge for imperative producer code
//! - [`cancel`]: cancellation token trees
//! - [`operator`]: `lift`, `compose` and the single-upstream operators
//! - [`combinator`]: race, zip, fallback, retry, cache and scheduler-mediated
//!   combinators
//! - [`scheduler`]: the scheduler capability and its implementations
//! - [`interop`]: `Future` and blocking adapters
//! - [`config`]: timer thread configuration
//! - [`error`]: error types
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use rx_maybe::{Maybe, VirtualTimeScheduler};
//!
//! let lab = Arc::new(VirtualTimeScheduler::new());
//! let slow = Maybe::just("slow").delay(Duration::from_millis(100), lab.clone(), true);
//! let fast = Maybe::just("fast").delay(Duration::from_millis(20), lab.clone(), true);
//!
//! let winner = Arc::new(parking_lot::Mutex::new(None));
//! let slot = Arc::clone(&winner);
//! Maybe::amb([slow, fast]).subscribe(
//!     rx_maybe::Callbacks::new().on_success(move |v| *slot.lock() = Some(v)),
//! );
//!
//! lab.run_all();
//! assert_eq!(*winner.lock(), Some("fast"));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::cast_possible_truncation)]

pub mod cancel;
pub mod combinator;
pub mod config;
pub mod emitter;
pub mod error;
pub mod interop;
pub mod maybe;
pub mod observer;
pub mod operator;
pub mod scheduler;
pub mod signal;
pub(crate) mod tracing_compat;

#[cfg(any(test, feature = "test-internals"))]
pub mod test_utils;

// Re-exports for convenient access to core types
pub use cancel::{CancelToken, Cancellable};
pub use config::{ConfigError, TimerConfig};
pub use emitter::{Emitter, Forward};
pub use error::{Error, ErrorCategory, ErrorKind, Result, ResultExt};
pub use interop::MaybeFuture;
pub use maybe::{Maybe, Source};
pub use observer::{Callbacks, NoopObserver, Observer, Subscriber};
pub use operator::Relay;
pub use scheduler::{
    ImmediateScheduler, Scheduler, SharedScheduler, Task, TimerThreadScheduler,
    TrampolineScheduler, VirtualTimeScheduler,
};
pub use signal::Signal;
