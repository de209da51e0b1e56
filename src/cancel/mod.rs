//! Cancellation protocol.
//!
//! Every subscription is represented by a tree of [`CancelToken`]s whose root
//! is handed back to the subscriber. Cancelling the root tears down every
//! upstream subscription and pending scheduled unit of work below it.

pub mod token;

pub use token::{CancelToken, Cancellable};
