//! Error types and error handling strategy for rx-maybe.
//!
//! Every failure a `Maybe` can observe is funneled into the single `on_error`
//! channel as an [`Error`]. There is no separate crash state: panics inside
//! user callbacks are caught and converted to [`ErrorKind::Panicked`].
//!
//! # Error Categories
//!
//! - **Protocol**: the emission contract was violated (success without a
//!   value, a failing operator or transformer, a zipper without a result)
//! - **Time**: a scheduler-driven deadline elapsed
//! - **Callback**: user code panicked while the crate was running it
//! - **Source**: errors raised by producers themselves, forwarded verbatim
//! - **Internal**: crate bugs

use core::fmt;
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

/// The kind of error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    // === Protocol ===
    /// A success signal was emitted without a value.
    MissingValue,
    /// A `lift` operator failed to produce an upstream observer.
    InvalidOperator,
    /// A `compose` transformer failed to produce a `Maybe`.
    InvalidTransformer,
    /// A zipper function returned no result.
    ZipperNoResult,

    // === Time ===
    /// The source did not signal before the timeout elapsed.
    Timeout,

    // === Callback ===
    /// User code panicked.
    Panicked,

    // === Source ===
    /// Error raised by a producer.
    User,

    // === Internal ===
    /// Internal error (bug).
    Internal,
}

impl ErrorKind {
    /// Returns the error category for this kind.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::MissingValue
            | Self::InvalidOperator
            | Self::InvalidTransformer
            | Self::ZipperNoResult => ErrorCategory::Protocol,
            Self::Timeout => ErrorCategory::Time,
            Self::Panicked => ErrorCategory::Callback,
            Self::User => ErrorCategory::Source,
            Self::Internal => ErrorCategory::Internal,
        }
    }
}

/// High-level error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Emission protocol violations.
    Protocol,
    /// Scheduler-driven deadlines.
    Time,
    /// Panics in user callbacks.
    Callback,
    /// Producer-raised errors.
    Source,
    /// Internal errors.
    Internal,
}

/// The main error type carried by the `on_error` channel.
#[derive(Debug, Clone)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    source: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub const fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            source: None,
        }
    }

    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the error category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        self.kind.category()
    }

    /// Returns true if this error is a timeout.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self.kind, ErrorKind::Timeout)
    }

    /// Returns true if this error reports a protocol violation.
    #[must_use]
    pub const fn is_protocol_violation(&self) -> bool {
        matches!(self.kind.category(), ErrorCategory::Protocol)
    }

    /// Adds a message description to the error.
    #[must_use]
    pub fn with_message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }

    /// Adds a source error to the chain.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    /// Returns the error message, if any.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Creates a user error with a message.
    #[must_use]
    pub fn user(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::User).with_message(msg)
    }

    /// Wraps an arbitrary std error as a user error, keeping it as the source.
    #[must_use]
    pub fn from_source(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        let message = source.to_string();
        Self::new(ErrorKind::User)
            .with_message(message)
            .with_source(source)
    }

    /// Error for a success signal that carried no value.
    #[must_use]
    pub fn missing_value() -> Self {
        Self::new(ErrorKind::MissingValue).with_message("on_success called without a value")
    }

    /// Error for a zipper that produced no result.
    #[must_use]
    pub fn zipper_no_result() -> Self {
        Self::new(ErrorKind::ZipperNoResult).with_message("zipper produced no result")
    }

    /// Error for a timeout of the given length.
    #[must_use]
    pub fn timeout(after: Duration) -> Self {
        Self::new(ErrorKind::Timeout).with_message(format!("no signal within {after:?}"))
    }

    /// Converts a caught panic payload into an error.
    #[must_use]
    pub fn panicked(payload: &(dyn Any + Send)) -> Self {
        let detail = payload
            .downcast_ref::<&'static str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "opaque panic payload".to_string());
        Self::new(ErrorKind::Panicked).with_message(detail)
    }

    /// Creates an internal error (crate bug).
    #[must_use]
    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal).with_message(detail)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(msg) = &self.message {
            write!(f, ": {msg}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as _)
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Self::user(msg)
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Self::user(msg)
    }
}

impl From<Box<dyn std::error::Error + Send + Sync>> for Error {
    fn from(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        let message = err.to_string();
        Self {
            kind: ErrorKind::User,
            message: Some(message),
            source: Some(Arc::from(err)),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::from_source(err)
    }
}

/// Runs `f`, converting a panic into an [`ErrorKind::Panicked`] error.
pub(crate) fn catch_panic<R>(f: impl FnOnce() -> R) -> Result<R> {
    std::panic::catch_unwind(std::panic::AssertUnwindSafe(f))
        .map_err(|payload| Error::panicked(payload.as_ref()))
}

/// Extension trait for adding context to Results.
#[allow(clippy::result_large_err)]
pub trait ResultExt<T> {
    /// Attach a context message on error.
    fn context(self, msg: impl Into<String>) -> Result<T>;
    /// Attach context message computed lazily on error.
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for core::result::Result<T, E> {
    fn context(self, msg: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().with_message(msg))
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| e.into().with_message(f()))
    }
}

/// A specialized Result type for rx-maybe operations.
#[allow(clippy::result_large_err)]
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[derive(Debug)]
    struct Underlying;

    impl fmt::Display for Underlying {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "underlying")
        }
    }

    impl std::error::Error for Underlying {}

    #[test]
    fn display_without_message() {
        let err = Error::new(ErrorKind::Internal);
        assert_eq!(err.to_string(), "Internal");
    }

    #[test]
    fn display_with_message() {
        let err = Error::zipper_no_result();
        assert_eq!(err.to_string(), "ZipperNoResult: zipper produced no result");
    }

    #[test]
    fn source_chain_is_exposed() {
        let err = Error::from_source(Underlying);
        assert_eq!(err.kind(), ErrorKind::User);
        assert_eq!(err.message(), Some("underlying"));
        let source = err.source().expect("source missing");
        assert_eq!(source.to_string(), "underlying");
    }

    #[test]
    fn strings_coerce_into_user_errors() {
        let from_str: Error = "boom".into();
        assert_eq!(from_str.kind(), ErrorKind::User);
        assert_eq!(from_str.message(), Some("boom"));

        let from_string: Error = String::from("bang").into();
        assert_eq!(from_string.to_string(), "User: bang");
    }

    #[test]
    fn boxed_errors_keep_their_source() {
        let boxed: Box<dyn std::error::Error + Send + Sync> = Box::new(Underlying);
        let err: Error = boxed.into();
        assert_eq!(err.kind(), ErrorKind::User);
        assert!(err.source().is_some());
    }

    #[test]
    fn panic_payloads_are_described() {
        let static_payload: Box<dyn Any + Send> = Box::new("static boom");
        assert_eq!(
            Error::panicked(static_payload.as_ref()).message(),
            Some("static boom")
        );

        let owned_payload: Box<dyn Any + Send> = Box::new(String::from("owned boom"));
        assert_eq!(
            Error::panicked(owned_payload.as_ref()).message(),
            Some("owned boom")
        );

        let opaque: Box<dyn Any + Send> = Box::new(17_u8);
        assert_eq!(Error::panicked(opaque.as_ref()).kind(), ErrorKind::Panicked);
    }

    #[test]
    fn categories_match_kinds() {
        assert!(Error::missing_value().is_protocol_violation());
        assert!(Error::zipper_no_result().is_protocol_violation());
        assert!(Error::timeout(Duration::from_millis(5)).is_timeout());
        assert_eq!(Error::user("x").category(), ErrorCategory::Source);
        assert_eq!(
            Error::new(ErrorKind::Panicked).category(),
            ErrorCategory::Callback
        );
    }

    #[test]
    fn result_ext_adds_message() {
        let res: core::result::Result<(), &str> = Err("io failed");
        let err = res.context("while fetching").expect_err("expected err");
        assert_eq!(err.kind(), ErrorKind::User);
        assert_eq!(err.to_string(), "User: while fetching");
    }

    #[test]
    fn catch_panic_converts_payload() {
        assert_eq!(catch_panic(|| 5).expect("no panic"), 5);
        let err = catch_panic(|| panic!("inside")).expect_err("panicked");
        assert_eq!(err.kind(), ErrorKind::Panicked);
        assert_eq!(err.message(), Some("inside"));
    }

    #[test]
    fn kind_round_trips_through_serde() {
        let json = serde_json::to_string(&ErrorKind::Timeout).expect("serialize");
        let back: ErrorKind = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, ErrorKind::Timeout);
    }
}
