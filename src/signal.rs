//! Captured terminal signals.

use crate::emitter::Emitter;
use crate::error::{Error, Result};

/// One terminal signal, captured for later re-delivery.
#[derive(Debug, Clone)]
pub enum Signal<T> {
    /// A value.
    Success(T),
    /// A failure.
    Error(Error),
    /// Empty completion.
    Complete,
}

impl<T> Signal<T> {
    /// Returns true for [`Signal::Success`].
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Returns true for [`Signal::Error`].
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// Returns true for [`Signal::Complete`].
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        matches!(self, Self::Complete)
    }

    /// Delivers the signal through `emitter`.
    pub fn deliver(self, emitter: &Emitter<T>) {
        match self {
            Self::Success(value) => emitter.on_success(value),
            Self::Error(error) => emitter.on_error(error),
            Self::Complete => emitter.on_complete(),
        }
    }

    /// Converts into the `Result<Option<T>>` shape used by the interop
    /// adapters: empty completion is `Ok(None)`.
    pub fn into_result(self) -> Result<Option<T>> {
        match self {
            Self::Success(value) => Ok(Some(value)),
            Self::Error(error) => Err(error),
            Self::Complete => Ok(None),
        }
    }
}

impl<T> From<Result<Option<T>>> for Signal<T> {
    fn from(result: Result<Option<T>>) -> Self {
        match result {
            Ok(Some(value)) => Self::Success(value),
            Ok(None) => Self::Complete,
            Err(error) => Self::Error(error),
        }
    }
}
