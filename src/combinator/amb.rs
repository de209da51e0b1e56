//! Race combinator: subscribe to every source, first terminal signal wins.
//!
//! ```text
//! amb([a, b, c]):
//!   root ← emitter token handed downstream
//!   for s in [a, b, c]:          // input order
//!     if root cancelled: stop    // decided, or cancelled by the caller
//!     link(root, subscribe(s))
//!   first signal → deliver, cancel root → cancel every linked source
//! ```
//!
//! Losing sources are suppressed by the emitter's claim step even if they
//! signal at the same instant as the winner.

use crate::emitter::Emitter;
use crate::maybe::{Maybe, Source};
use crate::observer::Subscriber;
use crate::tracing_compat::trace;

use super::Branch;

struct Amb<T> {
    sources: Vec<Maybe<T>>,
}

impl<T: Send + 'static> Source<T> for Amb<T> {
    fn subscribe_actual(&self, subscriber: Subscriber<T>) {
        let emitter = Emitter::subscribe(subscriber);
        if self.sources.is_empty() {
            emitter.on_complete();
            return;
        }
        for (index, source) in self.sources.iter().enumerate() {
            if emitter.is_cancelled() {
                trace!(index, total = self.sources.len(), "amb: decided early");
                break;
            }
            let winner = emitter.clone();
            source.subscribe(Branch::new(&emitter, move |value: T| winner.on_success(value)));
        }
    }
}

impl<T: Send + 'static> Maybe<T> {
    /// Races `sources`: the first terminal signal is forwarded and every
    /// other source is cancelled. An empty list completes empty.
    pub fn amb<I>(sources: I) -> Maybe<T>
    where
        I: IntoIterator<Item = Maybe<T>>,
    {
        Maybe::from_source(Amb {
            sources: sources.into_iter().collect(),
        })
    }

    /// Races this source against `other`; ties go to `self`.
    #[must_use]
    pub fn amb_with(&self, other: Maybe<T>) -> Maybe<T> {
        Maybe::amb([self.clone(), other])
    }
}
