//! Pairwise combine: wait for a success from every side, then zip.
//!
//! Each side's value is parked in its own `Option` slot under one lock. The
//! side whose arrival fills the last empty slot takes every value out and
//! runs the zipper, so exactly one side ever delivers. An error or empty
//! completion from any side is forwarded at once and cancels the rest.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::emitter::Emitter;
use crate::error::{catch_panic, Error};
use crate::maybe::Maybe;
use crate::tracing_compat::debug;

use super::Branch;

struct Pair<A, B> {
    left: Option<A>,
    right: Option<B>,
}

fn finish<R>(emitter: &Emitter<R>, result: Result<Option<R>, Error>) {
    match result {
        Ok(Some(value)) => emitter.on_success(value),
        Ok(None) => emitter.on_error(Error::zipper_no_result()),
        Err(error) => {
            debug!(error = %error, "zipper panicked");
            emitter.on_error(error);
        }
    }
}

impl<T: Send + 'static> Maybe<T> {
    /// Combines this success with `other`'s through `zipper`.
    ///
    /// `zipper` returning `None` is reported as
    /// [`ErrorKind::ZipperNoResult`](crate::ErrorKind::ZipperNoResult).
    pub fn zip_with<U, R, F>(&self, other: Maybe<U>, zipper: F) -> Maybe<R>
    where
        U: Send + 'static,
        R: Send + 'static,
        F: Fn(T, U) -> Option<R> + Send + Sync + 'static,
    {
        let left = self.clone();
        let zipper = Arc::new(zipper);
        Maybe::create(move |emitter: &Emitter<R>| {
            let pair = Arc::new(Mutex::new(Pair {
                left: None,
                right: None,
            }));

            let (slots, zip, target) = (Arc::clone(&pair), Arc::clone(&zipper), emitter.clone());
            left.subscribe(Branch::new(emitter, move |a: T| {
                let mut pair = slots.lock();
                match pair.right.take() {
                    Some(b) => {
                        drop(pair);
                        finish(&target, catch_panic(|| zip(a, b)));
                    }
                    None => pair.left = Some(a),
                }
            }));

            if emitter.is_cancelled() {
                return Ok(());
            }
            let (slots, zip, target) = (pair, Arc::clone(&zipper), emitter.clone());
            other.subscribe(Branch::new(emitter, move |b: U| {
                let mut pair = slots.lock();
                match pair.left.take() {
                    Some(a) => {
                        drop(pair);
                        finish(&target, catch_panic(|| zip(a, b)));
                    }
                    None => pair.right = Some(b),
                }
            }));
            Ok(())
        })
    }

    /// Pairs this success with `other`'s.
    #[must_use]
    pub fn zip<U: Send + 'static>(&self, other: Maybe<U>) -> Maybe<(T, U)> {
        self.zip_with(other, |a, b| Some((a, b)))
    }

    /// Combines the successes of every source, in input order.
    ///
    /// An empty list completes empty.
    pub fn zip_all<I, R, F>(sources: I, zipper: F) -> Maybe<R>
    where
        I: IntoIterator<Item = Maybe<T>>,
        R: Send + 'static,
        F: Fn(Vec<T>) -> Option<R> + Send + Sync + 'static,
    {
        let sources: Arc<[Maybe<T>]> = sources.into_iter().collect();
        let zipper = Arc::new(zipper);
        Maybe::create(move |emitter: &Emitter<R>| {
            if sources.is_empty() {
                emitter.on_complete();
                return Ok(());
            }
            let slots: Arc<Mutex<Vec<Option<T>>>> =
                Arc::new(Mutex::new((0..sources.len()).map(|_| None).collect()));
            for (index, source) in sources.iter().enumerate() {
                if emitter.is_cancelled() {
                    break;
                }
                let (slots, zip, target) =
                    (Arc::clone(&slots), Arc::clone(&zipper), emitter.clone());
                source.subscribe(Branch::new(emitter, move |value: T| {
                    let mut slots = slots.lock();
                    slots[index] = Some(value);
                    if slots.iter().all(Option::is_some) {
                        let values: Vec<T> = slots.iter_mut().filter_map(Option::take).collect();
                        drop(slots);
                        finish(&target, catch_panic(|| zip(values)));
                    }
                }));
            }
            Ok(())
        })
    }
}
