//! Deadline-ordered queue of scheduled work shared by the queueing schedulers.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::Task;
use crate::cancel::CancelToken;
use crate::error::Error;
use crate::tracing_compat::{trace, warn};

/// Heap size below which cancelled entries are never compacted away.
const COMPACT_MIN: usize = 64;

/// A queued unit of work.
///
/// The task sits in a shared slot that the token's cancel hook empties, so a
/// cancelled entry holds no closure while it waits in the heap.
pub(crate) struct Entry {
    due: Duration,
    seq: u64,
    token: CancelToken,
    task: Arc<Mutex<Option<Task>>>,
}

impl Entry {
    pub(crate) const fn due(&self) -> Duration {
        self.due
    }

    /// Runs the task unless its token was cancelled first.
    pub(crate) fn run(self) {
        let task = self.task.lock().take();
        if let Some(task) = task {
            run_task(&self.token, task);
        }
    }
}

impl Eq for Entry {}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Min-heap: earliest due first, then insertion order.
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A min-heap of work ordered by (due, sequence).
///
/// Cancelling an entry releases its task at once. The empty shell is popped
/// when it reaches the front, or swept by a compaction once the heap has
/// doubled since the last sweep.
pub(crate) struct TimerQueue {
    heap: BinaryHeap<Entry>,
    next_seq: u64,
    compact_at: usize,
}

impl Default for TimerQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerQueue {
    pub(crate) fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_seq: 0,
            compact_at: COMPACT_MIN,
        }
    }

    /// Queues `task` at `due`; returns its token.
    pub(crate) fn push(&mut self, due: Duration, task: Task) -> CancelToken {
        if self.heap.len() >= self.compact_at {
            self.compact();
        }
        let token = CancelToken::new();
        let task = Arc::new(Mutex::new(Some(task)));
        let slot = Arc::downgrade(&task);
        token.on_cancel(move || {
            if let Some(slot) = slot.upgrade() {
                let released = slot.lock().take();
                drop(released);
            }
        });
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Entry {
            due,
            seq,
            token: token.clone(),
            task,
        });
        token
    }

    /// Number of entries in the heap, cancelled shells included.
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.heap.len()
    }

    /// Earliest due time among live entries.
    pub(crate) fn peek_due(&mut self) -> Option<Duration> {
        self.purge_front();
        self.heap.peek().map(|e| e.due)
    }

    /// Pops the earliest live entry if it is due at or before `now`.
    pub(crate) fn pop_due(&mut self, now: Duration) -> Option<Entry> {
        self.purge_front();
        if self.heap.peek()?.due <= now {
            self.heap.pop()
        } else {
            None
        }
    }

    /// Pops the earliest live entry regardless of its due time.
    pub(crate) fn pop_next(&mut self) -> Option<Entry> {
        self.purge_front();
        self.heap.pop()
    }

    /// Number of live entries.
    pub(crate) fn live_count(&self) -> usize {
        self.heap
            .iter()
            .filter(|e| !e.token.is_cancelled())
            .count()
    }

    /// Drops every entry.
    pub(crate) fn clear(&mut self) -> usize {
        let dropped = self.heap.len();
        for entry in self.heap.drain() {
            entry.token.cancel();
        }
        dropped
    }

    fn compact(&mut self) {
        let before = self.heap.len();
        self.heap.retain(|e| !e.token.is_cancelled());
        self.compact_at = (self.heap.len() * 2).max(COMPACT_MIN);
        trace!(before, after = self.heap.len(), "timer queue compacted");
    }

    fn purge_front(&mut self) {
        while self.heap.peek().is_some_and(|e| e.token.is_cancelled()) {
            self.heap.pop();
        }
    }
}

/// Runs `task` unless `token` was cancelled. A panicking task is logged and
/// contained so it cannot take down the scheduler driving it.
pub(crate) fn run_task(token: &CancelToken, task: Task) {
    if token.is_cancelled() {
        trace!(token = token.id(), "scheduled work skipped: cancelled");
        return;
    }
    trace!(token = token.id(), "scheduled work dispatched");
    if let Err(payload) = catch_unwind(AssertUnwindSafe(task)) {
        let error = Error::panicked(payload.as_ref());
        warn!(token = token.id(), error = %error, "scheduled work panicked");
    }
}
