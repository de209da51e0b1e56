//! Cancellation token implementation.
//!
//! A [`CancelToken`] is a cheap, clonable handle to shared cancellation state.
//! Tokens form trees: cancelling a parent cascades to every linked child, and
//! a child linked with [`CancelToken::link_both`] also reports upward. Hooks
//! registered with [`CancelToken::on_cancel`] let external resources (queued
//! scheduler work, timers) join the tree.
//!
//! Parent-to-child edges are strong, child-to-parent edges are weak, so a
//! bidirectional link never forms a reference cycle.

use core::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use smallvec::SmallVec;

use crate::tracing_compat::trace;

static NEXT_TOKEN_ID: AtomicU64 = AtomicU64::new(1);

type CancelHook = Box<dyn FnOnce() + Send>;

/// Capability interface for anything that can be revoked.
///
/// Generic consumers (schedulers, adapters) that only need to revoke and
/// observe should depend on this trait rather than on [`CancelToken`].
pub trait Cancellable: Send + Sync {
    /// Requests cancellation. Returns true iff this call performed the
    /// `active → cancelled` transition.
    fn cancel(&self) -> bool;

    /// Returns true once cancellation has happened. Never reverts.
    fn is_cancelled(&self) -> bool;
}

/// Internal shared state for a cancellation token.
struct TokenInner {
    /// Unique token ID (diagnostics only).
    id: u64,
    /// Fast-path flag; written only while `links` is locked.
    cancelled: AtomicBool,
    /// Tree edges and hooks, drained on cancel.
    links: Mutex<TokenLinks>,
}

#[derive(Default)]
struct TokenLinks {
    children: SmallVec<[CancelToken; 2]>,
    parents: SmallVec<[Weak<TokenInner>; 1]>,
    hooks: Vec<CancelHook>,
}

/// A revocable, observable handle forming cancellation trees.
///
/// State is binary and monotonic: `active → cancelled`, never back.
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<TokenInner>,
}

impl CancelToken {
    /// Creates a new active token.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(TokenInner {
                id: NEXT_TOKEN_ID.fetch_add(1, Ordering::Relaxed),
                cancelled: AtomicBool::new(false),
                links: Mutex::new(TokenLinks::default()),
            }),
        }
    }

    /// Creates a token that is already cancelled.
    #[must_use]
    pub fn cancelled() -> Self {
        let token = Self::new();
        token.cancel();
        token
    }

    /// Returns the token ID.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Returns true if cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Returns true if both handles refer to the same token.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Cancels this token, its children, its upward-linked parents, and runs
    /// every registered hook.
    ///
    /// Returns true iff this call performed the transition; a second call
    /// returns false.
    pub fn cancel(&self) -> bool {
        let links = {
            let mut links = self.inner.links.lock();
            if self.inner.cancelled.load(Ordering::Acquire) {
                return false;
            }
            self.inner.cancelled.store(true, Ordering::Release);
            std::mem::take(&mut *links)
        };

        trace!(
            token = self.inner.id,
            children = links.children.len(),
            hooks = links.hooks.len(),
            "token cancelled"
        );

        // Cascade without holding the lock to avoid reentrancy deadlocks.
        for child in links.children {
            child.cancel();
        }
        for parent in links.parents {
            if let Some(inner) = parent.upgrade() {
                Self { inner }.cancel();
            }
        }
        for hook in links.hooks {
            hook();
        }
        true
    }

    /// Links `child` below this token: cancelling `self` cancels `child`.
    ///
    /// Linking to an already-cancelled parent cancels the child immediately.
    pub fn link(&self, child: &Self) {
        if self.same_as(child) {
            return;
        }
        {
            let mut links = self.inner.links.lock();
            if !self.is_cancelled() {
                links.children.push(child.clone());
                return;
            }
        }
        child.cancel();
    }

    /// Links `child` in both directions: cancellation of either side
    /// propagates to the other.
    pub fn link_both(&self, child: &Self) {
        if self.same_as(child) {
            return;
        }
        self.link(child);
        {
            let mut links = child.inner.links.lock();
            if !child.is_cancelled() {
                links.parents.push(Arc::downgrade(&self.inner));
                return;
            }
        }
        self.cancel();
    }

    /// Removes a previously linked child (in both directions).
    pub fn unlink(&self, child: &Self) {
        self.inner
            .links
            .lock()
            .children
            .retain(|c| !c.same_as(child));
        let parent = Arc::downgrade(&self.inner);
        child
            .inner
            .links
            .lock()
            .parents
            .retain(|p| !p.ptr_eq(&parent));
    }

    /// Registers a hook that runs exactly once when this token is cancelled.
    ///
    /// If the token is already cancelled the hook runs immediately.
    pub fn on_cancel<F>(&self, hook: F)
    where
        F: FnOnce() + Send + 'static,
    {
        {
            let mut links = self.inner.links.lock();
            if !self.is_cancelled() {
                links.hooks.push(Box::new(hook));
                return;
            }
        }
        hook();
    }

    /// Runs `f` only while the token is active, atomically with respect to
    /// [`cancel`](Self::cancel).
    ///
    /// `f` must not touch this token: it runs with the token's lock held.
    pub(crate) fn with_active<R>(&self, f: impl FnOnce() -> R) -> Option<R> {
        let _links = self.inner.links.lock();
        if self.is_cancelled() {
            None
        } else {
            Some(f())
        }
    }

    /// Cancels every linked child while leaving this token active.
    ///
    /// Used by terminal delivery: siblings are revoked before the signal
    /// surfaces, but upward-linked parents are only reached by the final
    /// [`cancel`](Self::cancel).
    pub(crate) fn cancel_children(&self) {
        let children = {
            let mut links = self.inner.links.lock();
            if self.is_cancelled() {
                return;
            }
            std::mem::take(&mut links.children)
        };
        for child in children {
            child.cancel();
        }
    }

    /// Number of linked children (diagnostics and tests).
    #[must_use]
    pub fn child_count(&self) -> usize {
        self.inner.links.lock().children.len()
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl Cancellable for CancelToken {
    fn cancel(&self) -> bool {
        Self::cancel(self)
    }

    fn is_cancelled(&self) -> bool {
        Self::is_cancelled(self)
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("id", &self.inner.id)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
