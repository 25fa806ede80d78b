//! Viewport visibility of pagination sentinels.
//!
//! A sentinel is an invisible marker at the end of a results list. The list
//! subscribes to it through a [`Viewport`] and gets back a [`Subscription`]
//! handle. The handle is one-shot: [`Subscription::cancel`] consumes it, and
//! dropping an uncancelled handle unobserves too, so an unmounted list never
//! leaves an observer behind.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Identity of one mounted sentinel instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SentinelId(u64);

impl SentinelId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SentinelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sentinel#{}", self.0)
    }
}

/// Something that can watch sentinels enter the visible area
pub trait Viewport: Send + Sync + fmt::Debug {
    /// Allocate an id for a freshly mounted sentinel
    fn mount(&self) -> SentinelId;

    /// Start observing `sentinel`
    fn subscribe(&self, sentinel: SentinelId) -> Subscription;

    /// Stop observing `sentinel`. Called by [`Subscription`]; idempotent.
    fn unobserve(&self, sentinel: SentinelId);
}

/// Handle for one observation
///
/// Dropping the handle unobserves the sentinel.
#[must_use = "dropping a Subscription unobserves the sentinel immediately"]
pub struct Subscription {
    sentinel: SentinelId,
    viewport: Option<Arc<dyn Viewport>>,
}

impl Subscription {
    /// A handle that unobserves `sentinel` on `viewport` when released
    pub fn new(sentinel: SentinelId, viewport: Arc<dyn Viewport>) -> Self {
        Self {
            sentinel,
            viewport: Some(viewport),
        }
    }

    pub fn sentinel(&self) -> SentinelId {
        self.sentinel
    }

    /// Stop observing. Consumes the handle, so it can only happen once.
    pub fn cancel(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(viewport) = self.viewport.take() {
            viewport.unobserve(self.sentinel);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("sentinel", &self.sentinel)
            .field("active", &self.viewport.is_some())
            .finish()
    }
}

#[derive(Debug, Default)]
struct TrackerState {
    observed: BTreeSet<SentinelId>,
}

/// In-process viewport: records which sentinels are observed.
///
/// The host (a terminal loop, a test) decides what is on screen and asks
/// [`VisibilityTracker::is_observed`] before reporting a sentinel as visible.
/// Cloning shares the same state.
#[derive(Debug, Clone, Default)]
pub struct VisibilityTracker {
    inner: Arc<TrackerInner>,
}

#[derive(Debug, Default)]
struct TrackerInner {
    next_id: AtomicU64,
    state: Mutex<TrackerState>,
}

impl VisibilityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, TrackerState> {
        self.inner.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Sentinels currently observed, oldest first
    pub fn observed(&self) -> Vec<SentinelId> {
        self.state().observed.iter().copied().collect()
    }

    pub fn is_observed(&self, sentinel: SentinelId) -> bool {
        self.state().observed.contains(&sentinel)
    }

    /// Number of live observations
    pub fn observer_count(&self) -> usize {
        self.state().observed.len()
    }
}

impl Viewport for VisibilityTracker {
    fn mount(&self) -> SentinelId {
        SentinelId(self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }

    fn subscribe(&self, sentinel: SentinelId) -> Subscription {
        self.state().observed.insert(sentinel);
        tracing::trace!("Observing {}", sentinel);
        Subscription::new(sentinel, Arc::new(self.clone()))
    }

    fn unobserve(&self, sentinel: SentinelId) {
        if self.state().observed.remove(&sentinel) {
            tracing::trace!("Unobserved {}", sentinel);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mount_allocates_fresh_ids() {
        let tracker = VisibilityTracker::new();
        let a = tracker.mount();
        let b = tracker.mount();
        assert_ne!(a, b);
        assert!(a < b);
    }

    #[test]
    fn test_cancel_unobserves() {
        let tracker = VisibilityTracker::new();
        let id = tracker.mount();

        let subscription = tracker.subscribe(id);
        assert!(tracker.is_observed(id));
        assert_eq!(subscription.sentinel(), id);

        subscription.cancel();
        assert!(!tracker.is_observed(id));
        assert_eq!(tracker.observer_count(), 0);
    }

    #[test]
    fn test_drop_unobserves() {
        let tracker = VisibilityTracker::new();
        let id = tracker.mount();
        {
            let _subscription = tracker.subscribe(id);
            assert_eq!(tracker.observed(), vec![id]);
        }
        assert!(tracker.observed().is_empty());
    }

    #[test]
    fn test_clones_share_state() {
        let tracker = VisibilityTracker::new();
        let host_view = tracker.clone();
        let id = tracker.mount();

        let _subscription = tracker.subscribe(id);
        assert!(host_view.is_observed(id));
    }
}
