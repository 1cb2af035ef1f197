//! Shared crawl counters.
//!
//! The only mutable state work units share. Every operation is a single
//! atomic check-and-update, so `pushed <= quota` holds under any interleaving.

use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

pub struct CrawlState {
    visited: Mutex<HashSet<String>>,
    in_flight: AtomicUsize,
    pushed: AtomicUsize,
    pages_fetched: AtomicUsize,
    quota: usize,
    cancelled: AtomicBool,
}

impl CrawlState {
    pub fn new(quota: usize) -> Self {
        Self {
            visited: Mutex::new(HashSet::new()),
            in_flight: AtomicUsize::new(0),
            pushed: AtomicUsize::new(0),
            pages_fetched: AtomicUsize::new(0),
            quota,
            cancelled: AtomicBool::new(false),
        }
    }

    /// Mark `url` visited. Returns false if it already was.
    pub fn mark_visited(&self, url: &str) -> bool {
        self.visited
            .lock()
            .map(|mut visited| visited.insert(url.to_string()))
            .unwrap_or(false)
    }

    pub fn is_visited(&self, url: &str) -> bool {
        self.visited
            .lock()
            .map(|visited| visited.contains(url))
            .unwrap_or(true)
    }

    pub fn visited_count(&self) -> usize {
        self.visited.lock().map(|v| v.len()).unwrap_or(0)
    }

    /// Whether another detail page may be scheduled: `pushed + in_flight < quota`.
    pub fn has_detail_capacity(&self) -> bool {
        self.pushed() + self.in_flight() < self.quota
    }

    /// Reserve an in-flight slot for a detail page.
    pub fn try_reserve_detail(&self) -> bool {
        self.in_flight
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |in_flight| {
                (self.pushed() + in_flight < self.quota).then_some(in_flight + 1)
            })
            .is_ok()
    }

    /// Free a slot taken by [`try_reserve_detail`](Self::try_reserve_detail).
    pub fn release_detail(&self) {
        let _ = self
            .in_flight
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }

    /// Claim a push slot. Reaching the quota cancels further scheduling.
    pub fn try_push(&self) -> bool {
        let claimed = self
            .pushed
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |pushed| {
                (pushed < self.quota).then_some(pushed + 1)
            });
        match claimed {
            Ok(previous) => {
                if previous + 1 >= self.quota {
                    self.cancel();
                }
                true
            }
            Err(_) => false,
        }
    }

    /// Give back a push slot after the sink rejected the record.
    pub fn rollback_push(&self) {
        let _ = self
            .pushed
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        if self.pushed() < self.quota {
            self.cancelled.store(false, Ordering::Release);
        }
    }

    pub fn record_page(&self) {
        self.pages_fetched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched.load(Ordering::Relaxed)
    }

    pub fn pushed(&self) -> usize {
        self.pushed.load(Ordering::Acquire)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn quota(&self) -> usize {
        self.quota
    }

    pub fn quota_reached(&self) -> bool {
        self.pushed() >= self.quota
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn visited_never_duplicates() {
        let state = CrawlState::new(5);
        assert!(state.mark_visited("https://a/1"));
        assert!(!state.mark_visited("https://a/1"));
        assert!(state.is_visited("https://a/1"));
        assert_eq!(state.visited_count(), 1);
    }

    #[test]
    fn reservations_respect_quota() {
        let state = CrawlState::new(2);
        assert!(state.try_reserve_detail());
        assert!(state.try_reserve_detail());
        assert!(!state.try_reserve_detail());

        state.release_detail();
        assert!(state.has_detail_capacity());
        assert!(state.try_push());
        assert!(!state.try_reserve_detail());
    }

    #[test]
    fn push_is_bounded_and_cancels() {
        let state = CrawlState::new(2);
        assert!(state.try_push());
        assert!(!state.is_cancelled());
        assert!(state.try_push());
        assert!(state.is_cancelled());
        assert!(!state.try_push());
        assert_eq!(state.pushed(), 2);

        state.rollback_push();
        assert_eq!(state.pushed(), 1);
        assert!(!state.is_cancelled());
    }

    #[test]
    fn concurrent_pushes_never_overshoot() {
        let state = Arc::new(CrawlState::new(10));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let state = Arc::clone(&state);
                std::thread::spawn(move || (0..10).filter(|_| state.try_push()).count())
            })
            .collect();
        let total: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(total, 10);
        assert_eq!(state.pushed(), 10);
    }
}
