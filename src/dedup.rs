//! Time-windowed memory of recently seen frames.
//!
//! A [`DedupWindow`] remembers raw frame bytes for at most `ttl` and at most
//! `capacity` entries. It is used twice by the link: once to drop inbound
//! retransmissions and once to recognise the link's own writes echoed back
//! by the transceiver.

use std::{
    collections::VecDeque,
    sync::{Mutex, PoisonError},
    time::Duration,
};

use bytes::Bytes;
use tokio::time::Instant;

#[derive(Debug)]
struct Seen {
    bytes: Bytes,
    at: Instant,
}

/// Bounded FIFO of `(bytes, first seen)` pairs.
#[derive(Debug)]
pub struct DedupWindow {
    entries: Mutex<VecDeque<Seen>>,
    capacity: usize,
    ttl: Duration,
}

impl DedupWindow {
    /// Create a window holding at most `capacity` entries for `ttl` each.
    ///
    /// A zero capacity is raised to one.
    #[must_use]
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            ttl,
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize { self.capacity }

    #[must_use]
    pub fn ttl(&self) -> Duration { self.ttl }

    fn evict_expired(&self, entries: &mut VecDeque<Seen>, now: Instant) {
        while entries
            .front()
            .is_some_and(|seen| now.duration_since(seen.at) >= self.ttl)
        {
            entries.pop_front();
        }
    }

    fn push(&self, entries: &mut VecDeque<Seen>, bytes: Bytes, at: Instant) {
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(Seen { bytes, at });
    }

    /// Admit `bytes` unless they were seen within the window.
    ///
    /// Returns `true` for new bytes, which are then remembered. A match is
    /// retired from the window, so a third copy is admitted again.
    pub fn try_admit(&self, bytes: &[u8]) -> bool {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        self.evict_expired(&mut entries, now);
        if let Some(index) = entries.iter().position(|seen| seen.bytes == bytes) {
            entries.remove(index);
            return false;
        }
        self.push(&mut entries, Bytes::copy_from_slice(bytes), now);
        true
    }

    /// Remember `bytes` without checking for a match.
    pub fn remember(&self, bytes: Bytes) {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        self.evict_expired(&mut entries, now);
        self.push(&mut entries, bytes, now);
    }

    /// Remove and report a live entry equal to `bytes`.
    pub fn take(&self, bytes: &[u8]) -> bool {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        self.evict_expired(&mut entries, now);
        match entries.iter().position(|seen| seen.bytes == bytes) {
            Some(index) => {
                entries.remove(index);
                true
            }
            None => false,
        }
    }

    /// Number of remembered entries, expired ones included until the next
    /// lookup evicts them.
    #[must_use]
    pub fn len(&self) -> usize { self.entries.lock().unwrap_or_else(PoisonError::into_inner).len() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

#[cfg(test)]
mod tests {
    use tokio::time::advance;

    use super::*;

    const TTL: Duration = Duration::from_millis(300);

    #[tokio::test(start_paused = true)]
    async fn repeat_within_ttl_is_a_duplicate() {
        let window = DedupWindow::new(8, TTL);
        assert!(window.try_admit(b"frame"));
        advance(TTL / 2).await;
        assert!(!window.try_admit(b"frame"));
    }

    #[tokio::test(start_paused = true)]
    async fn repeat_after_ttl_is_admitted() {
        let window = DedupWindow::new(8, TTL);
        assert!(window.try_admit(b"frame"));
        advance(TTL).await;
        assert!(window.try_admit(b"frame"));
    }

    #[tokio::test(start_paused = true)]
    async fn a_match_is_retired() {
        let window = DedupWindow::new(8, TTL);
        assert!(window.try_admit(b"frame"));
        assert!(!window.try_admit(b"frame"));
        assert!(window.try_admit(b"frame"));
        assert_eq!(window.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn matches_behind_the_front_are_found() {
        let window = DedupWindow::new(8, TTL);
        assert!(window.try_admit(b"a"));
        assert!(window.try_admit(b"b"));
        assert!(window.try_admit(b"c"));
        assert!(!window.try_admit(b"b"));
        assert_eq!(window.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn capacity_evicts_the_oldest() {
        let window = DedupWindow::new(2, TTL);
        assert!(window.try_admit(b"a"));
        assert!(window.try_admit(b"b"));
        assert!(window.try_admit(b"c"));
        assert_eq!(window.len(), 2);
        assert!(window.try_admit(b"a"), "oldest entry should have been evicted");
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entries_are_evicted_before_lookup() {
        let window = DedupWindow::new(8, TTL);
        assert!(window.try_admit(b"old"));
        advance(TTL * 2).await;
        assert!(window.try_admit(b"new"));
        assert_eq!(window.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn take_consumes_remembered_bytes_once() {
        let window = DedupWindow::new(8, TTL);
        window.remember(Bytes::from_static(b"echo"));
        assert!(window.take(b"echo"));
        assert!(!window.take(b"echo"));

        window.remember(Bytes::from_static(b"late"));
        advance(TTL).await;
        assert!(!window.take(b"late"));
        assert!(window.is_empty());
    }

    #[test]
    fn zero_capacity_is_raised() {
        assert_eq!(DedupWindow::new(0, TTL).capacity(), 1);
    }
}
