//! Request/response correlation over a shared link.
//!
//! Every response-expecting request reserves a sequence number and registers
//! a [`PendingRequest`] keyed by the expected response kind and that
//! sequence. The read loop hands inbound responses to
//! [`Correlator::fulfill`], which wakes exactly the caller holding the
//! matching key. Dropping a handle from [`Correlator::begin`] releases both
//! the key and the sequence, so cleanup runs on success, timeout and
//! cancellation alike.

use std::{
    collections::HashSet,
    fmt,
    sync::{Arc, Mutex, PoisonError},
};

use dashmap::{DashMap, mapref::entry::Entry};
use thiserror::Error;
use tokio::sync::oneshot;

use crate::frame::{Frame, FrameKind};

/// Identifies the response a caller is waiting for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CorrelationKey {
    kind: FrameKind,
    sequence: u8,
}

impl CorrelationKey {
    /// Key for the response that answers `kind` with `sequence`.
    #[must_use]
    pub const fn new(kind: FrameKind, sequence: u8) -> Self {
        Self {
            kind: kind.response(),
            sequence,
        }
    }

    /// Key an inbound frame would fulfill.
    #[must_use]
    pub fn of(frame: &Frame) -> Self { Self::new(frame.kind(), frame.sequence) }

    /// Expected response kind.
    #[must_use]
    pub const fn kind(self) -> FrameKind { self.kind }

    #[must_use]
    pub const fn sequence(self) -> u8 { self.sequence }
}

impl fmt::Display for CorrelationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind, self.sequence)
    }
}

/// Invariant violations raised while correlating requests.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum CorrelationError {
    /// All 256 sequence numbers are reserved.
    #[error("every sequence number is in use")]
    SequenceExhausted,
    /// A caller is already waiting on this key.
    #[error("a request is already pending for {0}")]
    DuplicateRegistration(CorrelationKey),
}

/// Cyclic allocator over the one-byte sequence space.
#[derive(Debug)]
struct SequencePool {
    in_use: HashSet<u8>,
    cursor: u8,
}

impl Default for SequencePool {
    fn default() -> Self {
        Self {
            in_use: HashSet::new(),
            cursor: 1,
        }
    }
}

impl SequencePool {
    fn allocate(&mut self) -> Option<u8> {
        for offset in 0..=u8::MAX {
            let candidate = self.cursor.wrapping_add(offset);
            if self.in_use.insert(candidate) {
                self.cursor = candidate.wrapping_add(1);
                return Some(candidate);
            }
        }
        None
    }

    fn release(&mut self, sequence: u8) { self.in_use.remove(&sequence); }
}

/// Sequence allocator and pending-request table for one link.
#[derive(Debug, Default)]
pub struct Correlator {
    sequences: Mutex<SequencePool>,
    pending: DashMap<CorrelationKey, Option<oneshot::Sender<Frame>>>,
}

impl Correlator {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Reserve the next free sequence number.
    ///
    /// # Errors
    ///
    /// Returns [`CorrelationError::SequenceExhausted`] if every value is in use.
    pub fn allocate_sequence(&self) -> Result<u8, CorrelationError> {
        self.sequences
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .allocate()
            .ok_or(CorrelationError::SequenceExhausted)
    }

    /// Return `sequence` to the pool.
    pub fn release_sequence(&self, sequence: u8) {
        self.sequences
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .release(sequence);
    }

    /// Whether `sequence` is currently reserved.
    #[must_use]
    pub fn is_sequence_in_use(&self, sequence: u8) -> bool {
        self.sequences
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .in_use
            .contains(&sequence)
    }

    /// Register a waiter for the response to `kind` with `sequence`.
    ///
    /// The sequence stays with the caller: dropping the handle removes the
    /// registration only. Use [`Correlator::begin`] for a handle that owns
    /// its sequence.
    ///
    /// # Errors
    ///
    /// Returns [`CorrelationError::DuplicateRegistration`] if a caller is
    /// already waiting on the same key.
    pub fn register(
        self: &Arc<Self>,
        kind: FrameKind,
        sequence: u8,
    ) -> Result<PendingRequest, CorrelationError> {
        self.register_with(kind, sequence, false)
    }

    fn register_with(
        self: &Arc<Self>,
        kind: FrameKind,
        sequence: u8,
        owns_sequence: bool,
    ) -> Result<PendingRequest, CorrelationError> {
        let key = CorrelationKey::new(kind, sequence);
        let (tx, rx) = oneshot::channel();
        match self.pending.entry(key) {
            Entry::Occupied(_) => return Err(CorrelationError::DuplicateRegistration(key)),
            Entry::Vacant(slot) => {
                slot.insert(Some(tx));
            }
        }
        tracing::trace!(%key, "registered pending request");
        Ok(PendingRequest {
            correlator: Arc::clone(self),
            key,
            rx,
            owns_sequence,
        })
    }

    /// Allocate a sequence and register a waiter for `kind` in one step.
    ///
    /// Dropping the handle releases the sequence with the registration.
    ///
    /// # Errors
    ///
    /// See [`Correlator::allocate_sequence`] and [`Correlator::register`].
    pub fn begin(self: &Arc<Self>, kind: FrameKind) -> Result<PendingRequest, CorrelationError> {
        let sequence = self.allocate_sequence()?;
        self.register_with(kind, sequence, true).inspect_err(|_| {
            self.release_sequence(sequence);
        })
    }

    /// Deliver an inbound response to its waiter.
    ///
    /// Returns `false` when nobody is waiting for the frame's key; the frame
    /// is then dropped.
    pub fn fulfill(&self, frame: Frame) -> bool {
        let key = CorrelationKey::of(&frame);
        let Some(tx) = self.pending.get_mut(&key).and_then(|mut slot| slot.take()) else {
            tracing::debug!(%key, "no caller waiting for response");
            return false;
        };
        tx.send(frame).is_ok()
    }

    /// Wake every waiter without a response.
    ///
    /// Registrations stay in place until their handles are dropped.
    pub fn abandon_all(&self) {
        for mut slot in self.pending.iter_mut() {
            slot.value_mut().take();
        }
    }

    /// Number of registered waiters.
    #[must_use]
    pub fn pending_count(&self) -> usize { self.pending.len() }
}

/// A caller's registration for one response.
#[derive(Debug)]
pub struct PendingRequest {
    correlator: Arc<Correlator>,
    key: CorrelationKey,
    rx: oneshot::Receiver<Frame>,
    owns_sequence: bool,
}

impl PendingRequest {
    #[must_use]
    pub fn key(&self) -> CorrelationKey { self.key }

    #[must_use]
    pub fn sequence(&self) -> u8 { self.key.sequence }

    /// Wait for the response.
    ///
    /// Returns `None` if the registration was abandoned, which happens when
    /// the link shuts down.
    pub async fn wait(&mut self) -> Option<Frame> { (&mut self.rx).await.ok() }

    /// Release the registration, and the sequence if this handle owns it.
    pub fn release(self) {}
}

impl Drop for PendingRequest {
    fn drop(&mut self) {
        self.correlator.pending.remove(&self.key);
        if self.owns_sequence {
            self.correlator.release_sequence(self.key.sequence);
        }
        tracing::trace!(key = %self.key, "released pending request");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use proptest::prelude::*;
    use rstest::rstest;

    use super::*;
    use crate::frame::SUCCESS;

    fn correlator() -> Arc<Correlator> { Arc::new(Correlator::new()) }

    #[test]
    fn sequences_are_unique_until_released() {
        let correlator = correlator();
        let mut seen = HashSet::new();
        for _ in 0..=u8::MAX {
            let sequence = correlator.allocate_sequence().expect("free sequence");
            assert!(seen.insert(sequence), "sequence {sequence} handed out twice");
        }
        assert_eq!(
            correlator.allocate_sequence(),
            Err(CorrelationError::SequenceExhausted)
        );

        correlator.release_sequence(42);
        assert_eq!(correlator.allocate_sequence(), Ok(42));
    }

    #[test]
    fn allocation_is_cyclic() {
        let correlator = correlator();
        let first = correlator.allocate_sequence().expect("free sequence");
        correlator.release_sequence(first);
        let second = correlator.allocate_sequence().expect("free sequence");
        assert_eq!(second, first.wrapping_add(1));
    }

    #[rstest]
    #[case(FrameKind::QueueTxRequest)]
    #[case(FrameKind::QueueTxResponse)]
    fn duplicate_key_is_rejected(#[case] second: FrameKind) {
        let correlator = correlator();
        let first = correlator
            .register(FrameKind::QueueTxRequest, 5)
            .expect("first registration");
        assert_eq!(
            correlator.register(second, 5).map(|p| p.key()),
            Err(CorrelationError::DuplicateRegistration(first.key()))
        );
        drop(first);
        assert!(correlator.register(second, 5).is_ok());
    }

    #[test]
    fn begin_reserves_sequence_until_drop() {
        let correlator = correlator();
        let pending = correlator.begin(FrameKind::GetStatusRequest).expect("begin");
        let sequence = pending.sequence();
        assert!(correlator.is_sequence_in_use(sequence));
        assert_eq!(correlator.pending_count(), 1);
        pending.release();
        assert!(!correlator.is_sequence_in_use(sequence));
        assert_eq!(correlator.pending_count(), 0);
    }

    #[test]
    fn registered_handle_leaves_foreign_sequence_reserved() {
        let correlator = correlator();
        let owner = correlator.begin(FrameKind::QueueTxRequest).expect("begin");
        let sequence = owner.sequence();

        let borrowed = correlator
            .register(FrameKind::GetStatusRequest, sequence)
            .expect("distinct key");
        borrowed.release();
        assert!(correlator.is_sequence_in_use(sequence));
        assert_eq!(correlator.pending_count(), 1);

        owner.release();
        assert!(!correlator.is_sequence_in_use(sequence));
    }

    #[tokio::test]
    async fn fulfill_wakes_only_the_matching_waiter() {
        let correlator = correlator();
        let mut status = correlator.begin(FrameKind::GetStatusRequest).expect("begin");
        let mut queue = correlator.begin(FrameKind::QueueTxRequest).expect("begin");

        let response = Frame::new(FrameKind::QueueTxResponse, queue.sequence())
            .with_is_success(SUCCESS)
            .sealed()
            .expect("small frame");
        assert!(correlator.fulfill(response.clone()));
        assert_eq!(queue.wait().await, Some(response));

        let idle = tokio::time::timeout(Duration::from_millis(10), status.wait()).await;
        assert!(idle.is_err(), "unrelated waiter must not be woken");
    }

    #[test]
    fn unmatched_and_repeated_responses_are_dropped() {
        let correlator = correlator();
        let pending = correlator.begin(FrameKind::RetrieveRxRequest).expect("begin");
        let stray = Frame::new(FrameKind::RetrieveRxResponse, pending.sequence().wrapping_add(1));
        assert!(!correlator.fulfill(stray));

        let response = Frame::new(FrameKind::RetrieveRxResponse, pending.sequence());
        assert!(correlator.fulfill(response.clone()));
        assert!(!correlator.fulfill(response));
    }

    #[tokio::test]
    async fn abandon_all_wakes_waiters_empty_handed() {
        let correlator = correlator();
        let mut pending = correlator.begin(FrameKind::QueueTxRequest).expect("begin");
        correlator.abandon_all();
        assert_eq!(pending.wait().await, None);
        assert_eq!(correlator.pending_count(), 1);
        drop(pending);
        assert_eq!(correlator.pending_count(), 0);
    }

    proptest! {
        #[test]
        fn allocation_never_returns_a_reserved_value(ops in prop::collection::vec(any::<Option<u8>>(), 1..600)) {
            let correlator = correlator();
            let mut held: Vec<u8> = Vec::new();
            for op in ops {
                match op {
                    Some(pick) if !held.is_empty() => {
                        let sequence = held.swap_remove(usize::from(pick) % held.len());
                        correlator.release_sequence(sequence);
                    }
                    _ => match correlator.allocate_sequence() {
                        Ok(sequence) => {
                            prop_assert!(!held.contains(&sequence));
                            held.push(sequence);
                        }
                        Err(err) => {
                            prop_assert_eq!(err, CorrelationError::SequenceExhausted);
                            prop_assert_eq!(held.len(), 256);
                        }
                    },
                }
            }
        }
    }
}
