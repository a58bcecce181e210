//! Last-known buffer state of the badge.
//!
//! The badge is authoritative; the tracker only saves a round trip when an
//! operation is bound to be refused. Rejections surface to callers as
//! ordinary failed attempts.

use std::{
    fmt,
    ops::BitOr,
    sync::{Mutex, PoisonError},
};

use crate::frame::{FAILURE, Frame, FrameKind, SUCCESS};

/// Flags describing the badge's receive and transmit buffers.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct BadgeStatus(u8);

impl BadgeStatus {
    pub const EMPTY_RX: Self = Self(0x01);
    pub const EMPTY_TX: Self = Self(0x02);
    pub const FULL_RX: Self = Self(0x04);
    pub const FULL_TX: Self = Self(0x08);

    const NAMES: [(Self, &'static str); 4] = [
        (Self::EMPTY_RX, "EMPTY_RX"),
        (Self::EMPTY_TX, "EMPTY_TX"),
        (Self::FULL_RX, "FULL_RX"),
        (Self::FULL_TX, "FULL_TX"),
    ];

    #[must_use]
    pub const fn empty() -> Self { Self(0) }

    #[must_use]
    pub const fn bits(self) -> u8 { self.0 }

    #[must_use]
    pub const fn is_empty(self) -> bool { self.0 == 0 }

    /// Whether every flag of `other` is set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool { self.0 & other.0 == other.0 }

    #[must_use]
    pub const fn union(self, other: Self) -> Self { Self(self.0 | other.0) }

    #[must_use]
    pub const fn difference(self, other: Self) -> Self { Self(self.0 & !other.0) }
}

impl BitOr for BadgeStatus {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self { self.union(rhs) }
}

impl fmt::Debug for BadgeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set()
            .entries(
                Self::NAMES
                    .iter()
                    .filter(|(flag, _)| self.contains(*flag))
                    .map(|(_, name)| name),
            )
            .finish()
    }
}

/// Exact field match required for a transition to apply.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Condition {
    IsSuccess(u8),
    Status(u8),
    Size(u8),
}

impl Condition {
    fn holds(self, frame: &Frame) -> bool {
        match self {
            Self::IsSuccess(value) => frame.is_success == Some(value),
            Self::Status(value) => frame.status == Some(value),
            Self::Size(value) => frame.size == value,
        }
    }
}

/// One entry of a kind's transition list.
#[derive(Clone, Copy, Debug)]
pub struct Transition {
    /// Every condition must hold; an empty list always matches.
    pub when: &'static [Condition],
    pub clear: BadgeStatus,
    pub set: BadgeStatus,
}

impl Transition {
    const fn new(when: &'static [Condition], clear: BadgeStatus, set: BadgeStatus) -> Self {
        Self { when, clear, set }
    }

    fn matches(&self, frame: &Frame) -> bool { self.when.iter().all(|c| c.holds(frame)) }

    fn apply(&self, status: BadgeStatus) -> BadgeStatus {
        status.difference(self.clear).union(self.set)
    }
}

const NONE: BadgeStatus = BadgeStatus::empty();

const PUSH_TX: &[Transition] = &[Transition::new(&[], NONE, BadgeStatus::FULL_TX)];
const POP_RX: &[Transition] = &[Transition::new(&[], NONE, BadgeStatus::EMPTY_RX)];
const QUEUE_TX_RESPONSE: &[Transition] = &[
    Transition::new(&[Condition::IsSuccess(FAILURE)], BadgeStatus::FULL_TX, NONE),
    Transition::new(&[Condition::IsSuccess(SUCCESS)], BadgeStatus::FULL_TX, NONE),
];
const RETRIEVE_RX_RESPONSE: &[Transition] =
    &[Transition::new(&[Condition::Size(0)], NONE, BadgeStatus::EMPTY_RX)];

/// Transition list evaluated when a frame of `kind` is observed.
#[must_use]
pub fn transitions(kind: FrameKind) -> &'static [Transition] {
    match kind {
        FrameKind::PushTxRequest => PUSH_TX,
        FrameKind::PopRxRequest => POP_RX,
        FrameKind::QueueTxResponse => QUEUE_TX_RESPONSE,
        FrameKind::RetrieveRxResponse => RETRIEVE_RX_RESPONSE,
        _ => &[],
    }
}

/// Status sets that make the badge refuse a request kind.
#[must_use]
pub fn rejections(kind: FrameKind) -> &'static [BadgeStatus] {
    match kind {
        FrameKind::RetrieveRxRequest => &[BadgeStatus::EMPTY_RX],
        FrameKind::QueueTxRequest => &[BadgeStatus::FULL_TX],
        _ => &[],
    }
}

/// Guarded [`BadgeStatus`] shared by the read loop and senders.
#[derive(Debug, Default)]
pub struct BadgeTracker {
    status: Mutex<BadgeStatus>,
}

impl BadgeTracker {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    #[must_use]
    pub fn status(&self) -> BadgeStatus { *self.status.lock().unwrap_or_else(PoisonError::into_inner) }

    /// Whether a request of `kind` may go on the wire.
    #[must_use]
    pub fn accepts(&self, kind: FrameKind) -> bool {
        let status = self.status();
        !rejections(kind).iter().any(|trigger| status.contains(*trigger))
    }

    /// Apply the first matching transition for `frame`.
    ///
    /// Returns the status after the update.
    pub fn observe(&self, frame: &Frame) -> BadgeStatus {
        let mut status = self.status.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(transition) = transitions(frame.kind()).iter().find(|t| t.matches(frame)) {
            let next = transition.apply(*status);
            if next != *status {
                tracing::debug!(kind = %frame.kind(), from = ?*status, to = ?next, "badge status changed");
            }
            *status = next;
        }
        *status
    }

    /// Forget everything learned about the badge.
    pub fn reset(&self) { *self.status.lock().unwrap_or_else(PoisonError::into_inner) = BadgeStatus::empty(); }
}
