//! Canonical error and result types for the crate.
//!
//! [`LinkError`] is reserved for faults. Expected failures such as timeouts,
//! local rejections and "no data" are reported through
//! [`crate::link::SendOutcome`] instead.

use std::{io, sync::Arc};

use thiserror::Error;

use crate::{codec::FrameError, correlation::CorrelationError, frame::FrameKind};

/// Fault raised by the station link.
///
/// The type is `Clone` so that a single transport fault can be handed to
/// every caller suspended on the link.
#[derive(Clone, Debug, Error)]
pub enum LinkError {
    /// The underlying transport failed.
    #[error("transport error: {0}")]
    Io(Arc<io::Error>),

    /// The transport accepted fewer bytes than were submitted.
    #[error("incomplete write: {written} of {expected} bytes accepted")]
    IncompleteWrite {
        /// Bytes submitted.
        expected: usize,
        /// Bytes accepted.
        written: usize,
    },

    /// The link has been closed locally or by the peer.
    #[error("station link is closed")]
    Closed,

    /// Sequence allocation or registration broke an invariant.
    #[error(transparent)]
    Correlation(#[from] CorrelationError),

    /// An outgoing frame failed validation.
    #[error("invalid outgoing frame: {0}")]
    Frame(#[from] FrameError),

    /// The base station may not originate this kind.
    #[error("{0} cannot be sent by the base station")]
    InvalidRequestKind(FrameKind),
}

impl From<io::Error> for LinkError {
    fn from(error: io::Error) -> Self { Self::Io(Arc::new(error)) }
}

impl LinkError {
    /// Whether the error poisons the transport for every later caller.
    #[must_use]
    pub fn is_transport_fault(&self) -> bool {
        matches!(
            self,
            Self::Io(_) | Self::IncompleteWrite { .. } | Self::Closed
        )
    }
}

/// Canonical result alias used by `station_link` public APIs.
pub type Result<T> = std::result::Result<T, LinkError>;
