//! Error types for the codec layer.
//!
//! Every [`FrameError`] describes a frame that must be discarded. None of
//! them corrupt the byte stream: after a failure the decoder returns to
//! scanning for the next preamble.

use std::io;

use thiserror::Error;

use crate::frame::{FrameKind, OptionalField};

/// A frame failed validation while being encoded or decoded.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    /// The type byte names no known kind once info bits are removed.
    #[error("unknown packet type {0:#04x}")]
    UnknownType(u8),

    /// Fewer bytes were supplied than the header or declared size requires.
    #[error("incomplete frame: have {have} bytes, need {need}")]
    Truncated {
        /// Bytes supplied.
        have: usize,
        /// Bytes required.
        need: usize,
    },

    /// The declared size disagrees with the populated optional fields.
    #[error("declared size {declared} does not match {actual} bytes of optional fields")]
    SizeMismatch {
        /// Value of the size byte.
        declared: u8,
        /// Byte length of the optional fields actually present.
        actual: usize,
    },

    /// A populated field is not part of the kind's layout.
    #[error("{kind} does not carry a {field:?} field")]
    FieldNotDeclared {
        /// Kind of the offending frame.
        kind: FrameKind,
        /// Field that should have been absent.
        field: OptionalField,
    },

    /// A field is populated after an absent fixed-width field, so the frame
    /// could not be decoded back into the same fields.
    #[error("{kind} carries fields after an absent {field:?} field")]
    MissingField {
        /// Kind of the offending frame.
        kind: FrameKind,
        /// First absent field that precedes a populated one.
        field: OptionalField,
    },

    /// Optional fields do not fit the one-byte size field.
    #[error("optional fields span {size} bytes; at most 255 fit a frame")]
    Oversized {
        /// Byte length of the optional fields.
        size: usize,
    },
}

impl FrameError {
    /// Returns the error category as a string for logging and metrics.
    #[must_use]
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::UnknownType(_) => "unknown_type",
            Self::Truncated { .. } => "truncated",
            Self::SizeMismatch { .. } => "size_mismatch",
            Self::FieldNotDeclared { .. } => "undeclared_field",
            Self::MissingField { .. } => "missing_field",
            Self::Oversized { .. } => "oversized",
        }
    }
}

impl From<FrameError> for io::Error {
    fn from(err: FrameError) -> Self { io::Error::new(io::ErrorKind::InvalidData, err) }
}
