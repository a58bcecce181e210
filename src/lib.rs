#![doc(html_root_url = "https://docs.rs/station_link/latest")]
//! Public API for the `station_link` library.
//!
//! This crate implements the link layer between a conference badge base
//! station and its infrared transceiver: the preamble-framed wire codec,
//! request/response correlation by sequence number, badge buffer-status
//! tracking, duplicate suppression and the engine that shares one serial
//! transport between many concurrent callers.

pub mod badge;
pub mod codec;
pub mod correlation;
pub mod dedup;
pub mod error;
pub mod frame;
pub mod link;
pub mod metrics;

pub use badge::{BadgeStatus, BadgeTracker};
pub use codec::{FrameError, StationLinkCodec};
pub use correlation::{CorrelationError, CorrelationKey, Correlator, PendingRequest};
pub use dedup::DedupWindow;
pub use error::{LinkError, Result};
pub use frame::{Frame, FrameInfo, FrameKind, PacketType};
pub use link::{
    DuplexMode,
    LinkConfig,
    Received,
    SendOptions,
    SendOutcome,
    SendReport,
    SerialSettings,
    StationLink,
};
pub use metrics::{
    DUPLICATES_TOTAL,
    Direction,
    FAULTS_TOTAL,
    FRAMES_TOTAL,
    MALFORMED_TOTAL,
    REJECTIONS_TOTAL,
    RETRIES_TOTAL,
};
