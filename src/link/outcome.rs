//! Options and results of the public link API.

use std::time::Duration;

use bytes::Bytes;

use crate::frame::{Frame, FrameInfo, FrameKind};

/// How a frame should be sent.
///
/// `retry_count` and `timeout` override the link's configuration for one
/// call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SendOptions {
    pub kind: FrameKind,
    pub wait_for_response: bool,
    /// Address the badge's cross board by setting the `CROSS_BOARD` bit.
    pub cross_board: bool,
    pub retry_count: Option<u32>,
    pub timeout: Option<Duration>,
}

impl SendOptions {
    /// Options for `kind`, waiting for a response when the kind has one.
    #[must_use]
    pub fn new(kind: FrameKind) -> Self {
        Self {
            kind,
            wait_for_response: kind.expects_response(),
            cross_board: false,
            retry_count: None,
            timeout: None,
        }
    }

    /// Queue a payload for infrared transmission.
    #[must_use]
    pub fn queue_tx() -> Self { Self::new(FrameKind::QueueTxRequest) }

    /// Fetch one received payload from the badge.
    #[must_use]
    pub fn retrieve_rx() -> Self { Self::new(FrameKind::RetrieveRxRequest) }

    #[must_use]
    pub fn get_status() -> Self { Self::new(FrameKind::GetStatusRequest) }

    /// Print a payload on the badge display.
    #[must_use]
    pub fn display() -> Self { Self::new(FrameKind::PrintOnBadge) }

    #[must_use]
    pub fn with_wait_for_response(mut self, wait: bool) -> Self {
        self.wait_for_response = wait;
        self
    }

    #[must_use]
    pub fn with_cross_board(mut self, cross_board: bool) -> Self {
        self.cross_board = cross_board;
        self
    }

    #[must_use]
    pub fn with_retry_count(mut self, attempts: u32) -> Self {
        self.retry_count = Some(attempts);
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Result of a send that did not fault.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SendOutcome {
    /// Simple acknowledgement; `true` when the badge reported success.
    Acknowledged(bool),
    /// Status byte returned by a status query.
    Status(u8),
    /// Payload returned by the badge.
    Payload(Bytes),
    /// The badge answered with an empty frame.
    NoData,
    /// Written without waiting for a response.
    Sent,
    /// Every attempt timed out or was refused locally.
    Failed,
}

impl SendOutcome {
    /// Interpret a response frame.
    #[must_use]
    pub fn from_response(frame: &Frame) -> Self {
        if frame.size == 0 {
            Self::NoData
        } else if !frame.payload.is_empty() {
            Self::Payload(frame.payload.clone())
        } else if let (true, Some(status)) = (frame.succeeded(), frame.status) {
            Self::Status(status)
        } else {
            Self::Acknowledged(frame.succeeded())
        }
    }

    /// Whether the operation took effect.
    #[must_use]
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Acknowledged(false) | Self::Failed)
    }
}

/// Outcome of a send with bookkeeping about how it was reached.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SendReport {
    pub outcome: SendOutcome,
    /// Info bits carried by the response, empty when none arrived.
    pub info: FrameInfo,
    /// Attempts made, the successful one included.
    pub attempts: u32,
}

impl SendReport {
    /// Attempts beyond the first.
    #[must_use]
    pub fn retries(&self) -> u32 { self.attempts.saturating_sub(1) }
}

/// A payload the badge popped to the base station.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Received {
    pub payload: Bytes,
    pub info: FrameInfo,
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::frame::{FAILURE, STATUS_NOT_READY, SUCCESS};

    fn sealed(frame: Frame) -> Frame { frame.sealed().expect("small frame") }

    #[rstest]
    #[case(Frame::new(FrameKind::RetrieveRxResponse, 1), SendOutcome::NoData)]
    #[case(
        Frame::new(FrameKind::RetrieveRxResponse, 1).with_payload(vec![1, 2]),
        SendOutcome::Payload(Bytes::from_static(&[1, 2]))
    )]
    #[case(
        Frame::new(FrameKind::GetStatusResponse, 1).with_is_success(SUCCESS).with_status(STATUS_NOT_READY),
        SendOutcome::Status(STATUS_NOT_READY)
    )]
    #[case(
        Frame::new(FrameKind::GetStatusResponse, 1).with_is_success(FAILURE).with_status(STATUS_NOT_READY),
        SendOutcome::Acknowledged(false)
    )]
    #[case(
        Frame::new(FrameKind::QueueTxResponse, 1).with_is_success(SUCCESS),
        SendOutcome::Acknowledged(true)
    )]
    #[case(
        Frame::new(FrameKind::QueueTxResponse, 1).with_is_success(FAILURE),
        SendOutcome::Acknowledged(false)
    )]
    fn responses_map_to_outcomes(#[case] frame: Frame, #[case] expected: SendOutcome) {
        assert_eq!(SendOutcome::from_response(&sealed(frame)), expected);
    }

    #[test]
    fn display_never_waits() {
        assert!(!SendOptions::display().wait_for_response);
        assert!(SendOptions::queue_tx().wait_for_response);
    }

    #[test]
    fn retries_exclude_the_first_attempt() {
        let report = SendReport {
            outcome: SendOutcome::Failed,
            info: FrameInfo::empty(),
            attempts: 3,
        };
        assert_eq!(report.retries(), 2);
        assert!(!report.outcome.is_success());
    }
}
