//! Frame kinds and their request/response pairing.

use std::fmt;

/// Optional field carried after the mandatory header.
///
/// Variants are listed in canonical wire order: a frame that declares more
/// than one optional field always carries them in this order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OptionalField {
    /// One byte, [`crate::frame::SUCCESS`] or [`crate::frame::FAILURE`].
    IsSuccess,
    /// One byte describing the badge's receive buffers.
    Status,
    /// Every remaining byte of the declared size.
    Payload,
}

impl OptionalField {
    /// Fixed width of the field in bytes, or `None` for the variable-length
    /// payload.
    #[must_use]
    pub const fn width(self) -> Option<usize> {
        match self {
            Self::IsSuccess | Self::Status => Some(1),
            Self::Payload => None,
        }
    }
}

/// Semantic role of a frame, independent of any info bits.
///
/// Requests sent by the base station have values `0x01..=0x03`, requests
/// raised by the badge `0x04..=0x06`. Responses set the high bit. The display
/// kind `0x07` is fire-and-forget.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FrameKind {
    QueueTxRequest,
    QueueTxResponse,
    RetrieveRxRequest,
    RetrieveRxResponse,
    GetStatusRequest,
    GetStatusResponse,
    PushTxRequest,
    PushTxResponse,
    PopRxRequest,
    PopRxResponse,
    SendStatusRequest,
    SendStatusResponse,
    PrintOnBadge,
}

const LAYOUT_NONE: &[OptionalField] = &[];
const LAYOUT_PAYLOAD: &[OptionalField] = &[OptionalField::Payload];
const LAYOUT_RESULT: &[OptionalField] = &[OptionalField::IsSuccess];
const LAYOUT_STATUS: &[OptionalField] = &[OptionalField::Status];
const LAYOUT_RESULT_STATUS: &[OptionalField] = &[OptionalField::IsSuccess, OptionalField::Status];

impl FrameKind {
    /// Every kind understood by the link.
    pub const ALL: [Self; 13] = [
        Self::QueueTxRequest,
        Self::QueueTxResponse,
        Self::RetrieveRxRequest,
        Self::RetrieveRxResponse,
        Self::GetStatusRequest,
        Self::GetStatusResponse,
        Self::PushTxRequest,
        Self::PushTxResponse,
        Self::PopRxRequest,
        Self::PopRxResponse,
        Self::SendStatusRequest,
        Self::SendStatusResponse,
        Self::PrintOnBadge,
    ];

    /// Base type byte of this kind with no info bits set.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        match self {
            Self::QueueTxRequest => 0x01,
            Self::QueueTxResponse => 0x81,
            Self::RetrieveRxRequest => 0x02,
            Self::RetrieveRxResponse => 0x82,
            Self::GetStatusRequest => 0x03,
            Self::GetStatusResponse => 0x83,
            Self::PushTxRequest => 0x04,
            Self::PushTxResponse => 0x84,
            Self::PopRxRequest => 0x05,
            Self::PopRxResponse => 0x85,
            Self::SendStatusRequest => 0x06,
            Self::SendStatusResponse => 0x86,
            Self::PrintOnBadge => 0x07,
        }
    }

    /// Look up the kind for a base type byte (info bits already removed).
    #[must_use]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        Some(match byte {
            0x01 => Self::QueueTxRequest,
            0x81 => Self::QueueTxResponse,
            0x02 => Self::RetrieveRxRequest,
            0x82 => Self::RetrieveRxResponse,
            0x03 => Self::GetStatusRequest,
            0x83 => Self::GetStatusResponse,
            0x04 => Self::PushTxRequest,
            0x84 => Self::PushTxResponse,
            0x05 => Self::PopRxRequest,
            0x85 => Self::PopRxResponse,
            0x06 => Self::SendStatusRequest,
            0x86 => Self::SendStatusResponse,
            0x07 => Self::PrintOnBadge,
            _ => return None,
        })
    }

    /// The kind that answers this one.
    ///
    /// Response kinds and [`FrameKind::PrintOnBadge`] map to themselves, so
    /// `k.response().response() == k.response()` holds for every kind.
    #[must_use]
    pub const fn response(self) -> Self {
        match self {
            Self::QueueTxRequest | Self::QueueTxResponse => Self::QueueTxResponse,
            Self::RetrieveRxRequest | Self::RetrieveRxResponse => Self::RetrieveRxResponse,
            Self::GetStatusRequest | Self::GetStatusResponse => Self::GetStatusResponse,
            Self::PushTxRequest | Self::PushTxResponse => Self::PushTxResponse,
            Self::PopRxRequest | Self::PopRxResponse => Self::PopRxResponse,
            Self::SendStatusRequest | Self::SendStatusResponse => Self::SendStatusResponse,
            Self::PrintOnBadge => Self::PrintOnBadge,
        }
    }

    /// Whether this kind answers a request.
    #[must_use]
    pub const fn is_response(self) -> bool { self.as_byte() & 0x80 != 0 }

    /// Whether a frame of this kind is answered by the peer.
    #[must_use]
    pub const fn expects_response(self) -> bool {
        !self.is_response() && !matches!(self, Self::PrintOnBadge)
    }

    /// Whether the base station may originate this kind.
    #[must_use]
    pub const fn is_station_request(self) -> bool {
        matches!(
            self,
            Self::QueueTxRequest
                | Self::RetrieveRxRequest
                | Self::GetStatusRequest
                | Self::PrintOnBadge
        )
    }

    /// Whether the badge originates this kind and expects an acknowledgement.
    #[must_use]
    pub const fn is_badge_request(self) -> bool {
        matches!(
            self,
            Self::PushTxRequest | Self::PopRxRequest | Self::SendStatusRequest
        )
    }

    /// Optional fields carried by this kind, in wire order.
    #[must_use]
    pub const fn layout(self) -> &'static [OptionalField] {
        match self {
            Self::QueueTxRequest
            | Self::RetrieveRxResponse
            | Self::PushTxResponse
            | Self::PopRxRequest
            | Self::PrintOnBadge => LAYOUT_PAYLOAD,
            Self::QueueTxResponse | Self::PopRxResponse => LAYOUT_RESULT,
            Self::GetStatusResponse => LAYOUT_RESULT_STATUS,
            Self::SendStatusRequest => LAYOUT_STATUS,
            Self::RetrieveRxRequest
            | Self::GetStatusRequest
            | Self::PushTxRequest
            | Self::SendStatusResponse => LAYOUT_NONE,
        }
    }

    /// Whether this kind declares `field`.
    #[must_use]
    pub fn declares(self, field: OptionalField) -> bool { self.layout().contains(&field) }

    /// Protocol name of the kind.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::QueueTxRequest => "QueueTxBufferRequest",
            Self::QueueTxResponse => "QueueTxBufferResponse",
            Self::RetrieveRxRequest => "RetrieveRxBufferRequest",
            Self::RetrieveRxResponse => "RetrieveRxBufferResponse",
            Self::GetStatusRequest => "GetStatusRequest",
            Self::GetStatusResponse => "GetStatusResponse",
            Self::PushTxRequest => "PushTxBufferRequest",
            Self::PushTxResponse => "PushTxBufferResponse",
            Self::PopRxRequest => "PopRxBufferRequest",
            Self::PopRxResponse => "PopRxBufferResponse",
            Self::SendStatusRequest => "SendStatusRequest",
            Self::SendStatusResponse => "SendStatusResponse",
            Self::PrintOnBadge => "PrintOnBadgeRequest",
        }
    }
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.name()) }
}
