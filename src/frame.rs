//! Logical frames exchanged with the badge.
//!
//! A frame is everything between two preambles: a type byte, a sequence
//! number, a declared size and whichever optional fields the frame's kind
//! declares. The preamble itself belongs to the transport and is added or
//! stripped by [`crate::codec::StationLinkCodec`].

mod info;
mod kind;

use bytes::Bytes;
pub use info::{FrameInfo, PacketType, add_info, has_info, remove_info, transfer_info};
pub use kind::{FrameKind, OptionalField};

/// Fixed byte sequence preceding every frame on the wire.
pub const PREAMBLE: [u8; 8] = [0x55, 0x55, 0x55, 0x55, 0x55, 0x55, 0x55, 0xD5];

/// Length of the mandatory header: type, sequence and size.
pub const HEADER_LEN: usize = 3;

/// `IsSuccess` value reporting success.
pub const SUCCESS: u8 = 0x02;

/// `IsSuccess` value reporting failure.
pub const FAILURE: u8 = 0x01;

/// Badge status byte: every receive buffer is populated.
pub const STATUS_NOT_READY: u8 = 0x01;

/// Badge status byte: empty receive buffers exist.
pub const STATUS_READY: u8 = 0x02;

/// Sequence number carried by frames that expect no response.
pub const UNSEQUENCED: u8 = 0x00;

/// A decoded or outgoing frame.
///
/// `size` is the declared size; it is only trusted once
/// [`crate::codec::validate`] has checked it against the populated optional
/// fields. An empty `payload` is the same as an absent one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub packet_type: PacketType,
    pub sequence: u8,
    pub size: u8,
    pub is_success: Option<u8>,
    pub status: Option<u8>,
    pub payload: Bytes,
}

impl Frame {
    /// Create a frame with no optional fields.
    #[must_use]
    pub fn new(packet_type: impl Into<PacketType>, sequence: u8) -> Self {
        Self {
            packet_type: packet_type.into(),
            sequence,
            size: 0,
            is_success: None,
            status: None,
            payload: Bytes::new(),
        }
    }

    /// Base kind of the frame.
    #[must_use]
    pub fn kind(&self) -> FrameKind { self.packet_type.kind() }

    /// Info bits of the frame.
    #[must_use]
    pub fn info(&self) -> FrameInfo { self.packet_type.info() }

    #[must_use]
    pub fn with_is_success(mut self, value: u8) -> Self {
        self.is_success = Some(value);
        self
    }

    #[must_use]
    pub fn with_status(mut self, value: u8) -> Self {
        self.status = Some(value);
        self
    }

    #[must_use]
    pub fn with_payload(mut self, payload: impl Into<Bytes>) -> Self {
        self.payload = payload.into();
        self
    }

    /// Set the declared size to the size of the populated optional fields.
    ///
    /// # Errors
    ///
    /// Returns [`crate::codec::FrameError::Oversized`] if the optional fields
    /// do not fit the one-byte size field.
    pub fn sealed(mut self) -> Result<Self, crate::codec::FrameError> {
        self.size = crate::codec::size_of(&self)?;
        Ok(self)
    }

    /// Whether `field` is populated.
    #[must_use]
    pub fn has_field(&self, field: OptionalField) -> bool {
        match field {
            OptionalField::IsSuccess => self.is_success.is_some(),
            OptionalField::Status => self.status.is_some(),
            OptionalField::Payload => !self.payload.is_empty(),
        }
    }

    /// Whether the frame reports success.
    #[must_use]
    pub fn succeeded(&self) -> bool { self.is_success == Some(SUCCESS) }

    /// Protocol-level acknowledgement of this frame.
    ///
    /// The acknowledgement answers with the response kind, echoes the
    /// sequence number and keeps the info bits of the request. A popped
    /// receive buffer is acknowledged with an explicit success byte.
    #[must_use]
    pub fn acknowledgement(&self) -> Self {
        let kind = self.kind().response();
        let mut ack = Self::new(self.packet_type.transfer_onto(kind), self.sequence);
        if kind == FrameKind::PopRxResponse {
            ack.is_success = Some(SUCCESS);
            ack.size = 1;
        }
        ack
    }
}
