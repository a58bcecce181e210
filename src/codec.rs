//! Byte framing for the station link.
//!
//! The pure functions in this module translate between a [`Frame`] and the
//! bytes that follow the preamble: [`encode`] and [`to_bytes`] on the way out,
//! [`decode_header`] and [`decode_optional`] on the way in. [`size_of`] and
//! [`validate`] enforce the size invariant in both directions.
//!
//! [`StationLinkCodec`] is the transport-facing adapter. It prepends the
//! preamble when encoding and scans for it when decoding, so a reader
//! recovers on its own after line noise or a torn frame.
//!
//! # Error Handling
//!
//! A malformed frame is never fatal to the stream. The decoder yields it as
//! an `Err(FrameError)` item and returns to scanning for the next preamble;
//! only I/O failures surface through the decoder's error channel.

use std::io;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::frame::{Frame, HEADER_LEN, OptionalField, PREAMBLE, PacketType};

pub mod error;

pub use error::FrameError;

/// Byte length of the optional fields populated on `frame`.
fn optional_len(frame: &Frame) -> usize {
    usize::from(frame.is_success.is_some())
        + usize::from(frame.status.is_some())
        + frame.payload.len()
}

/// Sum of the byte lengths of every populated optional field.
///
/// # Errors
///
/// Returns [`FrameError::Oversized`] if the fields do not fit the one-byte
/// size field.
pub fn size_of(frame: &Frame) -> Result<u8, FrameError> {
    let size = optional_len(frame);
    u8::try_from(size).map_err(|_| FrameError::Oversized { size })
}

/// Check a frame against its kind's layout and its declared size.
///
/// A frame is valid when every populated field is declared by its kind, no
/// fixed-width field is skipped ahead of a populated one, and `size` equals
/// the byte length of the populated fields.
///
/// # Errors
///
/// Returns the first violation found.
pub fn validate(frame: &Frame) -> Result<(), FrameError> {
    let kind = frame.kind();
    for field in [
        OptionalField::IsSuccess,
        OptionalField::Status,
        OptionalField::Payload,
    ] {
        if frame.has_field(field) && !kind.declares(field) {
            return Err(FrameError::FieldNotDeclared { kind, field });
        }
    }

    let mut gap = None;
    for &field in kind.layout() {
        if frame.has_field(field) {
            if let Some(missing) = gap {
                return Err(FrameError::MissingField {
                    kind,
                    field: missing,
                });
            }
        } else if field.width().is_some() && gap.is_none() {
            gap = Some(field);
        }
    }

    let actual = optional_len(frame);
    if actual != usize::from(frame.size) {
        return Err(FrameError::SizeMismatch {
            declared: frame.size,
            actual,
        });
    }
    Ok(())
}

/// Append the frame's header and optional fields to `dst`.
///
/// The preamble is not written; that belongs to the transport boundary.
///
/// # Errors
///
/// Returns a [`FrameError`] if the frame fails [`validate`]. Nothing is
/// written in that case.
pub fn encode(frame: &Frame, dst: &mut BytesMut) -> Result<(), FrameError> {
    validate(frame)?;
    dst.reserve(HEADER_LEN + usize::from(frame.size));
    dst.put_u8(frame.packet_type.as_byte());
    dst.put_u8(frame.sequence);
    dst.put_u8(frame.size);
    if let Some(value) = frame.is_success {
        dst.put_u8(value);
    }
    if let Some(value) = frame.status {
        dst.put_u8(value);
    }
    dst.extend_from_slice(&frame.payload);
    Ok(())
}

/// Encode a frame into a fresh buffer.
///
/// # Errors
///
/// See [`encode`].
pub fn to_bytes(frame: &Frame) -> Result<Bytes, FrameError> {
    let mut buf = BytesMut::with_capacity(HEADER_LEN + frame.payload.len() + 2);
    encode(frame, &mut buf)?;
    Ok(buf.freeze())
}

/// Encode a frame preceded by the preamble, as written to the transport.
///
/// # Errors
///
/// See [`encode`].
pub fn encode_wire(frame: &Frame, dst: &mut BytesMut) -> Result<(), FrameError> {
    validate(frame)?;
    dst.extend_from_slice(&PREAMBLE);
    encode(frame, dst)
}

/// The three mandatory bytes of a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameHeader {
    pub packet_type: PacketType,
    pub sequence: u8,
    pub size: u8,
}

/// Parse the mandatory type, sequence and size bytes.
///
/// # Errors
///
/// Returns [`FrameError::Truncated`] unless exactly [`HEADER_LEN`] bytes are
/// supplied, and [`FrameError::UnknownType`] for an unrecognised type byte.
pub fn decode_header(bytes: &[u8]) -> Result<FrameHeader, FrameError> {
    let &[type_byte, sequence, size] = bytes else {
        return Err(FrameError::Truncated {
            have: bytes.len(),
            need: HEADER_LEN,
        });
    };
    Ok(FrameHeader {
        packet_type: PacketType::try_from(type_byte)?,
        sequence,
        size,
    })
}

/// Read the optional fields that follow `header`.
///
/// `body` must hold exactly `header.size` bytes. Fixed-width fields are read
/// in the kind's canonical order; the bytes that remain become the payload
/// when the kind declares one. Left-over bytes on a kind without a payload
/// make the frame invalid.
///
/// # Errors
///
/// Returns [`FrameError::Truncated`] if `body` is shorter than declared and
/// any error from [`validate`] for the assembled frame.
pub fn decode_optional(header: FrameHeader, mut body: Bytes) -> Result<Frame, FrameError> {
    let need = usize::from(header.size);
    if body.len() < need {
        return Err(FrameError::Truncated {
            have: body.len(),
            need,
        });
    }
    body.truncate(need);

    let mut frame = Frame::new(header.packet_type, header.sequence);
    frame.size = header.size;
    for &field in header.packet_type.kind().layout() {
        match field {
            OptionalField::IsSuccess if body.has_remaining() => {
                frame.is_success = Some(body.get_u8());
            }
            OptionalField::Status if body.has_remaining() => frame.status = Some(body.get_u8()),
            OptionalField::Payload => frame.payload = body.split_off(0),
            _ => {}
        }
    }
    if !body.is_empty() {
        return Err(FrameError::SizeMismatch {
            declared: header.size,
            actual: usize::from(header.size) - body.len(),
        });
    }
    validate(&frame)?;
    Ok(frame)
}

/// Length of the longest suffix of `buf` that could begin a preamble.
fn partial_preamble_len(buf: &[u8]) -> usize {
    let longest = buf.len().min(PREAMBLE.len() - 1);
    (1..=longest)
        .rev()
        .find(|&n| PREAMBLE.starts_with(&buf[buf.len() - n..]))
        .unwrap_or(0)
}

/// Consume bytes up to and including the next preamble.
///
/// Returns `false` when no complete preamble is buffered; bytes that might
/// still grow into one are kept.
fn seek_preamble(src: &mut BytesMut) -> bool {
    if let Some(start) = src
        .windows(PREAMBLE.len())
        .position(|window| window == PREAMBLE.as_slice())
    {
        if start > 0 {
            tracing::trace!(discarded = start, "skipped noise ahead of preamble");
        }
        src.advance(start + PREAMBLE.len());
        return true;
    }
    let discard = src.len() - partial_preamble_len(src);
    if discard > 0 {
        tracing::trace!(discarded = discard, "no preamble in buffered bytes");
        src.advance(discard);
    }
    false
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum DecodeState {
    #[default]
    Seeking,
    Header,
    Body(FrameHeader),
}

/// Preamble-delimited codec for the station link.
///
/// Decoding yields `Result<Frame, FrameError>` items so that a malformed
/// frame is reported without terminating a `FramedRead`.
#[derive(Clone, Debug, Default)]
pub struct StationLinkCodec {
    state: DecodeState,
}

impl StationLinkCodec {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Whether a preamble has been consumed but its frame is not complete.
    #[must_use]
    pub fn in_frame(&self) -> bool { self.state != DecodeState::Seeking }

    /// Drop any partially decoded frame and resume scanning.
    ///
    /// Bytes still buffered after the abandoned preamble, including its
    /// header, are searched for the next preamble on the following decode.
    pub fn reset(&mut self) { self.state = DecodeState::Seeking; }
}

impl Decoder for StationLinkCodec {
    type Item = Result<Frame, FrameError>;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            match self.state {
                DecodeState::Seeking => {
                    if !seek_preamble(src) {
                        return Ok(None);
                    }
                    self.state = DecodeState::Header;
                }
                DecodeState::Header => {
                    if src.len() < HEADER_LEN {
                        src.reserve(HEADER_LEN - src.len());
                        return Ok(None);
                    }
                    match decode_header(&src[..HEADER_LEN]) {
                        Ok(header) => self.state = DecodeState::Body(header),
                        Err(err) => {
                            src.advance(HEADER_LEN);
                            self.state = DecodeState::Seeking;
                            return Ok(Some(Err(err)));
                        }
                    }
                }
                // The header stays buffered until the body is complete so a
                // reset can rescan it.
                DecodeState::Body(header) => {
                    let need = HEADER_LEN + usize::from(header.size);
                    if src.len() < need {
                        src.reserve(need - src.len());
                        return Ok(None);
                    }
                    src.advance(HEADER_LEN);
                    let body = src.split_to(usize::from(header.size)).freeze();
                    self.state = DecodeState::Seeking;
                    return Ok(Some(decode_optional(header, body)));
                }
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(item) = self.decode(src)? {
            return Ok(Some(item));
        }
        if self.in_frame() || !src.is_empty() {
            tracing::debug!(
                buffered = src.len(),
                in_frame = self.in_frame(),
                "discarding incomplete frame at end of stream"
            );
        }
        src.clear();
        self.reset();
        Ok(None)
    }
}

impl Encoder<Frame> for StationLinkCodec {
    type Error = io::Error;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        encode_wire(&item, dst).map_err(io::Error::from)
    }
}
