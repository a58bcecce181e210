//! Builders for the frames a badge sends.
//!
//! Responses copy the sequence and info bits of the request they answer.

use bytes::Bytes;
use station_link::{
    Frame,
    FrameInfo,
    FrameKind,
    PacketType,
    frame::SUCCESS,
};

fn sealed(frame: Frame) -> Frame {
    frame
        .sealed()
        .unwrap_or_else(|err| panic!("test frame does not fit: {err}"))
}

fn answer(request: &Frame) -> Frame {
    Frame::new(
        request.packet_type.transfer_onto(request.kind().response()),
        request.sequence,
    )
}

/// `QueueTxBufferResponse` carrying `result`.
#[must_use]
pub fn queue_tx_response(request: &Frame, result: u8) -> Frame {
    sealed(answer(request).with_is_success(result))
}

/// `GetStatusResponse` reporting success and `status`.
#[must_use]
pub fn status_response(request: &Frame, status: u8) -> Frame {
    sealed(answer(request).with_is_success(SUCCESS).with_status(status))
}

/// `RetrieveRxBufferResponse` carrying `payload`; empty means no data.
#[must_use]
pub fn retrieve_response(request: &Frame, payload: impl Into<Bytes>) -> Frame {
    sealed(answer(request).with_payload(payload))
}

/// Badge request announcing a full transmit buffer.
#[must_use]
pub fn push_tx_request(sequence: u8) -> Frame { Frame::new(FrameKind::PushTxRequest, sequence) }

/// Badge request handing a received payload to the station.
#[must_use]
pub fn pop_rx_request(sequence: u8, info: FrameInfo, payload: impl Into<Bytes>) -> Frame {
    sealed(Frame::new(PacketType::new(FrameKind::PopRxRequest, info), sequence).with_payload(payload))
}

/// Badge request reporting its status byte.
#[must_use]
pub fn send_status_request(sequence: u8, status: u8) -> Frame {
    sealed(Frame::new(FrameKind::SendStatusRequest, sequence).with_status(status))
}
