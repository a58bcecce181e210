//! The background read loop.
//!
//! The loop owns the read half of the transport. Each decoded frame passes
//! the echo and duplicate windows, updates the badge status and is then
//! routed: responses to their waiting caller, badge requests to the
//! acknowledgement queue, popped payloads to the delivery queue.

use std::{collections::VecDeque, sync::Arc};

use futures::StreamExt;
use tokio::{
    io::AsyncRead,
    sync::mpsc::{self, error::TrySendError},
    time::timeout,
};
use tokio_util::codec::{Decoder, FramedRead};

use super::{Received, Shared};
use crate::{
    codec::{self, FrameError, StationLinkCodec},
    error::LinkError,
    frame::{Frame, FrameKind},
    metrics::{self, Direction},
};

/// Reset the decoder and decode whatever is already buffered into `backlog`.
///
/// `FramedRead` only decodes again after fresh bytes arrive, so frames
/// queued behind an abandoned one are drained here.
fn rescan<R>(
    frames: &mut FramedRead<R, StationLinkCodec>,
    backlog: &mut VecDeque<Result<Frame, FrameError>>,
) -> Result<(), LinkError> {
    let mut buffered = std::mem::take(frames.read_buffer_mut());
    let decoder = frames.decoder_mut();
    decoder.reset();
    while let Some(item) = decoder.decode(&mut buffered)? {
        backlog.push_back(item);
    }
    *frames.read_buffer_mut() = buffered;
    Ok(())
}

/// What one read window produced.
enum ReadEvent {
    Frame(Frame),
    Malformed(FrameError),
    Idle,
}

impl From<Result<Frame, FrameError>> for ReadEvent {
    fn from(item: Result<Frame, FrameError>) -> Self {
        match item {
            Ok(frame) => Self::Frame(frame),
            Err(err) => Self::Malformed(err),
        }
    }
}

pub(crate) struct Reader<R> {
    shared: Arc<Shared>,
    frames: FramedRead<R, StationLinkCodec>,
    /// Items recovered by rescanning the buffer after a torn frame.
    backlog: VecDeque<Result<Frame, FrameError>>,
    acks: mpsc::Sender<Frame>,
    deliveries: mpsc::Sender<Received>,
}

impl<R> Reader<R>
where
    R: AsyncRead + Unpin,
{
    pub(crate) fn new(
        shared: Arc<Shared>,
        io: R,
        acks: mpsc::Sender<Frame>,
        deliveries: mpsc::Sender<Received>,
    ) -> Self {
        Self {
            shared,
            frames: FramedRead::new(io, StationLinkCodec::new()),
            backlog: VecDeque::new(),
            acks,
            deliveries,
        }
    }

    /// Read and dispatch frames until shutdown or a transport fault.
    pub(crate) async fn run(mut self) {
        let shutdown = self.shared.shutdown.clone();
        loop {
            let event = tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                event = self.next_event() => event,
            };
            match event {
                Ok(ReadEvent::Frame(frame)) => self.dispatch(frame),
                Ok(ReadEvent::Malformed(err)) => {
                    tracing::warn!(
                        error = %err,
                        error_type = err.error_type(),
                        "malformed frame discarded"
                    );
                    metrics::inc_malformed(err.error_type());
                }
                Ok(ReadEvent::Idle) => {}
                Err(err) => {
                    self.shared.record_fault(&err);
                    break;
                }
            }
        }
        tracing::debug!("read loop stopped");
    }

    /// Hold the read lock for one read window.
    ///
    /// A window that ends with a frame half received is extended once; a
    /// frame still incomplete after that is abandoned and its bytes are
    /// rescanned for a preamble.
    async fn next_event(&mut self) -> Result<ReadEvent, LinkError> {
        if let Some(item) = self.backlog.pop_front() {
            return Ok(item.into());
        }
        let _guard = self.shared.locks.read().await;
        let window = self.shared.config.io_timeout;
        let mut extended = false;
        loop {
            match timeout(window, self.frames.next()).await {
                Ok(Some(Ok(Ok(frame)))) => return Ok(ReadEvent::Frame(frame)),
                Ok(Some(Ok(Err(err)))) => return Ok(ReadEvent::Malformed(err)),
                Ok(Some(Err(err))) => return Err(LinkError::from(err)),
                Ok(None) => return Err(LinkError::Closed),
                Err(_) if self.frames.decoder().in_frame() && !extended => extended = true,
                Err(_) => {
                    if self.frames.decoder().in_frame() {
                        tracing::debug!("abandoning frame torn across read windows");
                        rescan(&mut self.frames, &mut self.backlog)?;
                        if let Some(item) = self.backlog.pop_front() {
                            return Ok(item.into());
                        }
                    }
                    return Ok(ReadEvent::Idle);
                }
            }
        }
    }

    fn dispatch(&self, frame: Frame) {
        let kind = frame.kind();
        tracing::debug!(
            packet_type = %frame.packet_type,
            sequence = frame.sequence,
            size = frame.size,
            "frame received"
        );
        metrics::inc_frames(Direction::Inbound, kind.name());

        let raw = match codec::to_bytes(&frame) {
            Ok(raw) => raw,
            Err(err) => {
                tracing::warn!(error = %err, "decoded frame failed to re-encode");
                return;
            }
        };
        if self.shared.echo.as_ref().is_some_and(|echo| echo.take(&raw)) {
            tracing::debug!(%kind, "echo of an outbound frame ignored");
            metrics::inc_duplicates("echo");
            return;
        }
        if !self.shared.inbound.try_admit(&raw) {
            tracing::debug!(%kind, sequence = frame.sequence, "duplicate frame suppressed");
            metrics::inc_duplicates("inbound");
            // The badge retransmits when our acknowledgement was lost.
            if kind.is_badge_request() {
                self.acknowledge(&frame);
            }
            return;
        }
        self.shared.badge.observe(&frame);

        match kind {
            _ if kind.is_response() => {
                self.shared.correlator.fulfill(frame);
            }
            FrameKind::PopRxRequest => {
                self.acknowledge(&frame);
                self.deliver(frame);
            }
            _ if kind.is_badge_request() => self.acknowledge(&frame),
            _ => tracing::debug!(%kind, "unsolicited frame ignored"),
        }
    }

    fn acknowledge(&self, request: &Frame) {
        match self.acks.try_send(request.acknowledgement()) {
            Ok(()) => {}
            Err(TrySendError::Full(ack)) => tracing::warn!(
                packet_type = %ack.packet_type,
                sequence = ack.sequence,
                "acknowledgement queue full; dropping acknowledgement"
            ),
            Err(TrySendError::Closed(_)) => {
                tracing::debug!("acknowledgement writer gone; acknowledgement dropped");
            }
        }
    }

    fn deliver(&self, frame: Frame) {
        let received = Received {
            info: frame.info(),
            payload: frame.payload,
        };
        match self.deliveries.try_send(received) {
            Ok(()) => {}
            Err(TrySendError::Full(received)) => tracing::warn!(
                len = received.payload.len(),
                "delivery queue full; dropping popped payload"
            ),
            Err(TrySendError::Closed(_)) => tracing::debug!("delivery queue closed"),
        }
    }
}
