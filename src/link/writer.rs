//! Outbound half of the link: framed writes and the acknowledgement task.

use std::io;

use bytes::BytesMut;
use tokio::{
    io::{AsyncWrite, AsyncWriteExt},
    sync::mpsc,
    time::timeout,
};

use super::Shared;
use crate::{
    codec,
    error::LinkError,
    frame::{Frame, HEADER_LEN, PREAMBLE},
    metrics::{self, Direction},
};

/// Write half of the transport.
pub(crate) type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Write all of `wire`, resubmitting whatever a partial write left over.
///
/// A write that accepts nothing means the transport stopped taking bytes
/// and is reported as [`LinkError::IncompleteWrite`].
async fn write_fully<W>(writer: &mut W, wire: &[u8]) -> Result<(), LinkError>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut written = 0;
    while written < wire.len() {
        match writer.write(&wire[written..]).await? {
            0 => {
                return Err(LinkError::IncompleteWrite {
                    expected: wire.len(),
                    written,
                });
            }
            n => written += n,
        }
    }
    writer.flush().await?;
    Ok(())
}

impl Shared {
    /// Write `frame` preceded by the preamble.
    ///
    /// Transport failures are recorded as the link's fault before being
    /// returned.
    pub(crate) async fn write_frame(&self, frame: &Frame) -> Result<(), LinkError> {
        self.check_open()?;
        let mut wire =
            BytesMut::with_capacity(PREAMBLE.len() + HEADER_LEN + usize::from(frame.size));
        codec::encode_wire(frame, &mut wire)?;
        let wire = wire.freeze();
        if let Some(echo) = &self.echo {
            echo.remember(wire.slice(PREAMBLE.len()..));
        }

        let result = {
            let _guard = self.locks.write().await;
            let mut writer = self.writer.lock().await;
            timeout(self.config.io_timeout, write_fully(&mut **writer, &wire)).await
        };
        let result = result.unwrap_or_else(|_| {
            Err(LinkError::from(io::Error::new(
                io::ErrorKind::TimedOut,
                "write timed out",
            )))
        });

        match result {
            Ok(()) => {
                tracing::debug!(
                    packet_type = %frame.packet_type,
                    sequence = frame.sequence,
                    size = frame.size,
                    "frame written"
                );
                metrics::inc_frames(Direction::Outbound, frame.kind().name());
                Ok(())
            }
            Err(err) => {
                self.record_fault(&err);
                Err(err)
            }
        }
    }
}

/// Drain queued acknowledgements onto the wire until shutdown.
pub(crate) async fn run_ack_writer(shared: std::sync::Arc<Shared>, mut acks: mpsc::Receiver<Frame>) {
    loop {
        let ack = tokio::select! {
            biased;
            () = shared.shutdown.cancelled() => break,
            ack = acks.recv() => match ack {
                Some(ack) => ack,
                None => break,
            },
        };
        if let Err(err) = shared.write_frame(&ack).await {
            tracing::debug!(error = %err, "acknowledgement writer stopping");
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        pin::Pin,
        task::{Context, Poll},
    };

    use tokio::io::{AsyncRead, DuplexStream, ReadBuf};

    use super::*;
    use crate::{
        frame::FrameKind,
        link::{LinkConfig, SendOptions, StationLink},
    };

    /// Transport that takes at most `chunk` bytes per write and stops
    /// accepting anything once `budget` bytes have gone through.
    struct Throttled {
        inner: DuplexStream,
        chunk: usize,
        budget: usize,
    }

    impl Throttled {
        fn new(chunk: usize, budget: usize) -> (Self, DuplexStream) {
            let (inner, peer) = tokio::io::duplex(1024);
            (
                Self {
                    inner,
                    chunk,
                    budget,
                },
                peer,
            )
        }
    }

    impl AsyncRead for Throttled {
        fn poll_read(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            Pin::new(&mut self.inner).poll_read(cx, buf)
        }
    }

    impl AsyncWrite for Throttled {
        fn poll_write(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            let take = buf.len().min(self.chunk).min(self.budget);
            if take == 0 {
                return Poll::Ready(Ok(0));
            }
            let this = &mut *self;
            match Pin::new(&mut this.inner).poll_write(cx, &buf[..take]) {
                Poll::Ready(Ok(n)) => {
                    this.budget -= n;
                    Poll::Ready(Ok(n))
                }
                other => other,
            }
        }

        fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Pin::new(&mut self.inner).poll_flush(cx)
        }

        fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Pin::new(&mut self.inner).poll_shutdown(cx)
        }
    }

    fn shared_over(writer: Throttled) -> Shared {
        let (_tx, rx) = mpsc::channel(1);
        Shared::new(LinkConfig::default(), Box::new(writer), rx)
    }

    fn status_request() -> Frame {
        Frame::new(FrameKind::GetStatusRequest, 1)
            .sealed()
            .expect("small frame")
    }

    #[tokio::test]
    async fn partial_writes_are_resubmitted() {
        let (writer, _peer) = Throttled::new(3, usize::MAX);
        let shared = shared_over(writer);
        shared
            .write_frame(&status_request())
            .await
            .expect("every chunk accepted");
        assert!(shared.fault().is_none());
    }

    #[tokio::test]
    async fn stalled_transport_reports_incomplete_write() {
        let (writer, _peer) = Throttled::new(4, 6);
        let shared = shared_over(writer);

        let err = shared
            .write_frame(&status_request())
            .await
            .expect_err("transport stops after six bytes");
        assert!(matches!(
            err,
            LinkError::IncompleteWrite {
                expected,
                written: 6,
            } if expected == PREAMBLE.len() + HEADER_LEN
        ));
        assert!(err.is_transport_fault());
        assert!(matches!(
            shared.fault(),
            Some(LinkError::IncompleteWrite { .. })
        ));
        assert!(shared.shutdown.is_cancelled());

        let again = shared.write_frame(&status_request()).await;
        assert!(matches!(again, Err(LinkError::IncompleteWrite { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn short_write_fails_the_caller_and_later_sends() {
        let (transport, _peer) = Throttled::new(4, 6);
        let link = StationLink::from_transport(transport, LinkConfig::default());

        let first = link.send(vec![1], SendOptions::queue_tx()).await;
        assert!(matches!(first, Err(LinkError::IncompleteWrite { .. })));
        assert!(link.is_closed());

        let later = link.send(Vec::new(), SendOptions::get_status()).await;
        assert!(matches!(later, Err(LinkError::IncompleteWrite { .. })));
    }
}
