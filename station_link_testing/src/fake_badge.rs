//! A scripted badge on the far end of an in-memory transport.

use std::{io, time::Duration};

use futures::{SinkExt, StreamExt};
use station_link::{Frame, LinkConfig, StationLink, StationLinkCodec};
use tokio::{
    io::{AsyncWriteExt, DuplexStream},
    time::timeout,
};
use tokio_util::codec::Framed;

/// Capacity of each direction of the in-memory pipe.
pub const PIPE_CAPACITY: usize = 4096;

/// Link settings with short timeouts for tests.
///
/// Intended for runtimes with paused time, where the timeouts elapse as soon
/// as every task is idle.
#[must_use]
pub fn test_config() -> LinkConfig {
    LinkConfig::default()
        .with_io_timeout(Duration::from_millis(20))
        .with_wait_timeout(Duration::from_millis(100))
        .with_retry_count(3)
        .with_retry_delay(Duration::from_millis(10))
}

/// Start a link whose transport is connected to a [`FakeBadge`].
///
/// Must be called from within a Tokio runtime.
#[must_use]
pub fn link_pair(config: LinkConfig) -> (StationLink, FakeBadge) {
    let (station, badge) = tokio::io::duplex(PIPE_CAPACITY);
    (
        StationLink::from_transport(station, config),
        FakeBadge::new(badge),
    )
}

/// Badge side of the link, speaking the same framing as the station.
pub struct FakeBadge {
    framed: Framed<DuplexStream, StationLinkCodec>,
}

impl FakeBadge {
    #[must_use]
    pub fn new(io: DuplexStream) -> Self {
        Self {
            framed: Framed::new(io, StationLinkCodec::new()),
        }
    }

    /// Next well-formed frame written by the station.
    ///
    /// Malformed frames are skipped. Returns `None` once the station hangs
    /// up.
    pub async fn recv(&mut self) -> Option<Frame> {
        while let Some(item) = self.framed.next().await {
            match item {
                Ok(Ok(frame)) => return Some(frame),
                Ok(Err(_)) => {}
                Err(_) => return None,
            }
        }
        None
    }

    /// Like [`FakeBadge::recv`] but gives up after `limit`.
    pub async fn recv_within(&mut self, limit: Duration) -> Option<Frame> {
        timeout(limit, self.recv()).await.ok().flatten()
    }

    /// Write a frame preceded by the preamble.
    ///
    /// # Errors
    ///
    /// Fails if the frame is invalid or the station hung up.
    pub async fn send(&mut self, frame: Frame) -> io::Result<()> { self.framed.send(frame).await }

    /// Write raw bytes, bypassing the codec.
    ///
    /// # Errors
    ///
    /// Fails if the station hung up.
    pub async fn send_raw(&mut self, bytes: &[u8]) -> io::Result<()> {
        let io = self.framed.get_mut();
        io.write_all(bytes).await?;
        io.flush().await
    }
}
