//! The station link engine and its public API.
//!
//! A [`StationLink`] owns one transport to the badge. Two background tasks
//! run for its lifetime: the read loop, which decodes and routes every
//! inbound frame, and the acknowledgement writer, which answers badge
//! requests from a bounded queue. Any number of tasks may call
//! [`StationLink::send`] and [`StationLink::receive`] concurrently; each
//! response reaches exactly the caller whose `(kind, sequence)` it carries.
//!
//! ```no_run
//! use station_link::link::{LinkConfig, SendOptions, SerialSettings, StationLink};
//!
//! # async fn demo() -> station_link::Result<()> {
//! let link = StationLink::open(&SerialSettings::new("/dev/ttyUSB0"), LinkConfig::default())?;
//! let report = link.send(vec![0x01, 0x02, 0x03], SendOptions::queue_tx()).await?;
//! println!("{:?} after {} retries", report.outcome, report.retries());
//! link.close().await;
//! # Ok(())
//! # }
//! ```

mod config;
mod locks;
mod outcome;
mod reader;
mod writer;

use std::{
    io,
    sync::{Arc, Mutex as StdMutex, PoisonError},
    time::Duration,
};

use bytes::Bytes;
pub use config::{DuplexMode, LinkConfig, SerialSettings};
use locks::LinkLocks;
use log::info;
pub use outcome::{Received, SendOptions, SendOutcome, SendReport};
use reader::Reader;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    sync::{Mutex, mpsc},
    time::{sleep, timeout},
};
use tokio_serial::SerialPortBuilderExt;
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use writer::BoxedWriter;

use crate::{
    badge::{BadgeStatus, BadgeTracker},
    correlation::Correlator,
    dedup::DedupWindow,
    error::{LinkError, Result},
    frame::{Frame, FrameInfo, FrameKind, PacketType, UNSEQUENCED},
    metrics,
};

/// State shared by the public handle and the background tasks.
pub(crate) struct Shared {
    config: LinkConfig,
    correlator: Arc<Correlator>,
    badge: BadgeTracker,
    inbound: DedupWindow,
    echo: Option<DedupWindow>,
    locks: LinkLocks,
    writer: Mutex<BoxedWriter>,
    deliveries: Mutex<mpsc::Receiver<Received>>,
    fault: StdMutex<Option<LinkError>>,
    shutdown: CancellationToken,
}

impl Shared {
    fn new(config: LinkConfig, writer: BoxedWriter, deliveries: mpsc::Receiver<Received>) -> Self {
        Self {
            correlator: Arc::new(Correlator::new()),
            badge: BadgeTracker::new(),
            inbound: DedupWindow::new(config.dedup_capacity, config.dedup_ttl),
            echo: config
                .suppress_echo
                .then(|| DedupWindow::new(config.dedup_capacity, config.dedup_ttl)),
            locks: LinkLocks::new(config.duplex),
            writer: Mutex::new(writer),
            deliveries: Mutex::new(deliveries),
            fault: StdMutex::new(None),
            shutdown: CancellationToken::new(),
            config,
        }
    }

    fn fault(&self) -> Option<LinkError> {
        self.fault
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The recorded fault, or [`LinkError::Closed`] when none was recorded.
    fn fault_or_closed(&self) -> LinkError { self.fault().unwrap_or(LinkError::Closed) }

    fn check_open(&self) -> Result<()> {
        if let Some(fault) = self.fault() {
            return Err(fault);
        }
        if self.shutdown.is_cancelled() {
            return Err(LinkError::Closed);
        }
        Ok(())
    }

    /// Remember the first transport fault and stop the link.
    ///
    /// Errors that do not poison the transport are ignored.
    fn record_fault(&self, err: &LinkError) {
        if !err.is_transport_fault() {
            return;
        }
        {
            let mut fault = self.fault.lock().unwrap_or_else(PoisonError::into_inner);
            if fault.is_none() {
                tracing::warn!(error = %err, "station link fault");
                metrics::inc_faults();
                *fault = Some(err.clone());
            }
        }
        self.stop();
    }

    /// Cancel the background tasks and wake every waiting caller.
    fn stop(&self) {
        self.shutdown.cancel();
        self.correlator.abandon_all();
    }
}

/// Handle to a running station link.
///
/// Dropping the handle stops the background tasks without waiting for them.
pub struct StationLink {
    shared: Arc<Shared>,
    tasks: TaskTracker,
}

impl StationLink {
    /// Open the serial port described by `serial` and start the link.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::Io`] if the port cannot be opened.
    pub fn open(serial: &SerialSettings, config: LinkConfig) -> Result<Self> {
        let port = tokio_serial::new(&serial.port, serial.baud_rate)
            .timeout(config.io_timeout)
            .open_native_async()
            .map_err(io::Error::from)?;
        info!("opened {} at {} baud", serial.port, serial.baud_rate);
        Ok(Self::from_transport(port, config))
    }

    /// Start the link over an already open transport.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn from_transport<T>(io: T, config: LinkConfig) -> Self
    where
        T: AsyncRead + AsyncWrite + Send + 'static,
    {
        let config = config.normalized();
        let (read_half, write_half) = tokio::io::split(io);
        let (ack_tx, ack_rx) = mpsc::channel(config.ack_queue_capacity);
        let (delivery_tx, delivery_rx) = mpsc::channel(config.max_inbound_frames);
        let shared = Arc::new(Shared::new(config, Box::new(write_half), delivery_rx));

        let tasks = TaskTracker::new();
        tasks.spawn(Reader::new(Arc::clone(&shared), read_half, ack_tx, delivery_tx).run());
        tasks.spawn(writer::run_ack_writer(Arc::clone(&shared), ack_rx));
        tasks.close();
        info!("station link started ({:?} duplex)", config.duplex);
        Self { shared, tasks }
    }

    /// Send `payload` as described by `options`.
    ///
    /// Response-expecting kinds are retried after a timeout or a local
    /// rejection; a response of any kind ends the call. Requests sent
    /// without waiting are retried only while the badge status refuses
    /// them, and display frames are never retried. Exhausting every attempt
    /// yields [`SendOutcome::Failed`].
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::InvalidRequestKind`] for kinds the base station
    /// may not originate, [`LinkError::Frame`] if the payload does not fit
    /// the kind, and transport faults as soon as they occur.
    pub async fn send(&self, payload: impl Into<Bytes>, options: SendOptions) -> Result<SendReport> {
        let kind = options.kind;
        if !kind.is_station_request() {
            return Err(LinkError::InvalidRequestKind(kind));
        }
        self.shared.check_open()?;
        let payload = payload.into();
        let info = if options.cross_board && kind != FrameKind::PrintOnBadge {
            FrameInfo::CROSS_BOARD
        } else {
            FrameInfo::empty()
        };

        let config = &self.shared.config;
        let attempts = options.retry_count.unwrap_or(config.retry_count).max(1);
        if kind == FrameKind::PrintOnBadge {
            return self.send_unacknowledged(kind, info, payload, 1).await;
        }
        if !options.wait_for_response {
            return self
                .send_unacknowledged(kind, info, payload, attempts)
                .await;
        }

        let wait = options.timeout.unwrap_or(config.wait_timeout);
        for attempt in 1..=attempts {
            if attempt > 1 {
                self.pause_before_retry().await;
            }
            if let Some(response) = self.attempt(kind, info, &payload, wait).await? {
                return Ok(SendReport {
                    outcome: SendOutcome::from_response(&response),
                    info: response.info(),
                    attempts: attempt,
                });
            }
            tracing::debug!(%kind, attempt, attempts, "attempt produced no response");
        }
        Ok(SendReport {
            outcome: SendOutcome::Failed,
            info: FrameInfo::empty(),
            attempts,
        })
    }

    /// Write a frame without correlation.
    ///
    /// Only the badge status guard is retried; the frame reaches the wire
    /// at most once.
    async fn send_unacknowledged(
        &self,
        kind: FrameKind,
        info: FrameInfo,
        payload: Bytes,
        attempts: u32,
    ) -> Result<SendReport> {
        for attempt in 1..=attempts {
            if attempt > 1 {
                self.pause_before_retry().await;
            }
            self.shared.check_open()?;
            if !self.admit(kind) {
                continue;
            }
            let frame = Frame::new(PacketType::new(kind, info), UNSEQUENCED)
                .with_payload(payload.clone())
                .sealed()?;
            self.shared.write_frame(&frame).await?;
            return Ok(SendReport {
                outcome: SendOutcome::Sent,
                info: FrameInfo::empty(),
                attempts: attempt,
            });
        }
        Ok(SendReport {
            outcome: SendOutcome::Failed,
            info: FrameInfo::empty(),
            attempts,
        })
    }

    async fn pause_before_retry(&self) {
        metrics::inc_retries();
        sleep(self.shared.config.retry_delay).await;
    }

    /// Consult the badge status guard for `kind`.
    fn admit(&self, kind: FrameKind) -> bool {
        let accepted = self.shared.badge.accepts(kind);
        if !accepted {
            tracing::debug!(%kind, status = ?self.shared.badge.status(), "request refused by badge status");
            metrics::inc_rejections(kind.name());
        }
        accepted
    }

    /// One correlated exchange bounded by `wait`.
    ///
    /// `Ok(None)` means the attempt was refused locally or timed out.
    async fn attempt(
        &self,
        kind: FrameKind,
        info: FrameInfo,
        payload: &Bytes,
        wait: Duration,
    ) -> Result<Option<Frame>> {
        self.shared.check_open()?;
        if !self.admit(kind) {
            return Ok(None);
        }
        let mut pending = self.shared.correlator.begin(kind)?;
        let frame = Frame::new(PacketType::new(kind, info), pending.sequence())
            .with_payload(payload.clone())
            .sealed()?;

        let exchange = async {
            self.shared.write_frame(&frame).await?;
            Ok::<_, LinkError>(pending.wait().await)
        };
        match timeout(wait, exchange).await {
            Ok(Ok(Some(response))) => Ok(Some(response)),
            Ok(Ok(None)) => Err(self.shared.fault_or_closed()),
            Ok(Err(err)) => Err(err),
            Err(_) => {
                tracing::debug!(%kind, sequence = frame.sequence, "timed out waiting for response");
                Ok(None)
            }
        }
    }

    /// Print `payload` on the badge display without waiting.
    ///
    /// # Errors
    ///
    /// See [`StationLink::send`].
    pub async fn display(&self, payload: impl Into<Bytes>) -> Result<SendReport> {
        self.send(payload, SendOptions::display()).await
    }

    /// Wait for the next payload popped by the badge.
    ///
    /// Waits up to the configured attempt count, each bounded by the wait
    /// timeout, and returns `Ok(None)` if nothing arrived.
    ///
    /// # Errors
    ///
    /// Returns the link's fault once the read loop has stopped and every
    /// queued payload has been consumed.
    pub async fn receive(&self) -> Result<Option<Received>> {
        let config = &self.shared.config;
        let mut deliveries = self.shared.deliveries.lock().await;
        for attempt in 1..=config.retry_count {
            if attempt > 1 {
                sleep(config.retry_delay).await;
            }
            match timeout(config.wait_timeout, deliveries.recv()).await {
                Ok(Some(received)) => return Ok(Some(received)),
                Ok(None) => return Err(self.shared.fault_or_closed()),
                Err(_) => tracing::trace!(attempt, "nothing received"),
            }
        }
        Ok(None)
    }

    /// Last-known buffer state of the badge.
    #[must_use]
    pub fn badge_status(&self) -> BadgeStatus { self.shared.badge.status() }

    /// Whether `sequence` is reserved by an in-flight request.
    #[must_use]
    pub fn is_sequence_in_use(&self, sequence: u8) -> bool {
        self.shared.correlator.is_sequence_in_use(sequence)
    }

    /// Number of callers waiting for a response.
    #[must_use]
    pub fn pending_requests(&self) -> usize { self.shared.correlator.pending_count() }

    #[must_use]
    pub fn config(&self) -> &LinkConfig { &self.shared.config }

    /// The transport fault that stopped the link, if any.
    #[must_use]
    pub fn fault(&self) -> Option<LinkError> { self.shared.fault() }

    #[must_use]
    pub fn is_closed(&self) -> bool { self.shared.shutdown.is_cancelled() }

    /// Stop the link and wait for its background tasks to finish.
    pub async fn close(self) {
        self.shared.stop();
        self.tasks.wait().await;
        info!("station link closed");
    }
}

impl Drop for StationLink {
    fn drop(&mut self) { self.shared.stop(); }
}
