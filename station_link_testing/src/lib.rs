//! Utilities for driving a [`StationLink`](station_link::StationLink)
//! against a scripted badge over in-memory streams.
//!
//! ```rust
//! use station_link::{SendOptions, SendOutcome, frame::SUCCESS};
//! use station_link_testing::{frames, link_pair, test_config};
//!
//! # async fn example() {
//! let (link, mut badge) = link_pair(test_config());
//! let (report, ()) = tokio::join!(link.send(vec![1], SendOptions::queue_tx()), async {
//!     let request = badge.recv().await.expect("request");
//!     badge
//!         .send(frames::queue_tx_response(&request, SUCCESS))
//!         .await
//!         .expect("reply");
//! });
//! assert_eq!(report.expect("send").outcome, SendOutcome::Acknowledged(true));
//! # }
//! ```

mod fake_badge;
pub mod frames;
mod logging;

pub use fake_badge::{FakeBadge, PIPE_CAPACITY, link_pair, test_config};
pub use logging::{LoggerHandle, logger};
