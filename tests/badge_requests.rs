//! Tests for frames raised by the badge: acknowledgements, deliveries and the
//! buffer-status guard they drive.

use std::time::Duration;

use station_link::{
    BadgeStatus,
    FrameInfo,
    FrameKind,
    SendOptions,
    SendOutcome,
    StationLink,
    frame::{STATUS_NOT_READY, SUCCESS},
};
use station_link_testing::{FakeBadge, frames, link_pair, test_config};

async fn wait_for_status(link: &StationLink, done: impl Fn(BadgeStatus) -> bool) {
    for _ in 0..100 {
        if done(link.badge_status()) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("badge status stuck at {:?}", link.badge_status());
}

async fn expect_ack(badge: &mut FakeBadge, kind: FrameKind, sequence: u8) -> station_link::Frame {
    let ack = badge.recv().await.expect("acknowledgement");
    assert_eq!(ack.kind(), kind);
    assert_eq!(ack.sequence, sequence);
    ack
}

#[tokio::test(start_paused = true)]
async fn push_tx_is_acknowledged_and_gates_queue_tx() {
    let (link, mut badge) = link_pair(test_config());

    badge
        .send(frames::push_tx_request(7))
        .await
        .expect("push request");
    let ack = expect_ack(&mut badge, FrameKind::PushTxResponse, 7).await;
    assert_eq!(ack.size, 0);
    assert!(link.badge_status().contains(BadgeStatus::FULL_TX));

    let report = link
        .send(vec![1, 2, 3], SendOptions::queue_tx())
        .await
        .expect("send");
    assert_eq!(report.outcome, SendOutcome::Failed);
    assert_eq!(report.attempts, 3);
    assert!(
        badge.recv_within(Duration::from_millis(1)).await.is_none(),
        "a refused request must not reach the wire"
    );

    let unsolicited = frames::queue_tx_response(
        &station_link::Frame::new(FrameKind::QueueTxRequest, 200),
        SUCCESS,
    );
    badge.send(unsolicited).await.expect("queue response");
    wait_for_status(&link, |status| !status.contains(BadgeStatus::FULL_TX)).await;

    let (report, ()) = tokio::join!(link.send(vec![1, 2, 3], SendOptions::queue_tx()), async {
        let request = badge.recv().await.expect("request");
        badge
            .send(frames::queue_tx_response(&request, SUCCESS))
            .await
            .expect("reply");
    });
    assert_eq!(
        report.expect("send").outcome,
        SendOutcome::Acknowledged(true)
    );
}

#[tokio::test(start_paused = true)]
async fn cross_board_ack_keeps_info_bits() {
    let (_link, mut badge) = link_pair(test_config());

    let request = station_link::Frame::new(
        station_link::PacketType::new(FrameKind::PushTxRequest, FrameInfo::CROSS_BOARD),
        9,
    );
    badge.send(request).await.expect("push request");
    let ack = expect_ack(&mut badge, FrameKind::PushTxResponse, 9).await;
    assert_eq!(ack.packet_type.as_byte(), 0x94);
}

#[tokio::test(start_paused = true)]
async fn empty_retrieve_gates_retrieve_until_reset() {
    let (link, mut badge) = link_pair(test_config());

    let (report, ()) = tokio::join!(link.send(Vec::new(), SendOptions::retrieve_rx()), async {
        let request = badge.recv().await.expect("request");
        badge
            .send(frames::retrieve_response(&request, Vec::new()))
            .await
            .expect("reply");
    });
    assert_eq!(report.expect("send").outcome, SendOutcome::NoData);
    assert!(link.badge_status().contains(BadgeStatus::EMPTY_RX));

    let report = link
        .send(Vec::new(), SendOptions::retrieve_rx().with_retry_count(1))
        .await
        .expect("send");
    assert_eq!(report.outcome, SendOutcome::Failed);
    assert!(badge.recv_within(Duration::from_millis(1)).await.is_none());
}

#[tokio::test(start_paused = true)]
async fn popped_payload_is_acknowledged_and_delivered() {
    let (link, mut badge) = link_pair(test_config());

    badge
        .send(frames::pop_rx_request(
            5,
            FrameInfo::CROSS_BOARD,
            vec![0xAB, 0xCD],
        ))
        .await
        .expect("pop request");
    let ack = expect_ack(&mut badge, FrameKind::PopRxResponse, 5).await;
    assert_eq!(ack.is_success, Some(SUCCESS));
    assert!(ack.info().contains(FrameInfo::CROSS_BOARD));

    let received = link
        .receive()
        .await
        .expect("receive")
        .expect("payload delivered");
    assert_eq!(received.payload.as_ref(), &[0xAB, 0xCD]);
    assert!(received.info.contains(FrameInfo::CROSS_BOARD));
    assert!(link.badge_status().contains(BadgeStatus::EMPTY_RX));
}

#[tokio::test(start_paused = true)]
async fn retransmitted_pop_is_acknowledged_but_delivered_once() {
    let (link, mut badge) = link_pair(test_config());
    let pop = frames::pop_rx_request(5, FrameInfo::empty(), vec![0x42]);

    badge.send(pop.clone()).await.expect("pop request");
    expect_ack(&mut badge, FrameKind::PopRxResponse, 5).await;
    badge.send(pop).await.expect("retransmission");
    expect_ack(&mut badge, FrameKind::PopRxResponse, 5).await;

    let first = link.receive().await.expect("receive");
    assert_eq!(
        first.map(|r| r.payload),
        Some(bytes::Bytes::from_static(&[0x42]))
    );
    assert_eq!(link.receive().await.expect("receive"), None);
}

#[tokio::test(start_paused = true)]
async fn pop_repeated_after_the_window_is_delivered_again() {
    let config = test_config();
    let ttl = config.dedup_ttl;
    let (link, mut badge) = link_pair(config);
    let pop = frames::pop_rx_request(5, FrameInfo::empty(), vec![0x42]);

    badge.send(pop.clone()).await.expect("pop request");
    expect_ack(&mut badge, FrameKind::PopRxResponse, 5).await;
    tokio::time::sleep(ttl).await;
    badge.send(pop).await.expect("second pop");
    expect_ack(&mut badge, FrameKind::PopRxResponse, 5).await;

    assert!(link.receive().await.expect("receive").is_some());
    assert!(link.receive().await.expect("receive").is_some());
}

#[tokio::test(start_paused = true)]
async fn send_status_is_acknowledged() {
    let (_link, mut badge) = link_pair(test_config());

    badge
        .send(frames::send_status_request(3, STATUS_NOT_READY))
        .await
        .expect("status request");
    let ack = expect_ack(&mut badge, FrameKind::SendStatusResponse, 3).await;
    assert_eq!(ack.size, 0);
}

#[tokio::test(start_paused = true)]
async fn receive_gives_up_quietly() {
    let (link, _badge) = link_pair(test_config());
    assert_eq!(link.receive().await.expect("no fault"), None);
}

#[tokio::test(start_paused = true)]
async fn unacknowledged_queue_tx_waits_out_the_guard() {
    let (link, mut badge) = link_pair(test_config());

    badge
        .send(frames::push_tx_request(7))
        .await
        .expect("push request");
    expect_ack(&mut badge, FrameKind::PushTxResponse, 7).await;
    assert!(link.badge_status().contains(BadgeStatus::FULL_TX));

    let options = SendOptions::queue_tx().with_wait_for_response(false);
    let (report, ()) = tokio::join!(link.send(vec![0x33], options), async {
        let unsolicited = frames::queue_tx_response(
            &station_link::Frame::new(FrameKind::QueueTxRequest, 200),
            SUCCESS,
        );
        badge.send(unsolicited).await.expect("queue response");
    });

    let report = report.expect("send");
    assert_eq!(report.outcome, SendOutcome::Sent);
    assert_eq!(report.attempts, 2);
    let written = badge.recv().await.expect("queued frame");
    assert_eq!(written.kind(), FrameKind::QueueTxRequest);
    assert_eq!(written.payload.as_ref(), &[0x33]);
}

#[tokio::test(start_paused = true)]
async fn unacknowledged_queue_tx_gives_up_after_every_attempt() {
    let (link, mut badge) = link_pair(test_config());

    badge
        .send(frames::push_tx_request(7))
        .await
        .expect("push request");
    expect_ack(&mut badge, FrameKind::PushTxResponse, 7).await;

    let report = link
        .send(
            vec![0x33],
            SendOptions::queue_tx().with_wait_for_response(false),
        )
        .await
        .expect("send");
    assert_eq!(report.outcome, SendOutcome::Failed);
    assert_eq!(report.attempts, 3);
    assert!(badge.recv_within(Duration::from_millis(1)).await.is_none());
}
