//! Connect/ready/disconnect lifecycle scenarios.

mod support;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use storyweave_client::{ConnectionState, PlaythroughEvent};

use support::{harness, test_config};

#[tokio::test(start_paused = true)]
async fn connect_then_ready_reaches_connected() {
    let mut h = harness(test_config());
    let ready_calls = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&ready_calls);
    h.playthrough.connect(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    assert!(matches!(
        h.next_event().await,
        PlaythroughEvent::StateChanged(ConnectionState::Connecting)
    ));

    let _server = {
        let server = h.server().await;
        server.send_ready();
        assert!(matches!(
            h.next_event().await,
            PlaythroughEvent::StateChanged(ConnectionState::Connected)
        ));
        assert!(matches!(
            h.next_event().await,
            PlaythroughEvent::Ready { reconnected: false }
        ));
        server
    };

    assert_eq!(h.playthrough.state(), ConnectionState::Connected);
    assert!(h.playthrough.is_connected());
    assert_eq!(ready_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn connect_is_a_noop_while_connected() {
    let mut h = harness(test_config());
    let _server = h.connect_and_ready().await;

    h.playthrough.connect(|| panic!("second connect must not run its callback"));

    h.assert_no_event(Duration::from_millis(200)).await;
    assert_eq!(h.transport.connect_count(), 1);
    assert_eq!(h.playthrough.state(), ConnectionState::Connected);
}

#[tokio::test(start_paused = true)]
async fn disconnect_is_synchronous_and_idempotent() {
    let mut h = harness(test_config());
    let _server = h.connect_and_ready().await;

    h.playthrough.disconnect();
    // Observable state flips before the call returns.
    assert_eq!(h.playthrough.state(), ConnectionState::Disconnected);

    assert!(matches!(
        h.next_event().await,
        PlaythroughEvent::StateChanged(ConnectionState::Disconnected)
    ));

    // A second disconnect changes nothing and emits nothing.
    h.playthrough.disconnect();
    assert_eq!(h.playthrough.state(), ConnectionState::Disconnected);
    h.assert_no_event(Duration::from_millis(200)).await;
}

#[tokio::test(start_paused = true)]
async fn initial_connect_failure_lands_in_disconnected() {
    let mut h = harness(test_config());
    h.transport.refuse_next(1);

    h.playthrough.connect(|| panic!("never became ready"));

    assert!(matches!(
        h.next_event().await,
        PlaythroughEvent::StateChanged(ConnectionState::Connecting)
    ));
    assert!(matches!(
        h.next_event().await,
        PlaythroughEvent::StateChanged(ConnectionState::Disconnected)
    ));
    // The initial connect does not retry.
    assert_eq!(h.transport.connect_count(), 1);
    assert_eq!(h.playthrough.state(), ConnectionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn close_before_readiness_lands_in_disconnected() {
    let mut h = harness(test_config());

    h.playthrough.connect(|| panic!("never became ready"));
    assert!(matches!(
        h.next_event().await,
        PlaythroughEvent::StateChanged(ConnectionState::Connecting)
    ));

    let server = h.server().await;
    server.close();

    assert!(matches!(
        h.next_event().await,
        PlaythroughEvent::StateChanged(ConnectionState::Disconnected)
    ));
    assert_eq!(h.playthrough.state(), ConnectionState::Disconnected);
    assert_eq!(h.transport.connect_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn session_can_connect_again_after_disconnect() {
    let mut h = harness(test_config());
    let server = h.connect_and_ready().await;

    h.playthrough.disconnect();
    h.events_until(|e| {
        matches!(e, PlaythroughEvent::StateChanged(ConnectionState::Disconnected))
    })
    .await;
    drop(server);

    let _server = h.connect_and_ready().await;
    assert_eq!(h.playthrough.state(), ConnectionState::Connected);
    assert_eq!(h.transport.connect_count(), 2);
}
