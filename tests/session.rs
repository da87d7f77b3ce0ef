//! Session facade integration tests: clock, capture and cooldowns.

mod common;

// ============================================================================
// Imports
// ============================================================================

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use common::method;
use interactive_rpc::{Error, Session};
use serde_json::json;

// ============================================================================
// Helpers
// ============================================================================

/// Local clock tolerance, in milliseconds.
const SLACK_MS: i64 = 2_000;

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock before epoch")
        .as_millis() as i64
}

async fn open_session() -> (Session, common::FakeServer) {
    let (connection, server) = common::open().await;
    (Session::new(connection), server)
}

// ============================================================================
// Clock
// ============================================================================

#[tokio::test]
async fn test_sync_time() {
    let (session, mut server) = open_session().await;
    assert_eq!(session.time_offset(), 0);

    let (offset, request) = tokio::join!(
        session.sync_time(),
        server.answer(json!({ "time": now_ms() + 60_000 }))
    );

    assert_eq!(request["method"], "getTime");
    let offset = offset.expect("sync_time");
    assert!((offset - 60_000).abs() < SLACK_MS, "offset {offset}");
    assert_eq!(session.time_offset(), offset);

    let drift = session.server_time() - (now_ms() + 60_000);
    assert!(drift.abs() < SLACK_MS, "drift {drift}");

    session.close().await;
}

#[tokio::test]
async fn test_sync_time_rejects_missing_time() {
    let (session, mut server) = open_session().await;

    let (result, _) = tokio::join!(session.sync_time(), server.answer(json!({})));

    assert!(matches!(result, Err(Error::Protocol { .. })));
    assert_eq!(session.time_offset(), 0);

    session.close().await;
}

// ============================================================================
// Interactions
// ============================================================================

#[tokio::test]
async fn test_capture() {
    let (session, mut server) = open_session().await;

    let (result, request) = tokio::join!(
        session.capture("e8ab6bd7-3e04-4a4c-9dd5-0cbd2aa9a6a8"),
        server.answer(json!({}))
    );

    result.expect("capture");
    assert_eq!(request["method"], "capture");
    assert_eq!(
        request["params"],
        json!({ "transactionID": "e8ab6bd7-3e04-4a4c-9dd5-0cbd2aa9a6a8" })
    );

    session.close().await;
}

#[tokio::test]
async fn test_cooldown_uses_server_clock() {
    let (session, mut server) = open_session().await;

    let (offset, _) = tokio::join!(
        session.sync_time(),
        server.answer(json!({ "time": now_ms() - 30_000 }))
    );
    offset.expect("sync_time");

    let (result, request) = tokio::join!(
        session.cooldown("default", &["up", "down"], Duration::from_secs(5)),
        server.answer(json!({}))
    );
    result.expect("cooldown");

    assert_eq!(request["method"], "updateControls");
    assert_eq!(request["params"]["sceneID"], "default");

    let controls = request["params"]["controls"]
        .as_array()
        .expect("controls array");
    assert_eq!(controls.len(), 2);
    assert_eq!(controls[0]["controlID"], "up");
    assert_eq!(controls[1]["controlID"], "down");

    let expected = now_ms() - 30_000 + 5_000;
    for control in controls {
        let cooldown = control["cooldown"].as_i64().expect("numeric cooldown");
        assert!((cooldown - expected).abs() < SLACK_MS, "cooldown {cooldown}");
    }

    session.close().await;
}

// ============================================================================
// Events
// ============================================================================

#[tokio::test]
async fn test_session_pump() {
    let (session, mut server) = open_session().await;

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    session.on("giveInput", move |call| {
        let _ = tx.send(call.params().clone());
    });

    server.send(method("giveInput", json!({ "controlID": "up" }))).await;
    common::wait_for_queue(session.connection(), 1).await;

    let batch = session.pump();
    assert_eq!(batch.len(), 1);
    assert_eq!(rx.try_recv().expect("handler ran"), json!({ "controlID": "up" }));

    assert_eq!(session.off("giveInput"), 1);
    session.close().await;
}

#[tokio::test]
async fn test_close_fails_in_flight_session_calls() {
    let (session, mut server) = open_session().await;

    let caller = session.clone();
    let in_flight = tokio::spawn(async move { caller.capture("t-1").await });
    server.recv().await;

    session.close().await;

    assert!(matches!(
        in_flight.await.expect("capture task"),
        Err(Error::ConnectionClosed)
    ));
    assert!(session.connection().is_closed());
    assert_eq!(session.connection().pending_count(), 0);
}
