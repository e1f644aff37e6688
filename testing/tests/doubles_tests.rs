//! Tests for the in-memory doubles

#![allow(clippy::unwrap_used)] // Tests can unwrap
#![allow(clippy::expect_used)] // Tests can expect

use orderflow_core::{
    DeadLetter, DeadLetterSink, MessageSource, OrderStore, PoisonKind, QueueError, QueueMessage,
    StoreError,
};
use orderflow_testing::{
    InMemoryOrderStore, RecordingDeadLetterSink, ScriptedMessageSource, sample_order, test_clock,
};
use orderflow_core::environment::Clock;
use proptest::prelude::*;
use std::time::Duration;

#[tokio::test]
async fn test_store_versions_upserts() {
    let store = InMemoryOrderStore::new();
    assert!(store.is_empty());

    let first = store.upsert(&sample_order("a1")).await.unwrap();
    assert_eq!(first.version, 1);
    assert_eq!(first.created_at, Some(test_clock().now()));

    let mut changed = sample_order("a1");
    changed.track_number = "CHANGED".to_string();
    let second = store.upsert(&changed).await.unwrap();

    assert_eq!(second.version, 2);
    assert_eq!(second.created_at, first.created_at);
    assert_eq!(store.get("a1").await.unwrap().track_number, "CHANGED");
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn test_store_get_unknown_is_not_found() {
    let store = InMemoryOrderStore::new();
    let err = store.get("missing").await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(store.get_calls(), 1);
}

#[tokio::test]
async fn test_store_injected_failures() {
    let store = InMemoryOrderStore::new();
    store.fail_next_upserts(2);

    assert!(store.upsert(&sample_order("a1")).await.is_err());
    assert!(store.upsert(&sample_order("a1")).await.is_err());
    assert_eq!(store.upsert(&sample_order("a1")).await.unwrap().version, 1);
    assert_eq!(store.upsert_calls(), 3);

    store.fail_gets(true);
    assert!(matches!(store.get("a1").await, Err(StoreError::Persistence(_))));
    assert!(store.ping().await.is_err());
    store.fail_gets(false);
    assert!(store.ping().await.is_ok());
}

#[tokio::test]
async fn test_scripted_source_replays_then_cancels() {
    let source = ScriptedMessageSource::new();
    source.push_payload(b"one".to_vec());
    source.push_error(QueueError::Fetch("down".to_string()));
    source.push_payload(b"two".to_vec());

    let first = source.fetch().await.unwrap();
    assert_eq!((first.offset, first.payload.as_slice()), (0, b"one".as_slice()));
    assert!(matches!(source.fetch().await, Err(QueueError::Fetch(_))));
    assert_eq!(source.fetch().await.unwrap().offset, 1);
    assert!(matches!(source.fetch().await, Err(QueueError::Cancelled)));
    assert_eq!(source.remaining(), 0);
}

#[tokio::test]
async fn test_scripted_source_holds_when_asked() {
    let source = ScriptedMessageSource::new().hold_when_drained();
    let result = tokio::time::timeout(Duration::from_millis(20), source.fetch()).await;
    assert!(result.is_err(), "fetch should still be pending");
}

#[tokio::test]
async fn test_scripted_source_records_commits() {
    let source = ScriptedMessageSource::new();
    let message = QueueMessage::new("orders", 0, 41, Vec::new());

    source.commit(&message).await.unwrap();
    source.fail_commits(true);
    assert!(source.commit(&message).await.is_err());

    assert_eq!(source.committed_offsets(), vec![41]);
}

#[tokio::test]
async fn test_recording_sink() {
    let sink = RecordingDeadLetterSink::new();
    let letter = DeadLetter {
        message: QueueMessage::new("orders", 0, 3, b"{".to_vec()),
        kind: PoisonKind::Decode,
        reason: "EOF while parsing an object".to_string(),
        failed_at: test_clock().now(),
    };

    sink.record(letter.clone()).await.unwrap();
    sink.fail_writes(true);
    assert!(sink.record(letter.clone()).await.is_err());

    assert_eq!(sink.letters(), vec![letter]);
}

proptest! {
    #[test]
    fn arb_orders_validate_iff_complete(order in orderflow_testing::properties::arb_order()) {
        let complete = !order.order_uid.is_empty()
            && !order.customer_id.is_empty()
            && !order.items.is_empty();
        prop_assert_eq!(order.validate().is_ok(), complete);
    }
}
