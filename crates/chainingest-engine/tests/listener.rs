//! Live head tracking and fork detection.

mod common;

use std::sync::Arc;

use chainingest_core::error::IngestError;
use chainingest_core::fork::ForkWatcher;
use chainingest_core::status::StatusHandle;
use chainingest_engine::{event_queue, BlockFetcher, EventDispatcher, EventSender, LiveListener};
use chainingest_rpc::{HeadSubscription, TransportError};
use serde_json::json;

use common::{h, hash_of, head_json, MockNode, RecordingConnector};

fn setup(node: &MockNode) -> (BlockFetcher, EventSender, RecordingConnector) {
    let conn = RecordingConnector::default();
    let (queue, rx) = event_queue();
    EventDispatcher::new(Some(Arc::new(conn.clone())), StatusHandle::new()).spawn(rx);
    (BlockFetcher::new(node.client(), None), queue, conn)
}

#[tokio::test]
async fn catch_up_covers_every_height_through_head() {
    let node = MockNode::new(105);
    let (fetcher, queue, conn) = setup(&node);
    let mut fork = ForkWatcher::new(128);
    let mut end = h(100);

    LiveListener::new(&fetcher, &mut fork, &queue)
        .catch_up(&mut end, &h(105))
        .await
        .unwrap();

    assert_eq!(conn.heights(), vec![100, 101, 102, 103, 104, 105]);
    assert_eq!(end, h(106));
    assert!(conn.forks().is_empty());
}

#[tokio::test]
async fn stale_head_never_moves_end_backwards() {
    let node = MockNode::new(110);
    let (fetcher, queue, conn) = setup(&node);
    let mut fork = ForkWatcher::new(128);
    let mut end = h(106);

    LiveListener::new(&fetcher, &mut fork, &queue)
        .catch_up(&mut end, &h(104))
        .await
        .unwrap();

    assert!(conn.heights().is_empty());
    assert_eq!(end, h(106));
}

#[tokio::test]
async fn detects_parent_hash_mismatch() {
    let node = MockNode::new(110);
    node.set_parent(106, "0xdead");
    let (fetcher, queue, conn) = setup(&node);
    let mut fork = ForkWatcher::new(128);
    let mut end = h(100);

    let mut listener = LiveListener::new(&fetcher, &mut fork, &queue);
    listener.catch_up(&mut end, &h(105)).await.unwrap();
    listener.catch_up(&mut end, &h(107)).await.unwrap();

    assert_eq!(conn.heights(), (100..=107).collect::<Vec<_>>());
    assert_eq!(conn.forks(), vec![106]);

    // The forked block is still recorded; its child links to it cleanly.
    let window = fork.window();
    assert_eq!(window.get(&h(106)).unwrap().parent_hash, "0xdead");
    assert_eq!(window.get(&h(107)).unwrap().hash, hash_of(107));
}

#[tokio::test]
async fn first_block_has_no_verdict() {
    let node = MockNode::new(50);
    node.set_parent(40, "0xdead");
    let (fetcher, queue, conn) = setup(&node);
    let mut fork = ForkWatcher::new(128);
    let mut end = h(40);

    LiveListener::new(&fetcher, &mut fork, &queue)
        .catch_up(&mut end, &h(41))
        .await
        .unwrap();

    assert!(conn.forks().is_empty());
}

#[tokio::test]
async fn window_keeps_only_newest_blocks() {
    let node = MockNode::new(20);
    let (fetcher, queue, _conn) = setup(&node);
    let mut fork = ForkWatcher::new(3);
    let mut end = h(1);

    LiveListener::new(&fetcher, &mut fork, &queue)
        .catch_up(&mut end, &h(10))
        .await
        .unwrap();

    let window = fork.window();
    assert_eq!(window.len(), 3);
    assert!(window.get(&h(7)).is_none());
    for n in 8..=10u64 {
        assert!(window.get(&h(n)).is_some(), "block {n} missing");
    }
}

#[tokio::test]
async fn skipped_height_leaves_no_verdict_for_child() {
    let node = MockNode::new(20);
    node.fail_body(5);
    node.set_parent(6, "0xdead");
    let (fetcher, queue, conn) = setup(&node);
    let mut fork = ForkWatcher::new(128);
    let mut end = h(3);

    LiveListener::new(&fetcher, &mut fork, &queue)
        .catch_up(&mut end, &h(7))
        .await
        .unwrap();

    assert_eq!(conn.heights(), vec![3, 4, 6, 7]);
    assert!(conn.forks().is_empty());
    assert_eq!(end, h(8));
}

#[tokio::test]
async fn listen_follows_heads_until_stream_closes() {
    let node = MockNode::new(110);
    let (fetcher, queue, conn) = setup(&node);
    let mut fork = ForkWatcher::new(128);
    let mut end = h(100);

    let (tx, heads) = HeadSubscription::channel();
    tx.send(Ok(head_json(102))).unwrap();
    tx.send(Err(TransportError::WebSocket("hiccup".into()))).unwrap();
    tx.send(Ok(json!({"garbage": true}))).unwrap();
    tx.send(Ok(head_json(101))).unwrap();
    tx.send(Ok(head_json(105))).unwrap();
    drop(tx);

    let err = LiveListener::new(&fetcher, &mut fork, &queue)
        .listen(&mut end, heads)
        .await
        .unwrap_err();

    assert!(matches!(err, IngestError::SubscriptionClosed));
    assert_eq!(conn.heights(), (100..=105).collect::<Vec<_>>());
    assert_eq!(end, h(106));
}
