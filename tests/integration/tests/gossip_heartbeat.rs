//! Integration test: gossip flows between two connected nodes.

use std::sync::Arc;
use std::time::Duration;

use murmur_integration_tests::{bootstrapped_from, loopback_config};
use murmur_network::{NetworkEvent, Overlay};
use murmur_node::{Heartbeat, HeartbeatConfig, HeartbeatPayload, ServerNode};
use tokio::sync::broadcast;

/// Wait for the next gossip payload on `events`, up to `limit`.
async fn next_gossip(
    events: &mut broadcast::Receiver<NetworkEvent>,
    limit: Duration,
) -> Option<Vec<u8>> {
    tokio::time::timeout(limit, async {
        loop {
            match events.recv().await {
                Ok(NetworkEvent::GossipReceived(msg)) => return Some(msg.data),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    })
    .await
    .ok()
    .flatten()
}

/// Two listening nodes, B connected to A through one discovery round.
async fn connected_pair() -> (ServerNode, ServerNode) {
    let mut a: ServerNode = ServerNode::init(loopback_config()).expect("init a");
    let a_addr = a.listen().await.expect("listen a");
    let mut b: ServerNode = ServerNode::init(bootstrapped_from(&a_addr)).expect("init b");
    b.listen().await.expect("listen b");
    b.discover().await;
    (a, b)
}

#[tokio::test]
async fn test_send_gossip_reaches_peer() {
    let (a, b) = connected_pair().await;
    let mut events = a.events();

    // Subscriptions propagate asynchronously; retry until A hears us.
    let mut received = None;
    for _ in 0..40 {
        let _ = b.send_gossip("hello").await;
        if let Some(data) = next_gossip(&mut events, Duration::from_millis(500)).await {
            received = Some(data);
            break;
        }
    }
    assert_eq!(received.as_deref(), Some(&b"hello"[..]));

    b.shutdown().await;
    a.shutdown().await;
}

#[tokio::test]
async fn test_heartbeat_reaches_peer() {
    let (a, b) = connected_pair().await;
    let mut events = a.events();

    let heartbeat = Heartbeat::spawn(
        b.overlay(),
        HeartbeatConfig {
            interval: Duration::from_millis(250),
            message: "hello".into(),
        },
    );

    let data = next_gossip(&mut events, Duration::from_secs(20))
        .await
        .expect("heartbeat should arrive");
    let payload = HeartbeatPayload::from_bytes(&data).expect("heartbeat payload");
    assert_eq!(payload.sender, b.peer_id().to_string());
    assert_eq!(payload.message, "hello");

    heartbeat.shutdown().await;
    b.shutdown().await;
    a.shutdown().await;
}

#[tokio::test]
async fn test_heartbeat_without_peers_keeps_running() {
    let node: ServerNode = ServerNode::init(loopback_config()).expect("init");
    let overlay = node.overlay();
    let heartbeat = Heartbeat::spawn(
        Arc::clone(&overlay),
        HeartbeatConfig {
            interval: Duration::from_millis(100),
            message: "hello".into(),
        },
    );

    tokio::time::sleep(Duration::from_millis(450)).await;
    assert!(heartbeat.pushes_failed() >= 3);
    assert_eq!(heartbeat.pushes_sent(), 0);
    assert_eq!(overlay.local_peer_id(), node.peer_id());

    heartbeat.shutdown().await;
    node.shutdown().await;
}
