//! Integration test: two nodes on loopback find each other.
//!
//! Exercises murmur-node's discovery round on top of a real murmur-network
//! host (TCP, Noise, Yamux, Kademlia).

use std::time::Duration;

use murmur_integration_tests::{bootstrapped_from, loopback_config, tcp_port};
use murmur_network::{NetworkEvent, Overlay};
use murmur_node::{SchedulerState, ServerNode};

#[tokio::test]
async fn test_listen_binds_concrete_port() {
    let mut node: ServerNode = ServerNode::init(loopback_config()).expect("init");
    let addr = node.listen().await.expect("listen");

    assert_ne!(tcp_port(&addr), Some(0));
    assert_eq!(node.addr(), Some(&addr));
    node.shutdown().await;
}

#[tokio::test]
async fn test_ping_returns_remote_identity() {
    let mut a: ServerNode = ServerNode::init(loopback_config()).expect("init a");
    let a_addr = a.listen().await.expect("listen a");
    let b: ServerNode = ServerNode::init(loopback_config()).expect("init b");

    let remote = b.overlay().ping(a_addr).await.expect("ping");
    assert_eq!(remote, a.peer_id());

    b.shutdown().await;
    a.shutdown().await;
}

#[tokio::test]
async fn test_bootstrapped_round_reports_bootstrap_peer() {
    let mut a: ServerNode = ServerNode::init(loopback_config()).expect("init a");
    let a_addr = a.listen().await.expect("listen a");

    let mut b: ServerNode = ServerNode::init(bootstrapped_from(&a_addr)).expect("init b");
    b.listen().await.expect("listen b");

    let found = tokio::time::timeout(Duration::from_secs(30), b.discover())
        .await
        .expect("round should finish");
    assert!(found >= 1);
    assert!(b.discovered_peers().iter().any(|p| p.peer_id == a.peer_id()));
    assert_eq!(b.discovery_rounds(), 1);

    b.shutdown().await;
    a.shutdown().await;
}

#[tokio::test]
async fn test_repeated_rounds_keep_one_bootstrap_connection() {
    let mut a: ServerNode = ServerNode::init(loopback_config()).expect("init a");
    let a_addr = a.listen().await.expect("listen a");

    let b: ServerNode = ServerNode::init(bootstrapped_from(&a_addr)).expect("init b");
    let mut events = b.events();
    for _ in 0..5 {
        b.discover().await;
    }
    tokio::time::sleep(Duration::from_secs(2)).await;

    let (mut opened, mut closed) = (0, 0);
    while let Ok(event) = events.try_recv() {
        match event {
            NetworkEvent::PeerConnected(e) if e.peer_id == a.peer_id() => opened += 1,
            NetworkEvent::PeerDisconnected(e) if e.peer_id == a.peer_id() => closed += 1,
            _ => {}
        }
    }
    assert_eq!(opened, 1);
    assert_eq!(closed, 0);
    assert_eq!(b.discovery_rounds(), 5);

    b.shutdown().await;
    a.shutdown().await;
}

#[tokio::test]
async fn test_periodic_discovery_against_live_peer() {
    let mut a: ServerNode = ServerNode::init(loopback_config()).expect("init a");
    let a_addr = a.listen().await.expect("listen a");

    let mut b: ServerNode = ServerNode::init(bootstrapped_from(&a_addr)).expect("init b");
    b.listen().await.expect("listen b");
    assert!(b.start_discovery().await);
    assert!(!b.start_discovery().await);

    let deadline = tokio::time::Instant::now() + Duration::from_secs(30);
    while !b.discovered_peers().iter().any(|p| p.peer_id == a.peer_id()) {
        assert!(tokio::time::Instant::now() < deadline, "peer never discovered");
        tokio::time::sleep(Duration::from_millis(200)).await;
    }

    b.stop_discovery().await;
    assert_eq!(b.discovery_state().await, SchedulerState::Idle);
    let rounds = b.discovery_rounds();
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(b.discovery_rounds(), rounds);

    b.shutdown().await;
    a.shutdown().await;
}

#[tokio::test]
async fn test_unreachable_bootstrap_does_not_fail_round() {
    let blocker = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = blocker.local_addr().expect("addr").port();
    drop(blocker);

    let dead: libp2p::Multiaddr = format!("/ip4/127.0.0.1/tcp/{port}").parse().unwrap();
    let mut config = bootstrapped_from(&dead);
    config.round_timeout = Some(Duration::from_secs(10));
    let node: ServerNode = ServerNode::init(config).expect("init");

    assert_eq!(node.discover().await, 0);
    assert!(node.discovered_peers().is_empty());
    node.shutdown().await;
}
