//! Integration test: key files give a node a stable identity.

use murmur_integration_tests::loopback_config;
use murmur_node::{keys, ServerNode, Settings};
use rand::Rng;

#[tokio::test]
async fn test_key_file_identity_survives_restart() {
    let suffix: u64 = rand::thread_rng().gen();
    let path = std::env::temp_dir().join(format!("murmur-it-{suffix:016x}.key"));
    keys::generate_key_file(&path).expect("write key");

    let mut settings = Settings::default();
    settings.identity.private_key_path = Some(path.clone());

    let mut peer_ids = Vec::new();
    for _ in 0..2 {
        let mut config = loopback_config();
        config.keypair = settings.validate().expect("validate").keypair;
        let node: ServerNode = ServerNode::init(config).expect("init");
        peer_ids.push(node.peer_id());
        node.shutdown().await;
    }
    assert_eq!(peer_ids[0], peer_ids[1]);

    std::fs::remove_file(&path).expect("cleanup");
}

#[tokio::test]
async fn test_nodes_without_keys_get_distinct_identities() {
    let a: ServerNode = ServerNode::init(loopback_config()).expect("init a");
    let b: ServerNode = ServerNode::init(loopback_config()).expect("init b");
    assert_ne!(a.peer_id(), b.peer_id());
    a.shutdown().await;
    b.shutdown().await;
}
