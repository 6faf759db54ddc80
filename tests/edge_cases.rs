#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
//! Edge-case tests: boundary conditions, error scenarios and misuse of the
//! public surface

use std::io;
use std::time::Duration;

use peerlink::config::NetworkConfig;
use peerlink::core::Packet;
use peerlink::service::{Client, Node, Server};
use peerlink::transport::ConnectionRegistry;
use peerlink::TransportError;

// ============================================================================
// CONFIGURATION AND SETUP
// ============================================================================

#[tokio::test]
async fn test_bind_rejects_unparseable_address() {
    let config = NetworkConfig::default_with_overrides(|c| {
        c.server.address = "not-an-address".to_string();
    });
    match Server::bind(&config) {
        Err(TransportError::ConfigError(message)) => {
            assert!(message.contains("Invalid server address"));
        }
        other => panic!("expected ConfigError, got {other:?}"),
    }
}

#[tokio::test]
async fn test_connect_to_closed_port_fails_with_io() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let config = NetworkConfig::default_with_overrides(|c| {
        c.client.address = format!("127.0.0.1:{port}");
        c.client.connect_timeout = Duration::from_secs(2);
    });

    let err = Client::connect(&config).await.expect_err("nothing listens");
    assert_eq!(err.io_kind(), Some(io::ErrorKind::ConnectionRefused));
}

#[tokio::test]
async fn test_server_start_twice_is_rejected() {
    let config = NetworkConfig::default_with_overrides(|c| {
        c.server.address = "127.0.0.1:0".to_string();
    });
    let mut server = Server::bind(&config).unwrap();
    server.start().unwrap();
    assert!(matches!(
        server.start(),
        Err(TransportError::ListenerUnavailable)
    ));
    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_server_stop_before_start_reports_not_running() {
    let config = NetworkConfig::default_with_overrides(|c| {
        c.server.address = "127.0.0.1:0".to_string();
    });
    let mut server = Server::bind(&config).unwrap();
    assert!(matches!(
        server.stop().await,
        Err(TransportError::NotRunning)
    ));
}

// ============================================================================
// NODE LIFECYCLE
// ============================================================================

#[test]
fn test_tick_before_start_is_rejected() {
    let node = Node::new(&Default::default());
    assert!(matches!(node.tick(), Err(TransportError::NotRunning)));
}

#[test]
fn test_node_restart_after_stop() {
    let node = Node::new(&Default::default());
    node.start().unwrap();
    assert!(matches!(node.start(), Err(TransportError::AlreadyRunning)));
    assert_eq!(node.stop().unwrap(), 0);
    assert!(matches!(node.stop(), Err(TransportError::NotRunning)));
    node.start().unwrap();
    assert!(node.is_running());
}

#[test]
fn test_send_with_no_connections() {
    let node = Node::new(&Default::default());
    node.start().unwrap();

    let report = node.send(&Packet::from(&b"nobody"[..]));
    assert_eq!(report.attempted, 0);
    assert!(report.delivered.is_empty());
    assert!(report.is_complete());
}

#[test]
fn test_empty_packet_broadcast_is_harmless() {
    let node = Node::new(&Default::default());
    node.start().unwrap();
    let report = node.send(&Packet::from(Vec::new()));
    assert!(report.is_complete());
}

// ============================================================================
// REGISTRY BOUNDARIES
// ============================================================================

#[test]
fn test_remove_at_on_empty_registry() {
    let registry = ConnectionRegistry::new();
    match registry.remove_at(0) {
        Err(TransportError::OutOfRange { index, len }) => {
            assert_eq!(index, 0);
            assert_eq!(len, 0);
        }
        other => panic!("expected OutOfRange, got {other:?}"),
    }
}

#[test]
fn test_get_past_end() {
    let registry = ConnectionRegistry::new();
    assert!(matches!(
        registry.get(3),
        Err(TransportError::OutOfRange { index: 3, len: 0 })
    ));
}

#[test]
fn test_clear_silently_on_empty_registry() {
    let registry = ConnectionRegistry::new();
    assert!(registry.clear_silently().unwrap().is_empty());
}

// ============================================================================
// PACKETS
// ============================================================================

#[test]
fn test_packet_len_clamped_to_buffer() {
    let packet = Packet::with_len(vec![1u8, 2, 3], 10);
    assert_eq!(packet.len(), 3);
    assert_eq!(packet.payload(), &[1, 2, 3]);
}

#[test]
fn test_packet_payload_excludes_trailing_capacity() {
    let packet = Packet::with_len(vec![7u8; 256], 4);
    assert_eq!(packet.payload(), &[7, 7, 7, 7]);
    assert_eq!(packet.buffer().len(), 256);
}
