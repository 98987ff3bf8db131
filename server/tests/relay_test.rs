//! Integration tests for the relay: handshake, presence sync, chat fan-out,
//! disconnect announcements, and shutdown.

use std::time::Duration;

use lanchat_server::client::RelayClient;
use lanchat_server::proto::{encode, encode_raw, ChatMessage, Disconnect, Handshake, PacketType, ServerEvent, UserInfo};
use lanchat_server::server::Server;
use lanchat_server::state::RelaySettings;

const EVENT_TIMEOUT: Duration = Duration::from_secs(3);

/// Helper: start a relay on a random loopback port.
async fn start_test_server(settings: RelaySettings) -> Server {
    Server::bind("127.0.0.1:0".parse().unwrap(), settings)
        .await
        .expect("Failed to bind relay")
}

fn fast_settings() -> RelaySettings {
    RelaySettings {
        monitor_interval: Duration::from_millis(50),
        ..RelaySettings::default()
    }
}

async fn next_event(client: &mut RelayClient) -> ServerEvent {
    tokio::time::timeout(EVENT_TIMEOUT, client.next_event())
        .await
        .expect("Timed out waiting for event")
        .expect("Failed to read event")
        .expect("Server closed the connection")
}

async fn expect_user_info(client: &mut RelayClient) -> UserInfo {
    match next_event(client).await {
        ServerEvent::UserInfo(info) => info,
        other => panic!("Expected UserInfo, got {other:?}"),
    }
}

/// Wait for the server to close this client, tolerating a reset.
async fn expect_closed(client: &mut RelayClient) {
    let result = tokio::time::timeout(EVENT_TIMEOUT, client.next_event())
        .await
        .expect("Timed out waiting for close");
    assert!(
        matches!(result, Ok(None) | Err(_)),
        "Expected connection to be closed, got {result:?}"
    );
}

async fn wait_for_registered(server: &Server, count: usize) {
    tokio::time::timeout(EVENT_TIMEOUT, async {
        while server.state().registry.len() != count {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("Registry never reached expected size");
}

#[tokio::test]
async fn test_join_chat_and_leave() {
    let server = start_test_server(fast_settings()).await;
    let addr = server.local_addr();

    let mut alice = RelayClient::join(addr, "alice", &[1, 2, 3]).await.unwrap();
    let alice_info = expect_user_info(&mut alice).await;
    assert_eq!(alice_info.username, "alice");
    assert_eq!(alice_info.avatar, vec![1, 2, 3]);

    let mut bob = RelayClient::join(addr, "bob", &[]).await.unwrap();

    // Bob sees himself first, then the existing roster.
    let bob_info = expect_user_info(&mut bob).await;
    assert_eq!(bob_info.username, "bob");
    assert_eq!(expect_user_info(&mut bob).await, alice_info);

    // Alice is told about Bob.
    assert_eq!(expect_user_info(&mut alice).await, bob_info);

    alice.send_message("hi").await.unwrap();
    let expected = ServerEvent::Message(ChatMessage {
        sender_id: alice_info.sender_id.clone(),
        text: "hi".to_string(),
    });
    assert_eq!(next_event(&mut bob).await, expected);
    assert_eq!(next_event(&mut alice).await, expected);

    alice.close().await.unwrap();
    assert_eq!(
        next_event(&mut bob).await,
        ServerEvent::Disconnect(Disconnect {
            sender_id: alice_info.sender_id.clone()
        })
    );
    wait_for_registered(&server, 1).await;

    server.shutdown().await;
}

#[tokio::test]
async fn test_message_before_handshake_is_rejected() {
    let server = start_test_server(fast_settings()).await;
    let mut client = RelayClient::connect(server.local_addr()).await.unwrap();

    client.send_message("too early").await.unwrap();
    expect_closed(&mut client).await;
    assert!(server.state().registry.is_empty());

    server.shutdown().await;
}

#[tokio::test]
async fn test_handshake_timeout_drops_silent_client() {
    let server = start_test_server(RelaySettings {
        handshake_timeout: Duration::from_millis(100),
        ..fast_settings()
    })
    .await;
    let mut client = RelayClient::connect(server.local_addr()).await.unwrap();

    expect_closed(&mut client).await;
    assert!(server.state().registry.is_empty());

    server.shutdown().await;
}

#[tokio::test]
async fn test_oversized_frame_drops_only_sender() {
    let server = start_test_server(RelaySettings {
        max_payload_bytes: 1024,
        ..fast_settings()
    })
    .await;
    let addr = server.local_addr();

    let mut watcher = RelayClient::join(addr, "watcher", &[]).await.unwrap();
    expect_user_info(&mut watcher).await;

    let mut flooder = RelayClient::join(addr, "flooder", &[]).await.unwrap();
    let flooder_info = expect_user_info(&mut flooder).await;
    expect_user_info(&mut flooder).await;
    assert_eq!(expect_user_info(&mut watcher).await, flooder_info);

    // Header only: claims a payload far past the limit.
    let mut header = Vec::new();
    header.extend_from_slice(&PacketType::Message.as_i32().to_le_bytes());
    header.extend_from_slice(&4096i32.to_le_bytes());
    flooder.send_frame(&header).await.unwrap();

    expect_closed(&mut flooder).await;
    assert_eq!(
        next_event(&mut watcher).await,
        ServerEvent::Disconnect(Disconnect {
            sender_id: flooder_info.sender_id
        })
    );
    wait_for_registered(&server, 1).await;

    server.shutdown().await;
}

#[tokio::test]
async fn test_unknown_packet_type_drops_connection() {
    let server = start_test_server(fast_settings()).await;
    let mut client = RelayClient::join(server.local_addr(), "odd", &[]).await.unwrap();
    expect_user_info(&mut client).await;

    client.send_frame(&encode_raw(42, b"").unwrap()).await.unwrap();

    expect_closed(&mut client).await;
    wait_for_registered(&server, 0).await;

    server.shutdown().await;
}

#[tokio::test]
async fn test_second_user_info_drops_connection() {
    let server = start_test_server(fast_settings()).await;
    let mut client = RelayClient::join(server.local_addr(), "twice", &[]).await.unwrap();
    expect_user_info(&mut client).await;

    client
        .send_frame(&encode(PacketType::UserInfo, b"").unwrap())
        .await
        .unwrap();

    expect_closed(&mut client).await;
    wait_for_registered(&server, 0).await;

    server.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_closes_clients() {
    let server = start_test_server(fast_settings()).await;
    let addr = server.local_addr();

    let mut client = RelayClient::join(addr, "stay", &[]).await.unwrap();
    expect_user_info(&mut client).await;
    wait_for_registered(&server, 1).await;

    server.shutdown().await;

    expect_closed(&mut client).await;
    assert!(
        tokio::net::TcpStream::connect(addr).await.is_err(),
        "Listener should be closed after shutdown"
    );
}

#[tokio::test]
async fn test_shutdown_abandons_pending_handshake() {
    let server = start_test_server(fast_settings()).await;
    let state = server.state().clone();

    // Accepted but not yet identified.
    let mut late = RelayClient::connect(server.local_addr()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    server.shutdown().await;

    // The write may already fail if the server side is gone.
    let _ = late
        .send(&Handshake {
            username: "late".to_string(),
            avatar: Vec::new(),
        })
        .await;

    expect_closed(&mut late).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(state.registry.is_empty(), "Stopped relay must not register late clients");
}
