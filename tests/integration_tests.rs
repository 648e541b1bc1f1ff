//! Integration tests for the arena server
//!
//! These tests run a real server on a loopback socket and talk to it with
//! plain UDP clients, the way a game client would.

use assert_approx_eq::assert_approx_eq;
use server::config::ServerConfig;
use server::network::{Server, ServerHandle};
use shared::protocol::SpawnBolt;
use shared::{Frame, Message, MessageKind, PACKET_LENGTH};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{sleep, timeout, Instant};
use uuid::Uuid;

const WAIT: Duration = Duration::from_secs(2);

struct TestClient {
    id: Uuid,
    socket: UdpSocket,
    server: SocketAddr,
}

impl TestClient {
    async fn new(server: SocketAddr) -> Self {
        let socket = UdpSocket::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind client socket");
        Self {
            id: Uuid::new_v4(),
            socket,
            server,
        }
    }

    async fn send(&self, message: Message) {
        self.send_raw(&Frame::new(self.id, message).encode().unwrap())
            .await;
    }

    async fn send_raw(&self, datagram: &[u8]) {
        self.socket.send_to(datagram, self.server).await.unwrap();
    }

    async fn recv(&self, within: Duration) -> Option<(Frame, Vec<u8>)> {
        let mut buf = [0u8; PACKET_LENGTH];
        match timeout(within, self.socket.recv_from(&mut buf)).await {
            Ok(Ok((len, _))) => {
                let raw = buf[..len].to_vec();
                Some((Frame::decode(&raw).expect("server sent a bad frame"), raw))
            }
            _ => None,
        }
    }

    /// Waits for the next frame of `kind`, skipping anything else.
    async fn recv_kind(&self, kind: MessageKind) -> (Frame, Vec<u8>) {
        let deadline = Instant::now() + WAIT;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let (frame, raw) = self
                .recv(remaining)
                .await
                .unwrap_or_else(|| panic!("Timed out waiting for {:?}", kind));
            if frame.kind() == kind {
                return (frame, raw);
            }
        }
    }

    /// Asserts that no frame of `kind` arrives within `window`.
    async fn expect_no_kind(&self, kind: MessageKind, window: Duration) {
        let deadline = Instant::now() + window;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return;
            }
            match self.recv(remaining).await {
                Some((frame, _)) if frame.kind() == kind => {
                    panic!("Unexpected {:?} from {}", kind, frame.sender)
                }
                Some(_) => continue,
                None => return,
            }
        }
    }

    async fn connect(&self) {
        self.send(Message::Connect).await;
        let (handshake, _) = self.recv_kind(MessageKind::ConnectHandshake).await;
        assert_eq!(handshake.sender, self.id);
    }
}

async fn start_server(config: ServerConfig) -> ServerHandle {
    let config = ServerConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        ..config
    };
    Server::bind(config)
        .await
        .expect("Failed to bind server")
        .start()
}

async fn wait_until<F, Fut>(mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = Instant::now() + WAIT;
    while !condition().await {
        assert!(Instant::now() < deadline, "condition not reached in time");
        sleep(Duration::from_millis(10)).await;
    }
}

/// CONNECTION LIFECYCLE TESTS
mod connection_tests {
    use super::*;

    /// Second client gets its handshake, then the first client's player;
    /// the first client hears about the second.
    #[tokio::test]
    async fn two_clients_see_each_other() {
        let server = start_server(ServerConfig::default()).await;
        let a = TestClient::new(server.local_addr()).await;
        let b = TestClient::new(server.local_addr()).await;

        a.connect().await;

        b.send(Message::Connect).await;
        let (handshake, _) = b.recv(WAIT).await.expect("handshake");
        assert_eq!(handshake.kind(), MessageKind::ConnectHandshake);
        assert_eq!(handshake.sender, b.id);
        let (replay, _) = b.recv_kind(MessageKind::Connect).await;
        assert_eq!(replay.sender, a.id);

        let (announce, _) = a.recv_kind(MessageKind::Connect).await;
        assert_eq!(announce.sender, b.id);

        assert_eq!(server.state().sessions.len().await, 2);
        assert_eq!(server.state().actors.len().await, 2);
        server.shutdown().await;
    }

    #[tokio::test]
    async fn duplicate_connect_is_ignored() {
        let server = start_server(ServerConfig::default()).await;
        let a = TestClient::new(server.local_addr()).await;

        a.connect().await;
        a.send(Message::Connect).await;
        a.expect_no_kind(MessageKind::ConnectHandshake, Duration::from_millis(200))
            .await;

        assert_eq!(server.state().sessions.len().await, 1);
        server.shutdown().await;
    }

    #[tokio::test]
    async fn disconnect_is_announced_and_player_removed() {
        let server = start_server(ServerConfig::default()).await;
        let a = TestClient::new(server.local_addr()).await;
        let b = TestClient::new(server.local_addr()).await;
        a.connect().await;
        b.connect().await;

        a.send(Message::Disconnect).await;
        let (gone, _) = b.recv_kind(MessageKind::Disconnect).await;
        assert_eq!(gone.sender, a.id);

        assert!(!server.state().actors.contains(a.id).await);
        assert!(!server.state().sessions.contains(a.id).await);
        server.shutdown().await;
    }

    #[tokio::test]
    async fn silent_client_is_evicted() {
        let config = ServerConfig {
            heartbeat_timeout: Duration::from_millis(300),
            heartbeat_interval: Duration::from_millis(20),
            ..ServerConfig::default()
        };
        let server = start_server(config).await;
        let quiet = TestClient::new(server.local_addr()).await;
        let alive = TestClient::new(server.local_addr()).await;
        quiet.connect().await;
        alive.connect().await;

        let deadline = Instant::now() + WAIT;
        let evicted = loop {
            assert!(Instant::now() < deadline, "quiet client was never evicted");
            alive.send(Message::Heartbeat).await;
            match alive.recv(Duration::from_millis(50)).await {
                Some((frame, _)) if frame.kind() == MessageKind::Disconnect => break frame,
                _ => continue,
            }
        };

        assert_eq!(evicted.sender, quiet.id);
        assert!(server.state().sessions.contains(alive.id).await);
        assert!(!server.state().sessions.contains(quiet.id).await);
        assert!(!server.state().actors.contains(quiet.id).await);
        server.shutdown().await;
    }
}

/// BOLT REPLICATION TESTS
mod bolt_tests {
    use super::*;

    /// Spawned bolt is relayed verbatim, then streamed as authoritative updates.
    #[tokio::test]
    async fn spawned_bolt_is_relayed_and_simulated() {
        let server = start_server(ServerConfig::default()).await;
        let a = TestClient::new(server.local_addr()).await;
        let b = TestClient::new(server.local_addr()).await;
        a.connect().await;
        b.connect().await;

        let bolt_id = Uuid::new_v4();
        let spawn = SpawnBolt {
            bolt_id,
            x: 10.0,
            y: 10.0,
            rotation: 0.0,
            speed: 5.0,
        };
        let raw = Frame::new(a.id, Message::SpawnBolt(spawn)).encode().unwrap();
        a.send_raw(&raw).await;

        let (relayed, relayed_raw) = b.recv_kind(MessageKind::SpawnBolt).await;
        assert_eq!(relayed.sender, a.id);
        assert_eq!(relayed_raw, raw);

        let mut last_x = 10.0;
        for _ in 0..3 {
            let (frame, _) = b.recv_kind(MessageKind::Update).await;
            assert_eq!(frame.sender, a.id);
            match frame.message {
                Message::Update(update) => {
                    assert_eq!(update.bolt_id, bolt_id);
                    assert_approx_eq!(update.y, 10.0);
                    assert_eq!(update.rotation, 0.0);
                    assert!(update.x >= last_x);
                    last_x = update.x;
                }
                other => panic!("Expected UPDATE, got {:?}", other),
            }
        }

        server.shutdown().await;
    }

    #[tokio::test]
    async fn escaping_bolt_is_removed() {
        let server = start_server(ServerConfig::default()).await;
        let a = TestClient::new(server.local_addr()).await;
        a.connect().await;

        let bolt_id = Uuid::new_v4();
        a.send(Message::SpawnBolt(SpawnBolt {
            bolt_id,
            x: 1999.0,
            y: 500.0,
            rotation: 0.0,
            speed: 1000.0,
        }))
        .await;

        let (removed, _) = a.recv_kind(MessageKind::RemoveBolt).await;
        assert_eq!(removed.sender, a.id);
        assert_eq!(
            removed.message,
            Message::RemoveBolt(shared::protocol::RemoveBolt { bolt_id })
        );

        let state = server.state().clone();
        wait_until(|| {
            let state = state.clone();
            async move { !state.actors.contains(bolt_id).await }
        })
        .await;
        server.shutdown().await;
    }

    #[tokio::test]
    async fn late_joiner_learns_about_live_bolts() {
        let server = start_server(ServerConfig::default()).await;
        let a = TestClient::new(server.local_addr()).await;
        a.connect().await;

        let bolt_id = Uuid::new_v4();
        a.send(Message::SpawnBolt(SpawnBolt {
            bolt_id,
            x: 100.0,
            y: 100.0,
            rotation: 90.0,
            speed: 1.0,
        }))
        .await;
        let state = server.state().clone();
        wait_until(|| {
            let state = state.clone();
            async move { state.actors.contains(bolt_id).await }
        })
        .await;

        let b = TestClient::new(server.local_addr()).await;
        b.connect().await;
        let (replay, _) = b.recv_kind(MessageKind::SpawnBolt).await;
        assert_eq!(replay.sender, a.id);
        match replay.message {
            Message::SpawnBolt(spawn) => {
                assert_eq!(spawn.bolt_id, bolt_id);
                assert_eq!(spawn.speed, 1.0);
            }
            other => panic!("Expected SPAWN_BOLT, got {:?}", other),
        }

        server.shutdown().await;
    }
}

/// ERROR HANDLING TESTS
mod robustness_tests {
    use super::*;

    #[tokio::test]
    async fn malformed_datagrams_do_not_stop_the_server() {
        let server = start_server(ServerConfig::default()).await;
        let a = TestClient::new(server.local_addr()).await;

        a.send_raw(&[]).await;
        a.send_raw(&[1, 2, 3]).await;
        a.send_raw(&[0xFF; PACKET_LENGTH]).await;
        let mut truncated_spawn = Frame::new(
            a.id,
            Message::SpawnBolt(SpawnBolt {
                bolt_id: Uuid::new_v4(),
                x: 0.0,
                y: 0.0,
                rotation: 0.0,
                speed: 0.0,
            }),
        )
        .encode()
        .unwrap();
        truncated_spawn.truncate(30);
        a.send_raw(&truncated_spawn).await;

        a.connect().await;
        assert_eq!(server.state().sessions.len().await, 1);
        server.shutdown().await;
    }

    #[tokio::test]
    async fn messages_from_unknown_clients_are_dropped() {
        let server = start_server(ServerConfig::default()).await;
        let member = TestClient::new(server.local_addr()).await;
        let stranger = TestClient::new(server.local_addr()).await;
        member.connect().await;

        stranger.send(Message::UpdatePlayer).await;
        stranger.send(Message::Heartbeat).await;
        stranger.send(Message::Disconnect).await;

        member
            .expect_no_kind(MessageKind::UpdatePlayer, Duration::from_millis(200))
            .await;
        assert_eq!(server.state().sessions.len().await, 1);
        server.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_completes_with_connected_clients() {
        let server = start_server(ServerConfig::default()).await;
        let a = TestClient::new(server.local_addr()).await;
        a.connect().await;

        let stopped = timeout(WAIT, server.shutdown()).await;
        assert!(stopped.is_ok(), "shutdown hung");
    }
}
