use rand::Rng;
use shared::protocol::SpawnBolt;
use shared::{Frame, Message, PACKET_LENGTH, WORLD_HEIGHT, WORLD_WIDTH};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{interval, timeout, Instant};
use uuid::Uuid;

/// Connects to a local server, fires a few bolts and prints what comes back.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    println!("Client socket bound to {}", socket.local_addr()?);

    let server_addr = "127.0.0.1:8080".parse::<SocketAddr>()?;
    let client_id = Uuid::new_v4();

    println!("Connecting to {} as {}", server_addr, client_id);
    socket
        .send_to(&Frame::new(client_id, Message::Connect).encode()?, server_addr)
        .await?;

    let mut buf = [0u8; PACKET_LENGTH];
    let (len, _) = timeout(Duration::from_secs(2), socket.recv_from(&mut buf)).await??;
    let handshake = Frame::decode(&buf[..len])?;
    if handshake.message != Message::ConnectHandshake || handshake.sender != client_id {
        println!("Expected CONNECT_HANDSHAKE but got: {:?}", handshake);
        return Ok(());
    }
    println!("Connection accepted with client ID: {}", handshake.sender);

    let mut rng = rand::thread_rng();
    let mut heartbeat = interval(Duration::from_millis(500));
    let mut trigger = interval(Duration::from_secs(1));
    let deadline = Instant::now() + Duration::from_secs(10);

    while Instant::now() < deadline {
        tokio::select! {
            _ = heartbeat.tick() => {
                socket
                    .send_to(&Frame::new(client_id, Message::Heartbeat).encode()?, server_addr)
                    .await?;
            }
            _ = trigger.tick() => {
                let spawn = SpawnBolt {
                    bolt_id: Uuid::new_v4(),
                    x: WORLD_WIDTH / 2.0,
                    y: WORLD_HEIGHT / 2.0,
                    rotation: rng.gen_range(0.0..360.0),
                    speed: rng.gen_range(100.0..400.0),
                };
                println!("Firing bolt {} at {:.0} degrees", spawn.bolt_id, spawn.rotation);
                socket
                    .send_to(&Frame::new(client_id, Message::SpawnBolt(spawn)).encode()?, server_addr)
                    .await?;
            }
            received = socket.recv_from(&mut buf) => {
                let (len, _) = received?;
                match Frame::decode(&buf[..len]) {
                    Ok(Frame { sender, message: Message::Update(update), .. }) => println!(
                        "  Bolt {} (shooter {}): pos=({:.1}, {:.1})",
                        update.bolt_id, sender, update.x, update.y
                    ),
                    Ok(frame) => println!("Received {:?} from {}", frame.kind(), frame.sender),
                    Err(e) => println!("Failed to decode datagram: {}", e),
                }
            }
        }
    }

    println!("Sending disconnect request");
    socket
        .send_to(&Frame::new(client_id, Message::Disconnect).encode()?, server_addr)
        .await?;

    println!("Test client finished");
    Ok(())
}
