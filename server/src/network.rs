//! Server network layer: socket setup, datagram dispatch and lifecycle

use crate::actors::ActorRegistry;
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::heartbeat::run_heartbeat_monitor;
use crate::session::SessionRegistry;
use crate::simulation::run_simulation_loop;
use log::{debug, error, info, warn};
use shared::{Frame, Message, Player};
use socket2::{Domain, Protocol, Socket, Type};
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// One encoded datagram and everyone it goes to
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub datagram: Vec<u8>,
    pub recipients: Vec<SocketAddr>,
}

impl Outbound {
    pub fn to(addr: SocketAddr, datagram: Vec<u8>) -> Self {
        Self {
            datagram,
            recipients: vec![addr],
        }
    }

    pub fn broadcast(recipients: Vec<SocketAddr>, datagram: Vec<u8>) -> Self {
        Self {
            datagram,
            recipients,
        }
    }
}

/// State shared by the I/O, simulation and heartbeat tasks
#[derive(Debug)]
pub struct ServerState {
    pub sessions: SessionRegistry,
    pub actors: ActorRegistry,
    pub config: ServerConfig,
}

impl ServerState {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            sessions: SessionRegistry::new(),
            actors: ActorRegistry::new(config.bolt_pool_capacity),
            config,
        }
    }
}

/// Sends every outbound datagram. A failed send is logged and skipped so one
/// unreachable peer never cuts a broadcast short. Returns the failure count.
pub async fn deliver(socket: &UdpSocket, outbound: &[Outbound]) -> usize {
    let mut failures = 0;
    for message in outbound {
        for addr in &message.recipients {
            if let Err(source) = socket.send_to(&message.datagram, addr).await {
                let err = ServerError::SendFailure {
                    addr: *addr,
                    source,
                };
                warn!("{}", err);
                failures += 1;
            }
        }
    }
    failures
}

/// Processes one received datagram.
///
/// Applies at most one registry change and returns the datagrams to send.
/// Errors are scoped to this datagram; the caller logs and moves on.
pub async fn handle_datagram(
    state: &ServerState,
    datagram: &[u8],
    from: SocketAddr,
) -> Result<Vec<Outbound>, ServerError> {
    let frame = if state.config.strict_frames {
        Frame::decode_strict(datagram)?
    } else {
        Frame::decode(datagram)?
    };
    let sender = frame.sender;

    match frame.message {
        Message::Connect => handle_connect(state, sender, from).await,
        Message::Disconnect => handle_disconnect(state, sender).await,
        Message::Heartbeat => {
            state.sessions.touch(sender).await?;
            Ok(Vec::new())
        }
        Message::UpdatePlayer => {
            // Client-authoritative: the server relays the transform without
            // keeping or checking a copy.
            state.sessions.require(sender).await?;
            relay(state, sender, datagram).await
        }
        Message::SpawnBolt(spawn) => {
            state.sessions.require(sender).await?;
            state.actors.spawn_bolt(sender, &spawn).await?;
            relay(state, sender, datagram).await
        }
        other => {
            debug!(
                "Ignoring server-bound {:?} from {} ({})",
                other.kind(),
                sender,
                from
            );
            Ok(Vec::new())
        }
    }
}

async fn handle_connect(
    state: &ServerState,
    sender: Uuid,
    from: SocketAddr,
) -> Result<Vec<Outbound>, ServerError> {
    state.sessions.register(sender, from).await?;
    if let Err(err) = state.actors.insert_player(Player::new(sender)).await {
        // Id held by a bolt; undo the session so both registries agree.
        state.sessions.discard(sender).await;
        info!("Connect from {} rejected, session rolled back", sender);
        return Err(err);
    }

    let mut outbound = vec![Outbound::to(
        from,
        Frame::new(sender, Message::ConnectHandshake).encode()?,
    )];

    let mut world = Vec::new();
    state
        .actors
        .for_each(|actor| {
            if actor.id() != sender {
                world.push(Frame::spawn_for(actor));
            }
        })
        .await;
    for frame in world {
        outbound.push(Outbound::to(from, frame.encode()?));
    }

    let others = state.sessions.addrs_except(Some(sender)).await;
    if !others.is_empty() {
        outbound.push(Outbound::broadcast(
            others,
            Frame::new(sender, Message::Connect).encode()?,
        ));
    }

    Ok(outbound)
}

async fn handle_disconnect(state: &ServerState, sender: Uuid) -> Result<Vec<Outbound>, ServerError> {
    state.sessions.remove(sender).await?;
    if let Err(err) = state.actors.remove_by_id(sender).await {
        debug!("Disconnecting client had no player: {}", err);
    }

    let remaining = state.sessions.addrs().await;
    if remaining.is_empty() {
        return Ok(Vec::new());
    }
    Ok(vec![Outbound::broadcast(
        remaining,
        Frame::new(sender, Message::Disconnect).encode()?,
    )])
}

async fn relay(
    state: &ServerState,
    sender: Uuid,
    datagram: &[u8],
) -> Result<Vec<Outbound>, ServerError> {
    let others = state.sessions.addrs_except(Some(sender)).await;
    if others.is_empty() {
        return Ok(Vec::new());
    }
    Ok(vec![Outbound::broadcast(others, datagram.to_vec())])
}

/// Receives and dispatches datagrams one at a time until cancelled.
async fn run_io_loop(state: Arc<ServerState>, socket: Arc<UdpSocket>, shutdown: CancellationToken) {
    let mut buffer = vec![0u8; state.config.packet_length];

    loop {
        let received = tokio::select! {
            _ = shutdown.cancelled() => break,
            received = socket.recv_from(&mut buffer) => received,
        };

        let (len, from) = match received {
            Ok(received) => received,
            Err(e) => {
                error!("Error receiving packet: {}", e);
                tokio::time::sleep(Duration::from_millis(10)).await;
                continue;
            }
        };

        match handle_datagram(&state, &buffer[..len], from).await {
            Ok(outbound) => {
                deliver(&socket, &outbound).await;
            }
            Err(err) => warn!("Discarding datagram from {}: {}", from, err),
        }
    }

    info!("I/O loop stopped");
}

fn open_socket(addr: SocketAddr, buffer_size: usize) -> std::io::Result<std::net::UdpSocket> {
    let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_recv_buffer_size(buffer_size)?;
    socket.set_send_buffer_size(buffer_size)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    Ok(socket.into())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Stopped,
    Running,
    Stopping,
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Lifecycle::Stopped => "stopped",
            Lifecycle::Running => "running",
            Lifecycle::Stopping => "stopping",
        };
        f.write_str(name)
    }
}

/// A bound server that has not started its loops yet
pub struct Server {
    state: Arc<ServerState>,
    socket: Arc<UdpSocket>,
    local_addr: SocketAddr,
}

impl Server {
    /// Opens the UDP socket. Failure here is fatal to the caller.
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        let addr = config.bind_addr;
        let socket_init = |source: std::io::Error| ServerError::SocketInit { addr, source };

        let std_socket = open_socket(addr, config.socket_buffer_size).map_err(socket_init)?;
        let socket = UdpSocket::from_std(std_socket).map_err(socket_init)?;
        let local_addr = socket.local_addr().map_err(socket_init)?;
        info!("Server listening on {}", local_addr);

        Ok(Server {
            state: Arc::new(ServerState::new(config)),
            socket: Arc::new(socket),
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// A bound server has not started its loops.
    pub fn lifecycle(&self) -> Lifecycle {
        Lifecycle::Stopped
    }

    /// Spawns the I/O, simulation and heartbeat tasks.
    pub fn start(self) -> ServerHandle {
        let shutdown = CancellationToken::new();

        let io = tokio::spawn(run_io_loop(
            Arc::clone(&self.state),
            Arc::clone(&self.socket),
            shutdown.clone(),
        ));
        let simulation = tokio::spawn(run_simulation_loop(
            Arc::clone(&self.state),
            Arc::clone(&self.socket),
            shutdown.clone(),
        ));
        let heartbeat = tokio::spawn(run_heartbeat_monitor(
            Arc::clone(&self.state),
            Arc::clone(&self.socket),
            shutdown.clone(),
        ));

        let (lifecycle, _) = watch::channel(Lifecycle::Running);
        info!("Server {}", Lifecycle::Running);
        ServerHandle {
            state: self.state,
            local_addr: self.local_addr,
            shutdown,
            io,
            simulation,
            heartbeat,
            lifecycle,
        }
    }
}

/// A running server
pub struct ServerHandle {
    state: Arc<ServerState>,
    local_addr: SocketAddr,
    shutdown: CancellationToken,
    io: JoinHandle<()>,
    simulation: JoinHandle<()>,
    heartbeat: JoinHandle<()>,
    lifecycle: watch::Sender<Lifecycle>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn state(&self) -> &Arc<ServerState> {
        &self.state
    }

    pub fn lifecycle(&self) -> Lifecycle {
        *self.lifecycle.borrow()
    }

    /// Follows lifecycle transitions, including the ones made by `shutdown`
    /// after the handle is gone.
    pub fn subscribe(&self) -> watch::Receiver<Lifecycle> {
        self.lifecycle.subscribe()
    }

    /// Cancels all loops and joins heartbeat, then simulation, then I/O.
    pub async fn shutdown(self) -> Lifecycle {
        self.lifecycle.send_replace(Lifecycle::Stopping);
        info!("Server {}", Lifecycle::Stopping);
        self.shutdown.cancel();

        for (name, task) in [
            ("heartbeat", self.heartbeat),
            ("simulation", self.simulation),
            ("io", self.io),
        ] {
            if let Err(e) = task.await {
                error!("{} task did not finish cleanly: {}", name, e);
            }
        }

        self.lifecycle.send_replace(Lifecycle::Stopped);
        info!("Server {}", Lifecycle::Stopped);
        Lifecycle::Stopped
    }
}
