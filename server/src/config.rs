use shared::{Arena, HEARTBEAT_TIMEOUT_MS, PACKET_LENGTH};
use std::net::SocketAddr;
use std::time::Duration;

/// Runtime settings for a server instance
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the UDP socket binds to
    pub bind_addr: SocketAddr,
    /// Size of the per-datagram receive buffer
    pub packet_length: usize,
    /// Kernel send/receive buffer size requested for the socket
    pub socket_buffer_size: usize,
    /// Silence after which a session is evicted
    pub heartbeat_timeout: Duration,
    /// How often the heartbeat monitor ages sessions
    pub heartbeat_interval: Duration,
    /// Pacing of the simulation loop
    pub tick_interval: Duration,
    /// Bolts outside this rectangle are despawned
    pub arena: Arena,
    /// Reject frames whose declared payload length differs from what arrived
    pub strict_frames: bool,
    /// Released bolts kept for reuse
    pub bolt_pool_capacity: usize,
}

impl ServerConfig {
    /// Sets the simulation pacing from a rate in ticks per second.
    pub fn with_tick_rate(mut self, ticks_per_second: u32) -> Self {
        self.tick_interval = Duration::from_secs_f64(1.0 / f64::from(ticks_per_second.max(1)));
        self
    }

    pub fn heartbeat_timeout_ms(&self) -> u64 {
        self.heartbeat_timeout.as_millis() as u64
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            packet_length: PACKET_LENGTH,
            socket_buffer_size: PACKET_LENGTH,
            heartbeat_timeout: Duration::from_millis(HEARTBEAT_TIMEOUT_MS),
            heartbeat_interval: Duration::from_millis(100),
            tick_interval: Duration::from_millis(16),
            arena: Arena::default(),
            strict_frames: false,
            bolt_pool_capacity: 100,
        }
    }
}
