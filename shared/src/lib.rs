//! Types shared between the arena server and its clients: the fixed-header
//! binary protocol and the replicated NetActor model.

pub mod actor;
pub mod protocol;

pub use actor::{Arena, Bolt, NetActor, Player, Transform};
pub use protocol::{Frame, Message, MessageKind, ProtocolError};

/// Width of the arena in world units. Bolts leaving `0..=WORLD_WIDTH` are despawned.
pub const WORLD_WIDTH: f32 = 2000.0;
/// Height of the arena in world units.
pub const WORLD_HEIGHT: f32 = 1000.0;

/// Length of the fixed header: payload length, kind tag and sender id.
pub const HEADER_LENGTH: usize = 4 + 1 + 16;
/// Largest datagram either side sends or expects to receive.
pub const PACKET_LENGTH: usize = 128;

/// Milliseconds without a heartbeat before a session is evicted.
pub const HEARTBEAT_TIMEOUT_MS: u64 = 5_000;
