//! # Arena Server Library
//!
//! Authoritative UDP server for a small top-down shooter. It owns the only
//! canonical copy of the world, relays client-reported player movement, and
//! simulates projectiles ("bolts") so every client sees the same shots.
//!
//! ## Core Responsibilities
//!
//! ### Session Tracking
//! Clients pick their own 128-bit id and announce themselves with CONNECT.
//! The server remembers where each client lives and how long it has been
//! since its last HEARTBEAT. Quiet clients are evicted and everyone else is
//! told they left.
//!
//! ### Bolt Simulation
//! Bolts are spawned by clients but moved by the server. Every tick each bolt
//! advances along its heading, bolts leaving the arena are despawned, and the
//! full position of every live bolt goes out to every client.
//!
//! ### Relay
//! Player movement is client-authoritative: UPDATE_PLAYER datagrams are passed
//! on unchanged to everyone except the sender.
//!
//! ## Architecture Design
//!
//! ### Three Loops, Two Registries
//! Three tokio tasks run side by side and share one socket:
//! - **I/O loop**: receives one datagram at a time and dispatches it by kind
//! - **Simulation loop**: steps bolts and broadcasts their state every tick
//! - **Heartbeat monitor**: ages liveness timers and evicts silent clients
//!
//! They coordinate only through the [`session::SessionRegistry`] and the
//! [`actors::ActorRegistry`]. Each registry sits behind its own lock, and
//! every operation on it is a single critical section. No task ever holds
//! both locks at once.
//!
//! ### Fire-and-Forget Transport
//! Nothing is acknowledged or retransmitted. Lost bolt updates are covered by
//! the next tick's full-state broadcast; a failed send to one peer is logged
//! and the broadcast carries on.
//!
//! ## Module Organization
//!
//! ### Session Module (`session`)
//! Client id to address and liveness timer.
//!
//! ### Actors Module (`actors`, `pool`)
//! Players and bolts, plus the pool bolts are drawn from and returned to.
//!
//! ### Network Module (`network`)
//! Socket setup, datagram dispatch, outbound delivery and the server
//! lifecycle (bind, start, shutdown).
//!
//! ### Simulation and Heartbeat Modules (`simulation`, `heartbeat`)
//! The two periodic loops and their per-iteration step functions.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::bind(ServerConfig::default().with_tick_rate(60)).await?;
//!     let handle = server.start();
//!
//!     tokio::signal::ctrl_c().await?;
//!
//!     // Joins heartbeat, simulation, then I/O
//!     handle.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod actors;
pub mod config;
pub mod error;
pub mod heartbeat;
pub mod logging;
pub mod network;
pub mod pool;
pub mod session;
pub mod simulation;

pub use error::ServerError;
