use shared::ProtocolError;
use std::net::SocketAddr;
use thiserror::Error;
use uuid::Uuid;

/// Everything that can go wrong while serving. Only `SocketInit` is fatal;
/// the rest are scoped to a single datagram or a single peer.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("malformed message: {0}")]
    MalformedMessage(#[from] ProtocolError),
    #[error("session {0} already exists")]
    DuplicateSession(Uuid),
    #[error("no session for {0}")]
    UnknownSession(Uuid),
    #[error("net actor {0} already exists")]
    DuplicateActor(Uuid),
    #[error("no net actor {0}")]
    UnknownActor(Uuid),
    #[error("failed to open socket on {addr}: {source}")]
    SocketInit {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to send to {addr}: {source}")]
    SendFailure {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}
