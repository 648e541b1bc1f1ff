//! Client session registry
//!
//! Tracks every connected client by its self-chosen 128-bit id:
//! - Network address for replies and broadcasts
//! - Liveness timer (milliseconds since the last heartbeat)
//!
//! Each operation takes the registry lock exactly once, so callers never see a
//! half-applied change and iteration never races a structural mutation.

use crate::error::ServerError;
use log::info;
use std::collections::HashMap;
use std::net::SocketAddr;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Server-side record of one connected client
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    /// Client-generated identifier, also the id of its Player actor
    pub id: Uuid,
    /// Source address of the CONNECT that created the session
    pub addr: SocketAddr,
    /// Time accumulated since the last heartbeat
    pub since_heartbeat_ms: u64,
}

impl Session {
    pub fn new(id: Uuid, addr: SocketAddr) -> Self {
        Self {
            id,
            addr,
            since_heartbeat_ms: 0,
        }
    }

    /// Returns true once the liveness timer has passed the timeout.
    pub fn is_timed_out(&self, timeout_ms: u64) -> bool {
        self.since_heartbeat_ms > timeout_ms
    }
}

/// Sessions evicted by a timeout sweep, together with everyone who should
/// hear about it.
#[derive(Debug, Default)]
pub struct Eviction {
    pub evicted: Vec<Session>,
    /// Every session known when the sweep ran, evicted ones included
    pub recipients: Vec<SocketAddr>,
}

/// Mutually exclusive registry of connected clients
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<Uuid, Session>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a session unless one already exists for `id`.
    pub async fn register(&self, id: Uuid, addr: SocketAddr) -> Result<Session, ServerError> {
        let mut sessions = self.sessions.lock().await;
        if sessions.contains_key(&id) {
            return Err(ServerError::DuplicateSession(id));
        }

        let session = Session::new(id, addr);
        sessions.insert(id, session.clone());
        info!("Client {} connected from {}", id, addr);
        Ok(session)
    }

    /// Resets the liveness timer of `id`.
    pub async fn touch(&self, id: Uuid) -> Result<(), ServerError> {
        let mut sessions = self.sessions.lock().await;
        match sessions.get_mut(&id) {
            Some(session) => {
                session.since_heartbeat_ms = 0;
                Ok(())
            }
            None => Err(ServerError::UnknownSession(id)),
        }
    }

    pub async fn remove(&self, id: Uuid) -> Result<Session, ServerError> {
        let mut sessions = self.sessions.lock().await;
        let session = sessions
            .remove(&id)
            .ok_or(ServerError::UnknownSession(id))?;
        info!("Client {} disconnected", id);
        Ok(session)
    }

    /// Drops a session without announcing a disconnect, undoing a
    /// registration whose connect could not complete.
    pub async fn discard(&self, id: Uuid) -> bool {
        self.sessions.lock().await.remove(&id).is_some()
    }

    pub async fn contains(&self, id: Uuid) -> bool {
        self.sessions.lock().await.contains_key(&id)
    }

    /// Fails with `UnknownSession` when `id` has not connected.
    pub async fn require(&self, id: Uuid) -> Result<(), ServerError> {
        if self.contains(id).await {
            Ok(())
        } else {
            Err(ServerError::UnknownSession(id))
        }
    }

    /// Visits every session while holding the lock.
    pub async fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&Session),
    {
        let sessions = self.sessions.lock().await;
        for session in sessions.values() {
            f(session);
        }
    }

    /// Addresses of every session except `exclude`.
    pub async fn addrs_except(&self, exclude: Option<Uuid>) -> Vec<SocketAddr> {
        let mut addrs = Vec::new();
        self.for_each(|session| {
            if Some(session.id) != exclude {
                addrs.push(session.addr);
            }
        })
        .await;
        addrs
    }

    pub async fn addrs(&self) -> Vec<SocketAddr> {
        self.addrs_except(None).await
    }

    /// Adds elapsed time to every session's liveness timer.
    pub async fn age_all(&self, delta_ms: u64) {
        let mut sessions = self.sessions.lock().await;
        for session in sessions.values_mut() {
            session.since_heartbeat_ms = session.since_heartbeat_ms.saturating_add(delta_ms);
        }
    }

    /// Removes every session past `timeout_ms`.
    ///
    /// Expired sessions are collected during the scan and removed after it,
    /// and the recipient list is captured before any removal.
    pub async fn evict_expired(&self, timeout_ms: u64) -> Eviction {
        let mut sessions = self.sessions.lock().await;

        let expired: Vec<Uuid> = sessions
            .values()
            .filter(|session| session.is_timed_out(timeout_ms))
            .map(|session| session.id)
            .collect();
        if expired.is_empty() {
            return Eviction::default();
        }

        let recipients = sessions.values().map(|session| session.addr).collect();
        let evicted = expired
            .iter()
            .filter_map(|id| sessions.remove(id))
            .collect();

        Eviction {
            evicted,
            recipients,
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }
}
