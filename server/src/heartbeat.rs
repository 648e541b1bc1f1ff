//! Heartbeat monitor
//!
//! Ages every session's liveness timer by real elapsed time and evicts the
//! sessions that have gone quiet for longer than the timeout.

use crate::error::ServerError;
use crate::network::{deliver, Outbound, ServerState};
use log::{debug, error, info, warn};
use shared::{Frame, Message, Player};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Ages sessions by `elapsed_ms` and evicts the expired ones.
///
/// Every session known at the time of the sweep, the evicted ones included,
/// is told about each eviction. The evicted client's player is removed too.
pub async fn sweep(state: &ServerState, elapsed_ms: u64) -> Result<Vec<Outbound>, ServerError> {
    state.sessions.age_all(elapsed_ms).await;

    let eviction = state
        .sessions
        .evict_expired(state.config.heartbeat_timeout_ms())
        .await;
    if eviction.evicted.is_empty() {
        return Ok(Vec::new());
    }

    for session in &eviction.evicted {
        info!("Dropping client {} due to lack of heartbeat", session.id);
        drop_evicted_player(state, session.id).await;
    }

    eviction
        .evicted
        .iter()
        .map(|session| -> Result<Outbound, ServerError> {
            let datagram = Frame::new(session.id, Message::Disconnect).encode()?;
            Ok(Outbound::broadcast(eviction.recipients.clone(), datagram))
        })
        .collect()
}

/// Removes the player of an evicted session.
///
/// The session is already gone, so the client may have reconnected in
/// between; its fresh player is put back in that case.
async fn drop_evicted_player(state: &ServerState, id: Uuid) {
    if let Err(e) = state.actors.remove_by_id(id).await {
        debug!("Evicted client had no player: {}", e);
    }

    if state.sessions.contains(id).await {
        debug!("Client {} reconnected while being evicted", id);
        if let Err(e) = state.actors.insert_player(Player::new(id)).await {
            warn!("Could not restore player of {}: {}", id, e);
        }
    }
}

pub(crate) async fn run_heartbeat_monitor(
    state: Arc<ServerState>,
    socket: Arc<UdpSocket>,
    shutdown: CancellationToken,
) {
    let mut ticker = interval(state.config.heartbeat_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut last_check = Instant::now();

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }

        // Carry the sub-millisecond remainder into the next check.
        let elapsed_ms = last_check.elapsed().as_millis() as u64;
        last_check += Duration::from_millis(elapsed_ms);

        match sweep(&state, elapsed_ms).await {
            Ok(outbound) => {
                deliver(&socket, &outbound).await;
            }
            Err(e) => error!("Heartbeat sweep failed: {}", e),
        }
    }

    info!("Heartbeat monitor stopped");
}
