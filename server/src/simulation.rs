//! Simulation loop for server-owned bolts
//!
//! Each tick advances every bolt by the wall-clock time since the previous
//! tick, despawns bolts that left the arena, and sends every session the full
//! state of every live bolt. There is no delta compression; a lost UPDATE is
//! simply superseded by the next one.

use crate::error::ServerError;
use crate::network::{deliver, Outbound, ServerState};
use log::{debug, error, info};
use shared::Frame;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Runs one simulation step of `dt` seconds and returns what to broadcast.
pub async fn simulate(state: &ServerState, dt: f32) -> Result<Vec<Outbound>, ServerError> {
    let step = state.actors.step_bolts(dt, &state.config.arena).await;

    let recipients = state.sessions.addrs().await;
    if recipients.is_empty() {
        return Ok(Vec::new());
    }

    let mut outbound = Vec::with_capacity(step.despawned.len() + step.live.len());
    for bolt in &step.despawned {
        outbound.push(Outbound::broadcast(
            recipients.clone(),
            Frame::remove_bolt(bolt).encode()?,
        ));
    }
    for bolt in &step.live {
        outbound.push(Outbound::broadcast(
            recipients.clone(),
            Frame::bolt_update(bolt).encode()?,
        ));
    }

    Ok(outbound)
}

pub(crate) async fn run_simulation_loop(
    state: Arc<ServerState>,
    socket: Arc<UdpSocket>,
    shutdown: CancellationToken,
) {
    let mut ticker = interval(state.config.tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut last_tick = Instant::now();
    let mut ticks: u64 = 0;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let now = Instant::now();
        let dt = now.duration_since(last_tick).as_secs_f32();
        last_tick = now;

        match simulate(&state, dt).await {
            Ok(outbound) => {
                deliver(&socket, &outbound).await;
            }
            Err(e) => error!("Simulation tick failed: {}", e),
        }

        ticks += 1;
        if ticks % 600 == 0 {
            debug!(
                "Tick {}: {} sessions, {} actors, {:.1}Hz",
                ticks,
                state.sessions.len().await,
                state.actors.len().await,
                1.0 / dt.max(f32::EPSILON)
            );
        }
    }

    info!("Simulation loop stopped");
}
