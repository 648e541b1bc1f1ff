//! Net actor registry
//!
//! Owns every replicated entity and the bolt pool behind a single lock. Bolts
//! are drawn from the pool on spawn and returned to it on despawn, always
//! inside the same critical section as the registry change.

use crate::error::ServerError;
use crate::pool::BoltPool;
use log::{debug, info};
use shared::protocol::SpawnBolt;
use shared::{Arena, Bolt, NetActor, Player};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Result of one simulation step over the registry
#[derive(Debug, Default)]
pub struct BoltStep {
    /// Bolts that left the arena, captured before they went back to the pool
    pub despawned: Vec<Bolt>,
    /// Bolts still live after the step
    pub live: Vec<Bolt>,
}

#[derive(Debug)]
struct ActorTable {
    actors: HashMap<Uuid, NetActor>,
    pool: BoltPool,
}

impl ActorTable {
    /// Drops an actor, recycling it if it is a bolt. Returns what was removed.
    fn evict(&mut self, id: &Uuid) -> Option<NetActor> {
        let actor = self.actors.remove(id)?;
        if let NetActor::Bolt(bolt) = &actor {
            self.pool.release(bolt.clone());
        }
        Some(actor)
    }
}

#[derive(Debug)]
pub struct ActorRegistry {
    table: Mutex<ActorTable>,
}

impl ActorRegistry {
    pub fn new(pool_capacity: usize) -> Self {
        Self {
            table: Mutex::new(ActorTable {
                actors: HashMap::new(),
                pool: BoltPool::new(pool_capacity),
            }),
        }
    }

    /// Adds an actor. Ids are unique; a second actor with a taken id is refused.
    pub async fn insert(&self, actor: NetActor) -> Result<(), ServerError> {
        let mut table = self.table.lock().await;
        let id = actor.id();
        if table.actors.contains_key(&id) {
            return Err(ServerError::DuplicateActor(id));
        }
        table.actors.insert(id, actor);
        Ok(())
    }

    /// Adds a player, replacing a leftover player with the same id.
    ///
    /// A player only outlives its session while an eviction is still being
    /// applied, so such a player is stale. A bolt holding the id is refused.
    pub async fn insert_player(&self, player: Player) -> Result<(), ServerError> {
        let mut table = self.table.lock().await;
        match table.actors.get(&player.id) {
            Some(NetActor::Bolt(_)) => return Err(ServerError::DuplicateActor(player.id)),
            Some(NetActor::Player(_)) => debug!("Replacing stale player {}", player.id),
            None => {}
        }
        table.actors.insert(player.id, NetActor::Player(player));
        Ok(())
    }

    /// Takes a pooled bolt, fills it from the spawn request and inserts it.
    pub async fn spawn_bolt(&self, shooter: Uuid, spawn: &SpawnBolt) -> Result<Bolt, ServerError> {
        let mut table = self.table.lock().await;
        if table.actors.contains_key(&spawn.bolt_id) {
            return Err(ServerError::DuplicateActor(spawn.bolt_id));
        }

        let mut bolt = table.pool.obtain();
        bolt.id = spawn.bolt_id;
        bolt.shooter_id = Some(shooter);
        bolt.transform = spawn.transform();
        bolt.speed = spawn.speed;

        table.actors.insert(bolt.id, NetActor::Bolt(bolt.clone()));
        debug!("Bolt {} spawned by {}", bolt.id, shooter);
        Ok(bolt)
    }

    pub async fn remove_by_id(&self, id: Uuid) -> Result<NetActor, ServerError> {
        let mut table = self.table.lock().await;
        table.evict(&id).ok_or(ServerError::UnknownActor(id))
    }

    /// Removes every actor matching `predicate` and returns them.
    pub async fn remove_where<P>(&self, mut predicate: P) -> Vec<NetActor>
    where
        P: FnMut(&NetActor) -> bool,
    {
        let mut table = self.table.lock().await;
        let doomed: Vec<Uuid> = table
            .actors
            .values()
            .filter(|&actor| predicate(actor))
            .map(NetActor::id)
            .collect();

        doomed.iter().filter_map(|id| table.evict(id)).collect()
    }

    /// Visits every actor while holding the lock.
    pub async fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&NetActor),
    {
        let table = self.table.lock().await;
        for actor in table.actors.values() {
            f(actor);
        }
    }

    /// Advances every bolt by `dt` seconds and despawns those outside `arena`.
    pub async fn step_bolts(&self, dt: f32, arena: &Arena) -> BoltStep {
        let mut table = self.table.lock().await;
        let mut step = BoltStep::default();

        let mut escaped = Vec::new();
        for actor in table.actors.values_mut() {
            if let NetActor::Bolt(bolt) = actor {
                bolt.advance(dt);
                if arena.contains(&bolt.transform) {
                    step.live.push(bolt.clone());
                } else {
                    escaped.push(bolt.id);
                }
            }
        }

        for id in escaped {
            if let Some(NetActor::Bolt(bolt)) = table.evict(&id) {
                info!(
                    "Bolt {} left the arena at ({:.1}, {:.1})",
                    bolt.id, bolt.transform.x, bolt.transform.y
                );
                step.despawned.push(bolt);
            }
        }

        step
    }

    pub async fn contains(&self, id: Uuid) -> bool {
        self.table.lock().await.actors.contains_key(&id)
    }

    pub async fn len(&self) -> usize {
        self.table.lock().await.actors.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.table.lock().await.actors.is_empty()
    }

    pub async fn pooled_bolts(&self) -> usize {
        self.table.lock().await.pool.available()
    }
}
