//! Replicated entities ("net actors") tracked by the server.
//!
//! Every actor has a 128-bit identity and a 2D transform. Players are owned by
//! a client session and only relayed; bolts are simulated by the server.

use crate::{WORLD_HEIGHT, WORLD_WIDTH};
use uuid::Uuid;

/// Position and heading of an actor. Rotation is in degrees, counter-clockwise
/// from the positive x axis.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Transform {
    pub x: f32,
    pub y: f32,
    pub rotation: f32,
}

impl Transform {
    pub fn new(x: f32, y: f32, rotation: f32) -> Self {
        Self { x, y, rotation }
    }
}

/// A connected client's avatar. Its id is the owning session's id.
#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    pub id: Uuid,
    /// Last client-reported transform. The server never simulates it.
    pub transform: Transform,
}

impl Player {
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            transform: Transform::default(),
        }
    }
}

/// A projectile fired by a player and moved by the server every tick.
#[derive(Debug, Clone, PartialEq)]
pub struct Bolt {
    pub id: Uuid,
    /// Session id of the player that fired it. The shooter may have left since.
    pub shooter_id: Option<Uuid>,
    pub transform: Transform,
    pub speed: f32,
}

impl Bolt {
    /// A bolt in its released state: fresh random id, no shooter, zeroed motion.
    pub fn blank() -> Self {
        Self {
            id: Uuid::new_v4(),
            shooter_id: None,
            transform: Transform::default(),
            speed: 0.0,
        }
    }

    /// Velocity derived from speed and rotation.
    pub fn velocity(&self) -> (f32, f32) {
        let radians = self.transform.rotation.to_radians();
        (self.speed * radians.cos(), self.speed * radians.sin())
    }

    /// Moves the bolt along its heading for `dt` seconds.
    pub fn advance(&mut self, dt: f32) {
        let (vx, vy) = self.velocity();
        self.transform.x += vx * dt;
        self.transform.y += vy * dt;
    }

    /// Clears every field so a pooled bolt cannot leak a previous identity.
    pub fn reset(&mut self) {
        *self = Self::blank();
    }
}

/// Closed set of replicated entities.
#[derive(Debug, Clone, PartialEq)]
pub enum NetActor {
    Player(Player),
    Bolt(Bolt),
}

impl NetActor {
    pub fn id(&self) -> Uuid {
        match self {
            NetActor::Player(player) => player.id,
            NetActor::Bolt(bolt) => bolt.id,
        }
    }

    pub fn transform(&self) -> Transform {
        match self {
            NetActor::Player(player) => player.transform,
            NetActor::Bolt(bolt) => bolt.transform,
        }
    }

    pub fn as_bolt(&self) -> Option<&Bolt> {
        match self {
            NetActor::Bolt(bolt) => Some(bolt),
            NetActor::Player(_) => None,
        }
    }

    pub fn is_bolt(&self) -> bool {
        matches!(self, NetActor::Bolt(_))
    }
}

impl From<Player> for NetActor {
    fn from(player: Player) -> Self {
        NetActor::Player(player)
    }
}

impl From<Bolt> for NetActor {
    fn from(bolt: Bolt) -> Self {
        NetActor::Bolt(bolt)
    }
}

/// Axis-aligned playing field. Edges are inside the arena.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Arena {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

impl Arena {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            min_x: 0.0,
            min_y: 0.0,
            max_x: width,
            max_y: height,
        }
    }

    /// Point check only; a bolt that crosses the boundary and leaves within
    /// one tick is caught on the tick its position lands outside.
    pub fn contains(&self, transform: &Transform) -> bool {
        transform.x >= self.min_x
            && transform.x <= self.max_x
            && transform.y >= self.min_y
            && transform.y <= self.max_y
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self::new(WORLD_WIDTH, WORLD_HEIGHT)
    }
}
