//! Fixed-header binary wire format.
//!
//! Every datagram starts with a 21-byte header:
//!
//! ```text
//! [i32 payload length][u8 kind][u64 sender hi][u64 sender lo]
//! ```
//!
//! followed by a fixed-size, kind-specific payload. All fields are big-endian.
//! Bolt messages emitted by the server put the shooter id in the sender slot,
//! so the bytes after the kind tag read shooter id, bolt id, then the rest.
//!
//! Header and payload structs are serialized with bincode using fixed-width
//! big-endian integers, which lays them out byte-for-byte as above.

use crate::actor::{Bolt, NetActor, Transform};
use crate::HEADER_LENGTH;
use bincode::Options;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("datagram truncated: need {needed} bytes, got {actual}")]
    Truncated { needed: usize, actual: usize },
    #[error("unknown message kind {0}")]
    UnknownKind(u8),
    #[error("declared payload length {declared} does not match received {actual}")]
    LengthMismatch { declared: i32, actual: usize },
    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),
}

/// Message kind tag. Zero is never a valid tag.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Connect = 1,
    ConnectHandshake = 2,
    Disconnect = 3,
    Heartbeat = 4,
    UpdatePlayer = 5,
    SpawnBolt = 6,
    RemoveBolt = 7,
    Update = 8,
}

impl MessageKind {
    pub const ALL: [MessageKind; 8] = [
        MessageKind::Connect,
        MessageKind::ConnectHandshake,
        MessageKind::Disconnect,
        MessageKind::Heartbeat,
        MessageKind::UpdatePlayer,
        MessageKind::SpawnBolt,
        MessageKind::RemoveBolt,
        MessageKind::Update,
    ];

    pub fn tag(self) -> u8 {
        self as u8
    }

    /// Bytes after the header that a frame of this kind must carry.
    pub fn payload_length(self) -> usize {
        match self {
            MessageKind::SpawnBolt => 16 + 4 * 4,
            MessageKind::RemoveBolt => 16 + 16,
            MessageKind::Update => 16 + 3 * 4,
            _ => 0,
        }
    }
}

impl TryFrom<u8> for MessageKind {
    type Error = ProtocolError;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        MessageKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.tag() == tag)
            .ok_or(ProtocolError::UnknownKind(tag))
    }
}

/// A client announcing a new projectile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnBolt {
    pub bolt_id: Uuid,
    pub x: f32,
    pub y: f32,
    pub rotation: f32,
    pub speed: f32,
}

impl SpawnBolt {
    pub fn transform(&self) -> Transform {
        Transform::new(self.x, self.y, self.rotation)
    }
}

impl From<&Bolt> for SpawnBolt {
    fn from(bolt: &Bolt) -> Self {
        Self {
            bolt_id: bolt.id,
            x: bolt.transform.x,
            y: bolt.transform.y,
            rotation: bolt.transform.rotation,
            speed: bolt.speed,
        }
    }
}

/// Despawn notice for a bolt. The shooter travels in the header.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RemoveBolt {
    pub bolt_id: Uuid,
}

/// Authoritative bolt position. The shooter travels in the header.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoltUpdate {
    pub bolt_id: Uuid,
    pub x: f32,
    pub y: f32,
    pub rotation: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Message {
    Connect,
    ConnectHandshake,
    Disconnect,
    Heartbeat,
    /// Client-reported player transform. The payload is opaque to the server.
    UpdatePlayer,
    SpawnBolt(SpawnBolt),
    RemoveBolt(RemoveBolt),
    Update(BoltUpdate),
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::Connect => MessageKind::Connect,
            Message::ConnectHandshake => MessageKind::ConnectHandshake,
            Message::Disconnect => MessageKind::Disconnect,
            Message::Heartbeat => MessageKind::Heartbeat,
            Message::UpdatePlayer => MessageKind::UpdatePlayer,
            Message::SpawnBolt(_) => MessageKind::SpawnBolt,
            Message::RemoveBolt(_) => MessageKind::RemoveBolt,
            Message::Update(_) => MessageKind::Update,
        }
    }
}

/// A decoded datagram: header fields plus the typed payload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    pub sender: Uuid,
    /// Payload length as written by the sender. Informational unless decoded strictly.
    pub declared_length: i32,
    pub message: Message,
}

impl Frame {
    pub fn new(sender: Uuid, message: Message) -> Self {
        Self {
            sender,
            declared_length: message.kind().payload_length() as i32,
            message,
        }
    }

    /// Synthetic spawn used to replay an existing actor to a joining client.
    pub fn spawn_for(actor: &NetActor) -> Self {
        match actor {
            NetActor::Player(player) => Frame::new(player.id, Message::Connect),
            NetActor::Bolt(bolt) => Frame::new(
                bolt.shooter_id.unwrap_or_else(Uuid::nil),
                Message::SpawnBolt(SpawnBolt::from(bolt)),
            ),
        }
    }

    pub fn remove_bolt(bolt: &Bolt) -> Self {
        Frame::new(
            bolt.shooter_id.unwrap_or_else(Uuid::nil),
            Message::RemoveBolt(RemoveBolt { bolt_id: bolt.id }),
        )
    }

    pub fn bolt_update(bolt: &Bolt) -> Self {
        Frame::new(
            bolt.shooter_id.unwrap_or_else(Uuid::nil),
            Message::Update(BoltUpdate {
                bolt_id: bolt.id,
                x: bolt.transform.x,
                y: bolt.transform.y,
                rotation: bolt.transform.rotation,
            }),
        )
    }

    pub fn kind(&self) -> MessageKind {
        self.message.kind()
    }

    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let kind = self.kind();
        let mut buf = Vec::with_capacity(HEADER_LENGTH + kind.payload_length());

        let header = Header {
            payload_length: self.declared_length,
            kind: kind.tag(),
            sender: self.sender.into(),
        };
        wire().serialize_into(&mut buf, &header)?;

        match &self.message {
            Message::SpawnBolt(spawn) => wire().serialize_into(
                &mut buf,
                &SpawnBoltPayload {
                    bolt: spawn.bolt_id.into(),
                    x: spawn.x,
                    y: spawn.y,
                    rotation: spawn.rotation,
                    speed: spawn.speed,
                },
            )?,
            Message::RemoveBolt(remove) => wire().serialize_into(
                &mut buf,
                &RemoveBoltPayload {
                    bolt: remove.bolt_id.into(),
                    reserved: WireId { hi: 0, lo: 0 },
                },
            )?,
            Message::Update(update) => wire().serialize_into(
                &mut buf,
                &UpdatePayload {
                    bolt: update.bolt_id.into(),
                    x: update.x,
                    y: update.y,
                    rotation: update.rotation,
                },
            )?,
            _ => {}
        }

        Ok(buf)
    }

    /// Decodes a datagram, requiring only that the kind's fixed payload is present.
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        Self::decode_with(bytes, false)
    }

    /// Like [`Frame::decode`], but also rejects frames whose declared payload
    /// length differs from the bytes actually received.
    pub fn decode_strict(bytes: &[u8]) -> Result<Self, ProtocolError> {
        Self::decode_with(bytes, true)
    }

    fn decode_with(bytes: &[u8], strict: bool) -> Result<Self, ProtocolError> {
        if bytes.len() < HEADER_LENGTH {
            return Err(ProtocolError::Truncated {
                needed: HEADER_LENGTH,
                actual: bytes.len(),
            });
        }

        let header: Header = wire().deserialize(&bytes[..HEADER_LENGTH])?;
        let kind = MessageKind::try_from(header.kind)?;
        let body = &bytes[HEADER_LENGTH..];

        if strict && usize::try_from(header.payload_length).ok() != Some(body.len()) {
            return Err(ProtocolError::LengthMismatch {
                declared: header.payload_length,
                actual: body.len(),
            });
        }

        let needed = kind.payload_length();
        if body.len() < needed {
            return Err(ProtocolError::Truncated {
                needed: HEADER_LENGTH + needed,
                actual: bytes.len(),
            });
        }
        let payload = &body[..needed];

        let message = match kind {
            MessageKind::Connect => Message::Connect,
            MessageKind::ConnectHandshake => Message::ConnectHandshake,
            MessageKind::Disconnect => Message::Disconnect,
            MessageKind::Heartbeat => Message::Heartbeat,
            MessageKind::UpdatePlayer => Message::UpdatePlayer,
            MessageKind::SpawnBolt => {
                let p: SpawnBoltPayload = wire().deserialize(payload)?;
                Message::SpawnBolt(SpawnBolt {
                    bolt_id: p.bolt.into(),
                    x: p.x,
                    y: p.y,
                    rotation: p.rotation,
                    speed: p.speed,
                })
            }
            MessageKind::RemoveBolt => {
                let p: RemoveBoltPayload = wire().deserialize(payload)?;
                Message::RemoveBolt(RemoveBolt {
                    bolt_id: p.bolt.into(),
                })
            }
            MessageKind::Update => {
                let p: UpdatePayload = wire().deserialize(payload)?;
                Message::Update(BoltUpdate {
                    bolt_id: p.bolt.into(),
                    x: p.x,
                    y: p.y,
                    rotation: p.rotation,
                })
            }
        };

        Ok(Frame {
            sender: header.sender.into(),
            declared_length: header.payload_length,
            message,
        })
    }
}

fn wire() -> impl Options {
    bincode::DefaultOptions::new()
        .with_big_endian()
        .with_fixint_encoding()
}

/// A 128-bit id as two u64 halves, most significant first.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct WireId {
    hi: u64,
    lo: u64,
}

impl From<Uuid> for WireId {
    fn from(id: Uuid) -> Self {
        let bits = id.as_u128();
        Self {
            hi: (bits >> 64) as u64,
            lo: bits as u64,
        }
    }
}

impl From<WireId> for Uuid {
    fn from(id: WireId) -> Self {
        Uuid::from_u128(((id.hi as u128) << 64) | id.lo as u128)
    }
}

#[derive(Serialize, Deserialize)]
struct Header {
    payload_length: i32,
    kind: u8,
    sender: WireId,
}

#[derive(Serialize, Deserialize)]
struct SpawnBoltPayload {
    bolt: WireId,
    x: f32,
    y: f32,
    rotation: f32,
    speed: f32,
}

#[derive(Serialize, Deserialize)]
struct RemoveBoltPayload {
    bolt: WireId,
    reserved: WireId,
}

#[derive(Serialize, Deserialize)]
struct UpdatePayload {
    bolt: WireId,
    x: f32,
    y: f32,
    rotation: f32,
}
