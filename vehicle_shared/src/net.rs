//! Networking primitives.
//!
//! Goals:
//! - Message types exchanged between the authority (server) and observers
//!   (clients): vehicle spawn data, pose and wobble updates, passenger lists,
//!   control input and dismount commands.
//! - Explicit, versionable serialization: JSON payloads in length-prefixed
//!   frames.
//! - An in-process [`Link`] over tokio channels so a server and clients can
//!   be paired without sockets.

use std::sync::atomic::{AtomicU32, Ordering};

use anyhow::{bail, Context};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, error::TryRecvError};

use crate::{
    controls::ControlAxes,
    math::Vec3,
    transform::Pose,
    wobble::WobbleSnapshot,
    world::{EntityId, Rider},
};

/// Protocol version for compatibility checks.
pub const PROTOCOL_VERSION: u32 = 1;

/// Frames larger than this are rejected as corrupt.
pub const MAX_FRAME_LEN: usize = 1 << 20;

static NEXT_CLIENT_ID: AtomicU32 = AtomicU32::new(1);

/// Identifies a connected client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClientId(pub u32);

impl ClientId {
    pub fn new_unique() -> Self {
        ClientId(NEXT_CLIENT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// High-level message envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum NetMsg {
    // ─── Connection handshake ───
    Hello {
        protocol: u32,
    },
    /// Server accepts; `player` is the entity the client controls.
    Welcome {
        client_id: ClientId,
        player: EntityId,
    },

    // ─── Vehicle replication ───
    /// Server spawns a vehicle on the client.
    VehicleSpawn(VehicleSpawn),
    /// Authoritative pose; restarts the observer's easing countdown.
    PoseUpdate(PoseUpdate),
    WobbleUpdate {
        id: EntityId,
        wobble: WobbleSnapshot,
    },
    /// The vehicle took damage; observers play the hurt shake.
    VehicleHurt {
        id: EntityId,
    },
    /// Full passenger list, pilot first.
    Passengers {
        id: EntityId,
        riders: Vec<Rider>,
    },
    VehicleRemove {
        id: EntityId,
    },

    // ─── Commands ───
    /// Client -> server: pilot input for a given tick.
    Controls(ControlsCommand),
    /// Client -> server: discrete intent such as dismounting.
    Command(CommandMessage),

    // ─── Disconnect ───
    Disconnect {
        reason: String,
    },
}

/// Vehicle spawn packet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VehicleSpawn {
    pub id: EntityId,
    /// Vehicle variant name.
    pub kind: String,
    pub pose: Pose,
    pub wobble: WobbleSnapshot,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PoseUpdate {
    pub id: EntityId,
    pub tick: u32,
    pub pose: Pose,
}

/// Pilot input for one tick.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ControlsCommand {
    pub client_id: ClientId,
    pub vehicle: EntityId,
    pub tick: u32,
    pub axes: ControlAxes,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CommandKey {
    Dismount,
}

/// Discrete command sent by a passenger.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CommandMessage {
    pub vehicle: EntityId,
    pub rider: EntityId,
    pub key: CommandKey,
    /// Vehicle velocity seen by the sender; handed to the leaving rider.
    pub velocity: Vec3,
}

/// Convenience codec helpers.
pub fn encode_to_bytes(msg: &NetMsg) -> anyhow::Result<Bytes> {
    let payload = serde_json::to_vec(msg).context("serialize")?;
    Ok(Bytes::from(payload))
}

pub fn decode_from_bytes(b: &[u8]) -> anyhow::Result<NetMsg> {
    serde_json::from_slice(b).context("deserialize")
}

/// Encodes one length-prefixed frame.
pub fn encode_frame(msg: &NetMsg) -> anyhow::Result<Bytes> {
    let payload = serde_json::to_vec(msg).context("serialize msg")?;
    let mut buf = BytesMut::with_capacity(4 + payload.len());
    buf.put_u32(payload.len() as u32);
    buf.extend_from_slice(&payload);
    Ok(buf.freeze())
}

/// Pops one complete frame off `buf`, or `None` if more bytes are needed.
pub fn decode_frame(buf: &mut BytesMut) -> anyhow::Result<Option<NetMsg>> {
    if buf.len() < 4 {
        return Ok(None);
    }
    let len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
    if len > MAX_FRAME_LEN {
        bail!("frame of {len} bytes exceeds limit");
    }
    if buf.len() < 4 + len {
        return Ok(None);
    }
    buf.advance(4);
    let payload = buf.split_to(len);
    let msg = serde_json::from_slice(&payload).context("deserialize msg")?;
    Ok(Some(msg))
}

/// One end of an in-process duplex channel carrying encoded frames.
#[derive(Debug)]
pub struct Link {
    tx: mpsc::Sender<Bytes>,
    rx: mpsc::Receiver<Bytes>,
    pending: BytesMut,
}

/// Creates two connected link ends.
pub fn link_pair(capacity: usize) -> (Link, Link) {
    let (a_tx, a_rx) = mpsc::channel(capacity);
    let (b_tx, b_rx) = mpsc::channel(capacity);
    (
        Link {
            tx: a_tx,
            rx: b_rx,
            pending: BytesMut::new(),
        },
        Link {
            tx: b_tx,
            rx: a_rx,
            pending: BytesMut::new(),
        },
    )
}

impl Link {
    /// Queues a message without waiting. Fails when the peer is gone or
    /// its queue is full.
    pub fn send(&self, msg: &NetMsg) -> anyhow::Result<()> {
        let frame = encode_frame(msg)?;
        self.tx.try_send(frame).context("link send")?;
        Ok(())
    }

    /// Waits for the next message.
    pub async fn recv(&mut self) -> anyhow::Result<NetMsg> {
        loop {
            if let Some(msg) = decode_frame(&mut self.pending)? {
                return Ok(msg);
            }
            let chunk = self.rx.recv().await.context("link closed")?;
            self.pending.extend_from_slice(&chunk);
        }
    }

    /// Returns the next message if one is already queued.
    pub fn try_recv(&mut self) -> anyhow::Result<Option<NetMsg>> {
        loop {
            if let Some(msg) = decode_frame(&mut self.pending)? {
                return Ok(Some(msg));
            }
            match self.rx.try_recv() {
                Ok(chunk) => self.pending.extend_from_slice(&chunk),
                Err(TryRecvError::Empty) => return Ok(None),
                Err(TryRecvError::Disconnected) => bail!("link closed"),
            }
        }
    }

    /// Drains every queued message.
    pub fn drain(&mut self) -> anyhow::Result<Vec<NetMsg>> {
        let mut out = Vec::new();
        while let Some(msg) = self.try_recv()? {
            out.push(msg);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn netmsg_roundtrip_bytes() {
        let msg = NetMsg::Hello {
            protocol: PROTOCOL_VERSION,
        };
        let bytes = encode_to_bytes(&msg).unwrap();
        let back = decode_from_bytes(&bytes).unwrap();
        assert_eq!(msg, back);
    }

    #[test]
    fn client_ids_order_by_value() {
        let mut ids = std::collections::BTreeSet::new();
        ids.insert(ClientId(3));
        ids.insert(ClientId(1));
        ids.insert(ClientId(2));
        assert_eq!(
            ids.into_iter().collect::<Vec<_>>(),
            vec![ClientId(1), ClientId(2), ClientId(3)]
        );
    }

    #[test]
    fn partial_frame_waits_for_more_bytes() {
        let msg = NetMsg::VehicleRemove { id: EntityId(4) };
        let frame = encode_frame(&msg).unwrap();
        let mut buf = BytesMut::from(&frame[..frame.len() - 1]);
        assert_eq!(decode_frame(&mut buf).unwrap(), None);
        buf.extend_from_slice(&frame[frame.len() - 1..]);
        assert_eq!(decode_frame(&mut buf).unwrap(), Some(msg));
        assert!(buf.is_empty());
    }

    #[test]
    fn oversized_frame_is_rejected() {
        let mut buf = BytesMut::new();
        buf.put_u32(u32::MAX);
        assert!(decode_frame(&mut buf).is_err());
    }

    #[test]
    fn link_delivers_in_order() {
        let (a, mut b) = link_pair(8);
        a.send(&NetMsg::VehicleRemove { id: EntityId(1) }).unwrap();
        a.send(&NetMsg::VehicleRemove { id: EntityId(2) }).unwrap();
        let got = b.drain().unwrap();
        assert_eq!(
            got,
            vec![
                NetMsg::VehicleRemove { id: EntityId(1) },
                NetMsg::VehicleRemove { id: EntityId(2) },
            ]
        );
        assert_eq!(b.try_recv().unwrap(), None);
    }

    #[test]
    fn dropped_peer_is_an_error() {
        let (a, b) = link_pair(1);
        drop(b);
        assert!(a.send(&NetMsg::Disconnect { reason: "bye".into() }).is_err());
    }
}
