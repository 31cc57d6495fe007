//! Client implementation.
//!
//! The client maintains:
//! - A link to the server (handshake, replication, commands)
//! - Observer copies of every replicated vehicle, eased toward the server's
//!   poses
//! - Per-tick input capture for vehicles the local player rides in
//!
//! Inbound messages are always applied before the vehicles tick, so a pose
//! that arrives this frame is eased toward starting this frame.

use std::collections::BTreeMap;

use anyhow::Context;
use tracing::{debug, info, warn};
use vehicle_shared::{
    config::VehicleConfig,
    controls::InputSampler,
    flat::FlatWorld,
    net::{ClientId, Link, NetMsg, VehicleSpawn, PROTOCOL_VERSION},
    physics::HoverController,
    vehicle::{VehicleEntity, VehicleSpec},
    world::{EntityId, EntityKind, Rider},
};

use crate::input::build_controls;

/// High-level vehicle client.
pub struct VehicleClient {
    pub client_id: ClientId,
    /// Entity the server gave us.
    pub player: EntityId,
    pub cfg: VehicleConfig,

    link: Link,
    world: FlatWorld,
    vehicles: BTreeMap<EntityId, VehicleEntity>,
    tick: u32,
    connected: bool,
}

impl VehicleClient {
    /// Performs the handshake on `link`.
    pub async fn connect(
        mut link: Link,
        cfg: VehicleConfig,
        world: FlatWorld,
    ) -> anyhow::Result<Self> {
        link.send(&NetMsg::Hello {
            protocol: PROTOCOL_VERSION,
        })?;

        let welcome = link.recv().await.context("await welcome")?;
        let (client_id, player) = match welcome {
            NetMsg::Welcome { client_id, player } => (client_id, player),
            other => anyhow::bail!("expected Welcome, got {other:?}"),
        };
        info!(client_id = ?client_id, ?player, "Connected to server");

        Ok(Self {
            client_id,
            player,
            cfg,
            link,
            world,
            vehicles: BTreeMap::new(),
            tick: 0,
            connected: true,
        })
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn tick(&self) -> u32 {
        self.tick
    }

    pub fn world(&self) -> &FlatWorld {
        &self.world
    }

    pub fn vehicle(&self, id: EntityId) -> Option<&VehicleEntity> {
        self.vehicles.get(&id)
    }

    pub fn vehicle_mut(&mut self, id: EntityId) -> Option<&mut VehicleEntity> {
        self.vehicles.get_mut(&id)
    }

    pub fn vehicles(&self) -> impl Iterator<Item = &VehicleEntity> {
        self.vehicles.values()
    }

    /// The vehicle the local player sits in, if any.
    pub fn riding(&self) -> Option<EntityId> {
        self.vehicles
            .values()
            .find(|v| v.has_passenger(self.player))
            .map(|v| v.id())
    }

    /// Applies every queued server message. Returns how many were applied.
    pub fn poll(&mut self) -> anyhow::Result<usize> {
        let msgs = self.link.drain()?;
        let n = msgs.len();
        for msg in msgs {
            self.apply(msg);
        }
        Ok(n)
    }

    fn apply(&mut self, msg: NetMsg) {
        match msg {
            NetMsg::VehicleSpawn(spawn) => self.on_spawn(&spawn),
            NetMsg::PoseUpdate(update) => {
                if let Some(v) = self.vehicles.get_mut(&update.id) {
                    v.receive_pose(update.pose);
                }
            }
            NetMsg::WobbleUpdate { id, wobble } => {
                if let Some(v) = self.vehicles.get_mut(&id) {
                    v.apply_wobble(wobble);
                }
            }
            NetMsg::VehicleHurt { id } => {
                if let Some(v) = self.vehicles.get_mut(&id) {
                    v.animate_damage();
                }
            }
            NetMsg::Passengers { id, riders } => {
                let player = self.player;
                let riders: Vec<Rider> = riders
                    .into_iter()
                    .map(|mut r| {
                        if r.id == player {
                            r.kind = EntityKind::LocalPlayer;
                        }
                        r
                    })
                    .collect();
                if let Some(v) = self.vehicles.get_mut(&id) {
                    v.set_passengers(riders);
                }
            }
            NetMsg::VehicleRemove { id } => {
                if self.vehicles.remove(&id).is_some() {
                    debug!(vehicle = ?id, "Vehicle removed");
                }
            }
            NetMsg::Disconnect { reason } => {
                info!(%reason, "Server disconnected us");
                self.connected = false;
            }
            other => debug!(?other, "Unexpected message"),
        }
    }

    fn on_spawn(&mut self, spawn: &VehicleSpawn) {
        let Some(spec) = VehicleSpec::by_kind(&spawn.kind) else {
            warn!(kind = %spawn.kind, "Unknown vehicle kind");
            return;
        };
        let v = VehicleEntity::from_spawn(
            spawn,
            spec,
            Box::new(HoverController::default()),
            &self.cfg,
        );
        debug!(vehicle = ?spawn.id, kind = %spawn.kind, "Vehicle spawned");
        self.vehicles.insert(spawn.id, v);
    }

    /// One client frame: apply inbound messages, tick every vehicle with
    /// local input, then send controls and commands.
    pub fn step(&mut self, input: &mut dyn InputSampler) -> anyhow::Result<()> {
        self.poll()?;

        let mut outbound = Vec::new();
        for v in self.vehicles.values_mut() {
            let report = v.tick(&mut self.world, Some(&mut *input));
            outbound.extend(report.commands.into_iter().map(NetMsg::Command));
            if v.pilot().is_some_and(|p| p.id == self.player) {
                outbound.push(NetMsg::Controls(build_controls(
                    self.client_id,
                    v.id(),
                    self.tick,
                    v.controls(),
                )));
            }
        }
        for msg in &outbound {
            self.link.send(msg)?;
        }

        self.tick += 1;
        Ok(())
    }

    /// Tells the server we're leaving.
    pub fn disconnect(&mut self, reason: &str) -> anyhow::Result<()> {
        self.connected = false;
        self.link.send(&NetMsg::Disconnect {
            reason: reason.to_string(),
        })
    }
}
