//! Server implementation.
//!
//! The server is the authority for every vehicle: it runs their motion,
//! decides damage and boarding, and replicates the results to connected
//! clients over in-process [`Link`]s. It supports:
//! - Spawning vehicles and free entities into a [`FlatWorld`]
//! - Client handshake with a player entity per client
//! - Pilot controls and dismount commands from clients
//! - Pose, wobble, passenger and removal replication
//!
//! Determinism notes:
//! - Keep simulation in a fixed timestep.
//! - Avoid wall-clock-dependent branching in gameplay code.
//! - Use stable ordering when iterating collections.

use std::{collections::BTreeMap, time::Duration};

use anyhow::Context;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use vehicle_shared::{
    config::VehicleConfig,
    flat::FlatWorld,
    math::Vec3,
    net::{ClientId, CommandMessage, ControlsCommand, Link, NetMsg, PoseUpdate, PROTOCOL_VERSION},
    physics::Controller,
    transform::Pose,
    vehicle::{DamageSource, InteractResult, Side, VehicleEntity, VehicleSpec},
    world::{EntityId, EntityKind, VehicleWorld},
};

/// Connected client state.
struct ClientState {
    link: Link,
    player: EntityId,
}

/// Authoritative vehicle server.
pub struct VehicleServer {
    pub cfg: VehicleConfig,
    world: FlatWorld,
    vehicles: BTreeMap<EntityId, VehicleEntity>,
    /// Passenger ids last sent per vehicle.
    sent_passengers: BTreeMap<EntityId, Vec<EntityId>>,
    clients: BTreeMap<ClientId, ClientState>,
    tick: u32,
}

impl VehicleServer {
    pub fn new(cfg: VehicleConfig, world: FlatWorld) -> Self {
        Self {
            cfg,
            world,
            vehicles: BTreeMap::new(),
            sent_passengers: BTreeMap::new(),
            clients: BTreeMap::new(),
            tick: 0,
        }
    }

    pub fn tick(&self) -> u32 {
        self.tick
    }

    pub fn world(&self) -> &FlatWorld {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut FlatWorld {
        &mut self.world
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

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Player entity owned by a client.
    pub fn player_of(&self, client: ClientId) -> Option<EntityId> {
        self.clients.get(&client).map(|c| c.player)
    }

    /// Spawns a vehicle and announces it to every client.
    pub fn spawn_vehicle(
        &mut self,
        spec: VehicleSpec,
        controller: Box<dyn Controller>,
        pose: Pose,
    ) -> EntityId {
        let id = self.world.allocate_id();
        let mut vehicle = VehicleEntity::new(id, spec, controller, Side::Server, &self.cfg);
        vehicle.teleport(pose);
        info!(vehicle = ?id, kind = %vehicle.spec().kind, position = ?pose.position, "Spawned vehicle");

        let spawn = NetMsg::VehicleSpawn(vehicle.spawn_data());
        self.vehicles.insert(id, vehicle);
        self.broadcast(&spawn);
        id
    }

    /// Adds a free entity to the world.
    pub fn spawn_rider(&mut self, kind: EntityKind, position: Vec3) -> EntityId {
        self.world.spawn_rider(kind, position)
    }

    /// Accepts exactly one client on `link` (handshake, player spawn and
    /// initial vehicle state).
    pub async fn accept(&mut self, mut link: Link) -> anyhow::Result<ClientId> {
        let msg = link.recv().await.context("await hello")?;
        match msg {
            NetMsg::Hello { protocol } if protocol == PROTOCOL_VERSION => {}
            other => anyhow::bail!("unexpected handshake msg: {other:?}"),
        }

        let id = ClientId::new_unique();
        let spawn_at = Vec3::new(0.5, self.world.ground_y(), 0.5);
        let player = self.world.spawn_rider(EntityKind::Player, spawn_at);
        link.send(&NetMsg::Welcome {
            client_id: id,
            player,
        })?;

        for v in self.vehicles.values() {
            link.send(&NetMsg::VehicleSpawn(v.spawn_data()))?;
            if v.seating().occupancy() > 0 {
                link.send(&NetMsg::Passengers {
                    id: v.id(),
                    riders: v.passengers().to_vec(),
                })?;
            }
        }

        self.clients.insert(id, ClientState { link, player });
        info!(client_id = ?id, ?player, "Client connected");
        Ok(id)
    }

    /// Seats a free entity directly, bypassing interaction rules.
    pub fn board(&mut self, vehicle: EntityId, rider: EntityId) -> anyhow::Result<bool> {
        let v = self
            .vehicles
            .get_mut(&vehicle)
            .context("vehicle not found")?;
        Ok(v.board(&mut self.world, rider))
    }

    /// Boards `rider` onto `vehicle`, as if they had clicked it.
    pub fn interact(&mut self, vehicle: EntityId, rider: EntityId) -> anyhow::Result<bool> {
        let v = self
            .vehicles
            .get_mut(&vehicle)
            .context("vehicle not found")?;
        Ok(v.interact(&mut self.world, rider, false) == InteractResult::Consume)
    }

    /// A passenger turned their head to `yaw`. Returns false when `rider`
    /// is not aboard `vehicle`.
    pub fn look_around(
        &mut self,
        vehicle: EntityId,
        rider: EntityId,
        yaw: f32,
    ) -> anyhow::Result<bool> {
        let v = self
            .vehicles
            .get_mut(&vehicle)
            .context("vehicle not found")?;
        Ok(v.on_passenger_look_around(rider, yaw))
    }

    /// Deals damage to a vehicle. Returns whether the damage applied.
    pub fn damage(
        &mut self,
        vehicle: EntityId,
        source: &DamageSource,
        amount: f32,
    ) -> anyhow::Result<bool> {
        let v = self
            .vehicles
            .get_mut(&vehicle)
            .context("vehicle not found")?;
        if source.attacker.is_some_and(|a| v.ignores_attack_from(a.id)) {
            debug!(?vehicle, "Attack from own passenger ignored");
            return Ok(false);
        }
        let applied = v.damage(&mut self.world, source, amount);
        if applied {
            self.broadcast(&NetMsg::VehicleHurt { id: vehicle });
        }
        Ok(applied)
    }

    /// Runs the server for a number of ticks.
    pub async fn run_for_ticks(&mut self, ticks: u32) -> anyhow::Result<()> {
        let dt = Duration::from_secs_f32(1.0 / self.cfg.tick_hz.max(1) as f32);
        let mut next = Instant::now();

        for _ in 0..ticks {
            next += dt;
            self.step()?;
            tokio::time::sleep_until(next).await;
        }
        Ok(())
    }

    /// Executes one fixed simulation step.
    pub fn step(&mut self) -> anyhow::Result<()> {
        self.recv_commands()?;
        self.simulate();
        self.replicate();
        self.tick += 1;
        Ok(())
    }

    fn recv_commands(&mut self) -> anyhow::Result<()> {
        let mut inbound = Vec::new();
        let mut gone = Vec::new();
        for (id, c) in self.clients.iter_mut() {
            match c.link.drain() {
                Ok(msgs) => inbound.extend(msgs.into_iter().map(|m| (*id, m))),
                Err(e) => {
                    warn!(client_id = ?id, error = %e, "Client link failed");
                    gone.push(*id);
                }
            }
        }
        for id in gone {
            self.drop_client(id);
        }
        for (from, msg) in inbound {
            self.handle_message(from, msg);
        }
        Ok(())
    }

    fn handle_message(&mut self, from: ClientId, msg: NetMsg) {
        match msg {
            NetMsg::Controls(cmd) => self.on_controls(from, cmd),
            NetMsg::Command(cmd) => self.on_command(from, cmd),
            NetMsg::Disconnect { reason } => {
                info!(client_id = ?from, %reason, "Client disconnected");
                self.drop_client(from);
            }
            other => debug!(client_id = ?from, ?other, "Unexpected message"),
        }
    }

    fn on_controls(&mut self, from: ClientId, cmd: ControlsCommand) {
        let Some(c) = self.clients.get(&from) else {
            return;
        };
        let player = c.player;
        let Some(v) = self.vehicles.get_mut(&cmd.vehicle) else {
            return;
        };
        if v.pilot().map(|p| p.id) != Some(player) {
            debug!(client_id = ?from, vehicle = ?cmd.vehicle, "Controls from non-pilot ignored");
            return;
        }
        v.set_inputs(cmd.axes.clamped());
    }

    fn on_command(&mut self, from: ClientId, cmd: CommandMessage) {
        if self.player_of(from) != Some(cmd.rider) {
            warn!(client_id = ?from, rider = ?cmd.rider, "Command for foreign rider rejected");
            return;
        }
        if let Some(v) = self.vehicles.get_mut(&cmd.vehicle) {
            v.handle_command(&mut self.world, &cmd);
        }
    }

    fn drop_client(&mut self, id: ClientId) {
        let Some(c) = self.clients.remove(&id) else {
            return;
        };
        for v in self.vehicles.values_mut() {
            if v.has_passenger(c.player) {
                v.dismount(&mut self.world, c.player, Vec3::ZERO);
            }
        }
        self.world.take_rider(c.player);
    }

    fn simulate(&mut self) {
        for v in self.vehicles.values_mut() {
            let report = v.tick(&mut self.world, None);
            if !report.boarded.is_empty() {
                debug!(vehicle = ?v.id(), boarded = ?report.boarded, "Auto-boarded");
            }
        }
    }

    fn replicate(&mut self) {
        let mut out = Vec::new();
        let removed: Vec<EntityId> = self
            .vehicles
            .values()
            .filter(|v| v.is_removed())
            .map(|v| v.id())
            .collect();
        for id in removed {
            self.vehicles.remove(&id);
            self.sent_passengers.remove(&id);
            out.push(NetMsg::VehicleRemove { id });
        }

        for v in self.vehicles.values_mut() {
            out.push(NetMsg::PoseUpdate(PoseUpdate {
                id: v.id(),
                tick: self.tick,
                pose: v.pose(),
            }));
            if let Some(wobble) = v.take_wobble_changes() {
                out.push(NetMsg::WobbleUpdate { id: v.id(), wobble });
            }
            let ids: Vec<EntityId> = v.passengers().iter().map(|p| p.id).collect();
            if self.sent_passengers.get(&v.id()) != Some(&ids) {
                out.push(NetMsg::Passengers {
                    id: v.id(),
                    riders: v.passengers().to_vec(),
                });
                self.sent_passengers.insert(v.id(), ids);
            }
        }

        for msg in &out {
            self.broadcast(msg);
        }
    }

    fn broadcast(&mut self, msg: &NetMsg) {
        let mut gone = Vec::new();
        for (id, c) in &self.clients {
            if let Err(e) = c.link.send(msg) {
                warn!(client_id = ?id, error = %e, "Send failed");
                gone.push(*id);
            }
        }
        for id in gone {
            self.drop_client(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vehicle_shared::{
        controls::ControlAxes,
        net::{link_pair, CommandKey},
        physics::{HoverController, NullController},
        vehicle::Attacker,
    };

    fn server() -> VehicleServer {
        VehicleServer::new(VehicleConfig::default(), FlatWorld::new(64.0))
    }

    #[test]
    fn spawned_vehicle_is_authoritative() {
        let mut s = server();
        let id = s.spawn_vehicle(
            VehicleSpec::gyrodyne(),
            Box::new(NullController),
            Pose::at(Vec3::new(0.0, 64.0, 0.0)),
        );
        let v = s.vehicle(id).unwrap();
        assert_eq!(v.side(), Side::Server);
        assert!(v.owns_motion());
    }

    #[test]
    fn destroyed_vehicle_is_removed_after_step() {
        let mut s = server();
        let id = s.spawn_vehicle(
            VehicleSpec::gyrodyne(),
            Box::new(NullController),
            Pose::at(Vec3::new(0.0, 64.0, 0.0)),
        );
        assert!(s.damage(id, &DamageSource::default(), 7.0).unwrap());
        s.step().unwrap();
        assert!(s.vehicle(id).is_none());
        assert_eq!(s.world().drops.len(), 1);
    }

    #[test]
    fn passengers_cannot_hurt_their_vehicle() {
        let mut s = server();
        let id = s.spawn_vehicle(
            VehicleSpec::gyrodyne(),
            Box::new(NullController),
            Pose::at(Vec3::new(0.0, 64.0, 0.0)),
        );
        let p = s.spawn_rider(EntityKind::Player, Vec3::new(3.0, 64.0, 3.0));
        assert!(s.interact(id, p).unwrap());
        let source = DamageSource::by(Attacker {
            id: p,
            kind: EntityKind::Player,
            creative: true,
        });
        assert!(!s.damage(id, &source, 100.0).unwrap());
        assert!(!s.vehicle(id).unwrap().is_removed());
    }

    #[test]
    fn direct_board_ignores_creature_kind() {
        let mut s = server();
        let id = s.spawn_vehicle(
            VehicleSpec::gyrodyne(),
            Box::new(NullController),
            Pose::at(Vec3::new(0.0, 64.0, 0.0)),
        );
        let fish = s.spawn_rider(EntityKind::WaterCreature, Vec3::new(9.0, 64.0, 9.0));
        assert!(s.board(id, fish).unwrap());
        assert!(!s.board(id, fish).unwrap());
        assert!(s.world().rider(fish).is_none());
    }

    #[test]
    fn unknown_vehicle_is_an_error() {
        let mut s = server();
        assert!(s.damage(EntityId(999), &DamageSource::default(), 1.0).is_err());
    }

    #[tokio::test]
    async fn pilot_controls_drive_vehicle() -> anyhow::Result<()> {
        let mut s = server();
        let id = s.spawn_vehicle(
            VehicleSpec::gyrodyne(),
            Box::new(HoverController::default()),
            Pose::at(Vec3::new(0.5, 64.0, 0.5)),
        );
        let (server_end, mut client_end) = link_pair(1024);
        client_end.send(&NetMsg::Hello {
            protocol: PROTOCOL_VERSION,
        })?;
        let cid = s.accept(server_end).await?;
        let player = s.player_of(cid).context("player")?;
        assert!(s.interact(id, player)?);

        let axes = ControlAxes::new(0.0, 1.0, 0.0);
        client_end.send(&NetMsg::Controls(ControlsCommand {
            client_id: cid,
            vehicle: id,
            tick: 0,
            axes,
        }))?;
        for _ in 0..5 {
            s.step()?;
        }
        assert!(s.vehicle(id).context("vehicle")?.position().y > 64.0);

        client_end.send(&NetMsg::Command(CommandMessage {
            vehicle: id,
            rider: player,
            key: CommandKey::Dismount,
            velocity: Vec3::ZERO,
        }))?;
        s.step()?;
        assert!(!s.vehicle(id).context("vehicle")?.has_passenger(player));
        assert!(s.world().rider(player).is_some());
        Ok(())
    }

    #[tokio::test]
    async fn abandoned_vehicle_stops_flying() -> anyhow::Result<()> {
        let mut s = server();
        let id = s.spawn_vehicle(
            VehicleSpec::gyrodyne(),
            Box::new(HoverController::default()),
            Pose::at(Vec3::new(0.5, 64.0, 0.5)),
        );
        let (server_end, client_end) = link_pair(1024);
        client_end.send(&NetMsg::Hello {
            protocol: PROTOCOL_VERSION,
        })?;
        let cid = s.accept(server_end).await?;
        let player = s.player_of(cid).context("player")?;
        assert!(s.interact(id, player)?);

        client_end.send(&NetMsg::Controls(ControlsCommand {
            client_id: cid,
            vehicle: id,
            tick: 0,
            axes: ControlAxes::new(0.0, 1.0, 1.0),
        }))?;
        s.step()?;
        client_end.send(&NetMsg::Command(CommandMessage {
            vehicle: id,
            rider: player,
            key: CommandKey::Dismount,
            velocity: Vec3::ZERO,
        }))?;
        s.step()?;

        let v = s.vehicle(id).context("vehicle")?;
        assert_eq!(v.passengers().len(), 0);
        assert_eq!(v.controls(), ControlAxes::default());
        let y_at_dismount = v.position().y;
        for _ in 0..100 {
            s.step()?;
        }
        assert!(s.vehicle(id).context("vehicle")?.position().y <= y_at_dismount);
        Ok(())
    }

    #[tokio::test]
    async fn disconnecting_pilot_releases_controls() -> anyhow::Result<()> {
        let mut s = server();
        let id = s.spawn_vehicle(
            VehicleSpec::gyrodyne(),
            Box::new(HoverController::default()),
            Pose::at(Vec3::new(0.5, 64.0, 0.5)),
        );
        let (server_end, client_end) = link_pair(1024);
        client_end.send(&NetMsg::Hello {
            protocol: PROTOCOL_VERSION,
        })?;
        let cid = s.accept(server_end).await?;
        let player = s.player_of(cid).context("player")?;
        assert!(s.interact(id, player)?);

        client_end.send(&NetMsg::Controls(ControlsCommand {
            client_id: cid,
            vehicle: id,
            tick: 0,
            axes: ControlAxes::new(1.0, 1.0, 0.0),
        }))?;
        client_end.send(&NetMsg::Disconnect {
            reason: "quit".into(),
        })?;
        s.step()?;

        let v = s.vehicle(id).context("vehicle")?;
        assert!(!v.has_passenger(player));
        assert_eq!(v.controls(), ControlAxes::default());
        assert_eq!(s.client_count(), 0);
        Ok(())
    }

    #[test]
    fn passenger_head_turn_is_clamped() {
        let mut s = server();
        let id = s.spawn_vehicle(
            VehicleSpec::gyrodyne(),
            Box::new(NullController),
            Pose::at(Vec3::new(0.0, 64.0, 0.0)),
        );
        let p = s.spawn_rider(EntityKind::Player, Vec3::new(3.0, 64.0, 3.0));
        assert!(s.board(id, p).unwrap());

        assert!(s.look_around(id, p, -170.0).unwrap());
        let rider = &s.vehicle(id).unwrap().passengers()[0];
        assert_eq!(rider.yaw, -105.0);
        assert_eq!(rider.head_yaw, -105.0);

        let stranger = s.spawn_rider(EntityKind::Player, Vec3::new(9.0, 64.0, 9.0));
        assert!(!s.look_around(id, stranger, 0.0).unwrap());
        assert!(s.look_around(EntityId(999), p, 0.0).is_err());
    }

    #[tokio::test]
    async fn foreign_commands_are_rejected() -> anyhow::Result<()> {
        let mut s = server();
        let id = s.spawn_vehicle(
            VehicleSpec::gyrodyne(),
            Box::new(NullController),
            Pose::at(Vec3::new(0.5, 64.0, 0.5)),
        );
        let other = s.spawn_rider(EntityKind::Player, Vec3::new(3.0, 64.0, 3.0));
        assert!(s.interact(id, other)?);

        let (server_end, client_end) = link_pair(1024);
        client_end.send(&NetMsg::Hello {
            protocol: PROTOCOL_VERSION,
        })?;
        let cid = s.accept(server_end).await?;
        client_end.send(&NetMsg::Command(CommandMessage {
            vehicle: id,
            rider: other,
            key: CommandKey::Dismount,
            velocity: Vec3::ZERO,
        }))?;
        client_end.send(&NetMsg::Controls(ControlsCommand {
            client_id: cid,
            vehicle: id,
            tick: 0,
            axes: ControlAxes::new(1.0, 1.0, 1.0),
        }))?;
        s.step()?;
        let v = s.vehicle(id).context("vehicle")?;
        assert!(v.has_passenger(other));
        assert_eq!(v.controls(), ControlAxes::default());
        Ok(())
    }

    #[tokio::test]
    async fn bad_protocol_is_refused() {
        let mut s = server();
        let (server_end, client_end) = link_pair(8);
        client_end
            .send(&NetMsg::Hello { protocol: 0 })
            .unwrap();
        assert!(s.accept(server_end).await.is_err());
        assert_eq!(s.client_count(), 0);
    }
}
