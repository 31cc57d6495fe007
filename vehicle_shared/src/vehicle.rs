//! The rideable vehicle entity.
//!
//! `VehicleEntity` owns everything a vehicle needs between ticks: pose,
//! velocity, control state, the observer easing state, damage wobble and the
//! passenger list. One call to [`VehicleEntity::tick`] advances it by one
//! simulation step:
//!
//! 1. sample local input (client with a local pilot/passenger only)
//! 2. decay the wobble
//! 3. remember the previous pose
//! 4. reconcile toward the last authoritative pose (observers)
//! 5. run the controller and move (motion owner only)
//! 6. board or push nearby creatures
//! 7. place passengers on their seats
//! 8. ease the cosmetic control feedback (client only)
//!
//! Inbound replication (`receive_pose`, `apply_wobble`, `set_passengers`)
//! must be applied before the tick of the same frame.

use rand::Rng;
use tracing::{debug, info};

use crate::{
    config::VehicleConfig,
    controls::{ControlAxes, ControlKey, InputSampler},
    interpolated::InterpolatedFloat,
    math::{lerp_f32, Aabb, Vec3},
    net::{CommandKey, CommandMessage, VehicleSpawn},
    physics::{Controller, Kinematics},
    seating::{dismount_position, DismountContext, SeatLayout, Seating},
    sync::ClientSync,
    transform::Pose,
    wobble::{DamageWobble, WobblePhase, WobbleSnapshot},
    world::{EntityId, EntityKind, ParticleKind, Rider, VehicleWorld},
};

/// Camera distance (squared) within which vehicle particles are spawned.
pub const PARTICLE_RANGE_SQ: f64 = 1024.0;

/// Which copy of the simulation this is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// Ground truth for damage, boarding and (by default) motion.
    Server,
    /// Rendering copy; captures local input.
    Client,
}

/// Static description of a vehicle variant.
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleSpec {
    pub kind: String,
    pub width: f32,
    pub height: f32,
    pub seats: SeatLayout,
    /// Steer the Z axis with push/pull instead of forward/backward.
    pub airplane_controls: bool,
    /// Item released when the vehicle breaks.
    pub drop_item: String,
    pub render_distance_multiplier: f64,
}

impl VehicleSpec {
    /// Three-seat hover craft used by the headless binaries.
    pub fn gyrodyne() -> Self {
        Self {
            kind: "gyrodyne".to_string(),
            width: 2.0,
            height: 1.25,
            seats: SeatLayout::new(vec![
                vec![Vec3::new(0.0, 0.4, 0.1)],
                vec![Vec3::new(0.0, 0.4, 0.4), Vec3::new(0.0, 0.4, -0.5)],
                vec![
                    Vec3::new(0.0, 0.4, 0.4),
                    Vec3::new(-0.45, 0.4, -0.5),
                    Vec3::new(0.45, 0.4, -0.5),
                ],
            ]),
            airplane_controls: false,
            drop_item: "gyrodyne".to_string(),
            render_distance_multiplier: 1.0,
        }
    }

    /// Looks up a built-in variant by name.
    pub fn by_kind(kind: &str) -> Option<Self> {
        match kind {
            "gyrodyne" => Some(Self::gyrodyne()),
            _ => None,
        }
    }
}

/// Who (if anyone) dealt damage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Attacker {
    pub id: EntityId,
    pub kind: EntityKind,
    /// Attacker is a player in creative mode.
    pub creative: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DamageSource {
    pub attacker: Option<Attacker>,
    /// Void damage and similar ignore invulnerability.
    pub bypasses_invulnerability: bool,
}

impl DamageSource {
    pub fn by(attacker: Attacker) -> Self {
        Self {
            attacker: Some(attacker),
            bypasses_invulnerability: false,
        }
    }

    fn is_creative_player(&self) -> bool {
        self.attacker
            .is_some_and(|a| a.kind.is_player() && a.creative)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractResult {
    /// Not handled; let something else react.
    Pass,
    /// Handled on the server.
    Consume,
    /// Handled on the client; the server decides.
    Success,
}

/// What happened during one tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    /// Creatures seated by auto-boarding.
    pub boarded: Vec<EntityId>,
    /// Commands the local side wants sent to the authority.
    pub commands: Vec<CommandMessage>,
    /// Wobble strength added by collisions.
    pub collision_wobble: f32,
}

pub struct VehicleEntity {
    id: EntityId,
    spec: VehicleSpec,
    side: Side,
    owns_motion: bool,
    pose: Pose,
    prev: Pose,
    velocity: Vec3,
    controls: ControlAxes,
    pressing: [InterpolatedFloat; 3],
    sync: ClientSync,
    wobble: DamageWobble,
    seating: Seating,
    controller: Box<dyn Controller>,
    removed: bool,
    invulnerable: bool,
    dismount_speed_sq: f64,
    render_distance: f64,
    age: u64,
}

impl std::fmt::Debug for VehicleEntity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VehicleEntity")
            .field("id", &self.id)
            .field("kind", &self.spec.kind)
            .field("side", &self.side)
            .field("pose", &self.pose)
            .field("removed", &self.removed)
            .finish_non_exhaustive()
    }
}

impl VehicleEntity {
    /// Creates a vehicle. Server copies own their motion; client copies
    /// observe until told otherwise.
    pub fn new(
        id: EntityId,
        spec: VehicleSpec,
        controller: Box<dyn Controller>,
        side: Side,
        cfg: &VehicleConfig,
    ) -> Self {
        let input_steps = cfg.input_interpolation_steps as f32;
        Self {
            id,
            seating: Seating::new(spec.seats.clone()),
            spec,
            side,
            owns_motion: side == Side::Server,
            pose: Pose::default(),
            prev: Pose::default(),
            velocity: Vec3::ZERO,
            controls: ControlAxes::default(),
            pressing: [InterpolatedFloat::new(input_steps); 3],
            sync: ClientSync::new(cfg.sync_interpolation_steps),
            wobble: DamageWobble::new(cfg.destroy_threshold),
            controller,
            removed: false,
            invulnerable: false,
            dismount_speed_sq: cfg.dismount_speed_sq,
            render_distance: cfg.render_distance,
            age: 0,
        }
    }

    /// Builds an observer copy from a spawn packet.
    pub fn from_spawn(
        spawn: &VehicleSpawn,
        spec: VehicleSpec,
        controller: Box<dyn Controller>,
        cfg: &VehicleConfig,
    ) -> Self {
        let mut v = Self::new(spawn.id, spec, controller, Side::Client, cfg);
        v.pose = spawn.pose;
        v.prev = spawn.pose;
        v.wobble.apply_snapshot(spawn.wobble);
        v
    }

    pub fn spawn_data(&self) -> VehicleSpawn {
        VehicleSpawn {
            id: self.id,
            kind: self.spec.kind.clone(),
            pose: self.pose,
            wobble: self.wobble.snapshot(),
        }
    }

    // ─── Identity & state ───

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn spec(&self) -> &VehicleSpec {
        &self.spec
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn owns_motion(&self) -> bool {
        self.owns_motion
    }

    /// Hands motion ownership to or from this copy. Decided by the host.
    pub fn set_owns_motion(&mut self, owns: bool) {
        self.owns_motion = owns;
    }

    pub fn is_removed(&self) -> bool {
        self.removed
    }

    pub fn set_invulnerable(&mut self, invulnerable: bool) {
        self.invulnerable = invulnerable;
    }

    pub fn age(&self) -> u64 {
        self.age
    }

    // ─── Pose ───

    pub fn pose(&self) -> Pose {
        self.pose
    }

    pub fn position(&self) -> Vec3 {
        self.pose.position
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.pose.position = position;
    }

    /// Places the vehicle without any interpolation from the old pose.
    pub fn teleport(&mut self, pose: Pose) {
        self.pose = pose;
        self.prev = pose;
        self.set_pitch(pose.pitch);
    }

    pub fn set_yaw(&mut self, yaw: f32) {
        self.pose.yaw = yaw;
    }

    /// Sets pitch folded into [-180, 180), shifting the previous pitch by the
    /// same number of turns so render interpolation doesn't spin.
    pub fn set_pitch(&mut self, pitch: f32) {
        let loops = ((pitch + 180.0) / 360.0).floor() * 360.0;
        self.pose.pitch = pitch - loops;
        self.prev.pitch -= loops;
    }

    pub fn set_roll(&mut self, roll: f32) {
        self.pose.roll = roll;
    }

    pub fn yaw_at(&self, tick_delta: f32) -> f32 {
        lerp_f32(tick_delta, self.prev.yaw, self.pose.yaw)
    }

    pub fn pitch_at(&self, tick_delta: f32) -> f32 {
        lerp_f32(tick_delta, self.prev.pitch, self.pose.pitch)
    }

    pub fn roll_at(&self, tick_delta: f32) -> f32 {
        lerp_f32(tick_delta, self.prev.roll, self.pose.roll)
    }

    pub fn forward(&self) -> Vec3 {
        self.pose.forward()
    }

    pub fn up(&self) -> Vec3 {
        self.pose.up()
    }

    pub fn velocity(&self) -> Vec3 {
        self.velocity
    }

    pub fn set_velocity(&mut self, velocity: Vec3) {
        self.velocity = velocity;
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::from_feet(
            self.pose.position,
            f64::from(self.spec.width),
            f64::from(self.spec.height),
        )
    }

    pub fn eye_height(&self) -> f32 {
        self.spec.height
    }

    pub fn is_submerged<W: VehicleWorld + ?Sized>(&self, world: &W) -> bool {
        let eye = self.pose.position + Vec3::new(0.0, f64::from(self.eye_height()) - 0.11, 0.0);
        world.is_submerged(eye)
    }

    // ─── Controls ───

    pub fn controls(&self) -> ControlAxes {
        self.controls
    }

    pub fn set_inputs(&mut self, controls: ControlAxes) {
        self.controls = controls;
    }

    /// Smoothed control deflection for rendering.
    pub fn pressing(&self, tick_delta: f32) -> ControlAxes {
        let [x, y, z] = &self.pressing;
        ControlAxes::new(x.smooth(tick_delta), y.smooth(tick_delta), z.smooth(tick_delta))
    }

    // ─── Replication ───

    /// Inbound authoritative pose; restarts the easing countdown.
    pub fn receive_pose(&mut self, pose: Pose) {
        self.sync.receive(pose);
    }

    pub fn sync_state(&self) -> &ClientSync {
        &self.sync
    }

    pub fn wobble(&self) -> &DamageWobble {
        &self.wobble
    }

    pub fn apply_wobble(&mut self, snap: WobbleSnapshot) {
        self.wobble.apply_snapshot(snap);
    }

    /// Wobble fields changed since the last call, for outbound updates.
    pub fn take_wobble_changes(&mut self) -> Option<WobbleSnapshot> {
        self.wobble.take_changes()
    }

    /// Persistence hook: vehicles store nothing beyond what the host already
    /// tracks (position and orientation).
    pub fn write_custom_data(&self, _out: &mut serde_json::Map<String, serde_json::Value>) {}

    pub fn read_custom_data(&mut self, _data: &serde_json::Map<String, serde_json::Value>) {}

    // ─── Passengers ───

    pub fn seating(&self) -> &Seating {
        &self.seating
    }

    pub fn passengers(&self) -> &[Rider] {
        self.seating.passengers()
    }

    pub fn pilot(&self) -> Option<&Rider> {
        self.seating.pilot()
    }

    pub fn has_passenger(&self, id: EntityId) -> bool {
        self.seating.contains(id)
    }

    /// Replaces the passenger list with the authority's view.
    pub fn set_passengers(&mut self, riders: Vec<Rider>) {
        let pilot = self.pilot_id();
        self.seating.unseat_all();
        for mut r in riders {
            r.riding = Some(self.id);
            self.seating.force_seat(r);
        }
        self.release_controls_unless_piloted_by(pilot);
    }

    fn pilot_id(&self) -> Option<EntityId> {
        self.seating.pilot().map(|p| p.id)
    }

    /// Controls belong to whoever sits in the pilot seat; a new pilot or an
    /// empty seat starts from neutral.
    fn release_controls_unless_piloted_by(&mut self, previous: Option<EntityId>) {
        if self.pilot_id() != previous || previous.is_none() {
            self.controls = ControlAxes::default();
        }
    }

    /// Takes `id` out of the world and seats it.
    pub fn board<W: VehicleWorld + ?Sized>(&mut self, world: &mut W, id: EntityId) -> bool {
        if self.removed || self.seating.contains(id) {
            return false;
        }
        let submerged = self.is_submerged(world);
        if !self.seating.can_seat(submerged) {
            return false;
        }
        let Some(rider) = world.take_rider(id) else {
            return false;
        };
        match self.seating.seat(rider, self.id, submerged) {
            Ok(()) => {
                self.seating.place_all(&self.pose, 0.0);
                info!(vehicle = ?self.id, rider = ?id, occupancy = self.seating.occupancy(), "Boarded");
                true
            }
            Err(rider) => {
                world.release_rider(rider);
                false
            }
        }
    }

    /// Unseats `id`, puts it at its dismount position with `velocity`, and
    /// returns it to the world.
    pub fn dismount<W: VehicleWorld + ?Sized>(
        &mut self,
        world: &mut W,
        id: EntityId,
        velocity: Vec3,
    ) -> Option<Vec3> {
        let pilot = self.pilot_id();
        let mut rider = self.seating.unseat(id)?;
        self.release_controls_unless_piloted_by(pilot);
        let ctx = DismountContext {
            pose: self.pose,
            bounds: self.bounds(),
            velocity: self.velocity,
            width: f64::from(self.spec.width),
            max_speed_sq: self.dismount_speed_sq,
        };
        let spot = dismount_position(world, &ctx, &mut rider);
        rider.position = spot;
        rider.velocity = velocity;
        world.release_rider(rider);
        info!(vehicle = ?self.id, rider = ?id, ?spot, "Dismounted");
        Some(spot)
    }

    /// Applies a command from a passenger.
    pub fn handle_command<W: VehicleWorld + ?Sized>(&mut self, world: &mut W, cmd: &CommandMessage) {
        match cmd.key {
            CommandKey::Dismount => {
                if self.dismount(world, cmd.rider, cmd.velocity).is_none() {
                    debug!(vehicle = ?self.id, rider = ?cmd.rider, "Dismount from non-passenger ignored");
                }
            }
        }
    }

    /// Passenger `id` turned their head to `yaw`. The head stays within
    /// ±105° of the heading.
    pub fn on_passenger_look_around(&mut self, id: EntityId, yaw: f32) -> bool {
        self.seating.look_around(id, yaw, self.pose.yaw)
    }

    /// Right-click on the vehicle.
    pub fn interact<W: VehicleWorld + ?Sized>(
        &mut self,
        world: &mut W,
        player: EntityId,
        sneaking: bool,
    ) -> InteractResult {
        if sneaking {
            return InteractResult::Pass;
        }
        if self.side == Side::Server {
            return if self.board(world, player) {
                InteractResult::Consume
            } else {
                InteractResult::Pass
            };
        }
        if self.seating.contains(player) {
            InteractResult::Pass
        } else {
            InteractResult::Success
        }
    }

    // ─── Collisions & damage ───

    /// Whether this vehicle physically blocks `other`.
    pub fn collides_with(&self, other: &Rider) -> bool {
        (other.collidable || other.pushable) && !self.seating.contains(other.id)
    }

    /// Attacks from our own passengers are swallowed.
    pub fn ignores_attack_from(&self, attacker: EntityId) -> bool {
        self.seating.contains(attacker)
    }

    fn is_invulnerable_to(&self, source: &DamageSource) -> bool {
        self.invulnerable && !source.bypasses_invulnerability && !source.is_creative_player()
    }

    /// Applies damage. Returns `false` only when the source can't hurt this
    /// vehicle; observers and removed vehicles accept and ignore it.
    pub fn damage<W: VehicleWorld + ?Sized>(
        &mut self,
        world: &mut W,
        source: &DamageSource,
        amount: f32,
    ) -> bool {
        if self.is_invulnerable_to(source) {
            return false;
        }
        if self.side == Side::Client || self.removed {
            return true;
        }
        let phase = self.wobble.apply_damage(amount, source.is_creative_player());
        debug!(vehicle = ?self.id, amount, strength = self.wobble.strength(), "Damaged");
        if phase == WobblePhase::Destroyed {
            if world.entity_drops_enabled() {
                world.drop_item(&self.spec.drop_item, self.pose.position);
            }
            self.remove(world);
        }
        true
    }

    /// Client-side hurt shake when the server reports damage.
    pub fn animate_damage(&mut self) {
        self.wobble.animate_hurt();
    }

    /// Destroys the vehicle, leaving passengers where they sit.
    pub fn remove<W: VehicleWorld + ?Sized>(&mut self, world: &mut W) {
        if self.removed {
            return;
        }
        self.removed = true;
        self.controls = ControlAxes::default();
        for rider in self.seating.unseat_all() {
            world.release_rider(rider);
        }
        info!(vehicle = ?self.id, kind = %self.spec.kind, "Vehicle destroyed");
    }

    /// Moves by `movement` through the world. Blocked axes lose their
    /// velocity; a hard stop shakes the vehicle. Returns the wobble added.
    pub fn move_by<W: VehicleWorld + ?Sized>(&mut self, world: &W, movement: Vec3) -> f32 {
        let outcome = world.move_box(self.bounds(), movement);
        self.pose.position += outcome.displacement;
        if outcome.collision.is_empty() {
            return 0.0;
        }

        let d = outcome.displacement;
        if d.x != movement.x {
            self.velocity.x = 0.0;
        }
        if d.y != movement.y {
            self.velocity.y = 0.0;
        }
        if d.z != movement.z {
            self.velocity.z = 0.0;
        }

        let shortfall = (movement - d).len() as f32;
        let collision = shortfall - self.controller.gravity().abs();
        let added = self.wobble.collision_impulse(collision);
        if added > 0.0 {
            debug!(vehicle = ?self.id, collision, added, "Collision wobble");
        }
        added
    }

    fn push_away_from<W: VehicleWorld + ?Sized>(&mut self, world: &mut W, id: EntityId) {
        let Some(other) = world.rider(id) else {
            return;
        };
        let ours = self.bounds();
        let theirs = other.bounds();
        let allowed = if other.kind == EntityKind::Vehicle {
            theirs.min.y < ours.max.y
        } else {
            theirs.min.y <= ours.min.y
        };
        if !allowed {
            return;
        }

        let mut dx = other.position.x - self.pose.position.x;
        let mut dz = other.position.z - self.pose.position.z;
        let d = dx.abs().max(dz.abs());
        if d < 0.01 {
            return;
        }
        let d = d.sqrt();
        dx /= d;
        dz /= d;
        let e = (1.0 / d).min(1.0);
        let push = Vec3::new(dx * e * 0.05, 0.0, dz * e * 0.05);

        if self.seating.occupancy() == 0 {
            self.velocity += -push;
        }
        world.push_rider(id, push);
    }

    /// Splash particles when skimming a bubble column.
    pub fn on_bubble_column_surface<W: VehicleWorld + ?Sized, R: Rng + ?Sized>(
        &self,
        world: &mut W,
        rng: &mut R,
    ) {
        let p = self.pose.position;
        for _ in 0..2 {
            let at = Vec3::new(
                p.x + f64::from(rng.gen::<f32>()),
                p.y + 0.7,
                p.z + f64::from(rng.gen::<f32>()),
            );
            world.emit_particle(ParticleKind::Splash, at, Vec3::ZERO);
        }
    }

    // ─── Rendering hints ───

    pub fn should_render(&self, distance_sq: f64) -> bool {
        let d = self.render_distance * self.spec.render_distance_multiplier;
        distance_sq < d * d
    }

    pub fn is_within_particle_range(&self, camera: Vec3) -> bool {
        camera.distance_sq(self.pose.position) < PARTICLE_RANGE_SQ
    }

    // ─── Tick ───

    /// Advances one simulation step. `input` is the local input source, if
    /// this process captures one.
    pub fn tick<W: VehicleWorld + ?Sized>(
        &mut self,
        world: &mut W,
        input: Option<&mut dyn InputSampler>,
    ) -> TickReport {
        let mut report = TickReport::default();
        if self.removed {
            return report;
        }

        if self.side == Side::Client {
            if let Some(input) = input {
                self.sample_input(input, &mut report);
            }
        }

        self.wobble.decay();

        self.prev = self.pose;
        self.age += 1;

        if let Some(eased) = self.sync.step(self.owns_motion, self.pose) {
            self.pose.position = eased.position;
            self.pose.yaw = eased.yaw;
            self.set_pitch(eased.pitch);
        }

        if self.owns_motion {
            let mut kin = Kinematics {
                pose: self.pose,
                velocity: self.velocity,
            };
            self.controller.update_velocity(&mut kin, self.controls);
            if self.side == Side::Client {
                self.controller.update_controller(&mut kin, self.controls);
            }
            self.pose.yaw = kin.pose.yaw;
            self.pose.roll = kin.pose.roll;
            self.set_pitch(kin.pose.pitch);
            self.velocity = kin.velocity;
            report.collision_wobble = self.move_by(world, self.velocity);
        }
        if self.removed {
            return report;
        }

        self.check_nearby(world, &mut report);

        let yaw_delta = self.pose.yaw - self.prev.yaw;
        self.seating.place_all(&self.pose, yaw_delta);

        if self.side == Side::Client {
            let axes = [self.controls.x, self.controls.y, self.controls.z];
            for (f, v) in self.pressing.iter_mut().zip(axes) {
                f.update(v);
            }
        }
        report
    }

    fn sample_input(&mut self, input: &mut dyn InputSampler, report: &mut TickReport) {
        if self.seating.occupancy() == 0 {
            return;
        }
        let locals: Vec<EntityId> = self
            .passengers()
            .iter()
            .filter(|p| p.kind == EntityKind::LocalPlayer)
            .map(|p| p.id)
            .collect();
        for rider in locals {
            if input.was_pressed(ControlKey::Dismount) {
                report.commands.push(CommandMessage {
                    vehicle: self.id,
                    rider,
                    key: CommandKey::Dismount,
                    velocity: self.velocity,
                });
            }
        }
        if self.pilot().is_some_and(|p| p.kind == EntityKind::LocalPlayer) {
            self.controls = ControlAxes::sample(&*input, self.spec.airplane_controls);
        }
    }

    fn check_nearby<W: VehicleWorld + ?Sized>(&mut self, world: &mut W, report: &mut TickReport) {
        let area = self.bounds().expand(0.2, -0.01, 0.2);
        let nearby = world.nearby_riders(area);
        if nearby.is_empty() {
            return;
        }
        let may_auto_board =
            self.side == Side::Server && !self.pilot().is_some_and(|p| p.kind.is_player());

        for id in nearby {
            let Some(other) = world.rider(id) else {
                continue;
            };
            if !other.pushable || self.seating.contains(id) {
                continue;
            }
            let eligible = may_auto_board
                && self.seating.occupancy() + 1 < self.seating.capacity()
                && !other.has_vehicle()
                && other.width < self.spec.width
                && other.kind.is_living()
                && other.kind != EntityKind::WaterCreature
                && !other.kind.is_player();
            if eligible && self.board(world, id) {
                report.boarded.push(id);
                continue;
            }
            self.push_away_from(world, id);
        }
    }
}
