//! World abstraction.
//!
//! The vehicle core never touches terrain or other entities directly. It asks
//! a [`VehicleWorld`] for collision-resolved movement, fluid and block
//! queries, nearby entities, and side effects like item drops and particles.
//! Hosts implement the trait; [`crate::flat::FlatWorld`] is the in-memory
//! implementation used by the server binary and tests.

use serde::{Deserialize, Serialize};

use crate::math::{Aabb, Vec3};

/// Opaque entity id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u64);

/// What an entity is, as far as vehicles care.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityKind {
    /// The player whose input this process captures.
    LocalPlayer,
    Player,
    Animal,
    WaterCreature,
    /// Any other living mob.
    Creature,
    Vehicle,
    /// Non-living things: items, projectiles.
    Object,
}

impl EntityKind {
    pub fn is_player(self) -> bool {
        matches!(self, EntityKind::LocalPlayer | EntityKind::Player)
    }

    pub fn is_living(self) -> bool {
        !matches!(self, EntityKind::Vehicle | EntityKind::Object)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityPose {
    Standing,
    Crouching,
    Swimming,
}

/// Collision box for one pose.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoseDimensions {
    pub pose: EntityPose,
    pub width: f32,
    pub height: f32,
}

/// An entity that can ride a vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rider {
    pub id: EntityId,
    pub kind: EntityKind,
    pub position: Vec3,
    pub velocity: Vec3,
    pub yaw: f32,
    pub prev_yaw: f32,
    pub head_yaw: f32,
    pub body_yaw: f32,
    pub width: f32,
    pub height: f32,
    /// Vertical offset applied when seated.
    pub height_offset: f64,
    pub pose: EntityPose,
    /// Poses the rider can take, in order of preference.
    pub poses: Vec<PoseDimensions>,
    /// The vehicle this rider currently sits in.
    pub riding: Option<EntityId>,
    pub collidable: bool,
    pub pushable: bool,
}

impl Rider {
    /// Creates a rider with stock dimensions for its kind.
    pub fn new(id: EntityId, kind: EntityKind, position: Vec3) -> Self {
        let (width, height, height_offset) = match kind {
            EntityKind::LocalPlayer | EntityKind::Player => (0.6, 1.8, -0.35),
            EntityKind::Animal => (0.9, 1.4, 0.0),
            EntityKind::WaterCreature => (0.8, 0.6, 0.0),
            EntityKind::Creature => (0.6, 1.95, 0.0),
            EntityKind::Vehicle => (1.375, 0.5625, 0.0),
            EntityKind::Object => (0.25, 0.25, 0.0),
        };
        let mut poses = vec![PoseDimensions {
            pose: EntityPose::Standing,
            width,
            height,
        }];
        if kind.is_player() {
            poses.push(PoseDimensions {
                pose: EntityPose::Crouching,
                width,
                height: 1.5,
            });
            poses.push(PoseDimensions {
                pose: EntityPose::Swimming,
                width,
                height: 0.6,
            });
        }
        Self {
            id,
            kind,
            position,
            velocity: Vec3::ZERO,
            yaw: 0.0,
            prev_yaw: 0.0,
            head_yaw: 0.0,
            body_yaw: 0.0,
            width,
            height,
            height_offset,
            pose: EntityPose::Standing,
            poses,
            riding: None,
            collidable: false,
            pushable: kind.is_living(),
        }
    }

    pub fn with_size(mut self, width: f32, height: f32) -> Self {
        self.width = width;
        self.height = height;
        for p in &mut self.poses {
            p.width = width;
        }
        if let Some(standing) = self.poses.iter_mut().find(|p| p.pose == EntityPose::Standing) {
            standing.height = height;
        }
        self
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::from_feet(self.position, f64::from(self.width), f64::from(self.height))
    }

    pub fn has_vehicle(&self) -> bool {
        self.riding.is_some()
    }
}

/// Integer block coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Block containing the point.
    pub fn containing(p: Vec3) -> Self {
        Self::new(p.x.floor() as i32, p.y.floor() as i32, p.z.floor() as i32)
    }

    pub fn down(self) -> Self {
        Self::new(self.x, self.y - 1, self.z)
    }
}

/// Whether a value returned by [`VehicleWorld::dismount_height`] is a
/// surface an entity can stand on.
pub fn can_dismount_in_block(height: f64) -> bool {
    height.is_finite() && height < 1.0
}

bitflags::bitflags! {
    /// Axes on which a movement step was blocked.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Collision: u8 {
        const HORIZONTAL = 1 << 0;
        const VERTICAL = 1 << 1;
    }
}

/// Result of moving a box through the world.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveOutcome {
    /// Movement actually performed.
    pub displacement: Vec3,
    pub collision: Collision,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParticleKind {
    Splash,
}

/// Capabilities a vehicle needs from its host world.
pub trait VehicleWorld {
    /// Moves `bounds` by `movement`, stopping at solid geometry.
    fn move_box(&self, bounds: Aabb, movement: Vec3) -> MoveOutcome;

    /// Whether a point (an entity's eye) is under water.
    fn is_submerged(&self, eye: Vec3) -> bool;

    fn is_water(&self, block: BlockPos) -> bool;

    /// Standing height inside `block`, relative to its bottom. Values that
    /// fail [`can_dismount_in_block`] mean "no floor here".
    fn dismount_height(&self, block: BlockPos) -> f64;

    /// Checks whether a box of `dims` fits with its feet at `feet`; returns
    /// the spot to place the entity.
    fn find_dismount_spot(&self, feet: Vec3, dims: PoseDimensions) -> Option<Vec3>;

    /// Ids of free (non-riding) entities whose boxes intersect `area`.
    fn nearby_riders(&self, area: Aabb) -> Vec<EntityId>;

    fn rider(&self, id: EntityId) -> Option<&Rider>;

    /// Removes a free entity from the world so a vehicle can carry it.
    fn take_rider(&mut self, id: EntityId) -> Option<Rider>;

    /// Returns a previously taken entity to the world.
    fn release_rider(&mut self, rider: Rider);

    fn push_rider(&mut self, id: EntityId, delta_velocity: Vec3);

    /// The world rule allowing destroyed entities to drop items.
    fn entity_drops_enabled(&self) -> bool;

    fn drop_item(&mut self, item: &str, at: Vec3);

    fn emit_particle(&mut self, kind: ParticleKind, at: Vec3, velocity: Vec3);

    /// Where a dismounting rider ends up when no better spot was found:
    /// centred on top of the vehicle.
    fn default_dismount_position(&self, vehicle: &Aabb, _rider: &Rider) -> Vec3 {
        Vec3::new(
            (vehicle.min.x + vehicle.max.x) / 2.0,
            vehicle.max.y,
            (vehicle.min.z + vehicle.max.z) / 2.0,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_pos_floors_negative_coordinates() {
        assert_eq!(
            BlockPos::containing(Vec3::new(-0.5, 63.99, 2.0)),
            BlockPos::new(-1, 63, 2)
        );
    }

    #[test]
    fn dismount_heights() {
        assert!(can_dismount_in_block(0.0));
        assert!(can_dismount_in_block(0.5));
        assert!(!can_dismount_in_block(1.0));
        assert!(!can_dismount_in_block(f64::NEG_INFINITY));
    }

    #[test]
    fn players_can_crouch_and_swim() {
        let p = Rider::new(EntityId(1), EntityKind::Player, Vec3::ZERO);
        assert_eq!(p.poses.len(), 3);
        let cow = Rider::new(EntityId(2), EntityKind::Animal, Vec3::ZERO);
        assert_eq!(cow.poses.len(), 1);
        assert!(cow.pushable);
    }
}
