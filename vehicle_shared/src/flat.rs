//! In-memory flat world.
//!
//! A solid ground plane, an optional still-water level, a handful of solid
//! boxes and a set of free entities. Good enough to exercise collisions,
//! boarding and dismounting headlessly.

use std::collections::BTreeMap;

use tracing::debug;

use crate::{
    math::{Aabb, Vec3},
    world::{
        BlockPos, Collision, EntityId, EntityKind, MoveOutcome, ParticleKind, PoseDimensions,
        Rider, VehicleWorld,
    },
};

const EPS: f64 = 1.0e-7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    fn of(self, v: Vec3) -> f64 {
        match self {
            Axis::X => v.x,
            Axis::Y => v.y,
            Axis::Z => v.z,
        }
    }

    fn unit(self, d: f64) -> Vec3 {
        match self {
            Axis::X => Vec3::new(d, 0.0, 0.0),
            Axis::Y => Vec3::new(0.0, d, 0.0),
            Axis::Z => Vec3::new(0.0, 0.0, d),
        }
    }
}

/// A dropped item record.
#[derive(Debug, Clone, PartialEq)]
pub struct DroppedItem {
    pub item: String,
    pub at: Vec3,
}

/// An emitted particle record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmittedParticle {
    pub kind: ParticleKind,
    pub at: Vec3,
    pub velocity: Vec3,
}

#[derive(Debug, Clone)]
pub struct FlatWorld {
    ground_y: f64,
    water_level: Option<f64>,
    solids: Vec<Aabb>,
    riders: BTreeMap<EntityId, Rider>,
    next_id: u64,
    drops_enabled: bool,
    pub drops: Vec<DroppedItem>,
    pub particles: Vec<EmittedParticle>,
}

impl FlatWorld {
    pub fn new(ground_y: f64) -> Self {
        Self {
            ground_y,
            water_level: None,
            solids: Vec::new(),
            riders: BTreeMap::new(),
            next_id: 1,
            drops_enabled: true,
            drops: Vec::new(),
            particles: Vec::new(),
        }
    }

    pub fn with_water_level(mut self, level: f64) -> Self {
        self.water_level = Some(level);
        self
    }

    pub fn with_solid(mut self, solid: Aabb) -> Self {
        self.solids.push(solid);
        self
    }

    pub fn set_entity_drops(&mut self, enabled: bool) {
        self.drops_enabled = enabled;
    }

    pub fn ground_y(&self) -> f64 {
        self.ground_y
    }

    /// Reserves an id for an entity living outside the rider table
    /// (vehicles).
    pub fn allocate_id(&mut self) -> EntityId {
        let id = EntityId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Adds a free entity with stock dimensions for its kind.
    pub fn spawn_rider(&mut self, kind: EntityKind, position: Vec3) -> EntityId {
        let id = self.allocate_id();
        self.riders.insert(id, Rider::new(id, kind, position));
        debug!(id = ?id, kind = ?kind, "Spawned rider");
        id
    }

    pub fn insert_rider(&mut self, rider: Rider) {
        self.next_id = self.next_id.max(rider.id.0 + 1);
        self.riders.insert(rider.id, rider);
    }

    pub fn rider_mut(&mut self, id: EntityId) -> Option<&mut Rider> {
        self.riders.get_mut(&id)
    }

    pub fn riders(&self) -> impl Iterator<Item = &Rider> {
        self.riders.values()
    }

    fn is_solid(&self, block: BlockPos) -> bool {
        let min = Vec3::new(f64::from(block.x), f64::from(block.y), f64::from(block.z));
        let cell = Aabb::new(min, min + Vec3::new(1.0, 1.0, 1.0));
        f64::from(block.y) + 1.0 <= self.ground_y + EPS
            || self.solids.iter().any(|s| s.intersects(&cell))
    }

    fn clip(&self, bounds: &Aabb, axis: Axis, mut d: f64) -> f64 {
        if axis == Axis::Y && d < 0.0 && bounds.min.y >= self.ground_y - EPS {
            d = d.max(self.ground_y - bounds.min.y);
        }
        for s in &self.solids {
            let overlaps_across = [Axis::X, Axis::Y, Axis::Z]
                .into_iter()
                .filter(|a| *a != axis)
                .all(|a| a.of(bounds.min) < a.of(s.max) && a.of(bounds.max) > a.of(s.min));
            if !overlaps_across {
                continue;
            }
            if d > 0.0 && axis.of(bounds.max) <= axis.of(s.min) + EPS {
                d = d.min(axis.of(s.min) - axis.of(bounds.max));
            } else if d < 0.0 && axis.of(bounds.min) >= axis.of(s.max) - EPS {
                d = d.max(axis.of(s.max) - axis.of(bounds.min));
            }
        }
        d
    }
}

impl Default for FlatWorld {
    fn default() -> Self {
        Self::new(64.0)
    }
}

impl VehicleWorld for FlatWorld {
    fn move_box(&self, bounds: Aabb, movement: Vec3) -> MoveOutcome {
        let mut b = bounds;
        let mut done = Vec3::ZERO;
        let mut collision = Collision::empty();
        // Vertical first so sliding along the floor keeps horizontal speed.
        for axis in [Axis::Y, Axis::X, Axis::Z] {
            let want = axis.of(movement);
            if want == 0.0 {
                continue;
            }
            let got = self.clip(&b, axis, want);
            if got != want {
                collision |= if axis == Axis::Y {
                    Collision::VERTICAL
                } else {
                    Collision::HORIZONTAL
                };
            }
            b = b.offset(axis.unit(got));
            done += axis.unit(got);
        }
        MoveOutcome {
            displacement: done,
            collision,
        }
    }

    fn is_submerged(&self, eye: Vec3) -> bool {
        self.water_level.is_some_and(|w| eye.y < w)
    }

    fn is_water(&self, block: BlockPos) -> bool {
        !self.is_solid(block) && self.water_level.is_some_and(|w| f64::from(block.y) < w)
    }

    fn dismount_height(&self, block: BlockPos) -> f64 {
        if self.is_solid(block) {
            1.0
        } else if self.is_solid(block.down()) {
            0.0
        } else {
            f64::NEG_INFINITY
        }
    }

    fn find_dismount_spot(&self, feet: Vec3, dims: PoseDimensions) -> Option<Vec3> {
        let b = Aabb::from_feet(feet, f64::from(dims.width), f64::from(dims.height));
        if b.min.y < self.ground_y - EPS {
            return None;
        }
        if self.solids.iter().any(|s| s.intersects(&b)) {
            return None;
        }
        Some(feet)
    }

    fn nearby_riders(&self, area: Aabb) -> Vec<EntityId> {
        self.riders
            .values()
            .filter(|r| !r.has_vehicle() && r.bounds().intersects(&area))
            .map(|r| r.id)
            .collect()
    }

    fn rider(&self, id: EntityId) -> Option<&Rider> {
        self.riders.get(&id)
    }

    fn take_rider(&mut self, id: EntityId) -> Option<Rider> {
        self.riders.remove(&id)
    }

    fn release_rider(&mut self, mut rider: Rider) {
        rider.riding = None;
        self.riders.insert(rider.id, rider);
    }

    fn push_rider(&mut self, id: EntityId, delta_velocity: Vec3) {
        if let Some(r) = self.riders.get_mut(&id) {
            r.velocity += delta_velocity;
        }
    }

    fn entity_drops_enabled(&self) -> bool {
        self.drops_enabled
    }

    fn drop_item(&mut self, item: &str, at: Vec3) {
        self.drops.push(DroppedItem {
            item: item.to_string(),
            at,
        });
    }

    fn emit_particle(&mut self, kind: ParticleKind, at: Vec3, velocity: Vec3) {
        self.particles.push(EmittedParticle { kind, at, velocity });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box_at(y: f64) -> Aabb {
        Aabb::from_feet(Vec3::new(0.0, y, 0.0), 1.0, 1.0)
    }

    #[test]
    fn ground_stops_falling_box() {
        let world = FlatWorld::new(64.0);
        let out = world.move_box(unit_box_at(64.5), Vec3::new(0.0, -2.0, 0.0));
        assert_eq!(out.displacement, Vec3::new(0.0, -0.5, 0.0));
        assert_eq!(out.collision, Collision::VERTICAL);
    }

    #[test]
    fn free_air_movement_is_unblocked() {
        let world = FlatWorld::new(64.0);
        let mv = Vec3::new(0.3, -0.2, 0.1);
        let out = world.move_box(unit_box_at(70.0), mv);
        assert_eq!(out.displacement, mv);
        assert!(out.collision.is_empty());
    }

    #[test]
    fn wall_blocks_horizontal_motion() {
        let wall = Aabb::new(Vec3::new(2.0, 64.0, -5.0), Vec3::new(3.0, 80.0, 5.0));
        let world = FlatWorld::new(64.0).with_solid(wall);
        let out = world.move_box(unit_box_at(65.0), Vec3::new(4.0, 0.0, 0.0));
        assert!((out.displacement.x - 1.5).abs() < 1e-9);
        assert_eq!(out.collision, Collision::HORIZONTAL);
    }

    #[test]
    fn dismount_height_sees_ground() {
        let world = FlatWorld::new(64.0);
        assert_eq!(world.dismount_height(BlockPos::new(0, 63, 0)), 1.0);
        assert_eq!(world.dismount_height(BlockPos::new(0, 64, 0)), 0.0);
        assert_eq!(world.dismount_height(BlockPos::new(0, 66, 0)), f64::NEG_INFINITY);
    }

    #[test]
    fn water_below_level_only() {
        let world = FlatWorld::new(60.0).with_water_level(63.0);
        assert!(world.is_water(BlockPos::new(0, 62, 0)));
        assert!(!world.is_water(BlockPos::new(0, 63, 0)));
        assert!(!world.is_water(BlockPos::new(0, 58, 0)));
        assert!(world.is_submerged(Vec3::new(0.0, 62.5, 0.0)));
    }

    #[test]
    fn taken_riders_are_not_nearby() {
        let mut world = FlatWorld::new(64.0);
        let id = world.spawn_rider(EntityKind::Animal, Vec3::new(0.0, 64.0, 0.0));
        let area = unit_box_at(64.0).expand(1.0, 1.0, 1.0);
        assert_eq!(world.nearby_riders(area), vec![id]);
        let rider = world.take_rider(id).unwrap();
        assert!(world.nearby_riders(area).is_empty());
        world.release_rider(rider);
        assert_eq!(world.nearby_riders(area), vec![id]);
    }
}
