//! Passenger seating.
//!
//! A vehicle's seat layout is a list of rows indexed by `occupancy - 1`: row
//! `n` holds the seat offsets used when `n + 1` passengers are aboard, so a
//! lone pilot can sit in the middle and a full cabin spreads out. Offsets are
//! vehicle-local (x lateral, y up, z forward).

use std::f64::consts::SQRT_2;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    math::{wrap_degrees, Aabb, Vec3},
    transform::Pose,
    world::{can_dismount_in_block, BlockPos, EntityId, EntityKind, Rider, VehicleWorld},
};

/// Animals sit a little further forward.
pub const ANIMAL_SEAT_OFFSET: f64 = 0.2;
/// How far a passenger may look away from the vehicle's heading.
pub const MAX_RELATIVE_YAW: f32 = 105.0;

/// Seat offsets per occupancy.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SeatLayout {
    rows: Vec<Vec<Vec3>>,
}

impl SeatLayout {
    pub fn new(rows: Vec<Vec<Vec3>>) -> Self {
        Self { rows }
    }

    /// Maximum number of passengers.
    pub fn capacity(&self) -> usize {
        self.rows.len()
    }

    pub fn rows(&self) -> &[Vec<Vec3>] {
        &self.rows
    }

    /// Seat offset for passenger `index` when `occupancy` riders are aboard.
    pub fn seat(&self, occupancy: usize, index: usize) -> Option<Vec3> {
        let row = occupancy.checked_sub(1)?;
        self.rows.get(row)?.get(index).copied()
    }
}

/// The ordered passenger list of one vehicle. The first rider is the pilot.
#[derive(Debug, Clone, Default)]
pub struct Seating {
    layout: SeatLayout,
    passengers: Vec<Rider>,
}

impl Seating {
    pub fn new(layout: SeatLayout) -> Self {
        Self {
            layout,
            passengers: Vec::new(),
        }
    }

    pub fn layout(&self) -> &SeatLayout {
        &self.layout
    }

    pub fn capacity(&self) -> usize {
        self.layout.capacity()
    }

    pub fn occupancy(&self) -> usize {
        self.passengers.len()
    }

    pub fn passengers(&self) -> &[Rider] {
        &self.passengers
    }

    pub fn pilot(&self) -> Option<&Rider> {
        self.passengers.first()
    }

    pub fn index_of(&self, id: EntityId) -> Option<usize> {
        self.passengers.iter().position(|p| p.id == id)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.index_of(id).is_some()
    }

    pub fn can_seat(&self, submerged: bool) -> bool {
        self.occupancy() < self.capacity() && !submerged
    }

    /// Appends a passenger. A full or submerged vehicle hands the rider back.
    pub fn seat(&mut self, mut rider: Rider, vehicle: EntityId, submerged: bool) -> Result<(), Rider> {
        if !self.can_seat(submerged) {
            return Err(rider);
        }
        rider.riding = Some(vehicle);
        self.passengers.push(rider);
        Ok(())
    }

    pub fn unseat(&mut self, id: EntityId) -> Option<Rider> {
        let idx = self.index_of(id)?;
        let mut rider = self.passengers.remove(idx);
        rider.riding = None;
        Some(rider)
    }

    /// Empties the vehicle, pilot first.
    pub fn unseat_all(&mut self) -> Vec<Rider> {
        let mut out = std::mem::take(&mut self.passengers);
        for r in &mut out {
            r.riding = None;
        }
        out
    }

    fn animal_count(&self) -> usize {
        self.passengers
            .iter()
            .filter(|p| p.kind == EntityKind::Animal)
            .count()
    }

    /// Vehicle-local position of passenger `index`, including species and
    /// height offsets. `None` when the current row has no such seat.
    pub fn local_offset(&self, index: usize) -> Option<Vec3> {
        let rider = self.passengers.get(index)?;
        let mut offset = self.layout.seat(self.occupancy(), index)?;
        if rider.kind == EntityKind::Animal {
            offset.z += ANIMAL_SEAT_OFFSET;
        }
        offset.y += rider.height_offset;
        Some(offset)
    }

    /// Moves passenger `index` onto its seat and turns it with the vehicle.
    /// `yaw_delta` is how far the vehicle turned this tick. Returns whether a
    /// seat was found.
    pub fn place(&mut self, index: usize, pose: &Pose, yaw_delta: f32) -> bool {
        let Some(local) = self.local_offset(index) else {
            return false;
        };
        let separate_animals = self.animal_count() > 1;
        let rider = &mut self.passengers[index];

        rider.position = pose.transform_position(local);
        rider.yaw += yaw_delta;
        rider.head_yaw += yaw_delta;
        clamp_rider_yaw(rider, pose.yaw);

        if rider.kind == EntityKind::Animal && separate_animals {
            let angle = if rider.id.0 % 2 == 0 { 90.0 } else { 270.0 };
            rider.body_yaw += angle;
            rider.head_yaw += angle;
        }
        true
    }

    /// Places every passenger; riders without a seat are left where they are.
    pub fn place_all(&mut self, pose: &Pose, yaw_delta: f32) {
        for i in 0..self.passengers.len() {
            self.place(i, pose, yaw_delta);
        }
    }

    /// Turns passenger `id` to `yaw`, then re-applies the head clamp.
    /// Returns false for riders not aboard.
    pub fn look_around(&mut self, id: EntityId, yaw: f32, vehicle_yaw: f32) -> bool {
        let Some(idx) = self.index_of(id) else {
            return false;
        };
        let rider = &mut self.passengers[idx];
        rider.prev_yaw = rider.yaw;
        rider.yaw = yaw;
        clamp_rider_yaw(rider, vehicle_yaw);
        true
    }

    /// Appends a passenger without capacity checks. Used to mirror the
    /// authority's passenger list.
    pub fn force_seat(&mut self, rider: Rider) {
        self.passengers.push(rider);
    }
}

/// Aligns the rider's body with the vehicle and keeps the head within
/// ±[`MAX_RELATIVE_YAW`] of the heading.
pub fn clamp_rider_yaw(rider: &mut Rider, vehicle_yaw: f32) {
    rider.body_yaw = vehicle_yaw;
    let relative = wrap_degrees(rider.yaw - vehicle_yaw);
    let clamped = relative.clamp(-MAX_RELATIVE_YAW, MAX_RELATIVE_YAW);
    rider.prev_yaw += clamped - relative;
    rider.yaw += clamped - relative;
    rider.head_yaw = rider.yaw;
}

/// Horizontal offset from the vehicle centre to the footprint edge on its
/// side, far enough that a rider of `rider_width` clears the hull.
pub fn dismount_offset(yaw: f32, vehicle_width: f64, rider_width: f64) -> Vec3 {
    let d = (vehicle_width + rider_width + 1.0e-5) / 2.0;
    let side = f64::from(yaw + 90.0).to_radians();
    let f = -side.sin();
    let g = side.cos();
    let h = f.abs().max(g.abs());
    Vec3::new(f * d / h, 0.0, g * d / h)
}

/// What the dismount search needs to know about the vehicle.
#[derive(Debug, Clone, Copy)]
pub struct DismountContext {
    pub pose: Pose,
    pub bounds: Aabb,
    pub velocity: Vec3,
    pub width: f64,
    /// Vehicles faster than this (squared) skip the search.
    pub max_speed_sq: f64,
}

/// Picks where a leaving passenger should stand. Tries the ground beside the
/// vehicle, at the hull's top block and the one beneath it, in every pose the
/// rider supports; otherwise falls back to the world's default. Sets the
/// rider's pose when a side spot fits.
pub fn dismount_position<W: VehicleWorld + ?Sized>(
    world: &W,
    vehicle: &DismountContext,
    rider: &mut Rider,
) -> Vec3 {
    if vehicle.velocity.len_sq() < vehicle.max_speed_sq {
        let off = dismount_offset(
            vehicle.pose.yaw,
            vehicle.width * SQRT_2,
            f64::from(rider.width),
        );
        let x = vehicle.pose.position.x + off.x;
        let z = vehicle.pose.position.z + off.z;
        let top = BlockPos::containing(Vec3::new(x, vehicle.bounds.max.y, z));
        let below = top.down();
        if !world.is_water(below) {
            let candidates: Vec<Vec3> = [top, below]
                .into_iter()
                .filter_map(|b| {
                    let h = world.dismount_height(b);
                    can_dismount_in_block(h).then(|| Vec3::new(x, f64::from(b.y) + h, z))
                })
                .collect();
            for dims in rider.poses.clone() {
                for c in &candidates {
                    if let Some(spot) = world.find_dismount_spot(*c, dims) {
                        rider.pose = dims.pose;
                        debug!(rider = ?rider.id, ?spot, pose = ?dims.pose, "Dismount spot found");
                        return spot;
                    }
                }
            }
        }
    }
    world.default_dismount_position(&vehicle.bounds, rider)
}
