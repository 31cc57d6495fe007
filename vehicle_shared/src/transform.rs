//! Vehicle pose and transform composition.
//!
//! The rotation order is fixed: yaw (negated, about +Y), then pitch (about
//! +X), then roll (about +Z). Passenger seats, forward/up vectors and
//! renderers all go through the same composition.

use serde::{Deserialize, Serialize};

use crate::math::{Mat3, Mat4, Vec3};

/// Position plus orientation in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub roll: f32,
}

impl Pose {
    pub fn new(position: Vec3, yaw: f32, pitch: f32, roll: f32) -> Self {
        Self {
            position,
            yaw,
            pitch,
            roll,
        }
    }

    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Rotation-only transform for direction vectors.
    pub fn normal_transform(&self) -> Mat3 {
        Mat3::rotation_y(-f64::from(self.yaw))
            * Mat3::rotation_x(f64::from(self.pitch))
            * Mat3::rotation_z(f64::from(self.roll))
    }

    /// Vehicle-local to world transform.
    pub fn transform(&self) -> Mat4 {
        Mat4::translation(self.position) * Mat4::from_mat3(self.normal_transform())
    }

    pub fn transform_position(&self, local: Vec3) -> Vec3 {
        self.transform().transform_point(local)
    }

    pub fn transform_vector(&self, local: Vec3) -> Vec3 {
        self.normal_transform().transform(local)
    }

    /// World to vehicle-local; inverse of [`Pose::transform_position`].
    pub fn inverse_transform_position(&self, world: Vec3) -> Vec3 {
        self.transform().inverse_rigid().transform_point(world)
    }

    /// Unit vector the nose points along.
    pub fn forward(&self) -> Vec3 {
        self.transform_vector(Vec3::new(0.0, 0.0, 1.0))
    }

    /// Unit vector out of the vehicle's roof.
    pub fn up(&self) -> Vec3 {
        self.transform_vector(Vec3::new(0.0, 1.0, 0.0))
    }
}
