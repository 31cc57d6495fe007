//! Vehicle controllers.
//!
//! A controller turns control axes into a velocity for the next movement
//! step. Each vehicle variant (helicopter, airplane, ...) brings its own.

use serde::{Deserialize, Serialize};

use crate::{controls::ControlAxes, math::Vec3, transform::Pose};

/// Default downward pull per tick.
pub const DEFAULT_GRAVITY: f32 = -0.04;

/// Mutable motion state handed to a controller.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Kinematics {
    pub pose: Pose,
    pub velocity: Vec3,
}

/// Vehicle-specific motion model.
pub trait Controller: Send + Sync {
    /// Vertical acceleration per tick. Collisions smaller than its magnitude
    /// count as resting contact.
    fn gravity(&self) -> f32 {
        DEFAULT_GRAVITY
    }

    /// Computes the velocity for this tick. Runs wherever motion is owned.
    fn update_velocity(&mut self, kin: &mut Kinematics, controls: ControlAxes);

    /// Cosmetic adjustments made only by a client that owns motion.
    fn update_controller(&mut self, _kin: &mut Kinematics, _controls: ControlAxes) {}
}

/// Parked: never moves.
#[derive(Debug, Default)]
pub struct NullController;

impl Controller for NullController {
    fn gravity(&self) -> f32 {
        0.0
    }

    fn update_velocity(&mut self, kin: &mut Kinematics, _controls: ControlAxes) {
        kin.velocity = Vec3::ZERO;
    }
}

/// Tuning for [`HoverController`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HoverParams {
    /// Degrees of yaw per tick at full stick.
    pub yaw_speed: f32,
    /// Upward acceleration per tick at full collective.
    pub lift: f32,
    /// Forward acceleration per tick at full stick.
    pub thrust: f32,
    /// Fraction of velocity kept each tick.
    pub drag: f32,
    /// Bank angle at full yaw input.
    pub bank: f32,
    pub gravity: f32,
}

impl Default for HoverParams {
    fn default() -> Self {
        Self {
            yaw_speed: 4.0,
            lift: 0.08,
            thrust: 0.04,
            drag: 0.9,
            bank: 15.0,
            gravity: DEFAULT_GRAVITY,
        }
    }
}

/// Helicopter-like flight: X yaws, Y climbs, Z pushes along the heading.
#[derive(Debug, Default)]
pub struct HoverController {
    pub params: HoverParams,
}

impl HoverController {
    pub fn new(params: HoverParams) -> Self {
        Self { params }
    }
}

impl Controller for HoverController {
    fn gravity(&self) -> f32 {
        self.params.gravity
    }

    fn update_velocity(&mut self, kin: &mut Kinematics, controls: ControlAxes) {
        let p = self.params;
        kin.pose.yaw -= controls.x * p.yaw_speed;

        let yaw = f64::from(kin.pose.yaw).to_radians();
        let heading = Vec3::new(-yaw.sin(), 0.0, yaw.cos());
        let thrust = heading * f64::from(controls.z * p.thrust);
        let vertical = Vec3::new(0.0, f64::from(controls.y * p.lift + p.gravity), 0.0);

        kin.velocity = kin.velocity * f64::from(p.drag) + thrust + vertical;
    }

    fn update_controller(&mut self, kin: &mut Kinematics, controls: ControlAxes) {
        let target = -controls.x * self.params.bank;
        kin.pose.roll += (target - kin.pose.roll) * 0.25;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_hover_sinks_under_gravity() {
        let mut c = HoverController::default();
        let mut kin = Kinematics::default();
        c.update_velocity(&mut kin, ControlAxes::default());
        assert!((kin.velocity.y - f64::from(DEFAULT_GRAVITY)).abs() < 1e-9);
    }

    #[test]
    fn full_collective_climbs() {
        let mut c = HoverController::default();
        let mut kin = Kinematics::default();
        c.update_velocity(&mut kin, ControlAxes::new(0.0, 1.0, 0.0));
        assert!(kin.velocity.y > 0.0);
    }

    #[test]
    fn forward_stick_follows_heading() {
        let mut c = HoverController::default();
        let mut kin = Kinematics {
            pose: Pose::new(Vec3::ZERO, 90.0, 0.0, 0.0),
            ..Default::default()
        };
        c.update_velocity(&mut kin, ControlAxes::new(0.0, 0.0, 1.0));
        assert!(kin.velocity.x < 0.0);
        assert!(kin.velocity.z.abs() < 1e-9);
    }

    #[test]
    fn left_stick_turns_left_and_banks() {
        let mut c = HoverController::default();
        let mut kin = Kinematics::default();
        c.update_velocity(&mut kin, ControlAxes::new(1.0, 0.0, 0.0));
        assert_eq!(kin.pose.yaw, -4.0);
        c.update_controller(&mut kin, ControlAxes::new(1.0, 0.0, 0.0));
        assert!(kin.pose.roll < 0.0);
    }

    #[test]
    fn null_controller_parks() {
        let mut c = NullController;
        let mut kin = Kinematics {
            velocity: Vec3::new(1.0, 1.0, 1.0),
            ..Default::default()
        };
        c.update_velocity(&mut kin, ControlAxes::new(1.0, 1.0, 1.0));
        assert_eq!(kin.velocity, Vec3::ZERO);
    }
}
