//! Observer-side pose easing.
//!
//! The authority side publishes its pose every tick. Observers receive those
//! updates as targets and walk the rendered pose toward them over a fixed
//! number of ticks instead of teleporting.

use crate::{math::wrap_degrees, transform::Pose};

/// Default number of observer ticks spent easing toward one update.
pub const SYNC_STEPS: u32 = 10;

/// Last authoritative pose plus the remaining easing countdown.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClientSync {
    target: Pose,
    steps: u32,
    reset_steps: u32,
}

impl ClientSync {
    pub fn new(reset_steps: u32) -> Self {
        Self {
            target: Pose::default(),
            steps: 0,
            reset_steps: reset_steps.max(1),
        }
    }

    /// Records an authoritative update and restarts the countdown.
    pub fn receive(&mut self, target: Pose) {
        self.target = target;
        self.steps = self.reset_steps;
    }

    pub fn target(&self) -> Pose {
        self.target
    }

    pub fn steps_remaining(&self) -> u32 {
        self.steps
    }

    /// Runs one tick of reconciliation.
    ///
    /// The motion owner never smooths itself: it republishes `current` as the
    /// target and returns `None`. Observers get the eased pose back while the
    /// countdown runs, `None` once it reaches zero. Roll is not replicated
    /// and passes through untouched.
    pub fn step(&mut self, owns_motion: bool, current: Pose) -> Option<Pose> {
        if owns_motion {
            self.steps = 0;
            self.target = current;
            return None;
        }
        if self.steps == 0 {
            return None;
        }

        let next = if self.steps == 1 {
            self.arrive(current)
        } else {
            let n = f64::from(self.steps);
            let nf = self.steps as f32;
            let p = current.position;
            let t = self.target.position;
            let mut pose = current;
            pose.position.x = p.x + (t.x - p.x) / n;
            pose.position.y = p.y + (t.y - p.y) / n;
            pose.position.z = p.z + (t.z - p.z) / n;
            pose.yaw = current.yaw + wrap_degrees(self.target.yaw - current.yaw) / nf;
            pose.pitch = current.pitch + (self.target.pitch - current.pitch) / nf;
            pose
        };

        self.steps -= 1;
        Some(next)
    }

    // Final step lands exactly on the target. Yaw keeps whichever full turn
    // is closest to the current heading so the rendered yaw doesn't jump.
    fn arrive(&self, current: Pose) -> Pose {
        let unwrapped = current.yaw + wrap_degrees(self.target.yaw - current.yaw);
        let turns = ((unwrapped - self.target.yaw) / 360.0).round();
        Pose {
            position: self.target.position,
            yaw: self.target.yaw + turns * 360.0,
            pitch: self.target.pitch,
            roll: current.roll,
        }
    }
}

impl Default for ClientSync {
    fn default() -> Self {
        Self::new(SYNC_STEPS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vec3;

    #[test]
    fn reaches_target_exactly_after_ten_ticks() {
        let mut sync = ClientSync::default();
        let start = Pose::new(Vec3::new(0.0, 64.0, 0.0), 10.0, -5.0, 0.0);
        let target = Pose::new(Vec3::new(3.3, 60.1, -7.7), 40.0, 12.5, 0.0);
        sync.receive(target);

        let mut pose = start;
        for tick in 0..10 {
            let next = sync.step(false, pose).expect("easing in progress");
            let axes = [
                (pose.position.x, next.position.x, target.position.x),
                (pose.position.y, next.position.y, target.position.y),
                (pose.position.z, next.position.z, target.position.z),
                (f64::from(pose.yaw), f64::from(next.yaw), f64::from(target.yaw)),
                (f64::from(pose.pitch), f64::from(next.pitch), f64::from(target.pitch)),
            ];
            for (before, after, goal) in axes {
                assert!(
                    (goal - after).abs() < (goal - before).abs(),
                    "tick {tick}: {before} -> {after} toward {goal}"
                );
            }
            pose = next;
        }
        assert_eq!(pose.position, target.position);
        assert_eq!(pose.yaw, target.yaw);
        assert_eq!(pose.pitch, target.pitch);
        assert_eq!(sync.steps_remaining(), 0);
        assert_eq!(sync.step(false, pose), None);
    }

    #[test]
    fn yaw_takes_the_short_way_round() {
        let mut sync = ClientSync::default();
        sync.receive(Pose::new(Vec3::ZERO, -170.0, 0.0, 0.0));
        let next = sync.step(false, Pose::new(Vec3::ZERO, 170.0, 0.0, 0.0)).unwrap();
        assert!((next.yaw - 172.0).abs() < 1e-4);
    }

    #[test]
    fn wrapped_arrival_keeps_heading_continuous() {
        let mut sync = ClientSync::new(1);
        sync.receive(Pose::new(Vec3::ZERO, -170.0, 0.0, 0.0));
        let next = sync.step(false, Pose::new(Vec3::ZERO, 170.0, 0.0, 0.0)).unwrap();
        assert_eq!(next.yaw, 190.0);
    }

    #[test]
    fn authority_republishes_and_never_eases() {
        let mut sync = ClientSync::default();
        sync.receive(Pose::at(Vec3::new(5.0, 5.0, 5.0)));
        let here = Pose::at(Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(sync.step(true, here), None);
        assert_eq!(sync.steps_remaining(), 0);
        assert_eq!(sync.target(), here);
    }

    #[test]
    fn idle_observer_stays_put() {
        let mut sync = ClientSync::default();
        assert_eq!(sync.step(false, Pose::default()), None);
    }
}
