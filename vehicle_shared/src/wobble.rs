//! Damage wobble.
//!
//! Every hit (explicit damage or a hard collision) shakes the vehicle: the
//! wobble side flips, the shake timer restarts and strength accumulates.
//! Strength bleeds off one unit per tick; enough accumulated strength breaks
//! the vehicle.
//!
//! ```text
//!   Idle ──impulse──▶ Active ──decay to zero──▶ Idle
//!                       │
//!                       └──strength ≥ threshold / creative hit──▶ Destroyed
//! ```

use serde::{Deserialize, Serialize};

use crate::tracked::Tracked;

/// Shake duration restarted by every impulse.
pub const WOBBLE_TICKS: i32 = 10;
/// Damage points to wobble strength.
pub const DAMAGE_SCALE: f32 = 10.0;
/// Collision overshoot to wobble strength.
pub const COLLISION_SCALE: f32 = 50.0;
/// Overshoot below this is treated as resting contact.
pub const COLLISION_EPSILON: f32 = 1.0e-4;
pub const DEFAULT_DESTROY_THRESHOLD: f32 = 60.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WobblePhase {
    Idle,
    Active,
    Destroyed,
}

/// Replicated wobble fields, as carried by spawn and update messages.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WobbleSnapshot {
    pub ticks: i32,
    pub side: i32,
    pub strength: f32,
}

impl Default for WobbleSnapshot {
    fn default() -> Self {
        Self {
            ticks: 0,
            side: 1,
            strength: 0.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DamageWobble {
    ticks: Tracked<i32>,
    side: Tracked<i32>,
    strength: Tracked<f32>,
    threshold: f32,
    destroyed: bool,
}

impl DamageWobble {
    pub fn new(threshold: f32) -> Self {
        let init = WobbleSnapshot::default();
        Self {
            ticks: Tracked::new(init.ticks),
            side: Tracked::new(init.side),
            strength: Tracked::new(init.strength),
            threshold,
            destroyed: false,
        }
    }

    pub fn ticks(&self) -> i32 {
        self.ticks.get()
    }

    pub fn side(&self) -> i32 {
        self.side.get()
    }

    pub fn strength(&self) -> f32 {
        self.strength.get()
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn phase(&self) -> WobblePhase {
        if self.destroyed {
            WobblePhase::Destroyed
        } else if self.ticks() == 0 && self.strength() == 0.0 {
            WobblePhase::Idle
        } else {
            WobblePhase::Active
        }
    }

    pub fn is_past_threshold(&self) -> bool {
        self.strength() >= self.threshold
    }

    /// Flips the side, restarts the shake and adds `magnitude` strength.
    pub fn impulse(&mut self, magnitude: f32) {
        if self.destroyed {
            return;
        }
        self.side.set(-self.side.get());
        self.ticks.set(WOBBLE_TICKS);
        self.strength.set(self.strength.get() + magnitude);
    }

    /// Per-tick decay.
    pub fn decay(&mut self) {
        if self.destroyed {
            return;
        }
        if self.ticks() > 0 {
            self.ticks.set(self.ticks() - 1);
        }
        if self.strength() > 0.0 {
            self.strength.set((self.strength() - 1.0).max(0.0));
        }
    }

    /// Applies a damage hit and reports whether it broke the vehicle.
    pub fn apply_damage(&mut self, amount: f32, creative_attacker: bool) -> WobblePhase {
        self.impulse(amount * DAMAGE_SCALE);
        if creative_attacker || self.is_past_threshold() {
            self.destroyed = true;
        }
        self.phase()
    }

    /// Hurt animation on observers: same shake, strength amplified instead
    /// of accumulated. Never destroys.
    pub fn animate_hurt(&mut self) {
        if self.destroyed {
            return;
        }
        self.side.set(-self.side.get());
        self.ticks.set(WOBBLE_TICKS);
        self.strength.set(self.strength.get() * 11.0);
    }

    /// Wobble from a blocked movement step; returns the strength added.
    ///
    /// `collision` is how far the vehicle fell short of its requested move,
    /// minus the gravity pull. Hits only compound once the previous shake has
    /// wound down: `repeat` is zero or negative right after an impulse.
    pub fn collision_impulse(&mut self, collision: f32) -> f32 {
        if collision <= COLLISION_EPSILON {
            return 0.0;
        }
        let repeat = 1.0 - (self.ticks() + 1) as f32 / WOBBLE_TICKS as f32;
        if repeat <= 0.0 {
            return 0.0;
        }
        let added = collision * COLLISION_SCALE * repeat * repeat;
        self.impulse(added);
        added
    }

    pub fn snapshot(&self) -> WobbleSnapshot {
        WobbleSnapshot {
            ticks: self.ticks(),
            side: self.side(),
            strength: self.strength(),
        }
    }

    /// Overwrites local state from an inbound update.
    pub fn apply_snapshot(&mut self, snap: WobbleSnapshot) {
        self.ticks.sync(snap.ticks);
        self.side.sync(snap.side);
        self.strength.sync(snap.strength);
    }

    /// Snapshot of the fields if any changed since the last call.
    pub fn take_changes(&mut self) -> Option<WobbleSnapshot> {
        let a = self.ticks.take_dirty();
        let b = self.side.take_dirty();
        let c = self.strength.take_dirty();
        (a || b || c).then(|| self.snapshot())
    }
}

impl Default for DamageWobble {
    fn default() -> Self {
        Self::new(DEFAULT_DESTROY_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_strength(strength: f32) -> DamageWobble {
        let mut w = DamageWobble::default();
        w.apply_snapshot(WobbleSnapshot {
            ticks: 0,
            side: 1,
            strength,
        });
        w
    }

    #[test]
    fn impulse_flips_side_and_restarts_timer() {
        let mut w = DamageWobble::default();
        assert_eq!(w.phase(), WobblePhase::Idle);
        w.impulse(3.0);
        assert_eq!(w.side(), -1);
        assert_eq!(w.ticks(), WOBBLE_TICKS);
        assert_eq!(w.strength(), 3.0);
        w.impulse(1.0);
        assert_eq!(w.side(), 1);
        assert_eq!(w.strength(), 4.0);
        assert_eq!(w.phase(), WobblePhase::Active);
    }

    #[test]
    fn decays_one_unit_per_tick_until_idle() {
        let mut w = DamageWobble::default();
        w.impulse(25.0);
        let mut prev = w.snapshot();
        for _ in 0..40 {
            w.decay();
            let now = w.snapshot();
            if prev.strength > 0.0 {
                assert_eq!(now.strength, (prev.strength - 1.0).max(0.0));
            } else {
                assert_eq!(now.strength, 0.0);
            }
            if prev.ticks > 0 {
                assert_eq!(now.ticks, prev.ticks - 1);
            } else {
                assert_eq!(now.ticks, 0);
            }
            prev = now;
        }
        assert_eq!(w.phase(), WobblePhase::Idle);
    }

    #[test]
    fn fractional_strength_floors_at_zero() {
        let mut w = with_strength(0.4);
        w.decay();
        assert_eq!(w.strength(), 0.0);
    }

    #[test]
    fn destruction_threshold_boundary() {
        let mut w = with_strength(59.9);
        w.impulse(0.2);
        assert!(w.is_past_threshold());

        let mut w = with_strength(59.9);
        w.impulse(0.05);
        assert!(!w.is_past_threshold());

        let mut w = with_strength(59.0);
        w.impulse(1.0);
        assert_eq!(w.strength(), 60.0);
        assert!(w.is_past_threshold());
    }

    #[test]
    fn damage_scales_by_ten_and_destroys_past_threshold() {
        let mut w = with_strength(59.9);
        assert_eq!(w.apply_damage(0.02, false), WobblePhase::Destroyed);

        let mut w = with_strength(59.9);
        assert_eq!(w.apply_damage(0.005, false), WobblePhase::Active);

        let mut w = DamageWobble::default();
        assert_eq!(w.apply_damage(1.0, false), WobblePhase::Active);
        assert_eq!(w.strength(), 10.0);
    }

    #[test]
    fn creative_hit_always_destroys() {
        let mut w = DamageWobble::default();
        assert_eq!(w.apply_damage(0.0, true), WobblePhase::Destroyed);
        w.impulse(5.0);
        w.decay();
        assert_eq!(w.phase(), WobblePhase::Destroyed);
    }

    #[test]
    fn collision_right_after_impulse_adds_nothing() {
        let mut w = DamageWobble::default();
        w.impulse(1.0);
        assert_eq!(w.ticks(), WOBBLE_TICKS);
        assert_eq!(w.collision_impulse(2.0), 0.0);
        assert_eq!(w.strength(), 1.0);

        // ticks == 9 gives repeat == 0 as well.
        w.decay();
        assert_eq!(w.collision_impulse(2.0), 0.0);
    }

    #[test]
    fn collision_compounds_once_shake_winds_down() {
        let mut w = DamageWobble::default();
        let added = w.collision_impulse(0.5);
        // ticks 0 -> repeat 0.9.
        assert!((added - 0.5 * 50.0 * 0.81).abs() < 1e-4);
        assert_eq!(w.ticks(), WOBBLE_TICKS);
    }

    #[test]
    fn resting_contact_is_ignored() {
        let mut w = DamageWobble::default();
        assert_eq!(w.collision_impulse(COLLISION_EPSILON / 2.0), 0.0);
        assert_eq!(w.phase(), WobblePhase::Idle);
    }

    #[test]
    fn hurt_animation_amplifies() {
        let mut w = with_strength(2.0);
        w.animate_hurt();
        assert_eq!(w.strength(), 22.0);
        assert_eq!(w.side(), -1);
    }

    #[test]
    fn changes_are_reported_once() {
        let mut w = DamageWobble::default();
        assert_eq!(w.take_changes(), None);
        w.impulse(2.0);
        let snap = w.take_changes().unwrap();
        assert_eq!(snap.strength, 2.0);
        assert_eq!(w.take_changes(), None);
    }
}
