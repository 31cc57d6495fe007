//! Smoothed scalar for cosmetic feedback (e.g. control stick deflection).

/// Exponentially eases toward the last target it was fed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InterpolatedFloat {
    steps: f32,
    value: f32,
    last_value: f32,
}

impl InterpolatedFloat {
    /// `steps` below 1 are treated as 1 (snap to target).
    pub fn new(steps: f32) -> Self {
        Self {
            steps: steps.max(1.0),
            value: 0.0,
            last_value: 0.0,
        }
    }

    /// Advances one tick toward `target`.
    pub fn update(&mut self, target: f32) {
        self.last_value = self.value;
        self.value += (target - self.value) / self.steps;
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    /// Value between the previous and current tick, for rendering.
    pub fn smooth(&self, tick_delta: f32) -> f32 {
        crate::math::lerp_f32(tick_delta, self.last_value, self.value)
    }
}

impl Default for InterpolatedFloat {
    fn default() -> Self {
        Self::new(10.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converges_monotonically_toward_fixed_target() {
        for steps in [1.0, 2.0, 5.0, 10.0, 33.0] {
            for target in [-1.0f32, 1.0, 0.25] {
                let mut f = InterpolatedFloat::new(steps);
                let mut prev_gap = (target - f.value()).abs();
                for _ in 0..500 {
                    f.update(target);
                    let gap = (target - f.value()).abs();
                    assert!(gap <= prev_gap, "steps={steps} target={target}");
                    prev_gap = gap;
                }
                assert!(prev_gap < 1e-4, "steps={steps} target={target} gap={prev_gap}");
            }
        }
    }

    #[test]
    fn single_step_is_a_tenth_of_the_gap() {
        let mut f = InterpolatedFloat::new(10.0);
        f.update(1.0);
        assert!((f.value() - 0.1).abs() < 1e-6);
        assert!((f.smooth(0.5) - 0.05).abs() < 1e-6);
    }
}
