//! Input handling.
//!
//! In a real client this would integrate with windowing and key bindings.
//! Here a [`KeyboardState`] records which vehicle keys are held and which were
//! tapped since they were last read, and implements [`InputSampler`] for the
//! vehicle tick.

use std::collections::HashSet;

use vehicle_shared::{
    controls::{ControlAxes, ControlKey, ControlKeyParseError, InputSampler},
    net::{ClientId, ControlsCommand},
    world::EntityId,
};

/// Held and freshly pressed keys.
#[derive(Debug, Clone, Default)]
pub struct KeyboardState {
    held: HashSet<ControlKey>,
    tapped: HashSet<ControlKey>,
}

impl KeyboardState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a comma separated list of held keys, e.g. `"forward,up"`.
    pub fn from_held(list: &str) -> Result<Self, ControlKeyParseError> {
        let mut s = Self::new();
        for name in list.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            s.press(name.parse()?);
        }
        Ok(s)
    }

    pub fn press(&mut self, key: ControlKey) {
        if self.held.insert(key) {
            self.tapped.insert(key);
        }
    }

    pub fn release(&mut self, key: ControlKey) {
        self.held.remove(&key);
    }

    pub fn release_all(&mut self) {
        self.held.clear();
    }
}

impl InputSampler for KeyboardState {
    fn is_pressed(&self, key: ControlKey) -> bool {
        self.held.contains(&key)
    }

    fn was_pressed(&mut self, key: ControlKey) -> bool {
        self.tapped.remove(&key)
    }
}

/// Wraps sampled axes into a `ControlsCommand` for a tick.
pub fn build_controls(
    client_id: ClientId,
    vehicle: EntityId,
    tick: u32,
    axes: ControlAxes,
) -> ControlsCommand {
    ControlsCommand {
        client_id,
        vehicle,
        tick,
        axes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tap_is_reported_once() {
        let mut k = KeyboardState::new();
        k.press(ControlKey::Dismount);
        assert!(k.was_pressed(ControlKey::Dismount));
        assert!(!k.was_pressed(ControlKey::Dismount));
        assert!(k.is_pressed(ControlKey::Dismount));
    }

    #[test]
    fn holding_does_not_retap() {
        let mut k = KeyboardState::new();
        k.press(ControlKey::Up);
        assert!(k.was_pressed(ControlKey::Up));
        k.press(ControlKey::Up);
        assert!(!k.was_pressed(ControlKey::Up));
        k.release(ControlKey::Up);
        k.press(ControlKey::Up);
        assert!(k.was_pressed(ControlKey::Up));
    }

    #[test]
    fn parses_held_list() {
        let k = KeyboardState::from_held("Forward, up").unwrap();
        assert_eq!(
            ControlAxes::sample(&k, false),
            ControlAxes::new(0.0, 1.0, 1.0)
        );
        assert!(KeyboardState::from_held("sideways").is_err());
        assert!(KeyboardState::from_held("").unwrap().held.is_empty());
    }
}
