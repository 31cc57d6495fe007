//! Configuration system.
//!
//! Loads simulation configuration from JSON strings (file IO left to app).

use serde::{Deserialize, Serialize};

/// Root configuration shared by client/server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VehicleConfig {
    /// Fixed simulation tick rate.
    #[serde(default = "default_tick_hz")]
    pub tick_hz: u32,
    /// Observer ticks spent easing toward each authoritative pose update.
    #[serde(default = "default_steps")]
    pub sync_interpolation_steps: u32,
    /// Smoothing steps for the cosmetic control feedback.
    #[serde(default = "default_steps")]
    pub input_interpolation_steps: u32,
    /// Wobble strength at which a damaged vehicle breaks apart.
    #[serde(default = "default_destroy_threshold")]
    pub destroy_threshold: f32,
    /// Base render distance in blocks, scaled per vehicle.
    #[serde(default = "default_render_distance")]
    pub render_distance: f64,
    /// Vehicles moving faster than this (squared) don't search dismount spots.
    #[serde(default = "default_dismount_speed_sq")]
    pub dismount_speed_sq: f64,
}

fn default_tick_hz() -> u32 {
    64
}

fn default_steps() -> u32 {
    10
}

fn default_destroy_threshold() -> f32 {
    60.0
}

fn default_render_distance() -> f64 {
    70.0
}

fn default_dismount_speed_sq() -> f64 {
    0.1
}

impl Default for VehicleConfig {
    fn default() -> Self {
        Self {
            tick_hz: default_tick_hz(),
            sync_interpolation_steps: default_steps(),
            input_interpolation_steps: default_steps(),
            destroy_threshold: default_destroy_threshold(),
            render_distance: default_render_distance(),
            dismount_speed_sq: default_dismount_speed_sq(),
        }
    }
}

impl VehicleConfig {
    /// Parses config from JSON.
    pub fn from_json_str(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let cfg = VehicleConfig::from_json_str(r#"{ "tick_hz": 20 }"#).unwrap();
        assert_eq!(cfg.tick_hz, 20);
        assert_eq!(cfg.sync_interpolation_steps, 10);
        assert_eq!(cfg.destroy_threshold, 60.0);
    }

    #[test]
    fn empty_object_equals_default() {
        let cfg = VehicleConfig::from_json_str("{}").unwrap();
        assert_eq!(cfg, VehicleConfig::default());
    }
}
