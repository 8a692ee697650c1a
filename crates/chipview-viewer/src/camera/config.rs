//! Orbit camera configuration

use serde::{Deserialize, Serialize};

/// Orbit camera configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrbitConfig {
    /// Vertical field of view in degrees
    pub fov_degrees: f32,
    /// Near clip plane
    pub near: f32,
    /// Far clip plane
    pub far: f32,
    /// Initial camera position, looking at the origin
    pub initial_position: [f32; 3],
    /// Fraction of the pending rotation applied each frame (0-1)
    pub damping: f32,
    /// Auto-rotation speed; one revolution every `60 / speed` seconds
    pub auto_rotate_speed: f32,
    /// Drag rotation speed (full window height = one turn)
    pub rotate_speed: f32,
    /// Scroll zoom speed
    pub zoom_speed: f32,
    /// Closest orbit distance
    pub min_distance: f32,
    /// Farthest orbit distance
    pub max_distance: f32,
}

impl Default for OrbitConfig {
    fn default() -> Self {
        Self {
            fov_degrees: 38.0,
            near: 0.01,
            far: 500.0,
            initial_position: [2.0, 3.0, 2.8],
            damping: 0.08,
            auto_rotate_speed: 0.6,
            rotate_speed: 1.0,
            zoom_speed: 1.0,
            min_distance: 0.5,
            max_distance: 15.0,
        }
    }
}
