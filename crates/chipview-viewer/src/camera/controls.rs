//! Orbit controls with damping and idle auto-rotation

use std::f32::consts::{PI, TAU};

use glam::{Mat4, Vec2, Vec3};

use super::OrbitConfig;

/// Keeps the polar angle off the poles so `look_at` stays well defined.
const POLAR_EPSILON: f32 = 1e-4;

/// Camera orbiting a target point
pub struct OrbitControls {
    /// Configuration
    pub config: OrbitConfig,
    /// Azimuth around the Y axis in radians
    theta: f32,
    /// Polar angle from +Y in radians
    phi: f32,
    /// Distance from the target
    radius: f32,
    /// Rotation still to be applied (damped)
    theta_delta: f32,
    phi_delta: f32,
    /// Point the camera orbits
    target: Vec3,
    /// Viewport aspect ratio
    aspect: f32,
    auto_rotate: bool,
    enable_pan: bool,
}

impl OrbitControls {
    /// Create controls with the default configuration
    pub fn new() -> Self {
        Self::with_config(OrbitConfig::default())
    }

    /// Create controls looking at the origin from `config.initial_position`
    pub fn with_config(config: OrbitConfig) -> Self {
        let offset = Vec3::from(config.initial_position);
        let radius = offset
            .length()
            .clamp(config.min_distance, config.max_distance);
        let (theta, phi) = if offset.length_squared() > 0.0 {
            (
                offset.x.atan2(offset.z),
                (offset.y / offset.length()).clamp(-1.0, 1.0).acos(),
            )
        } else {
            (0.0, PI / 2.0)
        };

        Self {
            config,
            theta,
            phi: phi.clamp(POLAR_EPSILON, PI - POLAR_EPSILON),
            radius,
            theta_delta: 0.0,
            phi_delta: 0.0,
            target: Vec3::ZERO,
            aspect: 1.0,
            auto_rotate: true,
            enable_pan: true,
        }
    }

    /// Camera position in world space
    pub fn position(&self) -> Vec3 {
        let sin_phi = self.phi.sin();
        self.target
            + Vec3::new(
                self.radius * sin_phi * self.theta.sin(),
                self.radius * self.phi.cos(),
                self.radius * sin_phi * self.theta.cos(),
            )
    }

    pub fn target(&self) -> Vec3 {
        self.target
    }

    pub fn distance(&self) -> f32 {
        self.radius
    }

    pub fn azimuth(&self) -> f32 {
        self.theta
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position(), self.target, Vec3::Y)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(
            self.config.fov_degrees.to_radians(),
            self.aspect,
            self.config.near,
            self.config.far,
        )
    }

    /// Update the aspect ratio from a viewport size
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.aspect = width as f32 / height as f32;
        }
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn set_auto_rotate(&mut self, enabled: bool) {
        self.auto_rotate = enabled;
    }

    pub fn auto_rotate(&self) -> bool {
        self.auto_rotate
    }

    pub fn set_pan_enabled(&mut self, enabled: bool) {
        self.enable_pan = enabled;
    }

    pub fn pan_enabled(&self) -> bool {
        self.enable_pan
    }

    /// Handle a pointer drag of `delta` pixels in a viewport `viewport_height` tall
    pub fn handle_drag(&mut self, delta: Vec2, viewport_height: f32) {
        if viewport_height <= 0.0 {
            return;
        }
        let scale = TAU * self.config.rotate_speed / viewport_height;
        self.theta_delta -= delta.x * scale;
        self.phi_delta -= delta.y * scale;
    }

    /// Handle scroll zoom. Positive values move closer.
    pub fn handle_zoom(&mut self, scroll_delta: f32) {
        let factor = 0.95_f32.powf(scroll_delta * self.config.zoom_speed);
        self.radius =
            (self.radius * factor).clamp(self.config.min_distance, self.config.max_distance);
    }

    /// Pan the target in the view plane. Ignored when panning is disabled.
    pub fn handle_pan(&mut self, delta: Vec2, viewport_height: f32) {
        if !self.enable_pan || viewport_height <= 0.0 {
            return;
        }
        let forward = (self.target - self.position()).normalize_or_zero();
        let right = forward.cross(Vec3::Y).normalize_or_zero();
        let up = right.cross(forward);

        // World units covered by the viewport height at the target distance
        let half_height = self.radius * (self.config.fov_degrees.to_radians() / 2.0).tan();
        let per_pixel = 2.0 * half_height / viewport_height;
        self.target += (-right * delta.x + up * delta.y) * per_pixel;
    }

    /// Angle auto-rotation contributes over `dt` seconds
    pub fn auto_rotation_angle(&self, dt: f32) -> f32 {
        TAU / 60.0 * self.config.auto_rotate_speed * dt
    }

    /// Advance damping and auto-rotation (call each frame)
    pub fn update(&mut self, dt: f32) {
        if self.auto_rotate {
            self.theta_delta -= self.auto_rotation_angle(dt);
        }

        let damping = if self.config.damping > 0.0 {
            self.config.damping.min(1.0)
        } else {
            1.0
        };

        self.theta += self.theta_delta * damping;
        self.phi = (self.phi + self.phi_delta * damping).clamp(POLAR_EPSILON, PI - POLAR_EPSILON);
        self.theta_delta *= 1.0 - damping;
        self.phi_delta *= 1.0 - damping;
        self.radius = self
            .radius
            .clamp(self.config.min_distance, self.config.max_distance);
    }
}

impl Default for OrbitControls {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_position_matches_config() {
        let controls = OrbitControls::new();
        let position = controls.position();
        assert!((position - Vec3::new(2.0, 3.0, 2.8)).length() < 1e-4);
        assert_eq!(controls.target(), Vec3::ZERO);
    }

    #[test]
    fn test_auto_rotation_speed() {
        let mut controls = OrbitControls::new();
        let start = controls.azimuth();

        // 0.6 => one revolution per 100 seconds
        for _ in 0..6000 {
            controls.update(1.0 / 60.0);
        }
        let turned = start - controls.azimuth();
        // The damped tail still owes (1 - k) / k frames of rotation
        assert!((turned - TAU).abs() < 0.1, "turned {}", turned);
    }

    #[test]
    fn test_auto_rotation_disabled() {
        let mut controls = OrbitControls::new();
        controls.set_auto_rotate(false);
        let start = controls.azimuth();
        for _ in 0..120 {
            controls.update(1.0 / 60.0);
        }
        assert_eq!(controls.azimuth(), start);
    }

    #[test]
    fn test_rotation_keeps_distance() {
        let mut controls = OrbitControls::new();
        let distance = controls.distance();
        controls.handle_drag(Vec2::new(120.0, -40.0), 600.0);
        for _ in 0..60 {
            controls.update(1.0 / 60.0);
        }
        assert!((controls.position().length() - distance).abs() < 1e-3);
    }

    #[test]
    fn test_zoom_clamping() {
        let mut controls = OrbitControls::new();
        controls.handle_zoom(1000.0);
        assert_eq!(controls.distance(), controls.config.min_distance);
        controls.handle_zoom(-1000.0);
        assert_eq!(controls.distance(), controls.config.max_distance);
    }

    #[test]
    fn test_pan_disabled() {
        let mut controls = OrbitControls::new();
        controls.set_pan_enabled(false);
        controls.handle_pan(Vec2::new(50.0, 50.0), 600.0);
        assert_eq!(controls.target(), Vec3::ZERO);

        controls.set_pan_enabled(true);
        controls.handle_pan(Vec2::new(50.0, 50.0), 600.0);
        assert_ne!(controls.target(), Vec3::ZERO);
    }

    #[test]
    fn test_projection_uses_viewport() {
        let mut controls = OrbitControls::new();
        controls.set_viewport(1600, 800);
        assert_eq!(controls.aspect(), 2.0);
        controls.set_viewport(0, 800);
        assert_eq!(controls.aspect(), 2.0);
        assert!(controls.projection_matrix().is_finite());
    }
}
