use std::f32::consts::{PI, TAU};

use glam::{Mat4, Vec2, Vec3};
use serde::{Deserialize, Serialize};

/// Keeps the orbit away from the poles where `look_at` degenerates.
const POLE_MARGIN: f32 = 1e-3;
const SETTLE_EPSILON: f32 = 1e-6;

/// Perspective camera used both for drawing and for building pointer rays.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    /// Vertical field of view in degrees.
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    pub fn new(position: Vec3, target: Vec3, fov: f32, aspect: f32) -> Self {
        Self {
            position,
            target,
            up: Vec3::Y,
            fov,
            aspect: aspect.max(0.01),
            near: 0.1,
            far: 100.0,
        }
    }

    /// Updates the aspect ratio after the viewport changed size.
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.aspect = width.max(1) as f32 / height.max(1) as f32;
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    /// Projection with a `[0, 1]` depth range, as wgpu expects.
    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov.to_radians(), self.aspect, self.near, self.far)
    }

    pub fn view_proj(&self) -> Mat4 {
        self.projection() * self.view()
    }

    /// Maps a point given in normalized device coordinates back to world space.
    pub fn unproject(&self, ndc: Vec3) -> Vec3 {
        self.view_proj().inverse().project_point3(ndc)
    }

    pub fn distance_to_target(&self) -> f32 {
        (self.position - self.target).length()
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(Vec3::new(0.0, 0.0, 3.0), Vec3::ZERO, 75.0, 16.0 / 9.0)
    }
}

/// Damped orbit controls rotating the camera around its target.
///
/// Input only queues motion; [`OrbitControls::update`] applies a share of it
/// every frame so the camera glides to a stop after the pointer is released.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrbitControls {
    pub damping_factor: f32,
    pub rotate_speed: f32,
    /// Radius multiplier applied per scroll step towards the target.
    pub zoom_step: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    pending_theta: f32,
    pending_phi: f32,
    pending_scale: f32,
}

impl OrbitControls {
    pub fn new() -> Self {
        Self {
            damping_factor: 0.05,
            rotate_speed: 1.0,
            zoom_step: 0.95,
            min_distance: 0.5,
            max_distance: 50.0,
            pending_theta: 0.0,
            pending_phi: 0.0,
            pending_scale: 1.0,
        }
    }

    /// Queues the rotation for a cursor drag of `delta` pixels.
    ///
    /// A drag across the full viewport height turns the camera once around.
    pub fn rotate_by_pixels(&mut self, delta: Vec2, viewport_height: u32) {
        let height = viewport_height.max(1) as f32;
        self.pending_theta -= TAU * delta.x / height * self.rotate_speed;
        self.pending_phi -= TAU * delta.y / height * self.rotate_speed;
    }

    /// Queues a zoom; positive steps move the camera towards the target.
    pub fn zoom(&mut self, steps: f32) {
        self.pending_scale *= self.zoom_step.powf(steps);
    }

    pub fn is_settled(&self) -> bool {
        self.pending_theta.abs() < SETTLE_EPSILON
            && self.pending_phi.abs() < SETTLE_EPSILON
            && (self.pending_scale - 1.0).abs() < SETTLE_EPSILON
    }

    /// Applies the damped share of the queued motion to `camera`.
    ///
    /// Returns `true` when the camera moved.
    pub fn update(&mut self, camera: &mut Camera) -> bool {
        if self.is_settled() {
            self.pending_theta = 0.0;
            self.pending_phi = 0.0;
            self.pending_scale = 1.0;
            return false;
        }

        let offset = camera.position - camera.target;
        let radius = offset.length();
        if radius <= f32::EPSILON {
            return false;
        }

        let theta = offset.x.atan2(offset.z) + self.pending_theta * self.damping_factor;
        let phi = ((offset.y / radius).clamp(-1.0, 1.0).acos()
            + self.pending_phi * self.damping_factor)
            .clamp(POLE_MARGIN, PI - POLE_MARGIN);
        let radius = (radius * self.pending_scale).clamp(self.min_distance, self.max_distance);

        camera.position = camera.target
            + Vec3::new(
                radius * phi.sin() * theta.sin(),
                radius * phi.cos(),
                radius * phi.sin() * theta.cos(),
            );

        self.pending_theta *= 1.0 - self.damping_factor;
        self.pending_phi *= 1.0 - self.damping_factor;
        self.pending_scale = 1.0;
        true
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
    fn default_camera_looks_down_negative_z() {
        let camera = Camera::default();
        let center = camera.unproject(Vec3::new(0.0, 0.0, 0.5));
        let direction = (center - camera.position).normalize();
        assert!((direction - Vec3::NEG_Z).length() < 1e-4);
    }

    #[test]
    fn viewport_updates_aspect() {
        let mut camera = Camera::default();
        camera.set_viewport(800, 400);
        assert_eq!(camera.aspect, 2.0);
        camera.set_viewport(800, 0);
        assert_eq!(camera.aspect, 800.0);
    }

    #[test]
    fn settled_controls_leave_camera_untouched() {
        let mut camera = Camera::default();
        let mut controls = OrbitControls::new();
        assert!(!controls.update(&mut camera));
        assert_eq!(camera.position, Vec3::new(0.0, 0.0, 3.0));
    }

    #[test]
    fn rotation_keeps_distance_and_decays() {
        let mut camera = Camera::default();
        let mut controls = OrbitControls::new();
        controls.rotate_by_pixels(Vec2::new(120.0, 0.0), 720);
        assert!(controls.update(&mut camera));
        assert!((camera.distance_to_target() - 3.0).abs() < 1e-4);
        assert!(camera.position.x < 0.0);

        for _ in 0..2_000 {
            controls.update(&mut camera);
        }
        assert!(controls.is_settled());
    }

    #[test]
    fn zoom_moves_towards_target() {
        let mut camera = Camera::default();
        let mut controls = OrbitControls::new();
        controls.zoom(2.0);
        controls.update(&mut camera);
        assert!((camera.distance_to_target() - 3.0 * 0.95 * 0.95).abs() < 1e-4);
    }

    #[test]
    fn polar_angle_is_clamped() {
        let mut camera = Camera::default();
        let mut controls = OrbitControls::new();
        controls.damping_factor = 1.0;
        controls.rotate_by_pixels(Vec2::new(0.0, 10_000.0), 720);
        controls.update(&mut camera);
        assert!(camera.position.is_finite());
        assert!(camera.position.y > 2.99);
        assert!((camera.distance_to_target() - 3.0).abs() < 1e-3);
    }
}
