//! Orbit camera with damped motion.

use cloudlens_core::CameraConfig;
use glam::{Mat4, Vec2, Vec3};

/// Minimum polar angle, keeps the camera off the poles.
const POLAR_EPSILON: f32 = 0.01;

/// Below this residual the camera is considered at rest.
const REST_THRESHOLD: f32 = 1e-5;

/// A perspective camera orbiting a target point.
///
/// Input only queues motion; [`OrbitCamera::update`] applies a
/// `damping` fraction of the queued motion each frame and keeps the rest,
/// so the camera eases out after the user lets go.
#[derive(Debug, Clone)]
pub struct OrbitCamera {
    /// Point the camera orbits and looks at.
    pub target: Vec3,
    /// Distance from the target.
    pub radius: f32,
    /// Angle around +Y, zero looking down -Z.
    pub azimuth: f32,
    /// Angle from +Y.
    pub polar: f32,
    pub up: Vec3,
    /// Vertical field of view in radians.
    pub fov: f32,
    /// Aspect ratio (width / height).
    pub aspect_ratio: f32,
    pub near: f32,
    pub far: f32,
    /// Fraction of queued motion applied per update, in `(0, 1]`.
    pub damping: f32,
    pending_rotation: Vec2,
    pending_pan: Vec2,
    pending_zoom: f32,
}

impl OrbitCamera {
    /// Creates a camera on the +Z axis looking at the origin.
    pub fn new(config: &CameraConfig, aspect_ratio: f32) -> Self {
        Self {
            target: Vec3::ZERO,
            radius: config.initial_distance.max(config.near),
            azimuth: 0.0,
            polar: std::f32::consts::FRAC_PI_2,
            up: Vec3::Y,
            fov: config.fov_degrees.to_radians(),
            aspect_ratio,
            near: config.near,
            far: config.far,
            damping: config.damping.clamp(0.01, 1.0),
            pending_rotation: Vec2::ZERO,
            pending_pan: Vec2::ZERO,
            pending_zoom: 0.0,
        }
    }

    pub fn set_aspect_ratio(&mut self, aspect_ratio: f32) {
        self.aspect_ratio = aspect_ratio;
    }

    /// Camera position in world space.
    pub fn position(&self) -> Vec3 {
        let sin_polar = self.polar.sin();
        self.target
            + self.radius
                * Vec3::new(
                    sin_polar * self.azimuth.sin(),
                    self.polar.cos(),
                    sin_polar * self.azimuth.cos(),
                )
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position(), self.target, self.up)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov, self.aspect_ratio, self.near, self.far)
    }

    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Queues a rotation in radians (horizontal, vertical).
    pub fn orbit(&mut self, delta_x: f32, delta_y: f32) {
        self.pending_rotation += Vec2::new(delta_x, delta_y);
    }

    /// Queues a pan, in fractions of the view height.
    pub fn pan(&mut self, delta_x: f32, delta_y: f32) {
        self.pending_pan += Vec2::new(delta_x, delta_y);
    }

    /// Queues a zoom. Positive values move toward the target.
    pub fn zoom(&mut self, delta: f32) {
        self.pending_zoom += delta;
    }

    /// Applies one frame of damped motion. Returns true while motion remains.
    pub fn update(&mut self) -> bool {
        let d = self.damping;

        let rotation = self.pending_rotation * d;
        self.azimuth -= rotation.x;
        self.polar = (self.polar - rotation.y)
            .clamp(POLAR_EPSILON, std::f32::consts::PI - POLAR_EPSILON);
        self.pending_rotation -= rotation;

        let pan = self.pending_pan * d;
        if pan != Vec2::ZERO {
            let forward = (self.target - self.position()).normalize();
            let right = forward.cross(self.up).normalize();
            let up = right.cross(forward);
            // Scale so a full-height drag moves the target by the visible height.
            let visible_height = 2.0 * self.radius * (self.fov * 0.5).tan();
            self.target += (right * -pan.x + up * pan.y) * visible_height;
        }
        self.pending_pan -= pan;

        let zoom = self.pending_zoom * d;
        self.radius = (self.radius * (-zoom).exp()).clamp(self.near * 2.0, self.far * 0.9);
        self.pending_zoom -= zoom;

        let residual = self.pending_rotation.length() + self.pending_pan.length() + self.pending_zoom.abs();
        if residual < REST_THRESHOLD {
            self.pending_rotation = Vec2::ZERO;
            self.pending_pan = Vec2::ZERO;
            self.pending_zoom = 0.0;
            false
        } else {
            true
        }
    }

    /// Centers the camera on a bounding box, keeping the view direction.
    pub fn look_at_box(&mut self, min: Vec3, max: Vec3) {
        let center = (min + max) * 0.5;
        let half_diagonal = (max - min).length() * 0.5;
        self.target = center;
        let fit = half_diagonal / (self.fov * 0.5).sin().max(1e-3);
        self.radius = fit.clamp(self.near * 2.0, self.far * 0.9);
    }
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self::new(&CameraConfig::default(), 16.0 / 9.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_position() {
        let camera = OrbitCamera::new(&CameraConfig::default(), 1.0);
        assert!((camera.position() - Vec3::new(0.0, 0.0, 500.0)).length() < 1e-3);
        assert!((camera.fov.to_degrees() - 75.0).abs() < 1e-4);
        assert_eq!(camera.near, 0.1);
        assert_eq!(camera.far, 1000.0);
    }

    #[test]
    fn test_damping_applies_fraction_per_update() {
        let mut camera = OrbitCamera::default();
        camera.orbit(1.0, 0.0);

        assert!(camera.update());
        assert!((camera.azimuth + 0.1).abs() < 1e-6);

        assert!(camera.update());
        assert!((camera.azimuth + 0.19).abs() < 1e-6);
    }

    #[test]
    fn test_motion_settles() {
        let mut camera = OrbitCamera::default();
        camera.orbit(0.5, 0.2);
        camera.zoom(0.3);
        let mut frames = 0;
        while camera.update() {
            frames += 1;
            assert!(frames < 1000, "camera never came to rest");
        }
        // Geometric series: everything queued is eventually applied.
        assert!((camera.azimuth + 0.5).abs() < 1e-3);
        assert!(!camera.update());
    }

    #[test]
    fn test_polar_is_clamped() {
        let mut camera = OrbitCamera::default();
        camera.damping = 1.0;
        camera.orbit(0.0, -100.0);
        camera.update();
        assert!(camera.polar < std::f32::consts::PI);
        assert!(camera.position().is_finite());
    }

    #[test]
    fn test_zoom_in_decreases_radius() {
        let mut camera = OrbitCamera::default();
        camera.damping = 1.0;
        let before = camera.radius;
        camera.zoom(0.5);
        camera.update();
        assert!(camera.radius < before);
    }

    #[test]
    fn test_pan_moves_target() {
        let mut camera = OrbitCamera::default();
        camera.damping = 1.0;
        camera.pan(0.1, 0.0);
        camera.update();
        assert!(camera.target.x < 0.0);
        assert!(camera.target.y.abs() < 1e-3);
    }

    #[test]
    fn test_look_at_box() {
        let mut camera = OrbitCamera::default();
        camera.look_at_box(Vec3::splat(-1.0), Vec3::splat(3.0));
        assert_eq!(camera.target, Vec3::ONE);
        assert!(camera.radius > 0.0);
    }
}
