use glam::{Mat4, Vec2, Vec3};

use crate::error::CameraError;
use crate::march::Ray;

/// Keeps pitch away from the poles so `right()` never degenerates.
const MAX_PITCH: f32 = 1.55;

/// Pinhole/thin-lens camera.
///
/// The forward direction is always unit length; every mutation goes through
/// [`Camera::set_direction`], which normalises and rejects degenerate input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    origin: Vec3,
    direction: Vec3,
    vfov: f32,
    defocus_angle: f32,
    focus_distance: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            origin: Vec3::new(0.0, 0.0, 3.0),
            direction: Vec3::NEG_Z,
            vfov: 60.0,
            defocus_angle: 0.0,
            focus_distance: 3.0,
        }
    }
}

impl Camera {
    /// Builds a camera; `vfov` and `defocus_angle` are in degrees.
    pub fn new(
        origin: Vec3,
        direction: Vec3,
        vfov: f32,
        defocus_angle: f32,
        focus_distance: f32,
    ) -> Result<Self, CameraError> {
        let mut camera = Self {
            origin,
            ..Self::default()
        };
        camera.set_direction(direction)?;
        camera.set_vfov(vfov);
        camera.set_defocus_angle(defocus_angle);
        camera.set_focus_distance(focus_distance);
        Ok(camera)
    }

    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    pub fn direction(&self) -> Vec3 {
        self.direction
    }

    pub fn vfov(&self) -> f32 {
        self.vfov
    }

    pub fn defocus_angle(&self) -> f32 {
        self.defocus_angle
    }

    pub fn focus_distance(&self) -> f32 {
        self.focus_distance
    }

    pub fn set_origin(&mut self, origin: Vec3) {
        if origin.is_finite() {
            self.origin = origin;
        }
    }

    /// Replaces the forward vector. The previous direction is kept on error.
    pub fn set_direction(&mut self, direction: Vec3) -> Result<(), CameraError> {
        let normalized = direction.try_normalize().filter(|dir| dir.is_finite());
        match normalized {
            Some(dir) => {
                self.direction = dir;
                Ok(())
            }
            None => Err(CameraError::DegenerateDirection(direction.to_array())),
        }
    }

    pub fn set_vfov(&mut self, degrees: f32) {
        self.vfov = degrees.clamp(1.0, 179.0);
    }

    pub fn set_defocus_angle(&mut self, degrees: f32) {
        self.defocus_angle = degrees.clamp(0.0, 60.0);
    }

    pub fn set_focus_distance(&mut self, distance: f32) {
        if distance.is_finite() {
            self.focus_distance = distance.max(1e-4);
        }
    }

    pub fn right(&self) -> Vec3 {
        self.direction
            .cross(Vec3::Y)
            .try_normalize()
            .unwrap_or(Vec3::X)
    }

    pub fn up(&self) -> Vec3 {
        self.right().cross(self.direction)
    }

    pub fn move_forward(&mut self, amount: f32) {
        self.translate(self.direction * amount);
    }

    pub fn move_right(&mut self, amount: f32) {
        self.translate(self.right() * amount);
    }

    pub fn move_up(&mut self, amount: f32) {
        self.translate(Vec3::Y * amount);
    }

    pub fn translate(&mut self, offset: Vec3) {
        self.set_origin(self.origin + offset);
    }

    /// Adds `pitch` and `yaw` (radians) to the current orientation.
    pub fn rotate(&mut self, pitch: f32, yaw: f32) {
        let current_pitch = self.direction.y.clamp(-1.0, 1.0).asin();
        let current_yaw = self.direction.z.atan2(self.direction.x);
        let pitch = (current_pitch + pitch).clamp(-MAX_PITCH, MAX_PITCH);
        let yaw = current_yaw + yaw;
        let direction = Vec3::new(pitch.cos() * yaw.cos(), pitch.sin(), pitch.cos() * yaw.sin());
        // Spherical coordinates are unit length by construction.
        let _ = self.set_direction(direction);
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_to_rh(self.origin, self.direction, Vec3::Y)
    }

    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.vfov.to_radians(), aspect.max(1e-4), 1e-3, 1e3)
    }

    /// Ray through `ndc` (both axes in `[-1, 1]`, +y up).
    ///
    /// `lens` is a point in the unit disk; it is ignored when the defocus
    /// angle is zero.
    pub fn primary_ray(&self, ndc: Vec2, aspect: f32, lens: Vec2) -> Ray {
        let half_height = (self.vfov.to_radians() * 0.5).tan();
        let right = self.right();
        let up = right.cross(self.direction);
        let through = self.direction
            + right * (ndc.x * aspect * half_height)
            + up * (ndc.y * half_height);

        if self.defocus_angle <= 0.0 {
            return Ray::new(self.origin, through);
        }

        let radius = self.focus_distance * (self.defocus_angle.to_radians() * 0.5).tan();
        let focal_point = self.origin + through * self.focus_distance;
        let origin = self.origin + (right * lens.x + up * lens.y) * radius;
        Ray::new(origin, focal_point - origin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_is_normalised() {
        let camera = Camera::new(Vec3::ZERO, Vec3::new(0.0, 0.0, -5.0), 60.0, 0.0, 1.0).unwrap();
        assert!((camera.direction().length() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn zero_direction_is_rejected_and_previous_kept() {
        let mut camera = Camera::default();
        let before = camera.direction();
        let err = camera.set_direction(Vec3::ZERO).unwrap_err();
        assert!(matches!(err, CameraError::DegenerateDirection(_)));
        assert_eq!(camera.direction(), before);
        assert!(camera.set_direction(Vec3::splat(f32::NAN)).is_err());
    }

    #[test]
    fn rotation_keeps_unit_length_and_clamps_pitch() {
        let mut camera = Camera::default();
        for _ in 0..100 {
            camera.rotate(0.3, 0.7);
            assert!((camera.direction().length() - 1.0).abs() < 1e-5);
        }
        assert!(camera.direction().y.asin() <= MAX_PITCH + 1e-4);
    }

    #[test]
    fn centre_ray_follows_forward_direction() {
        let camera = Camera::default();
        let ray = camera.primary_ray(Vec2::ZERO, 16.0 / 9.0, Vec2::ZERO);
        assert!(ray.direction.abs_diff_eq(camera.direction(), 1e-6));
        assert_eq!(ray.origin, camera.origin());
    }

    #[test]
    fn defocused_rays_converge_on_focus_plane() {
        let mut camera = Camera::default();
        camera.set_defocus_angle(10.0);
        camera.set_focus_distance(2.0);
        let a = camera.primary_ray(Vec2::ZERO, 1.0, Vec2::new(1.0, 0.0));
        let b = camera.primary_ray(Vec2::ZERO, 1.0, Vec2::new(-1.0, 0.0));
        assert!(!a.origin.abs_diff_eq(b.origin, 1e-6));
        let focus = camera.origin() + camera.direction() * 2.0;
        let ta = (focus - a.origin).length();
        let tb = (focus - b.origin).length();
        assert!(a.at(ta).abs_diff_eq(focus, 1e-4));
        assert!(b.at(tb).abs_diff_eq(focus, 1e-4));
    }

    #[test]
    fn movement_uses_camera_basis() {
        let mut camera = Camera::default();
        camera.move_forward(1.0);
        assert!(camera.origin().abs_diff_eq(Vec3::new(0.0, 0.0, 2.0), 1e-6));
        camera.move_right(1.0);
        assert!(camera.origin().abs_diff_eq(Vec3::new(1.0, 0.0, 2.0), 1e-6));
        camera.move_up(-0.5);
        assert!(camera.origin().abs_diff_eq(Vec3::new(1.0, -0.5, 2.0), 1e-6));
    }
}
