//! Camera system

use glam::{Mat4, Vec3};

/// Perspective projection parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Perspective {
    /// Vertical field of view in degrees
    pub fov_y_degrees: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Perspective {
    fn default() -> Self {
        Self {
            fov_y_degrees: 90.0,
            aspect: 6.0 / 8.0,
            near: 0.1,
            far: 1024.0,
        }
    }
}

impl Perspective {
    pub fn matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y_degrees.to_radians(), self.aspect, self.near, self.far)
    }
}

/// Camera for viewing the scene
///
/// View and projection matrices are cached. Moving the camera only takes
/// effect after [`Camera::update_transform`]; changing the lens after
/// [`Camera::create_perspective`].
#[derive(Debug, Clone)]
pub struct Camera {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    perspective: Perspective,
    view: Mat4,
    projection: Mat4,
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(Vec3::new(0.0, 2.0, 5.0), Vec3::ZERO)
    }
}

impl Camera {
    pub fn new(position: Vec3, target: Vec3) -> Self {
        let perspective = Perspective::default();
        let mut camera = Self {
            position,
            target,
            up: Vec3::Y,
            perspective,
            view: Mat4::IDENTITY,
            projection: perspective.matrix(),
        };
        camera.update_transform();
        camera
    }

    pub fn look_at(&mut self, target: Vec3) {
        self.target = target;
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    /// Rebuild the cached view matrix from position, target and up
    pub fn update_transform(&mut self) {
        self.view = Mat4::look_at_rh(self.position, self.target, self.up);
    }

    /// Replace the lens and rebuild the cached projection matrix
    pub fn create_perspective(&mut self, fov_y_degrees: f32, aspect: f32, near: f32, far: f32) {
        self.perspective = Perspective {
            fov_y_degrees,
            aspect,
            near,
            far,
        };
        self.projection = self.perspective.matrix();
    }

    pub fn perspective(&self) -> &Perspective {
        &self.perspective
    }

    pub fn view_matrix(&self) -> Mat4 {
        self.view
    }

    pub fn projection_matrix(&self) -> Mat4 {
        self.projection
    }

    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection * self.view
    }

    /// Get the forward direction
    pub fn forward(&self) -> Vec3 {
        (self.target - self.position).normalize_or_zero()
    }

    /// Get the right direction
    pub fn right(&self) -> Vec3 {
        self.forward().cross(self.up).normalize_or_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_is_cached_until_update() {
        let mut camera = Camera::new(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO);
        let before = camera.view_matrix();

        camera.set_position(Vec3::new(3.0, 0.0, 5.0));
        assert_eq!(camera.view_matrix(), before);

        camera.update_transform();
        assert_ne!(camera.view_matrix(), before);
        let eye = camera.view_matrix().inverse().transform_point3(Vec3::ZERO);
        assert!(eye.abs_diff_eq(Vec3::new(3.0, 0.0, 5.0), 1e-4));
    }

    #[test]
    fn test_create_perspective_rebuilds_projection() {
        let mut camera = Camera::default();
        let before = camera.projection_matrix();
        camera.create_perspective(60.0, 16.0 / 9.0, 0.1, 100.0);

        assert_ne!(camera.projection_matrix(), before);
        assert_eq!(camera.perspective().fov_y_degrees, 60.0);
        assert_eq!(
            camera.projection_matrix(),
            Mat4::perspective_rh(60f32.to_radians(), 16.0 / 9.0, 0.1, 100.0)
        );
    }

    #[test]
    fn test_basis_vectors() {
        let camera = Camera::new(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO);
        assert!(camera.forward().abs_diff_eq(-Vec3::Z, 1e-6));
        assert!(camera.right().abs_diff_eq(Vec3::X, 1e-6));
    }
}
