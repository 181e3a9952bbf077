//! Camera projection and view matrices.
//!
//! Projection matrices target Vulkan clip space: depth in [0, 1], y pointing
//! down. View matrices are built from an orthonormal basis rather than a
//! generic inverse, so they stay exact.

use glam::{EulerRot, Mat3, Mat4, Vec3, Vec4};

/// A camera holding separate projection and view matrices.
#[derive(Debug, Clone, Copy)]
pub struct Camera {
    projection: Mat4,
    view: Mat4,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            projection: Mat4::IDENTITY,
            view: Mat4::IDENTITY,
        }
    }
}

impl Camera {
    /// Set an orthographic projection over the given box.
    pub fn set_orthographic_projection(
        &mut self,
        left: f32,
        right: f32,
        top: f32,
        bottom: f32,
        near: f32,
        far: f32,
    ) {
        self.projection = Mat4::from_cols(
            Vec4::new(2.0 / (right - left), 0.0, 0.0, 0.0),
            Vec4::new(0.0, 2.0 / (bottom - top), 0.0, 0.0),
            Vec4::new(0.0, 0.0, 1.0 / (far - near), 0.0),
            Vec4::new(
                -(right + left) / (right - left),
                -(bottom + top) / (bottom - top),
                -near / (far - near),
                1.0,
            ),
        );
    }

    /// Set a perspective projection.
    ///
    /// `fov_y` is the full vertical field of view in radians. `aspect` is
    /// width over height and must be positive.
    pub fn set_perspective_projection(&mut self, fov_y: f32, aspect: f32, near: f32, far: f32) {
        debug_assert!(aspect > 0.0);
        let tan_half_fov = (fov_y / 2.0).tan();
        self.projection = Mat4::from_cols(
            Vec4::new(1.0 / (aspect * tan_half_fov), 0.0, 0.0, 0.0),
            Vec4::new(0.0, 1.0 / tan_half_fov, 0.0, 0.0),
            Vec4::new(0.0, 0.0, far / (far - near), 1.0),
            Vec4::new(0.0, 0.0, -(far * near) / (far - near), 0.0),
        );
    }

    /// Point the camera along `direction` from `position`.
    pub fn set_view_direction(&mut self, position: Vec3, direction: Vec3, up: Vec3) {
        let w = direction.normalize();
        let u = w.cross(up).normalize();
        let v = w.cross(u);
        self.set_view_basis(position, u, v, w);
    }

    /// Point the camera at `target` from `position`.
    pub fn set_view_target(&mut self, position: Vec3, target: Vec3, up: Vec3) {
        self.set_view_direction(position, target - position, up);
    }

    /// Set the view from a position and Y-X-Z rotation, matching
    /// [`Transform`](crate::Transform) rotation semantics.
    pub fn set_view_yxz(&mut self, position: Vec3, rotation: Vec3) {
        let basis = Mat3::from_euler(EulerRot::YXZ, rotation.y, rotation.x, rotation.z);
        self.set_view_basis(position, basis.x_axis, basis.y_axis, basis.z_axis);
    }

    fn set_view_basis(&mut self, position: Vec3, u: Vec3, v: Vec3, w: Vec3) {
        self.view = Mat4::from_cols(
            Vec4::new(u.x, v.x, w.x, 0.0),
            Vec4::new(u.y, v.y, w.y, 0.0),
            Vec4::new(u.z, v.z, w.z, 0.0),
            Vec4::new(-u.dot(position), -v.dot(position), -w.dot(position), 1.0),
        );
    }

    /// The projection matrix.
    pub fn projection(&self) -> Mat4 {
        self.projection
    }

    /// The view matrix.
    pub fn view(&self) -> Mat4 {
        self.view
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn perspective_maps_near_and_far_to_unit_depth() {
        let mut camera = Camera::default();
        camera.set_perspective_projection(std::f32::consts::FRAC_PI_2, 1.0, 0.1, 100.0);
        let p = camera.projection();

        let near_point = p * Vec4::new(0.0, 0.0, 0.1, 1.0);
        assert_relative_eq!(near_point.z / near_point.w, 0.0, epsilon = 1e-5);

        let far_point = p * Vec4::new(0.0, 0.0, 100.0, 1.0);
        assert_relative_eq!(far_point.z / far_point.w, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn orthographic_maps_box_corners_to_clip_corners() {
        let mut camera = Camera::default();
        camera.set_orthographic_projection(-2.0, 2.0, -1.0, 1.0, 0.0, 10.0);
        let p = camera.projection();

        let corner = p * Vec4::new(2.0, 1.0, 10.0, 1.0);
        assert_relative_eq!(corner.x, 1.0);
        assert_relative_eq!(corner.y, 1.0);
        assert_relative_eq!(corner.z, 1.0);
    }

    #[test]
    fn view_at_origin_looking_forward_is_identity() {
        let mut camera = Camera::default();
        camera.set_view_direction(Vec3::ZERO, Vec3::Z, -Vec3::Y);
        let v = camera.view();
        for (a, b) in v
            .to_cols_array()
            .iter()
            .zip(Mat4::IDENTITY.to_cols_array())
        {
            assert_relative_eq!(*a, b, epsilon = 1e-6);
        }
    }

    #[test]
    fn view_translates_world_to_camera_space() {
        let mut camera = Camera::default();
        let position = Vec3::new(0.0, 0.0, -5.0);
        camera.set_view_direction(position, Vec3::Z, -Vec3::Y);

        let world_point = Vec4::new(0.0, 0.0, 0.0, 1.0);
        let camera_point = camera.view() * world_point;
        assert_relative_eq!(camera_point.z, 5.0, epsilon = 1e-6);
    }

    #[test]
    fn view_target_matches_view_direction() {
        let mut a = Camera::default();
        let mut b = Camera::default();
        let position = Vec3::new(1.0, 2.0, 3.0);
        let target = Vec3::new(4.0, 0.0, -1.0);

        a.set_view_target(position, target, -Vec3::Y);
        b.set_view_direction(position, target - position, -Vec3::Y);

        for (x, y) in a
            .view()
            .to_cols_array()
            .iter()
            .zip(b.view().to_cols_array())
        {
            assert_relative_eq!(*x, y, epsilon = 1e-6);
        }
    }

    #[test]
    fn view_yxz_zero_rotation_is_identity_basis() {
        let mut camera = Camera::default();
        camera.set_view_yxz(Vec3::ZERO, Vec3::ZERO);
        let v = camera.view();
        for (a, b) in v
            .to_cols_array()
            .iter()
            .zip(Mat4::IDENTITY.to_cols_array())
        {
            assert_relative_eq!(*a, b, epsilon = 1e-6);
        }
    }
}
