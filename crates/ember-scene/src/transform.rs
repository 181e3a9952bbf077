//! Object transforms.

use glam::{EulerRot, Mat3, Mat4, Vec3};

/// Position, scale, and Tait-Bryan rotation of a scene object.
///
/// The rotation order is Y, then X, then Z (intrinsic), so yaw is applied
/// first when reading the composed matrix left to right.
#[derive(Debug, Clone, Copy)]
pub struct Transform {
    pub translation: Vec3,
    pub scale: Vec3,
    /// Rotation angles in radians, applied as Y * X * Z.
    pub rotation: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            scale: Vec3::ONE,
            rotation: Vec3::ZERO,
        }
    }
}

impl Transform {
    /// The model matrix: translation * Ry * Rx * Rz * scale.
    pub fn mat4(&self) -> Mat4 {
        Mat4::from_translation(self.translation)
            * Mat4::from_euler(
                EulerRot::YXZ,
                self.rotation.y,
                self.rotation.x,
                self.rotation.z,
            )
            * Mat4::from_scale(self.scale)
    }

    /// Matrix for transforming normals: rotation * inverse scale.
    ///
    /// Correct for non-uniform scale, where the model matrix's upper 3x3
    /// would skew normals.
    pub fn normal_matrix(&self) -> Mat3 {
        let rotation = Mat3::from_euler(
            EulerRot::YXZ,
            self.rotation.y,
            self.rotation.x,
            self.rotation.z,
        );
        let inv_scale = Vec3::ONE / self.scale;
        rotation * Mat3::from_diagonal(inv_scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn identity_transform_is_identity_matrix() {
        let transform = Transform::default();
        let m = transform.mat4();
        assert_relative_eq!(m.to_cols_array()[..], Mat4::IDENTITY.to_cols_array()[..]);
    }

    #[test]
    fn translation_lands_in_last_column() {
        let transform = Transform {
            translation: Vec3::new(1.0, 2.0, 3.0),
            ..Default::default()
        };
        let m = transform.mat4();
        assert_relative_eq!(m.w_axis.x, 1.0);
        assert_relative_eq!(m.w_axis.y, 2.0);
        assert_relative_eq!(m.w_axis.z, 3.0);
    }

    #[test]
    fn rotation_order_is_y_then_x_then_z() {
        let transform = Transform {
            rotation: Vec3::new(0.3, 0.7, -0.2),
            ..Default::default()
        };
        let expected = Mat4::from_rotation_y(0.7)
            * Mat4::from_rotation_x(0.3)
            * Mat4::from_rotation_z(-0.2);
        let m = transform.mat4();
        for (a, b) in m.to_cols_array().iter().zip(expected.to_cols_array()) {
            assert_relative_eq!(*a, b, epsilon = 1e-6);
        }
    }

    #[test]
    fn normal_matrix_undoes_nonuniform_scale() {
        let transform = Transform {
            scale: Vec3::new(2.0, 1.0, 0.5),
            ..Default::default()
        };
        let n = transform.normal_matrix();
        let transformed = n * Vec3::new(1.0, 0.0, 0.0);
        assert_relative_eq!(transformed.x, 0.5);
        let transformed = n * Vec3::new(0.0, 0.0, 1.0);
        assert_relative_eq!(transformed.z, 2.0);
    }

    #[test]
    fn normal_matrix_matches_rotation_for_uniform_scale() {
        let transform = Transform {
            rotation: Vec3::new(0.1, 0.5, 0.9),
            scale: Vec3::ONE,
            ..Default::default()
        };
        let n = transform.normal_matrix();
        let rotation = Mat3::from_mat4(transform.mat4());
        for (a, b) in n.to_cols_array().iter().zip(rotation.to_cols_array()) {
            assert_relative_eq!(*a, b, epsilon = 1e-6);
        }
    }
}
