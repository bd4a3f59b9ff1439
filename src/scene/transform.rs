use glam::{EulerRot, Mat4, Vec3};

/// Local transform: scale, then rotate X->Y->Z (Euler degrees), then translate.
#[derive(Clone, Copy, Debug)]
pub struct Transform {
    pub position: Vec3,
    /// Euler angles in degrees, applied about X, then Y, then Z.
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    /// The local matrix: `T * Rxyz * S`.
    pub fn matrix(&self) -> Mat4 {
        let rot = Mat4::from_euler(
            EulerRot::XYZ,
            self.rotation.x.to_radians(),
            self.rotation.y.to_radians(),
            self.rotation.z.to_radians(),
        );
        Mat4::from_translation(self.position) * rot * Mat4::from_scale(self.scale)
    }

    /// Composes this transform under a parent world matrix.
    pub fn world_matrix(&self, parent: Mat4) -> Mat4 {
        parent * self.matrix()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_identity() {
        let m = Transform::default().matrix();
        assert!(m.abs_diff_eq(Mat4::IDENTITY, 1e-6));
    }

    #[test]
    fn scale_applies_before_translation() {
        let tr = Transform {
            position: Vec3::new(1.0, 2.0, 3.0),
            rotation: Vec3::ZERO,
            scale: Vec3::splat(2.0),
        };
        let p = tr.matrix().transform_point3(Vec3::new(1.0, 0.0, 0.0));
        // (1,0,0) -> (2,0,0) -> (3,2,3)
        assert!(p.abs_diff_eq(Vec3::new(3.0, 2.0, 3.0), 1e-6));
    }

    #[test]
    fn world_matrix_is_parent_times_local() {
        let parent = Mat4::from_translation(Vec3::new(5.0, 0.0, 0.0));
        let tr = Transform::from_position(Vec3::new(2.0, 0.0, 0.0));
        let world = tr.world_matrix(parent);
        assert!(world.abs_diff_eq(parent * tr.matrix(), 1e-6));
        let origin = world.transform_point3(Vec3::ZERO);
        assert!(origin.abs_diff_eq(Vec3::new(7.0, 0.0, 0.0), 1e-6));
    }

    #[test]
    fn root_world_matrix_equals_local() {
        let tr = Transform {
            position: Vec3::new(-1.0, 4.0, 0.5),
            rotation: Vec3::new(0.0, 90.0, 0.0),
            scale: Vec3::splat(0.5),
        };
        assert!(tr.world_matrix(Mat4::IDENTITY).abs_diff_eq(tr.matrix(), 1e-6));
    }

    #[test]
    fn rotation_is_degrees_about_y() {
        let tr = Transform {
            rotation: Vec3::new(0.0, 90.0, 0.0),
            ..Transform::default()
        };
        let p = tr.matrix().transform_point3(Vec3::new(1.0, 0.0, 0.0));
        assert!(p.abs_diff_eq(Vec3::new(0.0, 0.0, -1.0), 1e-5));
    }
}
