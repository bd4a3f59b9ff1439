use glam::{Mat4, Vec3};

/// Free camera driven by yaw/tilt angles. View and projection matrices are
/// cached and refreshed once per frame by [`Camera::update`].
#[derive(Clone, Copy, Debug)]
pub struct Camera {
    pub position: Vec3,
    /// Yaw in degrees; 0 looks down -Z.
    pub rotation: f32,
    /// Pitch in degrees, clamped to (-90, 90) by the host.
    pub tilt: f32,
    pub fov_y_deg: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub view_matrix: Mat4,
    pub projection_matrix: Mat4,
}

impl Camera {
    pub fn new(fov_y_deg: f32, aspect: f32, near: f32, far: f32) -> Self {
        let mut camera = Self {
            position: Vec3::ZERO,
            rotation: 0.0,
            tilt: 0.0,
            fov_y_deg,
            aspect,
            near,
            far,
            view_matrix: Mat4::IDENTITY,
            projection_matrix: Mat4::IDENTITY,
        };
        camera.update(0.0);
        camera
    }

    pub fn forward(&self) -> Vec3 {
        let yaw = self.rotation.to_radians();
        let pitch = self.tilt.to_radians();
        Vec3::new(
            yaw.sin() * pitch.cos(),
            pitch.sin(),
            -yaw.cos() * pitch.cos(),
        )
    }

    /// Recomputes the cached view/projection matrices from current state.
    pub fn update(&mut self, _dt: f32) {
        self.view_matrix =
            Mat4::look_at_rh(self.position, self.position + self.forward(), Vec3::Y);
        self.projection_matrix = Mat4::perspective_rh(
            self.fov_y_deg.to_radians(),
            self.aspect.max(f32::EPSILON),
            self.near,
            self.far,
        );
    }

}

impl Default for Camera {
    fn default() -> Self {
        Self::new(60.0, 16.0 / 9.0, 0.1, 150.0)
    }
}
