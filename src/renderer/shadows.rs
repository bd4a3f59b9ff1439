use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

use crate::scene::light::Light;

/// Depth-texture slots for directional/spot shadow casters.
pub const MAX_SHADOW_MAPS: usize = 4;
/// Cubemap slots for point-light shadow casters.
pub const MAX_POINT_SHADOW_MAPS: usize = 2;
/// Faces per point-light cubemap.
pub const POINT_SHADOW_FACE_COUNT: usize = 6;

/// Direction assumed when a caster resolves to a zero direction.
const FALLBACK_LIGHT_DIRECTION: Vec3 = Vec3::new(0.0, -1.0, 0.0);
/// Half-extent of the directional ortho volume covering the scene.
const DIRECTIONAL_ORTHO_HALF_EXTENT: f32 = 150.0;
const DIRECTIONAL_NEAR: f32 = 1.0;
const DIRECTIONAL_FAR: f32 = 500.0;
/// How far opposite its direction a directional light's eye point sits.
const DIRECTIONAL_EYE_DISTANCE: f32 = 200.0;
const SHADOW_NEAR: f32 = 0.1;

/// Per-frame shadow caster assignment. Rebuilt from scratch every frame:
/// unused slots always hold the sentinel (-1 caster, identity matrix, zero
/// far plane) so shading never reads stale state.
#[derive(Clone, Copy, Debug)]
pub struct ShadowPlan {
    pub map_count: usize,
    /// Index into the unified active-light list backing each 2D slot.
    pub caster_indices: [i32; MAX_SHADOW_MAPS],
    pub light_space: [Mat4; MAX_SHADOW_MAPS],
    pub point_map_count: usize,
    pub point_caster_indices: [i32; MAX_POINT_SHADOW_MAPS],
    pub point_far_planes: [f32; MAX_POINT_SHADOW_MAPS],
}

impl Default for ShadowPlan {
    fn default() -> Self {
        Self {
            map_count: 0,
            caster_indices: [-1; MAX_SHADOW_MAPS],
            light_space: [Mat4::IDENTITY; MAX_SHADOW_MAPS],
            point_map_count: 0,
            point_caster_indices: [-1; MAX_POINT_SHADOW_MAPS],
            point_far_planes: [0.0; MAX_POINT_SHADOW_MAPS],
        }
    }
}

impl ShadowPlan {
    /// Partitions the active lights (main light first, then registration
    /// order) into 2D and cubemap shadow slots. Shadow casting is
    /// best-effort: lights beyond a queue's capacity simply cast no shadow
    /// this frame.
    pub fn build(active_lights: &[&Light]) -> Self {
        let mut plan = Self::default();

        for (index, light) in active_lights.iter().enumerate() {
            if light.is_point() {
                if plan.point_map_count < MAX_POINT_SHADOW_MAPS {
                    let slot = plan.point_map_count;
                    plan.point_caster_indices[slot] = index as i32;
                    plan.point_far_planes[slot] = light.shadow_far_plane();
                    plan.point_map_count += 1;
                }
            } else if plan.map_count < MAX_SHADOW_MAPS {
                let slot = plan.map_count;
                plan.caster_indices[slot] = index as i32;
                plan.light_space[slot] = light_space_matrix(light);
                plan.map_count += 1;
            }
        }

        plan
    }
}

/// Light-space view-projection for a directional or spot caster.
pub fn light_space_matrix(light: &Light) -> Mat4 {
    if light.kind() == crate::scene::light::LightKind::Spot {
        spot_light_space(light)
    } else {
        directional_light_space(light)
    }
}

/// Fixed orthographic volume looking from far opposite the light's
/// direction toward the world origin.
pub fn directional_light_space(light: &Light) -> Mat4 {
    let dir = direction_or_fallback(light);
    let eye = -dir * DIRECTIONAL_EYE_DISTANCE;
    let view = Mat4::look_at_rh(eye, Vec3::ZERO, up_for(dir));
    let proj = Mat4::orthographic_rh(
        -DIRECTIONAL_ORTHO_HALF_EXTENT,
        DIRECTIONAL_ORTHO_HALF_EXTENT,
        -DIRECTIONAL_ORTHO_HALF_EXTENT,
        DIRECTIONAL_ORTHO_HALF_EXTENT,
        DIRECTIONAL_NEAR,
        DIRECTIONAL_FAR,
    );
    proj * view
}

/// Perspective frustum matching the spot cone: fov is twice the outer
/// cutoff half-angle (recovered from the stored cosine), aspect 1.
pub fn spot_light_space(light: &Light) -> Mat4 {
    let dir = direction_or_fallback(light);
    let fov = 2.0 * light.outer_cut_off.clamp(-1.0, 1.0).acos();
    let fov = fov.clamp(0.01, std::f32::consts::PI - 0.01);
    let proj = Mat4::perspective_rh(fov, 1.0, SHADOW_NEAR, light.shadow_far_plane());
    let view = Mat4::look_at_rh(light.position, light.position + dir, up_for(dir));
    proj * view
}

/// Up vector that stays linearly independent of the view direction.
fn up_for(dir: Vec3) -> Vec3 {
    if dir.dot(Vec3::Y).abs() > 0.95 {
        Vec3::Z
    } else {
        Vec3::Y
    }
}

/// Axis directions and up-vectors for the six cubemap faces, in
/// +X, -X, +Y, -Y, +Z, -Z order.
pub const CUBE_FACE_DIRS: [Vec3; POINT_SHADOW_FACE_COUNT] = [
    Vec3::X,
    Vec3::NEG_X,
    Vec3::Y,
    Vec3::NEG_Y,
    Vec3::Z,
    Vec3::NEG_Z,
];
pub const CUBE_FACE_UPS: [Vec3; POINT_SHADOW_FACE_COUNT] = [
    Vec3::new(0.0, -1.0, 0.0),
    Vec3::new(0.0, -1.0, 0.0),
    Vec3::new(0.0, 0.0, 1.0),
    Vec3::new(0.0, 0.0, -1.0),
    Vec3::new(0.0, -1.0, 0.0),
    Vec3::new(0.0, -1.0, 0.0),
];

/// Six 90-degree view-projection matrices for a point light's cubemap.
pub fn point_shadow_transforms(position: Vec3, far: f32) -> [Mat4; POINT_SHADOW_FACE_COUNT] {
    let proj = Mat4::perspective_rh(
        std::f32::consts::FRAC_PI_2,
        1.0,
        SHADOW_NEAR,
        far.max(SHADOW_NEAR + 0.1),
    );
    let mut faces = [Mat4::IDENTITY; POINT_SHADOW_FACE_COUNT];
    for (face, (dir, up)) in CUBE_FACE_DIRS.iter().zip(CUBE_FACE_UPS.iter()).enumerate() {
        faces[face] = proj * Mat4::look_at_rh(position, position + *dir, *up);
    }
    faces
}

fn direction_or_fallback(light: &Light) -> Vec3 {
    let dir = light.effective_direction();
    if dir.length_squared() > 0.0 {
        dir
    } else {
        FALLBACK_LIGHT_DIRECTION
    }
}

/// Shadow state exposed to lit-pass shader consumers, refreshed per frame.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct ShadowUniform {
    pub light_space: [[[f32; 4]; 4]; MAX_SHADOW_MAPS],
    pub caster_indices: [i32; MAX_SHADOW_MAPS],
    pub point_caster_indices: [i32; MAX_POINT_SHADOW_MAPS],
    pub point_far_planes: [f32; MAX_POINT_SHADOW_MAPS],
    pub map_count: i32,
    pub point_map_count: i32,
    pub _pad: [i32; 2],
}

impl ShadowUniform {
    pub fn from_plan(plan: &ShadowPlan) -> Self {
        let mut uniform = Self::zeroed();
        for (dst, src) in uniform.light_space.iter_mut().zip(plan.light_space.iter()) {
            *dst = src.to_cols_array_2d();
        }
        uniform.caster_indices = plan.caster_indices;
        uniform.point_caster_indices = plan.point_caster_indices;
        uniform.point_far_planes = plan.point_far_planes;
        uniform.map_count = plan.map_count as i32;
        uniform.point_map_count = plan.point_map_count as i32;
        uniform
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    const EPS: f32 = 1e-5;

    fn directional(dir: Vec3) -> Light {
        Light::aimed(Vec3::ONE, dir, 0.0, 0.0, 1.0, 0.0, 0.0, 500.0)
    }

    fn spot(max_dist: f32) -> Light {
        let mut light = Light::aimed(Vec3::ONE, Vec3::NEG_Y, 15.0, 18.0, 1.0, 0.79, 0.032, max_dist);
        light.position = Vec3::new(-4.8, 1.3, 2.7);
        light
    }

    fn point(max_dist: f32) -> Light {
        Light::point(Vec3::ONE, 1.0, 0.09, 0.032, max_dist)
    }

    #[test]
    fn capacity_caps_two_dimensional_slots_at_four() {
        let lights: Vec<Light> = (0..6).map(|_| directional(Vec3::NEG_Y)).collect();
        let refs: Vec<&Light> = lights.iter().collect();
        let plan = ShadowPlan::build(&refs);
        assert_eq!(plan.map_count, 4);
        assert_eq!(plan.caster_indices, [0, 1, 2, 3]);
        assert_eq!(plan.point_map_count, 0);
    }

    #[test]
    fn capacity_caps_point_slots_at_two() {
        let lights: Vec<Light> = (0..4).map(|_| point(10.0)).collect();
        let refs: Vec<&Light> = lights.iter().collect();
        let plan = ShadowPlan::build(&refs);
        assert_eq!(plan.point_map_count, 2);
        assert_eq!(plan.point_caster_indices, [0, 1]);
        assert_eq!(plan.map_count, 0);
    }

    #[test]
    fn caster_indices_reference_the_unified_light_list() {
        let main = directional(Vec3::new(-1.0, -1.0, 0.0));
        let a = point(100.0);
        let s = spot(1.3);
        let b = point(4.0);
        let refs: Vec<&Light> = vec![&main, &a, &s, &b];
        let plan = ShadowPlan::build(&refs);
        assert_eq!(plan.map_count, 2);
        assert_eq!(plan.caster_indices, [0, 2, -1, -1]);
        assert_eq!(plan.point_map_count, 2);
        assert_eq!(plan.point_caster_indices, [1, 3]);
        assert_eq!(plan.point_far_planes, [100.0, 4.0]);
    }

    #[test]
    fn unused_slots_hold_sentinels() {
        let main = directional(Vec3::NEG_Y);
        let plan = ShadowPlan::build(&[&main]);
        for slot in 1..MAX_SHADOW_MAPS {
            assert_eq!(plan.caster_indices[slot], -1);
            assert!(plan.light_space[slot].abs_diff_eq(Mat4::IDENTITY, EPS));
        }
        for slot in 0..MAX_POINT_SHADOW_MAPS {
            assert_eq!(plan.point_caster_indices[slot], -1);
            assert_eq!(plan.point_far_planes[slot], 0.0);
        }
    }

    #[test]
    fn point_far_plane_falls_back_to_default() {
        let unhinted = point(-1.0);
        let plan = ShadowPlan::build(&[&unhinted]);
        assert_eq!(plan.point_far_planes[0], 100.0);
    }

    #[test]
    fn directional_matrix_looks_from_opposite_the_direction() {
        let dir = Vec3::new(0.4, -1.0, 0.2).normalize();
        let light = directional(dir);
        let matrix = directional_light_space(&light);

        let expected_view = Mat4::look_at_rh(-dir * 200.0, Vec3::ZERO, Vec3::Y);
        let expected_proj =
            Mat4::orthographic_rh(-150.0, 150.0, -150.0, 150.0, 1.0, 500.0);
        assert!(matrix.abs_diff_eq(expected_proj * expected_view, EPS));

        // The origin sits in the center of the shadow map.
        let clip = matrix * Vec4::new(0.0, 0.0, 0.0, 1.0);
        let ndc = clip.truncate() / clip.w;
        assert!(ndc.x.abs() < EPS && ndc.y.abs() < EPS);
    }

    #[test]
    fn directional_zero_direction_uses_down_vector() {
        let mut light = directional(Vec3::NEG_Y);
        light.direction = Vec3::ZERO;
        light.local_direction = Vec3::ZERO;
        let matrix = directional_light_space(&light);
        // Straight down forces the alternate up vector.
        let expected_view =
            Mat4::look_at_rh(Vec3::new(0.0, 200.0, 0.0), Vec3::ZERO, Vec3::Z);
        let expected_proj =
            Mat4::orthographic_rh(-150.0, 150.0, -150.0, 150.0, 1.0, 500.0);
        assert!(matrix.abs_diff_eq(expected_proj * expected_view, EPS));
    }

    #[test]
    fn spot_fov_is_twice_the_outer_half_angle() {
        let light = spot(25.0);
        let matrix = spot_light_space(&light);

        let fov = 2.0 * 18f32.to_radians();
        let expected_proj = Mat4::perspective_rh(fov, 1.0, 0.1, 25.0);
        let expected_view = Mat4::look_at_rh(
            light.position,
            light.position + light.effective_direction(),
            Vec3::Z,
        );
        assert!(matrix.abs_diff_eq(expected_proj * expected_view, 1e-4));
    }

    #[test]
    fn spot_depth_maps_into_wgpu_range() {
        let light = spot(30.0);
        let matrix = spot_light_space(&light);
        let dir = light.effective_direction();

        let near_world = light.position + dir * 0.1;
        let far_world = light.position + dir * 30.0;
        let clip_near = matrix * near_world.extend(1.0);
        let clip_far = matrix * far_world.extend(1.0);
        assert!(clip_near.w > 0.0 && clip_far.w > 0.0);
        assert!((clip_near.z / clip_near.w).abs() < 1e-4);
        assert!((clip_far.z / clip_far.w - 1.0).abs() < 1e-4);
    }

    #[test]
    fn point_transforms_cover_all_faces_with_cubemap_ups() {
        let position = Vec3::new(-3.0, 4.5, 1.0);
        let far = 12.0;
        let faces = point_shadow_transforms(position, far);
        let proj = Mat4::perspective_rh(std::f32::consts::FRAC_PI_2, 1.0, 0.1, far);

        for (face, (dir, up)) in CUBE_FACE_DIRS.iter().zip(CUBE_FACE_UPS.iter()).enumerate() {
            let expected = proj * Mat4::look_at_rh(position, position + *dir, *up);
            assert!(faces[face].abs_diff_eq(expected, EPS), "face {face}");

            // Each face looks straight down its axis.
            let view = proj.inverse() * faces[face];
            let dir_in_view = (view * dir.extend(0.0)).truncate().normalize();
            assert!(dir_in_view.abs_diff_eq(Vec3::NEG_Z, EPS));
        }
    }

    #[test]
    fn shadow_uniform_mirrors_the_plan() {
        let main = directional(Vec3::NEG_Y);
        let p = point(7.0);
        let plan = ShadowPlan::build(&[&main, &p]);
        let uniform = ShadowUniform::from_plan(&plan);
        assert_eq!(uniform.map_count, 1);
        assert_eq!(uniform.point_map_count, 1);
        assert_eq!(uniform.caster_indices, plan.caster_indices);
        assert_eq!(uniform.point_far_planes, [7.0, 0.0]);
        assert_eq!(
            uniform.light_space[0],
            plan.light_space[0].to_cols_array_2d()
        );
        assert_eq!(uniform.light_space[1], Mat4::IDENTITY.to_cols_array_2d());
    }
}
