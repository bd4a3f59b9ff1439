use bytemuck::{Pod, Zeroable};
use glam::Vec3;

use crate::scene::light::Light;

/// Lit-pass shaders see at most this many lights per frame.
pub const MAX_LIGHTS: usize = 10;

const LIGHT_AMBIENT_INTENSITY: [f32; 3] = [0.1, 0.1, 0.1];
const LIGHT_DIFFUSE_INTENSITY: [f32; 3] = [0.6, 0.6, 0.6];
const LIGHT_SPECULAR_INTENSITY: [f32; 3] = [0.3, 0.3, 0.3];

/// One light in the uniform block. 16-byte aligned rows; `kind` matches
/// `LightKind` discriminants (0 directional, 1 point, 2 spot).
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable, Debug)]
pub struct LightRaw {
    pub position: [f32; 3],
    pub kind: i32,
    pub direction: [f32; 3],
    pub cut_off: f32,
    pub color: [f32; 3],
    pub outer_cut_off: f32,
    /// constant, linear, quadratic attenuation + max_dist.
    pub attenuation_max_dist: [f32; 4],
}

impl LightRaw {
    pub fn from_light(light: &Light) -> Self {
        let direction = light.effective_direction();
        Self {
            position: light.position.to_array(),
            kind: light.kind() as i32,
            direction: direction.to_array(),
            cut_off: light.cut_off,
            color: light.color.to_array(),
            outer_cut_off: light.outer_cut_off,
            attenuation_max_dist: [light.constant, light.linear, light.quadratic, light.max_dist],
        }
    }
}

/// Per-frame light block handed to lit-pass shader consumers. Refreshed
/// every frame; slots past `count` stay zeroed.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct LightsUniform {
    pub count: u32,
    pub _pad: [u32; 3],
    pub ambient: [f32; 4],
    pub diffuse: [f32; 4],
    pub specular: [f32; 4],
    pub view_position: [f32; 4],
    pub lights: [LightRaw; MAX_LIGHTS],
}

impl LightsUniform {
    /// Packs the active set (main light first, then registration order).
    /// Lights beyond [`MAX_LIGHTS`] are dropped, matching the shader-side
    /// clamp in the original lit pass.
    pub fn from_lights(lights: &[&Light], view_position: Vec3) -> Self {
        let mut uniform = Self::zeroed();
        let count = lights.len().min(MAX_LIGHTS);
        if lights.len() > MAX_LIGHTS {
            log::warn!(
                "{} active lights exceed the {} uniform slots; extras are unlit",
                lights.len(),
                MAX_LIGHTS
            );
        }
        uniform.count = count as u32;
        uniform.ambient = pad3(LIGHT_AMBIENT_INTENSITY);
        uniform.diffuse = pad3(LIGHT_DIFFUSE_INTENSITY);
        uniform.specular = pad3(LIGHT_SPECULAR_INTENSITY);
        uniform.view_position = [view_position.x, view_position.y, view_position.z, 1.0];
        for (dst, src) in uniform.lights.iter_mut().zip(lights.iter().take(count)) {
            *dst = LightRaw::from_light(src);
        }
        uniform
    }
}

fn pad3(v: [f32; 3]) -> [f32; 4] {
    [v[0], v[1], v[2], 0.0]
}
