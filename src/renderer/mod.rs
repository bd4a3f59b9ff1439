pub mod compositor;
pub mod gpu;
pub mod lights;
pub mod shadow_pass;
pub mod shadows;
pub mod vertex;

pub use compositor::{
    compose, compose_shadow, DrawBackend, DrawEvent, DrawParams, FrameUniforms, RecordingBackend,
    ShadowBackend,
};
pub use gpu::{Gpu, GpuError};
pub use lights::{LightsUniform, MAX_LIGHTS};
pub use shadow_pass::{ShadowDrawList, ShadowPass};
pub use shadows::{ShadowPlan, ShadowUniform, MAX_POINT_SHADOW_MAPS, MAX_SHADOW_MAPS};
pub use vertex::Vertex;
