pub mod asset;
pub mod renderer;
pub mod scene;
pub mod settings;

pub use asset::{Assets, Handle, Mesh, Texture};
pub use renderer::{
    DrawBackend, DrawParams, FrameUniforms, Gpu, RecordingBackend, ShadowBackend, ShadowDrawList,
    ShadowPass, ShadowPlan,
};
pub use scene::{Camera, FallingBlock, Group, Light, MeshObject, Object, Scene, Transform};
pub use settings::RenderSettings;

pub fn init_logging() {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .try_init();
}
