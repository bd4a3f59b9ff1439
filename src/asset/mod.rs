pub mod cache;
pub mod handle;
pub mod mesh;

pub use cache::AssetCache;
pub use handle::Handle;
pub use mesh::Mesh;

/// Decoded RGBA8 texture data supplied by an external provider.
#[derive(Clone, Debug)]
pub struct Texture {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

type MeshProvider = Box<dyn Fn(&str) -> Option<Mesh>>;
type TextureProvider = Box<dyn Fn(&str) -> Option<Texture>>;

/// Process-wide asset service. Object kinds request meshes/textures by path;
/// the registered providers do the actual parsing (an external concern), and
/// results are cached forever. A path no provider can satisfy is a silent
/// miss: the requesting object simply draws nothing.
#[derive(Default)]
pub struct Assets {
    pub meshes: AssetCache<Mesh>,
    pub textures: AssetCache<Texture>,
    mesh_provider: Option<MeshProvider>,
    texture_provider: Option<TextureProvider>,
}

impl Assets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_mesh_provider(&mut self, provider: impl Fn(&str) -> Option<Mesh> + 'static) {
        self.mesh_provider = Some(Box::new(provider));
    }

    pub fn set_texture_provider(&mut self, provider: impl Fn(&str) -> Option<Texture> + 'static) {
        self.texture_provider = Some(Box::new(provider));
    }

    pub fn mesh(&mut self, path: &str) -> Option<Handle<Mesh>> {
        let provider = &self.mesh_provider;
        let handle = self.meshes.get_or_load(path, |p| {
            provider.as_ref().and_then(|provide| provide(p))
        });
        if handle.is_none() {
            log::debug!("no mesh available for {path:?}");
        }
        handle
    }

    pub fn texture(&mut self, path: &str) -> Option<Handle<Texture>> {
        let provider = &self.texture_provider;
        let handle = self.textures.get_or_load(path, |p| {
            provider.as_ref().and_then(|provide| provide(p))
        });
        if handle.is_none() {
            log::debug!("no texture available for {path:?}");
        }
        handle
    }
}
