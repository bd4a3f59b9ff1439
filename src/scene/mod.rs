pub mod camera;
pub mod keyframe;
pub mod light;
pub mod object;
pub mod objects;
pub mod scene;
pub mod transform;

pub use camera::Camera;
pub use keyframe::{Keyframe, KeyframeTrack};
pub use light::{Light, LightKind};
pub use object::{Collider, Colliders, Node, Object, ObjectId, UpdateContext};
pub use objects::{FallingBlock, Group, MeshObject};
pub use scene::Scene;
pub use transform::Transform;
