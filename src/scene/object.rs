use std::sync::atomic::{AtomicU64, Ordering};

use glam::{Mat4, Vec3};

use crate::renderer::compositor::{DrawBackend, FrameUniforms, ShadowBackend};
use crate::scene::Transform;

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

/// Stable identity for an object, used to exclude itself from collision
/// queries against the frame snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObjectId(u64);

/// Shared state every object kind carries: local transform, render flags,
/// derived world matrix and the owned child subtree.
pub struct Node {
    pub transform: Transform,
    /// Objects flagged transparent render in the sorted back-to-front pass.
    pub transparent: bool,
    /// Coarse collision radius; 0 means the object never collides.
    pub radius: f32,
    /// Recomputed every frame from the parent's world matrix; never treated
    /// as authoritative across frames.
    pub world_matrix: Mat4,
    id: ObjectId,
    pub(crate) alive: bool,
    children: Vec<Box<dyn Object>>,
}

impl Node {
    pub fn new() -> Self {
        Self {
            transform: Transform::default(),
            transparent: false,
            radius: 0.0,
            world_matrix: Mat4::IDENTITY,
            id: ObjectId(NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed)),
            alive: true,
            children: Vec::new(),
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Composes the local transform under `parent` and stores the result.
    pub fn generate_world_matrix(&mut self, parent: Mat4) {
        self.world_matrix = self.transform.world_matrix(parent);
    }

    /// Translation column of the world matrix.
    pub fn world_position(&self) -> Vec3 {
        self.world_matrix.w_axis.truncate()
    }

    pub fn add_child(&mut self, child: Box<dyn Object>) {
        self.children.push(child);
    }

    pub fn children(&self) -> &[Box<dyn Object>] {
        &self.children
    }

    pub fn children_mut(&mut self) -> &mut Vec<Box<dyn Object>> {
        &mut self.children
    }
}

impl Default for Node {
    fn default() -> Self {
        Self::new()
    }
}

/// Frame-scoped context handed to every `update` call. Spawning goes through
/// the queue so the root list never changes mid-traversal.
pub struct UpdateContext {
    pub time: f32,
    pub camera_position: Vec3,
    spawned: Vec<Box<dyn Object>>,
}

impl UpdateContext {
    pub fn new(time: f32, camera_position: Vec3) -> Self {
        Self {
            time,
            camera_position,
            spawned: Vec::new(),
        }
    }

    /// Queues a new root object; the scene adopts it after the traversal.
    pub fn spawn(&mut self, object: Box<dyn Object>) {
        self.spawned.push(object);
    }

    pub(crate) fn take_spawned(&mut self) -> Vec<Box<dyn Object>> {
        std::mem::take(&mut self.spawned)
    }
}

/// World-space position/radius snapshot of one collidable object.
#[derive(Clone, Copy, Debug)]
pub struct Collider {
    pub id: ObjectId,
    pub position: Vec3,
    pub radius: f32,
}

/// Snapshot of every collidable object, taken before collision hooks run so
/// hooks see a consistent view and cannot observe mid-frame mutation.
#[derive(Default)]
pub struct Colliders {
    items: Vec<Collider>,
}

impl Colliders {
    pub(crate) fn push(&mut self, collider: Collider) {
        self.items.push(collider);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Collider> {
        self.items.iter()
    }

    /// All colliders except the querying object itself.
    pub fn others(&self, me: ObjectId) -> impl Iterator<Item = &Collider> {
        self.items.iter().filter(move |c| c.id != me)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Capability set every scene object implements. Kinds embed a [`Node`] and
/// override only the hooks they need; pure grouping nodes keep every default
/// except the `Node` accessors.
pub trait Object {
    fn node(&self) -> &Node;
    fn node_mut(&mut self) -> &mut Node;

    /// Per-frame update. Recomputes the world matrix from the parent's and
    /// returns whether the object is still alive; returning `false` removes
    /// it (and its subtree) once the whole traversal has finished.
    fn update(
        &mut self,
        _ctx: &mut UpdateContext,
        _dt: f32,
        parent_matrix: Mat4,
        _parent_rotation: Vec3,
    ) -> bool {
        self.node_mut().generate_world_matrix(parent_matrix);
        true
    }

    /// Lit-pass draw hook. The default renders nothing.
    fn render(&self, _frame: &FrameUniforms, _backend: &mut dyn DrawBackend) {}

    /// Depth-only draw hook for the shadow pass; receives no lighting state.
    fn render_for_shadow(&self, _backend: &mut dyn ShadowBackend) {}

    /// Coarse collision hook; may adjust the object's own position/velocity
    /// from the snapshot but must not touch the object tree.
    fn check_collisions(&mut self, _colliders: &Colliders, _dt: f32) {}
}
