use glam::{Mat4, Vec2, Vec3};
use rand::rngs::SmallRng;
use rand::Rng;

use crate::asset::{Handle, Mesh, Texture};
use crate::renderer::compositor::{DrawBackend, DrawParams, FrameUniforms, ShadowBackend};
use crate::scene::keyframe::KeyframeTrack;
use crate::scene::object::{Colliders, Node, Object, UpdateContext};

/// Pure grouping node. Carries a transform and children, draws nothing.
#[derive(Default)]
pub struct Group {
    node: Node,
}

impl Group {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at(position: Vec3) -> Self {
        let mut group = Self::new();
        group.node.transform.position = position;
        group
    }
}

impl Object for Group {
    fn node(&self) -> &Node {
        &self.node
    }

    fn node_mut(&mut self) -> &mut Node {
        &mut self.node
    }
}

/// A textured mesh in the tree. Optionally keyframe-animated, optionally
/// instanced a fixed number of times with per-instance offsets.
pub struct MeshObject {
    node: Node,
    mesh: Handle<Mesh>,
    texture: Handle<Texture>,
    track: Option<KeyframeTrack>,
    /// UV scroll per second; drives `texture_offset` in the draw params.
    pub scroll: Vec2,
    texture_offset: Vec2,
    /// Local-space offsets drawn in addition to the object itself. Empty for
    /// ordinary single-draw objects.
    instance_offsets: Vec<Mat4>,
}

impl MeshObject {
    pub fn new(mesh: Handle<Mesh>, texture: Handle<Texture>) -> Self {
        Self {
            node: Node::new(),
            mesh,
            texture,
            track: None,
            scroll: Vec2::ZERO,
            texture_offset: Vec2::ZERO,
            instance_offsets: Vec::new(),
        }
    }

    pub fn transparent(mut self) -> Self {
        self.node.transparent = true;
        self
    }

    pub fn with_track(mut self, track: KeyframeTrack) -> Self {
        self.track = Some(track);
        self
    }

    /// Scatters `count` extra copies uniformly inside a disc of `radius`
    /// around the object, each with a random heading.
    pub fn scattered(mut self, count: usize, radius: f32, rng: &mut SmallRng) -> Self {
        self.instance_offsets = (0..count)
            .map(|_| {
                let angle = rng.gen_range(0.0..std::f32::consts::TAU);
                let r = radius * rng.gen_range(0.0f32..1.0).sqrt();
                let spin = rng.gen_range(0.0..360.0f32);
                Mat4::from_translation(Vec3::new(r * angle.cos(), 0.0, r * angle.sin()))
                    * Mat4::from_rotation_y(spin.to_radians())
            })
            .collect();
        self
    }

    fn models(&self) -> impl Iterator<Item = Mat4> + '_ {
        let base = self.node.world_matrix;
        std::iter::once(base).chain(self.instance_offsets.iter().map(move |o| base * *o))
    }
}

impl Object for MeshObject {
    fn node(&self) -> &Node {
        &self.node
    }

    fn node_mut(&mut self) -> &mut Node {
        &mut self.node
    }

    fn update(
        &mut self,
        _ctx: &mut UpdateContext,
        dt: f32,
        parent_matrix: Mat4,
        _parent_rotation: Vec3,
    ) -> bool {
        if let Some(track) = &mut self.track {
            if let Some(sample) = track.advance(dt) {
                self.node.transform.position = sample.position;
                self.node.transform.rotation = sample.rotation;
            }
        }
        self.texture_offset = (self.texture_offset + self.scroll * dt).fract();
        self.node.generate_world_matrix(parent_matrix);
        true
    }

    fn render(&self, _frame: &FrameUniforms, backend: &mut dyn DrawBackend) {
        for model in self.models() {
            backend.draw(&DrawParams {
                model,
                mesh: self.mesh,
                texture: self.texture,
                transparent: self.node.transparent,
                texture_offset: self.texture_offset,
            });
        }
    }

    fn render_for_shadow(&self, backend: &mut dyn ShadowBackend) {
        for model in self.models() {
            backend.draw_shadow(self.mesh, model);
        }
    }
}

const GRAVITY: f32 = -9.8;
const BLOCK_RADIUS: f32 = 0.5;
const GROUND_Y: f32 = -1.0;
/// The ground plane is finite; blocks past this distance fall through.
const GROUND_HALF_EXTENT: f32 = 50.0;
const KILL_PLANE_Y: f32 = -50.0;
const GROUND_RESTITUTION: f32 = 0.4;
/// Below this speed a grounded block stops bouncing and settles.
const REST_SPEED: f32 = 0.5;

/// A falling prop under gravity. Tumbles slowly while airborne, bounces off
/// the ground plane with damping, resolves sphere overlaps against other
/// collidable objects, and despawns once it falls past the kill plane.
pub struct FallingBlock {
    node: Node,
    mesh: Handle<Mesh>,
    texture: Handle<Texture>,
    pub velocity: Vec3,
    spin: Vec3,
    on_ground: bool,
}

impl FallingBlock {
    pub fn new(mesh: Handle<Mesh>, texture: Handle<Texture>, position: Vec3) -> Self {
        let mut node = Node::new();
        node.transform.position = position;
        node.radius = BLOCK_RADIUS;
        Self {
            node,
            mesh,
            texture,
            velocity: Vec3::ZERO,
            spin: Vec3::new(12.0, 35.0, 7.0),
            on_ground: false,
        }
    }

    pub fn with_velocity(mut self, velocity: Vec3) -> Self {
        self.velocity = velocity;
        self
    }
}

impl Object for FallingBlock {
    fn node(&self) -> &Node {
        &self.node
    }

    fn node_mut(&mut self) -> &mut Node {
        &mut self.node
    }

    fn update(
        &mut self,
        _ctx: &mut UpdateContext,
        dt: f32,
        parent_matrix: Mat4,
        _parent_rotation: Vec3,
    ) -> bool {
        self.velocity.y += GRAVITY * dt;
        self.node.transform.position += self.velocity * dt;

        let over_ground = self.node.transform.position.x.abs() <= GROUND_HALF_EXTENT
            && self.node.transform.position.z.abs() <= GROUND_HALF_EXTENT;
        let floor = GROUND_Y + BLOCK_RADIUS;
        if over_ground && self.node.transform.position.y < floor {
            self.node.transform.position.y = floor;
            if self.velocity.y < 0.0 {
                let bounced = -self.velocity.y * GROUND_RESTITUTION;
                self.velocity.y = if bounced < REST_SPEED { 0.0 } else { bounced };
            }
            self.on_ground = self.velocity.y == 0.0;
        }

        if !self.on_ground {
            self.node.transform.rotation += self.spin * dt;
        }

        if self.node.transform.position.y < KILL_PLANE_Y {
            return false;
        }

        self.node.generate_world_matrix(parent_matrix);
        true
    }

    fn check_collisions(&mut self, colliders: &Colliders, _dt: f32) {
        let me = self.node.id();
        let my_pos = self.node.world_position();
        for other in colliders.others(me) {
            if other.radius <= 0.0 {
                continue;
            }
            let min_dist = BLOCK_RADIUS + other.radius;
            let delta = my_pos - other.position;
            let dist_sq = delta.length_squared();
            if dist_sq >= min_dist * min_dist || dist_sq == 0.0 {
                continue;
            }
            let dist = dist_sq.sqrt();
            let push = delta / dist * (min_dist - dist);
            self.node.transform.position += push;
            // Kill the velocity component driving into the contact.
            let normal = delta / dist;
            let into = self.velocity.dot(normal);
            if into < 0.0 {
                self.velocity -= normal * into;
            }
        }
    }

    fn render(&self, _frame: &FrameUniforms, backend: &mut dyn DrawBackend) {
        backend.draw(&DrawParams::opaque(
            self.node.world_matrix,
            self.mesh,
            self.texture,
        ));
    }

    fn render_for_shadow(&self, backend: &mut dyn ShadowBackend) {
        backend.draw_shadow(self.mesh, self.node.world_matrix);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::object::Collider;
    use rand::SeedableRng;

    fn handles() -> (Handle<Mesh>, Handle<Texture>) {
        (Handle::new(0), Handle::new(0))
    }

    #[test]
    fn falling_block_accelerates_downward() {
        let (mesh, tex) = handles();
        let mut block = FallingBlock::new(mesh, tex, Vec3::new(0.0, 10.0, 0.0));
        let mut ctx = UpdateContext::new(0.0, Vec3::ZERO);
        let alive = block.update(&mut ctx, 0.5, Mat4::IDENTITY, Vec3::ZERO);
        assert!(alive);
        assert!(block.velocity.y < 0.0);
        assert!(block.node().transform.position.y < 10.0);
    }

    #[test]
    fn falling_block_rests_on_the_ground_plane() {
        let (mesh, tex) = handles();
        let mut block = FallingBlock::new(mesh, tex, Vec3::new(0.0, 2.0, 0.0));
        let mut ctx = UpdateContext::new(0.0, Vec3::ZERO);
        for _ in 0..600 {
            assert!(block.update(&mut ctx, 1.0 / 60.0, Mat4::IDENTITY, Vec3::ZERO));
        }
        assert!((block.node().transform.position.y - (-0.5)).abs() < 1e-4);
        assert_eq!(block.velocity.y, 0.0);
    }

    #[test]
    fn falling_block_despawns_below_the_kill_plane() {
        // Outside the ground extent there is nothing to land on.
        let (mesh, tex) = handles();
        let mut block = FallingBlock::new(mesh, tex, Vec3::new(80.0, 5.0, 0.0));
        let mut ctx = UpdateContext::new(0.0, Vec3::ZERO);
        let mut alive = true;
        for _ in 0..1200 {
            alive = block.update(&mut ctx, 1.0 / 60.0, Mat4::IDENTITY, Vec3::ZERO);
            if !alive {
                break;
            }
        }
        assert!(!alive);
        assert!(block.node().transform.position.y < KILL_PLANE_Y);
    }

    #[test]
    fn overlapping_spheres_push_apart() {
        let (mesh, tex) = handles();
        let mut block = FallingBlock::new(mesh, tex, Vec3::new(0.3, 0.0, 0.0));
        block.node_mut().generate_world_matrix(Mat4::IDENTITY);
        block.velocity = Vec3::new(-1.0, 0.0, 0.0);

        let mut colliders = Colliders::default();
        colliders.push(Collider {
            id: Node::new().id(),
            position: Vec3::ZERO,
            radius: 0.5,
        });
        block.check_collisions(&colliders, 1.0 / 60.0);

        // Pushed out to exactly touching and no longer moving into contact.
        assert!((block.node().transform.position.x - 1.0).abs() < 1e-5);
        assert!(block.velocity.x >= 0.0);
    }

    #[test]
    fn collision_snapshot_excludes_self() {
        let (mesh, tex) = handles();
        let mut block = FallingBlock::new(mesh, tex, Vec3::ZERO);
        block.node_mut().generate_world_matrix(Mat4::IDENTITY);
        let start = block.node().transform.position;

        let mut colliders = Colliders::default();
        colliders.push(Collider {
            id: block.node().id(),
            position: block.node().world_position(),
            radius: BLOCK_RADIUS,
        });
        block.check_collisions(&colliders, 1.0 / 60.0);
        assert_eq!(block.node().transform.position, start);
    }

    #[test]
    fn keyframed_mesh_follows_its_track() {
        let (mesh, tex) = handles();
        let track = KeyframeTrack::new(vec![
            crate::scene::keyframe::Keyframe::new(0.0, Vec3::ZERO),
            crate::scene::keyframe::Keyframe::new(1.0, Vec3::new(10.0, 0.0, 0.0)),
        ]);
        let mut object = MeshObject::new(mesh, tex).with_track(track);
        let mut ctx = UpdateContext::new(0.0, Vec3::ZERO);
        object.update(&mut ctx, 0.5, Mat4::IDENTITY, Vec3::ZERO);
        let x = object.node().transform.position.x;
        assert!(x > 0.0 && x < 10.0);
    }

    #[test]
    fn scattered_instances_draw_extra_models() {
        let (mesh, tex) = handles();
        let mut rng = SmallRng::seed_from_u64(7);
        let mut object = MeshObject::new(mesh, tex).scattered(5, 20.0, &mut rng);
        object.node_mut().generate_world_matrix(Mat4::IDENTITY);
        assert_eq!(object.models().count(), 6);
    }
}
