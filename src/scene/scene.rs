use glam::{Mat4, Vec3};

use crate::renderer::compositor::{self, DrawBackend, FrameUniforms, ShadowBackend};
use crate::renderer::lights::LightsUniform;
use crate::renderer::shadows::{ShadowPlan, ShadowUniform};
use crate::scene::camera::Camera;
use crate::scene::light::Light;
use crate::scene::object::{Collider, Colliders, Object, UpdateContext};

/// The object tree plus everything frame-scoped around it: the camera, the
/// owned lights and the per-frame shadow caster plan.
pub struct Scene {
    pub camera: Camera,
    roots: Vec<Box<dyn Object>>,
    main_light: Option<Light>,
    lights: Vec<Light>,
    shadow_plan: ShadowPlan,
    time: f32,
}

impl Scene {
    pub fn new() -> Self {
        Self {
            camera: Camera::default(),
            roots: Vec::new(),
            main_light: None,
            lights: Vec::new(),
            shadow_plan: ShadowPlan::default(),
            time: 0.0,
        }
    }

    pub fn add(&mut self, object: Box<dyn Object>) {
        self.roots.push(object);
    }

    pub fn roots(&self) -> &[Box<dyn Object>] {
        &self.roots
    }

    pub fn roots_mut(&mut self) -> &mut Vec<Box<dyn Object>> {
        &mut self.roots
    }

    /// The light that anchors the lighting rig. Always first in the active
    /// list, so it wins a shadow slot before any secondary light.
    pub fn set_main_light(&mut self, light: Light) {
        self.main_light = Some(light);
    }

    pub fn main_light_mut(&mut self) -> Option<&mut Light> {
        self.main_light.as_mut()
    }

    pub fn add_light(&mut self, light: Light) {
        self.lights.push(light);
    }

    pub fn lights_mut(&mut self) -> &mut Vec<Light> {
        &mut self.lights
    }

    /// Main light first, then secondary lights in registration order. This
    /// ordering is what shadow slot and shader light indices refer to.
    pub fn active_lights(&self) -> Vec<&Light> {
        self.main_light.iter().chain(self.lights.iter()).collect()
    }

    pub fn shadow_plan(&self) -> &ShadowPlan {
        &self.shadow_plan
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    /// Runs one frame of simulation:
    /// camera, collision snapshot and hooks, the update traversal (which
    /// recomputes every world matrix top-down), deferred removal, spawn
    /// adoption, and finally the shadow caster plan.
    pub fn update(&mut self, dt: f32) {
        self.time += dt;
        self.camera.update(dt);

        // Collision hooks see last frame's world positions, snapshotted so
        // every hook observes the same state.
        let colliders = self.collect_colliders();
        for root in &mut self.roots {
            run_collision_hooks(root.as_mut(), &colliders, dt);
        }

        let mut ctx = UpdateContext::new(self.time, self.camera.position);
        for root in &mut self.roots {
            update_subtree(root.as_mut(), &mut ctx, dt, Mat4::IDENTITY, Vec3::ZERO);
        }

        // Removal is deferred to here so a death mid-traversal never shifts
        // the objects still being visited.
        prune(&mut self.roots);

        // Spawned objects missed the traversal; give them world matrices now
        // so the first render and the next collision snapshot see them where
        // they were spawned.
        let mut spawned = ctx.take_spawned();
        for object in &mut spawned {
            refresh_world_matrices(object.as_mut(), Mat4::IDENTITY);
        }
        self.roots.append(&mut spawned);

        self.refresh_shadow_plan();
    }

    /// Rebuilds the shadow caster assignment from the current lights. Also
    /// called by `update`; exposed for callers that mutate lights between
    /// frames.
    pub fn refresh_shadow_plan(&mut self) {
        self.shadow_plan = ShadowPlan::build(&self.active_lights());
    }

    pub fn frame_uniforms(&self) -> FrameUniforms {
        FrameUniforms {
            view: self.camera.view_matrix,
            projection: self.camera.projection_matrix,
            camera_position: self.camera.position,
            lights: LightsUniform::from_lights(&self.active_lights(), self.camera.position),
            shadows: ShadowUniform::from_plan(&self.shadow_plan),
        }
    }

    /// Lit color pass over the whole tree.
    pub fn render(&self, frame: &FrameUniforms, backend: &mut dyn DrawBackend) {
        compositor::compose(&self.roots, frame, backend);
    }

    /// Depth-only pass for one shadow map.
    pub fn render_for_shadow(&self, backend: &mut dyn ShadowBackend) {
        compositor::compose_shadow(&self.roots, backend);
    }

    /// Drops all objects and lights. The camera keeps its settings.
    pub fn close(&mut self) {
        self.roots.clear();
        self.main_light = None;
        self.lights.clear();
        self.shadow_plan = ShadowPlan::default();
    }

    fn collect_colliders(&self) -> Colliders {
        fn visit(object: &dyn Object, out: &mut Colliders) {
            let node = object.node();
            if node.radius > 0.0 {
                out.push(Collider {
                    id: node.id(),
                    position: node.world_position(),
                    radius: node.radius,
                });
            }
            for child in node.children() {
                visit(child.as_ref(), out);
            }
        }
        let mut out = Colliders::default();
        for root in &self.roots {
            visit(root.as_ref(), &mut out);
        }
        out
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

fn run_collision_hooks(object: &mut dyn Object, colliders: &Colliders, dt: f32) {
    object.check_collisions(colliders, dt);
    for child in object.node_mut().children_mut() {
        run_collision_hooks(child.as_mut(), colliders, dt);
    }
}

fn update_subtree(
    object: &mut dyn Object,
    ctx: &mut UpdateContext,
    dt: f32,
    parent_matrix: Mat4,
    parent_rotation: Vec3,
) {
    let alive = object.update(ctx, dt, parent_matrix, parent_rotation);
    object.node_mut().alive = alive;

    let world = object.node().world_matrix;
    let rotation = parent_rotation + object.node().transform.rotation;
    for child in object.node_mut().children_mut() {
        update_subtree(child.as_mut(), ctx, dt, world, rotation);
    }
}

fn refresh_world_matrices(object: &mut dyn Object, parent: Mat4) {
    object.node_mut().generate_world_matrix(parent);
    let world = object.node().world_matrix;
    for child in object.node_mut().children_mut() {
        refresh_world_matrices(child.as_mut(), world);
    }
}

/// Drops objects whose update returned false, recursively. A dead parent
/// takes its whole subtree with it.
fn prune(objects: &mut Vec<Box<dyn Object>>) {
    objects.retain(|o| o.node().alive);
    for object in objects {
        prune(object.node_mut().children_mut());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::Handle;
    use crate::renderer::compositor::RecordingBackend;
    use crate::scene::object::Node;
    use crate::scene::objects::FallingBlock;

    struct Countdown {
        node: Node,
        frames_left: u32,
    }

    impl Countdown {
        fn boxed(frames_left: u32) -> Box<dyn Object> {
            Box::new(Self {
                node: Node::new(),
                frames_left,
            })
        }
    }

    impl Object for Countdown {
        fn node(&self) -> &Node {
            &self.node
        }
        fn node_mut(&mut self) -> &mut Node {
            &mut self.node
        }
        fn update(
            &mut self,
            _ctx: &mut UpdateContext,
            _dt: f32,
            parent_matrix: Mat4,
            _parent_rotation: Vec3,
        ) -> bool {
            self.node.generate_world_matrix(parent_matrix);
            if self.frames_left == 0 {
                return false;
            }
            self.frames_left -= 1;
            true
        }
    }

    struct Spawner {
        node: Node,
        spawned: bool,
    }

    impl Object for Spawner {
        fn node(&self) -> &Node {
            &self.node
        }
        fn node_mut(&mut self) -> &mut Node {
            &mut self.node
        }
        fn update(
            &mut self,
            ctx: &mut UpdateContext,
            _dt: f32,
            parent_matrix: Mat4,
            _parent_rotation: Vec3,
        ) -> bool {
            self.node.generate_world_matrix(parent_matrix);
            if !self.spawned {
                self.spawned = true;
                ctx.spawn(Countdown::boxed(10));
            }
            true
        }
    }

    fn directional() -> Light {
        Light::aimed(Vec3::ONE, Vec3::NEG_Y, 0.0, 0.0, 1.0, 0.0, 0.0, 500.0)
    }

    fn point() -> Light {
        Light::point(Vec3::ONE, 1.0, 0.09, 0.032, 25.0)
    }

    #[test]
    fn dead_objects_are_removed_after_the_traversal() {
        let mut scene = Scene::new();
        scene.add(Countdown::boxed(0));
        scene.add(Countdown::boxed(5));
        scene.update(1.0 / 60.0);
        assert_eq!(scene.roots().len(), 1);
        scene.update(1.0 / 60.0);
        assert_eq!(scene.roots().len(), 1);
    }

    #[test]
    fn dead_parent_removes_its_subtree() {
        let mut scene = Scene::new();
        let mut parent = Countdown {
            node: Node::new(),
            frames_left: 0,
        };
        parent.node.add_child(Countdown::boxed(100));
        scene.add(Box::new(parent));
        scene.update(1.0 / 60.0);
        assert!(scene.roots().is_empty());
    }

    struct BlockDropper {
        node: Node,
        spawned: bool,
    }

    impl Object for BlockDropper {
        fn node(&self) -> &Node {
            &self.node
        }
        fn node_mut(&mut self) -> &mut Node {
            &mut self.node
        }
        fn update(
            &mut self,
            ctx: &mut UpdateContext,
            _dt: f32,
            parent_matrix: Mat4,
            _parent_rotation: Vec3,
        ) -> bool {
            self.node.generate_world_matrix(parent_matrix);
            if !self.spawned {
                self.spawned = true;
                ctx.spawn(Box::new(FallingBlock::new(
                    Handle::new(0),
                    Handle::new(0),
                    Vec3::new(7.0, 15.0, 0.0),
                )));
            }
            true
        }
    }

    #[test]
    fn spawned_objects_render_where_they_were_spawned() {
        let mut scene = Scene::new();
        scene.add(Box::new(BlockDropper {
            node: Node::new(),
            spawned: false,
        }));
        scene.update(1.0 / 60.0);
        assert_eq!(scene.roots().len(), 2);

        // World matrix is valid before the object's first own update, so the
        // first render and the next collision snapshot see the spawn point.
        let spawn_point = Vec3::new(7.0, 15.0, 0.0);
        assert!(scene.roots()[1]
            .node()
            .world_position()
            .abs_diff_eq(spawn_point, 1e-6));

        let frame = scene.frame_uniforms();
        let mut backend = RecordingBackend::default();
        scene.render(&frame, &mut backend);
        let models = backend.drawn_models();
        assert_eq!(models.len(), 1);
        assert!(models[0].w_axis.truncate().abs_diff_eq(spawn_point, 1e-6));
    }

    #[test]
    fn spawned_objects_join_as_roots_after_the_frame() {
        let mut scene = Scene::new();
        scene.add(Box::new(Spawner {
            node: Node::new(),
            spawned: false,
        }));
        scene.update(1.0 / 60.0);
        assert_eq!(scene.roots().len(), 2);
        scene.update(1.0 / 60.0);
        assert_eq!(scene.roots().len(), 2);
    }

    #[test]
    fn world_matrices_compose_through_nesting() {
        let mut scene = Scene::new();
        let mut parent = Countdown {
            node: Node::new(),
            frames_left: 100,
        };
        parent.node.transform.position = Vec3::new(5.0, 0.0, 0.0);
        let mut child = Countdown {
            node: Node::new(),
            frames_left: 100,
        };
        child.node.transform.position = Vec3::new(0.0, 3.0, 0.0);
        parent.node.add_child(Box::new(child));
        scene.add(Box::new(parent));

        scene.update(1.0 / 60.0);
        let root = &scene.roots()[0];
        assert!(root
            .node()
            .world_position()
            .abs_diff_eq(Vec3::new(5.0, 0.0, 0.0), 1e-6));
        assert!(root.node().children()[0]
            .node()
            .world_position()
            .abs_diff_eq(Vec3::new(5.0, 3.0, 0.0), 1e-6));
    }

    #[test]
    fn main_light_is_always_first() {
        let mut scene = Scene::new();
        scene.add_light(point());
        scene.set_main_light(directional());
        let active = scene.active_lights();
        assert_eq!(active.len(), 2);
        assert!(!active[0].is_point());
        assert!(active[1].is_point());
    }

    #[test]
    fn shadow_plan_tracks_the_lights() {
        let mut scene = Scene::new();
        scene.set_main_light(directional());
        scene.add_light(point());
        scene.add_light(point());
        scene.add_light(point());
        scene.update(1.0 / 60.0);

        let plan = scene.shadow_plan();
        assert_eq!(plan.map_count, 1);
        assert_eq!(plan.caster_indices[0], 0);
        assert_eq!(plan.point_map_count, 2);
        assert_eq!(plan.point_caster_indices, [1, 2]);
    }

    #[test]
    fn close_empties_the_scene() {
        let mut scene = Scene::new();
        scene.add(Countdown::boxed(5));
        scene.set_main_light(directional());
        scene.update(1.0 / 60.0);
        scene.close();
        assert!(scene.roots().is_empty());
        assert!(scene.active_lights().is_empty());
        assert_eq!(scene.shadow_plan().map_count, 0);
    }
}
