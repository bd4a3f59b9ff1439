use glam::{Mat4, Vec2, Vec3};

use crate::asset::{Handle, Mesh, Texture};
use crate::renderer::lights::LightsUniform;
use crate::renderer::shadows::ShadowUniform;
use crate::scene::object::Object;

/// Everything the lit pass needs for one frame, assembled by the scene after
/// its update traversal and handed unchanged to every draw hook.
#[derive(Clone, Copy)]
pub struct FrameUniforms {
    pub view: Mat4,
    pub projection: Mat4,
    pub camera_position: Vec3,
    pub lights: LightsUniform,
    pub shadows: ShadowUniform,
}

/// One draw call's full state, carried as a single value so transparency and
/// texture animation can never be left over from the previous draw.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DrawParams {
    pub model: Mat4,
    pub mesh: Handle<Mesh>,
    pub texture: Handle<Texture>,
    pub transparent: bool,
    /// UV scroll offset for animated surfaces.
    pub texture_offset: Vec2,
}

impl DrawParams {
    pub fn opaque(model: Mat4, mesh: Handle<Mesh>, texture: Handle<Texture>) -> Self {
        Self {
            model,
            mesh,
            texture,
            transparent: false,
            texture_offset: Vec2::ZERO,
        }
    }
}

/// Sink for lit-pass draw calls. The compositor drives the pass structure;
/// objects only ever call [`DrawBackend::draw`] from their render hook.
pub trait DrawBackend {
    /// Depth writes on, blending off. Always called first, even when the
    /// frame has no opaque objects.
    fn begin_opaque_pass(&mut self);
    /// Source-alpha blending on, depth writes off. Only called when the
    /// frame has at least one transparent object.
    fn begin_transparent_pass(&mut self);
    /// Restores opaque-pass state.
    fn end_transparent_pass(&mut self);
    fn draw(&mut self, params: &DrawParams);
}

/// Sink for the depth-only shadow pass.
pub trait ShadowBackend {
    fn draw_shadow(&mut self, mesh: Handle<Mesh>, model: Mat4);
}

/// Draws the whole tree in two passes: opaque objects in traversal order
/// with full depth state, then transparent objects sorted far-to-near with
/// blending on and depth writes off. Transparency is read from each node's
/// own flag, so a transparent child under an opaque parent still lands in
/// the sorted pass.
pub fn compose(roots: &[Box<dyn Object>], frame: &FrameUniforms, backend: &mut dyn DrawBackend) {
    let mut opaque: Vec<&dyn Object> = Vec::new();
    let mut transparent: Vec<(f32, &dyn Object)> = Vec::new();
    for root in roots {
        partition(root.as_ref(), frame.camera_position, &mut opaque, &mut transparent);
    }

    backend.begin_opaque_pass();
    for object in &opaque {
        object.render(frame, backend);
    }

    if transparent.is_empty() {
        return;
    }

    // Back to front. Ties keep traversal order.
    transparent.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

    backend.begin_transparent_pass();
    for (_, object) in &transparent {
        object.render(frame, backend);
    }
    backend.end_transparent_pass();
}

fn partition<'a>(
    object: &'a dyn Object,
    camera: Vec3,
    opaque: &mut Vec<&'a dyn Object>,
    transparent: &mut Vec<(f32, &'a dyn Object)>,
) {
    let node = object.node();
    if node.transparent {
        let distance = node.world_position().distance(camera);
        transparent.push((distance, object));
    } else {
        opaque.push(object);
    }
    for child in node.children() {
        partition(child.as_ref(), camera, opaque, transparent);
    }
}

/// Walks the tree collecting depth-only draws for one shadow map.
pub fn compose_shadow(roots: &[Box<dyn Object>], backend: &mut dyn ShadowBackend) {
    fn visit(object: &dyn Object, backend: &mut dyn ShadowBackend) {
        object.render_for_shadow(backend);
        for child in object.node().children() {
            visit(child.as_ref(), backend);
        }
    }
    for root in roots {
        visit(root.as_ref(), backend);
    }
}

/// Backend that records the call sequence instead of touching a GPU. Used by
/// tests and the headless demo to assert pass structure and draw order.
#[derive(Default)]
pub struct RecordingBackend {
    pub events: Vec<DrawEvent>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DrawEvent {
    BeginOpaque,
    BeginTransparent,
    EndTransparent,
    Draw(DrawParams),
    Shadow { mesh: Handle<Mesh>, model: Mat4 },
}

impl RecordingBackend {
    pub fn drawn_models(&self) -> Vec<Mat4> {
        self.events
            .iter()
            .filter_map(|e| match e {
                DrawEvent::Draw(p) => Some(p.model),
                _ => None,
            })
            .collect()
    }
}

impl DrawBackend for RecordingBackend {
    fn begin_opaque_pass(&mut self) {
        self.events.push(DrawEvent::BeginOpaque);
    }

    fn begin_transparent_pass(&mut self) {
        self.events.push(DrawEvent::BeginTransparent);
    }

    fn end_transparent_pass(&mut self) {
        self.events.push(DrawEvent::EndTransparent);
    }

    fn draw(&mut self, params: &DrawParams) {
        self.events.push(DrawEvent::Draw(*params));
    }
}

impl ShadowBackend for RecordingBackend {
    fn draw_shadow(&mut self, mesh: Handle<Mesh>, model: Mat4) {
        self.events.push(DrawEvent::Shadow { mesh, model });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::object::Node;

    struct Quad {
        node: Node,
        mesh: Handle<Mesh>,
        texture: Handle<Texture>,
    }

    impl Quad {
        fn at(z: f32, transparent: bool) -> Box<dyn Object> {
            let mut node = Node::new();
            node.transparent = transparent;
            node.world_matrix = Mat4::from_translation(Vec3::new(0.0, 0.0, z));
            Box::new(Quad {
                node,
                mesh: Handle::new(0),
                texture: Handle::new(0),
            })
        }
    }

    impl Object for Quad {
        fn node(&self) -> &Node {
            &self.node
        }
        fn node_mut(&mut self) -> &mut Node {
            &mut self.node
        }
        fn render(&self, _frame: &FrameUniforms, backend: &mut dyn DrawBackend) {
            backend.draw(&DrawParams {
                model: self.node.world_matrix,
                mesh: self.mesh,
                texture: self.texture,
                transparent: self.node.transparent,
                texture_offset: Vec2::ZERO,
            });
        }
        fn render_for_shadow(&self, backend: &mut dyn ShadowBackend) {
            backend.draw_shadow(self.mesh, self.node.world_matrix);
        }
    }

    fn frame(camera: Vec3) -> FrameUniforms {
        FrameUniforms {
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            camera_position: camera,
            lights: LightsUniform::from_lights(&[], camera),
            shadows: ShadowUniform::from_plan(&Default::default()),
        }
    }

    fn drawn_z(backend: &RecordingBackend) -> Vec<f32> {
        backend
            .drawn_models()
            .iter()
            .map(|m| m.w_axis.z)
            .collect()
    }

    #[test]
    fn transparent_objects_sort_back_to_front() {
        let roots: Vec<Box<dyn Object>> = vec![
            Quad::at(1.0, true),
            Quad::at(5.0, true),
            Quad::at(3.0, true),
        ];
        let mut backend = RecordingBackend::default();
        compose(&roots, &frame(Vec3::ZERO), &mut backend);
        assert_eq!(drawn_z(&backend), vec![5.0, 3.0, 1.0]);
    }

    #[test]
    fn opaque_objects_keep_traversal_order() {
        let roots: Vec<Box<dyn Object>> = vec![
            Quad::at(4.0, false),
            Quad::at(-2.0, false),
            Quad::at(9.0, false),
        ];
        let mut backend = RecordingBackend::default();
        compose(&roots, &frame(Vec3::ZERO), &mut backend);
        assert_eq!(drawn_z(&backend), vec![4.0, -2.0, 9.0]);
        assert_eq!(backend.events[0], DrawEvent::BeginOpaque);
        assert!(!backend
            .events
            .iter()
            .any(|e| matches!(e, DrawEvent::BeginTransparent)));
    }

    #[test]
    fn transparent_child_of_opaque_parent_lands_in_sorted_pass() {
        let mut parent = Quad::at(2.0, false);
        parent.node_mut().add_child(Quad::at(7.0, true));
        let roots: Vec<Box<dyn Object>> = vec![parent, Quad::at(6.0, true)];

        let mut backend = RecordingBackend::default();
        compose(&roots, &frame(Vec3::ZERO), &mut backend);

        let begin_transparent = backend
            .events
            .iter()
            .position(|e| *e == DrawEvent::BeginTransparent)
            .unwrap();
        // Opaque parent first, then transparent draws sorted by distance.
        assert_eq!(drawn_z(&backend), vec![2.0, 7.0, 6.0]);
        assert_eq!(backend.events[0], DrawEvent::BeginOpaque);
        assert!(begin_transparent > 1);
        assert_eq!(*backend.events.last().unwrap(), DrawEvent::EndTransparent);
    }

    #[test]
    fn no_transparent_pass_without_transparent_objects() {
        let roots: Vec<Box<dyn Object>> = vec![Quad::at(0.0, false)];
        let mut backend = RecordingBackend::default();
        compose(&roots, &frame(Vec3::ZERO), &mut backend);
        assert!(!backend
            .events
            .iter()
            .any(|e| matches!(e, DrawEvent::BeginTransparent | DrawEvent::EndTransparent)));
    }

    #[test]
    fn distance_uses_camera_position() {
        // Camera sits at z=10, so z=9 is nearest and draws last.
        let roots: Vec<Box<dyn Object>> = vec![
            Quad::at(9.0, true),
            Quad::at(0.0, true),
            Quad::at(5.0, true),
        ];
        let mut backend = RecordingBackend::default();
        compose(&roots, &frame(Vec3::new(0.0, 0.0, 10.0)), &mut backend);
        assert_eq!(drawn_z(&backend), vec![0.0, 5.0, 9.0]);
    }

    #[test]
    fn shadow_composition_visits_children() {
        let mut parent = Quad::at(1.0, false);
        parent.node_mut().add_child(Quad::at(2.0, true));
        let roots: Vec<Box<dyn Object>> = vec![parent];

        let mut backend = RecordingBackend::default();
        compose_shadow(&roots, &mut backend);
        let shadows: Vec<f32> = backend
            .events
            .iter()
            .filter_map(|e| match e {
                DrawEvent::Shadow { model, .. } => Some(model.w_axis.z),
                _ => None,
            })
            .collect();
        assert_eq!(shadows, vec![1.0, 2.0]);
    }
}
