use glam::{Mat4, Vec3};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use wgpu_stage::renderer::compositor::DrawEvent;
use wgpu_stage::scene::keyframe::{Keyframe, KeyframeTrack};
use wgpu_stage::scene::object::{Node, Object, UpdateContext};
use wgpu_stage::{
    Assets, FallingBlock, Gpu, Group, Light, Mesh, MeshObject, RecordingBackend, RenderSettings,
    Scene, ShadowDrawList, ShadowPass, Texture,
};

const DT: f32 = 1.0 / 60.0;

/// Drops a fresh falling block at a random spot every couple of seconds.
struct BlockSpawner {
    node: Node,
    rng: SmallRng,
    cooldown: f32,
    mesh: wgpu_stage::Handle<Mesh>,
    texture: wgpu_stage::Handle<Texture>,
}

impl Object for BlockSpawner {
    fn node(&self) -> &Node {
        &self.node
    }

    fn node_mut(&mut self) -> &mut Node {
        &mut self.node
    }

    fn update(
        &mut self,
        ctx: &mut UpdateContext,
        dt: f32,
        parent_matrix: Mat4,
        _parent_rotation: Vec3,
    ) -> bool {
        self.node.generate_world_matrix(parent_matrix);
        self.cooldown -= dt;
        if self.cooldown <= 0.0 {
            self.cooldown = 2.0;
            let x = self.rng.gen_range(-10.0..10.0);
            let z = self.rng.gen_range(-10.0..10.0);
            ctx.spawn(Box::new(FallingBlock::new(
                self.mesh,
                self.texture,
                Vec3::new(x, 15.0, z),
            )));
        }
        true
    }
}

fn solid_texture(rgba: [u8; 4]) -> Texture {
    Texture {
        width: 1,
        height: 1,
        pixels: rgba.to_vec(),
    }
}

fn build_scene(scene: &mut Scene, assets: &mut Assets) -> Option<()> {
    let cube = assets.mesh("meshes/cube")?;
    let plane = assets.mesh("meshes/plane")?;
    let stone = assets.texture("textures/stone")?;
    let glass = assets.texture("textures/glass")?;

    // Ground.
    let mut ground = MeshObject::new(plane, stone);
    ground.node_mut().transform.position = Vec3::new(0.0, -1.0, 0.0);
    ground.node_mut().transform.scale = Vec3::splat(100.0);
    scene.add(Box::new(ground));

    // A grouped arrangement with a transparent child pane.
    let mut pedestal = Group::at(Vec3::new(-6.0, 0.0, -4.0));
    let mut block = MeshObject::new(cube, stone);
    block.node_mut().transform.scale = Vec3::splat(2.0);
    let mut pane = MeshObject::new(cube, glass).transparent();
    pane.node_mut().transform.position = Vec3::new(0.0, 3.0, 0.0);
    block.node_mut().add_child(Box::new(pane));
    pedestal.node_mut().add_child(Box::new(block));
    scene.add(Box::new(pedestal));

    // A prop riding a looping keyframe track.
    let track = KeyframeTrack::looping(vec![
        Keyframe::new(0.0, Vec3::new(5.0, 1.0, 5.0)),
        Keyframe::eased(3.0, Vec3::new(5.0, 1.0, -5.0), Vec3::new(0.0, 180.0, 0.0)),
        Keyframe::eased(3.0, Vec3::new(5.0, 1.0, 5.0), Vec3::new(0.0, 360.0, 0.0)),
    ]);
    scene.add(Box::new(MeshObject::new(cube, stone).with_track(track)));

    // A scattered field of small rocks.
    let mut rng = SmallRng::seed_from_u64(42);
    let mut rocks = MeshObject::new(cube, stone).scattered(24, 30.0, &mut rng);
    rocks.node_mut().transform.position = Vec3::new(0.0, -0.75, 0.0);
    rocks.node_mut().transform.scale = Vec3::splat(0.5);
    scene.add(Box::new(rocks));

    scene.add(Box::new(BlockSpawner {
        node: Node::new(),
        rng: SmallRng::seed_from_u64(7),
        cooldown: 1.0,
        mesh: cube,
        texture: stone,
    }));

    // Lighting rig: a high directional sun plus three local lights.
    let sun_position = Vec3::new(20.0, 50.0, 0.0);
    let mut sun = Light::aimed(
        Vec3::ONE,
        -sun_position.normalize(),
        0.0,
        0.0,
        1.0,
        0.0,
        0.0,
        500.0,
    );
    sun.position = sun_position;
    scene.set_main_light(sun);

    let mut warm = Light::point(Vec3::new(1.0, 0.6, 0.3), 1.0, 0.09, 0.032, 40.0);
    warm.position = Vec3::new(-6.0, 4.0, -4.0);
    scene.add_light(warm);

    let mut spot = Light::aimed(
        Vec3::new(1.0, 0.0, 1.0),
        Vec3::new(0.0, -1.0, 0.0),
        15.0,
        18.0,
        1.0,
        0.09,
        0.032,
        30.0,
    );
    spot.position = Vec3::new(5.0, 8.0, 0.0);
    scene.add_light(spot);

    let mut green = Light::point(Vec3::new(0.2, 1.0, 0.3), 1.0, 0.14, 0.07, 25.0);
    green.position = Vec3::new(8.0, 2.0, 8.0);
    scene.add_light(green);

    scene.camera.position = Vec3::new(0.0, 8.0, 22.0);
    scene.camera.tilt = -15.0;

    Some(())
}

fn main() {
    wgpu_stage::init_logging();
    let settings = RenderSettings::load();

    let mut assets = Assets::new();
    assets.set_mesh_provider(|path| match path {
        "meshes/cube" => Some(Mesh::cube()),
        "meshes/plane" => Some(Mesh::plane()),
        _ => None,
    });
    assets.set_texture_provider(|path| match path {
        "textures/stone" => Some(solid_texture([160, 150, 140, 255])),
        "textures/glass" => Some(solid_texture([120, 180, 220, 120])),
        _ => None,
    });

    let mut scene = Scene::new();
    if build_scene(&mut scene, &mut assets).is_none() {
        log::error!("Scene assets unavailable, nothing to render");
        return;
    }

    let gpu = Gpu::new_blocking();
    let mut shadow_pass = match &gpu {
        Ok(gpu) => Some(ShadowPass::new(
            &gpu.device,
            settings.shadow_map_size,
            settings.point_shadow_map_size,
        )),
        Err(err) => {
            log::warn!("No GPU available, skipping shadow map rendering: {err}");
            None
        }
    };

    log::info!("Running {} frames", settings.frame_count);
    for frame in 0..settings.frame_count {
        scene.update(DT);

        let uniforms = scene.frame_uniforms();
        let mut backend = RecordingBackend::default();
        scene.render(&uniforms, &mut backend);

        let mut shadow_draws = ShadowDrawList::default();
        scene.render_for_shadow(&mut shadow_draws);

        if let (Ok(gpu), Some(pass)) = (&gpu, shadow_pass.as_mut()) {
            let mut encoder = gpu
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("ShadowEncoder"),
                });
            pass.render(
                &gpu.device,
                &gpu.queue,
                &mut encoder,
                &assets,
                &scene,
                &shadow_draws,
            );
            gpu.queue.submit(Some(encoder.finish()));
        }

        if frame % 60 == 0 {
            let draw_calls = backend
                .events
                .iter()
                .filter(|e| matches!(e, DrawEvent::Draw(_)))
                .count();
            let plan = scene.shadow_plan();
            log::info!(
                "frame {frame}: {} roots, {draw_calls} draws, {} shadow maps + {} point casters, {} shadow draws",
                scene.roots().len(),
                plan.map_count,
                plan.point_map_count,
                shadow_draws.len(),
            );
        }
    }

    scene.close();
    log::info!("Done");
}
