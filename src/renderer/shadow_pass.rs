use std::collections::HashMap;
use std::mem;
use std::num::NonZeroU64;

use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use wgpu::util::DeviceExt;

use crate::asset::{Assets, Handle, Mesh};
use crate::renderer::compositor::ShadowBackend;
use crate::renderer::shadows::{
    point_shadow_transforms, ShadowPlan, MAX_POINT_SHADOW_MAPS, MAX_SHADOW_MAPS,
    POINT_SHADOW_FACE_COUNT,
};
use crate::renderer::vertex::Vertex;
use crate::scene::light::Light;
use crate::scene::Scene;

const POINT_SHADOW_LAYERS: u32 = (MAX_POINT_SHADOW_MAPS * POINT_SHADOW_FACE_COUNT) as u32;
const INITIAL_MODELS_CAPACITY: u32 = 256;

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct ShadowViewUniform {
    view_proj: [[f32; 4]; 4],
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct ModelData {
    model: [[f32; 4]; 4],
}

/// Depth texture array with one view per layer for rendering and an array
/// view for sampling in a lit pass.
struct ShadowArray {
    _texture: wgpu::Texture,
    array_view: wgpu::TextureView,
    layer_views: Vec<wgpu::TextureView>,
}

impl ShadowArray {
    fn new(device: &wgpu::Device, label: &str, layers: u32, size: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: size,
                height: size,
                depth_or_array_layers: layers.max(1),
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Depth32Float,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });

        let array_view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(&format!("{label}ArrayView")),
            format: Some(wgpu::TextureFormat::Depth32Float),
            dimension: Some(wgpu::TextureViewDimension::D2Array),
            aspect: wgpu::TextureAspect::All,
            base_mip_level: 0,
            mip_level_count: None,
            base_array_layer: 0,
            array_layer_count: Some(layers.max(1)),
            ..Default::default()
        });

        let mut layer_views = Vec::with_capacity(layers.max(1) as usize);
        for layer in 0..layers.max(1) {
            layer_views.push(texture.create_view(&wgpu::TextureViewDescriptor {
                label: Some(&format!("{label}Layer{layer}")),
                format: Some(wgpu::TextureFormat::Depth32Float),
                dimension: Some(wgpu::TextureViewDimension::D2),
                aspect: wgpu::TextureAspect::All,
                base_mip_level: 0,
                mip_level_count: None,
                base_array_layer: layer,
                array_layer_count: Some(1),
                ..Default::default()
            }));
        }

        Self {
            _texture: texture,
            array_view,
            layer_views,
        }
    }

    fn layer_view(&self, index: usize) -> &wgpu::TextureView {
        &self.layer_views[index.min(self.layer_views.len() - 1)]
    }

    fn array_view(&self) -> &wgpu::TextureView {
        &self.array_view
    }
}

/// Vertex/index buffers for one uploaded mesh.
struct GpuMesh {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
}

/// Collects (mesh, model) pairs from the object tree's shadow hooks.
/// Rebuilt each frame and replayed once per shadow map.
#[derive(Default)]
pub struct ShadowDrawList {
    draws: Vec<(Handle<Mesh>, Mat4)>,
}

impl ShadowDrawList {
    pub fn clear(&mut self) {
        self.draws.clear();
    }

    pub fn len(&self) -> usize {
        self.draws.len()
    }

    pub fn is_empty(&self) -> bool {
        self.draws.is_empty()
    }
}

impl ShadowBackend for ShadowDrawList {
    fn draw_shadow(&mut self, mesh: Handle<Mesh>, model: Mat4) {
        self.draws.push((mesh, model));
    }
}

/// GPU resources for the depth-only shadow pass: the 2D slot array, the
/// point cubemap array, the compare sampler and the caster pipeline.
pub struct ShadowPass {
    maps: ShadowArray,
    point_maps: ShadowArray,
    sampler: wgpu::Sampler,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    staging_buffer: wgpu::Buffer,
    pipeline: wgpu::RenderPipeline,
    models_buf: wgpu::Buffer,
    models_capacity: u32,
    models_bind_group: wgpu::BindGroup,
    models_bind_layout: wgpu::BindGroupLayout,
    meshes: HashMap<Handle<Mesh>, GpuMesh>,
}

impl ShadowPass {
    pub fn new(device: &wgpu::Device, map_size: u32, point_map_size: u32) -> Self {
        let maps = ShadowArray::new(device, "ShadowMap", MAX_SHADOW_MAPS as u32, map_size);
        let point_maps =
            ShadowArray::new(device, "PointShadowMap", POINT_SHADOW_LAYERS, point_map_size);

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("ShadowSampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            compare: Some(wgpu::CompareFunction::LessEqual),
            lod_min_clamp: 0.0,
            lod_max_clamp: 1.0,
            ..Default::default()
        });

        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("ShadowUniformLayout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: NonZeroU64::new(
                        mem::size_of::<ShadowViewUniform>() as u64
                    ),
                },
                count: None,
            }],
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("ShadowUniformBuffer"),
            size: mem::size_of::<ShadowViewUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        // One staging slot per shadow map, point faces included.
        let max_shadows =
            (MAX_SHADOW_MAPS + MAX_POINT_SHADOW_MAPS * POINT_SHADOW_FACE_COUNT) as u64;
        let staging_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("ShadowStagingBuffer"),
            size: mem::size_of::<ShadowViewUniform>() as u64 * max_shadows,
            usage: wgpu::BufferUsages::COPY_SRC | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("ShadowUniformBindGroup"),
            layout: &uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let models_bind_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("ShadowModelsBindLayout"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: true },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
            });

        let models_capacity = INITIAL_MODELS_CAPACITY;
        let models_buf = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("ShadowModelsBuffer"),
            size: (models_capacity as usize * mem::size_of::<ModelData>()) as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let models_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("ShadowModelsBindGroup"),
            layout: &models_bind_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: models_buf.as_entire_binding(),
            }],
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("ShadowShader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../shader/shadow.wgsl").into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("ShadowPipelineLayout"),
            bind_group_layouts: &[&uniform_layout, &models_bind_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("ShadowPipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[Vertex::layout()],
                compilation_options: Default::default(),
            },
            fragment: None,
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: Some(wgpu::Face::Back),
                front_face: wgpu::FrontFace::Ccw,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: wgpu::TextureFormat::Depth32Float,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::LessEqual,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState {
                    constant: 2,
                    slope_scale: 2.0,
                    clamp: 0.0,
                },
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Self {
            maps,
            point_maps,
            sampler,
            uniform_buffer,
            uniform_bind_group,
            staging_buffer,
            pipeline,
            models_buf,
            models_capacity,
            models_bind_group,
            models_bind_layout,
            meshes: HashMap::new(),
        }
    }

    pub fn map_array_view(&self) -> &wgpu::TextureView {
        self.maps.array_view()
    }

    pub fn point_map_array_view(&self) -> &wgpu::TextureView {
        self.point_maps.array_view()
    }

    pub fn sampler(&self) -> &wgpu::Sampler {
        &self.sampler
    }

    /// Renders every shadow map the plan assigned: one pass per 2D slot,
    /// six passes per point slot. Draws come from the scene's shadow hooks.
    pub fn render(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        assets: &Assets,
        scene: &Scene,
        draws: &ShadowDrawList,
    ) {
        if draws.is_empty() {
            return;
        }

        self.upload_models(device, queue, draws);
        for (mesh, _) in &draws.draws {
            self.ensure_mesh(device, assets, *mesh);
        }

        let plan = *scene.shadow_plan();
        let active = scene.active_lights();
        let uniform_size = mem::size_of::<ShadowViewUniform>() as u64;

        // Stage all view-proj matrices up front, then copy one per pass.
        let mut staging_offset = 0u64;
        for slot in 0..plan.map_count {
            let uniform = ShadowViewUniform {
                view_proj: plan.light_space[slot].to_cols_array_2d(),
            };
            queue.write_buffer(
                &self.staging_buffer,
                staging_offset,
                bytemuck::bytes_of(&uniform),
            );
            staging_offset += uniform_size;
        }
        let point_start_offset = staging_offset;
        for slot in 0..plan.point_map_count {
            let Some(light) = point_caster(&active, &plan, slot) else {
                continue;
            };
            let faces = point_shadow_transforms(light.position, plan.point_far_planes[slot]);
            for face in faces {
                let uniform = ShadowViewUniform {
                    view_proj: face.to_cols_array_2d(),
                };
                queue.write_buffer(
                    &self.staging_buffer,
                    staging_offset,
                    bytemuck::bytes_of(&uniform),
                );
                staging_offset += uniform_size;
            }
        }

        staging_offset = 0;
        for slot in 0..plan.map_count {
            encoder.copy_buffer_to_buffer(
                &self.staging_buffer,
                staging_offset,
                &self.uniform_buffer,
                0,
                uniform_size,
            );
            self.render_pass(encoder, self.maps.layer_view(slot), draws);
            staging_offset += uniform_size;
        }

        staging_offset = point_start_offset;
        for slot in 0..plan.point_map_count {
            if point_caster(&active, &plan, slot).is_none() {
                continue;
            }
            for face in 0..POINT_SHADOW_FACE_COUNT {
                encoder.copy_buffer_to_buffer(
                    &self.staging_buffer,
                    staging_offset,
                    &self.uniform_buffer,
                    0,
                    uniform_size,
                );
                let layer = slot * POINT_SHADOW_FACE_COUNT + face;
                self.render_pass(encoder, self.point_maps.layer_view(layer), draws);
                staging_offset += uniform_size;
            }
        }
    }

    fn upload_models(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, draws: &ShadowDrawList) {
        let models: Vec<ModelData> = draws
            .draws
            .iter()
            .map(|(_, model)| ModelData {
                model: model.to_cols_array_2d(),
            })
            .collect();

        let required = models.len() as u32;
        if required > self.models_capacity {
            let new_capacity = required.max(self.models_capacity * 2);
            log::info!(
                "Growing shadow models buffer: {} -> {}",
                self.models_capacity,
                new_capacity
            );
            self.models_buf = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("ShadowModelsBuffer"),
                size: (new_capacity as usize * mem::size_of::<ModelData>())
                    as wgpu::BufferAddress,
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            self.models_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("ShadowModelsBindGroup"),
                layout: &self.models_bind_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.models_buf.as_entire_binding(),
                }],
            });
            self.models_capacity = new_capacity;
        }

        if !models.is_empty() {
            queue.write_buffer(&self.models_buf, 0, bytemuck::cast_slice(&models));
        }
    }

    fn ensure_mesh(&mut self, device: &wgpu::Device, assets: &Assets, handle: Handle<Mesh>) {
        if self.meshes.contains_key(&handle) {
            return;
        }
        let Some(mesh) = assets.meshes.get(handle) else {
            log::warn!("Skipping shadow draw with invalid mesh handle");
            return;
        };
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("MeshVertexBuffer"),
            contents: bytemuck::cast_slice(&mesh.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("MeshIndexBuffer"),
            contents: bytemuck::cast_slice(&mesh.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        self.meshes.insert(
            handle,
            GpuMesh {
                vertex_buffer,
                index_buffer,
                index_count: mesh.index_count(),
            },
        );
    }

    fn render_pass(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        view: &wgpu::TextureView,
        draws: &ShadowDrawList,
    ) {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("ShadowPass"),
            color_attachments: &[],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.uniform_bind_group, &[]);
        pass.set_bind_group(1, &self.models_bind_group, &[]);

        for (index, (handle, _)) in draws.draws.iter().enumerate() {
            let Some(mesh) = self.meshes.get(handle) else {
                continue;
            };
            let instance = index as u32;
            pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
            pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..mesh.index_count, 0, instance..instance + 1);
        }
    }
}

fn point_caster<'a>(active: &[&'a Light], plan: &ShadowPlan, slot: usize) -> Option<&'a Light> {
    let index = plan.point_caster_indices[slot];
    if index < 0 {
        return None;
    }
    active.get(index as usize).copied()
}
