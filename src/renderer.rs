// src/renderer.rs
//! Forward renderer over the binding subsystem.
//!
//! One pipeline, three binding slots: group 0 is the draw's material
//! runtime, group 1 the node's transform runtime, group 2 the scene's
//! frame runtime. The slot indices are a contract with the shader; the
//! WGSL structs below mirror the schemas' declaration order, scalars
//! occupying a full vec4 lane like the uniform pack stores them.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::gpu::GpuContext;
use crate::material::MaterialLibrary;
use crate::resources::{Mesh, ResourceStore, Vertex};
use crate::scene::Scene;
use crate::schema::SchemaRegistry;

const SHADER: &str = r#"
struct Surface {
    color_factor: vec4<f32>,
    roughness: vec4<f32>,
};

struct NodeTransform {
    model: mat4x4<f32>,
};

struct Frame {
    view: mat4x4<f32>,
    projection: mat4x4<f32>,
    camera_position: vec4<f32>,
    light_direction: vec4<f32>,
};

@group(0) @binding(0) var<uniform> surface: Surface;
@group(0) @binding(1) var base_texture: texture_2d<f32>;
@group(0) @binding(2) var base_sampler: sampler;
@group(1) @binding(0) var<uniform> node: NodeTransform;
@group(2) @binding(0) var<uniform> frame: Frame;

struct VsIn {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
};

struct VsOut {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_normal: vec3<f32>,
    @location(1) uv: vec2<f32>,
    @location(2) world_position: vec3<f32>,
};

@vertex
fn vs_main(in: VsIn) -> VsOut {
    var out: VsOut;
    let world = node.model * vec4<f32>(in.position, 1.0);
    out.clip_position = frame.projection * frame.view * world;
    out.world_position = world.xyz;
    out.world_normal = normalize((node.model * vec4<f32>(in.normal, 0.0)).xyz);
    out.uv = in.uv;
    return out;
}

@fragment
fn fs_main(in: VsOut) -> @location(0) vec4<f32> {
    let albedo = textureSample(base_texture, base_sampler, in.uv) * surface.color_factor;
    let n = normalize(in.world_normal);
    let l = normalize(-frame.light_direction.xyz);
    let diffuse = max(dot(n, l), 0.0);
    let view_dir = normalize(frame.camera_position.xyz - in.world_position);
    let half_dir = normalize(l + view_dir);
    let gloss = 1.0 - clamp(surface.roughness.x, 0.0, 1.0);
    let specular = pow(max(dot(n, half_dir), 0.0), mix(4.0, 64.0, gloss)) * gloss;
    let ambient = 0.08;
    let lit = albedo.rgb * (ambient + diffuse) + vec3<f32>(specular);
    return vec4<f32>(lit, albedo.a);
}
"#;

struct DrawCall {
    material_set: Arc<wgpu::BindGroup>,
    node_set: Arc<wgpu::BindGroup>,
    mesh: Arc<Mesh>,
}

pub struct Renderer {
    pipeline: wgpu::RenderPipeline,
    material_layout: wgpu::BindGroupLayout,
    node_layout: wgpu::BindGroupLayout,
    scene_layout: wgpu::BindGroupLayout,
    depth_view: wgpu::TextureView,
    material_schema: String,
    node_schema: String,
    scene_schema: String,
    clear_color: wgpu::Color,
}

impl Renderer {
    /// Build the pipeline for one (material, node, scene) schema triple.
    /// Layout shapes are derived from the schemas' texture/sampler
    /// declarations, so the schemas must exist in the registry.
    pub fn new(
        gpu: &GpuContext,
        registry: &SchemaRegistry,
        surface_format: wgpu::TextureFormat,
        material_schema: &str,
        node_schema: &str,
        scene_schema: &str,
        width: u32,
        height: u32,
    ) -> Result<Self> {
        let material = registry.get(material_schema)?;
        let node = registry.get(node_schema)?;
        let scene = registry.get(scene_schema)?;

        let visibility = wgpu::ShaderStages::VERTEX_FRAGMENT;
        let material_layout = gpu.binding_layout(
            "material_bindings",
            visibility,
            material.texture_count(),
            material.sampler_count(),
        );
        let node_layout = gpu.binding_layout(
            "node_bindings",
            visibility,
            node.texture_count(),
            node.sampler_count(),
        );
        let scene_layout = gpu.binding_layout(
            "scene_bindings",
            visibility,
            scene.texture_count(),
            scene.sampler_count(),
        );

        let shader = gpu
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("scene_shader"),
                source: wgpu::ShaderSource::Wgsl(SHADER.into()),
            });

        let pipeline_layout = gpu
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("scene_pipeline_layout"),
                bind_group_layouts: &[&material_layout, &node_layout, &scene_layout],
                push_constant_ranges: &[],
            });

        let pipeline = gpu
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("scene_pipeline"),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: "vs_main",
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                    buffers: &[Vertex::layout()],
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: "fs_main",
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: surface_format,
                        blend: Some(wgpu::BlendState::REPLACE),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: Some(wgpu::Face::Back),
                    unclipped_depth: false,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    conservative: false,
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: wgpu::TextureFormat::Depth32Float,
                    depth_write_enabled: true,
                    depth_compare: wgpu::CompareFunction::Less,
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            });

        let depth_view = gpu.create_depth_texture("scene_depth", width, height);

        Ok(Self {
            pipeline,
            material_layout,
            node_layout,
            scene_layout,
            depth_view,
            material_schema: material_schema.to_string(),
            node_schema: node_schema.to_string(),
            scene_schema: scene_schema.to_string(),
            clear_color: wgpu::Color {
                r: 0.08,
                g: 0.12,
                b: 0.18,
                a: 1.0,
            },
        })
    }

    pub fn material_layout(&self) -> &wgpu::BindGroupLayout {
        &self.material_layout
    }

    pub fn node_layout(&self) -> &wgpu::BindGroupLayout {
        &self.node_layout
    }

    pub fn scene_layout(&self) -> &wgpu::BindGroupLayout {
        &self.scene_layout
    }

    pub fn node_schema(&self) -> &str {
        &self.node_schema
    }

    pub fn set_clear_color(&mut self, color: wgpu::Color) {
        self.clear_color = color;
    }

    pub fn resize(&mut self, gpu: &GpuContext, width: u32, height: u32) {
        self.depth_view = gpu.create_depth_texture("scene_depth", width, height);
    }

    /// Draw every mesh node of the scene into `target`. Binding sets are
    /// requested per draw and bound at {0: material, 1: node, 2: scene}.
    /// Call `scene.update()` first; this only reads resolved state.
    pub fn render(
        &mut self,
        gpu: &GpuContext,
        store: &ResourceStore,
        scene: &mut Scene,
        materials: &mut MaterialLibrary,
        target: &wgpu::TextureView,
    ) -> Result<()> {
        let scene_set = match scene.scene_runtime_mut(&self.scene_schema) {
            Some(runtime) => runtime.binding_set(gpu, store, &self.scene_layout)?,
            None => return Err(Error::SchemaNotFound(self.scene_schema.clone())),
        };

        let mut draws = Vec::new();
        for key in scene.mesh_nodes() {
            let Some(instance) = scene.mesh_instance(key)?.cloned() else {
                continue;
            };
            let mesh = store.mesh(&instance.mesh)?;
            let material = materials
                .get_mut(&instance.material)
                .ok_or_else(|| Error::resource_not_found("material", &instance.material))?;
            let material_set = match material.runtime_mut(&self.material_schema) {
                Some(runtime) => runtime.binding_set(gpu, store, &self.material_layout)?,
                None => return Err(Error::SchemaNotFound(self.material_schema.clone())),
            };
            let node_set = scene
                .node_binding_mut(key)?
                .binding_set(gpu, store, &self.node_layout)?;
            draws.push(DrawCall {
                material_set,
                node_set,
                mesh,
            });
        }

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("scene_encoder"),
            });
        {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("scene_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            rpass.set_pipeline(&self.pipeline);
            rpass.set_bind_group(2, &*scene_set, &[]);
            for draw in &draws {
                rpass.set_bind_group(0, &*draw.material_set, &[]);
                rpass.set_bind_group(1, &*draw.node_set, &[]);
                rpass.set_vertex_buffer(0, draw.mesh.vertex_buffer.slice(..));
                rpass.set_index_buffer(draw.mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                rpass.draw_indexed(0..draw.mesh.index_count, 0, 0..1);
            }
        }
        gpu.queue.submit(Some(encoder.finish()));
        log::trace!("submitted {} draw(s)", draws.len());
        Ok(())
    }
}
