// src/resources.rs
//! String-keyed resource storage.
//!
//! The binding layer resolves texture and sampler references by id at
//! binding-set rebuild time, so everything up to that point runs without
//! a device. Meshes live here too; the renderer looks them up by the id
//! a node's mesh instance names.

use std::collections::HashMap;
use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::gpu::GpuContext;

/// Vertex format (matches the WGSL shader: position, normal, uv).
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex {
    pub const ATTRS: [wgpu::VertexAttribute; 3] = wgpu::vertex_attr_array![
        0 => Float32x3, // position
        1 => Float32x3, // normal
        2 => Float32x2, // uv
    ];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }
}

/// Mesh: vertex + index buffers and index count.
#[derive(Debug)]
pub struct Mesh {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub index_count: u32,
}

impl Mesh {
    pub fn from_data(
        gpu: &GpuContext,
        label: &str,
        vertices: &[Vertex],
        indices: &[u32],
    ) -> Self {
        let vertex_buffer =
            gpu.create_vertex_buffer(&format!("{label}_vertices"), bytemuck::cast_slice(vertices));
        let index_buffer =
            gpu.create_index_buffer(&format!("{label}_indices"), bytemuck::cast_slice(indices));
        Self {
            vertex_buffer,
            index_buffer,
            index_count: indices.len() as u32,
        }
    }
}

/// Unit cube centered at the origin, one quad per face so normals and
/// uvs stay per-face.
pub fn cube_mesh_data() -> (Vec<Vertex>, Vec<u32>) {
    let faces: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
        // normal, tangent u, tangent v
        ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
        ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
        ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
        ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
    ];

    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);
    for (normal, u_axis, v_axis) in faces {
        let base = vertices.len() as u32;
        for (du, dv, uv) in [
            (-0.5, -0.5, [0.0, 1.0]),
            (0.5, -0.5, [1.0, 1.0]),
            (0.5, 0.5, [1.0, 0.0]),
            (-0.5, 0.5, [0.0, 0.0]),
        ] {
            let position = [
                normal[0] * 0.5 + u_axis[0] * du + v_axis[0] * dv,
                normal[1] * 0.5 + u_axis[1] * du + v_axis[1] * dv,
                normal[2] * 0.5 + u_axis[2] * du + v_axis[2] * dv,
            ];
            vertices.push(Vertex {
                position,
                normal,
                uv,
            });
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
    (vertices, indices)
}

pub fn cube_mesh(gpu: &GpuContext, label: &str) -> Mesh {
    let (vertices, indices) = cube_mesh_data();
    Mesh::from_data(gpu, label, &vertices, &indices)
}

/// Shared store for texture views, samplers, and meshes, all keyed by
/// string id.
#[derive(Default)]
pub struct ResourceStore {
    textures: RwLock<HashMap<String, Arc<wgpu::TextureView>>>,
    samplers: RwLock<HashMap<String, Arc<wgpu::Sampler>>>,
    meshes: RwLock<HashMap<String, Arc<Mesh>>>,
}

impl ResourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-seeded with the ids schema defaults lean on: a 1x1
    /// "white" texture and "linear"/"nearest" samplers.
    pub fn with_defaults(gpu: &GpuContext) -> Self {
        let store = Self::new();
        store.register_texture(
            "white",
            gpu.create_color_texture("white", 1, 1, &[255, 255, 255, 255]),
        );
        store.register_sampler(
            "linear",
            gpu.create_sampler(
                "linear",
                wgpu::FilterMode::Linear,
                wgpu::AddressMode::ClampToEdge,
            ),
        );
        store.register_sampler(
            "nearest",
            gpu.create_sampler(
                "nearest",
                wgpu::FilterMode::Nearest,
                wgpu::AddressMode::ClampToEdge,
            ),
        );
        store
    }

    pub fn register_texture(&self, id: impl Into<String>, view: wgpu::TextureView) {
        let id = id.into();
        log::debug!("registered texture '{id}'");
        self.textures.write().insert(id, Arc::new(view));
    }

    pub fn register_sampler(&self, id: impl Into<String>, sampler: wgpu::Sampler) {
        let id = id.into();
        log::debug!("registered sampler '{id}'");
        self.samplers.write().insert(id, Arc::new(sampler));
    }

    pub fn register_mesh(&self, id: impl Into<String>, mesh: Mesh) {
        let id = id.into();
        log::debug!("registered mesh '{id}'");
        self.meshes.write().insert(id, Arc::new(mesh));
    }

    /// Upload raw RGBA8 pixels and register the resulting view under `id`.
    pub fn upload_color_texture(
        &self,
        gpu: &GpuContext,
        id: &str,
        width: u32,
        height: u32,
        rgba: &[u8],
    ) {
        let view = gpu.create_color_texture(id, width, height, rgba);
        self.register_texture(id, view);
    }

    pub fn texture(&self, id: &str) -> Result<Arc<wgpu::TextureView>> {
        self.textures
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| Error::resource_not_found("texture", id))
    }

    pub fn sampler(&self, id: &str) -> Result<Arc<wgpu::Sampler>> {
        self.samplers
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| Error::resource_not_found("sampler", id))
    }

    pub fn mesh(&self, id: &str) -> Result<Arc<Mesh>> {
        self.meshes
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| Error::resource_not_found("mesh", id))
    }

    pub fn has_texture(&self, id: &str) -> bool {
        self.textures.read().contains_key(id)
    }

    pub fn has_sampler(&self, id: &str) -> bool {
        self.samplers.read().contains_key(id)
    }

    pub fn has_mesh(&self, id: &str) -> bool {
        self.meshes.read().contains_key(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_resources_are_reported_by_kind() {
        let store = ResourceStore::new();

        let err = store.texture("bricks").unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("texture"));
        assert!(err.to_string().contains("bricks"));

        assert!(store.sampler("aniso").unwrap_err().is_not_found());
        assert!(store.mesh("teapot").unwrap_err().is_not_found());
        assert!(!store.has_texture("bricks"));
        assert!(!store.has_sampler("aniso"));
        assert!(!store.has_mesh("teapot"));
    }

    #[test]
    fn cube_geometry_is_well_formed() {
        let (vertices, indices) = cube_mesh_data();
        assert_eq!(vertices.len(), 24);
        assert_eq!(indices.len(), 36);
        assert!(indices.iter().all(|i| (*i as usize) < vertices.len()));

        for v in &vertices {
            let n = v.normal;
            let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
            assert!((len - 1.0).abs() < 1e-6);
            // Each vertex sits on the face its normal points out of.
            let d = v.position[0] * n[0] + v.position[1] * n[1] + v.position[2] * n[2];
            assert!((d - 0.5).abs() < 1e-6);
        }
    }
}
