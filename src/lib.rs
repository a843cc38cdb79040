// src/lib.rs
//! basalt: a scene renderer core built around schema-driven GPU bindings.
//!
//! Attribute schemas declare what a material, node or scene exposes to
//! shaders; attribute runtimes instantiate them with packed uniform
//! storage and cached binding sets; the scene graph resolves world
//! transforms and feeds them into node runtimes. Everything up to
//! binding-set rebuild runs without a GPU, which is where the tests live.

pub mod bindings;
pub mod camera;
pub mod error;
pub mod gpu;
pub mod lighting;
pub mod material;
pub mod renderer;
pub mod resources;
pub mod scene;
pub mod schema;
pub mod uniform_pack;
pub mod value;

#[cfg(not(target_arch = "wasm32"))]
pub mod viewer;

pub use bindings::{AttributeRuntime, BindingCache, BindingState};
pub use camera::Camera;
pub use error::{Error, Result};
pub use gpu::{BindingResourceRef, GpuContext};
pub use lighting::Light;
pub use material::{Material, MaterialLibrary};
pub use renderer::Renderer;
pub use resources::{cube_mesh, cube_mesh_data, Mesh, ResourceStore, Vertex};
pub use scene::{CameraKey, LightKey, MeshInstance, NodeKey, NodeState, Scene};
pub use schema::{
    AttributeDecl, AttributeSchema, BindingScope, SchemaRegistry, DEFAULT_PACK_CAPACITY,
};
pub use uniform_pack::{SlotHandle, UniformPack};
pub use value::{AttributeValue, SamplerRef, TextureRef, ValueKind};

#[cfg(not(target_arch = "wasm32"))]
pub use viewer::run_native;
