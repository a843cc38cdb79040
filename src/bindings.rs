// src/bindings.rs
//! Live schema instances and their GPU binding sets.
//!
//! An [`AttributeRuntime`] instantiates one schema: numeric attributes get
//! pack slots in declaration order with defaults written into every
//! version, texture and sampler attributes become ordered reference lists.
//! The derived bind group is cached behind an explicit {Clean, Dirty}
//! state machine; only texture/sampler writes invalidate it, numeric
//! writes are absorbed by the uniform upload path.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::gpu::{BindingResourceRef, GpuContext};
use crate::resources::ResourceStore;
use crate::schema::{BindingScope, SchemaRegistry};
use crate::uniform_pack::{SlotHandle, UniformPack};
use crate::value::{AttributeValue, SamplerRef, TextureRef, ValueKind};

/// Cache occupancy of a derived GPU object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingState {
    Dirty,
    Clean,
}

/// Two-state cache for a rebuild-on-demand object.
///
/// `Dirty -> Clean` happens only through a successful rebuild, `Clean ->
/// Dirty` only through [`BindingCache::invalidate`]. A failed rebuild
/// leaves the cache Dirty so the next request retries.
#[derive(Debug)]
pub enum BindingCache<T> {
    Dirty,
    Clean(T),
}

impl<T> Default for BindingCache<T> {
    fn default() -> Self {
        BindingCache::Dirty
    }
}

impl<T> BindingCache<T> {
    pub fn new() -> Self {
        BindingCache::Dirty
    }

    pub fn state(&self) -> BindingState {
        match self {
            BindingCache::Dirty => BindingState::Dirty,
            BindingCache::Clean(_) => BindingState::Clean,
        }
    }

    pub fn is_dirty(&self) -> bool {
        matches!(self, BindingCache::Dirty)
    }

    pub fn invalidate(&mut self) {
        *self = BindingCache::Dirty;
    }

    /// Return the cached value, rebuilding it first if the cache is Dirty.
    pub fn get_or_rebuild<E>(
        &mut self,
        build: impl FnOnce() -> std::result::Result<T, E>,
    ) -> std::result::Result<T, E>
    where
        T: Clone,
    {
        match self {
            BindingCache::Clean(value) => Ok(value.clone()),
            BindingCache::Dirty => {
                let value = build()?;
                *self = BindingCache::Clean(value.clone());
                Ok(value)
            }
        }
    }
}

#[derive(Debug)]
struct NumericBinding {
    name: String,
    kind: ValueKind,
    slot: SlotHandle,
}

#[derive(Debug)]
struct TextureBinding {
    name: String,
    value: TextureRef,
}

#[derive(Debug)]
struct SamplerBinding {
    name: String,
    value: SamplerRef,
}

/// A live instance of one schema: current values plus the derived GPU
/// resources. Owned exclusively by its material, node or scene.
#[derive(Debug)]
pub struct AttributeRuntime {
    schema_id: String,
    scope: BindingScope,
    numeric: Vec<NumericBinding>,
    textures: Vec<TextureBinding>,
    samplers: Vec<SamplerBinding>,
    pack: UniformPack,
    buffer: Option<wgpu::Buffer>,
    cache: BindingCache<Arc<wgpu::BindGroup>>,
    /// Bumped on every texture/sampler replacement, never on numeric
    /// writes. External caches can key on it.
    binding_generation: u64,
}

impl AttributeRuntime {
    /// Instantiate with the schema's own version count.
    pub fn new(registry: &SchemaRegistry, schema_id: &str) -> Result<Self> {
        let version_count = registry.get(schema_id)?.version_count();
        Self::with_versions(registry, schema_id, version_count)
    }

    /// Instantiate with an explicit version count. The capacity formula is
    /// re-checked here because the override may exceed what registration
    /// validated.
    pub fn with_versions(
        registry: &SchemaRegistry,
        schema_id: &str,
        version_count: u32,
    ) -> Result<Self> {
        let schema = registry.get(schema_id)?;
        if version_count == 0 {
            return Err(Error::InvalidSchema {
                id: schema_id.to_string(),
                reason: "version count must be at least 1".to_string(),
            });
        }
        let capacity = registry.pack_capacity();
        let needed = schema.numeric_slots().checked_mul(version_count);
        if needed.map_or(true, |n| n > capacity) {
            return Err(Error::CapacityExceeded {
                label: schema_id.to_string(),
                needed: needed.unwrap_or(u32::MAX),
                capacity,
            });
        }

        let mut pack = UniformPack::new(schema_id, capacity, version_count);
        let mut numeric = Vec::new();
        let mut textures = Vec::new();
        let mut samplers = Vec::new();

        for decl in schema.attributes() {
            match &decl.default {
                AttributeValue::Scalar(s) => {
                    let slot = pack.allocate(ValueKind::Scalar.slot_cost())?;
                    for version in 0..version_count {
                        pack.write_scalar(slot, *s, version)?;
                    }
                    numeric.push(NumericBinding {
                        name: decl.name.clone(),
                        kind: ValueKind::Scalar,
                        slot,
                    });
                }
                AttributeValue::Vec4(v) => {
                    let slot = pack.allocate(ValueKind::Vec4.slot_cost())?;
                    for version in 0..version_count {
                        pack.write_vec4(slot, *v, version)?;
                    }
                    numeric.push(NumericBinding {
                        name: decl.name.clone(),
                        kind: ValueKind::Vec4,
                        slot,
                    });
                }
                AttributeValue::Mat4(m) => {
                    let slot = pack.allocate(ValueKind::Mat4.slot_cost())?;
                    for version in 0..version_count {
                        pack.write_mat4(slot, m, version)?;
                    }
                    numeric.push(NumericBinding {
                        name: decl.name.clone(),
                        kind: ValueKind::Mat4,
                        slot,
                    });
                }
                AttributeValue::Texture(r) => textures.push(TextureBinding {
                    name: decl.name.clone(),
                    value: r.clone(),
                }),
                AttributeValue::Sampler(r) => samplers.push(SamplerBinding {
                    name: decl.name.clone(),
                    value: r.clone(),
                }),
            }
        }

        Ok(Self {
            schema_id: schema_id.to_string(),
            scope: schema.scope(),
            numeric,
            textures,
            samplers,
            pack,
            buffer: None,
            cache: BindingCache::new(),
            binding_generation: 0,
        })
    }

    pub fn schema_id(&self) -> &str {
        &self.schema_id
    }

    pub fn scope(&self) -> BindingScope {
        self.scope
    }

    pub fn version_count(&self) -> u32 {
        self.pack.version_count()
    }

    pub fn texture_count(&self) -> u32 {
        self.textures.len() as u32
    }

    pub fn sampler_count(&self) -> u32 {
        self.samplers.len() as u32
    }

    /// Total, never fails. Use this before `get`/`set` when an attribute
    /// is only conditionally present.
    pub fn has(&self, name: &str) -> bool {
        self.numeric.iter().any(|b| b.name == name)
            || self.textures.iter().any(|b| b.name == name)
            || self.samplers.iter().any(|b| b.name == name)
    }

    /// Current value at version 0.
    pub fn get(&self, name: &str) -> Result<AttributeValue> {
        self.get_version(name, 0)
    }

    /// Current value at `version`. Texture and sampler references are
    /// unversioned; the version argument only selects numeric storage.
    pub fn get_version(&self, name: &str, version: u32) -> Result<AttributeValue> {
        if let Some(binding) = self.numeric.iter().find(|b| b.name == name) {
            return Ok(match binding.kind {
                ValueKind::Scalar => {
                    AttributeValue::Scalar(self.pack.read_scalar(binding.slot, version)?)
                }
                ValueKind::Vec4 => {
                    AttributeValue::Vec4(self.pack.read_vec4(binding.slot, version)?)
                }
                ValueKind::Mat4 => {
                    AttributeValue::Mat4(self.pack.read_mat4(binding.slot, version)?)
                }
                ValueKind::Texture | ValueKind::Sampler => {
                    return Err(Error::attribute_not_found(&self.schema_id, name))
                }
            });
        }
        if let Some(binding) = self.textures.iter().find(|b| b.name == name) {
            return Ok(AttributeValue::Texture(binding.value.clone()));
        }
        if let Some(binding) = self.samplers.iter().find(|b| b.name == name) {
            return Ok(AttributeValue::Sampler(binding.value.clone()));
        }
        Err(Error::attribute_not_found(&self.schema_id, name))
    }

    /// Write version 0.
    pub fn set(&mut self, name: &str, value: impl Into<AttributeValue>) -> Result<()> {
        self.set_version(name, value, 0)
    }

    /// Write one version. A kind mismatch fails without touching stored
    /// state; numeric writes go to the pack, reference writes replace the
    /// stored handle and invalidate the binding set.
    pub fn set_version(
        &mut self,
        name: &str,
        value: impl Into<AttributeValue>,
        version: u32,
    ) -> Result<()> {
        let value = value.into();

        if let Some(ix) = self.numeric.iter().position(|b| b.name == name) {
            let (kind, slot) = (self.numeric[ix].kind, self.numeric[ix].slot);
            if value.kind() != kind {
                return Err(Error::TypeMismatch {
                    name: name.to_string(),
                    expected: kind,
                    got: value.kind(),
                });
            }
            return match value {
                AttributeValue::Scalar(s) => self.pack.write_scalar(slot, s, version),
                AttributeValue::Vec4(v) => self.pack.write_vec4(slot, v, version),
                AttributeValue::Mat4(m) => self.pack.write_mat4(slot, &m, version),
                other => Err(Error::TypeMismatch {
                    name: name.to_string(),
                    expected: kind,
                    got: other.kind(),
                }),
            };
        }

        if let Some(ix) = self.textures.iter().position(|b| b.name == name) {
            return match value {
                AttributeValue::Texture(r) => {
                    self.textures[ix].value = r;
                    self.invalidate_bindings();
                    Ok(())
                }
                other => Err(Error::TypeMismatch {
                    name: name.to_string(),
                    expected: ValueKind::Texture,
                    got: other.kind(),
                }),
            };
        }

        if let Some(ix) = self.samplers.iter().position(|b| b.name == name) {
            return match value {
                AttributeValue::Sampler(r) => {
                    self.samplers[ix].value = r;
                    self.invalidate_bindings();
                    Ok(())
                }
                other => Err(Error::TypeMismatch {
                    name: name.to_string(),
                    expected: ValueKind::Sampler,
                    got: other.kind(),
                }),
            };
        }

        Err(Error::attribute_not_found(&self.schema_id, name))
    }

    fn invalidate_bindings(&mut self) {
        self.cache.invalidate();
        self.binding_generation += 1;
    }

    pub fn binding_state(&self) -> BindingState {
        self.cache.state()
    }

    pub fn binding_dirty(&self) -> bool {
        self.cache.is_dirty()
    }

    pub fn binding_generation(&self) -> u64 {
        self.binding_generation
    }

    /// The cached bind group, rebuilt if a texture or sampler changed
    /// since the last call. Dirty numeric versions are uploaded either
    /// way. Rebuild order is fixed: uniform buffer, then textures in
    /// declaration order, then samplers in declaration order; `layout`
    /// must declare bindings in the same order.
    pub fn binding_set(
        &mut self,
        gpu: &GpuContext,
        store: &ResourceStore,
        layout: &wgpu::BindGroupLayout,
    ) -> Result<Arc<wgpu::BindGroup>> {
        let Self {
            schema_id,
            pack,
            buffer,
            textures,
            samplers,
            cache,
            ..
        } = self;

        let buffer: &wgpu::Buffer = buffer.get_or_insert_with(|| {
            gpu.create_uniform_buffer(&format!("{schema_id}_uniforms"), pack.byte_size())
        });
        pack.flush(gpu, buffer);

        cache.get_or_rebuild(|| {
            let mut views = Vec::with_capacity(textures.len());
            for binding in textures.iter() {
                views.push(store.texture(binding.value.id())?);
            }
            let mut samps = Vec::with_capacity(samplers.len());
            for binding in samplers.iter() {
                samps.push(store.sampler(binding.value.id())?);
            }

            let mut entries = Vec::with_capacity(1 + views.len() + samps.len());
            entries.push(BindingResourceRef::Buffer(buffer));
            for view in &views {
                entries.push(BindingResourceRef::Texture(view));
            }
            for sampler in &samps {
                entries.push(BindingResourceRef::Sampler(sampler));
            }

            log::debug!(
                "rebuilding binding set for '{schema_id}' ({} textures, {} samplers)",
                views.len(),
                samps.len()
            );
            Ok(Arc::new(gpu.create_binding_set(
                &format!("{schema_id}_bindings"),
                layout,
                &entries,
            )))
        })
    }
}
