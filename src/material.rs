// src/material.rs
//! Materials: named aggregates of attribute runtimes.
//!
//! A material usually holds one runtime per Material-scope schema and
//! forwards attribute access to whichever runtime declares the name. The
//! registry rejects duplicate names across Material-scope schemas, so the
//! forwarding target is unique for those; materials built from an explicit
//! schema list resolve ties in held order.

use std::collections::HashMap;

use serde::Deserialize;

use crate::bindings::AttributeRuntime;
use crate::error::{Error, Result};
use crate::schema::{BindingScope, SchemaRegistry};
use crate::value::AttributeValue;

#[derive(Debug)]
pub struct Material {
    name: String,
    runtimes: Vec<AttributeRuntime>,
}

impl Material {
    /// Build a material holding one runtime per Material-scope schema in
    /// the registry, in sorted schema-id order. Either every runtime is
    /// created or the material is not.
    pub fn from_scope(registry: &SchemaRegistry, name: impl Into<String>) -> Result<Self> {
        let ids = registry.ids_with_scope(BindingScope::Material);
        let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        Self::with_schemas(registry, name, &id_refs)
    }

    /// Build a material from an explicit schema list, regardless of the
    /// schemas' scopes. Held order follows the argument order.
    pub fn with_schemas(
        registry: &SchemaRegistry,
        name: impl Into<String>,
        schema_ids: &[&str],
    ) -> Result<Self> {
        let name = name.into();
        let mut runtimes = Vec::with_capacity(schema_ids.len());
        for id in schema_ids {
            runtimes.push(AttributeRuntime::new(registry, id)?);
        }
        log::debug!("material '{name}' built from {} schema(s)", runtimes.len());
        Ok(Self { name, runtimes })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn runtimes(&self) -> &[AttributeRuntime] {
        &self.runtimes
    }

    pub fn runtime(&self, schema_id: &str) -> Option<&AttributeRuntime> {
        self.runtimes.iter().find(|r| r.schema_id() == schema_id)
    }

    pub fn runtime_mut(&mut self, schema_id: &str) -> Option<&mut AttributeRuntime> {
        self.runtimes.iter_mut().find(|r| r.schema_id() == schema_id)
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.runtimes.iter().any(|r| r.has(name))
    }

    /// Value of `name` (version 0) from the first runtime declaring it.
    pub fn get_attribute(&self, name: &str) -> Result<AttributeValue> {
        match self.runtimes.iter().find(|r| r.has(name)) {
            Some(runtime) => runtime.get(name),
            None => Err(Error::attribute_not_found(&self.name, name)),
        }
    }

    /// Write `name` (version 0) into the first runtime declaring it.
    pub fn set_attribute(&mut self, name: &str, value: impl Into<AttributeValue>) -> Result<()> {
        match self.runtimes.iter_mut().find(|r| r.has(name)) {
            Some(runtime) => runtime.set(name, value),
            None => Err(Error::attribute_not_found(&self.name, name)),
        }
    }

    /// Version-specific write addressed to one held schema, skipping the
    /// name broadcast.
    pub fn set_in(
        &mut self,
        schema_id: &str,
        name: &str,
        value: impl Into<AttributeValue>,
        version: u32,
    ) -> Result<()> {
        match self.runtime_mut(schema_id) {
            Some(runtime) => runtime.set_version(name, value, version),
            None => Err(Error::SchemaNotFound(schema_id.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Library
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct MaterialSource {
    name: String,
    /// Empty means "every Material-scope schema".
    #[serde(default)]
    schemas: Vec<String>,
    #[serde(default)]
    values: HashMap<String, AttributeValue>,
}

/// Named material storage with JSON loading.
#[derive(Default)]
pub struct MaterialLibrary {
    materials: HashMap<String, Material>,
}

impl MaterialLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, material: Material) {
        self.materials.insert(material.name().to_string(), material);
    }

    pub fn get(&self, name: &str) -> Option<&Material> {
        self.materials.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Material> {
        self.materials.get_mut(name)
    }

    /// Remove a material, returning it. Unknown names fail with
    /// `ResourceNotFound`.
    pub fn remove(&mut self, name: &str) -> Result<Material> {
        self.materials
            .remove(name)
            .ok_or_else(|| Error::resource_not_found("material", name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.materials.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.materials.keys().cloned().collect();
        names.sort();
        names
    }

    /// Load materials from a JSON array of
    /// `{"name", "schemas": [..], "values": {"attr": {"type", "value"}}}`.
    /// Returns the loaded names in file order.
    pub fn load_json(&mut self, registry: &SchemaRegistry, json: &str) -> Result<Vec<String>> {
        let sources: Vec<MaterialSource> = serde_json::from_str(json)?;
        let mut loaded = Vec::with_capacity(sources.len());
        for source in sources {
            let mut material = if source.schemas.is_empty() {
                Material::from_scope(registry, &source.name)?
            } else {
                let ids: Vec<&str> = source.schemas.iter().map(String::as_str).collect();
                Material::with_schemas(registry, &source.name, &ids)?
            };
            let mut names: Vec<&String> = source.values.keys().collect();
            names.sort();
            for name in names {
                material.set_attribute(name, source.values[name].clone())?;
            }
            log::info!("loaded material '{}'", source.name);
            loaded.push(source.name.clone());
            self.insert(material);
        }
        Ok(loaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Mat4, Vec4};

    use crate::schema::AttributeSchema;
    use crate::value::{SamplerRef, TextureRef};

    fn registry() -> SchemaRegistry {
        let mut reg = SchemaRegistry::new();
        reg.register(
            "surface",
            AttributeSchema::new(BindingScope::Material, 1)
                .with_attribute("roughness", 0.5f32)
                .with_attribute("baseTexture", TextureRef::new("white"))
                .with_attribute("baseSampler", SamplerRef::new("linear")),
        )
        .unwrap();
        reg.register(
            "emission",
            AttributeSchema::new(BindingScope::Material, 1)
                .with_attribute("emissiveColor", Vec4::ZERO),
        )
        .unwrap();
        reg.register(
            "node",
            AttributeSchema::new(BindingScope::Node, 1).with_attribute("model", Mat4::IDENTITY),
        )
        .unwrap();
        reg
    }

    #[test]
    fn from_scope_collects_material_schemas_only() {
        let reg = registry();
        let material = Material::from_scope(&reg, "steel").unwrap();

        assert_eq!(material.runtimes().len(), 2);
        assert!(material.has_attribute("roughness"));
        assert!(material.has_attribute("emissiveColor"));
        assert!(!material.has_attribute("model"));
        assert!(material.runtime("surface").is_some());
        assert!(material.runtime("node").is_none());
    }

    #[test]
    fn broadcast_set_reaches_the_owning_runtime() {
        let reg = registry();
        let mut material = Material::from_scope(&reg, "steel").unwrap();

        material
            .set_attribute("emissiveColor", Vec4::new(0.0, 0.5, 0.0, 1.0))
            .unwrap();
        assert_eq!(
            material.get_attribute("emissiveColor").unwrap(),
            AttributeValue::Vec4(Vec4::new(0.0, 0.5, 0.0, 1.0))
        );

        let err = material.set_attribute("missing", 1.0f32).unwrap_err();
        assert!(err.is_not_found());
        assert!(material
            .set_attribute("roughness", Vec4::ONE)
            .unwrap_err()
            .is_type_mismatch());
    }

    #[test]
    fn version_bypass_addresses_one_schema() {
        let mut reg = SchemaRegistry::new();
        reg.register(
            "surface",
            AttributeSchema::new(BindingScope::Material, 2).with_attribute("roughness", 0.5f32),
        )
        .unwrap();
        let mut material = Material::from_scope(&reg, "steel").unwrap();

        material.set_in("surface", "roughness", 0.25f32, 1).unwrap();
        let runtime = material.runtime("surface").unwrap();
        assert_eq!(
            runtime.get_version("roughness", 0).unwrap(),
            AttributeValue::Scalar(0.5)
        );
        assert_eq!(
            runtime.get_version("roughness", 1).unwrap(),
            AttributeValue::Scalar(0.25)
        );

        assert!(matches!(
            material.set_in("absent", "roughness", 0.1f32, 0).unwrap_err(),
            Error::SchemaNotFound(_)
        ));
    }

    #[test]
    fn construction_is_all_or_nothing() {
        let reg = registry();
        let err = Material::with_schemas(&reg, "broken", &["surface", "missing"]).unwrap_err();
        assert!(err.is_not_found());
    }

    // A Scene-scope schema instantiated through a material: numeric writes
    // round-trip and never invalidate the cached binding set.
    #[test]
    fn scene_scope_schema_through_a_material_stays_clean() {
        let mut reg = SchemaRegistry::new();
        reg.register(
            "unlit",
            AttributeSchema::new(BindingScope::Scene, 1)
                .with_attribute("colorFactor", Vec4::new(1.0, 0.0, 1.0, 1.0)),
        )
        .unwrap();

        let mut material = Material::with_schemas(&reg, "flat", &["unlit"]).unwrap();
        material
            .set_attribute("colorFactor", Vec4::new(0.0, 1.0, 0.0, 1.0))
            .unwrap();

        assert_eq!(
            material.get_attribute("colorFactor").unwrap(),
            AttributeValue::Vec4(Vec4::new(0.0, 1.0, 0.0, 1.0))
        );
        let runtime = material.runtime("unlit").unwrap();
        assert_eq!(runtime.binding_generation(), 0);
    }

    #[test]
    fn library_loads_materials_from_json() {
        let reg = registry();
        let mut library = MaterialLibrary::new();

        let loaded = library
            .load_json(
                &reg,
                r#"[
                    {
                        "name": "steel",
                        "values": {
                            "roughness": {"type": "scalar", "value": 0.3},
                            "baseTexture": {"type": "texture", "value": "steel_albedo"}
                        }
                    },
                    {
                        "name": "flat",
                        "schemas": ["emission"],
                        "values": {
                            "emissiveColor": {"type": "vec4", "value": [1.0, 1.0, 0.0, 1.0]}
                        }
                    }
                ]"#,
            )
            .unwrap();
        assert_eq!(loaded, vec!["steel".to_string(), "flat".to_string()]);
        assert_eq!(library.names(), vec!["flat".to_string(), "steel".to_string()]);

        let steel = library.get("steel").unwrap();
        assert_eq!(
            steel.get_attribute("roughness").unwrap(),
            AttributeValue::Scalar(0.3)
        );
        assert_eq!(
            steel.get_attribute("baseTexture").unwrap(),
            AttributeValue::Texture(TextureRef::new("steel_albedo"))
        );

        let flat = library.get("flat").unwrap();
        assert_eq!(flat.runtimes().len(), 1);
        assert!(!flat.has_attribute("roughness"));

        let removed = library.remove("flat").unwrap();
        assert_eq!(removed.name(), "flat");
        assert!(!library.contains("flat"));
        assert!(library.remove("flat").unwrap_err().is_not_found());

        // Unknown value names abort the load.
        assert!(library
            .load_json(&reg, r#"[{"name": "bad", "values": {"nope": {"type": "scalar", "value": 1.0}}}]"#)
            .unwrap_err()
            .is_not_found());
    }
}
