// src/schema.rs
//! Attribute schemas and their registry.
//!
//! A schema declares, once, the named attributes one binding scope exposes
//! to shaders: their order (which is the packed layout), their defaults and
//! how many storage versions instances carry. The registry is an owned
//! context object handed around explicitly; there are no process globals.
//!
//! Registration is where misconfiguration dies: zero version counts,
//! duplicate names, layouts that cannot fit the uniform budget and
//! Material-scope name collisions are all rejected before any instance
//! exists.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::value::{AttributeValue, ValueKind};

/// Default total slot budget for one uniform pack. Generous enough for a
/// couple of matrices plus a handful of vectors over two or three
/// versions; tighten it via [`SchemaRegistry::with_pack_capacity`].
pub const DEFAULT_PACK_CAPACITY: u32 = 256;

/// How often a binding's contents change, and which draw slot it occupies
/// by convention (0: Material, 1: Node, 2: Scene).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindingScope {
    Material,
    Node,
    Scene,
}

impl std::fmt::Display for BindingScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BindingScope::Material => "material",
            BindingScope::Node => "node",
            BindingScope::Scene => "scene",
        };
        f.write_str(name)
    }
}

/// One declared attribute: a name plus the default every new instance
/// starts from. The default's kind is the attribute's kind for life.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeDecl {
    pub name: String,
    pub default: AttributeValue,
}

impl AttributeDecl {
    pub fn new(name: impl Into<String>, default: impl Into<AttributeValue>) -> Self {
        Self {
            name: name.into(),
            default: default.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeSchema {
    scope: BindingScope,
    version_count: u32,
    attributes: Vec<AttributeDecl>,
}

impl AttributeSchema {
    pub fn new(scope: BindingScope, version_count: u32) -> Self {
        Self {
            scope,
            version_count,
            attributes: Vec::new(),
        }
    }

    /// Builder-style declaration. Order is significant: it is the packed
    /// uniform layout and the texture/sampler binding order.
    pub fn with_attribute(
        mut self,
        name: impl Into<String>,
        default: impl Into<AttributeValue>,
    ) -> Self {
        self.attributes.push(AttributeDecl::new(name, default));
        self
    }

    pub fn push_attribute(&mut self, decl: AttributeDecl) {
        self.attributes.push(decl);
    }

    pub fn scope(&self) -> BindingScope {
        self.scope
    }

    pub fn version_count(&self) -> u32 {
        self.version_count
    }

    pub fn attributes(&self) -> &[AttributeDecl] {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeDecl> {
        self.attributes.iter().find(|d| d.name == name)
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    /// Float slots one version of this schema packs.
    pub fn numeric_slots(&self) -> u32 {
        self.attributes.iter().map(|d| d.default.slot_cost()).sum()
    }

    /// Texture attributes declared, in order. Binding layouts derive
    /// their shape from this.
    pub fn texture_count(&self) -> u32 {
        self.attributes
            .iter()
            .filter(|d| d.default.kind() == ValueKind::Texture)
            .count() as u32
    }

    pub fn sampler_count(&self) -> u32 {
        self.attributes
            .iter()
            .filter(|d| d.default.kind() == ValueKind::Sampler)
            .count() as u32
    }
}

/// On-disk schema form, an array of these per JSON document:
///
/// ```json
/// [{
///   "id": "unlit",
///   "scope": "material",
///   "versions": 1,
///   "attributes": [
///     { "name": "colorFactor", "default": { "type": "vec4", "value": [1.0, 0.0, 1.0, 1.0] } }
///   ]
/// }]
/// ```
#[derive(Debug, Deserialize)]
struct SchemaSource {
    id: String,
    scope: BindingScope,
    #[serde(default = "default_versions")]
    versions: u32,
    attributes: Vec<AttributeDecl>,
}

fn default_versions() -> u32 {
    1
}

/// Registry mapping schema id to schema. The single source of truth every
/// runtime instantiation consults.
pub struct SchemaRegistry {
    schemas: HashMap<String, AttributeSchema>,
    pack_capacity: u32,
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::with_pack_capacity(DEFAULT_PACK_CAPACITY)
    }

    pub fn with_pack_capacity(pack_capacity: u32) -> Self {
        Self {
            schemas: HashMap::new(),
            pack_capacity,
        }
    }

    pub fn pack_capacity(&self) -> u32 {
        self.pack_capacity
    }

    /// Register `schema` under `id`, replacing any previous registration of
    /// the same id. Rejection leaves the registry untouched.
    pub fn register(&mut self, id: impl Into<String>, schema: AttributeSchema) -> Result<()> {
        let id = id.into();
        self.validate(&id, &schema)?;
        log::info!(
            "registered schema '{id}' ({}, {} attributes, {} versions)",
            schema.scope(),
            schema.attributes().len(),
            schema.version_count()
        );
        self.schemas.insert(id, schema);
        Ok(())
    }

    fn validate(&self, id: &str, schema: &AttributeSchema) -> Result<()> {
        if schema.version_count() == 0 {
            return Err(Error::InvalidSchema {
                id: id.to_string(),
                reason: "version count must be at least 1".to_string(),
            });
        }

        for (i, decl) in schema.attributes().iter().enumerate() {
            if schema.attributes()[..i].iter().any(|d| d.name == decl.name) {
                return Err(Error::DuplicateAttribute {
                    schema: id.to_string(),
                    name: decl.name.clone(),
                    previous: id.to_string(),
                });
            }
        }

        let needed = schema.numeric_slots().checked_mul(schema.version_count());
        if needed.map_or(true, |n| n > self.pack_capacity) {
            return Err(Error::CapacityExceeded {
                label: id.to_string(),
                needed: needed.unwrap_or(u32::MAX),
                capacity: self.pack_capacity,
            });
        }

        // Material-scope attribute names must be unique across schemas,
        // otherwise the material broadcast would be resolved by iteration
        // order. The schema being replaced under `id` does not count.
        if schema.scope() == BindingScope::Material {
            for (other_id, other) in &self.schemas {
                if other_id == id || other.scope() != BindingScope::Material {
                    continue;
                }
                for decl in schema.attributes() {
                    if other.has_attribute(&decl.name) {
                        return Err(Error::DuplicateAttribute {
                            schema: id.to_string(),
                            name: decl.name.clone(),
                            previous: other_id.clone(),
                        });
                    }
                }
            }
        }

        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<&AttributeSchema> {
        self.schemas
            .get(id)
            .ok_or_else(|| Error::SchemaNotFound(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.schemas.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    pub fn all_with_scope(
        &self,
        scope: BindingScope,
    ) -> impl Iterator<Item = (&str, &AttributeSchema)> {
        self.schemas
            .iter()
            .filter(move |(_, s)| s.scope() == scope)
            .map(|(id, s)| (id.as_str(), s))
    }

    /// Ids of every schema with `scope`, sorted so construction order is
    /// deterministic.
    pub fn ids_with_scope(&self, scope: BindingScope) -> Vec<String> {
        let mut ids: Vec<String> = self
            .all_with_scope(scope)
            .map(|(id, _)| id.to_string())
            .collect();
        ids.sort();
        ids
    }

    /// The one mutation a registered schema permits: appending a new
    /// declaration. Runs the same validation as registration; instances
    /// created before the append keep their old layout.
    pub fn append_attribute(&mut self, id: &str, decl: AttributeDecl) -> Result<()> {
        let mut updated = self.get(id)?.clone();
        updated.push_attribute(decl);
        self.validate(id, &updated)?;
        self.schemas.insert(id.to_string(), updated);
        Ok(())
    }

    /// Register every schema in a JSON source document. Returns the ids in
    /// document order.
    pub fn load_json(&mut self, src: &str) -> Result<Vec<String>> {
        let sources: Vec<SchemaSource> = serde_json::from_str(src)?;
        let mut ids = Vec::with_capacity(sources.len());
        for source in sources {
            let mut schema = AttributeSchema::new(source.scope, source.versions);
            for decl in source.attributes {
                schema.push_attribute(decl);
            }
            self.register(source.id.clone(), schema)?;
            ids.push(source.id);
        }
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Mat4, Vec4};

    use crate::value::TextureRef;

    fn unlit() -> AttributeSchema {
        AttributeSchema::new(BindingScope::Material, 1)
            .with_attribute("colorFactor", Vec4::new(1.0, 0.0, 1.0, 1.0))
            .with_attribute("baseTexture", TextureRef::new("white"))
    }

    #[test]
    fn register_and_get() {
        let mut reg = SchemaRegistry::new();
        reg.register("unlit", unlit()).unwrap();

        let schema = reg.get("unlit").unwrap();
        assert_eq!(schema.scope(), BindingScope::Material);
        assert_eq!(schema.attributes().len(), 2);
        assert_eq!(schema.numeric_slots(), 4);

        assert!(reg.get("missing").unwrap_err().is_not_found());
    }

    #[test]
    fn register_overwrites_same_id() {
        let mut reg = SchemaRegistry::new();
        reg.register("unlit", unlit()).unwrap();
        reg.register(
            "unlit",
            AttributeSchema::new(BindingScope::Material, 2).with_attribute("colorFactor", 1.0f32),
        )
        .unwrap();

        let schema = reg.get("unlit").unwrap();
        assert_eq!(schema.version_count(), 2);
        assert_eq!(schema.attributes().len(), 1);
    }

    #[test]
    fn zero_versions_rejected() {
        let mut reg = SchemaRegistry::new();
        let err = reg
            .register("bad", AttributeSchema::new(BindingScope::Scene, 0))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidSchema { .. }));
    }

    #[test]
    fn duplicate_name_within_schema_rejected() {
        let mut reg = SchemaRegistry::new();
        let schema = AttributeSchema::new(BindingScope::Node, 1)
            .with_attribute("model", Mat4::IDENTITY)
            .with_attribute("model", Mat4::IDENTITY);
        let err = reg.register("node", schema).unwrap_err();
        assert!(matches!(err, Error::DuplicateAttribute { .. }));
    }

    #[test]
    fn material_scope_collision_rejected() {
        let mut reg = SchemaRegistry::new();
        reg.register("unlit", unlit()).unwrap();

        let clash = AttributeSchema::new(BindingScope::Material, 1)
            .with_attribute("colorFactor", Vec4::ONE);
        let err = reg.register("pbr", clash).unwrap_err();
        match err {
            Error::DuplicateAttribute { previous, .. } => assert_eq!(previous, "unlit"),
            other => panic!("unexpected error: {other}"),
        }

        // Re-registering the same id with the same names is fine.
        reg.register("unlit", unlit()).unwrap();
    }

    #[test]
    fn non_material_scopes_may_share_names() {
        let mut reg = SchemaRegistry::new();
        reg.register(
            "globals_a",
            AttributeSchema::new(BindingScope::Scene, 1).with_attribute("view", Mat4::IDENTITY),
        )
        .unwrap();
        reg.register(
            "globals_b",
            AttributeSchema::new(BindingScope::Scene, 1).with_attribute("view", Mat4::IDENTITY),
        )
        .unwrap();
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn capacity_checked_at_registration() {
        let mut reg = SchemaRegistry::with_pack_capacity(64);
        // 16 + 4 = 20 slots per version.
        let schema = AttributeSchema::new(BindingScope::Scene, 4)
            .with_attribute("view", Mat4::IDENTITY)
            .with_attribute("cameraPosition", Vec4::ZERO);
        assert!(reg
            .register("fat", schema.clone())
            .unwrap_err()
            .is_capacity());

        let schema = AttributeSchema::new(BindingScope::Scene, 3)
            .with_attribute("view", Mat4::IDENTITY)
            .with_attribute("cameraPosition", Vec4::ZERO);
        reg.register("fits", schema).unwrap();

        // 4 slots x 2^30 versions overflows u32; still a capacity error,
        // not a wrap back under budget.
        let schema = AttributeSchema::new(BindingScope::Scene, 1 << 30)
            .with_attribute("exposure", 1.0f32);
        assert!(reg.register("huge", schema).unwrap_err().is_capacity());
        assert!(!reg.contains("huge"));
    }

    #[test]
    fn scope_filter() {
        let mut reg = SchemaRegistry::new();
        reg.register("unlit", unlit()).unwrap();
        reg.register(
            "node",
            AttributeSchema::new(BindingScope::Node, 1).with_attribute("model", Mat4::IDENTITY),
        )
        .unwrap();

        assert_eq!(reg.ids_with_scope(BindingScope::Material), vec!["unlit"]);
        assert_eq!(reg.ids_with_scope(BindingScope::Node), vec!["node"]);
        assert!(reg.ids_with_scope(BindingScope::Scene).is_empty());
    }

    #[test]
    fn append_attribute_validates() {
        let mut reg = SchemaRegistry::new();
        reg.register("unlit", unlit()).unwrap();

        reg.append_attribute("unlit", AttributeDecl::new("tiling", 1.0f32))
            .unwrap();
        assert_eq!(reg.get("unlit").unwrap().attributes().len(), 3);

        let err = reg
            .append_attribute("unlit", AttributeDecl::new("tiling", 2.0f32))
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateAttribute { .. }));

        assert!(reg
            .append_attribute("missing", AttributeDecl::new("x", 0.0f32))
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn load_json_registers_schemas() {
        let mut reg = SchemaRegistry::new();
        let ids = reg
            .load_json(
                r#"[
                  {
                    "id": "unlit",
                    "scope": "material",
                    "attributes": [
                      { "name": "colorFactor", "default": { "type": "vec4", "value": [1.0, 0.0, 1.0, 1.0] } },
                      { "name": "baseTexture", "default": { "type": "texture", "value": "white" } }
                    ]
                  },
                  {
                    "id": "globals",
                    "scope": "scene",
                    "versions": 2,
                    "attributes": [
                      { "name": "view", "default": { "type": "mat4", "value": [1,0,0,0, 0,1,0,0, 0,0,1,0, 0,0,0,1] } }
                    ]
                  }
                ]"#,
            )
            .unwrap();

        assert_eq!(ids, vec!["unlit", "globals"]);
        assert_eq!(reg.get("unlit").unwrap().version_count(), 1);
        assert_eq!(reg.get("globals").unwrap().version_count(), 2);
        assert_eq!(
            reg.get("globals").unwrap().attribute("view").unwrap().default,
            AttributeValue::Mat4(Mat4::IDENTITY)
        );
    }
}
