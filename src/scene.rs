// src/scene.rs
//! Scene graph with hierarchical transform propagation.
//!
//! Nodes live in a slotmap keyed by generational handles, so operations
//! on a destroyed node fail with `InvalidHandle` instead of touching a
//! reused slot. Mutations only mark state; `update` runs one preorder
//! traversal that recomputes stale world transforms parent-first and then
//! pushes camera/light values into every Scene-scope runtime declaring
//! them.

use glam::Mat4;
use slotmap::{new_key_type, SlotMap};

use crate::bindings::AttributeRuntime;
use crate::camera::Camera;
use crate::error::{Error, Result};
use crate::lighting::Light;
use crate::schema::{BindingScope, SchemaRegistry};
use crate::value::{AttributeValue, ValueKind};

new_key_type! {
    pub struct NodeKey;
    pub struct CameraKey;
    pub struct LightKey;
}

/// Per-node lifecycle. `Detached` means no world transform has ever been
/// computed; `Stale` means the stored world transform is outdated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Detached,
    Stale,
    Resolved,
}

/// What a node draws: mesh and material referenced by string id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeshInstance {
    pub mesh: String,
    pub material: String,
}

impl MeshInstance {
    pub fn new(mesh: impl Into<String>, material: impl Into<String>) -> Self {
        Self {
            mesh: mesh.into(),
            material: material.into(),
        }
    }
}

#[derive(Debug)]
struct Node {
    local: Mat4,
    world: Mat4,
    state: NodeState,
    parent: Option<NodeKey>,
    children: Vec<NodeKey>,
    binding: AttributeRuntime,
    mesh: Option<MeshInstance>,
}

/// Scene container: node hierarchy, cameras, lights, and one runtime per
/// Scene-scope schema. Dropping the scene drops every contained runtime.
#[derive(Debug)]
pub struct Scene {
    nodes: SlotMap<NodeKey, Node>,
    roots: Vec<NodeKey>,
    cameras: SlotMap<CameraKey, Camera>,
    lights: SlotMap<LightKey, Light>,
    active_camera: Option<CameraKey>,
    active_light: Option<LightKey>,
    scene_runtimes: Vec<AttributeRuntime>,
    node_schema: String,
    broadcast_pending: bool,
}

impl Scene {
    /// Create a scene whose nodes instantiate `node_schema`. The schema
    /// must declare a mat4 `model` attribute; propagation writes the
    /// resolved world transform there. One runtime is instantiated per
    /// Scene-scope schema in the registry, in sorted id order.
    pub fn new(registry: &SchemaRegistry, node_schema: &str) -> Result<Self> {
        let schema = registry.get(node_schema)?;
        let model_kind = schema.attribute("model").map(|decl| decl.default.kind());
        if model_kind != Some(ValueKind::Mat4) {
            return Err(Error::InvalidSchema {
                id: node_schema.to_string(),
                reason: "node schema must declare a mat4 'model' attribute".to_string(),
            });
        }

        let mut scene_runtimes = Vec::new();
        for id in registry.ids_with_scope(BindingScope::Scene) {
            scene_runtimes.push(AttributeRuntime::new(registry, &id)?);
        }
        log::debug!(
            "scene created: node schema '{node_schema}', {} scene-scope runtime(s)",
            scene_runtimes.len()
        );

        Ok(Self {
            nodes: SlotMap::with_key(),
            roots: Vec::new(),
            cameras: SlotMap::with_key(),
            lights: SlotMap::with_key(),
            active_camera: None,
            active_light: None,
            scene_runtimes,
            node_schema: node_schema.to_string(),
            broadcast_pending: false,
        })
    }

    // -----------------------------------------------------------------
    // Hierarchy
    // -----------------------------------------------------------------

    /// Add a root node. It stays `Detached` until the first `update`.
    pub fn add_node(&mut self, registry: &SchemaRegistry, local: Mat4) -> Result<NodeKey> {
        let binding = AttributeRuntime::new(registry, &self.node_schema)?;
        let key = self.nodes.insert(Node {
            local,
            world: Mat4::IDENTITY,
            state: NodeState::Detached,
            parent: None,
            children: Vec::new(),
            binding,
            mesh: None,
        });
        self.roots.push(key);
        Ok(key)
    }

    /// Add a node under `parent`.
    pub fn add_child(
        &mut self,
        registry: &SchemaRegistry,
        parent: NodeKey,
        local: Mat4,
    ) -> Result<NodeKey> {
        if !self.nodes.contains_key(parent) {
            return Err(Error::InvalidHandle("scene node"));
        }
        let binding = AttributeRuntime::new(registry, &self.node_schema)?;
        let key = self.nodes.insert(Node {
            local,
            world: Mat4::IDENTITY,
            state: NodeState::Stale,
            parent: Some(parent),
            children: Vec::new(),
            binding,
            mesh: None,
        });
        if let Some(node) = self.nodes.get_mut(parent) {
            node.children.push(key);
        }
        Ok(key)
    }

    /// Move an existing node (and its subtree) under a new parent.
    /// Attaching a node beneath itself is rejected.
    pub fn attach(&mut self, parent: NodeKey, child: NodeKey) -> Result<()> {
        if !self.nodes.contains_key(parent) || !self.nodes.contains_key(child) {
            return Err(Error::InvalidHandle("scene node"));
        }
        let mut cursor = Some(parent);
        while let Some(key) = cursor {
            if key == child {
                return Err(Error::InvalidHandle("scene node cycle"));
            }
            cursor = self.nodes.get(key).and_then(|n| n.parent);
        }

        self.unlink(child);
        if let Some(node) = self.nodes.get_mut(child) {
            node.parent = Some(parent);
        }
        if let Some(node) = self.nodes.get_mut(parent) {
            node.children.push(child);
        }
        self.mark_subtree_stale(child);
        Ok(())
    }

    /// Remove a node and its whole subtree. Handles into the subtree
    /// become invalid.
    pub fn remove_node(&mut self, key: NodeKey) -> Result<()> {
        if !self.nodes.contains_key(key) {
            return Err(Error::InvalidHandle("scene node"));
        }
        self.unlink(key);
        let mut stack = vec![key];
        while let Some(cursor) = stack.pop() {
            if let Some(node) = self.nodes.remove(cursor) {
                stack.extend(node.children);
            }
        }
        Ok(())
    }

    pub fn set_local_transform(&mut self, key: NodeKey, local: Mat4) -> Result<()> {
        match self.nodes.get_mut(key) {
            Some(node) => {
                node.local = local;
                self.mark_subtree_stale(key);
                Ok(())
            }
            None => Err(Error::InvalidHandle("scene node")),
        }
    }

    pub fn local_transform(&self, key: NodeKey) -> Result<Mat4> {
        self.node(key).map(|n| n.local)
    }

    /// Last resolved world transform. Identity until the node's first
    /// resolution; check `node_state` when freshness matters.
    pub fn world_transform(&self, key: NodeKey) -> Result<Mat4> {
        self.node(key).map(|n| n.world)
    }

    pub fn node_state(&self, key: NodeKey) -> Result<NodeState> {
        self.node(key).map(|n| n.state)
    }

    pub fn parent(&self, key: NodeKey) -> Result<Option<NodeKey>> {
        self.node(key).map(|n| n.parent)
    }

    pub fn children(&self, key: NodeKey) -> Result<&[NodeKey]> {
        self.node(key).map(|n| n.children.as_slice())
    }

    pub fn roots(&self) -> &[NodeKey] {
        &self.roots
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn node_binding(&self, key: NodeKey) -> Result<&AttributeRuntime> {
        self.node(key).map(|n| &n.binding)
    }

    pub fn node_binding_mut(&mut self, key: NodeKey) -> Result<&mut AttributeRuntime> {
        match self.nodes.get_mut(key) {
            Some(node) => Ok(&mut node.binding),
            None => Err(Error::InvalidHandle("scene node")),
        }
    }

    pub fn set_mesh_instance(&mut self, key: NodeKey, mesh: MeshInstance) -> Result<()> {
        match self.nodes.get_mut(key) {
            Some(node) => {
                node.mesh = Some(mesh);
                Ok(())
            }
            None => Err(Error::InvalidHandle("scene node")),
        }
    }

    pub fn mesh_instance(&self, key: NodeKey) -> Result<Option<&MeshInstance>> {
        self.node(key).map(|n| n.mesh.as_ref())
    }

    /// Keys of every node carrying a mesh instance, in storage order.
    pub fn mesh_nodes(&self) -> Vec<NodeKey> {
        self.nodes
            .iter()
            .filter(|(_, node)| node.mesh.is_some())
            .map(|(key, _)| key)
            .collect()
    }

    fn node(&self, key: NodeKey) -> Result<&Node> {
        self.nodes.get(key).ok_or(Error::InvalidHandle("scene node"))
    }

    fn unlink(&mut self, child: NodeKey) {
        let parent = self.nodes.get(child).and_then(|n| n.parent);
        match parent {
            Some(p) => {
                if let Some(node) = self.nodes.get_mut(p) {
                    node.children.retain(|k| *k != child);
                }
            }
            None => self.roots.retain(|k| *k != child),
        }
        if let Some(node) = self.nodes.get_mut(child) {
            node.parent = None;
        }
    }

    fn mark_subtree_stale(&mut self, key: NodeKey) {
        let mut stack = vec![key];
        while let Some(cursor) = stack.pop() {
            if let Some(node) = self.nodes.get_mut(cursor) {
                node.state = NodeState::Stale;
                stack.extend(node.children.iter().copied());
            }
        }
    }

    // -----------------------------------------------------------------
    // Cameras and lights
    // -----------------------------------------------------------------

    /// Add a camera. The first one added becomes active.
    pub fn add_camera(&mut self, camera: Camera) -> CameraKey {
        let key = self.cameras.insert(camera);
        if self.active_camera.is_none() {
            self.active_camera = Some(key);
        }
        self.broadcast_pending = true;
        key
    }

    pub fn camera(&self, key: CameraKey) -> Result<&Camera> {
        self.cameras.get(key).ok_or(Error::InvalidHandle("camera"))
    }

    /// Mutable camera access. Marks the camera broadcast pending; the
    /// next `update` pushes the new matrices out.
    pub fn camera_mut(&mut self, key: CameraKey) -> Result<&mut Camera> {
        let camera = self
            .cameras
            .get_mut(key)
            .ok_or(Error::InvalidHandle("camera"))?;
        self.broadcast_pending = true;
        Ok(camera)
    }

    pub fn active_camera(&self) -> Option<CameraKey> {
        self.active_camera
    }

    pub fn set_active_camera(&mut self, key: CameraKey) -> Result<()> {
        if !self.cameras.contains_key(key) {
            return Err(Error::InvalidHandle("camera"));
        }
        self.active_camera = Some(key);
        self.broadcast_pending = true;
        Ok(())
    }

    /// Add a light. The first one added becomes active.
    pub fn add_light(&mut self, light: Light) -> LightKey {
        let key = self.lights.insert(light);
        if self.active_light.is_none() {
            self.active_light = Some(key);
        }
        self.broadcast_pending = true;
        key
    }

    pub fn light(&self, key: LightKey) -> Result<&Light> {
        self.lights.get(key).ok_or(Error::InvalidHandle("light"))
    }

    pub fn light_mut(&mut self, key: LightKey) -> Result<&mut Light> {
        let light = self
            .lights
            .get_mut(key)
            .ok_or(Error::InvalidHandle("light"))?;
        self.broadcast_pending = true;
        Ok(light)
    }

    pub fn active_light(&self) -> Option<LightKey> {
        self.active_light
    }

    pub fn set_active_light(&mut self, key: LightKey) -> Result<()> {
        if !self.lights.contains_key(key) {
            return Err(Error::InvalidHandle("light"));
        }
        self.active_light = Some(key);
        self.broadcast_pending = true;
        Ok(())
    }

    pub fn remove_camera(&mut self, key: CameraKey) -> Result<()> {
        if self.cameras.remove(key).is_none() {
            return Err(Error::InvalidHandle("camera"));
        }
        if self.active_camera == Some(key) {
            self.active_camera = None;
        }
        Ok(())
    }

    pub fn remove_light(&mut self, key: LightKey) -> Result<()> {
        if self.lights.remove(key).is_none() {
            return Err(Error::InvalidHandle("light"));
        }
        if self.active_light == Some(key) {
            self.active_light = None;
        }
        Ok(())
    }

    // -----------------------------------------------------------------
    // Scene-scope runtimes
    // -----------------------------------------------------------------

    /// Instantiate a runtime for a Scene-scope schema registered after
    /// this scene was created. Replaces any runtime already held under
    /// the id and schedules the broadcast, so the newcomer picks up the
    /// current camera and light on the next `update`.
    pub fn add_scene_runtime(&mut self, registry: &SchemaRegistry, schema_id: &str) -> Result<()> {
        if registry.get(schema_id)?.scope() != BindingScope::Scene {
            return Err(Error::InvalidSchema {
                id: schema_id.to_string(),
                reason: "scene runtimes require scene scope".to_string(),
            });
        }
        let runtime = AttributeRuntime::new(registry, schema_id)?;
        match self
            .scene_runtimes
            .iter_mut()
            .find(|r| r.schema_id() == schema_id)
        {
            Some(existing) => *existing = runtime,
            None => self.scene_runtimes.push(runtime),
        }
        self.broadcast_pending = true;
        Ok(())
    }

    pub fn scene_runtimes(&self) -> &[AttributeRuntime] {
        &self.scene_runtimes
    }

    pub fn scene_runtime(&self, schema_id: &str) -> Option<&AttributeRuntime> {
        self.scene_runtimes.iter().find(|r| r.schema_id() == schema_id)
    }

    pub fn scene_runtime_mut(&mut self, schema_id: &str) -> Option<&mut AttributeRuntime> {
        self.scene_runtimes
            .iter_mut()
            .find(|r| r.schema_id() == schema_id)
    }

    // -----------------------------------------------------------------
    // Frame update
    // -----------------------------------------------------------------

    pub fn needs_update(&self) -> bool {
        self.broadcast_pending || self.nodes.values().any(|n| n.state != NodeState::Resolved)
    }

    /// Two-phase frame update: resolve stale world transforms in one
    /// preorder traversal (parents strictly before children), then push
    /// camera/light attributes into declaring Scene-scope runtimes.
    pub fn update(&mut self) -> Result<()> {
        let mut stack: Vec<(NodeKey, Mat4, bool)> = Vec::with_capacity(self.roots.len());
        for root in self.roots.iter().rev() {
            stack.push((*root, Mat4::IDENTITY, false));
        }
        while let Some((key, parent_world, parent_moved)) = stack.pop() {
            let Some(node) = self.nodes.get_mut(key) else {
                continue;
            };
            let recompute = parent_moved || node.state != NodeState::Resolved;
            if recompute {
                node.world = parent_world * node.local;
                let world = node.world;
                node.binding.set("model", world)?;
                node.state = NodeState::Resolved;
            }
            let world = node.world;
            for child in &node.children {
                stack.push((*child, world, recompute));
            }
        }

        if self.broadcast_pending {
            self.broadcast_view_state()?;
            self.broadcast_pending = false;
        }
        Ok(())
    }

    /// Push `cameraPosition`/`view`/`projection`/`lightDirection` into
    /// every Scene-scope runtime declaring them. Probe with `has` first,
    /// so runtimes without these attributes are untouched.
    fn broadcast_view_state(&mut self) -> Result<()> {
        let mut values: Vec<(&str, AttributeValue)> = Vec::with_capacity(4);
        if let Some(camera) = self.active_camera.and_then(|k| self.cameras.get(k)) {
            values.push((
                "cameraPosition",
                AttributeValue::Vec4(camera.position.extend(1.0)),
            ));
            values.push(("view", AttributeValue::Mat4(camera.view_matrix())));
            values.push(("projection", AttributeValue::Mat4(camera.proj_matrix())));
        }
        if let Some(light) = self.active_light.and_then(|k| self.lights.get(k)) {
            values.push((
                "lightDirection",
                AttributeValue::Vec4(light.normalized_direction().extend(0.0)),
            ));
        }

        for runtime in &mut self.scene_runtimes {
            for (name, value) in &values {
                if runtime.has(name) {
                    runtime.set(name, value.clone())?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Vec3, Vec4};

    use crate::schema::AttributeSchema;

    fn registry() -> SchemaRegistry {
        let mut reg = SchemaRegistry::new();
        reg.register(
            "node_transform",
            AttributeSchema::new(BindingScope::Node, 1).with_attribute("model", Mat4::IDENTITY),
        )
        .unwrap();
        reg.register(
            "frame",
            AttributeSchema::new(BindingScope::Scene, 1)
                .with_attribute("view", Mat4::IDENTITY)
                .with_attribute("projection", Mat4::IDENTITY)
                .with_attribute("cameraPosition", Vec4::W)
                .with_attribute("lightDirection", Vec4::ZERO),
        )
        .unwrap();
        reg.register(
            "fog",
            AttributeSchema::new(BindingScope::Scene, 1)
                .with_attribute("fogColor", Vec4::new(0.5, 0.6, 0.7, 1.0)),
        )
        .unwrap();
        reg
    }

    fn scene(reg: &SchemaRegistry) -> Scene {
        Scene::new(reg, "node_transform").unwrap()
    }

    fn assert_mat4_eq(a: Mat4, b: Mat4) {
        let (a, b) = (a.to_cols_array(), b.to_cols_array());
        for i in 0..16 {
            assert!((a[i] - b[i]).abs() < 1e-5, "element {i}: {} != {}", a[i], b[i]);
        }
    }

    #[test]
    fn node_schema_must_declare_model() {
        let mut reg = SchemaRegistry::new();
        reg.register(
            "bare",
            AttributeSchema::new(BindingScope::Node, 1).with_attribute("tint", Vec4::ONE),
        )
        .unwrap();
        assert!(matches!(
            Scene::new(&reg, "bare").unwrap_err(),
            Error::InvalidSchema { .. }
        ));
        assert!(Scene::new(&reg, "missing").unwrap_err().is_not_found());
    }

    #[test]
    fn three_level_chain_composes_parent_first() {
        let reg = registry();
        let mut scene = scene(&reg);

        let l0 = Mat4::from_translation(Vec3::new(1.0, 0.0, 0.0));
        let l1 = Mat4::from_rotation_z(std::f32::consts::FRAC_PI_2);
        let l2 = Mat4::from_translation(Vec3::new(0.0, 2.0, 0.0));

        let root = scene.add_node(&reg, l0).unwrap();
        let child = scene.add_child(&reg, root, l1).unwrap();
        let leaf = scene.add_child(&reg, child, l2).unwrap();

        scene.update().unwrap();
        assert_mat4_eq(scene.world_transform(leaf).unwrap(), l0 * l1 * l2);
        assert_mat4_eq(scene.world_transform(child).unwrap(), l0 * l1);
        assert_eq!(scene.node_state(leaf).unwrap(), NodeState::Resolved);

        // The resolved world lands in the node's binding as 'model'.
        assert_eq!(
            scene.node_binding(leaf).unwrap().get("model").unwrap(),
            AttributeValue::Mat4(scene.world_transform(leaf).unwrap())
        );
    }

    #[test]
    fn local_edit_restales_only_the_subtree() {
        let reg = registry();
        let mut scene = scene(&reg);

        let l0 = Mat4::from_translation(Vec3::X);
        let l2 = Mat4::from_translation(Vec3::Y);
        let root = scene.add_node(&reg, l0).unwrap();
        let child = scene.add_child(&reg, root, Mat4::IDENTITY).unwrap();
        let leaf = scene.add_child(&reg, child, l2).unwrap();
        scene.update().unwrap();

        let l1 = Mat4::from_scale(Vec3::splat(2.0));
        scene.set_local_transform(child, l1).unwrap();
        assert_eq!(scene.node_state(root).unwrap(), NodeState::Resolved);
        assert_eq!(scene.node_state(child).unwrap(), NodeState::Stale);
        assert_eq!(scene.node_state(leaf).unwrap(), NodeState::Stale);
        assert!(scene.needs_update());

        scene.update().unwrap();
        assert_mat4_eq(scene.world_transform(leaf).unwrap(), l0 * l1 * l2);
        assert!(!scene.needs_update());
    }

    #[test]
    fn nodes_start_detached_and_resolve_on_update() {
        let reg = registry();
        let mut scene = scene(&reg);

        let local = Mat4::from_translation(Vec3::new(0.0, 3.0, 0.0));
        let root = scene.add_node(&reg, local).unwrap();
        assert_eq!(scene.node_state(root).unwrap(), NodeState::Detached);

        let child = scene.add_child(&reg, root, Mat4::IDENTITY).unwrap();
        assert_eq!(scene.node_state(child).unwrap(), NodeState::Stale);

        scene.update().unwrap();
        assert_eq!(scene.node_state(root).unwrap(), NodeState::Resolved);
        assert_mat4_eq(scene.world_transform(root).unwrap(), local);
        assert_mat4_eq(scene.world_transform(child).unwrap(), local);
    }

    #[test]
    fn reparenting_restales_and_rejects_cycles() {
        let reg = registry();
        let mut scene = scene(&reg);

        let a = scene.add_node(&reg, Mat4::from_translation(Vec3::X)).unwrap();
        let b = scene.add_node(&reg, Mat4::from_translation(Vec3::Y)).unwrap();
        let c = scene.add_child(&reg, b, Mat4::from_translation(Vec3::Z)).unwrap();
        scene.update().unwrap();

        scene.attach(a, b).unwrap();
        assert_eq!(scene.parent(b).unwrap(), Some(a));
        assert_eq!(scene.node_state(c).unwrap(), NodeState::Stale);
        assert_eq!(scene.roots(), &[a]);

        scene.update().unwrap();
        assert_mat4_eq(
            scene.world_transform(c).unwrap(),
            Mat4::from_translation(Vec3::X)
                * Mat4::from_translation(Vec3::Y)
                * Mat4::from_translation(Vec3::Z),
        );

        // b is an ancestor of c; attaching b under c would loop.
        assert!(scene.attach(c, b).unwrap_err().is_invalid_handle());
        assert!(scene.attach(a, a).unwrap_err().is_invalid_handle());
    }

    #[test]
    fn removed_handles_are_rejected() {
        let reg = registry();
        let mut scene = scene(&reg);

        let root = scene.add_node(&reg, Mat4::IDENTITY).unwrap();
        let child = scene.add_child(&reg, root, Mat4::IDENTITY).unwrap();
        let leaf = scene.add_child(&reg, child, Mat4::IDENTITY).unwrap();

        scene.remove_node(child).unwrap();
        assert_eq!(scene.node_count(), 1);
        assert!(scene.children(root).unwrap().is_empty());

        assert!(scene.world_transform(child).unwrap_err().is_invalid_handle());
        assert!(scene.world_transform(leaf).unwrap_err().is_invalid_handle());
        assert!(scene
            .set_local_transform(leaf, Mat4::IDENTITY)
            .unwrap_err()
            .is_invalid_handle());
        assert!(scene.remove_node(child).unwrap_err().is_invalid_handle());
    }

    #[test]
    fn broadcast_reaches_declaring_runtimes_only() {
        let reg = registry();
        let mut scene = scene(&reg);

        let camera = Camera::new(
            Vec3::new(0.0, 2.0, -6.0),
            0.0,
            0.0,
            std::f32::consts::FRAC_PI_4,
            1.5,
            0.1,
            100.0,
        );
        let view = camera.view_matrix();
        let proj = camera.proj_matrix();
        let cam_key = scene.add_camera(camera);
        scene.add_light(Light::directional(Vec3::NEG_Y));

        scene.update().unwrap();

        let frame = scene.scene_runtime("frame").unwrap();
        assert_eq!(frame.get("view").unwrap(), AttributeValue::Mat4(view));
        assert_eq!(frame.get("projection").unwrap(), AttributeValue::Mat4(proj));
        assert_eq!(
            frame.get("cameraPosition").unwrap(),
            AttributeValue::Vec4(Vec4::new(0.0, 2.0, -6.0, 1.0))
        );
        assert_eq!(
            frame.get("lightDirection").unwrap(),
            AttributeValue::Vec4(Vec4::new(0.0, -1.0, 0.0, 0.0))
        );

        // The fog runtime declares none of these and keeps its default.
        let fog = scene.scene_runtime("fog").unwrap();
        assert_eq!(
            fog.get("fogColor").unwrap(),
            AttributeValue::Vec4(Vec4::new(0.5, 0.6, 0.7, 1.0))
        );

        // Moving the camera re-broadcasts on the next update.
        scene.camera_mut(cam_key).unwrap().set_position(Vec3::new(4.0, 0.0, 0.0));
        assert!(scene.needs_update());
        scene.update().unwrap();
        assert_eq!(
            scene.scene_runtime("frame").unwrap().get("cameraPosition").unwrap(),
            AttributeValue::Vec4(Vec4::new(4.0, 0.0, 0.0, 1.0))
        );
    }

    #[test]
    fn camera_and_light_handles_are_checked() {
        let reg = registry();
        let mut scene = scene(&reg);

        let cam = scene.add_camera(Camera::new(
            Vec3::ZERO,
            0.0,
            0.0,
            1.0,
            1.0,
            0.1,
            10.0,
        ));
        assert_eq!(scene.active_camera(), Some(cam));
        assert!(scene.camera(cam).is_ok());

        let light = scene.add_light(Light::default());
        assert_eq!(scene.active_light(), Some(light));
        assert!(scene.light_mut(light).is_ok());

        // Stale keys are rejected after removal.
        scene.remove_camera(cam).unwrap();
        assert_eq!(scene.active_camera(), None);
        assert!(scene.camera(cam).unwrap_err().is_invalid_handle());
        assert!(scene.set_active_camera(cam).unwrap_err().is_invalid_handle());

        scene.remove_light(light).unwrap();
        assert!(scene.light(light).unwrap_err().is_invalid_handle());
        assert!(scene.remove_light(light).unwrap_err().is_invalid_handle());
    }

    #[test]
    fn switching_the_active_light_redirects_the_broadcast() {
        let reg = registry();
        let mut scene = scene(&reg);

        let first = scene.add_light(Light::directional(Vec3::NEG_Y));
        let second = scene.add_light(Light::directional(Vec3::X));
        assert_eq!(scene.active_light(), Some(first));

        scene.update().unwrap();
        assert_eq!(
            scene.scene_runtime("frame").unwrap().get("lightDirection").unwrap(),
            AttributeValue::Vec4(Vec4::new(0.0, -1.0, 0.0, 0.0))
        );

        scene.set_active_light(second).unwrap();
        scene.update().unwrap();
        assert_eq!(
            scene.scene_runtime("frame").unwrap().get("lightDirection").unwrap(),
            AttributeValue::Vec4(Vec4::new(1.0, 0.0, 0.0, 0.0))
        );

        scene.remove_light(second).unwrap();
        assert!(scene.set_active_light(second).unwrap_err().is_invalid_handle());
    }

    #[test]
    fn late_registered_scene_schema_joins_the_broadcast() {
        let mut reg = registry();
        let mut scene = scene(&reg);
        assert_eq!(scene.scene_runtimes().len(), 2);

        scene.add_camera(Camera::new(
            Vec3::new(0.0, 0.0, -4.0),
            0.0,
            0.0,
            1.0,
            1.0,
            0.1,
            10.0,
        ));
        scene.update().unwrap();

        reg.register(
            "exposure",
            AttributeSchema::new(BindingScope::Scene, 1)
                .with_attribute("cameraPosition", Vec4::W),
        )
        .unwrap();
        scene.add_scene_runtime(&reg, "exposure").unwrap();
        assert!(scene.needs_update());
        scene.update().unwrap();

        assert_eq!(
            scene.scene_runtime("exposure").unwrap().get("cameraPosition").unwrap(),
            AttributeValue::Vec4(Vec4::new(0.0, 0.0, -4.0, 1.0))
        );

        // Re-adding an id replaces the held runtime rather than duplicating.
        scene.add_scene_runtime(&reg, "fog").unwrap();
        assert_eq!(scene.scene_runtimes().len(), 3);

        assert!(matches!(
            scene.add_scene_runtime(&reg, "node_transform").unwrap_err(),
            Error::InvalidSchema { .. }
        ));
        assert!(scene
            .add_scene_runtime(&reg, "missing")
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn mesh_instances_attach_to_nodes() {
        let reg = registry();
        let mut scene = scene(&reg);

        let root = scene.add_node(&reg, Mat4::IDENTITY).unwrap();
        let child = scene.add_child(&reg, root, Mat4::IDENTITY).unwrap();
        scene
            .set_mesh_instance(child, MeshInstance::new("cube", "steel"))
            .unwrap();

        assert_eq!(scene.mesh_instance(root).unwrap(), None);
        assert_eq!(
            scene.mesh_instance(child).unwrap(),
            Some(&MeshInstance::new("cube", "steel"))
        );
        assert_eq!(scene.mesh_nodes(), vec![child]);
    }
}
