/// Central resource storage.
///
/// Owns every resource behind a `Rid`, the dirty queues and the instance
/// registry. Per-kind APIs (`create_texture`, `material_set_param`, ...) are
/// implemented next to each resource type, in `impl ResourceManager` blocks.
///
/// Everything runs on the render/update thread. Mutations only record state
/// and enqueue work; `update_dirty_resources()` is the single place derived
/// data (compiled shaders, material uniform blocks) is rebuilt.

use std::sync::{Arc, Mutex, MutexGuard};
use slotmap::SecondaryMap;
use crate::backend::{GraphicsDevice, ShaderCompiler};
use crate::config::{StorageConfig, StorageInfo};
use crate::error::{Error, Result};
use crate::resource::dependency::{
    AsInstantiable, InstanceBase, InstanceRegistry, Instantiable, Notification,
};
use crate::resource::handle::{
    BaseType, HandleRegistry, InstanceKey, LightHandle, LightShadowHandle, MaterialHandle,
    MeshHandle, OccluderHandle, RenderTargetHandle, Rid, ShaderHandle, TextureHandle,
};
use crate::resource::light::Light;
use crate::resource::material::Material;
use crate::resource::mesh::Mesh;
use crate::resource::occluder::{CanvasLightShadow, CanvasOccluder};
use crate::resource::render_target::RenderTarget;
use crate::resource::shader::Shader;
use crate::resource::texture::Texture;

/// Central resource manager
pub struct ResourceManager {
    /// GPU allocation backend
    pub(crate) device: Arc<Mutex<dyn GraphicsDevice>>,
    /// Shading-language compiler backend
    pub(crate) compiler: Arc<Mutex<dyn ShaderCompiler>>,
    pub(crate) config: StorageConfig,
    pub(crate) info: StorageInfo,

    /// Identity and kind of every live resource
    pub(crate) registry: HandleRegistry,
    /// Externally owned instances (held weakly)
    pub(crate) instances: InstanceRegistry,

    pub(crate) textures: SecondaryMap<Rid, Texture>,
    pub(crate) shaders: SecondaryMap<Rid, Shader>,
    pub(crate) materials: SecondaryMap<Rid, Material>,
    pub(crate) meshes: SecondaryMap<Rid, Mesh>,
    pub(crate) lights: SecondaryMap<Rid, Light>,
    pub(crate) render_targets: SecondaryMap<Rid, RenderTarget>,
    pub(crate) occluders: SecondaryMap<Rid, CanvasOccluder>,
    pub(crate) light_shadows: SecondaryMap<Rid, CanvasLightShadow>,

    /// Shaders waiting for recompilation, in enqueue order
    pub(crate) shader_dirty_list: Vec<ShaderHandle>,
    /// Materials waiting for a uniform block rebuild, in enqueue order
    pub(crate) material_dirty_list: Vec<MaterialHandle>,
}

impl ResourceManager {
    /// Create an empty resource manager
    pub fn new(
        device: Arc<Mutex<dyn GraphicsDevice>>,
        compiler: Arc<Mutex<dyn ShaderCompiler>>,
        config: StorageConfig,
    ) -> Self {
        Self {
            device,
            compiler,
            config,
            info: StorageInfo::default(),
            registry: HandleRegistry::new(),
            instances: InstanceRegistry::new(),
            textures: SecondaryMap::new(),
            shaders: SecondaryMap::new(),
            materials: SecondaryMap::new(),
            meshes: SecondaryMap::new(),
            lights: SecondaryMap::new(),
            render_targets: SecondaryMap::new(),
            occluders: SecondaryMap::new(),
            light_shadows: SecondaryMap::new(),
            shader_dirty_list: Vec::new(),
            material_dirty_list: Vec::new(),
        }
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Current statistics
    pub fn info(&self) -> StorageInfo {
        StorageInfo {
            resource_count: self.registry.len() as u32,
            instance_count: self.instances.len() as u32,
            ..self.info
        }
    }

    // ===== HANDLES =====

    /// Kind of resource `rid` refers to, or `None` if it is not live
    pub fn get_base_type(&self, rid: impl Into<Rid>) -> Option<BaseType> {
        self.registry.kind(rid.into())
    }

    /// Whether `rid` names a live resource
    pub fn owns(&self, rid: impl Into<Rid>) -> bool {
        self.get_base_type(rid).is_some()
    }

    /// Free any resource.
    ///
    /// Runs the kind-specific cascade, then invalidates the handle. Returns
    /// `false` (and logs) for unknown handles and for textures owned by a
    /// render target.
    pub fn free(&mut self, rid: impl Into<Rid>) -> bool {
        let rid = rid.into();
        let Some(kind) = self.registry.kind(rid) else {
            crate::engine_error!("galaxy3d::ResourceManager", "free: invalid handle {:?}", rid);
            return false;
        };

        let freed = match kind {
            BaseType::Texture => self.free_texture(TextureHandle::from_rid(rid)),
            BaseType::Shader => self.free_shader(ShaderHandle::from_rid(rid)),
            BaseType::Material => self.free_material(MaterialHandle::from_rid(rid)),
            BaseType::Mesh => self.free_mesh(MeshHandle::from_rid(rid)),
            BaseType::Light => self.free_light(LightHandle::from_rid(rid)),
            BaseType::RenderTarget => self.free_render_target(RenderTargetHandle::from_rid(rid)),
            BaseType::CanvasOccluder => self.free_canvas_occluder(OccluderHandle::from_rid(rid)),
            BaseType::CanvasLightShadow => self.free_canvas_light_shadow(LightShadowHandle::from_rid(rid)),
        };

        if freed {
            self.registry.release(rid);
            crate::engine_trace!("galaxy3d::ResourceManager", "Freed {:?} {:?}", kind, rid);
        }
        freed
    }

    /// Free every resource, dependents first
    pub fn free_all(&mut self) {
        let order = [
            BaseType::Mesh,
            BaseType::Light,
            BaseType::CanvasOccluder,
            BaseType::CanvasLightShadow,
            BaseType::RenderTarget,
            BaseType::Material,
            BaseType::Shader,
            BaseType::Texture,
        ];
        for kind in order {
            let rids: Vec<Rid> = match kind {
                BaseType::Mesh => self.meshes.keys().collect(),
                BaseType::Light => self.lights.keys().collect(),
                BaseType::CanvasOccluder => self.occluders.keys().collect(),
                BaseType::CanvasLightShadow => self.light_shadows.keys().collect(),
                BaseType::RenderTarget => self.render_targets.keys().collect(),
                BaseType::Material => self.materials.keys().collect(),
                BaseType::Shader => self.shaders.keys().collect(),
                BaseType::Texture => self.textures.keys().collect(),
            };
            for rid in rids {
                self.free(rid);
            }
        }
    }

    // ===== INSTANCES =====

    /// Register an external instance. The storage layer only keeps a weak reference.
    pub fn register_instance(&mut self, instance: Arc<dyn InstanceBase>) -> InstanceKey {
        self.instances.register(&instance)
    }

    /// Unregister an instance and detach it from every base and material
    pub fn unregister_instance(&mut self, instance: InstanceKey) -> bool {
        let Some(record) = self.instances.remove(instance) else {
            crate::engine_error!("galaxy3d::ResourceManager", "Unknown instance {:?}", instance);
            return false;
        };
        for base in record.bases {
            if let Some(instantiable) = self.instantiable_mut(base) {
                instantiable.remove_instance(instance);
            }
        }
        for material in record.materials {
            if let Some(mat) = self.materials.get_mut(material) {
                mat.instance_owners.remove(instance);
            }
        }
        true
    }

    pub fn is_instance_registered(&self, instance: InstanceKey) -> bool {
        self.instances.contains(instance)
    }

    /// Make `instance` depend on an instantiable resource (mesh or light)
    pub fn instance_add_dependency(&mut self, base: impl Into<Rid>, instance: InstanceKey) -> bool {
        let base = base.into();
        if !self.instances.contains(instance) {
            crate::engine_error!("galaxy3d::ResourceManager", "Unknown instance {:?}", instance);
            return false;
        }
        let Some(instantiable) = self.instantiable_mut(base) else {
            crate::engine_error!("galaxy3d::ResourceManager",
                "Resource {:?} is not a live instantiable resource", base);
            return false;
        };
        instantiable.add_instance(instance);
        if let Some(record) = self.instances.record_mut(instance) {
            record.bases.insert(base);
        }
        true
    }

    /// Remove a dependency added with `instance_add_dependency`
    pub fn instance_remove_dependency(&mut self, base: impl Into<Rid>, instance: InstanceKey) -> bool {
        let base = base.into();
        let Some(instantiable) = self.instantiable_mut(base) else {
            crate::engine_error!("galaxy3d::ResourceManager",
                "Resource {:?} is not a live instantiable resource", base);
            return false;
        };
        let removed = instantiable.remove_instance(instance);
        if let Some(record) = self.instances.record_mut(instance) {
            record.bases.remove(&base);
        }
        removed
    }

    /// Back-reference set of an instantiable resource
    pub fn instantiable(&self, base: impl Into<Rid>) -> Option<&Instantiable> {
        let base = base.into();
        match self.registry.kind(base)? {
            BaseType::Mesh => self.meshes.get(base).map(|m| m.instantiable()),
            BaseType::Light => self.lights.get(base).map(|l| l.instantiable()),
            _ => None,
        }
    }

    pub(crate) fn instantiable_mut(&mut self, base: Rid) -> Option<&mut Instantiable> {
        match self.registry.kind(base)? {
            BaseType::Mesh => self.meshes.get_mut(base).map(|m| m.instantiable_mut()),
            BaseType::Light => self.lights.get_mut(base).map(|l| l.instantiable_mut()),
            _ => None,
        }
    }

    // ===== NOTIFICATIONS =====

    /// Tell every instance of `base` that its shape or content changed
    pub fn notify_structure_changed(&mut self, base: impl Into<Rid>) {
        let base = base.into();
        let targets = self.instantiable(base).map(|i| i.snapshot()).unwrap_or_default();
        self.dispatch(&targets, Notification::BaseChanged(base));
    }

    /// Tell every instance of `base` that a material it uses changed
    pub fn notify_material_changed(&mut self, base: impl Into<Rid>) {
        let base = base.into();
        let targets = self.instantiable(base).map(|i| i.snapshot()).unwrap_or_default();
        self.dispatch(&targets, Notification::BaseMaterialChanged(base));
    }

    /// Deliver a notification, then prune instances that were dropped
    pub(crate) fn dispatch(&mut self, targets: &[InstanceKey], notification: Notification) {
        if targets.is_empty() {
            return;
        }
        let dead = self.instances.dispatch(targets, notification);
        for instance in dead {
            crate::engine_debug!("galaxy3d::ResourceManager",
                "Pruning dropped instance {:?}", instance);
            self.unregister_instance(instance);
        }
    }

    /// Empty the back-reference set of a base being freed, notifying each instance once
    pub(crate) fn drain_instances(&mut self, base: Rid) {
        let drained = match self.instantiable_mut(base) {
            Some(instantiable) => instantiable.drain(),
            None => return,
        };
        for &instance in &drained {
            if let Some(record) = self.instances.record_mut(instance) {
                record.bases.remove(&base);
            }
        }
        crate::engine_trace!("galaxy3d::ResourceManager",
            "Notifying {} instance(s) of removal of {:?}", drained.len(), base);
        self.dispatch(&drained, Notification::BaseRemoved(base));
    }

    // ===== FRAME HOOK =====

    /// Rebuild everything that went stale since the last call.
    ///
    /// Shaders are recompiled before materials are rebuilt, so materials
    /// always see the layout of the current shader code.
    pub fn update_dirty_resources(&mut self) {
        self.flush_dirty_shaders();
        self.flush_dirty_materials();
    }

    /// Number of shaders waiting for recompilation
    pub fn dirty_shader_count(&self) -> usize {
        self.shader_dirty_list.len()
    }

    /// Number of materials waiting for a rebuild
    pub fn dirty_material_count(&self) -> usize {
        self.material_dirty_list.len()
    }
}

impl Drop for ResourceManager {
    fn drop(&mut self) {
        self.free_all();
    }
}

// ===== HELPERS =====

/// Lock the graphics device
pub(crate) fn lock_device(device: &Arc<Mutex<dyn GraphicsDevice>>) -> Result<MutexGuard<'_, dyn GraphicsDevice + 'static>> {
    device.lock()
        .map_err(|_| Error::BackendError("GraphicsDevice lock poisoned".to_string()))
}

/// Lock the shader compiler
pub(crate) fn lock_compiler(compiler: &Arc<Mutex<dyn ShaderCompiler>>) -> Result<MutexGuard<'_, dyn ShaderCompiler + 'static>> {
    compiler.lock()
        .map_err(|_| Error::BackendError("ShaderCompiler lock poisoned".to_string()))
}

/// Mutable lookup that logs invalid handles
pub(crate) fn lookup_mut<'a, T>(table: &'a mut SecondaryMap<Rid, T>, rid: Rid, kind: &str) -> Option<&'a mut T> {
    let entry = table.get_mut(rid);
    if entry.is_none() {
        crate::engine_error!("galaxy3d::ResourceManager", "Invalid {} handle {:?}", kind, rid);
    }
    entry
}

#[cfg(test)]
#[path = "resource_manager_tests.rs"]
mod tests;
