/// Material resources and the material rebuild queue.
///
/// A material binds a shader to parameter values. Its uniform block and
/// texture list are derived data: they are rebuilt only by
/// `flush_dirty_materials()`, from the layout of the shader at that moment,
/// and swapped in whole so readers never see a partly rebuilt block.
///
/// Two owner sets track who uses a material:
/// - instantiable owners (meshes), counted once per surface using it
/// - instance owners (external instances that override a material directly)
///
/// Both are told when the material is rebuilt or freed.

use rustc_hash::{FxHashMap, FxHashSet};
use slotmap::SecondaryMap;
use crate::backend::{BlendMode, BufferDesc, BufferUsage, DepthDrawMode, GpuBuffer, ShaderFlags, ShaderMode};
use crate::resource::dependency::Notification;
use crate::resource::handle::{BaseType, InstanceKey, MaterialHandle, Rid, ShaderHandle, TextureHandle};
use crate::resource::resource_manager::{lock_device, lookup_mut, ResourceManager};
use crate::resource::shader::Shader;
use crate::resource::texture::Texture;
use crate::resource::uniform::{encode_param, ParamValue};
use crate::utils::RefCountMap;

// ===== MATERIAL =====

/// A material resource
#[derive(Debug)]
pub struct Material {
    pub(crate) shader: Option<ShaderHandle>,
    params: FxHashMap<String, ParamValue>,
    line_width: f32,
    /// Queued in `material_dirty_list`
    dirty: bool,

    // Derived at flush time
    ubo_data: Vec<u8>,
    gpu_buffer: Option<GpuBuffer>,
    /// Resolved texture per binding slot of the shader
    textures: Vec<Option<TextureHandle>>,
    is_animated: bool,
    can_cast_shadow: bool,
    rebuild_count: u64,

    /// Instantiable resources using this material, counted per use
    pub(crate) instantiable_owners: RefCountMap<Rid>,
    /// Instances using this material directly, counted per use
    pub(crate) instance_owners: RefCountMap<InstanceKey>,
}

impl Material {
    fn new() -> Self {
        Self {
            shader: None,
            params: FxHashMap::default(),
            line_width: 1.0,
            dirty: false,
            ubo_data: Vec::new(),
            gpu_buffer: None,
            textures: Vec::new(),
            is_animated: false,
            can_cast_shadow: false,
            rebuild_count: 0,
            instantiable_owners: RefCountMap::new(),
            instance_owners: RefCountMap::new(),
        }
    }

    pub fn shader(&self) -> Option<ShaderHandle> {
        self.shader
    }

    /// Explicitly set parameter (no shader fallback)
    pub fn param(&self, name: &str) -> Option<&ParamValue> {
        self.params.get(name)
    }

    pub fn line_width(&self) -> f32 {
        self.line_width
    }

    /// Whether the material waits in the rebuild queue
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Uniform block contents as of the last rebuild
    pub fn ubo_data(&self) -> &[u8] {
        &self.ubo_data
    }

    pub fn ubo_size(&self) -> u32 {
        self.ubo_data.len() as u32
    }

    pub fn gpu_buffer(&self) -> Option<GpuBuffer> {
        self.gpu_buffer
    }

    /// Texture bound to each shader texture slot as of the last rebuild
    pub fn textures(&self) -> &[Option<TextureHandle>] {
        &self.textures
    }

    pub fn is_animated(&self) -> bool {
        self.is_animated
    }

    pub fn can_cast_shadow(&self) -> bool {
        self.can_cast_shadow
    }

    /// Number of completed rebuilds
    pub fn rebuild_count(&self) -> u64 {
        self.rebuild_count
    }

    /// Reference count held by an instantiable owner
    pub fn instantiable_owner_count(&self, owner: impl Into<Rid>) -> u32 {
        self.instantiable_owners.count(owner.into())
    }

    /// Reference count held by an instance owner
    pub fn instance_owner_count(&self, instance: InstanceKey) -> u32 {
        self.instance_owners.count(instance)
    }
}

// ===== RESOURCE MANAGER API =====

impl ResourceManager {
    /// Create a material with no shader
    pub fn create_material(&mut self) -> MaterialHandle {
        let rid = self.registry.allocate(BaseType::Material);
        self.materials.insert(rid, Material::new());
        MaterialHandle::from_rid(rid)
    }

    /// Get a material by handle
    pub fn material(&self, material: MaterialHandle) -> Option<&Material> {
        self.materials.get(material.rid())
    }

    /// Bind a shader (or unbind with `None`). Rebuilds on next flush.
    pub fn material_set_shader(&mut self, material: MaterialHandle, shader: Option<ShaderHandle>) -> bool {
        if let Some(shader) = shader {
            if !self.shaders.contains_key(shader.rid()) {
                crate::engine_error!("galaxy3d::Material", "Invalid shader handle {:?}", shader);
                return false;
            }
        }
        let Some(mat) = lookup_mut(&mut self.materials, material.rid(), "material") else {
            return false;
        };
        let old = std::mem::replace(&mut mat.shader, shader);

        if let Some(old) = old {
            if let Some(sh) = self.shaders.get_mut(old.rid()) {
                sh.materials.remove(&material.rid());
            }
        }
        if let Some(new) = shader {
            if let Some(sh) = self.shaders.get_mut(new.rid()) {
                sh.materials.insert(material.rid());
            }
        }
        self.enqueue_material(material);
        true
    }

    pub fn material_get_shader(&self, material: MaterialHandle) -> Option<ShaderHandle> {
        self.materials.get(material.rid())?.shader
    }

    /// Set a parameter. `ParamValue::Nil` erases it. Rebuilds on next flush.
    pub fn material_set_param(&mut self, material: MaterialHandle, name: &str, value: ParamValue) -> bool {
        let Some(mat) = lookup_mut(&mut self.materials, material.rid(), "material") else {
            return false;
        };
        if value == ParamValue::Nil {
            mat.params.remove(name);
        } else {
            mat.params.insert(name.to_string(), value);
        }
        self.enqueue_material(material);
        true
    }

    /// Parameter value, falling back to the shader default (`Nil` if neither exists)
    pub fn material_get_param(&self, material: MaterialHandle, name: &str) -> ParamValue {
        let Some(mat) = self.materials.get(material.rid()) else {
            return ParamValue::Nil;
        };
        if let Some(value) = mat.params.get(name) {
            return value.clone();
        }
        let Some(shader) = mat.shader.and_then(|s| self.shaders.get(s.rid())) else {
            return ParamValue::Nil;
        };
        if let Some(texture) = shader.default_texture(name) {
            return ParamValue::Texture(texture);
        }
        shader.uniform(name)
            .and_then(|u| u.default_value.clone())
            .unwrap_or(ParamValue::Nil)
    }

    pub fn material_set_line_width(&mut self, material: MaterialHandle, width: f32) -> bool {
        let Some(mat) = lookup_mut(&mut self.materials, material.rid(), "material") else {
            return false;
        };
        mat.line_width = width;
        true
    }

    /// Whether the material output changes every frame (as of the last rebuild)
    pub fn material_is_animated(&self, material: MaterialHandle) -> bool {
        self.materials.get(material.rid()).is_some_and(|m| m.is_animated)
    }

    /// Whether the material can render into shadow maps (as of the last rebuild)
    pub fn material_casts_shadows(&self, material: MaterialHandle) -> bool {
        self.materials.get(material.rid()).is_some_and(|m| m.can_cast_shadow)
    }

    /// Record one direct use of `material` by `instance`
    pub fn material_add_instance_owner(&mut self, material: MaterialHandle, instance: InstanceKey) -> bool {
        let Some(record) = self.instances.record_mut(instance) else {
            crate::engine_error!("galaxy3d::Material", "Unknown instance {:?}", instance);
            return false;
        };
        let Some(mat) = lookup_mut(&mut self.materials, material.rid(), "material") else {
            return false;
        };
        mat.instance_owners.increment(instance);
        record.materials.insert(material.rid());
        true
    }

    /// Drop one direct use of `material` by `instance`
    pub fn material_remove_instance_owner(&mut self, material: MaterialHandle, instance: InstanceKey) -> bool {
        let Some(mat) = lookup_mut(&mut self.materials, material.rid(), "material") else {
            return false;
        };
        match mat.instance_owners.decrement(instance) {
            Some(0) => {
                if let Some(record) = self.instances.record_mut(instance) {
                    record.materials.remove(&material.rid());
                }
                true
            }
            Some(_) => true,
            None => {
                crate::engine_error!("galaxy3d::Material",
                    "Instance {:?} does not own material {:?}", instance, material);
                false
            }
        }
    }

    /// Record one use of `material` by an instantiable resource
    pub(crate) fn material_add_instantiable_owner(&mut self, material: MaterialHandle, owner: Rid) {
        if let Some(mat) = self.materials.get_mut(material.rid()) {
            mat.instantiable_owners.increment(owner);
        }
    }

    /// Drop one use of `material` by an instantiable resource
    pub(crate) fn material_remove_instantiable_owner(&mut self, material: MaterialHandle, owner: Rid) {
        if let Some(mat) = self.materials.get_mut(material.rid()) {
            mat.instantiable_owners.decrement(owner);
        }
    }

    /// Queue a material for rebuild (no-op if already queued)
    pub(crate) fn enqueue_material(&mut self, material: MaterialHandle) {
        if let Some(mat) = self.materials.get_mut(material.rid()) {
            if !mat.dirty {
                mat.dirty = true;
                self.material_dirty_list.push(material);
            }
        }
    }

    /// Rebuild every queued material once and notify its owners
    pub fn flush_dirty_materials(&mut self) {
        let queue = std::mem::take(&mut self.material_dirty_list);
        for material in queue {
            if self.rebuild_material(material) {
                self.notify_material_owners(material);
            }
        }
    }

    fn rebuild_material(&mut self, material: MaterialHandle) -> bool {
        let Some(mat) = self.materials.get_mut(material.rid()) else {
            return false;
        };
        mat.dirty = false;

        let shader = mat.shader
            .and_then(|s| self.shaders.get(s.rid()))
            .filter(|s| s.is_valid());

        let (ubo_data, textures) = match shader {
            Some(shader) => (
                build_uniform_block(shader, &mat.params),
                resolve_textures(shader, &mat.params, &self.textures),
            ),
            None => (Vec::new(), Vec::new()),
        };
        mat.can_cast_shadow = shader.is_some_and(casts_shadows);
        mat.is_animated = shader.is_some_and(|s| s.flags().uses_time());

        match lock_device(&self.device) {
            Ok(mut device) => {
                let resized = ubo_data.len() != mat.ubo_data.len() || mat.gpu_buffer.is_none();
                if resized {
                    if let Some(old) = mat.gpu_buffer.take() {
                        device.destroy_buffer(old);
                    }
                    if !ubo_data.is_empty() {
                        let created = device.create_buffer(BufferDesc {
                            size: ubo_data.len() as u64,
                            usage: BufferUsage::Uniform,
                            data: Some(ubo_data.as_slice()),
                        });
                        match created {
                            Ok(buffer) => mat.gpu_buffer = Some(buffer),
                            Err(error) => crate::engine_error!("galaxy3d::Material",
                                "Material {:?} uniform buffer allocation failed: {}", material, error),
                        }
                    }
                } else if let Some(buffer) = mat.gpu_buffer {
                    if let Err(error) = device.update_buffer(buffer, 0, &ubo_data) {
                        crate::engine_error!("galaxy3d::Material",
                            "Material {:?} uniform buffer update failed: {}", material, error);
                    }
                }
            }
            Err(error) => crate::engine_error!("galaxy3d::Material", "{}", error),
        }

        mat.ubo_data = ubo_data;
        mat.textures = textures;
        mat.rebuild_count += 1;
        self.info.material_rebuilds += 1;
        true
    }

    /// Tell every instance reached through the material's owners that it changed.
    ///
    /// Each instance hears once per base it depends on: once per mesh using
    /// the material, plus once with the material itself when it owns it directly.
    fn notify_material_owners(&mut self, material: MaterialHandle) {
        let Some(mat) = self.materials.get(material.rid()) else {
            return;
        };
        let mut seen = FxHashSet::default();
        let mut targets: Vec<(InstanceKey, Rid)> = Vec::new();
        for owner in mat.instantiable_owners.keys() {
            if let Some(instantiable) = self.instantiable(owner) {
                for instance in instantiable.snapshot() {
                    if seen.insert((instance, owner)) {
                        targets.push((instance, owner));
                    }
                }
            }
        }
        for instance in mat.instance_owners.keys() {
            if seen.insert((instance, material.rid())) {
                targets.push((instance, material.rid()));
            }
        }

        for (instance, base) in targets {
            self.dispatch(&[instance], Notification::BaseMaterialChanged(base));
        }
    }

    /// Free cascade: detach from mesh surfaces and instances, unbind from the shader
    pub(crate) fn free_material(&mut self, material: MaterialHandle) -> bool {
        let Some(mut mat) = self.materials.remove(material.rid()) else {
            return false;
        };
        self.material_dirty_list.retain(|&queued| queued != material);

        if let Some(shader) = mat.shader {
            if let Some(sh) = self.shaders.get_mut(shader.rid()) {
                sh.materials.remove(&material.rid());
            }
        }

        for owner in mat.instantiable_owners.drain_keys() {
            self.detach_material_from_mesh(owner, material);
            self.notify_material_changed(owner);
        }

        let instances = mat.instance_owners.drain_keys();
        for &instance in &instances {
            if let Some(record) = self.instances.record_mut(instance) {
                record.materials.remove(&material.rid());
            }
        }
        self.dispatch(&instances, Notification::MaterialRemoved(material));

        if let Some(buffer) = mat.gpu_buffer.take() {
            if let Ok(mut device) = lock_device(&self.device) {
                device.destroy_buffer(buffer);
            }
        }
        true
    }
}

// ===== DERIVED DATA =====

/// Encode the uniform block: material value, else shader default, else zeros
fn build_uniform_block(shader: &Shader, params: &FxHashMap<String, ParamValue>) -> Vec<u8> {
    let mut data = vec![0u8; shader.ubo_size() as usize];
    for uniform in shader.uniforms().iter().filter(|u| !u.uniform_type.is_texture()) {
        let start = uniform.offset as usize;
        let end = start + uniform.uniform_type.size_bytes() as usize;
        if end > data.len() {
            crate::engine_warn!("galaxy3d::Material",
                "Uniform '{}' does not fit the uniform block, skipped", uniform.name);
            continue;
        }
        let value = params.get(&uniform.name).or(uniform.default_value.as_ref());
        if let Some(value) = value {
            if !encode_param(uniform.uniform_type, value, &mut data[start..end]) {
                crate::engine_warn!("galaxy3d::Material",
                    "Value {:?} cannot be used for uniform '{}' ({:?})", value, uniform.name, uniform.uniform_type);
            }
        }
    }
    data
}

/// Texture per slot: material texture, else shader default, else none (live textures only)
fn resolve_textures(
    shader: &Shader,
    params: &FxHashMap<String, ParamValue>,
    textures: &SecondaryMap<Rid, Texture>,
) -> Vec<Option<TextureHandle>> {
    let mut resolved = vec![None; shader.texture_count() as usize];
    for uniform in shader.uniforms().iter().filter(|u| u.uniform_type.is_texture()) {
        let Some(slot) = uniform.texture_order.map(|o| o as usize).filter(|&o| o < resolved.len()) else {
            continue;
        };
        let live = |texture: &TextureHandle| textures.contains_key(texture.rid());
        resolved[slot] = params.get(&uniform.name)
            .and_then(ParamValue::as_texture)
            .filter(live)
            .or_else(|| shader.default_texture(&uniform.name).filter(live));
    }
    resolved
}

/// Spatial, opaque-blended shaders whose alpha does not discard depth can cast shadows
fn casts_shadows(shader: &Shader) -> bool {
    let state = shader.render_state();
    shader.mode() == ShaderMode::Spatial
        && state.blend_mode == BlendMode::Mix
        && (!shader.flags().contains(ShaderFlags::USES_ALPHA)
            || state.depth_draw_mode == DepthDrawMode::AlphaPrepass)
}

#[cfg(test)]
#[path = "material_tests.rs"]
mod tests;
