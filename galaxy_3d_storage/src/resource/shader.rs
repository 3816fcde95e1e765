/// Shader resources and the shader recompilation queue.
///
/// Setting code (or mode) only stores it and queues the shader. The next
/// `flush_dirty_shaders()` compiles each queued shader once, with whatever
/// code it holds at that moment, refreshes its uniform layout and queues every
/// material bound to it, since their uniform blocks follow that layout.

use rustc_hash::{FxHashMap, FxHashSet};
use crate::backend::{RenderState, ShaderFlags, ShaderMode, ShaderReflection};
use crate::resource::handle::{BaseType, MaterialHandle, Rid, ShaderHandle, TextureHandle};
use crate::resource::resource_manager::{lock_compiler, lookup_mut, ResourceManager};
use crate::resource::uniform::UniformInfo;

// ===== SHADER STATE =====

/// Compilation state of a shader
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderState {
    /// No code was ever set
    Uncompiled,
    /// Code changed, waiting for the next flush
    Pending,
    /// Last compile succeeded
    Valid,
    /// Last compile failed (or exceeded backend limits)
    Invalid,
}

// ===== SHADER =====

/// A shader resource
#[derive(Debug)]
pub struct Shader {
    mode: ShaderMode,
    code: String,
    state: ShaderState,
    /// Queued in `shader_dirty_list`
    dirty: bool,
    /// Uniform table sorted by declaration order
    uniforms: Vec<UniformInfo>,
    ubo_size: u32,
    texture_count: u32,
    render_state: RenderState,
    flags: ShaderFlags,
    default_textures: FxHashMap<String, TextureHandle>,
    /// Materials bound to this shader
    pub(crate) materials: FxHashSet<Rid>,
    /// Bumped by every recompilation
    version: u64,
}

impl Shader {
    fn new(mode: ShaderMode) -> Self {
        Self {
            mode,
            code: String::new(),
            state: ShaderState::Uncompiled,
            dirty: false,
            uniforms: Vec::new(),
            ubo_size: 0,
            texture_count: 0,
            render_state: RenderState::default(),
            flags: ShaderFlags::empty(),
            default_textures: FxHashMap::default(),
            materials: FxHashSet::default(),
            version: 0,
        }
    }

    pub fn mode(&self) -> ShaderMode {
        self.mode
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn state(&self) -> ShaderState {
        self.state
    }

    pub fn is_valid(&self) -> bool {
        self.state == ShaderState::Valid
    }

    /// Whether the shader waits in the recompilation queue
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Uniform table, in declaration order
    pub fn uniforms(&self) -> &[UniformInfo] {
        &self.uniforms
    }

    /// Look up a uniform by name
    pub fn uniform(&self, name: &str) -> Option<&UniformInfo> {
        self.uniforms.iter().find(|u| u.name == name)
    }

    /// Size of the material uniform block in bytes
    pub fn ubo_size(&self) -> u32 {
        self.ubo_size
    }

    pub fn texture_count(&self) -> u32 {
        self.texture_count
    }

    pub fn render_state(&self) -> RenderState {
        self.render_state
    }

    pub fn flags(&self) -> ShaderFlags {
        self.flags
    }

    pub fn default_texture(&self, name: &str) -> Option<TextureHandle> {
        self.default_textures.get(name).copied()
    }

    /// Number of materials bound to this shader
    pub fn material_count(&self) -> usize {
        self.materials.len()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    fn apply_reflection(&mut self, mut reflection: ShaderReflection) {
        reflection.uniforms.sort_by_key(|u| u.order);
        self.uniforms = reflection.uniforms;
        self.ubo_size = reflection.ubo_size;
        self.texture_count = reflection.texture_count;
        self.render_state = reflection.render_state;
        self.flags = reflection.flags;
        self.state = ShaderState::Valid;
    }

    fn invalidate(&mut self) {
        self.uniforms.clear();
        self.ubo_size = 0;
        self.texture_count = 0;
        self.render_state = RenderState::default();
        self.flags = ShaderFlags::empty();
        self.state = ShaderState::Invalid;
    }
}

// ===== RESOURCE MANAGER API =====

impl ResourceManager {
    /// Create a shader with no code
    pub fn create_shader(&mut self, mode: ShaderMode) -> ShaderHandle {
        let rid = self.registry.allocate(BaseType::Shader);
        self.shaders.insert(rid, Shader::new(mode));
        ShaderHandle::from_rid(rid)
    }

    /// Get a shader by handle
    pub fn shader(&self, shader: ShaderHandle) -> Option<&Shader> {
        self.shaders.get(shader.rid())
    }

    /// Change the program kind (recompiles on next flush)
    pub fn shader_set_mode(&mut self, shader: ShaderHandle, mode: ShaderMode) -> bool {
        let Some(sh) = lookup_mut(&mut self.shaders, shader.rid(), "shader") else {
            return false;
        };
        if sh.mode == mode {
            return true;
        }
        sh.mode = mode;
        if !sh.code.is_empty() {
            sh.state = ShaderState::Pending;
        }
        self.enqueue_shader(shader);
        true
    }

    /// Replace the source code (recompiles on next flush)
    pub fn shader_set_code(&mut self, shader: ShaderHandle, code: &str) -> bool {
        let Some(sh) = lookup_mut(&mut self.shaders, shader.rid(), "shader") else {
            return false;
        };
        sh.code = code.to_string();
        sh.state = ShaderState::Pending;
        self.enqueue_shader(shader);
        true
    }

    pub fn shader_get_code(&self, shader: ShaderHandle) -> Option<&str> {
        self.shaders.get(shader.rid()).map(|s| s.code())
    }

    /// Uniforms of the last successful compile, in declaration order
    pub fn shader_get_param_list(&self, shader: ShaderHandle) -> Vec<UniformInfo> {
        self.shaders.get(shader.rid())
            .map(|s| s.uniforms.clone())
            .unwrap_or_default()
    }

    /// Set (or with `None`, clear) the texture used when a material leaves `name` unset
    pub fn shader_set_default_texture_param(
        &mut self,
        shader: ShaderHandle,
        name: &str,
        texture: Option<TextureHandle>,
    ) -> bool {
        if let Some(texture) = texture {
            if !self.textures.contains_key(texture.rid()) {
                crate::engine_error!("galaxy3d::Shader", "Invalid default texture {:?} for '{}'", texture, name);
                return false;
            }
        }
        let Some(sh) = lookup_mut(&mut self.shaders, shader.rid(), "shader") else {
            return false;
        };
        match texture {
            Some(texture) => sh.default_textures.insert(name.to_string(), texture),
            None => sh.default_textures.remove(name),
        };
        let materials: Vec<Rid> = sh.materials.iter().copied().collect();
        for material in materials {
            self.enqueue_material(MaterialHandle::from_rid(material));
        }
        true
    }

    pub fn shader_get_default_texture_param(&self, shader: ShaderHandle, name: &str) -> Option<TextureHandle> {
        self.shaders.get(shader.rid())?.default_texture(name)
    }

    /// Queue a shader for recompilation (no-op if already queued)
    pub(crate) fn enqueue_shader(&mut self, shader: ShaderHandle) {
        if let Some(sh) = self.shaders.get_mut(shader.rid()) {
            if !sh.dirty {
                sh.dirty = true;
                self.shader_dirty_list.push(shader);
            }
        }
    }

    /// Recompile every queued shader once and queue their materials
    pub fn flush_dirty_shaders(&mut self) {
        let queue = std::mem::take(&mut self.shader_dirty_list);
        for shader in queue {
            let materials = self.recompile_shader(shader);
            for material in materials {
                self.enqueue_material(MaterialHandle::from_rid(material));
            }
        }
    }

    /// Compile one shader, returning the materials bound to it
    fn recompile_shader(&mut self, shader: ShaderHandle) -> Vec<Rid> {
        let Some(sh) = self.shaders.get_mut(shader.rid()) else {
            return Vec::new();
        };
        sh.dirty = false;
        sh.version += 1;

        if sh.code.is_empty() {
            sh.invalidate();
            crate::engine_debug!("galaxy3d::Shader", "Shader {:?} has no code", shader);
        } else {
            self.info.shader_compilations += 1;
            let result = lock_compiler(&self.compiler)
                .and_then(|mut compiler| compiler.compile(sh.mode, &sh.code));
            match result {
                Ok(reflection) if reflection.ubo_size > self.config.max_uniform_buffer_size => {
                    crate::engine_error!("galaxy3d::Shader",
                        "Shader {:?} uniform block is {} bytes (max {})",
                        shader, reflection.ubo_size, self.config.max_uniform_buffer_size);
                    sh.invalidate();
                }
                Ok(reflection) if reflection.texture_count > self.config.max_texture_image_units => {
                    crate::engine_error!("galaxy3d::Shader",
                        "Shader {:?} uses {} textures (max {})",
                        shader, reflection.texture_count, self.config.max_texture_image_units);
                    sh.invalidate();
                }
                Ok(reflection) => {
                    sh.apply_reflection(reflection);
                    crate::engine_debug!("galaxy3d::Shader",
                        "Compiled shader {:?} ({} uniform(s), {} bytes)", shader, sh.uniforms.len(), sh.ubo_size);
                }
                Err(error) => {
                    crate::engine_error!("galaxy3d::Shader", "Shader {:?} failed to compile: {}", shader, error);
                    sh.invalidate();
                }
            }
        }

        sh.materials.iter().copied().collect()
    }

    /// Free cascade: unbind every material (each is queued once), then drop the shader
    pub(crate) fn free_shader(&mut self, shader: ShaderHandle) -> bool {
        let Some(sh) = self.shaders.remove(shader.rid()) else {
            return false;
        };
        self.shader_dirty_list.retain(|&queued| queued != shader);
        for material in sh.materials {
            if let Some(mat) = self.materials.get_mut(material) {
                mat.shader = None;
            }
            self.enqueue_material(MaterialHandle::from_rid(material));
        }
        true
    }
}

#[cfg(test)]
#[path = "shader_tests.rs"]
mod tests;
