//! Shared backends for integration tests
//!
//! In-memory implementations of the public backend traits, plus a recording
//! instance. No GPU or real compiler required.

#![allow(dead_code)]

use galaxy_3d_storage::galaxy3d::backend::{
    BufferDesc, GpuBuffer, GpuFramebuffer, GpuTexture, GraphicsDevice, ShaderCompiler, ShaderMode,
    ShaderReflection, TextureDesc,
};
use galaxy_3d_storage::galaxy3d::resource::{
    InstanceBase, MaterialHandle, Rid, TextureData, UniformHint, UniformInfo, UniformType,
};
use galaxy_3d_storage::galaxy3d::{Error, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

// ============================================================================
// DEVICE
// ============================================================================

/// Device that keeps buffer contents in memory and counts live objects
#[derive(Debug, Default)]
pub struct MemoryDevice {
    next_id: u64,
    pub buffers: HashMap<u64, Vec<u8>>,
    pub textures: HashMap<u64, TextureDesc>,
    pub framebuffers: HashMap<u64, Vec<GpuTexture>>,
}

impl MemoryDevice {
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    pub fn live_objects(&self) -> usize {
        self.buffers.len() + self.textures.len() + self.framebuffers.len()
    }
}

impl GraphicsDevice for MemoryDevice {
    fn create_buffer(&mut self, desc: BufferDesc) -> Result<GpuBuffer> {
        let id = self.next();
        let contents = match desc.data {
            Some(data) => data.to_vec(),
            None => vec![0; desc.size as usize],
        };
        self.buffers.insert(id, contents);
        Ok(GpuBuffer(id))
    }

    fn update_buffer(&mut self, buffer: GpuBuffer, offset: u64, data: &[u8]) -> Result<()> {
        let contents = self.buffers.get_mut(&buffer.0)
            .ok_or_else(|| Error::InvalidHandle(format!("buffer {}", buffer.0)))?;
        let start = offset as usize;
        let end = start + data.len();
        if end > contents.len() {
            return Err(Error::BackendError("buffer update out of range".to_string()));
        }
        contents[start..end].copy_from_slice(data);
        Ok(())
    }

    fn destroy_buffer(&mut self, buffer: GpuBuffer) {
        self.buffers.remove(&buffer.0);
    }

    fn create_texture(&mut self, desc: TextureDesc) -> Result<GpuTexture> {
        let id = self.next();
        self.textures.insert(id, desc);
        Ok(GpuTexture(id))
    }

    fn upload_texture(&mut self, texture: GpuTexture, _layer: u32, _data: &TextureData) -> Result<()> {
        if self.textures.contains_key(&texture.0) {
            Ok(())
        } else {
            Err(Error::InvalidHandle(format!("texture {}", texture.0)))
        }
    }

    fn destroy_texture(&mut self, texture: GpuTexture) {
        self.textures.remove(&texture.0);
    }

    fn create_framebuffer(&mut self, attachments: &[GpuTexture]) -> Result<GpuFramebuffer> {
        let id = self.next();
        self.framebuffers.insert(id, attachments.to_vec());
        Ok(GpuFramebuffer(id))
    }

    fn destroy_framebuffer(&mut self, framebuffer: GpuFramebuffer) {
        self.framebuffers.remove(&framebuffer.0);
    }
}

// ============================================================================
// COMPILER
// ============================================================================

/// Compiler for one-line declarations: `uniform <float|vec4|sampler2D> <name>;`
///
/// Any source containing the word `error` fails.
#[derive(Debug, Default)]
pub struct LineCompiler {
    pub compiles: usize,
}

impl LineCompiler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ShaderCompiler for LineCompiler {
    fn compile(&mut self, _mode: ShaderMode, code: &str) -> Result<ShaderReflection> {
        self.compiles += 1;
        if code.contains("error") {
            return Err(Error::ShaderCompilation("rejected source".to_string()));
        }

        let mut reflection = ShaderReflection::default();
        let mut offset = 0u32;
        for (order, statement) in code.split(';').map(str::trim).filter(|s| !s.is_empty()).enumerate() {
            let parts: Vec<&str> = statement.split_whitespace().collect();
            let [_, type_name, name] = parts.as_slice() else {
                return Err(Error::ShaderCompilation(format!("bad statement: {}", statement)));
            };
            let uniform_type = match *type_name {
                "float" => UniformType::Float,
                "vec4" => UniformType::Vec4,
                "sampler2D" => UniformType::Sampler2D,
                other => return Err(Error::ShaderCompilation(format!("unknown type {}", other))),
            };
            let mut info = UniformInfo {
                name: name.to_string(),
                uniform_type,
                offset: 0,
                order: order as u32,
                texture_order: None,
                hint: UniformHint::None,
                default_value: None,
            };
            if uniform_type.is_texture() {
                info.texture_order = Some(reflection.texture_count);
                reflection.texture_count += 1;
            } else {
                offset = offset.next_multiple_of(uniform_type.alignment());
                info.offset = offset;
                offset += uniform_type.size_bytes();
            }
            reflection.uniforms.push(info);
        }
        reflection.ubo_size = offset.next_multiple_of(16);
        Ok(reflection)
    }
}

// ============================================================================
// INSTANCE
// ============================================================================

/// Instance recording every notification as text
#[derive(Debug, Default)]
pub struct RecordingInstance {
    events: Mutex<Vec<String>>,
}

impl RecordingInstance {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.events().iter().filter(|e| e.starts_with(prefix)).count()
    }

    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

impl InstanceBase for RecordingInstance {
    fn base_changed(&self, base: Rid) {
        self.push(format!("changed {:?}", base));
    }

    fn base_material_changed(&self, base: Rid) {
        self.push(format!("material_changed {:?}", base));
    }

    fn base_removed(&self, base: Rid) {
        self.push(format!("removed {:?}", base));
    }

    fn material_removed(&self, material: MaterialHandle) {
        self.push(format!("material_removed {:?}", material.rid()));
    }
}

// ============================================================================
// HELPERS
// ============================================================================

pub fn backends() -> (Arc<Mutex<MemoryDevice>>, Arc<Mutex<LineCompiler>>) {
    (Arc::new(Mutex::new(MemoryDevice::new())), Arc::new(Mutex::new(LineCompiler::new())))
}

/// Decode a byte slice as native-endian f32s
pub fn floats(bytes: &[u8]) -> Vec<f32> {
    bytes.chunks_exact(4)
        .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}
