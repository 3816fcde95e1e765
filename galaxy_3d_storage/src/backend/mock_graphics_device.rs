/// Mock GraphicsDevice for unit tests (no GPU required)
///
/// Tracks every live GPU object so tests can assert that cascades release
/// what they allocated, and can be told to fail allocations to exercise the
/// all-or-nothing paths.

use rustc_hash::FxHashMap;
use crate::backend::{
    BufferDesc, BufferUsage, GpuBuffer, GpuFramebuffer, GpuTexture, GraphicsDevice, TextureDesc,
};
use crate::engine_bail;
use crate::error::{Error, Result};
use crate::resource::texture::TextureData;

// ============================================================================
// Mock objects
// ============================================================================

#[derive(Debug, Clone)]
pub struct MockBuffer {
    pub usage: BufferUsage,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct MockTexture {
    pub desc: TextureDesc,
    /// Uploaded layers
    pub uploads: Vec<u32>,
}

// ============================================================================
// Mock GraphicsDevice
// ============================================================================

#[derive(Debug, Default)]
pub struct MockGraphicsDevice {
    next_id: u64,
    pub buffers: FxHashMap<u64, MockBuffer>,
    pub textures: FxHashMap<u64, MockTexture>,
    pub framebuffers: FxHashMap<u64, Vec<GpuTexture>>,
    /// Allocations left before every allocation fails (None = never)
    fail_after: Option<u32>,
    pub buffer_updates: u32,
}

impl MockGraphicsDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Let `count` more allocations succeed, then fail all of them
    pub fn fail_after(&mut self, count: u32) {
        self.fail_after = Some(count);
    }

    /// Make every following allocation fail
    pub fn fail_allocations(&mut self) {
        self.fail_after = Some(0);
    }

    /// Stop injecting failures
    pub fn heal(&mut self) {
        self.fail_after = None;
    }

    pub fn live_buffer_count(&self) -> usize {
        self.buffers.len()
    }

    pub fn live_texture_count(&self) -> usize {
        self.textures.len()
    }

    pub fn live_framebuffer_count(&self) -> usize {
        self.framebuffers.len()
    }

    /// Total number of live GPU objects
    pub fn live_object_count(&self) -> usize {
        self.buffers.len() + self.textures.len() + self.framebuffers.len()
    }

    pub fn buffer_data(&self, buffer: GpuBuffer) -> Option<&[u8]> {
        self.buffers.get(&buffer.0).map(|b| b.data.as_slice())
    }

    fn allocate_id(&mut self) -> Result<u64> {
        if let Some(left) = self.fail_after.as_mut() {
            if *left == 0 {
                return Err(Error::OutOfMemory);
            }
            *left -= 1;
        }
        self.next_id += 1;
        Ok(self.next_id)
    }
}

impl GraphicsDevice for MockGraphicsDevice {
    fn create_buffer(&mut self, desc: BufferDesc) -> Result<GpuBuffer> {
        let id = self.allocate_id()?;
        let data = match desc.data {
            Some(data) => data.to_vec(),
            None => vec![0; desc.size as usize],
        };
        self.buffers.insert(id, MockBuffer { usage: desc.usage, data });
        Ok(GpuBuffer(id))
    }

    fn update_buffer(&mut self, buffer: GpuBuffer, offset: u64, data: &[u8]) -> Result<()> {
        let Some(target) = self.buffers.get_mut(&buffer.0) else {
            engine_bail!("galaxy3d::MockGraphicsDevice", "Unknown buffer {}", buffer.0);
        };
        let start = offset as usize;
        let end = start + data.len();
        if end > target.data.len() {
            engine_bail!("galaxy3d::MockGraphicsDevice", "Buffer update out of range");
        }
        target.data[start..end].copy_from_slice(data);
        self.buffer_updates += 1;
        Ok(())
    }

    fn destroy_buffer(&mut self, buffer: GpuBuffer) {
        self.buffers.remove(&buffer.0);
    }

    fn create_texture(&mut self, desc: TextureDesc) -> Result<GpuTexture> {
        let id = self.allocate_id()?;
        self.textures.insert(id, MockTexture { desc, uploads: Vec::new() });
        Ok(GpuTexture(id))
    }

    fn upload_texture(&mut self, texture: GpuTexture, layer: u32, _data: &TextureData) -> Result<()> {
        let Some(target) = self.textures.get_mut(&texture.0) else {
            engine_bail!("galaxy3d::MockGraphicsDevice", "Unknown texture {}", texture.0);
        };
        target.uploads.push(layer);
        Ok(())
    }

    fn destroy_texture(&mut self, texture: GpuTexture) {
        self.textures.remove(&texture.0);
    }

    fn create_framebuffer(&mut self, attachments: &[GpuTexture]) -> Result<GpuFramebuffer> {
        let id = self.allocate_id()?;
        self.framebuffers.insert(id, attachments.to_vec());
        Ok(GpuFramebuffer(id))
    }

    fn destroy_framebuffer(&mut self, framebuffer: GpuFramebuffer) {
        self.framebuffers.remove(&framebuffer.0);
    }
}
