/// GraphicsDevice trait - GPU object allocation interface
///
/// The storage layer only needs to allocate, fill and release GPU objects.
/// Everything it gets back is an opaque identifier that it hands to the
/// submission layer untouched.

use crate::error::Result;
use crate::resource::texture::{TextureData, TextureFormat};

// ============================================================================
// GPU object identifiers
// ============================================================================

/// Opaque identifier of a GPU buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GpuBuffer(pub u64);

/// Opaque identifier of a GPU texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GpuTexture(pub u64);

/// Opaque identifier of a GPU framebuffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GpuFramebuffer(pub u64);

// ============================================================================
// Descriptors
// ============================================================================

/// Buffer usage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferUsage {
    /// Vertex attributes
    Vertex,
    /// Index data
    Index,
    /// Uniform block (material parameters)
    Uniform,
}

/// Descriptor for creating a buffer
#[derive(Debug, Clone)]
pub struct BufferDesc<'a> {
    /// Size in bytes
    pub size: u64,
    /// Buffer usage
    pub usage: BufferUsage,
    /// Initial contents (must be `size` bytes when present)
    pub data: Option<&'a [u8]>,
}

/// Texture usage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureUsage {
    /// Sampled in shaders
    Sampled,
    /// Color attachment, also sampled
    ColorAttachment,
    /// Depth attachment
    DepthAttachment,
}

/// Descriptor for creating a texture
#[derive(Debug, Clone)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    /// Array layers (6 for cubemaps)
    pub layers: u32,
    /// Mip levels, at least 1
    pub mip_levels: u32,
    pub usage: TextureUsage,
}

// ============================================================================
// GraphicsDevice trait
// ============================================================================

/// GPU allocation interface
///
/// Implemented by backend crates. All methods are called from the
/// render/update thread only.
pub trait GraphicsDevice: Send + Sync {
    /// Create a buffer, optionally filled with initial data
    fn create_buffer(&mut self, desc: BufferDesc) -> Result<GpuBuffer>;

    /// Overwrite part of a buffer
    fn update_buffer(&mut self, buffer: GpuBuffer, offset: u64, data: &[u8]) -> Result<()>;

    /// Release a buffer
    fn destroy_buffer(&mut self, buffer: GpuBuffer);

    /// Create a texture (contents undefined until uploaded)
    fn create_texture(&mut self, desc: TextureDesc) -> Result<GpuTexture>;

    /// Upload pixel data to one layer of a texture
    fn upload_texture(&mut self, texture: GpuTexture, layer: u32, data: &TextureData) -> Result<()>;

    /// Release a texture
    fn destroy_texture(&mut self, texture: GpuTexture);

    /// Create a framebuffer from attachments (colors first, depth last)
    fn create_framebuffer(&mut self, attachments: &[GpuTexture]) -> Result<GpuFramebuffer>;

    /// Release a framebuffer
    fn destroy_framebuffer(&mut self, framebuffer: GpuFramebuffer);
}
