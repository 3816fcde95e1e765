/// Texture resources.
///
/// A texture is created empty, then allocated (size, format, flags) which
/// creates its GPU object, then filled one layer at a time. Cubemaps have six
/// layers, everything else has one. Pixel data is treated as an opaque byte
/// buffer plus a format descriptor; the only check done here is that the byte
/// count matches the format and size (mip chain included).
///
/// Textures owned by a render target are created and freed by that target.

use bitflags::bitflags;
use crate::backend::{GpuTexture, TextureDesc, TextureUsage};
use crate::error::{Error, Result};
use crate::resource::handle::{BaseType, RenderTargetHandle, TextureHandle};
use crate::resource::resource_manager::{lock_device, lookup_mut, ResourceManager};

// ===== FORMAT =====

/// Pixel format of texture data
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    L8,
    LA8,
    R8,
    RG8,
    RGB8,
    RGBA8,
    RGBA4444,
    /// 32-bit float, one channel
    RF,
    RGF,
    RGBF,
    RGBAF,
    /// 16-bit float, one channel
    RH,
    RGBAH,
    /// BC1, 8 bytes per 4x4 block
    DXT1,
    /// BC3, 16 bytes per 4x4 block
    DXT5,
    /// 16 bytes per 4x4 block
    ETC2_RGBA8,
    /// 32-bit float depth (render target attachments)
    Depth32F,
}

impl TextureFormat {
    /// Whether the format is block compressed
    pub fn is_compressed(&self) -> bool {
        matches!(self, TextureFormat::DXT1 | TextureFormat::DXT5 | TextureFormat::ETC2_RGBA8)
    }

    /// Bytes per pixel for uncompressed formats, bytes per 4x4 block otherwise
    pub fn unit_size(&self) -> usize {
        match self {
            TextureFormat::L8 | TextureFormat::R8 => 1,
            TextureFormat::LA8 | TextureFormat::RG8 | TextureFormat::RGBA4444 | TextureFormat::RH => 2,
            TextureFormat::RGB8 => 3,
            TextureFormat::RGBA8 | TextureFormat::RF | TextureFormat::Depth32F => 4,
            TextureFormat::RGF | TextureFormat::RGBAH => 8,
            TextureFormat::RGBF => 12,
            TextureFormat::RGBAF => 16,
            TextureFormat::DXT1 => 8,
            TextureFormat::DXT5 | TextureFormat::ETC2_RGBA8 => 16,
        }
    }

    /// Size in bytes of a single mip level
    pub fn level_size(&self, width: u32, height: u32) -> usize {
        let (w, h) = (width.max(1) as usize, height.max(1) as usize);
        if self.is_compressed() {
            w.div_ceil(4) * h.div_ceil(4) * self.unit_size()
        } else {
            w * h * self.unit_size()
        }
    }

    /// Size in bytes of an image, optionally including its full mip chain
    pub fn image_size(&self, width: u32, height: u32, mipmaps: bool) -> usize {
        if !mipmaps {
            return self.level_size(width, height);
        }
        (0..mip_level_count(width, height))
            .map(|level| self.level_size(width >> level, height >> level))
            .sum()
    }
}

/// Number of levels in a full mip chain down to 1x1
pub fn mip_level_count(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}

// ===== FLAGS =====

bitflags! {
    /// Sampling and storage flags of a texture
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureFlags: u32 {
        const MIPMAPS            = 1 << 0;
        const REPEAT             = 1 << 1;
        const FILTER             = 1 << 2;
        const ANISOTROPIC_FILTER = 1 << 3;
        const CONVERT_TO_LINEAR  = 1 << 4;
        const MIRRORED_REPEAT    = 1 << 5;
        /// Six layers; fixed at allocation time
        const CUBEMAP            = 1 << 11;

        const DEFAULT = Self::MIPMAPS.bits() | Self::REPEAT.bits() | Self::FILTER.bits();
    }
}

impl Default for TextureFlags {
    fn default() -> Self {
        TextureFlags::DEFAULT
    }
}

/// Layer of a cubemap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CubeMapSide {
    Left,
    Right,
    Bottom,
    Top,
    Front,
    Back,
}

impl CubeMapSide {
    /// Layer index inside the GPU texture
    pub fn layer(&self) -> u32 {
        *self as u32
    }
}

// ===== DATA =====

/// CPU-side image data of one texture layer
#[derive(Debug, Clone, PartialEq)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    /// Whether `bytes` carries the full mip chain
    pub mipmaps: bool,
    pub bytes: Vec<u8>,
}

impl TextureData {
    /// Byte count the data must have for its size and format
    pub fn expected_size(&self) -> usize {
        self.format.image_size(self.width, self.height, self.mipmaps)
    }
}

// ===== TEXTURE =====

/// A texture resource
#[derive(Debug)]
pub struct Texture {
    path: String,
    flags: TextureFlags,
    /// Reported size (may be overridden)
    width: u32,
    height: u32,
    /// Size of the GPU allocation
    alloc_width: u32,
    alloc_height: u32,
    format: TextureFormat,
    mip_levels: u32,
    gpu_texture: Option<GpuTexture>,
    /// One slot per layer
    images: Vec<Option<TextureData>>,
    /// Bytes accounted in `StorageInfo::texture_mem`
    total_data_size: u64,
    pub(crate) render_target: Option<RenderTargetHandle>,
}

impl Texture {
    fn new() -> Self {
        Self {
            path: String::new(),
            flags: TextureFlags::DEFAULT,
            width: 0,
            height: 0,
            alloc_width: 0,
            alloc_height: 0,
            format: TextureFormat::RGBA8,
            mip_levels: 1,
            gpu_texture: None,
            images: Vec::new(),
            total_data_size: 0,
            render_target: None,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn flags(&self) -> TextureFlags {
        self.flags
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn alloc_width(&self) -> u32 {
        self.alloc_width
    }

    pub fn alloc_height(&self) -> u32 {
        self.alloc_height
    }

    pub fn format(&self) -> TextureFormat {
        self.format
    }

    pub fn mip_levels(&self) -> u32 {
        self.mip_levels
    }

    /// Number of layers (6 for cubemaps, 0 before allocation)
    pub fn layer_count(&self) -> u32 {
        self.images.len() as u32
    }

    pub fn gpu_texture(&self) -> Option<GpuTexture> {
        self.gpu_texture
    }

    /// Whether the GPU object exists
    pub fn is_allocated(&self) -> bool {
        self.gpu_texture.is_some()
    }

    /// Render target owning this texture, if any
    pub fn render_target(&self) -> Option<RenderTargetHandle> {
        self.render_target
    }

    /// Bytes of GPU memory the texture accounts for
    pub fn total_data_size(&self) -> u64 {
        self.total_data_size
    }

    fn layer_index(&self, side: CubeMapSide) -> usize {
        if self.flags.contains(TextureFlags::CUBEMAP) {
            side.layer() as usize
        } else {
            0
        }
    }
}

/// Debug description of a live texture
#[derive(Debug, Clone, PartialEq)]
pub struct TextureInfo {
    pub texture: TextureHandle,
    pub path: String,
    pub width: u32,
    pub height: u32,
    pub layers: u32,
    pub format: TextureFormat,
    pub bytes: u64,
}

// ===== RESOURCE MANAGER API =====

impl ResourceManager {
    /// Create an empty texture (no GPU object until `texture_allocate`)
    pub fn create_texture(&mut self) -> TextureHandle {
        let rid = self.registry.allocate(BaseType::Texture);
        self.textures.insert(rid, Texture::new());
        TextureHandle::from_rid(rid)
    }

    /// Get a texture by handle
    pub fn texture(&self, texture: TextureHandle) -> Option<&Texture> {
        self.textures.get(texture.rid())
    }

    /// (Re)allocate the GPU texture.
    ///
    /// The previous GPU object and stored data are released only once the
    /// new object exists; on failure the texture is left unchanged.
    pub fn texture_allocate(
        &mut self,
        texture: TextureHandle,
        width: u32,
        height: u32,
        format: TextureFormat,
        flags: TextureFlags,
    ) -> Result<()> {
        let max_size = self.config.max_texture_size;
        let tex = self.textures.get(texture.rid())
            .ok_or_else(|| invalid_texture(texture))?;

        if tex.render_target.is_some() {
            crate::engine_error!("galaxy3d::Texture", "Cannot reallocate a render target texture");
            return Err(Error::InvalidResource("texture is owned by a render target".to_string()));
        }
        if width == 0 || height == 0 || width > max_size || height > max_size {
            crate::engine_error!("galaxy3d::Texture",
                "Invalid texture size {}x{} (max {})", width, height, max_size);
            return Err(Error::InvalidResource(format!("invalid texture size {}x{}", width, height)));
        }

        let layers = if flags.contains(TextureFlags::CUBEMAP) { 6 } else { 1 };
        let mipmaps = flags.contains(TextureFlags::MIPMAPS);
        let mip_levels = if mipmaps { mip_level_count(width, height) } else { 1 };

        let new_gpu = {
            let mut device = lock_device(&self.device)?;
            device.create_texture(TextureDesc {
                width,
                height,
                format,
                layers,
                mip_levels,
                usage: TextureUsage::Sampled,
            })?
        };
        let old_gpu = self.textures.get(texture.rid()).and_then(|t| t.gpu_texture);
        if let Some(old_gpu) = old_gpu {
            lock_device(&self.device)?.destroy_texture(old_gpu);
        }

        let data_size = format.image_size(width, height, mipmaps) as u64 * layers as u64;
        if let Some(tex) = self.textures.get_mut(texture.rid()) {
            self.info.texture_mem = self.info.texture_mem.saturating_sub(tex.total_data_size) + data_size;
            tex.width = width;
            tex.height = height;
            tex.alloc_width = width;
            tex.alloc_height = height;
            tex.format = format;
            tex.flags = flags;
            tex.mip_levels = mip_levels;
            tex.gpu_texture = Some(new_gpu);
            tex.images = vec![None; layers as usize];
            tex.total_data_size = data_size;
        }

        crate::engine_debug!("galaxy3d::Texture",
            "Allocated texture {}x{} {:?} ({} layer(s), {} mip(s))", width, height, format, layers, mip_levels);
        Ok(())
    }

    /// Upload image data to one layer (the side is ignored for 2D textures)
    pub fn texture_set_data(&mut self, texture: TextureHandle, data: TextureData, side: CubeMapSide) -> Result<()> {
        let tex = self.textures.get(texture.rid())
            .ok_or_else(|| invalid_texture(texture))?;
        let gpu = match tex.gpu_texture {
            Some(gpu) => gpu,
            None => {
                crate::engine_error!("galaxy3d::Texture", "Texture data set before allocation");
                return Err(Error::InvalidResource("texture is not allocated".to_string()));
            }
        };

        if data.format != tex.format || data.width != tex.alloc_width || data.height != tex.alloc_height {
            crate::engine_error!("galaxy3d::Texture",
                "Texture data {}x{} {:?} does not match allocation {}x{} {:?}",
                data.width, data.height, data.format, tex.alloc_width, tex.alloc_height, tex.format);
            return Err(Error::InvalidResource("texture data does not match allocation".to_string()));
        }
        if data.bytes.len() != data.expected_size() {
            crate::engine_error!("galaxy3d::Texture",
                "Texture data has {} bytes, expected {}", data.bytes.len(), data.expected_size());
            return Err(Error::InvalidResource("texture data size mismatch".to_string()));
        }

        let layer = tex.layer_index(side);
        lock_device(&self.device)?.upload_texture(gpu, layer as u32, &data)?;

        if let Some(tex) = self.textures.get_mut(texture.rid()) {
            tex.images[layer] = Some(data);
        }
        Ok(())
    }

    /// CPU copy of the data last uploaded to a layer
    pub fn texture_get_data(&self, texture: TextureHandle, side: CubeMapSide) -> Option<TextureData> {
        let tex = self.textures.get(texture.rid())?;
        tex.images.get(tex.layer_index(side))?.clone()
    }

    /// Change sampling flags. The cubemap flag cannot change after allocation.
    pub fn texture_set_flags(&mut self, texture: TextureHandle, flags: TextureFlags) -> bool {
        let Some(tex) = lookup_mut(&mut self.textures, texture.rid(), "texture") else {
            return false;
        };
        let cubemap = tex.flags & TextureFlags::CUBEMAP;
        if tex.is_allocated() && (flags & TextureFlags::CUBEMAP) != cubemap {
            crate::engine_warn!("galaxy3d::Texture", "Cubemap flag cannot change after allocation, ignored");
        }
        tex.flags = if tex.is_allocated() {
            (flags - TextureFlags::CUBEMAP) | cubemap
        } else {
            flags
        };
        true
    }

    /// Report a different size than the allocation (e.g. for streamed textures)
    pub fn texture_set_size_override(&mut self, texture: TextureHandle, width: u32, height: u32) -> bool {
        let max_size = self.config.max_texture_size;
        let Some(tex) = lookup_mut(&mut self.textures, texture.rid(), "texture") else {
            return false;
        };
        if tex.flags.contains(TextureFlags::CUBEMAP) {
            crate::engine_error!("galaxy3d::Texture", "Size override is not supported on cubemaps");
            return false;
        }
        if width == 0 || height == 0 || width > max_size || height > max_size {
            crate::engine_error!("galaxy3d::Texture", "Invalid size override {}x{}", width, height);
            return false;
        }
        tex.width = width;
        tex.height = height;
        true
    }

    pub fn texture_set_path(&mut self, texture: TextureHandle, path: &str) -> bool {
        let Some(tex) = lookup_mut(&mut self.textures, texture.rid(), "texture") else {
            return false;
        };
        tex.path = path.to_string();
        true
    }

    /// Describe every live texture
    pub fn texture_debug_usage(&self) -> Vec<TextureInfo> {
        self.textures.iter()
            .map(|(rid, tex)| TextureInfo {
                texture: TextureHandle::from_rid(rid),
                path: tex.path.clone(),
                width: tex.alloc_width,
                height: tex.alloc_height,
                layers: tex.layer_count(),
                format: tex.format,
                bytes: tex.total_data_size,
            })
            .collect()
    }

    /// Release a texture. Refused for render target textures.
    pub(crate) fn free_texture(&mut self, texture: TextureHandle) -> bool {
        let owned = self.textures.get(texture.rid()).and_then(|t| t.render_target);
        if owned.is_some() {
            crate::engine_error!("galaxy3d::Texture",
                "Cannot free a texture owned by a render target, free the render target instead");
            return false;
        }
        self.destroy_texture_storage(texture);
        true
    }

    /// Release the GPU object and table entry (no ownership checks)
    pub(crate) fn destroy_texture_storage(&mut self, texture: TextureHandle) {
        if let Some(tex) = self.textures.remove(texture.rid()) {
            if let Some(gpu) = tex.gpu_texture {
                if let Ok(mut device) = lock_device(&self.device) {
                    device.destroy_texture(gpu);
                }
            }
            self.info.texture_mem = self.info.texture_mem.saturating_sub(tex.total_data_size);
        }
    }

    /// Internal: create a texture backing a render target
    pub(crate) fn create_owned_texture(&mut self, owner: RenderTargetHandle) -> TextureHandle {
        let handle = self.create_texture();
        if let Some(tex) = self.textures.get_mut(handle.rid()) {
            tex.render_target = Some(owner);
            tex.flags = TextureFlags::empty();
        }
        handle
    }

    /// Internal: point a render target texture at a new GPU object
    ///
    /// Passing `None` clears it (size 0x0).
    pub(crate) fn set_owned_texture_storage(
        &mut self,
        texture: TextureHandle,
        gpu: Option<GpuTexture>,
        width: u32,
        height: u32,
        format: TextureFormat,
    ) {
        if let Some(tex) = self.textures.get_mut(texture.rid()) {
            let data_size = match gpu {
                Some(_) => format.level_size(width, height) as u64,
                None => 0,
            };
            self.info.texture_mem = self.info.texture_mem.saturating_sub(tex.total_data_size) + data_size;
            tex.gpu_texture = gpu;
            tex.width = width;
            tex.height = height;
            tex.alloc_width = width;
            tex.alloc_height = height;
            tex.format = format;
            tex.mip_levels = 1;
            tex.images = if gpu.is_some() { vec![None] } else { Vec::new() };
            tex.total_data_size = data_size;
        }
    }
}

fn invalid_texture(texture: TextureHandle) -> Error {
    crate::engine_error!("galaxy3d::Texture", "Invalid texture handle {:?}", texture);
    Error::InvalidHandle(format!("texture {:?}", texture))
}

#[cfg(test)]
#[path = "texture_tests.rs"]
mod tests;
