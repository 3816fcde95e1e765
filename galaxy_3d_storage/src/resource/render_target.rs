/// Render target resources.
///
/// A render target owns a texture (its color output, sampleable by materials)
/// plus an optional depth attachment and a framebuffer. Any size or flag
/// change tears everything down and reallocates it. Allocation is
/// all-or-nothing: if any GPU object cannot be created, the target is left
/// cleared at 0x0 and the error is returned.

use bitflags::bitflags;
use crate::backend::{GpuFramebuffer, GpuTexture, GraphicsDevice, TextureDesc, TextureUsage};
use crate::error::{Error, Result};
use crate::resource::handle::{BaseType, RenderTargetHandle, TextureHandle};
use crate::resource::resource_manager::{lock_device, lookup_mut, ResourceManager};
use crate::resource::texture::TextureFormat;

bitflags! {
    /// Render target options
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RenderTargetFlags: u32 {
        /// Output is flipped vertically
        const VFLIP       = 1 << 0;
        /// Color output keeps alpha
        const TRANSPARENT = 1 << 1;
        /// 2D only, no depth attachment
        const NO_3D       = 1 << 2;
        /// Output is never sampled
        const NO_SAMPLING = 1 << 3;
    }
}

/// GPU objects backing an allocated render target
#[derive(Debug, Clone, Copy)]
struct RenderTargetBuffers {
    color: GpuTexture,
    depth: Option<GpuTexture>,
    framebuffer: GpuFramebuffer,
}

/// A render target resource
#[derive(Debug)]
pub struct RenderTarget {
    width: u32,
    height: u32,
    flags: RenderTargetFlags,
    texture: TextureHandle,
    buffers: Option<RenderTargetBuffers>,
    used_in_frame: bool,
}

impl RenderTarget {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn flags(&self) -> RenderTargetFlags {
        self.flags
    }

    /// Texture exposing the color output
    pub fn texture(&self) -> TextureHandle {
        self.texture
    }

    pub fn is_allocated(&self) -> bool {
        self.buffers.is_some()
    }

    pub fn framebuffer(&self) -> Option<GpuFramebuffer> {
        self.buffers.map(|b| b.framebuffer)
    }

    pub fn depth(&self) -> Option<GpuTexture> {
        self.buffers.and_then(|b| b.depth)
    }

    pub fn color_format(&self) -> TextureFormat {
        color_format(self.flags)
    }

    pub fn used_in_frame(&self) -> bool {
        self.used_in_frame
    }
}

fn color_format(flags: RenderTargetFlags) -> TextureFormat {
    if flags.contains(RenderTargetFlags::TRANSPARENT) {
        TextureFormat::RGBA8
    } else {
        TextureFormat::RGB8
    }
}

// ===== RESOURCE MANAGER API =====

impl ResourceManager {
    /// Create a 0x0 render target and its texture
    pub fn create_render_target(&mut self) -> RenderTargetHandle {
        let rid = self.registry.allocate(BaseType::RenderTarget);
        let handle = RenderTargetHandle::from_rid(rid);
        let texture = self.create_owned_texture(handle);
        self.render_targets.insert(rid, RenderTarget {
            width: 0,
            height: 0,
            flags: RenderTargetFlags::empty(),
            texture,
            buffers: None,
            used_in_frame: false,
        });
        handle
    }

    /// Get a render target by handle
    pub fn render_target(&self, target: RenderTargetHandle) -> Option<&RenderTarget> {
        self.render_targets.get(target.rid())
    }

    /// Resize. Setting the current size again does nothing.
    pub fn render_target_set_size(&mut self, target: RenderTargetHandle, width: u32, height: u32) -> Result<()> {
        let Some(rt) = self.render_targets.get(target.rid()) else {
            return Err(invalid_render_target(target));
        };
        if rt.width == width && rt.height == height && (rt.is_allocated() || width == 0 || height == 0) {
            return Ok(());
        }
        let max_size = self.config.max_texture_size;
        if width > max_size || height > max_size {
            crate::engine_error!("galaxy3d::RenderTarget",
                "Render target size {}x{} exceeds limit {}", width, height, max_size);
            return Err(Error::InvalidResource(format!("render target size {}x{}", width, height)));
        }
        self.reallocate_render_target(target, width, height)
    }

    /// Enable or disable a flag, reallocating the buffers
    pub fn render_target_set_flag(&mut self, target: RenderTargetHandle, flag: RenderTargetFlags, enabled: bool) -> Result<()> {
        let Some(rt) = self.render_targets.get_mut(target.rid()) else {
            return Err(invalid_render_target(target));
        };
        rt.flags.set(flag, enabled);
        let (width, height) = (rt.width, rt.height);
        self.reallocate_render_target(target, width, height)
    }

    pub fn render_target_get_texture(&self, target: RenderTargetHandle) -> Option<TextureHandle> {
        self.render_targets.get(target.rid()).map(|rt| rt.texture)
    }

    /// Record that the target was drawn to this frame
    pub fn render_target_mark_used(&mut self, target: RenderTargetHandle) -> bool {
        let Some(rt) = lookup_mut(&mut self.render_targets, target.rid(), "render target") else {
            return false;
        };
        rt.used_in_frame = true;
        true
    }

    pub fn render_target_was_used_in_frame(&self, target: RenderTargetHandle) -> bool {
        self.render_targets.get(target.rid()).is_some_and(|rt| rt.used_in_frame)
    }

    /// Reset the per-frame usage marks of every render target
    pub fn render_target_clear_used_marks(&mut self) {
        for rt in self.render_targets.values_mut() {
            rt.used_in_frame = false;
        }
    }

    /// Tear down, then allocate at the given size (0 on either axis leaves it cleared)
    fn reallocate_render_target(&mut self, target: RenderTargetHandle, width: u32, height: u32) -> Result<()> {
        self.clear_render_target(target);
        if width == 0 || height == 0 {
            return Ok(());
        }
        let Some(rt) = self.render_targets.get(target.rid()) else {
            return Err(invalid_render_target(target));
        };
        let flags = rt.flags;
        let texture = rt.texture;

        let buffers = {
            let mut device = lock_device(&self.device)?;
            create_render_target_buffers(&mut *device, width, height, flags)?
        };

        if let Some(rt) = self.render_targets.get_mut(target.rid()) {
            rt.width = width;
            rt.height = height;
            rt.buffers = Some(buffers);
        }
        self.set_owned_texture_storage(texture, Some(buffers.color), width, height, color_format(flags));
        crate::engine_debug!("galaxy3d::RenderTarget", "Allocated render target {}x{} {:?}", width, height, flags);
        Ok(())
    }

    /// Release GPU objects and set the size to 0x0
    fn clear_render_target(&mut self, target: RenderTargetHandle) {
        let Some(rt) = self.render_targets.get_mut(target.rid()) else {
            return;
        };
        let buffers = rt.buffers.take();
        let texture = rt.texture;
        rt.width = 0;
        rt.height = 0;

        if let Some(buffers) = buffers {
            if let Ok(mut device) = lock_device(&self.device) {
                device.destroy_framebuffer(buffers.framebuffer);
                if let Some(depth) = buffers.depth {
                    device.destroy_texture(depth);
                }
                device.destroy_texture(buffers.color);
            }
        }
        self.set_owned_texture_storage(texture, None, 0, 0, TextureFormat::RGBA8);
    }

    /// Free cascade: release buffers and the owned texture
    pub(crate) fn free_render_target(&mut self, target: RenderTargetHandle) -> bool {
        let Some(texture) = self.render_targets.get(target.rid()).map(|rt| rt.texture) else {
            return false;
        };
        self.clear_render_target(target);
        self.destroy_texture_storage(texture);
        self.registry.release(texture.rid());
        self.render_targets.remove(target.rid());
        true
    }
}

fn invalid_render_target(target: RenderTargetHandle) -> Error {
    crate::engine_error!("galaxy3d::RenderTarget", "Invalid render target handle {:?}", target);
    Error::InvalidHandle(format!("render target {:?}", target))
}

/// Create color, depth and framebuffer. On failure, whatever was created is released.
fn create_render_target_buffers(
    device: &mut dyn GraphicsDevice,
    width: u32,
    height: u32,
    flags: RenderTargetFlags,
) -> Result<RenderTargetBuffers> {
    let color = device.create_texture(TextureDesc {
        width,
        height,
        format: color_format(flags),
        layers: 1,
        mip_levels: 1,
        usage: TextureUsage::ColorAttachment,
    })?;

    let depth = if flags.contains(RenderTargetFlags::NO_3D) {
        None
    } else {
        let created = device.create_texture(TextureDesc {
            width,
            height,
            format: TextureFormat::Depth32F,
            layers: 1,
            mip_levels: 1,
            usage: TextureUsage::DepthAttachment,
        });
        match created {
            Ok(depth) => Some(depth),
            Err(error) => {
                device.destroy_texture(color);
                crate::engine_error!("galaxy3d::RenderTarget", "Depth attachment allocation failed: {}", error);
                return Err(error);
            }
        }
    };

    let attachments: Vec<GpuTexture> = std::iter::once(color).chain(depth).collect();
    match device.create_framebuffer(&attachments) {
        Ok(framebuffer) => Ok(RenderTargetBuffers { color, depth, framebuffer }),
        Err(error) => {
            for texture in attachments {
                device.destroy_texture(texture);
            }
            crate::engine_error!("galaxy3d::RenderTarget", "Framebuffer allocation failed: {}", error);
            Err(error)
        }
    }
}

#[cfg(test)]
#[path = "render_target_tests.rs"]
mod tests;
