/// 2D lighting resources: light occluders and light shadow buffers.
///
/// An occluder is a set of line segments extruded into quads for the shadow
/// pass. A light shadow is the distance buffer a 2D light renders its
/// occluders into (one row per direction).

use glam::Vec2;
use crate::backend::{
    BufferDesc, BufferUsage, GpuBuffer, GpuFramebuffer, GpuTexture, GraphicsDevice, TextureDesc, TextureUsage,
};
use crate::error::{Error, Result};
use crate::resource::handle::{BaseType, LightShadowHandle, OccluderHandle};
use crate::resource::resource_manager::{lock_device, ResourceManager};
use crate::resource::texture::TextureFormat;

/// Rows of a light shadow buffer (one per direction)
pub const LIGHT_SHADOW_HEIGHT: u32 = 4;

// ============================================================================
// Canvas occluder
// ============================================================================

/// A 2D light occluder
#[derive(Debug, Default)]
pub struct CanvasOccluder {
    /// Segment endpoints, two per segment
    lines: Vec<Vec2>,
    vertex_buffer: Option<GpuBuffer>,
    index_buffer: Option<GpuBuffer>,
    index_count: u32,
}

impl CanvasOccluder {
    pub fn lines(&self) -> &[Vec2] {
        &self.lines
    }

    pub fn vertex_buffer(&self) -> Option<GpuBuffer> {
        self.vertex_buffer
    }

    pub fn index_buffer(&self) -> Option<GpuBuffer> {
        self.index_buffer
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }
}

/// Extrude each segment into a quad: 4 vertices (x, y, ±1) and 6 indices
fn build_occluder_geometry(lines: &[Vec2]) -> (Vec<f32>, Vec<u16>) {
    let mut vertices = Vec::with_capacity(lines.len() * 6);
    let mut indices = Vec::with_capacity(lines.len() * 3);
    for (segment, pair) in lines.chunks_exact(2).enumerate() {
        for point in pair {
            vertices.extend_from_slice(&[point.x, point.y, 1.0]);
            vertices.extend_from_slice(&[point.x, point.y, -1.0]);
        }
        let base = (segment * 4) as u16;
        indices.extend_from_slice(&[base, base + 2, base + 1, base + 1, base + 2, base + 3]);
    }
    (vertices, indices)
}

// ============================================================================
// Canvas light shadow
// ============================================================================

/// Shadow distance buffer of a 2D light
#[derive(Debug)]
pub struct CanvasLightShadow {
    width: u32,
    height: u32,
    distance: GpuTexture,
    depth: GpuTexture,
    framebuffer: GpuFramebuffer,
}

impl CanvasLightShadow {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn distance_texture(&self) -> GpuTexture {
        self.distance
    }

    pub fn depth_texture(&self) -> GpuTexture {
        self.depth
    }

    pub fn framebuffer(&self) -> GpuFramebuffer {
        self.framebuffer
    }
}

// ============================================================================
// Resource manager API
// ============================================================================

impl ResourceManager {
    /// Create an occluder with no segments
    pub fn create_canvas_occluder(&mut self) -> OccluderHandle {
        let rid = self.registry.allocate(BaseType::CanvasOccluder);
        self.occluders.insert(rid, CanvasOccluder::default());
        OccluderHandle::from_rid(rid)
    }

    /// Get an occluder by handle
    pub fn canvas_occluder(&self, occluder: OccluderHandle) -> Option<&CanvasOccluder> {
        self.occluders.get(occluder.rid())
    }

    /// Replace the segments (pairs of points). An empty list releases the buffers.
    ///
    /// New buffers are built before the old ones are released; on failure the
    /// occluder keeps its previous geometry.
    pub fn canvas_occluder_set_polylines(&mut self, occluder: OccluderHandle, lines: &[Vec2]) -> Result<()> {
        if !self.occluders.contains_key(occluder.rid()) {
            crate::engine_error!("galaxy3d::CanvasOccluder", "Invalid occluder handle {:?}", occluder);
            return Err(Error::InvalidHandle(format!("occluder {:?}", occluder)));
        }
        if lines.len() % 2 != 0 {
            crate::engine_error!("galaxy3d::CanvasOccluder",
                "Occluder needs pairs of points, got {}", lines.len());
            return Err(Error::InvalidResource("odd number of occluder points".to_string()));
        }
        if lines.len() / 2 * 4 > u16::MAX as usize + 1 {
            crate::engine_error!("galaxy3d::CanvasOccluder", "Too many occluder segments ({})", lines.len() / 2);
            return Err(Error::InvalidResource("too many occluder segments".to_string()));
        }

        let mut device = lock_device(&self.device)?;
        let new_buffers = if lines.is_empty() {
            None
        } else {
            let (vertices, indices) = build_occluder_geometry(lines);
            Some(create_occluder_buffers(&mut *device, &vertices, &indices)?)
        };

        if let Some(occ) = self.occluders.get_mut(occluder.rid()) {
            for buffer in [occ.vertex_buffer.take(), occ.index_buffer.take()].into_iter().flatten() {
                device.destroy_buffer(buffer);
            }
            occ.lines = lines.to_vec();
            occ.index_count = (lines.len() / 2 * 6) as u32;
            if let Some((vertex, index)) = new_buffers {
                occ.vertex_buffer = Some(vertex);
                occ.index_buffer = Some(index);
            }
        }
        Ok(())
    }

    pub(crate) fn free_canvas_occluder(&mut self, occluder: OccluderHandle) -> bool {
        let Some(mut occ) = self.occluders.remove(occluder.rid()) else {
            return false;
        };
        if let Ok(mut device) = lock_device(&self.device) {
            for buffer in [occ.vertex_buffer.take(), occ.index_buffer.take()].into_iter().flatten() {
                device.destroy_buffer(buffer);
            }
        }
        true
    }

    /// Create a light shadow buffer `width` texels wide (all-or-nothing)
    pub fn create_canvas_light_shadow(&mut self, width: u32) -> Result<LightShadowHandle> {
        let max_size = self.config.max_texture_size;
        if width == 0 || width > max_size {
            crate::engine_error!("galaxy3d::CanvasLightShadow", "Invalid shadow buffer width {}", width);
            return Err(Error::InvalidResource(format!("shadow buffer width {}", width)));
        }

        let shadow = {
            let mut device = lock_device(&self.device)?;
            create_light_shadow_buffers(&mut *device, width)?
        };

        let rid = self.registry.allocate(BaseType::CanvasLightShadow);
        self.light_shadows.insert(rid, shadow);
        Ok(LightShadowHandle::from_rid(rid))
    }

    /// Get a light shadow buffer by handle
    pub fn canvas_light_shadow(&self, shadow: LightShadowHandle) -> Option<&CanvasLightShadow> {
        self.light_shadows.get(shadow.rid())
    }

    pub(crate) fn free_canvas_light_shadow(&mut self, shadow: LightShadowHandle) -> bool {
        let Some(buffers) = self.light_shadows.remove(shadow.rid()) else {
            return false;
        };
        if let Ok(mut device) = lock_device(&self.device) {
            device.destroy_framebuffer(buffers.framebuffer);
            device.destroy_texture(buffers.depth);
            device.destroy_texture(buffers.distance);
        }
        true
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn create_occluder_buffers(
    device: &mut dyn GraphicsDevice,
    vertices: &[f32],
    indices: &[u16],
) -> Result<(GpuBuffer, GpuBuffer)> {
    let vertex_bytes: &[u8] = bytemuck::cast_slice(vertices);
    let index_bytes: &[u8] = bytemuck::cast_slice(indices);

    let vertex = device.create_buffer(BufferDesc {
        size: vertex_bytes.len() as u64,
        usage: BufferUsage::Vertex,
        data: Some(vertex_bytes),
    })?;
    match device.create_buffer(BufferDesc {
        size: index_bytes.len() as u64,
        usage: BufferUsage::Index,
        data: Some(index_bytes),
    }) {
        Ok(index) => Ok((vertex, index)),
        Err(error) => {
            device.destroy_buffer(vertex);
            crate::engine_error!("galaxy3d::CanvasOccluder", "Occluder buffer allocation failed: {}", error);
            Err(error)
        }
    }
}

fn create_light_shadow_buffers(device: &mut dyn GraphicsDevice, width: u32) -> Result<CanvasLightShadow> {
    let height = LIGHT_SHADOW_HEIGHT;
    let distance = device.create_texture(TextureDesc {
        width,
        height,
        format: TextureFormat::RF,
        layers: 1,
        mip_levels: 1,
        usage: TextureUsage::ColorAttachment,
    })?;
    let depth = match device.create_texture(TextureDesc {
        width,
        height,
        format: TextureFormat::Depth32F,
        layers: 1,
        mip_levels: 1,
        usage: TextureUsage::DepthAttachment,
    }) {
        Ok(depth) => depth,
        Err(error) => {
            device.destroy_texture(distance);
            crate::engine_error!("galaxy3d::CanvasLightShadow", "Shadow depth allocation failed: {}", error);
            return Err(error);
        }
    };
    match device.create_framebuffer(&[distance, depth]) {
        Ok(framebuffer) => Ok(CanvasLightShadow { width, height, distance, depth, framebuffer }),
        Err(error) => {
            device.destroy_texture(depth);
            device.destroy_texture(distance);
            crate::engine_error!("galaxy3d::CanvasLightShadow", "Shadow framebuffer allocation failed: {}", error);
            Err(error)
        }
    }
}

#[cfg(test)]
#[path = "occluder_tests.rs"]
mod tests;
