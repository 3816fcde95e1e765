/// Mesh resources.
///
/// A mesh owns an ordered list of surfaces. Each surface is one draw: a
/// vertex array in a layout derived from its `SurfaceFormat`, an optional
/// index array, optional morph targets, a local AABB and a material.
///
/// Meshes are instantiable: adding or removing surfaces fires
/// `notify_structure_changed`, changing a surface material fires
/// `notify_material_changed`. A mesh counts as an owner of every material
/// its surfaces use, once per surface.

use bitflags::bitflags;
use crate::backend::{BufferDesc, BufferUsage, GpuBuffer, GraphicsDevice};
use crate::error::{Error, Result};
use crate::resource::aabb::AABB;
use crate::resource::dependency::{AsInstantiable, Instantiable};
use crate::resource::handle::{BaseType, MaterialHandle, MeshHandle, Rid};
use crate::resource::resource_manager::{lock_device, lookup_mut, ResourceManager};

// ============================================================================
// Vertex format
// ============================================================================

bitflags! {
    /// Attributes present in a surface (plus layout options)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SurfaceFormat: u32 {
        const VERTEX  = 1 << 0;
        const NORMAL  = 1 << 1;
        const TANGENT = 1 << 2;
        const COLOR   = 1 << 3;
        const TEX_UV  = 1 << 4;
        const TEX_UV2 = 1 << 5;
        const BONES   = 1 << 6;
        const WEIGHTS = 1 << 7;
        const INDEX   = 1 << 8;
        /// Positions are 2 floats instead of 3
        const USE_2D_VERTICES = 1 << 9;
    }
}

/// One vertex attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexAttribute {
    Vertex,
    Normal,
    Tangent,
    Color,
    TexUv,
    TexUv2,
    Bones,
    Weights,
}

/// Attribute placement inside an interleaved vertex
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexLayout {
    /// (attribute, byte offset, byte size) in vertex order
    pub attributes: Vec<(VertexAttribute, u32, u32)>,
    pub stride: u32,
}

impl VertexLayout {
    /// Interleaved layout for a surface format
    pub fn from_format(format: SurfaceFormat) -> Self {
        let vertex_size = if format.contains(SurfaceFormat::USE_2D_VERTICES) { 8 } else { 12 };
        let candidates = [
            (SurfaceFormat::VERTEX, VertexAttribute::Vertex, vertex_size),
            (SurfaceFormat::NORMAL, VertexAttribute::Normal, 12),
            (SurfaceFormat::TANGENT, VertexAttribute::Tangent, 16),
            (SurfaceFormat::COLOR, VertexAttribute::Color, 4),    // RGBA8
            (SurfaceFormat::TEX_UV, VertexAttribute::TexUv, 8),
            (SurfaceFormat::TEX_UV2, VertexAttribute::TexUv2, 8),
            (SurfaceFormat::BONES, VertexAttribute::Bones, 8),    // 4 x u16
            (SurfaceFormat::WEIGHTS, VertexAttribute::Weights, 16),
        ];

        let mut attributes = Vec::new();
        let mut stride = 0;
        for (flag, attribute, size) in candidates {
            if format.contains(flag) {
                attributes.push((attribute, stride, size));
                stride += size;
            }
        }
        Self { attributes, stride }
    }

    /// Byte offset of an attribute, if present
    pub fn offset_of(&self, attribute: VertexAttribute) -> Option<u32> {
        self.attributes.iter().find(|(a, _, _)| *a == attribute).map(|(_, offset, _)| *offset)
    }
}

/// Bytes per index for a given vertex count
pub fn index_size_for(vertex_count: u32) -> u32 {
    if vertex_count < 65536 { 2 } else { 4 }
}

/// Primitive assembly of a surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrimitiveType {
    Points,
    Lines,
    LineStrip,
    LineLoop,
    #[default]
    Triangles,
    TriangleStrip,
    TriangleFan,
}

/// How morph targets combine with the base shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MorphTargetMode {
    #[default]
    Normalized,
    Relative,
}

// ============================================================================
// Surface
// ============================================================================

/// Description of a surface to add to a mesh
#[derive(Debug, Clone, Default)]
pub struct SurfaceDesc {
    pub format: SurfaceFormat,
    pub primitive: PrimitiveType,
    /// Interleaved vertex data (`VertexLayout::from_format(format).stride * vertex_count` bytes)
    pub array: Vec<u8>,
    pub vertex_count: u32,
    /// Index data (`index_size_for(vertex_count) * index_count` bytes), empty without `INDEX`
    pub index_array: Vec<u8>,
    pub index_count: u32,
    pub aabb: AABB,
    /// One array per morph target, same size as `array`
    pub morph_targets: Vec<Vec<u8>>,
    pub bone_aabbs: Vec<AABB>,
}

impl Default for SurfaceFormat {
    fn default() -> Self {
        SurfaceFormat::VERTEX
    }
}

/// A morph target and its GPU copy
#[derive(Debug)]
pub struct MorphTarget {
    data: Vec<u8>,
    buffer: GpuBuffer,
}

impl MorphTarget {
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn buffer(&self) -> GpuBuffer {
        self.buffer
    }
}

/// One draw of a mesh
#[derive(Debug)]
pub struct Surface {
    format: SurfaceFormat,
    primitive: PrimitiveType,
    layout: VertexLayout,
    array: Vec<u8>,
    vertex_count: u32,
    index_array: Vec<u8>,
    index_count: u32,
    vertex_buffer: GpuBuffer,
    index_buffer: Option<GpuBuffer>,
    morph_targets: Vec<MorphTarget>,
    aabb: AABB,
    bone_aabbs: Vec<AABB>,
    material: Option<MaterialHandle>,
}

impl Surface {
    pub fn format(&self) -> SurfaceFormat {
        self.format
    }

    pub fn primitive(&self) -> PrimitiveType {
        self.primitive
    }

    pub fn layout(&self) -> &VertexLayout {
        &self.layout
    }

    pub fn array(&self) -> &[u8] {
        &self.array
    }

    pub fn array_len(&self) -> u32 {
        self.vertex_count
    }

    pub fn index_array(&self) -> &[u8] {
        &self.index_array
    }

    pub fn index_array_len(&self) -> u32 {
        self.index_count
    }

    pub fn vertex_buffer(&self) -> GpuBuffer {
        self.vertex_buffer
    }

    pub fn index_buffer(&self) -> Option<GpuBuffer> {
        self.index_buffer
    }

    pub fn morph_targets(&self) -> &[MorphTarget] {
        &self.morph_targets
    }

    pub fn aabb(&self) -> AABB {
        self.aabb
    }

    pub fn bone_aabbs(&self) -> &[AABB] {
        &self.bone_aabbs
    }

    pub fn material(&self) -> Option<MaterialHandle> {
        self.material
    }

    fn gpu_buffers(&self) -> impl Iterator<Item = GpuBuffer> + '_ {
        std::iter::once(self.vertex_buffer)
            .chain(self.index_buffer)
            .chain(self.morph_targets.iter().map(|m| m.buffer))
    }
}

// ============================================================================
// Mesh
// ============================================================================

/// A mesh resource
#[derive(Debug, Default)]
pub struct Mesh {
    surfaces: Vec<Surface>,
    morph_target_count: u32,
    morph_target_mode: MorphTargetMode,
    custom_aabb: Option<AABB>,
    /// Merged surface bounds
    aabb: AABB,
    instantiable: Instantiable,
}

impl Mesh {
    pub fn surfaces(&self) -> &[Surface] {
        &self.surfaces
    }

    pub fn surface(&self, index: usize) -> Option<&Surface> {
        self.surfaces.get(index)
    }

    pub fn surface_count(&self) -> usize {
        self.surfaces.len()
    }

    pub fn morph_target_count(&self) -> u32 {
        self.morph_target_count
    }

    pub fn morph_target_mode(&self) -> MorphTargetMode {
        self.morph_target_mode
    }

    pub fn custom_aabb(&self) -> Option<AABB> {
        self.custom_aabb
    }

    /// Custom AABB if set, otherwise the union of all surfaces
    pub fn aabb(&self) -> AABB {
        self.custom_aabb.unwrap_or(self.aabb)
    }

    fn update_aabb(&mut self) {
        self.aabb = AABB::merge_all(self.surfaces.iter().map(|s| &s.aabb));
    }
}

impl AsInstantiable for Mesh {
    fn instantiable(&self) -> &Instantiable {
        &self.instantiable
    }

    fn instantiable_mut(&mut self) -> &mut Instantiable {
        &mut self.instantiable
    }
}

// ============================================================================
// Resource manager API
// ============================================================================

impl ResourceManager {
    /// Create an empty mesh
    pub fn create_mesh(&mut self) -> MeshHandle {
        let rid = self.registry.allocate(BaseType::Mesh);
        self.meshes.insert(rid, Mesh::default());
        MeshHandle::from_rid(rid)
    }

    /// Get a mesh by handle
    pub fn mesh(&self, mesh: MeshHandle) -> Option<&Mesh> {
        self.meshes.get(mesh.rid())
    }

    /// Number of surfaces (0 for invalid handles)
    pub fn mesh_get_surface_count(&self, mesh: MeshHandle) -> usize {
        self.meshes.get(mesh.rid()).map_or(0, |m| m.surface_count())
    }

    /// Add a surface. GPU buffers are created all-or-nothing.
    pub fn mesh_add_surface(&mut self, mesh: MeshHandle, desc: SurfaceDesc) -> Result<()> {
        let Some(target) = self.meshes.get(mesh.rid()) else {
            crate::engine_error!("galaxy3d::Mesh", "Invalid mesh handle {:?}", mesh);
            return Err(Error::InvalidHandle(format!("mesh {:?}", mesh)));
        };
        let layout = validate_surface(&desc, target.morph_target_count)?;

        let (vertex_buffer, index_buffer, morph_buffers) = {
            let mut device = lock_device(&self.device)?;
            create_surface_buffers(&mut *device, &desc)?
        };

        let surface = Surface {
            format: desc.format,
            primitive: desc.primitive,
            layout,
            array: desc.array,
            vertex_count: desc.vertex_count,
            index_array: desc.index_array,
            index_count: desc.index_count,
            vertex_buffer,
            index_buffer,
            morph_targets: desc.morph_targets.into_iter()
                .zip(morph_buffers)
                .map(|(data, buffer)| MorphTarget { data, buffer })
                .collect(),
            aabb: desc.aabb,
            bone_aabbs: desc.bone_aabbs,
            material: None,
        };

        if let Some(target) = self.meshes.get_mut(mesh.rid()) {
            target.surfaces.push(surface);
            target.update_aabb();
        }
        self.notify_structure_changed(mesh);
        Ok(())
    }

    /// Remove one surface, releasing its buffers and material reference
    pub fn mesh_remove_surface(&mut self, mesh: MeshHandle, index: usize) -> bool {
        let Some(target) = lookup_mut(&mut self.meshes, mesh.rid(), "mesh") else {
            return false;
        };
        if index >= target.surfaces.len() {
            crate::engine_error!("galaxy3d::Mesh",
                "Surface index {} out of range ({} surface(s))", index, target.surfaces.len());
            return false;
        }
        let surface = target.surfaces.remove(index);
        target.update_aabb();
        self.release_surface(mesh.rid(), surface);
        self.notify_structure_changed(mesh);
        true
    }

    /// Remove every surface
    pub fn mesh_clear(&mut self, mesh: MeshHandle) -> bool {
        let Some(target) = lookup_mut(&mut self.meshes, mesh.rid(), "mesh") else {
            return false;
        };
        let surfaces = std::mem::take(&mut target.surfaces);
        target.update_aabb();
        for surface in surfaces {
            self.release_surface(mesh.rid(), surface);
        }
        self.notify_structure_changed(mesh);
        true
    }

    /// Set the morph target count. Only allowed while the mesh has no surfaces.
    pub fn mesh_set_morph_target_count(&mut self, mesh: MeshHandle, count: u32) -> bool {
        let Some(target) = lookup_mut(&mut self.meshes, mesh.rid(), "mesh") else {
            return false;
        };
        if !target.surfaces.is_empty() {
            crate::engine_error!("galaxy3d::Mesh", "Morph target count can only change on an empty mesh");
            return false;
        }
        target.morph_target_count = count;
        true
    }

    pub fn mesh_set_morph_target_mode(&mut self, mesh: MeshHandle, mode: MorphTargetMode) -> bool {
        let Some(target) = lookup_mut(&mut self.meshes, mesh.rid(), "mesh") else {
            return false;
        };
        target.morph_target_mode = mode;
        true
    }

    /// Set (or with `None`, clear) the material of one surface
    pub fn mesh_surface_set_material(
        &mut self,
        mesh: MeshHandle,
        index: usize,
        material: Option<MaterialHandle>,
    ) -> bool {
        if let Some(material) = material {
            if !self.materials.contains_key(material.rid()) {
                crate::engine_error!("galaxy3d::Mesh", "Invalid material handle {:?}", material);
                return false;
            }
        }
        let Some(target) = lookup_mut(&mut self.meshes, mesh.rid(), "mesh") else {
            return false;
        };
        let Some(surface) = target.surfaces.get_mut(index) else {
            crate::engine_error!("galaxy3d::Mesh",
                "Surface index {} out of range ({} surface(s))", index, target.surfaces.len());
            return false;
        };
        if surface.material == material {
            return true;
        }
        let old = std::mem::replace(&mut surface.material, material);

        if let Some(old) = old {
            self.material_remove_instantiable_owner(old, mesh.rid());
        }
        if let Some(new) = material {
            self.material_add_instantiable_owner(new, mesh.rid());
        }
        self.notify_material_changed(mesh);
        true
    }

    pub fn mesh_surface_get_material(&self, mesh: MeshHandle, index: usize) -> Option<MaterialHandle> {
        self.meshes.get(mesh.rid())?.surface(index)?.material
    }

    /// Override the computed bounds (or with `None`, go back to them)
    pub fn mesh_set_custom_aabb(&mut self, mesh: MeshHandle, aabb: Option<AABB>) -> bool {
        let Some(target) = lookup_mut(&mut self.meshes, mesh.rid(), "mesh") else {
            return false;
        };
        target.custom_aabb = aabb;
        self.notify_structure_changed(mesh);
        true
    }

    pub fn mesh_get_custom_aabb(&self, mesh: MeshHandle) -> Option<AABB> {
        self.meshes.get(mesh.rid())?.custom_aabb
    }

    /// Custom AABB if set, otherwise the union of all surfaces
    pub fn mesh_get_aabb(&self, mesh: MeshHandle) -> Option<AABB> {
        self.meshes.get(mesh.rid()).map(|m| m.aabb())
    }

    /// Release a removed surface's buffers and material reference
    fn release_surface(&mut self, mesh: Rid, surface: Surface) {
        if let Ok(mut device) = lock_device(&self.device) {
            for buffer in surface.gpu_buffers() {
                device.destroy_buffer(buffer);
            }
        }
        if let Some(material) = surface.material {
            self.material_remove_instantiable_owner(material, mesh);
        }
    }

    /// Clear a freed material from every surface of a mesh
    pub(crate) fn detach_material_from_mesh(&mut self, mesh: Rid, material: MaterialHandle) {
        if let Some(target) = self.meshes.get_mut(mesh) {
            for surface in target.surfaces.iter_mut().filter(|s| s.material == Some(material)) {
                surface.material = None;
            }
        }
    }

    /// Free cascade: release surfaces, then notify and drain instances
    pub(crate) fn free_mesh(&mut self, mesh: MeshHandle) -> bool {
        let Some(target) = self.meshes.get_mut(mesh.rid()) else {
            return false;
        };
        let surfaces = std::mem::take(&mut target.surfaces);
        for surface in surfaces {
            self.release_surface(mesh.rid(), surface);
        }
        self.drain_instances(mesh.rid());
        self.meshes.remove(mesh.rid());
        true
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Check a surface description against its format, returning its vertex layout
fn validate_surface(desc: &SurfaceDesc, morph_target_count: u32) -> Result<VertexLayout> {
    let fail = |message: String| -> Result<VertexLayout> {
        crate::engine_error!("galaxy3d::Mesh", "Invalid surface: {}", message);
        Err(Error::InvalidResource(message))
    };

    if !desc.format.contains(SurfaceFormat::VERTEX) {
        return fail("format has no vertex positions".to_string());
    }
    if desc.vertex_count == 0 {
        return fail("surface has no vertices".to_string());
    }
    let layout = VertexLayout::from_format(desc.format);
    let expected = layout.stride as usize * desc.vertex_count as usize;
    if desc.array.len() != expected {
        return fail(format!("vertex array is {} bytes, expected {}", desc.array.len(), expected));
    }

    if desc.format.contains(SurfaceFormat::INDEX) {
        let expected = index_size_for(desc.vertex_count) as usize * desc.index_count as usize;
        if desc.index_count == 0 || desc.index_array.len() != expected {
            return fail(format!("index array is {} bytes, expected {}", desc.index_array.len(), expected));
        }
    } else if desc.index_count != 0 || !desc.index_array.is_empty() {
        return fail("index data given without the INDEX format flag".to_string());
    }

    if desc.morph_targets.len() != morph_target_count as usize {
        return fail(format!("{} morph target(s) given, mesh expects {}",
            desc.morph_targets.len(), morph_target_count));
    }
    if desc.morph_targets.iter().any(|m| m.len() != desc.array.len()) {
        return fail("morph target size differs from the vertex array".to_string());
    }
    Ok(layout)
}

/// Create vertex, index and morph buffers. On failure, whatever was created is released.
fn create_surface_buffers(
    device: &mut dyn GraphicsDevice,
    desc: &SurfaceDesc,
) -> Result<(GpuBuffer, Option<GpuBuffer>, Vec<GpuBuffer>)> {
    let mut created = Vec::new();
    match try_create_surface_buffers(device, desc, &mut created) {
        Ok(buffers) => Ok(buffers),
        Err(error) => {
            crate::engine_error!("galaxy3d::Mesh", "Surface buffer allocation failed: {}", error);
            for buffer in created {
                device.destroy_buffer(buffer);
            }
            Err(error)
        }
    }
}

fn try_create_surface_buffers(
    device: &mut dyn GraphicsDevice,
    desc: &SurfaceDesc,
    created: &mut Vec<GpuBuffer>,
) -> Result<(GpuBuffer, Option<GpuBuffer>, Vec<GpuBuffer>)> {
    let vertex = device.create_buffer(BufferDesc {
        size: desc.array.len() as u64,
        usage: BufferUsage::Vertex,
        data: Some(desc.array.as_slice()),
    })?;
    created.push(vertex);

    let index = if desc.index_array.is_empty() {
        None
    } else {
        let index = device.create_buffer(BufferDesc {
            size: desc.index_array.len() as u64,
            usage: BufferUsage::Index,
            data: Some(desc.index_array.as_slice()),
        })?;
        created.push(index);
        Some(index)
    };

    let mut morphs = Vec::with_capacity(desc.morph_targets.len());
    for morph in &desc.morph_targets {
        let buffer = device.create_buffer(BufferDesc {
            size: morph.len() as u64,
            usage: BufferUsage::Vertex,
            data: Some(morph.as_slice()),
        })?;
        created.push(buffer);
        morphs.push(buffer);
    }
    Ok((vertex, index, morphs))
}

#[cfg(test)]
#[path = "mesh_tests.rs"]
mod tests;
