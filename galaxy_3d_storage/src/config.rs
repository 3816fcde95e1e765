/// Storage configuration and statistics

/// Limits the storage layer enforces on behalf of the GPU backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageConfig {
    /// Largest accepted texture width or height
    pub max_texture_size: u32,
    /// Largest number of texture bindings a shader may declare
    pub max_texture_image_units: u32,
    /// Largest material uniform block, in bytes
    pub max_uniform_buffer_size: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            max_texture_size: 16384,
            max_texture_image_units: 16,
            max_uniform_buffer_size: 65536,
        }
    }
}

/// Storage statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StorageInfo {
    /// Bytes of texture memory currently allocated
    pub texture_mem: u64,
    /// Number of live resources, all kinds
    pub resource_count: u32,
    /// Number of registered instances
    pub instance_count: u32,
    /// Shader recompilations since creation
    pub shader_compilations: u64,
    /// Material rebuilds since creation
    pub material_rebuilds: u64,
}
