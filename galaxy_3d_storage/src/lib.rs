/*!
# Galaxy 3D Storage

Handle-based GPU resource storage for the Galaxy 3D rendering engine.

This crate owns textures, shaders, materials, meshes, lights, render targets
and 2D lighting resources behind opaque handles. It tracks which external
instances depend on which resources, queues derived-data rebuilds
(shader compilation, material uniform blocks) and flushes them once per frame.

GPU allocation and shader compilation are delegated to backend
implementations of the `GraphicsDevice` and `ShaderCompiler` traits.

## Architecture

- **Engine**: global singleton holding the resource manager and the logger
- **ResourceManager**: owns every resource, the dirty queues and the instance registry
- **InstanceBase**: callbacks external instances receive when their resources change
- **GraphicsDevice / ShaderCompiler**: backend contracts
*/

// Internal modules
mod error;
mod engine;
mod config;
pub mod log;
pub mod backend;
pub mod resource;
mod utils;

// Main galaxy3d namespace module
pub mod galaxy3d {
    // Error types
    pub use crate::error::{Error, Result};

    // Engine singleton
    pub use crate::engine::Engine;

    // Configuration and statistics
    pub use crate::config::{StorageConfig, StorageInfo};

    // Logging sub-module (types only, NOT macros)
    pub mod log {
        pub use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger, MemoryLogger};
        // Note: engine_* macros are NOT re-exported here - they are internal only
    }

    // Backend contracts
    pub mod backend {
        pub use crate::backend::*;
    }

    // Resource sub-module
    pub mod resource {
        pub use crate::resource::*;
    }
}

// Re-export math library at crate root
pub use glam;
