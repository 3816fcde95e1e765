//! Backend collaborator contracts
//!
//! The storage layer never talks to a GPU API or a shading-language compiler
//! directly. It drives them through the two traits below, which backend crates
//! implement (and tests replace with mocks).

pub mod graphics_device;
pub mod shader_compiler;

pub use graphics_device::*;
pub use shader_compiler::*;

// Mock backends for tests (no GPU or compiler required)
#[cfg(test)]
pub mod mock_graphics_device;
#[cfg(test)]
pub mod mock_shader_compiler;
