//! Resource storage module
//!
//! Every resource lives in the `ResourceManager` behind a typed handle.
//! Per-kind operations are implemented next to each resource type.

pub mod handle;
pub mod uniform;
pub mod aabb;
pub mod dependency;
mod resource_manager;
pub mod texture;
pub mod shader;
pub mod material;
pub mod mesh;
pub mod light;
pub mod render_target;
pub mod occluder;

// Recording instance for tests
#[cfg(test)]
pub mod mock_instance;

pub use resource_manager::ResourceManager;
pub use handle::{
    BaseType, Rid, InstanceKey,
    TextureHandle, ShaderHandle, MaterialHandle, MeshHandle,
    LightHandle, RenderTargetHandle, OccluderHandle, LightShadowHandle,
};
pub use uniform::{UniformType, UniformHint, UniformInfo, ParamValue};
pub use aabb::AABB;
pub use dependency::{InstanceBase, Instantiable, Notification};
pub use texture::{Texture, TextureFormat, TextureFlags, TextureData, TextureInfo, CubeMapSide};
pub use shader::{Shader, ShaderState};
pub use material::Material;
pub use mesh::{
    Mesh, Surface, SurfaceDesc, SurfaceFormat, PrimitiveType,
    MorphTarget, MorphTargetMode, VertexAttribute, VertexLayout,
};
pub use light::{
    Light, LightType, LightParam,
    OmniShadowMode, OmniShadowDetail, DirectionalShadowMode,
};
pub use render_target::{RenderTarget, RenderTargetFlags};
pub use occluder::{CanvasOccluder, CanvasLightShadow, LIGHT_SHADOW_HEIGHT};
