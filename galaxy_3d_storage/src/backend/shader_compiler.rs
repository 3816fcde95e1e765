/// ShaderCompiler trait and reflection types
///
/// The compiler turns shading-language source into a program the GPU layer
/// understands and reports how the program expects its material data:
/// uniform offsets inside the material uniform block, texture binding order,
/// and a handful of render-state facts the storage layer caches on materials.

use bitflags::bitflags;
use crate::error::Result;
use crate::resource::uniform::UniformInfo;

/// Kind of program a shader builds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShaderMode {
    /// 3D surface shader
    #[default]
    Spatial,
    /// 2D canvas item shader
    CanvasItem,
    /// Particle process shader
    Particles,
}

/// Blend equation requested by the shader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlendMode {
    #[default]
    Mix,
    Add,
    Sub,
    Mul,
    /// Premultiplied alpha (canvas items only)
    PremultAlpha,
}

/// Depth write policy requested by a spatial shader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DepthDrawMode {
    #[default]
    Opaque,
    Always,
    Never,
    AlphaPrepass,
}

/// Face culling requested by a spatial shader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CullMode {
    Front,
    #[default]
    Back,
    Disabled,
}

/// Lighting model of a canvas item shader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CanvasLightMode {
    #[default]
    Normal,
    Unshaded,
    LightOnly,
}

/// Fixed-function state declared by the shader source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderState {
    pub blend_mode: BlendMode,
    pub depth_draw_mode: DepthDrawMode,
    pub cull_mode: CullMode,
    pub light_mode: CanvasLightMode,
}

bitflags! {
    /// Facts the compiler discovered about the shader body
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ShaderFlags: u32 {
        const USES_ALPHA         = 1 << 0;
        const UNSHADED           = 1 << 1;
        const ONTOP              = 1 << 2;
        const USES_VERTEX        = 1 << 3;
        const USES_DISCARD       = 1 << 4;
        const USES_VERTEX_TIME   = 1 << 5;
        const USES_FRAGMENT_TIME = 1 << 6;
    }
}

impl ShaderFlags {
    /// Whether the shader output changes every frame
    pub fn uses_time(&self) -> bool {
        self.intersects(ShaderFlags::USES_VERTEX_TIME | ShaderFlags::USES_FRAGMENT_TIME)
    }
}

/// Everything the storage layer learns from a successful compile
#[derive(Debug, Clone, Default)]
pub struct ShaderReflection {
    /// Uniforms (value and texture), in any order
    pub uniforms: Vec<UniformInfo>,
    /// Size of the material uniform block in bytes
    pub ubo_size: u32,
    /// Number of texture bindings
    pub texture_count: u32,
    pub render_state: RenderState,
    pub flags: ShaderFlags,
}

/// Shading-language compiler interface
///
/// Called synchronously while the dirty shader queue is flushed.
/// A compile error is reported through `Err`; the shader then becomes invalid.
pub trait ShaderCompiler: Send + Sync {
    /// Compile `code` for the given mode
    fn compile(&mut self, mode: ShaderMode, code: &str) -> Result<ShaderReflection>;
}
