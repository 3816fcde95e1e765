/// Uniform layout and material parameter values.
///
/// A compiled shader describes its material block as a list of `UniformInfo`
/// (name, type, byte offset). Materials store `ParamValue`s by name and encode
/// them into the block at flush time using the std140 sizes below.

use glam::{Mat3, Mat4, Vec2, Vec3, Vec4};
use crate::resource::handle::TextureHandle;

// ===== UNIFORM TYPE =====

/// Data type of a shader uniform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformType {
    Bool,
    Int,
    UInt,
    Float,
    Vec2,
    Vec3,
    Vec4,
    Mat3,
    Mat4,
    Sampler2D,
    SamplerCube,
}

impl UniformType {
    /// Whether the uniform is a texture binding rather than block data
    pub fn is_texture(&self) -> bool {
        matches!(self, UniformType::Sampler2D | UniformType::SamplerCube)
    }

    /// Size in bytes inside the uniform block (std140 rules, 0 for textures)
    pub fn size_bytes(&self) -> u32 {
        match self {
            UniformType::Bool  => 4,
            UniformType::Int   => 4,
            UniformType::UInt  => 4,
            UniformType::Float => 4,
            UniformType::Vec2  => 8,
            UniformType::Vec3  => 12,
            UniformType::Vec4  => 16,
            UniformType::Mat3  => 48, // std140: 3 × vec4
            UniformType::Mat4  => 64,
            UniformType::Sampler2D | UniformType::SamplerCube => 0,
        }
    }

    /// Alignment in bytes inside the uniform block (std140 rules)
    pub fn alignment(&self) -> u32 {
        match self {
            UniformType::Bool  => 4,
            UniformType::Int   => 4,
            UniformType::UInt  => 4,
            UniformType::Float => 4,
            UniformType::Vec2  => 8,
            UniformType::Vec3  => 16,
            UniformType::Vec4  => 16,
            UniformType::Mat3  => 16,
            UniformType::Mat4  => 16,
            UniformType::Sampler2D | UniformType::SamplerCube => 1,
        }
    }
}

// ===== UNIFORM HINT =====

/// Editor / fallback hint attached to a uniform
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum UniformHint {
    #[default]
    None,
    /// Value is an sRGB color
    Color,
    /// Value is clamped to a range in editors
    Range { min: f32, max: f32, step: f32 },
    /// Texture falls back to white, sampled as albedo
    Albedo,
    /// Texture falls back to black, sampled as albedo
    BlackAlbedo,
    /// Texture falls back to a flat normal map
    Normal,
    /// Texture falls back to black
    Black,
    /// Texture falls back to white
    White,
    /// Texture falls back to a neutral anisotropy map
    Aniso,
}

// ===== UNIFORM INFO =====

/// One entry of a compiled shader's uniform table
#[derive(Debug, Clone, PartialEq)]
pub struct UniformInfo {
    pub name: String,
    pub uniform_type: UniformType,
    /// Byte offset inside the material block (ignored for textures)
    pub offset: u32,
    /// Declaration order in the source
    pub order: u32,
    /// Binding slot among the shader's textures (textures only)
    pub texture_order: Option<u32>,
    pub hint: UniformHint,
    /// Value used when the material does not set the parameter
    pub default_value: Option<ParamValue>,
}

// ===== PARAM VALUE =====

/// A material parameter value
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ParamValue {
    /// No value; setting it erases the parameter
    #[default]
    Nil,
    Bool(bool),
    Int(i32),
    UInt(u32),
    Float(f32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    /// RGBA color, encoded like a vec4
    Color(Vec4),
    Mat3(Mat3),
    Mat4(Mat4),
    Texture(TextureHandle),
}

impl ParamValue {
    /// Texture handle carried by the value, if any
    pub fn as_texture(&self) -> Option<TextureHandle> {
        match self {
            ParamValue::Texture(handle) => Some(*handle),
            _ => None,
        }
    }

    fn as_scalar(&self) -> Option<f64> {
        match self {
            ParamValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            ParamValue::Int(i) => Some(*i as f64),
            ParamValue::UInt(u) => Some(*u as f64),
            ParamValue::Float(f) => Some(*f as f64),
            _ => None,
        }
    }
}

// ===== ENCODING =====

/// Encode `value` as `uniform_type` into `dst`.
///
/// `dst` must be at least `uniform_type.size_bytes()` long. Scalars convert
/// between each other, `Color` and `Vec4` are interchangeable and a color
/// can feed a vec3. Returns `false` (and leaves `dst` untouched) when the
/// value cannot be represented as the requested type.
pub fn encode_param(uniform_type: UniformType, value: &ParamValue, dst: &mut [u8]) -> bool {
    let size = uniform_type.size_bytes() as usize;
    if dst.len() < size {
        return false;
    }

    match uniform_type {
        UniformType::Bool => match value.as_scalar() {
            Some(v) => write_bytes(dst, &[(v != 0.0) as u32]),
            None => false,
        },
        UniformType::Int => match value.as_scalar() {
            Some(v) => write_bytes(dst, &[v as i32]),
            None => false,
        },
        UniformType::UInt => match value.as_scalar() {
            Some(v) => write_bytes(dst, &[v.max(0.0) as u32]),
            None => false,
        },
        UniformType::Float => match value.as_scalar() {
            Some(v) => write_bytes(dst, &[v as f32]),
            None => false,
        },
        UniformType::Vec2 => match value {
            ParamValue::Vec2(v) => write_bytes(dst, &v.to_array()),
            _ => false,
        },
        UniformType::Vec3 => match value {
            ParamValue::Vec3(v) => write_bytes(dst, &v.to_array()),
            ParamValue::Color(c) => write_bytes(dst, &c.truncate().to_array()),
            _ => false,
        },
        UniformType::Vec4 => match value {
            ParamValue::Vec4(v) | ParamValue::Color(v) => write_bytes(dst, &v.to_array()),
            _ => false,
        },
        UniformType::Mat3 => match value {
            ParamValue::Mat3(m) => {
                // std140: every column padded to a vec4
                let mut padded = [0.0f32; 12];
                for (i, col) in [m.x_axis, m.y_axis, m.z_axis].iter().enumerate() {
                    padded[i * 4..i * 4 + 3].copy_from_slice(&col.to_array());
                }
                write_bytes(dst, &padded)
            }
            _ => false,
        },
        UniformType::Mat4 => match value {
            ParamValue::Mat4(m) => write_bytes(dst, &m.to_cols_array()),
            _ => false,
        },
        UniformType::Sampler2D | UniformType::SamplerCube => false,
    }
}

fn write_bytes<T: bytemuck::Pod>(dst: &mut [u8], values: &[T]) -> bool {
    let bytes: &[u8] = bytemuck::cast_slice(values);
    dst[..bytes.len()].copy_from_slice(bytes);
    true
}

#[cfg(test)]
#[path = "uniform_tests.rs"]
mod tests;
