/// Mock ShaderCompiler for unit tests
///
/// Understands a tiny statement language, `;`-separated:
///
/// ```text
/// uniform vec4 albedo;
/// uniform float roughness = 0.5;
/// uniform sampler2D tex : hint_albedo;
/// render_mode blend_add, cull_disabled;
/// ```
///
/// Value uniforms get std140 offsets in declaration order. The words
/// `TIME`, `ALPHA`, `VERTEX` and `discard` anywhere in the source set the
/// matching flags, and the word `error` makes the compile fail.

use glam::{Vec2, Vec3, Vec4};
use crate::backend::{
    BlendMode, CullMode, DepthDrawMode, ShaderCompiler, ShaderFlags, ShaderMode, ShaderReflection,
};
use crate::error::{Error, Result};
use crate::resource::uniform::{ParamValue, UniformHint, UniformInfo, UniformType};

#[derive(Debug, Default)]
pub struct MockShaderCompiler {
    /// Every source successfully or unsuccessfully compiled, in order
    pub compiled: Vec<String>,
    /// Forced texture count override (tests for binding limits)
    pub texture_count_override: Option<u32>,
}

impl MockShaderCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compile_count(&self) -> usize {
        self.compiled.len()
    }

    /// Number of compiles of a given source
    pub fn compiles_of(&self, code: &str) -> usize {
        self.compiled.iter().filter(|c| c.as_str() == code).count()
    }
}

impl ShaderCompiler for MockShaderCompiler {
    fn compile(&mut self, _mode: ShaderMode, code: &str) -> Result<ShaderReflection> {
        self.compiled.push(code.to_string());

        let words: Vec<&str> = code
            .split(|c: char| !(c.is_alphanumeric() || c == '_'))
            .filter(|w| !w.is_empty())
            .collect();
        if words.contains(&"error") {
            return Err(Error::ShaderCompilation("syntax error".to_string()));
        }

        let mut reflection = ShaderReflection::default();
        for (word, flag) in [
            ("TIME", ShaderFlags::USES_FRAGMENT_TIME),
            ("ALPHA", ShaderFlags::USES_ALPHA),
            ("VERTEX", ShaderFlags::USES_VERTEX),
            ("discard", ShaderFlags::USES_DISCARD),
        ] {
            if words.contains(&word) {
                reflection.flags |= flag;
            }
        }

        let mut offset = 0u32;
        let mut texture_count = 0u32;
        let mut order = 0u32;
        for statement in code.split(';').map(str::trim) {
            if let Some(rest) = statement.strip_prefix("render_mode ") {
                for mode in rest.split(',').map(str::trim) {
                    apply_render_mode(&mut reflection, mode)?;
                }
                continue;
            }
            let Some(rest) = statement.strip_prefix("uniform ") else {
                continue;
            };

            let (decl, default) = match rest.split_once('=') {
                Some((decl, value)) => (decl.trim(), Some(value.trim())),
                None => (rest.trim(), None),
            };
            let (decl, hint) = match decl.split_once(':') {
                Some((decl, hint)) => (decl.trim(), parse_hint(hint.trim())),
                None => (decl, UniformHint::None),
            };
            let mut parts = decl.split_whitespace();
            let (Some(type_name), Some(name)) = (parts.next(), parts.next()) else {
                return Err(Error::ShaderCompilation(format!("bad uniform: {}", statement)));
            };
            let uniform_type = parse_type(type_name)?;
            let default_value = match default {
                Some(text) => Some(parse_default(uniform_type, text)?),
                None => None,
            };

            let mut info = UniformInfo {
                name: name.to_string(),
                uniform_type,
                offset: 0,
                order,
                texture_order: None,
                hint,
                default_value,
            };
            if uniform_type.is_texture() {
                info.texture_order = Some(texture_count);
                texture_count += 1;
            } else {
                offset = offset.next_multiple_of(uniform_type.alignment());
                info.offset = offset;
                offset += uniform_type.size_bytes();
            }
            reflection.uniforms.push(info);
            order += 1;
        }

        reflection.ubo_size = offset.next_multiple_of(16);
        reflection.texture_count = self.texture_count_override.unwrap_or(texture_count);
        Ok(reflection)
    }
}

fn apply_render_mode(reflection: &mut ShaderReflection, mode: &str) -> Result<()> {
    let state = &mut reflection.render_state;
    match mode {
        "blend_mix" => state.blend_mode = BlendMode::Mix,
        "blend_add" => state.blend_mode = BlendMode::Add,
        "blend_sub" => state.blend_mode = BlendMode::Sub,
        "blend_mul" => state.blend_mode = BlendMode::Mul,
        "depth_draw_opaque" => state.depth_draw_mode = DepthDrawMode::Opaque,
        "depth_draw_always" => state.depth_draw_mode = DepthDrawMode::Always,
        "depth_draw_never" => state.depth_draw_mode = DepthDrawMode::Never,
        "depth_draw_alpha_prepass" => state.depth_draw_mode = DepthDrawMode::AlphaPrepass,
        "cull_front" => state.cull_mode = CullMode::Front,
        "cull_back" => state.cull_mode = CullMode::Back,
        "cull_disabled" => state.cull_mode = CullMode::Disabled,
        "unshaded" => reflection.flags |= ShaderFlags::UNSHADED,
        "ontop" => reflection.flags |= ShaderFlags::ONTOP,
        other => return Err(Error::ShaderCompilation(format!("unknown render mode {}", other))),
    }
    Ok(())
}

fn parse_type(name: &str) -> Result<UniformType> {
    Ok(match name {
        "bool" => UniformType::Bool,
        "int" => UniformType::Int,
        "uint" => UniformType::UInt,
        "float" => UniformType::Float,
        "vec2" => UniformType::Vec2,
        "vec3" => UniformType::Vec3,
        "vec4" => UniformType::Vec4,
        "mat3" => UniformType::Mat3,
        "mat4" => UniformType::Mat4,
        "sampler2D" => UniformType::Sampler2D,
        "samplerCube" => UniformType::SamplerCube,
        other => return Err(Error::ShaderCompilation(format!("unknown type {}", other))),
    })
}

fn parse_hint(name: &str) -> UniformHint {
    match name {
        "hint_color" => UniformHint::Color,
        "hint_albedo" => UniformHint::Albedo,
        "hint_black_albedo" => UniformHint::BlackAlbedo,
        "hint_normal" => UniformHint::Normal,
        "hint_black" => UniformHint::Black,
        "hint_white" => UniformHint::White,
        "hint_aniso" => UniformHint::Aniso,
        _ => UniformHint::None,
    }
}

fn parse_default(uniform_type: UniformType, text: &str) -> Result<ParamValue> {
    let values = text
        .split(',')
        .map(|v| v.trim().parse::<f32>())
        .collect::<std::result::Result<Vec<f32>, _>>()
        .map_err(|_| Error::ShaderCompilation(format!("bad default value {}", text)))?;
    let value = match (uniform_type, values.as_slice()) {
        (UniformType::Bool, [v]) => ParamValue::Bool(*v != 0.0),
        (UniformType::Int, [v]) => ParamValue::Int(*v as i32),
        (UniformType::UInt, [v]) => ParamValue::UInt(*v as u32),
        (UniformType::Float, [v]) => ParamValue::Float(*v),
        (UniformType::Vec2, [x, y]) => ParamValue::Vec2(Vec2::new(*x, *y)),
        (UniformType::Vec3, [x, y, z]) => ParamValue::Vec3(Vec3::new(*x, *y, *z)),
        (UniformType::Vec4, [x, y, z, w]) => ParamValue::Vec4(Vec4::new(*x, *y, *z, *w)),
        _ => return Err(Error::ShaderCompilation(format!("bad default value {}", text))),
    };
    Ok(value)
}
