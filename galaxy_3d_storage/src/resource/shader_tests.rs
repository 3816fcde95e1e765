/// Tests for shader resources and the recompilation queue

use super::*;
use crate::backend::mock_graphics_device::MockGraphicsDevice;
use crate::backend::mock_shader_compiler::MockShaderCompiler;
use crate::backend::{BlendMode, CullMode};
use crate::config::StorageConfig;
use crate::resource::uniform::{ParamValue, UniformType};
use std::sync::{Arc, Mutex};

// ============================================================================
// Helper Functions
// ============================================================================

fn create_test_rm() -> (ResourceManager, Arc<Mutex<MockShaderCompiler>>) {
    create_test_rm_with(StorageConfig::default())
}

fn create_test_rm_with(config: StorageConfig) -> (ResourceManager, Arc<Mutex<MockShaderCompiler>>) {
    let device = Arc::new(Mutex::new(MockGraphicsDevice::new()));
    let compiler = Arc::new(Mutex::new(MockShaderCompiler::new()));
    let rm = ResourceManager::new(device, compiler.clone(), config);
    (rm, compiler)
}

fn compiled_shader(rm: &mut ResourceManager, code: &str) -> ShaderHandle {
    let shader = rm.create_shader(ShaderMode::Spatial);
    rm.shader_set_code(shader, code);
    rm.update_dirty_resources();
    shader
}

// ============================================================================
// Queue tests
// ============================================================================

#[test]
fn test_new_shader_is_uncompiled() {
    let (mut rm, compiler) = create_test_rm();
    let shader = rm.create_shader(ShaderMode::CanvasItem);

    let sh = rm.shader(shader).unwrap();
    assert_eq!(sh.state(), ShaderState::Uncompiled);
    assert_eq!(sh.mode(), ShaderMode::CanvasItem);
    assert!(!sh.is_dirty());
    assert_eq!(rm.dirty_shader_count(), 0);
    assert_eq!(compiler.lock().unwrap().compile_count(), 0);
}

#[test]
fn test_set_code_is_deferred() {
    let (mut rm, compiler) = create_test_rm();
    let shader = rm.create_shader(ShaderMode::Spatial);

    assert!(rm.shader_set_code(shader, "uniform float roughness;"));

    assert_eq!(rm.shader(shader).unwrap().state(), ShaderState::Pending);
    assert!(rm.shader(shader).unwrap().is_dirty());
    assert_eq!(rm.dirty_shader_count(), 1);
    assert_eq!(compiler.lock().unwrap().compile_count(), 0);
}

#[test]
fn test_repeated_set_code_compiles_once_with_last_code() {
    let (mut rm, compiler) = create_test_rm();
    let shader = rm.create_shader(ShaderMode::Spatial);

    for i in 0..5 {
        rm.shader_set_code(shader, &format!("uniform float v{};", i));
    }
    assert_eq!(rm.dirty_shader_count(), 1);

    rm.flush_dirty_shaders();

    let compiler = compiler.lock().unwrap();
    assert_eq!(compiler.compile_count(), 1);
    assert_eq!(compiler.compiles_of("uniform float v4;"), 1);
    assert_eq!(rm.shader_get_param_list(shader)[0].name, "v4");
    assert_eq!(rm.info().shader_compilations, 1);
}

#[test]
fn test_flush_with_empty_queue_does_nothing() {
    let (mut rm, compiler) = create_test_rm();
    rm.create_shader(ShaderMode::Spatial);

    rm.flush_dirty_shaders();

    assert_eq!(compiler.lock().unwrap().compile_count(), 0);
}

#[test]
fn test_set_mode_requeues() {
    let (mut rm, compiler) = create_test_rm();
    let shader = compiled_shader(&mut rm, "uniform float a;");

    assert!(rm.shader_set_mode(shader, ShaderMode::Spatial));
    assert_eq!(rm.dirty_shader_count(), 0);

    assert!(rm.shader_set_mode(shader, ShaderMode::Particles));
    assert_eq!(rm.dirty_shader_count(), 1);
    rm.flush_dirty_shaders();

    assert_eq!(rm.shader(shader).unwrap().mode(), ShaderMode::Particles);
    assert_eq!(compiler.lock().unwrap().compile_count(), 2);
}

// ============================================================================
// Compilation tests
// ============================================================================

#[test]
fn test_compile_exposes_uniform_layout() {
    let (mut rm, _compiler) = create_test_rm();
    let shader = compiled_shader(&mut rm,
        "uniform float roughness = 0.5; uniform vec4 albedo : hint_color; uniform sampler2D tex;");

    let sh = rm.shader(shader).unwrap();
    assert!(sh.is_valid());
    assert_eq!(sh.ubo_size(), 32);
    assert_eq!(sh.texture_count(), 1);

    let params = rm.shader_get_param_list(shader);
    let names: Vec<&str> = params.iter().map(|u| u.name.as_str()).collect();
    assert_eq!(names, vec!["roughness", "albedo", "tex"]);
    assert_eq!(params[1].offset, 16);
    assert_eq!(params[2].uniform_type, UniformType::Sampler2D);
    assert_eq!(params[0].default_value, Some(ParamValue::Float(0.5)));
}

#[test]
fn test_compile_reports_render_state_and_flags() {
    let (mut rm, _compiler) = create_test_rm();
    let shader = compiled_shader(&mut rm, "render_mode blend_add, cull_disabled; ALPHA = TIME;");

    let sh = rm.shader(shader).unwrap();
    assert_eq!(sh.render_state().blend_mode, BlendMode::Add);
    assert_eq!(sh.render_state().cull_mode, CullMode::Disabled);
    assert!(sh.flags().contains(ShaderFlags::USES_ALPHA));
    assert!(sh.flags().uses_time());
}

#[test]
fn test_compile_failure_marks_invalid() {
    let (mut rm, _compiler) = create_test_rm();
    let shader = compiled_shader(&mut rm, "uniform float a;");
    assert!(rm.shader(shader).unwrap().is_valid());

    rm.shader_set_code(shader, "this is an error");
    rm.flush_dirty_shaders();

    let sh = rm.shader(shader).unwrap();
    assert_eq!(sh.state(), ShaderState::Invalid);
    assert!(sh.uniforms().is_empty());
    assert_eq!(sh.ubo_size(), 0);
}

#[test]
fn test_empty_code_is_invalid_without_compiling() {
    let (mut rm, compiler) = create_test_rm();
    let shader = rm.create_shader(ShaderMode::Spatial);

    rm.shader_set_code(shader, "");
    rm.flush_dirty_shaders();

    assert_eq!(rm.shader(shader).unwrap().state(), ShaderState::Invalid);
    assert_eq!(compiler.lock().unwrap().compile_count(), 0);
}

#[test]
fn test_uniform_block_limit() {
    let config = StorageConfig { max_uniform_buffer_size: 16, ..StorageConfig::default() };
    let (mut rm, _compiler) = create_test_rm_with(config);

    let small = compiled_shader(&mut rm, "uniform vec4 a;");
    let large = compiled_shader(&mut rm, "uniform vec4 a; uniform vec4 b;");

    assert!(rm.shader(small).unwrap().is_valid());
    assert_eq!(rm.shader(large).unwrap().state(), ShaderState::Invalid);
}

#[test]
fn test_texture_unit_limit() {
    let config = StorageConfig { max_texture_image_units: 2, ..StorageConfig::default() };
    let (mut rm, compiler) = create_test_rm_with(config);
    compiler.lock().unwrap().texture_count_override = Some(3);

    let shader = compiled_shader(&mut rm, "uniform sampler2D a;");

    assert_eq!(rm.shader(shader).unwrap().state(), ShaderState::Invalid);
}

#[test]
fn test_version_bumps_on_each_recompile() {
    let (mut rm, _compiler) = create_test_rm();
    let shader = compiled_shader(&mut rm, "uniform float a;");
    assert_eq!(rm.shader(shader).unwrap().version(), 1);

    rm.shader_set_code(shader, "uniform float b;");
    rm.flush_dirty_shaders();

    assert_eq!(rm.shader(shader).unwrap().version(), 2);
}

#[test]
fn test_get_code() {
    let (mut rm, _compiler) = create_test_rm();
    let shader = rm.create_shader(ShaderMode::Spatial);
    rm.shader_set_code(shader, "uniform int count;");

    assert_eq!(rm.shader_get_code(shader), Some("uniform int count;"));
}

// ============================================================================
// Default texture tests
// ============================================================================

#[test]
fn test_default_texture_param() {
    let (mut rm, _compiler) = create_test_rm();
    let shader = rm.create_shader(ShaderMode::Spatial);
    let texture = rm.create_texture();

    assert!(rm.shader_set_default_texture_param(shader, "albedo_tex", Some(texture)));
    assert_eq!(rm.shader_get_default_texture_param(shader, "albedo_tex"), Some(texture));

    assert!(rm.shader_set_default_texture_param(shader, "albedo_tex", None));
    assert_eq!(rm.shader_get_default_texture_param(shader, "albedo_tex"), None);
}

#[test]
fn test_default_texture_rejects_invalid_texture() {
    let (mut rm, _compiler) = create_test_rm();
    let shader = rm.create_shader(ShaderMode::Spatial);
    let texture = rm.create_texture();
    rm.free(texture);

    assert!(!rm.shader_set_default_texture_param(shader, "albedo_tex", Some(texture)));
}

#[test]
fn test_default_texture_requeues_bound_materials() {
    let (mut rm, _compiler) = create_test_rm();
    let shader = compiled_shader(&mut rm, "uniform sampler2D albedo_tex;");
    let material = rm.create_material();
    rm.material_set_shader(material, Some(shader));
    rm.update_dirty_resources();
    let texture = rm.create_texture();

    rm.shader_set_default_texture_param(shader, "albedo_tex", Some(texture));
    assert_eq!(rm.dirty_material_count(), 1);
    rm.update_dirty_resources();

    assert_eq!(rm.material(material).unwrap().textures(), &[Some(texture)]);
}

// ============================================================================
// Propagation and free tests
// ============================================================================

#[test]
fn test_recompile_requeues_bound_materials() {
    let (mut rm, _compiler) = create_test_rm();
    let shader = compiled_shader(&mut rm, "uniform float a;");
    let first = rm.create_material();
    let second = rm.create_material();
    rm.material_set_shader(first, Some(shader));
    rm.material_set_shader(second, Some(shader));
    rm.update_dirty_resources();
    assert_eq!(rm.material(first).unwrap().ubo_size(), 16);

    rm.shader_set_code(shader, "uniform float a; uniform vec4 b;");
    rm.flush_dirty_shaders();
    assert_eq!(rm.dirty_material_count(), 2);
    rm.flush_dirty_materials();

    assert_eq!(rm.material(first).unwrap().ubo_size(), 32);
    assert_eq!(rm.material(second).unwrap().ubo_size(), 32);
}

#[test]
fn test_free_shader_unbinds_materials() {
    let (mut rm, _compiler) = create_test_rm();
    let shader = compiled_shader(&mut rm, "uniform float a;");
    let first = rm.create_material();
    let second = rm.create_material();
    rm.material_set_shader(first, Some(shader));
    rm.material_set_shader(second, Some(shader));
    rm.update_dirty_resources();

    assert!(rm.free(shader));

    assert_eq!(rm.material_get_shader(first), None);
    assert_eq!(rm.material_get_shader(second), None);
    assert_eq!(rm.dirty_material_count(), 2);

    rm.update_dirty_resources();
    assert_eq!(rm.material(first).unwrap().ubo_size(), 0);
    assert_eq!(rm.material(first).unwrap().rebuild_count(), 2);
}

#[test]
fn test_free_dequeued_shader() {
    let (mut rm, compiler) = create_test_rm();
    let shader = rm.create_shader(ShaderMode::Spatial);
    rm.shader_set_code(shader, "uniform float a;");

    assert!(rm.free(shader));
    assert_eq!(rm.dirty_shader_count(), 0);

    rm.update_dirty_resources();
    assert_eq!(compiler.lock().unwrap().compile_count(), 0);
}

#[test]
fn test_mutators_reject_invalid_handle() {
    let (mut rm, _compiler) = create_test_rm();
    let shader = rm.create_shader(ShaderMode::Spatial);
    rm.free(shader);

    assert!(!rm.shader_set_code(shader, "uniform float a;"));
    assert!(!rm.shader_set_mode(shader, ShaderMode::Particles));
    assert!(rm.shader_get_code(shader).is_none());
    assert!(rm.shader_get_param_list(shader).is_empty());
    assert_eq!(rm.dirty_shader_count(), 0);
}
