/// Light resources.
///
/// Lights are instantiable. Every attribute change bumps `version`, which
/// shadow-map caches compare against; changes that alter the lit volume
/// (range, spot angle, shadow settings) also fire `notify_structure_changed`.

use glam::{Vec3, Vec4};
use crate::resource::aabb::AABB;
use crate::resource::dependency::{AsInstantiable, Instantiable};
use crate::resource::handle::{BaseType, LightHandle, TextureHandle};
use crate::resource::resource_manager::{lookup_mut, ResourceManager};

// ===== ENUMS =====

/// Kind of light
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightType {
    Directional,
    Omni,
    Spot,
}

/// Scalar light parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightParam {
    Energy,
    IndirectEnergy,
    Specular,
    Range,
    Attenuation,
    SpotAngle,
    SpotAttenuation,
    ContactShadowSize,
    ShadowMaxDistance,
    ShadowSplit1Offset,
    ShadowSplit2Offset,
    ShadowSplit3Offset,
    ShadowNormalBias,
    ShadowBias,
    ShadowBiasSplitScale,
}

impl LightParam {
    pub const COUNT: usize = 15;

    /// Whether changing the parameter changes the lit volume or shadow setup
    pub fn affects_shape(&self) -> bool {
        matches!(
            self,
            LightParam::Range
                | LightParam::SpotAngle
                | LightParam::ShadowMaxDistance
                | LightParam::ShadowSplit1Offset
                | LightParam::ShadowSplit2Offset
                | LightParam::ShadowSplit3Offset
                | LightParam::ShadowNormalBias
                | LightParam::ShadowBias
        )
    }
}

/// Omni light shadow projection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OmniShadowMode {
    #[default]
    DualParaboloid,
    Cube,
}

/// Omni light shadow detail axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OmniShadowDetail {
    Vertical,
    #[default]
    Horizontal,
}

/// Directional light shadow split layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DirectionalShadowMode {
    #[default]
    Orthogonal,
    Parallel2Splits,
    Parallel4Splits,
}

// ===== LIGHT =====

/// A light resource
#[derive(Debug)]
pub struct Light {
    light_type: LightType,
    color: Vec4,
    params: [f32; LightParam::COUNT],
    shadow: bool,
    shadow_color: Vec4,
    negative: bool,
    projector: Option<TextureHandle>,
    cull_mask: u32,
    omni_shadow_mode: OmniShadowMode,
    omni_shadow_detail: OmniShadowDetail,
    directional_shadow_mode: DirectionalShadowMode,
    version: u64,
    instantiable: Instantiable,
}

impl Light {
    fn new(light_type: LightType) -> Self {
        let mut params = [0.0; LightParam::COUNT];
        params[LightParam::Energy as usize] = 1.0;
        params[LightParam::IndirectEnergy as usize] = 1.0;
        params[LightParam::Specular as usize] = 0.5;
        params[LightParam::Range as usize] = 1.0;
        params[LightParam::Attenuation as usize] = 1.0;
        params[LightParam::SpotAngle as usize] = 45.0;
        params[LightParam::SpotAttenuation as usize] = 1.0;
        params[LightParam::ShadowSplit1Offset as usize] = 0.1;
        params[LightParam::ShadowSplit2Offset as usize] = 0.3;
        params[LightParam::ShadowSplit3Offset as usize] = 0.6;
        params[LightParam::ShadowBias as usize] = 0.15;
        params[LightParam::ShadowBiasSplitScale as usize] = 0.25;

        Self {
            light_type,
            color: Vec4::ONE,
            params,
            shadow: false,
            shadow_color: Vec4::new(0.0, 0.0, 0.0, 1.0),
            negative: false,
            projector: None,
            cull_mask: 0xFFFF_FFFF,
            omni_shadow_mode: OmniShadowMode::default(),
            omni_shadow_detail: OmniShadowDetail::default(),
            directional_shadow_mode: DirectionalShadowMode::default(),
            version: 0,
            instantiable: Instantiable::new(),
        }
    }

    pub fn light_type(&self) -> LightType {
        self.light_type
    }

    pub fn color(&self) -> Vec4 {
        self.color
    }

    pub fn param(&self, param: LightParam) -> f32 {
        self.params[param as usize]
    }

    pub fn has_shadow(&self) -> bool {
        self.shadow
    }

    pub fn shadow_color(&self) -> Vec4 {
        self.shadow_color
    }

    pub fn is_negative(&self) -> bool {
        self.negative
    }

    pub fn projector(&self) -> Option<TextureHandle> {
        self.projector
    }

    pub fn cull_mask(&self) -> u32 {
        self.cull_mask
    }

    pub fn omni_shadow_mode(&self) -> OmniShadowMode {
        self.omni_shadow_mode
    }

    pub fn omni_shadow_detail(&self) -> OmniShadowDetail {
        self.omni_shadow_detail
    }

    pub fn directional_shadow_mode(&self) -> DirectionalShadowMode {
        self.directional_shadow_mode
    }

    /// Monotonic change counter
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Local bounds of the lit volume (directional lights are unbounded: zero box)
    pub fn aabb(&self) -> AABB {
        let range = self.param(LightParam::Range);
        match self.light_type {
            LightType::Omni => AABB::new(Vec3::splat(-range), Vec3::splat(range)),
            LightType::Spot => {
                let size = self.param(LightParam::SpotAngle).to_radians().tan() * range;
                AABB::from_position_size(
                    Vec3::new(-size, -size, -range),
                    Vec3::new(size * 2.0, size * 2.0, range),
                )
            }
            LightType::Directional => AABB::default(),
        }
    }
}

impl AsInstantiable for Light {
    fn instantiable(&self) -> &Instantiable {
        &self.instantiable
    }

    fn instantiable_mut(&mut self) -> &mut Instantiable {
        &mut self.instantiable
    }
}

// ===== RESOURCE MANAGER API =====

impl ResourceManager {
    /// Create a light with default attributes
    pub fn create_light(&mut self, light_type: LightType) -> LightHandle {
        let rid = self.registry.allocate(BaseType::Light);
        self.lights.insert(rid, Light::new(light_type));
        LightHandle::from_rid(rid)
    }

    /// Get a light by handle
    pub fn light(&self, light: LightHandle) -> Option<&Light> {
        self.lights.get(light.rid())
    }

    /// Apply `change` to a light and bump its version.
    /// Fires `notify_structure_changed` when `reshapes` is set.
    fn modify_light(&mut self, light: LightHandle, reshapes: bool, change: impl FnOnce(&mut Light)) -> bool {
        let Some(target) = lookup_mut(&mut self.lights, light.rid(), "light") else {
            return false;
        };
        change(target);
        target.version += 1;
        if reshapes {
            self.notify_structure_changed(light);
        }
        true
    }

    pub fn light_set_color(&mut self, light: LightHandle, color: Vec4) -> bool {
        self.modify_light(light, false, |l| l.color = color)
    }

    pub fn light_set_param(&mut self, light: LightHandle, param: LightParam, value: f32) -> bool {
        self.modify_light(light, param.affects_shape(), |l| l.params[param as usize] = value)
    }

    pub fn light_set_shadow(&mut self, light: LightHandle, enabled: bool) -> bool {
        self.modify_light(light, true, |l| l.shadow = enabled)
    }

    pub fn light_set_shadow_color(&mut self, light: LightHandle, color: Vec4) -> bool {
        self.modify_light(light, false, |l| l.shadow_color = color)
    }

    /// Set (or with `None`, clear) the projector texture
    pub fn light_set_projector(&mut self, light: LightHandle, texture: Option<TextureHandle>) -> bool {
        if let Some(texture) = texture {
            if !self.textures.contains_key(texture.rid()) {
                crate::engine_error!("galaxy3d::Light", "Invalid projector texture {:?}", texture);
                return false;
            }
        }
        self.modify_light(light, false, |l| l.projector = texture)
    }

    pub fn light_set_negative(&mut self, light: LightHandle, negative: bool) -> bool {
        self.modify_light(light, false, |l| l.negative = negative)
    }

    pub fn light_set_cull_mask(&mut self, light: LightHandle, mask: u32) -> bool {
        self.modify_light(light, true, |l| l.cull_mask = mask)
    }

    pub fn light_omni_set_shadow_mode(&mut self, light: LightHandle, mode: OmniShadowMode) -> bool {
        self.modify_light(light, true, |l| l.omni_shadow_mode = mode)
    }

    pub fn light_omni_set_shadow_detail(&mut self, light: LightHandle, detail: OmniShadowDetail) -> bool {
        self.modify_light(light, true, |l| l.omni_shadow_detail = detail)
    }

    pub fn light_directional_set_shadow_mode(&mut self, light: LightHandle, mode: DirectionalShadowMode) -> bool {
        self.modify_light(light, true, |l| l.directional_shadow_mode = mode)
    }

    pub fn light_get_type(&self, light: LightHandle) -> Option<LightType> {
        self.lights.get(light.rid()).map(|l| l.light_type)
    }

    pub fn light_get_param(&self, light: LightHandle, param: LightParam) -> Option<f32> {
        self.lights.get(light.rid()).map(|l| l.param(param))
    }

    pub fn light_get_aabb(&self, light: LightHandle) -> Option<AABB> {
        self.lights.get(light.rid()).map(|l| l.aabb())
    }

    /// Version counter (0 for invalid handles)
    pub fn light_get_version(&self, light: LightHandle) -> u64 {
        self.lights.get(light.rid()).map_or(0, |l| l.version)
    }

    /// Free cascade: notify and drain instances
    pub(crate) fn free_light(&mut self, light: LightHandle) -> bool {
        if !self.lights.contains_key(light.rid()) {
            return false;
        }
        self.drain_instances(light.rid());
        self.lights.remove(light.rid());
        true
    }
}

#[cfg(test)]
#[path = "light_tests.rs"]
mod tests;
