// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Scene lights and their GPU records.
//!
//! A [`Light`] is owned by its scene's light cache. Everything else (the node
//! it is attached to, the light buffer, the lighting passes) reaches it through
//! a [`Weak`] handle or a [`LightId`] lookup. Every GPU-visible change fires
//! [`Light::on_gpu_changed`] synchronously.

use super::node::SceneNode;
use pollux_core::event::Signal;
use pollux_core::math::{Aabb, LinearRgba, Vec3, FRAC_PI_2};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, Weak};

/// Stable identifier of a light, unique for the engine's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LightId(pub u64);

/// The kind of a light. Declaration order is the light buffer partition order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LightType {
    /// Infinitely distant light with parallel rays.
    Directional,
    /// Omnidirectional light with a range.
    Point,
    /// Cone-shaped light with a range.
    Spot,
}

impl LightType {
    /// Every light type, in partition order.
    pub const ALL: [LightType; 3] = [LightType::Directional, LightType::Point, LightType::Spot];

    /// The position of this type in the partition order.
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// The size in bytes of one record of this type in the light buffer.
    #[inline]
    pub const fn stride(self) -> u64 {
        match self {
            LightType::Directional => std::mem::size_of::<DirectionalRecord>() as u64,
            LightType::Point => std::mem::size_of::<PointRecord>() as u64,
            LightType::Spot => std::mem::size_of::<SpotRecord>() as u64,
        }
    }

    /// A short lowercase name, used in labels.
    pub const fn name(self) -> &'static str {
        match self {
            LightType::Directional => "directional",
            LightType::Point => "point",
            LightType::Spot => "spot",
        }
    }
}

/// Shadow filtering technique.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ShadowType {
    /// The light casts no shadow.
    #[default]
    None,
    /// Single depth comparison.
    Raw,
    /// Percentage-closer filtering.
    Pcf,
    /// Variance shadow maps.
    Variance,
}

/// Global-illumination technique driven by a light.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GlobalIlluminationType {
    /// No indirect lighting.
    #[default]
    None,
    /// Reflective shadow maps.
    Rsm,
    /// Light propagation volumes.
    Lpv,
    /// Light propagation volumes with geometry occlusion.
    LpvGeometry,
    /// Cascaded light propagation volumes.
    LayeredLpv,
    /// Cascaded light propagation volumes with geometry occlusion.
    LayeredLpvGeometry,
}

impl GlobalIlluminationType {
    /// Returns `true` for the propagation volume family.
    pub fn is_lpv(self) -> bool {
        matches!(
            self,
            Self::Lpv | Self::LpvGeometry | Self::LayeredLpv | Self::LayeredLpvGeometry
        )
    }

    /// Returns `true` if the technique also injects geometry occlusion.
    pub fn uses_geometry(self) -> bool {
        matches!(self, Self::LpvGeometry | Self::LayeredLpvGeometry)
    }
}

/// Percentage-closer filtering parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PcfConfig {
    /// Filter kernel size in texels.
    pub filter_size: f32,
    /// Constant depth bias.
    pub min_offset: f32,
    /// Slope-scaled depth bias.
    pub max_slope_offset: f32,
}

impl Default for PcfConfig {
    fn default() -> Self {
        Self {
            filter_size: 4.0,
            min_offset: 0.001,
            max_slope_offset: 0.004,
        }
    }
}

/// Variance shadow map parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VsmConfig {
    /// Lower clamp of the variance.
    pub min_variance: f32,
    /// Cut-off used to reduce light bleeding.
    pub light_bleeding_reduction: f32,
}

impl Default for VsmConfig {
    fn default() -> Self {
        Self {
            min_variance: 0.000_01,
            light_bleeding_reduction: 0.2,
        }
    }
}

/// Reflective shadow map parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RsmConfig {
    /// Indirect light intensity factor.
    pub intensity: f32,
    /// Sampling radius in shadow-map UV space.
    pub max_radius: f32,
    /// Samples taken per pixel.
    pub sample_count: u32,
}

impl Default for RsmConfig {
    fn default() -> Self {
        Self {
            intensity: 1.0,
            max_radius: 0.2,
            sample_count: 32,
        }
    }
}

/// Light propagation volume parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LpvConfig {
    /// Attenuation of the propagated light.
    pub indirect_attenuation: f32,
    /// Scale of the surfel area injected per shadow-map texel.
    pub texel_area_modifier: f32,
}

impl Default for LpvConfig {
    fn default() -> Self {
        Self {
            indirect_attenuation: 1.7,
            texel_area_modifier: 1.0,
        }
    }
}

/// Shadow and global-illumination settings of a light.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShadowConfig {
    /// Shadow filtering technique.
    pub shadow_type: ShadowType,
    /// Global-illumination technique.
    pub gi_type: GlobalIlluminationType,
    /// PCF parameters.
    pub pcf: PcfConfig,
    /// VSM parameters.
    pub vsm: VsmConfig,
    /// RSM parameters.
    pub rsm: RsmConfig,
    /// LPV parameters.
    pub lpv: LpvConfig,
}

/// The type-specific part of a light.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum LightCategory {
    /// A directional light.
    Directional,
    /// A point light reaching up to `range` world units.
    Point {
        /// Influence radius.
        range: f32,
    },
    /// A spot light. Angles are half-angles in radians.
    Spot {
        /// Influence distance along the cone axis.
        range: f32,
        /// Angle where the falloff starts.
        inner_angle: f32,
        /// Angle where the light reaches zero.
        outer_angle: f32,
    },
}

impl LightCategory {
    /// The light type this category belongs to.
    pub fn light_type(&self) -> LightType {
        match self {
            LightCategory::Directional => LightType::Directional,
            LightCategory::Point { .. } => LightType::Point,
            LightCategory::Spot { .. } => LightType::Spot,
        }
    }
}

/// GPU record of a directional light.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct DirectionalRecord {
    /// Colour (rgb) and intensity (a).
    pub colour: [f32; 4],
    /// Direction (xyz) and padding (w).
    pub direction: [f32; 4],
    /// x = shadow map index, y = shadow type, z = PCF filter size, w = VSM min variance.
    pub shadow_params: [f32; 4],
    /// x = GI type, y = RSM intensity, z = RSM radius, w = LPV attenuation.
    pub gi_params: [f32; 4],
}

/// GPU record of a point light.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PointRecord {
    /// Colour (rgb) and intensity (a).
    pub colour: [f32; 4],
    /// Position (xyz) and range (w).
    pub position: [f32; 4],
    /// x = shadow map index, y = shadow type, z = PCF filter size, w = GI type.
    pub shadow_params: [f32; 4],
}

/// GPU record of a spot light.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SpotRecord {
    /// Colour (rgb) and intensity (a).
    pub colour: [f32; 4],
    /// Position (xyz) and range (w).
    pub position: [f32; 4],
    /// Direction (xyz) and cosine of the inner angle (w).
    pub direction: [f32; 4],
    /// x = cosine of the outer angle, y = GI type, z = RSM intensity, w = LPV attenuation.
    pub params: [f32; 4],
    /// x = shadow map index, y = shadow type, z = PCF filter size, w = VSM min variance.
    pub shadow_params: [f32; 4],
}

const _: () = assert!(std::mem::size_of::<DirectionalRecord>() == 64);
const _: () = assert!(std::mem::size_of::<PointRecord>() == 48);
const _: () = assert!(std::mem::size_of::<SpotRecord>() == 80);

#[derive(Debug, Clone, PartialEq)]
struct LightState {
    colour: LinearRgba,
    intensity: f32,
    category: LightCategory,
    shadow: ShadowConfig,
    shadow_map_index: i32,
    scene: String,
}

/// A light of a scene.
pub struct Light {
    id: LightId,
    name: String,
    light_type: LightType,
    state: RwLock<LightState>,
    node: RwLock<Weak<SceneNode>>,
    on_gpu_changed: Signal<LightId>,
}

impl Light {
    /// Creates a white, unit-intensity light that casts no shadow.
    pub fn new(
        id: LightId,
        name: impl Into<String>,
        scene: impl Into<String>,
        category: LightCategory,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            light_type: category.light_type(),
            state: RwLock::new(LightState {
                colour: LinearRgba::WHITE,
                intensity: 1.0,
                category,
                shadow: ShadowConfig::default(),
                shadow_map_index: -1,
                scene: scene.into(),
            }),
            node: RwLock::new(Weak::new()),
            on_gpu_changed: Signal::new(),
        }
    }

    fn state(&self) -> RwLockReadGuard<'_, LightState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Applies `f` to the state and fires the change signal if anything changed.
    fn modify(&self, f: impl FnOnce(&mut LightState)) {
        let changed = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            let before = state.clone();
            f(&mut state);
            *state != before
        };
        if changed {
            self.notify_gpu_changed();
        }
    }

    /// The light id.
    pub fn id(&self) -> LightId {
        self.id
    }

    /// The light name, its key in the light cache.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The light type. It never changes after creation.
    pub fn light_type(&self) -> LightType {
        self.light_type
    }

    /// The name of the owning scene.
    pub fn scene(&self) -> String {
        self.state().scene.clone()
    }

    pub(crate) fn set_scene(&self, scene: &str) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .scene = scene.to_string();
    }

    /// Signal fired whenever a GPU-visible property changes.
    pub fn on_gpu_changed(&self) -> &Signal<LightId> {
        &self.on_gpu_changed
    }

    /// Fires [`Light::on_gpu_changed`].
    pub fn notify_gpu_changed(&self) {
        self.on_gpu_changed.emit(self.id);
    }

    /// The light colour.
    pub fn colour(&self) -> LinearRgba {
        self.state().colour
    }

    /// Sets the light colour.
    pub fn set_colour(&self, colour: LinearRgba) {
        self.modify(|s| s.colour = colour);
    }

    /// The intensity multiplier.
    pub fn intensity(&self) -> f32 {
        self.state().intensity
    }

    /// Sets the intensity multiplier.
    pub fn set_intensity(&self, intensity: f32) {
        self.modify(|s| s.intensity = intensity);
    }

    /// The type-specific parameters.
    pub fn category(&self) -> LightCategory {
        self.state().category
    }

    /// Replaces the type-specific parameters.
    ///
    /// A category of another light type is rejected with a warning.
    pub fn set_category(&self, category: LightCategory) {
        if category.light_type() != self.light_type {
            log::warn!(
                "Light '{}': can't turn a {} light into a {} light",
                self.name,
                self.light_type.name(),
                category.light_type().name()
            );
            return;
        }
        self.modify(|s| s.category = category);
    }

    /// Shadow and GI settings.
    pub fn shadow_config(&self) -> ShadowConfig {
        self.state().shadow
    }

    /// Replaces the shadow and GI settings.
    pub fn set_shadow_config(&self, shadow: ShadowConfig) {
        self.modify(|s| s.shadow = shadow);
    }

    /// Returns `true` if the light renders into a shadow map.
    pub fn casts_shadows(&self) -> bool {
        self.state().shadow.shadow_type != ShadowType::None
    }

    /// Index of the light's shadow map, or -1.
    pub fn shadow_map_index(&self) -> i32 {
        self.state().shadow_map_index
    }

    /// Assigns a shadow map slot.
    pub fn set_shadow_map_index(&self, index: i32) {
        self.modify(|s| s.shadow_map_index = index);
    }

    /// The node this light is attached to, if it is still alive.
    pub fn node(&self) -> Option<Arc<SceneNode>> {
        self.node
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .upgrade()
    }

    /// Attaches the light to `node`. The light follows the node's transform.
    pub fn attach_to(self: &Arc<Self>, node: &Arc<SceneNode>) {
        self.detach();
        *self.node.write().unwrap_or_else(PoisonError::into_inner) = Arc::downgrade(node);
        node.attach_light(Arc::downgrade(self));
        self.notify_gpu_changed();
    }

    /// Detaches the light from its node, if any.
    pub fn detach(&self) {
        let mut slot = self.node.write().unwrap_or_else(PoisonError::into_inner);
        let previous = std::mem::take(&mut *slot);
        drop(slot);
        if let Some(node) = previous.upgrade() {
            node.detach_light(self.id);
        }
    }

    /// World position, taken from the attached node.
    pub fn position(&self) -> Vec3 {
        self.node().map(|n| n.world_position()).unwrap_or(Vec3::ZERO)
    }

    /// World direction, taken from the attached node's forward axis.
    pub fn direction(&self) -> Vec3 {
        self.node().map(|n| n.forward()).unwrap_or(Vec3::NEG_Z)
    }

    /// World-space bounds of the lit volume. Directional lights have none.
    pub fn bounding_box(&self) -> Option<Aabb> {
        let position = self.position();
        match self.category() {
            LightCategory::Directional => None,
            LightCategory::Point { range } => {
                Some(Aabb::from_center_half_extents(position, Vec3::splat(range)))
            }
            LightCategory::Spot {
                range, outer_angle, ..
            } => {
                if outer_angle >= FRAC_PI_2 {
                    return Some(Aabb::from_center_half_extents(position, Vec3::splat(range)));
                }
                let axis = self.direction().normalize();
                let base = position + axis * range;
                let radius = range * outer_angle.tan();
                // Extent of a disc of normal `axis` along each world axis.
                let extent = Vec3::new(
                    radius * (1.0 - axis.x * axis.x).max(0.0).sqrt(),
                    radius * (1.0 - axis.y * axis.y).max(0.0).sqrt(),
                    radius * (1.0 - axis.z * axis.z).max(0.0).sqrt(),
                );
                Some(Aabb::from_center_half_extents(base, extent).merge(&Aabb::from_min_max(
                    position, position,
                )))
            }
        }
    }

    /// Serialises the light into its fixed-size GPU record.
    pub fn record(&self) -> Vec<u8> {
        let state = self.state().clone();
        let colour = state.colour.with_intensity(state.intensity);
        let shadow = &state.shadow;
        let shadow_type = shadow.shadow_type as u32 as f32;
        let gi_type = shadow.gi_type as u32 as f32;
        let map = state.shadow_map_index as f32;
        let [px, py, pz] = self.position().to_array();
        let [dx, dy, dz] = self.direction().normalize().to_array();

        match state.category {
            LightCategory::Directional => bytemuck::bytes_of(&DirectionalRecord {
                colour,
                direction: [dx, dy, dz, 0.0],
                shadow_params: [map, shadow_type, shadow.pcf.filter_size, shadow.vsm.min_variance],
                gi_params: [
                    gi_type,
                    shadow.rsm.intensity,
                    shadow.rsm.max_radius,
                    shadow.lpv.indirect_attenuation,
                ],
            })
            .to_vec(),
            LightCategory::Point { range } => bytemuck::bytes_of(&PointRecord {
                colour,
                position: [px, py, pz, range],
                shadow_params: [map, shadow_type, shadow.pcf.filter_size, gi_type],
            })
            .to_vec(),
            LightCategory::Spot {
                range,
                inner_angle,
                outer_angle,
            } => bytemuck::bytes_of(&SpotRecord {
                colour,
                position: [px, py, pz, range],
                direction: [dx, dy, dz, inner_angle.cos()],
                params: [
                    outer_angle.cos(),
                    gi_type,
                    shadow.rsm.intensity,
                    shadow.lpv.indirect_attenuation,
                ],
                shadow_params: [map, shadow_type, shadow.pcf.filter_size, shadow.vsm.min_variance],
            })
            .to_vec(),
        }
    }
}

impl fmt::Debug for Light {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Light")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("type", &self.light_type)
            .finish()
    }
}
