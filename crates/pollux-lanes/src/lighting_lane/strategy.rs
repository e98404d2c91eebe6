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

//! What a light pass computes on top of direct lighting.

use super::textures::SmTexture;
use pollux_data::scene::{GlobalIlluminationType, LightType, ShadowConfig, ShadowType};

/// How shadows are sampled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShadowContribution {
    /// A single depth comparison.
    Raw,
    /// Percentage-closer filtering.
    Pcf,
    /// Variance shadow maps.
    Variance,
}

impl ShadowContribution {
    fn from_shadow_type(shadow_type: ShadowType) -> Option<Self> {
        match shadow_type {
            ShadowType::None => None,
            ShadowType::Raw => Some(Self::Raw),
            ShadowType::Pcf => Some(Self::Pcf),
            ShadowType::Variance => Some(Self::Variance),
        }
    }

    /// The shadow map images the pass samples.
    pub fn sampled_maps(self) -> &'static [SmTexture] {
        match self {
            Self::Raw | Self::Pcf => &[SmTexture::Depth, SmTexture::Linear],
            Self::Variance => &[SmTexture::Variance, SmTexture::Linear],
        }
    }

    fn program_suffix(self) -> &'static str {
        match self {
            Self::Raw => "shadow_raw",
            Self::Pcf => "shadow_pcf",
            Self::Variance => "shadow_vsm",
        }
    }
}

/// How indirect light reaches the pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GiContribution {
    /// Reflective shadow maps, gathered from the light's own shadow map.
    Rsm,
    /// A light propagation volume, resolved by the volume chain.
    Lpv,
    /// Cascaded light propagation volumes.
    LayeredLpv,
}

impl GiContribution {
    fn from_gi_type(gi_type: GlobalIlluminationType) -> Option<Self> {
        match gi_type {
            GlobalIlluminationType::None => None,
            GlobalIlluminationType::Rsm => Some(Self::Rsm),
            GlobalIlluminationType::Lpv | GlobalIlluminationType::LpvGeometry => Some(Self::Lpv),
            GlobalIlluminationType::LayeredLpv | GlobalIlluminationType::LayeredLpvGeometry => {
                Some(Self::LayeredLpv)
            }
        }
    }

    /// The shadow map images the pass samples.
    pub fn sampled_maps(self) -> &'static [SmTexture] {
        match self {
            Self::Rsm => &[SmTexture::Normal, SmTexture::Position, SmTexture::Flux],
            Self::Lpv | Self::LayeredLpv => &[],
        }
    }

    fn program_suffix(self) -> &'static str {
        match self {
            Self::Rsm => "gi_rsm",
            Self::Lpv => "gi_lpv",
            Self::LayeredLpv => "gi_llpv",
        }
    }
}

/// The capability set of a light pass.
///
/// Indirect lighting reuses the shadow map, so a light without shadows has no
/// GI contribution either.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct LightPassStrategy {
    /// Shadow sampling, if the light casts shadows.
    pub shadow: Option<ShadowContribution>,
    /// Indirect lighting, if any.
    pub gi: Option<GiContribution>,
}

impl LightPassStrategy {
    /// Selects the strategy for a light of `light_type` configured with `shadow`.
    pub fn select(light_type: LightType, shadow: &ShadowConfig, gi_enabled: bool) -> Self {
        let shadow_contribution = ShadowContribution::from_shadow_type(shadow.shadow_type);
        let gi = match shadow_contribution {
            Some(_) if gi_enabled => GiContribution::from_gi_type(shadow.gi_type),
            _ => None,
        };
        // Cascades only make sense for unbounded lights.
        let gi = match gi {
            Some(GiContribution::LayeredLpv) if light_type != LightType::Directional => {
                Some(GiContribution::Lpv)
            }
            other => other,
        };
        Self {
            shadow: shadow_contribution,
            gi,
        }
    }

    /// The shader program name, e.g. `lighting/spot/shadow_pcf/gi_rsm`.
    pub fn program(&self, light_type: LightType) -> String {
        let mut program = format!("lighting/{}", light_type.name());
        for suffix in [
            self.shadow.map(ShadowContribution::program_suffix),
            self.gi.map(GiContribution::program_suffix),
        ]
        .into_iter()
        .flatten()
        {
            program.push('/');
            program.push_str(suffix);
        }
        program
    }

    /// Every shadow map image the pass samples, in binding order.
    pub fn sampled_maps(&self) -> Vec<SmTexture> {
        let mut maps = Vec::new();
        let sources = [
            self.shadow.map(ShadowContribution::sampled_maps),
            self.gi.map(GiContribution::sampled_maps),
        ];
        for map in sources.into_iter().flatten().flatten() {
            if !maps.contains(map) {
                maps.push(*map);
            }
        }
        maps
    }
}
