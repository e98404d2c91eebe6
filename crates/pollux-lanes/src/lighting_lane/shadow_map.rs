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

//! Shadow map outputs consumed by the lighting and GI passes.

use super::textures::{SmTexture, TextureSet};
use pollux_core::graph::{FrameGraph, ImageId};
use pollux_core::math::Extent3D;
use pollux_core::renderer::{GraphicsDevice, ResourceError, TextureViewId};
use pollux_data::scene::LightType;
use std::sync::Arc;

/// The shadow map images of one light type.
///
/// Point shadow maps hold six layers, one per cube face.
#[derive(Debug)]
pub struct ShadowMapResult {
    light_type: LightType,
    maps: TextureSet<SmTexture>,
}

impl ShadowMapResult {
    /// Allocates square shadow maps of `size` texels for `light_type`.
    pub fn create(
        device: Arc<dyn GraphicsDevice>,
        light_type: LightType,
        size: u32,
    ) -> Result<Self, ResourceError> {
        let extent = match light_type {
            LightType::Point => Extent3D {
                width: size,
                height: size,
                depth_or_array_layers: 6,
            },
            LightType::Directional | LightType::Spot => Extent3D::d2(size, size),
        };
        let maps = TextureSet::create(device, format!("ShadowMap/{}", light_type.name()), extent)?;
        Ok(Self { light_type, maps })
    }

    /// Allocates one result per light type, in partition order.
    pub fn create_all(
        device: &Arc<dyn GraphicsDevice>,
        size: u32,
    ) -> Result<[Arc<Self>; 3], ResourceError> {
        Ok([
            Arc::new(Self::create(device.clone(), LightType::Directional, size)?),
            Arc::new(Self::create(device.clone(), LightType::Point, size)?),
            Arc::new(Self::create(device.clone(), LightType::Spot, size)?),
        ])
    }

    /// The light type these maps are rendered for.
    pub fn light_type(&self) -> LightType {
        self.light_type
    }

    /// The size of the maps. Point maps have six layers.
    pub fn size(&self) -> Extent3D {
        self.maps.size()
    }

    /// The view of one image.
    pub fn view(&self, texture: SmTexture) -> TextureViewId {
        self.maps.view(texture)
    }

    /// Imports one image into `graph`.
    pub fn import(&self, graph: &mut FrameGraph, texture: SmTexture) -> ImageId {
        self.maps.import(graph, texture)
    }
}
