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

//! Texture-role tables and the texture sets built from them.
//!
//! Every render target of the lighting passes is described by a role. A role
//! fixes the format, clear value and usage of its image; shaders rely on these
//! values, so they are part of the contract with the shader side.

use pollux_core::graph::{FrameGraph, ImageDesc, ImageId};
use pollux_core::math::{Extent3D, LinearRgba};
use pollux_core::renderer::{
    ClearValue, GraphicsDevice, ResourceError, TextureDescriptor, TextureDimension, TextureFormat,
    TextureId, TextureUsage, TextureViewId,
};
use std::borrow::Cow;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

const COLOUR_USAGE: TextureUsage =
    TextureUsage::RENDER_ATTACHMENT.union(TextureUsage::TEXTURE_BINDING);
const DEPTH_USAGE: TextureUsage =
    TextureUsage::DEPTH_STENCIL_ATTACHMENT.union(TextureUsage::TEXTURE_BINDING);

/// Describes one kind of render target.
pub trait TextureRole: Copy + fmt::Debug + Send + Sync + 'static {
    /// Every role of the set, in index order.
    const ALL: &'static [Self];

    /// The position of the role in [`TextureRole::ALL`].
    fn index(self) -> usize;

    /// The texel format.
    fn get_format(self) -> TextureFormat;

    /// The value the image is cleared to.
    fn get_clear_value(self) -> ClearValue;

    /// The allowed usages.
    fn get_usage(self) -> TextureUsage;

    /// The debug name.
    fn get_name(self) -> &'static str;

    /// The image dimensionality.
    fn dimension(self) -> TextureDimension {
        TextureDimension::D2
    }

    /// A frame-graph image description for this role.
    fn image_desc(self, prefix: &str, size: Extent3D) -> ImageDesc {
        ImageDesc {
            name: format!("{prefix}/{}", self.get_name()),
            format: self.get_format(),
            size,
            dimension: self.dimension(),
            usage: self.get_usage(),
            clear_value: self.get_clear_value(),
        }
    }
}

/// The geometry buffer written by the opaque pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DsTexture {
    /// Depth and stencil.
    Depth,
    /// Linear depth, flags and material data.
    Data0,
    /// Normals.
    Data1,
    /// Diffuse colour.
    Data2,
    /// Specular colour and roughness.
    Data3,
    /// Emissive colour.
    Data4,
    /// Velocity.
    Data5,
}

impl TextureRole for DsTexture {
    const ALL: &'static [Self] = &[
        Self::Depth,
        Self::Data0,
        Self::Data1,
        Self::Data2,
        Self::Data3,
        Self::Data4,
        Self::Data5,
    ];

    fn index(self) -> usize {
        self as usize
    }

    fn get_format(self) -> TextureFormat {
        match self {
            Self::Depth => TextureFormat::Depth24PlusStencil8,
            Self::Data0 => TextureFormat::Rgba32Float,
            _ => TextureFormat::Rgba16Float,
        }
    }

    fn get_clear_value(self) -> ClearValue {
        match self {
            Self::Depth => ClearValue::DepthStencil {
                depth: 1.0,
                stencil: 0,
            },
            _ => ClearValue::TRANSPARENT,
        }
    }

    fn get_usage(self) -> TextureUsage {
        match self {
            Self::Depth => DEPTH_USAGE | TextureUsage::COPY_SRC,
            _ => COLOUR_USAGE,
        }
    }

    fn get_name(self) -> &'static str {
        match self {
            Self::Depth => "Depth",
            Self::Data0 => "Data0",
            Self::Data1 => "Data1",
            Self::Data2 => "Data2",
            Self::Data3 => "Data3",
            Self::Data4 => "Data4",
            Self::Data5 => "Data5",
        }
    }
}

/// The images of one shadow map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SmTexture {
    /// Light-space depth.
    Depth,
    /// Linear depth.
    Linear,
    /// Depth moments for variance shadow maps.
    Variance,
    /// World normal, for reflective shadow maps.
    Normal,
    /// World position, for reflective shadow maps.
    Position,
    /// Reflected flux, for reflective shadow maps.
    Flux,
}

impl TextureRole for SmTexture {
    const ALL: &'static [Self] = &[
        Self::Depth,
        Self::Linear,
        Self::Variance,
        Self::Normal,
        Self::Position,
        Self::Flux,
    ];

    fn index(self) -> usize {
        self as usize
    }

    fn get_format(self) -> TextureFormat {
        match self {
            Self::Depth => TextureFormat::Depth32Float,
            Self::Linear => TextureFormat::R32Float,
            Self::Variance => TextureFormat::Rg32Float,
            Self::Normal | Self::Position | Self::Flux => TextureFormat::Rgba16Float,
        }
    }

    fn get_clear_value(self) -> ClearValue {
        match self {
            Self::Depth => ClearValue::DepthStencil {
                depth: 1.0,
                stencil: 0,
            },
            Self::Linear => ClearValue::Colour(LinearRgba::new(f32::MAX, 0.0, 0.0, 0.0)),
            Self::Variance => ClearValue::Colour(LinearRgba::new(f32::MAX, f32::MAX, 0.0, 0.0)),
            Self::Normal | Self::Position | Self::Flux => ClearValue::TRANSPARENT,
        }
    }

    fn get_usage(self) -> TextureUsage {
        match self {
            Self::Depth => DEPTH_USAGE,
            _ => COLOUR_USAGE,
        }
    }

    fn get_name(self) -> &'static str {
        match self {
            Self::Depth => "Depth",
            Self::Linear => "Linear",
            Self::Variance => "Variance",
            Self::Normal => "Normal",
            Self::Position => "Position",
            Self::Flux => "Flux",
        }
    }
}

/// One spherical-harmonics channel of a light propagation volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LpvTexture {
    /// Red coefficients.
    R,
    /// Green coefficients.
    G,
    /// Blue coefficients.
    B,
}

impl TextureRole for LpvTexture {
    const ALL: &'static [Self] = &[Self::R, Self::G, Self::B];

    fn index(self) -> usize {
        self as usize
    }

    fn get_format(self) -> TextureFormat {
        TextureFormat::Rgba16Float
    }

    fn get_clear_value(self) -> ClearValue {
        ClearValue::TRANSPARENT
    }

    fn get_usage(self) -> TextureUsage {
        COLOUR_USAGE
    }

    fn get_name(self) -> &'static str {
        match self {
            Self::R => "R",
            Self::G => "G",
            Self::B => "B",
        }
    }

    fn dimension(self) -> TextureDimension {
        TextureDimension::D3
    }
}

/// The outputs of the lighting pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LpTexture {
    /// Diffuse light, direct and indirect.
    Diffuse,
    /// Specular light.
    Specular,
    /// Light scattered below surfaces.
    Scattering,
}

impl TextureRole for LpTexture {
    const ALL: &'static [Self] = &[Self::Diffuse, Self::Specular, Self::Scattering];

    fn index(self) -> usize {
        self as usize
    }

    fn get_format(self) -> TextureFormat {
        TextureFormat::Rgba16Float
    }

    fn get_clear_value(self) -> ClearValue {
        ClearValue::TRANSPARENT
    }

    fn get_usage(self) -> TextureUsage {
        COLOUR_USAGE
    }

    fn get_name(self) -> &'static str {
        match self {
            Self::Diffuse => "Diffuse",
            Self::Specular => "Specular",
            Self::Scattering => "Scattering",
        }
    }
}

/// One texture per role of `R`, owned and released on drop.
pub struct TextureSet<R: TextureRole> {
    device: Arc<dyn GraphicsDevice>,
    prefix: String,
    size: Extent3D,
    textures: Vec<TextureId>,
    views: Vec<TextureViewId>,
    _role: PhantomData<R>,
}

/// The geometry buffer.
pub type GBufferResult = TextureSet<DsTexture>;

/// The lighting pass outputs.
pub type LightPassResult = TextureSet<LpTexture>;

impl<R: TextureRole> TextureSet<R> {
    /// Allocates every texture of the set. Labels are `prefix/role`.
    pub fn create(
        device: Arc<dyn GraphicsDevice>,
        prefix: impl Into<String>,
        size: Extent3D,
    ) -> Result<Self, ResourceError> {
        let mut set = Self {
            device,
            prefix: prefix.into(),
            size,
            textures: Vec::with_capacity(R::ALL.len()),
            views: Vec::with_capacity(R::ALL.len()),
            _role: PhantomData,
        };
        for role in R::ALL {
            let texture = set.device.create_texture(&TextureDescriptor {
                label: Some(Cow::Owned(format!("{}/{}", set.prefix, role.get_name()))),
                size,
                mip_level_count: 1,
                dimension: role.dimension(),
                format: role.get_format(),
                usage: role.get_usage(),
            })?;
            set.textures.push(texture);
            let view = set.device.create_texture_view(texture)?;
            set.views.push(view);
        }
        log::debug!("Created texture set '{}' ({} images)", set.prefix, R::ALL.len());
        Ok(set)
    }

    /// The label prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The size shared by every image.
    pub fn size(&self) -> Extent3D {
        self.size
    }

    /// The view of one role.
    pub fn view(&self, role: R) -> TextureViewId {
        self.views[role.index()]
    }

    /// The frame-graph description of one role.
    pub fn image_desc(&self, role: R) -> ImageDesc {
        role.image_desc(&self.prefix, self.size)
    }

    /// Imports one role into `graph`.
    pub fn import(&self, graph: &mut FrameGraph, role: R) -> ImageId {
        graph.import_image(self.image_desc(role), self.view(role))
    }
}

impl<R: TextureRole> Drop for TextureSet<R> {
    fn drop(&mut self) {
        for texture in self.textures.drain(..) {
            if let Err(e) = self.device.destroy_texture(texture) {
                log::warn!("Failed to release texture of '{}': {e}", self.prefix);
            }
        }
    }
}

impl<R: TextureRole> fmt::Debug for TextureSet<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextureSet")
            .field("prefix", &self.prefix)
            .field("size", &self.size)
            .field("views", &self.views)
            .finish()
    }
}
