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


//! Texture and sampler descriptions.

use crate::math::Extent3D;
use bitflags::bitflags;
use std::borrow::Cow;

/// Texel layouts used by the lighting and GI targets.
///
/// Every consumer reads a target with the layout it was created with, so a
/// role's format is part of its shader contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    /// Single 32-bit float channel (linear depth).
    R32Float,
    /// Two 32-bit float channels (depth moments).
    Rg32Float,
    /// Half-float RGBA, the default colour target.
    Rgba16Float,
    /// Full-float RGBA, used where precision matters (G-buffer positions).
    Rgba32Float,
    /// Depth with an 8-bit stencil aspect.
    Depth24PlusStencil8,
    /// Depth only.
    Depth32Float,
}

impl TextureFormat {
    /// Size of one texel in bytes.
    pub fn bytes_per_texel(self) -> u32 {
        match self {
            TextureFormat::R32Float
            | TextureFormat::Depth24PlusStencil8
            | TextureFormat::Depth32Float => 4,
            TextureFormat::Rg32Float | TextureFormat::Rgba16Float => 8,
            TextureFormat::Rgba32Float => 16,
        }
    }

    /// Whether the format can only be bound as a depth attachment.
    pub fn is_depth(self) -> bool {
        matches!(
            self,
            TextureFormat::Depth24PlusStencil8 | TextureFormat::Depth32Float
        )
    }
}

/// Planar or volumetric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureDimension {
    D2,
    /// Light propagation volumes.
    D3,
}

bitflags! {
    /// Ways a texture may be bound.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureUsage: u32 {
        const COPY_SRC = 1 << 0;
        const TEXTURE_BINDING = 1 << 1;
        const RENDER_ATTACHMENT = 1 << 2;
        const DEPTH_STENCIL_ATTACHMENT = 1 << 3;
    }
}

/// Parameters for [`GraphicsDevice::create_texture`].
///
/// [`GraphicsDevice::create_texture`]: crate::renderer::GraphicsDevice::create_texture
#[derive(Debug, Clone)]
pub struct TextureDescriptor<'a> {
    pub label: Option<Cow<'a, str>>,
    /// Width, height and depth (or layer count).
    pub size: Extent3D,
    pub mip_level_count: u32,
    pub dimension: TextureDimension,
    pub format: TextureFormat,
    pub usage: TextureUsage,
}

impl TextureDescriptor<'_> {
    /// Bytes taken by the top mip level.
    pub fn base_level_bytes(&self) -> u64 {
        self.size.texel_count() * u64::from(self.format.bytes_per_texel())
    }
}

/// What happens to coordinates outside `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressMode {
    ClampToEdge,
    Repeat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterMode {
    Nearest,
    Linear,
}

/// Depth comparison for shadow lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareFunction {
    Less,
    LessEqual,
}

/// Parameters for [`GraphicsDevice::create_sampler`].
///
/// The default is a clamped point sampler, which is what the G-buffer and
/// GI lookups use.
///
/// [`GraphicsDevice::create_sampler`]: crate::renderer::GraphicsDevice::create_sampler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplerDescriptor<'a> {
    pub label: Option<Cow<'a, str>>,
    /// Applied to all three coordinates.
    pub address_mode: AddressMode,
    pub filter: FilterMode,
    /// `Some` makes this a comparison sampler.
    pub compare: Option<CompareFunction>,
}

impl Default for SamplerDescriptor<'_> {
    fn default() -> Self {
        Self {
            label: None,
            address_mode: AddressMode::ClampToEdge,
            filter: FilterMode::Nearest,
            compare: None,
        }
    }
}

impl<'a> SamplerDescriptor<'a> {
    /// A linear comparison sampler for percentage-closer shadow filtering.
    pub fn shadow(label: impl Into<Cow<'a, str>>) -> Self {
        Self {
            label: Some(label.into()),
            filter: FilterMode::Linear,
            compare: Some(CompareFunction::LessEqual),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureViewId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SamplerId(pub usize);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn volume_size_counts_every_slice() {
        let descriptor = TextureDescriptor {
            label: None,
            size: Extent3D::cube(32),
            mip_level_count: 1,
            dimension: TextureDimension::D3,
            format: TextureFormat::Rgba16Float,
            usage: TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
        };
        assert_eq!(descriptor.base_level_bytes(), 32 * 32 * 32 * 8);
    }

    #[test]
    fn shadow_sampler_compares_depth() {
        let sampler = SamplerDescriptor::shadow("shadow");
        assert_eq!(sampler.compare, Some(CompareFunction::LessEqual));
        assert_eq!(sampler.address_mode, AddressMode::ClampToEdge);
        assert!(TextureFormat::Depth32Float.is_depth());
        assert!(!TextureFormat::R32Float.is_depth());
    }
}
