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

//! Integer extents used to size GPU images.

/// A 3D extent (width, height, depth or array layers).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extent3D {
    /// The width in texels.
    pub width: u32,
    /// The height in texels.
    pub height: u32,
    /// The depth (for 3D images) or the number of array layers.
    pub depth_or_array_layers: u32,
}

impl Extent3D {
    /// Creates a 2D extent with a single layer.
    pub const fn d2(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            depth_or_array_layers: 1,
        }
    }

    /// Creates a cubic 3D extent, as used by light propagation grids.
    pub const fn cube(size: u32) -> Self {
        Self {
            width: size,
            height: size,
            depth_or_array_layers: size,
        }
    }

    /// Texels covered by one mip level of this extent.
    pub fn texel_count(self) -> u64 {
        u64::from(self.width) * u64::from(self.height) * u64::from(self.depth_or_array_layers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn planar_extents_have_one_layer() {
        assert_eq!(Extent3D::d2(640, 360).texel_count(), 640 * 360);
        assert_eq!(Extent3D::cube(4).texel_count(), 64);
    }
}
