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


//! Linear light colours.

use serde::{Deserialize, Serialize};

/// A colour in linear space. Channels above `1.0` are valid HDR values.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[derive(bytemuck::Pod, bytemuck::Zeroable)]
pub struct LinearRgba {
    /// Red.
    pub r: f32,
    /// Green.
    pub g: f32,
    /// Blue.
    pub b: f32,
    /// Alpha.
    pub a: f32,
}

impl LinearRgba {
    /// Opaque white, the default light colour.
    pub const WHITE: Self = Self::rgb(1.0, 1.0, 1.0);
    /// All channels zero, the clear value of accumulation targets.
    pub const TRANSPARENT: Self = Self::new(0.0, 0.0, 0.0, 0.0);

    /// Builds a colour from its four channels.
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// An opaque colour.
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self::new(r, g, b, 1.0)
    }

    /// Packs the colour channels with `intensity` in place of alpha, as the
    /// light records store them.
    pub const fn with_intensity(self, intensity: f32) -> [f32; 4] {
        [self.r, self.g, self.b, intensity]
    }
}

impl Default for LinearRgba {
    fn default() -> Self {
        Self::WHITE
    }
}
