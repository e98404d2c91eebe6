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

//! The viewpoint lights are culled against.

use super::light::{Light, LightType};
use pollux_core::math::{Frustum, Vec3, DEG_TO_RAD};
use serde::{Deserialize, Serialize};

/// A perspective camera.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    /// Eye position in world space.
    pub position: Vec3,
    /// Viewing direction.
    pub forward: Vec3,
    /// Up hint, must not be parallel to `forward`.
    pub up: Vec3,
    /// Full vertical field of view in radians.
    pub fov_y: f32,
    /// Width over height.
    pub aspect: f32,
    /// Near plane distance.
    pub near: f32,
    /// Far plane distance.
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            forward: Vec3::NEG_Z,
            up: Vec3::Y,
            fov_y: 60.0 * DEG_TO_RAD,
            aspect: 16.0 / 9.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

impl Camera {
    /// The view frustum.
    pub fn frustum(&self) -> Frustum {
        Frustum::from_camera(
            self.position,
            self.forward,
            self.up,
            self.fov_y,
            self.aspect,
            self.near,
            self.far,
        )
    }

    /// Returns `true` if `light` may contribute to the image.
    ///
    /// Directional lights are always visible; point and spot lights are
    /// culled by their bounding box.
    pub fn is_visible(&self, light: &Light) -> bool {
        if light.light_type() == LightType::Directional {
            return true;
        }
        light
            .bounding_box()
            .is_some_and(|aabb| self.frustum().intersects_aabb(&aabb))
    }
}

/// Per-frame CPU-side update context.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CpuUpdater {
    /// The camera the frame is rendered from.
    pub camera: Camera,
    /// Monotonic frame counter.
    pub frame_index: u64,
}

impl CpuUpdater {
    /// Creates an updater for one frame.
    pub fn new(camera: Camera, frame_index: u64) -> Self {
        Self {
            camera,
            frame_index,
        }
    }
}
