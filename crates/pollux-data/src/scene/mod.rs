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

//! The scene model: lights, nodes, cameras, samplers and scenes.

mod camera;
mod light;
mod node;
mod sampler;
mod scene;

pub use self::camera::{Camera, CpuUpdater};
pub use self::light::{
    DirectionalRecord, GlobalIlluminationType, Light, LightCategory, LightId, LightType,
    LpvConfig, PcfConfig, PointRecord, RsmConfig, ShadowConfig, ShadowType, SpotRecord,
    VsmConfig,
};
pub use self::node::SceneNode;
pub use self::sampler::Sampler;
pub use self::scene::{Scene, SceneFlags, ROOT_NODE};
