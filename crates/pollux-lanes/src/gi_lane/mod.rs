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

//! Global illumination chains fed by the shadow maps of the lights.

mod config_buffer;
mod fullscreen;
mod lpv;
mod rsm;

pub use self::config_buffer::ConfigBuffer;
pub use self::fullscreen::{FullscreenPass, FullscreenPassDesc};
pub use self::lpv::{
    LightPropagationVolumes, LpvGridConfig, LpvLightConfig, LpvVariant, LAYERED_LEVELS,
};
pub use self::rsm::{ReflectiveShadowMaps, RsmLightConfig};
