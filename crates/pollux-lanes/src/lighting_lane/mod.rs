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

//! Direct lighting: render target tables, per-configuration pipelines and the
//! light pass fed every frame with the visible lights.

mod light_pass;
mod lighting_pass;
mod pipeline;
mod shadow_map;
mod strategy;
mod textures;

pub use self::light_pass::{LightPass, LightPassInputs, LightPassState};
pub use self::lighting_pass::{LightingInputs, LightingPass, SAMPLED_GBUFFER};
pub use self::pipeline::{
    EnabledLight, LightsPipeline, PipelineKey, FULLSCREEN_VERTICES, LIGHT_VOLUME_VERTICES,
};
pub use self::shadow_map::ShadowMapResult;
pub use self::strategy::{GiContribution, LightPassStrategy, ShadowContribution};
pub use self::textures::{
    DsTexture, GBufferResult, LightPassResult, LpTexture, LpvTexture, SmTexture, TextureRole,
    TextureSet,
};
