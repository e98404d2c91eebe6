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

//! Reflective shadow maps: one bounce of indirect light gathered from the
//! shadow maps of the registered lights.
//!
//! Each light adds two passes. The GI pass gathers at half resolution, the
//! interpolate pass upsamples the result and adds it to the diffuse target.
//! Lights are chained one after the other rather than fanned out, in
//! registration order. The chain holds lights weakly and rebuilds its graph
//! whenever a compiled chain gains or loses a light.

use super::config_buffer::ConfigBuffer;
use super::fullscreen::{FullscreenPass, FullscreenPassDesc};
use crate::lighting_lane::{DsTexture, LightingInputs, LpTexture, SmTexture, TextureRole};
use pollux_core::graph::{FrameGraph, ImageDesc, PassId, RunnableGraph};
use pollux_core::math::Extent3D;
use pollux_core::renderer::{
    BlendMode, ClearValue, CommandBufferId, CommandEncoder, GraphicsDevice, RenderError,
    ResourceError, TextureDimension, TextureFormat, TextureUsage,
};
use pollux_core::RenderSettings;
use pollux_data::scene::{GlobalIlluminationType, Light, LightId, LightType};
use std::fmt;
use std::sync::{Arc, Weak};

/// Per-light parameters read by the RSM programs.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct RsmLightConfig {
    /// Indirect light intensity factor.
    pub intensity: f32,
    /// Sampling radius in shadow-map UV space.
    pub max_radius: f32,
    /// Samples taken per pixel.
    pub sample_count: u32,
    /// Index of the light's shadow map layer.
    pub shadow_map_index: i32,
}

impl RsmLightConfig {
    fn of(light: &Light, max_samples: u32) -> Self {
        let rsm = light.shadow_config().rsm;
        Self {
            intensity: rsm.intensity,
            max_radius: rsm.max_radius,
            sample_count: rsm.sample_count.min(max_samples),
            shadow_map_index: light.shadow_map_index(),
        }
    }
}

struct LightRsm {
    id: LightId,
    name: String,
    light_type: LightType,
    light: Weak<Light>,
    config: ConfigBuffer<RsmLightConfig>,
}

/// The RSM passes of every registered light, in one frame graph.
pub struct ReflectiveShadowMaps {
    device: Arc<dyn GraphicsDevice>,
    inputs: LightingInputs,
    max_samples: u32,
    lights: Vec<LightRsm>,
    runnable: Option<RunnableGraph>,
}

impl ReflectiveShadowMaps {
    /// Creates an empty chain writing into the diffuse target of `inputs`.
    pub fn new(
        device: Arc<dyn GraphicsDevice>,
        settings: &RenderSettings,
        inputs: LightingInputs,
    ) -> Self {
        Self {
            device,
            inputs,
            max_samples: settings.rsm_sample_count,
            lights: Vec::new(),
            runnable: None,
        }
    }

    /// Returns `true` if `light` is gathered by this chain.
    pub fn accepts(light: &Light) -> bool {
        light.casts_shadows() && light.shadow_config().gi_type == GlobalIlluminationType::Rsm
    }

    fn gather_desc(&self, name: String, format: TextureFormat) -> ImageDesc {
        let size = self.inputs.result.size();
        ImageDesc {
            name,
            format,
            size: Extent3D::d2((size.width / 2).max(1), (size.height / 2).max(1)),
            dimension: TextureDimension::D2,
            usage: TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
            clear_value: ClearValue::TRANSPARENT,
        }
    }

    /// Adds `light` to the end of the chain.
    ///
    /// Returns `Ok(false)` for lights without shadows, lights using another GI
    /// technique and lights already registered. A registration after
    /// [`compile`](Self::compile) recompiles the whole graph.
    pub fn register_light(&mut self, light: &Arc<Light>) -> Result<bool, RenderError> {
        if !Self::accepts(light) || self.has_light(light.id()) {
            return Ok(false);
        }
        let name = light.name().to_string();
        let config = ConfigBuffer::new(
            self.device.clone(),
            format!("RSM/{name}/Config"),
            &RsmLightConfig::of(light, self.max_samples),
        )?;
        self.lights.push(LightRsm {
            id: light.id(),
            name: name.clone(),
            light_type: light.light_type(),
            light: Arc::downgrade(light),
            config,
        });
        log::debug!("RSM: registered light '{name}'");

        if self.runnable.is_some() {
            log::info!("RSM: light '{name}' registered after compile, recompiling");
            self.compile()?;
        }
        Ok(true)
    }

    /// Drops the passes of the light `id` and releases its parameters.
    ///
    /// Returns `Ok(false)` if the light was not registered. A compiled chain is
    /// recompiled, or dropped if no light is left.
    pub fn unregister_light(&mut self, id: LightId) -> Result<bool, RenderError> {
        let Some(index) = self.lights.iter().position(|l| l.id == id) else {
            return Ok(false);
        };
        let removed = self.lights.remove(index);
        log::debug!("RSM: unregistered light '{}'", removed.name);
        if self.runnable.is_some() {
            if self.lights.is_empty() {
                self.runnable = None;
            } else {
                log::info!("RSM: light '{}' unregistered, recompiling", removed.name);
                self.compile()?;
            }
        }
        Ok(true)
    }

    fn build(&self) -> FrameGraph {
        let mut graph = FrameGraph::new("RSM");
        let depth = self.inputs.gbuffer.import(&mut graph, DsTexture::Depth);
        let data1 = self.inputs.gbuffer.import(&mut graph, DsTexture::Data1);
        let diffuse = self.inputs.result.import(&mut graph, LpTexture::Diffuse);
        let light_buffer = self.inputs.light_pass.light_buffer.gpu_buffer();

        let mut last_pass: Option<PassId> = None;
        for rsm in &self.lights {
            let name = &rsm.name;
            let shadow_map = &self.inputs.light_pass.shadow_maps[rsm.light_type.index()];
            let gi = graph.create_image(self.gather_desc(
                format!("{name}/GI"),
                LpTexture::Diffuse.get_format(),
            ));
            let normal = graph.create_image(self.gather_desc(
                format!("{name}/Normal"),
                DsTexture::Data1.get_format(),
            ));

            let gi_pass = graph.create_pass(
                format!("{name}/RsmGI"),
                FullscreenPass::factory(
                    FullscreenPassDesc::triangle(
                        format!("rsm/gi/{}", rsm.light_type.name()),
                        BlendMode::Replace,
                    )
                    .clearing(2)
                    .with_buffer(light_buffer)
                    .with_buffer(rsm.config.buffer()),
                ),
            );
            graph.add_sampled_view(gi_pass, depth);
            graph.add_sampled_view(gi_pass, data1);
            for map in [SmTexture::Normal, SmTexture::Position, SmTexture::Flux] {
                let image = shadow_map.import(&mut graph, map);
                graph.add_sampled_view(gi_pass, image);
            }
            graph.add_output_colour_view(gi_pass, gi);
            graph.add_output_colour_view(gi_pass, normal);
            if let Some(last) = last_pass {
                graph.add_dependency(gi_pass, last);
            }

            let interpolate = graph.create_pass(
                format!("{name}/RsmInterpolate"),
                FullscreenPass::factory(
                    FullscreenPassDesc::triangle("rsm/interpolate", BlendMode::Additive)
                        .with_buffer(rsm.config.buffer()),
                ),
            );
            for image in [gi, normal, depth, data1] {
                graph.add_sampled_view(interpolate, image);
            }
            graph.add_output_colour_view(interpolate, diffuse);
            graph.add_dependency(interpolate, gi_pass);
            last_pass = Some(interpolate);
        }
        graph
    }

    /// Compiles the graph, replacing any previous compile.
    pub fn compile(&mut self) -> Result<(), RenderError> {
        // The previous transient images go first.
        self.runnable = None;
        let graph = self.build();
        self.runnable = Some(graph.compile(&self.device)?);
        Ok(())
    }

    /// Forgets every light and drops the compiled graph.
    pub fn cleanup(&mut self) {
        self.runnable = None;
        self.lights.clear();
    }

    /// Returns `true` once the graph is compiled.
    pub fn is_compiled(&self) -> bool {
        self.runnable.is_some()
    }

    /// The number of registered lights.
    pub fn light_count(&self) -> usize {
        self.lights.len()
    }

    /// Returns `true` if `id` is registered.
    pub fn has_light(&self, id: LightId) -> bool {
        self.lights.iter().any(|l| l.id == id)
    }

    /// Registered lights, in chain order.
    pub fn light_ids(&self) -> Vec<LightId> {
        self.lights.iter().map(|l| l.id).collect()
    }

    /// Pass names in execution order, empty before [`compile`](Self::compile).
    pub fn pass_order(&self) -> Vec<String> {
        self.runnable
            .as_ref()
            .map(|r| r.pass_order().into_iter().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Rewrites the per-light parameters from the current light state.
    ///
    /// Lights dropped since their registration are left as they are until
    /// they are unregistered.
    pub fn update(&self) -> Result<(), ResourceError> {
        for rsm in &self.lights {
            if let Some(light) = rsm.light.upgrade() {
                rsm.config
                    .write(&RsmLightConfig::of(&light, self.max_samples))?;
            }
        }
        Ok(())
    }

    /// Records the chain into `encoder`. Does nothing before compile.
    pub fn record(&self, encoder: &mut dyn CommandEncoder) -> Result<(), RenderError> {
        match &self.runnable {
            Some(runnable) => runnable.record(encoder),
            None => Ok(()),
        }
    }

    /// Records and submits the chain. Returns `None` when there is nothing to run.
    pub fn run(&self) -> Result<Option<CommandBufferId>, RenderError> {
        match &self.runnable {
            Some(runnable) if !self.lights.is_empty() => runnable.run().map(Some),
            _ => Ok(None),
        }
    }
}

impl fmt::Debug for ReflectiveShadowMaps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReflectiveShadowMaps")
            .field("lights", &self.lights.len())
            .field("compiled", &self.runnable.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pollux_data::scene::{LightCategory, ShadowConfig};

    #[test]
    fn config_clamps_the_sample_count() {
        let light = Light::new(LightId(1), "sun", "s", LightCategory::Directional);
        let mut shadow = ShadowConfig::default();
        shadow.rsm.sample_count = 100;
        light.set_shadow_config(shadow);
        light.set_shadow_map_index(2);
        let config = RsmLightConfig::of(&light, 32);
        assert_eq!(config.sample_count, 32);
        assert_eq!(config.shadow_map_index, 2);
        assert_eq!(std::mem::size_of::<RsmLightConfig>(), 16);
    }
}
