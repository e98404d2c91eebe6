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

//! The per-frame driver of the lighting passes of one scene.

use crate::gi_lane::{LightPropagationVolumes, LpvVariant, ReflectiveShadowMaps};
use crate::lighting_lane::{
    GBufferResult, LightPassInputs, LightPassResult, LightingInputs, LightingPass, ShadowMapResult,
};
use pollux_core::graph::{FrameGraph, RunnableGraph};
use pollux_core::math::{Aabb, Extent3D};
use pollux_core::renderer::{CommandBufferId, GraphicsDevice, RenderError};
use pollux_data::scene::{Camera, CpuUpdater, Light, LightId, Scene};
use pollux_data::Engine;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

const LPV_VARIANTS: [LpvVariant; 4] = [
    LpvVariant {
        geometry: false,
        layered: false,
    },
    LpvVariant {
        geometry: true,
        layered: false,
    },
    LpvVariant {
        geometry: false,
        layered: true,
    },
    LpvVariant {
        geometry: true,
        layered: true,
    },
];

/// Direct lighting followed by the GI chains, recorded into one command buffer
/// per frame.
pub struct LightingTechnique {
    device: Arc<dyn GraphicsDevice>,
    gi_enabled: bool,
    inputs: LightingInputs,
    lighting: LightingPass,
    runnable: RunnableGraph,
    rsm: ReflectiveShadowMaps,
    lpvs: Vec<LightPropagationVolumes>,
    frame_index: u64,
}

impl LightingTechnique {
    /// Allocates the lighting targets and shadow maps and compiles the
    /// lighting graph for `scene`.
    pub fn new(
        engine: &Arc<Engine>,
        scene: &Scene,
        gbuffer: Arc<GBufferResult>,
        lighting_model: u32,
    ) -> Result<Self, RenderError> {
        let device = engine.device().clone();
        let settings = engine.settings();
        let (width, height) = settings.render_size;
        let inputs = LightingInputs {
            gbuffer,
            result: Arc::new(LightPassResult::create(
                device.clone(),
                "LightPass",
                Extent3D::d2(width, height),
            )?),
            light_pass: LightPassInputs {
                light_buffer: scene.lights().buffer().clone(),
                shadow_maps: ShadowMapResult::create_all(&device, settings.shadow_map_size)?,
                lighting_model,
                gi_enabled: settings.gi_enabled,
            },
        };
        let mut graph = FrameGraph::new("Lighting");
        let lighting = LightingPass::declare(&mut graph, None, inputs.clone());
        let runnable = graph.compile(&device)?;
        let rsm = ReflectiveShadowMaps::new(device.clone(), settings, inputs.clone());
        let lpvs = LPV_VARIANTS
            .iter()
            .map(|variant| {
                LightPropagationVolumes::new(device.clone(), settings, inputs.clone(), *variant)
            })
            .collect::<Result<Vec<_>, _>>()?;
        log::info!("Lighting technique ready for scene '{}'", scene.name());
        Ok(Self {
            device,
            gi_enabled: settings.gi_enabled,
            inputs,
            lighting,
            runnable,
            rsm,
            lpvs,
            frame_index: 0,
        })
    }

    /// The images and buffers the passes work with.
    pub fn inputs(&self) -> &LightingInputs {
        &self.inputs
    }

    /// The direct lighting orchestration.
    pub fn lighting(&self) -> &LightingPass {
        &self.lighting
    }

    /// The reflective shadow maps chain.
    pub fn rsm(&self) -> &ReflectiveShadowMaps {
        &self.rsm
    }

    /// The propagation volume chain of `variant`.
    pub fn lpv(&self, variant: LpvVariant) -> Option<&LightPropagationVolumes> {
        self.lpvs.iter().find(|lpv| lpv.variant() == variant)
    }

    /// Drops from the GI chains the lights that left `scene` and those whose
    /// shadow or GI settings now select another chain.
    fn unregister_stale_gi_lights(&mut self, scene: &Scene) -> Result<(), RenderError> {
        let live: HashMap<LightId, Arc<Light>> = scene
            .lights()
            .lights()
            .into_iter()
            .map(|light| (light.id(), light))
            .collect();
        for id in self.rsm.light_ids() {
            if !live.get(&id).is_some_and(|l| ReflectiveShadowMaps::accepts(l)) {
                self.rsm.unregister_light(id)?;
            }
        }
        for lpv in &mut self.lpvs {
            let variant = lpv.variant();
            for id in lpv.light_ids() {
                if !live.get(&id).is_some_and(|l| LpvVariant::of(l) == Some(variant)) {
                    lpv.unregister_light(id)?;
                }
            }
        }
        Ok(())
    }

    /// Registers the GI lights of `scene` with their chain, compiling the chains
    /// that got their first light.
    fn register_gi_lights(&mut self, scene: &Scene) -> Result<(), RenderError> {
        for light in scene.lights().lights() {
            if !light.casts_shadows() {
                continue;
            }
            self.rsm.register_light(&light)?;
            if let Some(variant) = LpvVariant::of(&light) {
                if let Some(lpv) = self.lpvs.iter_mut().find(|lpv| lpv.variant() == variant) {
                    lpv.register_light(&light)?;
                }
            }
        }
        if self.rsm.light_count() > 0 && !self.rsm.is_compiled() {
            self.rsm.compile()?;
        }
        for lpv in &mut self.lpvs {
            if lpv.light_count() > 0 && !lpv.is_compiled() {
                lpv.compile()?;
            }
        }
        Ok(())
    }

    /// Renders one frame of `scene` seen from `camera`.
    ///
    /// `bounds` encloses the scene geometry and places the propagation volumes.
    ///
    /// Everything is recorded into one command buffer: the light buffer upload,
    /// then the lighting graph, then the RSM chain, then the LPV chains. The GI
    /// chains are separate graphs that add into the diffuse target, so this
    /// recording order is what places them after the light pass.
    pub fn render(
        &mut self,
        scene: &Scene,
        camera: Camera,
        bounds: &Aabb,
    ) -> Result<CommandBufferId, RenderError> {
        let updater = CpuUpdater::new(camera, self.frame_index);
        self.frame_index += 1;

        let written = scene.update(&updater)?;
        if self.gi_enabled {
            self.unregister_stale_gi_lights(scene)?;
            self.register_gi_lights(scene)?;
            self.rsm.update()?;
            for lpv in &mut self.lpvs {
                lpv.update(&camera, bounds)?;
            }
        }
        let visible = self.lighting.update(&updater, scene)?;
        log::trace!(
            "Frame {}: {written} light record(s) written, {visible} light(s) visible",
            updater.frame_index
        );

        let mut encoder = self.device.create_command_encoder(Some("Lighting"));
        scene.upload(encoder.as_mut());
        self.runnable.record(encoder.as_mut())?;
        if self.gi_enabled {
            if self.rsm.light_count() > 0 {
                self.rsm.record(encoder.as_mut())?;
            }
            for lpv in self.lpvs.iter().filter(|lpv| lpv.light_count() > 0) {
                lpv.record(encoder.as_mut())?;
            }
        }
        let command_buffer = encoder.finish();
        self.device.submit_command_buffer(command_buffer);
        self.lighting.mark_rendered();
        Ok(command_buffer)
    }
}

impl fmt::Debug for LightingTechnique {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LightingTechnique")
            .field("lighting", &self.lighting)
            .field("rsm", &self.rsm)
            .field("lpvs", &self.lpvs)
            .field("frame_index", &self.frame_index)
            .finish()
    }
}
