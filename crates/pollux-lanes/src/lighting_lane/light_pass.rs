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

//! The pass drawing every visible light into the lighting targets.

use super::pipeline::{LightsPipeline, PipelineKey};
use super::shadow_map::ShadowMapResult;
use pollux_core::graph::{PassContext, RunnablePass};
use pollux_core::math::LinearRgba;
use pollux_core::renderer::{
    BindGroupDescriptor, BindGroupEntry, BindGroupId, BindingResource, CommandEncoder,
    GraphicsDevice, Operations, RenderError, RenderPassColorAttachment, RenderPassDescriptor,
    RenderPipelineId, TextureFormat, TextureViewId,
};
use pollux_data::scene::{Camera, Light, LightId, SceneFlags};
use pollux_data::LightBuffer;
use std::borrow::Cow;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Where a [`LightPass`] stands in its frame cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LightPassState {
    /// Built by the frame graph, not usable yet.
    Uninitialised,
    /// GPU objects exist; no frame has started.
    PipelinesCreated,
    /// The enabled lights were reset for a new frame.
    Cleared,
    /// At least one light is enabled for the frame.
    LightsEnabled,
    /// The frame's commands were recorded.
    CommandsRecorded,
    /// The recorded commands were submitted.
    Rendered,
}

/// The resources a [`LightPass`] draws with, shared with whoever declares it.
#[derive(Debug, Clone)]
pub struct LightPassInputs {
    /// The light records.
    pub light_buffer: Arc<LightBuffer>,
    /// Shadow maps, indexed by light type.
    pub shadow_maps: [Arc<ShadowMapResult>; 3],
    /// The lighting model of the scene materials.
    pub lighting_model: u32,
    /// Whether lights may select a GI contribution.
    pub gi_enabled: bool,
}

#[derive(Debug, Clone, Copy)]
struct Target {
    view: TextureViewId,
    format: TextureFormat,
    clear: LinearRgba,
}

struct Inner {
    state: LightPassState,
    base: Option<BindGroupId>,
    pipelines: BTreeMap<PipelineKey, LightsPipeline>,
}

/// Draws the enabled lights, one [`LightsPipeline`] per configuration.
///
/// The first light of a frame overwrites the targets; every following light
/// is blended on top of it. Pipelines are recorded in [`PipelineKey`] order so
/// the blend order does not change from one frame to the next.
pub struct LightPass {
    device: Arc<dyn GraphicsDevice>,
    name: String,
    inputs: LightPassInputs,
    sampled: Vec<TextureViewId>,
    targets: Vec<Target>,
    inner: Mutex<Inner>,
}

impl LightPass {
    /// Builds the pass from the images the frame graph resolved for it.
    pub fn new(ctx: &PassContext<'_>, inputs: LightPassInputs) -> Self {
        Self {
            device: ctx.device.clone(),
            name: ctx.name.to_string(),
            inputs,
            sampled: ctx.sampled.iter().map(|image| image.view).collect(),
            targets: ctx
                .colour_outputs
                .iter()
                .map(|image| Target {
                    view: image.view,
                    format: image.desc.format,
                    clear: image
                        .desc
                        .clear_value
                        .colour()
                        .unwrap_or(LinearRgba::TRANSPARENT),
                })
                .collect(),
            inner: Mutex::new(Inner {
                state: LightPassState::Uninitialised,
                base: None,
                pipelines: BTreeMap::new(),
            }),
        }
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Creates the bind group of the sampled geometry buffer. Runs once; later
    /// calls do nothing.
    pub fn initialise(&self) -> Result<(), RenderError> {
        let mut inner = self.inner();
        if inner.state != LightPassState::Uninitialised {
            return Ok(());
        }
        let entries = (0..)
            .zip(&self.sampled)
            .map(|(binding, view)| BindGroupEntry {
                binding,
                resource: BindingResource::TextureView(*view),
            })
            .collect();
        inner.base = Some(self.device.create_bind_group(&BindGroupDescriptor {
            label: Some(Cow::Owned(format!("{}/GBuffer", self.name))),
            entries,
        })?);
        inner.state = LightPassState::PipelinesCreated;
        log::debug!("Light pass '{}' initialised", self.name);
        Ok(())
    }

    /// The current state.
    pub fn state(&self) -> LightPassState {
        self.inner().state
    }

    /// The inputs the pass draws with.
    pub fn inputs(&self) -> &LightPassInputs {
        &self.inputs
    }

    /// Starts a new frame: every light is disabled.
    pub fn clear(&self) {
        let mut inner = self.inner();
        for pipeline in inner.pipelines.values_mut() {
            pipeline.clear();
        }
        if inner.state != LightPassState::Uninitialised {
            inner.state = LightPassState::Cleared;
        }
    }

    /// Enables `light` for the current frame, creating its pipeline on first use.
    ///
    /// Returns `Ok(false)` if the light was already enabled or has no record in
    /// the light buffer yet.
    ///
    /// # Errors
    ///
    /// [`RenderError::NotInitialized`] before [`initialise`](Self::initialise),
    /// and any device error raised while creating the pipeline or bind group.
    pub fn enable_light(
        &self,
        camera: &Camera,
        light: &Light,
        scene_flags: SceneFlags,
    ) -> Result<bool, RenderError> {
        let mut inner = self.inner();
        if inner.state == LightPassState::Uninitialised {
            return Err(RenderError::NotInitialized);
        }
        let key = PipelineKey::for_light(
            light,
            self.inputs.lighting_model,
            scene_flags,
            self.inputs.gi_enabled,
        );
        let pipeline = self.find_pipeline(&mut inner, key)?;
        let shadow_map = &self.inputs.shadow_maps[key.light_type.index()];
        let added = pipeline.add_light(camera, light, &self.inputs.light_buffer, shadow_map)?;
        if added {
            log::trace!("[{}] enabled light '{}'", self.name, light.name());
            inner.state = LightPassState::LightsEnabled;
        }
        Ok(added)
    }

    fn find_pipeline<'a>(
        &self,
        inner: &'a mut Inner,
        key: PipelineKey,
    ) -> Result<&'a mut LightsPipeline, RenderError> {
        Ok(match inner.pipelines.entry(key) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let formats: Vec<_> = self.targets.iter().map(|t| t.format).collect();
                entry.insert(LightsPipeline::new(self.device.clone(), key, &formats)?)
            }
        })
    }

    /// Disables a light for the current frame. Returns `true` if it was enabled.
    pub fn disable_light(&self, id: LightId) -> bool {
        let mut inner = self.inner();
        let mut removed = false;
        for pipeline in inner.pipelines.values_mut() {
            removed |= pipeline.remove_light(id);
        }
        removed
    }

    /// The number of pipelines created so far.
    pub fn pipeline_count(&self) -> usize {
        self.inner().pipelines.len()
    }

    /// Keys of the created pipelines, in recording order.
    pub fn pipeline_keys(&self) -> Vec<PipelineKey> {
        self.inner().pipelines.keys().copied().collect()
    }

    /// Enabled lights, in drawing order.
    pub fn enabled_lights(&self) -> Vec<LightId> {
        self.inner()
            .pipelines
            .values()
            .flat_map(|p| p.lights().iter().map(|l| l.id))
            .collect()
    }

    /// Marks the recorded commands as submitted.
    pub fn mark_rendered(&self) {
        let mut inner = self.inner();
        if inner.state == LightPassState::CommandsRecorded {
            inner.state = LightPassState::Rendered;
        }
    }

    fn attachments(&self, clear: bool) -> Vec<RenderPassColorAttachment> {
        self.targets
            .iter()
            .map(|target| RenderPassColorAttachment {
                view: target.view,
                ops: if clear {
                    Operations::clear(target.clear)
                } else {
                    Operations::accumulate()
                },
            })
            .collect()
    }
}

impl RunnablePass for LightPass {
    fn name(&self) -> &str {
        &self.name
    }

    fn record(&self, encoder: &mut dyn CommandEncoder) -> Result<(), RenderError> {
        let mut inner = self.inner();
        let base = inner.base.ok_or(RenderError::NotInitialized)?;

        // (pipeline overwriting the targets, pipeline blending, light)
        let draws: Vec<(RenderPipelineId, RenderPipelineId, _)> = inner
            .pipelines
            .values()
            .flat_map(|p| {
                let (first, blend) = p.pipelines();
                p.lights().iter().map(move |light| (first, blend, *light))
            })
            .collect();

        let label = format!("{}/First", self.name);
        let attachments = self.attachments(true);
        let mut pass = encoder.begin_render_pass(&RenderPassDescriptor {
            label: Some(&label),
            color_attachments: &attachments,
            depth_stencil_attachment: None,
        });
        if let Some((first, _, light)) = draws.first() {
            pass.set_pipeline(*first);
            pass.set_bind_group(0, base);
            pass.set_bind_group(1, light.bind_group);
            pass.draw(0..light.vertices, 0..1);
        }
        drop(pass);

        if draws.len() > 1 {
            let label = format!("{}/Blend", self.name);
            let attachments = self.attachments(false);
            let mut pass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some(&label),
                color_attachments: &attachments,
                depth_stencil_attachment: None,
            });
            let mut bound = None;
            for (_, blend, light) in &draws[1..] {
                if bound != Some(*blend) {
                    pass.set_pipeline(*blend);
                    pass.set_bind_group(0, base);
                    bound = Some(*blend);
                }
                pass.set_bind_group(1, light.bind_group);
                pass.draw(0..light.vertices, 0..1);
            }
        }

        inner.state = LightPassState::CommandsRecorded;
        Ok(())
    }
}

impl Drop for LightPass {
    fn drop(&mut self) {
        let inner = self.inner.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(base) = inner.base.take() {
            if let Err(e) = self.device.destroy_bind_group(base) {
                log::warn!("[{}] failed to release {base:?}: {e}", self.name);
            }
        }
    }
}

impl fmt::Debug for LightPass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner();
        f.debug_struct("LightPass")
            .field("name", &self.name)
            .field("state", &inner.state)
            .field("pipelines", &inner.pipelines.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lighting_lane::textures::{DsTexture, GBufferResult, LightPassResult, LpTexture};
    use pollux_core::graph::FrameGraph;
    use pollux_core::math::Extent3D;
    use pollux_core::testing::{RecordedCommand, RecordingDevice};
    use pollux_data::scene::{CpuUpdater, LightCategory};
    use std::sync::Arc;

    struct Fixture {
        device: RecordingDevice,
        shared: Arc<dyn GraphicsDevice>,
        gbuffer: GBufferResult,
        result: LightPassResult,
        inputs: LightPassInputs,
    }

    fn fixture() -> Fixture {
        let device = RecordingDevice::new();
        let shared: Arc<dyn GraphicsDevice> = Arc::new(device.clone());
        let size = Extent3D::d2(8, 8);
        Fixture {
            gbuffer: GBufferResult::create(shared.clone(), "GBuffer", size).unwrap(),
            result: LightPassResult::create(shared.clone(), "Lighting", size).unwrap(),
            inputs: LightPassInputs {
                light_buffer: Arc::new(LightBuffer::new(shared.clone(), 4).unwrap()),
                shadow_maps: ShadowMapResult::create_all(&shared, 8).unwrap(),
                lighting_model: 1,
                gi_enabled: false,
            },
            device,
            shared,
        }
    }

    /// Compiles a one-pass graph and returns the light pass it built.
    fn build(fx: &Fixture) -> (pollux_core::graph::RunnableGraph, Arc<LightPass>) {
        let slot = Arc::new(Mutex::new(None));
        let mut graph = FrameGraph::new("Test");
        let inputs = fx.inputs.clone();
        let built = slot.clone();
        let pass = graph.create_pass("Lights", move |ctx| {
            let pass = Arc::new(LightPass::new(ctx, inputs.clone()));
            *built.lock().unwrap() = Some(pass.clone());
            Ok(pass as Arc<dyn RunnablePass>)
        });
        let depth = fx.gbuffer.import(&mut graph, DsTexture::Depth);
        graph.add_sampled_view(pass, depth);
        for role in [LpTexture::Diffuse, LpTexture::Specular] {
            let image = fx.result.import(&mut graph, role);
            graph.add_output_colour_view(pass, image);
        }
        let runnable = graph.compile(&fx.shared).unwrap();
        let pass = slot.lock().unwrap().take().unwrap();
        (runnable, pass)
    }

    fn light(fx: &Fixture, id: u64, category: LightCategory) -> Arc<Light> {
        let light = Arc::new(Light::new(LightId(id), format!("light{id}"), "s", category));
        fx.inputs.light_buffer.add_light(&light);
        light
    }

    #[test]
    fn walks_through_the_frame_cycle() {
        let fx = fixture();
        let (runnable, pass) = build(&fx);
        let sun = light(&fx, 1, LightCategory::Directional);
        fx.inputs.light_buffer.update(&CpuUpdater::default()).unwrap();
        let camera = Camera::default();

        assert_eq!(pass.state(), LightPassState::Uninitialised);
        assert!(matches!(
            pass.enable_light(&camera, &sun, SceneFlags::empty()),
            Err(RenderError::NotInitialized)
        ));

        pass.initialise().unwrap();
        assert_eq!(pass.state(), LightPassState::PipelinesCreated);
        pass.clear();
        assert_eq!(pass.state(), LightPassState::Cleared);
        assert!(pass.enable_light(&camera, &sun, SceneFlags::empty()).unwrap());
        assert_eq!(pass.state(), LightPassState::LightsEnabled);
        runnable.run().unwrap();
        assert_eq!(pass.state(), LightPassState::CommandsRecorded);
        pass.mark_rendered();
        assert_eq!(pass.state(), LightPassState::Rendered);
        pass.clear();
        assert!(pass.enabled_lights().is_empty());
        assert_eq!(pass.pipeline_count(), 1);
    }

    #[test]
    fn one_pipeline_per_configuration() {
        let fx = fixture();
        let (_runnable, pass) = build(&fx);
        pass.initialise().unwrap();
        let a = light(&fx, 1, LightCategory::Point { range: 1.0 });
        let b = light(&fx, 2, LightCategory::Point { range: 3.0 });
        let sun = light(&fx, 3, LightCategory::Directional);
        fx.inputs.light_buffer.update(&CpuUpdater::default()).unwrap();
        let camera = Camera::default();
        for l in [&a, &b, &sun] {
            pass.enable_light(&camera, l, SceneFlags::empty()).unwrap();
        }
        assert_eq!(pass.pipeline_count(), 2);
        assert_eq!(pass.enabled_lights(), vec![LightId(3), LightId(1), LightId(2)]);

        pass.enable_light(&camera, &a, SceneFlags::FOG).unwrap();
        assert_eq!(pass.pipeline_count(), 3);
    }

    #[test]
    fn first_light_clears_and_the_rest_blend() {
        let fx = fixture();
        let (runnable, pass) = build(&fx);
        pass.initialise().unwrap();
        let lights: Vec<_> = (1..=3)
            .map(|id| light(&fx, id, LightCategory::Directional))
            .collect();
        fx.inputs.light_buffer.update(&CpuUpdater::default()).unwrap();
        for l in &lights {
            pass.enable_light(&Camera::default(), l, SceneFlags::empty()).unwrap();
        }
        let commands = fx.device.commands(runnable.run().unwrap());

        let begins: Vec<_> = commands
            .iter()
            .filter_map(|c| match c {
                RecordedCommand::BeginRenderPass { label, .. } => label.clone(),
                _ => None,
            })
            .collect();
        assert_eq!(begins, ["Lights/First", "Lights/Blend"]);
        let pipelines = commands
            .iter()
            .filter(|c| matches!(c, RecordedCommand::SetPipeline(_)))
            .count();
        assert_eq!(pipelines, 2);
        let draws = commands
            .iter()
            .filter(|c| matches!(c, RecordedCommand::Draw { .. }))
            .count();
        assert_eq!(draws, 3);
    }

    #[test]
    fn empty_frame_still_clears_the_targets() {
        let fx = fixture();
        let (runnable, pass) = build(&fx);
        pass.initialise().unwrap();
        let commands = fx.device.commands(runnable.run().unwrap());
        assert_eq!(commands.len(), 2);
        assert!(matches!(
            &commands[0],
            RecordedCommand::BeginRenderPass { colour, .. } if colour.len() == 2
        ));
        assert_eq!(commands[1], RecordedCommand::EndRenderPass);
    }

    #[test]
    fn rejected_pipeline_is_reported() {
        let fx = fixture();
        let (_runnable, pass) = build(&fx);
        pass.initialise().unwrap();
        let sun = light(&fx, 1, LightCategory::Directional);
        fx.inputs.light_buffer.update(&CpuUpdater::default()).unwrap();
        fx.device.reject_pipelines(true);
        assert!(pass
            .enable_light(&Camera::default(), &sun, SceneFlags::empty())
            .is_err());
        assert_eq!(pass.pipeline_count(), 0);
    }
}
