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

//! Frame orchestration of the light pass: declaration, visibility and the
//! lights requested before the graph is compiled.

use super::light_pass::{LightPass, LightPassInputs};
use super::textures::{DsTexture, GBufferResult, LightPassResult, LpTexture, TextureRole};
use pollux_core::graph::{FrameGraph, PassId, RunnablePass};
use pollux_core::renderer::RenderError;
use pollux_data::scene::{Camera, CpuUpdater, Light, LightId, LightType, Scene, SceneFlags};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// The images and buffers the lighting pass works with.
#[derive(Debug, Clone)]
pub struct LightingInputs {
    /// The geometry buffer sampled by every light.
    pub gbuffer: Arc<GBufferResult>,
    /// The lighting targets.
    pub result: Arc<LightPassResult>,
    /// What the light pass draws with.
    pub light_pass: LightPassInputs,
}

/// Geometry buffer images sampled by the light pass, in binding order.
pub const SAMPLED_GBUFFER: [DsTexture; 6] = [
    DsTexture::Depth,
    DsTexture::Data1,
    DsTexture::Data2,
    DsTexture::Data3,
    DsTexture::Data4,
    DsTexture::Data5,
];

#[derive(Clone)]
struct PendingLight {
    light: Arc<Light>,
    camera: Camera,
    flags: SceneFlags,
}

#[derive(Default)]
struct Shared {
    runnable: Mutex<Option<Arc<LightPass>>>,
    pending: Mutex<BTreeMap<LightId, PendingLight>>,
}

impl Shared {
    fn runnable(&self) -> Option<Arc<LightPass>> {
        self.runnable
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn pending(&self) -> MutexGuard<'_, BTreeMap<LightId, PendingLight>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replays the requests made before `pass` existed.
    fn flush(&self, pass: &LightPass) -> Result<(), RenderError> {
        let pending = std::mem::take(&mut *self.pending());
        if !pending.is_empty() {
            log::debug!("Replaying {} pending light(s)", pending.len());
        }
        for request in pending.values() {
            pass.enable_light(&request.camera, &request.light, request.flags)?;
        }
        Ok(())
    }
}

/// Declares the light pass in a frame graph and feeds it every frame.
///
/// The [`LightPass`] only exists once the graph is compiled. Lights enabled
/// before that are kept and replayed when the pass is built.
pub struct LightingPass {
    pass: PassId,
    shared: Arc<Shared>,
}

impl LightingPass {
    /// Declares the pass in `graph`, after `previous` if given.
    pub fn declare(
        graph: &mut FrameGraph,
        previous: Option<PassId>,
        inputs: LightingInputs,
    ) -> Self {
        let shared = Arc::new(Shared::default());
        let factory_shared = shared.clone();
        let light_pass = inputs.light_pass.clone();
        let pass = graph.create_pass("LightPass", move |ctx| {
            let pass = Arc::new(LightPass::new(ctx, light_pass.clone()));
            pass.initialise()?;
            *factory_shared
                .runnable
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = Some(pass.clone());
            factory_shared.flush(&pass)?;
            Ok(pass as Arc<dyn RunnablePass>)
        });
        for role in SAMPLED_GBUFFER {
            let image = inputs.gbuffer.import(graph, role);
            graph.add_sampled_view(pass, image);
        }
        for role in LpTexture::ALL {
            let image = inputs.result.import(graph, *role);
            graph.add_output_colour_view(pass, image);
        }
        if let Some(previous) = previous {
            graph.add_dependency(pass, previous);
        }
        Self { pass, shared }
    }

    /// The declared pass.
    pub fn pass_id(&self) -> PassId {
        self.pass
    }

    /// The light pass built by the last compile, if any.
    pub fn light_pass(&self) -> Option<Arc<LightPass>> {
        self.shared.runnable()
    }

    /// The number of lights waiting for the pass to be built.
    pub fn pending_count(&self) -> usize {
        self.shared.pending().len()
    }

    /// Enables `light` for the current frame.
    ///
    /// Before the graph is compiled the request is kept and `Ok(false)` is
    /// returned.
    pub fn enable_light(
        &self,
        camera: &Camera,
        light: &Arc<Light>,
        flags: SceneFlags,
    ) -> Result<bool, RenderError> {
        let Some(pass) = self.shared.runnable() else {
            self.shared.pending().insert(
                light.id(),
                PendingLight {
                    light: light.clone(),
                    camera: *camera,
                    flags,
                },
            );
            return Ok(false);
        };
        self.shared.flush(&pass)?;
        pass.enable_light(camera, light, flags)
    }

    /// Disables `light` for the current frame.
    pub fn disable_light(&self, id: LightId) -> bool {
        match self.shared.runnable() {
            Some(pass) => pass.disable_light(id),
            None => self.shared.pending().remove(&id).is_some(),
        }
    }

    /// Re-evaluates every light of `scene` against the camera.
    ///
    /// Returns the number of visible lights.
    pub fn update(&self, updater: &CpuUpdater, scene: &Scene) -> Result<usize, RenderError> {
        match self.shared.runnable() {
            Some(pass) => pass.clear(),
            None => self.shared.pending().clear(),
        }
        let flags = scene.scene_flags();
        let camera = &updater.camera;
        let mut visible = 0;
        for light_type in LightType::ALL {
            for light in scene.lights().lights_of(light_type) {
                if camera.is_visible(&light) {
                    self.enable_light(camera, &light, flags)?;
                    visible += 1;
                } else {
                    self.disable_light(light.id());
                }
            }
        }
        log::trace!("Frame {}: {visible} visible light(s)", updater.frame_index);
        Ok(visible)
    }

    /// Marks the light pass commands as submitted.
    pub fn mark_rendered(&self) {
        if let Some(pass) = self.shared.runnable() {
            pass.mark_rendered();
        }
    }
}

impl fmt::Debug for LightingPass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LightingPass")
            .field("pass", &self.pass)
            .field("compiled", &self.shared.runnable().is_some())
            .field("pending", &self.pending_count())
            .finish()
    }
}
