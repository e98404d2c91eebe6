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

//! The engine context shared by every scene.

use crate::cache::Cache;
use crate::light_buffer::LightBuffer;
use crate::scene::{Sampler, Scene};
use pollux_core::renderer::{GraphicsDevice, ResourceError, SamplerDescriptor};
use pollux_core::RenderSettings;
use std::fmt;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;

/// The engine-wide sampler cache, keyed by sampler name.
pub type SamplerCache = Cache<Sampler, SamplerDescriptor<'static>>;

/// Engine-wide state: the device, the settings and the shared caches.
///
/// The engine is handed to scenes explicitly; there is no global instance.
pub struct Engine {
    device: Arc<dyn GraphicsDevice>,
    settings: RenderSettings,
    samplers: Arc<SamplerCache>,
    light_ids: Arc<AtomicU64>,
}

impl Engine {
    /// Creates an engine over `device`.
    pub fn new(device: Arc<dyn GraphicsDevice>, settings: RenderSettings) -> Arc<Self> {
        let initialising = device.clone();
        let cleaning = device.clone();
        let samplers: SamplerCache = Cache::new(
            "SamplerCache",
            |name: &String, descriptor: SamplerDescriptor<'static>| {
                Arc::new(Sampler::new(name.clone(), descriptor))
            },
        )
        .with_initialiser(move |name, sampler| {
            if let Err(e) = sampler.initialise(initialising.as_ref()) {
                log::error!("SamplerCache: failed to create '{name}': {e}");
            }
        })
        .with_cleaner(move |_, sampler| sampler.cleanup(cleaning.as_ref()));
        log::info!(
            "Engine created ({} light(s) per type, GI {})",
            settings.max_lights_per_type,
            if settings.gi_enabled { "on" } else { "off" }
        );
        Arc::new(Self {
            device,
            settings,
            samplers: Arc::new(samplers),
            light_ids: Arc::new(AtomicU64::new(0)),
        })
    }

    /// The graphics device.
    pub fn device(&self) -> &Arc<dyn GraphicsDevice> {
        &self.device
    }

    /// The render settings.
    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    /// The engine-wide sampler cache.
    pub fn samplers(&self) -> &Arc<SamplerCache> {
        &self.samplers
    }

    pub(crate) fn light_ids(&self) -> &Arc<AtomicU64> {
        &self.light_ids
    }

    /// Allocates a light buffer sized by the settings.
    pub fn create_light_buffer(&self) -> Result<LightBuffer, ResourceError> {
        LightBuffer::new(self.device.clone(), self.settings.max_lights_per_type)
    }

    /// Creates an empty scene.
    ///
    /// # Errors
    ///
    /// Fails if the scene's light buffer can't be allocated.
    pub fn create_scene(self: &Arc<Self>, name: impl Into<String>) -> Result<Scene, ResourceError> {
        Scene::new(name, self.clone())
    }

    /// Releases the GPU objects of the engine-wide caches.
    pub fn cleanup(&self) {
        self.samplers.cleanup();
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("device", &self.device)
            .field("settings", &self.settings)
            .finish()
    }
}
