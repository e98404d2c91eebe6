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

//! Texture samplers as cache elements.

use pollux_core::renderer::{GraphicsDevice, ResourceError, SamplerDescriptor, SamplerId};
use std::sync::{Mutex, PoisonError};

/// A named sampler whose GPU object is created on first use.
#[derive(Debug)]
pub struct Sampler {
    name: String,
    descriptor: SamplerDescriptor<'static>,
    gpu: Mutex<Option<SamplerId>>,
}

impl Sampler {
    /// Creates a sampler description; no GPU object exists yet.
    pub fn new(name: impl Into<String>, descriptor: SamplerDescriptor<'static>) -> Self {
        Self {
            name: name.into(),
            descriptor,
            gpu: Mutex::new(None),
        }
    }

    /// The sampler name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The sampler description.
    pub fn descriptor(&self) -> &SamplerDescriptor<'static> {
        &self.descriptor
    }

    /// Creates the GPU sampler if needed and returns it.
    pub fn initialise(&self, device: &dyn GraphicsDevice) -> Result<SamplerId, ResourceError> {
        let mut gpu = self.gpu.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(id) = *gpu {
            return Ok(id);
        }
        let id = device.create_sampler(&self.descriptor)?;
        log::debug!("Sampler '{}' initialised as {:?}", self.name, id);
        *gpu = Some(id);
        Ok(id)
    }

    /// The GPU sampler, if initialised.
    pub fn id(&self) -> Option<SamplerId> {
        *self.gpu.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Releases the GPU sampler. Failures are logged.
    pub fn cleanup(&self, device: &dyn GraphicsDevice) {
        let taken = self
            .gpu
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(id) = taken {
            if let Err(e) = device.destroy_sampler(id) {
                log::error!("Failed to release sampler '{}': {e}", self.name);
            }
        }
    }
}
