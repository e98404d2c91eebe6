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

//! The executable form of a compiled [`FrameGraph`](super::FrameGraph).

use super::frame_graph::{ImageId, ResolvedImage, TransientImages};
use crate::renderer::{
    CommandBufferId, CommandEncoder, GraphicsDevice, RenderError, TextureViewId,
};
use std::fmt;
use std::sync::Arc;

/// A pass instantiated by a compiled graph.
///
/// Methods take `&self`: passes keep per-frame state behind their own locks so
/// the declaring subsystem can keep a handle and feed them between frames.
pub trait RunnablePass: Send + Sync {
    /// The pass name, for logging.
    fn name(&self) -> &str;

    /// Disabled passes are skipped when recording.
    fn is_enabled(&self) -> bool {
        true
    }

    /// Records the pass commands.
    fn record(&self, encoder: &mut dyn CommandEncoder) -> Result<(), RenderError>;
}

/// Passes in execution order, with the images they were compiled against.
pub struct RunnableGraph {
    name: String,
    device: Arc<dyn GraphicsDevice>,
    passes: Vec<Arc<dyn RunnablePass>>,
    images: Vec<ResolvedImage>,
    _transient: TransientImages,
}

impl RunnableGraph {
    pub(crate) fn new(
        name: String,
        device: Arc<dyn GraphicsDevice>,
        passes: Vec<Arc<dyn RunnablePass>>,
        images: Vec<ResolvedImage>,
        transient: TransientImages,
    ) -> Self {
        Self {
            name,
            device,
            passes,
            images,
            _transient: transient,
        }
    }

    /// Pass names in execution order.
    pub fn pass_order(&self) -> Vec<&str> {
        self.passes.iter().map(|p| p.name()).collect()
    }

    /// The number of passes.
    pub fn len(&self) -> usize {
        self.passes.len()
    }

    /// Returns `true` if the graph holds no pass.
    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    /// The view an image was resolved to.
    pub fn image_view(&self, image: ImageId) -> Option<TextureViewId> {
        self.images.get(image.0).map(|i| i.view)
    }

    /// Records every enabled pass into `encoder`, in execution order.
    pub fn record(&self, encoder: &mut dyn CommandEncoder) -> Result<(), RenderError> {
        for pass in self.passes.iter().filter(|p| p.is_enabled()) {
            log::trace!("[{}] recording '{}'", self.name, pass.name());
            pass.record(encoder)?;
        }
        Ok(())
    }

    /// Records the whole graph into a fresh command buffer and submits it.
    pub fn run(&self) -> Result<CommandBufferId, RenderError> {
        let mut encoder = self.device.create_command_encoder(Some(&self.name));
        self.record(encoder.as_mut())?;
        let command_buffer = encoder.finish();
        self.device.submit_command_buffer(command_buffer);
        Ok(command_buffer)
    }
}

impl fmt::Debug for RunnableGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunnableGraph")
            .field("name", &self.name)
            .field("passes", &self.pass_order())
            .finish()
    }
}
