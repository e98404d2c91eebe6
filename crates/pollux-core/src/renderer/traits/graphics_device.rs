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

use crate::renderer::api::{
    buffer::{BufferDescriptor, BufferId},
    command::CommandBufferId,
    pipeline::{BindGroupDescriptor, BindGroupId, RenderPipelineDescriptor, RenderPipelineId},
    texture::{SamplerDescriptor, SamplerId, TextureDescriptor, TextureId, TextureViewId},
};
use crate::renderer::error::ResourceError;
use crate::renderer::traits::CommandEncoder;
use std::fmt::Debug;

/// The opaque GPU API consumed by the lighting core.
///
/// Every creation call can fail with a [`ResourceError`]; callers propagate it
/// unchanged. Implementations must be shareable across threads since caches
/// initialise resources from whichever thread inserts them.
pub trait GraphicsDevice: Send + Sync + Debug + 'static {
    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError>;

    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError>;

    /// Writes `data` into a GPU buffer at byte `offset`.
    ///
    /// Fails with `ResourceError::OutOfBounds` when the write runs past the end.
    fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError>;

    fn create_texture(&self, descriptor: &TextureDescriptor) -> Result<TextureId, ResourceError>;

    fn destroy_texture(&self, id: TextureId) -> Result<(), ResourceError>;

    /// A view over every mip level and layer.
    fn create_texture_view(&self, texture: TextureId) -> Result<TextureViewId, ResourceError>;

    fn create_sampler(&self, descriptor: &SamplerDescriptor) -> Result<SamplerId, ResourceError>;

    fn destroy_sampler(&self, id: SamplerId) -> Result<(), ResourceError>;

    /// Creates a render pipeline.
    ///
    /// A refused description comes back as `ResourceError::Pipeline`.
    fn create_render_pipeline(
        &self,
        descriptor: &RenderPipelineDescriptor,
    ) -> Result<RenderPipelineId, ResourceError>;

    /// Fails with `PipelineError::Unknown` for ids it never issued.
    fn destroy_render_pipeline(&self, id: RenderPipelineId) -> Result<(), ResourceError>;

    fn create_bind_group(
        &self,
        descriptor: &BindGroupDescriptor,
    ) -> Result<BindGroupId, ResourceError>;

    fn destroy_bind_group(&self, id: BindGroupId) -> Result<(), ResourceError>;

    /// The label names the frame in GPU captures.
    fn create_command_encoder(&self, label: Option<&str>) -> Box<dyn CommandEncoder>;

    /// Queues a finished buffer. Submission order is execution order.
    fn submit_command_buffer(&self, command_buffer: CommandBufferId);
}
