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

use crate::renderer::api::command::{CommandBufferId, RenderPassDescriptor};
use crate::renderer::{BindGroupId, BufferId, RenderPipelineId};
use std::ops::Range;

/// An open render pass. It borrows its [`CommandEncoder`] and ends when dropped.
pub trait RenderPass {
    fn set_pipeline(&mut self, pipeline: RenderPipelineId);

    fn set_bind_group(&mut self, index: u32, bind_group: BindGroupId);

    fn set_vertex_buffer(&mut self, slot: u32, buffer: BufferId, offset: u64);

    /// Fullscreen and volume passes draw generated vertices, so draws are never indexed.
    fn draw(&mut self, vertices: Range<u32>, instances: Range<u32>);
}

/// Records one frame's worth of GPU work into a [`CommandBufferId`].
pub trait CommandEncoder {
    /// Opens a pass. The borrow keeps a second pass from opening before this one drops.
    fn begin_render_pass<'encoder>(
        &'encoder mut self,
        descriptor: &RenderPassDescriptor<'_>,
    ) -> Box<dyn RenderPass + 'encoder>;

    /// Queues a GPU-side copy, used to move staged light records into place.
    fn copy_buffer_to_buffer(
        &mut self,
        source: BufferId,
        source_offset: u64,
        destination: BufferId,
        destination_offset: u64,
        size: u64,
    );

    /// Closes the encoder.
    fn finish(self: Box<Self>) -> CommandBufferId;
}
