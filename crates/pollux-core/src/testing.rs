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

//! An in-memory [`GraphicsDevice`] that records every call.
//!
//! Ids are allocated sequentially, buffer contents are kept in memory and
//! buffer-to-buffer copies are applied when a command buffer is submitted, so
//! tests can assert on what actually reached "GPU" memory.

use crate::renderer::{
    BindGroupDescriptor, BindGroupId, BufferDescriptor, BufferId, CommandBufferId,
    CommandEncoder, GraphicsDevice, PipelineError, RenderPass, RenderPassDescriptor,
    RenderPipelineDescriptor, RenderPipelineId, ResourceError, SamplerDescriptor, SamplerId,
    TextureDescriptor, TextureFormat, TextureId, TextureViewId,
};
use std::collections::HashMap;
use std::ops::Range;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// One command captured by a [`RecordingDevice`] encoder.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCommand {
    /// A render pass started.
    BeginRenderPass {
        /// The pass label.
        label: Option<String>,
        /// Colour attachment views.
        colour: Vec<TextureViewId>,
        /// Depth attachment view.
        depth: Option<TextureViewId>,
    },
    /// A pipeline was bound.
    SetPipeline(RenderPipelineId),
    /// A bind group was bound at an index.
    SetBindGroup(u32, BindGroupId),
    /// A vertex buffer was bound.
    SetVertexBuffer(u32, BufferId, u64),
    /// A draw call.
    Draw {
        /// Vertex range.
        vertices: Range<u32>,
        /// Instance range.
        instances: Range<u32>,
    },
    /// The active render pass ended.
    EndRenderPass,
    /// A buffer copy.
    CopyBufferToBuffer {
        /// Source buffer.
        source: BufferId,
        /// Byte offset in the source.
        source_offset: u64,
        /// Destination buffer.
        destination: BufferId,
        /// Byte offset in the destination.
        destination_offset: u64,
        /// Bytes copied.
        size: u64,
    },
}

#[derive(Debug, Default)]
struct DeviceState {
    next_id: usize,
    next_command_buffer: u64,
    buffers: HashMap<BufferId, Vec<u8>>,
    buffer_labels: HashMap<BufferId, String>,
    writes: Vec<(BufferId, u64, usize)>,
    textures: HashMap<TextureId, (String, TextureFormat)>,
    views: HashMap<TextureViewId, TextureId>,
    samplers: HashMap<SamplerId, String>,
    pipelines: HashMap<RenderPipelineId, String>,
    bind_groups: HashMap<BindGroupId, BindGroupDescriptor<'static>>,
    recorded: HashMap<u64, Vec<RecordedCommand>>,
    submitted: Vec<CommandBufferId>,
    reject_pipelines: bool,
    memory_limit: Option<u64>,
}

impl DeviceState {
    fn allocate(&mut self) -> usize {
        self.next_id += 1;
        self.next_id
    }
}

/// A [`GraphicsDevice`] for tests. Cloning shares the same state.
#[derive(Debug, Clone, Default)]
pub struct RecordingDevice {
    state: Arc<Mutex<DeviceState>>,
}

impl RecordingDevice {
    /// Creates an empty device.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent pipeline creation fail.
    pub fn reject_pipelines(&self, reject: bool) {
        self.state().reject_pipelines = reject;
    }

    /// Makes buffer creations larger than `bytes` fail with `OutOfMemory`.
    pub fn set_memory_limit(&self, bytes: Option<u64>) {
        self.state().memory_limit = bytes;
    }

    fn state(&self) -> MutexGuard<'_, DeviceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current contents of a buffer.
    pub fn buffer_contents(&self, id: BufferId) -> Option<Vec<u8>> {
        self.state().buffers.get(&id).cloned()
    }

    /// Finds a live buffer by label.
    pub fn buffer_by_label(&self, label: &str) -> Option<BufferId> {
        self.state()
            .buffer_labels
            .iter()
            .find(|(_, l)| l.as_str() == label)
            .map(|(id, _)| *id)
    }

    /// Every `write_buffer` call as `(buffer, offset, len)`, in call order.
    pub fn writes(&self) -> Vec<(BufferId, u64, usize)> {
        self.state().writes.clone()
    }

    /// Forgets recorded writes.
    pub fn clear_writes(&self) {
        self.state().writes.clear();
    }

    /// Number of live buffers.
    pub fn buffer_count(&self) -> usize {
        self.state().buffers.len()
    }

    /// Number of live textures.
    pub fn texture_count(&self) -> usize {
        self.state().textures.len()
    }

    /// Format of the texture behind a view.
    pub fn view_format(&self, view: TextureViewId) -> Option<TextureFormat> {
        let state = self.state();
        let texture = state.views.get(&view)?;
        state.textures.get(texture).map(|(_, f)| *f)
    }

    /// Label of the texture behind a view.
    pub fn view_label(&self, view: TextureViewId) -> Option<String> {
        let state = self.state();
        let texture = state.views.get(&view)?;
        state.textures.get(texture).map(|(l, _)| l.clone())
    }

    /// Number of live samplers.
    pub fn sampler_count(&self) -> usize {
        self.state().samplers.len()
    }

    /// Labels of live pipelines, sorted.
    pub fn pipeline_labels(&self) -> Vec<String> {
        let mut labels: Vec<_> = self.state().pipelines.values().cloned().collect();
        labels.sort();
        labels
    }

    /// Number of live bind groups.
    pub fn bind_group_count(&self) -> usize {
        self.state().bind_groups.len()
    }

    /// A live bind group.
    pub fn bind_group(&self, id: BindGroupId) -> Option<BindGroupDescriptor<'static>> {
        self.state().bind_groups.get(&id).cloned()
    }

    /// Commands recorded into a finished command buffer.
    pub fn commands(&self, command_buffer: CommandBufferId) -> Vec<RecordedCommand> {
        self.state()
            .recorded
            .get(&command_buffer.0)
            .cloned()
            .unwrap_or_default()
    }

    /// Submitted command buffers, in submission order.
    pub fn submitted(&self) -> Vec<CommandBufferId> {
        self.state().submitted.clone()
    }
}

impl GraphicsDevice for RecordingDevice {
    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError> {
        let mut state = self.state();
        if state.memory_limit.is_some_and(|limit| descriptor.size > limit) {
            return Err(ResourceError::OutOfMemory {
                requested: descriptor.size,
            });
        }
        let id = BufferId(state.allocate());
        state.buffers.insert(id, vec![0; descriptor.size as usize]);
        state.buffer_labels.insert(
            id,
            descriptor.label.as_deref().unwrap_or_default().to_string(),
        );
        Ok(id)
    }

    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError> {
        let mut state = self.state();
        state.buffer_labels.remove(&id);
        state
            .buffers
            .remove(&id)
            .map(|_| ())
            .ok_or(ResourceError::InvalidHandle)
    }

    fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError> {
        let mut state = self.state();
        let buffer = state
            .buffers
            .get_mut(&id)
            .ok_or(ResourceError::InvalidHandle)?;
        let start = offset as usize;
        let end = start + data.len();
        if end > buffer.len() {
            return Err(ResourceError::OutOfBounds {
                offset,
                len: data.len() as u64,
                capacity: buffer.len() as u64,
            });
        }
        buffer[start..end].copy_from_slice(data);
        state.writes.push((id, offset, data.len()));
        Ok(())
    }

    fn create_texture(&self, descriptor: &TextureDescriptor) -> Result<TextureId, ResourceError> {
        let mut state = self.state();
        let id = TextureId(state.allocate());
        let label = descriptor.label.as_deref().unwrap_or_default().to_string();
        state.textures.insert(id, (label, descriptor.format));
        Ok(id)
    }

    fn destroy_texture(&self, id: TextureId) -> Result<(), ResourceError> {
        let mut state = self.state();
        state.views.retain(|_, texture| *texture != id);
        state
            .textures
            .remove(&id)
            .map(|_| ())
            .ok_or(ResourceError::InvalidHandle)
    }

    fn create_texture_view(&self, texture: TextureId) -> Result<TextureViewId, ResourceError> {
        let mut state = self.state();
        if !state.textures.contains_key(&texture) {
            return Err(ResourceError::InvalidHandle);
        }
        let id = TextureViewId(state.allocate());
        state.views.insert(id, texture);
        Ok(id)
    }

    fn create_sampler(&self, descriptor: &SamplerDescriptor) -> Result<SamplerId, ResourceError> {
        let mut state = self.state();
        let id = SamplerId(state.allocate());
        let label = descriptor.label.as_deref().unwrap_or_default().to_string();
        state.samplers.insert(id, label);
        Ok(id)
    }

    fn destroy_sampler(&self, id: SamplerId) -> Result<(), ResourceError> {
        self.state()
            .samplers
            .remove(&id)
            .map(|_| ())
            .ok_or(ResourceError::InvalidHandle)
    }

    fn create_render_pipeline(
        &self,
        descriptor: &RenderPipelineDescriptor,
    ) -> Result<RenderPipelineId, ResourceError> {
        let mut state = self.state();
        let label = descriptor
            .label
            .as_deref()
            .unwrap_or(descriptor.program.as_ref())
            .to_string();
        if state.reject_pipelines {
            return Err(PipelineError::Rejected {
                label,
                reason: "rejected by recording device".to_string(),
            }
            .into());
        }
        let id = RenderPipelineId(state.allocate());
        state.pipelines.insert(id, label);
        Ok(id)
    }

    fn destroy_render_pipeline(&self, id: RenderPipelineId) -> Result<(), ResourceError> {
        self.state()
            .pipelines
            .remove(&id)
            .map(|_| ())
            .ok_or(PipelineError::Unknown(id).into())
    }

    fn create_bind_group(
        &self,
        descriptor: &BindGroupDescriptor,
    ) -> Result<BindGroupId, ResourceError> {
        let mut state = self.state();
        let id = BindGroupId(state.allocate());
        let owned = BindGroupDescriptor {
            label: descriptor
                .label
                .as_ref()
                .map(|l| std::borrow::Cow::Owned(l.to_string())),
            entries: descriptor.entries.clone(),
        };
        state.bind_groups.insert(id, owned);
        Ok(id)
    }

    fn destroy_bind_group(&self, id: BindGroupId) -> Result<(), ResourceError> {
        self.state()
            .bind_groups
            .remove(&id)
            .map(|_| ())
            .ok_or(ResourceError::InvalidHandle)
    }

    fn create_command_encoder(&self, _label: Option<&str>) -> Box<dyn CommandEncoder> {
        Box::new(RecordingEncoder {
            state: self.state.clone(),
            commands: Vec::new(),
        })
    }

    fn submit_command_buffer(&self, command_buffer: CommandBufferId) {
        let mut state = self.state();
        let commands = state
            .recorded
            .get(&command_buffer.0)
            .cloned()
            .unwrap_or_default();
        for command in commands {
            if let RecordedCommand::CopyBufferToBuffer {
                source,
                source_offset,
                destination,
                destination_offset,
                size,
            } = command
            {
                let bytes = state.buffers.get(&source).map(|b| {
                    b[source_offset as usize..(source_offset + size) as usize].to_vec()
                });
                if let (Some(bytes), Some(dst)) = (bytes, state.buffers.get_mut(&destination)) {
                    let start = destination_offset as usize;
                    dst[start..start + bytes.len()].copy_from_slice(&bytes);
                }
            }
        }
        state.submitted.push(command_buffer);
    }
}

struct RecordingEncoder {
    state: Arc<Mutex<DeviceState>>,
    commands: Vec<RecordedCommand>,
}

struct RecordingPass<'a> {
    commands: &'a mut Vec<RecordedCommand>,
}

impl RenderPass for RecordingPass<'_> {
    fn set_pipeline(&mut self, pipeline: RenderPipelineId) {
        self.commands.push(RecordedCommand::SetPipeline(pipeline));
    }

    fn set_bind_group(&mut self, index: u32, bind_group: BindGroupId) {
        self.commands
            .push(RecordedCommand::SetBindGroup(index, bind_group));
    }

    fn set_vertex_buffer(&mut self, slot: u32, buffer: BufferId, offset: u64) {
        self.commands
            .push(RecordedCommand::SetVertexBuffer(slot, buffer, offset));
    }

    fn draw(&mut self, vertices: Range<u32>, instances: Range<u32>) {
        self.commands
            .push(RecordedCommand::Draw { vertices, instances });
    }
}

impl Drop for RecordingPass<'_> {
    fn drop(&mut self) {
        self.commands.push(RecordedCommand::EndRenderPass);
    }
}

impl CommandEncoder for RecordingEncoder {
    fn begin_render_pass<'encoder>(
        &'encoder mut self,
        descriptor: &RenderPassDescriptor<'_>,
    ) -> Box<dyn RenderPass + 'encoder> {
        self.commands.push(RecordedCommand::BeginRenderPass {
            label: descriptor.label.map(str::to_string),
            colour: descriptor
                .color_attachments
                .iter()
                .map(|a| a.view)
                .collect(),
            depth: descriptor.depth_stencil_attachment.map(|d| d.view),
        });
        Box::new(RecordingPass {
            commands: &mut self.commands,
        })
    }

    fn copy_buffer_to_buffer(
        &mut self,
        source: BufferId,
        source_offset: u64,
        destination: BufferId,
        destination_offset: u64,
        size: u64,
    ) {
        self.commands.push(RecordedCommand::CopyBufferToBuffer {
            source,
            source_offset,
            destination,
            destination_offset,
            size,
        });
    }

    fn finish(self: Box<Self>) -> CommandBufferId {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.next_command_buffer += 1;
        let id = state.next_command_buffer;
        state.recorded.insert(id, self.commands);
        CommandBufferId(id)
    }
}
