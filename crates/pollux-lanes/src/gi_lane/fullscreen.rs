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

//! A generic pass drawing a fixed number of vertices over its targets.
//!
//! Every GI stage is one of these: the program does the work, the pass only
//! binds the sampled images and buffers and issues a single draw.

use pollux_core::graph::{PassContext, RunnablePass};
use pollux_core::math::LinearRgba;
use pollux_core::renderer::{
    BindGroupDescriptor, BindGroupEntry, BindGroupId, BindingResource, BlendMode, BufferId,
    ColorTargetState, CommandEncoder, GraphicsDevice, Operations, RenderError,
    RenderPassColorAttachment, RenderPassDescriptor, RenderPipelineDescriptor, RenderPipelineId,
};
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

/// What a [`FullscreenPass`] draws.
#[derive(Debug, Clone)]
pub struct FullscreenPassDesc {
    /// The shader program.
    pub program: String,
    /// How the output is combined with the targets.
    pub blend: BlendMode,
    /// Per colour output, whether it is cleared first. Missing entries load.
    pub cleared: Vec<bool>,
    /// Vertices per instance. Zero records the pass without drawing.
    pub vertices: u32,
    /// Instances drawn, one per volume slice for 3D targets.
    pub instances: u32,
    /// Buffers bound before the sampled images.
    pub buffers: Vec<BufferId>,
}

impl FullscreenPassDesc {
    /// A single fullscreen triangle.
    pub fn triangle(program: impl Into<String>, blend: BlendMode) -> Self {
        Self {
            program: program.into(),
            blend,
            cleared: Vec::new(),
            vertices: 3,
            instances: 1,
            buffers: Vec::new(),
        }
    }

    /// Clears every output before drawing.
    pub fn clearing(mut self, outputs: usize) -> Self {
        self.cleared = vec![true; outputs];
        self
    }

    /// Draws one instance per slice.
    pub fn instanced(mut self, instances: u32) -> Self {
        self.instances = instances;
        self
    }

    /// Binds `buffer` after the buffers already bound.
    pub fn with_buffer(mut self, buffer: BufferId) -> Self {
        self.buffers.push(buffer);
        self
    }
}

/// The runnable form of a [`FullscreenPassDesc`].
pub struct FullscreenPass {
    device: Arc<dyn GraphicsDevice>,
    name: String,
    pipeline: Option<RenderPipelineId>,
    bind_group: Option<BindGroupId>,
    targets: Vec<RenderPassColorAttachment>,
    vertices: u32,
    instances: u32,
}

impl FullscreenPass {
    /// Creates the pipeline and bind group for the images resolved in `ctx`.
    pub fn new(ctx: &PassContext<'_>, desc: &FullscreenPassDesc) -> Result<Self, RenderError> {
        let device = ctx.device.clone();
        let entries: Vec<BindGroupEntry> = desc
            .buffers
            .iter()
            .map(|&buffer| BindingResource::Buffer {
                buffer,
                offset: 0,
                size: None,
            })
            .chain(
                ctx.sampled
                    .iter()
                    .map(|image| BindingResource::TextureView(image.view)),
            )
            .zip(0..)
            .map(|(resource, binding)| BindGroupEntry { binding, resource })
            .collect();
        let bind_group = if entries.is_empty() {
            None
        } else {
            Some(device.create_bind_group(&BindGroupDescriptor {
                label: Some(Cow::Borrowed(ctx.name)),
                entries,
            })?)
        };
        let pipeline = if desc.vertices == 0 {
            None
        } else {
            Some(device.create_render_pipeline(&RenderPipelineDescriptor {
                label: Some(Cow::Borrowed(ctx.name)),
                program: Cow::Borrowed(desc.program.as_str()),
                color_targets: ctx
                    .colour_outputs
                    .iter()
                    .map(|image| ColorTargetState {
                        format: image.desc.format,
                        blend: desc.blend,
                    })
                    .collect(),
                depth_stencil_format: None,
            })?)
        };
        let targets = ctx
            .colour_outputs
            .iter()
            .enumerate()
            .map(|(index, image)| RenderPassColorAttachment {
                view: image.view,
                ops: if desc.cleared.get(index).copied().unwrap_or(false) {
                    Operations::clear(
                        image
                            .desc
                            .clear_value
                            .colour()
                            .unwrap_or(LinearRgba::TRANSPARENT),
                    )
                } else {
                    Operations::accumulate()
                },
            })
            .collect();
        Ok(Self {
            device,
            name: ctx.name.to_string(),
            pipeline,
            bind_group,
            targets,
            vertices: desc.vertices,
            instances: desc.instances,
        })
    }

    /// A frame-graph factory building this pass from `desc`.
    pub fn factory(
        desc: FullscreenPassDesc,
    ) -> impl Fn(&PassContext<'_>) -> Result<Arc<dyn RunnablePass>, RenderError> + Send + Sync + 'static
    {
        move |ctx| Ok(Arc::new(FullscreenPass::new(ctx, &desc)?) as Arc<dyn RunnablePass>)
    }

    /// The number of colour targets.
    pub fn target_count(&self) -> usize {
        self.targets.len()
    }
}

impl RunnablePass for FullscreenPass {
    fn name(&self) -> &str {
        &self.name
    }

    fn record(&self, encoder: &mut dyn CommandEncoder) -> Result<(), RenderError> {
        let mut pass = encoder.begin_render_pass(&RenderPassDescriptor {
            label: Some(&self.name),
            color_attachments: &self.targets,
            depth_stencil_attachment: None,
        });
        if let Some(pipeline) = self.pipeline {
            pass.set_pipeline(pipeline);
            if let Some(bind_group) = self.bind_group {
                pass.set_bind_group(0, bind_group);
            }
            pass.draw(0..self.vertices, 0..self.instances);
        }
        Ok(())
    }
}

impl Drop for FullscreenPass {
    fn drop(&mut self) {
        if let Some(pipeline) = self.pipeline.take() {
            if let Err(e) = self.device.destroy_render_pipeline(pipeline) {
                log::warn!("Failed to release pipeline of '{}': {e}", self.name);
            }
        }
    }
}

impl fmt::Debug for FullscreenPass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FullscreenPass")
            .field("name", &self.name)
            .field("targets", &self.targets.len())
            .field("vertices", &self.vertices)
            .field("instances", &self.instances)
            .finish()
    }
}
