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


//! Render pass attachments and recorded command buffers.

use crate::math::LinearRgba;
use crate::renderer::TextureViewId;

/// A finished command buffer waiting for
/// [`GraphicsDevice::submit_command_buffer`](crate::renderer::GraphicsDevice::submit_command_buffer).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct CommandBufferId(pub u64);

/// Start-of-pass behaviour of an attachment.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LoadOp<V> {
    /// Keep what earlier passes wrote.
    Load,
    Clear(V),
}

/// End-of-pass behaviour of an attachment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreOp {
    Store,
    Discard,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Operations<V> {
    pub load: LoadOp<V>,
    pub store: StoreOp,
}

impl<V> Operations<V> {
    /// Clears to `value` and keeps the result.
    pub fn clear(value: V) -> Self {
        Self {
            load: LoadOp::Clear(value),
            store: StoreOp::Store,
        }
    }

    /// Accumulates on top of the existing contents.
    pub fn accumulate() -> Self {
        Self {
            load: LoadOp::Load,
            store: StoreOp::Store,
        }
    }
}

/// What an image holds before the first pass that writes it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ClearValue {
    Colour(LinearRgba),
    DepthStencil { depth: f32, stencil: u32 },
}

impl ClearValue {
    /// Transparent black, the neutral value for accumulated light.
    pub const TRANSPARENT: Self = ClearValue::Colour(LinearRgba::TRANSPARENT);

    /// The colour, for colour clears.
    pub fn colour(&self) -> Option<LinearRgba> {
        match self {
            ClearValue::Colour(c) => Some(*c),
            ClearValue::DepthStencil { .. } => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderPassColorAttachment {
    pub view: TextureViewId,
    pub ops: Operations<LinearRgba>,
}

/// A depth/stencil target. An aspect with `None` operations is left untouched.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderPassDepthStencilAttachment {
    pub view: TextureViewId,
    pub depth_ops: Option<Operations<f32>>,
    pub stencil_ops: Option<Operations<u32>>,
}

/// Targets of one render pass.
#[derive(Debug, Default)]
pub struct RenderPassDescriptor<'a> {
    /// Shown in GPU captures and in recorded commands.
    pub label: Option<&'a str>,
    pub color_attachments: &'a [RenderPassColorAttachment],
    pub depth_stencil_attachment: Option<RenderPassDepthStencilAttachment>,
}
