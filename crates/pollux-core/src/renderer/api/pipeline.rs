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

//! Pipeline and binding descriptors.
//!
//! Shader source is produced outside this crate; a pipeline only names the
//! program it runs and the fixed-function state around it.

use crate::renderer::{BufferId, SamplerId, TextureFormat, TextureViewId};
use std::borrow::Cow;

/// An opaque handle to a compiled render pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RenderPipelineId(pub usize);

/// An opaque handle to a bind group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindGroupId(pub usize);

/// How a fragment's output is combined with the attachment contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendMode {
    /// The output overwrites the attachment.
    Replace,
    /// The output is added to the attachment (light accumulation).
    Additive,
}

/// A colour target of a render pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColorTargetState {
    /// The format of the attachment.
    pub format: TextureFormat,
    /// The blend operation applied on write.
    pub blend: BlendMode,
}

/// A descriptor used to create a [`RenderPipelineId`].
#[derive(Debug, Clone)]
pub struct RenderPipelineDescriptor<'a> {
    /// An optional debug label.
    pub label: Option<Cow<'a, str>>,
    /// Name of the shader program the pipeline runs.
    pub program: Cow<'a, str>,
    /// The colour targets written by the fragment stage.
    pub color_targets: Vec<ColorTargetState>,
    /// The depth/stencil format, if a depth/stencil attachment is bound.
    pub depth_stencil_format: Option<TextureFormat>,
}

/// The resource bound at one binding slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingResource {
    /// A (sub)range of a buffer.
    Buffer {
        /// The buffer to bind.
        buffer: BufferId,
        /// Start of the range in bytes.
        offset: u64,
        /// Size of the range in bytes; `None` binds to the end of the buffer.
        size: Option<u64>,
    },
    /// A sampled texture view.
    TextureView(TextureViewId),
    /// A sampler.
    Sampler(SamplerId),
}

/// One entry of a [`BindGroupDescriptor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindGroupEntry {
    /// The binding slot.
    pub binding: u32,
    /// The resource bound at that slot.
    pub resource: BindingResource,
}

/// A descriptor used to create a [`BindGroupId`].
#[derive(Debug, Clone)]
pub struct BindGroupDescriptor<'a> {
    /// An optional debug label.
    pub label: Option<Cow<'a, str>>,
    /// The bound resources.
    pub entries: Vec<BindGroupEntry>,
}
