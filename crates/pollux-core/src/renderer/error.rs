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


//! Errors raised by the device and by frame construction.
//!
//! GPU-side failures are never recovered from inside the lighting core: they
//! are surfaced as [`RenderError`] and travel up with `?` untouched.

use crate::graph::GraphError;
use crate::renderer::RenderPipelineId;
use std::fmt;

/// A pipeline the device would not build or does not know.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// The backend refused the pipeline description.
    Rejected {
        /// Label of the refused pipeline.
        label: String,
        /// What the backend reported.
        reason: String,
    },
    /// The id does not name a live pipeline.
    Unknown(RenderPipelineId),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Rejected { label, reason } => {
                write!(f, "Pipeline '{label}' rejected: {reason}")
            }
            PipelineError::Unknown(id) => write!(f, "No live pipeline {}", id.0),
        }
    }
}

impl std::error::Error for PipelineError {}

/// A GPU object could not be created, written or released.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    /// Pipeline creation or release failed.
    Pipeline(PipelineError),
    /// The id does not name a live object.
    InvalidHandle,
    /// The device has no room for the allocation.
    OutOfMemory {
        /// Bytes requested.
        requested: u64,
    },
    /// A write runs past the end of a buffer.
    OutOfBounds {
        /// First byte written.
        offset: u64,
        /// Bytes written.
        len: u64,
        /// Size of the buffer.
        capacity: u64,
    },
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::Pipeline(err) => err.fmt(f),
            ResourceError::InvalidHandle => f.write_str("Invalid resource handle"),
            ResourceError::OutOfMemory { requested } => {
                write!(f, "Out of device memory ({requested} bytes requested)")
            }
            ResourceError::OutOfBounds {
                offset,
                len,
                capacity,
            } => write!(
                f,
                "Write of {len} bytes at {offset} overflows a {capacity}-byte buffer"
            ),
        }
    }
}

impl std::error::Error for ResourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ResourceError::Pipeline(err) => Some(err),
            _ => None,
        }
    }
}

impl From<PipelineError> for ResourceError {
    fn from(err: PipelineError) -> Self {
        ResourceError::Pipeline(err)
    }
}

/// Everything that can stop a frame from being built or recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// A pass was used before its GPU objects were created.
    NotInitialized,
    /// The device failed on a resource.
    ResourceError(ResourceError),
    /// The frame graph could not be compiled.
    Graph(GraphError),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::NotInitialized => f.write_str("Render pass used before initialisation"),
            RenderError::ResourceError(err) => write!(f, "GPU resource failure: {err}"),
            RenderError::Graph(err) => write!(f, "Frame graph: {err}"),
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::NotInitialized => None,
            RenderError::ResourceError(err) => Some(err),
            RenderError::Graph(err) => Some(err),
        }
    }
}

impl From<ResourceError> for RenderError {
    fn from(err: ResourceError) -> Self {
        RenderError::ResourceError(err)
    }
}

impl From<PipelineError> for RenderError {
    fn from(err: PipelineError) -> Self {
        RenderError::ResourceError(err.into())
    }
}

impl From<GraphError> for RenderError {
    fn from(err: GraphError) -> Self {
        RenderError::Graph(err)
    }
}
