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


//! GPU buffer handles and their creation descriptors.

use bitflags::bitflags;
use std::borrow::Cow;

bitflags! {
    /// How a buffer may be used once created.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        /// Written from the CPU through a mapping.
        const MAP_WRITE = 1 << 0;
        /// Source of a buffer-to-buffer copy.
        const COPY_SRC = 1 << 1;
        /// Destination of a copy or a queue write.
        const COPY_DST = 1 << 2;
        /// Bound as a uniform block.
        const UNIFORM = 1 << 3;
        /// Bound as a read-only storage array.
        const STORAGE = 1 << 4;
    }
}

/// Describes a buffer to create.
#[derive(Debug, Clone)]
pub struct BufferDescriptor<'a> {
    /// Debug label.
    pub label: Option<Cow<'a, str>>,
    /// Size in bytes.
    pub size: u64,
    /// Allowed usages.
    pub usage: BufferUsage,
    /// The buffer starts mapped for CPU writes.
    pub mapped_at_creation: bool,
}

impl<'a> BufferDescriptor<'a> {
    /// A CPU-written buffer that is copied into a GPU buffer.
    pub fn staging(label: impl Into<Cow<'a, str>>, size: u64) -> Self {
        Self {
            label: Some(label.into()),
            size,
            usage: BufferUsage::MAP_WRITE | BufferUsage::COPY_SRC,
            mapped_at_creation: true,
        }
    }

    /// A storage array filled by copies from a staging buffer.
    pub fn storage(label: impl Into<Cow<'a, str>>, size: u64) -> Self {
        Self {
            label: Some(label.into()),
            size,
            usage: BufferUsage::STORAGE | BufferUsage::COPY_DST,
            mapped_at_creation: false,
        }
    }

    /// A uniform block rewritten through queue writes.
    pub fn uniform(label: impl Into<Cow<'a, str>>, size: u64) -> Self {
        Self {
            label: Some(label.into()),
            size,
            usage: BufferUsage::UNIFORM | BufferUsage::COPY_DST,
            mapped_at_creation: false,
        }
    }
}

/// Handle of a buffer created by a
/// [`GraphicsDevice`](crate::renderer::GraphicsDevice).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub usize);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_pick_matching_usages() {
        let staging = BufferDescriptor::staging("Lights/staging", 256);
        assert!(staging.mapped_at_creation);
        assert!(staging.usage.contains(BufferUsage::COPY_SRC));

        let uniform = BufferDescriptor::uniform(String::from("Grid0"), 32);
        assert_eq!(uniform.label.as_deref(), Some("Grid0"));
        assert_eq!(uniform.usage, BufferUsage::UNIFORM | BufferUsage::COPY_DST);
        assert!(!BufferDescriptor::storage("Lights", 8)
            .usage
            .intersects(BufferUsage::MAP_WRITE));
    }
}
