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

//! Small uniform buffers holding one `Pod` record.

use bytemuck::Pod;
use pollux_core::renderer::{BufferDescriptor, BufferId, GraphicsDevice, ResourceError};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// A uniform buffer sized for one `T`, released on drop.
pub struct ConfigBuffer<T: Pod> {
    device: Arc<dyn GraphicsDevice>,
    buffer: BufferId,
    label: String,
    _record: PhantomData<T>,
}

impl<T: Pod> ConfigBuffer<T> {
    /// Allocates the buffer and writes `initial` into it.
    pub fn new(
        device: Arc<dyn GraphicsDevice>,
        label: impl Into<String>,
        initial: &T,
    ) -> Result<Self, ResourceError> {
        let label = label.into();
        let buffer = device.create_buffer(&BufferDescriptor::uniform(
            label.as_str(),
            std::mem::size_of::<T>() as u64,
        ))?;
        let config = Self {
            device,
            buffer,
            label,
            _record: PhantomData,
        };
        config.write(initial)?;
        Ok(config)
    }

    /// The GPU buffer.
    pub fn buffer(&self) -> BufferId {
        self.buffer
    }

    /// Overwrites the record.
    pub fn write(&self, record: &T) -> Result<(), ResourceError> {
        self.device
            .write_buffer(self.buffer, 0, bytemuck::bytes_of(record))
    }
}

impl<T: Pod> Drop for ConfigBuffer<T> {
    fn drop(&mut self) {
        if let Err(e) = self.device.destroy_buffer(self.buffer) {
            log::warn!("Failed to release '{}': {e}", self.label);
        }
    }
}

impl<T: Pod> fmt::Debug for ConfigBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigBuffer")
            .field("label", &self.label)
            .field("buffer", &self.buffer)
            .finish()
    }
}
