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

//! The packed buffer holding every light record of a scene.
//!
//! Records are laid out in three contiguous runs, Directional then Point then
//! Spot, each with its own fixed stride. For a light `L` of type `T`:
//!
//! ```text
//! offset(L) = Σ count(T') × stride(T') for T' before T
//!           + index_of(L within T) × stride(T)
//! ```
//!
//! Adding or removing a light marks the lights whose offset shifts as dirty:
//! the later lights of the same type and every light of later types. Dirty
//! lights have no valid offset until the next [`LightBuffer::update`], which
//! writes each distinct dirty light exactly once into a CPU-visible staging
//! buffer. [`LightBuffer::upload`] then copies the written range to the
//! GPU-side buffer.
//!
//! A light refused because its type is full waits in arrival order and is
//! tracked as soon as a slot of its type frees.

use crate::scene::{CpuUpdater, Light, LightId, LightType};
use pollux_core::event::Subscription;
use pollux_core::renderer::{
    BufferDescriptor, BufferId, CommandEncoder, GraphicsDevice, ResourceError,
};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// Where one light type's records live in the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Partition {
    /// Byte offset of the first record.
    pub base_offset: u64,
    /// Number of records.
    pub count: u32,
    /// Size of one record.
    pub stride: u64,
}

struct TrackedLight {
    id: LightId,
    light: Weak<Light>,
    changes: Subscription<LightId>,
}

struct WaitingLight {
    id: LightId,
    light: Weak<Light>,
}

#[derive(Default)]
struct LightBufferState {
    lights: [Vec<TrackedLight>; 3],
    waiting: [VecDeque<WaitingLight>; 3],
    dirty: Vec<LightId>,
    offsets: HashMap<LightId, u64>,
    partitions: [Partition; 3],
    pending_range: Option<(u64, u64)>,
}

impl LightBufferState {
    fn position(&self, id: LightId) -> Option<(LightType, usize)> {
        LightType::ALL.iter().find_map(|t| {
            self.lights[t.index()]
                .iter()
                .position(|l| l.id == id)
                .map(|i| (*t, i))
        })
    }

    fn base_offset(&self, light_type: LightType) -> u64 {
        LightType::ALL
            .iter()
            .take_while(|t| **t < light_type)
            .map(|t| self.lights[t.index()].len() as u64 * t.stride())
            .sum()
    }

    /// Marks the lights from `index` in `light_type` and every light of later
    /// types as dirty.
    fn mark_cascade(&mut self, light_type: LightType, index: usize) {
        let mut marked = Vec::new();
        for t in LightType::ALL.iter().filter(|t| **t >= light_type) {
            let start = if *t == light_type { index } else { 0 };
            marked.extend(self.lights[t.index()].iter().skip(start).map(|l| l.id));
        }
        for id in &marked {
            self.offsets.remove(id);
        }
        self.dirty.extend(marked);
    }

    fn track(&mut self, light: &Arc<Light>) -> usize {
        let light_type = light.light_type();
        let index = self.lights[light_type.index()].len();
        self.lights[light_type.index()].push(TrackedLight {
            id: light.id(),
            light: Arc::downgrade(light),
            changes: light.on_gpu_changed().subscribe(),
        });
        self.mark_cascade(light_type, index);
        index
    }

    fn is_waiting(&self, id: LightId) -> bool {
        self.waiting.iter().flatten().any(|w| w.id == id)
    }

    /// Moves waiting lights of `light_type` into free slots, oldest first.
    fn admit_waiting(&mut self, light_type: LightType, capacity: usize) {
        while self.lights[light_type.index()].len() < capacity {
            let Some(next) = self.waiting[light_type.index()].pop_front() else {
                break;
            };
            // Lights dropped while waiting are skipped.
            if let Some(light) = next.light.upgrade() {
                let index = self.track(&light);
                log::debug!(
                    "LightBuffer: '{}' admitted at {} #{index}",
                    light.name(),
                    light_type.name()
                );
            }
        }
    }

    fn untrack(&mut self, light_type: LightType, index: usize) -> TrackedLight {
        let removed = self.lights[light_type.index()].remove(index);
        self.offsets.remove(&removed.id);
        self.mark_cascade(light_type, index);
        removed
    }
}

/// The light records of one scene, partitioned by light type.
pub struct LightBuffer {
    device: Arc<dyn GraphicsDevice>,
    capacity_per_type: u32,
    size: u64,
    staging: BufferId,
    gpu: BufferId,
    state: Mutex<LightBufferState>,
}

impl LightBuffer {
    /// Allocates room for `capacity_per_type` lights of every type.
    ///
    /// # Errors
    ///
    /// Propagates the device error if either buffer can't be allocated.
    pub fn new(
        device: Arc<dyn GraphicsDevice>,
        capacity_per_type: u32,
    ) -> Result<Self, ResourceError> {
        let size: u64 = LightType::ALL
            .iter()
            .map(|t| t.stride() * capacity_per_type as u64)
            .sum();
        let staging =
            device.create_buffer(&BufferDescriptor::staging("LightBuffer/staging", size))?;
        let gpu = match device.create_buffer(&BufferDescriptor::storage("LightBuffer", size)) {
            Ok(gpu) => gpu,
            Err(e) => {
                let _ = device.destroy_buffer(staging);
                return Err(e);
            }
        };
        log::debug!("LightBuffer: {size} bytes for {capacity_per_type} light(s) per type");
        Ok(Self {
            device,
            capacity_per_type,
            size,
            staging,
            gpu,
            state: Mutex::new(LightBufferState::default()),
        })
    }

    fn state(&self) -> MutexGuard<'_, LightBufferState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The GPU-side buffer lighting passes bind.
    pub fn gpu_buffer(&self) -> BufferId {
        self.gpu
    }

    /// The buffer size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Starts tracking `light`.
    ///
    /// Returns `false` if the light is already known or its type is full. A
    /// light refused for room waits and is tracked once a slot frees, either
    /// on removal of a light of its type or on the next update.
    pub fn add_light(&self, light: &Arc<Light>) -> bool {
        let light_type = light.light_type();
        let mut state = self.state();
        if state.position(light.id()).is_some() || state.is_waiting(light.id()) {
            return false;
        }
        if state.lights[light_type.index()].len() >= self.capacity_per_type as usize {
            log::warn!(
                "LightBuffer: no room for {} light '{}' ({} max), waiting for a free slot",
                light_type.name(),
                light.name(),
                self.capacity_per_type
            );
            state.waiting[light_type.index()].push_back(WaitingLight {
                id: light.id(),
                light: Arc::downgrade(light),
            });
            return false;
        }
        let index = state.track(light);
        log::trace!("LightBuffer: added '{}' at {} #{index}", light.name(), light_type.name());
        true
    }

    /// Stops tracking `light`. Returns `false` if it was neither tracked nor
    /// waiting.
    pub fn remove_light(&self, light: &Light) -> bool {
        self.remove_by_id(light.id())
    }

    /// Stops tracking the light with `id`, giving its slot to the oldest
    /// waiting light of the same type.
    pub fn remove_by_id(&self, id: LightId) -> bool {
        let mut state = self.state();
        if let Some((light_type, index)) = state.position(id) {
            // Dropping the entry drops its subscription.
            drop(state.untrack(light_type, index));
            log::trace!("LightBuffer: removed {id:?} from {}", light_type.name());
            state.admit_waiting(light_type, self.capacity_per_type as usize);
            return true;
        }
        let before = state.waiting.iter().map(VecDeque::len).sum::<usize>();
        for queue in &mut state.waiting {
            queue.retain(|w| w.id != id);
        }
        before != state.waiting.iter().map(VecDeque::len).sum::<usize>()
    }

    /// Writes every distinct dirty light and records the partition layout.
    ///
    /// Returns the number of records written.
    ///
    /// # Errors
    ///
    /// Propagates staging write failures; lights not yet written stay dirty.
    pub fn update(&self, updater: &CpuUpdater) -> Result<usize, ResourceError> {
        let mut state = self.state();

        // Lights dropped without being removed.
        for light_type in LightType::ALL {
            while let Some(index) = state.lights[light_type.index()]
                .iter()
                .position(|l| l.light.strong_count() == 0)
            {
                drop(state.untrack(light_type, index));
            }
            state.waiting[light_type.index()].retain(|w| w.light.strong_count() > 0);
            state.admit_waiting(light_type, self.capacity_per_type as usize);
        }

        let mut changed = Vec::new();
        for run in &state.lights {
            for tracked in run {
                if !tracked.changes.drain().is_empty() {
                    changed.push(tracked.id);
                }
            }
        }
        state.dirty.extend(changed);

        let queue = std::mem::take(&mut state.dirty);
        let mut seen = HashSet::with_capacity(queue.len());
        let mut written = 0;
        for (n, id) in queue.iter().enumerate() {
            if !seen.insert(*id) {
                continue;
            }
            let Some((light_type, index)) = state.position(*id) else {
                continue;
            };
            let Some(light) = state.lights[light_type.index()][index].light.upgrade() else {
                continue;
            };
            let offset = state.base_offset(light_type) + index as u64 * light_type.stride();
            if let Err(e) = self.device.write_buffer(self.staging, offset, &light.record()) {
                state.dirty.extend(queue[n..].iter().copied());
                return Err(e);
            }
            state.offsets.insert(*id, offset);
            let end = offset + light_type.stride();
            state.pending_range = Some(match state.pending_range {
                Some((start, stop)) => (start.min(offset), stop.max(end)),
                None => (offset, end),
            });
            written += 1;
        }

        for light_type in LightType::ALL {
            state.partitions[light_type.index()] = Partition {
                base_offset: state.base_offset(light_type),
                count: state.lights[light_type.index()].len() as u32,
                stride: light_type.stride(),
            };
        }
        log::trace!(
            "LightBuffer: frame {} wrote {written} record(s)",
            updater.frame_index
        );
        Ok(written)
    }

    /// Records the staging to GPU copy if anything was written since the last
    /// upload. Returns `true` if a copy was recorded.
    pub fn upload(&self, encoder: &mut dyn CommandEncoder) -> bool {
        let Some((start, end)) = self.state().pending_range.take() else {
            return false;
        };
        encoder.copy_buffer_to_buffer(self.staging, start, self.gpu, start, end - start);
        true
    }

    /// Returns `true` if written records wait for [`LightBuffer::upload`].
    pub fn is_awaiting_upload(&self) -> bool {
        self.state().pending_range.is_some()
    }

    /// The byte offset of a light's record, or `None` while it is dirty or
    /// untracked.
    pub fn offset_of(&self, id: LightId) -> Option<u64> {
        self.state().offsets.get(&id).copied()
    }

    /// The light's type and index within that type.
    pub fn index_of(&self, id: LightId) -> Option<(LightType, usize)> {
        self.state().position(id)
    }

    /// Returns `true` if the light waits for the next update.
    pub fn is_dirty(&self, id: LightId) -> bool {
        let state = self.state();
        state.position(id).is_some() && !state.offsets.contains_key(&id)
    }

    /// The layout of one light type as of the last update.
    pub fn partition(&self, light_type: LightType) -> Partition {
        self.state().partitions[light_type.index()]
    }

    /// The number of tracked lights of `light_type`.
    pub fn count(&self, light_type: LightType) -> usize {
        self.state().lights[light_type.index()].len()
    }

    /// The number of lights of `light_type` waiting for a free slot.
    pub fn waiting_count(&self, light_type: LightType) -> usize {
        self.state().waiting[light_type.index()].len()
    }

    /// The total number of tracked lights.
    pub fn len(&self) -> usize {
        self.state().lights.iter().map(Vec::len).sum()
    }

    /// Returns `true` if no light is tracked.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tracked lights of `light_type`, in buffer order.
    pub fn lights(&self, light_type: LightType) -> Vec<Arc<Light>> {
        self.state().lights[light_type.index()]
            .iter()
            .filter_map(|l| l.light.upgrade())
            .collect()
    }
}

impl Drop for LightBuffer {
    fn drop(&mut self) {
        for buffer in [self.staging, self.gpu] {
            if let Err(e) = self.device.destroy_buffer(buffer) {
                log::warn!("LightBuffer: failed to release {buffer:?}: {e}");
            }
        }
    }
}

impl fmt::Debug for LightBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LightBuffer")
            .field("size", &self.size)
            .field("lights", &self.len())
            .finish()
    }
}
