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

//! Per-configuration lighting pipelines and the lights drawn with them.

use super::shadow_map::ShadowMapResult;
use super::strategy::LightPassStrategy;
use pollux_core::renderer::{
    BindGroupDescriptor, BindGroupEntry, BindGroupId, BindingResource, BlendMode,
    ColorTargetState, GraphicsDevice, RenderError, RenderPipelineDescriptor, RenderPipelineId,
    TextureFormat,
};
use pollux_data::scene::{Camera, Light, LightId, LightType, SceneFlags};
use pollux_data::LightBuffer;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Vertices of the fullscreen triangle.
pub const FULLSCREEN_VERTICES: u32 = 3;
/// Vertices of the box enclosing a point or spot light.
pub const LIGHT_VOLUME_VERTICES: u32 = 36;

/// Identifies one pipeline variant.
///
/// The derived ordering sorts by light type first, which fixes the order
/// pipelines are recorded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PipelineKey {
    /// The light type drawn.
    pub light_type: LightType,
    /// The lighting model of the scene materials.
    pub lighting_model: u32,
    /// Scene-wide features.
    pub scene_flags: SceneFlags,
    /// Shadow and GI contributions.
    pub strategy: LightPassStrategy,
}

impl PipelineKey {
    /// The key of the pipeline drawing `light`.
    pub fn for_light(
        light: &Light,
        lighting_model: u32,
        scene_flags: SceneFlags,
        gi_enabled: bool,
    ) -> Self {
        let light_type = light.light_type();
        Self {
            light_type,
            lighting_model,
            scene_flags,
            strategy: LightPassStrategy::select(light_type, &light.shadow_config(), gi_enabled),
        }
    }

    fn label(&self) -> String {
        format!(
            "LightsPipeline/{}/{}/{:#x}",
            self.strategy.program(self.light_type),
            self.lighting_model,
            self.scene_flags.bits()
        )
    }
}

/// A light registered with a [`LightsPipeline`] for the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnabledLight {
    /// The light.
    pub id: LightId,
    /// Its record and shadow map bindings.
    pub bind_group: BindGroupId,
    /// Vertices drawn for it.
    pub vertices: u32,
}

/// The GPU pipelines of one [`PipelineKey`] and the lights drawn with them.
///
/// Two pipelines are built: the first light of a frame overwrites the targets,
/// later lights are added on top.
///
/// Bind groups are cached per light across frames. A light not enabled during
/// a frame loses its group at the next [`clear`](Self::clear).
pub struct LightsPipeline {
    device: Arc<dyn GraphicsDevice>,
    key: PipelineKey,
    first: RenderPipelineId,
    blend: RenderPipelineId,
    bind_groups: HashMap<LightId, (u64, BindGroupId)>,
    lights: Vec<EnabledLight>,
}

impl LightsPipeline {
    /// Creates the GPU pipelines.
    ///
    /// # Errors
    ///
    /// A rejected pipeline is returned as is; it is a configuration error.
    pub fn new(
        device: Arc<dyn GraphicsDevice>,
        key: PipelineKey,
        targets: &[TextureFormat],
    ) -> Result<Self, RenderError> {
        let label = key.label();
        let program = key.strategy.program(key.light_type);
        let create = |suffix: &str, blend: BlendMode| {
            device.create_render_pipeline(&RenderPipelineDescriptor {
                label: Some(Cow::Owned(format!("{label}/{suffix}"))),
                program: Cow::Borrowed(program.as_str()),
                color_targets: targets
                    .iter()
                    .map(|&format| ColorTargetState { format, blend })
                    .collect(),
                depth_stencil_format: None,
            })
        };
        let first = create("first", BlendMode::Replace)?;
        let blend = match create("blend", BlendMode::Additive) {
            Ok(blend) => blend,
            Err(e) => {
                let _ = device.destroy_render_pipeline(first);
                return Err(e.into());
            }
        };
        log::debug!("Created {label}");
        Ok(Self {
            device,
            key,
            first,
            blend,
            bind_groups: HashMap::new(),
            lights: Vec::new(),
        })
    }

    /// The pipeline key.
    pub fn key(&self) -> &PipelineKey {
        &self.key
    }

    /// The overwriting and the additive pipelines.
    pub fn pipelines(&self) -> (RenderPipelineId, RenderPipelineId) {
        (self.first, self.blend)
    }

    /// Registers `light` for the current frame.
    ///
    /// Returns `false` if the light is already registered, or if its record
    /// has not been written to the light buffer yet.
    pub fn add_light(
        &mut self,
        camera: &Camera,
        light: &Light,
        buffer: &LightBuffer,
        shadow_map: &ShadowMapResult,
    ) -> Result<bool, RenderError> {
        let id = light.id();
        if self.lights.iter().any(|l| l.id == id) {
            return Ok(false);
        }
        let Some(offset) = buffer.offset_of(id) else {
            log::warn!("Light '{}' has no record yet, skipped this frame", light.name());
            return Ok(false);
        };
        let bind_group = match self.bind_groups.get(&id) {
            Some(&(cached_offset, group)) if cached_offset == offset => group,
            cached => {
                let stale = cached.map(|&(_, group)| group);
                let group = self.create_bind_group(light, offset, buffer, shadow_map)?;
                if let Some(stale) = stale {
                    self.release_bind_group(stale);
                }
                self.bind_groups.insert(id, (offset, group));
                group
            }
        };
        let camera_inside = light
            .bounding_box()
            .map_or(true, |aabb| aabb.contains_point(camera.position));
        self.lights.push(EnabledLight {
            id,
            bind_group,
            vertices: if camera_inside {
                FULLSCREEN_VERTICES
            } else {
                LIGHT_VOLUME_VERTICES
            },
        });
        Ok(true)
    }

    fn create_bind_group(
        &self,
        light: &Light,
        offset: u64,
        buffer: &LightBuffer,
        shadow_map: &ShadowMapResult,
    ) -> Result<BindGroupId, RenderError> {
        let mut entries = vec![BindGroupEntry {
            binding: 0,
            resource: BindingResource::Buffer {
                buffer: buffer.gpu_buffer(),
                offset,
                size: Some(self.key.light_type.stride()),
            },
        }];
        for (binding, map) in (1..).zip(self.key.strategy.sampled_maps()) {
            entries.push(BindGroupEntry {
                binding,
                resource: BindingResource::TextureView(shadow_map.view(map)),
            });
        }
        let group = self.device.create_bind_group(&BindGroupDescriptor {
            label: Some(Cow::Owned(format!("Light/{}", light.name()))),
            entries,
        })?;
        Ok(group)
    }

    fn release_bind_group(&self, group: BindGroupId) {
        if let Err(e) = self.device.destroy_bind_group(group) {
            log::warn!("Failed to release {group:?}: {e}");
        }
    }

    /// Unregisters a light. Returns `true` if it was registered.
    pub fn remove_light(&mut self, id: LightId) -> bool {
        let before = self.lights.len();
        self.lights.retain(|l| l.id != id);
        self.lights.len() != before
    }

    /// Unregisters every light.
    ///
    /// Bind groups of the lights enabled since the previous clear are kept for
    /// the next frames, the others are released.
    pub fn clear(&mut self) {
        let enabled: Vec<LightId> = self.lights.drain(..).map(|l| l.id).collect();
        let stale: Vec<BindGroupId> = self
            .bind_groups
            .iter()
            .filter(|(id, _)| !enabled.contains(id))
            .map(|(_, &(_, group))| group)
            .collect();
        self.bind_groups.retain(|id, _| enabled.contains(id));
        for group in stale {
            self.release_bind_group(group);
        }
    }

    /// The number of cached bind groups.
    pub fn bind_group_count(&self) -> usize {
        self.bind_groups.len()
    }

    /// Lights registered for the current frame, in registration order.
    pub fn lights(&self) -> &[EnabledLight] {
        &self.lights
    }

    /// The number of registered lights.
    pub fn len(&self) -> usize {
        self.lights.len()
    }

    /// Returns `true` if no light is registered.
    pub fn is_empty(&self) -> bool {
        self.lights.is_empty()
    }
}

impl Drop for LightsPipeline {
    fn drop(&mut self) {
        for (_, (_, group)) in std::mem::take(&mut self.bind_groups) {
            self.release_bind_group(group);
        }
        for pipeline in [self.first, self.blend] {
            if let Err(e) = self.device.destroy_render_pipeline(pipeline) {
                log::warn!("Failed to release {pipeline:?}: {e}");
            }
        }
    }
}

impl fmt::Debug for LightsPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LightsPipeline")
            .field("key", &self.key)
            .field("lights", &self.lights.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pollux_core::math::Vec3;
    use pollux_core::testing::RecordingDevice;
    use pollux_data::scene::{CpuUpdater, LightCategory, SceneNode};

    struct Fixture {
        device: RecordingDevice,
        buffer: LightBuffer,
        shadow_maps: [Arc<ShadowMapResult>; 3],
    }

    fn fixture() -> Fixture {
        let device = RecordingDevice::new();
        let shared: Arc<dyn GraphicsDevice> = Arc::new(device.clone());
        Fixture {
            buffer: LightBuffer::new(shared.clone(), 4).unwrap(),
            shadow_maps: ShadowMapResult::create_all(&shared, 16).unwrap(),
            device,
        }
    }

    fn pipeline(fx: &Fixture, light: &Light) -> LightsPipeline {
        let key = PipelineKey::for_light(light, 1, SceneFlags::empty(), true);
        LightsPipeline::new(
            Arc::new(fx.device.clone()),
            key,
            &[TextureFormat::Rgba16Float; 3],
        )
        .unwrap()
    }

    #[test]
    fn keys_sort_by_light_type_first() {
        let sun = Light::new(LightId(9), "sun", "s", LightCategory::Directional);
        let lamp = Light::new(LightId(1), "lamp", "s", LightCategory::Point { range: 1.0 });
        let sun_key = PipelineKey::for_light(&sun, 7, SceneFlags::all(), true);
        let lamp_key = PipelineKey::for_light(&lamp, 0, SceneFlags::empty(), true);
        assert!(sun_key < lamp_key);
    }

    #[test]
    fn creates_a_replace_and_an_additive_pipeline() {
        let fx = fixture();
        let sun = Light::new(LightId(1), "sun", "s", LightCategory::Directional);
        let pipeline = pipeline(&fx, &sun);
        let labels = fx.device.pipeline_labels();
        assert_eq!(labels.len(), 2);
        assert!(labels[0].ends_with("/blend") && labels[1].ends_with("/first"));
        drop(pipeline);
        assert!(fx.device.pipeline_labels().is_empty());
    }

    #[test]
    fn lights_without_a_record_are_skipped() {
        let fx = fixture();
        let sun = Arc::new(Light::new(LightId(1), "sun", "s", LightCategory::Directional));
        let mut pipeline = pipeline(&fx, &sun);
        let camera = Camera::default();
        let maps = &fx.shadow_maps[0];
        fx.buffer.add_light(&sun);
        assert!(!pipeline.add_light(&camera, &sun, &fx.buffer, maps).unwrap());

        fx.buffer.update(&CpuUpdater::default()).unwrap();
        assert!(pipeline.add_light(&camera, &sun, &fx.buffer, maps).unwrap());
        assert!(!pipeline.add_light(&camera, &sun, &fx.buffer, maps).unwrap());
        assert_eq!(pipeline.lights()[0].vertices, FULLSCREEN_VERTICES);
    }

    #[test]
    fn bind_group_points_at_the_record() {
        let fx = fixture();
        let sun = Arc::new(Light::new(LightId(1), "sun", "s", LightCategory::Directional));
        let category = LightCategory::Point { range: 2.0 };
        let lamp = Arc::new(Light::new(LightId(2), "lamp", "s", category));
        let node = Arc::new(SceneNode::new("far"));
        node.set_position(Vec3::new(0.0, 0.0, -50.0));
        lamp.attach_to(&node);
        fx.buffer.add_light(&sun);
        fx.buffer.add_light(&lamp);
        fx.buffer.update(&CpuUpdater::default()).unwrap();

        let mut pipeline = pipeline(&fx, &lamp);
        pipeline
            .add_light(&Camera::default(), &lamp, &fx.buffer, &fx.shadow_maps[1])
            .unwrap();
        let enabled = pipeline.lights()[0];
        assert_eq!(enabled.vertices, LIGHT_VOLUME_VERTICES);
        let group = fx.device.bind_group(enabled.bind_group).unwrap();
        assert_eq!(
            group.entries[0].resource,
            BindingResource::Buffer {
                buffer: fx.buffer.gpu_buffer(),
                offset: 64,
                size: Some(48),
            }
        );

        assert!(pipeline.remove_light(lamp.id()));
        assert!(pipeline.is_empty());
    }

    #[test]
    fn bind_groups_follow_offsets_and_enabled_lights() {
        let fx = fixture();
        let camera = Camera::default();
        let maps = &fx.shadow_maps[1];
        let point = || LightCategory::Point { range: 2.0 };
        let a = Arc::new(Light::new(LightId(1), "a", "s", point()));
        let b = Arc::new(Light::new(LightId(2), "b", "s", point()));
        fx.buffer.add_light(&a);
        fx.buffer.add_light(&b);
        fx.buffer.update(&CpuUpdater::default()).unwrap();

        let mut pipeline = pipeline(&fx, &b);
        pipeline.add_light(&camera, &a, &fx.buffer, maps).unwrap();
        pipeline.add_light(&camera, &b, &fx.buffer, maps).unwrap();
        let moved_from = pipeline.lights()[1].bind_group;
        assert_eq!(fx.device.bind_group_count(), 2);

        // Removing `a` moves `b` down one record: its old group is replaced.
        fx.buffer.remove_light(&a);
        fx.buffer.update(&CpuUpdater::default()).unwrap();
        pipeline.clear();
        pipeline.add_light(&camera, &b, &fx.buffer, maps).unwrap();
        assert!(fx.device.bind_group(moved_from).is_none());
        assert_eq!(fx.device.bind_group_count(), 2);

        // `a` was not enabled last frame, so its group goes now.
        pipeline.clear();
        assert_eq!(pipeline.bind_group_count(), 1);
        assert_eq!(fx.device.bind_group_count(), 1);

        pipeline.clear();
        assert_eq!(pipeline.bind_group_count(), 0);
        pipeline.add_light(&camera, &b, &fx.buffer, maps).unwrap();
        drop(pipeline);
        assert_eq!(fx.device.bind_group_count(), 0);
    }
}
