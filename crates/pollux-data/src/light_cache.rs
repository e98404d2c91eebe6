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

//! The per-scene light cache, wired to the scene's [`LightBuffer`].

use crate::cache::Cache;
use crate::light_buffer::LightBuffer;
use crate::scene::{CpuUpdater, Light, LightCategory, LightId, LightType, SceneNode};
use pollux_core::renderer::{CommandEncoder, ResourceError};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Constructor arguments of a light.
#[derive(Debug, Clone)]
pub struct LightInit {
    /// What kind of light to build.
    pub category: LightCategory,
    /// The node the light is attached to, if any.
    pub node: Option<Arc<SceneNode>>,
}

/// Owns the lights of one scene.
///
/// Lights added with initialisation are registered with the buffer, and
/// unregistered when removed or cleaned.
pub struct LightCache {
    scene: String,
    buffer: Arc<LightBuffer>,
    lights: Cache<Light, LightInit>,
}

impl LightCache {
    /// Creates an empty cache for `scene`. `ids` is the engine-wide id source.
    pub fn new(scene: impl Into<String>, buffer: Arc<LightBuffer>, ids: Arc<AtomicU64>) -> Self {
        let scene = scene.into();
        let producer_scene = scene.clone();
        let registering = buffer.clone();
        let unregistering = buffer.clone();
        let lights = Cache::new("LightCache", move |name: &String, init: LightInit| {
            let id = LightId(ids.fetch_add(1, Ordering::Relaxed));
            let light = Arc::new(Light::new(
                id,
                name.clone(),
                producer_scene.clone(),
                init.category,
            ));
            if let Some(node) = &init.node {
                light.attach_to(node);
            }
            light
        })
        .with_initialiser(move |_, light| {
            registering.add_light(light);
        })
        .with_cleaner(move |_, light| {
            unregistering.remove_light(light);
        });
        Self {
            scene,
            buffer,
            lights,
        }
    }

    /// The owning scene's name.
    pub fn scene(&self) -> &str {
        &self.scene
    }

    /// The buffer the lights are packed into.
    pub fn buffer(&self) -> &Arc<LightBuffer> {
        &self.buffer
    }

    /// Creates and registers a light, or returns the existing one named `name`.
    pub fn add(
        &self,
        name: impl Into<String>,
        category: LightCategory,
        node: Option<Arc<SceneNode>>,
    ) -> Arc<Light> {
        self.lights.add(name.into(), LightInit { category, node })
    }

    /// Inserts a light built elsewhere, registering it if it was inserted.
    pub fn add_light(&self, light: Arc<Light>) -> Option<Arc<Light>> {
        self.lights
            .add_element(light.name().to_string(), Some(light), true)
    }

    /// Removes, unregisters and detaches the light named `name`.
    pub fn remove(&self, name: &str) -> Option<Arc<Light>> {
        let light = self.lights.remove(name)?;
        self.buffer.remove_light(&light);
        light.detach();
        Some(light)
    }

    /// Returns the light named `name`.
    pub fn find(&self, name: &str) -> Option<Arc<Light>> {
        self.lights.find(name)
    }

    /// Returns `true` if a light named `name` exists.
    pub fn has(&self, name: &str) -> bool {
        self.lights.has(name)
    }

    /// Returns the light with id `id`.
    pub fn find_by_id(&self, id: LightId) -> Option<Arc<Light>> {
        let mut found = None;
        self.lights.for_each(|_, light| {
            if light.id() == id {
                found = Some(light.clone());
            }
        });
        found
    }

    /// The number of lights.
    pub fn len(&self) -> usize {
        self.lights.len()
    }

    /// Returns `true` if the scene has no light.
    pub fn is_empty(&self) -> bool {
        self.lights.is_empty()
    }

    /// Registered lights of `light_type`, in buffer order.
    pub fn lights_of(&self, light_type: LightType) -> Vec<Arc<Light>> {
        self.buffer.lights(light_type)
    }

    /// Every light, in no particular order.
    pub fn lights(&self) -> Vec<Arc<Light>> {
        self.lights.elements().into_iter().map(|(_, l)| l).collect()
    }

    /// Writes the dirty light records. See [`LightBuffer::update`].
    pub fn update(&self, updater: &CpuUpdater) -> Result<usize, ResourceError> {
        self.buffer.update(updater)
    }

    /// Records the pending buffer upload. See [`LightBuffer::upload`].
    pub fn upload(&self, encoder: &mut dyn CommandEncoder) -> bool {
        self.buffer.upload(encoder)
    }

    /// Unregisters every light from the buffer; the lights stay cached.
    pub fn cleanup(&self) {
        self.lights.cleanup();
    }

    /// Unregisters and drops every light.
    pub fn clear(&self) {
        for (_, light) in self.lights.elements() {
            self.buffer.remove_light(&light);
            light.detach();
        }
        self.lights.clear();
    }

    /// Moves every light into `other`, re-registering it in `other`'s buffer.
    ///
    /// On a name clash the destination's light is kept and the incoming one is
    /// detached and dropped.
    pub fn merge_into(&self, other: &LightCache) {
        self.lights
            .merge_into_with(&other.lights, |name, light, destination| {
                self.buffer.remove_light(&light);
                let (_, inserted) = destination.insert_if_absent(name, light.clone());
                if inserted {
                    light.set_scene(&other.scene);
                    other.buffer.add_light(&light);
                } else {
                    log::warn!(
                        "LightCache: '{}' already exists in scene '{}', dropping it",
                        light.name(),
                        other.scene
                    );
                    light.detach();
                }
            });
    }
}

impl fmt::Debug for LightCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LightCache")
            .field("scene", &self.scene)
            .field("lights", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pollux_core::renderer::GraphicsDevice;
    use pollux_core::testing::RecordingDevice;

    fn light_cache(scene: &str, ids: &Arc<AtomicU64>) -> LightCache {
        let device: Arc<dyn GraphicsDevice> = Arc::new(RecordingDevice::new());
        let buffer = Arc::new(LightBuffer::new(device, 8).unwrap());
        LightCache::new(scene, buffer, ids.clone())
    }

    #[test]
    fn add_registers_and_remove_unregisters() {
        let ids = Arc::new(AtomicU64::new(0));
        let cache = light_cache("main", &ids);
        let sun = cache.add("sun", LightCategory::Directional, None);
        let lamp = cache.add("lamp", LightCategory::Point { range: 5.0 }, None);
        assert_ne!(sun.id(), lamp.id());
        assert_eq!(sun.scene(), "main");
        assert_eq!(cache.buffer().len(), 2);

        let removed = cache.remove("sun").unwrap();
        assert_eq!(removed.id(), sun.id());
        assert!(cache.buffer().index_of(sun.id()).is_none());
        assert!(cache.remove("sun").is_none());
    }

    #[test]
    fn duplicate_name_keeps_the_first_light() {
        let ids = Arc::new(AtomicU64::new(0));
        let cache = light_cache("main", &ids);
        let first = cache.add("lamp", LightCategory::Point { range: 5.0 }, None);
        let second = cache.add("lamp", LightCategory::Directional, None);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.buffer().len(), 1);
        assert_eq!(ids.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn producer_attaches_the_node() {
        let ids = Arc::new(AtomicU64::new(0));
        let cache = light_cache("main", &ids);
        let node = Arc::new(SceneNode::new("lamp_node"));
        let lamp = cache.add("lamp", LightCategory::Point { range: 5.0 }, Some(node.clone()));
        assert!(Arc::ptr_eq(&lamp.node().unwrap(), &node));
        assert_eq!(node.lights().len(), 1);

        cache.remove("lamp");
        assert!(lamp.node().is_none());
        assert!(node.lights().is_empty());
    }

    #[test]
    fn find_by_id_and_lights_of() {
        let ids = Arc::new(AtomicU64::new(0));
        let cache = light_cache("main", &ids);
        cache.add("a", LightCategory::Point { range: 1.0 }, None);
        let b = cache.add("b", LightCategory::Point { range: 1.0 }, None);
        cache.add("sun", LightCategory::Directional, None);
        assert_eq!(cache.find_by_id(b.id()).unwrap().name(), "b");
        let names: Vec<_> = cache
            .lights_of(LightType::Point)
            .iter()
            .map(|l| l.name().to_string())
            .collect();
        assert_eq!(names, ["a", "b"]);
    }

    #[test]
    fn a_light_added_to_a_full_type_is_drawn_once_room_frees() {
        let ids = Arc::new(AtomicU64::new(0));
        let device: Arc<dyn GraphicsDevice> = Arc::new(RecordingDevice::new());
        let cache = LightCache::new("main", Arc::new(LightBuffer::new(device, 1).unwrap()), ids);
        cache.add("a", LightCategory::Point { range: 1.0 }, None);
        let b = cache.add("b", LightCategory::Point { range: 1.0 }, None);
        assert!(cache.has("b"));
        assert_eq!(cache.buffer().index_of(b.id()), None);

        cache.remove("a");
        cache.update(&CpuUpdater::default()).unwrap();
        assert_eq!(cache.buffer().count(LightType::Point), 1);
        assert_eq!(cache.buffer().offset_of(b.id()), Some(0));
    }

    #[test]
    fn cleanup_unregisters_without_dropping() {
        let ids = Arc::new(AtomicU64::new(0));
        let cache = light_cache("main", &ids);
        cache.add("sun", LightCategory::Directional, None);
        cache.cleanup();
        assert_eq!(cache.len(), 1);
        assert!(cache.buffer().is_empty());
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn merge_moves_lights_between_buffers() {
        let ids = Arc::new(AtomicU64::new(0));
        let source = light_cache("source", &ids);
        let destination = light_cache("destination", &ids);
        let kept = destination.add("shared", LightCategory::Directional, None);
        source.add("shared", LightCategory::Directional, None);
        let moved = source.add("lamp", LightCategory::Point { range: 2.0 }, None);

        source.merge_into(&destination);

        assert!(source.is_empty());
        assert!(source.buffer().is_empty());
        assert_eq!(destination.len(), 2);
        assert_eq!(destination.buffer().len(), 2);
        assert!(Arc::ptr_eq(&destination.find("shared").unwrap(), &kept));
        assert_eq!(moved.scene(), "destination");
        assert!(destination.buffer().index_of(moved.id()).is_some());
    }
}
