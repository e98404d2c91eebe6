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

//! A scene: nodes, lights and the samplers it uses.

use super::camera::CpuUpdater;
use super::light::{GlobalIlluminationType, Light, LightCategory, LightType, ShadowType};
use super::node::SceneNode;
use super::sampler::Sampler;
use crate::cache::{Cache, CacheView};
use crate::engine::Engine;
use crate::light_cache::LightCache;
use bitflags::bitflags;
use pollux_core::renderer::{CommandEncoder, ResourceError, SamplerDescriptor};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

bitflags! {
    /// Scene-wide features that select lighting pipeline variants.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct SceneFlags: u32 {
        /// Distance fog is applied.
        const FOG = 1 << 0;
        /// A directional light casts shadows.
        const SHADOW_DIRECTIONAL = 1 << 1;
        /// A point light casts shadows.
        const SHADOW_POINT = 1 << 2;
        /// A spot light casts shadows.
        const SHADOW_SPOT = 1 << 3;
        /// Reflective shadow maps are in use.
        const RSM_GI = 1 << 4;
        /// A light propagation volume is in use.
        const LPV_GI = 1 << 5;
        /// Layered light propagation volumes are in use.
        const LAYERED_LPV_GI = 1 << 6;
    }
}

impl SceneFlags {
    /// The shadow flag of one light type.
    pub fn shadow(light_type: LightType) -> Self {
        match light_type {
            LightType::Directional => Self::SHADOW_DIRECTIONAL,
            LightType::Point => Self::SHADOW_POINT,
            LightType::Spot => Self::SHADOW_SPOT,
        }
    }
}

type SamplerView = CacheView<Sampler, SamplerDescriptor<'static>>;

/// The name of the node every scene starts with.
pub const ROOT_NODE: &str = "RootNode";

/// A scene of an [`Engine`].
pub struct Scene {
    name: String,
    engine: Arc<Engine>,
    root: Arc<SceneNode>,
    nodes: Cache<SceneNode>,
    lights: LightCache,
    samplers: Mutex<SamplerView>,
    fog: AtomicBool,
}

impl Scene {
    pub(crate) fn new(name: impl Into<String>, engine: Arc<Engine>) -> Result<Self, ResourceError> {
        let name = name.into();
        let buffer = Arc::new(engine.create_light_buffer()?);
        let lights = LightCache::new(name.clone(), buffer, engine.light_ids().clone());
        let nodes = Cache::new("NodeCache", |name: &String, ()| {
            Arc::new(SceneNode::new(name.clone()))
        });
        let root = nodes.add(ROOT_NODE.to_string(), ());
        let device = engine.device().clone();
        let samplers = CacheView::new(format!("{name}/Samplers"), engine.samplers().clone())
            .with_cleaner(move |_, sampler: &Arc<Sampler>| sampler.cleanup(device.as_ref()));
        log::debug!("Scene '{name}' created");
        Ok(Self {
            name,
            engine,
            root,
            nodes,
            lights,
            samplers: Mutex::new(samplers),
            fog: AtomicBool::new(false),
        })
    }

    /// The scene name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The owning engine.
    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    /// The root of the node hierarchy.
    pub fn root(&self) -> &Arc<SceneNode> {
        &self.root
    }

    /// The scene's nodes.
    pub fn nodes(&self) -> &Cache<SceneNode> {
        &self.nodes
    }

    /// The scene's lights.
    pub fn lights(&self) -> &LightCache {
        &self.lights
    }

    /// Creates a node under `parent`, or under the root when `parent` is `None`.
    ///
    /// Returns the existing node, untouched, if the name is taken.
    pub fn add_node(
        &self,
        name: impl Into<String>,
        parent: Option<&Arc<SceneNode>>,
    ) -> Arc<SceneNode> {
        let name = name.into();
        let (node, created) = self.nodes.try_add(name.clone(), true, ());
        if created {
            node.attach_to(parent.unwrap_or(&self.root));
        } else {
            log::warn!("Scene '{}': node '{name}' already exists", self.name);
        }
        node
    }

    /// Creates a light attached to `node`.
    pub fn add_light(
        &self,
        name: impl Into<String>,
        category: LightCategory,
        node: Option<Arc<SceneNode>>,
    ) -> Arc<Light> {
        self.lights.add(name, category, node)
    }

    fn sampler_view(&self) -> MutexGuard<'_, SamplerView> {
        self.samplers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the engine sampler named `name`, creating it for this scene if
    /// needed. Samplers created here are released with the scene.
    ///
    /// # Errors
    ///
    /// Propagates the device error if the GPU sampler can't be created; the
    /// sampler is not kept in that case.
    pub fn add_sampler(
        &self,
        name: impl Into<String>,
        descriptor: SamplerDescriptor<'static>,
    ) -> Result<Arc<Sampler>, ResourceError> {
        let name = name.into();
        let mut view = self.sampler_view();
        let (sampler, created) = view.try_add(name.clone(), false, descriptor);
        if let Err(e) = sampler.initialise(self.engine.device().as_ref()) {
            if created {
                view.remove(name.as_str());
            }
            return Err(e);
        }
        Ok(sampler)
    }

    /// Removes a sampler this scene created. Samplers of other owners are
    /// left alone.
    pub fn remove_sampler(&self, name: &str) -> Option<Arc<Sampler>> {
        let mut view = self.sampler_view();
        if view.is_tracked(name) {
            view.remove(name)
        } else {
            None
        }
    }

    /// Names of the samplers this scene created.
    pub fn samplers(&self) -> Vec<String> {
        self.sampler_view().tracked().cloned().collect()
    }

    /// Turns distance fog on or off.
    pub fn set_fog(&self, enabled: bool) {
        self.fog.store(enabled, Ordering::Relaxed);
    }

    /// Derives the feature set of the current content.
    pub fn scene_flags(&self) -> SceneFlags {
        let mut flags = SceneFlags::empty();
        if self.fog.load(Ordering::Relaxed) {
            flags |= SceneFlags::FOG;
        }
        let gi_enabled = self.engine.settings().gi_enabled;
        for light in self.lights.lights() {
            let shadow = light.shadow_config();
            if shadow.shadow_type == ShadowType::None {
                continue;
            }
            flags |= SceneFlags::shadow(light.light_type());
            if !gi_enabled {
                continue;
            }
            flags |= match shadow.gi_type {
                GlobalIlluminationType::None => SceneFlags::empty(),
                GlobalIlluminationType::Rsm => SceneFlags::RSM_GI,
                GlobalIlluminationType::Lpv | GlobalIlluminationType::LpvGeometry => {
                    SceneFlags::LPV_GI
                }
                GlobalIlluminationType::LayeredLpv
                | GlobalIlluminationType::LayeredLpvGeometry => SceneFlags::LAYERED_LPV_GI,
            };
        }
        flags
    }

    /// CPU-side per-frame update: writes the dirty light records.
    pub fn update(&self, updater: &CpuUpdater) -> Result<usize, ResourceError> {
        self.lights.update(updater)
    }

    /// Records the pending light buffer upload.
    pub fn upload(&self, encoder: &mut dyn CommandEncoder) -> bool {
        self.lights.upload(encoder)
    }

    /// Moves every node and light into `other` and leaves this scene empty.
    ///
    /// Nodes hanging off this scene's root are re-parented to `other`'s root.
    /// Name clashes keep `other`'s element.
    pub fn merge_into(&self, other: &Scene) {
        log::info!("Merging scene '{}' into '{}'", self.name, other.name);
        self.nodes
            .merge_into_with(&other.nodes, |name, node, destination| {
                if Arc::ptr_eq(&node, &self.root) {
                    return;
                }
                if node.parent().is_some_and(|p| Arc::ptr_eq(&p, &self.root)) {
                    node.attach_to(&other.root);
                }
                let (_, inserted) = destination.insert_if_absent(name, node);
                if !inserted {
                    log::warn!(
                        "Scene '{}': node name clash, keeping the existing node",
                        other.name
                    );
                }
            });
        self.lights.merge_into(&other.lights);
    }

    /// Unregisters the lights and releases the scene's samplers.
    pub fn cleanup(&self) {
        self.lights.cleanup();
        self.sampler_view().clear();
    }
}

impl fmt::Debug for Scene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scene")
            .field("name", &self.name)
            .field("nodes", &self.nodes.len())
            .field("lights", &self.lights.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::ShadowConfig;
    use pollux_core::math::Vec3;
    use pollux_core::testing::RecordingDevice;
    use pollux_core::RenderSettings;

    fn engine(device: &RecordingDevice) -> Arc<Engine> {
        Engine::new(Arc::new(device.clone()), RenderSettings::default())
    }

    #[test]
    fn nodes_hang_off_the_root() {
        let device = RecordingDevice::new();
        let scene = engine(&device).create_scene("main").unwrap();
        let arm = scene.add_node("arm", None);
        let hand = scene.add_node("hand", Some(&arm));
        assert!(Arc::ptr_eq(&arm.parent().unwrap(), scene.root()));
        assert!(Arc::ptr_eq(&hand.parent().unwrap(), &arm));

        let again = scene.add_node("arm", Some(&hand));
        assert!(Arc::ptr_eq(&again, &arm));
        assert!(Arc::ptr_eq(&arm.parent().unwrap(), scene.root()));
    }

    #[test]
    fn flags_follow_light_content() {
        let device = RecordingDevice::new();
        let scene = engine(&device).create_scene("main").unwrap();
        assert_eq!(scene.scene_flags(), SceneFlags::empty());

        let sun = scene.add_light("sun", LightCategory::Directional, None);
        sun.set_shadow_config(ShadowConfig {
            shadow_type: ShadowType::Pcf,
            gi_type: GlobalIlluminationType::LayeredLpv,
            ..ShadowConfig::default()
        });
        scene.set_fog(true);
        assert_eq!(
            scene.scene_flags(),
            SceneFlags::FOG | SceneFlags::SHADOW_DIRECTIONAL | SceneFlags::LAYERED_LPV_GI
        );
    }

    #[test]
    fn gi_flags_respect_settings() {
        let device = RecordingDevice::new();
        let settings = RenderSettings {
            gi_enabled: false,
            ..RenderSettings::default()
        };
        let scene = Engine::new(Arc::new(device), settings)
            .create_scene("main")
            .unwrap();
        let lamp = scene.add_light("lamp", LightCategory::Point { range: 3.0 }, None);
        lamp.set_shadow_config(ShadowConfig {
            shadow_type: ShadowType::Raw,
            gi_type: GlobalIlluminationType::Rsm,
            ..ShadowConfig::default()
        });
        assert_eq!(scene.scene_flags(), SceneFlags::SHADOW_POINT);
    }

    #[test]
    fn scene_samplers_are_released_with_the_scene() {
        let device = RecordingDevice::new();
        let engine = engine(&device);
        let shared = engine
            .samplers()
            .add("shared".into(), SamplerDescriptor::default());
        {
            let scene = engine.create_scene("main").unwrap();
            let reused = scene
                .add_sampler("shared", SamplerDescriptor::default())
                .unwrap();
            assert!(Arc::ptr_eq(&reused, &shared));
            scene
                .add_sampler("local", SamplerDescriptor::default())
                .unwrap();
            assert_eq!(scene.samplers(), ["local"]);
            assert_eq!(device.sampler_count(), 2);
        }
        assert!(engine.samplers().has("shared"));
        assert!(!engine.samplers().has("local"));
        assert_eq!(device.sampler_count(), 1);
    }

    #[test]
    fn merge_moves_nodes_and_lights() {
        let device = RecordingDevice::new();
        let engine = engine(&device);
        let level = engine.create_scene("level").unwrap();
        let streamed = engine.create_scene("streamed").unwrap();
        let pillar = streamed.add_node("pillar", None);
        pillar.set_position(Vec3::new(1.0, 2.0, 3.0));
        let torch = streamed.add_light(
            "torch",
            LightCategory::Point { range: 4.0 },
            Some(pillar.clone()),
        );

        streamed.merge_into(&level);

        assert!(streamed.nodes().is_empty());
        assert!(streamed.lights().is_empty());
        assert!(level.nodes().has("pillar"));
        assert!(Arc::ptr_eq(&pillar.parent().unwrap(), level.root()));
        assert_eq!(torch.scene(), "level");
        assert!(level.lights().buffer().index_of(torch.id()).is_some());
        assert_eq!(torch.position(), Vec3::new(1.0, 2.0, 3.0));
    }
}
