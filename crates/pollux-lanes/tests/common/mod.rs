#![allow(dead_code)]

use pollux_core::math::{Extent3D, Vec3};
use pollux_core::renderer::GraphicsDevice;
use pollux_core::testing::RecordingDevice;
use pollux_core::RenderSettings;
use pollux_data::scene::{
    GlobalIlluminationType, Light, LightCategory, Scene, SceneNode, ShadowConfig, ShadowType,
};
use pollux_data::Engine;
use pollux_lanes::lighting_lane::{
    GBufferResult, LightPassInputs, LightPassResult, LightingInputs, ShadowMapResult,
};
use std::sync::Arc;

pub struct Harness {
    pub device: RecordingDevice,
    pub shared: Arc<dyn GraphicsDevice>,
    pub engine: Arc<Engine>,
    pub scene: Scene,
}

pub fn settings() -> RenderSettings {
    RenderSettings {
        lpv_propagation_steps: 2,
        lpv_grid_size: 4,
        shadow_map_size: 4,
        max_lights_per_type: 8,
        render_size: (8, 8),
        ..RenderSettings::default()
    }
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(settings())
    }

    pub fn with_settings(settings: RenderSettings) -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        let device = RecordingDevice::new();
        let shared: Arc<dyn GraphicsDevice> = Arc::new(device.clone());
        let engine = Engine::new(shared.clone(), settings);
        let scene = engine.create_scene("Main").unwrap();
        Self {
            device,
            shared,
            engine,
            scene,
        }
    }

    pub fn gbuffer(&self) -> Arc<GBufferResult> {
        let (width, height) = self.engine.settings().render_size;
        let size = Extent3D::d2(width, height);
        Arc::new(GBufferResult::create(self.shared.clone(), "GBuffer", size).unwrap())
    }

    pub fn inputs(&self) -> LightingInputs {
        let settings = self.engine.settings();
        let (width, height) = settings.render_size;
        LightingInputs {
            gbuffer: self.gbuffer(),
            result: Arc::new(
                LightPassResult::create(
                    self.shared.clone(),
                    "LightPass",
                    Extent3D::d2(width, height),
                )
                .unwrap(),
            ),
            light_pass: LightPassInputs {
                light_buffer: self.scene.lights().buffer().clone(),
                shadow_maps: ShadowMapResult::create_all(&self.shared, settings.shadow_map_size)
                    .unwrap(),
                lighting_model: 1,
                gi_enabled: settings.gi_enabled,
            },
        }
    }

    /// A node of the scene placed at `position`.
    pub fn node(&self, name: &str, position: Vec3) -> Arc<SceneNode> {
        let node = self.scene.add_node(name, None);
        node.set_position(position);
        node
    }

    pub fn light(&self, name: &str, category: LightCategory, position: Vec3) -> Arc<Light> {
        let node = self.node(&format!("{name}Node"), position);
        self.scene.add_light(name, category, Some(node))
    }

    pub fn gi_light(
        &self,
        name: &str,
        category: LightCategory,
        gi_type: GlobalIlluminationType,
    ) -> Arc<Light> {
        let light = self.light(name, category, Vec3::new(0.0, 0.0, -5.0));
        light.set_shadow_config(ShadowConfig {
            shadow_type: ShadowType::Pcf,
            gi_type,
            ..ShadowConfig::default()
        });
        light
    }
}
