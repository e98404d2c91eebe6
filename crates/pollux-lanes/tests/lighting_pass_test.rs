mod common;

use common::Harness;
use pollux_core::graph::FrameGraph;
use pollux_core::math::Vec3;
use pollux_core::renderer::RenderError;
use pollux_core::testing::RecordedCommand;
use pollux_data::scene::{Camera, CpuUpdater, LightCategory, LightType, SceneFlags};
use pollux_lanes::lighting_lane::{LightPassState, LightingPass, LpTexture, TextureRole};

fn point(range: f32) -> LightCategory {
    LightCategory::Point { range }
}

#[test]
fn lights_enabled_before_compile_are_replayed() {
    let h = Harness::new();
    let sun = h.light("sun", LightCategory::Directional, Vec3::ZERO);
    h.scene.update(&CpuUpdater::default()).unwrap();

    let mut graph = FrameGraph::new("Lighting");
    let lighting = LightingPass::declare(&mut graph, None, h.inputs());
    assert!(lighting.light_pass().is_none());
    assert!(!lighting
        .enable_light(&Camera::default(), &sun, SceneFlags::empty())
        .unwrap());
    assert_eq!(lighting.pending_count(), 1);

    let _runnable = graph.compile(&h.shared).unwrap();
    let pass = lighting.light_pass().unwrap();
    assert_eq!(lighting.pending_count(), 0);
    assert_eq!(pass.enabled_lights(), vec![sun.id()]);
    assert_eq!(pass.state(), LightPassState::LightsEnabled);
}

#[test]
fn disabling_a_pending_light_forgets_it() {
    let h = Harness::new();
    let sun = h.light("sun", LightCategory::Directional, Vec3::ZERO);
    let mut graph = FrameGraph::new("Lighting");
    let lighting = LightingPass::declare(&mut graph, None, h.inputs());
    lighting
        .enable_light(&Camera::default(), &sun, SceneFlags::empty())
        .unwrap();
    assert!(lighting.disable_light(sun.id()));
    assert_eq!(lighting.pending_count(), 0);
}

#[test]
fn update_culls_lights_outside_the_frustum() {
    let h = Harness::new();
    let sun = h.light("sun", LightCategory::Directional, Vec3::ZERO);
    let front = h.light("front", point(2.0), Vec3::new(0.0, 0.0, -10.0));
    let behind = h.light("behind", point(2.0), Vec3::new(0.0, 0.0, 50.0));
    let updater = CpuUpdater::default();
    h.scene.update(&updater).unwrap();

    let mut graph = FrameGraph::new("Lighting");
    let lighting = LightingPass::declare(&mut graph, None, h.inputs());
    let _runnable = graph.compile(&h.shared).unwrap();

    assert_eq!(lighting.update(&updater, &h.scene).unwrap(), 2);
    let enabled = lighting.light_pass().unwrap().enabled_lights();
    assert_eq!(enabled, vec![sun.id(), front.id()]);
    assert!(!enabled.contains(&behind.id()));

    // Turning around swaps the point lights.
    let turned = CpuUpdater::new(
        Camera {
            forward: Vec3::Z,
            ..Camera::default()
        },
        1,
    );
    assert_eq!(lighting.update(&turned, &h.scene).unwrap(), 2);
    assert_eq!(
        lighting.light_pass().unwrap().enabled_lights(),
        vec![sun.id(), behind.id()]
    );
}

#[test]
fn pipelines_are_shared_by_configuration_and_recorded_by_light_type() {
    let h = Harness::new();
    let spot = h.light(
        "spot",
        LightCategory::Spot {
            range: 4.0,
            inner_angle: 0.3,
            outer_angle: 0.5,
        },
        Vec3::new(0.0, 0.0, -3.0),
    );
    let a = h.light("a", point(1.0), Vec3::new(1.0, 0.0, -5.0));
    let b = h.light("b", point(1.0), Vec3::new(-1.0, 0.0, -5.0));
    let sun = h.light("sun", LightCategory::Directional, Vec3::ZERO);
    let updater = CpuUpdater::default();
    h.scene.update(&updater).unwrap();

    let mut graph = FrameGraph::new("Lighting");
    let lighting = LightingPass::declare(&mut graph, None, h.inputs());
    let runnable = graph.compile(&h.shared).unwrap();
    lighting.update(&updater, &h.scene).unwrap();

    let pass = lighting.light_pass().unwrap();
    assert_eq!(pass.pipeline_count(), 3);
    let types: Vec<_> = pass.pipeline_keys().iter().map(|k| k.light_type).collect();
    assert_eq!(types, [LightType::Directional, LightType::Point, LightType::Spot]);
    assert_eq!(pass.enabled_lights(), vec![sun.id(), a.id(), b.id(), spot.id()]);

    let commands = h.device.commands(runnable.run().unwrap());
    let draws = commands
        .iter()
        .filter(|c| matches!(c, RecordedCommand::Draw { .. }))
        .count();
    assert_eq!(draws, 4);
    // The sun overwrites, the three others blend with two pipelines.
    let pipelines = commands
        .iter()
        .filter(|c| matches!(c, RecordedCommand::SetPipeline(_)))
        .count();
    assert_eq!(pipelines, 3);
    lighting.mark_rendered();
    assert_eq!(pass.state(), LightPassState::Rendered);
}

#[test]
fn outputs_are_cleared_by_the_first_pass() {
    let h = Harness::new();
    let inputs = h.inputs();
    let diffuse = inputs.result.view(LpTexture::Diffuse);
    let mut graph = FrameGraph::new("Lighting");
    let _lighting = LightingPass::declare(&mut graph, None, inputs);
    let runnable = graph.compile(&h.shared).unwrap();

    let commands = h.device.commands(runnable.run().unwrap());
    match &commands[0] {
        RecordedCommand::BeginRenderPass { label, colour, .. } => {
            assert_eq!(label.as_deref(), Some("LightPass/First"));
            assert_eq!(colour.len(), LpTexture::ALL.len());
            assert_eq!(colour[0], diffuse);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn rejected_pipelines_stop_the_frame() {
    let h = Harness::new();
    h.light("sun", LightCategory::Directional, Vec3::ZERO);
    let updater = CpuUpdater::default();
    h.scene.update(&updater).unwrap();
    let mut graph = FrameGraph::new("Lighting");
    let lighting = LightingPass::declare(&mut graph, None, h.inputs());
    let _runnable = graph.compile(&h.shared).unwrap();

    h.device.reject_pipelines(true);
    let result = lighting.update(&updater, &h.scene);
    assert!(matches!(result, Err(RenderError::ResourceError(_))));
}

#[test]
fn lights_without_a_record_wait_for_the_next_update() {
    let h = Harness::new();
    let updater = CpuUpdater::default();
    let mut graph = FrameGraph::new("Lighting");
    let lighting = LightingPass::declare(&mut graph, None, h.inputs());
    let _runnable = graph.compile(&h.shared).unwrap();
    let sun = h.light("sun", LightCategory::Directional, Vec3::ZERO);

    lighting.update(&updater, &h.scene).unwrap();
    assert!(lighting.light_pass().unwrap().enabled_lights().is_empty());

    h.scene.update(&updater).unwrap();
    lighting.update(&updater, &h.scene).unwrap();
    assert_eq!(lighting.light_pass().unwrap().enabled_lights(), vec![sun.id()]);
}
