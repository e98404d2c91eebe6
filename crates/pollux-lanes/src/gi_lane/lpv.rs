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

//! Light propagation volumes.
//!
//! The registered lights inject their reflective shadow maps into a volume of
//! spherical-harmonics cells. The volume is then propagated a fixed number of
//! times, ping-ponging between two volumes while accumulating every step, and
//! the accumulation is finally resolved into the diffuse lighting target.
//!
//! Layered volumes run the whole chain once per cascade; the finest cascade
//! follows the camera.

use super::config_buffer::ConfigBuffer;
use super::fullscreen::{FullscreenPass, FullscreenPassDesc};
use crate::lighting_lane::{
    DsTexture, LightingInputs, LpTexture, LpvTexture, SmTexture, TextureRole,
};
use pollux_core::graph::{FrameGraph, ImageDesc, ImageId, RunnableGraph};
use pollux_core::math::{Aabb, Extent3D, Vec3};
use pollux_core::renderer::{
    BlendMode, BufferId, CommandBufferId, CommandEncoder, GraphicsDevice, RenderError,
    ResourceError,
};
use pollux_core::RenderSettings;
use pollux_data::scene::{Camera, GlobalIlluminationType, Light, LightId, LightType};
use std::fmt;
use std::sync::{Arc, Weak};

/// Number of cascades of a layered volume.
pub const LAYERED_LEVELS: usize = 3;

const CUBE_FACES: [&str; 6] = [
    "PositiveX",
    "NegativeX",
    "PositiveY",
    "NegativeY",
    "PositiveZ",
    "NegativeZ",
];

/// The flavour of a propagation volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LpvVariant {
    /// Geometry occlusion is injected and used from the second step on.
    pub geometry: bool,
    /// The volume is cascaded around the camera.
    pub layered: bool,
}

impl LpvVariant {
    /// The variant `light` feeds, if it uses a propagation volume at all.
    ///
    /// Only directional lights are cascaded; other lights asking for layered
    /// volumes get a single one.
    pub fn of(light: &Light) -> Option<Self> {
        let gi_type = light.shadow_config().gi_type;
        if !light.casts_shadows() || !gi_type.is_lpv() {
            return None;
        }
        let layered = matches!(
            gi_type,
            GlobalIlluminationType::LayeredLpv | GlobalIlluminationType::LayeredLpvGeometry
        ) && light.light_type() == LightType::Directional;
        Some(Self {
            geometry: gi_type.uses_geometry(),
            layered,
        })
    }

    /// The number of cascades.
    pub fn levels(self) -> usize {
        if self.layered {
            LAYERED_LEVELS
        } else {
            1
        }
    }

    fn name(self) -> &'static str {
        match (self.layered, self.geometry) {
            (false, false) => "LPV",
            (false, true) => "LPVG",
            (true, false) => "LLPV",
            (true, true) => "LLPVG",
        }
    }
}

/// Per-light parameters read by the injection programs.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LpvLightConfig {
    /// Attenuation of the propagated light.
    pub indirect_attenuation: f32,
    /// Scale of the surfel area injected per shadow-map texel.
    pub texel_area_modifier: f32,
    /// Index of the light's shadow map layer.
    pub shadow_map_index: i32,
    /// Shadow map faces injected, six for point lights.
    pub face_count: u32,
}

impl LpvLightConfig {
    fn of(light: &Light) -> Self {
        let lpv = light.shadow_config().lpv;
        Self {
            indirect_attenuation: lpv.indirect_attenuation,
            texel_area_modifier: lpv.texel_area_modifier,
            shadow_map_index: light.shadow_map_index(),
            face_count: if light.light_type() == LightType::Point {
                6
            } else {
                1
            },
        }
    }
}

/// Placement of one cascade in world space.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LpvGridConfig {
    /// Centre of the volume.
    pub center: [f32; 3],
    /// Edge length of one cell.
    pub cell_size: f32,
    /// Cells per edge.
    pub grid_size: u32,
    /// Cascade index, zero being the finest.
    pub level: u32,
    _padding: [u32; 2],
}

impl LpvGridConfig {
    fn new(center: Vec3, cell_size: f32, grid_size: u32, level: u32) -> Self {
        Self {
            center: center.to_array(),
            cell_size,
            grid_size,
            level,
            _padding: [0; 2],
        }
    }

    /// Grids covering `bounds`, one per cascade.
    ///
    /// The coarsest cascade spans the whole bounds; each finer one halves the
    /// cell size and is centred on the camera. Centres snap to the cell size
    /// so a moving camera does not make the volume swim.
    pub fn compute(
        variant: LpvVariant,
        grid_size: u32,
        camera: &Camera,
        bounds: &Aabb,
    ) -> Vec<Self> {
        let extent = (bounds.max - bounds.min).max_element().max(f32::EPSILON);
        let coarse = extent / grid_size as f32;
        let levels = variant.levels();
        (0..levels)
            .map(|level| {
                let cell_size = coarse / (1u32 << (levels - 1 - level)) as f32;
                let centre = if level + 1 == levels {
                    bounds.center()
                } else {
                    camera.position
                };
                Self::new(centre.snapped(cell_size), cell_size, grid_size, level as u32)
            })
            .collect()
    }
}

struct LightLpv {
    id: LightId,
    name: String,
    light_type: LightType,
    light: Weak<Light>,
    config: ConfigBuffer<LpvLightConfig>,
}

/// The propagation volume chain of one [`LpvVariant`].
pub struct LightPropagationVolumes {
    device: Arc<dyn GraphicsDevice>,
    inputs: LightingInputs,
    variant: LpvVariant,
    grid_size: u32,
    steps: u32,
    grids: Vec<ConfigBuffer<LpvGridConfig>>,
    lights: Vec<LightLpv>,
    placement: Option<(Aabb, Vec3, Vec3)>,
    runnable: Option<RunnableGraph>,
}

impl LightPropagationVolumes {
    /// Creates the grid buffers of an empty chain.
    pub fn new(
        device: Arc<dyn GraphicsDevice>,
        settings: &RenderSettings,
        inputs: LightingInputs,
        variant: LpvVariant,
    ) -> Result<Self, ResourceError> {
        let grids = (0..variant.levels())
            .map(|level| {
                ConfigBuffer::new(
                    device.clone(),
                    format!("{}/Grid{level}", variant.name()),
                    &LpvGridConfig::new(Vec3::ZERO, 1.0, settings.lpv_grid_size, level as u32),
                )
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            device,
            inputs,
            variant,
            grid_size: settings.lpv_grid_size,
            steps: settings.lpv_propagation_steps,
            grids,
            lights: Vec::new(),
            placement: None,
            runnable: None,
        })
    }

    /// The variant this chain implements.
    pub fn variant(&self) -> LpvVariant {
        self.variant
    }

    /// Adds `light` to the injected lights.
    ///
    /// Returns `Ok(false)` if the light feeds another variant or is already
    /// registered. A registration after [`compile`](Self::compile) recompiles
    /// the whole graph.
    pub fn register_light(&mut self, light: &Arc<Light>) -> Result<bool, RenderError> {
        if LpvVariant::of(light) != Some(self.variant) || self.has_light(light.id()) {
            return Ok(false);
        }
        let config = ConfigBuffer::new(
            self.device.clone(),
            format!("{}/{}/Config", self.variant.name(), light.name()),
            &LpvLightConfig::of(light),
        )?;
        self.lights.push(LightLpv {
            id: light.id(),
            name: light.name().to_string(),
            light_type: light.light_type(),
            light: Arc::downgrade(light),
            config,
        });
        log::debug!("{}: registered light '{}'", self.variant.name(), light.name());
        if self.runnable.is_some() {
            log::info!(
                "{}: light '{}' registered after compile, recompiling",
                self.variant.name(),
                light.name()
            );
            self.compile()?;
        }
        Ok(true)
    }

    /// Removes the light `id` from the injected lights.
    ///
    /// Returns `Ok(false)` if the light was not registered. A compiled chain is
    /// recompiled, or dropped if no light is left.
    pub fn unregister_light(&mut self, id: LightId) -> Result<bool, RenderError> {
        let Some(index) = self.lights.iter().position(|l| l.id == id) else {
            return Ok(false);
        };
        let removed = self.lights.remove(index);
        log::debug!("{}: unregistered light '{}'", self.variant.name(), removed.name);
        if self.runnable.is_some() {
            if self.lights.is_empty() {
                self.runnable = None;
            } else {
                log::info!(
                    "{}: light '{}' unregistered, recompiling",
                    self.variant.name(),
                    removed.name
                );
                self.compile()?;
            }
        }
        Ok(true)
    }

    /// Returns `true` if `id` is registered.
    pub fn has_light(&self, id: LightId) -> bool {
        self.lights.iter().any(|l| l.id == id)
    }

    /// Registered lights, in registration order.
    pub fn light_ids(&self) -> Vec<LightId> {
        self.lights.iter().map(|l| l.id).collect()
    }

    /// The number of registered lights.
    pub fn light_count(&self) -> usize {
        self.lights.len()
    }

    /// Forgets every light and drops the compiled graph.
    pub fn cleanup(&mut self) {
        self.runnable = None;
        self.lights.clear();
        self.placement = None;
    }

    fn build(&self) -> FrameGraph {
        let mut graph = FrameGraph::new(self.variant.name());
        let grid = Extent3D::cube(self.grid_size);
        let depth = self.inputs.gbuffer.import(&mut graph, DsTexture::Depth);
        let data1 = self.inputs.gbuffer.import(&mut graph, DsTexture::Data1);
        let diffuse = self.inputs.result.import(&mut graph, LpTexture::Diffuse);
        let light_buffer = self.inputs.light_pass.light_buffer.gpu_buffer();

        let mut shadow_images: [Option<[ImageId; 3]>; 3] = [None; 3];
        for lpv in &self.lights {
            let light_type = lpv.light_type;
            if shadow_images[light_type.index()].is_none() {
                let maps = &self.inputs.light_pass.shadow_maps[light_type.index()];
                shadow_images[light_type.index()] =
                    Some([SmTexture::Normal, SmTexture::Position, SmTexture::Flux]
                        .map(|map| maps.import(&mut graph, map)));
            }
        }

        let mut resolved = Vec::new();
        for (level, grid_buffer) in self.grids.iter().enumerate() {
            let grid_buffer = grid_buffer.buffer();
            let volume = |graph: &mut FrameGraph, name: &str| {
                let prefix = format!("{name}{level}");
                [LpvTexture::R, LpvTexture::G, LpvTexture::B]
                    .map(|role| graph.create_image(role.image_desc(&prefix, grid)))
            };
            let injection = volume(&mut graph, "Injection");
            let propagate = [
                volume(&mut graph, "PropagateA"),
                volume(&mut graph, "PropagateB"),
            ];
            let accumulation = volume(&mut graph, "Accumulation");
            let geometry = self.variant.geometry.then(|| {
                graph.create_image(ImageDesc {
                    name: format!("Geometry{level}"),
                    ..LpvTexture::R.image_desc("", grid)
                })
            });

            let cleared: Vec<ImageId> = injection.iter().copied().chain(geometry).collect();
            let mut clear =
                FullscreenPassDesc::triangle("", BlendMode::Replace).clearing(cleared.len());
            clear.vertices = 0;
            let clear_pass =
                graph.create_pass(format!("Clear{level}"), FullscreenPass::factory(clear));
            for image in cleared {
                graph.add_output_colour_view(clear_pass, image);
            }

            for lpv in &self.lights {
                self.declare_injection(
                    &mut graph,
                    lpv,
                    level,
                    [light_buffer, lpv.config.buffer(), grid_buffer],
                    shadow_images[lpv.light_type.index()],
                    &injection,
                    geometry,
                );
            }

            for step in 0..self.steps {
                let occlusion = geometry.filter(|_| step > 0);
                let source = match step {
                    0 => injection,
                    _ => propagate[(step as usize - 1) % 2],
                };
                let target = propagate[step as usize % 2];
                let desc = FullscreenPassDesc {
                    program: if occlusion.is_some() {
                        "lpv/propagate_occlusion".to_string()
                    } else {
                        "lpv/propagate".to_string()
                    },
                    blend: if step == 0 {
                        BlendMode::Replace
                    } else {
                        BlendMode::Additive
                    },
                    cleared: [true; 3].into_iter().chain([step == 0; 3]).collect(),
                    vertices: 3,
                    instances: self.grid_size,
                    buffers: vec![grid_buffer],
                };
                let pass = graph.create_pass(
                    format!("Propagate{level}/{step}"),
                    FullscreenPass::factory(desc),
                );
                for image in source.into_iter().chain(occlusion) {
                    graph.add_sampled_view(pass, image);
                }
                for image in target.into_iter().chain(accumulation) {
                    graph.add_output_colour_view(pass, image);
                }
            }
            resolved.extend(if self.steps == 0 { injection } else { accumulation });
        }

        let program = if self.variant.layered {
            "lpv/resolve_layered"
        } else {
            "lpv/resolve"
        };
        let mut desc = FullscreenPassDesc::triangle(program, BlendMode::Additive);
        desc.buffers = self.grids.iter().map(ConfigBuffer::buffer).collect();
        let resolve = graph.create_pass("LpvResolve", FullscreenPass::factory(desc));
        for image in [depth, data1].into_iter().chain(resolved) {
            graph.add_sampled_view(resolve, image);
        }
        graph.add_output_colour_view(resolve, diffuse);
        graph
    }

    #[allow(clippy::too_many_arguments)]
    fn declare_injection(
        &self,
        graph: &mut FrameGraph,
        lpv: &LightLpv,
        level: usize,
        buffers: [BufferId; 3],
        shadow_images: Option<[ImageId; 3]>,
        injection: &[ImageId; 3],
        geometry: Option<ImageId>,
    ) {
        let light_type = lpv.light_type;
        let faces: Vec<String> = match light_type {
            LightType::Point => CUBE_FACES
                .iter()
                .map(|face| format!("{}/{face}", lpv.name))
                .collect(),
            LightType::Directional | LightType::Spot => vec![lpv.name.clone()],
        };
        let size = self.inputs.light_pass.shadow_maps[light_type.index()].size();
        let texels = size.width * size.height;
        let shadow_images: Vec<ImageId> = shadow_images.into_iter().flatten().collect();

        for face in faces {
            let desc = FullscreenPassDesc {
                program: format!("lpv/inject/{}", light_type.name()),
                blend: BlendMode::Additive,
                cleared: Vec::new(),
                vertices: texels,
                instances: 1,
                buffers: buffers.to_vec(),
            };
            let pass = graph.create_pass(
                format!("{face}/LightInjection{level}"),
                FullscreenPass::factory(desc),
            );
            for image in &shadow_images {
                graph.add_sampled_view(pass, *image);
            }
            for image in injection {
                graph.add_output_colour_view(pass, *image);
            }

            if let Some(geometry) = geometry {
                let desc = FullscreenPassDesc {
                    program: "lpv/inject_geometry".to_string(),
                    blend: BlendMode::Additive,
                    cleared: Vec::new(),
                    vertices: texels,
                    instances: 1,
                    buffers: buffers.to_vec(),
                };
                let pass = graph.create_pass(
                    format!("{face}/GeomInjection{level}"),
                    FullscreenPass::factory(desc),
                );
                for image in shadow_images.iter().take(2) {
                    graph.add_sampled_view(pass, *image);
                }
                graph.add_output_colour_view(pass, geometry);
            }
        }
    }

    /// Builds and compiles the graph, replacing any previous compile.
    pub fn compile(&mut self) -> Result<(), RenderError> {
        self.runnable = None;
        let graph = self.build();
        self.runnable = Some(graph.compile(&self.device)?);
        Ok(())
    }

    /// Returns `true` once the graph is compiled.
    pub fn is_compiled(&self) -> bool {
        self.runnable.is_some()
    }

    /// Pass names in execution order, empty before [`compile`](Self::compile).
    pub fn pass_order(&self) -> Vec<String> {
        self.runnable
            .as_ref()
            .map(|r| r.pass_order().into_iter().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Rewrites the light parameters, and the grids if the camera or the scene
    /// bounds moved. Returns `true` if the grids were rewritten.
    pub fn update(&mut self, camera: &Camera, bounds: &Aabb) -> Result<bool, ResourceError> {
        for lpv in &self.lights {
            if let Some(light) = lpv.light.upgrade() {
                lpv.config.write(&LpvLightConfig::of(&light))?;
            }
        }
        let placement = (*bounds, camera.position, camera.forward);
        if self.placement == Some(placement) {
            return Ok(false);
        }
        let configs = LpvGridConfig::compute(self.variant, self.grid_size, camera, bounds);
        for (buffer, config) in self.grids.iter().zip(&configs) {
            buffer.write(config)?;
        }
        self.placement = Some(placement);
        Ok(true)
    }

    /// Records the chain into `encoder`. Does nothing before compile.
    pub fn record(&self, encoder: &mut dyn CommandEncoder) -> Result<(), RenderError> {
        match &self.runnable {
            Some(runnable) => runnable.record(encoder),
            None => Ok(()),
        }
    }

    /// Records and submits the chain. Returns `None` when there is nothing to run.
    pub fn run(&self) -> Result<Option<CommandBufferId>, RenderError> {
        match &self.runnable {
            Some(runnable) if !self.lights.is_empty() => runnable.run().map(Some),
            _ => Ok(None),
        }
    }
}

impl fmt::Debug for LightPropagationVolumes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LightPropagationVolumes")
            .field("variant", &self.variant)
            .field("lights", &self.lights.len())
            .field("compiled", &self.runnable.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use pollux_data::scene::{LightCategory, ShadowConfig, ShadowType};

    fn light(category: LightCategory, gi_type: GlobalIlluminationType) -> Light {
        let light = Light::new(LightId(1), "l", "s", category);
        light.set_shadow_config(ShadowConfig {
            shadow_type: ShadowType::Pcf,
            gi_type,
            ..ShadowConfig::default()
        });
        light
    }

    #[test]
    fn variant_follows_the_light() {
        let sun = light(LightCategory::Directional, GlobalIlluminationType::LayeredLpvGeometry);
        assert_eq!(
            LpvVariant::of(&sun),
            Some(LpvVariant {
                geometry: true,
                layered: true
            })
        );
        let lamp = light(
            LightCategory::Point { range: 1.0 },
            GlobalIlluminationType::LayeredLpv,
        );
        assert_eq!(
            LpvVariant::of(&lamp),
            Some(LpvVariant {
                geometry: false,
                layered: false
            })
        );
        let rsm = light(LightCategory::Directional, GlobalIlluminationType::Rsm);
        assert_eq!(LpvVariant::of(&rsm), None);
    }

    #[test]
    fn cascades_halve_the_cell_size() {
        let variant = LpvVariant {
            geometry: false,
            layered: true,
        };
        let bounds = Aabb::from_min_max(Vec3::splat(-16.0), Vec3::splat(16.0));
        let camera = Camera {
            position: Vec3::new(3.3, 0.0, 0.0),
            ..Camera::default()
        };
        let grids = LpvGridConfig::compute(variant, 32, &camera, &bounds);
        assert_eq!(grids.len(), LAYERED_LEVELS);
        assert_relative_eq!(grids[2].cell_size, 1.0);
        assert_relative_eq!(grids[1].cell_size, 0.5);
        assert_relative_eq!(grids[0].cell_size, 0.25);
        assert_relative_eq!(grids[0].center[0], 3.25);
        assert_eq!(grids[2].center, [0.0; 3]);
        assert_eq!(std::mem::size_of::<LpvGridConfig>(), 32);
    }
}
