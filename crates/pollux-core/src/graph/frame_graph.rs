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

//! Declarative frame graph.
//!
//! Passes are declared with the images they sample and write plus explicit
//! dependencies; [`FrameGraph::compile`] allocates transient images, orders the
//! passes and instantiates each pass through its factory. Image accesses imply
//! extra edges: a reader runs after the last writer declared before it, and a
//! writer runs after the previous writer of the same image.

use super::runnable::{RunnableGraph, RunnablePass};
use super::topological_sort::topological_sort;
use crate::math::Extent3D;
use crate::renderer::{
    ClearValue, GraphicsDevice, RenderError, TextureDescriptor, TextureDimension, TextureFormat,
    TextureId, TextureUsage, TextureViewId,
};
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

/// Identifies a pass within one [`FrameGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PassId(pub usize);

/// Identifies an image within one [`FrameGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageId(pub usize);

/// Describes an image known to the graph.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageDesc {
    /// Debug name of the image.
    pub name: String,
    /// Texel format.
    pub format: TextureFormat,
    /// Image size.
    pub size: Extent3D,
    /// Image dimensionality.
    pub dimension: TextureDimension,
    /// Allowed usages.
    pub usage: TextureUsage,
    /// Value used when a pass clears the image.
    pub clear_value: ClearValue,
}

/// An error raised while compiling a [`FrameGraph`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// The declared dependencies contain a cycle through the named passes.
    Cycle(Vec<String>),
    /// A pass id does not belong to this graph.
    UnknownPass(PassId),
    /// An image id does not belong to this graph.
    UnknownImage(ImageId),
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphError::Cycle(passes) => {
                write!(f, "Dependency cycle between passes: {}", passes.join(", "))
            }
            GraphError::UnknownPass(id) => write!(f, "Unknown pass {id:?}"),
            GraphError::UnknownImage(id) => write!(f, "Unknown image {id:?}"),
        }
    }
}

impl std::error::Error for GraphError {}

/// An image resolved to a concrete view at compile time.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedImage {
    /// The graph-local id.
    pub id: ImageId,
    /// The image description.
    pub desc: ImageDesc,
    /// The view passes bind or render to.
    pub view: TextureViewId,
}

/// Everything a pass factory receives when the graph is compiled.
pub struct PassContext<'a> {
    /// The device the graph is compiled against.
    pub device: &'a Arc<dyn GraphicsDevice>,
    /// The pass being instantiated.
    pub pass: PassId,
    /// The pass name.
    pub name: &'a str,
    /// Images the pass samples, in declaration order.
    pub sampled: Vec<ResolvedImage>,
    /// Colour images the pass writes, in declaration order.
    pub colour_outputs: Vec<ResolvedImage>,
    /// The depth image the pass writes, if any.
    pub depth_output: Option<ResolvedImage>,
}

/// Builds the runnable counterpart of a declared pass.
pub type PassFactory =
    Arc<dyn Fn(&PassContext<'_>) -> Result<Arc<dyn RunnablePass>, RenderError> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    Sampled,
    Colour,
    Depth,
}

enum ImageSource {
    Transient,
    Imported(TextureViewId),
}

struct ImageEntry {
    desc: ImageDesc,
    source: ImageSource,
}

struct PassEntry {
    name: String,
    factory: PassFactory,
    accesses: Vec<(ImageId, Access)>,
}

/// A declarative description of one group of GPU passes.
pub struct FrameGraph {
    name: String,
    images: Vec<ImageEntry>,
    passes: Vec<PassEntry>,
    /// `(before, after)` pairs.
    dependencies: Vec<(PassId, PassId)>,
}

impl FrameGraph {
    /// Creates an empty graph.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            images: Vec::new(),
            passes: Vec::new(),
            dependencies: Vec::new(),
        }
    }

    /// The graph name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declares a transient image, allocated when the graph is compiled.
    pub fn create_image(&mut self, desc: ImageDesc) -> ImageId {
        let id = ImageId(self.images.len());
        log::trace!("[{}] image '{}' -> {:?}", self.name, desc.name, id);
        self.images.push(ImageEntry {
            desc,
            source: ImageSource::Transient,
        });
        id
    }

    /// Declares an image owned outside the graph, such as a shadow map.
    pub fn import_image(&mut self, desc: ImageDesc, view: TextureViewId) -> ImageId {
        let id = ImageId(self.images.len());
        self.images.push(ImageEntry {
            desc,
            source: ImageSource::Imported(view),
        });
        id
    }

    /// Declares a pass. `factory` runs on every [`compile`](Self::compile).
    pub fn create_pass<F>(&mut self, name: impl Into<String>, factory: F) -> PassId
    where
        F: Fn(&PassContext<'_>) -> Result<Arc<dyn RunnablePass>, RenderError>
            + Send
            + Sync
            + 'static,
    {
        let id = PassId(self.passes.len());
        let name = name.into();
        log::trace!("[{}] pass '{}' -> {:?}", self.name, name, id);
        self.passes.push(PassEntry {
            name,
            factory: Arc::new(factory),
            accesses: Vec::new(),
        });
        id
    }

    /// Makes `pass` run after `on`.
    pub fn add_dependency(&mut self, pass: PassId, on: PassId) {
        self.dependencies.push((on, pass));
    }

    /// Declares that `pass` samples `image`.
    pub fn add_sampled_view(&mut self, pass: PassId, image: ImageId) {
        self.add_access(pass, image, Access::Sampled);
    }

    /// Declares that `pass` renders to `image` as a colour attachment.
    pub fn add_output_colour_view(&mut self, pass: PassId, image: ImageId) {
        self.add_access(pass, image, Access::Colour);
    }

    /// Declares that `pass` renders to `image` as its depth attachment.
    pub fn add_output_depth_view(&mut self, pass: PassId, image: ImageId) {
        self.add_access(pass, image, Access::Depth);
    }

    fn add_access(&mut self, pass: PassId, image: ImageId, access: Access) {
        match self.passes.get_mut(pass.0) {
            Some(entry) => entry.accesses.push((image, access)),
            None => log::warn!("[{}] access declared on unknown {:?}", self.name, pass),
        }
    }

    /// The number of declared passes.
    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    /// The name of a declared pass.
    pub fn pass_name(&self, pass: PassId) -> Option<&str> {
        self.passes.get(pass.0).map(|p| p.name.as_str())
    }

    /// The description of a declared image.
    pub fn image(&self, image: ImageId) -> Option<&ImageDesc> {
        self.images.get(image.0).map(|i| &i.desc)
    }

    /// Every ordering edge of the graph, explicit and implied, as `(before, after)`.
    pub fn edges(&self) -> Result<Vec<(PassId, PassId)>, GraphError> {
        let mut edges = Vec::with_capacity(self.dependencies.len());
        for &(before, after) in &self.dependencies {
            for id in [before, after] {
                if id.0 >= self.passes.len() {
                    return Err(GraphError::UnknownPass(id));
                }
            }
            edges.push((before, after));
        }

        let mut last_writer: Vec<Option<PassId>> = vec![None; self.images.len()];
        for (index, pass) in self.passes.iter().enumerate() {
            let id = PassId(index);
            // Reads first so a pass both sampling and writing an image depends on
            // the earlier writer only.
            for &(image, _) in &pass.accesses {
                let slot = last_writer
                    .get(image.0)
                    .ok_or(GraphError::UnknownImage(image))?;
                if let Some(writer) = *slot {
                    if writer != id {
                        edges.push((writer, id));
                    }
                }
            }
            for &(image, access) in &pass.accesses {
                if access != Access::Sampled {
                    last_writer[image.0] = Some(id);
                }
            }
        }
        Ok(edges)
    }

    /// Allocates images, orders passes and instantiates every pass.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::Cycle`] for cyclic declarations, and propagates any
    /// device or factory failure unchanged.
    pub fn compile(&self, device: &Arc<dyn GraphicsDevice>) -> Result<RunnableGraph, RenderError> {
        let edges = self.edges()?;
        let order = topological_sort((0..self.passes.len()).map(PassId), edges).map_err(|e| {
            GraphError::Cycle(
                e.0.iter()
                    .map(|id| self.passes[id.0].name.clone())
                    .collect(),
            )
        })?;

        let mut transient = TransientImages::new(device.clone());
        let mut resolved: Vec<ResolvedImage> = Vec::with_capacity(self.images.len());
        for (index, image) in self.images.iter().enumerate() {
            let view = match image.source {
                ImageSource::Imported(view) => view,
                ImageSource::Transient => {
                    let texture = device.create_texture(&TextureDescriptor {
                        label: Some(Cow::Owned(format!("{}/{}", self.name, image.desc.name))),
                        size: image.desc.size,
                        mip_level_count: 1,
                        dimension: image.desc.dimension,
                        format: image.desc.format,
                        usage: image.desc.usage,
                    })?;
                    transient.textures.push(texture);
                    device.create_texture_view(texture)?
                }
            };
            resolved.push(ResolvedImage {
                id: ImageId(index),
                desc: image.desc.clone(),
                view,
            });
        }

        let mut runnables: Vec<Arc<dyn RunnablePass>> = Vec::with_capacity(order.len());
        for id in &order {
            let pass = &self.passes[id.0];
            let pick = |wanted: Access| -> Vec<ResolvedImage> {
                pass.accesses
                    .iter()
                    .filter(|(_, a)| *a == wanted)
                    .map(|(image, _)| resolved[image.0].clone())
                    .collect()
            };
            let context = PassContext {
                device,
                pass: *id,
                name: &pass.name,
                sampled: pick(Access::Sampled),
                colour_outputs: pick(Access::Colour),
                depth_output: pick(Access::Depth).into_iter().next(),
            };
            runnables.push((pass.factory)(&context)?);
        }

        log::debug!(
            "[{}] compiled {} pass(es), {} transient image(s)",
            self.name,
            runnables.len(),
            transient.textures.len()
        );
        Ok(RunnableGraph::new(
            self.name.clone(),
            device.clone(),
            runnables,
            resolved,
            transient,
        ))
    }
}

/// Textures allocated by a compile, released when dropped.
pub(crate) struct TransientImages {
    device: Arc<dyn GraphicsDevice>,
    pub(crate) textures: Vec<TextureId>,
}

impl TransientImages {
    fn new(device: Arc<dyn GraphicsDevice>) -> Self {
        Self {
            device,
            textures: Vec::new(),
        }
    }
}

impl Drop for TransientImages {
    fn drop(&mut self) {
        for texture in self.textures.drain(..) {
            if let Err(e) = self.device.destroy_texture(texture) {
                log::warn!("Failed to release transient texture {texture:?}: {e}");
            }
        }
    }
}

impl fmt::Debug for FrameGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameGraph")
            .field("name", &self.name)
            .field("images", &self.images.len())
            .field(
                "passes",
                &self.passes.iter().map(|p| &p.name).collect::<Vec<_>>(),
            )
            .field("dependencies", &self.dependencies)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::CommandEncoder;
    use crate::testing::{RecordedCommand, RecordingDevice};

    struct LabelPass {
        name: String,
        targets: Vec<TextureViewId>,
    }

    impl RunnablePass for LabelPass {
        fn name(&self) -> &str {
            &self.name
        }

        fn record(&self, encoder: &mut dyn CommandEncoder) -> Result<(), RenderError> {
            let attachments: Vec<_> = self
                .targets
                .iter()
                .map(|view| crate::renderer::RenderPassColorAttachment {
                    view: *view,
                    ops: crate::renderer::Operations::accumulate(),
                })
                .collect();
            let _pass = encoder.begin_render_pass(&crate::renderer::RenderPassDescriptor {
                label: Some(&self.name),
                color_attachments: &attachments,
                depth_stencil_attachment: None,
            });
            Ok(())
        }
    }

    fn label_pass(ctx: &PassContext<'_>) -> Result<Arc<dyn RunnablePass>, RenderError> {
        Ok(Arc::new(LabelPass {
            name: ctx.name.to_string(),
            targets: ctx.colour_outputs.iter().map(|i| i.view).collect(),
        }))
    }

    fn colour_image(name: &str) -> ImageDesc {
        ImageDesc {
            name: name.to_string(),
            format: TextureFormat::Rgba16Float,
            size: Extent3D::d2(4, 4),
            dimension: TextureDimension::D2,
            usage: TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
            clear_value: ClearValue::TRANSPARENT,
        }
    }

    fn device() -> (RecordingDevice, Arc<dyn GraphicsDevice>) {
        let device = RecordingDevice::new();
        let shared: Arc<dyn GraphicsDevice> = Arc::new(device.clone());
        (device, shared)
    }

    #[test]
    fn explicit_dependencies_order_passes() {
        let (_, device) = device();
        let mut graph = FrameGraph::new("test");
        let resolve = graph.create_pass("resolve", label_pass);
        let inject = graph.create_pass("inject", label_pass);
        let propagate = graph.create_pass("propagate", label_pass);
        graph.add_dependency(propagate, inject);
        graph.add_dependency(resolve, propagate);

        let runnable = graph.compile(&device).unwrap();
        assert_eq!(runnable.pass_order(), vec!["inject", "propagate", "resolve"]);
    }

    #[test]
    fn sampling_depends_on_earlier_writer() {
        let mut graph = FrameGraph::new("test");
        let image = graph.create_image(colour_image("lighting"));
        let reader = graph.create_pass("reader", label_pass);
        let writer = graph.create_pass("writer", label_pass);
        graph.add_output_colour_view(writer, image);
        graph.add_sampled_view(reader, image);

        // The reader is declared first, so no implied edge exists.
        assert!(graph.edges().unwrap().is_empty());

        let late_reader = graph.create_pass("late", label_pass);
        graph.add_sampled_view(late_reader, image);
        assert_eq!(graph.edges().unwrap(), vec![(writer, late_reader)]);
    }

    #[test]
    fn ping_pong_images_do_not_form_cycles() {
        let (_, device) = device();
        let mut graph = FrameGraph::new("pingpong");
        let a = graph.create_image(colour_image("a"));
        let b = graph.create_image(colour_image("b"));
        let mut passes = Vec::new();
        for step in 0..4 {
            let pass = graph.create_pass(format!("step{step}"), label_pass);
            let (src, dst) = if step % 2 == 0 { (a, b) } else { (b, a) };
            graph.add_sampled_view(pass, src);
            graph.add_output_colour_view(pass, dst);
            passes.push(pass);
        }
        let runnable = graph.compile(&device).unwrap();
        assert_eq!(runnable.pass_order(), vec!["step0", "step1", "step2", "step3"]);
    }

    #[test]
    fn cycles_are_reported_with_pass_names() {
        let (_, device) = device();
        let mut graph = FrameGraph::new("cyclic");
        let a = graph.create_pass("a", label_pass);
        let b = graph.create_pass("b", label_pass);
        graph.add_dependency(a, b);
        graph.add_dependency(b, a);
        match graph.compile(&device) {
            Err(RenderError::Graph(GraphError::Cycle(names))) => {
                assert_eq!(names, vec!["a".to_string(), "b".to_string()])
            }
            other => panic!("expected a cycle error, got {other:?}"),
        }
    }

    #[test]
    fn transient_images_live_with_the_runnable_graph() {
        let (recording, device) = device();
        let mut graph = FrameGraph::new("alloc");
        let image = graph.create_image(colour_image("target"));
        let imported = graph.import_image(colour_image("shadow"), TextureViewId(999));
        let pass = graph.create_pass("draw", label_pass);
        graph.add_output_colour_view(pass, image);
        graph.add_sampled_view(pass, imported);

        let runnable = graph.compile(&device).unwrap();
        assert_eq!(recording.texture_count(), 1);
        let view = runnable.image_view(image).unwrap();
        assert_eq!(recording.view_format(view), Some(TextureFormat::Rgba16Float));
        assert_eq!(runnable.image_view(imported), Some(TextureViewId(999)));

        drop(runnable);
        assert_eq!(recording.texture_count(), 0);
    }

    #[test]
    fn run_records_and_submits_in_order() {
        let (recording, device) = device();
        let mut graph = FrameGraph::new("run");
        let image = graph.create_image(colour_image("target"));
        let first = graph.create_pass("first", label_pass);
        let second = graph.create_pass("second", label_pass);
        graph.add_output_colour_view(first, image);
        graph.add_output_colour_view(second, image);

        let runnable = graph.compile(&device).unwrap();
        let command_buffer = runnable.run().unwrap();
        assert_eq!(recording.submitted(), vec![command_buffer]);

        let labels: Vec<_> = recording
            .commands(command_buffer)
            .into_iter()
            .filter_map(|c| match c {
                RecordedCommand::BeginRenderPass { label, .. } => label,
                _ => None,
            })
            .collect();
        assert_eq!(labels, vec!["first".to_string(), "second".to_string()]);
    }

    #[test]
    fn unknown_image_fails_compile() {
        let (_, device) = device();
        let mut graph = FrameGraph::new("bad");
        let pass = graph.create_pass("p", label_pass);
        graph.add_sampled_view(pass, ImageId(42));
        assert!(matches!(
            graph.compile(&device),
            Err(RenderError::Graph(GraphError::UnknownImage(ImageId(42))))
        ));
    }
}
