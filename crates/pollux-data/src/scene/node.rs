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

//! Scene graph nodes.
//!
//! Nodes form a translation hierarchy: a node's world position is its local
//! position plus its parent's world position. Orientation is local. Parents and
//! attached lights are referenced weakly, the scene's node cache owns the nodes.

use super::light::{Light, LightId};
use pollux_core::math::Vec3;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};

#[derive(Debug, Clone, Copy)]
struct Transform {
    position: Vec3,
    forward: Vec3,
    up: Vec3,
}

/// A transform that lights (and other objects) attach to.
pub struct SceneNode {
    name: String,
    transform: RwLock<Transform>,
    parent: RwLock<Weak<SceneNode>>,
    children: Mutex<Vec<Weak<SceneNode>>>,
    lights: Mutex<Vec<Weak<Light>>>,
}

impl SceneNode {
    /// Creates a node at the origin, looking down -Z.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transform: RwLock::new(Transform {
                position: Vec3::ZERO,
                forward: Vec3::NEG_Z,
                up: Vec3::Y,
            }),
            parent: RwLock::new(Weak::new()),
            children: Mutex::new(Vec::new()),
            lights: Mutex::new(Vec::new()),
        }
    }

    /// The node name.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn transform(&self) -> Transform {
        *self.transform.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// The position relative to the parent.
    pub fn position(&self) -> Vec3 {
        self.transform().position
    }

    /// The position in world space.
    pub fn world_position(&self) -> Vec3 {
        let local = self.position();
        match self.parent() {
            Some(parent) => parent.world_position() + local,
            None => local,
        }
    }

    /// The normalized forward axis.
    pub fn forward(&self) -> Vec3 {
        self.transform().forward
    }

    /// The normalized up axis.
    pub fn up(&self) -> Vec3 {
        self.transform().up
    }

    /// Moves the node. Attached lights, including those of descendants, are
    /// notified.
    pub fn set_position(&self, position: Vec3) {
        self.transform
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .position = position;
        self.notify_changed(true);
    }

    /// Orients the node. Only lights attached to this node are notified.
    pub fn set_orientation(&self, forward: Vec3, up: Vec3) {
        {
            let mut transform = self.transform.write().unwrap_or_else(PoisonError::into_inner);
            transform.forward = forward.normalize();
            transform.up = up.normalize();
        }
        self.notify_changed(false);
    }

    /// The parent node, if any is alive.
    pub fn parent(&self) -> Option<Arc<SceneNode>> {
        self.parent
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .upgrade()
    }

    /// Returns `true` if `self` is `node` or one of its ancestors.
    fn is_ancestor_of(&self, node: &Arc<SceneNode>) -> bool {
        let mut current = Some(node.clone());
        while let Some(candidate) = current {
            if std::ptr::eq(Arc::as_ptr(&candidate), self) {
                return true;
            }
            current = candidate.parent();
        }
        false
    }

    /// Re-parents the node.
    ///
    /// Parenting a node under itself or one of its descendants is refused with
    /// a warning and returns `false`; the hierarchy is left unchanged.
    pub fn attach_to(self: &Arc<Self>, parent: &Arc<SceneNode>) -> bool {
        if self.is_ancestor_of(parent) {
            log::warn!(
                "SceneNode '{}': attaching to '{}' would create a cycle, ignored",
                self.name,
                parent.name
            );
            return false;
        }
        if let Some(previous) = self.parent() {
            previous
                .children
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .retain(|c| !std::ptr::eq(c.as_ptr(), Arc::as_ptr(self)));
        }
        *self.parent.write().unwrap_or_else(PoisonError::into_inner) = Arc::downgrade(parent);
        parent
            .children
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::downgrade(self));
        self.notify_changed(true);
        true
    }

    pub(crate) fn attach_light(&self, light: Weak<Light>) {
        self.lights
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(light);
    }

    pub(crate) fn detach_light(&self, id: LightId) {
        self.lights
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|l| l.upgrade().is_some_and(|l| l.id() != id));
    }

    /// Lights currently attached to this node.
    pub fn lights(&self) -> Vec<Arc<Light>> {
        self.lights
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter_map(Weak::upgrade)
            .collect()
    }

    fn notify_changed(&self, recursive: bool) {
        for light in self.lights() {
            light.notify_gpu_changed();
        }
        if recursive {
            let children: Vec<_> = self
                .children
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .iter()
                .filter_map(Weak::upgrade)
                .collect();
            for child in children {
                child.notify_changed(true);
            }
        }
    }
}

impl fmt::Debug for SceneNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SceneNode")
            .field("name", &self.name)
            .field("position", &self.position())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::light::LightCategory;

    #[test]
    fn world_position_accumulates_parents() {
        let root = Arc::new(SceneNode::new("root"));
        let child = Arc::new(SceneNode::new("child"));
        root.set_position(Vec3::new(1.0, 0.0, 0.0));
        child.set_position(Vec3::new(0.0, 2.0, 0.0));
        child.attach_to(&root);
        assert_eq!(child.world_position(), Vec3::new(1.0, 2.0, 0.0));
    }

    #[test]
    fn attaching_into_its_own_subtree_is_refused() {
        let root = Arc::new(SceneNode::new("root"));
        let child = Arc::new(SceneNode::new("child"));
        let grandchild = Arc::new(SceneNode::new("grandchild"));
        assert!(child.attach_to(&root));
        assert!(grandchild.attach_to(&child));

        assert!(!root.attach_to(&root));
        assert!(!root.attach_to(&grandchild));
        assert!(root.parent().is_none());
        root.set_position(Vec3::ONE);
        assert_eq!(grandchild.world_position(), Vec3::ONE);

        // Moving a node sideways in the tree is still allowed.
        assert!(grandchild.attach_to(&root));
        assert!(child.attach_to(&grandchild));
        assert_eq!(child.world_position(), Vec3::ONE);
    }

    #[test]
    fn moving_parent_notifies_descendant_lights() {
        let root = Arc::new(SceneNode::new("root"));
        let child = Arc::new(SceneNode::new("child"));
        child.attach_to(&root);
        let light = Arc::new(Light::new(
            LightId(7),
            "l",
            "s",
            LightCategory::Point { range: 1.0 },
        ));
        light.attach_to(&child);
        let sub = light.on_gpu_changed().subscribe();

        root.set_position(Vec3::ONE);
        assert_eq!(sub.drain(), vec![LightId(7)]);

        light.detach();
        assert!(child.lights().is_empty());
        root.set_position(Vec3::ZERO);
        assert!(sub.drain().is_empty());
    }
}
