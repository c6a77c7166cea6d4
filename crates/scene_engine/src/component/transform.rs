//! Transform component
//!
//! Holds a local matrix and publishes the resulting object-to-world matrix
//! as `modelToWorldMatrix` in its node's store.

use crate::data::Provider;
use crate::error::SceneResult;
use crate::foundation::math::Mat4;
use crate::render::draw_call::MODEL_TO_WORLD;
use crate::scene::{Component, ComponentBase, Node};
use std::cell::Cell;
use std::rc::Rc;

/// Local-to-parent transform of a node
#[derive(Debug)]
pub struct Transform {
    base: ComponentBase,
    matrix: Cell<Mat4>,
    model_to_world: Cell<Mat4>,
    provider: Rc<Provider>,
}

impl Transform {
    /// Identity transform
    pub fn new() -> Rc<Self> {
        Self::with_matrix(Mat4::identity())
    }

    /// Transform with a local matrix
    pub fn with_matrix(matrix: Mat4) -> Rc<Self> {
        Rc::new(Self {
            base: ComponentBase::new(),
            matrix: Cell::new(matrix),
            model_to_world: Cell::new(matrix),
            provider: Provider::with_values([(MODEL_TO_WORLD, matrix)]),
        })
    }

    /// Local matrix
    pub fn matrix(&self) -> Mat4 {
        self.matrix.get()
    }

    /// Replace the local matrix; the world matrix follows on the next update
    pub fn set_matrix(&self, matrix: Mat4) {
        self.matrix.set(matrix);
    }

    /// Last computed object-to-world matrix
    pub fn model_to_world(&self) -> Mat4 {
        self.model_to_world.get()
    }

    fn set_model_to_world(&self, matrix: Mat4) -> SceneResult<()> {
        if self.model_to_world.replace(matrix) == matrix {
            return Ok(());
        }
        self.provider.set(MODEL_TO_WORLD, matrix)
    }

    /// Recompute every world matrix under `root`
    ///
    /// A node without a transform passes its parent's world matrix through.
    pub fn update_world_matrices(root: &Node) -> SceneResult<()> {
        let parent_world = root
            .parent()
            .and_then(|parent| nearest_world(&parent))
            .unwrap_or_else(Mat4::identity);

        let mut stack = vec![(root.clone(), parent_world)];
        while let Some((node, parent_world)) = stack.pop() {
            let world = match node.component::<Self>() {
                Some(transform) => {
                    let world = parent_world * transform.matrix();
                    transform.set_model_to_world(world)?;
                    world
                }
                None => parent_world,
            };
            stack.extend(node.children().into_iter().rev().map(|child| (child, world)));
        }
        Ok(())
    }
}

fn nearest_world(node: &Node) -> Option<Mat4> {
    let mut current = Some(node.clone());
    while let Some(n) = current {
        if let Some(transform) = n.component::<Transform>() {
            return Some(transform.model_to_world());
        }
        current = n.parent();
    }
    None
}

impl Component for Transform {
    fn base(&self) -> &ComponentBase {
        &self.base
    }

    fn target_added(&self, target: &Node) -> SceneResult<()> {
        target.data().add_provider(&self.provider, None)
    }

    fn target_removed(&self, target: &Node) -> SceneResult<()> {
        target.data().remove_provider(&self.provider, None)
    }

    fn type_name(&self) -> &'static str {
        "Transform"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{translation, Vec3};
    use approx::assert_relative_eq;

    #[test]
    fn test_world_matrices_compose() {
        let root = Node::new("root");
        let group = Node::new("group");
        let plain = Node::new("plain");
        let leaf = Node::new("leaf");
        root.add_child(&group).unwrap();
        group.add_child(&plain).unwrap();
        plain.add_child(&leaf).unwrap();

        let group_t = Transform::with_matrix(Mat4::new_translation(&Vec3::new(1.0, 0.0, 0.0)));
        let leaf_t = Transform::with_matrix(Mat4::new_translation(&Vec3::new(0.0, 2.0, 0.0)));
        group.add_component(group_t).unwrap();
        leaf.add_component(leaf_t.clone()).unwrap();

        Transform::update_world_matrices(&root).unwrap();

        let world = translation(&leaf_t.model_to_world());
        assert_relative_eq!(world, Vec3::new(1.0, 2.0, 0.0));
        let published = leaf.data().get_as::<Mat4>(MODEL_TO_WORLD).unwrap();
        assert_relative_eq!(published, leaf_t.model_to_world());
    }

    #[test]
    fn test_unchanged_world_does_not_notify() {
        let node = Node::new("n");
        let transform = Transform::new();
        node.add_component(transform.clone()).unwrap();

        let changes = Rc::new(Cell::new(0));
        let c = Rc::clone(&changes);
        let _slot = node.data().property_changed().connect(move |_| { c.set(c.get() + 1); Ok(()) });

        Transform::update_world_matrices(&node).unwrap();
        assert_eq!(changes.get(), 0);

        transform.set_matrix(Mat4::new_scaling(2.0));
        Transform::update_world_matrices(&node).unwrap();
        assert_eq!(changes.get(), 1);
    }
}
