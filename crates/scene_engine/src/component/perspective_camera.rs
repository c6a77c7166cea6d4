//! Perspective camera component
//!
//! The camera reads its node's `modelToWorldMatrix` (published by a sibling
//! [`Transform`](super::Transform)) and publishes the matrices every effect
//! needs to project geometry:
//!
//! | key                   | value                                     |
//! |-----------------------|-------------------------------------------|
//! | `viewMatrix`          | inverse of the camera's world matrix      |
//! | `projectionMatrix`    | perspective projection                    |
//! | `worldToScreenMatrix` | projection × view                         |
//! | `eyePosition`         | camera position in world space            |
//!
//! Properties are only written when their value changes, so renderers
//! watching `worldToScreenMatrix` re-sort only after the camera moved.

use crate::data::{Provider, Value};
use crate::error::SceneResult;
use crate::foundation::math::{translation, Mat4, Perspective3, Vec3};
use crate::render::draw_call::{MODEL_TO_WORLD, VIEW_MATRIX};
use crate::scene::{Component, ComponentBase, Node, NodeSet};
use std::cell::Cell;
use std::rc::Rc;

/// Store key of the projection matrix
pub const PROJECTION_MATRIX: &str = "projectionMatrix";
/// Store key of projection × view
pub const WORLD_TO_SCREEN_MATRIX: &str = "worldToScreenMatrix";
/// Store key of the camera position
pub const EYE_POSITION: &str = "eyePosition";

/// Camera with a perspective projection
#[derive(Debug)]
pub struct PerspectiveCamera {
    base: ComponentBase,
    fov: Cell<f32>,
    aspect: Cell<f32>,
    near: Cell<f32>,
    far: Cell<f32>,
    provider: Rc<Provider>,
}

impl PerspectiveCamera {
    /// Create a camera
    ///
    /// # Arguments
    /// * `fov_degrees` - Vertical field of view in degrees
    /// * `aspect` - Viewport width / height
    /// * `near` - Near clipping distance (must be > 0)
    /// * `far` - Far clipping distance (must be > near)
    pub fn new(fov_degrees: f32, aspect: f32, near: f32, far: f32) -> Rc<Self> {
        let fov = fov_degrees.to_radians();
        let projection = Perspective3::new(aspect, fov, near, far).to_homogeneous();
        Rc::new(Self {
            base: ComponentBase::new(),
            fov: Cell::new(fov),
            aspect: Cell::new(aspect),
            near: Cell::new(near),
            far: Cell::new(far),
            provider: Provider::with_values([
                (VIEW_MATRIX, Value::Mat4(Mat4::identity())),
                (PROJECTION_MATRIX, Value::Mat4(projection)),
                (WORLD_TO_SCREEN_MATRIX, Value::Mat4(projection)),
                (EYE_POSITION, Value::Vec3(Vec3::zeros())),
            ]),
        })
    }

    /// Vertical field of view in radians
    pub fn fov(&self) -> f32 {
        self.fov.get()
    }

    /// Aspect ratio
    pub fn aspect_ratio(&self) -> f32 {
        self.aspect.get()
    }

    /// Update the aspect ratio, typically after a viewport resize
    pub fn set_aspect_ratio(&self, aspect: f32) {
        if (self.aspect.get() - aspect).abs() > 0.01 {
            log::debug!("camera aspect ratio changed: {:.3} -> {:.3}", self.aspect.get(), aspect);
        }
        self.aspect.set(aspect);
    }

    /// Change the vertical field of view
    pub fn set_fov_degrees(&self, fov_degrees: f32) {
        self.fov.set(fov_degrees.to_radians());
    }

    /// Change the clipping distances
    pub fn set_clip_planes(&self, near: f32, far: f32) {
        self.near.set(near);
        self.far.set(far);
    }

    /// Current projection matrix
    pub fn projection(&self) -> Mat4 {
        Perspective3::new(self.aspect.get(), self.fov.get(), self.near.get(), self.far.get()).to_homogeneous()
    }

    /// Recompute and publish the camera matrices from the node's world matrix
    pub fn update_matrices(&self) -> SceneResult<()> {
        let Some(target) = self.base.target() else {
            return Ok(());
        };
        let model_to_world = target
            .data()
            .get_as::<Mat4>(MODEL_TO_WORLD)
            .unwrap_or_else(|_| Mat4::identity());
        let view = model_to_world.try_inverse().unwrap_or_else(Mat4::identity);
        let projection = self.projection();

        self.publish(VIEW_MATRIX, Value::Mat4(view))?;
        self.publish(PROJECTION_MATRIX, Value::Mat4(projection))?;
        self.publish(WORLD_TO_SCREEN_MATRIX, Value::Mat4(projection * view))?;
        self.publish(EYE_POSITION, Value::Vec3(translation(&model_to_world)))
    }

    fn publish(&self, key: &str, value: Value) -> SceneResult<()> {
        if self.provider.try_get(key).as_ref() == Some(&value) {
            return Ok(());
        }
        self.provider.set(key, value)
    }

    /// Update every camera under `root`
    pub fn update_all(root: &Node) -> SceneResult<()> {
        for node in NodeSet::new(root).descendants(true) {
            for camera in node.components_of::<Self>() {
                camera.update_matrices()?;
            }
        }
        Ok(())
    }
}

impl Component for PerspectiveCamera {
    fn base(&self) -> &ComponentBase {
        &self.base
    }

    fn target_added(&self, target: &Node) -> SceneResult<()> {
        target.data().add_provider(&self.provider, None)?;
        self.update_matrices()
    }

    fn target_removed(&self, target: &Node) -> SceneResult<()> {
        target.data().remove_provider(&self.provider, None)
    }

    fn type_name(&self) -> &'static str {
        "PerspectiveCamera"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Transform;
    use approx::assert_relative_eq;

    #[test]
    fn test_publishes_view_from_transform() {
        let node = Node::new("camera");
        node.add_component(Transform::with_matrix(Mat4::new_translation(&Vec3::new(0.0, 0.0, 5.0))))
            .unwrap();
        let camera = PerspectiveCamera::new(60.0, 16.0 / 9.0, 0.1, 100.0);
        node.add_component(camera.clone()).unwrap();

        let view = node.data().get_as::<Mat4>(VIEW_MATRIX).unwrap();
        assert_relative_eq!(translation(&view), Vec3::new(0.0, 0.0, -5.0));
        let eye = node.data().get_as::<Vec3>(EYE_POSITION).unwrap();
        assert_relative_eq!(eye, Vec3::new(0.0, 0.0, 5.0));
    }

    #[test]
    fn test_writes_only_on_change() {
        let node = Node::new("camera");
        let camera = PerspectiveCamera::new(60.0, 1.0, 0.1, 100.0);
        node.add_component(camera.clone()).unwrap();

        let changes = Rc::new(Cell::new(0));
        let c = Rc::clone(&changes);
        let _slot = node
            .data()
            .key_changed(WORLD_TO_SCREEN_MATRIX)
            .connect(move |_| { c.set(c.get() + 1); Ok(()) });

        camera.update_matrices().unwrap();
        assert_eq!(changes.get(), 0);

        camera.set_aspect_ratio(2.0);
        camera.update_matrices().unwrap();
        assert_eq!(changes.get(), 1);
    }
}
