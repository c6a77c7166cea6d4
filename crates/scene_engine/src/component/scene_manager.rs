//! Scene manager component
//!
//! One per scene, on the root. Each call to [`SceneManager::next_frame`]
//! refreshes world transforms and cameras, then fires `frame_begin` and
//! `frame_end`. Renderers listen to `frame_end` with their own priority, so
//! the highest-priority renderer draws first.

use super::{PerspectiveCamera, Transform};
use crate::assets::AssetLibrary;
use crate::error::{SceneError, SceneResult};
use crate::foundation::{Signal, Slot};
use crate::render::Texture;
use crate::scene::{Component, ComponentBase, Node};
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

/// Payload of frame signals
#[derive(Clone)]
pub struct FrameEvent {
    /// Manager driving the frame
    pub scene_manager: Rc<SceneManager>,
    /// Frame number, starting at 1
    pub frame_id: u64,
    /// Application time passed to `next_frame`
    pub time: f32,
    /// Texture to render into instead of the back buffer
    pub render_target: Option<Rc<Texture>>,
}

/// Per-scene frame driver
pub struct SceneManager {
    base: ComponentBase,
    self_ref: Weak<SceneManager>,
    assets: Rc<AssetLibrary>,
    frame_id: Cell<u64>,
    time: Cell<f32>,
    frame_begin: Signal<FrameEvent>,
    frame_end: Signal<FrameEvent>,
    reparent_slot: RefCell<Option<Slot>>,
}

impl SceneManager {
    /// Create a manager owning `assets`
    pub fn new(assets: Rc<AssetLibrary>) -> Rc<Self> {
        Rc::new_cyclic(|self_ref| Self {
            base: ComponentBase::new(),
            self_ref: self_ref.clone(),
            assets,
            frame_id: Cell::new(0),
            time: Cell::new(0.0),
            frame_begin: Signal::new(),
            frame_end: Signal::new(),
            reparent_slot: RefCell::new(None),
        })
    }

    /// Asset library of the scene
    pub fn assets(&self) -> &Rc<AssetLibrary> {
        &self.assets
    }

    /// Number of frames driven so far
    pub fn frame_id(&self) -> u64 {
        self.frame_id.get()
    }

    /// Time of the last frame
    pub fn time(&self) -> f32 {
        self.time.get()
    }

    /// Drive one frame
    ///
    /// Errors raised by frame listeners (renderers included) are returned.
    pub fn next_frame(&self, time: f32, render_target: Option<Rc<Texture>>) -> SceneResult<()> {
        let (Some(root), Some(scene_manager)) = (self.base.target(), self.self_ref.upgrade()) else {
            log::warn!("scene manager: next_frame called while detached");
            return Ok(());
        };

        let frame_id = self.frame_id.get() + 1;
        self.frame_id.set(frame_id);
        self.time.set(time);

        Transform::update_world_matrices(&root)?;
        PerspectiveCamera::update_all(&root)?;

        let event = FrameEvent { scene_manager, frame_id, time, render_target };
        log::trace!("scene manager: frame {} (t = {:.3})", frame_id, time);
        self.frame_begin.execute(&event)?;
        self.frame_end.execute(&event)
    }

    /// Fired before renderers draw
    pub const fn frame_begin(&self) -> &Signal<FrameEvent> {
        &self.frame_begin
    }

    /// Renderers draw in response to this signal
    pub const fn frame_end(&self) -> &Signal<FrameEvent> {
        &self.frame_end
    }
}

impl Component for SceneManager {
    fn base(&self) -> &ComponentBase {
        &self.base
    }

    fn target_added(&self, target: &Node) -> SceneResult<()> {
        if target.parent().is_some() {
            return Err(SceneError::SceneManagerNotOnRoot(target.name()));
        }

        let weak = target.downgrade();
        let slot = target.added().connect(move |event| {
            match weak.upgrade() {
                Some(root) if event.target.ptr_eq(&root) => {
                    Err(SceneError::SceneManagerNotOnRoot(root.name()))
                }
                _ => Ok(()),
            }
        });
        *self.reparent_slot.borrow_mut() = Some(slot);
        log::debug!("scene manager attached to '{}'", target.name());
        Ok(())
    }

    fn target_removed(&self, _target: &Node) -> SceneResult<()> {
        self.reparent_slot.borrow_mut().take();
        Ok(())
    }

    fn type_name(&self) -> &'static str {
        "SceneManager"
    }
}

impl std::fmt::Debug for SceneManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneManager")
            .field("frame_id", &self.frame_id.get())
            .field("time", &self.time.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::RecordingContext;

    fn manager() -> Rc<SceneManager> {
        let (_, context) = RecordingContext::shared(32, 32);
        SceneManager::new(AssetLibrary::new(context))
    }

    #[test]
    fn test_must_be_on_root() {
        let root = Node::new("root");
        let child = Node::new("child");
        root.add_child(&child).unwrap();

        assert!(matches!(
            child.add_component(manager()),
            Err(SceneError::SceneManagerNotOnRoot(_))
        ));
        assert!(child.components().is_empty());

        root.add_component(manager()).unwrap();
        let parent = Node::new("parent");
        assert!(matches!(parent.add_child(&root), Err(SceneError::SceneManagerNotOnRoot(_))));
    }

    #[test]
    fn test_next_frame_fires_begin_then_end() {
        let root = Node::new("root");
        let scene_manager = manager();
        root.add_component(scene_manager.clone()).unwrap();

        let order = Rc::new(RefCell::new(Vec::new()));
        let o = Rc::clone(&order);
        let _end = scene_manager.frame_end().connect(move |e| { o.borrow_mut().push(("end", e.frame_id)); Ok(()) });
        let o = Rc::clone(&order);
        let _begin = scene_manager.frame_begin().connect(move |e| { o.borrow_mut().push(("begin", e.frame_id)); Ok(()) });

        scene_manager.next_frame(0.0, None).unwrap();
        scene_manager.next_frame(0.016, None).unwrap();

        assert_eq!(*order.borrow(), vec![("begin", 1), ("end", 1), ("begin", 2), ("end", 2)]);
        assert_eq!(scene_manager.frame_id(), 2);
    }

    #[test]
    fn test_detached_next_frame_is_noop() {
        let scene_manager = manager();
        scene_manager.next_frame(1.0, None).unwrap();
        assert_eq!(scene_manager.frame_id(), 0);
    }
}
