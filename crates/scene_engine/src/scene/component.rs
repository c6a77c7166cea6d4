//! Component trait
//!
//! Components attach behavior to exactly one node at a time. Concrete
//! components embed a [`ComponentBase`] holding the target link and layout
//! mask shared by every kind.

use super::layout::Layout;
use super::node::{Node, WeakNode};
use crate::error::SceneResult;
use crate::foundation::Signal;
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Upcasts used for capability lookup; implemented for every `'static` type
pub trait AsAny: Any {
    /// Borrow as `&dyn Any`
    fn as_any(&self) -> &dyn Any;
    /// Convert a shared handle into `Rc<dyn Any>`
    fn as_any_rc(self: Rc<Self>) -> Rc<dyn Any>;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_rc(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }
}

/// Behavior attached to a [`Node`]
pub trait Component: AsAny {
    /// Shared component state
    fn base(&self) -> &ComponentBase;

    /// Called once the component is attached to `target`
    ///
    /// An error rolls the attachment back.
    fn target_added(&self, _target: &Node) -> SceneResult<()> {
        Ok(())
    }

    /// Called once the component is detached from `target`
    fn target_removed(&self, _target: &Node) -> SceneResult<()> {
        Ok(())
    }

    /// Type name used in logs and errors
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Downcast a component handle to its concrete type
pub fn downcast_component<T: Component>(component: &Rc<dyn Component>) -> Option<Rc<T>> {
    Rc::clone(component).as_any_rc().downcast::<T>().ok()
}

/// Address identity of a component handle, ignoring the vtable
pub(crate) fn component_addr<C: Component + ?Sized>(component: &Rc<C>) -> *const () {
    Rc::as_ptr(component).cast::<()>()
}

/// State every component carries
#[derive(Debug)]
pub struct ComponentBase {
    target: RefCell<WeakNode>,
    layout_mask: Cell<Layout>,
    layout_mask_changed: Signal<Layout>,
}

impl ComponentBase {
    /// Detached base with a mask matching every layout
    pub fn new() -> Self {
        Self::with_layout_mask(Layout::EVERYTHING)
    }

    /// Detached base with an explicit layout mask
    pub fn with_layout_mask(mask: Layout) -> Self {
        Self {
            target: RefCell::new(WeakNode::new()),
            layout_mask: Cell::new(mask),
            layout_mask_changed: Signal::new(),
        }
    }

    /// Node the component is attached to
    pub fn target(&self) -> Option<Node> {
        self.target.borrow().upgrade()
    }

    pub(crate) fn set_target(&self, target: Option<&Node>) {
        *self.target.borrow_mut() = target.map_or_else(WeakNode::new, Node::downgrade);
    }

    /// Current layout mask
    pub fn layout_mask(&self) -> Layout {
        self.layout_mask.get()
    }

    /// Change the layout mask, firing `layout_mask_changed` if it differs
    pub fn set_layout_mask(&self, mask: Layout) -> SceneResult<()> {
        if self.layout_mask.replace(mask) == mask {
            return Ok(());
        }
        self.layout_mask_changed.execute(&mask)
    }

    /// Fired with the new mask
    pub const fn layout_mask_changed(&self) -> &Signal<Layout> {
        &self.layout_mask_changed
    }
}

impl Default for ComponentBase {
    fn default() -> Self {
        Self::new()
    }
}
