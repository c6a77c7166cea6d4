//! Scene graph node
//!
//! A [`Node`] is a cheap shared handle. Parents own their children; the
//! parent link is weak, so dropping every handle to a detached subtree frees
//! it. Structural notifications travel down the affected subtree first, then
//! up through the ancestors, so a listener on the root sees every change in
//! its scene.

use super::component::{component_addr, downcast_component, Component};
use super::layout::Layout;
use crate::data::Store;
use crate::error::{SceneError, SceneResult};
use crate::foundation::{Signal, Uuid};
use std::any::TypeId;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

/// Payload of `added` / `removed`
#[derive(Clone)]
pub struct NodeEvent {
    /// Node the signal is fired on
    pub node: Node,
    /// Node that was attached or detached
    pub target: Node,
    /// Parent it was attached to or detached from
    pub parent: Node,
}

/// Payload of `component_added` / `component_removed`
#[derive(Clone)]
pub struct ComponentEvent {
    /// Node the signal is fired on
    pub node: Node,
    /// Node owning the component
    pub target: Node,
    /// The component
    pub component: Rc<dyn Component>,
}

/// Payload of `layout_changed`
#[derive(Clone)]
pub struct LayoutEvent {
    /// Node the signal is fired on
    pub node: Node,
    /// Node whose layout changed
    pub target: Node,
}

struct NodeInner {
    uuid: Uuid,
    name: RefCell<String>,
    layout: Cell<Layout>,
    parent: RefCell<Weak<NodeInner>>,
    children: RefCell<Vec<Node>>,
    components: RefCell<Vec<Rc<dyn Component>>>,
    by_type: RefCell<HashMap<TypeId, Vec<Rc<dyn Component>>>>,
    data: Rc<Store>,
    added: Signal<NodeEvent>,
    removed: Signal<NodeEvent>,
    component_added: Signal<ComponentEvent>,
    component_removed: Signal<ComponentEvent>,
    layout_changed: Signal<LayoutEvent>,
}

/// Shared handle to a scene graph node
#[derive(Clone)]
pub struct Node(Rc<NodeInner>);

/// Non-owning node handle
#[derive(Clone, Default)]
pub struct WeakNode(Weak<NodeInner>);

impl WeakNode {
    /// Handle that never upgrades
    pub fn new() -> Self {
        Self(Weak::new())
    }

    /// Recover the node if it is still alive
    pub fn upgrade(&self) -> Option<Node> {
        self.0.upgrade().map(Node)
    }
}

impl fmt::Debug for WeakNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.upgrade() {
            Some(node) => write!(f, "WeakNode({node:?})"),
            None => write!(f, "WeakNode(<dropped>)"),
        }
    }
}

impl Node {
    /// Create a detached node with the default layout
    pub fn new(name: impl Into<String>) -> Self {
        Self(Rc::new(NodeInner {
            uuid: Uuid::new(),
            name: RefCell::new(name.into()),
            layout: Cell::new(Layout::DEFAULT),
            parent: RefCell::new(Weak::new()),
            children: RefCell::new(Vec::new()),
            components: RefCell::new(Vec::new()),
            by_type: RefCell::new(HashMap::new()),
            data: Store::new(),
            added: Signal::new(),
            removed: Signal::new(),
            component_added: Signal::new(),
            component_removed: Signal::new(),
            layout_changed: Signal::new(),
        }))
    }

    /// Stable identifier
    pub fn uuid(&self) -> Uuid {
        self.0.uuid
    }

    /// Node name (not unique)
    pub fn name(&self) -> String {
        self.0.name.borrow().clone()
    }

    /// Rename the node
    pub fn set_name(&self, name: impl Into<String>) {
        *self.0.name.borrow_mut() = name.into();
    }

    /// The node's property store
    pub fn data(&self) -> &Rc<Store> {
        &self.0.data
    }

    /// Weak handle to this node
    pub fn downgrade(&self) -> WeakNode {
        WeakNode(Rc::downgrade(&self.0))
    }

    /// Identity comparison
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Parent node, if attached
    pub fn parent(&self) -> Option<Node> {
        self.0.parent.borrow().upgrade().map(Node)
    }

    /// Topmost ancestor (the node itself when detached)
    pub fn root(&self) -> Node {
        let mut current = self.clone();
        while let Some(parent) = current.parent() {
            current = parent;
        }
        current
    }

    /// Direct children, in insertion order
    pub fn children(&self) -> Vec<Node> {
        self.0.children.borrow().clone()
    }

    /// Whether `node` is a direct child
    pub fn has_child(&self, node: &Node) -> bool {
        self.0.children.borrow().iter().any(|c| c.ptr_eq(node))
    }

    /// This node and its descendants in pre-order
    pub(crate) fn subtree(&self) -> Vec<Node> {
        let mut out = Vec::new();
        let mut stack = vec![self.clone()];
        while let Some(node) = stack.pop() {
            stack.extend(node.children().into_iter().rev());
            out.push(node);
        }
        out
    }

    /// Attach `child`, detaching it from its previous parent first
    pub fn add_child(&self, child: &Node) -> SceneResult<()> {
        let mut ancestor = Some(self.clone());
        while let Some(node) = ancestor {
            if node.ptr_eq(child) {
                return Err(SceneError::CycleDetected {
                    parent: self.name(),
                    child: child.name(),
                });
            }
            ancestor = node.parent();
        }

        if let Some(previous) = child.parent() {
            previous.remove_child(child)?;
        }

        *child.0.parent.borrow_mut() = Rc::downgrade(&self.0);
        self.0.children.borrow_mut().push(child.clone());
        log::trace!("node '{}': child '{}' added", self.name(), child.name());

        notify(child, Some(self.clone()), Node::added, |node| NodeEvent {
            node: node.clone(),
            target: child.clone(),
            parent: self.clone(),
        })
    }

    /// Detach `child`
    pub fn remove_child(&self, child: &Node) -> SceneResult<()> {
        let position = self.0.children.borrow().iter().position(|c| c.ptr_eq(child));
        let Some(position) = position else {
            return Err(SceneError::ChildNotFound {
                parent: self.name(),
                child: child.name(),
            });
        };

        self.0.children.borrow_mut().remove(position);
        *child.0.parent.borrow_mut() = Weak::new();
        log::trace!("node '{}': child '{}' removed", self.name(), child.name());

        notify(child, Some(self.clone()), Node::removed, |node| NodeEvent {
            node: node.clone(),
            target: child.clone(),
            parent: self.clone(),
        })
    }

    /// Detach every child, last first
    pub fn remove_children(&self) -> SceneResult<()> {
        loop {
            let last = self.0.children.borrow().last().cloned();
            match last {
                Some(child) => self.remove_child(&child)?,
                None => return Ok(()),
            }
        }
    }

    /// Attach `component` to this node
    ///
    /// Fails if the component already has a target, including this node.
    /// If the component's `target_added` callback fails the attachment is
    /// rolled back.
    pub fn add_component(&self, component: Rc<dyn Component>) -> SceneResult<()> {
        if self.find_component(&component).is_some() {
            return Err(SceneError::DuplicateComponent(self.name()));
        }
        if let Some(owner) = component.base().target() {
            return Err(SceneError::ComponentAlreadyAttached {
                component: component.type_name(),
                node: owner.name(),
            });
        }

        self.insert_component(&component);
        component.base().set_target(Some(self));
        if let Err(err) = component.target_added(self) {
            self.erase_component(&component);
            component.base().set_target(None);
            return Err(err);
        }
        log::trace!("node '{}': component {} added", self.name(), component.type_name());

        notify(self, self.parent(), Node::component_added, |node| ComponentEvent {
            node: node.clone(),
            target: self.clone(),
            component: Rc::clone(&component),
        })
    }

    /// Detach `component` from this node
    pub fn remove_component<C: Component + ?Sized>(&self, component: &Rc<C>) -> SceneResult<()> {
        let component = self
            .find_component(component)
            .ok_or_else(|| SceneError::ComponentNotFound(self.name()))?;

        self.erase_component(&component);
        let removed = component.target_removed(self);
        component.base().set_target(None);
        log::trace!("node '{}': component {} removed", self.name(), component.type_name());

        // The component is gone either way so listeners still hear about it
        let notified = notify(self, self.parent(), Node::component_removed, |node| ComponentEvent {
            node: node.clone(),
            target: self.clone(),
            component: Rc::clone(&component),
        });
        removed.and(notified)
    }

    fn find_component<C: Component + ?Sized>(&self, component: &Rc<C>) -> Option<Rc<dyn Component>> {
        let addr = component_addr(component);
        self.0
            .components
            .borrow()
            .iter()
            .find(|c| component_addr(c) == addr)
            .cloned()
    }

    fn insert_component(&self, component: &Rc<dyn Component>) {
        self.0.components.borrow_mut().push(Rc::clone(component));
        self.0
            .by_type
            .borrow_mut()
            .entry(component.as_any().type_id())
            .or_default()
            .push(Rc::clone(component));
    }

    fn erase_component(&self, component: &Rc<dyn Component>) {
        let addr = component_addr(component);
        self.0.components.borrow_mut().retain(|c| component_addr(c) != addr);
        let mut by_type = self.0.by_type.borrow_mut();
        let type_id = component.as_any().type_id();
        if let Some(list) = by_type.get_mut(&type_id) {
            list.retain(|c| component_addr(c) != addr);
            if list.is_empty() {
                by_type.remove(&type_id);
            }
        }
    }

    /// Every attached component, in attachment order
    pub fn components(&self) -> Vec<Rc<dyn Component>> {
        self.0.components.borrow().clone()
    }

    /// Every attached component of type `T`
    pub fn components_of<T: Component>(&self) -> Vec<Rc<T>> {
        self.0
            .by_type
            .borrow()
            .get(&TypeId::of::<T>())
            .map(|list| list.iter().filter_map(downcast_component::<T>).collect())
            .unwrap_or_default()
    }

    /// First attached component of type `T`
    pub fn component<T: Component>(&self) -> Option<Rc<T>> {
        self.0
            .by_type
            .borrow()
            .get(&TypeId::of::<T>())
            .and_then(|list| list.first())
            .and_then(downcast_component::<T>)
    }

    /// Whether a component of type `T` is attached
    pub fn has_component<T: Component>(&self) -> bool {
        self.0.by_type.borrow().contains_key(&TypeId::of::<T>())
    }

    /// Current layout
    pub fn layout(&self) -> Layout {
        self.0.layout.get()
    }

    /// Change the layout; `layout_changed` fires on this node then each ancestor
    pub fn set_layout(&self, layout: Layout) -> SceneResult<()> {
        if self.0.layout.replace(layout) == layout {
            return Ok(());
        }

        let mut current = Some(self.clone());
        while let Some(node) = current {
            node.0.layout_changed.execute(&LayoutEvent {
                node: node.clone(),
                target: self.clone(),
            })?;
            current = node.parent();
        }
        Ok(())
    }

    /// Fired when a node is attached in this node's subtree or above it
    pub fn added(&self) -> &Signal<NodeEvent> {
        &self.0.added
    }

    /// Fired when a node is detached in this node's subtree or above it
    pub fn removed(&self) -> &Signal<NodeEvent> {
        &self.0.removed
    }

    /// Fired when a component is attached in this node's subtree or above it
    pub fn component_added(&self) -> &Signal<ComponentEvent> {
        &self.0.component_added
    }

    /// Fired when a component is detached in this node's subtree or above it
    pub fn component_removed(&self) -> &Signal<ComponentEvent> {
        &self.0.component_removed
    }

    /// Fired when this node or a descendant changes layout
    pub fn layout_changed(&self) -> &Signal<LayoutEvent> {
        &self.0.layout_changed
    }
}

/// Fire on every node of `down`'s subtree, then on `up` and its ancestors
fn notify<E, S, M>(down: &Node, up: Option<Node>, signal: S, make: M) -> SceneResult<()>
where
    E: 'static,
    S: Fn(&Node) -> &Signal<E>,
    M: Fn(&Node) -> E,
{
    for node in down.subtree() {
        signal(&node).execute(&make(&node))?;
    }
    let mut current = up;
    while let Some(node) = current {
        signal(&node).execute(&make(&node))?;
        current = node.parent();
    }
    Ok(())
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Node {}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node('{}', {})", self.0.name.borrow(), self.0.uuid)
    }
}
