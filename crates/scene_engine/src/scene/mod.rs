//! Scene graph
//!
//! Nodes, their components and the queries used to walk them.
//!
//! ```text
//! root ─┬─ group (Transform)
//!       │    └─ mesh (Surface)
//!       └─ camera (Transform, PerspectiveCamera, Renderer)
//! ```

mod component;
mod layout;
mod node;
mod node_set;

pub use component::{downcast_component, AsAny, Component, ComponentBase};
pub use layout::Layout;
pub use node::{ComponentEvent, LayoutEvent, Node, NodeEvent, WeakNode};
pub use node_set::NodeSet;
