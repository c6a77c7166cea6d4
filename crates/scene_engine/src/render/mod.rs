//! # Rendering pipeline
//!
//! Resources (geometry, material, effect, texture), the draw calls built
//! from them and the context abstraction they are issued against.
//!
//! ## Flow
//!
//! ```text
//! Surface ──► DrawCallPool::add_draw_calls ──► DrawCall (one per pass)
//!                     │                            │
//!             update / sort                 render ──► GraphicsContext
//! ```

pub mod context;
pub mod draw_call;
pub mod draw_call_pool;
pub mod effect;
pub mod geometry;
pub mod material;
pub mod texture;

pub use context::{ContextCommand, ContextHandle, DrawSubmission, GraphicsContext, RecordingContext};
pub use draw_call::{DataBindings, DrawCall, ProgramResolver, TargetState, VariantKeyResolver};
pub use draw_call_pool::{DrawCallGroupId, DrawCallKey, DrawCallPool, PoolStats};
pub use effect::{
    priority, resolve_template, Binding, BindingSource, Effect, Pass, States, Technique, Variables,
    DEFAULT_TECHNIQUE,
};
pub use geometry::{Geometry, VertexAttribute, VertexBuffer};
pub use material::Material;
pub use texture::{Texture, TextureId};
