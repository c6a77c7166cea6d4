//! # Scene Engine
//!
//! A retained scene graph with reactive data binding and a draw-call
//! pipeline, independent of any graphics API.
//!
//! ## Features
//!
//! - **Scene graph**: nodes with components, layout flags and bubbling events
//! - **Data binding**: providers aggregated into per-node stores
//! - **Draw calls**: one per surface and effect pass, kept in sync with the data they bind
//! - **Renderers**: sorted submission to any [`GraphicsContext`](render::GraphicsContext)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use scene_engine::prelude::*;
//!
//! fn main() -> SceneResult<()> {
//!     let (_, context) = RecordingContext::shared(800, 600);
//!     let root = Node::new("root");
//!     let scene_manager = SceneManager::new(AssetLibrary::new(context));
//!     root.add_component(scene_manager.clone())?;
//!
//!     let camera = Node::new("camera");
//!     camera.add_component(Transform::new())?;
//!     camera.add_component(PerspectiveCamera::new(60.0, 800.0 / 600.0, 0.1, 100.0))?;
//!     camera.add_component(Renderer::new())?;
//!     root.add_child(&camera)?;
//!
//!     scene_manager.next_frame(0.0, None)
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod foundation;
pub mod error;
pub mod config;
pub mod data;
pub mod scene;
pub mod render;
pub mod component;
pub mod assets;

pub use error::{SceneError, SceneResult};

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        SceneError, SceneResult,
        assets::{AssetLibrary, AssetLoader},
        component::{FrameEvent, PerspectiveCamera, Renderer, SceneManager, Surface, Transform},
        config::{Config, EngineConfig, RendererConfig},
        data::{Provider, Store, Value},
        foundation::{
            math::{Mat4, Rect, Vec3},
            Signal, Slot, Uuid,
        },
        render::{
            Binding, DrawCallPool, Effect, Geometry, GraphicsContext, Material, Pass,
            RecordingContext, Technique, Texture, VertexBuffer,
        },
        scene::{Component, Layout, Node, NodeSet},
    };
}
