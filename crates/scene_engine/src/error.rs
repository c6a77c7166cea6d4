//! Engine-level errors
//!
//! Structural violations (a component on two targets, two scene managers in
//! one scene, a surface tracked twice) mean the scene is malformed. They are
//! reported like every other error, and callers are expected to stop
//! rendering rather than retry.

use crate::config::ConfigError;
use crate::foundation::Uuid;
use thiserror::Error;

/// Result alias used throughout the crate
pub type SceneResult<T> = Result<T, SceneError>;

/// Errors raised by the scene graph, data binding and render pipeline
#[derive(Error, Debug)]
pub enum SceneError {
    /// A single-target component is already attached elsewhere
    #[error("component {component} is already attached to node '{node}'")]
    ComponentAlreadyAttached {
        /// Component type name
        component: &'static str,
        /// Name of the node currently holding it
        node: String,
    },

    /// The same component instance was added twice to a node
    #[error("node '{0}' already holds this component")]
    DuplicateComponent(String),

    /// Tried to remove a component the node does not hold
    #[error("component not found on node '{0}'")]
    ComponentNotFound(String),

    /// Tried to remove a node that is not a child
    #[error("node '{child}' is not a child of '{parent}'")]
    ChildNotFound {
        /// Parent node name
        parent: String,
        /// Child node name
        child: String,
    },

    /// Adding the child would make the graph cyclic
    #[error("adding '{child}' under '{parent}' would create a cycle")]
    CycleDetected {
        /// Parent node name
        parent: String,
        /// Child node name
        child: String,
    },

    /// More than one scene manager reachable from a renderer target
    #[error("Renderer cannot be in two separate scenes ({0} scene managers found)")]
    MultipleSceneManagers(usize),

    /// Scene managers must live on a root node
    #[error("SceneManager must be attached to a root node, '{0}' has a parent")]
    SceneManagerNotOnRoot(String),

    /// A surface already has a live draw-call group
    #[error("surface {0} is already tracked")]
    SurfaceAlreadyTracked(Uuid),

    /// A surface was handed to a renderer of another scene
    #[error("surface {0} is not part of the renderer's scene")]
    SurfaceNotInScene(Uuid),

    /// Property lookup on a key that does not exist
    #[error("missing property '{0}'")]
    MissingProperty(String),

    /// Property exists but holds another type
    #[error("property '{name}' is not a {expected}")]
    PropertyType {
        /// Property name
        name: String,
        /// Requested type
        expected: &'static str,
    },

    /// A provider was removed from a store it is not registered in
    #[error("provider {provider} is not registered in collection {collection:?}")]
    ProviderNotRegistered {
        /// Provider identifier
        provider: Uuid,
        /// Collection the caller asked for
        collection: Option<String>,
    },

    /// Neither the technique, its fallbacks nor "default" exist
    #[error("effect '{effect}' has no technique '{technique}'")]
    TechniqueNotFound {
        /// Effect name
        effect: String,
        /// Requested technique
        technique: String,
    },

    /// Named asset not present in the library
    #[error("asset not found: {0}")]
    AssetNotFound(String),

    /// `load` was triggered without a loader installed
    #[error("no asset loader registered (requested '{0}')")]
    NoAssetLoader(String),

    /// The shared graphics context is already borrowed
    #[error("graphics context is already in use")]
    ContextBusy,

    /// Error reported by the graphics backend
    #[error("backend error: {0}")]
    Backend(String),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),
}
