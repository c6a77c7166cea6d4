//! Asset management
//!
//! [`AssetLibrary`] keeps a scene's named resources and its graphics context.

mod library;

pub use library::{AssetLibrary, AssetLoader};
