//! Scene components
//!
//! Everything that can be attached to a [`Node`](crate::scene::Node):
//! drawables, transforms, cameras, the per-scene frame driver and the
//! renderers it drives.

mod perspective_camera;
mod renderer;
mod scene_manager;
mod surface;
mod transform;

pub use perspective_camera::{PerspectiveCamera, EYE_POSITION, PROJECTION_MATRIX, WORLD_TO_SCREEN_MATRIX};
pub use renderer::{Renderer, RendererEvent, POST_PROCESSING_POSITION, POST_PROCESSING_UV};
pub use scene_manager::{FrameEvent, SceneManager};
pub use surface::{Surface, SurfaceEvent};
pub use transform::Transform;
