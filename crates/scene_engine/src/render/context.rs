//! Graphics context abstraction
//!
//! The render pipeline only talks to the GPU through [`GraphicsContext`].
//! [`RecordingContext`] is an in-memory implementation that records every
//! call, used by the demo and the tests.

use super::geometry::VertexAttribute;
use super::texture::TextureId;
use crate::data::Value;
use crate::error::SceneResult;
use crate::foundation::math::Rect;
use crate::foundation::Uuid;
use std::cell::RefCell;
use std::rc::Rc;

/// Everything a backend needs to issue one draw
#[derive(Debug, Clone, PartialEq)]
pub struct DrawSubmission {
    /// Surface the draw call was built for
    pub surface: Uuid,
    /// Pass name
    pub pass: String,
    /// Resolved program variant
    pub program: String,
    /// Uniform name and value
    pub uniforms: Vec<(String, Value)>,
    /// Attribute name and vertex attribute
    pub attributes: Vec<(String, VertexAttribute)>,
    /// Macro name and value
    pub macros: Vec<(String, Value)>,
    /// Number of vertices to draw
    pub vertex_count: u32,
}

impl DrawSubmission {
    /// Value bound to `uniform`, if any
    pub fn uniform(&self, uniform: &str) -> Option<&Value> {
        self.uniforms.iter().find(|(n, _)| n == uniform).map(|(_, v)| v)
    }
}

/// Rendering backend interface
pub trait GraphicsContext {
    /// Render into `target` until told otherwise
    fn set_render_to_texture(&mut self, target: TextureId, auto_clear: bool) -> SceneResult<()>;

    /// Render into the back buffer
    fn set_render_to_back_buffer(&mut self) -> SceneResult<()>;

    /// Set the viewport box in pixels
    fn configure_viewport(&mut self, x: i32, y: i32, width: i32, height: i32) -> SceneResult<()>;

    /// Enable or disable the scissor test
    fn set_scissor_test(&mut self, enabled: bool, rect: Rect) -> SceneResult<()>;

    /// Clear the active target
    fn clear(&mut self, red: f32, green: f32, blue: f32, alpha: f32) -> SceneResult<()>;

    /// Issue one draw
    fn draw(&mut self, submission: &DrawSubmission) -> SceneResult<()>;

    /// Present the back buffer
    fn present(&mut self) -> SceneResult<()>;

    /// Back buffer size in pixels
    fn back_buffer_extent(&self) -> (u32, u32);
}

/// Shared handle to the graphics context
pub type ContextHandle = Rc<RefCell<dyn GraphicsContext>>;

/// One recorded context call
#[derive(Debug, Clone, PartialEq)]
pub enum ContextCommand {
    /// `set_render_to_texture`
    RenderToTexture {
        /// Target texture
        target: TextureId,
        /// Whether the target is cleared on bind
        auto_clear: bool,
    },
    /// `set_render_to_back_buffer`
    RenderToBackBuffer,
    /// `configure_viewport`
    Viewport(Rect),
    /// `set_scissor_test`
    Scissor {
        /// Whether the test is enabled
        enabled: bool,
        /// Scissor box
        rect: Rect,
    },
    /// `clear`
    Clear([f32; 4]),
    /// `draw`
    Draw(DrawSubmission),
    /// `present`
    Present,
}

/// Context that records calls instead of rendering
#[derive(Debug)]
pub struct RecordingContext {
    width: u32,
    height: u32,
    commands: Vec<ContextCommand>,
}

impl RecordingContext {
    /// Context with a `width` x `height` back buffer
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height, commands: Vec::new() }
    }

    /// Wrap in a shared handle, keeping a typed handle for inspection
    pub fn shared(width: u32, height: u32) -> (Rc<RefCell<Self>>, ContextHandle) {
        let context = Rc::new(RefCell::new(Self::new(width, height)));
        let handle: ContextHandle = context.clone();
        (context, handle)
    }

    /// Every recorded call, oldest first
    pub fn commands(&self) -> &[ContextCommand] {
        &self.commands
    }

    /// Drain the recorded calls
    pub fn take_commands(&mut self) -> Vec<ContextCommand> {
        std::mem::take(&mut self.commands)
    }

    /// Recorded draws
    pub fn draws(&self) -> Vec<&DrawSubmission> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                ContextCommand::Draw(submission) => Some(submission),
                _ => None,
            })
            .collect()
    }

    /// Number of recorded calls matching `predicate`
    pub fn count(&self, predicate: impl Fn(&ContextCommand) -> bool) -> usize {
        self.commands.iter().filter(|c| predicate(c)).count()
    }

    /// Resize the back buffer
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }
}

impl GraphicsContext for RecordingContext {
    fn set_render_to_texture(&mut self, target: TextureId, auto_clear: bool) -> SceneResult<()> {
        self.commands.push(ContextCommand::RenderToTexture { target, auto_clear });
        Ok(())
    }

    fn set_render_to_back_buffer(&mut self) -> SceneResult<()> {
        self.commands.push(ContextCommand::RenderToBackBuffer);
        Ok(())
    }

    fn configure_viewport(&mut self, x: i32, y: i32, width: i32, height: i32) -> SceneResult<()> {
        self.commands.push(ContextCommand::Viewport(Rect::new(x, y, width, height)));
        Ok(())
    }

    fn set_scissor_test(&mut self, enabled: bool, rect: Rect) -> SceneResult<()> {
        self.commands.push(ContextCommand::Scissor { enabled, rect });
        Ok(())
    }

    fn clear(&mut self, red: f32, green: f32, blue: f32, alpha: f32) -> SceneResult<()> {
        self.commands.push(ContextCommand::Clear([red, green, blue, alpha]));
        Ok(())
    }

    fn draw(&mut self, submission: &DrawSubmission) -> SceneResult<()> {
        self.commands.push(ContextCommand::Draw(submission.clone()));
        Ok(())
    }

    fn present(&mut self) -> SceneResult<()> {
        self.commands.push(ContextCommand::Present);
        Ok(())
    }

    fn back_buffer_extent(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}
