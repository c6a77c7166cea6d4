//! Texture handles

use crate::foundation::Uuid;
use std::rc::Rc;

/// Identifier of a texture resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(Uuid);

impl TextureId {
    /// Underlying uuid
    pub const fn uuid(self) -> Uuid {
        self.0
    }
}

/// Sampler or render target
#[derive(Debug)]
pub struct Texture {
    id: TextureId,
    name: String,
    width: u32,
    height: u32,
}

impl Texture {
    /// Create a `width` x `height` texture
    pub fn new(name: impl Into<String>, width: u32, height: u32) -> Rc<Self> {
        Rc::new(Self {
            id: TextureId(Uuid::new()),
            name: name.into(),
            width,
            height,
        })
    }

    /// Texture identifier
    pub const fn id(&self) -> TextureId {
        self.id
    }

    /// Texture name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Width in pixels
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels
    pub const fn height(&self) -> u32 {
        self.height
    }
}
