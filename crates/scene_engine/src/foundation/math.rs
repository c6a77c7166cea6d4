//! Math utilities and types
//!
//! Thin aliases over `nalgebra` plus the handful of helpers the scene and
//! render layers need. Matrix internals are nalgebra's business.

pub use nalgebra::{
    Vector2, Vector3, Vector4,
    Matrix4,
    Perspective3,
};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Integer rectangle used for viewports and scissor boxes.
///
/// A negative width or height means "unset".
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Rect {
    /// Left edge in pixels
    pub x: i32,
    /// Bottom edge in pixels
    pub y: i32,
    /// Width in pixels (negative when unset)
    pub width: i32,
    /// Height in pixels (negative when unset)
    pub height: i32,
}

impl Rect {
    /// The "unset" rectangle `(0, 0, -1, -1)`
    pub const UNSET: Self = Self { x: 0, y: 0, width: -1, height: -1 };

    /// Create a new rectangle
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    /// True when both width and height are non-negative
    pub const fn is_set(&self) -> bool {
        self.width >= 0 && self.height >= 0
    }
}

impl Default for Rect {
    fn default() -> Self {
        Self::UNSET
    }
}

/// Split a packed `0xRRGGBBAA` color into normalized components.
pub fn unpack_rgba(color: u32) -> [f32; 4] {
    [
        ((color >> 24) & 0xff) as f32 / 255.0,
        ((color >> 16) & 0xff) as f32 / 255.0,
        ((color >> 8) & 0xff) as f32 / 255.0,
        (color & 0xff) as f32 / 255.0,
    ]
}

/// Translation part of an affine transform matrix
pub fn translation(matrix: &Mat4) -> Vec3 {
    Vec3::new(matrix[(0, 3)], matrix[(1, 3)], matrix[(2, 3)])
}
