//! Dynamically typed property values

use crate::foundation::math::{Mat4, Vec2, Vec3, Vec4};
use crate::render::{TextureId, VertexAttribute};
use std::any::Any;
use std::fmt;
use std::rc::Rc;

/// A shader-visible property value
///
/// Cloning is cheap; `Shared` clones share the same handle.
#[derive(Clone)]
pub enum Value {
    /// Boolean flag
    Bool(bool),
    /// Signed integer
    Int(i32),
    /// Scalar float
    Float(f32),
    /// 2-component vector
    Vec2(Vec2),
    /// 3-component vector
    Vec3(Vec3),
    /// 4-component vector
    Vec4(Vec4),
    /// 4x4 matrix
    Mat4(Mat4),
    /// String
    Text(String),
    /// Texture handle
    Texture(TextureId),
    /// Vertex attribute of a geometry buffer
    Attribute(VertexAttribute),
    /// Opaque shared handle, compared by identity
    Shared(Rc<dyn Any>),
}

impl Value {
    /// Human readable type name, used in error messages
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Vec2(_) => "vec2",
            Self::Vec3(_) => "vec3",
            Self::Vec4(_) => "vec4",
            Self::Mat4(_) => "mat4",
            Self::Text(_) => "text",
            Self::Texture(_) => "texture",
            Self::Attribute(_) => "attribute",
            Self::Shared(_) => "shared",
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Vec2(a), Self::Vec2(b)) => a == b,
            (Self::Vec3(a), Self::Vec3(b)) => a == b,
            (Self::Vec4(a), Self::Vec4(b)) => a == b,
            (Self::Mat4(a), Self::Mat4(b)) => a == b,
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Texture(a), Self::Texture(b)) => a == b,
            (Self::Attribute(a), Self::Attribute(b)) => a == b,
            (Self::Shared(a), Self::Shared(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "Bool({v})"),
            Self::Int(v) => write!(f, "Int({v})"),
            Self::Float(v) => write!(f, "Float({v})"),
            Self::Vec2(v) => write!(f, "Vec2({}, {})", v.x, v.y),
            Self::Vec3(v) => write!(f, "Vec3({}, {}, {})", v.x, v.y, v.z),
            Self::Vec4(v) => write!(f, "Vec4({}, {}, {}, {})", v.x, v.y, v.z, v.w),
            Self::Mat4(m) => write!(f, "Mat4({:?})", m.as_slice()),
            Self::Text(v) => write!(f, "Text({v:?})"),
            Self::Texture(v) => write!(f, "Texture({v:?})"),
            Self::Attribute(v) => write!(f, "Attribute({v:?})"),
            Self::Shared(_) => write!(f, "Shared(..)"),
        }
    }
}

/// Types that can be read back out of a [`Value`]
pub trait FromValue: Sized {
    /// Name reported when the stored value has another type
    const TYPE_NAME: &'static str;

    /// Extract a copy of the value if the variant matches
    fn from_value(value: &Value) -> Option<Self>;
}

macro_rules! value_conversions {
    ($($ty:ty => $variant:ident, $name:literal;)*) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Self::$variant(value)
                }
            }

            impl FromValue for $ty {
                const TYPE_NAME: &'static str = $name;

                fn from_value(value: &Value) -> Option<Self> {
                    match value {
                        Value::$variant(v) => Some(v.clone()),
                        _ => None,
                    }
                }
            }
        )*
    };
}

value_conversions! {
    bool => Bool, "bool";
    i32 => Int, "int";
    f32 => Float, "float";
    Vec2 => Vec2, "vec2";
    Vec3 => Vec3, "vec3";
    Vec4 => Vec4, "vec4";
    Mat4 => Mat4, "mat4";
    String => Text, "text";
    TextureId => Texture, "texture";
    VertexAttribute => Attribute, "attribute";
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<Rc<dyn Any>> for Value {
    fn from(value: Rc<dyn Any>) -> Self {
        Self::Shared(value)
    }
}
