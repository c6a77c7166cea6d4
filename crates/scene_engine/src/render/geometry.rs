//! Vertex data
//!
//! A [`Geometry`] publishes one `Value::Attribute` property per vertex
//! attribute of each of its buffers, plus `vertexCount`.

use crate::data::{Provider, Value};
use crate::error::SceneResult;
use crate::foundation::Uuid;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Property holding the number of vertices to draw
pub const VERTEX_COUNT: &str = "vertexCount";

/// One attribute of an interleaved vertex buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexAttribute {
    /// Buffer holding the data
    pub buffer: Uuid,
    /// Attribute name (e.g. `position`)
    pub name: String,
    /// Number of floats per vertex
    pub size: u32,
    /// Offset in floats from the start of a vertex
    pub offset: u32,
    /// Floats per vertex in the buffer
    pub stride: u32,
}

/// Interleaved float vertex buffer
#[derive(Debug)]
pub struct VertexBuffer {
    uuid: Uuid,
    data: Vec<f32>,
    attributes: RefCell<Vec<VertexAttribute>>,
    stride: Cell<u32>,
}

impl VertexBuffer {
    /// Wrap raw interleaved data
    pub fn new(data: Vec<f32>) -> Rc<Self> {
        Rc::new(Self {
            uuid: Uuid::new(),
            data,
            attributes: RefCell::new(Vec::new()),
            stride: Cell::new(0),
        })
    }

    /// Buffer identifier
    pub const fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// Raw data
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Declare an attribute of `size` floats at `offset`
    pub fn add_attribute(&self, name: impl Into<String>, size: u32, offset: u32) {
        let stride = self.stride.get().max(offset + size);
        self.stride.set(stride);

        let mut attributes = self.attributes.borrow_mut();
        attributes.push(VertexAttribute {
            buffer: self.uuid,
            name: name.into(),
            size,
            offset,
            stride,
        });
        for attribute in attributes.iter_mut() {
            attribute.stride = stride;
        }
    }

    /// Declared attributes
    pub fn attributes(&self) -> Vec<VertexAttribute> {
        self.attributes.borrow().clone()
    }

    /// Number of whole vertices in the buffer
    pub fn num_vertices(&self) -> u32 {
        match self.stride.get() {
            0 => 0,
            stride => u32::try_from(self.data.len()).map_or(u32::MAX, |len| len / stride),
        }
    }
}

/// Named set of vertex buffers
#[derive(Debug)]
pub struct Geometry {
    name: String,
    provider: Rc<Provider>,
    buffers: RefCell<Vec<Rc<VertexBuffer>>>,
}

impl Geometry {
    /// Empty geometry
    pub fn new(name: impl Into<String>) -> Rc<Self> {
        Rc::new(Self {
            name: name.into(),
            provider: Provider::new(),
            buffers: RefCell::new(Vec::new()),
        })
    }

    /// Geometry identifier (its provider's uuid)
    pub fn uuid(&self) -> Uuid {
        self.provider.uuid()
    }

    /// Geometry name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Provider registered in target stores
    pub fn data(&self) -> &Rc<Provider> {
        &self.provider
    }

    /// Publish every attribute of `buffer`
    pub fn add_vertex_buffer(&self, buffer: Rc<VertexBuffer>) -> SceneResult<()> {
        for attribute in buffer.attributes() {
            self.provider.set(attribute.name.clone(), Value::Attribute(attribute))?;
        }
        self.buffers.borrow_mut().push(buffer);
        self.update_vertex_count()
    }

    /// Withdraw every attribute of `buffer`
    pub fn remove_vertex_buffer(&self, buffer: &Rc<VertexBuffer>) -> SceneResult<()> {
        self.buffers.borrow_mut().retain(|b| !Rc::ptr_eq(b, buffer));
        for attribute in buffer.attributes() {
            self.provider.unset(&attribute.name)?;
        }
        self.update_vertex_count()
    }

    /// Attached buffers
    pub fn vertex_buffers(&self) -> Vec<Rc<VertexBuffer>> {
        self.buffers.borrow().clone()
    }

    /// Vertices drawable from every buffer
    pub fn vertex_count(&self) -> u32 {
        self.buffers
            .borrow()
            .iter()
            .map(|b| b.num_vertices())
            .min()
            .unwrap_or(0)
    }

    fn update_vertex_count(&self) -> SceneResult<()> {
        self.provider.set(VERTEX_COUNT, i32::try_from(self.vertex_count()).unwrap_or(i32::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interleaved_buffer() {
        let buffer = VertexBuffer::new(vec![0.0; 6 * 4]);
        buffer.add_attribute("position", 2, 0);
        buffer.add_attribute("uv", 2, 2);

        assert_eq!(buffer.num_vertices(), 6);
        assert!(buffer.attributes().iter().all(|a| a.stride == 4));
    }

    #[test]
    fn test_partial_vertex_not_counted() {
        let buffer = VertexBuffer::new(vec![0.0; 10]);
        assert_eq!(buffer.num_vertices(), 0);
        buffer.add_attribute("position", 3, 0);
        assert_eq!(buffer.num_vertices(), 3);
    }

    #[test]
    fn test_geometry_publishes_attributes() {
        let geometry = Geometry::new("quad");
        let buffer = VertexBuffer::new(vec![0.0; 9]);
        buffer.add_attribute("position", 3, 0);
        geometry.add_vertex_buffer(buffer.clone()).unwrap();

        assert!(geometry.data().has_property("position"));
        assert_eq!(geometry.data().get::<i32>(VERTEX_COUNT).unwrap(), 3);

        geometry.remove_vertex_buffer(&buffer).unwrap();
        assert!(!geometry.data().has_property("position"));
        assert_eq!(geometry.vertex_count(), 0);
    }
}
