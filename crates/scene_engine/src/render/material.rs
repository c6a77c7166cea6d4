//! Materials

use crate::data::{Provider, Value};
use crate::error::SceneResult;
use crate::foundation::Uuid;
use std::rc::Rc;

/// Material property overriding the pass priority
pub const PRIORITY: &str = "priority";
/// Material property overriding the pass z-sorting flag
pub const Z_SORTED: &str = "zSorted";

/// Named bag of shading properties
#[derive(Debug)]
pub struct Material {
    name: String,
    provider: Rc<Provider>,
}

impl Material {
    /// Empty material
    pub fn new(name: impl Into<String>) -> Rc<Self> {
        Rc::new(Self {
            name: name.into(),
            provider: Provider::new(),
        })
    }

    /// Material identifier (its provider's uuid)
    pub fn uuid(&self) -> Uuid {
        self.provider.uuid()
    }

    /// Material name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Provider registered in target stores
    pub fn data(&self) -> &Rc<Provider> {
        &self.provider
    }

    /// Set a property
    pub fn set(&self, name: impl Into<String>, value: impl Into<Value>) -> SceneResult<()> {
        self.provider.set(name, value)
    }
}
