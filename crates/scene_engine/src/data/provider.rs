//! Property provider
//!
//! A `Provider` is the unit of shader-input binding: a bag of named values
//! owned by a node, geometry, material or effect, and registered into one or
//! more [`Store`](super::Store)s.

use super::value::{FromValue, Value};
use crate::error::{SceneError, SceneResult};
use crate::foundation::{Signal, Uuid};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Payload of provider property signals
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyEvent {
    /// Provider that changed
    pub provider: Uuid,
    /// Property name
    pub name: String,
}

/// Named-property container with change notification
pub struct Provider {
    uuid: Uuid,
    values: RefCell<HashMap<String, Value>>,
    property_added: Signal<PropertyEvent>,
    property_changed: Signal<PropertyEvent>,
    property_removed: Signal<PropertyEvent>,
}

impl Provider {
    /// Create an empty shared provider
    pub fn new() -> Rc<Self> {
        Rc::new(Self::empty())
    }

    /// Create a shared provider pre-populated with `values`
    ///
    /// No signal fires: nobody can be listening yet.
    pub fn with_values<I, K, V>(values: I) -> Rc<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let provider = Self::empty();
        provider
            .values
            .borrow_mut()
            .extend(values.into_iter().map(|(k, v)| (k.into(), v.into())));
        Rc::new(provider)
    }

    fn empty() -> Self {
        Self {
            uuid: Uuid::new(),
            values: RefCell::new(HashMap::new()),
            property_added: Signal::new(),
            property_changed: Signal::new(),
            property_removed: Signal::new(),
        }
    }

    /// Stable identifier of this provider
    pub const fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// Insert or overwrite a property
    ///
    /// Fires `property_added` for a new key, `property_changed` otherwise.
    pub fn set(&self, name: impl Into<String>, value: impl Into<Value>) -> SceneResult<()> {
        let name = name.into();
        let existed = self
            .values
            .borrow_mut()
            .insert(name.clone(), value.into())
            .is_some();

        let event = PropertyEvent { provider: self.uuid, name };
        if existed {
            self.property_changed.execute(&event)
        } else {
            self.property_added.execute(&event)
        }
    }

    /// Remove a property if present
    ///
    /// Returns whether something was removed; `property_removed` fires only
    /// in that case.
    pub fn unset(&self, name: &str) -> SceneResult<bool> {
        let removed = self.values.borrow_mut().remove(name).is_some();
        if removed {
            self.property_removed.execute(&PropertyEvent {
                provider: self.uuid,
                name: name.to_string(),
            })?;
        }
        Ok(removed)
    }

    /// Whether `name` is set
    pub fn has_property(&self, name: &str) -> bool {
        self.values.borrow().contains_key(name)
    }

    /// Fetch a property, failing if absent
    pub fn get_value(&self, name: &str) -> SceneResult<Value> {
        self.try_get(name)
            .ok_or_else(|| SceneError::MissingProperty(name.to_string()))
    }

    /// Fetch a property if present
    pub fn try_get(&self, name: &str) -> Option<Value> {
        self.values.borrow().get(name).cloned()
    }

    /// Fetch a typed property, failing if absent or of another type
    pub fn get<T: FromValue>(&self, name: &str) -> SceneResult<T> {
        let value = self.get_value(name)?;
        T::from_value(&value).ok_or_else(|| SceneError::PropertyType {
            name: name.to_string(),
            expected: T::TYPE_NAME,
        })
    }

    /// Names of every property, in no particular order
    pub fn property_names(&self) -> Vec<String> {
        self.values.borrow().keys().cloned().collect()
    }

    /// Number of properties
    pub fn len(&self) -> usize {
        self.values.borrow().len()
    }

    /// True when no property is set
    pub fn is_empty(&self) -> bool {
        self.values.borrow().is_empty()
    }

    /// Overwrite every property with the ones of `source`
    ///
    /// Keys missing from `source` are removed, the rest are set, each
    /// firing the matching signal.
    pub fn copy_from(&self, source: &Self) -> SceneResult<()> {
        let incoming = source.values.borrow().clone();
        let stale: Vec<String> = self
            .values
            .borrow()
            .keys()
            .filter(|k| !incoming.contains_key(*k))
            .cloned()
            .collect();

        for name in stale {
            self.unset(&name)?;
        }
        for (name, value) in incoming {
            self.set(name, value)?;
        }
        Ok(())
    }

    /// Independent shared copy (values are shared handles, not deep copies)
    pub fn duplicate(&self) -> Rc<Self> {
        Rc::new(self.clone())
    }

    /// Fired after a new key is inserted
    pub const fn property_added(&self) -> &Signal<PropertyEvent> {
        &self.property_added
    }

    /// Fired after an existing key is overwritten
    pub const fn property_changed(&self) -> &Signal<PropertyEvent> {
        &self.property_changed
    }

    /// Fired after an existing key is removed
    pub const fn property_removed(&self) -> &Signal<PropertyEvent> {
        &self.property_removed
    }
}

impl Clone for Provider {
    /// Copy of the key/value map under a fresh uuid, with no subscribers
    fn clone(&self) -> Self {
        let copy = Self::empty();
        *copy.values.borrow_mut() = self.values.borrow().clone();
        copy
    }
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider")
            .field("uuid", &self.uuid)
            .field("values", &self.values.borrow())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_set_then_unset_fires_one_removal() {
        let provider = Provider::new();
        let removed = Rc::new(Cell::new(0));
        let r = Rc::clone(&removed);
        let _slot = provider.property_removed().connect(move |e| {
            assert_eq!(e.name, "diffuseColor");
            r.set(r.get() + 1);
            Ok(())
        });

        provider.set("diffuseColor", 1.0_f32).unwrap();
        assert!(provider.unset("diffuseColor").unwrap());
        assert!(!provider.unset("diffuseColor").unwrap());

        assert!(!provider.has_property("diffuseColor"));
        assert_eq!(removed.get(), 1);
    }

    #[test]
    fn test_added_then_changed() {
        let provider = Provider::new();
        let added = Rc::new(Cell::new(0));
        let changed = Rc::new(Cell::new(0));
        let a = Rc::clone(&added);
        let c = Rc::clone(&changed);
        let _s1 = provider.property_added().connect(move |_| { a.set(a.get() + 1); Ok(()) });
        let _s2 = provider.property_changed().connect(move |_| { c.set(c.get() + 1); Ok(()) });

        provider.set("alpha", 0.5_f32).unwrap();
        provider.set("alpha", 0.25_f32).unwrap();

        assert_eq!(added.get(), 1);
        assert_eq!(changed.get(), 1);
        assert_eq!(provider.get::<f32>("alpha").unwrap(), 0.25);
    }

    #[test]
    fn test_missing_property_fails() {
        let provider = Provider::new();
        assert!(matches!(provider.get_value("nope"), Err(SceneError::MissingProperty(_))));

        provider.set("count", 3).unwrap();
        assert!(matches!(provider.get::<f32>("count"), Err(SceneError::PropertyType { .. })));
    }

    #[test]
    fn test_clone_is_independent() {
        let original = Provider::with_values([("a", 1), ("b", 2)]);
        let copy = original.duplicate();

        copy.set("a", 10).unwrap();
        original.unset("b").unwrap();

        assert_ne!(copy.uuid(), original.uuid());
        assert_eq!(original.get::<i32>("a").unwrap(), 1);
        assert_eq!(copy.get::<i32>("b").unwrap(), 2);
    }

    #[test]
    fn test_copy_from_overwrites_everything() {
        let target = Provider::with_values([("old", 1), ("kept", 2)]);
        let source = Provider::with_values([("kept", 20), ("new", 30)]);

        let removed = Rc::new(RefCell::new(Vec::new()));
        let r = Rc::clone(&removed);
        let _slot = target.property_removed().connect(move |e| { r.borrow_mut().push(e.name.clone()); Ok(()) });

        target.copy_from(&source).unwrap();

        assert_eq!(*removed.borrow(), vec!["old".to_string()]);
        assert_eq!(target.len(), 2);
        assert_eq!(target.get::<i32>("kept").unwrap(), 20);
        assert_eq!(target.get::<i32>("new").unwrap(), 30);
    }
}
