//! Aggregated property store
//!
//! Every node owns one `Store`. Providers are registered into it, optionally
//! under a collection name, and the store exposes their properties under
//! flat keys:
//!
//! - without a collection: `name`
//! - under collection `C`: `C[<provider-uuid>].name`
//!
//! Lookups search the most recently registered provider first.

use super::provider::{PropertyEvent, Provider};
use super::value::{FromValue, Value};
use crate::error::{SceneError, SceneResult};
use crate::foundation::{Signal, Slot, Uuid};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Payload of store-level property signals
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreEvent {
    /// Store-level key (collection-qualified when applicable)
    pub key: String,
    /// Provider holding the property
    pub provider: Uuid,
}

/// Payload of provider registration signals
#[derive(Debug, Clone)]
pub struct ProviderEvent {
    /// Registered provider
    pub provider: Rc<Provider>,
    /// Collection it was registered under
    pub collection: Option<String>,
}

/// Build the store key of property `name` of `provider` in `collection`
pub fn format_key(collection: Option<&str>, provider: Uuid, name: &str) -> String {
    match collection {
        Some(collection) => format!("{collection}[{provider}].{name}"),
        None => name.to_string(),
    }
}

fn property_name<'k>(key: &'k str, collection: Option<&str>, provider: Uuid) -> Option<&'k str> {
    match collection {
        None => Some(key),
        Some(collection) => key
            .strip_prefix(collection)?
            .strip_prefix('[')?
            .strip_prefix(provider.to_string().as_str())?
            .strip_prefix("].")
    }
}

type KeySignals = Rc<RefCell<HashMap<String, Signal<StoreEvent>>>>;

#[derive(Clone)]
struct Broadcast {
    added: Signal<StoreEvent>,
    changed: Signal<StoreEvent>,
    removed: Signal<StoreEvent>,
    per_key: KeySignals,
}

impl Broadcast {
    fn keyed(&self, key: &str) -> Option<Signal<StoreEvent>> {
        self.per_key.borrow().get(key).cloned()
    }

    fn fire(&self, signal: &Signal<StoreEvent>, event: &StoreEvent) -> SceneResult<()> {
        signal.execute(event)?;
        match self.keyed(&event.key) {
            Some(keyed) => keyed.execute(event),
            None => Ok(()),
        }
    }

    fn fire_added(&self, event: &StoreEvent) -> SceneResult<()> {
        self.fire(&self.added, event)
    }

    fn fire_changed(&self, event: &StoreEvent) -> SceneResult<()> {
        self.fire(&self.changed, event)
    }

    /// Fires `removed` then drops the key signal once nobody listens to it
    fn fire_removed(&self, event: &StoreEvent) -> SceneResult<()> {
        let result = self.fire(&self.removed, event);
        let mut per_key = self.per_key.borrow_mut();
        if per_key.get(&event.key).is_some_and(|signal| signal.is_empty()) {
            per_key.remove(&event.key);
        }
        result
    }
}

struct Entry {
    provider: Rc<Provider>,
    collection: Option<String>,
    _slots: [Slot; 3],
}

/// Per-node aggregate of providers
pub struct Store {
    entries: RefCell<Vec<Entry>>,
    broadcast: Broadcast,
    provider_added: Signal<ProviderEvent>,
    provider_removed: Signal<ProviderEvent>,
}

impl Store {
    /// Create an empty shared store
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            entries: RefCell::new(Vec::new()),
            broadcast: Broadcast {
                added: Signal::new(),
                changed: Signal::new(),
                removed: Signal::new(),
                per_key: Rc::new(RefCell::new(HashMap::new())),
            },
            provider_added: Signal::new(),
            provider_removed: Signal::new(),
        })
    }

    /// Register `provider`, optionally under `collection`
    ///
    /// Fires `provider_added` then `property_added` for each of its keys.
    /// The same provider may be registered several times; each registration
    /// must be matched by one removal.
    pub fn add_provider(&self, provider: &Rc<Provider>, collection: Option<&str>) -> SceneResult<()> {
        let collection = collection.map(str::to_string);
        let slots = [
            self.forward(provider.property_added(), collection.clone(), Broadcast::fire_added),
            self.forward(provider.property_changed(), collection.clone(), Broadcast::fire_changed),
            self.forward(provider.property_removed(), collection.clone(), Broadcast::fire_removed),
        ];

        self.entries.borrow_mut().push(Entry {
            provider: Rc::clone(provider),
            collection: collection.clone(),
            _slots: slots,
        });
        log::trace!("store: provider {} added (collection {:?})", provider.uuid(), collection);

        self.provider_added.execute(&ProviderEvent {
            provider: Rc::clone(provider),
            collection: collection.clone(),
        })?;
        for name in provider.property_names() {
            let event = StoreEvent {
                key: format_key(collection.as_deref(), provider.uuid(), &name),
                provider: provider.uuid(),
            };
            self.broadcast.fire_added(&event)?;
        }
        Ok(())
    }

    /// Unregister `provider` from `collection`
    ///
    /// Fails with [`SceneError::ProviderNotRegistered`] when the provider is
    /// not registered under that exact collection.
    pub fn remove_provider(&self, provider: &Rc<Provider>, collection: Option<&str>) -> SceneResult<()> {
        let removed = {
            let mut entries = self.entries.borrow_mut();
            entries
                .iter()
                .rposition(|e| Rc::ptr_eq(&e.provider, provider) && e.collection.as_deref() == collection)
                .map(|index| entries.remove(index))
        };
        let Some(entry) = removed else {
            return Err(SceneError::ProviderNotRegistered {
                provider: provider.uuid(),
                collection: collection.map(str::to_string),
            });
        };
        drop(entry);
        log::trace!("store: provider {} removed (collection {:?})", provider.uuid(), collection);

        for name in provider.property_names() {
            let event = StoreEvent {
                key: format_key(collection, provider.uuid(), &name),
                provider: provider.uuid(),
            };
            self.broadcast.fire_removed(&event)?;
        }
        self.provider_removed.execute(&ProviderEvent {
            provider: Rc::clone(provider),
            collection: collection.map(str::to_string),
        })
    }

    fn forward(
        &self,
        source: &Signal<PropertyEvent>,
        collection: Option<String>,
        fire: fn(&Broadcast, &StoreEvent) -> SceneResult<()>,
    ) -> Slot {
        let broadcast = self.broadcast.clone();
        source.connect(move |event| {
            let store_event = StoreEvent {
                key: format_key(collection.as_deref(), event.provider, &event.name),
                provider: event.provider,
            };
            fire(&broadcast, &store_event)
        })
    }

    /// Whether `provider` is registered under `collection`
    pub fn has_provider(&self, provider: &Rc<Provider>, collection: Option<&str>) -> bool {
        self.entries
            .borrow()
            .iter()
            .any(|e| Rc::ptr_eq(&e.provider, provider) && e.collection.as_deref() == collection)
    }

    /// Registered providers, oldest first
    pub fn providers(&self) -> Vec<Rc<Provider>> {
        self.entries.borrow().iter().map(|e| Rc::clone(&e.provider)).collect()
    }

    /// Fetch the value behind a store key
    pub fn get(&self, key: &str) -> Option<Value> {
        self.entries.borrow().iter().rev().find_map(|entry| {
            property_name(key, entry.collection.as_deref(), entry.provider.uuid())
                .and_then(|name| entry.provider.try_get(name))
        })
    }

    /// Fetch the value behind a store key, failing if absent
    pub fn get_value(&self, key: &str) -> SceneResult<Value> {
        self.get(key).ok_or_else(|| SceneError::MissingProperty(key.to_string()))
    }

    /// Typed fetch
    pub fn get_as<T: FromValue>(&self, key: &str) -> SceneResult<T> {
        let value = self.get_value(key)?;
        T::from_value(&value).ok_or_else(|| SceneError::PropertyType {
            name: key.to_string(),
            expected: T::TYPE_NAME,
        })
    }

    /// Whether `key` resolves to a value
    pub fn has_property(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Fired when a key appears
    pub const fn property_added(&self) -> &Signal<StoreEvent> {
        &self.broadcast.added
    }

    /// Fired when the value behind a key is overwritten
    pub const fn property_changed(&self) -> &Signal<StoreEvent> {
        &self.broadcast.changed
    }

    /// Fired when a key disappears
    pub const fn property_removed(&self) -> &Signal<StoreEvent> {
        &self.broadcast.removed
    }

    /// Signal fired whenever `key` is added, changed or removed
    pub fn key_changed(&self, key: &str) -> Signal<StoreEvent> {
        self.broadcast
            .per_key
            .borrow_mut()
            .entry(key.to_string())
            .or_default()
            .clone()
    }

    /// Fired after a provider is registered
    pub const fn provider_added(&self) -> &Signal<ProviderEvent> {
        &self.provider_added
    }

    /// Fired after a provider is unregistered
    pub const fn provider_removed(&self) -> &Signal<ProviderEvent> {
        &self.provider_removed
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.entries.borrow();
        f.debug_list()
            .entries(entries.iter().map(|e| (e.provider.uuid(), e.collection.clone())))
            .finish()
    }
}
