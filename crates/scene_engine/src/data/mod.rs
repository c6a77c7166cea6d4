//! Property data model
//!
//! [`Provider`]s hold named [`Value`]s and notify on change; [`Store`]s
//! aggregate providers per node and re-broadcast their changes under
//! store-level keys.

mod provider;
mod store;
mod value;

pub use provider::{PropertyEvent, Provider};
pub use store::{format_key, ProviderEvent, Store, StoreEvent};
pub use value::{FromValue, Value};

/// Collection geometry providers are registered under
pub const GEOMETRY_COLLECTION: &str = "geometry";
/// Collection material providers are registered under
pub const MATERIAL_COLLECTION: &str = "material";
/// Collection effect providers are registered under
pub const EFFECT_COLLECTION: &str = "effect";
