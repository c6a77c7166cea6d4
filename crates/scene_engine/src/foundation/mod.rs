//! Foundation module - Core utilities and types
//!
//! This module provides fundamental utilities used throughout the engine:
//! - Math types and operations
//! - Stable identifiers
//! - Prioritized signals (observer primitive)
//! - Logging utilities

pub mod math;
pub mod uuid;
pub mod signal;
pub mod logging;

pub use signal::{Signal, Slot};
pub use uuid::Uuid;
