//! Stable identifiers for scene objects

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_UUID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier handed out to nodes, providers and resources.
///
/// Formatted as 16 lowercase hex digits; that string form is what binding
/// variables such as `materialUuid` carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Uuid(u64);

impl Uuid {
    /// Allocate a fresh identifier
    pub fn new() -> Self {
        Self(NEXT_UUID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl Default for Uuid {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Uuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuids_are_unique() {
        let a = Uuid::new();
        let b = Uuid::new();
        assert_ne!(a, b);
        assert_eq!(a.to_string().len(), 16);
    }
}
