//! Layout bitmask
//!
//! Nodes carry a `Layout`; surfaces and renderers carry layout masks. A
//! surface is drawn by a renderer only when the three intersect.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Node layout bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct Layout: u32 {
        /// Regular scene content
        const DEFAULT = 1;
        /// Only drawn by debug renderers
        const DEBUG_ONLY = 1 << 1;
        /// Never moves
        const STATIC = 1 << 2;
        /// Skipped by picking rays
        const IGNORE_RAYCASTING = 1 << 3;
        /// Skipped by frustum culling
        const IGNORE_CULLING = 1 << 4;
        /// Not drawn
        const HIDDEN = 1 << 5;
        /// Drawn by the picking renderer
        const PICKING = 1 << 6;

        // Remaining bits are free for applications
        const _ = !0;
    }
}

impl Layout {
    /// Mask matching every layout
    pub const EVERYTHING: Self = Self::from_bits_retain(u32::MAX);

    /// Whether a node with this layout is drawn through both masks
    pub fn matches(self, surface_mask: Self, renderer_mask: Self) -> bool {
        !(self & surface_mask & renderer_mask).is_empty()
    }
}

impl Default for Layout {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_matching() {
        let node = Layout::DEFAULT;
        assert!(node.matches(Layout::EVERYTHING, Layout::EVERYTHING));
        assert!(!node.matches(Layout::EVERYTHING, Layout::DEBUG_ONLY));
        assert!(!Layout::HIDDEN.matches(Layout::DEFAULT, Layout::EVERYTHING));
    }

    #[test]
    fn test_custom_bits_survive() {
        let custom = Layout::from_bits_retain(1 << 20);
        assert!(custom.matches(Layout::EVERYTHING, Layout::from_bits_retain(1 << 20)));
    }
}
