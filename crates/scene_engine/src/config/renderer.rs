//! Renderer configuration

use super::{Config, ConfigError};
use crate::foundation::math::Rect;
use serde::{Deserialize, Serialize};

/// # Renderer Configuration
///
/// Initial state of a [`Renderer`](crate::component::Renderer) component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Packed `0xRRGGBBAA` clear color
    pub background_color: u32,
    /// Viewport box; negative size means "full target"
    pub viewport: Rect,
    /// Scissor box; negative size disables the scissor test
    pub scissor: Rect,
    /// Clear the target before drawing
    pub clear_before_render: bool,
    /// Tick order among renderers of one scene (higher first)
    pub priority: f32,
    /// Layout bits this renderer draws
    pub layout_mask: u32,
    /// Technique used with the renderer's effect override
    pub effect_technique: String,
    /// Whether the renderer starts enabled
    pub enabled: bool,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            background_color: 0x0000_00ff,
            viewport: Rect::UNSET,
            scissor: Rect::UNSET,
            clear_before_render: true,
            priority: 0.0,
            layout_mask: u32::MAX,
            effect_technique: "default".to_string(),
            enabled: true,
        }
    }
}

impl RendererConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.priority.is_finite() {
            return Err(ConfigError::Invalid("renderer priority must be finite".to_string()));
        }
        if self.effect_technique.is_empty() {
            return Err(ConfigError::Invalid("effect technique cannot be empty".to_string()));
        }
        Ok(())
    }
}

impl Config for RendererConfig {}
