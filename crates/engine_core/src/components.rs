//! Common ECS components used across the engine.

use serde::{Deserialize, Serialize};

/// Size of a node's visual box, in node-local units.
///
/// Physics factories use it to pick default shape dimensions and mass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub width: f64,
    pub height: f64,
}

impl Bounds {
    /// Size assumed for nodes that carry no `Bounds`.
    pub const FALLBACK: Bounds = Bounds {
        width: 100.0,
        height: 100.0,
    };

    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Self::FALLBACK
    }
}

/// Human-readable label, used in logs.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Name(pub String);

impl Name {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}
