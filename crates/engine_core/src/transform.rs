//! Transform component and utilities for 2D positioning.

use glam::{DAffine2, DVec2};
use serde::{Deserialize, Serialize};

/// A parent-relative 2D transform.
///
/// `x`/`y` place the node's origin (its top-left corner) in the parent's
/// frame. Rotation and scale pivot around the anchor point, which is given
/// relative to the node's origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform2d {
    pub x: f64,
    pub y: f64,
    /// Rotation in radians.
    pub rotation: f64,
    pub scale_x: f64,
    pub scale_y: f64,
    pub anchor_x: f64,
    pub anchor_y: f64,
}

impl Default for Transform2d {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            rotation: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            anchor_x: 0.0,
            anchor_y: 0.0,
        }
    }
}

impl Transform2d {
    /// Create a new transform at the given position.
    pub fn from_position(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            ..Default::default()
        }
    }

    /// Create a new transform with position and rotation.
    pub fn from_position_rotation(x: f64, y: f64, rotation: f64) -> Self {
        Self {
            x,
            y,
            rotation,
            ..Default::default()
        }
    }

    /// Set the anchor (pivot) point, relative to the node's origin.
    pub fn with_anchor(mut self, anchor_x: f64, anchor_y: f64) -> Self {
        self.anchor_x = anchor_x;
        self.anchor_y = anchor_y;
        self
    }

    /// Set a uniform scale.
    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale_x = scale;
        self.scale_y = scale;
        self
    }

    pub fn position(&self) -> DVec2 {
        DVec2::new(self.x, self.y)
    }

    pub fn anchor(&self) -> DVec2 {
        DVec2::new(self.anchor_x, self.anchor_y)
    }

    /// Matrix mapping node-local points into the parent's frame.
    ///
    /// The node is scaled and rotated around its anchor, then the anchor is
    /// placed at `position + anchor` in the parent frame.
    pub fn to_matrix(&self) -> DAffine2 {
        let anchor = self.anchor();
        DAffine2::from_scale_angle_translation(
            DVec2::new(self.scale_x, self.scale_y),
            self.rotation,
            self.position() + anchor,
        ) * DAffine2::from_translation(-anchor)
    }

    /// Translate the transform by a delta in the parent frame.
    pub fn translate(&mut self, delta: DVec2) {
        self.x += delta.x;
        self.y += delta.y;
    }

    /// Rotate by an angle in radians.
    pub fn rotate(&mut self, angle: f64) {
        self.rotation += angle;
    }
}
