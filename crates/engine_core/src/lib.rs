//! Core host-engine types for the 2D physics bridge.
//!
//! This crate provides the scene-graph side the physics crate talks to:
//! - 2D transforms with anchor points
//! - Parent links and the `TransformTree` contract
//! - Frame timing
//! - Common component types for ECS

pub mod components;
pub mod hierarchy;
pub mod time;
pub mod transform;

pub use components::*;
pub use hierarchy::*;
pub use time::*;
pub use transform::*;

// Re-export commonly used types
pub use glam::{DAffine2, DMat2, DVec2};
pub use hecs::{Entity, World};
