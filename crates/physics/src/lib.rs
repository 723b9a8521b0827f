//! 2D rigid-body physics for the scene graph, built on Rapier2D.
//!
//! Scene nodes keep parent-relative transforms while rapier works in world
//! space. A [`Space`] binds nodes to bodies and, on every step, pushes node
//! poses into the bodies, simulates, then pulls the results back.

pub mod body;
pub mod collision;
pub mod component;
pub mod error;
pub mod joint;
pub mod manager;
pub mod moment;
pub mod query;
pub mod reconcile;
pub mod shape;
pub mod space;

pub use body::*;
pub use collision::*;
pub use component::*;
pub use error::*;
pub use joint::*;
pub use manager::*;
pub use moment::*;
pub use query::*;
pub use reconcile::*;
pub use shape::*;
pub use space::*;

// Re-export Rapier for downstream crates
pub use rapier2d_f64;

// Re-export common Rapier types
pub use rapier2d_f64::prelude::{ColliderHandle, ImpulseJointHandle, RigidBodyHandle};
