//! Error type for fallible physics operations.

use rapier2d_f64::prelude::{ColliderHandle, ImpulseJointHandle, RigidBodyHandle};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PhysicsError {
    #[error("body {0:?} is not in this space")]
    UnknownBody(RigidBodyHandle),

    #[error("shape {0:?} is not in this space")]
    UnknownShape(ColliderHandle),

    #[error("joint {0:?} is not in this space")]
    UnknownJoint(ImpulseJointHandle),

    #[error("space {0} is not managed here")]
    UnknownSpace(usize),

    #[error("invalid shape: {0}")]
    InvalidShape(String),

    #[error("invalid body: {0}")]
    InvalidBody(String),

    #[error("invalid joint: {0}")]
    InvalidJoint(String),

    #[error("scene node {0:?} has no transform")]
    MissingNode(hecs::Entity),
}

pub type PhysicsResult<T> = Result<T, PhysicsError>;
