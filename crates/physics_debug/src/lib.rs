//! Debug overlay for physics spaces.
//!
//! Produces outlines of shapes, lines for joints and velocity arrows, already
//! in camera space, plus a flat line list ready for GPU upload. Drawing the
//! lines is up to the host renderer.

pub mod draw;
pub mod vertex;

pub use draw::*;
pub use vertex::*;
