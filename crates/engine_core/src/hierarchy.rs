//! Parent links and world-space resolution for the scene graph.

use crate::Transform2d;
use glam::DAffine2;
use hecs::{Entity, World};

/// Links a node to its parent. Transforms of child nodes are relative to
/// the parent's frame.
///
/// The graph must stay acyclic; nothing here checks for cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Parent(pub Entity);

/// Read/write access to a hierarchy of parent-relative transforms.
pub trait TransformTree {
    /// Local transform of a node, if it has one.
    fn local(&self, node: Entity) -> Option<Transform2d>;

    /// Overwrite the local transform of a node. Returns `false` if the node
    /// has no transform.
    fn set_local(&mut self, node: Entity, transform: Transform2d) -> bool;

    /// Parent of a node, if any.
    fn parent(&self, node: Entity) -> Option<Entity>;
}

impl TransformTree for World {
    fn local(&self, node: Entity) -> Option<Transform2d> {
        self.get::<&Transform2d>(node).ok().map(|t| *t)
    }

    fn set_local(&mut self, node: Entity, transform: Transform2d) -> bool {
        match self.get::<&mut Transform2d>(node) {
            Ok(mut t) => {
                *t = transform;
                true
            }
            Err(_) => false,
        }
    }

    fn parent(&self, node: Entity) -> Option<Entity> {
        self.get::<&Parent>(node).ok().map(|p| p.0)
    }
}

/// Concatenated matrix of a node: its local matrix composed with every
/// ancestor's, mapping node-local points to world space.
///
/// Nodes without a transform contribute identity.
pub fn world_matrix<T: TransformTree + ?Sized>(tree: &T, node: Entity) -> DAffine2 {
    let local = tree
        .local(node)
        .map(|t| t.to_matrix())
        .unwrap_or(DAffine2::IDENTITY);
    match tree.parent(node) {
        Some(parent) => world_matrix(tree, parent) * local,
        None => local,
    }
}

/// Spawn a root node.
pub fn spawn_node(world: &mut World, transform: Transform2d) -> Entity {
    world.spawn((transform,))
}

/// Spawn a node under `parent`.
pub fn spawn_child(world: &mut World, parent: Entity, transform: Transform2d) -> Entity {
    world.spawn((transform, Parent(parent)))
}
