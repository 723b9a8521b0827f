//! Keeps parent-relative scene transforms and world-space bodies in agreement.
//!
//! Each step runs in two halves: [`push_transform_to_body`] before the solver
//! moves the body to wherever the scene graph says it is, and
//! [`pull_body_to_transform`] afterwards folds the solver's motion back into
//! the node's local transform, undoing the accumulated ancestor rotation.
//!
//! Ancestor scale is honoured for translation only. Shapes keep the size they
//! were created with, and a world-space delta is added to the local position
//! without dividing out ancestor scale.

use engine_core::{world_matrix, Entity, TransformTree};
use glam::DVec2;

/// The physics side of a binding: a body's world-space pose.
pub trait BodyState {
    fn position(&self) -> DVec2;
    fn angle(&self) -> f64;
    fn set_position(&mut self, position: DVec2);
    fn set_angle(&mut self, angle: f64);
    /// Bring a sleeping body back into the solver.
    fn wake(&mut self);
}

/// What a push wrote into the body. A pull measures the solver's motion
/// against it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncPoint {
    /// Body world position after the push.
    pub position: DVec2,
    /// Body world angle after the push.
    pub angle: f64,
    /// Accumulated rotation of the node's ancestors at push time.
    pub parent_rotation: f64,
}

/// Rotation of a node in world space: its own rotation plus that of every
/// ancestor. Nodes without a transform contribute nothing.
pub fn resolve_world_rotation<T: TransformTree + ?Sized>(tree: &T, node: Entity) -> f64 {
    let own = tree.local(node).map_or(0.0, |t| t.rotation);
    match tree.parent(node) {
        Some(parent) => own + resolve_world_rotation(tree, parent),
        None => own,
    }
}

fn parent_rotation<T: TransformTree + ?Sized>(tree: &T, node: Entity) -> f64 {
    tree.parent(node)
        .map_or(0.0, |parent| resolve_world_rotation(tree, parent))
}

/// World pose the body should take for the node's current transform.
pub(crate) fn target_pose<T: TransformTree + ?Sized>(
    tree: &T,
    node: Entity,
    center: DVec2,
) -> Option<SyncPoint> {
    let local = tree.local(node)?;
    let matrix = world_matrix(tree, node);
    let parent_rotation = parent_rotation(tree, node);
    let angle = local.rotation + parent_rotation;

    // The pivot is where the anchor lands in world space; the body's center
    // hangs off it, rotated but not scaled.
    let pivot = matrix.transform_point2(local.anchor());
    let position = pivot + DVec2::from_angle(angle).rotate(center - local.anchor());

    Some(SyncPoint {
        position,
        angle,
        parent_rotation,
    })
}

/// Move the body to the node's world pose. Returns `None` if the node has no
/// transform, in which case the body is left untouched.
pub fn push_transform_to_body<T, B>(
    tree: &T,
    node: Entity,
    center: DVec2,
    body: &mut B,
) -> Option<SyncPoint>
where
    T: TransformTree + ?Sized,
    B: BodyState + ?Sized,
{
    let pose = target_pose(tree, node, center)?;
    body.set_position(pose.position);
    body.set_angle(pose.angle);
    Some(pose)
}

/// Fold the body's motion since `sync` back into the node's local transform.
pub fn pull_body_to_transform<T, B>(
    tree: &mut T,
    node: Entity,
    center: DVec2,
    body: &B,
    sync: &SyncPoint,
) where
    T: TransformTree + ?Sized,
    B: BodyState + ?Sized,
{
    let Some(mut local) = tree.local(node) else {
        return;
    };

    let angle = body.angle();
    let offset = center - local.anchor();
    let old_pivot = sync.position - DVec2::from_angle(sync.angle).rotate(offset);
    let new_pivot = body.position() - DVec2::from_angle(angle).rotate(offset);

    let delta = DVec2::from_angle(-sync.parent_rotation).rotate(new_pivot - old_pivot);
    local.translate(delta);
    local.rotation = angle - sync.parent_rotation;
    tree.set_local(node, local);
}

/// Place the body's center at `position` (world space), moving the node
/// with it. Wakes the body first.
pub fn teleport_position<T, B>(
    tree: &mut T,
    node: Entity,
    center: DVec2,
    body: &mut B,
    position: DVec2,
) where
    T: TransformTree + ?Sized,
    B: BodyState + ?Sized,
{
    body.wake();
    let Some(current) = target_pose(&*tree, node, center) else {
        body.set_position(position);
        return;
    };
    if let Some(mut local) = tree.local(node) {
        let delta = DVec2::from_angle(-current.parent_rotation).rotate(position - current.position);
        local.translate(delta);
        tree.set_local(node, local);
    }
    push_transform_to_body(&*tree, node, center, body);
}

/// Set the world angle of the node and its body. Wakes the body first.
pub fn teleport_angle<T, B>(tree: &mut T, node: Entity, center: DVec2, body: &mut B, angle: f64)
where
    T: TransformTree + ?Sized,
    B: BodyState + ?Sized,
{
    body.wake();
    let Some(mut local) = tree.local(node) else {
        body.set_angle(angle);
        return;
    };
    local.rotation = angle - parent_rotation(&*tree, node);
    tree.set_local(node, local);
    push_transform_to_body(&*tree, node, center, body);
}

/// One scene node bound to one body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Binding {
    pub node: Entity,
    /// Body center relative to the node's origin.
    pub center: DVec2,
    last_sync: Option<SyncPoint>,
}

impl Binding {
    pub fn new(node: Entity, center: DVec2) -> Self {
        Self {
            node,
            center,
            last_sync: None,
        }
    }

    pub fn last_sync(&self) -> Option<SyncPoint> {
        self.last_sync
    }

    /// Push the node's pose into the body. Returns `false` if the node is
    /// gone from the tree.
    pub fn push<T, B>(&mut self, tree: &T, body: &mut B) -> bool
    where
        T: TransformTree + ?Sized,
        B: BodyState + ?Sized,
    {
        self.last_sync = push_transform_to_body(tree, self.node, self.center, body);
        self.last_sync.is_some()
    }

    /// Pull the body's motion back into the node. Does nothing unless a
    /// push happened since the last pull.
    pub fn pull<T, B>(&mut self, tree: &mut T, body: &B)
    where
        T: TransformTree + ?Sized,
        B: BodyState + ?Sized,
    {
        if let Some(sync) = self.last_sync.take() {
            pull_body_to_transform(tree, self.node, self.center, body, &sync);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine_core::{spawn_child, spawn_node, Transform2d, World};
    use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};

    const EPS: f64 = 1e-9;

    #[derive(Debug, Default)]
    struct TestBody {
        position: DVec2,
        angle: f64,
        woken: bool,
    }

    impl BodyState for TestBody {
        fn position(&self) -> DVec2 {
            self.position
        }
        fn angle(&self) -> f64 {
            self.angle
        }
        fn set_position(&mut self, position: DVec2) {
            self.position = position;
        }
        fn set_angle(&mut self, angle: f64) {
            self.angle = angle;
        }
        fn wake(&mut self) {
            self.woken = true;
        }
    }

    fn local(world: &World, node: Entity) -> Transform2d {
        world.local(node).expect("node has a transform")
    }

    #[test]
    fn root_world_rotation_is_local_rotation() {
        let mut world = World::new();
        let node = spawn_node(&mut world, Transform2d::from_position_rotation(1.0, 2.0, 0.7));
        assert!((resolve_world_rotation(&world, node) - 0.7).abs() < EPS);
    }

    #[test]
    fn world_rotation_sums_ancestors() {
        let mut world = World::new();
        let a = spawn_node(&mut world, Transform2d::from_position_rotation(0.0, 0.0, 0.1));
        let b = spawn_child(&mut world, a, Transform2d::from_position_rotation(0.0, 0.0, 0.2));
        let c = spawn_child(&mut world, b, Transform2d::from_position_rotation(0.0, 0.0, 0.3));
        assert!((resolve_world_rotation(&world, c) - 0.6).abs() < EPS);
    }

    #[test]
    fn push_then_pull_without_motion_is_identity() {
        let mut world = World::new();
        let parent = spawn_node(
            &mut world,
            Transform2d::from_position_rotation(40.0, -3.0, 1.1).with_scale(1.5),
        );
        let child = spawn_child(
            &mut world,
            parent,
            Transform2d::from_position_rotation(7.0, 9.0, -0.4).with_anchor(4.0, 2.0),
        );
        let before = local(&world, child);
        let center = DVec2::new(6.0, 1.0);

        let mut body = TestBody::default();
        let sync = push_transform_to_body(&world, child, center, &mut body).unwrap();
        pull_body_to_transform(&mut world, child, center, &body, &sync);

        let after = local(&world, child);
        assert!((after.x - before.x).abs() < EPS);
        assert!((after.y - before.y).abs() < EPS);
        assert!((after.rotation - before.rotation).abs() < EPS);
    }

    #[test]
    fn root_node_follows_body() {
        let mut world = World::new();
        let node = spawn_node(&mut world, Transform2d::from_position(10.0, 20.0));
        let mut body = TestBody::default();

        let sync = push_transform_to_body(&world, node, DVec2::ZERO, &mut body).unwrap();
        assert!((body.position - DVec2::new(10.0, 20.0)).length() < EPS);
        assert!(body.angle.abs() < EPS);

        body.position = DVec2::new(15.0, 20.0);
        body.angle = 0.1;
        pull_body_to_transform(&mut world, node, DVec2::ZERO, &body, &sync);

        let t = local(&world, node);
        assert!((t.x - 15.0).abs() < EPS);
        assert!((t.y - 20.0).abs() < EPS);
        assert!((t.rotation - 0.1).abs() < EPS);
    }

    #[test]
    fn world_delta_is_rotated_into_parent_frame() {
        let mut world = World::new();
        let parent = spawn_node(&mut world, Transform2d::from_position_rotation(0.0, 0.0, FRAC_PI_2));
        let child = spawn_child(&mut world, parent, Transform2d::from_position(5.0, 0.0));
        let mut body = TestBody::default();

        let sync = push_transform_to_body(&world, child, DVec2::ZERO, &mut body).unwrap();
        assert!((body.position - DVec2::new(0.0, 5.0)).length() < EPS);
        assert!((body.angle - FRAC_PI_2).abs() < EPS);

        body.position += DVec2::new(1.0, 0.0);
        pull_body_to_transform(&mut world, child, DVec2::ZERO, &body, &sync);

        let t = local(&world, child);
        assert!((t.x - 5.0).abs() < EPS);
        assert!((t.y - -1.0).abs() < EPS);
        assert!(t.rotation.abs() < EPS);
    }

    #[test]
    fn rotating_into_and_out_of_parent_frame_round_trips() {
        let theta = 0.83;
        let local_delta = DVec2::new(3.5, -2.25);
        let world_delta = DVec2::from_angle(theta).rotate(local_delta);
        let back = DVec2::from_angle(-theta).rotate(world_delta);
        assert!((back - local_delta).length() < EPS);
    }

    #[test]
    fn offset_center_keeps_pivot_when_body_spins_in_place() {
        let mut world = World::new();
        let node = spawn_node(
            &mut world,
            Transform2d::from_position(100.0, 100.0).with_anchor(10.0, 10.0),
        );
        let center = DVec2::new(20.0, 10.0);
        let mut body = TestBody::default();

        let sync = push_transform_to_body(&world, node, center, &mut body).unwrap();
        assert!((body.position - DVec2::new(120.0, 110.0)).length() < EPS);

        // Spin around the body's own center.
        body.angle = FRAC_PI_2;
        pull_body_to_transform(&mut world, node, center, &body, &sync);

        // Re-pushing must land the center exactly where the solver left it.
        let mut check = TestBody::default();
        push_transform_to_body(&world, node, center, &mut check);
        assert!((check.position - DVec2::new(120.0, 110.0)).length() < EPS);
        assert!((check.angle - FRAC_PI_2).abs() < EPS);
    }

    #[test]
    fn teleport_wakes_and_moves_both_sides() {
        let mut world = World::new();
        let parent = spawn_node(&mut world, Transform2d::from_position_rotation(0.0, 0.0, FRAC_PI_4));
        let child = spawn_child(&mut world, parent, Transform2d::from_position(3.0, 4.0));
        let mut body = TestBody::default();

        teleport_position(&mut world, child, DVec2::ZERO, &mut body, DVec2::new(50.0, -20.0));
        assert!(body.woken);
        assert!((body.position - DVec2::new(50.0, -20.0)).length() < EPS);

        let world_pos = world_matrix(&world, child).transform_point2(DVec2::ZERO);
        assert!((world_pos - DVec2::new(50.0, -20.0)).length() < EPS);
    }

    #[test]
    fn teleport_angle_is_world_space() {
        let mut world = World::new();
        let parent = spawn_node(&mut world, Transform2d::from_position_rotation(0.0, 0.0, 0.5));
        let child = spawn_child(&mut world, parent, Transform2d::default());
        let mut body = TestBody::default();

        teleport_angle(&mut world, child, DVec2::ZERO, &mut body, 2.0);
        assert!(body.woken);
        assert!((body.angle - 2.0).abs() < EPS);
        assert!((local(&world, child).rotation - 1.5).abs() < EPS);
    }

    #[test]
    fn binding_pull_without_push_is_ignored() {
        let mut world = World::new();
        let node = spawn_node(&mut world, Transform2d::from_position(1.0, 1.0));
        let mut binding = Binding::new(node, DVec2::ZERO);
        let body = TestBody {
            position: DVec2::new(99.0, 99.0),
            ..Default::default()
        };
        binding.pull(&mut world, &body);
        assert_eq!(local(&world, node).x, 1.0);
    }

    #[test]
    fn binding_push_reports_missing_node() {
        let mut world = World::new();
        let node = spawn_node(&mut world, Transform2d::default());
        world.despawn(node).unwrap();
        let mut binding = Binding::new(node, DVec2::ZERO);
        let mut body = TestBody::default();
        assert!(!binding.push(&world, &mut body));
        assert!(binding.last_sync().is_none());
    }
}
