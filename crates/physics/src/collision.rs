//! Collision layers, groups and collision types.
//!
//! * Layers: two shapes can touch only if their layer masks share a bit.
//! * Groups: shapes sharing a non-zero group never touch (parts of one
//!   object, e.g. a car's chassis and wheels).
//! * Collision type: an application tag carried along for contact handling.

use rapier2d_f64::prelude::*;

/// Layer mask that intersects every other mask.
pub const ALL_LAYERS: u32 = u32::MAX;

/// Group id meaning "no group".
pub const NO_GROUP: u32 = 0;

/// Interaction groups for a layer mask. Membership and filter are the same
/// mask, which makes the pairwise test "masks intersect".
pub fn layer_groups(layers: u32) -> InteractionGroups {
    let mask = Group::from_bits_retain(layers);
    InteractionGroups::new(mask, mask)
}

/// Whether two shapes' groups allow contact.
pub fn groups_collide(a: u32, b: u32) -> bool {
    a == NO_GROUP || a != b
}

/// Group and collision type packed into a collider's user data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShapeTag {
    pub group: u32,
    pub collision_type: u32,
}

impl ShapeTag {
    pub fn to_user_data(self) -> u128 {
        (u128::from(self.group) << 32) | u128::from(self.collision_type)
    }

    pub fn from_user_data(data: u128) -> Self {
        Self {
            group: (data >> 32) as u32,
            collision_type: data as u32,
        }
    }

    pub fn of(collider: &Collider) -> Self {
        Self::from_user_data(collider.user_data)
    }
}

/// Solver hook rejecting contacts between shapes of the same group.
///
/// Only consulted for colliders built with active hooks, which the shape
/// builder enables whenever a shape has a group.
#[derive(Debug, Clone, Copy, Default)]
pub struct GroupFilter;

impl GroupFilter {
    fn allows(&self, colliders: &ColliderSet, a: ColliderHandle, b: ColliderHandle) -> bool {
        match (colliders.get(a), colliders.get(b)) {
            (Some(a), Some(b)) => groups_collide(ShapeTag::of(a).group, ShapeTag::of(b).group),
            _ => true,
        }
    }
}

impl PhysicsHooks for GroupFilter {
    fn filter_contact_pair(&self, context: &PairFilterContext) -> Option<SolverFlags> {
        if self.allows(context.colliders, context.collider1, context.collider2) {
            Some(SolverFlags::COMPUTE_IMPULSES)
        } else {
            None
        }
    }

    fn filter_intersection_pair(&self, context: &PairFilterContext) -> bool {
        self.allows(context.colliders, context.collider1, context.collider2)
    }
}
