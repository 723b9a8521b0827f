//! Spatial queries against the shapes of a space.
//!
//! Results reflect shape positions as of the last step or shape change.

use crate::body::to_dvec;
use crate::collision::{groups_collide, layer_groups, ShapeTag, ALL_LAYERS, NO_GROUP};
use crate::shape::{point2, vec2};
use crate::space::Space;
use glam::DVec2;
use rapier2d_f64::parry::bounding_volume::Aabb;
use rapier2d_f64::prelude::*;

/// Which shapes a query may see: those sharing a layer bit with `layers`
/// and not in the same non-zero `group`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryMask {
    pub layers: u32,
    pub group: u32,
}

impl Default for QueryMask {
    fn default() -> Self {
        Self {
            layers: ALL_LAYERS,
            group: NO_GROUP,
        }
    }
}

impl QueryMask {
    pub fn layers(layers: u32) -> Self {
        Self {
            layers,
            ..Default::default()
        }
    }

    pub fn accepts(&self, collider: &Collider) -> bool {
        layer_groups(self.layers).test(collider.collision_groups())
            && groups_collide(self.group, ShapeTag::of(collider).group)
    }
}

/// Closest point on a shape's outline.
#[derive(Debug, Clone, Copy)]
pub struct PointHit {
    pub shape: ColliderHandle,
    /// Closest point on the shape's surface.
    pub point: DVec2,
    /// Distance to that point; negative when the query point is inside.
    pub distance: f64,
}

/// Where a segment first enters a shape.
#[derive(Debug, Clone, Copy)]
pub struct SegmentHit {
    pub shape: ColliderHandle,
    pub point: DVec2,
    pub normal: DVec2,
    /// Fraction of the way from start to end, in `[0, 1]`.
    pub alpha: f64,
}

impl Space {
    /// Shapes containing `point`.
    pub fn point_query(&self, point: DVec2, mask: QueryMask) -> Vec<ColliderHandle> {
        let predicate = |_: ColliderHandle, c: &Collider| mask.accepts(c);
        let filter = QueryFilter::default().predicate(&predicate);

        let mut shapes = Vec::new();
        self.query_pipeline.intersections_with_point(
            &self.rigid_body_set,
            &self.collider_set,
            &point2(point),
            filter,
            |handle| {
                shapes.push(handle);
                true
            },
        );
        shapes
    }

    /// First shape found containing `point`.
    pub fn point_query_first(&self, point: DVec2, mask: QueryMask) -> Option<ColliderHandle> {
        self.point_query(point, mask).into_iter().next()
    }

    /// Every shape whose outline is within `max_distance` of `point`.
    pub fn nearest_point_query(
        &self,
        point: DVec2,
        max_distance: f64,
        mask: QueryMask,
    ) -> Vec<PointHit> {
        let p = point2(point);
        let reach = DVec2::splat(max_distance.max(0.0));
        let aabb = Aabb::new(point2(point - reach), point2(point + reach));

        let mut hits = Vec::new();
        self.query_pipeline
            .colliders_with_aabb_intersecting_aabb(&aabb, |handle| {
                let Some(collider) = self.collider_set.get(*handle) else {
                    return true;
                };
                if !mask.accepts(collider) {
                    return true;
                }
                let projection = collider
                    .shape()
                    .project_point(collider.position(), &p, false);
                let surface = DVec2::new(projection.point.x, projection.point.y);
                let mut distance = surface.distance(point);
                if projection.is_inside {
                    distance = -distance;
                }
                if distance <= max_distance {
                    hits.push(PointHit {
                        shape: *handle,
                        point: surface,
                        distance,
                    });
                }
                true
            });
        hits
    }

    /// The closest shape within `max_distance` of `point`.
    pub fn nearest_point_query_nearest(
        &self,
        point: DVec2,
        max_distance: f64,
        mask: QueryMask,
    ) -> Option<PointHit> {
        self.nearest_point_query(point, max_distance, mask)
            .into_iter()
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
    }

    /// First shape hit travelling from `start` to `end`.
    pub fn segment_query_first(&self, start: DVec2, end: DVec2, mask: QueryMask) -> Option<SegmentHit> {
        let ray = Ray::new(point2(start), vec2(end - start));
        let predicate = |_: ColliderHandle, c: &Collider| mask.accepts(c);
        let filter = QueryFilter::default().predicate(&predicate);

        self.query_pipeline
            .cast_ray_and_get_normal(
                &self.rigid_body_set,
                &self.collider_set,
                &ray,
                1.0,
                true,
                filter,
            )
            .map(|(shape, hit)| segment_hit(start, end, shape, hit))
    }

    /// Every shape the segment passes through, nearest first.
    pub fn segment_query(&self, start: DVec2, end: DVec2, mask: QueryMask) -> Vec<SegmentHit> {
        let ray = Ray::new(point2(start), vec2(end - start));
        let predicate = |_: ColliderHandle, c: &Collider| mask.accepts(c);
        let filter = QueryFilter::default().predicate(&predicate);

        let mut hits = Vec::new();
        self.query_pipeline.intersections_with_ray(
            &self.rigid_body_set,
            &self.collider_set,
            &ray,
            1.0,
            true,
            filter,
            |shape, hit: RayIntersection| {
                hits.push(segment_hit(start, end, shape, hit));
                true
            },
        );
        hits.sort_by(|a, b| a.alpha.total_cmp(&b.alpha));
        hits
    }

    /// Shapes whose bounding boxes overlap the box from `min` to `max`.
    pub fn bb_query(&self, min: DVec2, max: DVec2, mask: QueryMask) -> Vec<ColliderHandle> {
        let aabb = Aabb::new(point2(min.min(max)), point2(min.max(max)));
        let mut shapes = Vec::new();
        self.query_pipeline
            .colliders_with_aabb_intersecting_aabb(&aabb, |handle| {
                if self.collider_set.get(*handle).is_some_and(|c| mask.accepts(c)) {
                    shapes.push(*handle);
                }
                true
            });
        shapes
    }
}

fn segment_hit(start: DVec2, end: DVec2, shape: ColliderHandle, hit: RayIntersection) -> SegmentHit {
    let alpha = hit.time_of_impact;
    SegmentHit {
        shape,
        point: start.lerp(end, alpha),
        normal: to_dvec(&hit.normal),
        alpha,
    }
}
