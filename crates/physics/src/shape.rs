//! Collision shapes attached to bodies.

use crate::collision::{layer_groups, ShapeTag, ALL_LAYERS, NO_GROUP};
use crate::error::{PhysicsError, PhysicsResult};
use glam::DVec2;
use rapier2d_f64::prelude::*;
use serde::{Deserialize, Serialize};

/// Geometry of a shape, in the body's local frame (origin = body center).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ShapeKind {
    /// Box centered on the body, shifted by `offset`.
    Box {
        width: f64,
        height: f64,
        #[serde(default)]
        offset: DVec2,
    },
    /// Box given by its edges.
    BoundingBox {
        left: f64,
        bottom: f64,
        right: f64,
        top: f64,
    },
    Circle {
        radius: f64,
        #[serde(default)]
        offset: DVec2,
    },
    /// Line from `start` to `end`, thickened by `radius`.
    Segment {
        start: DVec2,
        end: DVec2,
        #[serde(default)]
        radius: f64,
    },
    /// Convex polygon. Concave input is replaced by its convex hull.
    Poly {
        verts: Vec<DVec2>,
        #[serde(default)]
        offset: DVec2,
    },
}

/// Surface and filtering properties of a shape.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShapeMaterial {
    /// Restitution; 0 = no bounce.
    #[serde(default)]
    pub elasticity: f64,
    #[serde(default)]
    pub friction: f64,
    #[serde(default)]
    pub group: u32,
    #[serde(default = "default_layers")]
    pub layers: u32,
    /// Sensors report overlaps but never push back.
    #[serde(default)]
    pub sensor: bool,
    #[serde(default)]
    pub collision_type: u32,
}

fn default_layers() -> u32 {
    ALL_LAYERS
}

impl Default for ShapeMaterial {
    fn default() -> Self {
        Self {
            elasticity: 0.0,
            friction: 0.0,
            group: NO_GROUP,
            layers: ALL_LAYERS,
            sensor: false,
            collision_type: 0,
        }
    }
}

/// A shape ready to be attached to a body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeDesc {
    pub kind: ShapeKind,
    #[serde(default)]
    pub material: ShapeMaterial,
}

impl ShapeDesc {
    pub fn new(kind: ShapeKind) -> Self {
        Self {
            kind,
            material: ShapeMaterial::default(),
        }
    }

    pub fn with_material(mut self, material: ShapeMaterial) -> Self {
        self.material = material;
        self
    }

    pub fn boxed(width: f64, height: f64) -> Self {
        Self::new(ShapeKind::Box {
            width,
            height,
            offset: DVec2::ZERO,
        })
    }

    pub fn circle(radius: f64) -> Self {
        Self::new(ShapeKind::Circle {
            radius,
            offset: DVec2::ZERO,
        })
    }

    pub fn segment(start: DVec2, end: DVec2, radius: f64) -> Self {
        Self::new(ShapeKind::Segment { start, end, radius })
    }

    pub fn poly(verts: Vec<DVec2>) -> Self {
        Self::new(ShapeKind::Poly {
            verts,
            offset: DVec2::ZERO,
        })
    }

    /// Build the rapier collider. Shapes carry no density; body mass comes
    /// from the body description alone.
    pub fn to_collider(&self) -> PhysicsResult<Collider> {
        let m = &self.material;
        if !(m.elasticity >= 0.0 && m.friction >= 0.0) {
            return Err(invalid("elasticity and friction must be non-negative"));
        }

        let tag = ShapeTag {
            group: m.group,
            collision_type: m.collision_type,
        };
        let hooks = if m.group == NO_GROUP {
            ActiveHooks::empty()
        } else {
            ActiveHooks::FILTER_CONTACT_PAIRS | ActiveHooks::FILTER_INTERSECTION_PAIR
        };

        let collider = self
            .kind
            .builder()?
            .density(0.0)
            .restitution(m.elasticity)
            .friction(m.friction)
            .sensor(m.sensor)
            .collision_groups(layer_groups(m.layers))
            .user_data(tag.to_user_data())
            .active_hooks(hooks)
            .build();
        Ok(collider)
    }
}

impl ShapeKind {
    fn builder(&self) -> PhysicsResult<ColliderBuilder> {
        match self {
            ShapeKind::Box {
                width,
                height,
                offset,
            } => {
                positive(*width, "box width")?;
                positive(*height, "box height")?;
                Ok(ColliderBuilder::cuboid(width * 0.5, height * 0.5).translation(vec2(*offset)))
            }
            ShapeKind::BoundingBox {
                left,
                bottom,
                right,
                top,
            } => {
                if !(right > left && top > bottom) {
                    return Err(invalid("bounding box must have right > left and top > bottom"));
                }
                let center = DVec2::new(left + right, bottom + top) * 0.5;
                Ok(ColliderBuilder::cuboid((right - left) * 0.5, (top - bottom) * 0.5)
                    .translation(vec2(center)))
            }
            ShapeKind::Circle { radius, offset } => {
                positive(*radius, "circle radius")?;
                Ok(ColliderBuilder::ball(*radius).translation(vec2(*offset)))
            }
            ShapeKind::Segment { start, end, radius } => {
                if !(start.is_finite() && end.is_finite()) || start == end {
                    return Err(invalid("segment needs two distinct finite endpoints"));
                }
                if *radius > 0.0 {
                    Ok(ColliderBuilder::capsule_from_endpoints(
                        point2(*start),
                        point2(*end),
                        *radius,
                    ))
                } else if *radius == 0.0 {
                    Ok(ColliderBuilder::segment(point2(*start), point2(*end)))
                } else {
                    Err(invalid("segment radius must be non-negative"))
                }
            }
            ShapeKind::Poly { verts, offset } => {
                if verts.len() < 3 {
                    return Err(invalid("polygon needs at least 3 vertices"));
                }
                let points: Vec<Point<Real>> = verts.iter().map(|v| point2(*v + *offset)).collect();
                ColliderBuilder::convex_hull(&points)
                    .ok_or_else(|| invalid("polygon vertices are degenerate"))
            }
        }
    }
}

fn invalid(reason: &str) -> PhysicsError {
    PhysicsError::InvalidShape(reason.to_string())
}

fn positive(value: f64, what: &str) -> PhysicsResult<()> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(PhysicsError::InvalidShape(format!("{what} must be positive, got {value}")))
    }
}

pub(crate) fn vec2(v: DVec2) -> Vector<Real> {
    vector![v.x, v.y]
}

pub(crate) fn point2(v: DVec2) -> Point<Real> {
    point![v.x, v.y]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn box_becomes_cuboid_with_offset() {
        let desc = ShapeDesc::new(ShapeKind::Box {
            width: 20.0,
            height: 10.0,
            offset: DVec2::new(3.0, 0.0),
        });
        let collider = desc.to_collider().unwrap();
        let cuboid = collider.shape().as_cuboid().expect("cuboid");
        assert!((cuboid.half_extents.x - 10.0).abs() < 1e-12);
        assert!((cuboid.half_extents.y - 5.0).abs() < 1e-12);
        assert!((collider.translation().x - 3.0).abs() < 1e-12);
        assert_eq!(collider.density(), 0.0);
    }

    #[test]
    fn bounding_box_is_recentered() {
        let desc = ShapeDesc::new(ShapeKind::BoundingBox {
            left: 0.0,
            bottom: 0.0,
            right: 4.0,
            top: 2.0,
        });
        let collider = desc.to_collider().unwrap();
        assert!((collider.translation().x - 2.0).abs() < 1e-12);
        assert!((collider.translation().y - 1.0).abs() < 1e-12);
    }

    #[test]
    fn invalid_shapes_are_rejected_up_front() {
        assert!(ShapeDesc::boxed(0.0, 5.0).to_collider().is_err());
        assert!(ShapeDesc::circle(-1.0).to_collider().is_err());
        assert!(ShapeDesc::segment(DVec2::ONE, DVec2::ONE, 0.0).to_collider().is_err());
        assert!(ShapeDesc::poly(vec![DVec2::ZERO, DVec2::X]).to_collider().is_err());
        let collinear = vec![DVec2::ZERO, DVec2::X, DVec2::new(2.0, 0.0)];
        assert!(ShapeDesc::poly(collinear).to_collider().is_err());
    }

    #[test]
    fn thick_segment_is_capsule() {
        let desc = ShapeDesc::segment(DVec2::ZERO, DVec2::new(10.0, 0.0), 2.0);
        let collider = desc.to_collider().unwrap();
        assert!(collider.shape().as_capsule().is_some());
        let thin = ShapeDesc::segment(DVec2::ZERO, DVec2::new(10.0, 0.0), 0.0);
        assert!(thin.to_collider().unwrap().shape().as_segment().is_some());
    }

    #[test]
    fn material_lands_on_collider() {
        let desc = ShapeDesc::circle(5.0).with_material(ShapeMaterial {
            elasticity: 0.5,
            friction: 0.8,
            group: 2,
            layers: 0b10,
            sensor: true,
            collision_type: 9,
        });
        let collider = desc.to_collider().unwrap();
        assert_eq!(collider.restitution(), 0.5);
        assert_eq!(collider.friction(), 0.8);
        assert!(collider.is_sensor());
        assert_eq!(ShapeTag::of(&collider).group, 2);
        assert_eq!(ShapeTag::of(&collider).collision_type, 9);
        assert!(collider.active_hooks().contains(ActiveHooks::FILTER_CONTACT_PAIRS));
    }
}
