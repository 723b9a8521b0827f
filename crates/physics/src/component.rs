//! Declarative physics for scene nodes.
//!
//! A [`ComponentConfig`] names a body kind and any number of shapes; every
//! dimension left out is taken from the body config, then from the node's
//! [`Bounds`]. Default mass is one thousandth of the bounds' area.

use crate::body::BodyDesc;
use crate::error::{PhysicsError, PhysicsResult};
use crate::moment::moment_for_circle;
use crate::reconcile::target_pose;
use crate::shape::{ShapeDesc, ShapeKind, ShapeMaterial};
use crate::space::Space;
use engine_core::{Bounds, Entity, TransformTree, World};
use glam::DVec2;
use rapier2d_f64::prelude::{ColliderHandle, RigidBodyHandle};
use serde::{Deserialize, Serialize};

/// Mass given to a body that doesn't name one.
pub fn default_mass(bounds: Bounds) -> f64 {
    bounds.area() / 1000.0
}

/// Body kind of a component. Omitted dimensions come from the node's bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BodyKindConfig {
    Box {
        #[serde(default)]
        width: Option<f64>,
        #[serde(default)]
        height: Option<f64>,
    },
    /// Radius defaults to half the bounds' height.
    Circle {
        #[serde(default)]
        radius: Option<f64>,
        #[serde(default)]
        inner_radius: f64,
        #[serde(default)]
        offset: DVec2,
    },
    /// Defaults to a horizontal line across the bounds.
    Segment {
        #[serde(default)]
        start: Option<DVec2>,
        #[serde(default)]
        end: Option<DVec2>,
    },
    /// Defaults to the bounds' rectangle, centered on the body.
    Poly {
        #[serde(default)]
        verts: Option<Vec<DVec2>>,
        #[serde(default)]
        offset: DVec2,
    },
    /// Shapes go on the space's static body, placed at the node's pose.
    Static,
    /// Plain body with the given moment; rotation is locked if omitted.
    Custom {
        #[serde(default)]
        moment: Option<f64>,
    },
}

impl Default for BodyKindConfig {
    fn default() -> Self {
        BodyKindConfig::Box {
            width: None,
            height: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BodyConfig {
    #[serde(default)]
    pub kind: BodyKindConfig,
    #[serde(default)]
    pub mass: Option<f64>,
    /// Body center relative to the node's origin. Defaults to the anchor.
    #[serde(default)]
    pub center: Option<DVec2>,
}

/// Shape geometry of a component. Omitted fields fall back to the body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum ShapeKindConfig {
    /// Same geometry as the body. Static and custom bodies get a box.
    #[default]
    Inherit,
    Box {
        #[serde(default)]
        width: Option<f64>,
        #[serde(default)]
        height: Option<f64>,
        #[serde(default)]
        offset: DVec2,
    },
    BoundingBox {
        left: f64,
        bottom: f64,
        right: f64,
        top: f64,
    },
    Circle {
        #[serde(default)]
        radius: Option<f64>,
        #[serde(default)]
        offset: Option<DVec2>,
    },
    /// Radius defaults to 1.
    Segment {
        #[serde(default)]
        start: Option<DVec2>,
        #[serde(default)]
        end: Option<DVec2>,
        #[serde(default)]
        radius: Option<f64>,
    },
    Poly {
        #[serde(default)]
        verts: Option<Vec<DVec2>>,
        #[serde(default)]
        offset: Option<DVec2>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShapeConfig {
    #[serde(default)]
    pub kind: ShapeKindConfig,
    #[serde(default)]
    pub material: ShapeMaterial,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentConfig {
    #[serde(default)]
    pub body: BodyConfig,
    /// `None` means one shape inheriting the body's geometry. `None`
    /// entries inside the list are skipped.
    #[serde(default)]
    pub shapes: Option<Vec<Option<ShapeConfig>>>,
    #[serde(default)]
    pub velocity: Option<DVec2>,
    #[serde(default)]
    pub angular_velocity: Option<f64>,
    #[serde(default)]
    pub max_velocity: Option<f64>,
    #[serde(default)]
    pub max_angular_velocity: Option<f64>,
}

/// Body dimensions with every gap filled from the bounds.
#[derive(Debug, Clone, PartialEq)]
struct Dims {
    width: f64,
    height: f64,
    radius: f64,
    inner_radius: f64,
    offset: DVec2,
    start: DVec2,
    end: DVec2,
    verts: Vec<DVec2>,
}

impl Dims {
    fn resolve(kind: &BodyKindConfig, bounds: Bounds) -> Self {
        let half = DVec2::new(bounds.width, bounds.height) * 0.5;
        let mut dims = Dims {
            width: bounds.width,
            height: bounds.height,
            radius: bounds.height * 0.5,
            inner_radius: 0.0,
            offset: DVec2::ZERO,
            start: DVec2::new(-half.x, 0.0),
            end: DVec2::new(half.x, 0.0),
            verts: vec![
                DVec2::new(-half.x, -half.y),
                DVec2::new(half.x, -half.y),
                DVec2::new(half.x, half.y),
                DVec2::new(-half.x, half.y),
            ],
        };
        match kind {
            BodyKindConfig::Box { width, height } => {
                dims.width = width.unwrap_or(dims.width);
                dims.height = height.unwrap_or(dims.height);
            }
            BodyKindConfig::Circle {
                radius,
                inner_radius,
                offset,
            } => {
                dims.radius = radius.unwrap_or(dims.radius);
                dims.inner_radius = *inner_radius;
                dims.offset = *offset;
            }
            BodyKindConfig::Segment { start, end } => {
                dims.start = start.unwrap_or(dims.start);
                dims.end = end.unwrap_or(dims.end);
            }
            BodyKindConfig::Poly { verts, offset } => {
                if let Some(verts) = verts {
                    dims.verts = verts.clone();
                }
                dims.offset = *offset;
            }
            BodyKindConfig::Static | BodyKindConfig::Custom { .. } => {}
        }
        dims
    }

    fn body_desc(&self, kind: &BodyKindConfig, mass: f64) -> Option<BodyDesc> {
        let desc = match kind {
            BodyKindConfig::Box { .. } => BodyDesc::box_body(mass, self.width, self.height),
            BodyKindConfig::Circle { .. } => BodyDesc::dynamic(
                mass,
                moment_for_circle(mass, self.inner_radius, self.radius, self.offset),
            ),
            BodyKindConfig::Segment { .. } => BodyDesc::segment_body(mass, self.start, self.end),
            BodyKindConfig::Poly { .. } => BodyDesc::poly_body(mass, &self.verts, self.offset),
            BodyKindConfig::Custom { moment } => {
                BodyDesc::dynamic(mass, moment.unwrap_or(f64::INFINITY))
            }
            BodyKindConfig::Static => return None,
        };
        Some(desc)
    }

    fn shape_kind(&self, body: &BodyKindConfig, shape: &ShapeKindConfig) -> ShapeKind {
        match shape {
            ShapeKindConfig::Box {
                width,
                height,
                offset,
            } => ShapeKind::Box {
                width: width.unwrap_or(self.width),
                height: height.unwrap_or(self.height),
                offset: *offset,
            },
            ShapeKindConfig::BoundingBox {
                left,
                bottom,
                right,
                top,
            } => ShapeKind::BoundingBox {
                left: *left,
                bottom: *bottom,
                right: *right,
                top: *top,
            },
            ShapeKindConfig::Circle { radius, offset } => ShapeKind::Circle {
                radius: radius.unwrap_or(self.radius),
                offset: offset.unwrap_or(self.offset),
            },
            ShapeKindConfig::Segment { start, end, radius } => ShapeKind::Segment {
                start: start.unwrap_or(self.start),
                end: end.unwrap_or(self.end),
                radius: radius.unwrap_or(1.0),
            },
            ShapeKindConfig::Poly { verts, offset } => ShapeKind::Poly {
                verts: verts.clone().unwrap_or_else(|| self.verts.clone()),
                offset: offset.unwrap_or(self.offset),
            },
            ShapeKindConfig::Inherit => self.shape_kind(body, &inherited(body)),
        }
    }
}

/// Shape config a body kind implies when a shape inherits from it.
fn inherited(body: &BodyKindConfig) -> ShapeKindConfig {
    match body {
        BodyKindConfig::Circle { .. } => ShapeKindConfig::Circle {
            radius: None,
            offset: None,
        },
        BodyKindConfig::Segment { .. } => ShapeKindConfig::Segment {
            start: None,
            end: None,
            radius: None,
        },
        BodyKindConfig::Poly { .. } => ShapeKindConfig::Poly {
            verts: None,
            offset: None,
        },
        BodyKindConfig::Box { .. } | BodyKindConfig::Static | BodyKindConfig::Custom { .. } => {
            ShapeKindConfig::Box {
                width: None,
                height: None,
                offset: DVec2::ZERO,
            }
        }
    }
}

/// Handles of the body and shapes a config produced for one node.
#[derive(Debug, Clone, PartialEq)]
pub struct PhysicsComponent {
    pub node: Entity,
    pub body: RigidBodyHandle,
    pub shapes: Vec<ColliderHandle>,
    /// False when the body is the space's shared static body.
    owns_body: bool,
}

impl PhysicsComponent {
    /// Create the body and shapes described by `config` for `node`.
    pub fn build<T: TransformTree + ?Sized>(
        space: &mut Space,
        tree: &T,
        node: Entity,
        bounds: Bounds,
        config: &ComponentConfig,
    ) -> PhysicsResult<Self> {
        let kind = &config.body.kind;
        let dims = Dims::resolve(kind, bounds);
        let local = tree.local(node).ok_or(PhysicsError::MissingNode(node))?;
        let center = config.body.center.unwrap_or_else(|| local.anchor());

        let mass = config.body.mass.unwrap_or_else(|| default_mass(bounds));
        let (body, owns_body) = match dims.body_desc(kind, mass) {
            Some(desc) => (space.add_body(tree, node, &desc.with_center(center))?, true),
            None => (space.static_body(), false),
        };

        let mut component = Self {
            node,
            body,
            shapes: Vec::new(),
            owns_body,
        };

        let shape_configs = match &config.shapes {
            Some(list) => list.clone(),
            None => vec![Some(ShapeConfig::default())],
        };
        for shape in shape_configs.iter().flatten() {
            let desc =
                ShapeDesc::new(dims.shape_kind(kind, &shape.kind)).with_material(shape.material);
            let added = if owns_body {
                space.add_shape(body, &desc)
            } else {
                let pose = target_pose(tree, node, center).ok_or(PhysicsError::MissingNode(node))?;
                space.add_shape_at(body, &desc, pose.position, pose.angle)
            };
            match added {
                Ok(handle) => component.shapes.push(handle),
                Err(err) => {
                    // Leave nothing half-built behind.
                    component.remove(space)?;
                    return Err(err);
                }
            }
        }

        if owns_body {
            if let Err(err) = component.apply_velocity_defaults(space, config) {
                component.remove(space)?;
                return Err(err);
            }
        }
        log::debug!(
            "built physics for node {node:?}: body {body:?}, {} shape(s)",
            component.shapes.len()
        );
        Ok(component)
    }

    /// Build from the node's own [`Bounds`] and store the component on it.
    pub fn attach(
        world: &mut World,
        space: &mut Space,
        node: Entity,
        config: &ComponentConfig,
    ) -> PhysicsResult<Self> {
        let bounds = world
            .get::<&Bounds>(node)
            .map(|b| *b)
            .unwrap_or_default();
        let component = Self::build(space, &*world, node, bounds, config)?;
        world
            .insert_one(node, component.clone())
            .map_err(|_| PhysicsError::MissingNode(node))?;
        Ok(component)
    }

    fn apply_velocity_defaults(&self, space: &mut Space, config: &ComponentConfig) -> PhysicsResult<()> {
        if let Some(v) = config.velocity {
            space.set_velocity(self.body, v)?;
        }
        if let Some(w) = config.angular_velocity {
            space.set_angular_velocity(self.body, w)?;
        }
        if let Some(max) = config.max_velocity {
            space.set_max_velocity(self.body, max)?;
        }
        if let Some(max) = config.max_angular_velocity {
            space.set_max_angular_velocity(self.body, max)?;
        }
        Ok(())
    }

    pub fn owns_body(&self) -> bool {
        self.owns_body
    }

    pub fn mass(&self, space: &Space) -> PhysicsResult<f64> {
        space.mass(self.body)
    }

    pub fn set_mass(&self, space: &mut Space, mass: f64) -> PhysicsResult<()> {
        space.set_mass(self.body, mass)
    }

    pub fn velocity_x(&self, space: &Space) -> PhysicsResult<f64> {
        Ok(space.velocity(self.body)?.x)
    }

    pub fn set_velocity_x(&self, space: &mut Space, vx: f64) -> PhysicsResult<()> {
        space.set_velocity_x(self.body, vx)
    }

    pub fn velocity_y(&self, space: &Space) -> PhysicsResult<f64> {
        Ok(space.velocity(self.body)?.y)
    }

    pub fn set_velocity_y(&self, space: &mut Space, vy: f64) -> PhysicsResult<()> {
        space.set_velocity_y(self.body, vy)
    }

    pub fn angular_velocity(&self, space: &Space) -> PhysicsResult<f64> {
        space.angular_velocity(self.body)
    }

    pub fn set_angular_velocity(&self, space: &mut Space, w: f64) -> PhysicsResult<()> {
        space.set_angular_velocity(self.body, w)
    }

    pub fn max_velocity(&self, space: &Space) -> PhysicsResult<f64> {
        Ok(space.velocity_limits(self.body)?.max_velocity)
    }

    pub fn set_max_velocity(&self, space: &mut Space, max: f64) -> PhysicsResult<()> {
        space.set_max_velocity(self.body, max)
    }

    pub fn max_angular_velocity(&self, space: &Space) -> PhysicsResult<f64> {
        Ok(space.velocity_limits(self.body)?.max_angular_velocity)
    }

    pub fn set_max_angular_velocity(&self, space: &mut Space, max: f64) -> PhysicsResult<()> {
        space.set_max_angular_velocity(self.body, max)
    }

    /// Take the body (or, for static components, just the shapes) out of
    /// the space.
    pub fn remove(&self, space: &mut Space) -> PhysicsResult<()> {
        if self.owns_body {
            return space.remove_body(self.body);
        }
        for shape in &self.shapes {
            if space.contains_shape(*shape) {
                space.remove_shape(*shape)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine_core::{spawn_node, Transform2d};
    use rapier2d_f64::prelude::LockedAxes;

    fn setup() -> (World, Space, Entity) {
        let mut world = World::new();
        let node = spawn_node(
            &mut world,
            Transform2d::from_position(100.0, 50.0).with_anchor(20.0, 10.0),
        );
        (world, Space::default(), node)
    }

    #[test]
    fn default_config_is_box_from_bounds() {
        let (mut world, mut space, node) = setup();
        world.insert_one(node, Bounds::new(40.0, 20.0)).unwrap();
        let component = PhysicsComponent::attach(&mut world, &mut space, node, &ComponentConfig::default()).unwrap();

        assert!((component.mass(&space).unwrap() - 0.8).abs() < 1e-12);
        assert_eq!(component.shapes.len(), 1);
        let cuboid = space.shape(component.shapes[0]).unwrap().shape().as_cuboid().unwrap();
        assert!((cuboid.half_extents.x - 20.0).abs() < 1e-12);
        assert!((cuboid.half_extents.y - 10.0).abs() < 1e-12);

        // Center defaults to the anchor, so the body sits on the pivot.
        assert!((space.position(component.body).unwrap() - DVec2::new(120.0, 60.0)).length() < 1e-9);
        assert!(world.get::<&PhysicsComponent>(node).is_ok());
    }

    #[test]
    fn missing_bounds_fall_back_to_hundred_square() {
        let (world, mut space, node) = setup();
        let config = ComponentConfig {
            body: BodyConfig {
                kind: BodyKindConfig::Circle {
                    radius: None,
                    inner_radius: 0.0,
                    offset: DVec2::ZERO,
                },
                ..Default::default()
            },
            ..Default::default()
        };
        let component = PhysicsComponent::build(&mut space, &world, node, Bounds::default(), &config).unwrap();
        assert!((component.mass(&space).unwrap() - 10.0).abs() < 1e-12);
        let ball = space.shape(component.shapes[0]).unwrap().shape().as_ball().unwrap();
        assert!((ball.radius - 50.0).abs() < 1e-12);
    }

    #[test]
    fn static_reuses_the_static_body() {
        let (world, mut space, node) = setup();
        let config = ComponentConfig {
            body: BodyConfig {
                kind: BodyKindConfig::Static,
                ..Default::default()
            },
            ..Default::default()
        };
        let component = PhysicsComponent::build(&mut space, &world, node, Bounds::new(40.0, 20.0), &config).unwrap();
        assert_eq!(component.body, space.static_body());
        assert!(!component.owns_body());
        assert_eq!(space.bodies().count(), 0);

        // The shape sits where the node is.
        let collider = space.shape(component.shapes[0]).unwrap();
        assert!((collider.position().translation.x - 120.0).abs() < 1e-9);

        component.remove(&mut space).unwrap();
        assert_eq!(space.shapes().count(), 0);
        assert!(space.contains_body(space.static_body()));
    }

    #[test]
    fn none_shapes_are_skipped_and_fields_inherit() {
        let (world, mut space, node) = setup();
        let config = ComponentConfig {
            body: BodyConfig {
                kind: BodyKindConfig::Box {
                    width: Some(10.0),
                    height: Some(6.0),
                },
                mass: Some(2.0),
                center: None,
            },
            shapes: Some(vec![
                None,
                Some(ShapeConfig {
                    kind: ShapeKindConfig::Box {
                        width: None,
                        height: Some(2.0),
                        offset: DVec2::ZERO,
                    },
                    material: ShapeMaterial::default(),
                }),
                Some(ShapeConfig {
                    kind: ShapeKindConfig::Segment {
                        start: None,
                        end: None,
                        radius: None,
                    },
                    material: ShapeMaterial::default(),
                }),
            ]),
            ..Default::default()
        };
        let component = PhysicsComponent::build(&mut space, &world, node, Bounds::default(), &config).unwrap();
        assert_eq!(component.shapes.len(), 2);

        let boxed = space.shape(component.shapes[0]).unwrap().shape().as_cuboid().unwrap();
        assert!((boxed.half_extents.x - 5.0).abs() < 1e-12);
        assert!((boxed.half_extents.y - 1.0).abs() < 1e-12);
        let capsule = space.shape(component.shapes[1]).unwrap();
        assert!(capsule.shape().as_capsule().is_some());
    }

    #[test]
    fn custom_without_moment_locks_rotation() {
        let (world, mut space, node) = setup();
        let config = ComponentConfig {
            body: BodyConfig {
                kind: BodyKindConfig::Custom { moment: None },
                mass: Some(1.0),
                center: None,
            },
            ..Default::default()
        };
        let component = PhysicsComponent::build(&mut space, &world, node, Bounds::default(), &config).unwrap();
        assert!(space.moment(component.body).unwrap().is_infinite());
        let locked = space.body(component.body).unwrap().locked_axes();
        assert!(locked.contains(LockedAxes::ROTATION_LOCKED));
    }

    #[test]
    fn velocity_defaults_are_applied() {
        let (world, mut space, node) = setup();
        let config: ComponentConfig = ron::from_str(
            "(velocity: Some((3.0, -4.0)), angular_velocity: Some(1.5), max_velocity: Some(10.0))",
        )
        .unwrap();
        let component = PhysicsComponent::build(&mut space, &world, node, Bounds::default(), &config).unwrap();
        assert_eq!(component.velocity_x(&space).unwrap(), 3.0);
        assert_eq!(component.velocity_y(&space).unwrap(), -4.0);
        assert_eq!(component.angular_velocity(&space).unwrap(), 1.5);
        assert_eq!(component.max_velocity(&space).unwrap(), 10.0);
        assert!(component.max_angular_velocity(&space).unwrap().is_infinite());
    }

    #[test]
    fn negative_speed_cap_is_rejected_and_cleaned_up() {
        let (world, mut space, node) = setup();
        let config = ComponentConfig {
            velocity: Some(DVec2::new(10.0, 0.0)),
            max_velocity: Some(-5.0),
            ..Default::default()
        };
        let result = PhysicsComponent::build(&mut space, &world, node, Bounds::default(), &config);
        assert!(matches!(result, Err(PhysicsError::InvalidBody(_))));
        assert_eq!(space.bodies().count(), 0);
        assert_eq!(space.shapes().count(), 0);
    }

    #[test]
    fn bad_shape_leaves_nothing_behind() {
        let (world, mut space, node) = setup();
        let config = ComponentConfig {
            shapes: Some(vec![
                Some(ShapeConfig::default()),
                Some(ShapeConfig {
                    kind: ShapeKindConfig::Circle {
                        radius: Some(-1.0),
                        offset: None,
                    },
                    material: ShapeMaterial::default(),
                }),
            ]),
            ..Default::default()
        };
        let result = PhysicsComponent::build(&mut space, &world, node, Bounds::default(), &config);
        assert!(matches!(result, Err(PhysicsError::InvalidShape(_))));
        assert_eq!(space.bodies().count(), 0);
        assert_eq!(space.shapes().count(), 0);
    }
}
