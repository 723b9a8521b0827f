//! Collect overlay primitives from a space.

use crate::vertex::*;
use engine_core::{world_matrix, DAffine2, DVec2, Entity, TransformTree};
use physics::rapier2d_f64::prelude::*;
use physics::Space;

/// Segments used to tessellate a full circle.
pub const CIRCLE_SEGMENTS: usize = 24;

/// Arrowhead size: length along the arrow and half width.
const ARROW_HEAD_LENGTH: f64 = 5.0;
const ARROW_HEAD_HALF_WIDTH: f64 = 2.0;

/// Radius of the dots marking joint anchors.
const ANCHOR_DOT_RADIUS: f64 = 2.0;

/// A single overlay element. Coordinates are already in camera space.
#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    Line {
        a: DVec2,
        b: DVec2,
        color: [f32; 4],
    },
    /// Closed outline.
    Polygon {
        points: Vec<DVec2>,
        color: [f32; 4],
    },
    Circle {
        center: DVec2,
        radius: f64,
        color: [f32; 4],
    },
    /// Line from `from` to `to` with a head at `to`.
    Arrow {
        from: DVec2,
        to: DVec2,
        color: [f32; 4],
    },
}

/// Everything drawn for one frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DebugFrame {
    pub primitives: Vec<Primitive>,
}

impl DebugFrame {
    pub fn len(&self) -> usize {
        self.primitives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.primitives.is_empty()
    }

    fn push(&mut self, primitive: Primitive) {
        self.primitives.push(primitive);
    }

    /// Flatten the frame into a line list: every pair of vertices is one line.
    pub fn line_vertices(&self) -> Vec<LineVertex> {
        let mut out = Vec::new();
        for primitive in &self.primitives {
            match primitive {
                Primitive::Line { a, b, color } => push_line(&mut out, *a, *b, *color),
                Primitive::Polygon { points, color } => push_loop(&mut out, points, *color),
                Primitive::Circle {
                    center,
                    radius,
                    color,
                } => {
                    let points: Vec<DVec2> = (0..CIRCLE_SEGMENTS)
                        .map(|i| {
                            let angle = i as f64 / CIRCLE_SEGMENTS as f64 * std::f64::consts::TAU;
                            *center + DVec2::from_angle(angle) * *radius
                        })
                        .collect();
                    push_loop(&mut out, &points, *color);
                }
                Primitive::Arrow { from, to, color } => {
                    push_line(&mut out, *from, *to, *color);
                    push_loop(&mut out, &arrow_head(*from, *to), *color);
                }
            }
        }
        out
    }
}

fn push_line(out: &mut Vec<LineVertex>, a: DVec2, b: DVec2, color: [f32; 4]) {
    out.push(LineVertex::new(a, color));
    out.push(LineVertex::new(b, color));
}

fn push_loop(out: &mut Vec<LineVertex>, points: &[DVec2], color: [f32; 4]) {
    if points.len() < 2 {
        return;
    }
    for (i, a) in points.iter().enumerate() {
        let b = points[(i + 1) % points.len()];
        push_line(out, *a, b, color);
    }
}

/// Triangle at the tip of an arrow, pointing from `from` to `to`.
fn arrow_head(from: DVec2, to: DVec2) -> [DVec2; 3] {
    let dir = (to - from).normalize_or_zero();
    let side = dir.perp();
    let base = to - dir * ARROW_HEAD_LENGTH;
    [
        to,
        base + side * ARROW_HEAD_HALF_WIDTH,
        base - side * ARROW_HEAD_HALF_WIDTH,
    ]
}

/// Draws shapes, joints and body velocities of a space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebugDrawer {
    /// Off until started.
    pub active: bool,
    pub render_shapes: bool,
    pub render_constraints: bool,
    pub render_bodies: bool,
}

impl Default for DebugDrawer {
    fn default() -> Self {
        Self {
            active: false,
            render_shapes: true,
            render_constraints: true,
            render_bodies: true,
        }
    }
}

impl DebugDrawer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self) {
        self.active = true;
    }

    pub fn stop(&mut self) {
        self.active = false;
    }

    /// View matrix for a camera node: its world matrix, shifted back by its
    /// anchor.
    pub fn camera_view<T: TransformTree + ?Sized>(tree: &T, camera: Entity) -> DAffine2 {
        let anchor = tree.local(camera).map(|t| t.anchor()).unwrap_or_default();
        world_matrix(tree, camera) * DAffine2::from_translation(-anchor)
    }

    /// Collect the overlay for `space`, transformed by `camera`.
    pub fn draw(&self, space: &Space, camera: DAffine2) -> DebugFrame {
        let mut frame = DebugFrame::default();
        if !self.active {
            return frame;
        }
        if self.render_shapes {
            draw_shapes(&mut frame, space, camera);
        }
        if self.render_constraints {
            draw_joints(&mut frame, space, camera);
        }
        if self.render_bodies {
            draw_velocities(&mut frame, space, camera);
        }
        log::trace!("debug frame with {} primitives", frame.len());
        frame
    }
}

fn to_dvec(p: &Point<Real>) -> DVec2 {
    DVec2::new(p.x, p.y)
}

/// Uniform scale of a camera matrix, used for radii.
fn camera_scale(camera: DAffine2) -> f64 {
    camera.matrix2.determinant().abs().sqrt()
}

fn shape_color(space: &Space, collider: &Collider) -> [f32; 4] {
    if collider.is_sensor() {
        return SENSOR_COLOR;
    }
    match collider.parent().and_then(|h| space.rigid_body_set.get(h)) {
        Some(body) if body.is_fixed() => STATIC_COLOR,
        Some(body) if body.is_sleeping() => SLEEPING_COLOR,
        _ => SHAPE_COLOR,
    }
}

fn draw_shapes(frame: &mut DebugFrame, space: &Space, camera: DAffine2) {
    let scale = camera_scale(camera);
    for (_, collider) in space.shapes() {
        let color = shape_color(space, collider);
        let pose = collider.position();
        let world = |p: Point<Real>| camera.transform_point2(to_dvec(&(pose * p)));
        let shape = collider.shape();

        if let Some(ball) = shape.as_ball() {
            let center = world(Point::<Real>::origin());
            frame.push(Primitive::Circle {
                center,
                radius: ball.radius * scale,
                color,
            });
            // Radius line shows the rotation.
            frame.push(Primitive::Line {
                a: center,
                b: world(point![ball.radius, 0.0]),
                color,
            });
        } else if let Some(cuboid) = shape.as_cuboid() {
            let h = cuboid.half_extents;
            let points = [
                point![-h.x, -h.y],
                point![h.x, -h.y],
                point![h.x, h.y],
                point![-h.x, h.y],
            ];
            frame.push(Primitive::Polygon {
                points: points.into_iter().map(world).collect(),
                color,
            });
        } else if let Some(poly) = shape.as_convex_polygon() {
            frame.push(Primitive::Polygon {
                points: poly.points().iter().copied().map(world).collect(),
                color,
            });
        } else if let Some(capsule) = shape.as_capsule() {
            frame.push(Primitive::Polygon {
                points: capsule_outline(capsule.segment.a, capsule.segment.b, capsule.radius)
                    .into_iter()
                    .map(world)
                    .collect(),
                color,
            });
        } else if let Some(segment) = shape.as_segment() {
            frame.push(Primitive::Line {
                a: world(segment.a),
                b: world(segment.b),
                color,
            });
        } else {
            log::trace!("no debug outline for shape {:?}", shape.shape_type());
        }
    }
}

/// Outline of a rounded segment: a half circle around each end.
fn capsule_outline(a: Point<Real>, b: Point<Real>, radius: Real) -> Vec<Point<Real>> {
    let (a, b) = (to_dvec(&a), to_dvec(&b));
    let dir = (b - a).normalize_or(DVec2::X);
    let base = dir.y.atan2(dir.x);
    let half = CIRCLE_SEGMENTS / 2;
    let arc = |center: DVec2, start: f64| {
        (0..=half).map(move |i| {
            let angle = start + i as f64 / half as f64 * std::f64::consts::PI;
            center + DVec2::from_angle(angle) * radius
        })
    };
    let quarter = std::f64::consts::FRAC_PI_2;
    arc(b, base - quarter)
        .chain(arc(a, base + quarter))
        .map(|p| point![p.x, p.y])
        .collect()
}

fn draw_joints(frame: &mut DebugFrame, space: &Space, camera: DAffine2) {
    let dot = ANCHOR_DOT_RADIUS * camera_scale(camera);
    for (_, joint) in space.joints() {
        let (Some(b1), Some(b2)) = (
            space.rigid_body_set.get(joint.body1),
            space.rigid_body_set.get(joint.body2),
        ) else {
            continue;
        };
        let a = camera.transform_point2(to_dvec(&(b1.position() * joint.data.local_anchor1())));
        let b = camera.transform_point2(to_dvec(&(b2.position() * joint.data.local_anchor2())));
        frame.push(Primitive::Line {
            a,
            b,
            color: CONSTRAINT_COLOR,
        });
        for center in [a, b] {
            frame.push(Primitive::Circle {
                center,
                radius: dot,
                color: CONSTRAINT_COLOR,
            });
        }
    }
}

fn draw_velocities(frame: &mut DebugFrame, space: &Space, camera: DAffine2) {
    for (_, body) in space.bodies() {
        let v = DVec2::new(body.linvel().x, body.linvel().y);
        // Nothing visible under half a unit per second.
        if v.x.round() == 0.0 && v.y.round() == 0.0 {
            continue;
        }
        let p = DVec2::new(body.translation().x, body.translation().y);
        frame.push(Primitive::Arrow {
            from: camera.transform_point2(p),
            to: camera.transform_point2(p + v),
            color: VELOCITY_COLOR,
        });
    }
}
