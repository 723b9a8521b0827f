//! Constraints between two bodies.
//!
//! Anchors are in each body's local frame, measured from its center. Most
//! kinds map onto a rapier generic joint. `SimpleMotor`, `Gear` and
//! `Ratchet` are solved by the space as velocity constraints before every
//! step; their rapier joint is a free placeholder that only carries the
//! handle and the body pair.

use crate::error::{PhysicsError, PhysicsResult};
use crate::shape::{point2, vec2};
use glam::DVec2;
use rapier2d_f64::prelude::*;
use serde::{Deserialize, Serialize};

pub const DEFAULT_REST_LENGTH: f64 = 100.0;
pub const DEFAULT_STIFFNESS: f64 = 50.0;
pub const DEFAULT_DAMPING: f64 = 1.0;
pub const DEFAULT_SLIDE_MIN: f64 = 1.0;
pub const DEFAULT_SLIDE_MAX: f64 = 100.0;

fn default_rest_length() -> f64 {
    DEFAULT_REST_LENGTH
}
fn default_stiffness() -> f64 {
    DEFAULT_STIFFNESS
}
fn default_damping() -> f64 {
    DEFAULT_DAMPING
}
fn default_slide_min() -> f64 {
    DEFAULT_SLIDE_MIN
}
fn default_slide_max() -> f64 {
    DEFAULT_SLIDE_MAX
}
fn one() -> f64 {
    1.0
}
fn unbounded() -> f64 {
    f64::INFINITY
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum JointKind {
    /// Anchors are pinned together; the bodies rotate freely about them.
    Pivot {
        #[serde(default)]
        anchor_a: DVec2,
        #[serde(default)]
        anchor_b: DVec2,
    },
    /// Pivot given as a single world-space point.
    PivotAt { pivot: DVec2 },
    /// Anchors kept at the distance they have when the joint is created.
    Pin {
        #[serde(default)]
        anchor_a: DVec2,
        #[serde(default)]
        anchor_b: DVec2,
    },
    /// Anchor distance kept within `[min, max]`.
    Slide {
        #[serde(default)]
        anchor_a: DVec2,
        #[serde(default)]
        anchor_b: DVec2,
        #[serde(default = "default_slide_min")]
        min: f64,
        #[serde(default = "default_slide_max")]
        max: f64,
    },
    /// `anchor_b` slides along the segment `groove_a`..`groove_b` on body A.
    Groove {
        groove_a: DVec2,
        groove_b: DVec2,
        #[serde(default)]
        anchor_b: DVec2,
    },
    DampedSpring {
        #[serde(default)]
        anchor_a: DVec2,
        #[serde(default)]
        anchor_b: DVec2,
        #[serde(default = "default_rest_length")]
        rest_length: f64,
        #[serde(default = "default_stiffness")]
        stiffness: f64,
        #[serde(default = "default_damping")]
        damping: f64,
    },
    DampedRotarySpring {
        #[serde(default)]
        rest_angle: f64,
        #[serde(default = "default_stiffness")]
        stiffness: f64,
        #[serde(default = "default_damping")]
        damping: f64,
    },
    /// Relative angle kept within `[min, max]`.
    RotaryLimit { min: f64, max: f64 },
    /// Holds the relative angular velocity `w_b - w_a` at `rate`, limited
    /// only by `max_force`.
    SimpleMotor { rate: f64 },
    /// Keeps `ratio * w_b == w_a`.
    Gear {
        #[serde(default = "one")]
        ratio: f64,
    },
    /// Clicks every `ratchet` radians of relative angle. Body B turns freely
    /// relative to A in the direction of `ratchet`'s sign, and may only turn
    /// back as far as the last click.
    Ratchet {
        #[serde(default = "one")]
        ratchet: f64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JointParams {
    /// Cap on the force motors, gears and ratchets may apply.
    #[serde(default = "unbounded")]
    pub max_force: f64,
    /// Whether the two bodies still collide with each other.
    #[serde(default = "yes")]
    pub collide_bodies: bool,
}

fn yes() -> bool {
    true
}

impl Default for JointParams {
    fn default() -> Self {
        Self {
            max_force: f64::INFINITY,
            collide_bodies: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointDesc {
    pub kind: JointKind,
    #[serde(default)]
    pub params: JointParams,
}

impl JointDesc {
    pub fn new(kind: JointKind) -> Self {
        Self {
            kind,
            params: JointParams::default(),
        }
    }

    pub fn with_params(mut self, params: JointParams) -> Self {
        self.params = params;
        self
    }

    pub fn pivot(anchor_a: DVec2, anchor_b: DVec2) -> Self {
        Self::new(JointKind::Pivot { anchor_a, anchor_b })
    }

    pub fn pivot_at(pivot: DVec2) -> Self {
        Self::new(JointKind::PivotAt { pivot })
    }

    pub fn pin(anchor_a: DVec2, anchor_b: DVec2) -> Self {
        Self::new(JointKind::Pin { anchor_a, anchor_b })
    }

    pub fn damped_spring(anchor_a: DVec2, anchor_b: DVec2) -> Self {
        Self::new(JointKind::DampedSpring {
            anchor_a,
            anchor_b,
            rest_length: DEFAULT_REST_LENGTH,
            stiffness: DEFAULT_STIFFNESS,
            damping: DEFAULT_DAMPING,
        })
    }

    pub fn gear(ratio: f64) -> Self {
        Self::new(JointKind::Gear { ratio })
    }

    /// Build the rapier joint for a body pair, plus the velocity constraint
    /// the space must solve itself, if any.
    pub(crate) fn build(
        &self,
        a: &RigidBody,
        b: &RigidBody,
    ) -> PhysicsResult<(GenericJoint, Option<VelocityJoint>)> {
        let max_force = self.params.max_force;
        if !(max_force >= 0.0) {
            return Err(invalid(format!("max_force must be non-negative, got {max_force}")));
        }

        let mut velocity = None;
        let mut joint: GenericJoint = match &self.kind {
            JointKind::Pivot { anchor_a, anchor_b } => RevoluteJointBuilder::new()
                .local_anchor1(point2(*anchor_a))
                .local_anchor2(point2(*anchor_b))
                .into(),
            JointKind::PivotAt { pivot } => {
                let p = point2(*pivot);
                RevoluteJointBuilder::new()
                    .local_anchor1(a.position().inverse_transform_point(&p))
                    .local_anchor2(b.position().inverse_transform_point(&p))
                    .into()
            }
            JointKind::Pin { anchor_a, anchor_b } => {
                let world_a = a.position() * point2(*anchor_a);
                let world_b = b.position() * point2(*anchor_b);
                let distance = (world_b - world_a).norm();
                distance_joint(*anchor_a, *anchor_b, distance, distance)
            }
            JointKind::Slide {
                anchor_a,
                anchor_b,
                min,
                max,
            } => {
                if !(*min >= 0.0 && min <= max) {
                    return Err(invalid(format!("slide needs 0 <= min <= max, got [{min}, {max}]")));
                }
                distance_joint(*anchor_a, *anchor_b, *min, *max)
            }
            JointKind::Groove {
                groove_a,
                groove_b,
                anchor_b,
            } => {
                let axis = *groove_b - *groove_a;
                let length = axis.length();
                if !(length > 0.0) {
                    return Err(invalid("groove endpoints must differ".to_string()));
                }
                GenericJointBuilder::new(JointAxesMask::LIN_Y)
                    .local_frame1(Isometry::new(vec2(*groove_a), axis.to_angle()))
                    .local_anchor2(point2(*anchor_b))
                    .limits(JointAxis::LinX, [0.0, length])
                    .build()
            }
            JointKind::DampedSpring {
                anchor_a,
                anchor_b,
                rest_length,
                stiffness,
                damping,
            } => {
                spring_params(*stiffness, *damping)?;
                SpringJointBuilder::new(*rest_length, *stiffness, *damping)
                    .local_anchor1(point2(*anchor_a))
                    .local_anchor2(point2(*anchor_b))
                    .into()
            }
            JointKind::DampedRotarySpring {
                rest_angle,
                stiffness,
                damping,
            } => {
                spring_params(*stiffness, *damping)?;
                GenericJointBuilder::new(JointAxesMask::empty())
                    .motor_position(JointAxis::AngX, *rest_angle, *stiffness, *damping)
                    .motor_model(JointAxis::AngX, MotorModel::ForceBased)
                    .build()
            }
            JointKind::RotaryLimit { min, max } => {
                if !(min <= max) {
                    return Err(invalid(format!("rotary limit needs min <= max, got [{min}, {max}]")));
                }
                GenericJointBuilder::new(JointAxesMask::empty())
                    .limits(JointAxis::AngX, [*min, *max])
                    .build()
            }
            JointKind::SimpleMotor { rate } => {
                if !rate.is_finite() {
                    return Err(invalid(format!("motor rate must be finite, got {rate}")));
                }
                velocity = Some(VelocityJoint::Motor {
                    rate: *rate,
                    max_force,
                });
                GenericJointBuilder::new(JointAxesMask::empty()).build()
            }
            JointKind::Gear { ratio } => {
                if !(ratio.is_finite() && *ratio != 0.0) {
                    return Err(invalid(format!("gear ratio must be finite and non-zero, got {ratio}")));
                }
                velocity = Some(VelocityJoint::Gear {
                    ratio: *ratio,
                    max_force,
                });
                GenericJointBuilder::new(JointAxesMask::empty()).build()
            }
            JointKind::Ratchet { ratchet } => {
                if !(ratchet.is_finite() && *ratchet != 0.0) {
                    return Err(invalid(format!("ratchet must be finite and non-zero, got {ratchet}")));
                }
                let relative = b.rotation().angle() - a.rotation().angle();
                velocity = Some(VelocityJoint::Ratchet {
                    spacing: *ratchet,
                    max_force,
                    relative,
                    last_raw: relative,
                    click: relative,
                });
                GenericJointBuilder::new(JointAxesMask::empty()).build()
            }
        };

        joint.set_contacts_enabled(self.params.collide_bodies);
        Ok((joint, velocity))
    }
}

fn distance_joint(anchor_a: DVec2, anchor_b: DVec2, min: f64, max: f64) -> GenericJoint {
    GenericJointBuilder::new(JointAxesMask::empty())
        .coupled_axes(JointAxesMask::LIN_AXES)
        .local_anchor1(point2(anchor_a))
        .local_anchor2(point2(anchor_b))
        .limits(JointAxis::LinX, [min, max])
        .build()
}

fn spring_params(stiffness: f64, damping: f64) -> PhysicsResult<()> {
    if stiffness >= 0.0 && damping >= 0.0 {
        Ok(())
    } else {
        Err(invalid(format!(
            "spring stiffness and damping must be non-negative, got {stiffness} and {damping}"
        )))
    }
}

fn invalid(reason: String) -> PhysicsError {
    PhysicsError::InvalidJoint(reason)
}

/// Angular state of one body as seen by a velocity constraint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct AngularState {
    pub angle: f64,
    pub w: f64,
    pub inv_moment: f64,
}

/// Angular velocity constraints the space solves before each step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum VelocityJoint {
    Motor {
        rate: f64,
        max_force: f64,
    },
    Gear {
        ratio: f64,
        max_force: f64,
    },
    Ratchet {
        spacing: f64,
        max_force: f64,
        /// Unwrapped relative angle `angle_b - angle_a`.
        relative: f64,
        /// Wrapped relative angle seen on the previous solve.
        last_raw: f64,
        /// Relative angle of the last click passed.
        click: f64,
    },
}

impl VelocityJoint {
    /// New angular velocities for bodies A and B.
    pub fn solve(&mut self, a: AngularState, b: AngularState, dt: f64) -> (f64, f64) {
        let (wa, wb) = (a.w, b.w);
        match self {
            VelocityJoint::Motor { rate, max_force } => {
                let k = a.inv_moment + b.inv_moment;
                if k == 0.0 {
                    return (wa, wb);
                }
                let j = clamp_impulse(-(wb - wa - *rate) / k, *max_force * dt);
                (wa - j * a.inv_moment, wb + j * b.inv_moment)
            }
            VelocityJoint::Gear { ratio, max_force } => {
                let ratio = *ratio;
                let k = a.inv_moment + ratio * ratio * b.inv_moment;
                if k == 0.0 {
                    return (wa, wb);
                }
                let j = clamp_impulse(-(ratio * wb - wa) / k, *max_force * dt);
                (wa - j * a.inv_moment, wb + j * ratio * b.inv_moment)
            }
            VelocityJoint::Ratchet {
                spacing,
                max_force,
                relative,
                last_raw,
                click,
            } => {
                let raw = b.angle - a.angle;
                *relative += wrap_angle(raw - *last_raw);
                *last_raw = raw;

                let direction = spacing.signum();
                if (*click - *relative) * direction <= 0.0 {
                    *click = (*relative / *spacing).floor() * *spacing;
                }

                // Fastest backwards speed that still stops on the click this step.
                let target = (*click - *relative) / dt;
                let k = a.inv_moment + b.inv_moment;
                let relative_w = wb - wa;
                if k == 0.0 || (relative_w - target) * direction >= 0.0 {
                    return (wa, wb);
                }
                let j = clamp_impulse((target - relative_w) / k, *max_force * dt);
                (wa - j * a.inv_moment, wb + j * b.inv_moment)
            }
        }
    }
}

/// Map an angle into `[-pi, pi)`.
fn wrap_angle(angle: f64) -> f64 {
    use std::f64::consts::{PI, TAU};
    (angle + PI).rem_euclid(TAU) - PI
}

fn clamp_impulse(j: f64, max: f64) -> f64 {
    j.clamp(-max, max)
}
