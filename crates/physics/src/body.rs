//! Rigid body descriptions and per-body accessors on [`Space`].

use crate::error::{PhysicsError, PhysicsResult};
use crate::moment::{moment_for_box, moment_for_circle, moment_for_poly, moment_for_segment};
use crate::reconcile::{teleport_angle, teleport_position, BodyState, Binding};
use crate::shape::{point2, vec2};
use crate::space::Space;
use engine_core::TransformTree;
use glam::DVec2;
use rapier2d_f64::prelude::*;
use serde::{Deserialize, Serialize};

/// Mass used when a body description leaves it out.
pub const DEFAULT_MASS: f64 = 100.0;
/// Moment of inertia used when a body description leaves it out.
pub const DEFAULT_MOMENT: f64 = 100.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BodyKind {
    #[default]
    Dynamic,
    /// Never moves under simulation.
    Static,
    /// Moves only by its velocity; unaffected by forces and contacts.
    Kinematic,
}

/// Speed caps applied after every step. Infinite means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VelocityLimits {
    #[serde(default = "unbounded")]
    pub max_velocity: f64,
    #[serde(default = "unbounded")]
    pub max_angular_velocity: f64,
}

fn unbounded() -> f64 {
    f64::INFINITY
}

impl Default for VelocityLimits {
    fn default() -> Self {
        Self {
            max_velocity: f64::INFINITY,
            max_angular_velocity: f64::INFINITY,
        }
    }
}

impl VelocityLimits {
    /// Both caps must be non-negative; infinity means unbounded.
    pub fn validate(&self) -> PhysicsResult<()> {
        speed_limit(self.max_velocity)?;
        speed_limit(self.max_angular_velocity)?;
        Ok(())
    }

    /// Clamp a body's velocities in place. Returns true if anything changed.
    pub(crate) fn clamp(&self, body: &mut RigidBody) -> bool {
        let mut clamped = false;
        let linvel = *body.linvel();
        let speed = linvel.norm();
        if speed > self.max_velocity {
            body.set_linvel(linvel * (self.max_velocity / speed), false);
            clamped = true;
        }
        let angvel = body.angvel();
        if angvel.abs() > self.max_angular_velocity {
            body.set_angvel(self.max_angular_velocity.copysign(angvel), false);
            clamped = true;
        }
        clamped
    }
}

fn speed_limit(max: f64) -> PhysicsResult<f64> {
    if max >= 0.0 {
        Ok(max)
    } else {
        Err(PhysicsError::InvalidBody(format!("speed limit must be non-negative, got {max}")))
    }
}

/// Everything needed to create a body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyDesc {
    #[serde(default)]
    pub kind: BodyKind,
    /// Defaults to [`DEFAULT_MASS`] with a warning.
    #[serde(default)]
    pub mass: Option<f64>,
    /// Infinite locks rotation. Defaults to [`DEFAULT_MOMENT`] with a warning.
    #[serde(default)]
    pub moment: Option<f64>,
    /// Body center relative to the node's origin. Defaults to the node's
    /// anchor.
    #[serde(default)]
    pub center: Option<DVec2>,
    #[serde(default)]
    pub velocity: DVec2,
    #[serde(default)]
    pub angular_velocity: f64,
    #[serde(default)]
    pub limits: VelocityLimits,
}

impl Default for BodyDesc {
    fn default() -> Self {
        Self {
            kind: BodyKind::Dynamic,
            mass: None,
            moment: None,
            center: None,
            velocity: DVec2::ZERO,
            angular_velocity: 0.0,
            limits: VelocityLimits::default(),
        }
    }
}

impl BodyDesc {
    pub fn dynamic(mass: f64, moment: f64) -> Self {
        Self {
            mass: Some(mass),
            moment: Some(moment),
            ..Default::default()
        }
    }

    pub fn fixed() -> Self {
        Self {
            kind: BodyKind::Static,
            ..Default::default()
        }
    }

    pub fn kinematic() -> Self {
        Self {
            kind: BodyKind::Kinematic,
            ..Default::default()
        }
    }

    /// Dynamic body with the moment of a solid `width` x `height` box.
    pub fn box_body(mass: f64, width: f64, height: f64) -> Self {
        Self::dynamic(mass, moment_for_box(mass, width, height))
    }

    /// Dynamic body with the moment of a solid disc offset from its center.
    pub fn circle_body(mass: f64, radius: f64, offset: DVec2) -> Self {
        Self::dynamic(mass, moment_for_circle(mass, 0.0, radius, offset))
    }

    pub fn segment_body(mass: f64, start: DVec2, end: DVec2) -> Self {
        Self::dynamic(mass, moment_for_segment(mass, start, end))
    }

    pub fn poly_body(mass: f64, verts: &[DVec2], offset: DVec2) -> Self {
        Self::dynamic(mass, moment_for_poly(mass, verts, offset))
    }

    pub fn with_center(mut self, center: DVec2) -> Self {
        self.center = Some(center);
        self
    }

    pub fn with_velocity(mut self, velocity: DVec2) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn with_angular_velocity(mut self, angular_velocity: f64) -> Self {
        self.angular_velocity = angular_velocity;
        self
    }

    pub fn with_limits(mut self, limits: VelocityLimits) -> Self {
        self.limits = limits;
        self
    }

    pub(crate) fn resolved_mass(&self) -> PhysicsResult<f64> {
        let mass = self.mass.unwrap_or_else(|| {
            log::warn!("body mass not given, defaulting to {DEFAULT_MASS}");
            DEFAULT_MASS
        });
        if mass > 0.0 && mass.is_finite() {
            Ok(mass)
        } else {
            Err(PhysicsError::InvalidBody(format!("mass must be positive and finite, got {mass}")))
        }
    }

    pub(crate) fn resolved_moment(&self) -> PhysicsResult<f64> {
        let moment = self.moment.unwrap_or_else(|| {
            log::warn!("body moment not given, defaulting to {DEFAULT_MOMENT}");
            DEFAULT_MOMENT
        });
        if moment > 0.0 {
            Ok(moment)
        } else {
            Err(PhysicsError::InvalidBody(format!("moment must be positive, got {moment}")))
        }
    }

    /// Build the rapier body at a world pose, along with the record the
    /// space keeps for it. `damping` is rapier's per-second damping
    /// coefficient.
    pub(crate) fn build(
        &self,
        position: DVec2,
        angle: f64,
        damping: f64,
    ) -> PhysicsResult<(RigidBody, BodyRecord)> {
        self.limits.validate()?;
        let builder = match self.kind {
            BodyKind::Dynamic => RigidBodyBuilder::dynamic(),
            BodyKind::Static => RigidBodyBuilder::fixed(),
            BodyKind::Kinematic => RigidBodyBuilder::kinematic_velocity_based(),
        };
        let mut builder = builder
            .translation(vec2(position))
            .rotation(angle)
            .linvel(vec2(self.velocity))
            .angvel(self.angular_velocity)
            .linear_damping(damping)
            .angular_damping(damping);

        let (mass, moment) = match self.kind {
            BodyKind::Dynamic => {
                let mass = self.resolved_mass()?;
                let moment = self.resolved_moment()?;
                builder = builder.additional_mass_properties(mass_properties(mass, moment));
                if moment.is_infinite() {
                    builder = builder.lock_rotations();
                }
                (mass, moment)
            }
            BodyKind::Static | BodyKind::Kinematic => (f64::INFINITY, f64::INFINITY),
        };

        let record = BodyRecord {
            mass,
            moment,
            limits: self.limits,
            ..BodyRecord::immovable()
        };
        Ok((builder.build(), record))
    }
}

/// Mass properties about the body origin. An infinite moment becomes zero
/// inertia, which rapier treats as non-rotating.
fn mass_properties(mass: f64, moment: f64) -> MassProperties {
    let inertia = if moment.is_finite() { moment } else { 0.0 };
    MassProperties::new(point![0.0, 0.0], mass, inertia)
}

/// What a space tracks per body beyond rapier's own state.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BodyRecord {
    pub binding: Option<Binding>,
    pub mass: f64,
    pub moment: f64,
    pub limits: VelocityLimits,
}

impl BodyRecord {
    /// Record of an unbound body with infinite mass and moment.
    pub fn immovable() -> Self {
        Self {
            binding: None,
            mass: f64::INFINITY,
            moment: f64::INFINITY,
            limits: VelocityLimits::default(),
        }
    }

    pub fn inverse_moment(&self) -> f64 {
        if self.moment.is_finite() {
            1.0 / self.moment
        } else {
            0.0
        }
    }
}

impl BodyState for RigidBody {
    fn position(&self) -> DVec2 {
        let t = self.translation();
        DVec2::new(t.x, t.y)
    }

    fn angle(&self) -> f64 {
        self.rotation().angle()
    }

    fn set_position(&mut self, position: DVec2) {
        RigidBody::set_translation(self, vec2(position), false);
    }

    fn set_angle(&mut self, angle: f64) {
        RigidBody::set_rotation(self, Rotation::new(angle), false);
    }

    fn wake(&mut self) {
        self.wake_up(true);
    }
}

pub(crate) fn to_dvec(v: &Vector<Real>) -> DVec2 {
    DVec2::new(v.x, v.y)
}

impl Space {
    pub fn body(&self, handle: RigidBodyHandle) -> PhysicsResult<&RigidBody> {
        self.rigid_body_set
            .get(handle)
            .ok_or(PhysicsError::UnknownBody(handle))
    }

    pub fn body_mut(&mut self, handle: RigidBodyHandle) -> PhysicsResult<&mut RigidBody> {
        self.rigid_body_set
            .get_mut(handle)
            .ok_or(PhysicsError::UnknownBody(handle))
    }

    pub(crate) fn record(&self, handle: RigidBodyHandle) -> PhysicsResult<&BodyRecord> {
        self.records
            .get(&handle)
            .ok_or(PhysicsError::UnknownBody(handle))
    }

    fn record_mut(&mut self, handle: RigidBodyHandle) -> PhysicsResult<&mut BodyRecord> {
        self.records
            .get_mut(&handle)
            .ok_or(PhysicsError::UnknownBody(handle))
    }

    /// Scene node the body is bound to, if any.
    pub fn binding(&self, handle: RigidBodyHandle) -> PhysicsResult<Option<Binding>> {
        Ok(self.record(handle)?.binding)
    }

    /// World position of the body's center.
    pub fn position(&self, handle: RigidBodyHandle) -> PhysicsResult<DVec2> {
        Ok(BodyState::position(self.body(handle)?))
    }

    pub fn x(&self, handle: RigidBodyHandle) -> PhysicsResult<f64> {
        Ok(self.position(handle)?.x)
    }

    pub fn y(&self, handle: RigidBodyHandle) -> PhysicsResult<f64> {
        Ok(self.position(handle)?.y)
    }

    /// Move the body's center to a world position, dragging its scene node
    /// along. Wakes the body.
    pub fn set_position<T: TransformTree + ?Sized>(
        &mut self,
        tree: &mut T,
        handle: RigidBodyHandle,
        position: DVec2,
    ) -> PhysicsResult<()> {
        let binding = self.record(handle)?.binding;
        let body = self.body_mut(handle)?;
        match binding {
            Some(b) => teleport_position(tree, b.node, b.center, body, position),
            None => {
                body.wake();
                BodyState::set_position(body, position);
            }
        }
        Ok(())
    }

    pub fn set_x<T: TransformTree + ?Sized>(
        &mut self,
        tree: &mut T,
        handle: RigidBodyHandle,
        x: f64,
    ) -> PhysicsResult<()> {
        let y = self.y(handle)?;
        self.set_position(tree, handle, DVec2::new(x, y))
    }

    pub fn set_y<T: TransformTree + ?Sized>(
        &mut self,
        tree: &mut T,
        handle: RigidBodyHandle,
        y: f64,
    ) -> PhysicsResult<()> {
        let x = self.x(handle)?;
        self.set_position(tree, handle, DVec2::new(x, y))
    }

    /// World angle in radians.
    pub fn rotation(&self, handle: RigidBodyHandle) -> PhysicsResult<f64> {
        Ok(BodyState::angle(self.body(handle)?))
    }

    /// Set the world angle, rotating the scene node to match. Wakes the body.
    pub fn set_angle<T: TransformTree + ?Sized>(
        &mut self,
        tree: &mut T,
        handle: RigidBodyHandle,
        angle: f64,
    ) -> PhysicsResult<()> {
        let binding = self.record(handle)?.binding;
        let body = self.body_mut(handle)?;
        match binding {
            Some(b) => teleport_angle(tree, b.node, b.center, body, angle),
            None => {
                body.wake();
                BodyState::set_angle(body, angle);
            }
        }
        Ok(())
    }

    /// Mass as configured. Infinite for static and kinematic bodies.
    pub fn mass(&self, handle: RigidBodyHandle) -> PhysicsResult<f64> {
        Ok(self.record(handle)?.mass)
    }

    pub fn set_mass(&mut self, handle: RigidBodyHandle, mass: f64) -> PhysicsResult<()> {
        if !(mass > 0.0 && mass.is_finite()) {
            return Err(PhysicsError::InvalidBody(format!("mass must be positive and finite, got {mass}")));
        }
        self.set_mass_properties(handle, Some(mass), None)
    }

    pub fn moment(&self, handle: RigidBodyHandle) -> PhysicsResult<f64> {
        Ok(self.record(handle)?.moment)
    }

    pub fn set_moment(&mut self, handle: RigidBodyHandle, moment: f64) -> PhysicsResult<()> {
        if !(moment > 0.0) {
            return Err(PhysicsError::InvalidBody(format!("moment must be positive, got {moment}")));
        }
        self.set_mass_properties(handle, None, Some(moment))
    }

    fn set_mass_properties(
        &mut self,
        handle: RigidBodyHandle,
        mass: Option<f64>,
        moment: Option<f64>,
    ) -> PhysicsResult<()> {
        if !self.body(handle)?.is_dynamic() {
            return Err(PhysicsError::InvalidBody("only dynamic bodies have a mass".to_string()));
        }
        let record = self.record_mut(handle)?;
        record.mass = mass.unwrap_or(record.mass);
        record.moment = moment.unwrap_or(record.moment);
        let (mass, moment) = (record.mass, record.moment);

        let body = self.body_mut(handle)?;
        body.set_additional_mass_properties(mass_properties(mass, moment), true);
        body.lock_rotations(moment.is_infinite(), true);
        Ok(())
    }

    pub fn velocity(&self, handle: RigidBodyHandle) -> PhysicsResult<DVec2> {
        Ok(to_dvec(self.body(handle)?.linvel()))
    }

    /// Set the linear velocity. Wakes the body.
    pub fn set_velocity(&mut self, handle: RigidBodyHandle, velocity: DVec2) -> PhysicsResult<()> {
        self.body_mut(handle)?.set_linvel(vec2(velocity), true);
        Ok(())
    }

    pub fn set_velocity_x(&mut self, handle: RigidBodyHandle, vx: f64) -> PhysicsResult<()> {
        let v = self.velocity(handle)?;
        self.set_velocity(handle, DVec2::new(vx, v.y))
    }

    pub fn set_velocity_y(&mut self, handle: RigidBodyHandle, vy: f64) -> PhysicsResult<()> {
        let v = self.velocity(handle)?;
        self.set_velocity(handle, DVec2::new(v.x, vy))
    }

    pub fn angular_velocity(&self, handle: RigidBodyHandle) -> PhysicsResult<f64> {
        Ok(self.body(handle)?.angvel())
    }

    pub fn set_angular_velocity(&mut self, handle: RigidBodyHandle, w: f64) -> PhysicsResult<()> {
        self.body_mut(handle)?.set_angvel(w, true);
        Ok(())
    }

    pub fn velocity_limits(&self, handle: RigidBodyHandle) -> PhysicsResult<VelocityLimits> {
        Ok(self.record(handle)?.limits)
    }

    pub fn set_max_velocity(&mut self, handle: RigidBodyHandle, max: f64) -> PhysicsResult<()> {
        let max = speed_limit(max)?;
        self.record_mut(handle)?.limits.max_velocity = max;
        Ok(())
    }

    pub fn set_max_angular_velocity(&mut self, handle: RigidBodyHandle, max: f64) -> PhysicsResult<()> {
        let max = speed_limit(max)?;
        self.record_mut(handle)?.limits.max_angular_velocity = max;
        Ok(())
    }

    /// Add a persistent force applied at `offset` from the body's center
    /// (world-space direction). Stays until [`Space::reset_forces`].
    pub fn apply_force(
        &mut self,
        handle: RigidBodyHandle,
        force: DVec2,
        offset: DVec2,
    ) -> PhysicsResult<()> {
        let body = self.body_mut(handle)?;
        let point = BodyState::position(body) + offset;
        body.add_force_at_point(vec2(force), point2(point), true);
        Ok(())
    }

    /// Apply an instantaneous impulse at `offset` from the body's center.
    pub fn apply_impulse(
        &mut self,
        handle: RigidBodyHandle,
        impulse: DVec2,
        offset: DVec2,
    ) -> PhysicsResult<()> {
        let body = self.body_mut(handle)?;
        let point = BodyState::position(body) + offset;
        body.apply_impulse_at_point(vec2(impulse), point2(point), true);
        Ok(())
    }

    /// Zero the force and torque accumulated by [`Space::apply_force`].
    pub fn reset_forces(&mut self, handle: RigidBodyHandle) -> PhysicsResult<()> {
        let body = self.body_mut(handle)?;
        body.reset_forces(false);
        body.reset_torques(false);
        Ok(())
    }

    /// Velocity of the body's material at a world point.
    pub fn velocity_at_world_point(
        &self,
        handle: RigidBodyHandle,
        point: DVec2,
    ) -> PhysicsResult<DVec2> {
        Ok(to_dvec(&self.body(handle)?.velocity_at_point(&point2(point))))
    }

    pub fn is_sleeping(&self, handle: RigidBodyHandle) -> PhysicsResult<bool> {
        Ok(self.body(handle)?.is_sleeping())
    }

    pub fn is_static(&self, handle: RigidBodyHandle) -> PhysicsResult<bool> {
        Ok(self.body(handle)?.is_fixed())
    }

    pub fn wake(&mut self, handle: RigidBodyHandle) -> PhysicsResult<()> {
        self.body_mut(handle)?.wake();
        Ok(())
    }

    pub fn sleep(&mut self, handle: RigidBodyHandle) -> PhysicsResult<()> {
        self.body_mut(handle)?.sleep();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factories_compute_moment_from_shape() {
        let desc = BodyDesc::box_body(12.0, 3.0, 4.0);
        assert_eq!(desc.mass, Some(12.0));
        assert!((desc.moment.unwrap() - 25.0).abs() < 1e-12);

        let disc = BodyDesc::circle_body(2.0, 5.0, DVec2::ZERO);
        assert!((disc.moment.unwrap() - 25.0).abs() < 1e-12);
    }

    #[test]
    fn missing_mass_and_moment_fall_back() {
        let desc = BodyDesc::default();
        assert_eq!(desc.resolved_mass().unwrap(), DEFAULT_MASS);
        assert_eq!(desc.resolved_moment().unwrap(), DEFAULT_MOMENT);
    }

    #[test]
    fn invalid_mass_is_rejected() {
        assert!(BodyDesc::dynamic(0.0, 1.0).build(DVec2::ZERO, 0.0, 0.0).is_err());
        assert!(BodyDesc::dynamic(1.0, -1.0).build(DVec2::ZERO, 0.0, 0.0).is_err());
        assert!(BodyDesc::dynamic(f64::NAN, 1.0).build(DVec2::ZERO, 0.0, 0.0).is_err());
    }

    #[test]
    fn infinite_moment_locks_rotation() {
        let (body, record) = BodyDesc::dynamic(1.0, f64::INFINITY)
            .build(DVec2::ZERO, 0.0, 0.0)
            .unwrap();
        assert!(body.locked_axes().contains(LockedAxes::ROTATION_LOCKED));
        assert_eq!(record.inverse_moment(), 0.0);
    }

    #[test]
    fn rigid_body_state_round_trips() {
        let (mut body, _) = BodyDesc::dynamic(1.0, 1.0)
            .build(DVec2::new(3.0, 4.0), 0.5, 0.0)
            .unwrap();
        assert!((BodyState::position(&body) - DVec2::new(3.0, 4.0)).length() < 1e-12);
        assert!((BodyState::angle(&body) - 0.5).abs() < 1e-12);

        BodyState::set_position(&mut body, DVec2::new(-1.0, 2.0));
        BodyState::set_angle(&mut body, -2.0);
        assert!((BodyState::position(&body) - DVec2::new(-1.0, 2.0)).length() < 1e-12);
        assert!((BodyState::angle(&body) + 2.0).abs() < 1e-12);
    }

    #[test]
    fn limits_clamp_both_speeds() {
        let (mut body, _) = BodyDesc::dynamic(1.0, 1.0)
            .with_velocity(DVec2::new(30.0, 40.0))
            .with_angular_velocity(-9.0)
            .build(DVec2::ZERO, 0.0, 0.0)
            .unwrap();
        let limits = VelocityLimits {
            max_velocity: 10.0,
            max_angular_velocity: 3.0,
        };
        assert!(limits.clamp(&mut body));
        assert!((body.linvel().norm() - 10.0).abs() < 1e-9);
        assert!((body.linvel().x - 6.0).abs() < 1e-9);
        assert!((body.angvel() + 3.0).abs() < 1e-12);
        assert!(!limits.clamp(&mut body));
    }

    #[test]
    fn negative_or_nan_limits_are_rejected() {
        let mut space = Space::default();
        let body = space
            .add_free_body(
                &BodyDesc::dynamic(1.0, 1.0).with_velocity(DVec2::new(10.0, 0.0)),
                DVec2::ZERO,
                0.0,
            )
            .unwrap();
        assert!(matches!(space.set_max_velocity(body, -5.0), Err(PhysicsError::InvalidBody(_))));
        assert!(matches!(
            space.set_max_angular_velocity(body, f64::NAN),
            Err(PhysicsError::InvalidBody(_))
        ));
        assert!(space.velocity_limits(body).unwrap().max_velocity.is_infinite());

        space.set_max_velocity(body, 0.0).unwrap();
        space.step(&mut engine_core::World::new(), 1.0 / 60.0);
        assert_eq!(space.velocity(body).unwrap(), DVec2::ZERO);

        let bad = BodyDesc::dynamic(1.0, 1.0).with_limits(VelocityLimits {
            max_velocity: -1.0,
            ..Default::default()
        });
        assert!(space.add_free_body(&bad, DVec2::ZERO, 0.0).is_err());
    }
}
