//! A physics space: rapier's simulation state plus the scene bindings.

use crate::body::{BodyDesc, BodyRecord};
use crate::collision::GroupFilter;
use crate::error::{PhysicsError, PhysicsResult};
use crate::joint::{AngularState, JointDesc, VelocityJoint};
use crate::reconcile::{push_transform_to_body, Binding};
use crate::shape::{vec2, ShapeDesc};
use engine_core::{Entity, TransformTree};
use glam::DVec2;
use rapier2d_f64::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::num::NonZeroUsize;

fn default_damping() -> f64 {
    1.0
}
fn default_iterations() -> usize {
    10
}
fn default_collision_slop() -> f64 {
    0.1
}

/// Tunables of a space. Loadable from RON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpaceConfig {
    #[serde(default)]
    pub gravity: DVec2,
    /// Fraction of velocity a body keeps after one second. 1 = no damping.
    #[serde(default = "default_damping")]
    pub damping: f64,
    /// Solver iterations per step.
    #[serde(default = "default_iterations")]
    pub iterations: usize,
    /// Overlap allowed between shapes before the solver pushes them apart.
    #[serde(default = "default_collision_slop")]
    pub collision_slop: f64,
    /// Speed under which a body counts as idle and may fall asleep.
    /// 0 keeps the engine's own threshold.
    #[serde(default)]
    pub idle_speed_threshold: f64,
}

impl Default for SpaceConfig {
    fn default() -> Self {
        Self {
            gravity: DVec2::ZERO,
            damping: default_damping(),
            iterations: default_iterations(),
            collision_slop: default_collision_slop(),
            idle_speed_threshold: 0.0,
        }
    }
}

/// Rapier's damping coefficient for a "fraction kept per second" damping.
fn damping_coefficient(damping: f64) -> f64 {
    -damping.max(f64::MIN_POSITIVE).ln()
}

/// Simulation state for one space. Rapier's sets are public for callers
/// that need lower-level access; going through them bypasses the scene
/// bindings.
pub struct Space {
    pub rigid_body_set: RigidBodySet,
    pub collider_set: ColliderSet,
    pub gravity: Vector<Real>,
    pub integration_parameters: IntegrationParameters,
    pub physics_pipeline: PhysicsPipeline,
    pub island_manager: IslandManager,
    pub broad_phase: DefaultBroadPhase,
    pub narrow_phase: NarrowPhase,
    pub impulse_joint_set: ImpulseJointSet,
    pub multibody_joint_set: MultibodyJointSet,
    pub ccd_solver: CCDSolver,
    pub query_pipeline: QueryPipeline,
    pub(crate) config: SpaceConfig,
    pub(crate) static_body: RigidBodyHandle,
    pub(crate) records: HashMap<RigidBodyHandle, BodyRecord>,
    pub(crate) velocity_joints: HashMap<ImpulseJointHandle, VelocityJoint>,
    hooks: GroupFilter,
}

impl Default for Space {
    fn default() -> Self {
        Self::new(SpaceConfig::default())
    }
}

impl Space {
    pub fn new(config: SpaceConfig) -> Self {
        let mut rigid_body_set = RigidBodySet::new();
        let static_body = rigid_body_set.insert(RigidBodyBuilder::fixed().build());

        let mut space = Self {
            rigid_body_set,
            collider_set: ColliderSet::new(),
            gravity: vec2(config.gravity),
            integration_parameters: IntegrationParameters::default(),
            physics_pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            impulse_joint_set: ImpulseJointSet::new(),
            multibody_joint_set: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
            config: config.clone(),
            static_body,
            records: HashMap::from([(static_body, BodyRecord::immovable())]),
            velocity_joints: HashMap::new(),
            hooks: GroupFilter,
        };
        space.set_iterations(config.iterations);
        space.set_collision_slop(config.collision_slop);
        log::debug!("created space with {:?}", space.config);
        space
    }

    pub fn config(&self) -> &SpaceConfig {
        &self.config
    }

    /// The space's shared static body. Static shapes hang off it.
    pub fn static_body(&self) -> RigidBodyHandle {
        self.static_body
    }

    pub fn gravity(&self) -> DVec2 {
        self.config.gravity
    }

    pub fn set_gravity(&mut self, gravity: DVec2) {
        self.config.gravity = gravity;
        self.gravity = vec2(gravity);
    }

    pub fn set_gravity_x(&mut self, x: f64) {
        self.set_gravity(DVec2::new(x, self.config.gravity.y));
    }

    pub fn set_gravity_y(&mut self, y: f64) {
        self.set_gravity(DVec2::new(self.config.gravity.x, y));
    }

    pub fn damping(&self) -> f64 {
        self.config.damping
    }

    /// Change the damping of every body, present and future.
    pub fn set_damping(&mut self, damping: f64) {
        self.config.damping = damping;
        let coefficient = damping_coefficient(damping);
        for (_, body) in self.rigid_body_set.iter_mut() {
            body.set_linear_damping(coefficient);
            body.set_angular_damping(coefficient);
        }
    }

    pub fn iterations(&self) -> usize {
        self.config.iterations
    }

    pub fn set_iterations(&mut self, iterations: usize) {
        let iterations = NonZeroUsize::new(iterations).unwrap_or(NonZeroUsize::MIN);
        self.config.iterations = iterations.get();
        self.integration_parameters.num_solver_iterations = iterations;
    }

    pub fn set_collision_slop(&mut self, slop: f64) {
        self.config.collision_slop = slop;
        self.integration_parameters.normalized_allowed_linear_error = slop;
    }

    /// Create a body bound to a scene node. The body starts at the node's
    /// world pose and follows it from then on.
    pub fn add_body<T: TransformTree + ?Sized>(
        &mut self,
        tree: &T,
        node: Entity,
        desc: &BodyDesc,
    ) -> PhysicsResult<RigidBodyHandle> {
        let local = tree.local(node).ok_or(PhysicsError::MissingNode(node))?;
        let center = desc.center.unwrap_or_else(|| local.anchor());

        let damping = damping_coefficient(self.config.damping);
        let (mut body, mut record) = desc.build(DVec2::ZERO, 0.0, damping)?;
        self.apply_idle_threshold(&mut body);
        push_transform_to_body(tree, node, center, &mut body);
        record.binding = Some(Binding::new(node, center));

        let handle = self.rigid_body_set.insert(body);
        self.records.insert(handle, record);
        log::trace!("bound body {handle:?} to node {node:?}");
        Ok(handle)
    }

    /// Create a body with no scene node behind it.
    pub fn add_free_body(
        &mut self,
        desc: &BodyDesc,
        position: DVec2,
        angle: f64,
    ) -> PhysicsResult<RigidBodyHandle> {
        let damping = damping_coefficient(self.config.damping);
        let (mut body, record) = desc.build(position, angle, damping)?;
        self.apply_idle_threshold(&mut body);
        let handle = self.rigid_body_set.insert(body);
        self.records.insert(handle, record);
        Ok(handle)
    }

    fn apply_idle_threshold(&self, body: &mut RigidBody) {
        if self.config.idle_speed_threshold > 0.0 {
            body.activation_mut().normalized_linear_threshold = self.config.idle_speed_threshold;
        }
    }

    /// Remove a body with its shapes and joints.
    pub fn remove_body(&mut self, handle: RigidBodyHandle) -> PhysicsResult<()> {
        if handle == self.static_body {
            return Err(PhysicsError::InvalidBody("the static body cannot be removed".to_string()));
        }
        self.rigid_body_set
            .remove(
                handle,
                &mut self.island_manager,
                &mut self.collider_set,
                &mut self.impulse_joint_set,
                &mut self.multibody_joint_set,
                true,
            )
            .ok_or(PhysicsError::UnknownBody(handle))?;
        self.records.remove(&handle);
        let joints = &self.impulse_joint_set;
        self.velocity_joints.retain(|joint, _| joints.contains(*joint));
        self.update_query_pipeline();
        Ok(())
    }

    pub fn contains_body(&self, handle: RigidBodyHandle) -> bool {
        self.records.contains_key(&handle)
    }

    /// Bodies added to this space, excluding the static body.
    pub fn bodies(&self) -> impl Iterator<Item = (RigidBodyHandle, &RigidBody)> + '_ {
        let static_body = self.static_body;
        self.rigid_body_set
            .iter()
            .filter(move |(handle, _)| *handle != static_body)
    }

    pub fn add_shape(
        &mut self,
        body: RigidBodyHandle,
        desc: &ShapeDesc,
    ) -> PhysicsResult<ColliderHandle> {
        self.add_shape_at(body, desc, DVec2::ZERO, 0.0)
    }

    /// Attach a shape whose geometry is first moved by `position` and
    /// `angle` in the body's frame.
    pub fn add_shape_at(
        &mut self,
        body: RigidBodyHandle,
        desc: &ShapeDesc,
        position: DVec2,
        angle: f64,
    ) -> PhysicsResult<ColliderHandle> {
        if !self.rigid_body_set.contains(body) {
            return Err(PhysicsError::UnknownBody(body));
        }
        let mut collider = desc.to_collider()?;
        let placed = Isometry::new(vec2(position), angle) * collider.position();
        collider.set_position(placed);
        let handle = self
            .collider_set
            .insert_with_parent(collider, body, &mut self.rigid_body_set);
        self.update_query_pipeline();
        Ok(handle)
    }

    /// Attach a shape to the static body. Its geometry is in world space.
    pub fn add_static_shape(&mut self, desc: &ShapeDesc) -> PhysicsResult<ColliderHandle> {
        self.add_shape(self.static_body, desc)
    }

    pub fn remove_shape(&mut self, handle: ColliderHandle) -> PhysicsResult<()> {
        self.collider_set
            .remove(handle, &mut self.island_manager, &mut self.rigid_body_set, true)
            .ok_or(PhysicsError::UnknownShape(handle))?;
        self.update_query_pipeline();
        Ok(())
    }

    pub fn contains_shape(&self, handle: ColliderHandle) -> bool {
        self.collider_set.contains(handle)
    }

    pub fn shape(&self, handle: ColliderHandle) -> PhysicsResult<&Collider> {
        self.collider_set
            .get(handle)
            .ok_or(PhysicsError::UnknownShape(handle))
    }

    pub fn shapes(&self) -> impl Iterator<Item = (ColliderHandle, &Collider)> + '_ {
        self.collider_set.iter()
    }

    /// Shapes attached to one body.
    pub fn body_shapes(&self, body: RigidBodyHandle) -> PhysicsResult<Vec<ColliderHandle>> {
        Ok(self.body(body)?.colliders().to_vec())
    }

    pub fn add_joint(
        &mut self,
        body_a: RigidBodyHandle,
        body_b: RigidBodyHandle,
        desc: &JointDesc,
    ) -> PhysicsResult<ImpulseJointHandle> {
        if body_a == body_b {
            return Err(PhysicsError::InvalidJoint("a joint needs two different bodies".to_string()));
        }
        let (joint, velocity) = desc.build(self.body(body_a)?, self.body(body_b)?)?;
        let handle = self.impulse_joint_set.insert(body_a, body_b, joint, true);
        if let Some(velocity) = velocity {
            self.velocity_joints.insert(handle, velocity);
        }
        Ok(handle)
    }

    pub fn remove_joint(&mut self, handle: ImpulseJointHandle) -> PhysicsResult<()> {
        self.impulse_joint_set
            .remove(handle, true)
            .ok_or(PhysicsError::UnknownJoint(handle))?;
        self.velocity_joints.remove(&handle);
        Ok(())
    }

    pub fn contains_joint(&self, handle: ImpulseJointHandle) -> bool {
        self.impulse_joint_set.contains(handle)
    }

    pub fn joint(&self, handle: ImpulseJointHandle) -> PhysicsResult<&ImpulseJoint> {
        self.impulse_joint_set
            .get(handle)
            .ok_or(PhysicsError::UnknownJoint(handle))
    }

    pub fn joints(&self) -> impl Iterator<Item = (ImpulseJointHandle, &ImpulseJoint)> + '_ {
        self.impulse_joint_set.iter()
    }

    /// Refresh the acceleration structure used by queries.
    pub fn update_query_pipeline(&mut self) {
        self.query_pipeline.update(&self.collider_set);
    }

    /// Advance the space by `dt` seconds: push scene poses into awake
    /// bodies, simulate, clamp speeds, then pull the results back into the
    /// scene.
    pub fn step<T: TransformTree + ?Sized>(&mut self, tree: &mut T, dt: f64) {
        self.integration_parameters.dt = dt;

        for (handle, record) in self.records.iter_mut() {
            let Some(binding) = record.binding.as_mut() else {
                continue;
            };
            let Some(body) = self.rigid_body_set.get_mut(*handle) else {
                continue;
            };
            if body.is_sleeping() {
                continue;
            }
            if !binding.push(&*tree, body) {
                log::trace!("node {:?} of body {handle:?} has no transform", binding.node);
            }
        }

        self.solve_velocity_joints(dt);

        self.physics_pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.rigid_body_set,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            &mut self.ccd_solver,
            Some(&mut self.query_pipeline),
            &self.hooks,
            &(),
        );

        for (handle, record) in self.records.iter_mut() {
            let Some(body) = self.rigid_body_set.get_mut(*handle) else {
                continue;
            };
            record.limits.clamp(body);
            if let Some(binding) = record.binding.as_mut() {
                binding.pull(&mut *tree, &*body);
            }
        }
    }

    fn solve_velocity_joints(&mut self, dt: f64) {
        for (handle, constraint) in self.velocity_joints.iter_mut() {
            let Some(joint) = self.impulse_joint_set.get(*handle) else {
                continue;
            };
            let (a, b) = (joint.body1, joint.body2);
            let state = |handle: RigidBodyHandle| {
                let body = self.rigid_body_set.get(handle)?;
                Some(AngularState {
                    angle: body.rotation().angle(),
                    w: body.angvel(),
                    inv_moment: self.records.get(&handle).map_or(0.0, BodyRecord::inverse_moment),
                })
            };
            let (Some(state_a), Some(state_b)) = (state(a), state(b)) else {
                continue;
            };

            let (new_wa, new_wb) = constraint.solve(state_a, state_b, dt);
            if new_wa != state_a.w {
                if let Some(body) = self.rigid_body_set.get_mut(a) {
                    body.set_angvel(new_wa, true);
                }
            }
            if new_wb != state_b.w {
                if let Some(body) = self.rigid_body_set.get_mut(b) {
                    body.set_angvel(new_wb, true);
                }
            }
        }
    }
}
