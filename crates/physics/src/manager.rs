//! Owns the spaces of a scene and steps them once per frame.

use crate::error::{PhysicsError, PhysicsResult};
use crate::space::{Space, SpaceConfig};
use engine_core::TransformTree;
use glam::DVec2;

/// Default simulated time per update, in seconds.
pub const DEFAULT_UPDATE_SPEED: f64 = 1.0 / 60.0;

/// Index of a space inside a [`PhysicsManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpaceId(usize);

impl SpaceId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A list of spaces plus the one operations default to.
///
/// Every space created here is stepped by [`PhysicsManager::update`]. A
/// space that should be stepped by hand is simply a [`Space`] the caller
/// owns.
pub struct PhysicsManager {
    spaces: Vec<Space>,
    default_space: SpaceId,
    /// Seconds simulated per update.
    pub update_speed: f64,
    /// When false, updates do nothing.
    pub active: bool,
}

impl Default for PhysicsManager {
    fn default() -> Self {
        Self::new(SpaceConfig::default())
    }
}

impl PhysicsManager {
    /// Create a manager whose default space uses `config`.
    pub fn new(config: SpaceConfig) -> Self {
        Self {
            spaces: vec![Space::new(config)],
            default_space: SpaceId(0),
            update_speed: DEFAULT_UPDATE_SPEED,
            active: true,
        }
    }

    pub fn create_space(&mut self, config: SpaceConfig) -> SpaceId {
        self.spaces.push(Space::new(config));
        let id = SpaceId(self.spaces.len() - 1);
        log::debug!("created managed space {}", id.0);
        id
    }

    pub fn space(&self, id: SpaceId) -> PhysicsResult<&Space> {
        self.spaces.get(id.0).ok_or(PhysicsError::UnknownSpace(id.0))
    }

    pub fn space_mut(&mut self, id: SpaceId) -> PhysicsResult<&mut Space> {
        self.spaces
            .get_mut(id.0)
            .ok_or(PhysicsError::UnknownSpace(id.0))
    }

    pub fn default_space_id(&self) -> SpaceId {
        self.default_space
    }

    pub fn default_space(&self) -> &Space {
        &self.spaces[self.default_space.0]
    }

    pub fn default_space_mut(&mut self) -> &mut Space {
        &mut self.spaces[self.default_space.0]
    }

    pub fn set_default_space(&mut self, id: SpaceId) -> PhysicsResult<()> {
        self.space(id)?;
        self.default_space = id;
        Ok(())
    }

    pub fn space_count(&self) -> usize {
        self.spaces.len()
    }

    pub fn iterations(&self) -> usize {
        self.default_space().iterations()
    }

    pub fn set_iterations(&mut self, iterations: usize) {
        self.default_space_mut().set_iterations(iterations);
    }

    pub fn gravity(&self) -> DVec2 {
        self.default_space().gravity()
    }

    pub fn set_gravity(&mut self, gravity: DVec2) {
        self.default_space_mut().set_gravity(gravity);
    }

    pub fn start(&mut self) {
        self.active = true;
    }

    pub fn stop(&mut self) {
        self.active = false;
    }

    /// Step every space once by `update_speed`. Later spaces step first.
    pub fn update<T: TransformTree + ?Sized>(&mut self, tree: &mut T) {
        if !self.active {
            return;
        }
        let dt = self.update_speed;
        for space in self.spaces.iter_mut().rev() {
            space.step(&mut *tree, dt);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::BodyDesc;
    use engine_core::{spawn_node, Transform2d, World};

    #[test]
    fn unknown_space_is_an_error() {
        let mut manager = PhysicsManager::default();
        let id = manager.create_space(SpaceConfig::default());
        assert_eq!(id.index(), 1);
        assert!(manager.space(id).is_ok());
        assert!(matches!(
            manager.set_default_space(SpaceId(9)),
            Err(PhysicsError::UnknownSpace(9))
        ));
    }

    #[test]
    fn iterations_forward_to_default_space() {
        let mut manager = PhysicsManager::default();
        let other = manager.create_space(SpaceConfig::default());
        manager.set_default_space(other).unwrap();
        manager.set_iterations(3);
        assert_eq!(manager.space(other).unwrap().iterations(), 3);
        assert_eq!(manager.space(SpaceId(0)).unwrap().iterations(), 10);
    }

    #[test]
    fn inactive_manager_does_not_step() {
        let mut world = World::new();
        let node = spawn_node(&mut world, Transform2d::from_position(0.0, 0.0));
        let mut manager = PhysicsManager::default();
        let body = manager
            .default_space_mut()
            .add_body(&world, node, &BodyDesc::dynamic(1.0, 1.0).with_velocity(DVec2::new(60.0, 0.0)))
            .unwrap();

        manager.stop();
        manager.update(&mut world);
        assert_eq!(world.local(node).unwrap().x, 0.0);

        manager.start();
        manager.update(&mut world);
        assert!((world.local(node).unwrap().x - 1.0).abs() < 1e-6);
        assert!((manager.default_space().x(body).unwrap() - 1.0).abs() < 1e-6);
    }
}
