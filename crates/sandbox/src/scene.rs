//! Builds the sandbox scene: level geometry, scattered boxes, a pendulum and a car.

use crate::config::{ObjectConfig, SceneConfig, ScatterConfig};
use anyhow::{Context, Result};
use engine_core::{spawn_child, spawn_node, world_matrix, Bounds, Name, Transform2d, TransformTree};
use glam::DVec2;
use hecs::{Entity, World};
use physics::{
    BodyConfig, BodyKindConfig, ComponentConfig, JointDesc, JointKind, PhysicsComponent,
    PhysicsManager, QueryMask, ShapeConfig, ShapeMaterial,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Group shared by the car's parts so they pass through each other.
const CAR_GROUP: u32 = 1;
/// Wheel speed of the car's motor, radians per second.
const CAR_MOTOR_RATE: f64 = 4.0;

pub struct Scene {
    pub world: World,
    pub physics: PhysicsManager,
    /// Nodes logged by [`Scene::report`].
    pub tracked: Vec<Entity>,
}

impl Scene {
    pub fn build(config: &SceneConfig) -> Result<Self> {
        let mut scene = Self {
            world: World::new(),
            physics: PhysicsManager::new(config.space.clone()),
            tracked: Vec::new(),
        };

        for object in &config.objects {
            scene
                .spawn_object(object)
                .with_context(|| format!("spawning {}", object.name))?;
        }
        if let Some(scatter) = &config.scatter {
            scene.scatter(scatter, config.seed)?;
        }
        if config.pendulum {
            scene.add_pendulum().context("building pendulum")?;
        }
        if config.car {
            scene.add_car().context("building car")?;
        }

        log::info!(
            "scene ready: {} bodies, {} shapes, {} joints",
            scene.physics.default_space().bodies().count(),
            scene.physics.default_space().shapes().count(),
            scene.physics.default_space().joints().count(),
        );
        Ok(scene)
    }

    /// Spawn a root node of `size` whose middle sits at `center`. The anchor
    /// is the middle of the bounds, so bodies and shapes default to it.
    fn spawn(&mut self, name: &str, center: DVec2, rotation: f64, size: DVec2) -> Result<Entity> {
        let node = spawn_node(&mut self.world, centered(center, rotation, size));
        self.world
            .insert(node, (Bounds::new(size.x, size.y), Name::new(name)))?;
        Ok(node)
    }

    fn attach(&mut self, node: Entity, config: &ComponentConfig) -> Result<PhysicsComponent> {
        let space = self.physics.default_space_mut();
        Ok(PhysicsComponent::attach(&mut self.world, space, node, config)?)
    }

    pub fn spawn_object(&mut self, object: &ObjectConfig) -> Result<Entity> {
        let node = self.spawn(&object.name, object.position, object.rotation, object.size)?;
        self.attach(node, &object.physics)?;
        Ok(node)
    }

    fn scatter(&mut self, scatter: &ScatterConfig, seed: u64) -> Result<()> {
        let mut rng = StdRng::seed_from_u64(seed);
        let (min, max) = (scatter.min_size, scatter.max_size.max(scatter.min_size));
        for i in 0..scatter.count {
            let position = scatter.origin
                + DVec2::new(
                    rng.gen_range(0.0..=scatter.extent.x),
                    rng.gen_range(0.0..=scatter.extent.y),
                );
            let size = DVec2::new(rng.gen_range(min..=max), rng.gen_range(min..=max));
            let rotation = rng.gen_range(-0.5..0.5);

            let name = format!("box {i}");
            let node = self.spawn(&name, position, rotation, size)?;
            let config = ComponentConfig {
                shapes: Some(vec![Some(ShapeConfig {
                    material: ShapeMaterial {
                        friction: 0.6,
                        ..Default::default()
                    },
                    ..Default::default()
                })]),
                ..Default::default()
            };
            self.attach(node, &config)?;
            if i == 0 {
                self.tracked.push(node);
            }
        }
        Ok(())
    }

    /// Two bobs hanging from a fixed point: a pivot to the world, then a pin.
    fn add_pendulum(&mut self) -> Result<()> {
        let hinge = DVec2::new(650.0, 40.0);
        let bob = DVec2::splat(24.0);
        let upper = self.spawn("pendulum upper", DVec2::new(650.0, 120.0), 0.0, bob)?;
        let lower = self.spawn("pendulum lower", DVec2::new(730.0, 120.0), 0.0, bob)?;

        let circle = ComponentConfig {
            body: BodyConfig {
                kind: BodyKindConfig::Circle {
                    radius: None,
                    inner_radius: 0.0,
                    offset: DVec2::ZERO,
                },
                mass: Some(2.0),
                center: None,
            },
            ..Default::default()
        };
        let upper_body = self.attach(upper, &circle)?.body;
        let lower_body = self.attach(lower, &circle)?.body;

        let space = self.physics.default_space_mut();
        let world_body = space.static_body();
        space.add_joint(world_body, upper_body, &JointDesc::pivot_at(hinge))?;
        space.add_joint(upper_body, lower_body, &JointDesc::pin(DVec2::ZERO, DVec2::ZERO))?;
        self.tracked.push(lower);
        Ok(())
    }

    /// A chassis on two motorised wheels. The cab is a child node of the
    /// chassis without a body of its own, carried along by the hierarchy.
    fn add_car(&mut self) -> Result<()> {
        let material = ShapeMaterial {
            friction: 0.9,
            group: CAR_GROUP,
            ..Default::default()
        };
        let grouped = |kind: BodyKindConfig, mass: f64| ComponentConfig {
            body: BodyConfig {
                kind,
                mass: Some(mass),
                center: None,
            },
            shapes: Some(vec![Some(ShapeConfig {
                material,
                ..Default::default()
            })]),
            ..Default::default()
        };
        let wheel = || {
            grouped(
                BodyKindConfig::Circle {
                    radius: None,
                    inner_radius: 0.0,
                    offset: DVec2::ZERO,
                },
                1.0,
            )
        };

        let center = DVec2::new(165.0, 388.0);
        let chassis_size = DVec2::new(90.0, 16.0);
        let wheel_size = DVec2::splat(24.0);
        let chassis = self.spawn("car chassis", center, 0.0, chassis_size)?;
        let rear = self.spawn("car rear wheel", center + DVec2::new(-35.0, 22.0), 0.0, wheel_size)?;
        let front = self.spawn("car front wheel", center + DVec2::new(35.0, 22.0), 0.0, wheel_size)?;

        // Sits on top of the chassis, towards the rear. Position is in the
        // chassis' frame, whose origin is its top-left corner.
        let cab_size = DVec2::new(30.0, 16.0);
        let cab = spawn_child(
            &mut self.world,
            chassis,
            centered(DVec2::new(35.0, -cab_size.y * 0.5), 0.0, cab_size),
        );
        self.world
            .insert(cab, (Bounds::new(cab_size.x, cab_size.y), Name::new("car cab")))?;

        let chassis_body = self
            .attach(chassis, &grouped(BodyKindConfig::default(), 4.0))?
            .body;
        let rear_body = self.attach(rear, &wheel())?.body;
        let front_body = self.attach(front, &wheel())?.body;

        let space = self.physics.default_space_mut();
        let rear_axle = space.position(rear_body)?;
        let front_axle = space.position(front_body)?;
        space.add_joint(chassis_body, rear_body, &JointDesc::pivot_at(rear_axle))?;
        space.add_joint(chassis_body, front_body, &JointDesc::pivot_at(front_axle))?;
        space.add_joint(
            chassis_body,
            rear_body,
            &JointDesc::new(JointKind::SimpleMotor { rate: CAR_MOTOR_RATE }),
        )?;

        self.tracked.extend([chassis, cab]);
        Ok(())
    }

    /// Advance every space by one fixed step.
    pub fn step(&mut self) {
        self.physics.update(&mut self.world);
    }

    /// Distance from `from` straight down to the first shape, if any.
    pub fn depth_below(&self, from: DVec2, reach: f64) -> Option<f64> {
        self.physics
            .default_space()
            .segment_query_first(from, from + DVec2::new(0.0, reach), QueryMask::default())
            .map(|hit| hit.alpha * reach)
    }

    pub fn report(&self) {
        for &node in &self.tracked {
            let name = self
                .world
                .get::<&Name>(node)
                .map(|n| n.0.clone())
                .unwrap_or_default();
            if let Some(local) = self.world.local(node) {
                log::info!(
                    "{name}: ({:.1}, {:.1}) rot {:.2}",
                    local.x,
                    local.y,
                    local.rotation
                );
            }
        }
    }

    /// World position of a node's anchor.
    pub fn pivot(&self, node: Entity) -> Option<DVec2> {
        let anchor = self.world.local(node)?.anchor();
        Some(world_matrix(&self.world, node).transform_point2(anchor))
    }

    /// Lowest tracked pivot, largest y.
    pub fn lowest_tracked(&self) -> Option<f64> {
        self.tracked
            .iter()
            .filter_map(|&node| self.pivot(node))
            .map(|p| p.y)
            .max_by(f64::total_cmp)
    }
}

/// Transform placing a node of `size` with its middle at `center`.
fn centered(center: DVec2, rotation: f64, size: DVec2) -> Transform2d {
    let half = size * 0.5;
    Transform2d::from_position_rotation(center.x - half.x, center.y - half.y, rotation)
        .with_anchor(half.x, half.y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use physics::{BodyDesc, ShapeDesc};

    fn quiet_config() -> SceneConfig {
        SceneConfig {
            scatter: None,
            pendulum: false,
            car: false,
            ..Default::default()
        }
    }

    #[test]
    fn default_scene_builds() {
        let scene = Scene::build(&SceneConfig::default()).unwrap();
        let space = scene.physics.default_space();
        // 24 boxes, 2 bobs, chassis and 2 wheels. The cab has no body.
        assert_eq!(space.bodies().count(), 29);
        assert_eq!(space.joints().count(), 5);
        assert_eq!(scene.tracked.len(), 4);
    }

    #[test]
    fn floor_is_static_and_hit_from_above() {
        let scene = Scene::build(&quiet_config()).unwrap();
        assert_eq!(scene.physics.default_space().bodies().count(), 0);
        let depth = scene.depth_below(DVec2::new(600.0, 0.0), 1000.0).expect("floor");
        assert!((depth - 580.0).abs() < 1e-6);
    }

    #[test]
    fn dropped_box_lands_on_floor() {
        let mut config = quiet_config();
        config.objects.push(ObjectConfig {
            name: "crate".into(),
            position: DVec2::new(600.0, 400.0),
            rotation: 0.0,
            size: DVec2::splat(20.0),
            physics: ComponentConfig::default(),
        });
        let mut scene = Scene::build(&config).unwrap();
        let node = scene
            .world
            .query::<&Name>()
            .iter()
            .find(|(_, name)| name.0 == "crate")
            .map(|(e, _)| e)
            .unwrap();

        for _ in 0..240 {
            scene.step();
        }
        let local = scene.world.local(node).unwrap();
        assert_eq!(local.anchor(), DVec2::splat(10.0));
        // Floor top is at 580; the crate's half height is 10.
        let y = scene.pivot(node).unwrap().y;
        assert!((y - 570.0).abs() < 1.5, "crate rested at {y}");
        assert!((local.y - 560.0).abs() < 1.5);
        assert!((scene.pivot(node).unwrap().x - 600.0).abs() < 0.1);
    }

    #[test]
    fn shapes_sit_on_the_middle_of_their_bounds() {
        let mut config = quiet_config();
        config.car = true;
        let scene = Scene::build(&config).unwrap();
        let space = scene.physics.default_space();
        let chassis = scene.tracked[0];
        let component = scene.world.get::<&PhysicsComponent>(chassis).unwrap();
        assert!((space.position(component.body).unwrap() - DVec2::new(165.0, 388.0)).length() < 1e-9);
        let hit = space.point_query_first(DVec2::new(200.0, 390.0), QueryMask::default());
        assert_eq!(hit, Some(component.shapes[0]));
    }

    #[test]
    fn cab_rides_with_the_chassis() {
        let mut config = quiet_config();
        config.car = true;
        let mut scene = Scene::build(&config).unwrap();
        let (chassis, cab) = (scene.tracked[0], scene.tracked[1]);
        let offset = scene.pivot(cab).unwrap() - scene.pivot(chassis).unwrap();
        let start = scene.pivot(chassis).unwrap();

        for _ in 0..120 {
            scene.step();
        }
        let moved = scene.pivot(chassis).unwrap();
        assert!(moved.distance(start) > 1.0, "chassis never moved");
        let rotation = scene.world.local(chassis).unwrap().rotation;
        let expected = moved + DVec2::from_angle(rotation).rotate(offset);
        assert!((scene.pivot(cab).unwrap() - expected).length() < 1e-6);
    }

    #[test]
    fn free_boxes_fall() {
        let mut scene = Scene::build(&quiet_config()).unwrap();
        let space = scene.physics.default_space_mut();
        let body = space
            .add_free_body(&BodyDesc::box_body(1.0, 10.0, 10.0), DVec2::new(600.0, 100.0), 0.0)
            .unwrap();
        space.add_shape(body, &ShapeDesc::boxed(10.0, 10.0)).unwrap();
        for _ in 0..30 {
            scene.step();
        }
        assert!(scene.physics.default_space().y(body).unwrap() > 100.0);
    }
}
