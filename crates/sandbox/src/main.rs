//! Headless physics sandbox: builds a scene from scene.ron and runs it.

mod config;
mod scene;

use anyhow::Result;
use config::SceneConfig;
use engine_core::{DAffine2, Time};
use glam::DVec2;
use physics_debug::DebugDrawer;
use scene::Scene;
use std::time::Duration;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = SceneConfig::load();
    if !config::config_path().exists() {
        log::info!("writing default scene to {:?}", config::config_path());
        config.save();
    }

    let mut scene = Scene::build(&config)?;
    let mut drawer = DebugDrawer::new();
    if config.debug_draw {
        drawer.start();
    }

    let mut time = Time::new();
    time.set_fixed_rate(config.fixed_rate);
    scene.physics.update_speed = time.fixed_timestep_seconds();
    let frame = Duration::from_secs_f64(time.fixed_timestep_seconds());

    log::info!("running {} frames at {} Hz", config.frames, config.fixed_rate);
    for _ in 0..config.frames {
        time.advance(frame);
        while time.should_fixed_update() {
            scene.step();
        }

        if time.frame_count() % 60 == 0 {
            let overlay = drawer.draw(scene.physics.default_space(), DAffine2::IDENTITY);
            log::debug!(
                "t={:.2}s overlay: {} primitives, {} line vertices",
                time.elapsed_seconds(),
                overlay.len(),
                overlay.line_vertices().len()
            );
            scene.report();
        }
    }

    if let Some(y) = scene.lowest_tracked() {
        log::info!("lowest tracked node at y={y:.1}");
    }
    if let Some(depth) = scene.depth_below(DVec2::new(400.0, 0.0), 1000.0) {
        log::info!("first shape below (400, 0) at depth {depth:.1}");
    }
    Ok(())
}
