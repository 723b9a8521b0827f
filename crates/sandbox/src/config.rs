//! Scene configuration. Loaded from scene.ron at startup.

use glam::DVec2;
use physics::{BodyConfig, BodyKindConfig, ComponentConfig, SpaceConfig};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Settings for a sandbox run. Loaded from `scene.ron` in the current directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneConfig {
    /// Settings of the default space.
    #[serde(default = "default_space")]
    pub space: SpaceConfig,
    /// Fixed simulation rate in Hz.
    #[serde(default = "default_fixed_rate")]
    pub fixed_rate: f64,
    /// Frames to run before exiting.
    #[serde(default = "default_frames")]
    pub frames: u32,
    /// Seed for the scattered boxes.
    #[serde(default)]
    pub seed: u64,
    /// Hand-placed objects, usually the level geometry.
    #[serde(default = "default_objects")]
    pub objects: Vec<ObjectConfig>,
    #[serde(default = "default_scatter")]
    pub scatter: Option<ScatterConfig>,
    #[serde(default = "default_true")]
    pub pendulum: bool,
    #[serde(default = "default_true")]
    pub car: bool,
    /// Collect the debug overlay while running.
    #[serde(default = "default_true")]
    pub debug_draw: bool,
}

/// One scene node with a physics component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectConfig {
    pub name: String,
    /// World position of the middle of the node; also its anchor.
    pub position: DVec2,
    #[serde(default)]
    pub rotation: f64,
    /// Bounds of the node; body and shape sizes default to these.
    pub size: DVec2,
    #[serde(default)]
    pub physics: ComponentConfig,
}

/// Randomly placed boxes dropped into the scene.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScatterConfig {
    pub count: usize,
    /// Top-left corner of the drop area.
    pub origin: DVec2,
    pub extent: DVec2,
    #[serde(default = "default_min_size")]
    pub min_size: f64,
    #[serde(default = "default_max_size")]
    pub max_size: f64,
}

fn default_space() -> SpaceConfig {
    SpaceConfig {
        gravity: DVec2::new(0.0, 400.0),
        ..Default::default()
    }
}
fn default_fixed_rate() -> f64 {
    60.0
}
fn default_frames() -> u32 {
    600
}
fn default_true() -> bool {
    true
}
fn default_min_size() -> f64 {
    10.0
}
fn default_max_size() -> f64 {
    30.0
}

fn static_object(name: &str, position: DVec2, rotation: f64, size: DVec2) -> ObjectConfig {
    ObjectConfig {
        name: name.to_string(),
        position,
        rotation,
        size,
        physics: ComponentConfig {
            body: BodyConfig {
                kind: BodyKindConfig::Static,
                ..Default::default()
            },
            ..Default::default()
        },
    }
}

fn default_objects() -> Vec<ObjectConfig> {
    vec![
        static_object("floor", DVec2::new(400.0, 600.0), 0.0, DVec2::new(800.0, 40.0)),
        static_object("ramp", DVec2::new(150.0, 450.0), 0.35, DVec2::new(260.0, 12.0)),
    ]
}

fn default_scatter() -> Option<ScatterConfig> {
    Some(ScatterConfig {
        count: 24,
        origin: DVec2::new(300.0, 50.0),
        extent: DVec2::new(300.0, 200.0),
        min_size: default_min_size(),
        max_size: default_max_size(),
    })
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            space: default_space(),
            fixed_rate: default_fixed_rate(),
            frames: default_frames(),
            seed: 0,
            objects: default_objects(),
            scatter: default_scatter(),
            pendulum: true,
            car: true,
            debug_draw: true,
        }
    }
}

impl SceneConfig {
    /// Load config from `scene.ron`. If the file is missing or invalid, returns default config.
    pub fn load() -> Self {
        let path = config_path();
        if let Ok(data) = std::fs::read_to_string(&path) {
            match ron::from_str::<Self>(&data) {
                Ok(c) => return c.validated(),
                Err(e) => log::warn!("Invalid scene config at {:?}: {}, using defaults", path, e),
            }
        }
        Self::default()
    }

    /// Replace values the run loop can't use with their defaults.
    pub fn validated(mut self) -> Self {
        if !(self.fixed_rate > 0.0 && self.fixed_rate.is_finite()) {
            log::warn!("Invalid fixed_rate {} in scene config, using {}", self.fixed_rate, default_fixed_rate());
            self.fixed_rate = default_fixed_rate();
        }
        self
    }

    /// Save current config to `scene.ron`. Logs on error.
    pub fn save(&self) {
        let path = config_path();
        if let Ok(s) = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default()) {
            if let Err(e) = std::fs::write(&path, s) {
                log::warn!("Could not write scene config to {:?}: {}", path, e);
            }
        }
    }
}

pub fn config_path() -> PathBuf {
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join("scene.ron")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_use_defaults() {
        let config: SceneConfig = ron::from_str("(frames: 10, car: false)").unwrap();
        assert_eq!(config.frames, 10);
        assert!(!config.car);
        assert!(config.pendulum);
        assert_eq!(config.space.gravity, DVec2::new(0.0, 400.0));
        assert_eq!(config.objects.len(), 2);
    }

    #[test]
    fn objects_parse_component_configs() {
        let config: SceneConfig = ron::from_str(
            "(objects: [(name: \"ball\", position: (10.0, 20.0), size: (8.0, 8.0), \
             physics: (body: (kind: Circle(radius: None), mass: Some(2.0))))], scatter: None)",
        )
        .unwrap();
        assert!(config.scatter.is_none());
        let ball = &config.objects[0];
        assert_eq!(ball.rotation, 0.0);
        assert_eq!(ball.physics.body.mass, Some(2.0));
        assert!(matches!(ball.physics.body.kind, BodyKindConfig::Circle { radius: None, .. }));
    }

    #[test]
    fn unusable_fixed_rate_falls_back() {
        for text in ["(fixed_rate: 0.0)", "(fixed_rate: -60.0)"] {
            let config: SceneConfig = ron::from_str(text).unwrap();
            assert_eq!(config.validated().fixed_rate, 60.0, "{text}");
        }
        let config: SceneConfig = ron::from_str("(fixed_rate: 120.0)").unwrap();
        assert_eq!(config.validated().fixed_rate, 120.0);
    }

    #[test]
    fn pretty_output_reads_back() {
        let config = SceneConfig::default();
        let text = ron::ser::to_string_pretty(&config, ron::ser::PrettyConfig::default()).unwrap();
        let back: SceneConfig = ron::from_str(&text).unwrap();
        assert_eq!(back.objects.len(), config.objects.len());
        assert_eq!(back.space, config.space);
    }
}
