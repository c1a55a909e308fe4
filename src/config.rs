//! Configuration loader - YAML tunables + .env settings

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::animation::AnimationConfig;
use crate::camera::CameraConfig;
use crate::layout::LayoutConfig;
use crate::picking::PickingConfig;

/// Scene tunables loaded from skyline.yaml
///
/// Every section and field is optional; missing values take defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub layout: LayoutConfig,
    pub camera: CameraConfig,
    pub picking: PickingConfig,
    pub animation: AnimationConfig,
}

/// Settings loaded from .env
#[derive(Debug, Clone)]
pub struct Settings {
    pub snapshot_path: PathBuf,
    pub log_dir: String,
}

impl Config {
    /// Load configuration from YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config.normalized())
    }

    /// Repair out-of-range tunables in every section
    pub fn normalized(self) -> Self {
        let mut picking = self.picking;
        if !picking.drag_threshold.is_finite() || picking.drag_threshold < 0.0 {
            picking.drag_threshold = PickingConfig::default().drag_threshold;
        }
        Self {
            layout: self.layout.normalized(),
            camera: self.camera.normalized(),
            picking,
            animation: self.animation.normalized(),
        }
    }
}

impl Settings {
    /// Load settings from .env file and environment
    pub fn load() -> Self {
        dotenvy::dotenv().ok();

        Settings {
            snapshot_path: std::env::var("SKYLINE_SNAPSHOT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("data/entities.json")),
            log_dir: std::env::var("SKYLINE_LOG_DIR").unwrap_or_else(|_| "logs".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_empty_file_gives_defaults() {
        let file = write_config("");
        assert_eq!(Config::load(file.path()).unwrap(), Config::default());
    }

    #[test]
    fn test_partial_override() {
        let file = write_config(
            "layout:\n  ring_radius: 50.0\n  max_height: 25.0\npicking:\n  drag_threshold: 6\n",
        );
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.layout.ring_radius, 50.0);
        assert_eq!(config.layout.max_height, 25.0);
        assert_eq!(config.layout.columns, LayoutConfig::default().columns);
        assert_eq!(config.picking.drag_threshold, 6.0);
        assert_eq!(config.camera, CameraConfig::default());
    }

    #[test]
    fn test_load_normalizes() {
        let file = write_config("camera:\n  min_radius: 90\n  max_radius: 10\npicking:\n  drag_threshold: -3\n");
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.camera.min_radius, 10.0);
        assert_eq!(config.camera.max_radius, 90.0);
        assert_eq!(config.picking.drag_threshold, 4.0);
    }

    #[test]
    fn test_yaml_infinities_and_nan_are_repaired() {
        let file = write_config(
            "camera:\n  key_yaw_step: .inf\n  zoom_sensitivity: .nan\nanimation:\n  spin_speed: .nan\n  highlight_scale: -.inf\n",
        );
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.camera.key_yaw_step, CameraConfig::default().key_yaw_step);
        assert_eq!(config.camera.zoom_sensitivity, CameraConfig::default().zoom_sensitivity);
        assert_eq!(config.animation.spin_speed, AnimationConfig::default().spin_speed);
        assert_eq!(config.animation.highlight_scale, AnimationConfig::default().highlight_scale);
    }

    #[test]
    fn test_missing_file_is_error() {
        assert!(Config::load("/definitely/not/here.yaml").is_err());
    }

    #[test]
    fn test_malformed_yaml_is_error() {
        let file = write_config("layout: [1, 2");
        assert!(Config::load(file.path()).is_err());
    }
}
