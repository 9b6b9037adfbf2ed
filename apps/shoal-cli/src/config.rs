use std::path::Path;

use anyhow::Context as _;
use glam::Vec3;
use serde::{Deserialize, Serialize};
use shoal_behavior::FishParams;
use shoal_scene::Camera;

/// Everything a run needs. Missing keys in the YAML fall back to these defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AquariumConfig {
    /// Template name the fish are cloned from.
    pub template: String,
    /// `builtin:fish` or a path to a JSON model file.
    pub model: String,
    pub fish_count: usize,
    /// Fish `i` uses `seed + i`.
    pub seed: u64,
    pub fps: u32,
    /// Stop after this many frames; runs until interrupted when absent.
    pub frames: Option<u64>,
    pub viewport: [u32; 2],
    pub show_grid: bool,
    pub camera: CameraConfig,
    pub fish: FishParams,
}

impl Default for AquariumConfig {
    fn default() -> Self {
        Self {
            template: "fish1".into(),
            model: "builtin:fish".into(),
            fish_count: 1,
            seed: 42,
            fps: 60,
            frames: None,
            viewport: [1280, 720],
            show_grid: true,
            camera: CameraConfig::default(),
            fish: FishParams::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub position: Vec3,
    pub target: Vec3,
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        let camera = Camera::default();
        Self {
            position: camera.position,
            target: camera.target,
            fov_degrees: camera.fov_degrees,
            near: camera.near,
            far: camera.far,
        }
    }
}

impl AquariumConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("opening config {}", path.display()))?;
        let config: Self = serde_yaml::from_reader(file)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config
            .fish
            .validate()
            .with_context(|| format!("fish parameters in {}", path.display()))?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> anyhow::Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn camera(&self) -> Camera {
        let mut camera = Camera {
            position: self.camera.position,
            target: self.camera.target,
            fov_degrees: self.camera.fov_degrees,
            near: self.camera.near,
            far: self.camera.far,
            ..Camera::default()
        };
        camera.set_viewport(self.viewport[0], self.viewport[1]);
        camera
    }
}
