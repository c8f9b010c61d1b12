//! Viewer configuration.
//!
//! Everything the viewer page used to hard-code (camera placement, control limits,
//! environment effects, the model/motion/pose catalog) lives in
//! [`ViewerConfig`]. The defaults reproduce that page; a `viewer.json` under
//! `assets/` can override any part of it.

use cgmath::{Point3, Rad, Vector3};
use serde::{Deserialize, Serialize};

use crate::{
    error::{Result, ViewerError},
    resources::load_string,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// DOM id of the canvas the renderer draws into.
    pub canvas_id: String,
    /// Id of the element the renderer statistics are written to, if present.
    pub info_pane_id: String,
    pub camera: CameraConfig,
    /// Scene background colour as `0xRRGGBB`.
    pub background: u32,
    pub controls: ControlsConfig,
    pub animation: AnimationConfig,
    pub light: LightConfig,
    pub sky: SkyConfig,
    pub ocean: OceanConfig,
    pub catalog: Catalog,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            canvas_id: "cv".to_string(),
            info_pane_id: "render-info".to_string(),
            camera: CameraConfig::default(),
            background: 0xaaaaaa,
            controls: ControlsConfig::default(),
            animation: AnimationConfig::default(),
            light: LightConfig::default(),
            sky: SkyConfig::default(),
            ocean: OceanConfig::default(),
            catalog: Catalog::default(),
        }
    }
}

impl ViewerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.canvas_id.is_empty() {
            return Err(ViewerError::Config("canvas id is empty".to_string()));
        }
        if self.camera.near <= 0.0 || self.camera.far <= self.camera.near {
            return Err(ViewerError::Config(format!(
                "camera clipping planes {}..{} are invalid",
                self.camera.near, self.camera.far
            )));
        }
        if self.controls.min_distance > self.controls.max_distance {
            return Err(ViewerError::Config(
                "controls min distance exceeds max distance".to_string(),
            ));
        }
        self.catalog.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Vertical field of view in degrees.
    pub fov: f64,
    /// Initial aspect; replaced by the canvas aspect on the first frame.
    pub aspect: f64,
    pub near: f64,
    pub far: f64,
    pub position: Point3<f64>,
    pub up: Vector3<f64>,
    pub look_at: Point3<f64>,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov: 40.0,
            aspect: 4.0 / 3.0,
            near: 0.1,
            far: 2000.0,
            position: Point3::new(0.0, 10.0, 50.0),
            up: Vector3::new(0.0, 0.0, 1.0),
            look_at: Point3::new(0.0, 0.0, 0.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlsConfig {
    pub target: Point3<f64>,
    pub enable_pan: bool,
    pub min_distance: f64,
    pub max_distance: f64,
    pub max_polar_angle: Rad<f64>,
}

impl Default for ControlsConfig {
    fn default() -> Self {
        Self {
            target: Point3::new(0.0, 15.0, 0.0),
            enable_pan: false,
            min_distance: 15.0,
            max_distance: 60.0,
            max_polar_angle: Rad(std::f64::consts::PI * 0.6),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationConfig {
    /// Extra seconds the helper keeps simulating after a clip ended.
    pub afterglow: f64,
    pub physics: bool,
    /// Whether VPD files are UTF-8 instead of Shift_JIS.
    pub unicode_poses: bool,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            afterglow: 2.0,
            physics: true,
            unicode_poses: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightConfig {
    pub sky_color: u32,
    pub ground_color: u32,
    pub intensity: f64,
}

impl Default for LightConfig {
    fn default() -> Self {
        Self {
            sky_color: 0xffffff,
            ground_color: 0xb97a20,
            intensity: 4.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkyConfig {
    pub enabled: bool,
    pub scale: f64,
    pub turbidity: f64,
    pub rayleigh: f64,
    pub mie_coefficient: f64,
    pub mie_directional_g: f64,
    pub inclination: f64,
    pub azimuth: f64,
}

impl Default for SkyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            scale: 1000.0,
            turbidity: 12.7,
            rayleigh: 0.1,
            mie_coefficient: 0.0,
            mie_directional_g: 0.3,
            inclination: 0.0,
            azimuth: 0.2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OceanConfig {
    pub enabled: bool,
    pub width: f64,
    pub height: f64,
    pub texture_size: u32,
    pub normal_texture: String,
    pub alpha: f64,
    pub distortion_scale: f64,
    pub sun_color: u32,
    pub water_color: u32,
    /// Height of the water plane.
    pub level: f64,
    pub wave_size: f64,
}

impl Default for OceanConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            width: 1000.0,
            height: 1000.0,
            texture_size: 512,
            normal_texture: "./assets/threejs/ex/textures/water/Water_1_M_Normal.jpg".to_string(),
            alpha: 1.0,
            distortion_scale: 3.7,
            sun_color: 0xffffff,
            water_color: 0x001e0f,
            level: 1.0,
            wave_size: 1.0,
        }
    }
}

/// A named asset file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub name: String,
    pub url: String,
}

impl Asset {
    fn new(name: &str, url: &str) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
        }
    }
}

/// Models, motions and poses the viewer can show.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Catalog {
    pub models: Vec<Asset>,
    pub motions: Vec<Asset>,
    /// VPD files applied in the pose stage of every reload.
    pub poses: Vec<String>,
    pub default_model: String,
    pub default_motion: String,
}

impl Default for Catalog {
    fn default() -> Self {
        Self {
            models: vec![
                Asset::new("diluc", "./assets/models/mmd/diluc/diluc.pmx"),
                Asset::new("lisa", "./assets/models/mmd/lisa/lisa.pmx"),
                Asset::new("miku", "./assets/models/mmd/miku/miku_v2.pmd"),
            ],
            motions: vec![
                Asset::new("dance1", "./assets/models/mmd/vmds/wavefile_v2.vmd"),
                Asset::new(
                    "dance2",
                    "./assets/models/mmd/vmds/ハッピーシンセサイザモーション.vmd",
                ),
                Asset::new("dance3", "./assets/models/mmd/vmds/wavefile_v2.vmd"),
            ],
            poses: (1..=5)
                .map(|i| format!("./assets/models/mmd/vpds/{:02}.vpd", i))
                .collect(),
            default_model: "diluc".to_string(),
            default_motion: "dance1".to_string(),
        }
    }
}

impl Catalog {
    pub fn model(&self, name: &str) -> Result<&Asset> {
        find(&self.models, "model", name)
    }

    pub fn motion(&self, name: &str) -> Result<&Asset> {
        find(&self.motions, "motion", name)
    }

    pub fn validate(&self) -> Result<()> {
        if self.models.is_empty() {
            return Err(ViewerError::Config("catalog has no models".to_string()));
        }
        for (kind, assets) in [("model", &self.models), ("motion", &self.motions)] {
            for (i, asset) in assets.iter().enumerate() {
                if assets[..i].iter().any(|other| other.name == asset.name) {
                    return Err(ViewerError::Config(format!(
                        "duplicate {} name '{}'",
                        kind, asset.name
                    )));
                }
            }
        }
        self.model(&self.default_model)?;
        if !self.motions.is_empty() {
            self.motion(&self.default_motion)?;
        }
        Ok(())
    }
}

fn find<'a>(assets: &'a [Asset], kind: &'static str, name: &str) -> Result<&'a Asset> {
    assets
        .iter()
        .find(|asset| asset.name == name)
        .ok_or_else(|| ViewerError::UnknownAsset {
            kind,
            name: name.to_string(),
        })
}

/// Load and validate a configuration file from the asset directory.
pub async fn load_config(file_name: &str) -> anyhow::Result<ViewerConfig> {
    let txt = load_string(file_name).await?;
    let config: ViewerConfig = serde_json::from_str(&txt)?;
    config.validate()?;
    Ok(config)
}

/// Like [`load_config`], but falls back to [`ViewerConfig::default`].
pub async fn load_config_or_default(file_name: &str) -> ViewerConfig {
    match load_config(file_name).await {
        Ok(config) => config,
        Err(e) => {
            log::warn!(
                "Could not load {}, using the built-in configuration: {}",
                file_name,
                e
            );
            ViewerConfig::default()
        }
    }
}
