use std::path::PathBuf;

use engine::{
    Camera, CaptureRequest, FoldParams, FractalOptions, FractalParams, FractalTag,
    MandelboxParams, MandelbulbParams, MaterialOptions, NavigationOptions, RenderMode,
    RendererOptions, SceneOptions,
};
use glam::Vec3;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialise configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// A saved viewer scene: camera, every option group, and capture defaults.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SceneConfig {
    pub version: u32,
    #[serde(default)]
    pub mode: RenderMode,
    #[serde(default)]
    pub camera: CameraSection,
    #[serde(default)]
    pub renderer: RendererOptions,
    #[serde(default)]
    pub fractal: FractalSection,
    #[serde(default)]
    pub look: FractalOptions,
    #[serde(default)]
    pub material: MaterialOptions,
    #[serde(default)]
    pub navigation: NavigationOptions,
    #[serde(default)]
    pub capture: CaptureSection,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CameraSection {
    pub origin: Vec3,
    pub direction: Vec3,
    pub vfov: f32,
    pub defocus_angle: f32,
    pub focus_distance: f32,
}

impl Default for CameraSection {
    fn default() -> Self {
        Self::from(&Camera::default())
    }
}

impl From<&Camera> for CameraSection {
    fn from(camera: &Camera) -> Self {
        Self {
            origin: camera.origin(),
            direction: camera.direction(),
            vfov: camera.vfov(),
            defocus_angle: camera.defocus_angle(),
            focus_distance: camera.focus_distance(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct FractalSection {
    #[serde(default)]
    pub kind: FractalTag,
    #[serde(default)]
    pub mandelbulb: MandelbulbParams,
    #[serde(default)]
    pub mandelbox: MandelboxParams,
    #[serde(default = "default_sierpinski")]
    pub sierpinski: FoldParams,
    #[serde(default = "default_menger")]
    pub menger: FoldParams,
}

impl Default for FractalSection {
    fn default() -> Self {
        Self::from(&FractalParams::default())
    }
}

impl From<&FractalParams> for FractalSection {
    fn from(params: &FractalParams) -> Self {
        Self {
            kind: params.active,
            mandelbulb: params.mandelbulb,
            mandelbox: params.mandelbox,
            sierpinski: params.sierpinski,
            menger: params.menger,
        }
    }
}

impl From<FractalSection> for FractalParams {
    fn from(section: FractalSection) -> Self {
        Self {
            active: section.kind,
            mandelbulb: section.mandelbulb,
            mandelbox: section.mandelbox,
            sierpinski: section.sierpinski,
            menger: section.menger,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CaptureSection {
    pub path: PathBuf,
    pub frames: u32,
    pub samples: u32,
    pub speed: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<Vec3>,
}

impl Default for CaptureSection {
    fn default() -> Self {
        Self::from(&CaptureRequest::default())
    }
}

impl From<&CaptureRequest> for CaptureSection {
    fn from(request: &CaptureRequest) -> Self {
        Self {
            path: request.path.clone(),
            frames: request.frames,
            samples: request.samples,
            speed: request.speed,
            direction: request.direction,
        }
    }
}

fn default_sierpinski() -> FoldParams {
    FoldParams::SIERPINSKI
}

fn default_menger() -> FoldParams {
    FoldParams::MENGER
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self::from_parts(
            &Camera::default(),
            &SceneOptions::default(),
            &NavigationOptions::default(),
            &CaptureRequest::default(),
        )
    }
}

impl SceneConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: SceneConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Snapshot of a running viewer, suitable for writing back to disk.
    pub fn from_parts(
        camera: &Camera,
        options: &SceneOptions,
        navigation: &NavigationOptions,
        capture: &CaptureRequest,
    ) -> Self {
        Self {
            version: 1,
            mode: options.mode,
            camera: CameraSection::from(camera),
            renderer: options.renderer,
            fractal: FractalSection::from(&options.fractal),
            look: options.look,
            material: options.material,
            navigation: *navigation,
            capture: CaptureSection::from(capture),
        }
    }

    pub fn scene_options(&self) -> SceneOptions {
        SceneOptions {
            renderer: self.renderer,
            fractal: self.fractal.into(),
            look: self.look,
            material: self.material,
            mode: self.mode,
        }
    }

    pub fn camera(&self) -> Result<Camera, ConfigError> {
        let section = &self.camera;
        Camera::new(
            section.origin,
            section.direction,
            section.vfov,
            section.defocus_angle,
            section.focus_distance,
        )
        .map_err(|err| ConfigError::Invalid(format!("camera: {err}")))
    }

    pub fn navigation(&self) -> NavigationOptions {
        self.navigation
    }

    pub fn capture_request(&self) -> CaptureRequest {
        CaptureRequest {
            path: self.capture.path.clone(),
            frames: self.capture.frames,
            samples: self.capture.samples,
            direction: self.capture.direction,
            speed: self.capture.speed,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != 1 {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected 1",
                self.version
            )));
        }

        self.validate_camera()?;
        self.validate_renderer()?;
        self.validate_fractal()?;

        let material = &self.material;
        if !(material.roughness.is_finite() && material.refraction_ratio > 0.0) {
            return Err(ConfigError::Invalid(
                "material.refraction_ratio must be > 0 and roughness finite".into(),
            ));
        }

        let navigation = &self.navigation;
        if !(navigation.move_speed >= 0.0 && navigation.move_speed.is_finite()) {
            return Err(ConfigError::Invalid(
                "navigation.move_speed must be >= 0".into(),
            ));
        }
        if !(navigation.turn_speed >= 0.0 && navigation.turn_speed.is_finite()) {
            return Err(ConfigError::Invalid(
                "navigation.turn_speed must be >= 0".into(),
            ));
        }
        if !(navigation.focus_scale > 0.0 && navigation.focus_scale.is_finite()) {
            return Err(ConfigError::Invalid(
                "navigation.focus_scale must be > 0".into(),
            ));
        }

        let capture = &self.capture;
        if capture.frames == 0 || capture.samples == 0 {
            return Err(ConfigError::Invalid(
                "capture.frames and capture.samples must be at least 1".into(),
            ));
        }
        if !capture.speed.is_finite() {
            return Err(ConfigError::Invalid("capture.speed must be finite".into()));
        }
        if capture.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("capture.path may not be empty".into()));
        }

        Ok(())
    }

    fn validate_camera(&self) -> Result<(), ConfigError> {
        let camera = &self.camera;
        if !camera.origin.is_finite() {
            return Err(ConfigError::Invalid("camera.origin must be finite".into()));
        }
        if !camera.direction.is_finite() || camera.direction.length_squared() == 0.0 {
            return Err(ConfigError::Invalid(
                "camera.direction must be a finite, non-zero vector".into(),
            ));
        }
        if !(camera.vfov > 0.0 && camera.vfov < 180.0) {
            return Err(ConfigError::Invalid(format!(
                "camera.vfov must be between 0 and 180 degrees (got {})",
                camera.vfov
            )));
        }
        if !(camera.defocus_angle >= 0.0 && camera.defocus_angle.is_finite()) {
            return Err(ConfigError::Invalid(
                "camera.defocus_angle must be >= 0".into(),
            ));
        }
        if !(camera.focus_distance > 0.0 && camera.focus_distance.is_finite()) {
            return Err(ConfigError::Invalid(
                "camera.focus_distance must be > 0".into(),
            ));
        }
        Ok(())
    }

    fn validate_renderer(&self) -> Result<(), ConfigError> {
        let renderer = &self.renderer;
        if renderer.max_iterations == 0 {
            return Err(ConfigError::Invalid(
                "renderer.max_iterations must be at least 1".into(),
            ));
        }
        if !(renderer.min_dist > 0.0) {
            return Err(ConfigError::Invalid("renderer.min_dist must be > 0".into()));
        }
        if !(renderer.max_dist > renderer.min_dist && renderer.max_dist.is_finite()) {
            return Err(ConfigError::Invalid(
                "renderer.max_dist must be finite and greater than min_dist".into(),
            ));
        }
        if !(renderer.fog_dist > 0.0) {
            return Err(ConfigError::Invalid("renderer.fog_dist must be > 0".into()));
        }
        Ok(())
    }

    fn validate_fractal(&self) -> Result<(), ConfigError> {
        let fractal = &self.fractal;
        if !fractal.mandelbulb.power.is_finite() {
            return Err(ConfigError::Invalid(
                "fractal.mandelbulb.power must be finite".into(),
            ));
        }
        let scales = [
            ("mandelbox", fractal.mandelbox.scale),
            ("sierpinski", fractal.sierpinski.scale),
            ("menger", fractal.menger.scale),
        ];
        for (name, scale) in scales {
            if scale == 0.0 || !scale.is_finite() {
                return Err(ConfigError::Invalid(format!(
                    "fractal.{name}.scale must be finite and non-zero"
                )));
            }
        }
        let mandelbox = &fractal.mandelbox;
        if !(mandelbox.min_radius2 > 0.0 && mandelbox.fixed_radius2 >= mandelbox.min_radius2) {
            return Err(ConfigError::Invalid(
                "fractal.mandelbox radii must satisfy 0 < min_radius2 <= fixed_radius2".into(),
            ));
        }
        Ok(())
    }
}
