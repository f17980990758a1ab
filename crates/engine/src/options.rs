//! Runtime option groups shared by the host loop and the device.
//!
//! Each group is plain data compared by value; a difference between the
//! options of two consecutive frames is what restarts accumulation.

use std::fmt;
use std::str::FromStr;

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Marching and bounce limits shared by every fractal and render mode.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererOptions {
    pub max_iterations: u32,
    pub max_bounce: u32,
    pub min_dist: f32,
    pub max_dist: f32,
    pub fog_dist: f32,
    pub bounce_black: bool,
}

impl Default for RendererOptions {
    fn default() -> Self {
        Self {
            max_iterations: 128,
            max_bounce: 4,
            min_dist: 1e-4,
            max_dist: 20.0,
            fog_dist: 12.0,
            bounce_black: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MandelbulbParams {
    pub power: f32,
}

impl Default for MandelbulbParams {
    fn default() -> Self {
        Self { power: 8.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MandelboxParams {
    pub fixed_radius2: f32,
    pub min_radius2: f32,
    pub folding_limit: f32,
    pub scale: f32,
}

impl Default for MandelboxParams {
    fn default() -> Self {
        Self {
            fixed_radius2: 1.0,
            min_radius2: 0.25,
            folding_limit: 1.0,
            scale: 2.0,
        }
    }
}

/// Parameters of the fold-and-scale iterated function systems.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FoldParams {
    pub scale: f32,
    pub center: Vec3,
}

impl FoldParams {
    pub const SIERPINSKI: Self = Self {
        scale: 2.0,
        center: Vec3::ONE,
    };
    pub const MENGER: Self = Self {
        scale: 3.0,
        center: Vec3::ONE,
    };
}

impl Default for FoldParams {
    fn default() -> Self {
        Self::SIERPINSKI
    }
}

/// The active fractal together with its own parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FractalKind {
    Mandelbulb(MandelbulbParams),
    Mandelbox(MandelboxParams),
    Sierpinski(FoldParams),
    Menger(FoldParams),
}

impl FractalKind {
    pub fn tag(&self) -> FractalTag {
        match self {
            Self::Mandelbulb(_) => FractalTag::Mandelbulb,
            Self::Mandelbox(_) => FractalTag::Mandelbox,
            Self::Sierpinski(_) => FractalTag::Sierpinski,
            Self::Menger(_) => FractalTag::Menger,
        }
    }
}

/// Parameterless discriminant of [`FractalKind`], used by the CLI and config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FractalTag {
    #[default]
    Mandelbulb,
    Mandelbox,
    Sierpinski,
    Menger,
}

impl FractalTag {
    pub const ALL: [FractalTag; 4] = [
        FractalTag::Mandelbulb,
        FractalTag::Mandelbox,
        FractalTag::Sierpinski,
        FractalTag::Menger,
    ];

    pub fn next(self) -> Self {
        let index = Self::ALL.iter().position(|tag| *tag == self).unwrap_or(0);
        Self::ALL[(index + 1) % Self::ALL.len()]
    }
}

impl fmt::Display for FractalTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FractalTag::Mandelbulb => "mandelbulb",
            FractalTag::Mandelbox => "mandelbox",
            FractalTag::Sierpinski => "sierpinski",
            FractalTag::Menger => "menger",
        };
        f.write_str(name)
    }
}

impl FromStr for FractalTag {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mandelbulb" | "bulb" => Ok(Self::Mandelbulb),
            "mandelbox" | "box" => Ok(Self::Mandelbox),
            "sierpinski" | "tetra" => Ok(Self::Sierpinski),
            "menger" | "sponge" => Ok(Self::Menger),
            other => Err(format!(
                "unknown fractal '{other}'; expected mandelbulb, mandelbox, sierpinski, or menger"
            )),
        }
    }
}

/// Every kind's parameters side by side, plus which one is active.
///
/// Keeping all four sets lets the viewer switch back and forth without
/// losing tweaks made to the inactive kinds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FractalParams {
    pub active: FractalTag,
    pub mandelbulb: MandelbulbParams,
    pub mandelbox: MandelboxParams,
    pub sierpinski: FoldParams,
    pub menger: FoldParams,
}

impl Default for FractalParams {
    fn default() -> Self {
        Self {
            active: FractalTag::default(),
            mandelbulb: MandelbulbParams::default(),
            mandelbox: MandelboxParams::default(),
            sierpinski: FoldParams::SIERPINSKI,
            menger: FoldParams::MENGER,
        }
    }
}

impl FractalParams {
    pub fn kind(&self) -> FractalKind {
        match self.active {
            FractalTag::Mandelbulb => FractalKind::Mandelbulb(self.mandelbulb),
            FractalTag::Mandelbox => FractalKind::Mandelbox(self.mandelbox),
            FractalTag::Sierpinski => FractalKind::Sierpinski(self.sierpinski),
            FractalTag::Menger => FractalKind::Menger(self.menger),
        }
    }

    /// Activates `tag` and restores that kind's parameters to their defaults.
    pub fn select(&mut self, tag: FractalTag) {
        self.active = tag;
        match tag {
            FractalTag::Mandelbulb => self.mandelbulb = MandelbulbParams::default(),
            FractalTag::Mandelbox => self.mandelbox = MandelboxParams::default(),
            FractalTag::Sierpinski => self.sierpinski = FoldParams::SIERPINSKI,
            FractalTag::Menger => self.menger = FoldParams::MENGER,
        }
    }

    /// Stores `kind`'s parameters and makes it active.
    pub fn set_kind(&mut self, kind: FractalKind) {
        self.active = kind.tag();
        match kind {
            FractalKind::Mandelbulb(params) => self.mandelbulb = params,
            FractalKind::Mandelbox(params) => self.mandelbox = params,
            FractalKind::Sierpinski(params) => self.sierpinski = params,
            FractalKind::Menger(params) => self.menger = params,
        }
    }
}

/// Colouring and placement shared by every fractal kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FractalOptions {
    pub color: Vec3,
    pub frequency: f32,
    pub shift: f32,
    /// Rotation about Y, in degrees.
    pub angle_a: f32,
    /// Rotation about X, in degrees.
    pub angle_b: f32,
    pub ground: bool,
}

impl Default for FractalOptions {
    fn default() -> Self {
        Self {
            color: Vec3::new(0.9, 0.75, 0.6),
            frequency: 3.0,
            shift: 0.0,
            angle_a: 0.0,
            angle_b: 0.0,
            ground: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RenderMode {
    PathTracing,
    #[default]
    DirectLighting,
    Preview,
}

impl RenderMode {
    pub fn next(self) -> Self {
        match self {
            Self::PathTracing => Self::DirectLighting,
            Self::DirectLighting => Self::Preview,
            Self::Preview => Self::PathTracing,
        }
    }
}

impl FromStr for RenderMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "path-tracing" | "pathtracing" | "path" => Ok(Self::PathTracing),
            "direct-lighting" | "direct" | "blinn-phong" | "phong" => Ok(Self::DirectLighting),
            "preview" => Ok(Self::Preview),
            other => Err(format!(
                "unknown render mode '{other}'; expected path-tracing, direct-lighting, or preview"
            )),
        }
    }
}

/// Surface response used by the path tracer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MaterialKind {
    Lambertian,
    Metal { roughness: f32 },
    Dielectric { refraction_ratio: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MaterialTag {
    #[default]
    Lambertian,
    Metal,
    Dielectric,
}

impl MaterialTag {
    pub fn next(self) -> Self {
        match self {
            Self::Lambertian => Self::Metal,
            Self::Metal => Self::Dielectric,
            Self::Dielectric => Self::Lambertian,
        }
    }
}

impl FromStr for MaterialTag {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "lambertian" | "diffuse" => Ok(Self::Lambertian),
            "metal" => Ok(Self::Metal),
            "dielectric" | "glass" => Ok(Self::Dielectric),
            other => Err(format!(
                "unknown material '{other}'; expected lambertian, metal, or dielectric"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterialOptions {
    pub kind: MaterialTag,
    pub roughness: f32,
    pub refraction_ratio: f32,
}

impl Default for MaterialOptions {
    fn default() -> Self {
        Self {
            kind: MaterialTag::default(),
            roughness: 0.1,
            refraction_ratio: 1.5,
        }
    }
}

impl MaterialOptions {
    pub fn material(&self) -> MaterialKind {
        match self.kind {
            MaterialTag::Lambertian => MaterialKind::Lambertian,
            MaterialTag::Metal => MaterialKind::Metal {
                roughness: self.roughness.clamp(0.0, 1.0),
            },
            MaterialTag::Dielectric => MaterialKind::Dielectric {
                refraction_ratio: self.refraction_ratio.max(1e-3),
            },
        }
    }
}

/// Host-side navigation settings; these never reach the device.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationOptions {
    pub auto_speed: bool,
    pub auto_focus: bool,
    /// Focus distance as a multiple of the feedback distance.
    pub focus_scale: f32,
    /// Units per second before feedback scaling.
    pub move_speed: f32,
    /// Radians per second.
    pub turn_speed: f32,
}

impl Default for NavigationOptions {
    fn default() -> Self {
        Self {
            auto_speed: true,
            auto_focus: false,
            focus_scale: 1.0,
            move_speed: 3.0,
            turn_speed: 2.0,
        }
    }
}

/// Everything the device needs besides the camera.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneOptions {
    pub renderer: RendererOptions,
    pub fractal: FractalParams,
    pub look: FractalOptions,
    pub material: MaterialOptions,
    pub mode: RenderMode,
}
