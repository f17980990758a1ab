use std::path::PathBuf;

use clap::{Parser, Subcommand};
use engine::{FractalTag, MaterialTag, RenderMode};
use glam::Vec3;

#[derive(Parser, Debug)]
#[command(
    name = "fractalview",
    author,
    version,
    about = "Interactive distance-field fractal viewer",
    arg_required_else_help = false
)]
pub struct Cli {
    #[command(flatten)]
    pub run: RunArgs,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Parser, Debug, Default)]
pub struct RunArgs {
    /// Scene TOML to load instead of `<config dir>/scene.toml`.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Window (or headless output) resolution, e.g. `1280x720`.
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_size)]
    pub size: Option<(u32, u32)>,

    /// Fraction of the window resolution evaluated per frame (windowed only).
    #[arg(long, value_name = "SCALE", value_parser = parse_render_scale)]
    pub render_scale: Option<f32>,

    /// Fractal to show: `mandelbulb`, `mandelbox`, `sierpinski`, or `menger`.
    #[arg(long, value_name = "KIND", value_parser = parse_fractal)]
    pub fractal: Option<FractalTag>,

    /// Shading mode: `path-tracing`, `direct-lighting`, or `preview`.
    #[arg(long, value_name = "MODE", value_parser = parse_mode)]
    pub mode: Option<RenderMode>,

    /// Path-tracing material: `lambertian`, `metal`, or `dielectric`.
    #[arg(long, value_name = "MATERIAL", value_parser = parse_material)]
    pub material: Option<MaterialTag>,

    /// Start a capture that writes `<stem>_<frame>.png` next to PATH.
    #[arg(long, value_name = "PATH", conflicts_with = "preview")]
    pub render: Option<PathBuf>,

    /// Start a capture preview that animates without writing files.
    #[arg(long)]
    pub preview: bool,

    /// Camera positions in a capture job.
    #[arg(long, value_name = "COUNT", value_parser = clap::value_parser!(u32).range(1..))]
    pub frames: Option<u32>,

    /// Accumulated samples per captured frame.
    #[arg(long, value_name = "COUNT", value_parser = clap::value_parser!(u32).range(1..))]
    pub samples: Option<u32>,

    /// Capture travel speed multiplier.
    #[arg(long, value_name = "FACTOR", allow_negative_numbers = true)]
    pub speed: Option<f32>,

    /// Capture travel direction as `x,y,z`; defaults to the camera's forward vector.
    #[arg(
        long,
        value_name = "X,Y,Z",
        value_parser = parse_direction,
        allow_negative_numbers = true
    )]
    pub direction: Option<Vec3>,

    /// Evaluate without opening a window.
    #[arg(long)]
    pub headless: bool,

    /// Write the resolved scene as TOML to PATH and exit.
    #[arg(long, value_name = "PATH")]
    pub write_config: Option<PathBuf>,

    /// Prefer a high-performance GPU adapter for presentation.
    #[arg(long)]
    pub high_power: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the resolved configuration directory and scene file.
    Paths,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_size(value: &str) -> Result<(u32, u32), String> {
    let (w, h) = value
        .trim()
        .split_once(['x', 'X'])
        .ok_or_else(|| "expected WIDTHxHEIGHT, e.g. 1280x720".to_string())?;
    let width = w
        .trim()
        .parse::<u32>()
        .map_err(|_| "invalid width in size".to_string())?;
    let height = h
        .trim()
        .parse::<u32>()
        .map_err(|_| "invalid height in size".to_string())?;
    if width == 0 || height == 0 {
        return Err("size must be greater than zero".into());
    }
    Ok((width, height))
}

pub fn parse_render_scale(value: &str) -> Result<f32, String> {
    let scale = value
        .trim()
        .parse::<f32>()
        .map_err(|_| format!("invalid render scale '{value}'"))?;
    if !(scale > 0.0 && scale <= 1.0) {
        return Err("render scale must be in (0, 1]".into());
    }
    Ok(scale)
}

pub fn parse_fractal(value: &str) -> Result<FractalTag, String> {
    non_empty(value, "fractal")?.parse()
}

pub fn parse_mode(value: &str) -> Result<RenderMode, String> {
    non_empty(value, "render mode")?.parse()
}

pub fn parse_material(value: &str) -> Result<MaterialTag, String> {
    non_empty(value, "material")?.parse()
}

pub fn parse_direction(value: &str) -> Result<Vec3, String> {
    let components = value
        .split(',')
        .map(|part| {
            part.trim()
                .parse::<f32>()
                .map_err(|_| format!("invalid direction component '{}'", part.trim()))
        })
        .collect::<Result<Vec<_>, _>>()?;
    let [x, y, z] = components[..] else {
        return Err("expected three comma-separated components, e.g. 0,0,-1".into());
    };
    let direction = Vec3::new(x, y, z);
    if !direction.is_finite() || direction.length_squared() == 0.0 {
        return Err("direction must be finite and non-zero".into());
    }
    Ok(direction)
}

fn non_empty<'a>(value: &'a str, what: &str) -> Result<&'a str, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(format!("{what} must not be empty"));
    }
    Ok(trimmed)
}
