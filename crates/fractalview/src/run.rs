use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use renderer::{GpuPowerPreference, StartupAction, ViewerConfig};
use sceneconfig::SceneConfig;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, RunArgs};
use crate::paths::AppPaths;

pub fn run(cli: Cli) -> Result<()> {
    initialise_tracing();

    let paths = AppPaths::discover()?;
    tracing::debug!(
        config = %paths.config_dir().display(),
        scene = %paths.scene_file().display(),
        "resolved fractalview paths"
    );

    if let Some(Command::Paths) = cli.command {
        println!("config: {}", paths.config_dir().display());
        println!("scene:  {}", paths.scene_file().display());
        return Ok(());
    }

    let args = cli.run;
    let scene = load_scene(&args, &paths)?;
    let config = resolve_viewer_config(&args, &scene)?;

    if let Some(path) = args.write_config.as_ref() {
        return write_scene(path, &config);
    }

    tracing::info!(
        fractal = %config.options.fractal.active,
        mode = ?config.options.mode,
        width = config.surface_size.0,
        height = config.surface_size.1,
        headless = args.headless,
        "starting fractalview"
    );

    if args.headless {
        let report = renderer::run_headless(&config)?;
        tracing::info!(
            frames = report.frames_evaluated,
            written = report.written.len(),
            feedback = report.feedback,
            "headless run complete"
        );
        Ok(())
    } else {
        renderer::run_window(config)
    }
}

fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn load_scene(args: &RunArgs, paths: &AppPaths) -> Result<SceneConfig> {
    if let Some(path) = args.config.as_ref() {
        return read_scene(path);
    }
    let default_path = paths.scene_file();
    if default_path.is_file() {
        return read_scene(&default_path);
    }
    tracing::debug!(path = %default_path.display(), "no scene file; using defaults");
    Ok(SceneConfig::default())
}

fn read_scene(path: &Path) -> Result<SceneConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read scene config {}", path.display()))?;
    let scene = SceneConfig::from_toml_str(&contents)
        .with_context(|| format!("invalid scene config {}", path.display()))?;
    tracing::info!(path = %path.display(), "loaded scene config");
    Ok(scene)
}

fn write_scene(path: &Path, config: &ViewerConfig) -> Result<()> {
    let scene = SceneConfig::from_parts(
        &config.camera,
        &config.options,
        &config.navigation,
        &config.capture,
    );
    let contents = scene.to_toml_string()?;
    fs::write(path, contents)
        .with_context(|| format!("failed to write scene config {}", path.display()))?;
    tracing::info!(path = %path.display(), "scene config written");
    Ok(())
}

/// Layers command-line overrides on top of a loaded scene.
fn resolve_viewer_config(args: &RunArgs, scene: &SceneConfig) -> Result<ViewerConfig> {
    let defaults = ViewerConfig::default();
    let camera = scene.camera()?;

    let mut options = scene.scene_options();
    if let Some(kind) = args.fractal {
        options.fractal.active = kind;
    }
    if let Some(mode) = args.mode {
        options.mode = mode;
    }
    if let Some(kind) = args.material {
        options.material.kind = kind;
    }

    let mut capture = scene.capture_request();
    if let Some(path) = args.render.as_ref() {
        capture.path = path.clone();
    }
    if let Some(frames) = args.frames {
        capture.frames = frames;
    }
    if let Some(samples) = args.samples {
        capture.samples = samples;
    }
    if let Some(speed) = args.speed {
        capture.speed = speed;
    }
    if args.direction.is_some() {
        capture.direction = args.direction;
    }

    let startup = if args.render.is_some() {
        StartupAction::Render
    } else if args.preview {
        StartupAction::Preview
    } else {
        StartupAction::None
    };

    Ok(ViewerConfig {
        surface_size: args.size.unwrap_or(defaults.surface_size),
        render_scale: args.render_scale.unwrap_or(defaults.render_scale),
        camera,
        options,
        navigation: scene.navigation(),
        capture,
        startup,
        gpu_power: if args.high_power {
            GpuPowerPreference::High
        } else {
            GpuPowerPreference::Low
        },
    })
}
