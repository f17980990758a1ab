use std::path::PathBuf;

use anyhow::{Context, Result};
use engine::capture::output_directory;
use engine::{CaptureTick, CpuDevice, SessionError, Session};

use crate::sink::{write_png, PngSequenceSink};
use crate::types::{StartupAction, ViewerConfig};

/// Outcome of a headless run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeadlessReport {
    pub frames_evaluated: u64,
    pub written: Vec<PathBuf>,
    /// Clamped feedback distance after the last frame.
    pub feedback: f32,
}

/// Drives the session without a window until the requested work is done.
///
/// `StartupAction::Render` runs the capture job to completion,
/// `StartupAction::Preview` animates it without output, and
/// `StartupAction::None` accumulates `capture.samples` frames at the initial
/// camera and writes one still to `capture.path`. A missing output directory
/// is logged and produces no output.
pub fn run_headless(config: &ViewerConfig) -> Result<HeadlessReport> {
    let mut session = Session::new(
        config.camera,
        config.options,
        config.navigation,
        config.surface_size,
    );
    let mut device = CpuDevice::spawn().context("failed to start the evaluation device")?;
    let mut sink = PngSequenceSink::new();
    let request = config.capture.clone();
    let mut report = HeadlessReport::default();

    let started = match config.startup {
        StartupAction::Render => session.request_render(request.clone(), &mut sink),
        StartupAction::Preview => session.request_preview(request.clone()),
        StartupAction::None => return render_still(&mut session, &mut device, config),
    };
    if let Err(err) = started {
        tracing::warn!(error = %err, "capture request ignored");
        return Ok(report);
    }

    // One frame per sample plus the tick that finishes the job.
    let budget = u64::from(request.frames) * u64::from(request.samples) + 2;
    for _ in 0..budget {
        match session.step(&mut device, &mut sink, false) {
            Ok(frame) => {
                report.frames_evaluated += 1;
                if let CaptureTick::Advanced { .. } = frame.capture {
                    if let Some(progress) = session.capture().progress() {
                        tracing::info!(
                            frame = progress.frame,
                            frames = progress.frames,
                            feedback = frame.feedback,
                            "capture advanced"
                        );
                    }
                }
                if frame.capture == CaptureTick::Finished {
                    break;
                }
            }
            Err(SessionError::Capture(err)) => {
                tracing::error!(error = %err, "capture aborted");
                break;
            }
            Err(SessionError::Device(err)) => {
                return Err(err).context("evaluation device failed");
            }
        }
    }

    report.written = sink.written().to_vec();
    report.feedback = session.feedback().distance();
    Ok(report)
}

fn render_still(
    session: &mut Session,
    device: &mut CpuDevice,
    config: &ViewerConfig,
) -> Result<HeadlessReport> {
    let mut report = HeadlessReport::default();
    let path = config.capture.path.clone();
    let directory = output_directory(&path);
    if !directory.is_dir() {
        tracing::warn!(
            directory = %directory.display(),
            "output directory does not exist; nothing written"
        );
        return Ok(report);
    }

    let mut sink = PngSequenceSink::new();
    for _ in 0..config.capture.samples.max(1) {
        session
            .step(device, &mut sink, false)
            .context("failed to evaluate still frame")?;
        report.frames_evaluated += 1;
    }

    if let Some(output) = session.last_output() {
        write_png(&path, &output.image())
            .with_context(|| format!("failed to write still to {}", path.display()))?;
        tracing::info!(
            path = %path.display(),
            samples = output.sample_count,
            "still frame written"
        );
        report.written.push(path);
    }
    report.feedback = session.feedback().distance();
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine::RenderMode;
    use tempfile::TempDir;

    fn config(dir: &TempDir, startup: StartupAction) -> ViewerConfig {
        let mut config = ViewerConfig {
            surface_size: (16, 9),
            startup,
            ..ViewerConfig::default()
        };
        config.options.mode = RenderMode::Preview;
        config.options.renderer.max_iterations = 24;
        config.capture.path = dir.path().join("frame.png");
        config.capture.frames = 3;
        config.capture.samples = 2;
        config
    }

    #[test]
    fn render_writes_one_png_per_frame() {
        let dir = TempDir::new().unwrap();
        let report = run_headless(&config(&dir, StartupAction::Render)).unwrap();
        assert_eq!(report.frames_evaluated, 7);
        let expected: Vec<PathBuf> = (0..3)
            .map(|frame| dir.path().join(format!("frame_{frame:05}.png")))
            .collect();
        assert_eq!(report.written, expected);
        for path in &expected {
            let image = image::open(path).unwrap();
            assert_eq!((image.width(), image.height()), (16, 9));
        }
        assert!(report.feedback > 0.0);
    }

    #[test]
    fn preview_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let report = run_headless(&config(&dir, StartupAction::Preview)).unwrap();
        assert_eq!(report.frames_evaluated, 7);
        assert!(report.written.is_empty());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn missing_directory_is_a_no_op() {
        let dir = TempDir::new().unwrap();
        let mut config = config(&dir, StartupAction::Render);
        config.capture.path = dir.path().join("missing").join("frame.png");
        let report = run_headless(&config).unwrap();
        assert_eq!(report, HeadlessReport::default());
        assert!(!dir.path().join("missing").exists());
    }

    #[test]
    fn still_accumulates_requested_samples() {
        let dir = TempDir::new().unwrap();
        let report = run_headless(&config(&dir, StartupAction::None)).unwrap();
        assert_eq!(report.frames_evaluated, 2);
        assert_eq!(report.written, vec![dir.path().join("frame.png")]);
        assert!(dir.path().join("frame.png").is_file());
    }
}
