//! Animated capture along a straight camera path.
//!
//! A job accumulates `samples` frames at each camera position, then dollies
//! the camera forward by a step proportional to the feedback distance, for
//! `frames` positions. Rendering jobs persist each finished position through a
//! [`FrameSink`]; preview jobs only animate.

use std::path::{Path, PathBuf};

use glam::Vec3;

use crate::camera::Camera;
use crate::error::CaptureError;

/// Fraction of the feedback distance travelled per captured frame, before
/// the per-request speed multiplier.
pub const CAPTURE_STEP_FACTOR: f32 = 0.05;

#[derive(Debug, Clone, PartialEq)]
pub struct CaptureRequest {
    /// Output file; frames are numbered after its stem.
    pub path: PathBuf,
    pub frames: u32,
    pub samples: u32,
    /// Travel direction; defaults to the camera's forward vector.
    pub direction: Option<Vec3>,
    pub speed: f32,
}

impl Default for CaptureRequest {
    fn default() -> Self {
        Self {
            path: PathBuf::from("render.png"),
            frames: 60,
            samples: 16,
            direction: None,
            speed: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Previewing,
    Rendering,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureProgress {
    pub frame: u32,
    pub frames: u32,
    pub sample: u32,
    pub samples: u32,
}

/// A presented frame as tightly packed RGBA8 rows.
#[derive(Debug, Clone, Copy)]
pub struct FrameImage<'a> {
    pub width: u32,
    pub height: u32,
    pub pixels: &'a [u8],
}

/// Destination for frames persisted while rendering.
pub trait FrameSink {
    fn begin(&mut self, path: &Path) -> Result<(), CaptureError>;
    fn persist(&mut self, frame: u32, image: &FrameImage<'_>) -> Result<(), CaptureError>;
    fn end(&mut self) -> Result<(), CaptureError>;
}

/// What a [`CaptureController::tick`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureTick {
    Idle,
    /// Still accumulating samples at the current position.
    Sampling,
    /// Camera moved to the next position; `persisted` when the finished
    /// frame was handed to the sink.
    Advanced { persisted: bool },
    /// The job ended and the camera returned to its start position.
    Finished,
}

impl CaptureTick {
    /// Whether the camera changed, which restarts accumulation.
    pub fn moved_camera(&self) -> bool {
        matches!(self, CaptureTick::Advanced { .. } | CaptureTick::Finished)
    }
}

#[derive(Debug, Clone)]
struct CaptureJob {
    start: Vec3,
    direction: Vec3,
    speed: f32,
    frame: u32,
    frames: u32,
    sample: u32,
    samples: u32,
    preview: bool,
    path: PathBuf,
}

#[derive(Debug, Default)]
pub struct CaptureController {
    job: Option<CaptureJob>,
}

impl CaptureController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> CaptureState {
        match &self.job {
            None => CaptureState::Idle,
            Some(job) if job.preview => CaptureState::Previewing,
            Some(_) => CaptureState::Rendering,
        }
    }

    pub fn is_active(&self) -> bool {
        self.job.is_some()
    }

    pub fn progress(&self) -> Option<CaptureProgress> {
        self.job.as_ref().map(|job| CaptureProgress {
            frame: job.frame,
            frames: job.frames,
            sample: job.sample,
            samples: job.samples,
        })
    }

    pub fn output_path(&self) -> Option<&Path> {
        self.job.as_ref().map(|job| job.path.as_path())
    }

    /// Starts animating without persisting output.
    pub fn request_preview(
        &mut self,
        camera: &Camera,
        request: CaptureRequest,
    ) -> Result<(), CaptureError> {
        if self.is_active() {
            tracing::debug!("capture already running; preview request ignored");
            return Ok(());
        }
        let job = build_job(camera, request, true)?;
        tracing::info!(frames = job.frames, samples = job.samples, "capture preview started");
        self.job = Some(job);
        Ok(())
    }

    /// Starts a rendering job if the output directory exists.
    ///
    /// On error nothing changes: the controller stays idle and the sink is
    /// not opened.
    pub fn request_render(
        &mut self,
        camera: &Camera,
        request: CaptureRequest,
        sink: &mut dyn FrameSink,
    ) -> Result<(), CaptureError> {
        if self.is_active() {
            tracing::debug!("capture already running; render request ignored");
            return Ok(());
        }
        let directory = output_directory(&request.path);
        if !directory.is_dir() {
            return Err(CaptureError::MissingDirectory(directory));
        }
        let job = build_job(camera, request, false)?;
        sink.begin(&job.path)?;
        tracing::info!(
            frames = job.frames,
            samples = job.samples,
            path = %job.path.display(),
            "capture render started"
        );
        self.job = Some(job);
        Ok(())
    }

    /// Ends the running job on the next tick.
    pub fn stop(&mut self) {
        if let Some(job) = self.job.as_mut() {
            job.frame = job.frames;
        }
    }

    /// Advances the job by one presented frame.
    ///
    /// `presented` is the frame that was just shown; `feedback` is the
    /// clamped camera-to-surface distance.
    pub fn tick(
        &mut self,
        camera: &mut Camera,
        feedback: f32,
        presented: &FrameImage<'_>,
        sink: &mut dyn FrameSink,
    ) -> Result<CaptureTick, CaptureError> {
        let Some(job) = self.job.as_mut() else {
            return Ok(CaptureTick::Idle);
        };

        if job.frame >= job.frames {
            return self.finish(camera, sink).map(|()| CaptureTick::Finished);
        }

        job.sample += 1;
        if job.sample < job.samples {
            return Ok(CaptureTick::Sampling);
        }

        let finished_frame = job.frame;
        job.sample = 0;
        job.frame += 1;
        camera.translate(job.direction * feedback * CAPTURE_STEP_FACTOR * job.speed);

        if job.preview {
            return Ok(CaptureTick::Advanced { persisted: false });
        }

        if let Err(err) = sink.persist(finished_frame, presented) {
            tracing::error!(frame = finished_frame, error = %err, "aborting capture");
            self.stop();
            // The persist error is the one reported to the caller.
            if let Err(end_err) = self.finish(camera, sink) {
                tracing::warn!(error = %end_err, "failed to close capture sink after abort");
            }
            return Err(err);
        }
        tracing::debug!(frame = finished_frame, "captured frame");
        Ok(CaptureTick::Advanced { persisted: true })
    }

    fn finish(
        &mut self,
        camera: &mut Camera,
        sink: &mut dyn FrameSink,
    ) -> Result<(), CaptureError> {
        let Some(job) = self.job.take() else {
            return Ok(());
        };
        camera.set_origin(job.start);
        tracing::info!(frames = job.frame, preview = job.preview, "capture finished");
        if job.preview {
            Ok(())
        } else {
            sink.end()
        }
    }
}

fn build_job(
    camera: &Camera,
    request: CaptureRequest,
    preview: bool,
) -> Result<CaptureJob, CaptureError> {
    if request.frames == 0 || request.samples == 0 {
        return Err(CaptureError::EmptyJob);
    }
    let direction = request
        .direction
        .and_then(|dir| dir.try_normalize())
        .unwrap_or_else(|| camera.direction());
    Ok(CaptureJob {
        start: camera.origin(),
        direction,
        speed: request.speed,
        frame: 0,
        frames: request.frames,
        sample: 0,
        samples: request.samples,
        preview,
        path: request.path,
    })
}

/// Directory a capture path writes into; a bare file name means the
/// working directory.
pub fn output_directory(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
