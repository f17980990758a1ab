use std::path::PathBuf;

/// Rejected camera mutations.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum CameraError {
    #[error("camera direction must be a finite, non-zero vector (got {0:?})")]
    DegenerateDirection([f32; 3]),
}

/// Failures crossing the device boundary.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("device worker is no longer running")]
    Disconnected,
    #[error("no frame was submitted before waiting for one")]
    NothingSubmitted,
    #[error("a frame is already in flight (frame {0})")]
    Busy(u64),
    #[error("failed to spawn device worker: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Failures raised while a capture job is running.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("capture output directory {0} does not exist")]
    MissingDirectory(PathBuf),
    #[error("capture requires at least one frame and one sample")]
    EmptyJob,
    #[error("frame sink failed: {0}")]
    Sink(String),
}

/// Raised when the evaluation kernel cannot be built; there is no fallback.
#[derive(Debug, thiserror::Error)]
#[error("failed to compile {stage} kernel `{label}`: {message}")]
pub struct CompileError {
    pub label: String,
    pub stage: &'static str,
    pub message: String,
}

/// Anything that can interrupt one step of the host loop.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error(transparent)]
    Capture(#[from] CaptureError),
}
