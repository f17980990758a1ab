//! Distance-field fractal evaluation: fields, marching, shading, progressive
//! accumulation, the feedback readback path, and animated capture.

pub mod accumulation;
pub mod camera;
pub mod capture;
pub mod device;
pub mod error;
pub mod feedback;
pub mod march;
pub mod options;
pub mod sdf;
pub mod session;
pub mod shade;

pub use accumulation::AccumulationBuffer;
pub use camera::Camera;
pub use capture::{
    CaptureController, CaptureProgress, CaptureRequest, CaptureState, CaptureTick, FrameImage,
    FrameSink,
};
pub use device::{CpuDevice, Device, FrameOutput, FrameRequest};
pub use error::{CameraError, CaptureError, CompileError, DeviceError, SessionError};
pub use feedback::{FeedbackChannel, FEEDBACK_EPSILON};
pub use march::{march, MarchLimits, MarchResult, Ray};
pub use options::{
    FoldParams, FractalKind, FractalOptions, FractalParams, FractalTag, MandelboxParams,
    MandelbulbParams, MaterialKind, MaterialOptions, MaterialTag, NavigationOptions,
    RenderMode, RendererOptions, SceneOptions,
};
pub use sdf::{Field, FieldSample, Scene};
pub use session::{FrameReport, NavigationInput, Session};
