//! Explicit per-viewer state, owned by the host loop.
//!
//! Frame ordering: [`Session::step`] submits frame N, waits for it, then
//! publishes frame N's feedback distance. Navigation applied before frame
//! N+1 is submitted therefore always scales by frame N's distance, one frame
//! of latency. Capture ticks run after the wait, against the frame that was
//! just presented.

use crate::camera::Camera;
use crate::capture::{CaptureController, CaptureRequest, CaptureTick, FrameSink};
use crate::device::{Device, FrameOutput, FrameRequest};
use crate::error::{CaptureError, SessionError};
use crate::feedback::FeedbackChannel;
use crate::options::{
    FractalOptions, FractalTag, MaterialOptions, MaterialTag, NavigationOptions, RenderMode,
    RendererOptions, SceneOptions,
};

/// Per-frame navigation input, each axis in `[-1, 1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NavigationInput {
    pub forward: f32,
    pub right: f32,
    pub up: f32,
    pub pitch: f32,
    pub yaw: f32,
}

impl NavigationInput {
    pub fn is_idle(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameReport {
    pub frame_index: u64,
    pub sample_count: u32,
    pub moved: bool,
    pub feedback: f32,
    pub capture: CaptureTick,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Submitted {
    camera: Camera,
    options: SceneOptions,
    resolution: (u32, u32),
}

#[derive(Debug)]
pub struct Session {
    camera: Camera,
    options: SceneOptions,
    navigation: NavigationOptions,
    capture: CaptureController,
    feedback: FeedbackChannel,
    resolution: (u32, u32),
    frame_index: u64,
    last_submitted: Option<Submitted>,
    capture_moved: bool,
    last_output: Option<FrameOutput>,
}

impl Session {
    pub fn new(
        camera: Camera,
        options: SceneOptions,
        navigation: NavigationOptions,
        resolution: (u32, u32),
    ) -> Self {
        Self {
            camera,
            options,
            navigation,
            capture: CaptureController::new(),
            feedback: FeedbackChannel::new(),
            resolution: (resolution.0.max(1), resolution.1.max(1)),
            frame_index: 0,
            last_submitted: None,
            capture_moved: false,
            last_output: None,
        }
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn options(&self) -> &SceneOptions {
        &self.options
    }

    /// Direct access for option widgets; any change is detected when the
    /// next frame is prepared.
    pub fn options_mut(&mut self) -> &mut SceneOptions {
        &mut self.options
    }

    pub fn renderer_mut(&mut self) -> &mut RendererOptions {
        &mut self.options.renderer
    }

    pub fn look_mut(&mut self) -> &mut FractalOptions {
        &mut self.options.look
    }

    pub fn material_mut(&mut self) -> &mut MaterialOptions {
        &mut self.options.material
    }

    pub fn navigation(&self) -> &NavigationOptions {
        &self.navigation
    }

    pub fn navigation_mut(&mut self) -> &mut NavigationOptions {
        &mut self.navigation
    }

    pub fn capture(&self) -> &CaptureController {
        &self.capture
    }

    pub fn feedback(&self) -> &FeedbackChannel {
        &self.feedback
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn resolution(&self) -> (u32, u32) {
        self.resolution
    }

    pub fn last_output(&self) -> Option<&FrameOutput> {
        self.last_output.as_ref()
    }

    pub fn set_resolution(&mut self, width: u32, height: u32) {
        self.resolution = (width.max(1), height.max(1));
    }

    pub fn select_fractal(&mut self, tag: FractalTag) {
        self.options.fractal.select(tag);
        tracing::info!(fractal = %tag, "fractal selected");
    }

    pub fn set_render_mode(&mut self, mode: RenderMode) {
        self.options.mode = mode;
        tracing::info!(?mode, "render mode changed");
    }

    pub fn set_material(&mut self, kind: MaterialTag) {
        self.options.material.kind = kind;
        tracing::info!(?kind, "material changed");
    }

    /// Moves and turns the camera for `dt` seconds of input.
    ///
    /// Translation scales by the latest feedback distance when auto speed is
    /// enabled. Ignored while a capture job drives the camera.
    pub fn navigate(&mut self, input: NavigationInput, dt: f32) {
        if input.is_idle() || self.capture.is_active() {
            return;
        }
        let speed = self.navigation.move_speed * dt * self.feedback.speed_scale(&self.navigation);
        let turn = self.navigation.turn_speed * dt;
        self.camera.move_forward(input.forward * speed);
        self.camera.move_right(input.right * speed);
        self.camera.move_up(input.up * speed);
        if input.pitch != 0.0 || input.yaw != 0.0 {
            self.camera.rotate(input.pitch * turn, input.yaw * turn);
        }
    }

    pub fn request_preview(&mut self, request: CaptureRequest) -> Result<(), CaptureError> {
        self.capture.request_preview(&self.camera, request)
    }

    pub fn request_render(
        &mut self,
        request: CaptureRequest,
        sink: &mut dyn FrameSink,
    ) -> Result<(), CaptureError> {
        self.capture.request_render(&self.camera, request, sink)
    }

    pub fn stop_capture(&mut self) {
        self.capture.stop();
    }

    /// Builds the next frame's request and decides whether accumulation
    /// restarts: the camera or options differ from the last submitted
    /// frame, the user is interacting with an option widget, or the capture
    /// job moved the camera.
    pub fn prepare_frame(&mut self, interacting: bool) -> FrameRequest {
        let current = Submitted {
            camera: self.camera,
            options: self.options,
            resolution: self.resolution,
        };
        let changed = self.last_submitted != Some(current);
        let moved = changed || interacting || self.capture_moved;
        self.capture_moved = false;
        self.last_submitted = Some(current);

        FrameRequest {
            frame_index: self.frame_index,
            camera: self.camera,
            options: self.options,
            moved,
            width: self.resolution.0,
            height: self.resolution.1,
        }
    }

    /// Consumes a completed frame: publishes its feedback, applies auto
    /// focus, and lets the capture controller advance.
    pub fn finish_frame(
        &mut self,
        output: FrameOutput,
        moved: bool,
        sink: &mut dyn FrameSink,
    ) -> Result<FrameReport, CaptureError> {
        if let Some(stale) = self.feedback.staleness(output.frame_index) {
            if stale > 1 {
                tracing::debug!(stale, "feedback distance is more than one frame old");
            }
        }
        self.feedback.publish(output.feedback, output.frame_index);
        if let Some(focus) = self.feedback.focus_distance(&self.navigation) {
            self.camera.set_focus_distance(focus);
        }

        let feedback = self.feedback.distance();
        let tick = self
            .capture
            .tick(&mut self.camera, feedback, &output.image(), sink);
        // An aborted capture has restored the camera as well.
        self.capture_moved |= tick.as_ref().map_or(true, CaptureTick::moved_camera);
        self.frame_index = output.frame_index + 1;
        let frame_index = output.frame_index;
        let sample_count = output.sample_count;
        self.last_output = Some(output);

        Ok(FrameReport {
            frame_index,
            sample_count,
            moved,
            feedback,
            capture: tick?,
        })
    }

    /// Runs one full frame through `device`.
    pub fn step(
        &mut self,
        device: &mut dyn Device,
        sink: &mut dyn FrameSink,
        interacting: bool,
    ) -> Result<FrameReport, SessionError> {
        let request = self.prepare_frame(interacting);
        let moved = request.moved;
        device.submit(request)?;
        let output = device.wait()?;
        Ok(self.finish_frame(output, moved, sink)?)
    }
}
