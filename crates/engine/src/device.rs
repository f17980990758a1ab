//! The boundary between the host loop and the data-parallel evaluation.
//!
//! The host submits one [`FrameRequest`] and then blocks in [`Device::wait`]
//! for the matching [`FrameOutput`]. The output carries the resolved image
//! and the feedback distance computed for that same frame, so the readback
//! is always synchronous with frame completion.

use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender};
use glam::{Vec2, Vec3};
use rand::prelude::*;

use crate::accumulation::AccumulationBuffer;
use crate::camera::Camera;
use crate::capture::FrameImage;
use crate::error::DeviceError;
use crate::options::SceneOptions;
use crate::sdf::{Field, Scene};
use crate::shade::{random_in_unit_disk, shade};

/// Everything the device needs for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameRequest {
    pub frame_index: u64,
    pub camera: Camera,
    pub options: SceneOptions,
    /// Restart accumulation instead of adding to it.
    pub moved: bool,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone)]
pub struct FrameOutput {
    pub frame_index: u64,
    pub width: u32,
    pub height: u32,
    /// Gamma-encoded RGBA8, row-major from the top-left corner.
    pub pixels: Vec<u8>,
    pub sample_count: u32,
    /// Field distance at the camera origin, unclamped.
    pub feedback: f32,
}

impl FrameOutput {
    pub fn image(&self) -> FrameImage<'_> {
        FrameImage {
            width: self.width,
            height: self.height,
            pixels: &self.pixels,
        }
    }
}

/// Asynchronous frame evaluation with a completion signal.
pub trait Device {
    /// Queues a frame; only one frame may be in flight at a time.
    fn submit(&mut self, request: FrameRequest) -> Result<(), DeviceError>;
    /// Blocks until the submitted frame is complete.
    fn wait(&mut self) -> Result<FrameOutput, DeviceError>;
}

/// Evaluates one frame into `buffer` and resolves it.
pub fn evaluate_frame(buffer: &mut AccumulationBuffer, request: &FrameRequest) -> FrameOutput {
    buffer.resize(request.width.max(1), request.height.max(1));
    let sample_count = buffer.begin_frame(request.moved);

    let scene = Scene::new(&request.options);
    let camera = request.camera;
    let options = request.options;
    let width = buffer.width();
    let height = buffer.height();
    let aspect = width as f32 / height as f32;
    let defocus = camera.defocus_angle() > 0.0;
    let seed = request.frame_index.wrapping_mul(0x9E37_79B9_7F4A_7C15);

    buffer.accumulate_rows(|y, row| {
        let mut rng = StdRng::seed_from_u64(seed ^ u64::from(y));
        for (x, color) in row.iter_mut().enumerate() {
            let jitter = Vec2::new(rng.gen::<f32>(), rng.gen::<f32>());
            let ndc = Vec2::new(
                (x as f32 + jitter.x) / width as f32 * 2.0 - 1.0,
                1.0 - (y as f32 + jitter.y) / height as f32 * 2.0,
            );
            let lens = if defocus {
                random_in_unit_disk(&mut rng)
            } else {
                Vec2::ZERO
            };
            let ray = camera.primary_ray(ndc, aspect, lens);
            *color = shade(&ray, &scene, &options, &mut rng);
        }
    });

    FrameOutput {
        frame_index: request.frame_index,
        width,
        height,
        pixels: buffer.resolve_rgba8(),
        sample_count,
        feedback: camera_feedback(&scene, camera.origin()),
    }
}

/// Distance from the camera to the nearest surface, by the same field the
/// frame was rendered with.
pub fn camera_feedback<F: Field + ?Sized>(field: &F, origin: Vec3) -> f32 {
    field.distance(origin)
}

/// CPU implementation: a dedicated worker thread that owns the
/// accumulation buffer and spreads rows across the rayon pool.
pub struct CpuDevice {
    requests: Option<Sender<FrameRequest>>,
    results: Receiver<FrameOutput>,
    in_flight: Option<u64>,
    join_handle: Option<JoinHandle<()>>,
}

impl CpuDevice {
    pub fn spawn() -> Result<Self, DeviceError> {
        let (request_tx, request_rx) = bounded::<FrameRequest>(1);
        let (result_tx, result_rx) = bounded::<FrameOutput>(1);
        let handle = thread::Builder::new()
            .name("fractal-device".into())
            .spawn(move || run_worker(request_rx, result_tx))
            .map_err(DeviceError::Spawn)?;

        Ok(Self {
            requests: Some(request_tx),
            results: result_rx,
            in_flight: None,
            join_handle: Some(handle),
        })
    }
}

impl Device for CpuDevice {
    fn submit(&mut self, request: FrameRequest) -> Result<(), DeviceError> {
        if let Some(frame) = self.in_flight {
            return Err(DeviceError::Busy(frame));
        }
        let frame = request.frame_index;
        let sender = self.requests.as_ref().ok_or(DeviceError::Disconnected)?;
        sender
            .send(request)
            .map_err(|_| DeviceError::Disconnected)?;
        self.in_flight = Some(frame);
        Ok(())
    }

    fn wait(&mut self) -> Result<FrameOutput, DeviceError> {
        if self.in_flight.take().is_none() {
            return Err(DeviceError::NothingSubmitted);
        }
        self.results.recv().map_err(|_| DeviceError::Disconnected)
    }
}

impl Drop for CpuDevice {
    fn drop(&mut self) {
        // Closing the request channel ends the worker loop.
        self.requests.take();
        if let Some(handle) = self.join_handle.take() {
            let _ = handle.join();
        }
    }
}

fn run_worker(requests: Receiver<FrameRequest>, results: Sender<FrameOutput>) {
    let mut buffer = AccumulationBuffer::new(1, 1);
    for request in requests.iter() {
        let output = evaluate_frame(&mut buffer, &request);
        tracing::trace!(
            frame = output.frame_index,
            samples = output.sample_count,
            feedback = output.feedback,
            "frame evaluated"
        );
        if results.send(output).is_err() {
            break;
        }
    }
    tracing::debug!("device worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::RenderMode;

    fn request(frame_index: u64, moved: bool) -> FrameRequest {
        let mut options = SceneOptions::default();
        options.mode = RenderMode::Preview;
        options.renderer.max_iterations = 32;
        FrameRequest {
            frame_index,
            camera: Camera::default(),
            options,
            moved,
            width: 8,
            height: 6,
        }
    }

    #[test]
    fn evaluate_produces_rgba_and_feedback() {
        let mut buffer = AccumulationBuffer::new(1, 1);
        let output = evaluate_frame(&mut buffer, &request(0, true));
        assert_eq!(output.pixels.len(), 8 * 6 * 4);
        assert_eq!(output.sample_count, 1);
        assert!(output.feedback > 0.0);
        assert!(output.feedback <= 3.0);
    }

    #[test]
    fn cpu_device_round_trips_frames_in_order() {
        let mut device = CpuDevice::spawn().unwrap();
        device.submit(request(0, true)).unwrap();
        assert!(matches!(
            device.submit(request(1, false)),
            Err(DeviceError::Busy(0))
        ));
        let first = device.wait().unwrap();
        assert_eq!(first.frame_index, 0);
        assert_eq!(first.sample_count, 1);

        device.submit(request(1, false)).unwrap();
        let second = device.wait().unwrap();
        assert_eq!(second.sample_count, 2);

        device.submit(request(2, true)).unwrap();
        assert_eq!(device.wait().unwrap().sample_count, 1);
    }

    #[test]
    fn waiting_without_submission_is_an_error() {
        let mut device = CpuDevice::spawn().unwrap();
        assert!(matches!(device.wait(), Err(DeviceError::NothingSubmitted)));
    }
}
