use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use engine::{CaptureRequest, CaptureTick, CpuDevice, DeviceError, Session, SessionError};
use tracing::{error, info, warn};
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoopBuilder};
use winit::window::{Window, WindowBuilder};

use crate::gpu::GpuState;
use crate::input::{command_for, NavigationKeys, ViewerCommand};
use crate::sink::PngSequenceSink;
use crate::types::{scaled_resolution, StartupAction, ViewerConfig};

/// Longest frame delta fed to navigation, so a stalled frame does not
/// teleport the camera.
const MAX_FRAME_DELTA: f32 = 0.25;

#[derive(Debug)]
enum RedrawError {
    Surface(wgpu::SurfaceError),
    Device(DeviceError),
}

/// Aggregates presentation and session state for the interactive viewer.
struct WindowState {
    // Dropped before the window it presents to.
    gpu: GpuState,
    window: Arc<Window>,
    session: Session,
    device: CpuDevice,
    sink: PngSequenceSink,
    keys: NavigationKeys,
    capture_defaults: CaptureRequest,
    render_scale: f32,
    last_frame: Instant,
    title: String,
}

impl WindowState {
    fn new(window: Arc<Window>, config: &ViewerConfig) -> Result<Self> {
        let size = window.inner_size();
        let gpu = GpuState::new(window.as_ref(), size, config.gpu_power)?;
        let resolution = scaled_resolution((size.width, size.height), config.render_scale);
        let session = Session::new(config.camera, config.options, config.navigation, resolution);
        let device = CpuDevice::spawn().context("failed to start the evaluation device")?;

        Ok(Self {
            gpu,
            window,
            session,
            device,
            sink: PngSequenceSink::new(),
            keys: NavigationKeys::default(),
            capture_defaults: config.capture.clone(),
            render_scale: config.render_scale,
            last_frame: Instant::now(),
            title: String::new(),
        })
    }

    fn window(&self) -> &Window {
        self.window.as_ref()
    }

    fn resize(&mut self, new_size: PhysicalSize<u32>) {
        self.gpu.resize(new_size);
        let size = self.gpu.size();
        let (width, height) = scaled_resolution((size.width, size.height), self.render_scale);
        self.session.set_resolution(width, height);
    }

    fn start(&mut self, action: StartupAction) {
        let request = self.capture_defaults.clone();
        let result = match action {
            StartupAction::None => return,
            StartupAction::Preview => self.session.request_preview(request),
            StartupAction::Render => self.session.request_render(request, &mut self.sink),
        };
        if let Err(err) = result {
            warn!(error = %err, "capture request ignored");
        }
    }

    /// Applies a hotkey; returns `false` when the viewer should close.
    fn apply(&mut self, command: ViewerCommand) -> bool {
        match command {
            ViewerCommand::CycleFractal => {
                let next = self.session.options().fractal.active.next();
                self.session.select_fractal(next);
            }
            ViewerCommand::CycleMode => {
                let next = self.session.options().mode.next();
                self.session.set_render_mode(next);
            }
            ViewerCommand::CycleMaterial => {
                let next = self.session.options().material.kind.next();
                self.session.set_material(next);
            }
            ViewerCommand::ToggleGround => {
                let look = self.session.look_mut();
                look.ground = !look.ground;
                info!(ground = look.ground, "ground plane toggled");
            }
            ViewerCommand::ToggleAutoSpeed => {
                let navigation = self.session.navigation_mut();
                navigation.auto_speed = !navigation.auto_speed;
                info!(auto_speed = navigation.auto_speed, "auto speed toggled");
            }
            ViewerCommand::ToggleAutoFocus => {
                let navigation = self.session.navigation_mut();
                navigation.auto_focus = !navigation.auto_focus;
                info!(auto_focus = navigation.auto_focus, "auto focus toggled");
            }
            ViewerCommand::StartRender => self.start(StartupAction::Render),
            ViewerCommand::StartPreview => self.start(StartupAction::Preview),
            ViewerCommand::StopOrExit => {
                if !self.session.capture().is_active() {
                    return false;
                }
                self.session.stop_capture();
            }
        }
        true
    }

    fn redraw(&mut self) -> Result<(), RedrawError> {
        let now = Instant::now();
        let dt = now
            .saturating_duration_since(self.last_frame)
            .as_secs_f32()
            .min(MAX_FRAME_DELTA);
        self.last_frame = now;
        self.session.navigate(self.keys.input(), dt);

        match self.session.step(&mut self.device, &mut self.sink, false) {
            Ok(report) => {
                if report.capture == CaptureTick::Finished {
                    info!("capture finished; navigation unlocked");
                }
            }
            Err(SessionError::Capture(err)) => {
                error!(error = %err, "capture aborted");
            }
            Err(SessionError::Device(err)) => return Err(RedrawError::Device(err)),
        }
        if let Some(output) = self.session.last_output() {
            self.gpu.upload(output);
        }
        self.update_title();

        let capture = self.session.capture();
        self.gpu
            .render(capture.state(), capture.progress())
            .map_err(RedrawError::Surface)
    }

    fn update_title(&mut self) {
        let options = self.session.options();
        let samples = self
            .session
            .last_output()
            .map_or(0, |output| output.sample_count);
        let title = format!(
            "fractalview - {} - {:?} - {} spp",
            options.fractal.active, options.mode, samples
        );
        if title != self.title {
            self.window.set_title(&title);
            self.title = title;
        }
    }
}

/// Opens the interactive viewer and blocks until it is closed.
pub fn run_window(config: ViewerConfig) -> Result<()> {
    let event_loop = EventLoopBuilder::new()
        .build()
        .map_err(|err| anyhow!("failed to create event loop: {err}"))?;

    let window_size = PhysicalSize::new(config.surface_size.0, config.surface_size.1);
    let window = WindowBuilder::new()
        .with_title("fractalview")
        .with_inner_size(window_size)
        .build(&event_loop)
        .map_err(|err| anyhow!("failed to create viewer window: {err}"))?;
    let window = Arc::new(window);

    let mut state = WindowState::new(window, &config)
        .map_err(|err| anyhow!("failed to initialise viewer: {err:#}"))?;
    state.start(config.startup);
    state.window().request_redraw();

    let run_result = event_loop.run(move |event, elwt| match event {
        Event::WindowEvent { window_id, event } if window_id == state.window().id() => {
            match event {
                WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                    elwt.exit();
                }
                WindowEvent::Focused(false) => {
                    state.keys.clear();
                }
                WindowEvent::KeyboardInput { event, .. } => {
                    let pressed = event.state == ElementState::Pressed;
                    if state.keys.handle(&event.logical_key, pressed) {
                        return;
                    }
                    if pressed && !event.repeat {
                        if let Some(command) = command_for(&event.logical_key) {
                            if !state.apply(command) {
                                elwt.exit();
                            }
                        }
                    }
                }
                WindowEvent::Resized(new_size) => {
                    state.resize(new_size);
                }
                WindowEvent::RedrawRequested => match state.redraw() {
                    Ok(()) => {}
                    Err(RedrawError::Surface(err)) => match err {
                        wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => {
                            state.resize(state.gpu.size());
                        }
                        wgpu::SurfaceError::OutOfMemory => {
                            error!("surface out of memory; exiting viewer");
                            elwt.exit();
                        }
                        wgpu::SurfaceError::Timeout => {
                            warn!("surface timeout; retrying next frame");
                        }
                        other => {
                            warn!("surface error: {other:?}; retrying next frame");
                        }
                    },
                    Err(RedrawError::Device(err)) => {
                        error!(error = %err, "evaluation device failed; exiting viewer");
                        elwt.exit();
                    }
                },
                _ => {}
            }
        }
        Event::AboutToWait => {
            // Accumulation keeps refining while nothing changes, so always
            // schedule another frame.
            state.window().request_redraw();
            elwt.set_control_flow(ControlFlow::Poll);
        }
        _ => {}
    });

    run_result.map_err(|err| anyhow!("window event loop error: {err}"))
}
