use engine::{Camera, CaptureRequest, NavigationOptions, SceneOptions};

/// Adapter power preference forwarded to wgpu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GpuPowerPreference {
    #[default]
    Low,
    High,
}

/// Capture job started as soon as the viewer comes up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StartupAction {
    /// Interactive navigation only. Headless runs write a single still.
    #[default]
    None,
    Preview,
    Render,
}

/// Everything a viewer run needs, resolved from config files and flags.
#[derive(Debug, Clone)]
pub struct ViewerConfig {
    pub surface_size: (u32, u32),
    /// Fraction of the window resolution the device evaluates; the presenter
    /// scales the result up. Headless runs always use `surface_size`.
    pub render_scale: f32,
    pub camera: Camera,
    pub options: SceneOptions,
    pub navigation: NavigationOptions,
    /// Defaults for captures started from the keyboard or at startup.
    pub capture: CaptureRequest,
    pub startup: StartupAction,
    pub gpu_power: GpuPowerPreference,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            surface_size: (960, 540),
            render_scale: 0.5,
            camera: Camera::default(),
            options: SceneOptions::default(),
            navigation: NavigationOptions::default(),
            capture: CaptureRequest::default(),
            startup: StartupAction::None,
            gpu_power: GpuPowerPreference::default(),
        }
    }
}

/// Device resolution for a surface of `size` at `scale`.
pub fn scaled_resolution(size: (u32, u32), scale: f32) -> (u32, u32) {
    let scale = if scale.is_finite() { scale.clamp(0.05, 1.0) } else { 1.0 };
    let scaled = |value: u32| ((value as f32 * scale).round() as u32).max(1);
    (scaled(size.0), scaled(size.1))
}
