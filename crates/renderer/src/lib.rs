//! Presentation layer for fractalview.
//!
//! ```text
//!   fractalview CLI
//!          │ ViewerConfig
//!          ▼
//!   run_window ──▶ WindowState ──▶ Session::step ──▶ CpuDevice
//!          │                            │
//!          │                            └─▶ PngSequenceSink (captures)
//!          └─▶ GpuState::upload / render ──▶ wgpu surface
//!
//!   run_headless ──▶ Session::step loop, no window
//! ```
//!
//! The device evaluates frames on the CPU; this crate only moves the
//! resolved pixels onto a wgpu surface, maps keys to navigation, and writes
//! captured frames.

mod compile;
mod gpu;
mod headless;
mod input;
mod sink;
mod types;
mod window;

pub use headless::{run_headless, HeadlessReport};
pub use sink::{write_png, PngSequenceSink};
pub use types::{scaled_resolution, GpuPowerPreference, StartupAction, ViewerConfig};
pub use window::run_window;
