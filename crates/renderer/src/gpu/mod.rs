//! Presentation of device frames through wgpu.
//!
//! - `context` owns the instance, surface, and device, and reconfigures the
//!   swapchain when the window resizes.
//! - `pipeline` builds the full-screen present pipeline and its uniform block.
//! - `state` uploads each evaluated frame to a texture and draws it.

mod context;
mod pipeline;
mod state;

pub(crate) use state::GpuState;
