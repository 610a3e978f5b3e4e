//! wgpu rendering context.
//!
//! This module is responsible for:
//! - creating the wgpu Instance/Adapter/Device/Queue and the window surface
//! - owning every GPU object named through [`GraphicsContext`](crate::context::GraphicsContext)
//! - recording a frame's binds and draws, then encoding and presenting them

mod frame;
mod gpu;
mod init;
mod objects;
mod pipeline;
mod surface;

pub use gpu::Gpu;
pub use init::GpuInit;
pub use surface::SurfaceErrorAction;
