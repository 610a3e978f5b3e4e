//! Per-frame orchestration.
//!
//! [`FrameRenderer`] owns every GPU resource of the AR view (programs,
//! render targets, scene assets) and turns one [`FrameInput`] into one
//! presented or abandoned frame, described by a [`FrameReport`].

mod config;
mod frame;
mod renderer;

pub use config::{RendererConfig, ViewerDistortion, SKY_COLOR};
pub use frame::{EyeView, FrameInput, FrameOutcome, FrameReport};
pub use renderer::FrameRenderer;
