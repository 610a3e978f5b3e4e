//! Augur engine crate.
//!
//! Renders tracked AR content: the tracker's pose is composed with per-object
//! transforms, drawn with the augmentation program, and optionally warped by a
//! full-screen lens-distortion pass for head-mounted viewers.
//!
//! Every component receives the rendering context explicitly as
//! `&mut dyn GraphicsContext`; the wgpu implementation lives in [`device`],
//! the recording one in [`context::HeadlessContext`].

pub mod context;
pub mod core;
pub mod device;
pub mod framebuffer;
pub mod logging;
pub mod math;
pub mod render;
pub mod resource;
pub mod scene;
pub mod shader;
pub mod time;
pub mod tracking;
pub mod window;

mod error;

pub use error::{RenderError, ShaderStageKind};
