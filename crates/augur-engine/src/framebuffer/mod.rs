//! Render target lifecycle.
//!
//! Two attachment sets are kept in step with the surface: the default one
//! (presentable color + depth) and an offscreen one whose color texture can
//! be sampled by the distortion pass.

mod manager;

pub use manager::{FramebufferManager, TargetKind};
