//! Window + runtime loop.
//!
//! Owns the `winit` EventLoop and Window, wires them to the GPU layer and
//! paces redraws at a fixed rate.

mod runtime;

pub use runtime::{Runtime, RuntimeConfig};
