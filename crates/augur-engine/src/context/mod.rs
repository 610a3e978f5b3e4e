//! The rendering-context seam.
//!
//! [`GraphicsContext`] is the one handle through which the core talks to a
//! GPU. It is passed explicitly into every component instead of living in
//! process-wide state, which makes teardown and context loss observable and
//! testable. [`HeadlessContext`] records everything it is asked to do.

mod backend;
mod headless;

pub use backend::{
    GraphicsContext, Location, RawHandle, ResourceDescriptor, ResourceKind, TextureFormat,
    UniformValue,
};
pub use headless::{Command, DrawCall, FrameLog, FrameStatus, HeadlessContext};
