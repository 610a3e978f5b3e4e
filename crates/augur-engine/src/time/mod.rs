//! Time subsystem.
//!
//! Fixed-rate frame pacing without coupling to the runtime:
//! - one `FramePacer` per window
//! - wait until `next_deadline()`, then call `tick()` once per rendered frame

mod frame_pacer;

pub use frame_pacer::{FramePacer, FrameTime, DEFAULT_FRAME_RATE};
