//! Pose and surface geometry types.
//!
//! Matrices are `glam` column-major `Mat4`s. Conventions follow wgpu: clip
//! space depth runs 0..1, so projections come from `Mat4::perspective_rh`.

mod pose;
mod surface;

pub use glam::{Mat4, Quat, Vec2, Vec3, Vec4};
pub use pose::{MarkerId, Pose, TrackerPose};
pub use surface::{SurfaceSize, Viewport, ViewportRect};
