use glam::{Mat4, Vec4};

use crate::math::{MarkerId, Pose};

/// Default clear color behind the augmentation.
pub const SKY_COLOR: [f32; 4] = [0.4, 0.5, 0.6, 1.0];

/// Lens pre-warp parameters of a head-mounted viewer.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ViewerDistortion {
    /// Radial coefficients: `r' = r (1 + k1 r² + k2 r⁴)`.
    pub k1: f32,
    pub k2: f32,
    /// Eyes laid side by side in the offscreen image.
    pub eye_count: u32,
    /// Applied after the warp so the lens edge stays inside the eye.
    pub scale: f32,
    /// Orientation of the full-screen quad (e.g. a 90° turn for portrait
    /// viewers).
    pub projection: Mat4,
}

impl ViewerDistortion {
    /// Packed as `distortionParams`.
    pub fn params(&self) -> Vec4 {
        Vec4::new(self.k1, self.k2, self.eye_count.max(1) as f32, self.scale)
    }
}

impl Default for ViewerDistortion {
    fn default() -> Self {
        Self {
            k1: 0.22,
            k2: 0.24,
            eye_count: 2,
            scale: 0.8,
            projection: Mat4::IDENTITY,
        }
    }
}

/// Session settings of the renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct RendererConfig {
    pub background: [f32; 4],

    /// Keep drawing the last seen marker's objects when tracking is lost.
    pub off_target_enabled: bool,

    /// Marker drawn off target before any marker has been tracked.
    pub fallback_marker: MarkerId,

    /// Render into the offscreen target and warp it for viewer lenses.
    pub distortion: Option<ViewerDistortion>,

    /// Target transform used while off target.
    pub fallback_pose: Pose,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            background: SKY_COLOR,
            off_target_enabled: false,
            fallback_marker: MarkerId(0),
            distortion: None,
            fallback_pose: Pose::IDENTITY,
        }
    }
}
