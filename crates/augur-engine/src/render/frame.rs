use glam::{Mat4, Vec3};

use crate::math::{MarkerId, TrackerPose, ViewportRect};
use crate::tracking::TrackingState;
use crate::RenderError;

/// One eye (or the single mono view) of a frame.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct EyeView {
    /// Fraction of the render target this view covers.
    pub viewport: ViewportRect,
    pub projection: Mat4,
    /// Offset of this eye from the device view.
    pub eye_transform: Mat4,
}

impl EyeView {
    pub fn mono(projection: Mat4) -> Self {
        Self {
            viewport: ViewportRect::FULL,
            projection,
            eye_transform: Mat4::IDENTITY,
        }
    }

    /// Left and right halves, each eye shifted by half of `eye_separation`
    /// along X.
    pub fn stereo(projection: Mat4, eye_separation: f32) -> [Self; 2] {
        let half = eye_separation * 0.5;
        [
            Self {
                viewport: ViewportRect::LEFT_HALF,
                projection,
                eye_transform: Mat4::from_translation(Vec3::new(half, 0.0, 0.0)),
            },
            Self {
                viewport: ViewportRect::RIGHT_HALF,
                projection,
                eye_transform: Mat4::from_translation(Vec3::new(-half, 0.0, 0.0)),
            },
        ]
    }

    /// `projection · eye`, the matrix handed to the composer.
    #[inline]
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.eye_transform
    }
}

/// Everything the host supplies for one frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameInput<'a> {
    /// Tracker result for this frame.
    pub tracking: Option<TrackerPose>,
    /// Device/viewer view transform.
    pub device_view: Mat4,
    /// Views to render. Empty means one full-surface view with `projection`.
    pub views: &'a [EyeView],
    pub projection: Mat4,
}

impl<'a> FrameInput<'a> {
    pub fn new(tracking: Option<TrackerPose>, projection: Mat4) -> Self {
        Self {
            tracking,
            device_view: Mat4::IDENTITY,
            views: &[],
            projection,
        }
    }

    #[inline]
    pub fn with_device_view(mut self, view: Mat4) -> Self {
        self.device_view = view;
        self
    }

    #[inline]
    pub fn with_views(mut self, views: &'a [EyeView]) -> Self {
        self.views = views;
        self
    }
}

/// How a frame ended.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    Presented,
    /// Recorded work was discarded; the next frame starts clean.
    Abandoned(RenderError),
}

/// What `render_frame` did.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    pub frame_index: u64,
    pub outcome: FrameOutcome,
    pub tracking: TrackingState,
    /// Marker whose objects were drawn (tracked or fallback).
    pub active_marker: Option<MarkerId>,
    pub object_draws: usize,
    pub background_pass: bool,
    pub distortion_pass: bool,
    /// Render targets were (re)created before this frame.
    pub reconfigured: bool,
    /// A new context generation was detected. Scene assets were dropped and
    /// must be loaded again by the host.
    pub context_restored: bool,
}

impl FrameReport {
    pub(super) fn new(frame_index: u64, tracking: TrackingState) -> Self {
        Self {
            frame_index,
            outcome: FrameOutcome::Presented,
            tracking,
            active_marker: None,
            object_draws: 0,
            background_pass: false,
            distortion_pass: false,
            reconfigured: false,
            context_restored: false,
        }
    }

    #[inline]
    pub fn is_presented(&self) -> bool {
        matches!(self.outcome, FrameOutcome::Presented)
    }

    pub fn error(&self) -> Option<&RenderError> {
        match &self.outcome {
            FrameOutcome::Presented => None,
            FrameOutcome::Abandoned(e) => Some(e),
        }
    }
}
