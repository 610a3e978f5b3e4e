use glam::Mat4;

use crate::math::{MarkerId, Pose, TrackerPose};

use super::state::{StateMachine, TrackingState};

/// Turns per-frame tracker output into model-view-projection matrices.
///
/// MVP = projection · device view · target · local, where *target* is the
/// latest valid marker pose while on target and the fallback transform
/// otherwise.
#[derive(Debug, Clone)]
pub struct PoseComposer {
    machine: StateMachine,
    current: Option<TrackerPose>,
    last_seen: Option<MarkerId>,
    /// Stands in for `last_seen` before the first sighting.
    default_marker: MarkerId,
    device_view: Mat4,
    fallback: Pose,
    off_target_enabled: bool,
}

impl Default for PoseComposer {
    fn default() -> Self {
        Self::new(false, Pose::IDENTITY)
    }
}

impl PoseComposer {
    pub fn new(off_target_enabled: bool, fallback: Pose) -> Self {
        Self {
            machine: StateMachine::default(),
            current: None,
            last_seen: None,
            default_marker: MarkerId(0),
            device_view: Mat4::IDENTITY,
            fallback,
            off_target_enabled,
        }
    }

    /// Marker drawn off target when none has been seen yet.
    #[inline]
    pub fn with_default_marker(mut self, marker: MarkerId) -> Self {
        self.default_marker = marker;
        self
    }

    /// Consumes this frame's tracking result. A pose with non-finite
    /// components counts as no pose.
    pub fn update(&mut self, pose: Option<TrackerPose>) -> TrackingState {
        let pose = pose.filter(|p| {
            let finite = p.pose.is_finite();
            if !finite {
                log::debug!("discarding non-finite pose for marker {}", p.marker.0);
            }
            finite
        });

        let next = match pose {
            Some(p) => {
                self.last_seen = Some(p.marker);
                TrackingState::OnTarget
            }
            None => TrackingState::OffTarget,
        };
        self.current = pose;

        if let Some((previous, frames)) = self.machine.advance(next) {
            log::debug!("tracking {previous:?} -> {next:?} after {frames} frames");
        }
        next
    }

    #[inline]
    pub fn state(&self) -> TrackingState {
        self.machine.state()
    }

    #[inline]
    pub fn frames_in_state(&self) -> u64 {
        self.machine.frames_in_state()
    }

    /// True iff the last update supplied a valid pose.
    #[inline]
    pub fn current_visibility(&self) -> bool {
        self.state().is_on_target()
    }

    /// Viewer/device view transform applied to every object. Independent of
    /// target tracking.
    #[inline]
    pub fn set_device_view(&mut self, view: Mat4) {
        self.device_view = view;
    }

    #[inline]
    pub fn device_view(&self) -> Mat4 {
        self.device_view
    }

    pub fn set_off_target_enabled(&mut self, enabled: bool) {
        self.off_target_enabled = enabled;
    }

    #[inline]
    pub fn off_target_enabled(&self) -> bool {
        self.off_target_enabled
    }

    /// Marker tracked this frame.
    #[inline]
    pub fn target_marker(&self) -> Option<MarkerId> {
        self.current.map(|p| p.marker)
    }

    /// Marker whose objects keep drawing while off target: the last one
    /// seen, or the default marker before any sighting. `None` when on
    /// target or when off-target mode is disabled.
    pub fn fallback_marker(&self) -> Option<MarkerId> {
        match self.state() {
            TrackingState::OffTarget if self.off_target_enabled => {
                Some(self.last_seen.unwrap_or(self.default_marker))
            }
            _ => None,
        }
    }

    /// Marker whose objects are drawn this frame, if any.
    #[inline]
    pub fn active_marker(&self) -> Option<MarkerId> {
        self.target_marker().or_else(|| self.fallback_marker())
    }

    /// Target transform in effect: the tracked pose, or the fallback.
    pub fn target_transform(&self) -> Mat4 {
        match self.current {
            Some(p) => p.pose.matrix(),
            None => self.fallback.matrix(),
        }
    }

    pub fn compose_model_view_projection(&self, local: Mat4, projection: Mat4) -> Mat4 {
        projection * self.device_view * self.target_transform() * local
    }
}
