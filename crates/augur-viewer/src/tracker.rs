use augur_engine::math::{MarkerId, Mat4, Pose, Quat, TrackerPose, Vec3};

/// Stand-in for a marker tracker.
///
/// Cycles through `marker_count` markers, one per `period` frames. The target
/// orbits slowly in front of the camera and is reported lost for the last
/// `dropout` frames of every period. Output depends only on the frame index,
/// so headless runs are reproducible.
#[derive(Debug, Clone)]
pub struct SimulatedTracker {
    marker_count: u32,
    period: u64,
    dropout: u64,
    distance: f32,
    radius: f32,
}

impl SimulatedTracker {
    pub fn new(marker_count: u32) -> Self {
        Self {
            marker_count: marker_count.max(1),
            period: 240,
            dropout: 40,
            distance: 300.0,
            radius: 40.0,
        }
    }

    /// Frames per marker and how many of them report no pose.
    pub fn with_dropout(mut self, period: u64, dropout: u64) -> Self {
        self.period = period.max(1);
        self.dropout = dropout.min(self.period);
        self
    }

    pub fn marker_count(&self) -> u32 {
        self.marker_count
    }

    /// Tracker result for `frame`.
    pub fn poll(&self, frame: u64) -> Option<TrackerPose> {
        let cycle = frame / self.period;
        let phase = frame % self.period;
        if phase >= self.period - self.dropout {
            return None;
        }

        let marker = MarkerId((cycle % u64::from(self.marker_count)) as u32);
        Some(TrackerPose::new(marker, self.pose_at(frame)))
    }

    fn pose_at(&self, frame: u64) -> Pose {
        let angle = frame as f32 * 0.02;
        let position = Vec3::new(
            self.radius * angle.cos(),
            self.radius * 0.5 * angle.sin(),
            -self.distance,
        );
        // Marker faces the camera, wobbling a little around Y.
        let rotation = Quat::from_rotation_y(0.35 * angle.sin());
        Pose::from_matrix(Mat4::from_rotation_translation(rotation, position))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_out_at_the_end_of_each_period() {
        let tracker = SimulatedTracker::new(2).with_dropout(10, 3);
        let seen: Vec<bool> = (0..10).map(|f| tracker.poll(f).is_some()).collect();
        assert_eq!(seen, [true, true, true, true, true, true, true, false, false, false]);
    }

    #[test]
    fn cycles_through_markers() {
        let tracker = SimulatedTracker::new(3).with_dropout(10, 0);
        let markers: Vec<u32> = [0, 10, 20, 30]
            .into_iter()
            .filter_map(|f| tracker.poll(f))
            .map(|p| p.marker.0)
            .collect();
        assert_eq!(markers, [0, 1, 2, 0]);
    }

    #[test]
    fn poses_are_finite_and_in_front_of_the_camera() {
        let tracker = SimulatedTracker::new(1).with_dropout(1000, 0);
        for frame in 0..500 {
            let pose = tracker.poll(frame).unwrap().pose;
            assert!(pose.is_finite());
            assert!(pose.translation().z < 0.0);
        }
    }

    #[test]
    fn same_frame_same_pose() {
        let tracker = SimulatedTracker::new(4);
        assert_eq!(tracker.poll(77), tracker.poll(77));
    }
}
