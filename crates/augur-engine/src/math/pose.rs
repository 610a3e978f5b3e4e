use glam::{Mat4, Vec3, Vec4};

/// Identifier of the physical marker a pose was estimated from.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct MarkerId(pub u32);

/// Rigid view transform (orientation + position) reported by a tracker.
///
/// Poses live for one frame; nothing in the engine keeps them past the next
/// tracker update.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Pose(Mat4);

impl Pose {
    pub const IDENTITY: Pose = Pose(Mat4::IDENTITY);

    #[inline]
    pub const fn from_matrix(matrix: Mat4) -> Self {
        Self(matrix)
    }

    /// Builds a pose from a row-major 3x4 matrix (rotation | translation),
    /// the layout trackers usually report. The missing row is `[0 0 0 1]`.
    pub fn from_matrix34(rows: [[f32; 4]; 3]) -> Self {
        let [r0, r1, r2] = rows;
        Self(Mat4::from_cols(
            Vec4::new(r0[0], r1[0], r2[0], 0.0),
            Vec4::new(r0[1], r1[1], r2[1], 0.0),
            Vec4::new(r0[2], r1[2], r2[2], 0.0),
            Vec4::new(r0[3], r1[3], r2[3], 1.0),
        ))
    }

    #[inline]
    pub fn from_translation(translation: Vec3) -> Self {
        Self(Mat4::from_translation(translation))
    }

    #[inline]
    pub fn matrix(self) -> Mat4 {
        self.0
    }

    #[inline]
    pub fn translation(self) -> Vec3 {
        self.0.w_axis.truncate()
    }

    /// A pose containing NaN or infinity cannot be drawn and is treated as
    /// "no pose" by the composer.
    #[inline]
    pub fn is_finite(self) -> bool {
        self.0.is_finite()
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// One frame's tracking result for a recognized marker.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TrackerPose {
    pub marker: MarkerId,
    pub pose: Pose,
}

impl TrackerPose {
    #[inline]
    pub fn new(marker: MarkerId, pose: Pose) -> Self {
        Self { marker, pose }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matrix34_places_translation_in_last_column() {
        let pose = Pose::from_matrix34([
            [1.0, 0.0, 0.0, 10.0],
            [0.0, 1.0, 0.0, 20.0],
            [0.0, 0.0, 1.0, 30.0],
        ]);
        assert_eq!(pose.translation(), Vec3::new(10.0, 20.0, 30.0));
        assert_eq!(pose.matrix().row(3), Vec4::new(0.0, 0.0, 0.0, 1.0));
    }

    #[test]
    fn matrix34_rotation_is_row_major() {
        // 90 degrees about Z: x axis maps to +y.
        let pose = Pose::from_matrix34([
            [0.0, -1.0, 0.0, 0.0],
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
        ]);
        let x = pose.matrix().transform_vector3(Vec3::X);
        assert_eq!(x, Vec3::Y);
    }

    #[test]
    fn non_finite_pose_detected() {
        let mut m = Mat4::IDENTITY;
        m.w_axis.x = f32::NAN;
        assert!(!Pose::from_matrix(m).is_finite());
        assert!(Pose::IDENTITY.is_finite());
    }
}
