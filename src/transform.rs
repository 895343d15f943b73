use nalgebra::{Matrix3, Matrix4, Point3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::{ArtifactError, Result};

/// Largest translation accepted for a device-to-head transform, in meters
pub const MAX_HEAD_TRANSLATION: f64 = 1.0;

/// Coordinate frame of a transform endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordFrame {
    /// MEG device frame
    Meg,
    Head,
}

/// 4x4 homogeneous rigid transform between two frames
#[derive(Debug, Clone, PartialEq)]
pub struct RigidTransform {
    pub from: CoordFrame,
    pub to: CoordFrame,
    pub matrix: Matrix4<f64>,
}

impl RigidTransform {
    pub fn from_pose(
        rotation: &UnitQuaternion<f64>,
        translation: &Vector3<f64>,
        from: CoordFrame,
        to: CoordFrame,
    ) -> Self {
        let mut matrix = Matrix4::identity();
        matrix
            .fixed_view_mut::<3, 3>(0, 0)
            .copy_from(rotation.to_rotation_matrix().matrix());
        matrix.fixed_view_mut::<3, 1>(0, 3).copy_from(translation);
        Self { from, to, matrix }
    }

    /// Pose of the head in the device frame, mapping head-frame points such
    /// as digitised landmarks into device coordinates
    pub fn head_to_device(rotation: &UnitQuaternion<f64>, translation: &Vector3<f64>) -> Self {
        Self::from_pose(rotation, translation, CoordFrame::Head, CoordFrame::Meg)
    }

    /// Device-to-head transform from an averaged pose, rejecting translations
    /// of a meter or more.
    pub fn dev_head_checked(
        rotation: &UnitQuaternion<f64>,
        translation: &Vector3<f64>,
    ) -> Result<Self> {
        let magnitude = translation.norm();
        if !(magnitude < MAX_HEAD_TRANSLATION) {
            return Err(ArtifactError::ImplausibleTranslation { magnitude });
        }
        Ok(Self::from_pose(
            rotation,
            translation,
            CoordFrame::Meg,
            CoordFrame::Head,
        ))
    }

    pub fn rotation(&self) -> Matrix3<f64> {
        self.matrix.fixed_view::<3, 3>(0, 0).into_owned()
    }

    pub fn translation(&self) -> Vector3<f64> {
        self.matrix.fixed_view::<3, 1>(0, 3).into_owned()
    }

    pub fn apply(&self, point: &Point3<f64>) -> Point3<f64> {
        self.matrix.transform_point(point)
    }

    pub fn apply_all(&self, points: &[Point3<f64>]) -> Vec<Point3<f64>> {
        points.iter().map(|p| self.apply(p)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_pose_applies_rotation_then_translation() {
        let rot = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), std::f64::consts::FRAC_PI_2);
        let t = Vector3::new(0.0, 0.0, 0.05);
        let trans = RigidTransform::from_pose(&rot, &t, CoordFrame::Meg, CoordFrame::Head);

        let p = trans.apply(&Point3::new(0.1, 0.0, 0.0));
        assert!((p.x - 0.0).abs() < 1e-12);
        assert!((p.y - 0.1).abs() < 1e-12);
        assert!((p.z - 0.05).abs() < 1e-12);
        assert_eq!(trans.translation(), t);
    }

    #[test]
    fn test_head_to_device_frames() {
        let t = Vector3::new(0.0, 0.01, 0.04);
        let trans = RigidTransform::head_to_device(&UnitQuaternion::identity(), &t);
        assert_eq!((trans.from, trans.to), (CoordFrame::Head, CoordFrame::Meg));

        let nasion = trans.apply(&Point3::new(0.0, 0.09, 0.0));
        assert!((nasion.coords - Vector3::new(0.0, 0.1, 0.04)).norm() < 1e-12);
    }

    #[test]
    fn test_implausible_translation_is_rejected() {
        let rot = UnitQuaternion::identity();
        let err = RigidTransform::dev_head_checked(&rot, &Vector3::new(2.0, 0.0, 0.0)).unwrap_err();
        assert!(err.is_data_consistency_error());
        assert!(matches!(err, ArtifactError::ImplausibleTranslation { magnitude } if magnitude == 2.0));

        assert!(RigidTransform::dev_head_checked(&rot, &Vector3::new(1.0, 0.0, 0.0)).is_err());
        assert!(RigidTransform::dev_head_checked(&rot, &Vector3::new(0.0, 0.02, 0.05)).is_ok());
    }
}
