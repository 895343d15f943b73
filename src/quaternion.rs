//! Rotation helpers for head position quaternions
//!
//! Averaging uses the weighted outer-product (rank-one update) method: the
//! average rotation is the eigenvector of the largest eigenvalue of
//! `sum(w_i * q_i * q_i^T)`. This is insensitive to the sign of each `q_i`.

use nalgebra::{Matrix4, Quaternion, SymmetricEigen, UnitQuaternion, Vector4};

use crate::error::{ArtifactError, Result};

/// Unit quaternion from its vector part, with a non-negative scalar part
pub fn quat_from_components(q: [f64; 3]) -> UnitQuaternion<f64> {
    let w_sq = 1.0 - q[0] * q[0] - q[1] * q[1] - q[2] * q[2];
    if w_sq < -1e-6 {
        log::warn!(
            "Quaternion vector part {:?} has norm {:.6} > 1; renormalising with zero scalar part",
            q,
            (1.0 - w_sq).sqrt()
        );
    }
    let w = w_sq.max(0.0).sqrt();
    UnitQuaternion::new_normalize(Quaternion::new(w, q[0], q[1], q[2]))
}

/// Vector part of a rotation, sign chosen so the scalar part is non-negative
pub fn quat_to_components(q: &UnitQuaternion<f64>) -> [f64; 3] {
    let sign = if q.scalar() < 0.0 { -1.0 } else { 1.0 };
    let v = q.vector();
    [sign * v[0], sign * v[1], sign * v[2]]
}

/// Rotation angle in radians taking `a` to `b`, in `[0, pi]`
pub fn angle_between(a: &UnitQuaternion<f64>, b: &UnitQuaternion<f64>) -> f64 {
    let dot = a.coords.dot(&b.coords).abs().min(1.0);
    2.0 * dot.acos()
}

/// Weighted average rotation
///
/// Weights must be finite and non-negative with a positive sum.
pub fn average_quaternions(
    quats: &[UnitQuaternion<f64>],
    weights: &[f64],
) -> Result<UnitQuaternion<f64>> {
    if quats.is_empty() {
        return Err(ArtifactError::EmptyInput(
            "no quaternions to average".to_string(),
        ));
    }
    if quats.len() != weights.len() {
        return Err(ArtifactError::InvalidParameter(format!(
            "{} quaternions but {} weights",
            quats.len(),
            weights.len()
        )));
    }
    if let Some(w) = weights.iter().find(|w| !(w.is_finite() && **w >= 0.0)) {
        return Err(ArtifactError::InvalidParameter(format!(
            "quaternion weights must be non-negative, got {}",
            w
        )));
    }
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return Err(ArtifactError::InvalidParameter(
            "quaternion weights sum to zero".to_string(),
        ));
    }

    let mut accum = Matrix4::<f64>::zeros();
    for (q, &w) in quats.iter().zip(weights) {
        let v: Vector4<f64> = q.coords;
        accum += (w / total) * v * v.transpose();
    }

    let eigen = SymmetricEigen::new(accum);
    let best = eigen.eigenvalues.imax();
    let mut avg: Vector4<f64> = eigen.eigenvectors.column(best).into_owned();

    // coords are stored as (i, j, k, w)
    if avg[3] < 0.0 {
        avg = -avg;
    }

    Ok(UnitQuaternion::new_normalize(Quaternion::from_vector(avg)))
}
