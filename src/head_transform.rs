//! Device-to-head transform averaged over good head positions

use nalgebra::Vector3;

use crate::error::{ArtifactError, Result};
use crate::profile_scope;
use crate::quaternion::average_quaternions;
use crate::transform::RigidTransform;
use crate::types::{validate_pose_series, HeadPoseSample, RecordingTiming, SampleSpan};

/// Average device-to-head transform over the parts of the recording not
/// covered by `bad_spans`.
///
/// Each head position fit holds until the next one (the last until the end
/// of the recording) and is weighted by the good time it covers.
pub fn compute_average_dev_head_t(
    pos: &[HeadPoseSample],
    timing: &RecordingTiming,
    bad_spans: &[SampleSpan],
) -> Result<RigidTransform> {
    profile_scope!("average head transform");
    validate_pose_series(pos)?;

    let sample_rate = timing.sample_rate;
    let period = timing.sample_period();
    let mut hp_ts: Vec<f64> = pos.iter().map(|p| p.time - timing.first_time()).collect();

    // Rounding at time zero
    if hp_ts[0] < 0.0 {
        if let Some(&next) = hp_ts.get(1) {
            if !(next > period) {
                return Err(ArtifactError::RoundingGap { gap: next, period });
            }
        }
        hp_ts[0] = 0.0;
    }

    let last_time = timing.last_time();
    let kept: Vec<usize> = (0..pos.len()).filter(|&i| hp_ts[i] <= last_time).collect();
    if kept.len() < pos.len() {
        log::info!(
            "Removing {} head positions > last sample time ({})",
            pos.len() - kept.len(),
            last_time
        );
    }
    if kept.is_empty() {
        return Err(ArtifactError::DataConsistency(format!(
            "all head positions are after the last sample time ({}s)",
            last_time
        )));
    }

    let mut ts: Vec<f64> = kept.iter().map(|&i| hp_ts[i]).collect();
    ts.push(timing.n_samples as f64 / sample_rate);

    let idx = sample_indices(&ts, timing)?;

    let mut good = vec![1.0; timing.n_samples];
    for span in bad_spans {
        let span = span.clamp_to(timing.n_samples);
        good[span.start..span.stop].iter_mut().for_each(|g| *g = 0.0);
    }

    let mut cumulative = Vec::with_capacity(good.len() + 1);
    cumulative.push(0.0);
    let mut acc = 0.0;
    for g in &good {
        acc += g;
        cumulative.push(acc);
    }

    let weights: Vec<f64> = idx
        .windows(2)
        .map(|w| (cumulative[w[1]] - cumulative[w[0]]) / sample_rate)
        .collect();
    let total: f64 = weights.iter().sum();
    if !(total > 0.0) {
        return Err(ArtifactError::NoGoodData);
    }

    let translation = kept
        .iter()
        .zip(&weights)
        .map(|(&i, &w)| pos[i].translation_vector() * w)
        .sum::<Vector3<f64>>()
        / total;

    let quats: Vec<_> = kept.iter().map(|&i| pos[i].quaternion()).collect();
    let rotation = average_quaternions(&quats, &weights)?;

    log::debug!(
        "Averaged {} head positions over {:.3}s of good data",
        kept.len(),
        total
    );

    RigidTransform::dev_head_checked(&rotation, &translation)
}

/// Nearest sample index of each boundary time, checked to be strictly
/// increasing and to end exactly at the sample count.
fn sample_indices(ts: &[f64], timing: &RecordingTiming) -> Result<Vec<usize>> {
    let mut idx: Vec<i64> = ts.iter().map(|&t| timing.time_as_index(t)).collect();

    if idx[0] == -1 {
        idx[0] = 0;
    }
    if let Some(i) = idx.iter().position(|&v| v < 0) {
        return Err(ArtifactError::DataConsistency(format!(
            "head position {} maps to negative sample index {}",
            i, idx[i]
        )));
    }
    if let Some(i) = idx.windows(2).position(|w| w[1] <= w[0]) {
        return Err(ArtifactError::DataConsistency(format!(
            "head positions {} and {} map to sample indices {} and {}",
            i,
            i + 1,
            idx[i],
            idx[i + 1]
        )));
    }
    let last = idx[idx.len() - 1];
    if last != timing.n_samples as i64 {
        return Err(ArtifactError::DataConsistency(format!(
            "head position coverage ends at sample {}, expected {}",
            last, timing.n_samples
        )));
    }

    Ok(idx.into_iter().map(|v| v as usize).collect())
}
