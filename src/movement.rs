//! Head movement artifact detection
//!
//! Three independent checks over a continuous head position series:
//! rotational velocity between consecutive fits, translational velocity
//! between consecutive fits, and displacement of head landmarks from their
//! duration-weighted mean position. Each enabled check emits its own
//! annotation description.

use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

use crate::annotations::{annotations_from_mask, Annotations};
use crate::error::{ArtifactError, Result};
use crate::mask::segment;
use crate::profile_scope;
use crate::quaternion::angle_between;
use crate::report::{LogReporter, OmissionReporter, OmissionSummary};
use crate::transform::RigidTransform;
use crate::types::{validate_pose_series, HeadPoseSample, RecordingTiming, SampleSpan};

/// Kind of movement check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementCheck {
    RotationVelocity,
    TranslationVelocity,
    MeanDistance,
}

impl MovementCheck {
    /// Annotation description emitted by this check
    pub fn description(&self) -> &'static str {
        match self {
            Self::RotationVelocity => "BAD_mov_rotat_vel",
            Self::TranslationVelocity => "BAD_mov_trans_vel",
            Self::MeanDistance => "BAD_mov_dist",
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            Self::RotationVelocity => "°/s",
            Self::TranslationVelocity => "m/s",
            Self::MeanDistance => "m",
        }
    }
}

impl std::fmt::Display for MovementCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::RotationVelocity => "rotation velocity",
            Self::TranslationVelocity => "translation velocity",
            Self::MeanDistance => "mean distance",
        };
        f.write_str(name)
    }
}

/// Limits for movement detection; `None` disables a check
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MovementLimits {
    /// Degrees per second
    #[serde(default)]
    pub rotation_velocity: Option<f64>,
    /// Meters per second
    #[serde(default)]
    pub translation_velocity: Option<f64>,
    /// Meters from the mean head position
    #[serde(default)]
    pub mean_distance: Option<f64>,
}

impl MovementLimits {
    pub fn validate(&self) -> Result<()> {
        let checks = [
            (MovementCheck::RotationVelocity, self.rotation_velocity),
            (MovementCheck::TranslationVelocity, self.translation_velocity),
            (MovementCheck::MeanDistance, self.mean_distance),
        ];
        for (check, limit) in checks {
            if let Some(value) = limit {
                if !(value.is_finite() && value > 0.0) {
                    return Err(ArtifactError::InvalidLimit { check, value });
                }
            }
        }
        Ok(())
    }
}

/// Output of movement detection
#[derive(Debug, Clone)]
pub struct MovementDetection {
    pub annotations: Annotations,
    /// Distance of each landmark from its mean position, `[pose][landmark]`.
    /// Empty when the distance check is disabled.
    pub displacement: Vec<Vec<f64>>,
}

/// Movement detector for a fixed set of limits and head landmarks
#[derive(Debug, Clone)]
pub struct MovementDetector {
    limits: MovementLimits,
    landmarks: Vec<Point3<f64>>,
}

impl MovementDetector {
    /// `landmarks` are the digitised head points used by the distance check
    pub fn new(limits: MovementLimits, landmarks: Vec<Point3<f64>>) -> Result<Self> {
        limits.validate()?;
        if limits.mean_distance.is_some() && landmarks.is_empty() {
            return Err(ArtifactError::InvalidParameter(
                "mean distance check needs at least one head landmark".to_string(),
            ));
        }
        Ok(Self { limits, landmarks })
    }

    pub fn limits(&self) -> &MovementLimits {
        &self.limits
    }

    pub fn detect(
        &self,
        pos: &[HeadPoseSample],
        timing: &RecordingTiming,
        bad_spans: &[SampleSpan],
    ) -> Result<MovementDetection> {
        self.detect_with_reporter(pos, timing, bad_spans, &mut LogReporter)
    }

    pub fn detect_with_reporter(
        &self,
        pos: &[HeadPoseSample],
        timing: &RecordingTiming,
        bad_spans: &[SampleSpan],
        reporter: &mut dyn OmissionReporter,
    ) -> Result<MovementDetection> {
        profile_scope!("movement detection");
        validate_pose_series(pos)?;

        let period = timing.sample_period();
        let mut hp_ts: Vec<f64> = pos.iter().map(|p| p.time - timing.first_time()).collect();
        let dt: Vec<f64> = hp_ts.windows(2).map(|w| w[1] - w[0]).collect();
        let weights = segment_weights(&hp_ts, period, bad_spans, timing.sample_rate);
        if let Some(&last) = hp_ts.last() {
            hp_ts.push(last + period);
        }

        let t_tot = timing.last_time();
        let mut annotations = Annotations::new();

        if let Some(limit) = self.limits.rotation_velocity {
            let quats: Vec<_> = pos.iter().map(|p| p.quaternion()).collect();
            let velocity: Vec<f64> = quats
                .windows(2)
                .zip(&dt)
                .map(|(q, dt)| angle_between(&q[0], &q[1]) / dt)
                .collect();
            let mask: Vec<bool> = velocity.iter().map(|&v| v >= limit.to_radians()).collect();
            let max = velocity.iter().copied().fold(0.0, f64::max).to_degrees();
            annotations += flag(MovementCheck::RotationVelocity, &mask, &hp_ts, t_tot, limit, max, reporter);
        }

        if let Some(limit) = self.limits.translation_velocity {
            let velocity: Vec<f64> = pos
                .windows(2)
                .zip(&dt)
                .map(|(p, dt)| (p[1].translation_vector() - p[0].translation_vector()).norm() / dt)
                .collect();
            let mask: Vec<bool> = velocity.iter().map(|&v| v >= limit).collect();
            let max = velocity.iter().copied().fold(0.0, f64::max);
            annotations += flag(MovementCheck::TranslationVelocity, &mask, &hp_ts, t_tot, limit, max, reporter);
        }

        let mut displacement = Vec::new();
        if let Some(limit) = self.limits.mean_distance {
            displacement = self.landmark_displacement(pos, &weights)?;
            let mask: Vec<bool> = displacement
                .iter()
                .map(|row| row.iter().any(|&d| d > limit))
                .collect();
            let max = displacement.iter().flatten().copied().fold(0.0, f64::max);
            annotations += flag(MovementCheck::MeanDistance, &mask, &hp_ts, t_tot, limit, max, reporter);
        }

        Ok(MovementDetection {
            annotations,
            displacement,
        })
    }

    /// Distance of every landmark from its weighted mean position
    fn landmark_displacement(&self, pos: &[HeadPoseSample], weights: &[f64]) -> Result<Vec<Vec<f64>>> {
        let total: f64 = weights.iter().sum();
        if !(total > 0.0) {
            return Err(ArtifactError::NoGoodData);
        }

        let moved: Vec<Vec<Point3<f64>>> = pos
            .iter()
            .map(|p| {
                RigidTransform::head_to_device(&p.quaternion(), &p.translation_vector())
                    .apply_all(&self.landmarks)
            })
            .collect();

        let mean: Vec<Vector3<f64>> = (0..self.landmarks.len())
            .map(|j| {
                moved
                    .iter()
                    .zip(weights)
                    .map(|(points, &w)| points[j].coords * w)
                    .sum::<Vector3<f64>>()
                    / total
            })
            .collect();

        Ok(moved
            .iter()
            .map(|points| {
                points
                    .iter()
                    .zip(&mean)
                    .map(|(p, m)| (p.coords - m).norm())
                    .collect()
            })
            .collect())
    }
}

/// Annotate head movement with the given limits, logging omitted shares
pub fn annotate_movement(
    pos: &[HeadPoseSample],
    timing: &RecordingTiming,
    bad_spans: &[SampleSpan],
    landmarks: &[Point3<f64>],
    limits: &MovementLimits,
) -> Result<MovementDetection> {
    MovementDetector::new(*limits, landmarks.to_vec())?.detect(pos, timing, bad_spans)
}

/// Report and annotate the runs flagged by one check
fn flag(
    check: MovementCheck,
    mask: &[bool],
    hp_ts: &[f64],
    total_time: f64,
    limit: f64,
    max: f64,
    reporter: &mut dyn OmissionReporter,
) -> Annotations {
    reporter.report(&OmissionSummary::from_runs(
        check.description(),
        &segment(mask),
        hp_ts,
        total_time,
        limit,
        max,
        check.unit(),
    ));
    annotations_from_mask(hp_ts, mask, check.description())
}

/// Good duration of each pose segment.
///
/// Segment `i` runs from `hp_ts[i]` to `hp_ts[i + 1]`, the last one for one
/// sample period. Time covered by bad spans does not count.
fn segment_weights(hp_ts: &[f64], period: f64, bad_spans: &[SampleSpan], sample_rate: f64) -> Vec<f64> {
    let bad_times: Vec<(f64, f64)> = merge_spans(bad_spans)
        .iter()
        .map(|s| (s.start as f64 / sample_rate, s.stop as f64 / sample_rate))
        .collect();

    (0..hp_ts.len())
        .map(|i| {
            let start = hp_ts[i];
            let end = hp_ts.get(i + 1).copied().unwrap_or(start + period);
            let overlap: f64 = bad_times
                .iter()
                .map(|&(bad_start, bad_end)| (end.min(bad_end) - start.max(bad_start)).max(0.0))
                .sum();
            (end - start - overlap).max(0.0)
        })
        .collect()
}

/// Union of possibly overlapping spans, sorted
fn merge_spans(spans: &[SampleSpan]) -> Vec<SampleSpan> {
    let mut sorted: Vec<SampleSpan> = spans.iter().copied().filter(|s| !s.is_empty()).collect();
    sorted.sort();

    let mut merged: Vec<SampleSpan> = Vec::with_capacity(sorted.len());
    for span in sorted {
        match merged.last_mut() {
            Some(last) if span.start <= last.stop => last.stop = last.stop.max(span.stop),
            _ => merged.push(span),
        }
    }
    merged
}
