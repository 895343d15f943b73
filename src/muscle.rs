//! Muscle artifact detection
//!
//! Pipeline:
//! 1. Band-pass every channel to the muscle band (110-140 Hz by default)
//! 2. Envelope via the analytic signal
//! 3. Z-score each envelope over time, bad samples excluded
//! 4. Sum across channels and divide by sqrt(n_channels)
//! 5. Low-pass the combined score at 4 Hz
//! 6. Threshold, then absorb good gaps shorter than `min_length_good`

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::annotations::{annotations_from_mask, Annotations};
use crate::error::{ArtifactError, Result};
use crate::filter::{ButterworthFilter, SignalFilter};
use crate::mask::{absorb_short_runs, segment};
use crate::profile_scope;
use crate::report::{LogReporter, OmissionReporter, OmissionSummary};
use crate::types::{ChannelType, SampleSpan, SignalBuffer};

/// Description given to muscle annotations
pub const MUSCLE_DESCRIPTION: &str = "BAD_muscle";

/// Configuration for muscle artifact detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MuscleConfig {
    /// Z-score threshold on the combined score
    #[serde(default = "default_threshold")]
    pub threshold: f64,

    /// Band-pass edges in Hz
    #[serde(default = "default_filter_band")]
    pub filter_band: (f64, f64),

    /// Good segments shorter than this (seconds) are marked bad
    #[serde(default = "default_min_length_good")]
    pub min_length_good: Option<f64>,

    /// Low-pass cutoff applied to the combined score (Hz)
    #[serde(default = "default_smoothing_cutoff")]
    pub smoothing_cutoff: f64,

    /// Butterworth order of the default filter
    #[serde(default = "default_filter_order")]
    pub filter_order: usize,

    /// Channel indices to analyse, all channels when absent
    #[serde(default)]
    pub picks: Option<Vec<usize>>,
}

fn default_threshold() -> f64 {
    4.0
}
fn default_filter_band() -> (f64, f64) {
    (110.0, 140.0)
}
fn default_min_length_good() -> Option<f64> {
    Some(0.1)
}
fn default_smoothing_cutoff() -> f64 {
    4.0
}
fn default_filter_order() -> usize {
    4
}

impl Default for MuscleConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            filter_band: default_filter_band(),
            min_length_good: default_min_length_good(),
            smoothing_cutoff: default_smoothing_cutoff(),
            filter_order: default_filter_order(),
            picks: None,
        }
    }
}

impl MuscleConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.threshold.is_finite() {
            return Err(ArtifactError::InvalidParameter(format!(
                "threshold must be finite, got {}",
                self.threshold
            )));
        }
        let (low, high) = self.filter_band;
        if !(low > 0.0 && low < high) {
            return Err(ArtifactError::InvalidParameter(format!(
                "filter band must satisfy 0 < low < high, got ({}, {})",
                low, high
            )));
        }
        if let Some(min_good) = self.min_length_good {
            if !(min_good.is_finite() && min_good >= 0.0) {
                return Err(ArtifactError::InvalidParameter(format!(
                    "min_length_good must be non-negative, got {}",
                    min_good
                )));
            }
        }
        if !(self.smoothing_cutoff.is_finite() && self.smoothing_cutoff > 0.0) {
            return Err(ArtifactError::InvalidParameter(format!(
                "smoothing cutoff must be positive, got {}",
                self.smoothing_cutoff
            )));
        }
        if self.filter_order == 0 {
            return Err(ArtifactError::InvalidParameter(
                "filter order must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Output of muscle detection
#[derive(Debug, Clone)]
pub struct MuscleDetection {
    pub annotations: Annotations,
    /// Smoothed combined z-score per sample
    pub scores: Vec<f64>,
}

/// Muscle artifact detector over a pluggable filter
pub struct MuscleDetector<F: SignalFilter = ButterworthFilter> {
    config: MuscleConfig,
    filter: F,
}

impl MuscleDetector<ButterworthFilter> {
    pub fn new(config: MuscleConfig) -> Result<Self> {
        let filter = ButterworthFilter::new(config.filter_order)?;
        Self::with_filter(config, filter)
    }
}

impl<F: SignalFilter> MuscleDetector<F> {
    pub fn with_filter(config: MuscleConfig, filter: F) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, filter })
    }

    pub fn config(&self) -> &MuscleConfig {
        &self.config
    }

    /// Detect muscle artifacts, logging the omitted share
    pub fn detect(&self, signal: &SignalBuffer, bad_spans: &[SampleSpan]) -> Result<MuscleDetection> {
        self.detect_with_reporter(signal, bad_spans, &mut LogReporter)
    }

    pub fn detect_with_reporter(
        &self,
        signal: &SignalBuffer,
        bad_spans: &[SampleSpan],
        reporter: &mut dyn OmissionReporter,
    ) -> Result<MuscleDetection> {
        profile_scope!("muscle detection");

        let signal = self.select_channels(signal)?;
        let sample_rate = signal.sample_rate();
        let n_samples = signal.n_samples();
        let (low, high) = self.config.filter_band;

        log::info!(
            "Muscle detection on {} {} channels, {} samples at {} Hz, band {}-{} Hz",
            signal.n_channels(),
            signal.channels[0].kind,
            n_samples,
            sample_rate,
            low,
            high
        );

        let envelopes = signal
            .channels
            .par_iter()
            .map(|ch| -> Result<Vec<f64>> {
                let filtered = self.filter.band_pass(&ch.samples, sample_rate, low, high)?;
                Ok(self.filter.hilbert_envelope(&filtered))
            })
            .collect::<Result<Vec<Vec<f64>>>>()?;

        let mut combined = vec![0.0; n_samples];
        for (ch, mut envelope) in signal.channels.iter().zip(envelopes) {
            for span in bad_spans {
                let span = span.clamp_to(n_samples);
                envelope[span.start..span.stop]
                    .iter_mut()
                    .for_each(|v| *v = f64::NAN);
            }
            let z = zscore_omit_nan(&envelope);
            if z.iter().all(|v| *v == 0.0 || v.is_nan()) {
                log::warn!("Channel '{}' has no envelope variance", ch.name);
            }
            combined.iter_mut().zip(&z).for_each(|(acc, v)| *acc += v);
        }

        let norm = (signal.n_channels() as f64).sqrt();
        combined.iter_mut().for_each(|v| *v /= norm);

        // NaN regions count as borderline, neither bad nor good
        let threshold = self.config.threshold;
        let scores: Vec<f64> = self
            .smooth_finite_runs(&combined, sample_rate)?
            .into_iter()
            .map(|s| if s.is_nan() { threshold } else { s })
            .collect();

        let mut mask: Vec<bool> = scores.iter().map(|&s| s > threshold).collect();
        if let Some(min_good) = self.config.min_length_good {
            let absorbed = absorb_short_runs(&mut mask, min_good * sample_rate);
            log::debug!("Absorbed {} good segments shorter than {}s", absorbed, min_good);
        }

        let times = signal.timing.times();
        let max_score = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        reporter.report(&OmissionSummary::from_runs(
            MUSCLE_DESCRIPTION,
            &segment(&mask),
            &times,
            signal.timing.last_time(),
            threshold,
            max_score,
            "",
        ));

        Ok(MuscleDetection {
            annotations: annotations_from_mask(&times, &mask, MUSCLE_DESCRIPTION),
            scores,
        })
    }

    /// Picked channels, MEG reference channels removed, single type enforced
    fn select_channels(&self, signal: &SignalBuffer) -> Result<SignalBuffer> {
        let mut picked = match &self.config.picks {
            Some(picks) => signal.pick(picks)?,
            None => signal.clone(),
        };

        if picked.channels.iter().any(|ch| ch.kind.is_meg()) {
            picked.channels.retain(|ch| ch.kind != ChannelType::RefMeg);
        }

        let kinds: BTreeSet<ChannelType> = picked.channels.iter().map(|ch| ch.kind).collect();
        if kinds.len() > 1 {
            let names: Vec<&str> = kinds.iter().map(|k| k.as_str()).collect();
            return Err(ArtifactError::MixedChannelTypes(names.join(", ")));
        }
        if picked.channels.is_empty() {
            return Err(ArtifactError::EmptyInput(
                "no channels left for muscle detection".to_string(),
            ));
        }

        Ok(picked)
    }

    /// Low-pass each finite run on its own; NaN samples stay NaN
    fn smooth_finite_runs(&self, combined: &[f64], sample_rate: f64) -> Result<Vec<f64>> {
        let finite: Vec<bool> = combined.iter().map(|v| v.is_finite()).collect();
        let mut smoothed = vec![f64::NAN; combined.len()];

        for run in segment(&finite) {
            let filtered = self.filter.low_pass(
                &combined[run.start..run.stop],
                sample_rate,
                self.config.smoothing_cutoff,
            )?;
            smoothed[run.start..run.stop].copy_from_slice(&filtered);
        }

        Ok(smoothed)
    }
}

/// Annotate muscle artifacts with the default filter
pub fn annotate_muscle_zscore(
    signal: &SignalBuffer,
    bad_spans: &[SampleSpan],
    config: &MuscleConfig,
) -> Result<MuscleDetection> {
    MuscleDetector::new(config.clone())?.detect(signal, bad_spans)
}

/// Z-score over finite values; non-finite positions become NaN.
/// A series without variance maps to zeros.
pub fn zscore_omit_nan(data: &[f64]) -> Vec<f64> {
    let (count, sum) = data
        .iter()
        .filter(|v| v.is_finite())
        .fold((0usize, 0.0), |(n, s), v| (n + 1, s + v));
    if count == 0 {
        return vec![f64::NAN; data.len()];
    }
    let mean = sum / count as f64;
    let var = data
        .iter()
        .filter(|v| v.is_finite())
        .map(|v| (v - mean).powi(2))
        .sum::<f64>()
        / count as f64;
    let std = var.sqrt();

    data.iter()
        .map(|&v| {
            if !v.is_finite() {
                f64::NAN
            } else if std > 0.0 {
                (v - mean) / std
            } else {
                0.0
            }
        })
        .collect()
}
