use serde::{Deserialize, Serialize};

use crate::error::{ArtifactError, Result};
use nalgebra::{UnitQuaternion, Vector3};

/// Channel type label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelType {
    Mag,
    Grad,
    RefMeg,
    Eeg,
    Emg,
    Eog,
    Ecg,
    Misc,
}

impl ChannelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mag => "mag",
            Self::Grad => "grad",
            Self::RefMeg => "ref_meg",
            Self::Eeg => "eeg",
            Self::Emg => "emg",
            Self::Eog => "eog",
            Self::Ecg => "ecg",
            Self::Misc => "misc",
        }
    }

    pub fn is_meg(&self) -> bool {
        matches!(self, Self::Mag | Self::Grad)
    }
}

impl std::fmt::Display for ChannelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sample grid of a recording
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecordingTiming {
    /// Sampling rate in Hz
    pub sample_rate: f64,
    /// Index of the first sample relative to acquisition start
    pub first_sample: u64,
    /// Number of samples in the recording
    pub n_samples: usize,
}

impl RecordingTiming {
    pub fn new(sample_rate: f64, first_sample: u64, n_samples: usize) -> Result<Self> {
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(ArtifactError::InvalidParameter(format!(
                "sample rate must be positive, got {}",
                sample_rate
            )));
        }
        if n_samples == 0 {
            return Err(ArtifactError::EmptyInput(
                "recording has no samples".to_string(),
            ));
        }
        Ok(Self {
            sample_rate,
            first_sample,
            n_samples,
        })
    }

    pub fn sample_period(&self) -> f64 {
        1.0 / self.sample_rate
    }

    /// Acquisition time of the first sample in seconds
    pub fn first_time(&self) -> f64 {
        self.first_sample as f64 / self.sample_rate
    }

    /// Time of the last sample, relative to the first one
    pub fn last_time(&self) -> f64 {
        (self.n_samples - 1) as f64 / self.sample_rate
    }

    /// Sample times relative to the first sample
    pub fn times(&self) -> Vec<f64> {
        (0..self.n_samples)
            .map(|i| i as f64 / self.sample_rate)
            .collect()
    }

    /// Nearest sample index of a time relative to the first sample
    pub fn time_as_index(&self, time: f64) -> i64 {
        (time * self.sample_rate).round() as i64
    }
}

/// Half-open range of sample indices `[start, stop)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SampleSpan {
    pub start: usize,
    pub stop: usize,
}

impl SampleSpan {
    pub fn new(start: usize, stop: usize) -> Self {
        Self { start, stop }
    }

    pub fn len(&self) -> usize {
        self.stop.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.stop <= self.start
    }

    /// Clip to `[0, n)`. An inverted span comes back empty, so the result is
    /// always safe to slice with.
    pub fn clamp_to(&self, n: usize) -> Self {
        let start = self.start.min(n);
        Self {
            start,
            stop: self.stop.min(n).max(start),
        }
    }
}

/// A single named channel of samples
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    pub name: String,
    pub kind: ChannelType,
    pub samples: Vec<f64>,
}

impl Channel {
    pub fn new(name: impl Into<String>, kind: ChannelType, samples: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            kind,
            samples,
        }
    }
}

/// Multi-channel signal sharing one sample grid
#[derive(Debug, Clone)]
pub struct SignalBuffer {
    pub timing: RecordingTiming,
    pub channels: Vec<Channel>,
}

impl SignalBuffer {
    pub fn new(sample_rate: f64, first_sample: u64, channels: Vec<Channel>) -> Result<Self> {
        let n_samples = channels
            .first()
            .map(|ch| ch.samples.len())
            .ok_or_else(|| ArtifactError::EmptyInput("signal has no channels".to_string()))?;

        if let Some(ch) = channels.iter().find(|ch| ch.samples.len() != n_samples) {
            return Err(ArtifactError::InvalidParameter(format!(
                "channel '{}' has {} samples, expected {}",
                ch.name,
                ch.samples.len(),
                n_samples
            )));
        }

        let timing = RecordingTiming::new(sample_rate, first_sample, n_samples)?;
        Ok(Self { timing, channels })
    }

    pub fn n_channels(&self) -> usize {
        self.channels.len()
    }

    pub fn n_samples(&self) -> usize {
        self.timing.n_samples
    }

    pub fn sample_rate(&self) -> f64 {
        self.timing.sample_rate
    }

    pub fn channel_types(&self) -> Vec<ChannelType> {
        self.channels.iter().map(|ch| ch.kind).collect()
    }

    /// Copy of the selected channels, in the given order
    pub fn pick(&self, indices: &[usize]) -> Result<Self> {
        let channels = indices
            .iter()
            .map(|&idx| {
                self.channels.get(idx).cloned().ok_or_else(|| {
                    ArtifactError::InvalidParameter(format!(
                        "channel index {} out of range (0..{})",
                        idx,
                        self.channels.len()
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        if channels.is_empty() {
            return Err(ArtifactError::EmptyInput("no channels picked".to_string()));
        }

        Ok(Self {
            timing: self.timing,
            channels,
        })
    }
}

/// One continuous head position fit
///
/// `rotation` holds the vector part of a unit quaternion, the scalar part is
/// implied non-negative. Translation is in meters, device frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeadPoseSample {
    pub time: f64,
    pub rotation: [f64; 3],
    pub translation: [f64; 3],
    #[serde(default)]
    pub goodness_of_fit: f64,
    #[serde(default)]
    pub error: f64,
    #[serde(default)]
    pub velocity: f64,
}

impl HeadPoseSample {
    pub const ROW_LEN: usize = 10;

    pub fn new(time: f64, rotation: [f64; 3], translation: [f64; 3]) -> Self {
        Self {
            time,
            rotation,
            translation,
            goodness_of_fit: 0.0,
            error: 0.0,
            velocity: 0.0,
        }
    }

    /// Parse a `[t, q1, q2, q3, x, y, z, gof, err, v]` row
    pub fn from_row(row: &[f64]) -> Result<Self> {
        if row.len() != Self::ROW_LEN {
            return Err(ArtifactError::InvalidParameter(format!(
                "head position row must have {} columns, got {}",
                Self::ROW_LEN,
                row.len()
            )));
        }
        Ok(Self {
            time: row[0],
            rotation: [row[1], row[2], row[3]],
            translation: [row[4], row[5], row[6]],
            goodness_of_fit: row[7],
            error: row[8],
            velocity: row[9],
        })
    }

    pub fn quaternion(&self) -> UnitQuaternion<f64> {
        crate::quaternion::quat_from_components(self.rotation)
    }

    pub fn translation_vector(&self) -> Vector3<f64> {
        Vector3::from(self.translation)
    }
}

/// Check that a head position series is non-empty and strictly increasing in time
pub fn validate_pose_series(pos: &[HeadPoseSample]) -> Result<()> {
    if pos.is_empty() {
        return Err(ArtifactError::EmptyInput(
            "head position series is empty".to_string(),
        ));
    }
    for (i, pair) in pos.windows(2).enumerate() {
        if !(pair[1].time > pair[0].time) {
            return Err(ArtifactError::NonIncreasingTimestamps {
                index: i + 1,
                previous: pair[0].time,
                current: pair[1].time,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timing_times() {
        let timing = RecordingTiming::new(100.0, 50, 5).unwrap();
        assert_eq!(timing.times(), vec![0.0, 0.01, 0.02, 0.03, 0.04]);
        assert!((timing.first_time() - 0.5).abs() < 1e-12);
        assert!((timing.last_time() - 0.04).abs() < 1e-12);
        assert_eq!(timing.time_as_index(0.026), 3);
    }

    #[test]
    fn test_clamp_to() {
        assert_eq!(SampleSpan::new(5, 20).clamp_to(10), SampleSpan::new(5, 10));
        assert_eq!(SampleSpan::new(15, 20).clamp_to(10), SampleSpan::new(10, 10));

        let inverted = SampleSpan::new(8, 3).clamp_to(10);
        assert!(inverted.is_empty());
        assert_eq!(inverted.len(), 0);
        assert!(inverted.start <= inverted.stop);
    }

    #[test]
    fn test_signal_buffer_rejects_ragged_channels() {
        let channels = vec![
            Channel::new("MEG0111", ChannelType::Mag, vec![0.0; 10]),
            Channel::new("MEG0121", ChannelType::Mag, vec![0.0; 9]),
        ];
        assert!(SignalBuffer::new(1000.0, 0, channels).is_err());
    }

    #[test]
    fn test_pick_copies_channels() {
        let channels = vec![
            Channel::new("EEG001", ChannelType::Eeg, vec![1.0; 4]),
            Channel::new("EEG002", ChannelType::Eeg, vec![2.0; 4]),
        ];
        let signal = SignalBuffer::new(250.0, 0, channels).unwrap();
        let picked = signal.pick(&[1]).unwrap();
        assert_eq!(picked.n_channels(), 1);
        assert_eq!(picked.channels[0].name, "EEG002");
        assert!(signal.pick(&[2]).is_err());
        assert!(signal.pick(&[]).is_err());
    }

    #[test]
    fn test_pose_row_parsing() {
        let row = [1.0, 0.1, 0.0, 0.0, 0.0, 0.01, 0.04, 0.99, 0.002, 0.0];
        let sample = HeadPoseSample::from_row(&row).unwrap();
        assert_eq!(sample.translation, [0.0, 0.01, 0.04]);
        assert!(HeadPoseSample::from_row(&row[..7]).is_err());
    }

    #[test]
    fn test_non_increasing_timestamps() {
        let pos = vec![
            HeadPoseSample::new(0.0, [0.0; 3], [0.0; 3]),
            HeadPoseSample::new(0.1, [0.0; 3], [0.0; 3]),
            HeadPoseSample::new(0.1, [0.0; 3], [0.0; 3]),
        ];
        let err = validate_pose_series(&pos).unwrap_err();
        assert!(err.is_usage_error());
        assert!(matches!(
            err,
            ArtifactError::NonIncreasingTimestamps { index: 2, .. }
        ));
    }
}
