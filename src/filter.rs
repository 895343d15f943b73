//! Filter service used by the detectors
//!
//! The detectors only depend on the [`SignalFilter`] trait. The default
//! [`ButterworthFilter`] designs Butterworth second-order sections with the
//! bilinear transform and runs them forward and backward (zero phase) over an
//! odd-reflected padding of the signal. Envelopes come from the FFT analytic
//! signal.

use rustfft::{num_complex::Complex, FftPlanner};
use std::cell::RefCell;
use std::f64::consts::PI;

use crate::error::{ArtifactError, Result};

thread_local! {
    static FFT_PLANNER: RefCell<FftPlanner<f64>> = RefCell::new(FftPlanner::new());
}

/// Filtering collaborator of the detectors
pub trait SignalFilter: Send + Sync {
    /// Band-pass `data` to `[low, high]` Hz
    fn band_pass(&self, data: &[f64], sample_rate: f64, low: f64, high: f64) -> Result<Vec<f64>>;

    /// Low-pass `data` below `cutoff` Hz
    fn low_pass(&self, data: &[f64], sample_rate: f64, cutoff: f64) -> Result<Vec<f64>>;

    /// Amplitude of the analytic signal
    fn hilbert_envelope(&self, data: &[f64]) -> Vec<f64>;
}

/// Second-order section (biquad) coefficients
/// Transfer function: H(z) = (b0 + b1*z^-1 + b2*z^-2) / (1 + a1*z^-1 + a2*z^-2)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoeffs {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

/// Cascade of biquads, Direct Form II Transposed
#[derive(Debug, Clone)]
pub struct SosFilter {
    sections: Vec<BiquadCoeffs>,
}

impl SosFilter {
    pub fn new(sections: Vec<BiquadCoeffs>) -> Self {
        Self { sections }
    }

    pub fn sections(&self) -> &[BiquadCoeffs] {
        &self.sections
    }

    /// Single causal pass, starting from the steady state of the first sample
    pub fn process_signal(&self, signal: &mut [f64]) {
        let Some(&first) = signal.first() else {
            return;
        };

        let mut level = first;
        for c in &self.sections {
            let steady = level * (c.b0 + c.b1 + c.b2) / (1.0 + c.a1 + c.a2);
            let mut z1 = steady - c.b0 * level;
            let mut z2 = c.b2 * level - c.a2 * steady;
            for sample in signal.iter_mut() {
                let input = *sample;
                let output = c.b0 * input + z1;
                z1 = c.b1 * input - c.a1 * output + z2;
                z2 = c.b2 * input - c.a2 * output;
                *sample = output;
            }
            level = steady;
        }
    }

    /// Forward-backward pass over an odd-reflected extension of `signal`
    pub fn filtfilt(&self, signal: &[f64], pad_len: usize) -> Vec<f64> {
        let n = signal.len();
        if n == 0 {
            return Vec::new();
        }
        let pad = pad_len.min(n - 1);

        let mut ext = Vec::with_capacity(n + 2 * pad);
        let first = signal[0];
        let last = signal[n - 1];
        ext.extend((1..=pad).rev().map(|i| 2.0 * first - signal[i]));
        ext.extend_from_slice(signal);
        ext.extend((1..=pad).map(|i| 2.0 * last - signal[n - 1 - i]));

        self.process_signal(&mut ext);
        ext.reverse();
        self.process_signal(&mut ext);
        ext.reverse();

        ext[pad..pad + n].to_vec()
    }
}

/// Butterworth section designers
pub mod butterworth {
    use super::*;

    /// Prewarp frequency for bilinear transform
    fn prewarp(freq: f64, sample_rate: f64) -> f64 {
        (PI * freq / sample_rate).tan()
    }

    pub fn lowpass(cutoff: f64, sample_rate: f64, order: usize) -> SosFilter {
        SosFilter::new(lowpass_sections(prewarp(cutoff, sample_rate), order))
    }

    /// Highpass at `low` cascaded with lowpass at `high`
    pub fn bandpass(low: f64, high: f64, sample_rate: f64, order: usize) -> SosFilter {
        let mut sections = highpass_sections(prewarp(low, sample_rate), order);
        sections.extend(lowpass_sections(prewarp(high, sample_rate), order));
        SosFilter::new(sections)
    }

    /// Damping term of the k-th analog pole pair, `s^2 + damping*s + 1`
    fn damping(k: usize, order: usize) -> f64 {
        2.0 * (PI * (2 * k + 1) as f64 / (2 * order) as f64).sin()
    }

    fn lowpass_sections(wn: f64, order: usize) -> Vec<BiquadCoeffs> {
        let n_sections = (order + 1) / 2;
        (0..n_sections)
            .map(|k| {
                if order % 2 == 1 && k == n_sections - 1 {
                    // First-order section: H(s) = wn / (s + wn)
                    let g = wn / (1.0 + wn);
                    BiquadCoeffs {
                        b0: g,
                        b1: g,
                        b2: 0.0,
                        a1: (wn - 1.0) / (wn + 1.0),
                        a2: 0.0,
                    }
                } else {
                    let d = damping(k, order);
                    let wn2 = wn * wn;
                    let denom = 1.0 + d * wn + wn2;
                    BiquadCoeffs {
                        b0: wn2 / denom,
                        b1: 2.0 * wn2 / denom,
                        b2: wn2 / denom,
                        a1: 2.0 * (wn2 - 1.0) / denom,
                        a2: (1.0 - d * wn + wn2) / denom,
                    }
                }
            })
            .collect()
    }

    fn highpass_sections(wn: f64, order: usize) -> Vec<BiquadCoeffs> {
        let n_sections = (order + 1) / 2;
        (0..n_sections)
            .map(|k| {
                if order % 2 == 1 && k == n_sections - 1 {
                    let g = 1.0 / (1.0 + wn);
                    BiquadCoeffs {
                        b0: g,
                        b1: -g,
                        b2: 0.0,
                        a1: (wn - 1.0) / (wn + 1.0),
                        a2: 0.0,
                    }
                } else {
                    let d = damping(k, order);
                    let wn2 = wn * wn;
                    let denom = 1.0 + d * wn + wn2;
                    BiquadCoeffs {
                        b0: 1.0 / denom,
                        b1: -2.0 / denom,
                        b2: 1.0 / denom,
                        a1: 2.0 * (wn2 - 1.0) / denom,
                        a2: (1.0 - d * wn + wn2) / denom,
                    }
                }
            })
            .collect()
    }
}

/// Zero-phase Butterworth filtering with FFT envelopes
#[derive(Debug, Clone, Copy)]
pub struct ButterworthFilter {
    pub order: usize,
}

impl Default for ButterworthFilter {
    fn default() -> Self {
        Self { order: 4 }
    }
}

impl ButterworthFilter {
    pub fn new(order: usize) -> Result<Self> {
        if order == 0 {
            return Err(ArtifactError::InvalidParameter(
                "filter order must be at least 1".to_string(),
            ));
        }
        Ok(Self { order })
    }

    /// Three periods of the lowest cutoff, in samples
    fn pad_len(sample_rate: f64, lowest_cutoff: f64) -> usize {
        (3.0 * sample_rate / lowest_cutoff).ceil() as usize
    }
}

fn check_cutoff(name: &str, freq: f64, sample_rate: f64) -> Result<()> {
    let nyquist = sample_rate / 2.0;
    if !(freq.is_finite() && freq > 0.0 && freq < nyquist) {
        return Err(ArtifactError::InvalidParameter(format!(
            "{} ({} Hz) must be between 0 and Nyquist ({} Hz)",
            name, freq, nyquist
        )));
    }
    Ok(())
}

impl SignalFilter for ButterworthFilter {
    fn band_pass(&self, data: &[f64], sample_rate: f64, low: f64, high: f64) -> Result<Vec<f64>> {
        check_cutoff("Low cutoff", low, sample_rate)?;
        check_cutoff("High cutoff", high, sample_rate)?;
        if low >= high {
            return Err(ArtifactError::InvalidParameter(format!(
                "Low cutoff ({} Hz) must be less than high cutoff ({} Hz)",
                low, high
            )));
        }
        let sos = butterworth::bandpass(low, high, sample_rate, self.order);
        Ok(sos.filtfilt(data, Self::pad_len(sample_rate, low)))
    }

    fn low_pass(&self, data: &[f64], sample_rate: f64, cutoff: f64) -> Result<Vec<f64>> {
        check_cutoff("Cutoff frequency", cutoff, sample_rate)?;
        let sos = butterworth::lowpass(cutoff, sample_rate, self.order);
        Ok(sos.filtfilt(data, Self::pad_len(sample_rate, cutoff)))
    }

    fn hilbert_envelope(&self, data: &[f64]) -> Vec<f64> {
        let n = data.len();
        if n == 0 {
            return Vec::new();
        }

        let mut buffer: Vec<Complex<f64>> = data.iter().map(|&x| Complex::new(x, 0.0)).collect();

        FFT_PLANNER.with(|planner| {
            let mut planner = planner.borrow_mut();
            planner.plan_fft_forward(n).process(&mut buffer);

            // Keep DC (and Nyquist for even n), double positive, drop negative frequencies
            let half = n / 2;
            let positive_end = if n % 2 == 0 { half } else { half + 1 };
            for value in buffer.iter_mut().take(positive_end).skip(1) {
                *value *= 2.0;
            }
            for value in buffer.iter_mut().skip(half + 1) {
                *value = Complex::new(0.0, 0.0);
            }

            planner.plan_fft_inverse(n).process(&mut buffer);
        });

        let scale = 1.0 / n as f64;
        buffer.iter().map(|c| c.norm() * scale).collect()
    }
}
