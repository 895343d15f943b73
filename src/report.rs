//! Reporting of how much data a detector marks as bad

use serde::Serialize;

use crate::types::SampleSpan;

/// Summary of one detector check
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OmissionSummary {
    /// Annotation description produced by the check
    pub description: String,
    /// Share of the recording marked bad, in percent
    pub percent: f64,
    pub segments: usize,
    pub limit: f64,
    /// Largest value of the checked quantity
    pub max: f64,
    pub unit: &'static str,
}

impl OmissionSummary {
    /// Summarise runs of a mask whose entry `i` covers `times[i]..times[i + 1]`
    pub fn from_runs(
        description: &str,
        runs: &[SampleSpan],
        times: &[f64],
        total_time: f64,
        limit: f64,
        max: f64,
        unit: &'static str,
    ) -> Self {
        let last = times.len().saturating_sub(1);
        let omitted: f64 = runs
            .iter()
            .map(|run| times[run.stop.min(last)] - times[run.start.min(last)])
            .sum();
        let percent = if total_time > 0.0 {
            100.0 * omitted / total_time
        } else {
            0.0
        };
        Self {
            description: description.to_string(),
            percent,
            segments: runs.len(),
            limit,
            max,
            unit,
        }
    }
}

impl std::fmt::Display for OmissionSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Omitting {:5.1}% ({:3} segments): {} >= {:.4}{} (max: {:.4}{})",
            self.percent, self.segments, self.description, self.limit, self.unit, self.max, self.unit
        )
    }
}

/// Sink for omission summaries
pub trait OmissionReporter {
    fn report(&mut self, summary: &OmissionSummary);
}

/// Writes summaries to the `log` facade at info level
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl OmissionReporter for LogReporter {
    fn report(&mut self, summary: &OmissionSummary) {
        log::info!("{}", summary);
    }
}

/// Keeps summaries in memory
#[derive(Debug, Default, Clone)]
pub struct CollectingReporter {
    pub summaries: Vec<OmissionSummary>,
}

impl OmissionReporter for CollectingReporter {
    fn report(&mut self, summary: &OmissionSummary) {
        self.summaries.push(summary.clone());
    }
}
