//! Annotation intervals and mask conversion

use serde::{Deserialize, Serialize};

use crate::mask::segment;
use crate::types::{RecordingTiming, SampleSpan};

/// A labelled time interval, onset relative to the first sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub onset: f64,
    pub duration: f64,
    pub description: String,
}

impl Annotation {
    pub fn new(onset: f64, duration: f64, description: impl Into<String>) -> Self {
        Self {
            onset,
            duration,
            description: description.into(),
        }
    }

    pub fn offset(&self) -> f64 {
        self.onset + self.duration
    }

    /// Whether the description marks the interval as bad
    pub fn is_bad(&self) -> bool {
        self.description
            .get(..3)
            .map(|prefix| prefix.eq_ignore_ascii_case("bad"))
            .unwrap_or(false)
    }
}

/// Ordered collection of annotations
///
/// Overlapping intervals are kept as they are.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Annotations {
    entries: Vec<Annotation>,
}

impl Annotations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, annotation: Annotation) {
        self.entries.push(annotation);
    }

    /// Append all entries of `other`
    pub fn extend(&mut self, other: Annotations) {
        self.entries.extend(other.entries);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Annotation> {
        self.entries.iter()
    }

    pub fn with_description<'a>(&'a self, description: &'a str) -> impl Iterator<Item = &'a Annotation> {
        self.entries
            .iter()
            .filter(move |a| a.description == description)
    }

    pub fn total_duration(&self) -> f64 {
        self.entries.iter().map(|a| a.duration).sum()
    }

    /// Sample spans of all bad annotations, sorted by onset
    ///
    /// Onset and offset are rounded to the nearest sample and clipped to the
    /// recording.
    pub fn bad_spans(&self, timing: &RecordingTiming) -> Vec<SampleSpan> {
        let n = timing.n_samples as i64;
        let mut spans: Vec<SampleSpan> = self
            .entries
            .iter()
            .filter(|a| a.is_bad())
            .map(|a| {
                let start = timing.time_as_index(a.onset).clamp(0, n) as usize;
                let stop = timing.time_as_index(a.offset()).clamp(0, n) as usize;
                SampleSpan::new(start, stop)
            })
            .filter(|span| !span.is_empty())
            .collect();
        spans.sort();
        spans
    }
}

impl std::ops::AddAssign for Annotations {
    fn add_assign(&mut self, rhs: Self) {
        self.extend(rhs);
    }
}

impl FromIterator<Annotation> for Annotations {
    fn from_iter<I: IntoIterator<Item = Annotation>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Annotations {
    type Item = Annotation;
    type IntoIter = std::vec::IntoIter<Annotation>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a Annotations {
    type Item = &'a Annotation;
    type IntoIter = std::slice::Iter<'a, Annotation>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Build one annotation per connected run of `true` in `mask`.
///
/// `times[i]` is the time of mask entry `i`; `times` may be longer than the
/// mask. A run ends at the time following its last entry, or at its last
/// entry's own time when no later time exists.
pub fn annotations_from_mask(times: &[f64], mask: &[bool], description: &str) -> Annotations {
    let n_times = times.len();
    let usable = &mask[..mask.len().min(n_times)];

    segment(usable)
        .into_iter()
        .map(|run| {
            let onset = times[run.start];
            let end = if run.stop < n_times {
                times[run.stop]
            } else {
                times[run.stop - 1]
            };
            Annotation::new(onset, end - onset, description)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_annotations_from_mask() {
        let times = [0.0, 0.5, 1.0, 1.5, 2.0, 2.5];
        let mask = [false, true, true, false, true, true];
        let annot = annotations_from_mask(&times, &mask, "BAD_test");

        assert_eq!(annot.len(), 2);
        let entries: Vec<_> = annot.iter().collect();
        assert_eq!(entries[0].onset, 0.5);
        assert_eq!(entries[0].duration, 1.0);
        // Last run cannot extend past the final time
        assert_eq!(entries[1].onset, 2.0);
        assert_eq!(entries[1].duration, 0.5);
        assert!(annot.total_duration() <= times[5] - times[0]);
    }

    #[test]
    fn test_annotations_from_mask_with_longer_times() {
        let times = [0.0, 0.1, 0.2, 0.3];
        let mask = [false, true];
        let annot = annotations_from_mask(&times, &mask, "BAD_x");
        let a = annot.iter().next().unwrap();
        assert_eq!(a.onset, 0.1);
        assert!((a.duration - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_empty_mask_yields_nothing() {
        let annot = annotations_from_mask(&[0.0, 1.0], &[false, false], "BAD_x");
        assert!(annot.is_empty());
    }

    #[test]
    fn test_bad_spans() {
        let timing = RecordingTiming::new(100.0, 0, 1000).unwrap();
        let annot: Annotations = vec![
            Annotation::new(5.0, 10.0, "BAD_acq_skip"),
            Annotation::new(1.0, 0.5, "bad_blink"),
            Annotation::new(2.0, 1.0, "EDGE boundary"),
            Annotation::new(-1.0, 1.25, "BAD_start"),
        ]
        .into_iter()
        .collect();

        let spans = annot.bad_spans(&timing);
        assert_eq!(
            spans,
            vec![
                SampleSpan::new(0, 25),
                SampleSpan::new(100, 150),
                SampleSpan::new(500, 1000)
            ]
        );
    }

    #[test]
    fn test_union_keeps_duplicates() {
        let mut a: Annotations = vec![Annotation::new(0.0, 1.0, "BAD_a")].into_iter().collect();
        let b: Annotations = vec![Annotation::new(0.0, 1.0, "BAD_b")].into_iter().collect();
        a += b;
        assert_eq!(a.len(), 2);
        assert_eq!(a.with_description("BAD_b").count(), 1);
    }
}
