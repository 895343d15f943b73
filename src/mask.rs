//! Connected-component segmentation of boolean sample masks

use crate::types::SampleSpan;

/// Maximal runs of `true`, in ascending order
pub fn segment(mask: &[bool]) -> Vec<SampleSpan> {
    let mut runs = Vec::new();
    let mut run_start: Option<usize> = None;

    for (i, &flag) in mask.iter().enumerate() {
        match (flag, run_start) {
            (true, None) => run_start = Some(i),
            (false, Some(start)) => {
                runs.push(SampleSpan::new(start, i));
                run_start = None;
            }
            _ => {}
        }
    }

    if let Some(start) = run_start {
        runs.push(SampleSpan::new(start, mask.len()));
    }

    runs
}

/// Rebuild a mask of length `n` from runs
pub fn runs_to_mask(runs: &[SampleSpan], n: usize) -> Vec<bool> {
    let mut mask = vec![false; n];
    for run in runs {
        let run = run.clamp_to(n);
        mask[run.start..run.stop].iter_mut().for_each(|m| *m = true);
    }
    mask
}

/// Flip every `false` run shorter than `min_len` samples to `true`.
///
/// Returns the number of runs absorbed.
pub fn absorb_short_runs(mask: &mut [bool], min_len: f64) -> usize {
    let inverse: Vec<bool> = mask.iter().map(|&m| !m).collect();
    let mut absorbed = 0;

    for run in segment(&inverse) {
        if (run.len() as f64) < min_len {
            mask[run.start..run.stop].iter_mut().for_each(|m| *m = true);
            absorbed += 1;
        }
    }

    absorbed
}
