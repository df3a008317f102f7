//! Run extraction: maximal stretches of high samples.

use crate::core::segment::early_window_samples;
use crate::error::{Error, Result};
use crate::trace::TraceView;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// A maximal contiguous stretch of high samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    /// Index of the first sample
    pub start_index: usize,
    /// Index one past the last sample
    pub end_index: usize,
    /// Timestamp of the first sample (s)
    pub start_time: f64,
    /// Timestamp of the last sample (s)
    pub end_time: f64,
    /// Number of leading samples flagged as early window
    pub early_count: usize,
}

impl Run {
    pub fn sample_count(&self) -> usize {
        self.end_index - self.start_index
    }

    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }

    pub fn range(&self) -> Range<usize> {
        self.start_index..self.end_index
    }
}

/// Runs of a trace plus the per-sample early-window flags.
#[derive(Debug, Clone, Default)]
pub struct RunPartition {
    pub runs: Vec<Run>,
    /// One flag per trace sample; set on the leading samples of each run
    pub early: Vec<bool>,
}

impl RunPartition {
    pub fn early_flags(&self) -> &[bool] {
        &self.early
    }

    pub fn high_sample_count(&self) -> usize {
        self.runs.iter().map(Run::sample_count).sum()
    }
}

/// Split a mask into maximal high runs and flag the early window of each.
///
/// The first `round(early_window_ms * fs / 1000)` samples of every run are
/// flagged; a shorter run is flagged entirely.
pub fn extract_runs(
    trace: TraceView<'_>,
    mask: &[bool],
    early_window_ms: f64,
    fs: f64,
) -> Result<RunPartition> {
    if mask.len() != trace.len() {
        return Err(Error::LengthMismatch {
            expected: trace.len(),
            actual: mask.len(),
        });
    }

    let window = early_window_samples(early_window_ms, fs);
    let mut runs = Vec::new();
    let mut early = vec![false; mask.len()];

    let mut i = 0;
    while i < mask.len() {
        if !mask[i] {
            i += 1;
            continue;
        }
        let start = i;
        while i < mask.len() && mask[i] {
            i += 1;
        }

        let early_count = window.min(i - start);
        early[start..start + early_count].fill(true);

        runs.push(Run {
            start_index: start,
            end_index: i,
            start_time: trace.timestamps[start],
            end_time: trace.timestamps[i - 1],
            early_count,
        });
    }

    Ok(RunPartition { runs, early })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::Trace;

    fn mask_of(s: &str) -> Vec<bool> {
        s.chars().map(|c| c == '#').collect()
    }

    #[test]
    fn test_extract_runs_basic() {
        let trace = Trace::from_values(vec![0.0; 10], 10.0).unwrap();
        let mask = mask_of(".###..##.#");

        let partition = extract_runs(trace.view(), &mask, 0.0, 10.0).unwrap();
        let runs = &partition.runs;

        assert_eq!(runs.len(), 3);
        assert_eq!(runs[0].range(), 1..4);
        assert_eq!(runs[1].range(), 6..8);
        assert_eq!(runs[2].range(), 9..10);
        assert!((runs[0].start_time - 0.1).abs() < 1e-12);
        assert!((runs[0].end_time - 0.3).abs() < 1e-12);
        assert!((runs[0].duration() - 0.2).abs() < 1e-12);
        assert_eq!(runs[2].duration(), 0.0);
        assert_eq!(partition.high_sample_count(), 6);
        assert!(partition.early.iter().all(|&e| !e));
    }

    #[test]
    fn test_early_window_flags() {
        // 1 kHz, 3 ms window = 3 samples.
        let trace = Trace::from_values(vec![0.0; 12], 1000.0).unwrap();
        let mask = mask_of("#######..##.");

        let partition = extract_runs(trace.view(), &mask, 3.0, 1000.0).unwrap();

        assert_eq!(partition.runs[0].early_count, 3);
        assert_eq!(partition.runs[1].early_count, 2);
        let flags: String = partition
            .early_flags()
            .iter()
            .map(|&e| if e { '#' } else { '.' })
            .collect();
        assert_eq!(flags, "###......##.");
    }

    #[test]
    fn test_no_runs() {
        let trace = Trace::from_values(vec![0.0; 4], 1.0).unwrap();
        let partition = extract_runs(trace.view(), &[false; 4], 5.0, 1.0).unwrap();
        assert!(partition.runs.is_empty());
    }

    #[test]
    fn test_mask_length_mismatch() {
        let trace = Trace::from_values(vec![0.0; 4], 1.0).unwrap();
        let err = extract_runs(trace.view(), &[true; 3], 5.0, 1.0).unwrap_err();
        assert!(matches!(err, Error::LengthMismatch { .. }));
    }
}
