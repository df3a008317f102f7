//! Interval aggregation over segmented traces.
//!
//! Everything here is a pure function of its inputs. Standard deviations use
//! the unbiased (N - 1) estimator, so a single sample has an undefined (NaN)
//! spread; that NaN is passed through rather than replaced. The early-window
//! statistics of a run are the exception: they are 0.0, never NaN.

use crate::core::runs::Run;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// Mean and unbiased standard deviation of a set of values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeanStd {
    pub mean: f64,
    pub std: f64,
    pub count: usize,
}

impl MeanStd {
    /// Statistics of a slice. Empty input gives NaN mean and std.
    pub fn of(values: &[f64]) -> Self {
        Self::of_iter(values.iter().copied())
    }

    /// Statistics of any re-iterable sequence, without collecting it.
    pub fn of_iter<I>(values: I) -> Self
    where
        I: IntoIterator<Item = f64> + Clone,
    {
        let count = values.clone().into_iter().count();
        let mean = values.clone().mean();
        // Centered first, so a constant sequence has exactly zero spread.
        let std = values.into_iter().map(|v| v - mean).std_dev();
        Self { mean, std, count }
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// `"{mean} ± {std}"` with the given precision after scaling both values.
    pub fn format(&self, decimals: usize, scale: f64) -> String {
        format!(
            "{:.prec$} ± {:.prec$}",
            self.mean * scale,
            self.std * scale,
            prec = decimals
        )
    }
}

/// Aggregate of one run over a value channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub start_time: f64,
    pub end_time: f64,
    pub duration: f64,
    pub sample_count: usize,
    pub sum: f64,
    pub mean: f64,
    /// NaN for a single-sample run
    pub std: f64,
    /// Number of early-window samples in the run
    pub early_count: usize,
    /// 0.0 when no sample is in the early window
    pub early_sum: f64,
    /// 0.0 when fewer than two samples are in the early window
    pub early_std: f64,
}

/// Mean/std over the whole trace, split by state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverallSummary {
    pub high: MeanStd,
    pub low: MeanStd,
    pub all: MeanStd,
}

/// Which part of an [`OverallSummary`] to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    High,
    Low,
    All,
}

impl OverallSummary {
    pub fn level(&self, level: Level) -> MeanStd {
        match level {
            Level::High => self.high,
            Level::Low => self.low,
            Level::All => self.all,
        }
    }
}

/// Per-run quantity aggregated across the runs of a scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunField {
    /// Sum of the channel over the run (energy per active period)
    Sum,
    /// Mean of the channel over the run
    Mean,
    /// Run duration in seconds
    Duration,
    /// Sum over the early window
    EarlySum,
}

impl RunField {
    pub fn of(self, run: &RunSummary) -> f64 {
        match self {
            RunField::Sum => run.sum,
            RunField::Mean => run.mean,
            RunField::Duration => run.duration,
            RunField::EarlySum => run.early_sum,
        }
    }
}

/// Mean/std across the runs of one scenario.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesSummary {
    pub run_count: usize,
    pub energy: MeanStd,
    pub duration: MeanStd,
    pub early_energy: MeanStd,
}

/// Summarize each run over `values`, using the early flags of the partition.
///
/// `early_flags` must have one flag per value and every run must lie inside
/// `values`.
pub fn summarize_runs(
    values: &[f64],
    runs: &[Run],
    early_flags: &[bool],
) -> Result<Vec<RunSummary>> {
    if early_flags.len() != values.len() {
        return Err(Error::LengthMismatch {
            expected: values.len(),
            actual: early_flags.len(),
        });
    }
    if let Some(run) = runs.iter().find(|r| r.end_index > values.len()) {
        return Err(Error::LengthMismatch {
            expected: values.len(),
            actual: run.end_index,
        });
    }
    if let Some(run) = runs.iter().find(|r| r.start_index > r.end_index) {
        return Err(Error::InvalidParameter(format!(
            "run starts at sample {} after its end {}",
            run.start_index, run.end_index
        )));
    }

    let summaries = runs
        .iter()
        .map(|run| {
            let samples = &values[run.range()];
            let stats = MeanStd::of(samples);
            let sum: f64 = samples.iter().sum();

            let early: Vec<f64> = samples
                .iter()
                .zip(&early_flags[run.range()])
                .filter_map(|(&v, &flag)| flag.then_some(v))
                .collect();
            let early_sum: f64 = early.iter().sum();
            let early_std = if early.len() < 2 {
                0.0
            } else {
                MeanStd::of(&early).std
            };

            RunSummary {
                start_time: run.start_time,
                end_time: run.end_time,
                duration: run.duration(),
                sample_count: run.sample_count(),
                sum,
                mean: stats.mean,
                std: stats.std,
                early_count: early.len(),
                early_sum,
                early_std,
            }
        })
        .collect();
    Ok(summaries)
}

/// Mean/std of high samples, low samples and all samples.
///
/// The mask must have the same length as `values`.
pub fn summarize_overall(values: &[f64], mask: &[bool]) -> Result<OverallSummary> {
    if mask.len() != values.len() {
        return Err(Error::LengthMismatch {
            expected: values.len(),
            actual: mask.len(),
        });
    }

    let by_state = |state: bool| {
        values
            .iter()
            .zip(mask)
            .filter(move |(_, &m)| m == state)
            .map(|(&v, _)| v)
    };

    Ok(OverallSummary {
        high: MeanStd::of_iter(by_state(true)),
        low: MeanStd::of_iter(by_state(false)),
        all: MeanStd::of(values),
    })
}

/// Mean/std across runs of energy, duration and early-window energy.
pub fn summarize_series(runs: &[RunSummary]) -> SeriesSummary {
    let field = |f: RunField| MeanStd::of_iter(runs.iter().map(move |r| f.of(r)));
    SeriesSummary {
        run_count: runs.len(),
        energy: field(RunField::Sum),
        duration: field(RunField::Duration),
        early_energy: field(RunField::EarlySum),
    }
}

/// Convert a power channel in W to per-sample energy in mJ.
pub fn energy_channel(values: &[f64], fs: f64) -> Vec<f64> {
    let scale = 1e3 / fs;
    values.iter().map(|&v| v * scale).collect()
}

/// `part / total * 100`, undefined when `total` is zero or either side is
/// not finite.
pub fn percent_of(part: f64, total: f64) -> Option<f64> {
    if !part.is_finite() || !total.is_finite() || total == 0.0 {
        return None;
    }
    Some(part / total * 100.0)
}
