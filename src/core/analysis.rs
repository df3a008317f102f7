//! One full segmentation and aggregation pass over a scenario trace.

use crate::core::aggregate::{
    energy_channel, summarize_overall, summarize_runs, summarize_series, OverallSummary,
    RunSummary, SeriesSummary,
};
use crate::core::runs::extract_runs;
use crate::core::segment::{segment, SegmentationParams, WindowAdjustment};
use crate::error::Result;
use crate::trace::TraceView;
use serde::{Deserialize, Serialize};

/// Everything the reports need from one scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioAnalysis {
    pub sample_count: usize,
    pub high_sample_count: usize,
    pub decimation_factor: usize,
    pub adjustments: Vec<WindowAdjustment>,
    /// Per-run energy summaries (mJ)
    pub runs: Vec<RunSummary>,
    /// Power level by state (W)
    pub power: OverallSummary,
    /// Across-run statistics of `runs`
    pub series: SeriesSummary,
}

/// Segment a power trace (W) and aggregate it.
///
/// Runs are summarized over the energy channel; the overall summary stays in
/// the power domain. Intermediate per-sample buffers are dropped before
/// returning.
pub fn analyze(trace: TraceView<'_>, params: &SegmentationParams) -> Result<ScenarioAnalysis> {
    let segmentation = segment(trace.values, params)?;
    let partition = extract_runs(trace, &segmentation.mask, params.early_window_ms, params.fs)?;

    let power = summarize_overall(trace.values, &segmentation.mask)?;
    let energy = energy_channel(trace.values, params.fs);
    let runs = summarize_runs(&energy, &partition.runs, partition.early_flags())?;
    let series = summarize_series(&runs);

    Ok(ScenarioAnalysis {
        sample_count: trace.len(),
        high_sample_count: partition.high_sample_count(),
        decimation_factor: segmentation.decimation_factor,
        adjustments: segmentation.adjustments,
        runs,
        power,
        series,
    })
}
