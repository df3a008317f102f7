//! Core segmentation and aggregation engine.
//!
//! This module contains:
//! - Decimation and smoothing of the raw trace
//! - Mask operations (threshold, gap closing, upsampling)
//! - Segmentation of a trace into high/low samples
//! - Run extraction and interval aggregation
//! - Cross-scenario comparison tables

pub mod aggregate;
pub mod analysis;
pub mod filter;
pub mod mask;
pub mod runs;
pub mod segment;
pub mod table;

// Re-export commonly used types
pub use aggregate::{
    energy_channel, percent_of, summarize_overall, summarize_runs, summarize_series, Level,
    MeanStd, OverallSummary, RunField, RunSummary, SeriesSummary,
};
pub use analysis::{analyze, ScenarioAnalysis};
pub use mask::Mask;
pub use runs::{extract_runs, Run, RunPartition};
pub use segment::{segment, Segmentation, SegmentationParams, WindowAdjustment};
pub use table::{
    build_table, build_table_with, comparison_records, power_report, scenario_label, CellFormat,
    CellSource, ComparisonMetric, Records, Table, TableRow,
};
