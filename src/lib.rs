//! Power Trace Analyzer - segmentation and interval aggregation of power
//! recordings.
//!
//! A recording from a power analyzer is split into active ("high") and idle
//! ("low") periods. Every maximal active period is a run; runs are summarized
//! over a per-sample energy channel and compared across scenarios and
//! encryption methods.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                     Power Trace Analyzer                       │
//! ├────────────────────────────────────────────────────────────────┤
//! │  ┌──────────┐   ┌────────────┐   ┌─────────────┐   ┌────────┐  │
//! │  │  Trace   │──▶│  Decimate  │──▶│  Threshold  │──▶│Upsample│  │
//! │  │  (CSV)   │   │  + smooth  │   │ + close gaps│   │ (mask) │  │
//! │  └──────────┘   └────────────┘   └─────────────┘   └────────┘  │
//! │       │                                                │       │
//! │       ▼                                                ▼       │
//! │  ┌──────────┐   ┌────────────┐   ┌─────────────┐               │
//! │  │  Tables  │◀──│ Aggregate  │◀──│    Runs     │               │
//! │  │ (mean±sd)│   │ (per run)  │   │ (+ early)   │               │
//! │  └──────────┘   └────────────┘   └─────────────┘               │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use power_trace_analyzer::{core, trace};
//!
//! let recording = trace::load_trace("Main power - Arc.csv", &trace::TraceColumns::default())
//!     .expect("failed to load recording");
//! let params = core::SegmentationParams::default();
//!
//! let analysis = core::analyze(recording.window(14.0, 114.0, params.fs), &params)
//!     .expect("failed to analyze scenario");
//! println!("{} runs", analysis.runs.len());
//! ```

pub mod batch;
pub mod config;
pub mod core;
pub mod diagnostics;
pub mod error;
pub mod timing;
pub mod trace;

// Re-export key types at crate root for convenience
pub use batch::{run_batch, run_method, CsvTraceSource, MethodReport, ScenarioOutcome, TraceSource};
pub use config::{Config, MethodConfig, ReportConfig, ScenarioWindow};
pub use core::{
    analyze, build_table, segment, RunSummary, ScenarioAnalysis, SegmentationParams, Table,
};
pub use diagnostics::{DiagnosticsLog, DiagnosticsStats};
pub use error::{Error, Result};
pub use timing::{filter_valid, RoundTripRecord};
pub use trace::{load_trace, Trace, TraceColumns, TraceView};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
