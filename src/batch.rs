//! Batch runner.
//!
//! Runs every scenario of a method through [`analyze`] and turns the results
//! into report tables. At most one recording is held in memory: scenarios are
//! borrowed windows of it, and it is dropped before the next recording is
//! loaded. A failing scenario is logged and skipped; the batch carries on.

use crate::config::{Config, MethodConfig, ReportConfig};
use crate::core::analysis::{analyze, ScenarioAnalysis};
use crate::core::segment::SegmentationParams;
use crate::core::table::{
    build_table_with, comparison_records, power_report, ComparisonMetric, Table,
};
use crate::diagnostics::DiagnosticsLog;
use crate::error::{Error, Result};
use crate::trace::{load_trace, Trace, TraceColumns};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Where recordings come from.
pub trait TraceSource {
    fn load(&mut self, path: &Path) -> Result<Trace>;
}

/// Reads recordings from CSV files.
#[derive(Debug, Clone, Default)]
pub struct CsvTraceSource {
    columns: TraceColumns,
}

impl CsvTraceSource {
    pub fn new(columns: TraceColumns) -> Self {
        Self { columns }
    }
}

impl TraceSource for CsvTraceSource {
    fn load(&mut self, path: &Path) -> Result<Trace> {
        load_trace(path, &self.columns)
    }
}

/// Result of one scenario.
#[derive(Debug)]
pub struct ScenarioOutcome {
    /// 1-based scenario number
    pub scenario: usize,
    pub result: Result<ScenarioAnalysis>,
}

/// All scenario outcomes of one method, in scenario order.
#[derive(Debug)]
pub struct MethodReport {
    pub method: String,
    pub scenarios: Vec<ScenarioOutcome>,
}

impl MethodReport {
    /// Successful analyses by scenario; failed scenarios are `None`.
    pub fn analyses(&self) -> Vec<Option<ScenarioAnalysis>> {
        self.scenarios
            .iter()
            .map(|o| o.result.as_ref().ok().cloned())
            .collect()
    }

    pub fn failures(&self) -> usize {
        self.scenarios.iter().filter(|o| o.result.is_err()).count()
    }

    /// Per-method report with calibration scenarios masked.
    pub fn table(&self, report: &ReportConfig, early_window_ms: f64) -> Table {
        let mut table = power_report(&self.analyses(), early_window_ms);
        table.mask_rows(
            1..=report.calibration_scenarios,
            &report.exclude_columns,
            &report.marker,
        );
        table
    }
}

/// Analyze every scenario of `method`.
pub fn run_method<S: TraceSource>(
    method: &MethodConfig,
    params: &SegmentationParams,
    source: &mut S,
    log: &mut DiagnosticsLog,
) -> MethodReport {
    info!(method = %method.name, scenarios = method.scenarios.len(), "processing method");

    let mut loaded: Option<(PathBuf, Trace)> = None;
    let mut outcomes = Vec::with_capacity(method.scenarios.len());

    for (i, window) in method.scenarios.iter().enumerate() {
        let scenario = i + 1;
        let path = window.recording.as_deref().unwrap_or(&method.recording);

        if loaded.as_ref().map(|(p, _)| p.as_path()) != Some(path) {
            // Release the previous recording before reading the next one.
            loaded = None;
            match source.load(path) {
                Ok(trace) => loaded = Some((path.to_path_buf(), trace)),
                Err(e) => {
                    warn!(method = %method.name, scenario, error = %e, "could not load recording");
                    log.record_failure(&method.name, scenario, &e);
                    outcomes.push(ScenarioOutcome {
                        scenario,
                        result: Err(e),
                    });
                    continue;
                }
            }
        }

        let result = match loaded {
            Some((_, ref trace)) => {
                let view = trace.window(window.start_s, window.end_s, params.fs);
                if view.is_empty() {
                    Err(Error::MalformedTrace(format!(
                        "window {}..{} s holds no samples of the {}-sample recording",
                        window.start_s,
                        window.end_s,
                        trace.len()
                    )))
                } else {
                    info!(method = %method.name, scenario, samples = view.len(), "processing scenario");
                    analyze(view, params)
                }
            }
            None => continue,
        };

        match &result {
            Ok(analysis) => {
                for adjustment in &analysis.adjustments {
                    warn!(method = %method.name, scenario, "{adjustment}");
                }
                log.record_scenario(&method.name, scenario, analysis);
            }
            Err(e) => {
                warn!(method = %method.name, scenario, error = %e, "scenario failed");
                log.record_failure(&method.name, scenario, e);
            }
        }
        outcomes.push(ScenarioOutcome { scenario, result });
    }

    MethodReport {
        method: method.name.clone(),
        scenarios: outcomes,
    }
}

/// Run the selected methods of `config` (all when `methods` is empty).
pub fn run_batch<S: TraceSource, M: AsRef<str>>(
    config: &Config,
    methods: &[M],
    source: &mut S,
    log: &mut DiagnosticsLog,
) -> Result<Vec<MethodReport>> {
    let selected = config.select_methods(methods)?;
    Ok(selected
        .into_iter()
        .map(|method| run_method(method, &config.segmentation, source, log))
        .collect())
}

/// One cross-method table per [`ComparisonMetric`], calibration rows masked
/// unless the metric's column is excluded from masking.
pub fn comparison_tables(
    reports: &[MethodReport],
    report: &ReportConfig,
    early_window_ms: f64,
) -> Vec<(ComparisonMetric, Table)> {
    let analyses: Vec<(&str, Vec<Option<ScenarioAnalysis>>)> = reports
        .iter()
        .map(|r| (r.method.as_str(), r.analyses()))
        .collect();
    let order: Vec<&str> = analyses.iter().map(|(m, _)| *m).collect();
    let scenario_count = analyses.iter().map(|(_, a)| a.len()).max().unwrap_or(0);

    ComparisonMetric::ALL
        .iter()
        .map(|&metric| {
            let records = comparison_records(
                analyses.iter().map(|(m, a)| (*m, a.as_slice())),
                metric,
            );
            let mut table = build_table_with(&records, &order, scenario_count, metric.format());

            let column = metric.column(early_window_ms);
            if !report.exclude_columns.iter().any(|c| *c == column) {
                let keep: &[&str] = &[];
                table.mask_rows(1..=report.calibration_scenarios, keep, &report.marker);
            }
            (metric, table)
        })
        .collect()
}

/// File name of a method's report table.
pub fn report_file_name(method: &str, early_window_ms: f64) -> String {
    format!("power_consumption_{method}_{early_window_ms}.csv")
}

/// Write per-method and comparison tables into `dir`; returns the files
/// written.
pub fn write_reports(
    reports: &[MethodReport],
    report: &ReportConfig,
    early_window_ms: f64,
    dir: &Path,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;
    let mut written = Vec::new();

    for method in reports {
        let path = dir.join(report_file_name(&method.method, early_window_ms));
        method.table(report, early_window_ms).write_csv(&path)?;
        info!(path = %path.display(), "wrote method report");
        written.push(path);
    }

    if reports.len() > 1 {
        for (metric, table) in comparison_tables(reports, report, early_window_ms) {
            let path = dir.join(format!("comparison_{}.csv", metric.key()));
            table.write_csv(&path)?;
            written.push(path);
        }
    }

    Ok(written)
}
