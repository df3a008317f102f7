//! Cross-scenario comparison tables.
//!
//! Tables hold pre-formatted `"mean ± std"` string cells. Missing data never
//! fails a build: it renders as an empty cell.

use crate::core::aggregate::{Level, MeanStd, OverallSummary, RunField, RunSummary};
use crate::core::analysis::ScenarioAnalysis;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::io::Write;
use std::path::Path;

/// Row label of scenario `i` (1-based).
pub fn scenario_label(scenario: usize) -> String {
    format!("scen_{scenario}")
}

/// Name of the row-label column.
pub const SCENARIO_INDEX: &str = "Scenario";

/// Default marker for rows that are not comparable.
pub const NOT_APPLICABLE: &str = "Not applicable";

pub const HIGH_POWER_COLUMN: &str = "High periods power [mW]";
pub const LOW_POWER_COLUMN: &str = "Low periods power [mW]";
pub const ALL_POWER_COLUMN: &str = "All periods power [mW]";
pub const RUN_ENERGY_COLUMN: &str = "High period energy consumption [mJ]";
pub const RUN_DURATION_COLUMN: &str = "High durations [s]";

/// Label of the early-window energy column.
pub fn early_energy_column(early_window_ms: f64) -> String {
    format!("First {early_window_ms}ms [mJ]")
}

/// Precision and unit scale of a formatted cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellFormat {
    pub decimals: usize,
    pub scale: f64,
}

impl CellFormat {
    pub fn new(decimals: usize) -> Self {
        Self {
            decimals,
            scale: 1.0,
        }
    }

    /// Multiply values before formatting (e.g. 1000 for W -> mW).
    pub fn scaled(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }
}

/// What a table cell is computed from.
#[derive(Debug, Clone, PartialEq)]
pub enum CellSource {
    /// Mean/std across runs of one run field
    Runs { runs: Vec<RunSummary>, field: RunField },
    /// Mean/std of the samples inside one run
    Run(RunSummary),
    /// One state of an overall summary
    Overall { summary: OverallSummary, level: Level },
    /// Precomputed statistics
    Stat(MeanStd),
}

impl CellSource {
    /// Statistics to print, or `None` when there is nothing to report.
    pub fn mean_std(&self) -> Option<MeanStd> {
        let stats = match self {
            CellSource::Runs { runs, field } => {
                MeanStd::of_iter(runs.iter().map(|r| field.of(r)))
            }
            CellSource::Run(run) => MeanStd {
                mean: run.mean,
                std: run.std,
                count: run.sample_count,
            },
            CellSource::Overall { summary, level } => summary.level(*level),
            CellSource::Stat(stats) => *stats,
        };
        (!stats.is_empty()).then_some(stats)
    }

    pub fn render(&self, format: CellFormat) -> String {
        self.mean_std()
            .map(|s| s.format(format.decimals, format.scale))
            .unwrap_or_default()
    }
}

/// `(method, scenario)` -> cell data; `None` marks a known gap.
pub type Records = HashMap<(String, usize), Option<CellSource>>;

/// A labelled table of string cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub index_name: String,
    pub columns: Vec<String>,
    pub rows: Vec<TableRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRow {
    pub label: String,
    pub cells: Vec<String>,
}

impl Table {
    pub fn new(index_name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            index_name: index_name.into(),
            columns,
            rows: Vec::new(),
        }
    }

    /// Append a row; missing trailing cells are filled with empty strings.
    pub fn push_row(&mut self, label: impl Into<String>, mut cells: Vec<String>) {
        cells.resize(self.columns.len(), String::new());
        self.rows.push(TableRow {
            label: label.into(),
            cells,
        });
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    pub fn cell(&self, row: &str, column: &str) -> Option<&str> {
        let col = self.column_index(column)?;
        self.rows
            .iter()
            .find(|r| r.label == row)
            .map(|r| r.cells[col].as_str())
    }

    /// Replace the cells of the given scenario rows with `marker`, except in
    /// `exclude_columns`. Unknown scenarios and columns are ignored.
    pub fn mask_rows<I, S>(&mut self, scenarios: I, exclude_columns: &[S], marker: &str)
    where
        I: IntoIterator<Item = usize>,
        S: AsRef<str>,
    {
        let keep: Vec<bool> = self
            .columns
            .iter()
            .map(|c| exclude_columns.iter().any(|e| e.as_ref() == c))
            .collect();

        for scenario in scenarios {
            let label = scenario_label(scenario);
            if let Some(row) = self.rows.iter_mut().find(|r| r.label == label) {
                for (cell, &keep) in row.cells.iter_mut().zip(&keep) {
                    if !keep {
                        *cell = marker.to_string();
                    }
                }
            }
        }
    }

    /// Write the table as CSV with a header row.
    pub fn to_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(std::iter::once(&self.index_name).chain(&self.columns))?;
        for row in &self.rows {
            wtr.write_record(std::iter::once(&row.label).chain(&row.cells))?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        self.to_csv(std::fs::File::create(path)?)
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = |s: &str| s.chars().count();

        let label_width = self
            .rows
            .iter()
            .map(|r| width(&r.label))
            .chain(std::iter::once(width(&self.index_name)))
            .max()
            .unwrap_or(0);
        let col_widths: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, c)| {
                self.rows
                    .iter()
                    .map(|r| width(&r.cells[i]))
                    .chain(std::iter::once(width(c)))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        write!(f, "{:<label_width$}", self.index_name)?;
        for (c, &w) in self.columns.iter().zip(&col_widths) {
            write!(f, "  {c:>w$}")?;
        }
        for row in &self.rows {
            writeln!(f)?;
            write!(f, "{:<label_width$}", row.label)?;
            for (cell, &w) in row.cells.iter().zip(&col_widths) {
                write!(f, "  {cell:>w$}")?;
            }
        }
        Ok(())
    }
}

/// Scenario x method table of one metric.
///
/// Rows are `scen_1..=scen_{scenario_count}`, columns follow `method_order`.
pub fn build_table<M: AsRef<str>>(
    records: &Records,
    method_order: &[M],
    scenario_count: usize,
    decimals: usize,
) -> Table {
    build_table_with(records, method_order, scenario_count, CellFormat::new(decimals))
}

/// [`build_table`] with a unit scale.
pub fn build_table_with<M: AsRef<str>>(
    records: &Records,
    method_order: &[M],
    scenario_count: usize,
    format: CellFormat,
) -> Table {
    let columns = method_order.iter().map(|m| m.as_ref().to_string()).collect();
    let mut table = Table::new(SCENARIO_INDEX, columns);

    for scenario in 1..=scenario_count {
        let cells = method_order
            .iter()
            .map(|method| {
                records
                    .get(&(method.as_ref().to_string(), scenario))
                    .and_then(Option::as_ref)
                    .map(|source| source.render(format))
                    .unwrap_or_default()
            })
            .collect();
        table.push_row(scenario_label(scenario), cells);
    }

    table
}

/// Per-method report: one row per scenario, one column per metric.
///
/// `analyses[i]` is scenario `i + 1`; `None` (a failed scenario) renders as
/// an empty row.
pub fn power_report(analyses: &[Option<ScenarioAnalysis>], early_window_ms: f64) -> Table {
    let columns = vec![
        RUN_ENERGY_COLUMN.to_string(),
        RUN_DURATION_COLUMN.to_string(),
        early_energy_column(early_window_ms),
        HIGH_POWER_COLUMN.to_string(),
        LOW_POWER_COLUMN.to_string(),
        ALL_POWER_COLUMN.to_string(),
    ];
    let mut table = Table::new(SCENARIO_INDEX, columns);

    for (i, analysis) in analyses.iter().enumerate() {
        let cells = match analysis {
            Some(a) => {
                let power = CellFormat::new(3).scaled(1000.0);
                let stat = |s: MeanStd, f: CellFormat| CellSource::Stat(s).render(f);
                vec![
                    stat(a.series.energy, CellFormat::new(3)),
                    stat(a.series.duration, CellFormat::new(2)),
                    stat(a.series.early_energy, CellFormat::new(3)),
                    stat(a.power.high, power),
                    stat(a.power.low, power),
                    stat(a.power.all, power),
                ]
            }
            None => Vec::new(),
        };
        table.push_row(scenario_label(i + 1), cells);
    }

    table
}

/// Metrics compared across encryption methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonMetric {
    HighPower,
    LowPower,
    AllPower,
    RunEnergy,
    RunDuration,
    EarlyEnergy,
}

impl ComparisonMetric {
    pub const ALL: [ComparisonMetric; 6] = [
        ComparisonMetric::HighPower,
        ComparisonMetric::LowPower,
        ComparisonMetric::AllPower,
        ComparisonMetric::RunEnergy,
        ComparisonMetric::RunDuration,
        ComparisonMetric::EarlyEnergy,
    ];

    /// File-name friendly identifier.
    pub fn key(self) -> &'static str {
        match self {
            ComparisonMetric::HighPower => "high_power",
            ComparisonMetric::LowPower => "low_power",
            ComparisonMetric::AllPower => "all_power",
            ComparisonMetric::RunEnergy => "run_energy",
            ComparisonMetric::RunDuration => "run_duration",
            ComparisonMetric::EarlyEnergy => "early_energy",
        }
    }

    /// Matching column of [`power_report`].
    pub fn column(self, early_window_ms: f64) -> String {
        match self {
            ComparisonMetric::HighPower => HIGH_POWER_COLUMN.to_string(),
            ComparisonMetric::LowPower => LOW_POWER_COLUMN.to_string(),
            ComparisonMetric::AllPower => ALL_POWER_COLUMN.to_string(),
            ComparisonMetric::RunEnergy => RUN_ENERGY_COLUMN.to_string(),
            ComparisonMetric::RunDuration => RUN_DURATION_COLUMN.to_string(),
            ComparisonMetric::EarlyEnergy => early_energy_column(early_window_ms),
        }
    }

    pub fn format(self) -> CellFormat {
        match self {
            ComparisonMetric::HighPower
            | ComparisonMetric::LowPower
            | ComparisonMetric::AllPower => CellFormat::new(3).scaled(1000.0),
            ComparisonMetric::RunDuration => CellFormat::new(2),
            ComparisonMetric::RunEnergy | ComparisonMetric::EarlyEnergy => CellFormat::new(3),
        }
    }

    pub fn source(self, analysis: &ScenarioAnalysis) -> CellSource {
        let overall = |level| CellSource::Overall {
            summary: analysis.power,
            level,
        };
        let runs = |field| CellSource::Runs {
            runs: analysis.runs.clone(),
            field,
        };
        match self {
            ComparisonMetric::HighPower => overall(Level::High),
            ComparisonMetric::LowPower => overall(Level::Low),
            ComparisonMetric::AllPower => overall(Level::All),
            ComparisonMetric::RunEnergy => runs(RunField::Sum),
            ComparisonMetric::RunDuration => runs(RunField::Duration),
            ComparisonMetric::EarlyEnergy => runs(RunField::EarlySum),
        }
    }
}

/// Collect one metric from every method's scenarios into [`Records`].
pub fn comparison_records<'a, I>(methods: I, metric: ComparisonMetric) -> Records
where
    I: IntoIterator<Item = (&'a str, &'a [Option<ScenarioAnalysis>])>,
{
    let mut records = Records::new();
    for (method, analyses) in methods {
        for (i, analysis) in analyses.iter().enumerate() {
            records.insert(
                (method.to_string(), i + 1),
                analysis.as_ref().map(|a| metric.source(a)),
            );
        }
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::aggregate::{summarize_series, SeriesSummary};

    fn stat(mean: f64, std: f64) -> Option<CellSource> {
        Some(CellSource::Stat(MeanStd {
            mean,
            std,
            count: 5,
        }))
    }

    fn sample_records() -> Records {
        let mut records = Records::new();
        records.insert(("NONE".to_string(), 1), stat(1.0, 0.1));
        records.insert(("ASCON".to_string(), 1), stat(2.0, 0.2));
        records.insert(("NONE".to_string(), 2), stat(1.5, 0.15));
        records.insert(("ASCON".to_string(), 2), None);
        records
    }

    #[test]
    fn test_build_table_layout() {
        let table = build_table(&sample_records(), &["NONE", "AES-GCM", "ASCON"], 3, 3);

        assert_eq!(table.columns, vec!["NONE", "AES-GCM", "ASCON"]);
        let labels: Vec<&str> = table.rows.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["scen_1", "scen_2", "scen_3"]);

        assert_eq!(table.cell("scen_1", "NONE"), Some("1.000 ± 0.100"));
        assert_eq!(table.cell("scen_1", "ASCON"), Some("2.000 ± 0.200"));
        assert_eq!(table.cell("scen_2", "NONE"), Some("1.500 ± 0.150"));
    }

    #[test]
    fn test_missing_cells_are_empty() {
        let table = build_table(&sample_records(), &["NONE", "AES-GCM", "ASCON"], 3, 3);

        // Absent method, explicit gap, and scenario beyond the data.
        assert_eq!(table.cell("scen_1", "AES-GCM"), Some(""));
        assert_eq!(table.cell("scen_2", "ASCON"), Some(""));
        assert_eq!(table.cell("scen_3", "NONE"), Some(""));
    }

    #[test]
    fn test_missing_cell_does_not_disturb_others() {
        let full = build_table(&sample_records(), &["NONE", "ASCON"], 2, 3);

        let mut records = sample_records();
        records.remove(&("ASCON".to_string(), 1));
        let partial = build_table(&records, &["NONE", "ASCON"], 2, 3);

        assert_eq!(partial.cell("scen_1", "ASCON"), Some(""));
        assert_eq!(partial.cell("scen_1", "NONE"), full.cell("scen_1", "NONE"));
        assert_eq!(partial.rows[1], full.rows[1]);
    }

    #[test]
    fn test_scaled_cells() {
        let table = build_table_with(
            &sample_records(),
            &["NONE"],
            1,
            CellFormat::new(1).scaled(1000.0),
        );
        assert_eq!(table.cell("scen_1", "NONE"), Some("1000.0 ± 100.0"));
    }

    #[test]
    fn test_empty_run_series_renders_empty() {
        let source = CellSource::Runs {
            runs: Vec::new(),
            field: RunField::Sum,
        };
        assert_eq!(source.mean_std(), None);
        assert_eq!(source.render(CellFormat::new(3)), "");
    }

    #[test]
    fn test_mask_rows() {
        let mut table = build_table(&sample_records(), &["NONE", "ASCON"], 3, 3);
        table.mask_rows(1..=2, &["NONE"], NOT_APPLICABLE);

        assert_eq!(table.cell("scen_1", "NONE"), Some("1.000 ± 0.100"));
        assert_eq!(table.cell("scen_1", "ASCON"), Some(NOT_APPLICABLE));
        assert_eq!(table.cell("scen_2", "ASCON"), Some(NOT_APPLICABLE));
        assert_eq!(table.cell("scen_3", "ASCON"), Some(""));
    }

    #[test]
    fn test_csv_output() {
        let table = build_table(&sample_records(), &["NONE", "ASCON"], 2, 1);
        let mut out = Vec::new();
        table.to_csv(&mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Scenario,NONE,ASCON");
        assert_eq!(lines[1], "scen_1,1.0 ± 0.1,2.0 ± 0.2");
        assert_eq!(lines[2], "scen_2,1.5 ± 0.1,");
    }

    #[test]
    fn test_display_aligns_columns() {
        let table = build_table(&sample_records(), &["NONE", "ASCON"], 2, 3);
        let text = table.to_string();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Scenario"));
        let widths: Vec<usize> = lines.iter().map(|l| l.chars().count()).collect();
        assert!(widths.iter().all(|&w| w == widths[0]));
    }

    fn analysis_with(series: SeriesSummary) -> ScenarioAnalysis {
        let level = MeanStd {
            mean: 0.05,
            std: 0.002,
            count: 100,
        };
        ScenarioAnalysis {
            sample_count: 100,
            high_sample_count: 40,
            decimation_factor: 2,
            adjustments: Vec::new(),
            runs: Vec::new(),
            power: OverallSummary {
                high: level,
                low: level,
                all: level,
            },
            series,
        }
    }

    #[test]
    fn test_power_report() {
        let series = SeriesSummary {
            run_count: 4,
            energy: MeanStd {
                mean: 1.23456,
                std: 0.1,
                count: 4,
            },
            duration: MeanStd {
                mean: 0.5,
                std: 0.01,
                count: 4,
            },
            early_energy: MeanStd {
                mean: 0.2,
                std: 0.02,
                count: 4,
            },
        };
        let analyses = vec![Some(analysis_with(series)), None];
        let table = power_report(&analyses, 35.0);

        assert_eq!(table.columns[2], "First 35ms [mJ]");
        assert_eq!(table.cell("scen_1", RUN_ENERGY_COLUMN), Some("1.235 ± 0.100"));
        assert_eq!(table.cell("scen_1", RUN_DURATION_COLUMN), Some("0.50 ± 0.01"));
        assert_eq!(table.cell("scen_1", HIGH_POWER_COLUMN), Some("50.000 ± 2.000"));
        assert_eq!(table.cell("scen_2", ALL_POWER_COLUMN), Some(""));
    }

    #[test]
    fn test_comparison_records() {
        let none = vec![Some(analysis_with(summarize_series(&[]))), None];
        let ascon = vec![Some(analysis_with(summarize_series(&[])))];

        let records = comparison_records(
            [("NONE", none.as_slice()), ("ASCON", ascon.as_slice())],
            ComparisonMetric::HighPower,
        );
        let table = build_table_with(
            &records,
            &["NONE", "ASCON"],
            2,
            ComparisonMetric::HighPower.format(),
        );

        assert_eq!(table.cell("scen_1", "NONE"), Some("50.000 ± 2.000"));
        assert_eq!(table.cell("scen_2", "NONE"), Some(""));
        assert_eq!(table.cell("scen_2", "ASCON"), Some(""));

        // No runs at all: run-based metrics stay empty.
        let records = comparison_records(
            [("NONE", none.as_slice())],
            ComparisonMetric::RunEnergy,
        );
        let table = build_table(&records, &["NONE"], 1, 3);
        assert_eq!(table.cell("scen_1", "NONE"), Some(""));
    }
}
