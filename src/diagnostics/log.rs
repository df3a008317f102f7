//! Per-batch diagnostics log.
//!
//! Counts what a batch processed and keeps one timestamped entry per
//! noteworthy event, so that nothing a batch skips goes unreported.

use crate::core::analysis::ScenarioAnalysis;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// How serious an entry is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// One logged event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticEntry {
    pub method: String,
    /// 1-based scenario number, `None` for method-level events
    pub scenario: Option<usize>,
    pub severity: Severity,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Diagnostics of one batch.
#[derive(Debug)]
pub struct DiagnosticsLog {
    batch_id: Uuid,
    batch_start: DateTime<Utc>,
    /// Number of scenarios analyzed successfully
    scenarios_processed: u64,
    /// Number of scenarios that failed
    scenarios_failed: u64,
    /// Number of trace samples segmented
    samples_processed: u64,
    /// Number of runs extracted
    runs_extracted: u64,
    /// Number of clamped smoothing or closing windows
    window_adjustments: u64,
    entries: Vec<DiagnosticEntry>,
    /// Path for persisting the log
    persist_path: Option<PathBuf>,
}

impl DiagnosticsLog {
    /// Create a log for a new batch.
    pub fn new() -> Self {
        Self {
            batch_id: Uuid::new_v4(),
            batch_start: Utc::now(),
            scenarios_processed: 0,
            scenarios_failed: 0,
            samples_processed: 0,
            runs_extracted: 0,
            window_adjustments: 0,
            entries: Vec::new(),
            persist_path: None,
        }
    }

    /// Create a log that [`save`](Self::save)s to `path`.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut log = Self::new();
        log.persist_path = Some(path);
        log
    }

    pub fn batch_id(&self) -> Uuid {
        self.batch_id
    }

    pub fn entries(&self) -> &[DiagnosticEntry] {
        &self.entries
    }

    /// Add an entry.
    pub fn note(
        &mut self,
        method: &str,
        scenario: Option<usize>,
        severity: Severity,
        message: impl Into<String>,
    ) {
        self.entries.push(DiagnosticEntry {
            method: method.to_string(),
            scenario,
            severity,
            message: message.into(),
            at: Utc::now(),
        });
    }

    /// Record a successfully analyzed scenario and warn about every clamped
    /// window.
    pub fn record_scenario(&mut self, method: &str, scenario: usize, analysis: &ScenarioAnalysis) {
        self.scenarios_processed += 1;
        self.samples_processed += analysis.sample_count as u64;
        self.runs_extracted += analysis.runs.len() as u64;
        self.window_adjustments += analysis.adjustments.len() as u64;

        for adjustment in &analysis.adjustments {
            self.note(method, Some(scenario), Severity::Warning, adjustment.to_string());
        }
        if analysis.runs.is_empty() {
            self.note(
                method,
                Some(scenario),
                Severity::Warning,
                "no high periods found",
            );
        }
    }

    /// Record a scenario that could not be analyzed.
    pub fn record_failure(&mut self, method: &str, scenario: usize, error: &Error) {
        self.scenarios_failed += 1;
        self.note(method, Some(scenario), Severity::Error, error.to_string());
    }

    pub fn has_failures(&self) -> bool {
        self.scenarios_failed > 0
    }

    /// Get the current statistics.
    pub fn stats(&self) -> DiagnosticsStats {
        DiagnosticsStats {
            batch_id: self.batch_id,
            batch_start: self.batch_start,
            scenarios_processed: self.scenarios_processed,
            scenarios_failed: self.scenarios_failed,
            samples_processed: self.samples_processed,
            runs_extracted: self.runs_extracted,
            window_adjustments: self.window_adjustments,
            batch_duration_secs: (Utc::now() - self.batch_start).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        let warnings = self.count(Severity::Warning);
        format!(
            "Batch {}:\n\
             - Scenarios processed: {}\n\
             - Scenarios failed: {}\n\
             - Samples segmented: {}\n\
             - Runs extracted: {}\n\
             - Windows clamped: {}\n\
             - Warnings: {}\n\
             - Duration: {} seconds",
            stats.batch_id,
            stats.scenarios_processed,
            stats.scenarios_failed,
            stats.samples_processed,
            stats.runs_extracted,
            stats.window_adjustments,
            warnings,
            stats.batch_duration_secs
        )
    }

    fn count(&self, severity: Severity) -> usize {
        self.entries.iter().filter(|e| e.severity == severity).count()
    }

    /// Save to the persistence path, if one was given.
    pub fn save(&self) -> Result<()> {
        match self.persist_path {
            Some(ref path) => self.save_to(path),
            None => Ok(()),
        }
    }

    /// Save stats and entries as JSON.
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let persisted = PersistedLog {
            stats: self.stats(),
            entries: &self.entries,
            last_updated: Utc::now(),
        };
        let json = serde_json::to_string_pretty(&persisted)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

impl Default for DiagnosticsLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of batch statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticsStats {
    pub batch_id: Uuid,
    pub batch_start: DateTime<Utc>,
    pub scenarios_processed: u64,
    pub scenarios_failed: u64,
    pub samples_processed: u64,
    pub runs_extracted: u64,
    pub window_adjustments: u64,
    pub batch_duration_secs: u64,
}

/// On-disk format.
#[derive(Debug, Serialize)]
struct PersistedLog<'a> {
    stats: DiagnosticsStats,
    entries: &'a [DiagnosticEntry],
    last_updated: DateTime<Utc>,
}
