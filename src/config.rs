//! Configuration for the power trace analyzer.

use crate::core::segment::SegmentationParams;
use crate::core::table::{ALL_POWER_COLUMN, NOT_APPLICABLE};
use crate::error::{Error, Result};
use crate::trace::TraceColumns;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration of a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Segmentation parameters shared by every scenario
    #[serde(default)]
    pub segmentation: SegmentationParams,

    /// Column names of the recording CSVs
    #[serde(default)]
    pub columns: TraceColumns,

    /// Encryption methods in report order
    #[serde(default)]
    pub methods: Vec<MethodConfig>,

    #[serde(default)]
    pub report: ReportConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            segmentation: SegmentationParams::default(),
            columns: TraceColumns::default(),
            methods: vec![MethodConfig {
                name: "NONE".to_string(),
                recording: PathBuf::from("energy_consumption/none/Main power - Arc.csv"),
                scenarios: vec![ScenarioWindow::new(14.0, 114.0)],
            }],
            report: ReportConfig::default(),
        }
    }
}

/// One encryption method: a recording and the scenario windows inside it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodConfig {
    pub name: String,
    /// Recording holding most of the scenarios
    pub recording: PathBuf,
    /// Scenario windows; scenario `i + 1` is `scenarios[i]`
    pub scenarios: Vec<ScenarioWindow>,
}

impl MethodConfig {
    /// Recording that holds scenario `index` (0-based).
    pub fn recording_for(&self, index: usize) -> Option<&Path> {
        let window = self.scenarios.get(index)?;
        Some(window.recording.as_deref().unwrap_or(&self.recording))
    }
}

/// A scenario as a time window of a recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioWindow {
    /// Seconds from the start of the recording
    pub start_s: f64,
    pub end_s: f64,
    /// Recording to read instead of the method's own
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recording: Option<PathBuf>,
}

impl ScenarioWindow {
    pub fn new(start_s: f64, end_s: f64) -> Self {
        Self {
            start_s,
            end_s,
            recording: None,
        }
    }

    pub fn in_recording(mut self, recording: impl Into<PathBuf>) -> Self {
        self.recording = Some(recording.into());
        self
    }
}

/// How reports are written.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Leading scenarios that only calibrate the idle draw
    pub calibration_scenarios: usize,
    /// Columns still reported for calibration scenarios
    pub exclude_columns: Vec<String>,
    /// Cell text for masked calibration cells
    pub marker: String,
    /// Directory for report tables and diagnostics
    pub output_dir: PathBuf,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            calibration_scenarios: 4,
            exclude_columns: vec![ALL_POWER_COLUMN.to_string()],
            marker: NOT_APPLICABLE.to_string(),
            output_dir: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("power-trace-analyzer")
                .join("reports"),
        }
    }
}

impl Config {
    /// Load configuration from the default location, or defaults if there is
    /// none.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load and validate configuration from `path`.
    ///
    /// Relative recording and output paths are resolved against the directory
    /// of the configuration file.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        let mut config: Config = serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;

        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<()> {
        self.save_to(Self::config_path())
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("power-trace-analyzer")
            .join("config.json")
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.report.output_dir)?;
        Ok(())
    }

    /// Check parameters and scenario windows.
    pub fn validate(&self) -> Result<()> {
        self.segmentation.validate()?;

        let mut names = std::collections::HashSet::new();
        for method in &self.methods {
            if !names.insert(method.name.as_str()) {
                return Err(Error::Config(format!(
                    "method '{}' is listed twice",
                    method.name
                )));
            }
            for (i, window) in method.scenarios.iter().enumerate() {
                let ordered = window.start_s.is_finite()
                    && window.end_s.is_finite()
                    && 0.0 <= window.start_s
                    && window.start_s < window.end_s;
                if !ordered {
                    return Err(Error::Config(format!(
                        "{} scenario {}: window {}..{} s is not a forward range",
                        method.name,
                        i + 1,
                        window.start_s,
                        window.end_s
                    )));
                }
            }
        }
        Ok(())
    }

    /// Methods to run, in order. An empty filter selects all of them.
    pub fn select_methods<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<&MethodConfig>> {
        if names.is_empty() {
            return Ok(self.methods.iter().collect());
        }
        names
            .iter()
            .map(|name| {
                let name = name.as_ref();
                self.methods
                    .iter()
                    .find(|m| m.name == name)
                    .ok_or_else(|| Error::Config(format!("unknown method '{name}'")))
            })
            .collect()
    }

    /// Largest scenario count over all methods.
    pub fn scenario_count(&self) -> usize {
        self.methods
            .iter()
            .map(|m| m.scenarios.len())
            .max()
            .unwrap_or(0)
    }

    fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        resolve(&mut self.report.output_dir);
        for method in &mut self.methods {
            resolve(&mut method.recording);
            for window in &mut method.scenarios {
                if let Some(ref mut recording) = window.recording {
                    resolve(recording);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("power_trace_config_{}", std::process::id()))
            .join(name)
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.segmentation.fs, 4000.0);
        assert_eq!(config.segmentation.early_window_ms, 35.0);
        assert_eq!(config.columns.value, "Value");
        assert_eq!(config.report.calibration_scenarios, 4);
        assert_eq!(config.report.exclude_columns, vec!["All periods power [mW]"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_round_trip() {
        let path = temp_path("round_trip.json");
        let mut config = Config::default();
        config.methods[0]
            .scenarios
            .push(ScenarioWindow::new(179.0, 279.0).in_recording("/data/none12.csv"));
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.methods.len(), 1);
        assert_eq!(loaded.methods[0].scenarios[1].start_s, 179.0);
        assert_eq!(
            loaded.methods[0].recording_for(1),
            Some(Path::new("/data/none12.csv"))
        );
        // Relative recordings resolve next to the config file.
        let dir = path.parent().unwrap();
        assert_eq!(
            loaded.methods[0].recording_for(0),
            Some(dir.join("energy_consumption/none/Main power - Arc.csv").as_path())
        );
        assert_eq!(loaded.methods[0].recording_for(2), None);

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let config: Config = serde_json::from_str(r#"{"methods": []}"#).unwrap();
        assert_eq!(config.segmentation, SegmentationParams::default());
        assert_eq!(config.report.marker, "Not applicable");
        assert_eq!(config.scenario_count(), 0);
    }

    #[test]
    fn test_partial_report_section_uses_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"report": {"calibration_scenarios": 2}}"#).unwrap();
        assert_eq!(config.report.calibration_scenarios, 2);
        assert_eq!(config.report.marker, "Not applicable");
        assert_eq!(config.report.exclude_columns, vec!["All periods power [mW]"]);
        assert_eq!(config.report.output_dir, ReportConfig::default().output_dir);
    }

    #[test]
    fn test_validate_rejects_backward_window() {
        let mut config = Config::default();
        config.methods[0].scenarios.push(ScenarioWindow::new(50.0, 10.0));
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("scenario 2"));
    }

    #[test]
    fn test_select_methods() {
        let mut config = Config::default();
        let mut ascon = config.methods[0].clone();
        ascon.name = "ASCON".to_string();
        config.methods.push(ascon);

        assert_eq!(config.select_methods::<&str>(&[]).unwrap().len(), 2);
        let selected = config.select_methods(&["ASCON"]).unwrap();
        assert_eq!(selected[0].name, "ASCON");
        assert!(config.select_methods(&["AES"]).is_err());

        config.methods.push(config.methods[0].clone());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unreadable_config_is_config_error() {
        let err = Config::load_from(temp_path("does_not_exist.json")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
