//! Power trace types.
//!
//! A trace is two parallel columns (timestamp in seconds, value) sampled at a
//! fixed rate. The engine never copies a trace: it works on a [`TraceView`]
//! borrowed from the owning [`Trace`] for the duration of one pass.

use crate::error::{Error, Result};

/// An owned, immutable power trace.
#[derive(Debug, Clone, PartialEq)]
pub struct Trace {
    timestamps: Vec<f64>,
    values: Vec<f64>,
}

impl Trace {
    /// Build a trace from parallel timestamp and value columns.
    pub fn new(timestamps: Vec<f64>, values: Vec<f64>) -> Result<Self> {
        if timestamps.len() != values.len() {
            return Err(Error::LengthMismatch {
                expected: timestamps.len(),
                actual: values.len(),
            });
        }
        if values.is_empty() {
            return Err(Error::MalformedTrace("trace has no samples".to_string()));
        }
        Ok(Self { timestamps, values })
    }

    /// Build a trace whose timestamps are `i / fs`.
    pub fn from_values(values: Vec<f64>, fs: f64) -> Result<Self> {
        if !(fs.is_finite() && fs > 0.0) {
            return Err(Error::InvalidParameter(format!(
                "sample rate must be positive, got {fs}"
            )));
        }
        let timestamps = (0..values.len()).map(|i| i as f64 / fs).collect();
        Self::new(timestamps, values)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn timestamps(&self) -> &[f64] {
        &self.timestamps
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Borrow the whole trace.
    pub fn view(&self) -> TraceView<'_> {
        TraceView {
            timestamps: &self.timestamps,
            values: &self.values,
        }
    }

    /// Borrow the samples between `start_s` and `end_s` seconds into the
    /// recording, counted by sample index (`floor(t * fs)`), clamped to the
    /// recording bounds.
    pub fn window(&self, start_s: f64, end_s: f64, fs: f64) -> TraceView<'_> {
        let n = self.len();
        let to_index = |t: f64| -> usize {
            let idx = (t * fs).floor();
            if idx <= 0.0 {
                0
            } else {
                (idx as usize).min(n)
            }
        };
        let start = to_index(start_s);
        let end = to_index(end_s).max(start);
        TraceView {
            timestamps: &self.timestamps[start..end],
            values: &self.values[start..end],
        }
    }
}

/// A borrowed slice of a trace.
#[derive(Debug, Clone, Copy)]
pub struct TraceView<'a> {
    pub timestamps: &'a [f64],
    pub values: &'a [f64],
}

impl<'a> TraceView<'a> {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Recording time covered by the view, in seconds.
    pub fn span_secs(&self) -> f64 {
        match (self.timestamps.first(), self.timestamps.last()) {
            (Some(first), Some(last)) => last - first,
            _ => 0.0,
        }
    }
}

/// Column names of the value and timestamp columns in a trace file.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TraceColumns {
    pub value: String,
    pub timestamp: String,
}

impl Default for TraceColumns {
    fn default() -> Self {
        Self {
            value: "Value".to_string(),
            timestamp: "Timestamp".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trace_rejects_empty() {
        let err = Trace::new(vec![], vec![]).unwrap_err();
        assert!(matches!(err, Error::MalformedTrace(_)));
    }

    #[test]
    fn test_trace_rejects_mismatched_columns() {
        let err = Trace::new(vec![0.0, 1.0], vec![1.0]).unwrap_err();
        assert!(matches!(
            err,
            Error::LengthMismatch {
                expected: 2,
                actual: 1
            }
        ));
    }

    #[test]
    fn test_from_values_timestamps() {
        let trace = Trace::from_values(vec![0.0; 8], 4.0).unwrap();
        assert_eq!(trace.timestamps()[0], 0.0);
        assert_eq!(trace.timestamps()[4], 1.0);
        assert_eq!(trace.len(), 8);
    }

    #[test]
    fn test_window_selects_sample_range() {
        let trace = Trace::from_values((0..100).map(|i| i as f64).collect(), 10.0).unwrap();

        let view = trace.window(2.0, 3.5, 10.0);
        assert_eq!(view.len(), 15);
        assert_eq!(view.values[0], 20.0);
        assert_eq!(view.values[14], 34.0);
    }

    #[test]
    fn test_window_clamps_to_recording() {
        let trace = Trace::from_values(vec![1.0; 50], 10.0).unwrap();

        assert_eq!(trace.window(-1.0, 100.0, 10.0).len(), 50);
        assert!(trace.window(8.0, 9.0, 10.0).is_empty());
        assert!(trace.window(3.0, 2.0, 10.0).is_empty());
    }
}
