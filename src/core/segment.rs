//! High/low segmentation of a full-rate power trace.
//!
//! Pipeline: decimate -> smooth -> threshold -> close gaps -> upsample.
//! The result is a mask aligned sample-for-sample with the input trace.

use crate::core::filter::{decimate, decimation_factor, moving_average, smoothing_window};
use crate::core::mask::{close_gaps, closing_window, threshold, upsample, Mask};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Parameters of one segmentation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentationParams {
    /// Sample rate of the raw trace (Hz)
    pub fs: f64,
    /// Rate the trace is decimated to before thresholding (Hz)
    pub target_fs: f64,
    /// Moving-average window (seconds)
    pub smooth_s: f64,
    /// High/low threshold on the smoothed signal (trace units)
    pub thresh: f64,
    /// Low gaps shorter than this are closed (seconds)
    pub min_gap_s: f64,
    /// Leading part of each run aggregated separately (milliseconds)
    pub early_window_ms: f64,
}

impl Default for SegmentationParams {
    fn default() -> Self {
        Self {
            fs: 4000.0,
            target_fs: 2000.0,
            smooth_s: 0.03,
            thresh: 0.120,
            min_gap_s: 0.3,
            early_window_ms: 35.0,
        }
    }
}

impl SegmentationParams {
    /// Check that the rates are usable and the durations are not negative.
    pub fn validate(&self) -> Result<()> {
        let positive = [("fs", self.fs), ("target_fs", self.target_fs)];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(Error::InvalidParameter(format!(
                    "{name} must be a positive rate, got {value}"
                )));
            }
        }

        let non_negative = [
            ("smooth_s", self.smooth_s),
            ("min_gap_s", self.min_gap_s),
            ("early_window_ms", self.early_window_ms),
        ];
        for (name, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(Error::InvalidParameter(format!(
                    "{name} must be a non-negative duration, got {value}"
                )));
            }
        }

        if !self.thresh.is_finite() {
            return Err(Error::InvalidParameter(format!(
                "thresh must be finite, got {}",
                self.thresh
            )));
        }
        Ok(())
    }

    /// Early window length in full-rate samples.
    pub fn early_window_samples(&self) -> usize {
        early_window_samples(self.early_window_ms, self.fs)
    }
}

/// `round(early_window_ms * fs / 1000)` samples.
pub fn early_window_samples(early_window_ms: f64, fs: f64) -> usize {
    let n = (early_window_ms * fs / 1000.0).round();
    if n.is_finite() && n > 0.0 {
        n as usize
    } else {
        0
    }
}

/// A window size that did not fit the signal and was clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WindowAdjustment {
    /// The moving-average window was outside `1..=len` of the decimated signal.
    Smoothing { requested: usize, applied: usize },
    /// The closing window exceeded the decimated signal length.
    Closing { requested: usize, signal_len: usize },
}

impl fmt::Display for WindowAdjustment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WindowAdjustment::Smoothing { requested, applied } => write!(
                f,
                "smoothing window of {requested} samples clamped to {applied}"
            ),
            WindowAdjustment::Closing {
                requested,
                signal_len,
            } => write!(
                f,
                "closing window of {requested} samples exceeds the {signal_len}-sample decimated signal"
            ),
        }
    }
}

/// Result of [`segment`].
#[derive(Debug, Clone)]
pub struct Segmentation {
    /// Full-rate mask, same length as the input trace
    pub mask: Mask,
    /// Decimation factor applied
    pub decimation_factor: usize,
    /// Moving-average window applied (decimated samples)
    pub smoothing_window: usize,
    /// Closing window applied (decimated samples)
    pub closing_window: usize,
    /// Window sizes clamped to fit the signal
    pub adjustments: Vec<WindowAdjustment>,
}

impl Segmentation {
    /// Number of high samples in the mask.
    pub fn high_count(&self) -> usize {
        self.mask.iter().filter(|&&m| m).count()
    }

    pub fn into_mask(self) -> Mask {
        self.mask
    }
}

/// Segment a trace's value channel into high and low samples.
pub fn segment(values: &[f64], params: &SegmentationParams) -> Result<Segmentation> {
    params.validate()?;
    if values.is_empty() {
        return Err(Error::MalformedTrace(
            "cannot segment an empty trace".to_string(),
        ));
    }

    let q = decimation_factor(params.fs, params.target_fs);
    let decimated = decimate(values, q);

    let mut adjustments = Vec::new();

    let requested_smooth = smoothing_window(params.smooth_s, params.target_fs);
    let (smoothed, applied_smooth) = moving_average(&decimated, requested_smooth);
    if applied_smooth != requested_smooth {
        adjustments.push(WindowAdjustment::Smoothing {
            requested: requested_smooth,
            applied: applied_smooth,
        });
    }

    let gap = closing_window(params.min_gap_s, params.target_fs);
    if gap > decimated.len() {
        adjustments.push(WindowAdjustment::Closing {
            requested: gap,
            signal_len: decimated.len(),
        });
    }

    let low_rate = close_gaps(&threshold(&smoothed, params.thresh), gap);
    let mask = upsample(&low_rate, q, values.len());

    debug!(
        samples = values.len(),
        decimated = decimated.len(),
        q,
        smoothing_window = applied_smooth,
        closing_window = gap,
        "segmented trace"
    );

    Ok(Segmentation {
        mask,
        decimation_factor: q,
        smoothing_window: applied_smooth,
        closing_window: gap,
        adjustments,
    })
}
