//! Decimation and smoothing of raw power traces.
//!
//! Multi-hour traces at 4 kHz are too long to threshold directly, and the
//! raw samples are noisy. The trace is first low-pass filtered and
//! downsampled by an integer factor, then smoothed with a centered moving
//! average. Both steps are zero phase: decimated sample `i` sits at input
//! time `i * q / fs`.

use std::f64::consts::PI;

/// Taps per unit of decimation factor on each side of the filter center.
const FIR_HALF_TAPS_PER_Q: usize = 10;

/// Integer decimation factor `floor(fs / target_fs)`, never below 1.
///
/// A target rate at or above the input rate means the input is already at
/// the target rate.
pub fn decimation_factor(fs: f64, target_fs: f64) -> usize {
    let q = (fs / target_fs).floor();
    if q.is_finite() && q >= 1.0 {
        q as usize
    } else {
        1
    }
}

/// Anti-aliasing low-pass FIR for decimation by `q`.
///
/// Hamming-windowed sinc with `20 * q + 1` taps and a cutoff at `1 / q` of
/// Nyquist, scaled to unit gain at DC.
pub fn anti_alias_fir(q: usize) -> Vec<f64> {
    let q = q.max(1);
    let taps = 2 * FIR_HALF_TAPS_PER_Q * q + 1;
    let center = (taps - 1) as f64 / 2.0;
    let cutoff = 1.0 / q as f64;

    let mut coeffs: Vec<f64> = (0..taps)
        .map(|k| {
            let m = k as f64 - center;
            let sinc = if m == 0.0 {
                1.0
            } else {
                let x = PI * cutoff * m;
                x.sin() / x
            };
            let window = 0.54 - 0.46 * (2.0 * PI * k as f64 / (taps - 1) as f64).cos();
            cutoff * sinc * window
        })
        .collect();

    let gain: f64 = coeffs.iter().sum();
    if gain.abs() > f64::EPSILON {
        for c in &mut coeffs {
            *c /= gain;
        }
    }
    coeffs
}

/// Low-pass filter and keep every `q`-th sample.
///
/// The filter is applied centered on each kept sample with zero padding
/// outside the signal, so there is no net time shift. Only the kept samples
/// are computed. Output length is `ceil(len / q)`.
pub fn decimate(signal: &[f64], q: usize) -> Vec<f64> {
    if q <= 1 || signal.is_empty() {
        return signal.to_vec();
    }

    let coeffs = anti_alias_fir(q);
    let delay = (coeffs.len() - 1) / 2;
    let n = signal.len();
    let out_len = n.div_ceil(q);
    let mut out = Vec::with_capacity(out_len);

    for i in 0..out_len {
        // Input index aligned with tap k is center - k, center = i*q + delay.
        let center = i * q + delay;
        let k_min = (center + 1).saturating_sub(n);
        let k_max = center.min(coeffs.len() - 1);
        let acc: f64 = (k_min..=k_max)
            .map(|k| coeffs[k] * signal[center - k])
            .sum();
        out.push(acc);
    }

    out
}

/// Moving-average window length in decimated samples, before clamping.
pub fn smoothing_window(smooth_s: f64, target_fs: f64) -> usize {
    let w = (smooth_s * target_fs).round();
    if w.is_finite() && w > 0.0 {
        w as usize
    } else {
        0
    }
}

/// Centered moving average with "same" length output.
///
/// `out[i]` averages the inputs `i + (w-1)/2 - (w-1) ..= i + (w-1)/2`, with
/// samples outside the signal counting as zero. The window is clamped to
/// `1..=len`; the applied window is returned alongside the output.
pub fn moving_average(signal: &[f64], window: usize) -> (Vec<f64>, usize) {
    let n = signal.len();
    if n == 0 {
        return (Vec::new(), window.max(1));
    }
    let w = window.clamp(1, n);
    let offset = (w - 1) / 2;

    let mut prefix = Vec::with_capacity(n + 1);
    prefix.push(0.0);
    let mut running = 0.0;
    for &x in signal {
        running += x;
        prefix.push(running);
    }

    let scale = 1.0 / w as f64;
    let out = (0..n)
        .map(|i| {
            let hi = (i + offset).min(n - 1);
            let lo = (i + offset + 1).saturating_sub(w);
            (prefix[hi + 1] - prefix[lo]) * scale
        })
        .collect();

    (out, w)
}
