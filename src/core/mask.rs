//! High/low masks: thresholding, gap closing and upsampling.

/// Boolean high/low state per sample, `true` = high.
pub type Mask = Vec<bool>;

/// Classify each sample as high when it is strictly above `thresh`.
pub fn threshold(signal: &[f64], thresh: f64) -> Mask {
    signal.iter().map(|&v| v > thresh).collect()
}

/// Closing structuring-element length in decimated samples, at least 1.
pub fn closing_window(min_gap_s: f64, target_fs: f64) -> usize {
    let g = (min_gap_s * target_fs).round();
    if g.is_finite() && g >= 1.0 {
        g as usize
    } else {
        1
    }
}

/// Morphological closing (dilation then erosion) with a flat window.
///
/// The window spans `window` samples with its origin at `window / 2`. The
/// closing is taken on the unbounded line with everything outside the mask
/// low, which gives the following behaviour:
///
/// - a low run shorter than `window` with high samples on both sides is
///   filled;
/// - a low run touching the first or last sample is never filled;
/// - no other sample changes.
///
/// The result is idempotent.
pub fn close_gaps(mask: &[bool], window: usize) -> Mask {
    let n = mask.len();
    let g = window.max(1);
    if n == 0 || g == 1 {
        return mask.to_vec();
    }

    // Reach of the element on each side of its origin.
    let before = g / 2;
    let after = g - 1 - before;

    // Pad by a full window on each side so the dilation can spill past the
    // edges; the erosion of in-range samples then only reads computed values.
    let pad = g;
    let ext_len = n + 2 * pad;
    let mut extended = vec![false; ext_len];
    extended[pad..pad + n].copy_from_slice(mask);

    let dilated_counts = prefix_counts(&extended);
    let dilated: Vec<bool> = (0..ext_len)
        .map(|j| count_in(&dilated_counts, j as isize - after as isize, j + before) > 0)
        .collect();

    let eroded_counts = prefix_counts(&dilated);
    (pad..pad + n)
        .map(|i| count_in(&eroded_counts, i as isize - before as isize, i + after) == g)
        .collect()
}

/// Project a decimated mask back onto `len` full-rate samples.
///
/// Each entry is repeated `q` times; the result is truncated to `len`, or
/// padded with its last value when shorter.
pub fn upsample(mask: &[bool], q: usize, len: usize) -> Mask {
    let q = q.max(1);
    let mut full = Vec::with_capacity(len);
    for &state in mask {
        if full.len() >= len {
            break;
        }
        let take = q.min(len - full.len());
        full.extend(std::iter::repeat(state).take(take));
    }
    let fill = mask.last().copied().unwrap_or(false);
    full.resize(len, fill);
    full
}

fn prefix_counts(mask: &[bool]) -> Vec<usize> {
    let mut counts = Vec::with_capacity(mask.len() + 1);
    counts.push(0);
    let mut running = 0;
    for &m in mask {
        running += m as usize;
        counts.push(running);
    }
    counts
}

/// Number of set entries in `lo..=hi`, clipped to the counted range.
fn count_in(counts: &[usize], lo: isize, hi: usize) -> usize {
    let len = counts.len() - 1;
    if len == 0 {
        return 0;
    }
    let lo = lo.max(0) as usize;
    let hi = hi.min(len - 1);
    if lo > hi {
        return 0;
    }
    counts[hi + 1] - counts[lo]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> Mask {
        s.chars().map(|c| c == '#').collect()
    }

    fn render(mask: &[bool]) -> String {
        mask.iter().map(|&m| if m { '#' } else { '.' }).collect()
    }

    #[test]
    fn test_threshold_is_strict() {
        let mask = threshold(&[0.1, 0.2, 0.3], 0.2);
        assert_eq!(mask, vec![false, false, true]);
    }

    #[test]
    fn test_closing_window() {
        assert_eq!(closing_window(0.1, 100.0), 10);
        assert_eq!(closing_window(0.3, 2000.0), 600);
        assert_eq!(closing_window(0.0, 100.0), 1);
        assert_eq!(closing_window(0.004, 100.0), 1);
    }

    #[test]
    fn test_close_fills_short_interior_gap() {
        let closed = close_gaps(&parse("##..##"), 3);
        assert_eq!(render(&closed), "######");
    }

    #[test]
    fn test_close_keeps_gap_of_window_length() {
        let closed = close_gaps(&parse("##...##"), 3);
        assert_eq!(render(&closed), "##...##");

        let closed = close_gaps(&parse("##...##"), 4);
        assert_eq!(render(&closed), "#######");
    }

    #[test]
    fn test_close_never_touches_edge_runs() {
        let closed = close_gaps(&parse(".#.#..#.."), 5);
        assert_eq!(render(&closed), ".######..");

        let closed = close_gaps(&parse("........"), 5);
        assert_eq!(render(&closed), "........");
    }

    #[test]
    fn test_close_even_window() {
        let closed = close_gaps(&parse("#.#..#...#"), 2);
        assert_eq!(render(&closed), "###..#...#");
    }

    #[test]
    fn test_close_window_one_is_identity() {
        let mask = parse("#.#..#");
        assert_eq!(close_gaps(&mask, 1), mask);
        assert_eq!(close_gaps(&mask, 0), mask);
    }

    #[test]
    fn test_close_window_longer_than_mask() {
        let closed = close_gaps(&parse("#..#"), 50);
        assert_eq!(render(&closed), "####");
    }

    #[test]
    fn test_close_is_idempotent() {
        let mask = parse("#.##...#.#....###..#.");
        for window in 1..8 {
            let once = close_gaps(&mask, window);
            let twice = close_gaps(&once, window);
            assert_eq!(once, twice, "window {window}");
        }
    }

    #[test]
    fn test_upsample_repeats_and_truncates() {
        let full = upsample(&[true, false, true], 4, 10);
        assert_eq!(render(&full), "####....##");
    }

    #[test]
    fn test_upsample_pads_with_last_state() {
        let full = upsample(&[false, true], 2, 6);
        assert_eq!(render(&full), "..####");

        let full = upsample(&[], 3, 2);
        assert_eq!(full, vec![false, false]);
    }
}
