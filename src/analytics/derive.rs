//! Pure statistics used by the engine and the reference store.
//!
//! Histogram sizing, bucket assignment and continuous percentiles live here so
//! every backend applies the same policy. All division is safe against zero
//! denominators and produces `None` rather than NaN / Infinity.

/// Adaptive (Sturges-like) bucket count: `max(2, floor(log2(max(n, 1))) + 2)`.
pub fn bucket_count(total_count: i64) -> u32 {
    let n = total_count.max(1) as u64;
    (n.ilog2() + 2).max(2)
}

/// Bucket width, or `None` when every value is identical.
pub fn bucket_width(min: f64, max: f64, bucket_count: u32) -> Option<f64> {
    if bucket_count == 0 {
        return None;
    }
    let width = (max - min) / f64::from(bucket_count);
    if width > 0.0 && width.is_finite() {
        Some(width)
    } else {
        None
    }
}

/// Bucket index for `value`: `clamp(floor((value - min) / width), 0, bucket_count - 1)`.
///
/// The clamp puts the maximum value, which lands exactly on the upper edge,
/// into the last bucket.
pub fn bucket_index(value: f64, min: f64, width: f64, bucket_count: u32) -> u32 {
    let last = bucket_count.saturating_sub(1);
    let raw = ((value - min) / width).floor();
    if raw <= 0.0 {
        0
    } else if raw >= f64::from(last) {
        last
    } else {
        raw as u32
    }
}

/// Lower and upper bound of bucket `index`.
pub fn bucket_bounds(min: f64, width: f64, index: u32) -> (f64, f64) {
    (
        min + f64::from(index) * width,
        min + f64::from(index + 1) * width,
    )
}

/// Continuous percentile (linear interpolation) over ascending `sorted` values.
///
/// `fraction` is in `[0, 1]`; the position is `fraction * (n - 1)` and the
/// result interpolates between the two bracketing order statistics. Returns
/// `None` for an empty slice.
pub fn percentile_cont(sorted: &[f64], fraction: f64) -> Option<f64> {
    let (first, last) = (sorted.first()?, sorted.last()?);
    if sorted.len() == 1 || fraction <= 0.0 {
        return Some(*first);
    }
    if fraction >= 1.0 {
        return Some(*last);
    }
    let pos = fraction * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let (a, b) = (sorted[lo], sorted[hi]);
    Some(a + (b - a) * (pos - lo as f64))
}

/// Safe average returning `None` when the count is zero.
pub fn safe_avg(sum: f64, count: i64) -> Option<f64> {
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
