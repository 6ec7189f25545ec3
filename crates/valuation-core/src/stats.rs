//! Small statistics helpers shared by the valuation engines.
//!
//! All functions take plain slices and never return NaN: empty inputs yield
//! `None` so callers can mark the figure unavailable instead of reporting a
//! misleading zero.
use std::cmp::Ordering;

/// Arithmetic mean, `None` for an empty slice.
pub fn mean(data: &[f64]) -> Option<f64> {
    if data.is_empty() {
        return None;
    }
    Some(data.iter().sum::<f64>() / data.len() as f64)
}

/// Sample standard deviation (n - 1 denominator), `None` below two points.
pub fn std_dev(data: &[f64]) -> Option<f64> {
    if data.len() < 2 {
        return None;
    }
    let m = mean(data)?;
    let variance = data.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (data.len() - 1) as f64;
    Some(variance.sqrt())
}

/// Sort a copy of `data` ascending.
pub fn sorted(data: &[f64]) -> Vec<f64> {
    let mut out = data.to_vec();
    out.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    out
}

/// Median with the usual midpoint rule for even counts.
pub fn median(data: &[f64]) -> Option<f64> {
    if data.is_empty() {
        return None;
    }
    let s = sorted(data);
    let mid = s.len() / 2;
    if s.len() % 2 == 0 {
        Some((s[mid - 1] + s[mid]) / 2.0)
    } else {
        Some(s[mid])
    }
}

/// Nearest-rank percentile (0-100 scale) over an already sorted slice.
pub fn percentile_of_sorted(sorted: &[f64], pct: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let idx = ((pct / 100.0) * (sorted.len() - 1) as f64).round() as usize;
    Some(sorted[idx.min(sorted.len() - 1)])
}

/// Nearest-rank percentile (0-100 scale), sorting internally.
pub fn percentile_value(data: &[f64], pct: f64) -> Option<f64> {
    percentile_of_sorted(&sorted(data), pct)
}

/// Inclusive percentile rank of `value` within `data`, on a 0-100 scale.
///
/// Every element less than or equal to `value` counts, so equal values share
/// the same rank. Callers include the ranked value itself in `data`.
pub fn inclusive_percentile_rank(value: f64, data: &[f64]) -> Option<f64> {
    if data.is_empty() {
        return None;
    }
    let at_or_below = data.iter().filter(|&&x| x <= value).count();
    Some(at_or_below as f64 / data.len() as f64 * 100.0)
}

/// Clip `value` to `[low, high]` and map it linearly onto 0.0-1.0.
///
/// Returns `None` when the range is empty or inverted.
pub fn normalize_clamped(value: f64, low: f64, high: f64) -> Option<f64> {
    if !(high > low) {
        return None;
    }
    Some((value.clamp(low, high) - low) / (high - low))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_mean_and_std_dev() {
        let data = vec![10.0, 20.0, 30.0, 40.0, 50.0];
        assert_relative_eq!(mean(&data).unwrap(), 30.0);
        assert_relative_eq!(std_dev(&data).unwrap(), 15.811388, epsilon = 1e-6);
        assert!(mean(&[]).is_none());
        assert!(std_dev(&[1.0]).is_none());
    }

    #[test]
    fn test_median_odd_and_even() {
        assert_relative_eq!(median(&[12.0, 8.0, 10.0]).unwrap(), 10.0);
        assert_relative_eq!(median(&[4.0, 1.0, 3.0, 2.0]).unwrap(), 2.5);
        assert!(median(&[]).is_none());
    }

    #[test]
    fn test_percentile_value_nearest_rank() {
        let data: Vec<f64> = (0..=100).map(|i| i as f64).collect();
        assert_relative_eq!(percentile_value(&data, 5.0).unwrap(), 5.0);
        assert_relative_eq!(percentile_value(&data, 95.0).unwrap(), 95.0);
        assert_relative_eq!(percentile_value(&[7.0], 50.0).unwrap(), 7.0);
    }

    #[test]
    fn test_inclusive_rank_ties_share_rank() {
        // Peers {8, 10, 12} plus the target at 10.
        let data = vec![8.0, 10.0, 12.0, 10.0];
        assert_relative_eq!(inclusive_percentile_rank(10.0, &data).unwrap(), 75.0);
        assert_relative_eq!(inclusive_percentile_rank(12.0, &data).unwrap(), 100.0);
        assert_relative_eq!(inclusive_percentile_rank(8.0, &data).unwrap(), 25.0);
    }

    #[test]
    fn test_normalize_clamped() {
        assert_relative_eq!(normalize_clamped(5.0, 0.0, 10.0).unwrap(), 0.5);
        assert_relative_eq!(normalize_clamped(-3.0, 0.0, 10.0).unwrap(), 0.0);
        assert_relative_eq!(normalize_clamped(99.0, 0.0, 10.0).unwrap(), 1.0);
        assert!(normalize_clamped(1.0, 2.0, 2.0).is_none());
    }
}
