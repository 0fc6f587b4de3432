/// Computes the arithmetic mean of a slice of values. Returns 0.0 for empty input.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Percentile `q` (0.0–1.0) of an ascending slice, interpolating linearly
/// between the two closest ranks at `h = (n - 1) * q`.
///
/// A single value is its own percentile at every `q`. Returns `None` for
/// empty input.
pub fn percentile(sorted: &[f64], q: f64) -> Option<f64> {
    let last = sorted.len().checked_sub(1)?;
    let h = last as f64 * q.clamp(0.0, 1.0);
    let lo = h.floor() as usize;
    let hi = (lo + 1).min(last);
    let frac = h - lo as f64;
    Some(sorted[lo] + frac * (sorted[hi] - sorted[lo]))
}

/// Divides each value by the sum of all values, or `None` when that sum is 0.
pub fn relative(values: &[f64]) -> Vec<Option<f64>> {
    let total: f64 = values.iter().sum();
    values
        .iter()
        .map(|v| if total == 0.0 { None } else { Some(v / total) })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_empty_is_zero() {
        assert_eq!(mean(&[]), 0.0);
    }

    #[test]
    fn test_mean_values() {
        assert_eq!(mean(&[1.0, 2.0, 3.0, 6.0]), 3.0);
    }

    #[test]
    fn test_percentile_linear_interpolation() {
        let sorted = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile(&sorted, 0.0), Some(1.0));
        assert_eq!(percentile(&sorted, 0.5), Some(3.0));
        assert_eq!(percentile(&sorted, 1.0), Some(5.0));
        // h = 4 * 0.05 = 0.2 -> 1.0 + 0.2 * 1.0
        assert!((percentile(&sorted, 0.05).unwrap() - 1.2).abs() < 1e-12);
        // h = 4 * 0.95 = 3.8 -> 4.0 + 0.8 * 1.0
        assert!((percentile(&sorted, 0.95).unwrap() - 4.8).abs() < 1e-12);
    }

    #[test]
    fn test_percentile_single_value() {
        assert_eq!(percentile(&[0.7], 0.05), Some(0.7));
        assert_eq!(percentile(&[0.7], 0.95), Some(0.7));
    }

    #[test]
    fn test_percentile_empty() {
        assert_eq!(percentile(&[], 0.5), None);
    }

    #[test]
    fn test_relative_sums_to_one() {
        let rel = relative(&[1.0, 3.0]);
        assert_eq!(rel, vec![Some(0.25), Some(0.75)]);
    }

    #[test]
    fn test_relative_zero_total_is_undefined() {
        assert_eq!(relative(&[0.0, 0.0]), vec![None, None]);
    }
}
