//! Small statistics shared by the detectors.

use chrono::{DateTime, Utc};

/// Sample coefficient of variation (std-dev with n-1 over mean).
///
/// 0 for fewer than two values; `None` when the mean is zero.
pub fn coefficient_of_variation(values: &[f64]) -> Option<f64> {
    if values.len() <= 1 {
        return Some(0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if mean == 0.0 {
        return None;
    }
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Some(var.sqrt() / mean)
}

/// Shannon entropy of `counts` divided by ln(m), m = number of non-zero
/// buckets. 0 when m <= 1, 1 when all counts are zero.
pub fn normalized_entropy(counts: &[usize]) -> f64 {
    let total: usize = counts.iter().sum();
    if total == 0 {
        return 1.0;
    }
    let m = counts.iter().filter(|c| **c > 0).count();
    if m <= 1 {
        return 0.0;
    }
    let h: f64 = counts
        .iter()
        .filter(|c| **c > 0)
        .map(|&c| {
            let p = c as f64 / total as f64;
            -p * p.ln()
        })
        .sum();
    h / (m as f64).ln()
}

pub fn clamp01(x: f64) -> f64 {
    x.clamp(0.0, 1.0)
}

/// `at` falls no more than `window_secs` after `start`.
pub fn within_window(start: DateTime<Utc>, at: DateTime<Utc>, window_secs: i64) -> bool {
    (at - start).num_seconds() <= window_secs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cv_of_constant_series_is_zero() {
        assert_eq!(coefficient_of_variation(&[2.0, 2.0, 2.0]), Some(0.0));
        assert_eq!(coefficient_of_variation(&[5.0]), Some(0.0));
    }

    #[test]
    fn cv_uses_sample_variance() {
        // mean 2, sample variance 1, std 1
        let cv = coefficient_of_variation(&[1.0, 2.0, 3.0]).unwrap();
        assert!((cv - 0.5).abs() < 1e-12, "cv = {cv}");
    }

    #[test]
    fn cv_undefined_for_zero_mean() {
        assert_eq!(coefficient_of_variation(&[0.0, 0.0]), None);
    }

    #[test]
    fn entropy_of_single_bucket_is_zero() {
        assert_eq!(normalized_entropy(&[4, 0, 0]), 0.0);
    }

    #[test]
    fn entropy_of_uniform_buckets_is_one() {
        let h = normalized_entropy(&[3, 3, 3]);
        assert!((h - 1.0).abs() < 1e-12, "h = {h}");
    }

    #[test]
    fn window_bound_is_inclusive() {
        let t0 = DateTime::<Utc>::from_timestamp(1_000, 0).unwrap();
        let t1 = DateTime::<Utc>::from_timestamp(1_300, 0).unwrap();
        let t2 = DateTime::<Utc>::from_timestamp(1_301, 0).unwrap();
        assert!(within_window(t0, t1, 300));
        assert!(!within_window(t0, t2, 300));
    }

    #[test]
    fn entropy_of_empty_histogram_is_one() {
        assert_eq!(normalized_entropy(&[0, 0]), 1.0);
    }
}
