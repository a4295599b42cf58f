//! Small statistics helpers over peak-usage samples

/// Percentile with linear interpolation between closest ranks
///
/// `pct` is in `[0, 100]`. Returns `None` for an empty slice. Non-finite
/// values are ignored.
pub fn percentile(values: &[f64], pct: f64) -> Option<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(f64::total_cmp);

    let rank = (pct.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64))
}

/// Arithmetic mean, `None` when empty
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Slack for interpolation noise (120.00000000000003 must not round to 121)
const ROUNDING_SLACK: f64 = 1e-9;

/// Round `value` up to the next multiple of `step`
pub fn round_up_to_step(value: f64, step: u64) -> u64 {
    if value <= 0.0 {
        return 0;
    }
    let step = step.max(1) as f64;
    ((value / step - ROUNDING_SLACK).ceil() * step) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentile_interpolates() {
        let mut values = vec![100.0; 19];
        values.push(500.0);
        let p95 = percentile(&values, 95.0).unwrap();
        assert!((p95 - 120.0).abs() < 1e-9);
    }

    #[test]
    fn percentile_edges() {
        assert_eq!(percentile(&[], 95.0), None);
        assert_eq!(percentile(&[42.0], 95.0), Some(42.0));
        assert_eq!(percentile(&[3.0, 1.0, 2.0], 0.0), Some(1.0));
        assert_eq!(percentile(&[3.0, 1.0, 2.0], 100.0), Some(3.0));
        assert_eq!(percentile(&[1.0, 3.0], 50.0), Some(2.0));
    }

    #[test]
    fn percentile_ignores_unordered_input_and_nan() {
        assert_eq!(percentile(&[5.0, f64::NAN, 1.0], 100.0), Some(5.0));
    }

    #[test]
    fn mean_of_values() {
        assert_eq!(mean(&[]), None);
        assert_eq!(mean(&[1.0, 2.0, 3.0]), Some(2.0));
    }

    #[test]
    fn rounds_up() {
        assert_eq!(round_up_to_step(144.0, 64), 192);
        assert_eq!(round_up_to_step(128.0, 64), 128);
        assert_eq!(round_up_to_step(128.5, 1), 129);
        assert_eq!(round_up_to_step(0.0, 64), 0);
        assert_eq!(round_up_to_step(144.000_000_000_000_3, 1), 144);
    }
}
