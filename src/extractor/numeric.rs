/// Round to `decimals` places, ties to even.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let scale = 10f64.powi(decimals);
    (value * scale).round_ties_even() / scale
}

/// Median of the defined values; NaN when there are none.
pub fn nan_median(values: &[f64]) -> f64 {
    let mut defined: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if defined.is_empty() {
        return f64::NAN;
    }
    defined.sort_by(f64::total_cmp);

    let mid = defined.len() / 2;
    if defined.len() % 2 == 0 {
        (defined[mid - 1] + defined[mid]) / 2.0
    } else {
        defined[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(1.234_567_89, 5), 1.23457);
        assert_eq!(round_to(-54.123_456, 5), -54.12346);
        assert_eq!(round_to(2.5, 0), 2.0);
        assert!(round_to(f64::NAN, 3).is_nan());
    }

    #[test]
    fn test_pulse_duration_to_milliseconds() {
        let ms = round_to(round_to(0.001_024, 6) * 1000.0, 3);
        assert_eq!(ms, 1.024);
    }

    #[test]
    fn test_nan_median() {
        assert_eq!(nan_median(&[3.0, 1.0, 2.0]), 2.0);
        assert_eq!(nan_median(&[4.0, 1.0, f64::NAN, 2.0, 3.0]), 2.5);
        assert!(nan_median(&[f64::NAN, f64::NAN]).is_nan());
        assert!(nan_median(&[]).is_nan());
    }
}
