/// Arithmetic mean; `None` on an empty slice.
pub fn mean(data: &[f64]) -> Option<f64> {
    if data.is_empty() {
        return None;
    }
    Some(data.iter().sum::<f64>() / data.len() as f64)
}

/// Population standard deviation; `None` on an empty slice.
pub fn std_dev(data: &[f64]) -> Option<f64> {
    let m = mean(data)?;
    let variance = data.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / data.len() as f64;
    Some(variance.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_rep_durations() {
        assert_eq!(mean(&[2.0, 3.0, 4.0]), Some(3.0));
        assert_eq!(mean(&[1.5, 2.5]), Some(2.0));
    }

    #[test]
    fn test_mean_single_value() {
        assert_eq!(mean(&[2.4]), Some(2.4));
    }

    #[test]
    fn test_mean_empty_slice() {
        assert_eq!(mean(&[]), None);
    }

    #[test]
    fn test_std_dev_identical_durations() {
        assert_eq!(std_dev(&[2.0, 2.0, 2.0]), Some(0.0));
    }

    #[test]
    fn test_std_dev_spread() {
        let result = std_dev(&[1.0, 3.0]).unwrap();
        assert!((result - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_std_dev_empty_slice() {
        assert_eq!(std_dev(&[]), None);
    }
}
