pub struct StatsHelper;

impl StatsHelper {
    pub fn rms(samples: &[f64]) -> f64 {
        if samples.is_empty() {
            return 0.0;
        }
        let sum_sq: f64 = samples.iter().map(|&v| v * v).sum();
        (sum_sq / samples.len() as f64).sqrt()
    }

    /// Arithmetic mean; NaN for an empty slice.
    pub fn mean(samples: &[f64]) -> f64 {
        samples.iter().sum::<f64>() / samples.len() as f64
    }

    /// Population variance (`ddof = 0`); NaN for an empty slice.
    pub fn variance(samples: &[f64]) -> f64 {
        let mean = Self::mean(samples);
        samples.iter().map(|&v| (v - mean) * (v - mean)).sum::<f64>() / samples.len() as f64
    }

    /// Largest value, skipping NaN. `None` when nothing comparable remains.
    pub fn max(samples: &[f64]) -> Option<f64> {
        samples
            .iter()
            .copied()
            .filter(|v| !v.is_nan())
            .reduce(f64::max)
    }

    /// Mean of `|estimate - truth| / |truth|` over the overlapping samples.
    pub fn mean_relative_error(estimate: &[f64], truth: &[f64]) -> f64 {
        let errors: Vec<f64> = estimate
            .iter()
            .zip(truth.iter())
            .map(|(&e, &t)| (e - t).abs() / t.abs())
            .collect();
        Self::mean(&errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rms_zero_sequence_yields_zero() {
        assert_eq!(StatsHelper::rms(&[]), 0.0);
        assert_eq!(StatsHelper::rms(&[0.0, 0.0]), 0.0);
    }

    #[test]
    fn rms_handles_single_value() {
        assert_eq!(StatsHelper::rms(&[4.0]), 4.0);
    }

    #[test]
    fn variance_is_population_variance() {
        assert_eq!(StatsHelper::mean(&[1.0, 2.0, 3.0, 4.0]), 2.5);
        assert_eq!(StatsHelper::variance(&[1.0, 2.0, 3.0, 4.0]), 1.25);
    }

    #[test]
    fn empty_slices_give_nan() {
        assert!(StatsHelper::mean(&[]).is_nan());
        assert!(StatsHelper::variance(&[]).is_nan());
        assert_eq!(StatsHelper::max(&[]), None);
    }

    #[test]
    fn max_skips_nan() {
        assert_eq!(StatsHelper::max(&[1.0, f64::NAN, 3.0]), Some(3.0));
    }

    #[test]
    fn relative_error_of_exact_estimate_is_zero() {
        assert_eq!(StatsHelper::mean_relative_error(&[2.0, 4.0], &[2.0, 4.0]), 0.0);
        assert_eq!(StatsHelper::mean_relative_error(&[3.0], &[2.0]), 0.5);
    }
}
