use std::f64::consts::PI;

/// `n / fs` for `n` in `0..length`.
pub fn time_axis(length: usize, sampling_rate: f64) -> Vec<f64> {
    (0..length).map(|n| n as f64 / sampling_rate).collect()
}

/// Gaussian-windowed burst centred on `center`, in samples.
pub fn gaussian_pulse(length: usize, center: f64, width: f64, cycles_per_sample: f64) -> Vec<f64> {
    (0..length)
        .map(|n| {
            let offset = n as f64 - center;
            (-(offset * offset) / (2.0 * width * width)).exp()
                * (2.0 * PI * cycles_per_sample * offset).cos()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pulse_peaks_at_its_centre() {
        let pulse = gaussian_pulse(101, 50.0, 5.0, 0.05);
        assert_eq!(pulse[50], 1.0);
        assert!(pulse[0].abs() < 1e-10);
    }

    #[test]
    fn time_axis_steps_by_the_sampling_period() {
        let t = time_axis(4, 4.0);
        assert_eq!(t, vec![0.0, 0.25, 0.5, 0.75]);
    }
}
