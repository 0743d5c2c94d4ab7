use crate::math::fft::PowerSpectrum;
use crate::prelude::{DetectionConfig, ProcessingError, ProcessingResult};
use crate::telemetry::observer::DiagnosticObserver;
use num_complex::Complex64;
use std::f64::consts::PI;

/// Order of the envelope low-pass filter.
pub const LOW_PASS_ORDER: usize = 3;

/// Rational transfer function `B(z) / A(z)` in powers of `z^-1`.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferFunction {
    b: Vec<f64>,
    a: Vec<f64>,
}

impl TransferFunction {
    /// Builds a filter from raw coefficients, normalizing by `a[0]`.
    pub fn new(b: Vec<f64>, a: Vec<f64>) -> ProcessingResult<Self> {
        let a0 = match a.first() {
            Some(&value) if value != 0.0 => value,
            _ => {
                return Err(ProcessingError::InvalidParameter(
                    "leading denominator coefficient must be non-zero".into(),
                ))
            }
        };
        if b.is_empty() {
            return Err(ProcessingError::InvalidParameter(
                "numerator must not be empty".into(),
            ));
        }
        Ok(Self {
            b: b.iter().map(|v| v / a0).collect(),
            a: a.iter().map(|v| v / a0).collect(),
        })
    }

    /// Digital Butterworth low-pass with unity DC gain.
    pub fn butterworth_lowpass(
        order: usize,
        cutoff_hz: f64,
        sampling_rate: f64,
    ) -> ProcessingResult<Self> {
        if order == 0 {
            return Err(ProcessingError::InvalidParameter(
                "filter order must be at least 1".into(),
            ));
        }
        if !(sampling_rate > 0.0 && sampling_rate.is_finite()) {
            return Err(ProcessingError::InvalidParameter(format!(
                "sampling rate must be positive, got {}",
                sampling_rate
            )));
        }
        let nyquist = sampling_rate / 2.0;
        if !(cutoff_hz > 0.0 && cutoff_hz < nyquist) {
            return Err(ProcessingError::InvalidCutoff { cutoff_hz, nyquist });
        }

        let warped = prewarp(cutoff_hz, sampling_rate);
        let fs2 = 2.0 * sampling_rate;
        let digital_poles: Vec<Complex64> = butterworth_poles(order)
            .into_iter()
            .map(|pole| {
                let analog = pole * warped;
                (fs2 + analog) / (fs2 - analog)
            })
            .collect();

        let a = expand_roots(&digital_poles);
        // Every zero of a bilinear-transformed low-pass sits at z = -1.
        let zeros = binomial_row(order);
        let gain = a.iter().sum::<f64>() / zeros.iter().sum::<f64>();
        let b = zeros.iter().map(|c| c * gain).collect();

        Self::new(b, a)
    }

    pub fn numerator(&self) -> &[f64] {
        &self.b
    }

    pub fn denominator(&self) -> &[f64] {
        &self.a
    }

    /// Applies the filter once, from a zero initial state.
    pub fn filter(&self, input: &[f64]) -> Vec<f64> {
        let taps = self.b.len().max(self.a.len());
        let mut b = self.b.clone();
        let mut a = self.a.clone();
        b.resize(taps, 0.0);
        a.resize(taps, 0.0);

        let mut state = vec![0.0; taps - 1];
        let mut output = Vec::with_capacity(input.len());
        for &sample in input {
            let value = b[0] * sample + state.first().copied().unwrap_or(0.0);
            for i in 0..state.len() {
                let next = state.get(i + 1).copied().unwrap_or(0.0);
                state[i] = b[i + 1] * sample - a[i + 1] * value + next;
            }
            output.push(value);
        }
        output
    }

    /// Complex response `H(e^jw)` at `freq_hz`.
    pub fn frequency_response(&self, freq_hz: f64, sampling_rate: f64) -> Complex64 {
        let omega = 2.0 * PI * freq_hz / sampling_rate;
        let z_inv = Complex64::from_polar(1.0, -omega);
        let evaluate = |coefficients: &[f64]| {
            coefficients
                .iter()
                .rev()
                .fold(Complex64::new(0.0, 0.0), |acc, &c| acc * z_inv + c)
        };
        evaluate(&self.b) / evaluate(&self.a)
    }
}

fn prewarp(freq_hz: f64, sampling_rate: f64) -> f64 {
    2.0 * sampling_rate * (PI * freq_hz / sampling_rate).tan()
}

/// Left-half-plane poles of the normalized analog Butterworth prototype.
fn butterworth_poles(order: usize) -> Vec<Complex64> {
    (0..order)
        .map(|k| {
            let theta = PI * (2 * k + order + 1) as f64 / (2 * order) as f64;
            Complex64::from_polar(1.0, theta)
        })
        .collect()
}

/// Real coefficients of `prod(1 - r z^-1)`, highest power first.
fn expand_roots(roots: &[Complex64]) -> Vec<f64> {
    let mut coefficients = vec![Complex64::new(1.0, 0.0)];
    for root in roots {
        coefficients.push(Complex64::new(0.0, 0.0));
        for i in (1..coefficients.len()).rev() {
            let previous = coefficients[i - 1];
            coefficients[i] -= *root * previous;
        }
    }
    coefficients.iter().map(|c| c.re).collect()
}

fn binomial_row(order: usize) -> Vec<f64> {
    let mut row = vec![1.0];
    for _ in 0..order {
        let mut next = vec![1.0; row.len() + 1];
        for i in 1..row.len() {
            next[i] = row[i - 1] + row[i];
        }
        row = next;
    }
    row
}

/// Third-order Butterworth low-pass of `signal`.
pub fn low_pass(
    signal: &[f64],
    config: &DetectionConfig,
    observer: &mut dyn DiagnosticObserver,
) -> ProcessingResult<Vec<f64>> {
    low_pass_with_reference(signal, None, config, observer)
}

/// Same as [`low_pass`], additionally reporting `reference` next to the output
/// when diagnostics are on.
pub fn low_pass_with_reference(
    signal: &[f64],
    reference: Option<&[f64]>,
    config: &DetectionConfig,
    observer: &mut dyn DiagnosticObserver,
) -> ProcessingResult<Vec<f64>> {
    if config.display.is_on() {
        observer.spectrum(&PowerSpectrum::compute(signal, config.sampling_rate));
    }

    let filter =
        TransferFunction::butterworth_lowpass(LOW_PASS_ORDER, config.cutoff_hz, config.sampling_rate)?;
    let filtered = filter.filter(signal);

    if config.display.is_on() {
        if let Some(reference) = reference {
            observer.filtered(reference, &filtered);
        }
    }
    Ok(filtered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prelude::DisplayMode;
    use crate::telemetry::observer::{DiagnosticTrace, NullObserver};

    #[test]
    fn butterworth_matches_reference_coefficients() {
        // Third order, cutoff at a fifth of Nyquist.
        let filter = TransferFunction::butterworth_lowpass(3, 0.1, 1.0).unwrap();
        let expected_b = [0.01809893, 0.0542968, 0.0542968, 0.01809893];
        let expected_a = [1.0, -1.76004188, 1.18289326, -0.27805992];
        for (value, expected) in filter.numerator().iter().zip(expected_b.iter()) {
            assert!((value - expected).abs() < 1e-7);
        }
        for (value, expected) in filter.denominator().iter().zip(expected_a.iter()) {
            assert!((value - expected).abs() < 1e-7);
        }
    }

    #[test]
    fn butterworth_has_unity_dc_gain_and_half_power_cutoff() {
        let fs = 65e6;
        let cutoff = 2e6;
        let filter = TransferFunction::butterworth_lowpass(3, cutoff, fs).unwrap();
        assert!((filter.frequency_response(0.0, fs).norm() - 1.0).abs() < 1e-9);
        let at_cutoff = filter.frequency_response(cutoff, fs).norm();
        assert!((at_cutoff - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-6);
    }

    #[test]
    fn cutoff_outside_nyquist_is_rejected() {
        assert!(matches!(
            TransferFunction::butterworth_lowpass(3, 0.6, 1.0),
            Err(ProcessingError::InvalidCutoff { .. })
        ));
        assert!(TransferFunction::butterworth_lowpass(3, 0.0, 1.0).is_err());
        assert!(TransferFunction::butterworth_lowpass(0, 0.1, 1.0).is_err());
    }

    #[test]
    fn filter_matches_hand_computed_impulse_response() {
        let filter = TransferFunction::new(vec![0.5, 0.5], vec![1.0, -0.5]).unwrap();
        let output = filter.filter(&[1.0, 0.0, 0.0, 0.0]);
        assert_eq!(output, vec![0.5, 0.75, 0.375, 0.1875]);
    }

    #[test]
    fn coefficients_are_normalized_by_leading_denominator() {
        let filter = TransferFunction::new(vec![2.0], vec![2.0, -1.0]).unwrap();
        assert_eq!(filter.numerator(), &[1.0]);
        assert_eq!(filter.denominator(), &[1.0, -0.5]);
        assert!(TransferFunction::new(vec![1.0], vec![0.0, 1.0]).is_err());
    }

    #[test]
    fn low_pass_settles_on_constant_input() {
        let config = DetectionConfig::new(1000.0, 50.0);
        let output = low_pass(&[2.0; 400], &config, &mut NullObserver).unwrap();
        assert_eq!(output.len(), 400);
        assert!((output[399] - 2.0).abs() < 1e-6);
    }

    #[test]
    fn diagnostics_do_not_change_the_output() {
        let signal: Vec<f64> = (0..256).map(|i| ((i * 7) % 13) as f64 - 6.0).collect();
        let quiet = DetectionConfig::new(1000.0, 100.0);
        let loud = quiet.clone().with_display(DisplayMode::On);

        let mut trace = DiagnosticTrace::default();
        let plain = low_pass(&signal, &quiet, &mut trace).unwrap();
        assert!(trace.is_empty());

        let observed = low_pass_with_reference(&signal, Some(&signal), &loud, &mut trace).unwrap();
        assert_eq!(plain, observed);
        assert_eq!(trace.spectra.len(), 1);
        assert_eq!(trace.spectra[0].power.len(), 256);
        assert_eq!(trace.reference, signal);
    }
}
