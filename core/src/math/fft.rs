use num_complex::Complex64;
use rustfft::{num_traits::Zero, Fft, FftPlanner};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Helper that wraps the `rustfft` planner for a fixed transform length.
pub struct FftHelper {
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
    size: usize,
}

impl FftHelper {
    pub fn new(size: usize) -> Self {
        let mut planner = FftPlanner::new();
        let forward = planner.plan_fft_forward(size);
        let inverse = planner.plan_fft_inverse(size);
        Self {
            forward,
            inverse,
            size,
        }
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Forward transform of a real sequence, zero-padded or truncated to the plan length.
    pub fn forward(&self, input: &[f64]) -> Vec<Complex64> {
        let mut buffer: Vec<Complex64> = input
            .iter()
            .take(self.size)
            .map(|&value| Complex64::new(value, 0.0))
            .collect();
        buffer.resize(self.size, Complex64::zero());
        if self.size > 0 {
            self.forward.process(&mut buffer);
        }
        buffer
    }

    /// Normalized inverse transform (`ifft(fft(x)) == x`).
    pub fn inverse(&self, mut spectrum: Vec<Complex64>) -> Vec<Complex64> {
        spectrum.resize(self.size, Complex64::zero());
        if self.size == 0 {
            return spectrum;
        }
        self.inverse.process(&mut spectrum);
        let scale = 1.0 / self.size as f64;
        spectrum.iter_mut().for_each(|value| *value *= scale);
        spectrum
    }

    /// Analytic signal `x + j·H{x}` built in the frequency domain.
    pub fn analytic(&self, input: &[f64]) -> Vec<Complex64> {
        let n = self.size;
        let mut spectrum = self.forward(input);
        if n == 0 {
            return spectrum;
        }
        let half = n / 2;
        for (k, bin) in spectrum.iter_mut().enumerate() {
            let weight = if k == 0 || (n % 2 == 0 && k == half) {
                1.0
            } else if k < (n + 1) / 2 {
                2.0
            } else {
                0.0
            };
            *bin *= weight;
        }
        self.inverse(spectrum)
    }
}

/// Imaginary part of the analytic signal, i.e. the Hilbert transform of `signal`.
pub fn hilbert_imag(signal: &[f64]) -> Vec<f64> {
    FftHelper::new(signal.len())
        .analytic(signal)
        .iter()
        .map(|value| value.im)
        .collect()
}

/// Moves the zero-frequency bin to the centre of the sequence.
pub fn fftshift<T: Clone>(values: &[T]) -> Vec<T> {
    let mut shifted = values.to_vec();
    shifted.rotate_right(values.len() / 2);
    shifted
}

/// Centered power spectrum used to pick a low-pass cutoff by eye.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PowerSpectrum {
    pub frequencies: Vec<f64>,
    pub power: Vec<f64>,
}

impl PowerSpectrum {
    pub fn compute(signal: &[f64], sampling_rate: f64) -> Self {
        let len = signal.len();
        let spectrum = FftHelper::new(len).forward(signal);
        let power = fftshift(&spectrum)
            .iter()
            .map(|bin| bin.norm_sqr())
            .collect();
        let frequencies = (0..len)
            .map(|k| (k as f64 - len as f64 / 2.0) * sampling_rate / len as f64)
            .collect();
        Self { frequencies, power }
    }

    /// Frequency of the strongest bin.
    pub fn peak_frequency(&self) -> Option<f64> {
        self.power
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(idx, _)| self.frequencies[idx])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn fft_helper_returns_same_length() {
        let helper = FftHelper::new(4);
        let output = helper.forward(&[1.0, 0.0, -1.0, 0.0]);
        assert_eq!(output.len(), 4);
        assert!((output[1].re - 2.0).abs() < 1e-12);
    }

    #[test]
    fn inverse_undoes_forward() {
        let helper = FftHelper::new(5);
        let input = [0.5, -1.0, 2.0, 3.5, 0.0];
        let restored = helper.inverse(helper.forward(&input));
        for (value, expected) in restored.iter().zip(input.iter()) {
            assert!((value.re - expected).abs() < 1e-12);
            assert!(value.im.abs() < 1e-12);
        }
    }

    #[test]
    fn hilbert_of_cosine_is_sine() {
        let n = 64;
        let signal: Vec<f64> = (0..n)
            .map(|i| (2.0 * PI * 4.0 * i as f64 / n as f64).cos())
            .collect();
        let quadrature = hilbert_imag(&signal);
        for (i, value) in quadrature.iter().enumerate() {
            let expected = (2.0 * PI * 4.0 * i as f64 / n as f64).sin();
            assert!((value - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn fftshift_centres_odd_and_even_lengths() {
        assert_eq!(fftshift(&[0, 1, 2, 3]), vec![2, 3, 0, 1]);
        assert_eq!(fftshift(&[0, 1, 2, 3, 4]), vec![3, 4, 0, 1, 2]);
    }

    #[test]
    fn power_spectrum_peaks_at_tone_frequency() {
        let fs = 1000.0;
        let signal: Vec<f64> = (0..200)
            .map(|i| (2.0 * PI * 100.0 * i as f64 / fs).sin())
            .collect();
        let spectrum = PowerSpectrum::compute(&signal, fs);
        assert_eq!(spectrum.frequencies.len(), 200);
        assert_eq!(spectrum.frequencies[0], -500.0);
        let peak = spectrum.peak_frequency().unwrap();
        assert!((peak.abs() - 100.0).abs() < 1e-9);
    }
}
