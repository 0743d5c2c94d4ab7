use super::template::{gaussian_pulse, time_axis};
use crate::workflow::config::{SignalConfig, VideoConfig};
use anyhow::Context;
use ndarray::Array2;
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::f64::consts::PI;
use uscore::processing::ModulationParams;

/// A synthetic AM scan line together with the parameters that produced it.
pub struct AmLine {
    pub t: Vec<f64>,
    pub params: ModulationParams,
    pub signal: Vec<f64>,
}

impl AmLine {
    pub fn expected_envelope(&self) -> Vec<f64> {
        self.params.expected_envelope()
    }
}

fn jitter(rng: &mut StdRng, noise: f64) -> f64 {
    if noise > 0.0 {
        rng.gen_range(-noise..noise)
    } else {
        0.0
    }
}

/// Message `Am·(1 + ½·sin(2π·fm·t))`, modulated onto the carrier, plus uniform noise.
pub fn build_am_line(config: &SignalConfig) -> anyhow::Result<AmLine> {
    let t = time_axis(config.samples, config.sampling_rate);
    let message = t
        .iter()
        .map(|&time| {
            config.message_amplitude * (1.0 + 0.5 * (2.0 * PI * config.message_frequency * time).sin())
        })
        .collect();
    let params = ModulationParams {
        carrier_amplitude: config.carrier_amplitude,
        carrier_frequency: config.carrier_frequency,
        modulation_index: config.modulation_index,
        message,
        message_amplitude: config.message_amplitude,
    };

    let mut rng = StdRng::seed_from_u64(config.seed);
    let signal = params
        .modulated(&t)
        .context("modulating synthetic scan line")?
        .into_iter()
        .map(|sample| sample + jitter(&mut rng, config.noise))
        .collect();

    Ok(AmLine { t, params, signal })
}

/// RF matrix `(scan line, sample)` of Gaussian echoes at depths shared by all lines.
pub fn build_rf_matrix(config: &VideoConfig) -> anyhow::Result<Array2<f64>> {
    let lines = config.scan_lines.max(1);
    let samples = config.samples.max(1);
    lines
        .checked_mul(samples)
        .context("overflow computing RF matrix size")?;

    let mut rng = StdRng::seed_from_u64(config.seed);
    let spacing = samples as f64 / (config.reflectors + 1) as f64;
    let echoes: Vec<Vec<f64>> = (1..=config.reflectors)
        .map(|k| gaussian_pulse(samples, k as f64 * spacing, 6.0, config.pulse_frequency))
        .collect();

    let mut matrix = Array2::<f64>::zeros((lines, samples));
    for mut line in matrix.rows_mut() {
        let gains: Vec<f64> = echoes.iter().map(|_| rng.gen_range(0.2..1.0)).collect();
        for (n, slot) in line.iter_mut().enumerate() {
            let echo: f64 = echoes.iter().zip(&gains).map(|(e, g)| g * e[n]).sum();
            *slot = 100.0 * echo + jitter(&mut rng, config.noise * 100.0);
        }
    }
    Ok(matrix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn am_line_matches_requested_length_and_envelope() {
        let config = SignalConfig::default();
        let line = build_am_line(&config).unwrap();
        assert_eq!(line.signal.len(), config.samples);
        assert_eq!(line.t.len(), config.samples);
        let expected = line.expected_envelope();
        // Ac·m·(1 + ½ sin) stays within [0.5, 1.5] for the defaults
        assert!(expected.iter().all(|&e| (0.5 - 1e-12..=1.5 + 1e-12).contains(&e)));
        assert!(line
            .signal
            .iter()
            .zip(expected.iter())
            .all(|(s, e)| s.abs() <= e + 1e-12));
    }

    #[test]
    fn noise_is_reproducible_from_seed() {
        let config = SignalConfig {
            noise: 0.1,
            seed: 13,
            ..Default::default()
        };
        let first = build_am_line(&config).unwrap();
        let second = build_am_line(&config).unwrap();
        assert_eq!(first.signal, second.signal);
    }

    #[test]
    fn rf_matrix_has_one_row_per_scan_line() {
        let config = VideoConfig {
            scan_lines: 5,
            samples: 256,
            ..Default::default()
        };
        let rf = build_rf_matrix(&config).unwrap();
        assert_eq!(rf.dim(), (5, 256));
        assert!(rf.iter().any(|v| v.abs() > 10.0));
    }
}
