use crate::math::fft::hilbert_imag;
use crate::prelude::{
    DetectionConfig, EnvelopeDetector, ProcessingError, ProcessingResult,
};
use crate::processing::filter::{low_pass, low_pass_with_reference};
use crate::telemetry::observer::DiagnosticObserver;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

/// Phase of the local oscillator used by the oscillator variants.
pub const LOCAL_OSCILLATOR_PHASE: f64 = PI / 2.0 + 2.0 * PI;

/// Ratio between the carrier and the secondary oscillator of the complex variants.
pub const SECONDARY_OSCILLATOR_DIVISOR: f64 = 5.0;

/// Phase offset of the second complex-oscillator variant.
pub const SECONDARY_OSCILLATOR_PHASE: f64 = PI / 4.0;

/// Signal-driven envelope detectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AsyncMethod {
    HalfWave,
    FullWave,
    RealSquareLaw,
    ComplexHilbert,
    ComplexSquareLaw,
}

impl AsyncMethod {
    pub const ALL: [AsyncMethod; 5] = [
        AsyncMethod::HalfWave,
        AsyncMethod::FullWave,
        AsyncMethod::RealSquareLaw,
        AsyncMethod::ComplexHilbert,
        AsyncMethod::ComplexSquareLaw,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AsyncMethod::HalfWave => "half_wave",
            AsyncMethod::FullWave => "full_wave",
            AsyncMethod::RealSquareLaw => "real_square_law",
            AsyncMethod::ComplexHilbert => "complex_hilbert",
            AsyncMethod::ComplexSquareLaw => "complex_square_law",
        }
    }
}

impl EnvelopeDetector for AsyncMethod {
    fn name(&self) -> &'static str {
        self.as_str()
    }

    fn detect(
        &self,
        signal: &[f64],
        config: &DetectionConfig,
        observer: &mut dyn DiagnosticObserver,
    ) -> ProcessingResult<Vec<f64>> {
        match self {
            AsyncMethod::HalfWave => half_wave(signal, config, observer),
            AsyncMethod::FullWave => full_wave(signal, config, observer),
            AsyncMethod::RealSquareLaw => real_square_law(signal, config, observer),
            AsyncMethod::ComplexHilbert => complex_hilbert(signal, config, observer),
            AsyncMethod::ComplexSquareLaw => complex_square_law(signal, config, observer),
        }
    }
}

/// Explicit carrier and message description for the oscillator variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModulationParams {
    pub carrier_amplitude: f64,
    pub carrier_frequency: f64,
    pub modulation_index: f64,
    /// Message samples, one per entry of the time axis.
    pub message: Vec<f64>,
    pub message_amplitude: f64,
}

impl ModulationParams {
    /// `Ac·cos(2π·fc·t + φ)·m·ym(t)/Am` over the time axis `t`.
    pub fn modulated(&self, t: &[f64]) -> ProcessingResult<Vec<f64>> {
        if t.len() != self.message.len() {
            return Err(ProcessingError::ShapeMismatch(format!(
                "time axis has {} samples but message has {}",
                t.len(),
                self.message.len()
            )));
        }
        Ok(t.iter()
            .zip(self.message.iter())
            .map(|(&time, &message)| {
                self.carrier_amplitude * self.local_oscillator(time) * self.modulation_index
                    * message
                    / self.message_amplitude
            })
            .collect())
    }

    /// Magnitude of the modulating term `Ac·m·ym/Am`.
    pub fn expected_envelope(&self) -> Vec<f64> {
        self.message
            .iter()
            .map(|&message| {
                (self.carrier_amplitude * self.modulation_index * message / self.message_amplitude)
                    .abs()
            })
            .collect()
    }

    fn local_oscillator(&self, time: f64) -> f64 {
        (2.0 * PI * self.carrier_frequency * time + LOCAL_OSCILLATOR_PHASE).cos()
    }

    fn secondary_frequency(&self) -> f64 {
        self.carrier_frequency / SECONDARY_OSCILLATOR_DIVISOR
    }
}

/// Envelope detectors that demodulate against explicit oscillator terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OscillatorMethod {
    SynchronousReal,
    ComplexOscillatorV1,
    ComplexOscillatorV2,
}

impl OscillatorMethod {
    pub const ALL: [OscillatorMethod; 3] = [
        OscillatorMethod::SynchronousReal,
        OscillatorMethod::ComplexOscillatorV1,
        OscillatorMethod::ComplexOscillatorV2,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OscillatorMethod::SynchronousReal => "synchronous_real",
            OscillatorMethod::ComplexOscillatorV1 => "complex_oscillator_v1",
            OscillatorMethod::ComplexOscillatorV2 => "complex_oscillator_v2",
        }
    }

    pub fn detect(
        self,
        params: &ModulationParams,
        t: &[f64],
        config: &DetectionConfig,
        observer: &mut dyn DiagnosticObserver,
    ) -> ProcessingResult<Vec<f64>> {
        match self {
            OscillatorMethod::SynchronousReal => synchronous_real(params, t, config, observer),
            OscillatorMethod::ComplexOscillatorV1 => {
                complex_oscillator_v1(params, t, config, observer)
            }
            OscillatorMethod::ComplexOscillatorV2 => {
                complex_oscillator_v2(params, t, config, observer)
            }
        }
    }
}

/// Any of the envelope detection methods, by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnvelopeMethod {
    Async(AsyncMethod),
    Oscillator(OscillatorMethod),
}

impl EnvelopeMethod {
    pub fn all() -> Vec<EnvelopeMethod> {
        AsyncMethod::ALL
            .iter()
            .map(|&m| EnvelopeMethod::Async(m))
            .chain(OscillatorMethod::ALL.iter().map(|&m| EnvelopeMethod::Oscillator(m)))
            .collect()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EnvelopeMethod::Async(method) => method.as_str(),
            EnvelopeMethod::Oscillator(method) => method.as_str(),
        }
    }
}

impl fmt::Display for EnvelopeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EnvelopeMethod {
    type Err = ProcessingError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let wanted = value.trim().replace('-', "_").to_ascii_lowercase();
        EnvelopeMethod::all()
            .into_iter()
            .find(|method| method.as_str() == wanted)
            .ok_or_else(|| {
                ProcessingError::InvalidParameter(format!("unknown envelope method '{}'", value))
            })
    }
}

impl FromStr for AsyncMethod {
    type Err = ProcessingError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.parse::<EnvelopeMethod>()? {
            EnvelopeMethod::Async(method) => Ok(method),
            EnvelopeMethod::Oscillator(method) => Err(ProcessingError::InvalidParameter(format!(
                "'{}' needs explicit oscillator parameters",
                method.as_str()
            ))),
        }
    }
}

/// Circular shift right by `delay` samples: `out[i] = signal[(i - delay) mod n]`.
pub fn circular_delay(signal: &[f64], delay: usize) -> Vec<f64> {
    let mut delayed = signal.to_vec();
    if !delayed.is_empty() {
        let shift = delay % delayed.len();
        delayed.rotate_right(shift);
    }
    delayed
}

/// Clips negative samples to zero, then low-pass filters.
pub fn half_wave(
    signal: &[f64],
    config: &DetectionConfig,
    observer: &mut dyn DiagnosticObserver,
) -> ProcessingResult<Vec<f64>> {
    let rectified: Vec<f64> = signal
        .iter()
        .map(|&v| if v < 0.0 { 0.0 } else { v })
        .collect();
    if config.display.is_on() {
        observer.intermediate("half-wave rectified", &rectified);
    }
    low_pass_with_reference(&rectified, Some(&rectified), config, observer)
}

/// Absolute value, then low-pass filter.
pub fn full_wave(
    signal: &[f64],
    config: &DetectionConfig,
    observer: &mut dyn DiagnosticObserver,
) -> ProcessingResult<Vec<f64>> {
    let rectified: Vec<f64> = signal.iter().map(|v| v.abs()).collect();
    if config.display.is_on() {
        observer.intermediate("full-wave rectified", &rectified);
    }
    low_pass_with_reference(&rectified, Some(&rectified), config, observer)
}

/// Squares the signal, low-pass filters it and takes the square root.
///
/// The filtered square can undershoot below zero on sharp transitions; the
/// root is taken as is, so those samples come back as NaN.
pub fn real_square_law(
    signal: &[f64],
    config: &DetectionConfig,
    observer: &mut dyn DiagnosticObserver,
) -> ProcessingResult<Vec<f64>> {
    let squared: Vec<f64> = signal.iter().map(|v| v * v).collect();
    if config.display.is_on() {
        observer.intermediate("rf squared", &squared);
    }
    let filtered = low_pass(&squared, config, observer)?;
    let envelope: Vec<f64> = filtered.iter().map(|v| v.sqrt()).collect();
    if config.display.is_on() {
        observer.filtered(&squared, &envelope);
    }
    Ok(envelope)
}

/// `|delay(x)| + |H{x}|`, then low-pass filter.
pub fn complex_hilbert(
    signal: &[f64],
    config: &DetectionConfig,
    observer: &mut dyn DiagnosticObserver,
) -> ProcessingResult<Vec<f64>> {
    let delayed = circular_delay(signal, config.delay_samples);
    if config.display.is_on() {
        observer.intermediate("delayed", &delayed);
    }
    let quadrature = hilbert_imag(signal);
    let combined: Vec<f64> = delayed
        .iter()
        .zip(quadrature.iter())
        .map(|(i, q)| i.abs() + q.abs())
        .collect();
    low_pass_with_reference(&combined, Some(signal), config, observer)
}

/// `sqrt(delay(x)^2 + H{x}^2)`, then low-pass filter.
pub fn complex_square_law(
    signal: &[f64],
    config: &DetectionConfig,
    observer: &mut dyn DiagnosticObserver,
) -> ProcessingResult<Vec<f64>> {
    let delayed = circular_delay(signal, config.delay_samples);
    if config.display.is_on() {
        observer.intermediate("delayed", &delayed);
    }
    let quadrature = hilbert_imag(signal);
    let magnitude: Vec<f64> = delayed
        .iter()
        .zip(quadrature.iter())
        .map(|(i, q)| (i * i + q * q).sqrt())
        .collect();
    low_pass_with_reference(&magnitude, Some(signal), config, observer)
}

/// Multiplies the modulated carrier by the local oscillator, then low-pass filters.
pub fn synchronous_real(
    params: &ModulationParams,
    t: &[f64],
    config: &DetectionConfig,
    observer: &mut dyn DiagnosticObserver,
) -> ProcessingResult<Vec<f64>> {
    let modulated = params.modulated(t)?;
    let mixed: Vec<f64> = modulated
        .iter()
        .zip(t.iter())
        .map(|(&am, &time)| am * params.local_oscillator(time))
        .collect();
    if config.display.is_on() {
        observer.intermediate("mixed", &mixed);
    }
    low_pass_with_reference(&mixed, Some(&modulated), config, observer)
}

/// In-phase/quadrature mix at `fc / 5`, low-pass each branch, then combine.
pub fn complex_oscillator_v1(
    params: &ModulationParams,
    t: &[f64],
    config: &DetectionConfig,
    observer: &mut dyn DiagnosticObserver,
) -> ProcessingResult<Vec<f64>> {
    let modulated = params.modulated(t)?;
    let (in_phase, quadrature) = secondary_mix(params, &modulated, t, 0.0);

    let in_phase = low_pass(&in_phase, config, observer)?;
    let quadrature = low_pass(&quadrature, config, observer)?;

    let envelope: Vec<f64> = in_phase
        .iter()
        .zip(quadrature.iter())
        .map(|(i, q)| (i * i + q * q).sqrt())
        .collect();
    if config.display.is_on() {
        observer.filtered(&modulated, &envelope);
    }
    Ok(envelope)
}

/// In-phase/quadrature mix at `fc / 5` with a π/4 offset, combine, then low-pass.
pub fn complex_oscillator_v2(
    params: &ModulationParams,
    t: &[f64],
    config: &DetectionConfig,
    observer: &mut dyn DiagnosticObserver,
) -> ProcessingResult<Vec<f64>> {
    let modulated = params.modulated(t)?;
    let (in_phase, quadrature) =
        secondary_mix(params, &modulated, t, SECONDARY_OSCILLATOR_PHASE);
    let magnitude: Vec<f64> = in_phase
        .iter()
        .zip(quadrature.iter())
        .map(|(i, q)| (i * i + q * q).sqrt())
        .collect();
    if config.display.is_on() {
        observer.intermediate("combined", &magnitude);
    }
    low_pass_with_reference(&magnitude, Some(&modulated), config, observer)
}

fn secondary_mix(
    params: &ModulationParams,
    modulated: &[f64],
    t: &[f64],
    phase: f64,
) -> (Vec<f64>, Vec<f64>) {
    let f0 = params.secondary_frequency();
    modulated
        .iter()
        .zip(t.iter())
        .map(|(&am, &time)| {
            let angle = 2.0 * PI * f0 * time + phase;
            (am * angle.cos(), am * angle.sin())
        })
        .unzip()
}
