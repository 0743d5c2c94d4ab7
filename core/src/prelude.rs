use crate::telemetry::observer::DiagnosticObserver;
use serde::{Deserialize, Serialize};

/// Circular delay applied by the complex envelope variants.
pub const DEFAULT_DELAY_SAMPLES: usize = 10;

/// Whether a transform reports its intermediate signals to an observer.
///
/// Switching diagnostics on never changes the returned array.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    #[default]
    Off,
    On,
}

impl DisplayMode {
    pub fn is_on(self) -> bool {
        matches!(self, DisplayMode::On)
    }
}

impl From<bool> for DisplayMode {
    fn from(flag: bool) -> Self {
        if flag {
            DisplayMode::On
        } else {
            DisplayMode::Off
        }
    }
}

/// Shared configuration for every envelope detection call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionConfig {
    pub sampling_rate: f64,
    pub cutoff_hz: f64,
    #[serde(default = "default_delay_samples")]
    pub delay_samples: usize,
    #[serde(default)]
    pub display: DisplayMode,
}

fn default_delay_samples() -> usize {
    DEFAULT_DELAY_SAMPLES
}

impl DetectionConfig {
    pub fn new(sampling_rate: f64, cutoff_hz: f64) -> Self {
        Self {
            sampling_rate,
            cutoff_hz,
            delay_samples: DEFAULT_DELAY_SAMPLES,
            display: DisplayMode::Off,
        }
    }

    pub fn with_display(mut self, display: DisplayMode) -> Self {
        self.display = display;
        self
    }

    pub fn with_delay(mut self, delay_samples: usize) -> Self {
        self.delay_samples = delay_samples;
        self
    }
}

/// Common error type for the processing core.
///
/// Numeric fallout (NaN from empty masks, negative square roots) is not an
/// error and flows through the returned arrays instead.
#[derive(thiserror::Error, Debug)]
pub enum ProcessingError {
    #[error("invalid cutoff: {cutoff_hz} Hz is outside (0, {nyquist}) Hz")]
    InvalidCutoff { cutoff_hz: f64, nyquist: f64 },
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("dataset error: {0}")]
    Dataset(String),
    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("json failure: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<ndarray::ShapeError> for ProcessingError {
    fn from(err: ndarray::ShapeError) -> Self {
        ProcessingError::ShapeMismatch(err.to_string())
    }
}

pub type ProcessingResult<T> = Result<T, ProcessingError>;

/// A signal-driven envelope detector.
pub trait EnvelopeDetector {
    fn name(&self) -> &'static str;

    fn detect(
        &self,
        signal: &[f64],
        config: &DetectionConfig,
        observer: &mut dyn DiagnosticObserver,
    ) -> ProcessingResult<Vec<f64>>;
}
