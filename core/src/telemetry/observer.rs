use crate::math::fft::PowerSpectrum;
use crate::math::stats::StatsHelper;
use crate::processing::contrast::TargetMasks;
use crate::telemetry::log::LogManager;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Receives the intermediate signals of an envelope detection call.
pub trait DiagnosticObserver {
    /// A named intermediate step (rectified, squared, delayed, ...).
    fn intermediate(&mut self, _label: &str, _samples: &[f64]) {}

    /// Spectrum of the signal entering the low-pass filter.
    fn spectrum(&mut self, _spectrum: &PowerSpectrum) {}

    /// Reference signal next to the filter output.
    fn filtered(&mut self, _reference: &[f64], _filtered: &[f64]) {}
}

/// Receives the per-frame images and per-target masks of a contrast evaluation.
pub trait ContrastObserver {
    fn frame(&mut self, _frame: usize, _plane_waves: f64, _bmode: &Array2<f64>) {}

    fn target(&mut self, _frame: usize, _target: usize, _masks: &TargetMasks) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl DiagnosticObserver for NullObserver {}

impl ContrastObserver for NullObserver {}

impl<T: DiagnosticObserver> DiagnosticObserver for Option<T> {
    fn intermediate(&mut self, label: &str, samples: &[f64]) {
        if let Some(observer) = self {
            observer.intermediate(label, samples);
        }
    }

    fn spectrum(&mut self, spectrum: &PowerSpectrum) {
        if let Some(observer) = self {
            observer.spectrum(spectrum);
        }
    }

    fn filtered(&mut self, reference: &[f64], filtered: &[f64]) {
        if let Some(observer) = self {
            observer.filtered(reference, filtered);
        }
    }
}

impl<T: ContrastObserver> ContrastObserver for Option<T> {
    fn frame(&mut self, frame: usize, plane_waves: f64, bmode: &Array2<f64>) {
        if let Some(observer) = self {
            observer.frame(frame, plane_waves, bmode);
        }
    }

    fn target(&mut self, frame: usize, target: usize, masks: &TargetMasks) {
        if let Some(observer) = self {
            observer.target(frame, target, masks);
        }
    }
}

/// Hands every event to two observers, `first` then `second`.
#[derive(Debug, Clone, Default)]
pub struct Fanout<A, B> {
    pub first: A,
    pub second: B,
}

impl<A, B> Fanout<A, B> {
    pub fn new(first: A, second: B) -> Self {
        Self { first, second }
    }
}

impl<A: DiagnosticObserver, B: DiagnosticObserver> DiagnosticObserver for Fanout<A, B> {
    fn intermediate(&mut self, label: &str, samples: &[f64]) {
        self.first.intermediate(label, samples);
        self.second.intermediate(label, samples);
    }

    fn spectrum(&mut self, spectrum: &PowerSpectrum) {
        self.first.spectrum(spectrum);
        self.second.spectrum(spectrum);
    }

    fn filtered(&mut self, reference: &[f64], filtered: &[f64]) {
        self.first.filtered(reference, filtered);
        self.second.filtered(reference, filtered);
    }
}

impl<A: ContrastObserver, B: ContrastObserver> ContrastObserver for Fanout<A, B> {
    fn frame(&mut self, frame: usize, plane_waves: f64, bmode: &Array2<f64>) {
        self.first.frame(frame, plane_waves, bmode);
        self.second.frame(frame, plane_waves, bmode);
    }

    fn target(&mut self, frame: usize, target: usize, masks: &TargetMasks) {
        self.first.target(frame, target, masks);
        self.second.target(frame, target, masks);
    }
}

/// Forwards diagnostics to the log at debug level and keeps the lines it wrote.
pub struct LogObserver {
    logger: LogManager,
    lines: Vec<String>,
}

impl LogObserver {
    pub fn new() -> Self {
        Self {
            logger: LogManager::new("diagnostics"),
            lines: Vec::new(),
        }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }

    fn note(&mut self, line: String) {
        self.logger.detail(&line);
        self.lines.push(line);
    }
}

impl Default for LogObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl DiagnosticObserver for LogObserver {
    fn intermediate(&mut self, label: &str, samples: &[f64]) {
        self.note(format!(
            "{} -> {} samples, rms {:.4}",
            label,
            samples.len(),
            StatsHelper::rms(samples)
        ));
    }

    fn spectrum(&mut self, spectrum: &PowerSpectrum) {
        if let Some(peak) = spectrum.peak_frequency() {
            self.note(format!("spectrum peak at {:.3} Hz", peak.abs()));
        }
    }

    fn filtered(&mut self, reference: &[f64], filtered: &[f64]) {
        self.note(format!(
            "low-pass rms {:.4} -> {:.4}",
            StatsHelper::rms(reference),
            StatsHelper::rms(filtered)
        ));
    }
}

impl ContrastObserver for LogObserver {
    fn frame(&mut self, frame: usize, plane_waves: f64, bmode: &Array2<f64>) {
        let (rows, cols) = bmode.dim();
        self.note(format!(
            "frame {} ({} plane waves): {}x{} B-mode",
            frame,
            plane_waves.round(),
            rows,
            cols
        ));
    }

    fn target(&mut self, frame: usize, target: usize, masks: &TargetMasks) {
        self.note(format!(
            "frame {} target {}: {} inside / {} outside pixels",
            frame,
            target,
            masks.inside_count(),
            masks.outside_count()
        ));
    }
}

/// Named intermediate signal kept by [`DiagnosticTrace`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    pub label: String,
    pub samples: Vec<f64>,
}

/// Observer that keeps everything it sees, for tests and scene reports.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiagnosticTrace {
    pub intermediates: Vec<Trace>,
    pub spectra: Vec<PowerSpectrum>,
    pub reference: Vec<f64>,
    pub filtered: Vec<f64>,
}

impl DiagnosticObserver for DiagnosticTrace {
    fn intermediate(&mut self, label: &str, samples: &[f64]) {
        self.intermediates.push(Trace {
            label: label.to_string(),
            samples: samples.to_vec(),
        });
    }

    fn spectrum(&mut self, spectrum: &PowerSpectrum) {
        self.spectra.push(spectrum.clone());
    }

    fn filtered(&mut self, reference: &[f64], filtered: &[f64]) {
        self.reference = reference.to_vec();
        self.filtered = filtered.to_vec();
    }
}

impl DiagnosticTrace {
    pub fn is_empty(&self) -> bool {
        self.intermediates.is_empty() && self.spectra.is_empty() && self.filtered.is_empty()
    }

    pub fn labels(&self) -> Vec<&str> {
        self.intermediates
            .iter()
            .map(|trace| trace.label.as_str())
            .collect()
    }
}

/// Contrast observer that keeps the B-mode image and masks of one frame.
#[derive(Debug, Clone, Default)]
pub struct FrameCapture {
    pub frame: usize,
    pub bmode: Option<Array2<f64>>,
    pub masks: Vec<TargetMasks>,
}

impl FrameCapture {
    pub fn new(frame: usize) -> Self {
        Self {
            frame,
            ..Default::default()
        }
    }
}

impl ContrastObserver for FrameCapture {
    fn frame(&mut self, frame: usize, _plane_waves: f64, bmode: &Array2<f64>) {
        if frame == self.frame {
            self.bmode = Some(bmode.clone());
        }
    }

    fn target(&mut self, frame: usize, _target: usize, masks: &TargetMasks) {
        if frame == self.frame {
            self.masks.push(masks.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_records_in_call_order() {
        let mut trace = DiagnosticTrace::default();
        assert!(trace.is_empty());
        trace.intermediate("rectified", &[1.0, 0.0]);
        trace.intermediate("squared", &[1.0, 4.0]);
        trace.filtered(&[1.0, 2.0], &[0.5, 1.5]);
        assert_eq!(trace.labels(), vec!["rectified", "squared"]);
        assert_eq!(trace.filtered, vec![0.5, 1.5]);
        assert!(!trace.is_empty());
    }

    #[test]
    fn frame_capture_ignores_other_frames() {
        let mut capture = FrameCapture::new(1);
        capture.frame(0, 1.0, &Array2::zeros((2, 2)));
        assert!(capture.bmode.is_none());
        capture.frame(1, 11.0, &Array2::ones((2, 2)));
        assert_eq!(capture.bmode.unwrap()[[0, 0]], 1.0);
    }

    #[test]
    fn fanout_reaches_both_observers() {
        let mut pair = Fanout::new(DiagnosticTrace::default(), Some(LogObserver::new()));
        pair.intermediate("rectified", &[3.0, -3.0]);
        pair.filtered(&[1.0], &[0.5]);
        assert_eq!(pair.first.labels(), vec!["rectified"]);
        let lines = pair.second.unwrap().into_lines();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("rectified -> 2 samples"));
    }

    #[test]
    fn absent_log_observer_stays_silent() {
        let mut pair: Fanout<FrameCapture, Option<LogObserver>> =
            Fanout::new(FrameCapture::new(0), None);
        pair.frame(0, 1.0, &Array2::zeros((3, 2)));
        assert!(pair.first.bmode.is_some());
        assert!(pair.second.is_none());
    }

    #[test]
    fn log_observer_reports_frames() {
        let mut log = LogObserver::new();
        log.frame(2, 75.0, &Array2::zeros((80, 64)));
        assert_eq!(log.lines(), ["frame 2 (75 plane waves): 80x64 B-mode"]);
    }
}
