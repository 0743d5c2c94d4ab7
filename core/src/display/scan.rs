use super::AcquisitionParams;
use crate::math::stats::StatsHelper;
use crate::prelude::{DetectionConfig, DisplayMode, EnvelopeDetector, ProcessingResult};
use crate::processing::envelope::AsyncMethod;
use crate::telemetry::observer::{DiagnosticObserver, NullObserver};
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

/// Scan lines are processed on a unit sample clock.
pub const VIDEO_SAMPLING_RATE: f64 = 1.0;
pub const VIDEO_CUTOFF: f64 = 0.2;

/// One RF scan line against depth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AScanView {
    pub samples: Vec<f64>,
    pub depth_mm: Vec<f64>,
    pub normalized: bool,
}

impl AScanView {
    pub fn new(data: &[f64], normalize: bool, sample_offset: usize, params: &AcquisitionParams) -> Self {
        let samples = if normalize {
            let peak = StatsHelper::max(data).unwrap_or(f64::NAN);
            data.iter().map(|v| v / peak).collect()
        } else {
            data.to_vec()
        };
        Self {
            samples,
            depth_mm: params.depth_axis(data.len(), sample_offset),
            normalized: normalize,
        }
    }
}

/// Image shaped `(depth sample, scan line)` with symmetric colour limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BModeView {
    pub image: Array2<f64>,
    pub depth_mm: Vec<f64>,
    pub clim: [f64; 2],
}

impl BModeView {
    /// `data` is `(scan line, sample)`.
    pub fn from_rf(
        data: &Array2<f64>,
        dynamic_range: f64,
        sample_offset: usize,
        params: &AcquisitionParams,
    ) -> Self {
        let image = data.t().as_standard_layout().into_owned();
        Self {
            depth_mm: params.depth_axis(image.nrows(), sample_offset),
            image,
            clim: [-dynamic_range, dynamic_range],
        }
    }

    pub fn scan_lines(&self) -> usize {
        self.image.ncols()
    }
}

/// Runs `method` over every scan line of `data` and returns the envelopes as a B-mode view.
///
/// Only `display_line` reports diagnostics; it also emits the raw line and its
/// envelope as `raw signal` and `detected envelope`. A line index past the
/// last scan line reports nothing.
pub fn video_envelope(
    data: &Array2<f64>,
    method: AsyncMethod,
    dynamic_range: f64,
    display_line: usize,
    sample_offset: usize,
    params: &AcquisitionParams,
    observer: &mut dyn DiagnosticObserver,
) -> ProcessingResult<BModeView> {
    let quiet = DetectionConfig::new(VIDEO_SAMPLING_RATE, VIDEO_CUTOFF);
    let shown = quiet.clone().with_display(DisplayMode::On);
    let mut video = data.to_owned();

    for (index, mut line) in video.axis_iter_mut(Axis(0)).enumerate() {
        let raw = line.to_vec();
        let envelope = if index == display_line {
            let envelope = method.detect(&raw, &shown, observer)?;
            observer.intermediate("raw signal", &raw);
            observer.intermediate("detected envelope", &envelope);
            envelope
        } else {
            method.detect(&raw, &quiet, &mut NullObserver)?
        };
        for (slot, value) in line.iter_mut().zip(envelope) {
            *slot = value;
        }
    }

    Ok(BModeView::from_rf(&video, dynamic_range, sample_offset, params))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::observer::DiagnosticTrace;
    use std::f64::consts::PI;

    fn rf_lines(lines: usize, samples: usize) -> Array2<f64> {
        Array2::from_shape_fn((lines, samples), |(line, n)| {
            (line + 1) as f64 * (2.0 * PI * 0.05 * n as f64).sin()
        })
    }

    #[test]
    fn a_scan_normalizes_to_peak() {
        let params = AcquisitionParams::default();
        let view = AScanView::new(&[1.0, -4.0, 2.0], true, 0, &params);
        assert_eq!(view.samples, vec![0.5, -2.0, 1.0]);
        assert_eq!(view.depth_mm.len(), 3);

        let raw = AScanView::new(&[1.0, -4.0, 2.0], false, 10, &params);
        assert_eq!(raw.samples, vec![1.0, -4.0, 2.0]);
        assert_eq!(raw.depth_mm[0], params.depth_mm(10.0, 0));
    }

    #[test]
    fn b_mode_is_transposed_with_symmetric_limits() {
        let data = Array2::from_shape_fn((2, 3), |(l, s)| (l * 10 + s) as f64);
        let view = BModeView::from_rf(&data, 100.0, 0, &AcquisitionParams::default());
        assert_eq!(view.image.dim(), (3, 2));
        assert_eq!(view.image[[2, 1]], 12.0);
        assert_eq!(view.clim, [-100.0, 100.0]);
        assert_eq!(view.depth_mm.len(), 3);
        assert_eq!(view.scan_lines(), 2);
    }

    #[test]
    fn video_applies_method_per_line_and_reports_one() {
        let data = rf_lines(4, 200);
        let params = AcquisitionParams::default();
        let mut trace = DiagnosticTrace::default();
        let view =
            video_envelope(&data, AsyncMethod::FullWave, 500.0, 1, 0, &params, &mut trace).unwrap();

        assert_eq!(view.image.dim(), (200, 4));
        assert_eq!(view.clim, [-500.0, 500.0]);

        let config = DetectionConfig::new(VIDEO_SAMPLING_RATE, VIDEO_CUTOFF);
        let line = data.row(2).to_vec();
        let expected = AsyncMethod::FullWave
            .detect(&line, &config, &mut NullObserver)
            .unwrap();
        assert_eq!(view.image.column(2).to_vec(), expected);

        let labels = trace.labels();
        assert_eq!(
            labels.iter().filter(|l| **l == "full-wave rectified").count(),
            1
        );
        assert!(labels.contains(&"raw signal"));
        assert!(labels.contains(&"detected envelope"));
        assert_eq!(trace.intermediates[0].samples.len(), 200);
    }

    #[test]
    fn missing_display_line_stays_quiet() {
        let data = rf_lines(2, 50);
        let mut trace = DiagnosticTrace::default();
        let view = video_envelope(
            &data,
            AsyncMethod::HalfWave,
            100.0,
            5,
            0,
            &AcquisitionParams::default(),
            &mut trace,
        )
        .unwrap();
        assert_eq!(view.image.dim(), (50, 2));
        assert!(trace.is_empty());
    }
}
