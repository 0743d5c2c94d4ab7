use super::scan::{AScanView, BModeView};
use super::axis_extents;
use crate::dataset::ReconstructedImage;
use crate::math::fft::PowerSpectrum;
use crate::prelude::ProcessingResult;
use crate::processing::contrast::{ContrastRow, TargetGeometry};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// A scan line next to its detected envelope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LineTrace {
    pub method: String,
    pub time: Vec<f64>,
    pub raw: Vec<f64>,
    pub envelope: Vec<f64>,
    #[serde(default)]
    pub expected: Vec<f64>,
    #[serde(default)]
    pub upper: Vec<f64>,
    #[serde(default)]
    pub lower: Vec<f64>,
}

/// One beamformed frame in dB with the target regions drawn on top.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameImage {
    pub plane_waves: f64,
    /// `(z, x)`, values in `[-dynamic_range_db, 0]`.
    pub bmode: Array2<f64>,
    pub x_extent_mm: [f64; 2],
    pub z_extent_mm: [f64; 2],
    pub dynamic_range_db: f64,
    pub targets: Vec<TargetGeometry>,
}

impl FrameImage {
    pub fn new(
        image: &ReconstructedImage,
        plane_waves: f64,
        bmode: Array2<f64>,
        dynamic_range_db: f64,
        targets: &[TargetGeometry],
    ) -> ProcessingResult<Self> {
        let to_mm = |axis: &[f64]| axis.iter().map(|v| v * 1e3).collect::<Vec<f64>>();
        Ok(Self {
            plane_waves,
            bmode,
            x_extent_mm: axis_extents(&to_mm(&image.x_axis))?,
            z_extent_mm: axis_extents(&to_mm(&image.z_axis))?,
            dynamic_range_db,
            targets: targets.to_vec(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContrastScene {
    pub rows: Vec<ContrastRow>,
    pub frame: Option<FrameImage>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub title: String,
    #[serde(default)]
    pub a_scan: Option<AScanView>,
    #[serde(default)]
    pub line: Option<LineTrace>,
    #[serde(default)]
    pub spectrum: Option<PowerSpectrum>,
    #[serde(default)]
    pub bmode: Option<BModeView>,
    #[serde(default)]
    pub contrast: Option<ContrastScene>,
}

fn clamp(values: &mut [f64]) {
    for value in values.iter_mut().filter(|v| !v.is_finite()) {
        *value = 0.0;
    }
}

fn clamp_array(values: &mut Array2<f64>) {
    values.mapv_inplace(|v| if v.is_finite() { v } else { 0.0 });
}

impl Scene {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    /// Replaces NaN and infinities with zero; JSON has no representation for them.
    pub fn clamp_non_finite(&mut self) {
        if let Some(a_scan) = &mut self.a_scan {
            clamp(&mut a_scan.samples);
        }
        if let Some(line) = &mut self.line {
            for values in [
                &mut line.raw,
                &mut line.envelope,
                &mut line.expected,
                &mut line.upper,
                &mut line.lower,
            ] {
                clamp(values);
            }
        }
        if let Some(spectrum) = &mut self.spectrum {
            clamp(&mut spectrum.power);
        }
        if let Some(bmode) = &mut self.bmode {
            clamp_array(&mut bmode.image);
        }
        if let Some(frame) = self.contrast.as_mut().and_then(|c| c.frame.as_mut()) {
            clamp_array(&mut frame.bmode);
        }
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> ProcessingResult<()> {
        let mut clean = self.clone();
        clean.clamp_non_finite();
        fs::write(path.as_ref(), serde_json::to_string(&clean)?)?;
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> ProcessingResult<Self> {
        Self::from_json(&fs::read_to_string(path.as_ref())?)
    }

    pub fn from_json(contents: &str) -> ProcessingResult<Self> {
        Ok(serde_json::from_str(contents)?)
    }
}
