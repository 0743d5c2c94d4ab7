pub mod scan;
pub mod scene;

use crate::prelude::{ProcessingError, ProcessingResult};
use serde::{Deserialize, Serialize};

pub use scan::{video_envelope, AScanView, BModeView, VIDEO_CUTOFF, VIDEO_SAMPLING_RATE};
pub use scene::{ContrastScene, FrameImage, LineTrace, Scene};

pub const DEFAULT_SAMPLING_FREQUENCY: f64 = 65e6;
/// Longitudinal wave in steel, m/s.
pub const DEFAULT_SPEED_OF_SOUND: f64 = 5920.0;

/// Acquisition constants that map sample indices to depth.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionParams {
    pub sampling_frequency: f64,
    pub speed_of_sound: f64,
}

impl Default for AcquisitionParams {
    fn default() -> Self {
        Self {
            sampling_frequency: DEFAULT_SAMPLING_FREQUENCY,
            speed_of_sound: DEFAULT_SPEED_OF_SOUND,
        }
    }
}

impl AcquisitionParams {
    /// Pulse-echo depth in millimetres of `sample`, counted from `sample_offset`.
    pub fn depth_mm(&self, sample: f64, sample_offset: usize) -> f64 {
        1000.0 * self.speed_of_sound * (sample + sample_offset as f64)
            / (2.0 * self.sampling_frequency)
    }

    pub fn depth_axis(&self, samples: usize, sample_offset: usize) -> Vec<f64> {
        (0..samples)
            .map(|sample| self.depth_mm(sample as f64, sample_offset))
            .collect()
    }
}

/// Image extents of a pixel-centred axis, `[f[1] - δ/2, f[last] + δ/2]` with `δ = f[2] - f[1]`.
pub fn axis_extents(axis: &[f64]) -> ProcessingResult<[f64; 2]> {
    if axis.len() < 3 {
        return Err(ProcessingError::InvalidParameter(format!(
            "axis extents need at least 3 points, got {}",
            axis.len()
        )));
    }
    let delta = axis[2] - axis[1];
    Ok([axis[1] - delta / 2.0, axis[axis.len() - 1] + delta / 2.0])
}

/// Row and column of a row-major flat `index` into a `(rows, cols)` grid.
pub fn ind2sub(shape: (usize, usize), index: usize) -> ProcessingResult<(usize, usize)> {
    let (_, cols) = shape;
    if cols == 0 {
        return Err(ProcessingError::InvalidParameter(
            "grid has no columns".to_string(),
        ));
    }
    Ok((index / cols, index % cols))
}
