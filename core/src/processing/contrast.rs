use crate::dataset::{Phantom, ReconstructedImage};
use crate::math::stats::StatsHelper;
use crate::prelude::{DisplayMode, ProcessingResult};
use crate::telemetry::log::LogManager;
use crate::telemetry::observer::ContrastObserver;
use ndarray::{Array2, Zip};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PADDING: f64 = 1.0;
pub const DEFAULT_DYNAMIC_RANGE_DB: f64 = 60.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContrastConfig {
    /// Guard band around each target, in lateral resolution cells.
    #[serde(default = "default_padding")]
    pub padding: f64,
    #[serde(default = "default_dynamic_range")]
    pub dynamic_range_db: f64,
    #[serde(default)]
    pub display: DisplayMode,
}

fn default_padding() -> f64 {
    DEFAULT_PADDING
}

fn default_dynamic_range() -> f64 {
    DEFAULT_DYNAMIC_RANGE_DB
}

impl Default for ContrastConfig {
    fn default() -> Self {
        Self {
            padding: DEFAULT_PADDING,
            dynamic_range_db: DEFAULT_DYNAMIC_RANGE_DB,
            display: DisplayMode::Off,
        }
    }
}

/// Radii of the three regions drawn around one target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetGeometry {
    pub center_x: f64,
    pub center_z: f64,
    pub radius: f64,
    pub inner_radius: f64,
    pub outer_radius_near: f64,
    pub outer_radius_far: f64,
}

impl TargetGeometry {
    pub fn new(phantom: &Phantom, target: usize, padding: f64) -> Self {
        let radius = phantom.occlusion_diameter[target] / 2.0;
        let guard = padding * phantom.lateral_resolution;
        let inner_radius = radius - guard;
        let outer_radius_near = radius + guard;
        Self {
            center_x: phantom.occlusion_center_x[target],
            center_z: phantom.occlusion_center_z[target],
            radius,
            inner_radius,
            outer_radius_near,
            outer_radius_far: 1.2 * (inner_radius.powi(2) + outer_radius_near.powi(2)).sqrt(),
        }
    }

    /// Every target of the phantom, in dataset order.
    pub fn all(phantom: &Phantom, padding: f64) -> Vec<Self> {
        (0..phantom.target_count())
            .map(|target| Self::new(phantom, target, padding))
            .collect()
    }

    fn distance_squared(&self, x: f64, z: f64) -> f64 {
        (x - self.center_x).powi(2) + (z - self.center_z).powi(2)
    }
}

/// Pixel masks of one target, shaped like the B-mode image.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TargetMasks {
    pub occlusion: Array2<bool>,
    pub inside: Array2<bool>,
    pub outside: Array2<bool>,
}

impl TargetMasks {
    pub fn build(geometry: &TargetGeometry, x: &Array2<f64>, z: &Array2<f64>) -> Self {
        let rho = Zip::from(x)
            .and(z)
            .map_collect(|&x, &z| geometry.distance_squared(x, z));
        let near = geometry.outer_radius_near.powi(2);
        let far = geometry.outer_radius_far.powi(2);
        Self {
            occlusion: rho.mapv(|d| d <= geometry.radius.powi(2)),
            inside: rho.mapv(|d| d <= geometry.inner_radius.powi(2)),
            outside: rho.mapv(|d| d >= near && d <= far),
        }
    }

    pub fn inside_count(&self) -> usize {
        self.inside.iter().filter(|&&on| on).count()
    }

    pub fn outside_count(&self) -> usize {
        self.outside.iter().filter(|&&on| on).count()
    }
}

/// Scores of every frame and target.
#[derive(Debug, Clone, PartialEq)]
pub struct ContrastReport {
    pub plane_waves: Vec<f64>,
    /// `(frames, targets)`, in dB rounded to one decimal.
    pub scores: Array2<f64>,
    pub frame_means: Vec<f64>,
}

/// One printable row; NaN scores become `None` so the table stays valid JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContrastRow {
    pub plane_waves: f64,
    pub scores: Vec<Option<f64>>,
    pub mean: Option<f64>,
}

fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

impl ContrastReport {
    pub fn rows(&self) -> Vec<ContrastRow> {
        self.scores
            .outer_iter()
            .zip(self.plane_waves.iter().zip(self.frame_means.iter()))
            .map(|(scores, (&plane_waves, &mean))| ContrastRow {
                plane_waves,
                scores: scores.iter().map(|&s| finite(s)).collect(),
                mean: finite(mean),
            })
            .collect()
    }
}

/// Rounds to one decimal, ties to even.
pub fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round_ties_even() / 10.0
}

/// `20·log10(|μin − μout| / sqrt((σ²in + σ²out)/2))` over the masked pixels.
///
/// Empty masks or zero variance give NaN or infinity.
pub fn contrast_to_noise(bmode: &Array2<f64>, masks: &TargetMasks) -> f64 {
    let select = |mask: &Array2<bool>| -> Vec<f64> {
        Zip::from(bmode)
            .and(mask)
            .fold(Vec::new(), |mut acc, &value, &on| {
                if on {
                    acc.push(value);
                }
                acc
            })
    };
    let inside = select(&masks.inside);
    let outside = select(&masks.outside);
    let spread =
        ((StatsHelper::variance(&inside) + StatsHelper::variance(&outside)) / 2.0).sqrt();
    20.0 * ((StatsHelper::mean(&inside) - StatsHelper::mean(&outside)).abs() / spread).log10()
}

/// Log-compressed image normalized to its brightest pixel (0 dB).
pub fn log_compress(envelope: &Array2<f64>) -> Array2<f64> {
    let samples: Vec<f64> = envelope.iter().copied().collect();
    let peak = StatsHelper::max(&samples).unwrap_or(f64::NAN);
    envelope.mapv(|value| 20.0 * (value / peak).log10())
}

pub struct ContrastEvaluator<'a> {
    phantom: &'a Phantom,
    image: &'a ReconstructedImage,
    config: ContrastConfig,
    targets: Vec<TargetGeometry>,
    logger: LogManager,
}

impl<'a> ContrastEvaluator<'a> {
    pub fn new(
        phantom: &'a Phantom,
        image: &'a ReconstructedImage,
        config: ContrastConfig,
    ) -> ProcessingResult<Self> {
        phantom.validate()?;
        image.validate()?;
        Ok(Self {
            phantom,
            image,
            targets: TargetGeometry::all(phantom, config.padding),
            config,
            logger: LogManager::new("contrast"),
        })
    }

    pub fn targets(&self) -> &[TargetGeometry] {
        &self.targets
    }

    pub fn evaluate(&self, observer: &mut dyn ContrastObserver) -> ProcessingResult<ContrastReport> {
        let frames = self.image.frame_count();
        let (x, z) = self.image.mesh();
        let masks: Vec<TargetMasks> = self
            .targets
            .iter()
            .map(|geometry| TargetMasks::build(geometry, &x, &z))
            .collect();

        let mut scores = Array2::<f64>::zeros((frames, self.phantom.target_count()));
        let mut frame_means = Vec::with_capacity(frames);

        for frame in 0..frames {
            let plane_waves = self.image.number_plane_waves[frame];
            let bmode = log_compress(&self.image.envelope(frame));
            if self.config.display.is_on() {
                observer.frame(frame, plane_waves, &bmode);
            }

            for (target, target_masks) in masks.iter().enumerate() {
                if self.config.display.is_on() {
                    observer.target(frame, target, target_masks);
                }
                scores[[frame, target]] = round_to_tenth(contrast_to_noise(&bmode, target_masks));
            }

            let row: Vec<f64> = scores.row(frame).to_vec();
            let mean = StatsHelper::mean(&row);
            self.logger.record(&format!(
                "DAS beamforming for {} plane waves: mean image contrast score (dB): {}",
                plane_waves.round(),
                mean
            ));
            frame_means.push(mean);
        }

        Ok(ContrastReport {
            plane_waves: self.image.number_plane_waves.clone(),
            scores,
            frame_means,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prelude::ProcessingError;
    use crate::telemetry::observer::{FrameCapture, NullObserver};
    use ndarray::Array3;
    use num_complex::Complex64;

    const SPACING: f64 = 1e-4;
    const CENTER_Z: f64 = 12e-3;

    fn axes() -> (Vec<f64>, Vec<f64>) {
        let x = (0..41).map(|i| (i as f64 - 20.0) * SPACING).collect();
        let z = (0..41).map(|j| 10e-3 + j as f64 * SPACING).collect();
        (x, z)
    }

    fn phantom() -> Phantom {
        Phantom {
            occlusion_center_x: vec![0.0],
            occlusion_center_z: vec![CENTER_Z],
            occlusion_diameter: vec![2.1e-3],
            axial_resolution: 0.3e-3,
            lateral_resolution: 0.2e-3,
        }
    }

    /// Cyst pixels alternate between -40 and -36 dB, background between 0 and -4 dB.
    fn level_db(x: f64, z: f64, parity: usize) -> f64 {
        let radius = 2.1e-3 / 2.0;
        let inside = x.powi(2) + (z - CENTER_Z).powi(2) <= radius * radius;
        match (inside, parity % 2) {
            (true, 0) => -40.0,
            (true, _) => -36.0,
            (false, 0) => 0.0,
            (false, _) => -4.0,
        }
    }

    fn image(scales: &[f64]) -> ReconstructedImage {
        let (x_axis, z_axis) = axes();
        let data = Array3::from_shape_fn((scales.len(), 41, 41), |(f, i, j)| {
            let db = level_db(x_axis[i], z_axis[j], i + j);
            Complex64::new(scales[f] * 10f64.powf(db / 20.0), 0.0)
        });
        ReconstructedImage {
            x_axis,
            z_axis,
            transmit_f_number: vec![1.75],
            receive_f_number: vec![1.75],
            transmit_apodization_window: "tukey25".into(),
            receive_apodization_window: "boxcar".into(),
            number_plane_waves: (0..scales.len()).map(|f| (1 + 10 * f) as f64).collect(),
            data,
        }
    }

    fn closed_form() -> f64 {
        let (xs, zs) = axes();
        let geometry = TargetGeometry::new(&phantom(), 0, 1.0);
        let (mut inside, mut outside) = (Vec::new(), Vec::new());
        for (j, &z) in zs.iter().enumerate() {
            for (i, &x) in xs.iter().enumerate() {
                let d = x.powi(2) + (z - CENTER_Z).powi(2);
                let db = level_db(x, z, i + j);
                if d <= geometry.inner_radius.powi(2) {
                    inside.push(db);
                }
                if d >= geometry.outer_radius_near.powi(2) && d <= geometry.outer_radius_far.powi(2) {
                    outside.push(db);
                }
            }
        }
        let mean = |v: &[f64]| v.iter().sum::<f64>() / v.len() as f64;
        let var = |v: &[f64]| {
            let m = mean(v);
            v.iter().map(|s| (s - m).powi(2)).sum::<f64>() / v.len() as f64
        };
        let value = 20.0
            * ((mean(&inside) - mean(&outside)).abs()
                / ((var(&inside) + var(&outside)) / 2.0).sqrt())
            .log10();
        (value * 10.0).round() / 10.0
    }

    #[test]
    fn geometry_follows_padding_rules() {
        let geometry = TargetGeometry::new(&phantom(), 0, 1.0);
        assert!((geometry.inner_radius - 0.85e-3).abs() < 1e-12);
        assert!((geometry.outer_radius_near - 1.25e-3).abs() < 1e-12);
        let far = 1.2 * (0.85e-3f64.powi(2) + 1.25e-3f64.powi(2)).sqrt();
        assert!((geometry.outer_radius_far - far).abs() < 1e-12);
    }

    #[test]
    fn two_region_image_matches_closed_form() {
        let phantom = phantom();
        let image = image(&[1.0, 3.0]);
        let evaluator = ContrastEvaluator::new(&phantom, &image, ContrastConfig::default()).unwrap();
        let report = evaluator.evaluate(&mut NullObserver).unwrap();

        assert_eq!(report.scores.dim(), (2, 1));
        assert_eq!(report.scores[[0, 0]], closed_form());
        assert!((report.scores[[0, 0]] - 25.1).abs() < 0.3);
        // normalization removes the per-frame gain
        assert_eq!(report.scores[[1, 0]], report.scores[[0, 0]]);
        assert_eq!(report.frame_means, vec![report.scores[[0, 0]]; 2]);
    }

    #[test]
    fn masks_reach_the_observer_only_when_displayed() {
        let phantom = phantom();
        let image = image(&[1.0]);

        let mut quiet = FrameCapture::new(0);
        ContrastEvaluator::new(&phantom, &image, ContrastConfig::default())
            .unwrap()
            .evaluate(&mut quiet)
            .unwrap();
        assert!(quiet.bmode.is_none());

        let config = ContrastConfig {
            display: DisplayMode::On,
            ..ContrastConfig::default()
        };
        let mut capture = FrameCapture::new(0);
        ContrastEvaluator::new(&phantom, &image, config)
            .unwrap()
            .evaluate(&mut capture)
            .unwrap();
        let bmode = capture.bmode.unwrap();
        assert_eq!(bmode.dim(), (41, 41));
        assert_eq!(StatsHelper::max(&bmode.iter().copied().collect::<Vec<_>>()), Some(0.0));
        assert_eq!(capture.masks.len(), 1);
        assert_eq!(capture.masks[0].inside_count(), 225);
        assert_eq!(capture.masks[0].outside_count(), 552);
    }

    #[test]
    fn target_off_the_image_scores_nan() {
        let mut phantom = phantom();
        phantom.occlusion_center_x[0] = 1.0;
        let image = image(&[1.0]);
        let report = ContrastEvaluator::new(&phantom, &image, ContrastConfig::default())
            .unwrap()
            .evaluate(&mut NullObserver)
            .unwrap();
        assert!(report.scores[[0, 0]].is_nan());
        assert!(report.frame_means[0].is_nan());
        assert_eq!(report.rows()[0].scores, vec![None]);
    }

    #[test]
    fn mismatched_phantom_is_rejected() {
        let mut phantom = phantom();
        phantom.occlusion_center_z.push(20e-3);
        let image = image(&[1.0]);
        assert!(matches!(
            ContrastEvaluator::new(&phantom, &image, ContrastConfig::default()),
            Err(ProcessingError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn rounding_breaks_ties_to_even() {
        assert_eq!(round_to_tenth(0.25), 0.2);
        assert_eq!(round_to_tenth(0.75), 0.8);
        assert_eq!(round_to_tenth(12.04), 12.0);
    }
}
