use crate::workflow::config::PhantomConfig;
use anyhow::ensure;
use ndarray::Array3;
use num_complex::Complex64;
use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::StandardNormal;
use uscore::dataset::{Phantom, ReconstructedImage};

fn linspace(span: [f64; 2], count: usize) -> Vec<f64> {
    if count == 1 {
        return vec![span[0]];
    }
    let step = (span[1] - span[0]) / (count - 1) as f64;
    (0..count).map(|i| span[0] + i as f64 * step).collect()
}

pub fn build_phantom(config: &PhantomConfig) -> Phantom {
    Phantom {
        occlusion_center_x: config.cysts.iter().map(|c| c.x).collect(),
        occlusion_center_z: config.cysts.iter().map(|c| c.z).collect(),
        occlusion_diameter: config.cysts.iter().map(|c| c.diameter).collect(),
        axial_resolution: config.axial_resolution,
        lateral_resolution: config.lateral_resolution,
    }
}

/// Fully developed speckle with darker cysts; more plane waves push the cysts deeper.
pub fn build_speckle_image(config: &PhantomConfig) -> anyhow::Result<ReconstructedImage> {
    ensure!(config.nx >= 3 && config.nz >= 3, "phantom grid must be at least 3x3");
    ensure!(!config.plane_waves.is_empty(), "phantom needs at least one frame");

    let x_axis = linspace(config.x_span, config.nx);
    let z_axis = linspace(config.z_span, config.nz);
    let mut rng = StdRng::seed_from_u64(config.seed);

    let frames = config.plane_waves.len();
    let mut data = Array3::<Complex64>::zeros((frames, config.nx, config.nz));
    for (frame, &plane_waves) in config.plane_waves.iter().enumerate() {
        let level_db = config.cyst_level_db - 10.0 * plane_waves.max(1.0).log10();
        let cyst_gain = 10f64.powf(level_db / 20.0);
        for (ix, &x) in x_axis.iter().enumerate() {
            for (iz, &z) in z_axis.iter().enumerate() {
                let in_cyst = config.cysts.iter().any(|cyst| {
                    (x - cyst.x).powi(2) + (z - cyst.z).powi(2) <= (cyst.diameter / 2.0).powi(2)
                });
                let re: f64 = rng.sample(StandardNormal);
                let im: f64 = rng.sample(StandardNormal);
                let gain = if in_cyst { cyst_gain } else { 1.0 };
                data[[frame, ix, iz]] = Complex64::new(re * gain, im * gain);
            }
        }
    }

    Ok(ReconstructedImage {
        x_axis,
        z_axis,
        transmit_f_number: vec![1.75],
        receive_f_number: vec![1.75],
        transmit_apodization_window: "Tukey(0.25)".to_string(),
        receive_apodization_window: "Tukey(0.25)".to_string(),
        number_plane_waves: config.plane_waves.clone(),
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use uscore::processing::{ContrastConfig, ContrastEvaluator};
    use uscore::telemetry::NullObserver;

    fn small() -> PhantomConfig {
        PhantomConfig {
            nx: 64,
            nz: 80,
            ..Default::default()
        }
    }

    #[test]
    fn speckle_image_has_consistent_shape() {
        let config = small();
        let image = build_speckle_image(&config).unwrap();
        assert_eq!(image.data.dim(), (3, 64, 80));
        assert_eq!(image.x_axis[0], config.x_span[0]);
        assert!((image.x_axis[63] - config.x_span[1]).abs() < 1e-15);
        assert!(image.validate().is_ok());
    }

    #[test]
    fn contrast_improves_with_plane_waves() {
        let config = small();
        let image = build_speckle_image(&config).unwrap();
        let phantom = build_phantom(&config);
        let report = ContrastEvaluator::new(&phantom, &image, ContrastConfig::default())
            .unwrap()
            .evaluate(&mut NullObserver)
            .unwrap();
        assert_eq!(report.scores.dim(), (3, 3));
        assert!(report.frame_means.iter().all(|m| m.is_finite()));
        assert!(report.frame_means[2] > report.frame_means[0]);
    }

    #[test]
    fn speckle_is_seeded_circular_gaussian() {
        let config = PhantomConfig {
            cysts: Vec::new(),
            ..small()
        };
        let image = build_speckle_image(&config).unwrap();
        assert_eq!(image.data, build_speckle_image(&config).unwrap().data);

        let frame = image.data.index_axis(ndarray::Axis(0), 0);
        let count = frame.len() as f64;
        let mean_re = frame.iter().map(|c| c.re).sum::<f64>() / count;
        let power = frame.iter().map(|c| c.norm_sqr()).sum::<f64>() / count;
        assert!(mean_re.abs() < 0.1);
        assert!((power - 2.0).abs() < 0.2);
    }

    #[test]
    fn degenerate_grid_is_rejected() {
        let config = PhantomConfig {
            nx: 2,
            ..Default::default()
        };
        assert!(build_speckle_image(&config).is_err());
    }
}
