use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use uscore::display::AcquisitionParams;
use uscore::prelude::{DetectionConfig, DisplayMode, DEFAULT_DELAY_SAMPLES};
use uscore::processing::{ContrastConfig, ExtremaConfig};

/// Synthetic AM scan line.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    pub samples: usize,
    pub sampling_rate: f64,
    pub carrier_frequency: f64,
    pub carrier_amplitude: f64,
    pub modulation_index: f64,
    pub message_frequency: f64,
    pub message_amplitude: f64,
    /// Half-width of the uniform noise added to the line.
    pub noise: f64,
    pub seed: u64,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            samples: 1000,
            sampling_rate: 1e6,
            carrier_frequency: 50e3,
            carrier_amplitude: 2.0,
            modulation_index: 0.5,
            message_frequency: 1e3,
            message_amplitude: 1.0,
            noise: 0.0,
            seed: 0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionSettings {
    pub cutoff_hz: f64,
    pub delay_samples: usize,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            cutoff_hz: 5e3,
            delay_samples: DEFAULT_DELAY_SAMPLES,
        }
    }
}

/// Synthetic RF matrix for the video (per scan line) envelope run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    pub scan_lines: usize,
    pub samples: usize,
    /// Pulse centre frequency in cycles per sample.
    pub pulse_frequency: f64,
    pub reflectors: usize,
    pub dynamic_range: f64,
    pub display_line: usize,
    pub sample_offset: usize,
    pub noise: f64,
    pub seed: u64,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            scan_lines: 64,
            samples: 1024,
            pulse_frequency: 0.05,
            reflectors: 6,
            dynamic_range: 500.0,
            display_line: 1,
            sample_offset: 0,
            noise: 0.02,
            seed: 7,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CystConfig {
    pub x: f64,
    pub z: f64,
    pub diameter: f64,
}

/// Speckle phantom written by the `synth` command. Lengths in metres.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhantomConfig {
    pub nx: usize,
    pub nz: usize,
    pub x_span: [f64; 2],
    pub z_span: [f64; 2],
    pub cysts: Vec<CystConfig>,
    pub plane_waves: Vec<f64>,
    /// Cyst level relative to the speckle background for a single plane wave.
    pub cyst_level_db: f64,
    pub axial_resolution: f64,
    pub lateral_resolution: f64,
    pub seed: u64,
}

impl Default for PhantomConfig {
    fn default() -> Self {
        Self {
            nx: 128,
            nz: 160,
            x_span: [-18e-3, 18e-3],
            z_span: [10e-3, 50e-3],
            cysts: vec![
                CystConfig { x: -8e-3, z: 20e-3, diameter: 6e-3 },
                CystConfig { x: 8e-3, z: 20e-3, diameter: 6e-3 },
                CystConfig { x: 0.0, z: 38e-3, diameter: 8e-3 },
            ],
            plane_waves: vec![1.0, 11.0, 75.0],
            cyst_level_db: -20.0,
            axial_resolution: 0.4e-3,
            lateral_resolution: 0.5e-3,
            seed: 3,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkbenchConfig {
    pub signal: SignalConfig,
    pub detection: DetectionSettings,
    pub extrema: ExtremaConfig,
    pub acquisition: AcquisitionParams,
    pub contrast: ContrastConfig,
    pub video: VideoConfig,
    pub phantom: PhantomConfig,
}

impl WorkbenchConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading workbench config {}", path_ref.display()))?;
        let config: WorkbenchConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing workbench config {}", path_ref.display()))?;
        Ok(config)
    }

    pub fn detection_config(&self, display: DisplayMode) -> DetectionConfig {
        DetectionConfig::new(self.signal.sampling_rate, self.detection.cutoff_hz)
            .with_delay(self.detection.delay_samples)
            .with_display(display)
    }
}
