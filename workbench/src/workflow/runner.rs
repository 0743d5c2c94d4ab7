use crate::generator::phantom::{build_phantom, build_speckle_image};
use crate::generator::profile::{build_am_line, build_rf_matrix};
use crate::workflow::config::WorkbenchConfig;
use anyhow::{bail, Context};
use log::info;
use std::path::{Path, PathBuf};
use uscore::dataset::{DatasetSource, JsonDataset, Phantom, ReconstructedImage};
use uscore::display::{
    video_envelope, AScanView, BModeView, ContrastScene, FrameImage, LineTrace, Scene,
};
use uscore::math::StatsHelper;
use uscore::prelude::{DisplayMode, EnvelopeDetector};
use uscore::processing::extrema::ExtremaIndices;
use uscore::processing::{
    envelope_curves, hl_envelope_indices, AsyncMethod, ContrastEvaluator, ContrastReport,
    EnvelopeCurves, EnvelopeMethod,
};
use uscore::telemetry::{DiagnosticTrace, Fanout, FrameCapture, LogObserver};

pub struct EnvelopeOutcome {
    /// Mean detected level over the expected envelope, on the settled half.
    pub gain: f64,
    pub mean_relative_error: f64,
    pub diagnostics: Vec<String>,
    pub scene: Scene,
}

pub struct ExtremaOutcome {
    pub indices: ExtremaIndices,
    pub curves_found: bool,
    pub scene: Scene,
}

pub struct ContrastOutcome {
    pub report: ContrastReport,
    /// Per-frame and per-target lines sent to the debug log when displayed.
    pub diagnostics: Vec<String>,
    pub scene: Scene,
}

pub struct VideoOutcome {
    pub view: BModeView,
    pub diagnostics: Vec<String>,
    pub scene: Scene,
}

/// Pairs a recording observer with a [`LogObserver`] when diagnostics are displayed.
fn observe<T>(recorder: T, display: DisplayMode) -> Fanout<T, Option<LogObserver>> {
    Fanout::new(recorder, display.is_on().then(LogObserver::new))
}

fn log_lines(log: Option<LogObserver>) -> Vec<String> {
    log.map(LogObserver::into_lines).unwrap_or_default()
}

/// Opens a JSON dataset, or an HDF5 file when built with the `hdf5` feature.
pub fn open_dataset(path: &Path) -> anyhow::Result<Box<dyn DatasetSource>> {
    let is_hdf5 = matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("h5" | "hdf5" | "hdf")
    );
    if is_hdf5 {
        return open_hdf5(path);
    }
    let dataset =
        JsonDataset::open(path).with_context(|| format!("opening {}", path.display()))?;
    Ok(Box::new(dataset))
}

#[cfg(feature = "hdf5")]
fn open_hdf5(path: &Path) -> anyhow::Result<Box<dyn DatasetSource>> {
    let file = uscore::dataset::Hdf5Dataset::open(path)
        .with_context(|| format!("opening {}", path.display()))?;
    Ok(Box::new(file))
}

#[cfg(not(feature = "hdf5"))]
fn open_hdf5(path: &Path) -> anyhow::Result<Box<dyn DatasetSource>> {
    bail!(
        "{} is an HDF5 file; rebuild with --features hdf5",
        path.display()
    )
}

pub fn load_records(image: &Path, phantom: &Path) -> anyhow::Result<(ReconstructedImage, Phantom)> {
    let image_source = open_dataset(image)?;
    let image = ReconstructedImage::load(image_source.as_ref())
        .with_context(|| format!("loading reconstructed image {}", image.display()))?;
    let phantom_source = open_dataset(phantom)?;
    let phantom = Phantom::load(phantom_source.as_ref())
        .with_context(|| format!("loading phantom {}", phantom.display()))?;
    Ok((image, phantom))
}

fn settled(values: &[f64]) -> &[f64] {
    &values[values.len() / 2..]
}

#[derive(Clone)]
pub struct Runner {
    config: WorkbenchConfig,
}

impl Runner {
    pub fn new(config: WorkbenchConfig) -> Self {
        Self { config }
    }

    pub fn envelope(&self, method: EnvelopeMethod, display: DisplayMode) -> anyhow::Result<EnvelopeOutcome> {
        let line = build_am_line(&self.config.signal)?;
        let detection = self.config.detection_config(display);
        let mut observer = observe(DiagnosticTrace::default(), display);

        let envelope = match method {
            EnvelopeMethod::Async(method) => {
                method.detect(&line.signal, &detection, &mut observer)
            }
            EnvelopeMethod::Oscillator(method) => {
                method.detect(&line.params, &line.t, &detection, &mut observer)
            }
        }
        .with_context(|| format!("running {} envelope detection", method))?;
        let Fanout {
            first: trace,
            second: log,
        } = observer;

        let expected = line.expected_envelope();
        let gain = StatsHelper::mean(settled(&envelope)) / StatsHelper::mean(settled(&expected));
        let corrected: Vec<f64> = settled(&envelope).iter().map(|v| v / gain).collect();
        let mean_relative_error = StatsHelper::mean_relative_error(&corrected, settled(&expected));
        info!(
            "{}: gain {:.4}, mean relative error {:.4}",
            method, gain, mean_relative_error
        );

        let mut scene = Scene::new(format!("envelope: {}", method));
        scene.a_scan = Some(AScanView::new(&line.signal, false, 0, &self.config.acquisition));
        scene.spectrum = trace.spectra.first().cloned();
        scene.line = Some(LineTrace {
            method: method.to_string(),
            time: line.t,
            raw: line.signal,
            envelope,
            expected,
            ..Default::default()
        });

        Ok(EnvelopeOutcome {
            gain,
            mean_relative_error,
            diagnostics: log_lines(log),
            scene,
        })
    }

    pub fn extrema(&self) -> anyhow::Result<ExtremaOutcome> {
        let line = build_am_line(&self.config.signal)?;
        let indices = hl_envelope_indices(&line.signal, &self.config.extrema)
            .context("locating local extrema")?;
        let curves = envelope_curves(&line.t, &line.signal).context("fitting envelope curves")?;
        info!(
            "extrema: {} minima, {} maxima",
            indices.minima.len(),
            indices.maxima.len()
        );

        let mut trace = LineTrace {
            method: "extrema".to_string(),
            expected: line.expected_envelope(),
            ..Default::default()
        };
        let curves_found = match curves {
            EnvelopeCurves::Curves { upper, lower } => {
                trace.envelope = upper.clone();
                trace.upper = upper;
                trace.lower = lower;
                true
            }
            EnvelopeCurves::InsufficientPeaks => false,
        };
        trace.time = line.t;
        trace.raw = line.signal;

        let mut scene = Scene::new("extrema envelope curves");
        scene.line = Some(trace);
        Ok(ExtremaOutcome {
            indices,
            curves_found,
            scene,
        })
    }

    /// Writes `image.json` and `phantom.json` into `out_dir`.
    pub fn synthesize(&self, out_dir: &Path) -> anyhow::Result<(PathBuf, PathBuf)> {
        std::fs::create_dir_all(out_dir)
            .with_context(|| format!("creating {}", out_dir.display()))?;
        let image = build_speckle_image(&self.config.phantom)?;
        let phantom = build_phantom(&self.config.phantom);

        let image_path = out_dir.join("image.json");
        let phantom_path = out_dir.join("phantom.json");
        image
            .to_json()
            .save_json(&image_path)
            .with_context(|| format!("writing {}", image_path.display()))?;
        phantom
            .to_json()
            .save_json(&phantom_path)
            .with_context(|| format!("writing {}", phantom_path.display()))?;
        info!(
            "synthesized {} frames of {}x{} with {} cysts",
            image.frame_count(),
            image.x_axis.len(),
            image.z_axis.len(),
            phantom.target_count()
        );
        Ok((image_path, phantom_path))
    }

    /// Scores every frame; `frame` selects the image kept for the scene when displayed.
    pub fn contrast(
        &self,
        image: &ReconstructedImage,
        phantom: &Phantom,
        display: DisplayMode,
        frame: usize,
    ) -> anyhow::Result<ContrastOutcome> {
        if frame >= image.frame_count() {
            bail!(
                "frame {} requested but the image has {} frames",
                frame,
                image.frame_count()
            );
        }
        let mut config = self.config.contrast.clone();
        config.display = display;
        let dynamic_range = config.dynamic_range_db;

        let evaluator = ContrastEvaluator::new(phantom, image, config)
            .context("preparing contrast evaluation")?;
        let mut observer = observe(FrameCapture::new(frame), display);
        let report = evaluator
            .evaluate(&mut observer)
            .context("evaluating contrast")?;
        let Fanout {
            first: mut capture,
            second: log,
        } = observer;

        let frame_image = match capture.bmode.take() {
            Some(bmode) => Some(FrameImage::new(
                image,
                image.number_plane_waves[frame],
                bmode,
                dynamic_range,
                evaluator.targets(),
            )?),
            None => None,
        };

        let mut scene = Scene::new("beamforming contrast");
        scene.contrast = Some(ContrastScene {
            rows: report.rows(),
            frame: frame_image,
        });
        Ok(ContrastOutcome {
            report,
            diagnostics: log_lines(log),
            scene,
        })
    }

    pub fn video(&self, method: AsyncMethod, display: DisplayMode) -> anyhow::Result<VideoOutcome> {
        let video = &self.config.video;
        let rf = build_rf_matrix(video)?;
        let mut observer = observe(DiagnosticTrace::default(), display);
        let view = video_envelope(
            &rf,
            method,
            video.dynamic_range,
            video.display_line,
            video.sample_offset,
            &self.config.acquisition,
            &mut observer,
        )
        .with_context(|| format!("running {} over the RF matrix", method.as_str()))?;
        let Fanout {
            first: trace,
            second: log,
        } = observer;

        let find = |label: &str| {
            trace
                .intermediates
                .iter()
                .find(|t| t.label == label)
                .map(|t| t.samples.clone())
        };
        let mut scene = Scene::new(format!("video envelope: {}", method.as_str()));
        if let (Some(raw), Some(envelope)) = (find("raw signal"), find("detected envelope")) {
            scene.a_scan = Some(AScanView::new(
                &raw,
                true,
                video.sample_offset,
                &self.config.acquisition,
            ));
            scene.line = Some(LineTrace {
                method: method.as_str().to_string(),
                time: (0..raw.len()).map(|n| n as f64).collect(),
                raw,
                envelope,
                ..Default::default()
            });
        }
        scene.spectrum = trace.spectra.first().cloned();
        scene.bmode = Some(view.clone());
        info!(
            "video: {} scan lines x {} samples",
            view.scan_lines(),
            view.image.nrows()
        );
        Ok(VideoOutcome {
            view,
            diagnostics: log_lines(log),
            scene,
        })
    }
}
