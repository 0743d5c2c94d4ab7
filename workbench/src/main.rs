use anyhow::Context;
use clap::{Parser, Subcommand};
use report::scene::SceneWriter;
use std::path::PathBuf;
use uscore::prelude::DisplayMode;
use uscore::processing::{AsyncMethod, EnvelopeMethod};
use workflow::config::WorkbenchConfig;
use workflow::runner::{load_records, Runner};

mod generator;
mod report;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "Ultrasound envelope detection and contrast workbench")]
struct Args {
    /// Load the workbench config from YAML
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Write a scene report for the visualizer
    #[arg(long, global = true)]
    scene: Option<PathBuf>,
    /// Report intermediate signals (debug log level)
    #[arg(long, global = true, default_value_t = false)]
    display: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Detect the envelope of a synthetic AM scan line
    Envelope {
        /// One of half_wave, full_wave, real_square_law, complex_hilbert,
        /// complex_square_law, synchronous_real, complex_oscillator_v1, complex_oscillator_v2
        #[arg(long, default_value = "full_wave")]
        method: EnvelopeMethod,
    },
    /// Locate local extrema and fit upper/lower envelope curves
    Extrema,
    /// Write a synthetic speckle image and its phantom as JSON datasets
    Synth {
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },
    /// Score beamformed frames against a cyst phantom
    Contrast {
        #[arg(long)]
        image: PathBuf,
        #[arg(long)]
        phantom: PathBuf,
        /// Frame kept for the scene report
        #[arg(long, default_value_t = 0)]
        frame: usize,
        /// Print the score table as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Run an asynchronous envelope method over every line of a synthetic RF matrix
    Video {
        #[arg(long, default_value = "complex_hilbert")]
        method: AsyncMethod,
    },
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let default_level = if args.display { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let config = match args.config.as_ref() {
        Some(path) => WorkbenchConfig::load(path)?,
        None => WorkbenchConfig::default(),
    };
    let runner = Runner::new(config);
    let writer = SceneWriter::new(args.scene.clone());
    let display = DisplayMode::from(args.display || writer.enabled());

    match args.command {
        Command::Envelope { method } => {
            let outcome = runner.envelope(method, display)?;
            println!(
                "{} -> gain {:.4}, mean relative error {:.2}%",
                method,
                outcome.gain,
                outcome.mean_relative_error * 100.0
            );
            writer.publish(&outcome.scene)?;
        }
        Command::Extrema => {
            let outcome = runner.extrema()?;
            println!(
                "extrema -> {} minima, {} maxima",
                outcome.indices.minima.len(),
                outcome.indices.maxima.len()
            );
            if !outcome.curves_found {
                writer.publish_status("too few interior peaks for envelope curves");
            }
            writer.publish(&outcome.scene)?;
        }
        Command::Synth { out_dir } => {
            let (image, phantom) = runner.synthesize(&out_dir)?;
            println!(
                "synthetic records -> {} and {}",
                image.display(),
                phantom.display()
            );
        }
        Command::Contrast {
            image,
            phantom,
            frame,
            json,
        } => {
            let (image, phantom) = load_records(&image, &phantom)?;
            let outcome = runner
                .contrast(&image, &phantom, display, frame)
                .context("running contrast evaluation")?;
            if json {
                let rows = serde_json::to_string_pretty(&outcome.report.rows())
                    .context("serializing contrast table")?;
                println!("{}", rows);
                writer.publish(&outcome.scene)?;
                return Ok(());
            }
            println!("{:>12} | {:>24} | {:>8}", "plane waves", "CNR per target (dB)", "mean");
            for row in outcome.report.rows() {
                let scores: Vec<String> = row
                    .scores
                    .iter()
                    .map(|s| s.map_or_else(|| "nan".to_string(), |v| format!("{:.1}", v)))
                    .collect();
                let mean = row
                    .mean
                    .map_or_else(|| "nan".to_string(), |v| format!("{:.2}", v));
                println!(
                    "{:>12} | {:>24} | {:>8}",
                    row.plane_waves.round(),
                    scores.join(" "),
                    mean
                );
            }
            writer.publish(&outcome.scene)?;
        }
        Command::Video { method } => {
            let outcome = runner.video(method, display)?;
            println!(
                "video {} -> {} scan lines, colour limits {:?}",
                method.as_str(),
                outcome.view.scan_lines(),
                outcome.view.clim
            );
            writer.publish(&outcome.scene)?;
        }
    }

    Ok(())
}
