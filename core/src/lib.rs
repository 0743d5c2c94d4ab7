//! Signal-processing core for the ultrasound envelope and contrast workbench.
//!
//! The modules cover the notebook helpers end to end: envelope detection on RF
//! scan lines, local-extrema envelope curves, PICMUS-style contrast scoring of
//! beamformed images, dataset loading, and the view models the visualizer draws.

pub mod dataset;
pub mod display;
pub mod math;
pub mod prelude;
pub mod processing;
pub mod telemetry;

pub use prelude::{
    DetectionConfig, DisplayMode, EnvelopeDetector, ProcessingError, ProcessingResult,
};
