pub mod contrast;
pub mod envelope;
pub mod extrema;
pub mod filter;

pub use contrast::{ContrastConfig, ContrastEvaluator, ContrastReport, TargetGeometry, TargetMasks};
pub use envelope::{AsyncMethod, EnvelopeMethod, ModulationParams, OscillatorMethod};
pub use extrema::{envelope_curves, hl_envelope_indices, EnvelopeCurves, ExtremaConfig};
pub use filter::{low_pass, TransferFunction};
