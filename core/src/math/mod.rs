pub mod fft;
pub mod matrix;
pub mod spline;
pub mod stats;

pub use fft::{FftHelper, PowerSpectrum};
pub use matrix::MatrixHelper;
pub use spline::CubicSpline;
pub use stats::StatsHelper;
