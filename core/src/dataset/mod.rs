pub mod json;

#[cfg(feature = "hdf5")]
pub mod hdf5;

use crate::math::matrix::MatrixHelper;
use crate::prelude::{ProcessingError, ProcessingResult};
use ndarray::{Array2, Array3, ArrayD, Ix3, Zip};
use num_complex::Complex64;

pub use json::{JsonDataset, JsonEntry};

#[cfg(feature = "hdf5")]
pub use self::hdf5::Hdf5Dataset;

/// Dataset paths of the PICMUS layout.
pub mod paths {
    pub const X_AXIS: &str = "US/US_DATASET0000/scan/x_axis";
    pub const Z_AXIS: &str = "US/US_DATASET0000/scan/z_axis";
    pub const TRANSMIT_F_NUMBER: &str = "US/US_DATASET0000/transmit_f_number";
    pub const RECEIVE_F_NUMBER: &str = "US/US_DATASET0000/receive_f_number";
    pub const TRANSMIT_APODIZATION: &str = "US/US_DATASET0000/transmit_apodization_window";
    pub const RECEIVE_APODIZATION: &str = "US/US_DATASET0000/receive_apodization_window";
    pub const NUMBER_PLANE_WAVES: &str = "US/US_DATASET0000/number_plane_waves";
    pub const DATA_REAL: &str = "US/US_DATASET0000/data/real";
    pub const DATA_IMAG: &str = "US/US_DATASET0000/data/imag";
    pub const OCCLUSION_CENTER_X: &str = "US/US_DATASET0000/phantom_occlusionCenterX";
    pub const OCCLUSION_CENTER_Z: &str = "US/US_DATASET0000/phantom_occlusionCenterZ";
    pub const OCCLUSION_DIAMETER: &str = "US/US_DATASET0000/phantom_occlusionDiameter";
    pub const AXIAL_RESOLUTION: &str = "US/US_DATASET0000/phantom_axialResolution";
    pub const LATERAL_RESOLUTION: &str = "US/US_DATASET0000/phantom_lateralResolution";
}

/// Read access to a hierarchical dataset file.
pub trait DatasetSource {
    fn read_array(&self, path: &str) -> ProcessingResult<ArrayD<f64>>;

    fn read_string(&self, path: &str) -> ProcessingResult<String>;

    /// Flattened contents of a numeric dataset.
    fn read_vec(&self, path: &str) -> ProcessingResult<Vec<f64>> {
        Ok(self.read_array(path)?.iter().copied().collect())
    }

    /// First element of a numeric dataset (scalars are often stored as 1-element arrays).
    fn read_scalar(&self, path: &str) -> ProcessingResult<f64> {
        self.read_array(path)?
            .iter()
            .next()
            .copied()
            .ok_or_else(|| ProcessingError::Dataset(format!("{} is empty", path)))
    }

    fn read_array3(&self, path: &str) -> ProcessingResult<Array3<f64>> {
        Ok(self.read_array(path)?.into_dimensionality::<Ix3>()?)
    }
}

/// Delay-and-sum beamformed frames with their scan geometry.
#[derive(Debug, Clone)]
pub struct ReconstructedImage {
    pub x_axis: Vec<f64>,
    pub z_axis: Vec<f64>,
    pub transmit_f_number: Vec<f64>,
    pub receive_f_number: Vec<f64>,
    pub transmit_apodization_window: String,
    pub receive_apodization_window: String,
    /// Plane waves compounded into each frame.
    pub number_plane_waves: Vec<f64>,
    /// Complex samples shaped `(frames, x, z)`.
    pub data: Array3<Complex64>,
}

impl ReconstructedImage {
    pub fn load(source: &dyn DatasetSource) -> ProcessingResult<Self> {
        let real = source.read_array3(paths::DATA_REAL)?;
        let imag = source.read_array3(paths::DATA_IMAG)?;
        let data = combine_complex(&real, &imag)?;

        let image = Self {
            x_axis: source.read_vec(paths::X_AXIS)?,
            z_axis: source.read_vec(paths::Z_AXIS)?,
            transmit_f_number: source.read_vec(paths::TRANSMIT_F_NUMBER)?,
            receive_f_number: source.read_vec(paths::RECEIVE_F_NUMBER)?,
            transmit_apodization_window: source.read_string(paths::TRANSMIT_APODIZATION)?,
            receive_apodization_window: source.read_string(paths::RECEIVE_APODIZATION)?,
            number_plane_waves: source.read_vec(paths::NUMBER_PLANE_WAVES)?,
            data,
        };
        image.validate()?;
        Ok(image)
    }

    /// Checks that axes, frame count and data shape agree.
    pub fn validate(&self) -> ProcessingResult<()> {
        let (frames, nx, nz) = self.data.dim();
        if nx != self.x_axis.len() || nz != self.z_axis.len() {
            return Err(ProcessingError::ShapeMismatch(format!(
                "data is {}x{} per frame but axes are {}x{}",
                nx,
                nz,
                self.x_axis.len(),
                self.z_axis.len()
            )));
        }
        if frames != self.number_plane_waves.len() {
            return Err(ProcessingError::ShapeMismatch(format!(
                "{} frames but {} plane-wave counts",
                frames,
                self.number_plane_waves.len()
            )));
        }
        Ok(())
    }

    pub fn frame_count(&self) -> usize {
        self.data.dim().0
    }

    /// `(x_matrix, z_matrix)` shaped `(z, x)`.
    pub fn mesh(&self) -> (Array2<f64>, Array2<f64>) {
        MatrixHelper::meshgrid(&self.x_axis, &self.z_axis)
    }

    /// Magnitude of one frame, transposed to `(z, x)`.
    pub fn envelope(&self, frame: usize) -> Array2<f64> {
        self.data
            .index_axis(ndarray::Axis(0), frame)
            .t()
            .mapv(|sample| sample.norm())
    }

    /// Writes the record back into a JSON dataset.
    pub fn to_json(&self) -> JsonDataset {
        let mut dataset = JsonDataset::default();
        dataset.insert_vec(paths::X_AXIS, &self.x_axis);
        dataset.insert_vec(paths::Z_AXIS, &self.z_axis);
        dataset.insert_vec(paths::TRANSMIT_F_NUMBER, &self.transmit_f_number);
        dataset.insert_vec(paths::RECEIVE_F_NUMBER, &self.receive_f_number);
        dataset.insert_text(
            paths::TRANSMIT_APODIZATION,
            &self.transmit_apodization_window,
        );
        dataset.insert_text(paths::RECEIVE_APODIZATION, &self.receive_apodization_window);
        dataset.insert_vec(paths::NUMBER_PLANE_WAVES, &self.number_plane_waves);
        dataset.insert_array(paths::DATA_REAL, &self.data.mapv(|c| c.re).into_dyn());
        dataset.insert_array(paths::DATA_IMAG, &self.data.mapv(|c| c.im).into_dyn());
        dataset
    }
}

fn combine_complex(real: &Array3<f64>, imag: &Array3<f64>) -> ProcessingResult<Array3<Complex64>> {
    if real.dim() != imag.dim() {
        return Err(ProcessingError::ShapeMismatch(format!(
            "real part is {:?} but imaginary part is {:?}",
            real.dim(),
            imag.dim()
        )));
    }
    Ok(Zip::from(real)
        .and(imag)
        .map_collect(|&re, &im| Complex64::new(re, im)))
}

/// Circular anechoic targets of a numerical phantom.
#[derive(Debug, Clone, PartialEq)]
pub struct Phantom {
    pub occlusion_center_x: Vec<f64>,
    pub occlusion_center_z: Vec<f64>,
    pub occlusion_diameter: Vec<f64>,
    pub axial_resolution: f64,
    pub lateral_resolution: f64,
}

impl Phantom {
    pub fn load(source: &dyn DatasetSource) -> ProcessingResult<Self> {
        let phantom = Self {
            occlusion_center_x: source.read_vec(paths::OCCLUSION_CENTER_X)?,
            occlusion_center_z: source.read_vec(paths::OCCLUSION_CENTER_Z)?,
            occlusion_diameter: source.read_vec(paths::OCCLUSION_DIAMETER)?,
            axial_resolution: source.read_scalar(paths::AXIAL_RESOLUTION)?,
            lateral_resolution: source.read_scalar(paths::LATERAL_RESOLUTION)?,
        };
        phantom.validate()?;
        Ok(phantom)
    }

    pub fn validate(&self) -> ProcessingResult<()> {
        let targets = self.occlusion_diameter.len();
        if self.occlusion_center_x.len() != targets || self.occlusion_center_z.len() != targets {
            return Err(ProcessingError::ShapeMismatch(format!(
                "{} diameters but {} x-centres and {} z-centres",
                targets,
                self.occlusion_center_x.len(),
                self.occlusion_center_z.len()
            )));
        }
        Ok(())
    }

    pub fn target_count(&self) -> usize {
        self.occlusion_diameter.len()
    }

    pub fn to_json(&self) -> JsonDataset {
        let mut dataset = JsonDataset::default();
        dataset.insert_vec(paths::OCCLUSION_CENTER_X, &self.occlusion_center_x);
        dataset.insert_vec(paths::OCCLUSION_CENTER_Z, &self.occlusion_center_z);
        dataset.insert_vec(paths::OCCLUSION_DIAMETER, &self.occlusion_diameter);
        dataset.insert_vec(paths::AXIAL_RESOLUTION, &[self.axial_resolution]);
        dataset.insert_vec(paths::LATERAL_RESOLUTION, &[self.lateral_resolution]);
        dataset
    }
}
