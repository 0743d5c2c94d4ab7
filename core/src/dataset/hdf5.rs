use super::DatasetSource;
use crate::prelude::{ProcessingError, ProcessingResult};
use hdf5::types::{VarLenAscii, VarLenUnicode};
use ndarray::ArrayD;
use std::path::Path;

pub struct Hdf5Dataset {
    file: hdf5::File,
}

impl Hdf5Dataset {
    pub fn open<P: AsRef<Path>>(path: P) -> ProcessingResult<Self> {
        let file = hdf5::File::open(path.as_ref()).map_err(dataset_error)?;
        Ok(Self { file })
    }

    fn dataset(&self, path: &str) -> ProcessingResult<hdf5::Dataset> {
        self.file.dataset(path).map_err(dataset_error)
    }
}

fn dataset_error(err: hdf5::Error) -> ProcessingError {
    ProcessingError::Dataset(err.to_string())
}

impl DatasetSource for Hdf5Dataset {
    fn read_array(&self, path: &str) -> ProcessingResult<ArrayD<f64>> {
        self.dataset(path)?.read_dyn::<f64>().map_err(dataset_error)
    }

    /// Variable-length strings first, then Matlab-style UTF-16 code units.
    fn read_string(&self, path: &str) -> ProcessingResult<String> {
        let dataset = self.dataset(path)?;
        if let Ok(text) = dataset.read_scalar::<VarLenUnicode>() {
            return Ok(text.as_str().to_string());
        }
        if let Ok(text) = dataset.read_scalar::<VarLenAscii>() {
            return Ok(text.as_str().to_string());
        }
        let units = dataset.read_raw::<u16>().map_err(dataset_error)?;
        Ok(String::from_utf16_lossy(&units)
            .trim_end_matches('\0')
            .to_string())
    }
}
