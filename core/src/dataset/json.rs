use super::DatasetSource;
use crate::prelude::{ProcessingError, ProcessingResult};
use ndarray::{ArrayD, IxDyn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// One dataset: either a string attribute or a row-major numeric array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonEntry {
    Text(String),
    Array { shape: Vec<usize>, values: Vec<f64> },
}

/// Datasets keyed by their full path, e.g. `US/US_DATASET0000/scan/x_axis`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JsonDataset {
    entries: BTreeMap<String, JsonEntry>,
}

impl JsonDataset {
    pub fn open<P: AsRef<Path>>(path: P) -> ProcessingResult<Self> {
        let contents = fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> ProcessingResult<()> {
        let contents = serde_json::to_string(self)?;
        fs::write(path.as_ref(), contents)?;
        Ok(())
    }

    pub fn insert_array(&mut self, path: &str, array: &ArrayD<f64>) {
        self.entries.insert(
            path.to_string(),
            JsonEntry::Array {
                shape: array.shape().to_vec(),
                values: array.iter().copied().collect(),
            },
        );
    }

    pub fn insert_vec(&mut self, path: &str, values: &[f64]) {
        self.entries.insert(
            path.to_string(),
            JsonEntry::Array {
                shape: vec![values.len()],
                values: values.to_vec(),
            },
        );
    }

    pub fn insert_text(&mut self, path: &str, text: &str) {
        self.entries
            .insert(path.to_string(), JsonEntry::Text(text.to_string()));
    }

    fn entry(&self, path: &str) -> ProcessingResult<&JsonEntry> {
        self.entries
            .get(path)
            .ok_or_else(|| ProcessingError::Dataset(format!("missing dataset {}", path)))
    }
}

impl DatasetSource for JsonDataset {
    fn read_array(&self, path: &str) -> ProcessingResult<ArrayD<f64>> {
        match self.entry(path)? {
            JsonEntry::Array { shape, values } => {
                Ok(ArrayD::from_shape_vec(IxDyn(shape), values.clone())?)
            }
            JsonEntry::Text(_) => Err(ProcessingError::Dataset(format!(
                "{} holds text, not numbers",
                path
            ))),
        }
    }

    fn read_string(&self, path: &str) -> ProcessingResult<String> {
        match self.entry(path)? {
            JsonEntry::Text(text) => Ok(text.clone()),
            JsonEntry::Array { .. } => Err(ProcessingError::Dataset(format!(
                "{} holds numbers, not text",
                path
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn save_and_open_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dataset.json");

        let mut dataset = JsonDataset::default();
        dataset.insert_vec("a/b", &[1.0, 2.5]);
        dataset.insert_text("a/window", "tukey25");
        let cube = Array3::from_shape_fn((2, 3, 4), |(i, j, k)| (i * 100 + j * 10 + k) as f64);
        dataset.insert_array("a/cube", &cube.clone().into_dyn());
        dataset.save_json(&path).unwrap();

        let loaded = JsonDataset::open(&path).unwrap();
        assert_eq!(loaded, dataset);
        assert_eq!(loaded.read_vec("a/b").unwrap(), vec![1.0, 2.5]);
        assert_eq!(loaded.read_scalar("a/b").unwrap(), 1.0);
        assert_eq!(loaded.read_string("a/window").unwrap(), "tukey25");
        assert_eq!(loaded.read_array3("a/cube").unwrap(), cube);
    }

    #[test]
    fn wrong_kind_or_missing_path_is_a_dataset_error() {
        let mut dataset = JsonDataset::default();
        dataset.insert_text("t", "boxcar");
        dataset.insert_vec("v", &[1.0]);
        assert!(matches!(dataset.read_vec("t"), Err(ProcessingError::Dataset(_))));
        assert!(matches!(dataset.read_string("v"), Err(ProcessingError::Dataset(_))));
        assert!(matches!(dataset.read_vec("nope"), Err(ProcessingError::Dataset(_))));
        assert!(dataset.read_array3("v").is_err());
    }

    #[test]
    fn shape_must_match_value_count() {
        let json = r#"{"x": {"shape": [2, 2], "values": [1.0, 2.0, 3.0]}}"#;
        let dataset: JsonDataset = serde_json::from_str(json).unwrap();
        assert!(matches!(
            dataset.read_array("x"),
            Err(ProcessingError::ShapeMismatch(_))
        ));
    }
}
