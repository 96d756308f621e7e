//! Saving and restoring maps
//!
//! Maps are written as JSON. Grids are stored row-major as `{rows, cols, data}`; JSON has
//! no representation for non-finite numbers, so `NaN` and infinities (which arithmetic
//! legitimately produces) are written as the strings `"nan"`, `"inf"` and `"-inf"`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

use super::{MapMeta, MapValue};
use crate::core_types::Unit;
use crate::grid::{self, Grid, MaskGrid};

/// A grid sample: plain number, or a tagged non-finite value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
enum Sample {
    Finite(f64),
    Special(SpecialValue),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum SpecialValue {
    #[serde(rename = "nan")]
    Nan,
    #[serde(rename = "inf")]
    Inf,
    #[serde(rename = "-inf")]
    NegInf,
}

impl From<f64> for Sample {
    fn from(x: f64) -> Self {
        if x.is_nan() {
            Sample::Special(SpecialValue::Nan)
        } else if x == f64::INFINITY {
            Sample::Special(SpecialValue::Inf)
        } else if x == f64::NEG_INFINITY {
            Sample::Special(SpecialValue::NegInf)
        } else {
            Sample::Finite(x)
        }
    }
}

impl From<Sample> for f64 {
    fn from(s: Sample) -> f64 {
        match s {
            Sample::Finite(x) => x,
            Sample::Special(SpecialValue::Nan) => f64::NAN,
            Sample::Special(SpecialValue::Inf) => f64::INFINITY,
            Sample::Special(SpecialValue::NegInf) => f64::NEG_INFINITY,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GridRecord<T> {
    rows: usize,
    cols: usize,
    data: Vec<T>,
}

impl GridRecord<Sample> {
    fn from_grid(g: &Grid) -> Self {
        Self {
            rows: g.nrows(),
            cols: g.ncols(),
            data: g.transpose().iter().map(|&x| Sample::from(x)).collect(),
        }
    }

    fn into_grid(self) -> Result<Grid, PersistenceError> {
        check_len(self.rows, self.cols, self.data.len())?;
        let data: Vec<f64> = self.data.into_iter().map(f64::from).collect();
        Ok(Grid::from_row_slice(self.rows, self.cols, &data))
    }
}

impl GridRecord<u32> {
    fn from_mask(m: &MaskGrid) -> Self {
        Self {
            rows: m.nrows(),
            cols: m.ncols(),
            data: grid::to_rows(m).concat(),
        }
    }

    fn into_mask(self) -> Result<MaskGrid, PersistenceError> {
        check_len(self.rows, self.cols, self.data.len())?;
        Ok(MaskGrid::from_row_slice(self.rows, self.cols, &self.data))
    }
}

fn check_len(rows: usize, cols: usize, len: usize) -> Result<(), PersistenceError> {
    if rows * cols == len {
        Ok(())
    } else {
        Err(PersistenceError::ParseFailed(format!(
            "grid declares {rows}x{cols} but holds {len} samples"
        )))
    }
}

/// On-disk layout of a map
#[derive(Debug, Clone, Serialize, Deserialize)]
struct MapRecord {
    value: GridRecord<Sample>,
    ivar: Option<GridRecord<Sample>>,
    mask: GridRecord<u32>,
    unit: Option<Unit>,
    meta: Option<MapMeta>,
}

impl MapValue {
    /// Serialize to a JSON string
    ///
    /// # Errors
    /// Returns error if the map cannot be serialized
    pub fn to_json_string(&self) -> Result<String, PersistenceError> {
        let record = MapRecord {
            value: GridRecord::from_grid(&self.value),
            ivar: self.ivar.as_ref().map(GridRecord::from_grid),
            mask: GridRecord::from_mask(&self.mask),
            unit: self.unit.clone(),
            meta: self.meta.clone(),
        };
        serde_json::to_string_pretty(&record)
            .map_err(|e| PersistenceError::SerializeFailed(e.to_string()))
    }

    /// Deserialize from a JSON string produced by [`MapValue::to_json_string`]
    ///
    /// # Errors
    /// Returns error if the text is not a valid map record or its grids are inconsistent
    pub fn from_json_str(contents: &str) -> Result<Self, PersistenceError> {
        let record: MapRecord = serde_json::from_str(contents)
            .map_err(|e| PersistenceError::ParseFailed(e.to_string()))?;

        let value = record.value.into_grid()?;
        let ivar = record.ivar.map(GridRecord::into_grid).transpose()?;
        let mask = record.mask.into_mask()?;

        let map = MapValue::new(value, ivar, mask, record.unit)
            .map_err(|e| PersistenceError::ParseFailed(e.to_string()))?;
        Ok(match record.meta {
            Some(meta) => map.with_meta(meta),
            None => map,
        })
    }

    /// Save map to file
    ///
    /// # Errors
    /// Returns error if file cannot be written or map cannot be serialized
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), PersistenceError> {
        let contents = self.to_json_string()?;
        fs::write(path.as_ref(), contents)
            .map_err(|e| PersistenceError::SaveFailed(e.to_string()))?;
        info!(
            "Saved {}x{} map to {}",
            self.shape().0,
            self.shape().1,
            path.as_ref().display()
        );
        Ok(())
    }

    /// Restore map from file, optionally deleting the file afterwards
    ///
    /// # Errors
    /// Returns error if file cannot be read, parsed or (when requested) deleted
    pub fn restore<P: AsRef<Path>>(path: P, delete: bool) -> Result<Self, PersistenceError> {
        let path = path.as_ref();
        let contents =
            fs::read_to_string(path).map_err(|e| PersistenceError::LoadFailed(e.to_string()))?;
        let map = Self::from_json_str(&contents)?;

        if delete {
            fs::remove_file(path).map_err(|e| PersistenceError::DeleteFailed(e.to_string()))?;
        }
        info!(
            "Restored {}x{} map from {}",
            map.shape().0,
            map.shape().1,
            path.display()
        );
        Ok(map)
    }
}

/// Errors that can occur with persistence operations
#[derive(Debug)]
pub enum PersistenceError {
    /// Failed to load file
    LoadFailed(String),
    /// Failed to parse file contents
    ParseFailed(String),
    /// Failed to serialize map
    SerializeFailed(String),
    /// Failed to save file
    SaveFailed(String),
    /// Failed to delete file after restoring
    DeleteFailed(String),
}

impl std::fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PersistenceError::LoadFailed(msg) => write!(f, "Failed to load: {msg}"),
            PersistenceError::ParseFailed(msg) => write!(f, "Failed to parse: {msg}"),
            PersistenceError::SerializeFailed(msg) => write!(f, "Failed to serialize: {msg}"),
            PersistenceError::SaveFailed(msg) => write!(f, "Failed to save: {msg}"),
            PersistenceError::DeleteFailed(msg) => write!(f, "Failed to delete: {msg}"),
        }
    }
}

impl std::error::Error for PersistenceError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MapValue {
        MapValue::from_rows(
            &[vec![1.5, f64::NAN, 3.0], vec![f64::INFINITY, -2.0, 0.0]],
            Some(&[vec![4.0, 0.0, f64::INFINITY], vec![1.0, 2.0, 3.0]]),
            &[vec![0, 1, 2], vec![1 << 30, 0, 0]],
            Some("1E-17 erg/s/cm^2/spaxel".parse().unwrap()),
        )
        .unwrap()
        .with_meta(MapMeta::new("emline_gflux", Some("ha_6564"), "MPL-5"))
    }

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("maps_core_{}_{}.json", name, std::process::id()))
    }

    #[test]
    fn test_json_preserves_non_finite_samples() {
        let map = sample();
        let text = map.to_json_string().unwrap();
        assert!(text.contains("\"nan\""));
        assert!(text.contains("\"inf\""));

        let back = MapValue::from_json_str(&text).unwrap();
        assert_eq!(back.shape(), (2, 3));
        assert!(back.value()[(0, 1)].is_nan());
        assert_eq!(back.value()[(1, 0)], f64::INFINITY);
        assert_eq!(back.value()[(1, 1)], -2.0);
        assert_eq!(back.ivar().unwrap()[(0, 2)], f64::INFINITY);
        assert_eq!(back.mask(), map.mask());
        assert_eq!(back.unit(), map.unit());
        assert_eq!(back.meta(), map.meta());
    }

    #[test]
    fn test_save_and_restore() {
        let map = sample();
        let path = temp_path("save_restore");

        map.save(&path).unwrap();
        assert!(path.exists());

        let restored = MapValue::restore(&path, true).unwrap();
        assert_eq!(restored.shape(), map.shape());
        assert!(!path.exists());
    }

    #[test]
    fn test_restore_missing_file() {
        let err = MapValue::restore(temp_path("does_not_exist"), false).unwrap_err();
        assert!(matches!(err, PersistenceError::LoadFailed(_)));
    }

    #[test]
    fn test_inconsistent_record_rejected() {
        let text = r#"{
            "value": {"rows": 2, "cols": 2, "data": [1.0, 2.0, 3.0]},
            "ivar": null,
            "mask": {"rows": 2, "cols": 2, "data": [0, 0, 0, 0]},
            "unit": null,
            "meta": null
        }"#;
        let err = MapValue::from_json_str(text).unwrap_err();
        assert!(matches!(err, PersistenceError::ParseFailed(_)));
    }

    #[test]
    fn test_zero_exponent_denominator_rejected() {
        let text = r#"{
            "value": {"rows": 1, "cols": 1, "data": [1.0]},
            "ivar": null,
            "mask": {"rows": 1, "cols": 1, "data": [0]},
            "unit": {"scale": 1.0, "powers": {"m": {"num": 1, "den": 0}}},
            "meta": null
        }"#;
        let err = MapValue::from_json_str(text).unwrap_err();
        match err {
            PersistenceError::ParseFailed(msg) => assert!(msg.contains("invalid exponent 1/0")),
            other => panic!("expected parse failure, got {other:?}"),
        }

        let valid = text.replace("\"den\": 0", "\"den\": 2");
        let map = MapValue::from_json_str(&valid).unwrap();
        assert_eq!(map.unit().unwrap().to_string(), "m^(1/2)");
    }
}
