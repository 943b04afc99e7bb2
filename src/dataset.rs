//! Headerless CSV readers for the held-out test set.
//!
//! Features and labels come from separate files with no header row and no
//! index column. Empty feature cells and `NaN` are read as missing values;
//! labels must be finite.

use crate::error::{EvalError, Result, ShapeMismatch};
use csv::ReaderBuilder;
use ndarray::{Array1, Array2};
use std::fs::File;
use std::path::Path;
use tracing::info;

/// Numeric 2D array, one row per sample
pub type FeatureMatrix = Array2<f64>;

/// Ground truth, one value per sample
pub type LabelVector = Array1<f64>;

/// Numeric type of the label column, inferred from the label file text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LabelKind {
    /// Every label cell is an integer literal
    Integer,
    #[default]
    Float,
}

/// Features and labels of the evaluation set
#[derive(Debug, Clone)]
pub struct EvaluationDataset {
    pub features: FeatureMatrix,
    pub labels: LabelVector,
    /// Written back in the same form to the baseline
    pub label_kind: LabelKind,
}

impl EvaluationDataset {
    /// Read both files and check they describe the same rows
    pub fn load<P: AsRef<Path>, Q: AsRef<Path>>(features_path: P, labels_path: Q) -> Result<Self> {
        let features = read_feature_matrix(features_path)?;
        let (labels, label_kind) = read_labels(labels_path.as_ref())?;
        Ok(Self {
            label_kind,
            ..Self::new(features, labels)?
        })
    }

    pub fn new(features: FeatureMatrix, labels: LabelVector) -> Result<Self> {
        if labels.is_empty() {
            return Err(EvalError::empty("label vector"));
        }
        if features.nrows() != labels.len() {
            return Err(ShapeMismatch::Length {
                what: "feature rows vs labels",
                expected: labels.len(),
                actual: features.nrows(),
            }
            .into());
        }
        Ok(Self {
            features,
            labels,
            label_kind: LabelKind::Float,
        })
    }

    pub fn rows(&self) -> usize {
        self.labels.len()
    }

    pub fn num_features(&self) -> usize {
        self.features.ncols()
    }
}

fn read_rows(path: &Path) -> Result<Vec<Vec<String>>> {
    let file = File::open(path).map_err(|e| EvalError::io(path, e))?;
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .from_reader(file);

    let mut rows = Vec::new();
    for (index, record) in rdr.records().enumerate() {
        let record = record.map_err(|e| match e.kind() {
            csv::ErrorKind::Io(_) => EvalError::io(
                path,
                std::io::Error::new(std::io::ErrorKind::Other, e.to_string()),
            ),
            _ => EvalError::invalid_data(path, format!("row {}: {}", index + 1, e)),
        })?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(rows)
}

fn parse_feature(path: &Path, row: usize, col: usize, cell: &str) -> Result<f64> {
    if cell.is_empty() {
        return Ok(f64::NAN);
    }
    cell.parse::<f64>().map_err(|_| {
        EvalError::invalid_data(
            path,
            format!("row {}, column {}: '{}' is not a number", row + 1, col + 1, cell),
        )
    })
}

/// Read a headerless numeric matrix
pub fn read_feature_matrix<P: AsRef<Path>>(path: P) -> Result<FeatureMatrix> {
    let path = path.as_ref();
    let rows = read_rows(path)?;
    let n_rows = rows.len();
    let n_cols = rows.first().map(Vec::len).unwrap_or(0);

    let mut values = Vec::with_capacity(n_rows * n_cols);
    for (r, row) in rows.iter().enumerate() {
        for (c, cell) in row.iter().enumerate() {
            values.push(parse_feature(path, r, c, cell)?);
        }
    }

    let matrix = Array2::from_shape_vec((n_rows, n_cols), values)
        .map_err(|e| EvalError::invalid_data(path, e.to_string()))?;

    info!(
        path = %path.display(),
        rows = n_rows,
        columns = n_cols,
        "Feature matrix loaded"
    );
    Ok(matrix)
}

/// Read a headerless single-column label file
pub fn read_label_vector<P: AsRef<Path>>(path: P) -> Result<LabelVector> {
    read_labels(path.as_ref()).map(|(labels, _)| labels)
}

fn read_labels(path: &Path) -> Result<(LabelVector, LabelKind)> {
    let rows = read_rows(path)?;

    let mut all_integers = true;
    let mut labels = Vec::with_capacity(rows.len());
    for (r, row) in rows.iter().enumerate() {
        if row.len() != 1 {
            return Err(ShapeMismatch::LabelColumns {
                expected: 1,
                actual: row.len(),
            }
            .into());
        }
        let cell = &row[0];
        all_integers &= cell.parse::<i64>().is_ok();
        let value = cell.parse::<f64>().map_err(|_| {
            EvalError::invalid_data(path, format!("row {}: '{}' is not a number", r + 1, cell))
        })?;
        if !value.is_finite() {
            return Err(EvalError::invalid_data(
                path,
                format!("row {}: label must be finite, got {}", r + 1, cell),
            ));
        }
        labels.push(value);
    }

    let kind = if all_integers {
        LabelKind::Integer
    } else {
        LabelKind::Float
    };
    info!(path = %path.display(), rows = labels.len(), kind = ?kind, "Labels loaded");
    Ok((Array1::from(labels), kind))
}
