//! Prediction baseline rows

use serde::{Deserialize, Serialize};

/// Numeric baseline cell, written without a fractional part when integral
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumberCell {
    Integer(i64),
    Float(f64),
}

/// One row of the baseline table: prediction, broadcast metric, label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineRecord {
    pub prediction: NumberCell,
    pub metric: f64,
    pub label: NumberCell,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_serializes_as_csv_row() {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        writer
            .serialize(BaselineRecord {
                prediction: NumberCell::Integer(3),
                metric: 0.25,
                label: NumberCell::Integer(4),
            })
            .unwrap();
        writer
            .serialize(BaselineRecord {
                prediction: NumberCell::Float(2.75),
                metric: 0.25,
                label: NumberCell::Float(2.0),
            })
            .unwrap();

        let out = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        assert_eq!(out, "3,0.25,4\n2.75,0.25,2.0\n");
    }
}
