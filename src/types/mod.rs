//! Serialized artifacts produced by the evaluation pipeline

pub mod baseline;
pub mod report;
pub mod summary;

pub use baseline::{BaselineRecord, NumberCell};
pub use report::{EvaluationReport, MetricValue};
pub use summary::EvaluationSummary;
