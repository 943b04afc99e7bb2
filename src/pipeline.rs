//! Evaluation run orchestration.
//!
//! Sequences the components and propagates the first error. The stages run
//! strictly in order: extract, load, read dataset, prepare output
//! directories, predict, compute metrics, write report, write baseline.

use crate::baseline::BaselineWriter;
use crate::config::AppConfig;
use crate::dataset::EvaluationDataset;
use crate::error::{EvalError, Result};
use crate::metrics::{MetricReport, MetricsEngine};
use crate::models::loader::ModelLoader;
use crate::report::ReportWriter;
use crate::types::summary::EvaluationSummary;
use chrono::Utc;
use std::fs;
use std::time::Instant;
use tracing::{info, info_span};
use uuid::Uuid;

/// A configured, single-shot evaluation run
pub struct Pipeline {
    config: AppConfig,
    loader: ModelLoader,
    metrics: MetricsEngine,
    report_writer: ReportWriter,
    baseline_writer: BaselineWriter,
}

impl Pipeline {
    /// Wire the components from configuration
    pub fn new(config: AppConfig) -> Self {
        let loader = ModelLoader::from_config(&config.model, config.paths.scratch_dir.clone());

        // The baseline metric is always computed, even when the report omits it.
        let mut kinds = config.evaluation.metrics.clone();
        if !kinds.contains(&config.evaluation.baseline_metric) {
            kinds.push(config.evaluation.baseline_metric);
        }
        let metrics = MetricsEngine::new(kinds);

        let baseline_writer = BaselineWriter::new(
            config.evaluation.rounding,
            config.evaluation.baseline_metric.name(),
        );

        Self {
            config,
            loader,
            metrics,
            report_writer: ReportWriter::new(),
            baseline_writer,
        }
    }

    /// Execute the run; succeeds only once both artifacts are written
    pub fn run(&self) -> Result<EvaluationSummary> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let span = info_span!("evaluation", run_id = %run_id);
        let _guard = span.enter();

        let paths = &self.config.paths;
        info!(
            archive = %paths.model_archive.display(),
            features = %paths.features.display(),
            labels = %paths.labels.display(),
            "Starting evaluation run"
        );

        let stage = Instant::now();
        let artifact = self.loader.extract(&paths.model_archive)?;
        let predictor = self.loader.load(&artifact)?;
        // Scratch space is released as soon as the model is in memory.
        drop(artifact);
        info!(
            model = predictor.name(),
            elapsed_ms = stage.elapsed().as_millis() as u64,
            "Model ready"
        );

        let stage = Instant::now();
        let dataset = EvaluationDataset::load(&paths.features, &paths.labels)?;
        info!(
            rows = dataset.rows(),
            columns = dataset.num_features(),
            elapsed_ms = stage.elapsed().as_millis() as u64,
            "Test set loaded"
        );

        self.prepare_output_dirs()?;

        let stage = Instant::now();
        let predictions = predictor.predict(&dataset.features)?;
        info!(
            rows = predictions.len(),
            elapsed_ms = stage.elapsed().as_millis() as u64,
            "Inference complete"
        );

        let predictions = predictions.to_vec();
        let labels = dataset.labels.to_vec();
        let computed = self.metrics.compute(&predictions, &labels)?;

        let baseline_metric = self.config.evaluation.baseline_metric;
        let baseline_value = computed
            .get(baseline_metric.name())
            .copied()
            .ok_or_else(|| EvalError::Degenerate {
                metric: baseline_metric.name(),
                reason: "baseline metric was not computed".to_string(),
            })?;

        let report_metrics: MetricReport = computed
            .iter()
            .filter(|(name, _)| {
                self.config
                    .evaluation
                    .metrics
                    .iter()
                    .any(|kind| kind.name() == name.as_str())
            })
            .map(|(name, &value)| (name.clone(), value))
            .collect();
        info!(metrics = ?report_metrics, "Metrics computed");

        let report_path = self.report_writer.write(&report_metrics, &paths.report_dir)?;
        let baseline_path = self
            .baseline_writer
            .clone()
            .with_label_kind(dataset.label_kind)
            .write(&predictions, &labels, baseline_value, &paths.baseline_dir)?;

        let summary = EvaluationSummary {
            run_id,
            started_at,
            finished_at: Utc::now(),
            model: predictor.name().to_string(),
            rows: dataset.rows(),
            metrics: report_metrics,
            report_path,
            baseline_path,
        };
        info!(elapsed_ms = summary.elapsed_ms(), "Evaluation run complete");
        Ok(summary)
    }

    /// Create output directories before inference so permission problems surface early
    fn prepare_output_dirs(&self) -> Result<()> {
        let paths = &self.config.paths;
        fs::create_dir_all(&paths.report_dir).map_err(|e| EvalError::io(&paths.report_dir, e))?;

        if self.config.evaluation.create_baseline_dir {
            fs::create_dir_all(&paths.baseline_dir)
                .map_err(|e| EvalError::io(&paths.baseline_dir, e))?;
        } else if !paths.baseline_dir.is_dir() {
            return Err(EvalError::io(
                &paths.baseline_dir,
                std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "baseline directory does not exist",
                ),
            ));
        }
        Ok(())
    }
}
