//! Evaluation Fixture Generator
//!
//! Writes a synthetic linear regression test set together with a matching
//! XGBoost `gblinear` model packed into `model.tar.gz`, for exercising the
//! evaluation pipeline end to end.

use anyhow::{Context, Result};
use clap::Parser;
use flate2::write::GzEncoder;
use flate2::Compression;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "make_fixture", about = "Generate an evaluation fixture")]
struct Args {
    /// Output directory (model/ and test/ are created below it)
    #[arg(short, long, default_value = "fixture")]
    out: PathBuf,

    /// Number of test rows
    #[arg(long, default_value_t = 1000)]
    rows: usize,

    /// Number of feature columns
    #[arg(long, default_value_t = 4)]
    features: usize,

    /// Standard deviation of the label noise
    #[arg(long, default_value_t = 0.5)]
    noise: f64,

    /// RNG seed
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Name of the model entry inside the archive
    #[arg(long, default_value = "xgboost-model")]
    model_name: String,
}

/// Linear ground truth shared by the model and the labels
struct LinearTruth {
    weights: Vec<f64>,
    bias: f64,
}

impl LinearTruth {
    fn random(rng: &mut StdRng, features: usize) -> Self {
        Self {
            weights: (0..features).map(|_| rng.gen_range(-3.0..3.0)).collect(),
            bias: rng.gen_range(-1.0..1.0),
        }
    }

    fn eval(&self, row: &[f64]) -> f64 {
        self.bias + row.iter().zip(&self.weights).map(|(x, w)| x * w).sum::<f64>()
    }

    fn to_xgboost_json(&self) -> serde_json::Value {
        let mut weights = self.weights.clone();
        weights.push(self.bias);
        json!({
            "learner": {
                "learner_model_param": {
                    "base_score": "0E0",
                    "num_class": "0",
                    "num_feature": self.weights.len().to_string(),
                    "num_target": "1"
                },
                "objective": { "name": "reg:squarederror" },
                "gradient_booster": {
                    "name": "gblinear",
                    "model": { "weights": weights }
                }
            },
            "version": [2, 0, 3]
        })
    }
}

/// Approximately normal noise from the sum of uniforms
fn noise(rng: &mut StdRng, std_dev: f64) -> f64 {
    let sum: f64 = (0..12).map(|_| rng.gen::<f64>()).sum();
    (sum - 6.0) * std_dev
}

fn write_archive(path: &Path, entry_name: &str, payload: &[u8]) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));

    let mut header = tar::Header::new_gnu();
    header.set_size(payload.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder
        .append_data(&mut header, entry_name, payload)
        .context("appending model entry")?;
    builder
        .into_inner()
        .context("finishing tar stream")?
        .finish()
        .context("finishing gzip stream")?;
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("make_fixture=info".parse()?),
        )
        .init();

    let args = Args::parse();
    if args.features == 0 {
        anyhow::bail!("--features must be at least 1");
    }

    info!(
        out = %args.out.display(),
        rows = args.rows,
        features = args.features,
        noise = args.noise,
        seed = args.seed,
        "Generating evaluation fixture"
    );

    let mut rng = StdRng::seed_from_u64(args.seed);
    let truth = LinearTruth::random(&mut rng, args.features);

    let model_dir = args.out.join("model");
    let test_dir = args.out.join("test");
    fs::create_dir_all(&model_dir)?;
    fs::create_dir_all(&test_dir)?;

    let mut features = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(test_dir.join("test_x.csv"))?;
    let mut labels = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(test_dir.join("test_y.csv"))?;

    for _ in 0..args.rows {
        let row: Vec<f64> = (0..args.features)
            .map(|_| rng.gen_range(-10.0..10.0))
            .collect();
        let label = truth.eval(&row) + noise(&mut rng, args.noise);
        features.serialize(&row)?;
        labels.serialize([label])?;
    }
    features.flush()?;
    labels.flush()?;

    let model = serde_json::to_vec(&truth.to_xgboost_json())?;
    let archive = model_dir.join("model.tar.gz");
    write_archive(&archive, &args.model_name, &model)?;

    let mut readme = File::create(args.out.join("expected.txt"))?;
    writeln!(
        readme,
        "rows={} features={} noise_std={} (expected rmse close to noise_std)",
        args.rows, args.features, args.noise
    )?;

    info!(
        archive = %archive.display(),
        weights = ?truth.weights,
        bias = truth.bias,
        "Fixture written"
    );
    Ok(())
}
