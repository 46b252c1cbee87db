/// Train the cover-class random forest from a CSV of labelled band samples.
///
/// Holds out a seeded test split, reports accuracy, the confusion matrix and
/// band importances, and saves the model for `classify_image` and
/// `apply_classifier`.
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use canopy_core::cover::CoverClass;
use canopy_core::model::{
    read_training_csv, train_test_split, ConfusionMatrix, PixelClassifier, RandomForestConfig,
};
use clap::Parser;
use serde::Serialize;
use tracing::info;

// ── CLI ──────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "train_classifier", about = "Train the aerial-photo cover classifier")]
struct Args {
    /// Training CSV with a header row
    #[arg(short, long)]
    training: PathBuf,

    /// Class label column
    #[arg(long, default_value = "class")]
    class_column: String,

    /// Comma-separated band columns used as features
    #[arg(long, value_delimiter = ',', default_value = "b1,b2,b3")]
    bands: Vec<String>,

    /// Number of trees
    #[arg(long, default_value = "200")]
    n_trees: usize,

    /// Seed for bootstrap samples and split features
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Fraction of samples held out for testing
    #[arg(long, default_value = "0.2")]
    test_fraction: f64,

    /// Seed for the train/test shuffle
    #[arg(long, default_value = "20")]
    split_seed: u64,

    /// Maximum tree depth (unlimited if omitted)
    #[arg(long)]
    max_depth: Option<usize>,

    /// Output model file
    #[arg(short, long, default_value = "rfc_model.bin")]
    model: PathBuf,

    /// Write (predicted, observed) rows for the test split to this CSV
    #[arg(long)]
    test_results: Option<PathBuf>,

    /// Write a JSON training report to this file
    #[arg(long)]
    report: Option<PathBuf>,

    /// Debug-level logging
    #[arg(long)]
    verbose: bool,

    /// Errors only
    #[arg(long)]
    quiet: bool,
}

// ── Report ───────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct TrainingReport {
    n_train: usize,
    n_test: usize,
    n_trees: usize,
    seed: u64,
    classes: Vec<u8>,
    accuracy: f64,
    /// Rows are observed classes, columns predicted, both in `classes` order.
    confusion_matrix: Vec<Vec<usize>>,
    feature_importances: Vec<(String, f64)>,
}

fn write_test_results(path: &Path, predicted: &[u8], observed: &[u8]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(["predicted", "observed"])?;
    for (p, o) in predicted.iter().zip(observed) {
        wtr.write_record([p.to_string(), o.to_string()])?;
    }
    wtr.flush()?;
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    canopy_core::logging::init(args.verbose, args.quiet);

    let samples = read_training_csv(&args.training, &args.class_column, &args.bands)
        .with_context(|| format!("Cannot read training data {}", args.training.display()))?;
    let (train_idx, test_idx) = train_test_split(samples.len(), args.test_fraction, args.split_seed)?;
    let (train, test) = (samples.select(&train_idx), samples.select(&test_idx));
    info!("[train_classifier] training on {} samples, testing on {}", train.len(), test.len());

    let forest = RandomForestConfig::new(args.n_trees)?
        .with_seed(args.seed)
        .with_max_depth(args.max_depth)
        .fit(&train.features, &train.labels, &train.feature_names)?;

    let predicted = forest.predict(&test.features)?;
    // A class can be absent from the training split but present in the test split.
    let mut classes = forest.classes().to_vec();
    classes.extend_from_slice(&test.labels);
    classes.sort_unstable();
    classes.dedup();
    let matrix = ConfusionMatrix::from_labels(&classes, &test.labels, &predicted)?;
    info!("[train_classifier] overall accuracy = {:.4}", matrix.accuracy());
    for class in classes.iter().filter_map(|&c| CoverClass::from_label(c)) {
        info!("[train_classifier] class {} = {}", class.label(), class.name());
    }
    info!("[train_classifier] confusion matrix (rows observed, columns predicted)\n{matrix}");
    let importances = forest.feature_importances();
    for (band, score) in &importances {
        info!("[train_classifier] importance {band}: {score:.4}");
    }

    if let Some(path) = &args.test_results {
        write_test_results(path, &predicted, &test.labels)
            .with_context(|| format!("Cannot write {}", path.display()))?;
    }
    if let Some(path) = &args.report {
        let report = TrainingReport {
            n_train: train.len(),
            n_test: test.len(),
            n_trees: forest.n_trees(),
            seed: args.seed,
            classes,
            accuracy: matrix.accuracy(),
            confusion_matrix: matrix.counts().to_vec(),
            feature_importances: importances,
        };
        std::fs::write(path, serde_json::to_string_pretty(&report)?)
            .with_context(|| format!("Cannot write {}", path.display()))?;
    }

    forest
        .save(&args.model)
        .with_context(|| format!("Cannot save model {}", args.model.display()))?;
    info!("[train_classifier] model saved to {}", args.model.display());
    Ok(())
}
