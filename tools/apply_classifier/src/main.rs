/// Batch woody-FPC extraction: classifies every image chip named in a list and
/// writes the percentage of woody-green pixels per site to a CSV (`site,fpc`).
///
/// Classified chips are written next to the inputs as
/// `<name>_rgb_comb_class.tif`.
use std::path::PathBuf;

use anyhow::{Context, Result};
use canopy_core::batch::{run_batch, FailurePolicy};
use canopy_core::model::RandomForest;
use canopy_core::table::{read_image_list, write_fpc_table};
use clap::Parser;
use tracing::info;

// ── CLI ──────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "apply_classifier",
    about = "Classify a list of image chips and extract woody FPC per site"
)]
struct Args {
    /// CSV (no header) whose first column lists the image chips to process
    #[arg(short = 's', long)]
    imglist: PathBuf,

    /// Directory containing the image chips
    #[arg(short, long)]
    direc: PathBuf,

    /// Output CSV of FPC results
    #[arg(short, long)]
    csv: PathBuf,

    /// Trained model file
    #[arg(short, long, default_value = "rfc_model.bin")]
    model: PathBuf,

    /// Band-1 value marking pixels outside the image area
    #[arg(short, long, default_value = "0")]
    nodata: f32,

    /// Log and skip sites that fail instead of stopping the batch
    #[arg(long)]
    continue_on_error: bool,

    /// Debug-level logging
    #[arg(long)]
    verbose: bool,

    /// Errors only
    #[arg(long)]
    quiet: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    canopy_core::logging::init(args.verbose, args.quiet);

    let names = read_image_list(&args.imglist)
        .with_context(|| format!("Cannot read image list {}", args.imglist.display()))?;
    let model = RandomForest::load(&args.model)
        .with_context(|| format!("Cannot load model {}", args.model.display()))?;
    info!("[apply_classifier] {} images, model {}", names.len(), args.model.display());

    let policy = if args.continue_on_error {
        FailurePolicy::Skip
    } else {
        FailurePolicy::Abort
    };
    let records = run_batch(&names, &args.direc, &model, args.nodata, policy)?;

    write_fpc_table(&args.csv, &records)
        .with_context(|| format!("Cannot write {}", args.csv.display()))?;
    info!("[apply_classifier] {} sites written to {}", records.len(), args.csv.display());
    Ok(())
}
