/// Classify one 8-bit RGB aerial photo chip into cover classes with a trained
/// random-forest model. Writes a single-band GeoTIFF of labels 1–5 with 0 for
/// no-data, keeping the input's georeferencing.
use std::path::PathBuf;

use anyhow::{Context, Result};
use canopy_core::classify::classify_file;
use canopy_core::model::RandomForest;
use clap::Parser;
use tracing::info;

// ── CLI ──────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "classify_image", about = "Classify an RGB aerial photo into cover classes")]
struct Args {
    /// Input RGB GeoTIFF
    #[arg(short, long)]
    reffile: PathBuf,

    /// Output classified GeoTIFF
    #[arg(short, long)]
    outfile: PathBuf,

    /// Trained model file
    #[arg(short, long, default_value = "rfc_model.bin")]
    model: PathBuf,

    /// Band-1 value marking pixels outside the image area
    #[arg(short, long, default_value = "0")]
    nodata: f32,

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

    let model = RandomForest::load(&args.model)
        .with_context(|| format!("Cannot load model {}", args.model.display()))?;
    classify_file(&args.reffile, &args.outfile, &model, args.nodata)
        .with_context(|| format!("Failed to classify {}", args.reffile.display()))?;

    info!("[classify_image] {} complete", args.outfile.display());
    Ok(())
}
