/// Point statistics: the value of every band of a raster under each point of
/// a point shapefile, written as `site,class,b1..bN`. No-data pixels and
/// points off the raster give empty cells.
use std::path::PathBuf;

use anyhow::{Context, Result};
use canopy_core::points::{sample_image, write_point_samples};
use canopy_core::vector::read_points;
use clap::Parser;
use tracing::info;

// ── CLI ──────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "point_stats",
    about = "Extract raster band values at shapefile point locations"
)]
struct Args {
    /// Single or multi-band raster to sample
    #[arg(short, long)]
    image: PathBuf,

    /// No-data value (defaults to the raster's own, if any)
    #[arg(short, long)]
    nodata: Option<f64>,

    /// Point shapefile with a class attribute and a unique-id attribute
    #[arg(short, long)]
    shape: PathBuf,

    /// Name of the unique-id attribute
    #[arg(short, long)]
    uid: String,

    /// Name of the class attribute
    #[arg(long, default_value = "class")]
    class_field: String,

    /// Output CSV
    #[arg(short = 'o', long)]
    csv: PathBuf,

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

    let points = read_points(&args.shape, &args.uid, &args.class_field)
        .with_context(|| format!("Cannot read points {}", args.shape.display()))?;
    let (raster, samples) = sample_image(&args.image, &points, args.nodata)
        .with_context(|| format!("Cannot sample {}", args.image.display()))?;
    write_point_samples(&args.csv, raster.n_bands(), &samples)
        .with_context(|| format!("Cannot write {}", args.csv.display()))?;

    info!(
        "[point_stats] {} points x {} bands from {} complete",
        samples.len(),
        raster.n_bands(),
        args.image.display()
    );
    Ok(())
}
