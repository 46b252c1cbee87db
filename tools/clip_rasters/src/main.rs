/// Clip rasters to shapefile footprints. Each row of the job list names an
/// image (`img`) and a polygon shapefile (`shp`); the polygons are dissolved,
/// the image is cropped to them and pixels outside are set to no-data. The
/// clip is written beside the shapefile with a `.tif` extension.
use std::path::PathBuf;

use anyhow::{Context, Result};
use canopy_core::clip::run_clip_job;
use canopy_core::table::read_clip_jobs;
use clap::Parser;
use tracing::info;

// ── CLI ──────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "clip_rasters", about = "Clip rasters to dissolved shapefile footprints")]
struct Args {
    /// CSV with header `img,shp`, one clip per row
    #[arg(short = 'i', long)]
    list: PathBuf,

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

    let jobs = read_clip_jobs(&args.list)
        .with_context(|| format!("Cannot read clip list {}", args.list.display()))?;
    for job in &jobs {
        run_clip_job(job).with_context(|| {
            format!("Failed to clip {} by {}", job.img.display(), job.shp.display())
        })?;
        info!("[clip_rasters] {} complete", job.output_path().display());
    }
    info!("[clip_rasters] {} clips written", jobs.len());
    Ok(())
}
