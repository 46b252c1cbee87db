/// Write the names of files in a directory with a given extension, one per
/// line. The output is the image list read by `apply_classifier`.
use std::path::PathBuf;

use anyhow::{Context, Result};
use canopy_core::listing::{list_files_with_extension, write_file_list};
use clap::Parser;
use tracing::info;

// ── CLI ──────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "list_files", about = "List files in a directory by extension")]
struct Args {
    /// Directory to look in
    #[arg(long, default_value = ".")]
    direc: PathBuf,

    /// Extension to match, e.g. .tif
    #[arg(long)]
    exten: String,

    /// Output text file
    #[arg(long)]
    txtfile: PathBuf,

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

    let names = list_files_with_extension(&args.direc, &args.exten)
        .with_context(|| format!("Cannot list {}", args.direc.display()))?;
    write_file_list(&args.txtfile, &names)
        .with_context(|| format!("Cannot write {}", args.txtfile.display()))?;
    info!(
        "[list_files] {} {} files written to {}",
        names.len(),
        args.exten,
        args.txtfile.display()
    );
    Ok(())
}
