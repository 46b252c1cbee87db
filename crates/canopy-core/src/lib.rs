//! Core library for the canopy aerial-photo tools: GeoTIFF rasters, the
//! random-forest cover classifier, FPC extraction, clipping, point sampling
//! and file listing. Each binary under `tools/` is a thin CLI over this crate.

pub mod batch;
pub mod classify;
pub mod clip;
pub mod cover;
pub mod error;
pub mod listing;
pub mod logging;
pub mod model;
pub mod points;
pub mod raster;
pub mod table;
pub mod vector;

pub use error::{CanopyError, Result};
