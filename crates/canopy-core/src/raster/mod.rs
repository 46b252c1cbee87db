//! In-memory multi-band rasters and their GeoTIFF encoding.

pub mod geotiff;
pub mod geotransform;

pub use geotiff::{read_geotiff, write_geotiff, GeoReference};
pub use geotransform::GeoTransform;

use crate::error::{CanopyError, Result};

/// On-disk sample type of a raster. Values are held as `f32` in memory and
/// converted back to this type when written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    U8,
    U16,
    F32,
}

impl SampleFormat {
    /// Clamp and round an in-memory value to what this format can store.
    pub fn quantize(self, v: f32) -> f32 {
        match self {
            SampleFormat::U8 => v.round().clamp(0.0, u8::MAX as f32),
            SampleFormat::U16 => v.round().clamp(0.0, u16::MAX as f32),
            SampleFormat::F32 => v,
        }
    }
}

/// A georeferenced raster with one or more bands, row-major within a band.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    pub width: usize,
    pub height: usize,
    /// Band-major samples: `bands[b][row * width + col]`.
    pub bands: Vec<Vec<f32>>,
    pub format: SampleFormat,
    pub georef: GeoReference,
    /// Value marking pixels outside the valid image area (GDAL_NODATA).
    pub nodata: Option<f64>,
}

impl Raster {
    /// Create a raster with `n_bands` bands filled with `fill` and no georeferencing.
    pub fn new(width: usize, height: usize, n_bands: usize, format: SampleFormat, fill: f32) -> Self {
        Self {
            width,
            height,
            bands: vec![vec![fill; width * height]; n_bands],
            format,
            georef: GeoReference::default(),
            nodata: None,
        }
    }

    /// Build a raster from existing band buffers, checking every band has
    /// `width * height` samples.
    pub fn from_bands(
        width: usize,
        height: usize,
        bands: Vec<Vec<f32>>,
        format: SampleFormat,
    ) -> Result<Self> {
        let expected = width * height;
        if let Some((band, b)) = bands.iter().enumerate().find(|(_, b)| b.len() != expected) {
            return Err(CanopyError::BandLengthMismatch {
                band,
                expected,
                got: b.len(),
            });
        }
        Ok(Self {
            width,
            height,
            bands,
            format,
            georef: GeoReference::default(),
            nodata: None,
        })
    }

    #[must_use]
    pub fn with_georef(mut self, georef: GeoReference) -> Self {
        self.georef = georef;
        self
    }

    #[must_use]
    pub fn with_nodata(mut self, nodata: Option<f64>) -> Self {
        self.nodata = nodata;
        self
    }

    pub fn n_bands(&self) -> usize {
        self.bands.len()
    }

    pub fn n_pixels(&self) -> usize {
        self.width * self.height
    }

    pub fn band(&self, band: usize) -> &[f32] {
        &self.bands[band]
    }

    #[inline]
    pub fn get(&self, band: usize, row: usize, col: usize) -> f32 {
        self.bands[band][row * self.width + col]
    }

    #[inline]
    pub fn set(&mut self, band: usize, row: usize, col: usize, val: f32) {
        self.bands[band][row * self.width + col] = val;
    }

    /// Geotransform derived from the GeoTIFF tags, if any.
    pub fn transform(&self) -> Option<GeoTransform> {
        self.georef.transform()
    }

    /// True if `(width, height)` match another raster's.
    pub fn same_shape(&self, other: &Raster) -> bool {
        self.width == other.width && self.height == other.height
    }
}
