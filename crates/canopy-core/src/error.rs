use std::path::PathBuf;

/// Errors from raster, vector, table and model operations.
#[derive(Debug, thiserror::Error)]
pub enum CanopyError {
    /// Returned when a file cannot be opened for reading.
    #[error("cannot open {path}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Returned when an output file or directory cannot be created.
    #[error("cannot create {path}")]
    Create {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Returned when a TIFF cannot be decoded or encoded.
    #[error("TIFF error in {path}")]
    Tiff {
        path: PathBuf,
        source: tiff::TiffError,
    },

    /// Returned when the pixel type of a raster is not one we read or write.
    #[error("unsupported sample format in {path}: {detail}")]
    UnsupportedSampleFormat { path: PathBuf, detail: String },

    /// Returned when a raster has fewer bands than an operation needs.
    #[error("{path} has {got} band(s), need at least {expected}")]
    InsufficientBands {
        path: PathBuf,
        expected: usize,
        got: usize,
    },

    /// Returned when band buffers do not match the declared raster size.
    #[error("band {band} has {got} samples, expected {expected}")]
    BandLengthMismatch {
        band: usize,
        expected: usize,
        got: usize,
    },

    /// Returned when an operation needs a geotransform the raster lacks.
    #[error("{path} has no georeferencing (ModelPixelScale/ModelTiepoint or ModelTransformation)")]
    MissingGeoReference { path: PathBuf },

    /// Returned when a CSV file cannot be read or written.
    #[error("CSV error in {path}")]
    Csv { path: PathBuf, source: csv::Error },

    /// Returned when a required CSV column is absent from the header.
    #[error("column \"{column}\" not found in {path}")]
    MissingColumn { path: PathBuf, column: String },

    /// Returned when a CSV cell cannot be parsed.
    #[error("invalid value \"{raw}\" in {path}: row {row}, column \"{column}\"")]
    InvalidValue {
        path: PathBuf,
        row: usize,
        column: String,
        raw: String,
    },

    /// Returned when training data has no samples.
    #[error("dataset has zero samples")]
    EmptyDataset,

    /// Returned when a feature row does not match the model's width.
    #[error("feature rows have {got} values, model expects {expected}")]
    FeatureCountMismatch { expected: usize, got: usize },

    /// Returned when model or split parameters are out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Returned when model encoding fails.
    #[error("failed to serialize model")]
    SerializeModel { source: bincode::Error },

    /// Returned when a model file cannot be decoded.
    #[error("failed to deserialize model from {path}")]
    DeserializeModel {
        path: PathBuf,
        source: bincode::Error,
    },

    /// Returned when a model file was written by an incompatible build.
    #[error("incompatible model version in {path}: expected {expected}, found {found}")]
    IncompatibleModelVersion {
        path: PathBuf,
        expected: u32,
        found: u32,
    },

    /// Returned when a shapefile cannot be read.
    #[error("shapefile error in {path}")]
    Shapefile {
        path: PathBuf,
        source: shapefile::Error,
    },

    /// Returned when a shapefile has no geometry of the expected kind.
    #[error("{path} contains no {kind} features")]
    NoFeatures { path: PathBuf, kind: &'static str },

    /// Returned when a feature lacks a required attribute.
    #[error("feature {index} in {path} has no attribute \"{attribute}\"")]
    MissingAttribute {
        path: PathBuf,
        index: usize,
        attribute: String,
    },

    /// Returned when a clip footprint does not intersect the raster.
    #[error("footprint of {shape} does not overlap {image}")]
    NoOverlap { image: PathBuf, shape: PathBuf },
}

pub type Result<T> = std::result::Result<T, CanopyError>;
