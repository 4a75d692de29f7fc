//! Error types for the converter.

use std::path::PathBuf;

use thiserror::Error;

/// Fatal conditions recognised while loading, validating or converting a DEM.
#[derive(Debug, Error)]
pub enum DemError {
    /// GDAL could not open the input.
    #[error("Input file '{}' not found...exiting.", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: gdal::errors::GdalError,
    },

    /// Cells are not square.
    #[error("cell scale x ({x}) != cell scale y ({y})")]
    NonSquareCells { x: i64, y: i64 },

    /// The projection's length unit is not meters.
    #[error("Cell unit is '{0}' instead of 'Meter'.")]
    NotMeters(String),

    /// The projection's unit multiplier is not 1.
    #[error("Cell z scale is '{0}' instead of '1'.")]
    ZScale(i64),

    /// The dataset has no band to convert.
    #[error("Data set has no raster bands")]
    NoRasterBand,

    /// Chop offset outside the accepted range.
    #[error("Chop elevation '{0}' is less than 1.")]
    InvalidChop(i64),

    /// An artifact step failed while running with `--strict`.
    #[error("Artifact step '{step}' failed: {reason}")]
    StepFailed { step: &'static str, reason: String },
}
