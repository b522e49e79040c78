//! Error types for raster operations.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by a [`RasterBackend`](super::RasterBackend).
#[derive(Debug, Error)]
pub enum RasterError {
    /// Reading or writing the file failed.
    #[error("raster I/O failed on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file exists but is not a raster this backend understands.
    #[error("cannot decode raster {path}: {reason}")]
    Decode { path: PathBuf, reason: String },

    /// The raster could not be serialized.
    #[error("cannot encode raster {path}: {reason}")]
    Encode { path: PathBuf, reason: String },

    /// Warping between spatial reference systems is not available.
    #[error("reprojection from {from} to {to} is not supported by this backend")]
    UnsupportedReprojection { from: String, to: String },

    /// Grid or band shapes disagree.
    #[error("raster shape mismatch: {0}")]
    ShapeMismatch(String),

    /// A target grid would have no pixels.
    #[error("invalid target grid: {0}")]
    InvalidGrid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_reprojection_display() {
        let err = RasterError::UnsupportedReprojection {
            from: "EPSG:32615".to_string(),
            to: "EPSG:4326".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "reprojection from EPSG:32615 to EPSG:4326 is not supported by this backend"
        );
    }

    #[test]
    fn test_shape_mismatch_display() {
        let err = RasterError::ShapeMismatch("2x2 vs 3x3".to_string());
        assert_eq!(err.to_string(), "raster shape mismatch: 2x2 vs 3x3");
    }
}
