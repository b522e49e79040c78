//! The raster backend trait and the built-in native backend.

use std::fs;
use std::path::Path;

use tracing::debug;

use super::{warp, GridRaster, Interpolation, RasterError, RasterInfo, TargetGrid};

/// Trait for raster storage and resampling.
///
/// The engine never touches pixel files directly; product readers, project
/// assembly and test generators all go through a backend. Implementations
/// must be thread-safe (`Send + Sync`) since generators run on a worker pool.
pub trait RasterBackend: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Load a raster with its pixel data.
    fn read(&self, path: &Path) -> Result<GridRaster, RasterError>;

    /// Store a raster, creating parent directories as needed.
    fn write(&self, raster: &GridRaster, path: &Path) -> Result<(), RasterError>;

    /// Raster properties without keeping pixel data.
    fn describe(&self, path: &Path) -> Result<RasterInfo, RasterError> {
        self.read(path).map(|r| r.info())
    }

    /// Resample onto a target grid.
    fn warp(
        &self,
        src: &GridRaster,
        target: &TargetGrid,
        interpolation: Interpolation,
    ) -> Result<GridRaster, RasterError> {
        warp::warp(src, target, interpolation)
    }
}

/// File signature of native rasters.
const MAGIC: &[u8; 8] = b"GIPSRAS1";

/// Backend storing [`GridRaster`]s as bincode behind a short signature.
///
/// Warping is limited to a single spatial reference system.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeBackend;

impl NativeBackend {
    pub fn new() -> Self {
        Self
    }
}

impl RasterBackend for NativeBackend {
    fn name(&self) -> &str {
        "native"
    }

    fn read(&self, path: &Path) -> Result<GridRaster, RasterError> {
        let bytes = fs::read(path).map_err(|e| RasterError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let body = bytes
            .strip_prefix(MAGIC.as_slice())
            .ok_or_else(|| RasterError::Decode {
                path: path.to_path_buf(),
                reason: "missing native raster signature".to_string(),
            })?;
        let raster: GridRaster = bincode::deserialize(body).map_err(|e| RasterError::Decode {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        if raster.bands.iter().any(|b| b.len() != raster.width * raster.height) {
            return Err(RasterError::Decode {
                path: path.to_path_buf(),
                reason: "band length does not match dimensions".to_string(),
            });
        }
        Ok(raster)
    }

    fn write(&self, raster: &GridRaster, path: &Path) -> Result<(), RasterError> {
        let io_err = |e| RasterError::Io {
            path: path.to_path_buf(),
            source: e,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let mut bytes = MAGIC.to_vec();
        bincode::serialize_into(&mut bytes, raster).map_err(|e| RasterError::Encode {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        // Write beside the target and rename so readers never see a partial file.
        let mut partial = path.as_os_str().to_owned();
        partial.push(".partial");
        fs::write(&partial, &bytes).map_err(io_err)?;
        fs::rename(&partial, path).map_err(io_err)?;

        debug!(path = %path.display(), bytes = bytes.len(), "Raster written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::BBox;
    use tempfile::TempDir;

    fn sample() -> GridRaster {
        let grid =
            TargetGrid::from_extent("EPSG:4326", &BBox::new(0.0, 0.0, 2.0, 2.0), (1.0, 1.0)).unwrap();
        let mut raster =
            GridRaster::from_bands(&grid, vec![vec![1.0, 2.0, 3.0, f32::NAN]], Some(-1.0)).unwrap();
        raster.metadata.insert("product".to_string(), "ndvi".to_string());
        raster
    }

    #[test]
    fn test_write_then_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/2014123_LC8_ndvi.tif");
        let backend = NativeBackend::new();

        backend.write(&sample(), &path).unwrap();
        let back = backend.read(&path).unwrap();
        assert_eq!(back.width, 2);
        assert_eq!(back.metadata["product"], "ndvi");
        assert_eq!(&back.bands[0][..3], &[1.0, 2.0, 3.0]);
        assert!(back.bands[0][3].is_nan());
        assert!(!dir.path().join("nested/2014123_LC8_ndvi.tif.partial").exists());
    }

    #[test]
    fn test_describe() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("r.tif");
        NativeBackend.write(&sample(), &path).unwrap();
        let info = NativeBackend.describe(&path).unwrap();
        assert_eq!(info.band_count, 1);
        assert_eq!(info.nodata, Some(-1.0));
    }

    #[test]
    fn test_foreign_file_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("r.tif");
        fs::write(&path, b"II*\0not ours").unwrap();
        assert!(matches!(
            NativeBackend.read(&path),
            Err(RasterError::Decode { .. })
        ));
        assert!(matches!(
            NativeBackend.read(&dir.path().join("missing.tif")),
            Err(RasterError::Io { .. })
        ));
    }
}
