//! In-memory raster grids.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::RasterError;
use crate::geometry::BBox;

/// North-up affine transform: upper-left corner plus pixel size.
///
/// Rows run south, so the y coordinate of row `r` is
/// `origin_y - r * pixel_height`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub origin_x: f64,
    pub origin_y: f64,
    pub pixel_width: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    /// World coordinates of a pixel center.
    pub fn pixel_center(&self, col: usize, row: usize) -> (f64, f64) {
        (
            self.origin_x + (col as f64 + 0.5) * self.pixel_width,
            self.origin_y - (row as f64 + 0.5) * self.pixel_height,
        )
    }

    /// Fractional pixel coordinates of a world point, relative to pixel
    /// centers (so the center of pixel (0, 0) maps to (0.0, 0.0)).
    pub fn to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (x - self.origin_x) / self.pixel_width - 0.5,
            (self.origin_y - y) / self.pixel_height - 0.5,
        )
    }
}

/// Shape and placement of a raster, without pixel data.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetGrid {
    pub srs: String,
    pub transform: GeoTransform,
    pub width: usize,
    pub height: usize,
}

impl TargetGrid {
    /// Grid covering `extent` at `resolution` (x, y), rounding the pixel
    /// count up so the whole extent is covered.
    pub fn from_extent(
        srs: impl Into<String>,
        extent: &BBox,
        resolution: (f64, f64),
    ) -> Result<Self, RasterError> {
        let (res_x, res_y) = resolution;
        if !(res_x > 0.0 && res_y > 0.0) {
            return Err(RasterError::InvalidGrid(format!(
                "resolution must be positive, got {res_x}x{res_y}"
            )));
        }
        if extent.width() <= 0.0 || extent.height() <= 0.0 {
            return Err(RasterError::InvalidGrid("extent has no area".to_string()));
        }

        // Absorb floating point noise such as 0.3 / 0.1 = 2.9999999999999996.
        let width = (extent.width() / res_x - 1e-9).ceil().max(1.0) as usize;
        let height = (extent.height() / res_y - 1e-9).ceil().max(1.0) as usize;

        Ok(Self {
            srs: srs.into(),
            transform: GeoTransform {
                origin_x: extent.min_x,
                origin_y: extent.max_y,
                pixel_width: res_x,
                pixel_height: res_y,
            },
            width,
            height,
        })
    }

    /// World extent of the grid.
    pub fn bbox(&self) -> BBox {
        let t = &self.transform;
        BBox::new(
            t.origin_x,
            t.origin_y - self.height as f64 * t.pixel_height,
            t.origin_x + self.width as f64 * t.pixel_width,
            t.origin_y,
        )
    }

    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }
}

/// A georeferenced multi-band raster held in memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridRaster {
    pub width: usize,
    pub height: usize,
    pub transform: GeoTransform,
    pub srs: String,
    /// Value marking missing pixels; NaN is always treated as missing.
    pub nodata: Option<f32>,
    /// Row-major pixel values, one vector per band.
    pub bands: Vec<Vec<f32>>,
    /// Per-band description, parallel to `bands`.
    pub band_descriptions: Vec<String>,
    pub metadata: BTreeMap<String, String>,
}

impl GridRaster {
    /// A raster on `grid` with every pixel missing.
    pub fn filled(grid: &TargetGrid, band_count: usize, nodata: Option<f32>) -> Self {
        let fill = nodata.unwrap_or(f32::NAN);
        Self {
            width: grid.width,
            height: grid.height,
            transform: grid.transform,
            srs: grid.srs.clone(),
            nodata,
            bands: vec![vec![fill; grid.pixel_count()]; band_count],
            band_descriptions: vec![String::new(); band_count],
            metadata: BTreeMap::new(),
        }
    }

    /// A raster on `grid` with the given band data.
    pub fn from_bands(
        grid: &TargetGrid,
        bands: Vec<Vec<f32>>,
        nodata: Option<f32>,
    ) -> Result<Self, RasterError> {
        if let Some(band) = bands.iter().find(|b| b.len() != grid.pixel_count()) {
            return Err(RasterError::ShapeMismatch(format!(
                "band has {} values, grid has {}x{}",
                band.len(),
                grid.width,
                grid.height
            )));
        }
        let count = bands.len();
        Ok(Self {
            width: grid.width,
            height: grid.height,
            transform: grid.transform,
            srs: grid.srs.clone(),
            nodata,
            bands,
            band_descriptions: vec![String::new(); count],
            metadata: BTreeMap::new(),
        })
    }

    pub fn grid(&self) -> TargetGrid {
        TargetGrid {
            srs: self.srs.clone(),
            transform: self.transform,
            width: self.width,
            height: self.height,
        }
    }

    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    pub fn value(&self, band: usize, col: usize, row: usize) -> f32 {
        self.bands[band][row * self.width + col]
    }

    pub fn set(&mut self, band: usize, col: usize, row: usize, value: f32) {
        self.bands[band][row * self.width + col] = value;
    }

    /// True when `value` marks a missing pixel.
    pub fn is_nodata(&self, value: f32) -> bool {
        value.is_nan() || self.nodata == Some(value)
    }

    /// Number of non-missing pixels in a band.
    pub fn data_count(&self, band: usize) -> usize {
        self.bands[band].iter().filter(|v| !self.is_nodata(**v)).count()
    }

    pub fn info(&self) -> RasterInfo {
        RasterInfo {
            width: self.width,
            height: self.height,
            band_count: self.bands.len(),
            srs: self.srs.clone(),
            transform: self.transform,
            nodata: self.nodata,
            band_descriptions: self.band_descriptions.clone(),
        }
    }
}

/// Raster properties without pixel data.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterInfo {
    pub width: usize,
    pub height: usize,
    pub band_count: usize,
    pub srs: String,
    pub transform: GeoTransform,
    pub nodata: Option<f32>,
    pub band_descriptions: Vec<String>,
}
