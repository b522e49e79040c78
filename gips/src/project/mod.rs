//! Project assembly: footprint-scoped outputs built from finished products.
//!
//! A project is a directory named after its footprint, resolution and data
//! source. Products of every contributing tile are warped to one target
//! grid and then merged, written per tile, or stacked across dates:
//!
//! ```text
//! <root>/<footprint>_<res>_<datasource>/
//!     2014123_LC8+LE7_ndvi.tif              Mode::Mosaic
//!     023034/2014123_LC8_ndvi.tif           Mode::Tiles
//!     2014123_2014139_ndvi_stack.tif        Mode::Stack
//! ```
//!
//! Missing tiles never abort assembly; they are listed in
//! [`Project::missing`], and a date with no tile at all is listed in
//! [`Project::omitted`].

mod assembler;
mod footprint;
mod priority;

pub use assembler::ProjectAssembler;
pub use footprint::Footprint;
pub use priority::TilePriority;

use std::fmt;
use std::path::PathBuf;

use chrono::NaiveDate;

use crate::datasource::{ProductName, Sensor, TileId};
use crate::raster::{Interpolation, TargetGrid};

/// How contributing tiles are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// One merged raster per date and product.
    #[default]
    Mosaic,
    /// Each tile warped on its own, no merge.
    Tiles,
    /// Per-date mosaics concatenated as bands, one raster per product.
    Stack,
}

/// What to assemble.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectRequest {
    pub footprint: Footprint,
    pub products: Vec<ProductName>,
    /// Dates to assemble; `None` takes every inventory date.
    pub dates: Option<Vec<NaiveDate>>,
    /// Pixel size (x, y); `None` uses the data source default.
    pub resolution: Option<(f64, f64)>,
    pub interpolation: Interpolation,
    pub mode: Mode,
    /// Target SRS; `None` uses the tile grid's SRS.
    pub srs: Option<String>,
}

impl ProjectRequest {
    pub fn new(footprint: Footprint, products: impl IntoIterator<Item = ProductName>) -> Self {
        Self {
            footprint,
            products: products.into_iter().collect(),
            dates: None,
            resolution: None,
            interpolation: Interpolation::default(),
            mode: Mode::default(),
            srs: None,
        }
    }

    pub fn with_dates(mut self, dates: impl IntoIterator<Item = NaiveDate>) -> Self {
        self.dates = Some(dates.into_iter().collect());
        self
    }

    pub fn with_resolution(mut self, resolution: (f64, f64)) -> Self {
        self.resolution = Some(resolution);
        self
    }

    pub fn with_interpolation(mut self, interpolation: Interpolation) -> Self {
        self.interpolation = interpolation;
        self
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_srs(mut self, srs: impl Into<String>) -> Self {
        self.srs = Some(srs.into());
        self
    }
}

/// One file written into the project directory.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectOutput {
    pub product: ProductName,
    /// Set in [`Mode::Tiles`] only.
    pub tile: Option<TileId>,
    /// One date, or every stacked date in band order.
    pub dates: Vec<NaiveDate>,
    /// Sensors of the contributing files, sorted.
    pub sensors: Vec<Sensor>,
    pub path: PathBuf,
}

/// A tile without a usable product file for a date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingTile {
    pub tile: TileId,
    pub date: NaiveDate,
    pub product: ProductName,
}

/// Why a date was left out of a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OmissionReason {
    AllTilesMissingForDate,
}

impl fmt::Display for OmissionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OmissionReason::AllTilesMissingForDate => write!(f, "all tiles missing for date"),
        }
    }
}

/// A date left out of a project for one product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OmittedDate {
    pub date: NaiveDate,
    pub product: ProductName,
    pub reason: OmissionReason,
}

impl fmt::Display for OmittedDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}: {}",
            crate::layout::format_date(self.date),
            self.product,
            self.reason
        )
    }
}

/// Result of assembling a project.
#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    pub directory: PathBuf,
    /// Grid shared by mosaic and stack outputs.
    pub grid: TargetGrid,
    pub outputs: Vec<ProjectOutput>,
    pub missing: Vec<MissingTile>,
    pub omitted: Vec<OmittedDate>,
}

impl Project {
    /// Outputs of one product.
    pub fn outputs_for<'a>(
        &'a self,
        product: &'a ProductName,
    ) -> impl Iterator<Item = &'a ProjectOutput> + 'a {
        self.outputs.iter().filter(move |o| &o.product == product)
    }
}

/// Directory name `<footprint>_<resolution>_<datasource>`.
///
/// Square pixels print one number, others print `<x>x<y>`.
pub fn directory_name(footprint: &str, resolution: (f64, f64), datasource: &str) -> String {
    let (x, y) = resolution;
    if x == y {
        format!("{footprint}_{x}_{datasource}")
    } else {
        format!("{footprint}_{x}x{y}_{datasource}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_name() {
        assert_eq!(directory_name("023034", (30.0, 30.0), "landsat"), "023034_30_landsat");
        assert_eq!(directory_name("field", (0.5, 1.0), "landsat"), "field_0.5x1_landsat");
    }

    #[test]
    fn test_omitted_display() {
        let omitted = OmittedDate {
            date: NaiveDate::from_yo_opt(2014, 139).unwrap(),
            product: ProductName::new("ndvi").unwrap(),
            reason: OmissionReason::AllTilesMissingForDate,
        };
        assert_eq!(omitted.to_string(), "2014139 ndvi: all tiles missing for date");
    }
}
