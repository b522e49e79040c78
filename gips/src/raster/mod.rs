//! Raster boundary.
//!
//! Pixel-level geospatial I/O is an external concern. The engine talks to
//! rasters only through the [`RasterBackend`] trait, so a GDAL-backed
//! implementation can be swapped in without touching the planner or the
//! project assembler.
//!
//! ```text
//! ┌───────────────────┐      ┌──────────────────────┐
//! │ ProjectAssembler  │      │  product generators  │
//! └─────────┬─────────┘      └──────────┬───────────┘
//!           └──────────┬────────────────┘
//!                      ▼
//!           Arc<dyn RasterBackend>  read / write / describe / warp
//!                      │
//!                      ▼
//!               NativeBackend (bincode, single SRS)
//! ```
//!
//! [`NativeBackend`] stores [`GridRaster`]s in a compact in-crate format and
//! resamples within one spatial reference system. Warping across systems
//! fails with [`RasterError::UnsupportedReprojection`].

mod backend;
mod error;
mod grid;
mod warp;

pub use backend::{NativeBackend, RasterBackend};
pub use error::RasterError;
pub use grid::{GeoTransform, GridRaster, RasterInfo, TargetGrid};
pub use warp::{merge_into, same_srs, stack, Interpolation, ParseInterpolationError};
