//! GIPS - inventory and incremental product derivation for remote-sensing
//! raster archives.
//!
//! Raw *assets* (e.g. Landsat scene archives) are stored per tile and date
//! under a data source's repository. The engine indexes them, decides which
//! derived *products* are missing or stale, generates them on a worker pool
//! in dependency order, and assembles finished products into footprint-scoped
//! *projects*.
//!
//! ```text
//! Layout ──► AssetIndex + ProductIndex ──► Inventory ──► DependencyGraph + Plan
//!                                              ▲                 │
//!                                              │         ProcessingPool
//!                                              │                 │
//!                                              └── product files ◄┘
//!                                                        │
//!                                                 ProjectAssembler ──► project directory
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use gips::datasource::{catalog, ProductName, TileId};
//! use gips::driver::ProductDriver;
//! use gips::inventory::{Inventory, SpatialSelector, TemporalSelector};
//! use gips::layout::Layout;
//! use gips::pool::{GeneratorRegistry, ProcessingPool};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let source = Arc::new(catalog::landsat());
//! let layout = Arc::new(Layout::new("/data/gips", &source)?);
//! let start = chrono::NaiveDate::from_ymd_opt(2014, 5, 1).unwrap();
//! let end = chrono::NaiveDate::from_ymd_opt(2014, 5, 31).unwrap();
//! let inventory = Inventory::build(
//!     source,
//!     layout,
//!     SpatialSelector::tiles([TileId::new("023034")?]),
//!     TemporalSelector::range(start, end),
//! )?;
//! println!("{}", inventory.report(&ProductName::new("ndvi")?)?);
//!
//! let driver = ProductDriver::new(ProcessingPool::new(4)?, GeneratorRegistry::new());
//! let run = driver.run(&inventory, &[ProductName::new("ndvi")?], false)?;
//! println!("{}", run.summary);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod datasource;
pub mod driver;
pub mod error;
pub mod geometry;
pub mod index;
pub mod inventory;
pub mod layout;
pub mod logging;
pub mod pool;
pub mod project;
pub mod raster;

pub use error::{GipsError, GipsResult};

/// Version of the gips library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
