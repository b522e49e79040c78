//! Asset and product indexes built by scanning the repository.
//!
//! Both indexes are snapshots of the filesystem at scan time; nothing is
//! cached between runs. A scan walks `tiles/<tile>/*/*` for each requested
//! tile (tiles in parallel with rayon), parses every file through the
//! [`Layout`], and sorts it into the asset or product index. Files that do
//! not follow the naming convention are skipped and counted.
//!
//! ```text
//! Layout ──► scan (rayon, per tile) ──┬──► AssetIndex   (tile, date) → [Asset]
//!                                     └──► ProductIndex (tile, date) → [Product]
//! ```

mod asset;
mod product;
mod scan;

pub use asset::{Asset, AssetIndex};
pub use product::{Product, ProductIndex};
pub use scan::scan;

use chrono::NaiveDate;

/// Key of one spatio-temporal unit.
pub type UnitKey = (crate::datasource::TileId, NaiveDate);
