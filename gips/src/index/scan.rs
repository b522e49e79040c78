//! Filesystem walk shared by the asset and product indexes.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use super::{Asset, AssetIndex, Product, ProductIndex};
use crate::datasource::TileId;
use crate::error::{GipsError, GipsResult};
use crate::layout::{Layout, ParsedPath};

#[derive(Default)]
struct TileScan {
    assets: Vec<Asset>,
    products: Vec<Product>,
    skipped: usize,
}

/// Scan the repository for assets and products of the given tiles.
///
/// `accept` filters dates; files of rejected dates are ignored (not counted
/// as skipped). A missing tile directory is an empty tile. The storage root
/// itself must be readable.
pub fn scan(
    layout: &Layout,
    tiles: &BTreeSet<TileId>,
    accept: &(dyn Fn(NaiveDate) -> bool + Sync),
) -> GipsResult<(AssetIndex, ProductIndex)> {
    fs::read_dir(layout.root()).map_err(|e| GipsError::RepositoryUnreadable {
        path: layout.root().to_path_buf(),
        source: e,
    })?;

    let tiles: Vec<&TileId> = tiles.iter().collect();
    let scans: Vec<TileScan> = tiles
        .par_iter()
        .map(|tile| scan_tile(layout, tile, accept))
        .collect();

    let mut assets = Vec::new();
    let mut products = Vec::new();
    let mut skipped = 0;
    for scan in scans {
        assets.extend(scan.assets);
        products.extend(scan.products);
        skipped += scan.skipped;
    }

    info!(
        root = %layout.root().display(),
        tiles = tiles.len(),
        assets = assets.len(),
        products = products.len(),
        skipped,
        "Repository scan complete"
    );

    Ok((
        AssetIndex::from_assets(assets, skipped),
        ProductIndex::from_products(products, skipped),
    ))
}

fn scan_tile(
    layout: &Layout,
    tile: &TileId,
    accept: &(dyn Fn(NaiveDate) -> bool + Sync),
) -> TileScan {
    let mut result = TileScan::default();
    let tile_dir = layout.tile_dir(tile);
    if !tile_dir.is_dir() {
        debug!(tile = %tile, "No directory for tile");
        return result;
    }

    let Some(dir) = tile_dir.to_str() else {
        warn!(path = %tile_dir.display(), "Tile directory is not valid UTF-8");
        return result;
    };
    let pattern = format!("{}/*/*", glob::Pattern::escape(dir));
    let entries = match glob::glob(&pattern) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(pattern = %pattern, error = %e, "Invalid scan pattern");
            return result;
        }
    };

    for entry in entries {
        let path = match entry {
            Ok(path) => path,
            Err(e) => {
                warn!(error = %e, "Failed to read repository entry");
                continue;
            }
        };
        if !path.is_file() {
            continue;
        }
        classify(layout, &path, accept, &mut result);
    }
    result
}

fn classify(
    layout: &Layout,
    path: &Path,
    accept: &(dyn Fn(NaiveDate) -> bool + Sync),
    result: &mut TileScan,
) {
    let parsed = match layout.parse(path) {
        Ok(parsed) => parsed,
        Err(e) => {
            debug!(error = %e, "Skipping file");
            result.skipped += 1;
            return;
        }
    };

    let metadata = match fs::metadata(path) {
        Ok(m) => m,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to stat file");
            result.skipped += 1;
            return;
        }
    };
    let modified = match metadata.modified() {
        Ok(t) => t,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "No modification time");
            result.skipped += 1;
            return;
        }
    };

    match parsed {
        ParsedPath::Asset(key) if accept(key.date) => result.assets.push(Asset {
            key,
            path: path.to_path_buf(),
            modified,
            size: metadata.len(),
        }),
        ParsedPath::Product(key) if accept(key.date) => result.products.push(Product {
            key,
            path: path.to_path_buf(),
            modified,
            size: metadata.len(),
        }),
        _ => {}
    }
}
