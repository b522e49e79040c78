//! Spatial footprint of a project.

use std::collections::{BTreeMap, BTreeSet};

use crate::datasource::{TileGrid, TileId};
use crate::error::{GipsError, GipsResult};
use crate::geometry::{BBox, Geometry};

/// The area a project covers.
#[derive(Debug, Clone, PartialEq)]
pub enum Footprint {
    /// A single grid tile, named after the tile.
    Tile(TileId),
    /// Arbitrary geometry; the grid tiles it overlaps contribute.
    Shape { id: String, geometry: Geometry },
    /// An explicit set of grid tiles.
    Tiles { id: String, tiles: BTreeSet<TileId> },
}

impl Footprint {
    /// Identifier used in the project directory name.
    pub fn id(&self) -> &str {
        match self {
            Footprint::Tile(tile) => tile.as_str(),
            Footprint::Shape { id, .. } | Footprint::Tiles { id, .. } => id,
        }
    }

    /// Contributing tiles with their bounds.
    ///
    /// # Errors
    ///
    /// [`GipsError::UnknownTile`] if a named tile has no bounds in the grid.
    pub fn tiles(&self, grid: &TileGrid) -> GipsResult<BTreeMap<TileId, BBox>> {
        match self {
            Footprint::Tile(tile) => named_tiles(grid, [tile]),
            Footprint::Tiles { tiles, .. } => named_tiles(grid, tiles),
            Footprint::Shape { geometry, .. } => Ok(grid
                .tiles
                .iter()
                .filter(|(_, bounds)| geometry.overlaps(bounds))
                .map(|(tile, bounds)| (tile.clone(), *bounds))
                .collect()),
        }
    }

    /// Target extent: the shape's bounding box, or the union of tile bounds.
    pub fn extent(&self, tiles: &BTreeMap<TileId, BBox>) -> Option<BBox> {
        match self {
            Footprint::Shape { geometry, .. } => geometry.bbox(),
            _ => tiles.values().copied().reduce(|a, b| a.union(&b)),
        }
    }

    /// Footprint area covered by a tile.
    pub fn coverage(&self, bounds: &BBox) -> f64 {
        match self {
            Footprint::Shape { geometry, .. } => geometry.intersection_area(bounds),
            _ => bounds.area(),
        }
    }
}

fn named_tiles<'a>(
    grid: &TileGrid,
    tiles: impl IntoIterator<Item = &'a TileId>,
) -> GipsResult<BTreeMap<TileId, BBox>> {
    tiles
        .into_iter()
        .map(|tile| {
            grid.bounds(tile)
                .map(|bounds| (tile.clone(), *bounds))
                .ok_or_else(|| GipsError::UnknownTile(tile.clone()))
        })
        .collect()
}
