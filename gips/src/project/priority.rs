//! Tile priority when mosaicking overlapping tiles.

use std::cmp::Ordering;

use crate::datasource::TileId;

/// Order in which tiles are merged into a mosaic; tiles merged later
/// overwrite earlier ones wherever they have data.
///
/// Ties are always broken by tile id, ascending.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TilePriority {
    /// Ascending tile id: the highest id wins overlaps.
    #[default]
    TileId,
    /// Explicit ranking, most preferred first. Listed tiles win over
    /// unlisted ones.
    Ranked(Vec<TileId>),
    /// Tiles covering more of the footprint win.
    Coverage,
}

impl TilePriority {
    /// Sort tiles into merge order. `coverage` gives the footprint area a
    /// tile covers.
    pub fn merge_order(
        &self,
        tiles: impl IntoIterator<Item = TileId>,
        coverage: impl Fn(&TileId) -> f64,
    ) -> Vec<TileId> {
        let mut tiles: Vec<TileId> = tiles.into_iter().collect();
        tiles.sort();
        match self {
            TilePriority::TileId => {}
            TilePriority::Ranked(ranking) => {
                // Unlisted tiles first; then from least to most preferred.
                tiles.sort_by_key(|tile| {
                    ranking
                        .iter()
                        .position(|t| t == tile)
                        .map_or(0, |i| ranking.len() - i)
                });
            }
            TilePriority::Coverage => {
                tiles.sort_by(|a, b| {
                    coverage(a)
                        .partial_cmp(&coverage(b))
                        .unwrap_or(Ordering::Equal)
                        .then_with(|| a.cmp(b))
                });
            }
        }
        tiles
    }
}
