//! Inventory: a selection of tiles and dates with the files found for them.
//!
//! An [`Inventory`] composes the asset and product indexes for a spatial and
//! temporal selection and answers one question per (tile, date, product):
//! what is its [`Status`]? It is an immutable snapshot; after products are
//! generated, [`Inventory::refresh`] rescans with the same selectors.
//!
//! # Date semantics
//!
//! - [`DateSpec::Range`]: the inventory dates are the dates in the range
//!   (after day-of-year and weekday filtering) on which at least one selected
//!   tile has an asset or product.
//! - [`DateSpec::List`]: exactly the listed dates that pass the filters,
//!   including dates with no files at all.

mod report;
mod selector;
mod status;

pub use selector::{DateSpec, SpatialSelector, TemporalSelector, TileCoverage};
pub use status::{ProductState, SensorState, Status, UnitAssessment};

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::datasource::{DataSource, ProductName, TileId};
use crate::driver::DependencyGraph;
use crate::error::{GipsError, GipsResult};
use crate::index::{scan, AssetIndex, ProductIndex};
use crate::layout::Layout;

/// Status of one (tile, date) for a product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRow {
    pub tile: TileId,
    pub date: NaiveDate,
    pub status: Status,
}

/// Number of units in each status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub missing_no_asset: usize,
    pub missing_no_product: usize,
    pub stale: usize,
    pub current: usize,
}

impl StatusCounts {
    fn add(&mut self, status: Status) {
        match status {
            Status::MissingNoAsset => self.missing_no_asset += 1,
            Status::MissingNoProduct => self.missing_no_product += 1,
            Status::Stale => self.stale += 1,
            Status::Current => self.current += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.missing_no_asset + self.missing_no_product + self.stale + self.current
    }
}

impl fmt::Display for StatusCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} current, {} stale, {} missing, {} without assets",
            self.current, self.stale, self.missing_no_product, self.missing_no_asset
        )
    }
}

/// Snapshot of a data source's files for a tile and date selection.
#[derive(Debug, Clone)]
pub struct Inventory {
    source: Arc<DataSource>,
    layout: Arc<Layout>,
    spatial: SpatialSelector,
    temporal: TemporalSelector,
    tiles: BTreeSet<TileId>,
    dates: BTreeSet<NaiveDate>,
    assets: AssetIndex,
    products: ProductIndex,
}

impl Inventory {
    /// Scan the repository for the selected tiles and dates.
    ///
    /// # Errors
    ///
    /// - [`GipsError::InvalidRequest`] for a date range that ends before it starts
    /// - [`GipsError::RepositoryUnreadable`] if the storage root cannot be listed
    pub fn build(
        source: Arc<DataSource>,
        layout: Arc<Layout>,
        spatial: SpatialSelector,
        temporal: TemporalSelector,
    ) -> GipsResult<Self> {
        if let DateSpec::Range { start, end } = &temporal.dates {
            if start > end {
                return Err(GipsError::InvalidRequest(format!(
                    "date range starts {start} after it ends {end}"
                )));
            }
        }

        let tiles = spatial.resolve(&source.grid);
        if !source.grid.tiles.is_empty() {
            for tile in tiles.iter().filter(|t| source.grid.bounds(t).is_none()) {
                warn!(tile = %tile, datasource = %source.name, "Tile is not in the data source grid");
            }
        }

        let accept = |date: NaiveDate| temporal.accepts(date);
        let (assets, products) = scan(&layout, &tiles, &accept)?;

        let dates = match temporal.listed() {
            Some(listed) => listed,
            None => assets.dates().union(&products.dates()).copied().collect(),
        };

        info!(
            datasource = %source.name,
            tiles = tiles.len(),
            dates = dates.len(),
            assets = assets.len(),
            products = products.len(),
            "Inventory built"
        );

        Ok(Self {
            source,
            layout,
            spatial,
            temporal,
            tiles,
            dates,
            assets,
            products,
        })
    }

    /// Rescan from disk with the same selectors.
    pub fn refresh(&self) -> GipsResult<Self> {
        Self::build(
            Arc::clone(&self.source),
            Arc::clone(&self.layout),
            self.spatial.clone(),
            self.temporal.clone(),
        )
    }

    pub fn source(&self) -> &Arc<DataSource> {
        &self.source
    }

    pub fn layout(&self) -> &Arc<Layout> {
        &self.layout
    }

    pub fn spatial(&self) -> &SpatialSelector {
        &self.spatial
    }

    pub fn temporal(&self) -> &TemporalSelector {
        &self.temporal
    }

    pub fn tiles(&self) -> &BTreeSet<TileId> {
        &self.tiles
    }

    pub fn dates(&self) -> &BTreeSet<NaiveDate> {
        &self.dates
    }

    pub fn assets(&self) -> &AssetIndex {
        &self.assets
    }

    pub fn products(&self) -> &ProductIndex {
        &self.products
    }

    /// Every (tile, date) unit, tile-major.
    pub fn units(&self) -> impl Iterator<Item = (&TileId, NaiveDate)> + '_ {
        self.tiles
            .iter()
            .flat_map(move |tile| self.dates.iter().map(move |date| (tile, *date)))
    }

    /// Assess one unit for a resolved dependency closure.
    pub fn assess(&self, tile: &TileId, date: NaiveDate, graph: &DependencyGraph) -> UnitAssessment {
        UnitAssessment::evaluate(
            &self.source,
            graph,
            tile,
            date,
            self.assets.get(tile, date),
            self.products.get(tile, date),
        )
    }

    fn graph(&self, product: &ProductName) -> GipsResult<DependencyGraph> {
        DependencyGraph::resolve(&self.source, product)
    }

    /// Status of one product in one unit.
    ///
    /// # Errors
    ///
    /// Fails if the product is unknown or its dependencies form a cycle.
    pub fn status(&self, tile: &TileId, date: NaiveDate, product: &ProductName) -> GipsResult<Status> {
        let graph = self.graph(product)?;
        Ok(self
            .assess(tile, date, &graph)
            .status(product)
            .unwrap_or(Status::MissingNoAsset))
    }

    /// Status of a product in every unit, tile-major.
    pub fn classify(&self, product: &ProductName) -> GipsResult<Vec<StatusRow>> {
        let graph = self.graph(product)?;
        Ok(self
            .units()
            .map(|(tile, date)| StatusRow {
                tile: tile.clone(),
                date,
                status: self
                    .assess(tile, date, &graph)
                    .status(product)
                    .unwrap_or(Status::MissingNoAsset),
            })
            .collect())
    }

    pub fn counts(&self, product: &ProductName) -> GipsResult<StatusCounts> {
        let mut counts = StatusCounts::default();
        for row in self.classify(product)? {
            counts.add(row.status);
        }
        Ok(counts)
    }

    /// Tile × date status table of a product.
    pub fn report(&self, product: &ProductName) -> GipsResult<String> {
        let rows = self.classify(product)?;
        Ok(report::render(self, product, &rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::catalog;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"data").unwrap();
    }

    fn d(doy: u32) -> NaiveDate {
        NaiveDate::from_yo_opt(2014, doy).unwrap()
    }

    fn setup() -> (TempDir, Arc<DataSource>, Arc<Layout>) {
        let dir = TempDir::new().unwrap();
        let source = Arc::new(catalog::landsat());
        let layout = Arc::new(Layout::new(dir.path(), &source).unwrap());
        let root = layout.root().to_path_buf();
        touch(&root, "tiles/023034/2014123/LC80230342014123LGN00.tar.gz");
        touch(&root, "tiles/023035/2014124/LE70230352014124LGN00.tar.gz");
        touch(&root, "tiles/023035/2014124/2014124_LE7_ref.tif");
        (dir, source, layout)
    }

    fn tiles() -> SpatialSelector {
        SpatialSelector::tiles(["023034", "023035"].map(|t| TileId::new(t).unwrap()))
    }

    #[test]
    fn test_range_dates_come_from_disk() {
        let (_dir, source, layout) = setup();
        let inventory =
            Inventory::build(source, layout, tiles(), TemporalSelector::range(d(1), d(365))).unwrap();
        assert_eq!(inventory.dates().iter().copied().collect::<Vec<_>>(), vec![d(123), d(124)]);
        assert_eq!(inventory.units().count(), 4);
    }

    #[test]
    fn test_listed_dates_kept_without_files() {
        let (_dir, source, layout) = setup();
        let inventory =
            Inventory::build(source, layout, tiles(), TemporalSelector::dates([d(123), d(200)]))
                .unwrap();
        assert!(inventory.dates().contains(&d(200)));
        assert_eq!(inventory.assets().len(), 1);
    }

    #[test]
    fn test_status_and_counts() {
        let (_dir, source, layout) = setup();
        let inventory =
            Inventory::build(source, layout, tiles(), TemporalSelector::range(d(1), d(365))).unwrap();
        let ref_ = ProductName::new("ref").unwrap();
        let t34 = TileId::new("023034").unwrap();
        let t35 = TileId::new("023035").unwrap();

        assert_eq!(inventory.status(&t34, d(123), &ref_).unwrap(), Status::MissingNoProduct);
        assert_eq!(inventory.status(&t34, d(124), &ref_).unwrap(), Status::MissingNoAsset);
        assert_eq!(inventory.status(&t35, d(124), &ref_).unwrap(), Status::Current);

        let counts = inventory.counts(&ref_).unwrap();
        assert_eq!(counts.total(), 4);
        assert_eq!(counts.current, 1);
        assert_eq!(counts.missing_no_product, 1);
        assert_eq!(counts.missing_no_asset, 2);
    }

    #[test]
    fn test_unknown_product() {
        let (_dir, source, layout) = setup();
        let inventory =
            Inventory::build(source, layout, tiles(), TemporalSelector::range(d(1), d(365))).unwrap();
        let err = inventory.counts(&ProductName::new("lai").unwrap()).unwrap_err();
        assert!(matches!(err, GipsError::UnknownProduct { .. }));
    }

    #[test]
    fn test_reversed_range_rejected() {
        let (_dir, source, layout) = setup();
        let err = Inventory::build(source, layout, tiles(), TemporalSelector::range(d(10), d(1)))
            .unwrap_err();
        assert!(matches!(err, GipsError::InvalidRequest(_)));
    }

    #[test]
    fn test_refresh_sees_new_files() {
        let (_dir, source, layout) = setup();
        let inventory = Inventory::build(
            source,
            Arc::clone(&layout),
            tiles(),
            TemporalSelector::range(d(1), d(365)),
        )
        .unwrap();
        touch(layout.root(), "tiles/023034/2014123/2014123_LC8_ref.tif");

        let ref_ = ProductName::new("ref").unwrap();
        let t34 = TileId::new("023034").unwrap();
        assert_eq!(inventory.status(&t34, d(123), &ref_).unwrap(), Status::MissingNoProduct);
        let refreshed = inventory.refresh().unwrap();
        assert_eq!(refreshed.status(&t34, d(123), &ref_).unwrap(), Status::Current);
    }
}
