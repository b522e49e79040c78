//! Raw asset index.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::time::SystemTime;

use chrono::NaiveDate;

use super::UnitKey;
use crate::datasource::{AssetType, Sensor, TileId};
use crate::error::GipsResult;
use crate::layout::{AssetKey, Layout};

/// A raw input file found in the repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub key: AssetKey,
    pub path: PathBuf,
    pub modified: SystemTime,
    pub size: u64,
}

impl Asset {
    pub fn tile(&self) -> &TileId {
        &self.key.tile
    }

    pub fn date(&self) -> NaiveDate {
        self.key.date
    }

    pub fn sensor(&self) -> &Sensor {
        &self.key.sensor
    }

    pub fn asset_type(&self) -> &AssetType {
        &self.key.asset_type
    }
}

/// Assets grouped by (tile, date).
#[derive(Debug, Clone, Default)]
pub struct AssetIndex {
    entries: BTreeMap<UnitKey, Vec<Asset>>,
    skipped: usize,
}

impl AssetIndex {
    /// Scan the repository for assets of the given tiles and dates.
    pub fn scan(
        layout: &Layout,
        tiles: &BTreeSet<TileId>,
        accept: &(dyn Fn(NaiveDate) -> bool + Sync),
    ) -> GipsResult<Self> {
        super::scan(layout, tiles, accept).map(|(assets, _)| assets)
    }

    pub(crate) fn from_assets(assets: Vec<Asset>, skipped: usize) -> Self {
        let mut entries: BTreeMap<UnitKey, Vec<Asset>> = BTreeMap::new();
        for asset in assets {
            entries
                .entry((asset.key.tile.clone(), asset.key.date))
                .or_default()
                .push(asset);
        }
        for list in entries.values_mut() {
            list.sort_by(|a, b| a.key.cmp(&b.key));
        }
        Self { entries, skipped }
    }

    /// Assets of one unit; empty when none exist.
    pub fn get(&self, tile: &TileId, date: NaiveDate) -> &[Asset] {
        self.entries
            .get(&(tile.clone(), date))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// The asset of a given type and sensor, if present.
    pub fn find(
        &self,
        tile: &TileId,
        date: NaiveDate,
        sensor: &Sensor,
        asset_type: &AssetType,
    ) -> Option<&Asset> {
        self.get(tile, date)
            .iter()
            .find(|a| a.sensor() == sensor && a.asset_type() == asset_type)
    }

    /// Sensors with at least one asset in the unit.
    pub fn sensors(&self, tile: &TileId, date: NaiveDate) -> BTreeSet<&Sensor> {
        self.get(tile, date).iter().map(Asset::sensor).collect()
    }

    /// Every date with at least one asset.
    pub fn dates(&self) -> BTreeSet<NaiveDate> {
        self.entries.keys().map(|(_, d)| *d).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Asset> {
        self.entries.values().flatten()
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Files under scanned tiles that did not match the naming convention.
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}
