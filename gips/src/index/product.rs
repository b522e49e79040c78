//! Derived product index.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::time::SystemTime;

use chrono::NaiveDate;

use super::UnitKey;
use crate::datasource::{ProductName, Sensor, TileId};
use crate::error::GipsResult;
use crate::layout::{Layout, ProductKey};

/// A derived product file found in the repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    pub key: ProductKey,
    pub path: PathBuf,
    pub modified: SystemTime,
    pub size: u64,
}

impl Product {
    pub fn tile(&self) -> &TileId {
        &self.key.tile
    }

    pub fn date(&self) -> NaiveDate {
        self.key.date
    }

    pub fn sensor(&self) -> &Sensor {
        &self.key.sensor
    }

    pub fn product(&self) -> &ProductName {
        &self.key.product
    }

    /// A zero-length file is an interrupted write and never trusted.
    pub fn is_complete(&self) -> bool {
        self.size > 0
    }
}

/// Products grouped by (tile, date).
#[derive(Debug, Clone, Default)]
pub struct ProductIndex {
    entries: BTreeMap<UnitKey, Vec<Product>>,
    skipped: usize,
}

impl ProductIndex {
    /// Scan the repository for products of the given tiles and dates.
    pub fn scan(
        layout: &Layout,
        tiles: &BTreeSet<TileId>,
        accept: &(dyn Fn(NaiveDate) -> bool + Sync),
    ) -> GipsResult<Self> {
        super::scan(layout, tiles, accept).map(|(_, products)| products)
    }

    pub(crate) fn from_products(products: Vec<Product>, skipped: usize) -> Self {
        let mut entries: BTreeMap<UnitKey, Vec<Product>> = BTreeMap::new();
        for product in products {
            entries
                .entry((product.key.tile.clone(), product.key.date))
                .or_default()
                .push(product);
        }
        for list in entries.values_mut() {
            list.sort_by(|a, b| a.key.cmp(&b.key));
        }
        Self { entries, skipped }
    }

    /// All products of one unit; empty when none exist.
    pub fn get(&self, tile: &TileId, date: NaiveDate) -> &[Product] {
        self.entries
            .get(&(tile.clone(), date))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// The product file for one sensor, if present.
    pub fn find(
        &self,
        tile: &TileId,
        date: NaiveDate,
        product: &ProductName,
        sensor: &Sensor,
    ) -> Option<&Product> {
        self.get(tile, date)
            .iter()
            .find(|p| p.product() == product && p.sensor() == sensor)
    }

    /// Files of one product in a unit, across sensors.
    pub fn versions(&self, tile: &TileId, date: NaiveDate, product: &ProductName) -> Vec<&Product> {
        self.get(tile, date)
            .iter()
            .filter(|p| p.product() == product)
            .collect()
    }

    /// The file of one product in the most preferred sensor present.
    pub fn preferred(
        &self,
        tile: &TileId,
        date: NaiveDate,
        product: &ProductName,
        preference: &[Sensor],
    ) -> Option<&Product> {
        preference
            .iter()
            .find_map(|sensor| self.find(tile, date, product, sensor))
            .or_else(|| self.versions(tile, date, product).into_iter().next())
    }

    /// The most recently written file of one product in a unit.
    pub fn newest(&self, tile: &TileId, date: NaiveDate, product: &ProductName) -> Option<&Product> {
        self.versions(tile, date, product)
            .into_iter()
            .max_by_key(|p| p.modified)
    }

    /// Every date with at least one product.
    pub fn dates(&self) -> BTreeSet<NaiveDate> {
        self.entries.keys().map(|(_, d)| *d).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Product> {
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

#[cfg(test)]
mod tests {
    use super::*;

    fn product(name: &str, sensor: &str, size: u64) -> Product {
        Product {
            key: ProductKey {
                tile: TileId::new("T1").unwrap(),
                date: NaiveDate::from_yo_opt(2014, 5).unwrap(),
                sensor: Sensor::new(sensor).unwrap(),
                product: ProductName::new(name).unwrap(),
            },
            path: PathBuf::from(format!("{name}-{sensor}")),
            modified: SystemTime::UNIX_EPOCH,
            size,
        }
    }

    #[test]
    fn test_preferred_sensor() {
        let index = ProductIndex::from_products(
            vec![product("ndvi", "LE7", 4), product("ndvi", "LC8", 4), product("ref", "LE7", 4)],
            0,
        );
        let tile = TileId::new("T1").unwrap();
        let date = NaiveDate::from_yo_opt(2014, 5).unwrap();
        let ndvi = ProductName::new("ndvi").unwrap();
        let prefs = [Sensor::new("LE7").unwrap(), Sensor::new("LC8").unwrap()];

        assert_eq!(index.versions(&tile, date, &ndvi).len(), 2);
        assert_eq!(
            index.preferred(&tile, date, &ndvi, &prefs).unwrap().sensor().as_str(),
            "LE7"
        );
        // Falls back to any version when no preferred sensor matches.
        let other = [Sensor::new("LT5").unwrap()];
        assert!(index.preferred(&tile, date, &ndvi, &other).is_some());
    }

    #[test]
    fn test_newest_version() {
        let mut older = product("ndvi", "LE7", 4);
        older.modified = SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(10);
        let mut newer = product("ndvi", "LC8", 4);
        newer.modified = SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(20);
        let index = ProductIndex::from_products(vec![older, newer], 0);

        let tile = TileId::new("T1").unwrap();
        let date = NaiveDate::from_yo_opt(2014, 5).unwrap();
        let newest = index.newest(&tile, date, &ProductName::new("ndvi").unwrap());
        assert_eq!(newest.unwrap().sensor().as_str(), "LC8");
        assert!(index.newest(&tile, date, &ProductName::new("evi").unwrap()).is_none());
    }

    #[test]
    fn test_incomplete_product() {
        assert!(!product("ndvi", "LC8", 0).is_complete());
        assert!(product("ndvi", "LC8", 1).is_complete());
    }
}
