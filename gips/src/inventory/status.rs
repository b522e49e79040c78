//! Per-unit product status.
//!
//! A unit (tile, date) is assessed for a whole dependency closure at once,
//! prerequisites first, so every product can reuse the results of the
//! products it depends on:
//!
//! - `newest_input(P, s)`: newest mtime among the sensor-`s` assets `P`
//!   requires, the sensor-`s` files of the products it requires, and
//!   recursively their inputs.
//! - `producible(P, s)`: every required asset of sensor `s` is present and
//!   every required product is current or producible with `s`.
//! - `current(P, s)`: the sensor-`s` file exists, is complete, and is not
//!   older than `newest_input(P, s)`.

use std::collections::BTreeMap;
use std::fmt;
use std::time::SystemTime;

use chrono::NaiveDate;

use crate::datasource::{DataSource, ProductName, Requirement, Sensor, TileId};
use crate::driver::DependencyGraph;
use crate::index::{Asset, Product};

/// Classification of one (tile, date, product).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Status {
    /// No file, and no supported sensor has the inputs to make one.
    MissingNoAsset,
    /// No file, but at least one sensor can produce it.
    MissingNoProduct,
    /// A file exists but is incomplete or older than its inputs.
    Stale,
    /// A file exists and is up to date.
    Current,
}

impl Status {
    /// Whether a run would (re)generate the product.
    pub fn needs_generation(self) -> bool {
        matches!(self, Status::MissingNoProduct | Status::Stale)
    }

    /// Single-character code used by inventory reports.
    pub fn code(self) -> char {
        match self {
            Status::MissingNoAsset => '-',
            Status::MissingNoProduct => 'm',
            Status::Stale => 's',
            Status::Current => 'C',
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Status::MissingNoAsset => "missing (no asset)",
            Status::MissingNoProduct => "missing",
            Status::Stale => "stale",
            Status::Current => "current",
        };
        f.write_str(label)
    }
}

/// State of one product for one sensor.
#[derive(Debug, Clone)]
pub struct SensorState {
    pub sensor: Sensor,
    /// The product file made with this sensor, if any.
    pub existing: Option<Product>,
    pub newest_input: Option<SystemTime>,
    pub producible: bool,
    pub current: bool,
}

/// State of one product across its supported sensors.
#[derive(Debug, Clone)]
pub struct ProductState {
    pub product: ProductName,
    pub status: Status,
    /// Sensors in preference order.
    pub sensors: Vec<SensorState>,
}

impl ProductState {
    pub fn sensor(&self, sensor: &Sensor) -> Option<&SensorState> {
        self.sensors.iter().find(|s| &s.sensor == sensor)
    }

    /// The file that determines the status: the most preferred current
    /// file, else the most preferred existing one.
    pub fn file(&self) -> Option<&Product> {
        self.sensors
            .iter()
            .find(|s| s.current)
            .or_else(|| self.sensors.iter().find(|s| s.existing.is_some()))
            .and_then(|s| s.existing.as_ref())
    }
}

/// Assessment of a dependency closure within one unit.
#[derive(Debug, Clone)]
pub struct UnitAssessment {
    pub tile: TileId,
    pub date: NaiveDate,
    states: BTreeMap<ProductName, ProductState>,
}

impl UnitAssessment {
    /// Assess every product of `graph` from the unit's files.
    ///
    /// Product files of sensors a product does not list are ignored.
    pub fn evaluate(
        source: &DataSource,
        graph: &DependencyGraph,
        tile: &TileId,
        date: NaiveDate,
        assets: &[Asset],
        products: &[Product],
    ) -> Self {
        let mut states: BTreeMap<ProductName, ProductState> = BTreeMap::new();

        for name in graph.order() {
            let Some(spec) = source.product(name) else {
                continue;
            };

            let sensors: Vec<SensorState> = spec
                .sensors
                .iter()
                .map(|sensor| {
                    let existing = products
                        .iter()
                        .find(|p| p.product() == name && p.sensor() == sensor)
                        .cloned();

                    let mut newest_input: Option<SystemTime> = None;
                    let mut producible = true;
                    for requirement in &spec.requires {
                        match requirement {
                            Requirement::Asset(asset_type) => {
                                match assets
                                    .iter()
                                    .find(|a| a.sensor() == sensor && a.asset_type() == asset_type)
                                {
                                    Some(asset) => {
                                        newest_input = newest_input.max(Some(asset.modified));
                                    }
                                    None => producible = false,
                                }
                            }
                            Requirement::Product(dependency) => {
                                let dep = states.get(dependency).and_then(|s| s.sensor(sensor));
                                match dep {
                                    Some(dep) => {
                                        newest_input = newest_input
                                            .max(dep.existing.as_ref().map(|p| p.modified))
                                            .max(dep.newest_input);
                                        producible &= dep.current || dep.producible;
                                    }
                                    None => producible = false,
                                }
                            }
                        }
                    }

                    let current = existing.as_ref().is_some_and(|file| {
                        file.is_complete() && newest_input.map_or(true, |t| file.modified >= t)
                    });

                    SensorState {
                        sensor: sensor.clone(),
                        existing,
                        newest_input,
                        producible,
                        current,
                    }
                })
                .collect();

            let status = if sensors.iter().any(|s| s.current) {
                Status::Current
            } else if sensors.iter().any(|s| s.existing.is_some()) {
                Status::Stale
            } else if sensors.iter().any(|s| s.producible) {
                Status::MissingNoProduct
            } else {
                Status::MissingNoAsset
            };

            states.insert(
                name.clone(),
                ProductState {
                    product: name.clone(),
                    status,
                    sensors,
                },
            );
        }

        Self {
            tile: tile.clone(),
            date,
            states,
        }
    }

    pub fn get(&self, product: &ProductName) -> Option<&ProductState> {
        self.states.get(product)
    }

    pub fn status(&self, product: &ProductName) -> Option<Status> {
        self.get(product).map(|s| s.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::{catalog, AssetType};
    use crate::layout::{AssetKey, ProductKey};
    use std::path::PathBuf;
    use std::time::Duration;

    fn t(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
    }

    fn tile() -> TileId {
        TileId::new("023034").unwrap()
    }

    fn date() -> NaiveDate {
        NaiveDate::from_yo_opt(2014, 123).unwrap()
    }

    fn asset(sensor: &str, modified: u64) -> Asset {
        Asset {
            key: AssetKey {
                tile: tile(),
                date: date(),
                sensor: Sensor::new(sensor).unwrap(),
                asset_type: AssetType::new("").unwrap(),
            },
            path: PathBuf::from(format!("{sensor}.tar.gz")),
            modified: t(modified),
            size: 10,
        }
    }

    fn product(name: &str, sensor: &str, modified: u64, size: u64) -> Product {
        Product {
            key: ProductKey {
                tile: tile(),
                date: date(),
                sensor: Sensor::new(sensor).unwrap(),
                product: ProductName::new(name).unwrap(),
            },
            path: PathBuf::from(format!("{name}_{sensor}.tif")),
            modified: t(modified),
            size,
        }
    }

    fn assess(assets: &[Asset], products: &[Product]) -> UnitAssessment {
        let source = catalog::landsat();
        let graph =
            DependencyGraph::resolve(&source, &ProductName::new("ndvi").unwrap()).unwrap();
        UnitAssessment::evaluate(&source, &graph, &tile(), date(), assets, products)
    }

    fn status(unit: &UnitAssessment, name: &str) -> Status {
        unit.status(&ProductName::new(name).unwrap()).unwrap()
    }

    #[test]
    fn test_no_files() {
        let unit = assess(&[], &[]);
        assert_eq!(status(&unit, "ndvi"), Status::MissingNoAsset);
        assert_eq!(status(&unit, "ref"), Status::MissingNoAsset);
    }

    #[test]
    fn test_asset_makes_products_producible() {
        let unit = assess(&[asset("LE7", 10)], &[]);
        assert_eq!(status(&unit, "ref"), Status::MissingNoProduct);
        assert_eq!(status(&unit, "ndvi"), Status::MissingNoProduct);
        let ndvi = unit.get(&ProductName::new("ndvi").unwrap()).unwrap();
        assert!(!ndvi.sensor(&Sensor::new("LC8").unwrap()).unwrap().producible);
        assert!(ndvi.sensor(&Sensor::new("LE7").unwrap()).unwrap().producible);
    }

    #[test]
    fn test_current_chain() {
        let unit = assess(
            &[asset("LC8", 10)],
            &[product("ref", "LC8", 20, 5), product("ndvi", "LC8", 30, 5)],
        );
        assert_eq!(status(&unit, "ref"), Status::Current);
        assert_eq!(status(&unit, "ndvi"), Status::Current);
    }

    #[test]
    fn test_newer_asset_makes_chain_stale() {
        let unit = assess(
            &[asset("LC8", 40)],
            &[product("ref", "LC8", 20, 5), product("ndvi", "LC8", 30, 5)],
        );
        assert_eq!(status(&unit, "ref"), Status::Stale);
        assert_eq!(status(&unit, "ndvi"), Status::Stale);
    }

    #[test]
    fn test_newer_dependency_makes_product_stale() {
        let unit = assess(
            &[asset("LC8", 10)],
            &[product("ref", "LC8", 50, 5), product("ndvi", "LC8", 30, 5)],
        );
        assert_eq!(status(&unit, "ref"), Status::Current);
        assert_eq!(status(&unit, "ndvi"), Status::Stale);
    }

    #[test]
    fn test_equal_mtime_is_current() {
        let unit = assess(&[asset("LC8", 10)], &[product("ref", "LC8", 10, 5)]);
        assert_eq!(status(&unit, "ref"), Status::Current);
    }

    #[test]
    fn test_incomplete_file_is_stale() {
        let unit = assess(&[asset("LC8", 10)], &[product("ref", "LC8", 20, 0)]);
        assert_eq!(status(&unit, "ref"), Status::Stale);
        assert!(unit.get(&ProductName::new("ref").unwrap()).unwrap().file().is_some());
    }

    #[test]
    fn test_any_current_sensor_is_current() {
        // A stale LC8 file does not hide a current LE7 file.
        let unit = assess(
            &[asset("LC8", 40), asset("LE7", 10)],
            &[product("ref", "LC8", 20, 5), product("ref", "LE7", 20, 5)],
        );
        let state = unit.get(&ProductName::new("ref").unwrap()).unwrap();
        assert_eq!(state.status, Status::Current);
        assert_eq!(state.file().unwrap().sensor().as_str(), "LE7");
    }

    #[test]
    fn test_product_without_asset_stays_usable() {
        let unit = assess(&[], &[product("ref", "LC8", 20, 5)]);
        let state = unit.get(&ProductName::new("ref").unwrap()).unwrap();
        // The file has no inputs on disk to compare against, so it stays current.
        assert_eq!(state.status, Status::Current);
        assert!(!state.sensors.iter().any(|s| s.producible));
        // ndvi can be made from the current ref.
        assert_eq!(status(&unit, "ndvi"), Status::MissingNoProduct);
    }
}
