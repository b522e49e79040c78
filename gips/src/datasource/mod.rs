//! Data source definitions and the process-wide registry.
//!
//! A [`DataSource`] is the declarative description of one provider: its tile
//! grid, sensors, raw asset naming and the product table. Product
//! dependencies and sensor fallback are data, not code; the planner reads
//! them from [`ProductSpec`] and never special-cases a source.
//!
//! Data sources are immutable once built. They are shared as
//! `Arc<DataSource>` and collected into a [`Registry`], which can be
//! installed once as global state with [`Registry::install`].
//!
//! # Example
//!
//! ```
//! use gips::datasource::{catalog, ProductName};
//!
//! let landsat = catalog::landsat();
//! let ndvi = landsat.product(&ProductName::new("ndvi").unwrap()).unwrap();
//! assert_eq!(ndvi.sensors[0].as_str(), "LC8");
//! ```

pub mod catalog;
mod ids;
mod registry;

pub use ids::{AssetType, InvalidId, ProductName, Sensor, TileId};
pub use registry::{Registry, RegistryError};

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geometry::BBox;

/// Errors raised while building or loading a data source definition.
#[derive(Debug, Error)]
pub enum DataSourceError {
    /// The definition file could not be read.
    #[error("failed to read data source definition {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The definition is not valid JSON for the schema.
    #[error("failed to parse data source definition: {0}")]
    Parse(#[from] serde_json::Error),

    /// A product requires an asset type the source does not declare.
    #[error("product '{product}' requires unknown asset type '{asset_type}'")]
    UnknownAssetType {
        product: ProductName,
        asset_type: AssetType,
    },

    /// A product requires a product the source does not declare.
    #[error("product '{product}' requires unknown product '{dependency}'")]
    UnknownDependency {
        product: ProductName,
        dependency: ProductName,
    },

    /// A product lists a sensor the source does not declare.
    #[error("product '{product}' lists unknown sensor '{sensor}'")]
    UnknownSensor { product: ProductName, sensor: Sensor },

    /// A product has no sensors to produce it with.
    #[error("product '{0}' has no supported sensors")]
    NoSensors(ProductName),

    /// Two asset specs share an asset type.
    #[error("asset type '{0}' declared more than once")]
    DuplicateAssetType(AssetType),
}

/// The spatial grid of a data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileGrid {
    /// Spatial reference of tile bounds and product rasters (e.g. `EPSG:4326`).
    pub srs: String,

    /// Regex fragment matching one tile id inside an asset filename.
    #[serde(default = "default_tile_pattern")]
    pub tile_pattern: String,

    /// Tile id to bounding box.
    pub tiles: BTreeMap<TileId, BBox>,
}

fn default_tile_pattern() -> String {
    r"[A-Za-z0-9-]+?".to_string()
}

impl TileGrid {
    /// Create a grid with the default tile pattern.
    pub fn new(srs: impl Into<String>, tiles: BTreeMap<TileId, BBox>) -> Self {
        Self {
            srs: srs.into(),
            tile_pattern: default_tile_pattern(),
            tiles,
        }
    }

    /// Replace the tile-id regex fragment.
    pub fn with_tile_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.tile_pattern = pattern.into();
        self
    }

    /// Bounds of a tile, if the grid knows it.
    pub fn bounds(&self, tile: &TileId) -> Option<&BBox> {
        self.tiles.get(tile)
    }
}

/// One raw asset type of a data source and its file naming template.
///
/// The template may use `{sensor}`, `{tile}` and `{date}` (rendered as
/// `YYYYDDD`) placeholders and a single `*`, which matches any run of
/// letters and digits on parse and is rendered as `fill` on format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetSpec {
    pub asset_type: AssetType,
    pub template: String,
    #[serde(default)]
    pub fill: String,
    #[serde(default)]
    pub description: String,
}

/// Something a product needs as input.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Requirement {
    /// A raw asset of the given type, from the same sensor.
    Asset(AssetType),
    /// Another derived product, from the same sensor.
    Product(ProductName),
}

/// Declarative description of one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSpec {
    #[serde(default)]
    pub description: String,

    /// Inputs, shared by every supported sensor.
    pub requires: Vec<Requirement>,

    /// Sensors able to produce the product, most preferred first.
    pub sensors: Vec<Sensor>,

    /// Optional display group (e.g. `Standard`, `Index`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

impl ProductSpec {
    /// Product dependencies, in declaration order.
    pub fn product_requirements(&self) -> impl Iterator<Item = &ProductName> {
        self.requires.iter().filter_map(|r| match r {
            Requirement::Product(p) => Some(p),
            Requirement::Asset(_) => None,
        })
    }

    /// Asset dependencies, in declaration order.
    pub fn asset_requirements(&self) -> impl Iterator<Item = &AssetType> {
        self.requires.iter().filter_map(|r| match r {
            Requirement::Asset(a) => Some(a),
            Requirement::Product(_) => None,
        })
    }
}

/// A named provider: tile grid, sensors, assets and product table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSource {
    pub name: String,

    #[serde(default)]
    pub description: String,

    pub grid: TileGrid,

    /// Sensor id to human-readable description.
    pub sensors: BTreeMap<Sensor, String>,

    pub assets: Vec<AssetSpec>,

    pub products: BTreeMap<ProductName, ProductSpec>,

    /// Pixel size (x, y) used by projects that do not request one.
    pub default_resolution: (f64, f64),
}

impl DataSource {
    /// Parse and validate a JSON definition.
    pub fn from_json_str(json: &str) -> Result<Self, DataSourceError> {
        let source: DataSource = serde_json::from_str(json)?;
        source.validate()?;
        Ok(source)
    }

    /// Read, parse and validate a JSON definition file.
    pub fn from_json_file(path: &Path) -> Result<Self, DataSourceError> {
        let json = std::fs::read_to_string(path).map_err(|e| DataSourceError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_json_str(&json)
    }

    /// Check cross references inside the definition.
    ///
    /// Dependency cycles are not rejected here; they surface as
    /// [`crate::GipsError::CyclicDependency`] when a product is planned.
    pub fn validate(&self) -> Result<(), DataSourceError> {
        let mut asset_types = BTreeSet::new();
        for spec in &self.assets {
            if !asset_types.insert(&spec.asset_type) {
                return Err(DataSourceError::DuplicateAssetType(spec.asset_type.clone()));
            }
        }

        for (name, spec) in &self.products {
            if spec.sensors.is_empty() {
                return Err(DataSourceError::NoSensors(name.clone()));
            }
            if let Some(sensor) = spec.sensors.iter().find(|s| !self.sensors.contains_key(s)) {
                return Err(DataSourceError::UnknownSensor {
                    product: name.clone(),
                    sensor: sensor.clone(),
                });
            }
            for requirement in &spec.requires {
                match requirement {
                    Requirement::Asset(a) if !asset_types.contains(a) => {
                        return Err(DataSourceError::UnknownAssetType {
                            product: name.clone(),
                            asset_type: a.clone(),
                        });
                    }
                    Requirement::Product(p) if !self.products.contains_key(p) => {
                        return Err(DataSourceError::UnknownDependency {
                            product: name.clone(),
                            dependency: p.clone(),
                        });
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }

    pub fn product(&self, name: &ProductName) -> Option<&ProductSpec> {
        self.products.get(name)
    }

    pub fn asset_spec(&self, asset_type: &AssetType) -> Option<&AssetSpec> {
        self.assets.iter().find(|a| &a.asset_type == asset_type)
    }

    /// Products belonging to a display group, in name order.
    pub fn products_in_group(&self, group: &str) -> Vec<&ProductName> {
        self.products
            .iter()
            .filter(|(_, spec)| spec.group.as_deref() == Some(group))
            .map(|(name, _)| name)
            .collect()
    }

    /// All tile ids of the grid, ascending.
    pub fn tile_ids(&self) -> impl Iterator<Item = &TileId> {
        self.grid.tiles.keys()
    }
}
