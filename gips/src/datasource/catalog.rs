//! Built-in data source definitions.
//!
//! Landsat scenes arrive as `tar.gz` archives named
//! `{sensor}{path}{row}{year}{doy}{station}.tar.gz`, e.g.
//! `LC80230342014123LGN00.tar.gz` (Landsat 8, WRS path 023 row 034, day 123
//! of 2014). The archive is the single asset type (empty name). Standard
//! products derive from the archive; spectral and tillage indices derive
//! from surface reflectance.
//!
//! WRS-2 footprints come from an external vector layer, so the grid is
//! supplied by the caller via [`landsat_with_grid`].
//!
//! Scene selection is by tile and date only. Archives are indexed from their
//! file names and carry no scene metadata, so there is no cloud-cover
//! filter.

use std::collections::BTreeMap;

use super::{
    AssetSpec, AssetType, DataSource, InvalidId, ProductName, ProductSpec, Requirement, Sensor,
    TileGrid,
};

/// WRS-2 tile ids are `PPPRRR`.
pub const LANDSAT_TILE_PATTERN: &str = r"\d{6}";

/// Landsat pixel size in metres.
pub const LANDSAT_RESOLUTION: (f64, f64) = (30.0, 30.0);

const STANDARD: &[(&str, &str)] = &[
    ("rad", "Surface-leaving radiance"),
    ("ref", "Surface reflectance"),
    ("acca", "Automated Cloud Cover Assessment"),
];

const INDICES: &[(&str, &str)] = &[
    ("bi", "Brightness Index"),
    ("ndvi", "Normalized Difference Vegetation Index"),
    ("evi", "Enhanced Vegetation Index"),
    ("lswi", "Land Surface Water Index"),
    ("ndsi", "Normalized Difference Snow Index"),
    ("satvi", "Soil-adjusted Total Vegetation Index"),
];

const TILLAGE: &[(&str, &str)] = &[
    ("ndti", "Normalized Difference Tillage Index"),
    ("crc", "Crop Residue Cover"),
    ("sti", "Standard Tillage Index"),
    ("isti", "Inverse Standard Tillage Index"),
];

// Preference order for product generation: newest instrument first.
const PRODUCT_SENSORS: &[&str] = &["LC8", "LE7", "LT5"];

fn ident<T>(value: &str) -> T
where
    for<'a> T: TryFrom<&'a str, Error = InvalidId>,
{
    T::try_from(value).expect("catalog identifiers are valid")
}

fn spec(description: &str, requires: Vec<Requirement>, group: &str) -> ProductSpec {
    ProductSpec {
        description: description.to_string(),
        requires,
        sensors: PRODUCT_SENSORS.iter().map(|s| ident(s)).collect(),
        group: Some(group.to_string()),
    }
}

/// The Landsat definition with an empty grid.
///
/// Scenes are not filtered by cloud cover; every archive on disk is a
/// candidate input.
pub fn landsat() -> DataSource {
    landsat_with_grid(
        TileGrid::new("EPSG:4326", BTreeMap::new()).with_tile_pattern(LANDSAT_TILE_PATTERN),
    )
}

/// The Landsat definition over the given WRS-2 grid.
pub fn landsat_with_grid(grid: TileGrid) -> DataSource {
    let sensors = [
        ("LT4", "Landsat 4"),
        ("LT5", "Landsat 5"),
        ("LE7", "Landsat 7"),
        ("LC8", "Landsat 8"),
    ]
    .iter()
    .map(|(id, desc)| (ident::<Sensor>(id), desc.to_string()))
    .collect();

    let archive: AssetType = ident("");
    let reflectance: ProductName = ident("ref");

    let mut products = BTreeMap::new();
    for (name, description) in STANDARD {
        products.insert(
            ident(name),
            spec(
                description,
                vec![Requirement::Asset(archive.clone())],
                "Standard",
            ),
        );
    }
    for (group, table) in [("Index", INDICES), ("Tillage", TILLAGE)] {
        for (name, description) in table {
            products.insert(
                ident(name),
                spec(
                    description,
                    vec![Requirement::Product(reflectance.clone())],
                    group,
                ),
            );
        }
    }

    DataSource {
        name: "landsat".to_string(),
        description: "Landsat 4-8 surface reflectance and indices".to_string(),
        grid,
        sensors,
        assets: vec![AssetSpec {
            asset_type: archive,
            template: "{sensor}{tile}{date}*.tar.gz".to_string(),
            fill: "LGN00".to_string(),
            description: "Original raw tar file".to_string(),
        }],
        products,
        default_resolution: LANDSAT_RESOLUTION,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_landsat_products() {
        let ds = landsat();
        assert_eq!(ds.products.len(), 13);
        assert_eq!(ds.products_in_group("Index").len(), 6);
        assert_eq!(ds.products_in_group("Tillage").len(), 4);
        assert_eq!(ds.sensors.len(), 4);
    }

    #[test]
    fn test_indices_depend_on_reflectance() {
        let ds = landsat();
        let evi = ds.product(&ident("evi")).unwrap();
        assert_eq!(
            evi.product_requirements().collect::<Vec<_>>(),
            vec![&ident::<ProductName>("ref")]
        );
    }

    #[test]
    fn test_sensor_preference() {
        let ds = landsat();
        let sensors: Vec<&str> = ds
            .product(&ident("ref"))
            .unwrap()
            .sensors
            .iter()
            .map(Sensor::as_str)
            .collect();
        assert_eq!(sensors, vec!["LC8", "LE7", "LT5"]);
    }
}
