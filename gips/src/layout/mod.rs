//! Repository layout: the single source of truth for on-disk naming.
//!
//! Every asset and product lives under the data source's storage root:
//!
//! ```text
//! <repository>/<datasource>/tiles/<tile>/<YYYYDDD>/<asset filename>
//! <repository>/<datasource>/tiles/<tile>/<YYYYDDD>/<YYYYDDD>_<sensor>_<product>.tif
//! ```
//!
//! Asset file names are rendered from the data source's
//! [`AssetSpec`](crate::datasource::AssetSpec) template; product file names are
//! fixed. [`Layout::parse`] is the inverse of the `format_*` functions:
//! anything that does not match yields [`LayoutError::UnrecognizedPath`].
//!
//! Product names are checked before asset templates, so an asset template
//! must not produce names of the product form.
//!
//! # Example
//!
//! ```
//! use chrono::NaiveDate;
//! use gips::datasource::{catalog, ProductName, Sensor, TileId};
//! use gips::layout::{Layout, ParsedPath, ProductKey};
//!
//! let layout = Layout::new("/data", &catalog::landsat()).unwrap();
//! let key = ProductKey {
//!     tile: TileId::new("023034").unwrap(),
//!     date: NaiveDate::from_ymd_opt(2014, 5, 3).unwrap(),
//!     sensor: Sensor::new("LC8").unwrap(),
//!     product: ProductName::new("ndvi").unwrap(),
//! };
//! let path = layout.format_product(&key);
//! assert_eq!(path.to_str().unwrap(), "tiles/023034/2014123/2014123_LC8_ndvi.tif");
//! assert_eq!(layout.parse(&path).unwrap(), ParsedPath::Product(key));
//! ```

use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use thiserror::Error;

use crate::datasource::{AssetSpec, AssetType, DataSource, ProductName, Sensor, TileId};

/// Directory under the data source root holding tile directories.
pub const TILES_DIR: &str = "tiles";

/// Extension of product rasters.
pub const PRODUCT_EXTENSION: &str = "tif";

/// Date token format: four-digit year then zero-padded day of year.
pub const DATE_FORMAT: &str = "%Y%j";

/// Layout errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    /// The path does not follow the naming convention.
    #[error("unrecognized path {path}: {reason}")]
    UnrecognizedPath { path: PathBuf, reason: String },

    /// An asset template cannot be compiled.
    #[error("invalid asset template '{template}': {reason}")]
    InvalidTemplate { template: String, reason: String },

    /// No template exists for the asset type.
    #[error("no naming template for asset type '{0}'")]
    UnknownAssetType(AssetType),
}

impl LayoutError {
    fn unrecognized(path: &Path, reason: impl Into<String>) -> Self {
        LayoutError::UnrecognizedPath {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}

/// Render a date as its `YYYYDDD` token.
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Parse a `YYYYDDD` token.
pub fn parse_date(token: &str) -> Option<NaiveDate> {
    if token.len() != 7 || !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    NaiveDate::parse_from_str(token, DATE_FORMAT).ok()
}

/// Identity of a raw asset file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssetKey {
    pub tile: TileId,
    pub date: NaiveDate,
    pub sensor: Sensor,
    pub asset_type: AssetType,
}

/// Identity of a product file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProductKey {
    pub tile: TileId,
    pub date: NaiveDate,
    pub sensor: Sensor,
    pub product: ProductName,
}

/// Result of parsing a repository path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedPath {
    Asset(AssetKey),
    Product(ProductKey),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Literal(String),
    Sensor,
    Tile,
    Date,
    Wildcard,
}

#[derive(Debug, Clone)]
struct AssetTemplate {
    asset_type: AssetType,
    tokens: Vec<Token>,
    fill: String,
    regex: Regex,
}

impl AssetTemplate {
    fn compile(spec: &AssetSpec, sensors: &[&Sensor], tile_pattern: &str) -> Result<Self, LayoutError> {
        let invalid = |reason: &str| LayoutError::InvalidTemplate {
            template: spec.template.clone(),
            reason: reason.to_string(),
        };

        let tokens = tokenize(&spec.template).map_err(|r| invalid(&r))?;
        if !tokens.contains(&Token::Sensor) {
            return Err(invalid("missing {sensor} placeholder"));
        }
        for token in [Token::Sensor, Token::Tile, Token::Date, Token::Wildcard] {
            if tokens.iter().filter(|t| **t == token).count() > 1 {
                return Err(invalid("placeholders may appear at most once"));
            }
        }

        // Longest sensor first so that prefixes do not shadow longer ids.
        let mut sensor_ids: Vec<&str> = sensors.iter().map(|s| s.as_str()).collect();
        sensor_ids.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
        let sensor_alt = sensor_ids
            .iter()
            .map(|s| regex::escape(s))
            .collect::<Vec<_>>()
            .join("|");

        let mut pattern = String::from("^");
        for token in &tokens {
            match token {
                Token::Literal(text) => pattern.push_str(&regex::escape(text)),
                Token::Sensor => pattern.push_str(&format!("(?P<sensor>{})", sensor_alt)),
                Token::Tile => pattern.push_str(&format!("(?P<tile>{})", tile_pattern)),
                Token::Date => pattern.push_str(r"(?P<date>\d{7})"),
                Token::Wildcard => pattern.push_str("[A-Za-z0-9]*"),
            }
        }
        pattern.push('$');

        let regex = Regex::new(&pattern).map_err(|e| invalid(&e.to_string()))?;
        Ok(Self {
            asset_type: spec.asset_type.clone(),
            tokens,
            fill: spec.fill.clone(),
            regex,
        })
    }

    fn render(&self, key: &AssetKey) -> String {
        self.tokens
            .iter()
            .map(|token| match token {
                Token::Literal(text) => text.clone(),
                Token::Sensor => key.sensor.to_string(),
                Token::Tile => key.tile.to_string(),
                Token::Date => format_date(key.date),
                Token::Wildcard => self.fill.clone(),
            })
            .collect()
    }
}

fn tokenize(template: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut literal = String::new();
    let mut rest = template;

    while let Some(c) = rest.chars().next() {
        if c == '{' {
            let end = rest
                .find('}')
                .ok_or_else(|| "unterminated placeholder".to_string())?;
            let token = match &rest[1..end] {
                "sensor" => Token::Sensor,
                "tile" => Token::Tile,
                "date" => Token::Date,
                other => return Err(format!("unknown placeholder {{{}}}", other)),
            };
            if !literal.is_empty() {
                tokens.push(Token::Literal(std::mem::take(&mut literal)));
            }
            tokens.push(token);
            rest = &rest[end + 1..];
        } else {
            if c == '*' {
                if !literal.is_empty() {
                    tokens.push(Token::Literal(std::mem::take(&mut literal)));
                }
                tokens.push(Token::Wildcard);
            } else if c == '/' || c == '\\' {
                return Err("templates name a file, not a path".to_string());
            } else {
                literal.push(c);
            }
            rest = &rest[c.len_utf8()..];
        }
    }
    if !literal.is_empty() {
        tokens.push(Token::Literal(literal));
    }
    Ok(tokens)
}

fn product_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // (\d{7})          - date token
        // ([A-Za-z0-9-]+)  - sensor
        // ([A-Za-z0-9-]+)  - product name
        Regex::new(r"^(\d{7})_([A-Za-z0-9-]+)_([A-Za-z0-9-]+)\.tif$")
            .expect("product pattern is valid")
    })
}

/// Path mapping for one data source inside a repository.
#[derive(Debug, Clone)]
pub struct Layout {
    root: PathBuf,
    templates: Vec<AssetTemplate>,
}

impl Layout {
    /// Build the layout of `source` inside `repository`.
    ///
    /// Fails when an asset template is malformed.
    pub fn new(repository: impl AsRef<Path>, source: &DataSource) -> Result<Self, LayoutError> {
        let sensors: Vec<&Sensor> = source.sensors.keys().collect();
        let templates = source
            .assets
            .iter()
            .map(|spec| AssetTemplate::compile(spec, &sensors, &source.grid.tile_pattern))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            root: repository.as_ref().join(&source.name),
            templates,
        })
    }

    /// The data source's storage root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute directory holding all dates of one tile.
    pub fn tile_dir(&self, tile: &TileId) -> PathBuf {
        self.root.join(TILES_DIR).join(tile.as_str())
    }

    /// Absolute directory holding one tile/date unit.
    pub fn unit_dir(&self, tile: &TileId, date: NaiveDate) -> PathBuf {
        self.tile_dir(tile).join(format_date(date))
    }

    /// Product file name, without directories.
    pub fn product_filename(date: NaiveDate, sensor: &Sensor, product: &ProductName) -> String {
        format!(
            "{}_{}_{}.{}",
            format_date(date),
            sensor,
            product,
            PRODUCT_EXTENSION
        )
    }

    /// Relative path of a product.
    pub fn format_product(&self, key: &ProductKey) -> PathBuf {
        Path::new(TILES_DIR)
            .join(key.tile.as_str())
            .join(format_date(key.date))
            .join(Self::product_filename(key.date, &key.sensor, &key.product))
    }

    /// Relative path of an asset.
    pub fn format_asset(&self, key: &AssetKey) -> Result<PathBuf, LayoutError> {
        let template = self
            .templates
            .iter()
            .find(|t| t.asset_type == key.asset_type)
            .ok_or_else(|| LayoutError::UnknownAssetType(key.asset_type.clone()))?;
        Ok(Path::new(TILES_DIR)
            .join(key.tile.as_str())
            .join(format_date(key.date))
            .join(template.render(key)))
    }

    /// Absolute path of a product.
    pub fn product_path(&self, key: &ProductKey) -> PathBuf {
        self.root.join(self.format_product(key))
    }

    /// Absolute path of an asset.
    pub fn asset_path(&self, key: &AssetKey) -> Result<PathBuf, LayoutError> {
        Ok(self.root.join(self.format_asset(key)?))
    }

    /// Parse a path (relative to the storage root, or absolute inside it).
    pub fn parse(&self, path: &Path) -> Result<ParsedPath, LayoutError> {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);

        let parts: Vec<&str> = relative
            .components()
            .map(|c| match c {
                Component::Normal(s) => s.to_str(),
                _ => None,
            })
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| LayoutError::unrecognized(path, "not a plain relative path"))?;

        let [tiles, tile, date, filename] = parts.as_slice() else {
            return Err(LayoutError::unrecognized(
                path,
                "expected tiles/<tile>/<date>/<file>",
            ));
        };
        if *tiles != TILES_DIR {
            return Err(LayoutError::unrecognized(path, "outside the tiles directory"));
        }
        let tile = TileId::new(*tile).map_err(|e| LayoutError::unrecognized(path, e.to_string()))?;
        let date = parse_date(date)
            .ok_or_else(|| LayoutError::unrecognized(path, "date directory is not YYYYDDD"))?;

        if let Some(caps) = product_pattern().captures(filename) {
            if parse_date(&caps[1]) != Some(date) {
                return Err(LayoutError::unrecognized(
                    path,
                    "file date does not match directory",
                ));
            }
            let sensor =
                Sensor::new(&caps[2]).map_err(|e| LayoutError::unrecognized(path, e.to_string()))?;
            let product = ProductName::new(&caps[3])
                .map_err(|e| LayoutError::unrecognized(path, e.to_string()))?;
            return Ok(ParsedPath::Product(ProductKey {
                tile,
                date,
                sensor,
                product,
            }));
        }

        for template in &self.templates {
            let Some(caps) = template.regex.captures(filename) else {
                continue;
            };
            if caps.name("tile").is_some_and(|m| m.as_str() != tile.as_str()) {
                return Err(LayoutError::unrecognized(
                    path,
                    "file tile does not match directory",
                ));
            }
            if caps
                .name("date")
                .is_some_and(|m| parse_date(m.as_str()) != Some(date))
            {
                return Err(LayoutError::unrecognized(
                    path,
                    "file date does not match directory",
                ));
            }
            let sensor = Sensor::new(&caps["sensor"])
                .map_err(|e| LayoutError::unrecognized(path, e.to_string()))?;
            return Ok(ParsedPath::Asset(AssetKey {
                tile,
                date,
                sensor,
                asset_type: template.asset_type.clone(),
            }));
        }

        Err(LayoutError::unrecognized(
            path,
            "matches no product or asset naming",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::catalog;
    use crate::datasource::{ProductSpec, Requirement, TileGrid};
    use std::collections::BTreeMap;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn landsat_layout() -> Layout {
        Layout::new("/repo", &catalog::landsat()).unwrap()
    }

    fn asset_key(tile: &str, d: NaiveDate, sensor: &str) -> AssetKey {
        AssetKey {
            tile: TileId::new(tile).unwrap(),
            date: d,
            sensor: Sensor::new(sensor).unwrap(),
            asset_type: AssetType::new("").unwrap(),
        }
    }

    fn demo_source(template: &str) -> DataSource {
        let mut products = BTreeMap::new();
        products.insert(
            ProductName::new("ndvi").unwrap(),
            ProductSpec {
                description: String::new(),
                requires: vec![Requirement::Asset(AssetType::new("reflectance").unwrap())],
                sensors: vec![Sensor::new("S1").unwrap()],
                group: None,
            },
        );
        let mut sensors = BTreeMap::new();
        sensors.insert(Sensor::new("S1").unwrap(), String::new());
        sensors.insert(Sensor::new("S10").unwrap(), String::new());
        DataSource {
            name: "demo".to_string(),
            description: String::new(),
            grid: TileGrid::new("EPSG:4326", BTreeMap::new()),
            sensors,
            assets: vec![AssetSpec {
                asset_type: AssetType::new("reflectance").unwrap(),
                template: template.to_string(),
                fill: String::new(),
                description: String::new(),
            }],
            products,
            default_resolution: (1.0, 1.0),
        }
    }

    #[test]
    fn test_date_token() {
        assert_eq!(format_date(date(2014, 5, 3)), "2014123");
        assert_eq!(format_date(date(2015, 1, 1)), "2015001");
        assert_eq!(parse_date("2014123"), Some(date(2014, 5, 3)));
        assert_eq!(parse_date("2014-12"), None);
        assert_eq!(parse_date("2014400"), None);
    }

    #[test]
    fn test_landsat_asset_naming() {
        let layout = landsat_layout();
        let key = asset_key("023034", date(2014, 5, 3), "LC8");
        let rel = layout.format_asset(&key).unwrap();
        assert_eq!(
            rel,
            PathBuf::from("tiles/023034/2014123/LC80230342014123LGN00.tar.gz")
        );
        assert_eq!(layout.parse(&rel).unwrap(), ParsedPath::Asset(key));
    }

    #[test]
    fn test_landsat_station_wildcard() {
        let layout = landsat_layout();
        let parsed = layout
            .parse(Path::new("tiles/023034/2014123/LE70230342014123EDC00.tar.gz"))
            .unwrap();
        assert_eq!(
            parsed,
            ParsedPath::Asset(asset_key("023034", date(2014, 5, 3), "LE7"))
        );
    }

    #[test]
    fn test_absolute_path_parses() {
        let layout = landsat_layout();
        let parsed = layout
            .parse(Path::new("/repo/landsat/tiles/023034/2014123/2014123_LC8_ref.tif"))
            .unwrap();
        assert!(matches!(parsed, ParsedPath::Product(k) if k.product.as_str() == "ref"));
    }

    #[test]
    fn test_mismatched_directory_rejected() {
        let layout = landsat_layout();
        let err = layout
            .parse(Path::new("tiles/023034/2014124/2014123_LC8_ref.tif"))
            .unwrap_err();
        assert!(matches!(err, LayoutError::UnrecognizedPath { .. }));
        assert!(layout
            .parse(Path::new("tiles/023035/2014123/LC80230342014123LGN00.tar.gz"))
            .is_err());
    }

    #[test]
    fn test_unrecognized_files() {
        let layout = landsat_layout();
        for path in [
            "tiles/023034/2014123/notes.txt",
            "tiles/023034/2014123/2014123_LC8_ref.tif.partial",
            "tiles/023034/2014123",
            "other/023034/2014123/2014123_LC8_ref.tif",
            "tiles/023034/latest/2014123_LC8_ref.tif",
        ] {
            assert!(layout.parse(Path::new(path)).is_err(), "{path}");
        }
    }

    #[test]
    fn test_sensor_prefix_ambiguity() {
        let layout = Layout::new("/repo", &demo_source("{sensor}{tile}_{date}.bin")).unwrap();
        let key = AssetKey {
            tile: TileId::new("0T").unwrap(),
            date: date(2020, 2, 29),
            sensor: Sensor::new("S10").unwrap(),
            asset_type: AssetType::new("reflectance").unwrap(),
        };
        let rel = layout.format_asset(&key).unwrap();
        assert_eq!(layout.parse(&rel).unwrap(), ParsedPath::Asset(key));
    }

    #[test]
    fn test_invalid_templates() {
        for template in ["{tile}_{date}.bin", "{sensor}_{month}.bin", "{sensor}/{tile}", "{sensor}{sensor}"] {
            let err = Layout::new("/repo", &demo_source(template)).unwrap_err();
            assert!(matches!(err, LayoutError::InvalidTemplate { .. }), "{template}");
        }
    }

    #[test]
    fn test_unknown_asset_type() {
        let layout = landsat_layout();
        let mut key = asset_key("023034", date(2014, 5, 3), "LC8");
        key.asset_type = AssetType::new("sr").unwrap();
        assert_eq!(
            layout.format_asset(&key).unwrap_err(),
            LayoutError::UnknownAssetType(AssetType::new("sr").unwrap())
        );
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        fn id() -> impl Strategy<Value = String> {
            "[A-Za-z0-9-]{1,12}"
        }

        fn day() -> impl Strategy<Value = NaiveDate> {
            (1970i32..2100, 1u32..=365).prop_map(|(y, doy)| NaiveDate::from_yo_opt(y, doy).unwrap())
        }

        proptest! {
            #[test]
            fn test_product_roundtrip(tile in id(), sensor in id(), product in id(), d in day()) {
                let layout = landsat_layout();
                let key = ProductKey {
                    tile: TileId::new(tile).unwrap(),
                    date: d,
                    sensor: Sensor::new(sensor).unwrap(),
                    product: ProductName::new(product).unwrap(),
                };
                let rel = layout.format_product(&key);
                prop_assert_eq!(layout.parse(&rel).unwrap(), ParsedPath::Product(key.clone()));
                let abs = layout.product_path(&key);
                prop_assert_eq!(layout.parse(&abs).unwrap(), ParsedPath::Product(key));
            }

            #[test]
            fn test_landsat_asset_roundtrip(
                tile in "[0-9]{6}",
                sensor in prop::sample::select(vec!["LT4", "LT5", "LE7", "LC8"]),
                d in day(),
            ) {
                let layout = landsat_layout();
                let key = asset_key(&tile, d, sensor);
                let rel = layout.format_asset(&key).unwrap();
                prop_assert_eq!(layout.parse(&rel).unwrap(), ParsedPath::Asset(key));
            }
        }
    }
}
