//! Validated identifiers used as keys throughout the engine.
//!
//! Every identifier ends up embedded in a file name, so each one is restricted
//! to a character set that keeps the naming convention unambiguous:
//!
//! | Type          | Allowed          | Example   |
//! |---------------|------------------|-----------|
//! | [`TileId`]    | `[A-Za-z0-9-]+`  | `023034`  |
//! | [`Sensor`]    | `[A-Za-z0-9-]+`  | `LC8`     |
//! | [`ProductName`] | `[A-Za-z0-9-]+` | `ndvi`   |
//! | [`AssetType`] | `[A-Za-z0-9-]*`  | `` (default asset) |
//!
//! Underscores are reserved as the field separator of product file names.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An identifier failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind} '{value}': only ASCII letters, digits and '-' are allowed")]
pub struct InvalidId {
    /// Which identifier kind was being built.
    pub kind: &'static str,
    /// The rejected value.
    pub value: String,
}

fn is_id_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-'
}

fn validate(kind: &'static str, value: &str, allow_empty: bool) -> Result<(), InvalidId> {
    if (value.is_empty() && !allow_empty) || !value.chars().all(is_id_char) {
        return Err(InvalidId {
            kind,
            value: value.to_string(),
        });
    }
    Ok(())
}

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal, $allow_empty:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Validate and wrap an identifier.
            pub fn new(value: impl Into<String>) -> Result<Self, InvalidId> {
                let value = value.into();
                validate($kind, &value, $allow_empty)?;
                Ok(Self(value))
            }

            /// The identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl TryFrom<String> for $name {
            type Error = InvalidId;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl TryFrom<&str> for $name {
            type Error = InvalidId;

            fn try_from(value: &str) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_id!(
    /// Identifier of a cell in a data source's tile grid (e.g. a WRS path/row).
    TileId,
    "tile id",
    false
);

define_id!(
    /// Identifier of a sensor variant (e.g. `LC8`, `LE7`).
    Sensor,
    "sensor",
    false
);

define_id!(
    /// Name of a derived product (e.g. `ndvi`).
    ProductName,
    "product name",
    false
);

define_id!(
    /// Name of a raw asset type. Empty for a source's single default asset.
    AssetType,
    "asset type",
    true
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_ids() {
        assert_eq!(TileId::new("023034").unwrap().as_str(), "023034");
        assert_eq!(Sensor::new("LC8").unwrap().to_string(), "LC8");
        assert!(ProductName::new("ref-toa").is_ok());
        assert!(AssetType::new("").is_ok());
    }

    #[test]
    fn test_rejects_separator() {
        let err = ProductName::new("ndvi_toa").unwrap_err();
        assert_eq!(err.kind, "product name");
        assert!(err.to_string().contains("ndvi_toa"));
        assert!(Sensor::new("L_8").is_err());
        assert!(TileId::new("a/b").is_err());
    }

    #[test]
    fn test_rejects_empty_where_required() {
        assert!(TileId::new("").is_err());
        assert!(Sensor::new("").is_err());
        assert!(ProductName::new("").is_err());
    }

    #[test]
    fn test_serde_validates() {
        let ok: Sensor = serde_json::from_str("\"LE7\"").unwrap();
        assert_eq!(ok.as_str(), "LE7");
        assert!(serde_json::from_str::<Sensor>("\"LE 7\"").is_err());
    }
}
