//! INI parsing: the single place where key names map to settings fields.

use std::path::PathBuf;
use std::time::Duration;

use ini::Ini;

use super::{ConfigError, EngineConfig};
use crate::datasource::TileId;
use crate::project::TilePriority;
use crate::raster::Interpolation;

fn invalid(section: &str, key: &str, value: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

/// Parse an `Ini` into an [`EngineConfig`], overlaying defaults.
pub(super) fn parse_ini(ini: &Ini) -> Result<EngineConfig, ConfigError> {
    let mut config = EngineConfig::default();

    // [repository]
    if let Some(section) = ini.section(Some("repository")) {
        if let Some(v) = section.get("root").map(str::trim).filter(|v| !v.is_empty()) {
            config.repository.root = expand_tilde(v);
        }
    }

    // [processing]
    if let Some(section) = ini.section(Some("processing")) {
        if let Some(v) = section.get("workers") {
            let workers = v
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| invalid("processing", "workers", v, "must be a positive integer"))?;
            config.processing.workers = workers;
        }
        if let Some(v) = section.get("timeout_secs") {
            let secs = v.trim().parse::<u64>().map_err(|_| {
                invalid("processing", "timeout_secs", v, "must be a whole number of seconds")
            })?;
            // 0 disables the deadline.
            config.processing.timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
    }

    // [project]
    if let Some(section) = ini.section(Some("project")) {
        if let Some(v) = section.get("root").map(str::trim).filter(|v| !v.is_empty()) {
            config.project.root = expand_tilde(v);
        }
        if let Some(v) = section.get("interpolation") {
            config.project.interpolation = v
                .parse::<Interpolation>()
                .map_err(|e| invalid("project", "interpolation", v, e.to_string()))?;
        }
        if let Some(v) = section.get("tile_priority") {
            config.project.tile_priority =
                parse_tile_priority(v, section.get("tile_ranking"))?;
        }
    }

    // [logging]
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("directory").map(str::trim).filter(|v| !v.is_empty()) {
            config.logging.directory = expand_tilde(v);
        }
        if let Some(v) = section.get("file").map(str::trim).filter(|v| !v.is_empty()) {
            config.logging.file = v.to_string();
        }
    }

    Ok(config)
}

fn parse_tile_priority(value: &str, ranking: Option<&str>) -> Result<TilePriority, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "tile-id" | "tile_id" | "tileid" => Ok(TilePriority::TileId),
        "coverage" => Ok(TilePriority::Coverage),
        "ranked" => {
            let ranking = ranking.unwrap_or_default();
            let tiles = ranking
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(|t| {
                    TileId::new(t)
                        .map_err(|e| invalid("project", "tile_ranking", ranking, e.to_string()))
                })
                .collect::<Result<Vec<_>, _>>()?;
            if tiles.is_empty() {
                return Err(invalid(
                    "project",
                    "tile_ranking",
                    ranking,
                    "ranked priority needs at least one tile",
                ));
            }
            Ok(TilePriority::Ranked(tiles))
        }
        _ => Err(invalid(
            "project",
            "tile_priority",
            value,
            "must be one of: tile-id, coverage, ranked",
        )),
    }
}

/// Expand a leading `~/` to the home directory.
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}
