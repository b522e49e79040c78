//! Text rendering of an inventory table.

use std::collections::BTreeMap;
use std::fmt::Write;

use chrono::NaiveDate;

use super::{Inventory, Status, StatusRow};
use crate::datasource::{ProductName, TileId};
use crate::layout::format_date;

/// Render rows as a tile × date table.
///
/// ```text
/// landsat ndvi: 1 current, 0 stale, 1 missing, 2 without assets
/// tile     2014123  2014124
/// 023034   m        -
/// 023035   -        C
/// (C current, s stale, m missing, - no assets)
/// ```
pub(super) fn render(inventory: &Inventory, product: &ProductName, rows: &[StatusRow]) -> String {
    let mut cells: BTreeMap<(&TileId, NaiveDate), Status> = BTreeMap::new();
    let mut counts = super::StatusCounts::default();
    for row in rows {
        cells.insert((&row.tile, row.date), row.status);
        counts.add(row.status);
    }

    let tile_width = inventory
        .tiles()
        .iter()
        .map(|t| t.as_str().len())
        .max()
        .unwrap_or(0)
        .max("tile".len())
        + 3;

    let mut out = String::new();
    let _ = writeln!(out, "{} {}: {}", inventory.source().name, product, counts);

    let _ = write!(out, "{:<tile_width$}", "tile");
    for date in inventory.dates() {
        let _ = write!(out, "{:<9}", format_date(*date));
    }
    out.truncate(out.trim_end().len());
    out.push('\n');

    for tile in inventory.tiles() {
        let _ = write!(out, "{:<tile_width$}", tile.as_str());
        for date in inventory.dates() {
            let code = cells
                .get(&(tile, *date))
                .map_or(' ', |status| status.code());
            let _ = write!(out, "{code:<9}");
        }
        out.truncate(out.trim_end().len());
        out.push('\n');
    }

    out.push_str("(C current, s stale, m missing, - no assets)\n");
    out
}
