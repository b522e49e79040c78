//! Spatial and temporal selection.

use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate, Weekday};

use crate::datasource::{TileGrid, TileId};
use crate::geometry::Geometry;

/// Rule deciding whether a grid tile belongs to a geometry selection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TileCoverage {
    /// Any contact, including tiles that only share an edge.
    Intersecting,
    /// The overlap must have positive area.
    Overlapping,
    /// The geometry must cover at least this fraction of the tile.
    MinFraction(f64),
}

/// Which tiles an inventory covers.
#[derive(Debug, Clone, PartialEq)]
pub enum SpatialSelector {
    /// An explicit tile list.
    Tiles(BTreeSet<TileId>),
    /// Grid tiles meeting a coverage rule against a geometry.
    Geometry {
        geometry: Geometry,
        coverage: TileCoverage,
    },
}

impl SpatialSelector {
    pub fn tiles(tiles: impl IntoIterator<Item = TileId>) -> Self {
        SpatialSelector::Tiles(tiles.into_iter().collect())
    }

    /// Resolve to tile ids, ascending.
    pub fn resolve(&self, grid: &TileGrid) -> BTreeSet<TileId> {
        match self {
            SpatialSelector::Tiles(tiles) => tiles.clone(),
            SpatialSelector::Geometry { geometry, coverage } => grid
                .tiles
                .iter()
                .filter(|(_, bounds)| match coverage {
                    TileCoverage::Intersecting => geometry.intersects(bounds),
                    TileCoverage::Overlapping => geometry.overlaps(bounds),
                    TileCoverage::MinFraction(fraction) => {
                        geometry.intersects(bounds) && geometry.coverage_of(bounds) >= *fraction
                    }
                })
                .map(|(tile, _)| tile.clone())
                .collect(),
        }
    }
}

/// The dates an inventory considers before filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateSpec {
    /// Inclusive range; only dates with files on disk are kept.
    Range { start: NaiveDate, end: NaiveDate },
    /// Exactly these dates, whether or not files exist.
    List(BTreeSet<NaiveDate>),
}

/// Which dates an inventory covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemporalSelector {
    pub dates: DateSpec,
    /// Inclusive day-of-year window; a window with start > end wraps the
    /// year end (e.g. `(335, 59)` keeps December through February).
    pub days_of_year: Option<(u32, u32)>,
    pub weekdays: Option<Vec<Weekday>>,
}

impl TemporalSelector {
    pub fn range(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            dates: DateSpec::Range { start, end },
            days_of_year: None,
            weekdays: None,
        }
    }

    pub fn dates(dates: impl IntoIterator<Item = NaiveDate>) -> Self {
        Self {
            dates: DateSpec::List(dates.into_iter().collect()),
            days_of_year: None,
            weekdays: None,
        }
    }

    pub fn with_days_of_year(mut self, start: u32, end: u32) -> Self {
        self.days_of_year = Some((start, end));
        self
    }

    pub fn with_weekdays(mut self, weekdays: Vec<Weekday>) -> Self {
        self.weekdays = Some(weekdays);
        self
    }

    /// Whether `date` passes the date spec and every filter.
    pub fn accepts(&self, date: NaiveDate) -> bool {
        let in_spec = match &self.dates {
            DateSpec::Range { start, end } => *start <= date && date <= *end,
            DateSpec::List(dates) => dates.contains(&date),
        };
        in_spec && self.day_of_year_ok(date) && self.weekday_ok(date)
    }

    fn day_of_year_ok(&self, date: NaiveDate) -> bool {
        match self.days_of_year {
            None => true,
            Some((start, end)) if start <= end => (start..=end).contains(&date.ordinal()),
            Some((start, end)) => date.ordinal() >= start || date.ordinal() <= end,
        }
    }

    fn weekday_ok(&self, date: NaiveDate) -> bool {
        self.weekdays
            .as_ref()
            .map_or(true, |days| days.contains(&date.weekday()))
    }

    /// Listed dates that pass the filters; `None` for a range.
    pub fn listed(&self) -> Option<BTreeSet<NaiveDate>> {
        match &self.dates {
            DateSpec::Range { .. } => None,
            DateSpec::List(dates) => Some(dates.iter().copied().filter(|d| self.accepts(*d)).collect()),
        }
    }
}
