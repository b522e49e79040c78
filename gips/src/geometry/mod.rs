//! Planar geometry for tile coverage and project footprints.
//!
//! Coordinates are in the data source grid's SRS (map units). Only what tile
//! selection and footprint extents need is provided:
//!
//! - [`BBox`] - axis-aligned bounding box (closed)
//! - [`Polygon`] - simple polygon given by its exterior ring
//! - [`Geometry`] - either of the above
//!
//! Overlap areas come from `geo` boolean operations between the geometry and
//! the tile's box. A geometry that only touches a tile along an edge or
//! corner *intersects* the tile but covers zero area.

use geo::{Area, BooleanOps, BoundingRect, Coord, Intersects, LineString, Rect};
use serde::{Deserialize, Serialize};

/// Tolerance for treating an intersection area as zero.
const AREA_EPSILON: f64 = 1e-12;

/// Axis-aligned bounding box with inclusive edges.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BBox {
    /// Create a box, normalising the corner order.
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self {
            min_x: x0.min(x1),
            min_y: y0.min(y1),
            max_x: x0.max(x1),
            max_y: y0.max(y1),
        }
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    /// Whether the point lies inside or on the edge of the box.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    /// Closed-box intersection test (touching edges count).
    pub fn intersects(&self, other: &BBox) -> bool {
        self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }

    /// Smallest box containing both.
    pub fn union(&self, other: &BBox) -> BBox {
        BBox {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    fn to_polygon(self) -> geo::Polygon<f64> {
        Rect::from(self).to_polygon()
    }
}

impl From<BBox> for Rect<f64> {
    fn from(b: BBox) -> Self {
        Rect::new(
            Coord { x: b.min_x, y: b.min_y },
            Coord { x: b.max_x, y: b.max_y },
        )
    }
}

impl From<Rect<f64>> for BBox {
    fn from(r: Rect<f64>) -> Self {
        BBox::new(r.min().x, r.min().y, r.max().x, r.max().y)
    }
}

/// Simple polygon described by its exterior ring (no holes).
///
/// Serialized as the open list of ring vertices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<(f64, f64)>", into = "Vec<(f64, f64)>")]
pub struct Polygon(geo::Polygon<f64>);

impl Polygon {
    /// Build a polygon from its ring. The ring is closed if it is not already.
    pub fn new(exterior: Vec<(f64, f64)>) -> Self {
        Self(geo::Polygon::new(LineString::from(exterior), Vec::new()))
    }

    /// Ring vertices without the closing vertex.
    pub fn exterior(&self) -> Vec<(f64, f64)> {
        let ring = self.0.exterior();
        let open = ring.0.len().saturating_sub(usize::from(ring.is_closed()));
        ring.0[..open].iter().map(|c| (c.x, c.y)).collect()
    }

    pub fn area(&self) -> f64 {
        self.0.unsigned_area()
    }

    pub fn bbox(&self) -> Option<BBox> {
        self.0.bounding_rect().map(BBox::from)
    }
}

impl From<Vec<(f64, f64)>> for Polygon {
    fn from(exterior: Vec<(f64, f64)>) -> Self {
        Polygon::new(exterior)
    }
}

impl From<Polygon> for Vec<(f64, f64)> {
    fn from(polygon: Polygon) -> Self {
        polygon.exterior()
    }
}

/// A footprint or selection shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Geometry {
    BBox(BBox),
    Polygon(Polygon),
}

impl Geometry {
    pub fn bbox(&self) -> Option<BBox> {
        match self {
            Geometry::BBox(b) => Some(*b),
            Geometry::Polygon(p) => p.bbox(),
        }
    }

    pub fn area(&self) -> f64 {
        match self {
            Geometry::BBox(b) => b.area(),
            Geometry::Polygon(p) => p.area(),
        }
    }

    fn to_polygon(&self) -> geo::Polygon<f64> {
        match self {
            Geometry::BBox(b) => b.to_polygon(),
            Geometry::Polygon(p) => p.0.clone(),
        }
    }

    /// Whether the geometry touches or overlaps the box.
    pub fn intersects(&self, tile: &BBox) -> bool {
        match self {
            Geometry::BBox(b) => b.intersects(tile),
            Geometry::Polygon(p) => p.0.intersects(&Rect::from(*tile)),
        }
    }

    /// Area of the geometry inside the box.
    pub fn intersection_area(&self, tile: &BBox) -> f64 {
        if !self.bbox().is_some_and(|b| b.intersects(tile)) {
            return 0.0;
        }
        self.to_polygon()
            .intersection(&tile.to_polygon())
            .unsigned_area()
    }

    /// Fraction of the box area covered by the geometry, in `[0, 1]`.
    pub fn coverage_of(&self, tile: &BBox) -> f64 {
        let area = tile.area();
        if area <= AREA_EPSILON {
            return 0.0;
        }
        (self.intersection_area(tile) / area).clamp(0.0, 1.0)
    }

    /// Whether the overlap with the box has positive area.
    pub fn overlaps(&self, tile: &BBox) -> bool {
        self.intersection_area(tile) > AREA_EPSILON
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit() -> BBox {
        BBox::new(0.0, 0.0, 1.0, 1.0)
    }

    #[test]
    fn test_bbox_normalises_corners() {
        let b = BBox::new(2.0, 3.0, -1.0, 0.0);
        assert_eq!(b.min_x, -1.0);
        assert_eq!(b.max_y, 3.0);
        assert_eq!(b.area(), 9.0);
    }

    #[test]
    fn test_bbox_touching_intersects() {
        let right = BBox::new(1.0, 0.0, 2.0, 1.0);
        assert!(unit().intersects(&right));
        assert!(!unit().intersects(&BBox::new(1.5, 0.0, 2.0, 1.0)));
    }

    #[test]
    fn test_polygon_area_and_closing_vertex() {
        let p = Polygon::new(vec![(0.0, 0.0), (2.0, 0.0), (2.0, 2.0), (0.0, 2.0), (0.0, 0.0)]);
        assert_eq!(p.exterior().len(), 4);
        assert!((p.area() - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_half_overlap() {
        let g = Geometry::BBox(BBox::new(0.5, 0.0, 2.0, 1.0));
        assert!((g.intersection_area(&unit()) - 0.5).abs() < 1e-9);
        assert!((g.coverage_of(&unit()) - 0.5).abs() < 1e-9);
        assert!(g.overlaps(&unit()));
    }

    #[test]
    fn test_touch_only() {
        let g = Geometry::BBox(BBox::new(1.0, 0.0, 2.0, 1.0));
        assert!(g.intersects(&unit()));
        assert!(!g.overlaps(&unit()));
    }

    #[test]
    fn test_disjoint() {
        let g = Geometry::BBox(BBox::new(3.0, 3.0, 4.0, 4.0));
        assert!(!g.intersects(&unit()));
        assert_eq!(g.intersection_area(&unit()), 0.0);
    }

    #[test]
    fn test_triangle_clipped() {
        // Right triangle covering the lower-right half of the unit square.
        let g = Geometry::Polygon(Polygon::new(vec![(0.0, 0.0), (2.0, 0.0), (2.0, 2.0)]));
        assert!((g.intersection_area(&unit()) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_polygon_touching_corner() {
        let g = Geometry::Polygon(Polygon::new(vec![(1.0, 1.0), (2.0, 1.0), (2.0, 2.0)]));
        assert!(g.intersects(&unit()));
        assert!(!g.overlaps(&unit()));
    }

    #[test]
    fn test_polygon_json_is_vertex_list() {
        let g: Geometry = serde_json::from_str(r#"{"polygon":[[0,0],[1,0],[1,1]]}"#).unwrap();
        assert!((g.area() - 0.5).abs() < 1e-9);
        let json = serde_json::to_string(&g).unwrap();
        assert_eq!(json, r#"{"polygon":[[0.0,0.0],[1.0,0.0],[1.0,1.0]]}"#);
    }

    #[test]
    fn test_geometry_containing_tile() {
        let g = Geometry::BBox(BBox::new(-5.0, -5.0, 5.0, 5.0));
        assert!((g.coverage_of(&unit()) - 1.0).abs() < 1e-9);
    }
}
