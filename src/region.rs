//! Chromaticity acceptance regions.
//!
//! A measured color point `(u', v')` passes when it lies inside the
//! window's acceptance polygon. Containment uses a bounding-box rejection
//! followed by even-odd ray casting. Points exactly on an edge get whatever
//! the ray cast yields, but always the same answer for the same input.

use log::warn;
use serde::{Deserialize, Serialize};

use crate::spec::WindowType;

/// Edges with a smaller vertical extent than this are treated as horizontal.
pub const HORIZONTAL_EPSILON: f64 = 1e-10;

/// Fallback acceptance region used when no valid polygon is supplied.
pub const DEFAULT_WHITE_POLYGON: [(f64, f64); 6] = [
    (0.183000, 0.461000),
    (0.193500, 0.455000),
    (0.196780, 0.461590),
    (0.203090, 0.458130),
    (0.209100, 0.469180),
    (0.189200, 0.478400),
];

/// A 2D chromaticity coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub u: f64,
    pub v: f64,
}

impl Point {
    pub fn new(u: f64, v: f64) -> Self {
        Point { u, v }
    }
}

impl From<(f64, f64)> for Point {
    fn from((u, v): (f64, f64)) -> Self {
        Point { u, v }
    }
}

/// Ordered polygon vertices. Valid only with at least three vertices.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionPolygon {
    vertices: Vec<(f64, f64)>,
}

impl RegionPolygon {
    pub fn new(vertices: Vec<(f64, f64)>) -> Self {
        RegionPolygon { vertices }
    }

    pub fn default_white() -> Self {
        RegionPolygon::new(DEFAULT_WHITE_POLYGON.to_vec())
    }

    pub fn vertices(&self) -> &[(f64, f64)] {
        &self.vertices
    }

    /// At least three vertices, all finite.
    pub fn is_valid(&self) -> bool {
        self.vertices.len() >= 3
            && self
                .vertices
                .iter()
                .all(|(u, v)| u.is_finite() && v.is_finite())
    }

    /// Axis-aligned bounding box `(min_u, min_v, max_u, max_v)`.
    pub fn bounding_box(&self) -> Option<(f64, f64, f64, f64)> {
        let (first, rest) = self.vertices.split_first()?;
        let init = (first.0, first.1, first.0, first.1);
        Some(rest.iter().fold(init, |(lo_u, lo_v, hi_u, hi_v), &(u, v)| {
            (lo_u.min(u), lo_v.min(v), hi_u.max(u), hi_v.max(v))
        }))
    }

    pub fn contains(&self, point: Point) -> bool {
        contains(point, &self.vertices)
    }
}

/// Point-in-polygon test.
///
/// Returns `false` for polygons with fewer than three vertices and for
/// points outside the bounding box.
pub fn contains(point: Point, polygon: &[(f64, f64)]) -> bool {
    if polygon.len() < 3 {
        return false;
    }

    let (min_u, min_v, max_u, max_v) = polygon.iter().fold(
        (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        |(a, b, c, d), &(u, v)| (a.min(u), b.min(v), c.max(u), d.max(v)),
    );
    if point.u < min_u || point.u > max_u || point.v < min_v || point.v > max_v {
        return false;
    }

    let (x, y) = (point.u, point.v);
    let mut inside = false;
    let mut j = polygon.len() - 1;
    for i in 0..polygon.len() {
        let (xi, yi) = polygon[i];
        let (xj, yj) = polygon[j];
        j = i;

        if (yi > y) == (yj > y) {
            continue;
        }
        if (yj - yi).abs() < HORIZONTAL_EPSILON {
            continue;
        }
        let x_cross = (xj - xi) * (y - yi) / (yj - yi) + xi;
        if x < x_cross {
            inside = !inside;
        }
    }
    inside
}

// ---------------------------------------------------------------------------
// Per-window polygon set
// ---------------------------------------------------------------------------

/// Acceptance polygons supplied for a session, one per window (optional).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegionSet {
    #[serde(default, rename = "White")]
    pub white: Option<RegionPolygon>,
    #[serde(default, rename = "Mixed")]
    pub mixed: Option<RegionPolygon>,
}

impl RegionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, window: WindowType, polygon: RegionPolygon) -> Self {
        match window {
            WindowType::White => self.white = Some(polygon),
            WindowType::Mixed => self.mixed = Some(polygon),
        }
        self
    }

    pub fn supplied(&self, window: WindowType) -> Option<&RegionPolygon> {
        match window {
            WindowType::White => self.white.as_ref(),
            WindowType::Mixed => self.mixed.as_ref(),
        }
    }

    /// The polygon to judge `window` with: the supplied one when valid,
    /// otherwise the default region (logged, not an error).
    pub fn effective(&self, window: WindowType) -> RegionPolygon {
        match self.supplied(window) {
            Some(p) if p.is_valid() => p.clone(),
            Some(p) => {
                warn!(
                    "{window} polygon has {} usable vertices; using default region",
                    p.vertices().len()
                );
                RegionPolygon::default_white()
            }
            None => {
                warn!("no {window} polygon supplied; using default region");
                RegionPolygon::default_white()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_square() -> Vec<(f64, f64)> {
        vec![(0.0, 0.0), (0.0, 1.0), (1.0, 1.0), (1.0, 0.0)]
    }

    #[test]
    fn square_inside_and_outside() {
        let sq = unit_square();
        assert!(contains(Point::new(0.5, 0.5), &sq));
        assert!(!contains(Point::new(1.5, 0.5), &sq));
        assert!(!contains(Point::new(0.5, -0.1), &sq));
    }

    #[test]
    fn degenerate_polygons_reject() {
        assert!(!contains(Point::new(0.0, 0.0), &[]));
        assert!(!contains(Point::new(0.5, 0.5), &[(0.0, 0.0), (1.0, 1.0)]));
    }

    #[test]
    fn edge_points_are_stable() {
        let sq = unit_square();
        for p in [
            Point::new(0.0, 0.5),
            Point::new(1.0, 0.5),
            Point::new(0.5, 0.0),
            Point::new(0.5, 1.0),
            Point::new(0.0, 0.0),
        ] {
            let first = contains(p, &sq);
            for _ in 0..10 {
                assert_eq!(contains(p, &sq), first, "unstable at {p:?}");
            }
        }
    }

    #[test]
    fn concave_polygon() {
        // "U" shape opening upwards
        let poly = vec![
            (0.0, 0.0),
            (3.0, 0.0),
            (3.0, 3.0),
            (2.0, 3.0),
            (2.0, 1.0),
            (1.0, 1.0),
            (1.0, 3.0),
            (0.0, 3.0),
        ];
        assert!(contains(Point::new(0.5, 2.0), &poly));
        assert!(!contains(Point::new(1.5, 2.0), &poly));
        assert!(contains(Point::new(1.5, 0.5), &poly));
    }

    #[test]
    fn default_white_region() {
        let poly = RegionPolygon::default_white();
        assert_eq!(poly.vertices().len(), 6);
        assert_eq!(poly.vertices()[0], (0.183000, 0.461000));
        assert_eq!(poly.vertices()[5], (0.189200, 0.478400));
        assert!(poly.contains(Point::new(0.195, 0.465)));
        assert!(!poly.contains(Point::new(0.30, 0.30)));
    }

    #[test]
    fn bounding_box_of_default() {
        let (lo_u, lo_v, hi_u, hi_v) = RegionPolygon::default_white().bounding_box().unwrap();
        assert_eq!((lo_u, lo_v, hi_u, hi_v), (0.183, 0.455, 0.2091, 0.4784));
        assert!(RegionPolygon::default().bounding_box().is_none());
    }

    #[test]
    fn invalid_supplied_polygon_falls_back() {
        let set = RegionSet::new().with(WindowType::White, RegionPolygon::new(vec![(0.0, 0.0)]));
        assert_eq!(set.effective(WindowType::White), RegionPolygon::default_white());
        assert_eq!(set.effective(WindowType::Mixed), RegionPolygon::default_white());

        let square = RegionPolygon::new(unit_square());
        let set = RegionSet::new().with(WindowType::Mixed, square.clone());
        assert_eq!(set.effective(WindowType::Mixed), square);
    }

    #[test]
    fn region_set_from_json() {
        let set: RegionSet =
            serde_json::from_str(r#"{ "White": [[0,0],[0,1],[1,1]] }"#).unwrap();
        assert_eq!(set.supplied(WindowType::White).map(|p| p.vertices().len()), Some(3));
        assert!(set.mixed.is_none());
    }
}
