//! Planar polygon geometry in lon/lat degrees.
//!
//! Point-in-polygon uses even-odd ray casting. Points on an edge count as
//! inside, for exterior rings and hole rings alike (a hole's edge is still
//! the polygon's boundary).

use region_common::BoundingBox;

/// Edge distance, in coordinate units, under which a point is on the boundary.
const BOUNDARY_EPSILON: f64 = 1e-9;

/// Where a point lies relative to a ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    Inside,
    Boundary,
    Outside,
}

/// A closed ring of (lon, lat) vertices. The closing vertex is implicit.
#[derive(Debug, Clone, PartialEq)]
pub struct Ring {
    points: Vec<(f64, f64)>,
}

impl Ring {
    /// Build a ring, dropping an explicit closing vertex.
    ///
    /// Returns a message when the ring has fewer than three distinct
    /// vertices or a non-finite coordinate.
    pub fn new(mut points: Vec<(f64, f64)>) -> Result<Self, String> {
        if points.len() > 1 && points.first() == points.last() {
            points.pop();
        }
        if points.len() < 3 {
            return Err(format!("ring needs at least 3 vertices, got {}", points.len()));
        }
        if points.iter().any(|(x, y)| !x.is_finite() || !y.is_finite()) {
            return Err("non-finite coordinate in ring".to_string());
        }
        Ok(Self { points })
    }

    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }

    /// Classify a point against this ring.
    pub fn locate(&self, x: f64, y: f64) -> Location {
        let n = self.points.len();
        let mut inside = false;
        let mut j = n - 1;

        for i in 0..n {
            let (xi, yi) = self.points[i];
            let (xj, yj) = self.points[j];

            if on_segment(x, y, (xi, yi), (xj, yj)) {
                return Location::Boundary;
            }
            if ((yi > y) != (yj > y)) && (x < (xj - xi) * (y - yi) / (yj - yi) + xi) {
                inside = !inside;
            }
            j = i;
        }

        if inside {
            Location::Inside
        } else {
            Location::Outside
        }
    }
}

fn on_segment(x: f64, y: f64, a: (f64, f64), b: (f64, f64)) -> bool {
    let (ax, ay) = a;
    let (bx, by) = b;
    let cross = (bx - ax) * (y - ay) - (by - ay) * (x - ax);
    let len = (bx - ax).hypot(by - ay);
    if cross.abs() > BOUNDARY_EPSILON * len.max(1.0) {
        return false;
    }
    x >= ax.min(bx) - BOUNDARY_EPSILON
        && x <= ax.max(bx) + BOUNDARY_EPSILON
        && y >= ay.min(by) - BOUNDARY_EPSILON
        && y <= ay.max(by) + BOUNDARY_EPSILON
}

/// A polygon: one exterior ring and zero or more holes.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    pub exterior: Ring,
    pub holes: Vec<Ring>,
}

impl Polygon {
    pub fn new(exterior: Ring, holes: Vec<Ring>) -> Self {
        Self { exterior, holes }
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        match self.exterior.locate(x, y) {
            Location::Outside => false,
            Location::Boundary => true,
            Location::Inside => self
                .holes
                .iter()
                .all(|hole| hole.locate(x, y) != Location::Inside),
        }
    }
}

/// Region geometry: a single polygon or the union of several.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Polygon(Polygon),
    MultiPolygon(Vec<Polygon>),
}

impl Geometry {
    pub fn polygons(&self) -> &[Polygon] {
        match self {
            Geometry::Polygon(p) => std::slice::from_ref(p),
            Geometry::MultiPolygon(ps) => ps,
        }
    }

    /// Whether (x, y) is inside any part, edges included.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        self.polygons().iter().any(|p| p.contains(x, y))
    }

    /// Extent of all exterior rings; `None` for an empty multipolygon.
    pub fn bounds(&self) -> Option<BoundingBox> {
        BoundingBox::from_points(
            self.polygons()
                .iter()
                .flat_map(|p| p.exterior.points().iter().copied()),
        )
    }
}
