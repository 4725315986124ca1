//! Delaunay triangulation of integer lattice points.
//!
//! All geometric predicates are evaluated exactly in 128 bit integer arithmetic so the
//! triangulation is deterministic and robust for the regular grids produced by raster cells.

use std::collections::HashMap;

use crate::{Error, Result};

/// Coordinates beyond this range could overflow the exact predicates
const MAX_COORDINATE: i64 = 1 << 18;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LatticePoint {
    pub x: i64,
    pub y: i64,
}

impl LatticePoint {
    pub const fn new(x: i64, y: i64) -> Self {
        LatticePoint { x, y }
    }
}

/// Twice the signed area of the triangle abc, positive when counter clockwise
fn orient(a: LatticePoint, b: LatticePoint, c: LatticePoint) -> i128 {
    let (abx, aby) = ((b.x - a.x) as i128, (b.y - a.y) as i128);
    let (acx, acy) = ((c.x - a.x) as i128, (c.y - a.y) as i128);
    abx * acy - aby * acx
}

/// Positive when d lies strictly inside the circumcircle of the counter clockwise triangle abc
fn in_circle(a: LatticePoint, b: LatticePoint, c: LatticePoint, d: LatticePoint) -> i128 {
    let (adx, ady) = ((a.x - d.x) as i128, (a.y - d.y) as i128);
    let (bdx, bdy) = ((b.x - d.x) as i128, (b.y - d.y) as i128);
    let (cdx, cdy) = ((c.x - d.x) as i128, (c.y - d.y) as i128);

    let ad = adx * adx + ady * ady;
    let bd = bdx * bdx + bdy * bdy;
    let cd = cdx * cdx + cdy * cdy;

    ad * (bdx * cdy - cdx * bdy) + bd * (cdx * ady - adx * cdy) + cd * (adx * bdy - bdx * ady)
}

/// Delaunay triangulation produced by incremental Bowyer-Watson insertion.
///
/// The mesh is closed with ghost triangles to a vertex at infinity, so points outside of the current
/// hull are inserted exactly and the result covers the full convex hull of the input.
///
/// Triangles are stored as counter clockwise vertex index triples into [`Triangulation::points`].
/// Duplicate input points are merged, fewer than three non collinear points result in an empty triangulation.
#[derive(Debug, Clone, Default)]
pub struct Triangulation {
    points: Vec<LatticePoint>,
    triangles: Vec<[usize; 3]>,
}

impl Triangulation {
    pub fn new(points: &[LatticePoint]) -> Result<Self> {
        if let Some(p) = points.iter().find(|p| p.x.abs() > MAX_COORDINATE || p.y.abs() > MAX_COORDINATE) {
            return Err(Error::CoordinateOutOfRange {
                x: p.x,
                y: p.y,
                limit: MAX_COORDINATE,
            });
        }

        let mut unique = points.to_vec();
        unique.sort_unstable();
        unique.dedup();

        if unique.len() < 3 {
            return Ok(Triangulation {
                points: unique,
                triangles: Vec::new(),
            });
        }

        let triangles = delaunay(&unique);
        log::debug!("Triangulated {} points into {} triangles", unique.len(), triangles.len());

        Ok(Triangulation { points: unique, triangles })
    }

    pub fn points(&self) -> &[LatticePoint] {
        &self.points
    }

    pub fn triangles(&self) -> &[[usize; 3]] {
        &self.triangles
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Barycentric coordinates of (x, y) with respect to the triangle, `None` when the location is outside.
    pub fn barycentric(&self, triangle: &[usize; 3], x: f64, y: f64) -> Option<[f64; 3]> {
        const EPS: f64 = 1e-9;

        let [a, b, c] = triangle.map(|i| self.points[i]);
        let det = orient(a, b, c) as f64;
        if det == 0.0 {
            return None;
        }

        let (ax, ay) = (a.x as f64, a.y as f64);
        let (bx, by) = (b.x as f64, b.y as f64);
        let (cx, cy) = (c.x as f64, c.y as f64);

        let l1 = ((bx - x) * (cy - y) - (by - y) * (cx - x)) / det;
        let l2 = ((cx - x) * (ay - y) - (cy - y) * (ax - x)) / det;
        let l3 = 1.0 - l1 - l2;

        if l1 < -EPS || l2 < -EPS || l3 < -EPS {
            return None;
        }

        Some([l1.max(0.0), l2.max(0.0), l3.max(0.0)])
    }

    /// For every point the sorted indices of the points it shares a triangle edge with
    pub fn neighbours(&self) -> Vec<Vec<usize>> {
        let mut result = vec![Vec::new(); self.points.len()];
        for tri in &self.triangles {
            for k in 0..3 {
                let (i, j) = (tri[k], tri[(k + 1) % 3]);
                result[i].push(j);
                result[j].push(i);
            }
        }

        for adjacent in &mut result {
            adjacent.sort_unstable();
            adjacent.dedup();
        }

        result
    }
}

/// Vertex at infinity, every hull edge forms a ghost triangle `[a, b, GHOST]` with it
const GHOST: usize = usize::MAX;

/// Triangle mesh under construction, ghost triangles close it around the convex hull.
///
/// Triangles are never reused, removed triangles are only marked dead.
struct Mesh<'a> {
    points: &'a [LatticePoint],
    triangles: Vec<[usize; 3]>,
    alive: Vec<bool>,
    /// Directed edge to the triangle that contains it
    edges: HashMap<(usize, usize), usize>,
    last: usize,
}

impl<'a> Mesh<'a> {
    fn new(points: &'a [LatticePoint], a: usize, b: usize, c: usize) -> Self {
        let mut mesh = Mesh {
            points,
            triangles: Vec::with_capacity(points.len() * 8),
            alive: Vec::with_capacity(points.len() * 8),
            edges: HashMap::with_capacity(points.len() * 12),
            last: 0,
        };

        mesh.add([b, a, GHOST]);
        mesh.add([c, b, GHOST]);
        mesh.add([a, c, GHOST]);
        mesh.add([a, b, c]);
        mesh
    }

    fn add(&mut self, triangle: [usize; 3]) {
        let index = self.triangles.len();
        for k in 0..3 {
            self.edges.insert((triangle[k], triangle[(k + 1) % 3]), index);
        }
        self.triangles.push(triangle);
        self.alive.push(true);
        self.last = index;
    }

    fn remove(&mut self, index: usize) {
        let triangle = self.triangles[index];
        for k in 0..3 {
            let edge = (triangle[k], triangle[(k + 1) % 3]);
            if self.edges.get(&edge) == Some(&index) {
                self.edges.remove(&edge);
            }
        }
        self.alive[index] = false;
    }

    /// The triangle on the other side of the directed edge a -> b
    fn neighbour(&self, a: usize, b: usize) -> Option<usize> {
        self.edges.get(&(b, a)).copied()
    }

    /// True when p lies strictly inside the circumcircle of the triangle.
    ///
    /// The circumcircle of a ghost triangle is the open half plane outside of its hull edge plus the open edge itself.
    fn in_conflict(&self, index: usize, p: LatticePoint) -> bool {
        let [a, b, c] = self.triangles[index];
        let (pa, pb) = (self.points[a], self.points[b]);
        if c == GHOST {
            match orient(pa, pb, p) {
                o if o > 0 => true,
                0 => strictly_between(pa, pb, p),
                _ => false,
            }
        } else {
            in_circle(pa, pb, self.points[c], p) > 0
        }
    }

    /// Walk from the last created triangle towards p until a triangle in conflict with p is found
    fn locate(&self, p: LatticePoint) -> Option<usize> {
        let mut current = self.last;
        for _ in 0..self.triangles.len() {
            let triangle = self.triangles[current];
            if triangle[2] == GHOST {
                if self.in_conflict(current, p) {
                    return Some(current);
                }

                current = self.neighbour(triangle[0], triangle[1])?;
                continue;
            }

            let exit = (0..3)
                .map(|k| (triangle[k], triangle[(k + 1) % 3]))
                .find(|&(a, b)| orient(self.points[a], self.points[b], p) < 0);

            match exit {
                Some((a, b)) => current = self.neighbour(a, b)?,
                None => return Some(current),
            }
        }

        log::debug!("Walk did not converge for ({}, {}), scanning all triangles", p.x, p.y);
        (0..self.triangles.len()).find(|&index| self.alive[index] && self.in_conflict(index, p))
    }

    fn insert(&mut self, index: usize) {
        let p = self.points[index];
        let Some(start) = self.locate(p) else {
            log::warn!("No triangle found for point ({}, {})", p.x, p.y);
            return;
        };

        let mut cavity = vec![start];
        let mut stack = vec![start];
        let mut boundary = Vec::new();
        while let Some(current) = stack.pop() {
            let triangle = self.triangles[current];
            for k in 0..3 {
                let (a, b) = (triangle[k], triangle[(k + 1) % 3]);
                match self.neighbour(a, b) {
                    Some(n) if cavity.contains(&n) => {}
                    Some(n) if self.in_conflict(n, p) => {
                        cavity.push(n);
                        stack.push(n);
                    }
                    _ => boundary.push((a, b)),
                }
            }
        }

        for &triangle in &cavity {
            self.remove(triangle);
        }

        for (a, b) in boundary {
            if a == GHOST {
                self.add([b, index, GHOST]);
            } else if b == GHOST {
                self.add([index, a, GHOST]);
            } else {
                self.add([a, b, index]);
            }
        }
    }

    fn into_triangles(self) -> Vec<[usize; 3]> {
        let mut triangles: Vec<[usize; 3]> = self
            .triangles
            .into_iter()
            .zip(self.alive)
            .filter(|(t, alive)| *alive && t[2] != GHOST)
            .map(|(t, _)| t)
            .collect();
        triangles.sort_unstable();
        triangles
    }
}

/// True when p lies on the open segment ab, p is assumed to be collinear with a and b
fn strictly_between(a: LatticePoint, b: LatticePoint, p: LatticePoint) -> bool {
    let (abx, aby) = ((b.x - a.x) as i128, (b.y - a.y) as i128);
    let (apx, apy) = ((p.x - a.x) as i128, (p.y - a.y) as i128);
    let dot = abx * apx + aby * apy;
    dot > 0 && dot < abx * abx + aby * aby
}

/// Incremental Delaunay triangulation of distinct sorted points
fn delaunay(points: &[LatticePoint]) -> Vec<[usize; 3]> {
    let Some(third) = (2..points.len()).find(|&i| orient(points[0], points[1], points[i]) != 0) else {
        return Vec::new();
    };

    let (a, b, c) = if orient(points[0], points[1], points[third]) > 0 {
        (0, 1, third)
    } else {
        (0, third, 1)
    };

    let mut mesh = Mesh::new(points, a, b, c);
    for index in (0..points.len()).filter(|&i| i != a && i != b && i != c) {
        mesh.insert(index);
    }

    mesh.into_triangles()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn lattice(coords: &[(i64, i64)]) -> Vec<LatticePoint> {
        coords.iter().map(|&(x, y)| LatticePoint::new(x, y)).collect()
    }

    #[test]
    fn square_is_split_in_two_triangles() {
        let tri = Triangulation::new(&lattice(&[(0, 0), (2, 0), (2, 2), (0, 2)])).unwrap();
        assert_eq!(tri.triangles().len(), 2);

        for t in tri.triangles() {
            let [a, b, c] = t.map(|i| tri.points()[i]);
            assert!(orient(a, b, c) > 0);
        }
    }

    #[test]
    fn collinear_and_duplicate_points_produce_no_triangles() {
        let tri = Triangulation::new(&lattice(&[(0, 0), (1, 1), (2, 2), (1, 1)])).unwrap();
        assert!(tri.is_empty());
        assert_eq!(tri.points().len(), 3);
    }

    #[test_log::test]
    fn triangles_satisfy_the_delaunay_property() {
        let pts = lattice(&[(0, 0), (5, 0), (9, 1), (1, 4), (4, 4), (8, 6), (0, 9), (5, 9), (9, 9), (3, 7)]);
        let tri = Triangulation::new(&pts).unwrap();
        assert!(!tri.is_empty());

        for t in tri.triangles() {
            let [a, b, c] = t.map(|i| tri.points()[i]);
            for &p in tri.points() {
                assert!(in_circle(a, b, c, p) <= 0, "{p:?} inside circumcircle of {t:?}");
            }
        }
    }

    /// Strict convex hull, counter clockwise
    fn convex_hull(points: &[LatticePoint]) -> Vec<LatticePoint> {
        let mut sorted = points.to_vec();
        sorted.sort_unstable();
        sorted.dedup();

        let mut hull: Vec<LatticePoint> = Vec::new();
        for pass in [sorted.clone(), sorted.into_iter().rev().collect()] {
            let start = hull.len();
            for p in pass {
                while hull.len() >= start + 2 && orient(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0 {
                    hull.pop();
                }
                hull.push(p);
            }
            hull.pop();
        }
        hull
    }

    /// Number of points on the hull boundary, collinear boundary points included
    fn boundary_point_count(points: &[LatticePoint], hull: &[LatticePoint]) -> usize {
        points
            .iter()
            .filter(|&&p| {
                (0..hull.len()).any(|i| {
                    let (a, b) = (hull[i], hull[(i + 1) % hull.len()]);
                    p == a || (orient(a, b, p) == 0 && strictly_between(a, b, p))
                })
            })
            .count()
    }

    fn assert_covers_the_hull(points: &[LatticePoint]) {
        let tri = Triangulation::new(points).unwrap();
        let hull = convex_hull(points);
        let n = tri.points().len();
        let h = boundary_point_count(tri.points(), &hull);
        assert_eq!(tri.triangles().len(), 2 * n - h - 2, "n={n} h={h}");

        let hull_area: i128 = (1..hull.len() - 1).map(|i| orient(hull[0], hull[i], hull[i + 1])).sum();
        let triangle_area: i128 = tri
            .triangles()
            .iter()
            .map(|t| {
                let [a, b, c] = t.map(|i| tri.points()[i]);
                let area = orient(a, b, c);
                assert!(area > 0);
                area
            })
            .sum();
        assert_eq!(triangle_area, hull_area);
    }

    #[test_log::test]
    fn flat_point_set_is_fully_triangulated() {
        let mut pts: Vec<LatticePoint> = (0..200).map(|i| LatticePoint::new(i * 1000, i * (199 - i))).collect();
        pts.push(LatticePoint::new(99_500, 200_000));
        assert_covers_the_hull(&pts);

        let tri = Triangulation::new(&pts).unwrap();
        assert_eq!(tri.triangles().len(), 397);
        for t in tri.triangles() {
            let [a, b, c] = t.map(|i| tri.points()[i]);
            assert!(tri.points().iter().all(|&p| in_circle(a, b, c, p) <= 0));
        }
    }

    #[test]
    fn regular_grid_is_fully_triangulated() {
        let pts: Vec<LatticePoint> = (0..5).flat_map(|x| (0..5).map(move |y| LatticePoint::new(x, y))).collect();
        assert_covers_the_hull(&pts);
        assert_eq!(Triangulation::new(&pts).unwrap().triangles().len(), 32);
    }

    #[test]
    fn collinear_prefix_is_triangulated() {
        let pts = lattice(&[(0, 0), (1, 0), (2, 0), (3, 0), (1, 5)]);
        assert_covers_the_hull(&pts);
        assert_eq!(Triangulation::new(&pts).unwrap().triangles().len(), 3);
    }

    #[test]
    fn barycentric_coordinates() {
        let tri = Triangulation::new(&lattice(&[(0, 0), (4, 0), (0, 4)])).unwrap();
        let triangle = tri.triangles()[0];

        let bary = tri.barycentric(&triangle, 1.0, 1.0).unwrap();
        assert_relative_eq!(bary.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
        assert!(tri.barycentric(&triangle, 3.0, 3.0).is_none());

        let neighbours = tri.neighbours();
        assert!(neighbours.iter().all(|n| n.len() == 2));
    }

    #[test]
    fn out_of_range_coordinates_are_rejected() {
        assert!(matches!(
            Triangulation::new(&lattice(&[(0, 0), (1 << 30, 0), (0, 1)])),
            Err(Error::CoordinateOutOfRange { x: 1073741824, y: 0, .. })
        ));
    }
}
