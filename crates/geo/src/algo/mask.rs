//! Rasterization of vector geometries onto the pixel grid of a raster.
//!
//! Geometries are converted to fractional pixel coordinates using the inverse affine transform.
//! Polygons are filled with an even-odd scanline over the pixel centers, a center on an edge
//! belongs to the polygon when the edge is a left or top edge. In `all_touched` mode every pixel
//! crossed by a polygon boundary is added as well. Lines and points are always burned.

use geo_types::{Coord, Geometry, Polygon};
use ndarray::Array2;

use crate::{CoordinateTransformer, Crs, Error, GeoReference, Point, Result};

type PixelCoord = (f64, f64);

#[derive(Default)]
struct Shapes {
    polygons: Vec<Vec<Vec<Coord<f64>>>>,
    lines: Vec<Vec<Coord<f64>>>,
    points: Vec<Coord<f64>>,
}

impl Shapes {
    fn add_polygon(&mut self, polygon: &Polygon<f64>) {
        let mut rings = vec![polygon.exterior().0.clone()];
        rings.extend(polygon.interiors().iter().map(|ring| ring.0.clone()));
        self.polygons.push(rings);
    }

    fn add(&mut self, geometry: &Geometry<f64>) {
        match geometry {
            Geometry::Point(p) => self.points.push(p.0),
            Geometry::MultiPoint(mp) => self.points.extend(mp.0.iter().map(|p| p.0)),
            Geometry::Line(line) => self.lines.push(vec![line.start, line.end]),
            Geometry::LineString(ls) => self.lines.push(ls.0.clone()),
            Geometry::MultiLineString(mls) => self.lines.extend(mls.0.iter().map(|ls| ls.0.clone())),
            Geometry::Polygon(polygon) => self.add_polygon(polygon),
            Geometry::MultiPolygon(mp) => mp.0.iter().for_each(|polygon| self.add_polygon(polygon)),
            Geometry::Rect(rect) => self.add_polygon(&rect.to_polygon()),
            Geometry::Triangle(triangle) => self.add_polygon(&triangle.to_polygon()),
            Geometry::GeometryCollection(gc) => gc.0.iter().for_each(|geometry| self.add(geometry)),
        }
    }

    fn coords_mut(&mut self) -> impl Iterator<Item = &mut Coord<f64>> {
        self.polygons
            .iter_mut()
            .flatten()
            .flatten()
            .chain(self.lines.iter_mut().flatten())
            .chain(self.points.iter_mut())
    }

    fn reproject(&mut self, coord_trans: &CoordinateTransformer) -> Result<()> {
        for coord in self.coords_mut() {
            let p = coord_trans.transform_point(Point::from(*coord))?;
            *coord = p.0;
        }

        Ok(())
    }

    /// Make geometries crossing the antimeridian continuous, and add copies shifted by 360 degrees
    /// for the parts that end up outside of [-180, 180]
    fn unwrap_antimeridian(&mut self) {
        let mut shifted_polygons = Vec::new();
        for rings in &mut self.polygons {
            rings.iter_mut().for_each(|ring| unwrap_longitudes(ring));
            shifted_polygons.extend(
                wrap_offsets(rings.iter().flatten())
                    .map(|offset| rings.iter().map(|ring| shift_longitudes(ring, offset)).collect::<Vec<_>>()),
            );
        }
        self.polygons.extend(shifted_polygons);

        let mut shifted_lines = Vec::new();
        for line in &mut self.lines {
            unwrap_longitudes(line);
            shifted_lines.extend(wrap_offsets(line.iter()).map(|offset| shift_longitudes(line, offset)));
        }
        self.lines.extend(shifted_lines);
    }
}

fn unwrap_longitudes(coords: &mut [Coord<f64>]) {
    for i in 1..coords.len() {
        let previous = coords[i - 1].x;
        while coords[i].x - previous > 180.0 {
            coords[i].x -= 360.0;
        }
        while coords[i].x - previous < -180.0 {
            coords[i].x += 360.0;
        }
    }
}

fn wrap_offsets<'a>(coords: impl Iterator<Item = &'a Coord<f64>>) -> impl Iterator<Item = f64> {
    let (min_x, max_x) = coords.fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), c| (min.min(c.x), max.max(c.x)));
    [(min_x < -180.0).then_some(360.0), (max_x > 180.0).then_some(-360.0)]
        .into_iter()
        .flatten()
}

fn shift_longitudes(coords: &[Coord<f64>], offset: f64) -> Vec<Coord<f64>> {
    coords.iter().map(|c| Coord { x: c.x + offset, y: c.y }).collect()
}

/// The edges of a ring, the ring is closed when needed
fn ring_edges(ring: &[PixelCoord]) -> impl Iterator<Item = (PixelCoord, PixelCoord)> + '_ {
    let closing = match (ring.first(), ring.last()) {
        (Some(first), Some(last)) if ring.len() > 2 && first != last => Some((*last, *first)),
        _ => None,
    };

    ring.windows(2).map(|w| (w[0], w[1])).chain(closing)
}

/// Even-odd fill of a polygon, a pixel is set when its center is inside
fn fill_polygon(rings: &[Vec<PixelCoord>], mask: &mut Array2<bool>) {
    let (rows, cols) = mask.dim();
    let (min_y, max_y) = rings
        .iter()
        .flatten()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), p| (min.min(p.1), max.max(p.1)));

    let row_start = (min_y - 0.5).ceil().max(0.0);
    let row_end = ((max_y - 0.5).floor() + 1.0).min(rows as f64);
    if !(row_start.is_finite() && row_end.is_finite()) || row_end <= row_start {
        return;
    }

    let mut crossings = Vec::new();
    for row in row_start as usize..row_end as usize {
        let y = row as f64 + 0.5;
        crossings.clear();
        for ring in rings {
            for (a, b) in ring_edges(ring) {
                if (a.1 <= y) != (b.1 <= y) {
                    crossings.push(a.0 + (y - a.1) * (b.0 - a.0) / (b.1 - a.1));
                }
            }
        }

        crossings.sort_by(f64::total_cmp);
        for span in crossings.chunks_exact(2) {
            let col_start = (span[0] - 0.5).ceil().max(0.0);
            let col_end = (span[1] - 0.5).ceil().min(cols as f64);
            if col_end > col_start {
                for col in col_start as usize..col_end as usize {
                    mask[[row, col]] = true;
                }
            }
        }
    }
}

/// Liang-Barsky clipping of a segment to the pixel extent
fn clip_segment(a: PixelCoord, b: PixelCoord, width: f64, height: f64) -> Option<(PixelCoord, PixelCoord)> {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let (mut t0, mut t1) = (0.0f64, 1.0f64);

    for (p, q) in [(-dx, a.0), (dx, width - a.0), (-dy, a.1), (dy, height - a.1)] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
        } else {
            let r = q / p;
            if p < 0.0 {
                if r > t1 {
                    return None;
                }
                t0 = t0.max(r);
            } else {
                if r < t0 {
                    return None;
                }
                t1 = t1.min(r);
            }
        }
    }

    Some(((a.0 + t0 * dx, a.1 + t0 * dy), (a.0 + t1 * dx, a.1 + t1 * dy)))
}

/// Set every pixel the segment passes through (Amanatides-Woo grid traversal)
fn burn_segment(a: PixelCoord, b: PixelCoord, mask: &mut Array2<bool>) {
    let (rows, cols) = mask.dim();
    if rows == 0 || cols == 0 || !(a.0.is_finite() && a.1.is_finite() && b.0.is_finite() && b.1.is_finite()) {
        return;
    }

    let Some((a, b)) = clip_segment(a, b, cols as f64, rows as f64) else {
        return;
    };

    let to_cell = |p: PixelCoord| {
        (
            (p.0.floor() as i64).clamp(0, cols as i64 - 1),
            (p.1.floor() as i64).clamp(0, rows as i64 - 1),
        )
    };

    let (mut col, mut row) = to_cell(a);
    let end = to_cell(b);
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);

    let axis_setup = |delta: f64, start: f64, cell: i64| -> (i64, f64, f64) {
        if delta > 0.0 {
            (1, ((cell + 1) as f64 - start) / delta, 1.0 / delta)
        } else if delta < 0.0 {
            (-1, (cell as f64 - start) / delta, -1.0 / delta)
        } else {
            (0, f64::INFINITY, f64::INFINITY)
        }
    };

    let (step_col, mut t_max_col, t_delta_col) = axis_setup(dx, a.0, col);
    let (step_row, mut t_max_row, t_delta_row) = axis_setup(dy, a.1, row);

    let max_steps = (end.0 - col).abs() + (end.1 - row).abs();
    for _ in 0..=max_steps {
        mask[[row as usize, col as usize]] = true;
        if (col, row) == end {
            break;
        }

        if t_max_col < t_max_row {
            col = (col + step_col).clamp(0, cols as i64 - 1);
            t_max_col += t_delta_col;
        } else {
            row = (row + step_row).clamp(0, rows as i64 - 1);
            t_max_row += t_delta_row;
        }
    }
}

/// A polygon edge exactly on a grid line only touches the pixel boundaries
fn on_grid_line(a: PixelCoord, b: PixelCoord) -> bool {
    (a.0 == b.0 && a.0.fract() == 0.0) || (a.1 == b.1 && a.1.fract() == 0.0)
}

fn burn_point(p: PixelCoord, mask: &mut Array2<bool>) {
    let (rows, cols) = mask.dim();
    let (col, row) = (p.0.floor(), p.1.floor());
    if col >= 0.0 && row >= 0.0 && (col as usize) < cols && (row as usize) < rows {
        mask[[row as usize, col as usize]] = true;
    }
}

/// Rasterize geometries onto the grid.
///
/// Returns `true` for the pixels covered by the geometries: the pixel center is inside a polygon,
/// or with `all_touched` any part of the pixel touches a polygon. With `invert` the complement is returned.
/// Geometries in a CRS different from the grid are reprojected first. On geographic grids geometries
/// crossing the antimeridian are handled.
pub fn geometry_mask(
    geometries: &[Geometry<f64>],
    geometry_crs: Option<&Crs>,
    grid: &GeoReference,
    all_touched: bool,
    invert: bool,
) -> Result<Array2<bool>> {
    let mut shapes = Shapes::default();
    geometries.iter().for_each(|geometry| shapes.add(geometry));

    if let Some(geometry_crs) = geometry_crs {
        let grid_crs = grid.crs().ok_or_else(|| {
            Error::MissingCrs("The geometries have a CRS but the raster has none, cannot reproject them".into())
        })?;

        if geometry_crs != grid_crs {
            log::debug!("Reprojecting geometries from {geometry_crs} to {grid_crs}");
            shapes.reproject(&CoordinateTransformer::new(geometry_crs, grid_crs))?;
        }
    }

    if grid.crs().is_some_and(Crs::is_geographic) {
        shapes.unwrap_antimeridian();
    }

    let inv = grid.geo_transform().invert()?;
    let to_pixel = |c: &Coord<f64>| {
        let p = inv.apply(c.x, c.y);
        (p.x(), p.y())
    };
    let to_pixels = |coords: &[Coord<f64>]| coords.iter().map(to_pixel).collect::<Vec<_>>();

    let mut mask = Array2::from_elem((grid.rows(), grid.columns()), false);
    for rings in &shapes.polygons {
        let rings: Vec<Vec<PixelCoord>> = rings.iter().map(|ring| to_pixels(ring.as_slice())).collect();
        fill_polygon(&rings, &mut mask);

        if all_touched {
            for (a, b) in rings.iter().flat_map(|ring| ring_edges(ring)) {
                if !on_grid_line(a, b) {
                    burn_segment(a, b, &mut mask);
                }
            }
        }
    }

    for line in &shapes.lines {
        let line = to_pixels(line.as_slice());
        if line.len() == 1 {
            burn_point(line[0], &mut mask);
        }

        for segment in line.windows(2) {
            burn_segment(segment[0], segment[1], &mut mask);
        }
    }

    for point in &shapes.points {
        burn_point(to_pixel(point), &mut mask);
    }

    if invert {
        mask.mapv_inplace(|inside| !inside);
    }

    Ok(mask)
}

#[cfg(test)]
mod tests {
    use geo_types::{LineString, polygon};

    use super::*;
    use crate::{CellSize, RasterSize, crs::epsg, testutils};

    fn set_cells(mask: &Array2<bool>) -> Vec<(usize, usize)> {
        mask.indexed_iter().filter(|(_, v)| **v).map(|(idx, _)| idx).collect()
    }

    #[test]
    fn polygon_center_mask() {
        let grid = testutils::grid_10x10();
        let geometry = Geometry::Polygon(polygon![(x: 2.0, y: 2.0), (x: 4.0, y: 2.0), (x: 4.0, y: 4.0), (x: 2.0, y: 4.0)]);

        let mask = geometry_mask(&[geometry.clone()], None, &grid, false, false).unwrap();
        assert_eq!(set_cells(&mask), vec![(6, 2), (6, 3), (7, 2), (7, 3)]);

        let inverted = geometry_mask(&[geometry], None, &grid, false, true).unwrap();
        assert_eq!(inverted.iter().filter(|v| **v).count(), 96);
        assert!(mask.iter().zip(inverted.iter()).all(|(a, b)| a != b));
    }

    #[test]
    fn polygon_with_hole() {
        let grid = testutils::grid_10x10();
        let geometry = Geometry::Polygon(Polygon::new(
            LineString::from(vec![(1.0, 1.0), (6.0, 1.0), (6.0, 6.0), (1.0, 6.0), (1.0, 1.0)]),
            vec![LineString::from(vec![(3.0, 3.0), (4.0, 3.0), (4.0, 4.0), (3.0, 4.0), (3.0, 3.0)])],
        ));

        let mask = geometry_mask(&[geometry], None, &grid, false, false).unwrap();
        assert_eq!(mask.iter().filter(|v| **v).count(), 24);
        assert!(!mask[[6, 3]]);
    }

    #[test]
    fn all_touched_includes_boundary_pixels() {
        let grid = testutils::grid_10x10();
        let geometry = Geometry::Polygon(polygon![(x: 2.1, y: 2.1), (x: 2.4, y: 2.1), (x: 2.4, y: 2.4)]);

        let mask = geometry_mask(&[geometry.clone()], None, &grid, false, false).unwrap();
        assert!(set_cells(&mask).is_empty());

        let mask = geometry_mask(&[geometry], None, &grid, true, false).unwrap();
        assert_eq!(set_cells(&mask), vec![(7, 2)]);

        let geometry = Geometry::Polygon(polygon![(x: 2.0, y: 2.0), (x: 4.0, y: 2.0), (x: 4.0, y: 4.0), (x: 2.0, y: 4.0)]);
        let centers = geometry_mask(&[geometry.clone()], None, &grid, false, false).unwrap();
        let touched = geometry_mask(&[geometry], None, &grid, true, false).unwrap();
        assert!(centers.iter().zip(touched.iter()).all(|(c, t)| !c || *t));
    }

    #[test]
    fn lines_and_points_are_burned() {
        let grid = testutils::grid_10x10();
        let geometries = [
            Geometry::LineString(LineString::from(vec![(0.5, 9.5), (3.5, 9.5)])),
            Geometry::Point(Point::new(9.5, 0.5)),
        ];

        let mask = geometry_mask(&geometries, None, &grid, false, false).unwrap();
        assert_eq!(set_cells(&mask), vec![(0, 0), (0, 1), (0, 2), (0, 3), (9, 9)]);
    }

    #[test]
    fn antimeridian_crossing_polygon() {
        let grid = GeoReference::with_top_left_origin(
            Some(Crs::from_epsg(epsg::WGS84).unwrap()),
            RasterSize::with_rows_cols(2, 36),
            Point::new(-180.0, 10.0),
            CellSize::square(10.0),
        );

        let geometry = Geometry::Polygon(polygon![(x: 170.0, y: -8.0), (x: -170.0, y: -8.0), (x: -170.0, y: 8.0), (x: 170.0, y: 8.0)]);
        let mask = geometry_mask(&[geometry], None, &grid, false, false).unwrap();
        assert_eq!(set_cells(&mask), vec![(0, 0), (0, 35), (1, 0), (1, 35)]);
    }

    #[test]
    fn geometries_are_reprojected() {
        let grid = testutils::grid_10x10();
        let mercator = Crs::from_epsg(epsg::WGS84_WEB_MERCATOR).unwrap();
        let to_mercator = CoordinateTransformer::new(grid.crs().unwrap(), &mercator);

        let mut corners = [Point::new(2.0, 2.0), Point::new(4.0, 2.0), Point::new(4.0, 4.0), Point::new(2.0, 4.0)];
        to_mercator.transform_points_in_place(&mut corners).unwrap();
        let geometry = Geometry::Polygon(Polygon::new(LineString::from(corners.to_vec()), vec![]));

        let mask = geometry_mask(&[geometry], Some(&mercator), &grid, false, false).unwrap();
        assert_eq!(set_cells(&mask), vec![(6, 2), (6, 3), (7, 2), (7, 3)]);

        let no_crs = GeoReference::new(None, grid.raster_size(), grid.geo_transform());
        assert!(matches!(
            geometry_mask(&[], Some(&mercator), &no_crs, false, false),
            Err(Error::MissingCrs(_))
        ));
    }
}
