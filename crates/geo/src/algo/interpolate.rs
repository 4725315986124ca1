//! Filling of nodata cells by scattered data interpolation.
//!
//! The control points are the valid cells that border a nodata cell. Nearest neighbour fills a
//! cell with the value of the closest control point, linear and cubic interpolate on the Delaunay
//! triangulation of the control points and leave cells outside of its convex hull untouched.

use std::str::FromStr;

use inf::{
    LatticePoint, Triangulation,
    interpolate::{PatchVertex, cubic_triangle_patch, plane_gradient},
};
use ndarray::{Array2, ArrayView2};

use crate::{ArrayNum, Cell, Error, RasterArray, RasterConfig, RasterDataset, Result, chunk::map_spatial_planes, nodata::is_missing};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum InterpolationMethod {
    #[default]
    Nearest,
    Linear,
    Cubic,
}

impl FromStr for InterpolationMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nearest" => Ok(InterpolationMethod::Nearest),
            "linear" => Ok(InterpolationMethod::Linear),
            "cubic" => Ok(InterpolationMethod::Cubic),
            _ => Err(Error::InvalidArgument(format!("Unsupported interpolation method: {s}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InterpolateOptions {
    pub method: InterpolationMethod,
    /// Cells further than this number of pixels from a valid cell are not filled
    pub max_search_distance: Option<f64>,
}

#[derive(Debug, Clone, Copy)]
struct ControlPoint {
    cell: Cell,
    value: f64,
}

/// Spatial bucket index over the control points for nearest neighbour queries
struct ControlIndex {
    bucket_size: usize,
    bucket_rows: usize,
    bucket_cols: usize,
    buckets: Vec<Vec<usize>>,
}

impl ControlIndex {
    fn new(controls: &[ControlPoint], rows: usize, cols: usize) -> Self {
        let density = (rows * cols) as f64 / controls.len().max(1) as f64;
        let bucket_size = (density.sqrt().ceil() as usize).max(1);
        let bucket_rows = rows.div_ceil(bucket_size).max(1);
        let bucket_cols = cols.div_ceil(bucket_size).max(1);

        let mut buckets = vec![Vec::new(); bucket_rows * bucket_cols];
        for (i, control) in controls.iter().enumerate() {
            let br = control.cell.row as usize / bucket_size;
            let bc = control.cell.col as usize / bucket_size;
            buckets[br * bucket_cols + bc].push(i);
        }

        ControlIndex {
            bucket_size,
            bucket_rows,
            bucket_cols,
            buckets,
        }
    }

    /// Index and distance of the nearest control point
    fn nearest(&self, controls: &[ControlPoint], cell: Cell) -> Option<(usize, f64)> {
        let br = cell.row / self.bucket_size as i64;
        let bc = cell.col / self.bucket_size as i64;
        let max_ring = self.bucket_rows.max(self.bucket_cols) as i64;

        let mut best: Option<(usize, f64)> = None;
        for ring in 0..=max_ring {
            for r in (br - ring)..=(br + ring) {
                for c in (bc - ring)..=(bc + ring) {
                    let on_ring = (r - br).abs() == ring || (c - bc).abs() == ring;
                    if !on_ring || r < 0 || c < 0 || r >= self.bucket_rows as i64 || c >= self.bucket_cols as i64 {
                        continue;
                    }

                    for &i in &self.buckets[r as usize * self.bucket_cols + c as usize] {
                        let distance = cell.distance(&controls[i].cell);
                        if best.is_none_or(|(_, d)| distance < d) {
                            best = Some((i, distance));
                        }
                    }
                }
            }

            // Points in the next rings are further than `ring` buckets away
            if best.is_some_and(|(_, d)| d <= (ring as usize * self.bucket_size) as f64) {
                break;
            }
        }

        best
    }
}

struct PlaneInterpolator<'a, T> {
    plane: ArrayView2<'a, T>,
    missing: Array2<bool>,
    controls: Vec<ControlPoint>,
    index: ControlIndex,
    max_search_distance: Option<f64>,
}

impl<'a, T: ArrayNum> PlaneInterpolator<'a, T> {
    /// `None` when there is nothing to interpolate: no nodata cells, or no valid cells
    fn new(plane: ArrayView2<'a, T>, nodata: Option<f64>, max_search_distance: Option<f64>) -> Option<Self> {
        let (rows, cols) = plane.dim();
        let missing = plane.map(|v| is_missing(*v, nodata));
        let missing_count = missing.iter().filter(|m| **m).count();
        if missing_count == 0 || missing_count == rows * cols {
            return None;
        }

        let mut controls = Vec::new();
        for ((row, col), value) in plane.indexed_iter() {
            if missing[[row, col]] {
                continue;
            }

            let cell = Cell::from_row_col(row as i64, col as i64);
            let borders_missing = cell.neighbours().any(|n| {
                n.is_valid() && (n.row as usize) < rows && (n.col as usize) < cols && missing[[n.row as usize, n.col as usize]]
            });

            if borders_missing {
                controls.push(ControlPoint {
                    cell,
                    value: value.to_f64().unwrap_or(f64::NAN),
                });
            }
        }

        // Same ordering as the triangulation vertices
        controls.sort_unstable_by_key(|c| (c.cell.col, c.cell.row));

        let index = ControlIndex::new(&controls, rows, cols);
        Some(PlaneInterpolator {
            plane,
            missing,
            controls,
            index,
            max_search_distance,
        })
    }

    fn within_search_distance(&self, cell: Cell) -> bool {
        match self.max_search_distance {
            Some(max) => self.index.nearest(&self.controls, cell).is_some_and(|(_, d)| d <= max),
            None => true,
        }
    }

    fn missing_cells(&self) -> impl Iterator<Item = Cell> + '_ {
        self.missing
            .indexed_iter()
            .filter(|(_, missing)| **missing)
            .map(|((row, col), _)| Cell::from_row_col(row as i64, col as i64))
    }

    fn nearest(&self) -> Array2<T> {
        let mut result = self.plane.to_owned();
        for cell in self.missing_cells() {
            if let Some((i, distance)) = self.index.nearest(&self.controls, cell) {
                if self.max_search_distance.is_none_or(|max| distance <= max) {
                    result[[cell.row as usize, cell.col as usize]] = T::from_f64_saturating(self.controls[i].value);
                }
            }
        }

        result
    }

    fn triangulate(&self) -> Result<Triangulation> {
        let points: Vec<LatticePoint> = self.controls.iter().map(|c| LatticePoint::new(c.cell.col, c.cell.row)).collect();
        let triangulation = Triangulation::new(&points)?;
        debug_assert_eq!(triangulation.points(), points.as_slice());
        Ok(triangulation)
    }

    /// Evaluate `f` for every missing cell inside a triangle of the triangulation
    fn fill_triangles(&self, triangulation: &Triangulation, f: impl Fn(&[usize; 3], [f64; 3]) -> f64) -> Array2<T> {
        let mut result = self.plane.to_owned();
        let mut done = Array2::from_elem(self.missing.dim(), false);

        for triangle in triangulation.triangles() {
            let vertices = triangle.map(|i| triangulation.points()[i]);
            let (min_x, max_x) = (vertices.iter().map(|p| p.x).min(), vertices.iter().map(|p| p.x).max());
            let (min_y, max_y) = (vertices.iter().map(|p| p.y).min(), vertices.iter().map(|p| p.y).max());
            let (Some(min_x), Some(max_x), Some(min_y), Some(max_y)) = (min_x, max_x, min_y, max_y) else {
                continue;
            };

            for row in min_y..=max_y {
                for col in min_x..=max_x {
                    let (r, c) = (row as usize, col as usize);
                    if !self.missing[[r, c]] || done[[r, c]] {
                        continue;
                    }

                    let Some(bary) = triangulation.barycentric(triangle, col as f64, row as f64) else {
                        continue;
                    };

                    done[[r, c]] = true;
                    if self.within_search_distance(Cell::from_row_col(row, col)) {
                        result[[r, c]] = T::from_f64_saturating(f(triangle, bary));
                    }
                }
            }
        }

        result
    }

    fn linear(&self) -> Result<Array2<T>> {
        let triangulation = self.triangulate()?;
        Ok(self.fill_triangles(&triangulation, |triangle, bary| {
            triangle
                .iter()
                .zip(bary)
                .map(|(&i, weight)| self.controls[i].value * weight)
                .sum()
        }))
    }

    fn cubic(&self) -> Result<Array2<T>> {
        let triangulation = self.triangulate()?;

        let gradients: Vec<(f64, f64)> = triangulation
            .neighbours()
            .iter()
            .enumerate()
            .map(|(i, adjacent)| {
                let origin = &self.controls[i];
                plane_gradient(adjacent.iter().map(|&j| {
                    let other = &self.controls[j];
                    (
                        (other.cell.col - origin.cell.col) as f64,
                        (other.cell.row - origin.cell.row) as f64,
                        other.value - origin.value,
                    )
                }))
            })
            .collect();

        Ok(self.fill_triangles(&triangulation, |triangle, bary| {
            let vertices = triangle.map(|i| PatchVertex {
                x: self.controls[i].cell.col as f64,
                y: self.controls[i].cell.row as f64,
                value: self.controls[i].value,
                gradient: gradients[i],
            });
            cubic_triangle_patch(&vertices, bary)
        }))
    }
}

fn interpolate_plane<T: ArrayNum>(plane: ArrayView2<T>, nodata: Option<f64>, opts: &InterpolateOptions) -> Result<Array2<T>> {
    let Some(interpolator) = PlaneInterpolator::new(plane.view(), nodata, opts.max_search_distance) else {
        return Ok(plane.to_owned());
    };

    match opts.method {
        InterpolationMethod::Nearest => Ok(interpolator.nearest()),
        InterpolationMethod::Linear => interpolator.linear(),
        InterpolationMethod::Cubic => interpolator.cubic(),
    }
}

/// Fill the nodata cells of every spatial plane by interpolating from the surrounding valid cells.
///
/// Valid cells are never modified. Planes without nodata cells or without valid cells are returned unchanged.
pub fn interpolate_na<T: ArrayNum>(arr: &RasterArray<T>, opts: &InterpolateOptions, cfg: &RasterConfig) -> Result<RasterArray<T>> {
    if opts.max_search_distance.is_some_and(|d| d.is_nan() || d < 0.0) {
        return Err(Error::InvalidArgument(format!(
            "Invalid maximum search distance: {:?}",
            opts.max_search_distance
        )));
    }

    let nodata = arr.nodata();
    let data = map_spatial_planes(arr, cfg, arr.raster_size(cfg)?, |plane| interpolate_plane(plane, nodata, opts))?;
    Ok(arr.derive(data))
}

pub fn interpolate_na_dataset<T: ArrayNum>(ds: &RasterDataset<T>, opts: &InterpolateOptions, cfg: &RasterConfig) -> Result<RasterDataset<T>> {
    ds.try_map_spatial(cfg, |arr| interpolate_na(arr, opts, cfg))
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::testutils::{self, NOD};

    fn interpolate(arr: &RasterArray<f64>, method: InterpolationMethod, max_search_distance: Option<f64>) -> RasterArray<f64> {
        let opts = InterpolateOptions {
            method,
            max_search_distance,
        };
        interpolate_na(arr, &opts, &RasterConfig::default()).unwrap()
    }

    #[test]
    fn linear_surface_is_reproduced() {
        let cfg = RasterConfig::default();
        let grid = testutils::grid_10x10();
        let arr = testutils::raster_from_fn::<f64>(&grid, &cfg, |row, col| {
            if (3..6).contains(&row) && (2..7).contains(&col) {
                f64::NAN
            } else {
                2.0 * row as f64 + col as f64
            }
        });

        for method in [InterpolationMethod::Linear, InterpolationMethod::Cubic] {
            let filled = interpolate(&arr, method, None);
            for row in 3..6 {
                for col in 2..7 {
                    assert_relative_eq!(filled.data()[[row, col]], 2.0 * row as f64 + col as f64, epsilon = 1e-9);
                }
            }
        }
    }

    #[test]
    fn nearest_fill() {
        let cfg = RasterConfig::default();
        let grid = testutils::grid_10x10();
        let mut values = vec![1.0; 100];
        values[..50].iter_mut().for_each(|v| *v = 7.0);
        values[22] = NOD;
        values[77] = NOD;
        let arr = testutils::raster_from_values::<f64>(&grid, &cfg, &values);

        let filled = interpolate(&arr, InterpolationMethod::Nearest, None);
        assert_eq!(filled.data()[[2, 2]], 7.0);
        assert_eq!(filled.data()[[7, 7]], 1.0);
        assert!(filled.data().iter().all(|v| !v.is_nan()));
    }

    #[test]
    fn max_search_distance() {
        let cfg = RasterConfig::default();
        let grid = testutils::grid_10x10();
        let arr = testutils::raster_from_fn::<f64>(&grid, &cfg, |_, col| if col < 5 { 3.0 } else { f64::NAN });

        let filled = interpolate(&arr, InterpolationMethod::Nearest, Some(2.0));
        assert_eq!(filled.data()[[0, 5]], 3.0);
        assert_eq!(filled.data()[[0, 6]], 3.0);
        assert!(filled.data()[[0, 7]].is_nan());
        assert!(filled.data()[[9, 9]].is_nan());
    }

    #[test]
    fn max_search_distance_limits_triangle_fills() {
        let cfg = RasterConfig::default();
        let grid = testutils::grid_10x10();
        let arr = testutils::raster_from_fn::<f64>(&grid, &cfg, |row, col| {
            if (2..8).contains(&row) && (2..8).contains(&col) {
                f64::NAN
            } else {
                2.0 * row as f64 + col as f64
            }
        });

        for method in [InterpolationMethod::Linear, InterpolationMethod::Cubic] {
            let filled = interpolate(&arr, method, Some(1.5));
            // One cell away from the valid ring
            assert_relative_eq!(filled.data()[[2, 2]], 6.0, epsilon = 1e-9);
            assert_relative_eq!(filled.data()[[2, 5]], 9.0, epsilon = 1e-9);
            assert_relative_eq!(filled.data()[[7, 6]], 20.0, epsilon = 1e-9);
            // Two or more cells away
            assert!(filled.data()[[3, 3]].is_nan());
            assert!(filled.data()[[4, 4]].is_nan());
            assert!(filled.data()[[5, 4]].is_nan());

            let unlimited = interpolate(&arr, method, None);
            assert_relative_eq!(unlimited.data()[[4, 4]], 12.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn outside_the_hull_is_untouched() {
        let cfg = RasterConfig::default();
        let grid = testutils::grid_10x10();
        let arr = testutils::raster_from_fn::<f64>(&grid, &cfg, |_, col| if col < 5 { col as f64 } else { f64::NAN });

        let filled = interpolate(&arr, InterpolationMethod::Linear, None);
        // The control points are all on column 4, the hull is degenerate
        assert!(filled.data()[[0, 5]].is_nan());
        assert_eq!(filled.data()[[0, 4]], 4.0);
    }

    #[test]
    fn nothing_to_interpolate() {
        let cfg = RasterConfig::default();
        let full = testutils::raster_10x10::<f64>(&cfg);
        assert_eq!(interpolate(&full, InterpolationMethod::Linear, None).data(), full.data());

        let empty = testutils::raster_from_fn::<f64>(&testutils::grid_10x10(), &cfg, |_, _| f64::NAN);
        let result = interpolate(&empty, InterpolationMethod::Nearest, None);
        assert!(result.data().iter().all(|v| v.is_nan()));
    }

    #[test]
    fn integer_planes_use_the_nodata_value() {
        let cfg = RasterConfig::default();
        let grid = testutils::grid_10x10();
        let mut values = vec![10.0; 100];
        values[33] = NOD;
        let arr = testutils::raster_from_values::<u8>(&grid, &cfg, &values);

        let opts = InterpolateOptions {
            method: InterpolationMethod::Linear,
            max_search_distance: None,
        };
        let filled = interpolate_na(&arr, &opts, &cfg).unwrap();
        assert_eq!(filled.data()[[3, 3]], 10);
        assert_eq!(filled.nodata(), Some(NOD));
    }

    #[test]
    fn interpolation_is_idempotent() {
        let cfg = RasterConfig::default();
        let grid = testutils::grid_10x10();
        let arr = testutils::raster_from_fn::<f64>(&grid, &cfg, |row, col| {
            if row == col || (row > 6 && col < 3) { f64::NAN } else { (row * col) as f64 }
        });

        for method in [InterpolationMethod::Nearest, InterpolationMethod::Linear, InterpolationMethod::Cubic] {
            let once = interpolate(&arr, method, None);
            let twice = interpolate(&once, method, None);
            for (a, b) in once.data().iter().zip(twice.data().iter()) {
                assert!(a == b || (a.is_nan() && b.is_nan()));
            }

            // Valid cells are never altered
            for (a, b) in arr.data().iter().zip(once.data().iter()) {
                assert!(a.is_nan() || a == b);
            }
        }
    }

    #[test]
    fn parse_method() {
        assert_eq!("Cubic".parse::<InterpolationMethod>().unwrap(), InterpolationMethod::Cubic);
        assert!("spline".parse::<InterpolationMethod>().is_err());
    }
}
