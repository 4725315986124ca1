//! Grid to grid warping of spatial planes.
//!
//! The source pixel location of every destination pixel center is computed once per warp.
//! Along each destination row the coordinate transformation is only evaluated exactly where
//! linear interpolation between already transformed points deviates more than the error
//! threshold, all planes of the array are then sampled through the same pixel map.

use inf::interpolate::lerp;
use ndarray::{Array2, ArrayView2};

use crate::{
    ArrayNum, Cell, CoordinateTransformer, GeoReference, GeoTransform, Point, Result,
    algo::resample::{Resampling, sample},
    point,
};

/// Default linear interpolation threshold, in source pixels
pub const DEFAULT_ERROR_THRESHOLD: f64 = 0.125;

/// Source pixel locations of the destination pixel centers, NaN where the transformation failed
pub(crate) struct PixelMap {
    x: Array2<f64>,
    y: Array2<f64>,
    scale: Option<Array2<(f64, f64)>>,
}

struct RowMapper<'a> {
    dst: &'a GeoReference,
    src_inverse: GeoTransform,
    coord_trans: &'a CoordinateTransformer,
    error_threshold: f64,
}

impl RowMapper<'_> {
    fn exact(&self, row: usize, col: usize) -> Option<Point> {
        let world = self.dst.cell_center(Cell::from_row_col(row as i64, col as i64));
        let src_world = self.coord_trans.try_transform_point(world)?;
        Some(self.src_inverse.apply(src_world.x(), src_world.y()))
    }

    fn map_row(&self, row: usize, xs: &mut [f64], ys: &mut [f64]) {
        let cols = xs.len();
        if cols == 0 {
            return;
        }

        if self.error_threshold <= 0.0 || cols <= 2 {
            for col in 0..cols {
                self.store(col, self.exact(row, col), xs, ys);
            }
            return;
        }

        let start = self.exact(row, 0);
        let end = self.exact(row, cols - 1);
        self.subdivide_segment(row, 0, cols - 1, start, end, xs, ys);
    }

    fn store(&self, col: usize, point: Option<Point>, xs: &mut [f64], ys: &mut [f64]) {
        let (x, y) = point.map_or((f64::NAN, f64::NAN), |p| (p.x(), p.y()));
        xs[col] = x;
        ys[col] = y;
    }

    /// Recursively subdivide the segment until linear interpolation is accurate enough
    #[allow(clippy::too_many_arguments)]
    fn subdivide_segment(
        &self,
        row: usize,
        start_col: usize,
        end_col: usize,
        start: Option<Point>,
        end: Option<Point>,
        xs: &mut [f64],
        ys: &mut [f64],
    ) {
        self.store(start_col, start, xs, ys);
        self.store(end_col, end, xs, ys);
        if end_col - start_col < 2 {
            return;
        }

        let middle_col = (start_col + end_col) / 2;
        let middle = self.exact(row, middle_col);

        if let (Some(start_pixel), Some(middle_pixel), Some(end_pixel)) = (start, middle, end) {
            let span = (end_col - start_col) as f64;
            let t = (middle_col - start_col) as f64 / span;
            let interpolated_middle = linear_interpolate(start_pixel, end_pixel, t);

            if point::euclidean_distance(middle_pixel, interpolated_middle) < self.error_threshold {
                for col in start_col + 1..end_col {
                    let t = (col - start_col) as f64 / span;
                    self.store(col, Some(linear_interpolate(start_pixel, end_pixel, t)), xs, ys);
                }
                return;
            }
        }

        self.subdivide_segment(row, start_col, middle_col, start, middle, xs, ys);
        self.subdivide_segment(row, middle_col, end_col, middle, end, xs, ys);
    }
}

#[inline]
fn linear_interpolate(start: Point, end: Point, t: f64) -> Point {
    Point::new(lerp(start.x(), end.x(), t), lerp(start.y(), end.y(), t))
}

/// Extent of a destination pixel along the source axes, from the differences with the neighbouring pixels
fn pixel_scale(x: &Array2<f64>, y: &Array2<f64>, row: usize, col: usize) -> (f64, f64) {
    let (rows, cols) = x.dim();

    let derivative = |values: &Array2<f64>, prev: Option<(usize, usize)>, next: Option<(usize, usize)>| {
        let center = values[[row, col]];
        match (prev.map(|i| values[i]), next.map(|i| values[i])) {
            (Some(p), Some(n)) if p.is_finite() && n.is_finite() => (n - p) / 2.0,
            (_, Some(n)) if n.is_finite() => n - center,
            (Some(p), _) if p.is_finite() => center - p,
            _ => f64::NAN,
        }
    };

    let prev_col = (col > 0).then(|| (row, col - 1));
    let next_col = (col + 1 < cols).then_some((row, col + 1));
    let prev_row = (row > 0).then(|| (row - 1, col));
    let next_row = (row + 1 < rows).then_some((row + 1, col));

    let dx_dcol = derivative(x, prev_col, next_col);
    let dy_dcol = derivative(y, prev_col, next_col);
    let dx_drow = derivative(x, prev_row, next_row);
    let dy_drow = derivative(y, prev_row, next_row);

    let extent = |a: f64, b: f64| {
        let v = a.abs() + b.abs();
        if v.is_finite() && v > 0.0 { v } else { 1.0 }
    };

    (extent(dx_dcol, dx_drow), extent(dy_dcol, dy_drow))
}

impl PixelMap {
    /// Map the destination grid onto the source pixel space.
    ///
    /// `coord_trans` transforms destination coordinates to source coordinates.
    pub fn new(
        src_transform: &GeoTransform,
        dst: &GeoReference,
        coord_trans: &CoordinateTransformer,
        error_threshold: f64,
        with_scale: bool,
    ) -> Result<Self> {
        let size = dst.raster_size();
        let mapper = RowMapper {
            dst,
            src_inverse: src_transform.invert()?,
            coord_trans,
            error_threshold,
        };

        let mut x = Array2::from_elem((size.rows, size.cols), f64::NAN);
        let mut y = Array2::from_elem((size.rows, size.cols), f64::NAN);
        for (row, (mut xs, mut ys)) in x.rows_mut().into_iter().zip(y.rows_mut()).enumerate() {
            if let (Some(xs), Some(ys)) = (xs.as_slice_mut(), ys.as_slice_mut()) {
                mapper.map_row(row, xs, ys);
            }
        }

        let unmapped = x.iter().filter(|v| v.is_nan()).count();
        if unmapped > 0 {
            log::debug!("{unmapped} destination pixels cannot be mapped onto the source grid");
        }

        let scale = with_scale.then(|| Array2::from_shape_fn((size.rows, size.cols), |(row, col)| pixel_scale(&x, &y, row, col)));
        Ok(PixelMap { x, y, scale })
    }

    /// Source pixel location of the destination pixel center
    pub fn location(&self, row: usize, col: usize) -> Option<(f64, f64)> {
        let (x, y) = (self.x[[row, col]], self.y[[row, col]]);
        (x.is_finite() && y.is_finite()).then_some((x, y))
    }

    pub fn dim(&self) -> (usize, usize) {
        self.x.dim()
    }
}

/// Resample a single source plane onto the destination grid of the pixel map.
///
/// Destination pixels without a valid source contribution are set to `fill`.
pub(crate) fn warp_plane<T: ArrayNum>(src: ArrayView2<T>, map: &PixelMap, method: Resampling, nodata: Option<f64>, fill: T) -> Array2<T> {
    Array2::from_shape_fn(map.dim(), |(row, col)| {
        let Some((x, y)) = map.location(row, col) else {
            return fill;
        };

        let scale = map.scale.as_ref().map_or((1.0, 1.0), |scale| scale[[row, col]]);
        sample(&src, nodata, method, x, y, scale).unwrap_or(fill)
    })
}
