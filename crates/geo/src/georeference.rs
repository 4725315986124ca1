use approx::{AbsDiffEq, RelativeEq};

use crate::{Cell, Crs, Error, GeoTransform, LabeledArray, Point, RasterConfig, RasterSize, Rect, Result};

/// Signed pixel size, the y component is negative for north up grids.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CellSize {
    x: f64,
    y: f64,
}

impl AbsDiffEq for CellSize {
    type Epsilon = <f64 as AbsDiffEq>::Epsilon;

    fn default_epsilon() -> <f64 as AbsDiffEq>::Epsilon {
        f64::default_epsilon()
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: <f64 as AbsDiffEq>::Epsilon) -> bool {
        f64::abs_diff_eq(&self.x, &other.x, epsilon) && f64::abs_diff_eq(&self.y, &other.y, epsilon)
    }
}

impl RelativeEq for CellSize {
    fn default_max_relative() -> <f64 as AbsDiffEq>::Epsilon {
        f64::default_max_relative()
    }

    fn relative_eq(&self, other: &Self, epsilon: <f64 as AbsDiffEq>::Epsilon, max_relative: <f64 as AbsDiffEq>::Epsilon) -> bool {
        f64::relative_eq(&self.x, &other.x, epsilon, max_relative) && f64::relative_eq(&self.y, &other.y, epsilon, max_relative)
    }
}

impl CellSize {
    pub const fn new(x: f64, y: f64) -> Self {
        CellSize { x, y }
    }

    /// North up square cells
    pub const fn square(size: f64) -> Self {
        CellSize::new(size, -size)
    }

    pub fn is_valid(&self) -> bool {
        self.x != 0.0 && self.y != 0.0 && self.x.is_finite() && self.y.is_finite()
    }

    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn y(&self) -> f64 {
        self.y
    }
}

/// Describes the spatial plane of a raster: the CRS, the pixel dimensions and the affine transform.
#[derive(Clone, Debug, PartialEq)]
pub struct GeoReference {
    crs: Option<Crs>,
    size: RasterSize,
    geo_transform: GeoTransform,
}

impl GeoReference {
    pub fn new(crs: Option<Crs>, size: RasterSize, geo_transform: GeoTransform) -> Self {
        GeoReference { crs, size, geo_transform }
    }

    pub fn with_top_left_origin(crs: Option<Crs>, size: RasterSize, top_left: Point, cell_size: CellSize) -> Self {
        Self::new(crs, size, GeoTransform::from_top_left_and_cell_size(top_left, cell_size))
    }

    pub fn with_bottom_left_origin(crs: Option<Crs>, size: RasterSize, bottom_left: Point, cell_size: CellSize) -> Self {
        let top_left = Point::new(bottom_left.x(), bottom_left.y() - cell_size.y() * size.rows as f64);
        Self::with_top_left_origin(crs, size, top_left, cell_size)
    }

    pub fn crs(&self) -> Option<&Crs> {
        self.crs.as_ref()
    }

    /// The CRS, fails when the grid is not georeferenced
    pub fn require_crs(&self) -> Result<&Crs> {
        self.crs
            .as_ref()
            .ok_or_else(|| Error::MissingCrs("The raster has no coordinate reference system".into()))
    }

    pub fn with_crs(mut self, crs: Option<Crs>) -> Self {
        self.crs = crs;
        self
    }

    pub fn raster_size(&self) -> RasterSize {
        self.size
    }

    pub fn rows(&self) -> usize {
        self.size.rows
    }

    pub fn columns(&self) -> usize {
        self.size.cols
    }

    pub fn geo_transform(&self) -> GeoTransform {
        self.geo_transform
    }

    pub fn cell_size(&self) -> CellSize {
        self.geo_transform.cell_size()
    }

    /// The signed (x, y) resolution
    pub fn resolution(&self) -> (f64, f64) {
        (self.geo_transform.cell_size_x(), self.geo_transform.cell_size_y())
    }

    pub fn is_north_up(&self) -> bool {
        self.geo_transform.is_rectilinear() && self.geo_transform.cell_size_y() < 0.0
    }

    pub fn cell_center(&self, cell: Cell) -> Point<f64> {
        self.geo_transform.apply(cell.col as f64 + 0.5, cell.row as f64 + 0.5)
    }

    pub fn top_left(&self) -> Point<f64> {
        self.geo_transform.apply(0.0, 0.0)
    }

    pub fn top_right(&self) -> Point<f64> {
        self.geo_transform.apply(self.columns() as f64, 0.0)
    }

    pub fn bottom_left(&self) -> Point<f64> {
        self.geo_transform.apply(0.0, self.rows() as f64)
    }

    pub fn bottom_right(&self) -> Point<f64> {
        self.geo_transform.apply(self.columns() as f64, self.rows() as f64)
    }

    /// The bounds of the 4 grid corners, valid for rotated grids as well
    pub fn bounding_box(&self) -> Rect<f64> {
        let corners = [self.top_left(), self.top_right(), self.bottom_left(), self.bottom_right()];
        Rect::hull(corners).unwrap_or_else(|| Rect::from_points(self.top_left(), self.bottom_right()))
    }

    /// The fractional (col, row) location of a point in pixel space
    pub fn point_to_pixel(&self, p: Point<f64>) -> Result<(f64, f64)> {
        let inv = self.geo_transform.invert()?;
        let pixel = inv.apply(p.x(), p.y());
        Ok((pixel.x(), pixel.y()))
    }

    pub fn point_to_cell(&self, p: Point<f64>) -> Result<Cell> {
        let (col, row) = self.point_to_pixel(p)?;
        Ok(Cell::from_row_col(row.floor() as i64, col.floor() as i64))
    }

    pub fn is_cell_on_map(&self, cell: Cell) -> bool {
        cell.is_valid() && (cell.row as usize) < self.rows() && (cell.col as usize) < self.columns()
    }

    /// The pixel center coordinates of both axes
    pub fn coordinates(&self) -> (Vec<f64>, Vec<f64>) {
        crate::geotransform::affine_to_coords(&self.geo_transform, self.columns(), self.rows())
    }

    /// Checks the grid can be used as a warp source or target
    pub fn validate(&self) -> Result<()> {
        if self.size.is_empty() {
            return Err(Error::InvalidArgument(format!("Empty raster size {}", self.size)));
        }

        self.geo_transform.invert().map(|_| ())
    }
}

/// The grid description of a labeled array: size from the spatial dimension lengths,
/// transform and CRS resolved from the metadata.
pub fn grid_from_metadata<A: LabeledArray + ?Sized>(arr: &A, cfg: &RasterConfig) -> Result<GeoReference> {
    let size = RasterSize::with_rows_cols(arr.dim_len(&cfg.y_dim)?, arr.dim_len(&cfg.x_dim)?);
    let transform = crate::geotransform::transform_from_metadata(arr, cfg)?;
    let crs = crate::srs::crs_from_metadata(arr)?;
    Ok(GeoReference::new(crs, size, transform))
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn georef() -> GeoReference {
        GeoReference::with_top_left_origin(None, RasterSize::with_rows_cols(10, 10), Point::new(0.0, 10.0), CellSize::square(1.0))
    }

    #[test]
    fn bounds_and_resolution() {
        let georef = georef();
        assert_eq!(georef.bounding_box().bounds(), (0.0, 0.0, 10.0, 10.0));
        assert_eq!(georef.resolution(), (1.0, -1.0));
        assert!(georef.is_north_up());
        assert_eq!(georef.cell_center(Cell::from_row_col(0, 0)), Point::new(0.5, 9.5));
    }

    #[test]
    fn bottom_left_origin() {
        let georef = GeoReference::with_bottom_left_origin(
            None,
            RasterSize::with_rows_cols(4, 3),
            Point::new(100.0, 200.0),
            CellSize::square(10.0),
        );

        assert_relative_eq!(georef.top_left(), Point::new(100.0, 240.0));
        assert_relative_eq!(georef.bottom_right(), Point::new(130.0, 200.0));
    }

    #[test]
    fn point_to_cell() {
        let georef = georef();
        assert_eq!(georef.point_to_cell(Point::new(0.5, 9.5)).unwrap(), Cell::from_row_col(0, 0));
        assert_eq!(georef.point_to_cell(Point::new(9.99, 0.01)).unwrap(), Cell::from_row_col(9, 9));

        let outside = georef.point_to_cell(Point::new(-0.5, 9.5)).unwrap();
        assert!(!georef.is_cell_on_map(outside));
        assert!(georef.require_crs().is_err());
    }

    #[test]
    fn rotated_bounds_use_all_corners() {
        let georef = GeoReference::new(
            None,
            RasterSize::with_rows_cols(2, 2),
            GeoTransform::new([0.0, 1.0, 1.0, 0.0, 1.0, -1.0]),
        );

        assert_eq!(georef.bounding_box().bounds(), (0.0, -2.0, 4.0, 2.0));
    }
}
