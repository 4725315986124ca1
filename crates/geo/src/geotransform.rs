use std::fmt::Debug;

use approx::{AbsDiffEq, RelativeEq};

use crate::{CellSize, Error, LabeledArray, Point, RasterConfig, Result};

/// Attribute holding the 6 affine coefficients in GDAL order
pub const TRANSFORM_ATTR: &str = "transform";

#[derive(Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GeoTransform([f64; 6]);

impl GeoTransform {
    /// Creates a new `GeoTransform` from the provided coefficients.
    ///
    /// The coefficients are in the order: [top left x, pixel width, rotation (0 if north is up), top left y, rotation (0 if north is up), pixel height].
    pub const fn new(coefficients: [f64; 6]) -> Self {
        GeoTransform(coefficients)
    }

    pub fn from_top_left_and_cell_size(top_left: Point, cell_size: CellSize) -> Self {
        Self::new([top_left.x(), cell_size.x(), 0.0, top_left.y(), 0.0, cell_size.y()])
    }

    /// Translates a fractional pixel location to a point.
    /// (0, 0) is the top left corner of the top left pixel.
    pub fn apply(&self, col: f64, row: f64) -> Point<f64> {
        let x = self.0[0] + self.0[1] * col + self.0[2] * row;
        let y = self.0[3] + self.0[4] * col + self.0[5] * row;
        Point::new(x, y)
    }

    pub fn top_left(&self) -> Point {
        Point::new(self.0[0], self.0[3])
    }

    /// The horizontal cell size
    pub fn cell_size_x(&self) -> f64 {
        self.0[1]
    }

    /// The vertical cell size, negative for north up grids
    pub fn cell_size_y(&self) -> f64 {
        self.0[5]
    }

    pub fn cell_size(&self) -> CellSize {
        CellSize::new(self.0[1], self.0[5])
    }

    /// True when the grid axes are aligned with the coordinate axes
    pub fn is_rectilinear(&self) -> bool {
        self.0[2] == 0.0 && self.0[4] == 0.0
    }

    /// Returns the coefficients of the transformation.
    pub fn coefficients(&self) -> [f64; 6] {
        self.0
    }

    /// Shift the origin by a whole number of pixels
    pub fn translated(&self, col_offset: f64, row_offset: f64) -> Self {
        let origin = self.apply(col_offset, row_offset);
        let mut coefficients = self.0;
        coefficients[0] = origin.x();
        coefficients[3] = origin.y();
        GeoTransform(coefficients)
    }

    pub fn invert(&self) -> Result<Self> {
        let gt_in = &self.0;
        let mut gt_out = [0.0; 6];

        if gt_in[2] == 0.0 && gt_in[4] == 0.0 && gt_in[1] != 0.0 && gt_in[5] != 0.0 {
            // No rotation, avoid the determinant and its precision issues
            gt_out[0] = -gt_in[0] / gt_in[1];
            gt_out[1] = 1.0 / gt_in[1];
            gt_out[3] = -gt_in[3] / gt_in[5];
            gt_out[5] = 1.0 / gt_in[5];
            return Ok(gt_out.into());
        }

        let det = gt_in[1] * gt_in[5] - gt_in[2] * gt_in[4];
        let magnitude = f64::max(f64::max(gt_in[1].abs(), gt_in[2].abs()), f64::max(gt_in[4].abs(), gt_in[5].abs()));

        if det.abs() <= 1e-10 * magnitude * magnitude {
            return Err(Error::Runtime(
                "GeoTransform::inverse: Determinate is too small, cannot compute inverse.".to_string(),
            ));
        }

        let inv_det = 1.0 / det;

        gt_out[1] = gt_in[5] * inv_det;
        gt_out[4] = -gt_in[4] * inv_det;

        gt_out[2] = -gt_in[2] * inv_det;
        gt_out[5] = gt_in[1] * inv_det;

        gt_out[0] = (gt_in[2] * gt_in[3] - gt_in[0] * gt_in[5]) * inv_det;
        gt_out[3] = (-gt_in[1] * gt_in[3] + gt_in[0] * gt_in[4]) * inv_det;

        Ok(gt_out.into())
    }
}

/// Resolution of a coordinate axis with evenly spaced pixel centers.
///
/// Deviations up to `tolerance` (a fraction of the resolution) are accepted.
fn axis_resolution(dim: &str, coords: &[f64], tolerance: f64) -> Result<f64> {
    if coords.len() < 2 {
        return Err(Error::OneDimensionalRaster(format!(
            "At least two coordinates are needed along '{dim}' to determine the resolution, found {}",
            coords.len()
        )));
    }

    let resolution = coords[1] - coords[0];
    if resolution == 0.0 || !resolution.is_finite() {
        return Err(Error::NonUniformGrid {
            dim: dim.to_string(),
            reason: format!("invalid coordinate step {resolution}"),
        });
    }

    // Compare against the ideal position to avoid accumulating rounding differences
    let max_deviation = tolerance * resolution.abs();
    if let Some((index, value)) = coords
        .iter()
        .enumerate()
        .find(|(i, value)| ((coords[0] + *i as f64 * resolution) - **value).abs() > max_deviation)
    {
        return Err(Error::NonUniformGrid {
            dim: dim.to_string(),
            reason: format!(
                "coordinate {index} ({value}) deviates from the expected {}",
                coords[0] + index as f64 * resolution
            ),
        });
    }

    Ok(resolution)
}

/// Derive the affine transform from the 1-D pixel center coordinates of both spatial dimensions.
///
/// The origin is the outer edge of the first pixel: first coordinate - resolution / 2.
pub fn transform_from_coords(x_dim: &str, x: &[f64], y_dim: &str, y: &[f64], tolerance: f64) -> Result<GeoTransform> {
    let x_res = axis_resolution(x_dim, x, tolerance)?;
    let y_res = axis_resolution(y_dim, y, tolerance)?;

    Ok(GeoTransform::new([
        x[0] - x_res / 2.0,
        x_res,
        0.0,
        y[0] - y_res / 2.0,
        0.0,
        y_res,
    ]))
}

/// Resolve the affine transform of a labeled array.
///
/// Precedence: explicitly attached transform, transform derived from the spatial coordinates,
/// the `transform` attribute (GDAL coefficient order). The attribute is only consulted when the
/// coordinates are missing or too short to derive a resolution.
pub fn transform_from_metadata<A: LabeledArray + ?Sized>(arr: &A, cfg: &RasterConfig) -> Result<GeoTransform> {
    if let Some(transform) = arr.explicit_transform() {
        return Ok(transform);
    }

    arr.dim_index(&cfg.x_dim)?;
    arr.dim_index(&cfg.y_dim)?;

    let from_coords = match (arr.coords(&cfg.x_dim), arr.coords(&cfg.y_dim)) {
        (Some(x), Some(y)) => Some(transform_from_coords(&cfg.x_dim, x, &cfg.y_dim, y, cfg.grid_tolerance)),
        _ => None,
    };

    match from_coords {
        Some(Ok(transform)) => Ok(transform),
        Some(Err(Error::OneDimensionalRaster(msg))) => {
            transform_from_attr(arr).ok_or(Error::OneDimensionalRaster(msg))
        }
        Some(Err(err)) => Err(err),
        None => transform_from_attr(arr).ok_or_else(|| {
            Error::InvalidArgument(format!(
                "No coordinates for '{}' and '{}' and no '{TRANSFORM_ATTR}' attribute",
                cfg.x_dim, cfg.y_dim
            ))
        }),
    }
}

fn transform_from_attr<A: LabeledArray + ?Sized>(arr: &A) -> Option<GeoTransform> {
    let coefficients: [f64; 6] = arr.attrs().get(TRANSFORM_ATTR)?.as_list()?.try_into().ok()?;
    if coefficients.iter().all(|c| c.is_finite()) {
        Some(GeoTransform::new(coefficients))
    } else {
        log::warn!("Ignoring non finite '{TRANSFORM_ATTR}' attribute");
        None
    }
}

/// The pixel center coordinates along both axes for a grid of `width` x `height` pixels.
///
/// For rotated transforms the coordinates of the first row and column are returned.
pub fn affine_to_coords(transform: &GeoTransform, width: usize, height: usize) -> (Vec<f64>, Vec<f64>) {
    let x = (0..width).map(|col| transform.apply(col as f64 + 0.5, 0.5).x()).collect();
    let y = (0..height).map(|row| transform.apply(0.5, row as f64 + 0.5).y()).collect();
    (x, y)
}

impl From<[f64; 6]> for GeoTransform {
    fn from(coefficients: [f64; 6]) -> Self {
        GeoTransform(coefficients)
    }
}

impl From<GeoTransform> for [f64; 6] {
    fn from(geo_trans: GeoTransform) -> [f64; 6] {
        geo_trans.0
    }
}

impl Debug for GeoTransform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "GeoTransform(topleft: ({}, {}), pixel_width: {}, pixel_height: {}, rotation: ({}, {}))",
            self.0[0],
            self.0[3],
            self.cell_size_x(),
            self.cell_size_y(),
            self.0[2],
            self.0[4]
        )
    }
}

impl AbsDiffEq for GeoTransform {
    type Epsilon = f64;

    fn default_epsilon() -> Self::Epsilon {
        f64::default_epsilon()
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: Self::Epsilon) -> bool {
        self.0.abs_diff_eq(&other.0, epsilon)
    }
}

impl RelativeEq for GeoTransform {
    fn default_max_relative() -> Self::Epsilon {
        f64::default_max_relative()
    }

    fn relative_eq(&self, other: &Self, epsilon: Self::Epsilon, max_relative: Self::Epsilon) -> bool {
        self.0.relative_eq(&other.0, epsilon, max_relative)
    }
}
