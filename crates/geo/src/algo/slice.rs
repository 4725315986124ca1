use std::ops::Range;

use crate::{ArrayNum, Error, GeoTransform, RasterArray, RasterConfig, RasterDataset, RasterSize, Rect, Result};

/// Pixels are selected when their center is within this fraction of a pixel of the box
const CENTER_TOLERANCE: f64 = 1e-9;

/// The index range of the pixels along one axis with a center inside `[min, max]`
fn axis_selection(origin: f64, resolution: f64, len: usize, min: f64, max: f64) -> Range<usize> {
    let p1 = (min - origin) / resolution - 0.5;
    let p2 = (max - origin) / resolution - 0.5;
    let (lo, hi) = if p1 <= p2 { (p1, p2) } else { (p2, p1) };

    let start = (lo - CENTER_TOLERANCE).ceil().max(0.0);
    let end = ((hi + CENTER_TOLERANCE).floor() + 1.0).min(len as f64);
    if !start.is_finite() || !end.is_finite() || end <= start {
        return 0..0;
    }

    start as usize..end as usize
}

/// The (rows, cols) window of the pixels with a center inside the box
pub(crate) fn box_window(transform: &GeoTransform, size: RasterSize, bbox: &Rect<f64>) -> Result<(Range<usize>, Range<usize>)> {
    if !transform.is_rectilinear() {
        return Err(Error::InvalidArgument(
            "Coordinate based selection requires a grid without rotation".into(),
        ));
    }

    let origin = transform.top_left();
    let cols = axis_selection(origin.x(), transform.cell_size_x(), size.cols, bbox.min_x(), bbox.max_x());
    let rows = axis_selection(origin.y(), transform.cell_size_y(), size.rows, bbox.min_y(), bbox.max_y());
    Ok((rows, cols))
}

fn check_bounds(minx: f64, miny: f64, maxx: f64, maxy: f64) -> Result<Rect<f64>> {
    if [minx, miny, maxx, maxy].iter().any(|v| v.is_nan()) || minx > maxx || miny > maxy {
        return Err(Error::InvalidArgument(format!(
            "Invalid bounds ({minx}, {miny}, {maxx}, {maxy})"
        )));
    }

    Ok(Rect::from_bounds(minx, miny, maxx, maxy))
}

/// Select the pixels with a center inside the closed box `[minx, maxx] x [miny, maxy]`.
///
/// The selection must keep at least 2 pixels along both spatial axes so the grid of the result
/// can still be derived from its coordinates.
pub fn slice_xy<T: ArrayNum>(arr: &RasterArray<T>, minx: f64, miny: f64, maxx: f64, maxy: f64, cfg: &RasterConfig) -> Result<RasterArray<T>> {
    let bbox = check_bounds(minx, miny, maxx, maxy)?;
    let (rows, cols) = box_window(&arr.transform(cfg)?, arr.raster_size(cfg)?, &bbox)?;
    if rows.len() < 2 || cols.len() < 2 {
        return Err(Error::OneDimensionalRaster(format!(
            "Selecting ({minx}, {miny}, {maxx}, {maxy}) results in {} rows and {} columns",
            rows.len(),
            cols.len()
        )));
    }

    arr.isel_window(rows, cols, cfg)
}

/// Clip the array to a bounding box.
///
/// When the selection keeps fewer than 2 pixels along an axis and `auto_expand` is set, the box
/// is grown by one pixel on every side and the selection retried, at most `auto_expand_limit` times.
pub fn clip_box<T: ArrayNum>(
    arr: &RasterArray<T>,
    minx: f64,
    miny: f64,
    maxx: f64,
    maxy: f64,
    auto_expand: bool,
    auto_expand_limit: usize,
    cfg: &RasterConfig,
) -> Result<RasterArray<T>> {
    let mut bbox = check_bounds(minx, miny, maxx, maxy)?;
    let size = arr.raster_size(cfg)?;
    if size.rows < 2 || size.cols < 2 {
        return Err(Error::OneDimensionalRaster(format!(
            "At least one of the raster x,y coordinates has only one point ({size})"
        )));
    }

    let transform = arr.transform(cfg)?;
    let (expand_x, expand_y) = (transform.cell_size_x().abs(), transform.cell_size_y().abs());

    let mut attempt = 0;
    loop {
        let (rows, cols) = box_window(&transform, size, &bbox)?;
        if rows.len() >= 2 && cols.len() >= 2 {
            return arr.isel_window(rows, cols, cfg);
        }

        if !auto_expand {
            if rows.is_empty() || cols.is_empty() {
                return Err(Error::NoDataInBounds(format!(
                    "No data found in bounds ({minx}, {miny}, {maxx}, {maxy})"
                )));
            }

            return Err(Error::OneDimensionalRaster(format!(
                "At least one of the clipped raster x,y coordinates has only one point ({} rows, {} columns)",
                rows.len(),
                cols.len()
            )));
        }

        if attempt >= auto_expand_limit {
            return Err(Error::OneDimensionalRaster(format!(
                "At least one of the clipped raster x,y coordinates has less than two points after {attempt} expansion attempts ({} rows, {} columns)",
                rows.len(),
                cols.len()
            )));
        }

        attempt += 1;
        bbox = Rect::from_bounds(
            bbox.min_x() - expand_x,
            bbox.min_y() - expand_y,
            bbox.max_x() + expand_x,
            bbox.max_y() + expand_y,
        );
        log::debug!("Clip box expanded to {:?} (attempt {attempt})", bbox.bounds());
    }
}

pub fn slice_xy_dataset<T: ArrayNum>(
    ds: &RasterDataset<T>,
    minx: f64,
    miny: f64,
    maxx: f64,
    maxy: f64,
    cfg: &RasterConfig,
) -> Result<RasterDataset<T>> {
    ds.try_map_spatial(cfg, |arr| slice_xy(arr, minx, miny, maxx, maxy, cfg))
}

#[allow(clippy::too_many_arguments)]
pub fn clip_box_dataset<T: ArrayNum>(
    ds: &RasterDataset<T>,
    minx: f64,
    miny: f64,
    maxx: f64,
    maxy: f64,
    auto_expand: bool,
    auto_expand_limit: usize,
    cfg: &RasterConfig,
) -> Result<RasterDataset<T>> {
    ds.try_map_spatial(cfg, |arr| clip_box(arr, minx, miny, maxx, maxy, auto_expand, auto_expand_limit, cfg))
}
