use crate::{
    ArrayNum, CellSize, CoordinateTransformer, Crs, CrsInput, Error, GeoReference, GeoTransform, LabeledArray, Point, RasterArray,
    RasterConfig, RasterDataset, RasterSize, Result, cf,
    algo::{
        bounds::transform_bounds,
        resample::Resampling,
        warp::{DEFAULT_ERROR_THRESHOLD, PixelMap, warp_plane},
    },
    chunk::map_spatial_planes,
    georeference::grid_from_metadata,
    nodata::{fill_value, output_nodata},
    point,
};

/// Relative tolerance when rounding the destination size up to whole pixels
const SIZE_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReprojectOptions {
    /// Destination pixel size (x, y), both positive; the destination grid is north up
    pub resolution: Option<(f64, f64)>,
    /// Destination size, required together with `transform`
    pub shape: Option<RasterSize>,
    /// Destination affine transform
    pub transform: Option<GeoTransform>,
    pub resampling: Resampling,
    /// Destination nodata, defaults to the source nodata
    pub nodata: Option<f64>,
    /// Linear interpolation threshold of the coordinate transformation in source pixels, 0 transforms every pixel exactly
    pub error_threshold: f64,
}

impl Default for ReprojectOptions {
    fn default() -> Self {
        Self {
            resolution: None,
            shape: None,
            transform: None,
            resampling: Resampling::default(),
            nodata: None,
            error_threshold: DEFAULT_ERROR_THRESHOLD,
        }
    }
}

impl ReprojectOptions {
    pub fn with_resampling(resampling: Resampling) -> Self {
        Self {
            resampling,
            ..Default::default()
        }
    }
}

fn pixel_count(extent: f64, resolution: f64) -> usize {
    let count = extent / resolution;
    ((count - count.abs() * SIZE_TOLERANCE).ceil() as usize).max(1)
}

/// Destination resolution covering the same number of pixels along the grid diagonal as the source
fn calculate_optimal_resolution(src: &GeoReference, coord_trans: &CoordinateTransformer, dst_bbox: &crate::Rect<f64>) -> f64 {
    let size = src.raster_size();
    let src_diagonal_pixels = (size.cols as f64).hypot(size.rows as f64);

    let corners = (
        coord_trans.try_transform_point(src.top_left()),
        coord_trans.try_transform_point(src.bottom_right()),
    );

    let dst_diagonal = match corners {
        (Some(tl), Some(br)) => point::euclidean_distance(tl, br),
        _ => point::euclidean_distance(dst_bbox.top_left(), dst_bbox.bottom_right()),
    };

    dst_diagonal / src_diagonal_pixels
}

/// Resolve the full destination grid from the (partial) request in the options.
///
/// Precedence: transform and shape, resolution, shape, and finally a resolution derived from the source.
/// Without an explicit transform the grid covers the source bounds transformed to `dst_crs`.
pub fn destination_grid(src: &GeoReference, dst_crs: &Crs, opts: &ReprojectOptions, densify_points: usize) -> Result<GeoReference> {
    let src_crs = src.require_crs()?;

    if let Some(transform) = opts.transform {
        let Some(shape) = opts.shape else {
            return Err(Error::InvalidArgument(
                "A destination transform requires a destination shape".into(),
            ));
        };

        if opts.resolution.is_some() {
            log::warn!("Destination resolution is ignored when a destination transform is provided");
        }

        let grid = GeoReference::new(Some(dst_crs.clone()), shape, transform);
        grid.validate()?;
        return Ok(grid);
    }

    let bbox = transform_bounds(&src.bounding_box(), src_crs, dst_crs, densify_points)?;
    let coord_trans = CoordinateTransformer::new(src_crs, dst_crs);

    let (resolution, size) = match (opts.resolution, opts.shape) {
        (Some((x_res, y_res)), shape) => {
            if shape.is_some() {
                log::warn!("Destination shape is ignored when a destination resolution is provided");
            }

            let (x_res, y_res) = (x_res.abs(), y_res.abs());
            if !(x_res > 0.0 && y_res > 0.0 && x_res.is_finite() && y_res.is_finite()) {
                return Err(Error::InvalidArgument(format!(
                    "Invalid destination resolution ({x_res}, {y_res})"
                )));
            }

            let size = RasterSize::with_rows_cols(pixel_count(bbox.height(), y_res), pixel_count(bbox.width(), x_res));
            ((x_res, y_res), size)
        }
        (None, Some(shape)) => {
            if shape.is_empty() {
                return Err(Error::InvalidArgument(format!("Invalid destination shape {shape}")));
            }

            ((bbox.width() / shape.cols as f64, bbox.height() / shape.rows as f64), shape)
        }
        (None, None) => {
            let resolution = if coord_trans.is_identity() {
                let (x_res, y_res) = src.resolution();
                (x_res.abs(), y_res.abs())
            } else {
                let res = calculate_optimal_resolution(src, &coord_trans, &bbox);
                (res, res)
            };

            let size = RasterSize::with_rows_cols(
                pixel_count(bbox.height(), resolution.1),
                pixel_count(bbox.width(), resolution.0),
            );
            (resolution, size)
        }
    };

    let grid = GeoReference::with_top_left_origin(
        Some(dst_crs.clone()),
        size,
        Point::new(bbox.min_x(), bbox.max_y()),
        CellSize::new(resolution.0, -resolution.1),
    );
    grid.validate()?;
    Ok(grid)
}

/// Resample all spatial planes of the array onto the destination grid
fn warp_to_grid<T: ArrayNum>(arr: &RasterArray<T>, src: &GeoReference, dst: &GeoReference, opts: &ReprojectOptions, cfg: &RasterConfig) -> Result<RasterArray<T>> {
    src.validate()?;
    dst.validate()?;
    let src_crs = src.require_crs()?;
    let dst_crs = dst.require_crs()?;

    log::debug!(
        "Warp {} {src_crs} -> {} {dst_crs} using {} resampling",
        src.raster_size(),
        dst.raster_size(),
        opts.resampling
    );

    let coord_trans = CoordinateTransformer::new(dst_crs, src_crs);
    let map = PixelMap::new(
        &src.geo_transform(),
        dst,
        &coord_trans,
        opts.error_threshold,
        opts.resampling.uses_footprint(),
    )?;

    let src_nodata = arr.nodata();
    let dst_nodata = output_nodata::<T>(opts.nodata, src_nodata);
    let fill = fill_value::<T>(Some(dst_nodata));

    let data = map_spatial_planes(arr, cfg, dst.raster_size(), |plane| {
        Ok(warp_plane(plane, &map, opts.resampling, src_nodata, fill))
    })?;

    let (x, y) = dst.coordinates();
    let mut result = arr.derive(data);
    result.set_coords_unchecked(&cfg.x_dim, x);
    result.set_coords_unchecked(&cfg.y_dim, y);

    let result = result
        .write_transform(dst.geo_transform())
        .write_crs_as(dst_crs, cfg.wkt_version)?
        .write_nodata(Some(dst_nodata));
    cf::add_xy_grid_meta(result, cfg)
}

/// Reproject the array to `dst_crs`, the destination grid is resolved by [`destination_grid`].
///
/// All non spatial dimensions are kept, every spatial plane is resampled independently.
pub fn reproject<T: ArrayNum>(
    arr: &RasterArray<T>,
    dst_crs: impl Into<CrsInput>,
    opts: &ReprojectOptions,
    cfg: &RasterConfig,
) -> Result<RasterArray<T>> {
    let dst_crs = Crs::resolve(dst_crs)?;
    let src = arr.geo_reference(cfg)?;
    if src.crs().is_none() {
        return Err(Error::MissingCrs(format!(
            "Reprojecting {} requires a source CRS",
            arr.name().unwrap_or("array")
        )));
    }

    let dst = destination_grid(&src, &dst_crs, opts, cfg.densify_points)?;
    warp_to_grid(arr, &src, &dst, opts, cfg)
}

pub fn reproject_dataset<T: ArrayNum>(
    ds: &RasterDataset<T>,
    dst_crs: impl Into<CrsInput>,
    opts: &ReprojectOptions,
    cfg: &RasterConfig,
) -> Result<RasterDataset<T>> {
    let dst_crs = Crs::resolve(dst_crs)?;
    ds.try_map_spatial(cfg, |arr| reproject(arr, &dst_crs, opts, cfg))
}

/// Reproject the array onto the grid of `match_arr`: CRS, transform and shape are copied
/// and the coordinates of the result are the coordinates of `match_arr`.
///
/// Only the resampling, nodata and error threshold options are used.
pub fn reproject_match<T: ArrayNum, M: LabeledArray + ?Sized>(
    arr: &RasterArray<T>,
    match_arr: &M,
    opts: &ReprojectOptions,
    cfg: &RasterConfig,
) -> Result<RasterArray<T>> {
    if opts.resolution.is_some() || opts.shape.is_some() || opts.transform.is_some() {
        log::warn!("Destination grid options are ignored when reprojecting onto the grid of another array");
    }

    let src = arr.geo_reference(cfg)?;
    if src.crs().is_none() {
        return Err(Error::MissingCrs("The source array has no CRS".into()));
    }

    let dst = grid_from_metadata(match_arr, cfg)?;
    if dst.crs().is_none() {
        return Err(Error::MissingCrs("The match array has no CRS".into()));
    }

    let mut result = warp_to_grid(arr, &src, &dst, opts, cfg)?;
    for dim in [&cfg.x_dim, &cfg.y_dim] {
        if let Some(values) = match_arr.coords(dim) {
            result.set_coords_unchecked(dim, values.to_vec());
        }
    }

    Ok(result)
}

pub fn reproject_match_dataset<T: ArrayNum, M: LabeledArray + ?Sized>(
    ds: &RasterDataset<T>,
    match_arr: &M,
    opts: &ReprojectOptions,
    cfg: &RasterConfig,
) -> Result<RasterDataset<T>> {
    ds.try_map_spatial(cfg, |arr| reproject_match(arr, match_arr, opts, cfg))
}
