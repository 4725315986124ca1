use std::ops::Range;

use geo_types::Geometry;
use itertools::{Itertools, MinMaxResult};
use ndarray::{Array2, Axis, Slice};

use crate::{
    ArrayNum, Crs, Error, RasterArray, RasterConfig, RasterDataset, Result,
    algo::geometry_mask,
    chunk::map_spatial_planes,
    nodata::{fill_value, is_missing, output_nodata},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClipOptions {
    /// Keep every pixel touched by the geometries instead of only the pixels with their center inside
    pub all_touched: bool,
    /// Crop the result to the extent of the kept pixels
    pub drop: bool,
    /// Keep the pixels outside of the geometries
    pub invert: bool,
}

/// Index range along the axis of the lanes containing at least one kept pixel
fn axis_extent(mask: &Array2<bool>, axis: Axis) -> Option<Range<usize>> {
    let kept = mask
        .axis_iter(axis)
        .enumerate()
        .filter(|(_, lane)| lane.iter().any(|v| *v))
        .map(|(i, _)| i);

    match kept.minmax() {
        MinMaxResult::NoElements => None,
        MinMaxResult::OneElement(i) => Some(i..i + 1),
        MinMaxResult::MinMax(first, last) => Some(first..last + 1),
    }
}

fn mask_extent(mask: &Array2<bool>) -> Option<(Range<usize>, Range<usize>)> {
    Some((axis_extent(mask, Axis(0))?, axis_extent(mask, Axis(1))?))
}

/// Set the pixels outside of the geometries to nodata.
///
/// `geometry_crs` is the CRS of the geometry coordinates, when it differs from the CRS of the array
/// the geometries are reprojected. Fails with [`Error::NoDataInBounds`] when no valid pixel remains.
pub fn clip<T: ArrayNum>(
    arr: &RasterArray<T>,
    geometries: &[Geometry<f64>],
    geometry_crs: Option<&Crs>,
    opts: &ClipOptions,
    cfg: &RasterConfig,
) -> Result<RasterArray<T>> {
    let grid = arr.geo_reference(cfg)?;
    let mask = geometry_mask(geometries, geometry_crs, &grid, opts.all_touched, opts.invert)?;

    let Some((rows, cols)) = mask_extent(&mask) else {
        return Err(Error::NoDataInBounds("The geometries do not overlap the raster".into()));
    };

    let (src, mask) = if opts.drop {
        let window = mask
            .slice_axis(Axis(0), Slice::from(rows.clone()))
            .slice_axis(Axis(1), Slice::from(cols.clone()))
            .to_owned();
        (arr.isel_window(rows, cols, cfg)?, window)
    } else {
        (arr.clone(), mask)
    };

    let nodata = output_nodata::<T>(None, src.nodata());
    let fill = fill_value::<T>(Some(nodata));
    let source_nodata = src.nodata();

    let data = map_spatial_planes(&src, cfg, src.raster_size(cfg)?, |plane| {
        let mut out = Array2::from_elem(plane.dim(), fill);
        ndarray::Zip::from(&mut out).and(&plane).and(&mask).for_each(|out, &value, &keep| {
            if keep {
                *out = value;
            }
        });
        Ok(out)
    })?;

    let has_data = data.iter().any(|v| !is_missing(*v, source_nodata) && !is_missing(*v, Some(nodata)));
    if !has_data {
        return Err(Error::NoDataInBounds(
            "No valid data remains inside the geometries".into(),
        ));
    }

    Ok(src.derive(data).write_nodata(Some(nodata)))
}

pub fn clip_dataset<T: ArrayNum>(
    ds: &RasterDataset<T>,
    geometries: &[Geometry<f64>],
    geometry_crs: Option<&Crs>,
    opts: &ClipOptions,
    cfg: &RasterConfig,
) -> Result<RasterDataset<T>> {
    ds.try_map_spatial(cfg, |arr| clip(arr, geometries, geometry_crs, opts, cfg))
}
