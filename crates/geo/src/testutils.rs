use ndarray::Array2;
use num::NumCast;

use crate::{ArrayNum, CellSize, Crs, GeoReference, Point, RasterArray, RasterConfig, RasterSize, crs::epsg};

pub const NOD: f64 = 255.0;

pub fn number_cast<T: ArrayNum>(val: f64) -> T {
    NumCast::from(val).expect("F64 could not be converted to the specified type")
}

/// 10x10 grid, 1 degree cells, top left at (0, 10) in WGS84
pub fn grid_10x10() -> GeoReference {
    GeoReference::with_top_left_origin(
        Some(Crs::from_epsg(epsg::WGS84).expect("WGS84")),
        RasterSize::with_rows_cols(10, 10),
        Point::new(0.0, 10.0),
        CellSize::square(1.0),
    )
}

/// Array on [`grid_10x10`] with value `row * 10 + col`
pub fn raster_10x10<T: ArrayNum>(cfg: &RasterConfig) -> RasterArray<T> {
    raster_from_fn(&grid_10x10(), cfg, |row, col| (row * 10 + col) as f64)
}

pub fn raster_from_fn<T: ArrayNum>(grid: &GeoReference, cfg: &RasterConfig, f: impl Fn(usize, usize) -> f64) -> RasterArray<T> {
    let data = Array2::from_shape_fn((grid.rows(), grid.columns()), |(row, col)| number_cast::<T>(f(row, col)));
    RasterArray::from_grid(data, grid, cfg).expect("Valid grid")
}

/// Array from a row major list of values where [`NOD`] marks nodata
pub fn raster_from_values<T: ArrayNum>(grid: &GeoReference, cfg: &RasterConfig, values: &[f64]) -> RasterArray<T> {
    assert_eq!(values.len(), grid.raster_size().cell_count());
    let nodata = if T::IS_FLOAT { f64::NAN } else { NOD };
    raster_from_fn(grid, cfg, |row, col| {
        let v = values[row * grid.columns() + col];
        if v == NOD { nodata } else { v }
    })
    .write_nodata(Some(nodata))
}
