//! CF convention metadata for the spatial coordinates and the grid mapping.

use crate::{ArrayNum, Crs, CrsInput, RasterArray, RasterConfig, Result};

pub const STANDARD_NAME: &str = "standard_name";
pub const LONG_NAME: &str = "long_name";
pub const UNITS: &str = "units";
pub const AXIS: &str = "axis";
pub const GRID_MAPPING: &str = "grid_mapping";

/// Name of the grid mapping variable referenced by the `grid_mapping` attribute
pub const GRID_MAPPING_NAME: &str = "spatial_ref";

struct AxisMeta {
    standard_name: &'static str,
    long_name: &'static str,
    units: String,
}

fn axis_meta(crs: &Crs) -> (AxisMeta, AxisMeta) {
    if crs.is_geographic() {
        (
            AxisMeta {
                standard_name: "longitude",
                long_name: "longitude",
                units: "degrees_east".to_string(),
            },
            AxisMeta {
                standard_name: "latitude",
                long_name: "latitude",
                units: "degrees_north".to_string(),
            },
        )
    } else {
        let units = crs.linear_units().unwrap_or("m").to_string();
        (
            AxisMeta {
                standard_name: "projection_x_coordinate",
                long_name: "x coordinate of projection",
                units: units.clone(),
            },
            AxisMeta {
                standard_name: "projection_y_coordinate",
                long_name: "y coordinate of projection",
                units,
            },
        )
    }
}

/// Add the CF attributes of the x and y coordinates, derived from the CRS of the array.
/// Arrays without a CRS only receive the `axis` attributes.
pub fn add_xy_grid_meta<T: ArrayNum>(arr: RasterArray<T>, cfg: &RasterConfig) -> Result<RasterArray<T>> {
    let crs = arr.crs()?;
    let mut arr = arr
        .with_coord_attr(&cfg.x_dim, AXIS, "X")
        .with_coord_attr(&cfg.y_dim, AXIS, "Y");

    if let Some(crs) = crs {
        let (x_meta, y_meta) = axis_meta(&crs);
        for (dim, meta) in [(&cfg.x_dim, x_meta), (&cfg.y_dim, y_meta)] {
            arr = arr
                .with_coord_attr(dim, STANDARD_NAME, meta.standard_name)
                .with_coord_attr(dim, LONG_NAME, meta.long_name)
                .with_coord_attr(dim, UNITS, meta.units);
        }
    }

    Ok(arr)
}

/// Write the CRS in the configured WKT dialect and reference the grid mapping variable from the array attributes
pub fn add_spatial_ref<T: ArrayNum>(
    arr: RasterArray<T>,
    crs: impl Into<CrsInput>,
    cfg: &RasterConfig,
) -> Result<RasterArray<T>> {
    Ok(arr
        .write_crs_as(crs, cfg.wkt_version)?
        .with_attr(GRID_MAPPING, GRID_MAPPING_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AttrValue, crs::epsg, testutils};

    #[test]
    fn geographic_axis_attributes() {
        let cfg = RasterConfig::default();
        let arr = add_xy_grid_meta(testutils::raster_10x10::<f32>(&cfg), &cfg).unwrap();

        let x = arr.coord_attrs("x").unwrap();
        assert_eq!(x.get(STANDARD_NAME), Some(&AttrValue::from("longitude")));
        assert_eq!(x.get(UNITS), Some(&AttrValue::from("degrees_east")));
        assert_eq!(x.get(AXIS), Some(&AttrValue::from("X")));
        assert_eq!(arr.coord_attrs("y").unwrap().get(AXIS), Some(&AttrValue::from("Y")));
    }

    #[test]
    fn projected_axis_attributes() {
        let cfg = RasterConfig::default();
        let arr = add_spatial_ref(testutils::raster_10x10::<f32>(&cfg), epsg::BELGIAN_LAMBERT72, &cfg).unwrap();
        let arr = add_xy_grid_meta(arr, &cfg).unwrap();

        let y = arr.coord_attrs("y").unwrap();
        assert_eq!(y.get(STANDARD_NAME), Some(&AttrValue::from("projection_y_coordinate")));
        assert_eq!(y.get(UNITS), Some(&AttrValue::from("m")));
        assert_eq!(arr.attrs().get(GRID_MAPPING), Some(&AttrValue::from(GRID_MAPPING_NAME)));
    }
}
