use std::collections::BTreeMap;
use std::sync::OnceLock;

use ndarray::{Array2, ArrayD, Axis, Slice};

use crate::geotransform::{self, TRANSFORM_ATTR};
use crate::nodata::{FILL_VALUE, MISSING_VALUE, NODATAVALS};
use crate::srs::{CRS_ATTR, CRS_WKT_ATTR, SPATIAL_REF_ATTR};
use crate::{
    ArrayNum, AttrValue, Attributes, ChunkLayout, Crs, CrsInput, Error, GeoReference, GeoTransform, LabeledArray, RasterConfig,
    RasterSize, Rect, Result, WktVersion,
};

#[derive(Debug, Clone)]
struct CachedTransform {
    x_dim: String,
    y_dim: String,
    tolerance: f64,
    transform: GeoTransform,
}

/// N-dimensional labeled array of which two named dimensions form a georeferenced grid.
///
/// Besides the pixel buffer the array carries 1-D coordinates per dimension, attributes,
/// encoding hints, an optional chunk layout and the explicitly attached spatial metadata
/// (CRS, affine transform and nodata). Operations never mutate their input, they return new arrays.
#[derive(Debug, Clone)]
pub struct RasterArray<T: ArrayNum> {
    name: Option<String>,
    dims: Vec<String>,
    data: ArrayD<T>,
    coords: BTreeMap<String, Vec<f64>>,
    coord_attrs: BTreeMap<String, Attributes>,
    attrs: Attributes,
    encoding: Attributes,
    chunks: Option<ChunkLayout>,
    nodata: Option<f64>,
    crs: Option<Crs>,
    transform: Option<GeoTransform>,
    crs_cache: OnceLock<Option<Crs>>,
    transform_cache: OnceLock<CachedTransform>,
}

impl<T: ArrayNum> RasterArray<T> {
    pub fn new<S: Into<String>>(dims: impl IntoIterator<Item = S>, data: ArrayD<T>) -> Result<Self> {
        let dims: Vec<String> = dims.into_iter().map(Into::into).collect();
        if dims.len() != data.ndim() {
            return Err(Error::DimensionMismatch(format!(
                "{} dimension names provided for an array of rank {}",
                dims.len(),
                data.ndim()
            )));
        }

        for (i, dim) in dims.iter().enumerate() {
            if dims[..i].contains(dim) {
                return Err(Error::DimensionMismatch(format!("Duplicate dimension name '{dim}'")));
            }
        }

        Ok(RasterArray {
            name: None,
            dims,
            data,
            coords: BTreeMap::new(),
            coord_attrs: BTreeMap::new(),
            attrs: Attributes::new(),
            encoding: Attributes::new(),
            chunks: None,
            nodata: None,
            crs: None,
            transform: None,
            crs_cache: OnceLock::new(),
            transform_cache: OnceLock::new(),
        })
    }

    /// Create a 2-D (y, x) array on the given grid, coordinates, transform and CRS are attached
    pub fn from_grid(data: Array2<T>, grid: &GeoReference, cfg: &RasterConfig) -> Result<Self> {
        if data.dim() != (grid.rows(), grid.columns()) {
            return Err(Error::SizeMismatch {
                size1: data.dim(),
                size2: (grid.rows(), grid.columns()),
            });
        }

        let (x, y) = grid.coordinates();
        let mut arr = RasterArray::new([cfg.y_dim.as_str(), cfg.x_dim.as_str()], data.into_dyn())?
            .with_coords(&cfg.x_dim, x)?
            .with_coords(&cfg.y_dim, y)?
            .write_transform(grid.geo_transform());
        if let Some(crs) = grid.crs() {
            arr = arr.write_crs_as(crs, cfg.wkt_version)?;
        }

        Ok(arr)
    }

    pub fn with_coords(mut self, dim: &str, values: Vec<f64>) -> Result<Self> {
        let len = self.dim_len(dim)?;
        if values.len() != len {
            return Err(Error::DimensionMismatch(format!(
                "Coordinate '{dim}' has {} values, the dimension has length {len}",
                values.len()
            )));
        }

        self.coords.insert(dim.to_string(), values);
        self.invalidate_caches();
        Ok(self)
    }

    pub fn with_coord_attr(mut self, dim: &str, key: &str, value: impl Into<AttrValue>) -> Self {
        self.coord_attrs
            .entry(dim.to_string())
            .or_default()
            .insert(key.to_string(), value.into());
        self
    }

    pub fn with_attr(mut self, key: &str, value: impl Into<AttrValue>) -> Self {
        self.attrs.insert(key.to_string(), value.into());
        self.invalidate_caches();
        self
    }

    pub fn with_attrs(mut self, attrs: Attributes) -> Self {
        self.attrs = attrs;
        self.invalidate_caches();
        self
    }

    pub fn with_encoding(mut self, key: &str, value: impl Into<AttrValue>) -> Self {
        self.encoding.insert(key.to_string(), value.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn dims(&self) -> &[String] {
        &self.dims
    }

    pub fn data(&self) -> &ArrayD<T> {
        &self.data
    }

    pub fn into_data(self) -> ArrayD<T> {
        self.data
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn coords(&self, dim: &str) -> Option<&[f64]> {
        self.coords.get(dim).map(Vec::as_slice)
    }

    pub fn coord_attrs(&self, dim: &str) -> Option<&Attributes> {
        self.coord_attrs.get(dim)
    }

    pub fn attrs(&self) -> &Attributes {
        &self.attrs
    }

    pub fn encoding(&self) -> &Attributes {
        &self.encoding
    }

    pub fn chunks(&self) -> Option<&ChunkLayout> {
        self.chunks.as_ref()
    }

    /// Attach a chunk layout, only non spatial dimensions can be chunked
    pub fn chunk(mut self, layout: ChunkLayout, cfg: &RasterConfig) -> Result<Self> {
        layout.validate(&self, cfg)?;
        self.chunks = Some(layout);
        Ok(self)
    }

    pub fn has_spatial_dims(&self, cfg: &RasterConfig) -> bool {
        self.has_dim(&cfg.x_dim) && self.has_dim(&cfg.y_dim)
    }

    /// The axis indices of the (y, x) dimensions
    pub fn spatial_axes(&self, cfg: &RasterConfig) -> Result<(usize, usize)> {
        Ok((self.dim_index(&cfg.y_dim)?, self.dim_index(&cfg.x_dim)?))
    }

    pub fn width(&self, cfg: &RasterConfig) -> Result<usize> {
        self.dim_len(&cfg.x_dim)
    }

    pub fn height(&self, cfg: &RasterConfig) -> Result<usize> {
        self.dim_len(&cfg.y_dim)
    }

    pub fn raster_size(&self, cfg: &RasterConfig) -> Result<RasterSize> {
        Ok(RasterSize::with_rows_cols(self.height(cfg)?, self.width(cfg)?))
    }

    /// The resolved nodata value, see [`crate::nodata::nodata_from_metadata`]
    pub fn nodata(&self) -> Option<f64> {
        crate::nodata::nodata_from_metadata(self)
    }

    /// The resolved CRS, see [`crate::srs::crs_from_metadata`]
    pub fn crs(&self) -> Result<Option<Crs>> {
        if let Some(crs) = self.crs_cache.get() {
            return Ok(crs.clone());
        }

        let crs = crate::srs::crs_from_metadata(self)?;
        let _ = self.crs_cache.set(crs.clone());
        Ok(crs)
    }

    pub fn require_crs(&self) -> Result<Crs> {
        self.crs()?
            .ok_or_else(|| Error::MissingCrs(format!("No CRS found for {}", self.name().unwrap_or("array"))))
    }

    /// The resolved affine transform, see [`crate::geotransform::transform_from_metadata`]
    pub fn transform(&self, cfg: &RasterConfig) -> Result<GeoTransform> {
        if let Some(cached) = self.transform_cache.get() {
            if cached.x_dim == cfg.x_dim && cached.y_dim == cfg.y_dim && cached.tolerance == cfg.grid_tolerance {
                return Ok(cached.transform);
            }
        }

        let transform = geotransform::transform_from_metadata(self, cfg)?;
        let _ = self.transform_cache.set(CachedTransform {
            x_dim: cfg.x_dim.clone(),
            y_dim: cfg.y_dim.clone(),
            tolerance: cfg.grid_tolerance,
            transform,
        });

        Ok(transform)
    }

    /// The transform derived from the coordinates, ignoring explicit and cached metadata
    pub fn recalc_transform(&self, cfg: &RasterConfig) -> Result<GeoTransform> {
        let x = self.require_coords(&cfg.x_dim)?;
        let y = self.require_coords(&cfg.y_dim)?;
        geotransform::transform_from_coords(&cfg.x_dim, x, &cfg.y_dim, y, cfg.grid_tolerance)
    }

    pub fn geo_reference(&self, cfg: &RasterConfig) -> Result<GeoReference> {
        Ok(GeoReference::new(self.crs()?, self.raster_size(cfg)?, self.transform(cfg)?))
    }

    pub fn bounds(&self, cfg: &RasterConfig) -> Result<Rect<f64>> {
        Ok(self.geo_reference(cfg)?.bounding_box())
    }

    /// The signed (x, y) resolution
    pub fn resolution(&self, cfg: &RasterConfig) -> Result<(f64, f64)> {
        let transform = self.transform(cfg)?;
        Ok((transform.cell_size_x(), transform.cell_size_y()))
    }

    /// The bounds expressed in another CRS, see [`crate::algo::transform_bounds`]
    pub fn transform_bounds(&self, dst_crs: impl Into<CrsInput>, cfg: &RasterConfig) -> Result<Rect<f64>> {
        let src_crs = self.require_crs()?;
        crate::algo::transform_bounds(&self.bounds(cfg)?, &src_crs, &Crs::resolve(dst_crs)?, cfg.densify_points)
    }

    /// Attach a CRS: stored as explicit metadata and written as WKT1_GDAL to the `crs_wkt` and `spatial_ref` attributes.
    /// A stale `crs` attribute is removed.
    pub fn write_crs(self, crs: impl Into<CrsInput>) -> Result<Self> {
        self.write_crs_as(crs, WktVersion::Wkt1Gdal)
    }

    /// [`RasterArray::write_crs`] with the attributes written in the requested WKT dialect
    pub fn write_crs_as(mut self, crs: impl Into<CrsInput>, version: WktVersion) -> Result<Self> {
        let crs = Crs::resolve(crs)?;
        let definition = crs.to_definition_as(version);
        self.attrs.remove(CRS_ATTR);
        self.attrs.insert(CRS_WKT_ATTR.to_string(), definition.clone().into());
        self.attrs.insert(SPATIAL_REF_ATTR.to_string(), definition.into());
        self.crs = Some(crs);
        self.invalidate_caches();
        Ok(self)
    }

    /// Set the nodata value, `None` removes it. Written to the `_FillValue` attribute, stale keys are dropped.
    pub fn write_nodata(mut self, nodata: Option<f64>) -> Self {
        for key in [FILL_VALUE, MISSING_VALUE, NODATAVALS] {
            self.attrs.remove(key);
        }
        self.encoding.remove(FILL_VALUE);

        if let Some(nodata) = nodata {
            self.attrs.insert(FILL_VALUE.to_string(), nodata.into());
        }

        self.nodata = nodata;
        self
    }

    /// Set the affine transform: stored as explicit metadata and in the `transform` attribute
    pub fn write_transform(mut self, transform: GeoTransform) -> Self {
        self.attrs
            .insert(TRANSFORM_ATTR.to_string(), transform.coefficients().to_vec().into());
        self.transform = Some(transform);
        self.invalidate_caches();
        self
    }

    /// Select a window of the spatial plane, coordinates and transform are updated accordingly
    pub fn isel_window(&self, rows: std::ops::Range<usize>, cols: std::ops::Range<usize>, cfg: &RasterConfig) -> Result<Self> {
        let (y_axis, x_axis) = self.spatial_axes(cfg)?;
        let size = self.raster_size(cfg)?;
        if rows.start > rows.end || cols.start > cols.end || rows.end > size.rows || cols.end > size.cols {
            return Err(Error::InvalidArgument(format!(
                "Window rows {rows:?} cols {cols:?} outside of raster {size}"
            )));
        }

        let transform = self.transform(cfg).ok();
        let data = self
            .data
            .slice_axis(Axis(y_axis), Slice::from(rows.clone()))
            .slice_axis(Axis(x_axis), Slice::from(cols.clone()))
            .to_owned();

        let mut result = self.derive(data);
        for (dim, range) in [(&cfg.y_dim, &rows), (&cfg.x_dim, &cols)] {
            if let Some(values) = self.coords(dim) {
                result.set_coords_unchecked(dim, values[range.clone()].to_vec());
            }
        }

        if let Some(transform) = transform {
            result = result.write_transform(transform.translated(cols.start as f64, rows.start as f64));
        }

        Ok(result)
    }

    /// A copy with a new pixel buffer of the same rank, metadata is carried over.
    /// Coordinates of dimensions whose length changed are dropped, as is the transform when the shape changed.
    pub(crate) fn derive<U: ArrayNum>(&self, data: ArrayD<U>) -> RasterArray<U> {
        let same_shape = data.shape() == self.data.shape();
        let mut attrs = self.attrs.clone();
        if !same_shape {
            attrs.remove(TRANSFORM_ATTR);
        }

        let coords = self
            .coords
            .iter()
            .filter(|(dim, values)| {
                self.dims
                    .iter()
                    .position(|d| d == *dim)
                    .is_some_and(|axis| data.shape().get(axis) == Some(&values.len()))
            })
            .map(|(dim, values)| (dim.clone(), values.clone()))
            .collect();

        RasterArray {
            name: self.name.clone(),
            dims: self.dims.clone(),
            data,
            coords,
            coord_attrs: self.coord_attrs.clone(),
            attrs,
            encoding: self.encoding.clone(),
            chunks: self.chunks.clone(),
            nodata: self.nodata,
            crs: self.crs.clone(),
            transform: if same_shape { self.transform } else { None },
            crs_cache: OnceLock::new(),
            transform_cache: OnceLock::new(),
        }
    }

    pub(crate) fn set_coords_unchecked(&mut self, dim: &str, values: Vec<f64>) {
        self.coords.insert(dim.to_string(), values);
        self.invalidate_caches();
    }

    fn require_coords(&self, dim: &str) -> Result<&[f64]> {
        self.dim_index(dim)?;
        self.coords(dim)
            .ok_or_else(|| Error::InvalidArgument(format!("No coordinates available for dimension '{dim}'")))
    }

    fn invalidate_caches(&mut self) {
        self.crs_cache = OnceLock::new();
        self.transform_cache = OnceLock::new();
    }
}

impl<T: ArrayNum> LabeledArray for RasterArray<T> {
    fn dims(&self) -> &[String] {
        &self.dims
    }

    fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    fn coords(&self, dim: &str) -> Option<&[f64]> {
        self.coords.get(dim).map(Vec::as_slice)
    }

    fn attrs(&self) -> &Attributes {
        &self.attrs
    }

    fn encoding(&self) -> &Attributes {
        &self.encoding
    }

    fn explicit_nodata(&self) -> Option<f64> {
        self.nodata
    }

    fn explicit_crs(&self) -> Option<&Crs> {
        self.crs.as_ref()
    }

    fn explicit_transform(&self) -> Option<GeoTransform> {
        self.transform
    }
}
