use crate::{Attributes, Crs, Error, GeoTransform, Result};

/// Read access to a labeled n-dimensional array.
///
/// The spatial operations only rely on this capability set: named dimensions with their lengths,
/// 1-D coordinate vectors, attributes, encoding, and the explicitly attached spatial metadata.
pub trait LabeledArray {
    fn dims(&self) -> &[String];
    fn shape(&self) -> &[usize];
    fn coords(&self, dim: &str) -> Option<&[f64]>;
    fn attrs(&self) -> &Attributes;
    fn encoding(&self) -> &Attributes;

    fn explicit_nodata(&self) -> Option<f64> {
        None
    }

    fn explicit_crs(&self) -> Option<&Crs> {
        None
    }

    fn explicit_transform(&self) -> Option<GeoTransform> {
        None
    }

    fn dim_index(&self, dim: &str) -> Result<usize> {
        self.dims()
            .iter()
            .position(|d| d == dim)
            .ok_or_else(|| Error::MissingDimension(format!("'{dim}' not found in dimensions {:?}", self.dims())))
    }

    fn dim_len(&self, dim: &str) -> Result<usize> {
        Ok(self.shape()[self.dim_index(dim)?])
    }

    fn has_dim(&self, dim: &str) -> bool {
        self.dims().iter().any(|d| d == dim)
    }
}
