#![warn(clippy::unwrap_used)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Georeferenced labeled raster arrays.
//!
//! A [`RasterArray`] is an n-dimensional labeled array of which two named dimensions form a regular
//! affine grid. On top of it this crate provides CRS resolution and export, affine grid derivation,
//! bounding box slicing, geometry clipping, reprojection with configurable resampling and nodata
//! interpolation. [`RasterDataset`] applies the same operations to every spatial variable of a collection.

pub type Result<T = ()> = std::result::Result<T, Error>;

pub mod algo;
mod arraynum;
mod attributes;
mod cell;
pub mod cf;
pub mod chunk;
mod config;
mod coordinatetransformer;
pub mod crs;
mod error;
mod georeference;
mod geotransform;
mod labeledarray;
pub mod nodata;
mod point;
mod rasterarray;
mod rasterdataset;
mod rastersize;
mod rect;
pub mod srs;
#[cfg(test)]
mod testutils;

#[doc(inline)]
pub use arraynum::ArrayNum;
#[doc(inline)]
pub use attributes::{AttrValue, Attributes};
#[doc(inline)]
pub use cell::Cell;
#[doc(inline)]
pub use chunk::{ChunkLayout, NumThreads};
#[doc(inline)]
pub use config::RasterConfig;
#[doc(inline)]
pub use coordinatetransformer::CoordinateTransformer;
#[doc(inline)]
pub use crs::Epsg;
#[doc(inline)]
pub use error::Error;
#[doc(inline)]
pub use georeference::{CellSize, GeoReference, grid_from_metadata};
#[doc(inline)]
pub use geotransform::{GeoTransform, TRANSFORM_ATTR, affine_to_coords, transform_from_coords, transform_from_metadata};
#[doc(inline)]
pub use labeledarray::LabeledArray;
#[doc(inline)]
pub use nodata::Nodata;
#[doc(inline)]
pub use point::Point;
#[doc(inline)]
pub use rasterarray::RasterArray;
#[doc(inline)]
pub use rasterdataset::RasterDataset;
#[doc(inline)]
pub use rastersize::RasterSize;
#[doc(inline)]
pub use rect::Rect;
#[doc(inline)]
pub use srs::{Crs, CrsInput, WktVersion};
