//! Georeferenced labeled raster arrays.
//!
//! The functionality lives in the member crates, this crate re-exports them:
//! [`geo`] for the raster containers and spatial operations, [`inf`] for the numeric building blocks.

pub use geo;
pub use inf;

pub use geo::{Error, RasterArray, RasterConfig, RasterDataset, Result};
