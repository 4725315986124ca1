#![cfg_attr(docsrs, feature(doc_cfg))]

//! Numeric building blocks shared by the raster algorithms: resampling kernel weights,
//! scattered data interpolation helpers and an exact integer Delaunay triangulation.

extern crate approx;

pub use error::Error;
pub type Result<T = ()> = std::result::Result<T, Error>;

mod error;
pub mod interpolate;
pub mod triangulation;

#[doc(inline)]
pub use triangulation::{LatticePoint, Triangulation};
