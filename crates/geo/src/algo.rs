//! Spatial operations on raster arrays and datasets.

mod bounds;
mod clip;
mod interpolate;
mod mask;
mod reproject;
mod resample;
mod slice;
mod warp;

#[doc(inline)]
pub use bounds::transform_bounds;
#[doc(inline)]
pub use clip::{ClipOptions, clip, clip_dataset};
#[doc(inline)]
pub use interpolate::{InterpolateOptions, InterpolationMethod, interpolate_na, interpolate_na_dataset};
#[doc(inline)]
pub use mask::geometry_mask;
#[doc(inline)]
pub use reproject::{ReprojectOptions, destination_grid, reproject, reproject_dataset, reproject_match, reproject_match_dataset};
#[doc(inline)]
pub use resample::{Resampling, sample};
#[doc(inline)]
pub use slice::{clip_box, clip_box_dataset, slice_xy, slice_xy_dataset};
#[doc(inline)]
pub use warp::DEFAULT_ERROR_THRESHOLD;
