use bon::bon;

use crate::{NumThreads, WktVersion};

pub const DEFAULT_X_DIM: &str = "x";
pub const DEFAULT_Y_DIM: &str = "y";
/// Allowed deviation of coordinate spacing, as a fraction of the resolution
pub const DEFAULT_GRID_TOLERANCE: f64 = 1e-3;
/// Points inserted along each bounding box edge when transforming bounds
pub const DEFAULT_DENSIFY_POINTS: usize = 21;

/// Settings shared by all raster operations.
///
/// The spatial dimension names identify the x and y axes of every array, the other settings
/// control grid derivation, bounds transformation, CRS export and chunk parallelism.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RasterConfig {
    pub x_dim: String,
    pub y_dim: String,
    pub grid_tolerance: f64,
    pub densify_points: usize,
    pub wkt_version: WktVersion,
    pub num_threads: NumThreads,
}

#[bon]
impl RasterConfig {
    #[builder]
    pub fn new(
        x_dim: Option<&str>,
        y_dim: Option<&str>,
        grid_tolerance: Option<f64>,
        densify_points: Option<usize>,
        wkt_version: Option<WktVersion>,
        num_threads: Option<NumThreads>,
    ) -> Self {
        Self {
            x_dim: x_dim.unwrap_or(DEFAULT_X_DIM).to_string(),
            y_dim: y_dim.unwrap_or(DEFAULT_Y_DIM).to_string(),
            grid_tolerance: grid_tolerance.unwrap_or(DEFAULT_GRID_TOLERANCE),
            densify_points: densify_points.unwrap_or(DEFAULT_DENSIFY_POINTS),
            wkt_version: wkt_version.unwrap_or_default(),
            num_threads: num_threads.unwrap_or(NumThreads::Count(1)),
        }
    }
}

impl Default for RasterConfig {
    fn default() -> Self {
        RasterConfig::builder().build()
    }
}
