use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid CRS: {0}")]
    InvalidCrs(String),
    #[error("CRS not found: {0}")]
    MissingCrs(String),
    #[error("Coordinates of dimension '{dim}' are not evenly spaced: {reason}")]
    NonUniformGrid { dim: String, reason: String },
    #[error("Only one pixel along a spatial dimension: {0}")]
    OneDimensionalRaster(String),
    #[error("No data found in bounds: {0}")]
    NoDataInBounds(String),
    #[error("Unsupported resampling method: {0}")]
    UnsupportedResamplingMethod(String),
    #[error("Dataset must contain a single spatial variable: {0}")]
    SingleVariableDataset(String),
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),
    #[error("Missing dimension: {0}")]
    MissingDimension(String),
    #[error("Raster dimensions do not match ({}x{}) <-> ({}x{})", .size1.0, .size1.1, .size2.0, .size2.1)]
    SizeMismatch { size1: (usize, usize), size2: (usize, usize) },
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Runtime error: {0}")]
    Runtime(String),
    #[error("Projection error: {0}")]
    Projection(#[from] proj4rs::errors::Error),
    #[error("Array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
    #[error(transparent)]
    Numeric(#[from] inf::Error),
}
