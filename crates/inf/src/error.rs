use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Coordinate out of range: ({x}, {y}), the supported range is ±{limit}")]
    CoordinateOutOfRange { x: i64, y: i64, limit: i64 },
}
