use proj4rs::transform::transform;

use crate::{Crs, Error, Point, Result};

/// Transforms coordinates between two coordinate reference systems.
///
/// Geographic coordinates are expressed in degrees on both sides, the conversion to the
/// radians expected by `proj4rs` is handled internally. Equal systems result in an identity transform.
#[derive(Debug, Clone)]
pub struct CoordinateTransformer {
    source: Crs,
    target: Crs,
    identity: bool,
}

impl CoordinateTransformer {
    pub fn new(source: &Crs, target: &Crs) -> Self {
        CoordinateTransformer {
            source: source.clone(),
            target: target.clone(),
            identity: source == target,
        }
    }

    pub fn is_identity(&self) -> bool {
        self.identity
    }

    pub fn source(&self) -> &Crs {
        &self.source
    }

    pub fn target(&self) -> &Crs {
        &self.target
    }

    /// Transform a point, `None` when the point cannot be represented in the target system
    pub fn try_transform_point(&self, point: Point) -> Option<Point> {
        if self.identity {
            return Some(point);
        }

        let mut coord = if self.source.is_geographic() {
            (point.x().to_radians(), point.y().to_radians(), 0.0)
        } else {
            (point.x(), point.y(), 0.0)
        };

        transform(self.source.proj(), self.target.proj(), &mut coord).ok()?;

        let (x, y) = if self.target.is_geographic() {
            (coord.0.to_degrees(), coord.1.to_degrees())
        } else {
            (coord.0, coord.1)
        };

        (x.is_finite() && y.is_finite()).then(|| Point::new(x, y))
    }

    pub fn transform_point(&self, point: Point) -> Result<Point> {
        self.try_transform_point(point).ok_or_else(|| {
            Error::Runtime(format!(
                "Failed to transform point ({}, {}) from {} to {}",
                point.x(),
                point.y(),
                self.source,
                self.target
            ))
        })
    }

    pub fn transform_point_in_place(&self, point: &mut Point) -> Result<()> {
        *point = self.transform_point(*point)?;
        Ok(())
    }

    pub fn transform_points_in_place(&self, points: &mut [Point]) -> Result<()> {
        for point in points.iter_mut() {
            self.transform_point_in_place(point)?;
        }
        Ok(())
    }

    /// The transformer performing the inverse operation
    pub fn inverse(&self) -> Self {
        CoordinateTransformer {
            source: self.target.clone(),
            target: self.source.clone(),
            identity: self.identity,
        }
    }
}
