//! Axis aligned rectangles used as spatial bounds.

use geo_types::CoordNum;

use crate::Point;

/// Axis aligned bounding box, always normalized so that `min <= max` on both axes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect<T = f64>
where
    T: CoordNum,
{
    min: Point<T>,
    max: Point<T>,
}

impl<T: CoordNum> Rect<T> {
    /// Rectangle spanned by two opposite corners, in any order
    pub fn from_points(p1: Point<T>, p2: Point<T>) -> Self {
        Rect {
            min: Point::new(lowest(p1.x(), p2.x()), lowest(p1.y(), p2.y())),
            max: Point::new(highest(p1.x(), p2.x()), highest(p1.y(), p2.y())),
        }
    }

    /// Construct from (minx, miny, maxx, maxy) bounds, the order is normalized
    pub fn from_bounds(min_x: T, min_y: T, max_x: T, max_y: T) -> Self {
        Self::from_points(Point::new(min_x, min_y), Point::new(max_x, max_y))
    }

    /// Smallest rectangle containing all the points, `None` for an empty iterator
    pub fn hull(points: impl IntoIterator<Item = Point<T>>) -> Option<Self> {
        points.into_iter().fold(None, |acc: Option<Self>, p| {
            Some(match acc {
                None => Rect { min: p, max: p },
                Some(r) => Rect {
                    min: Point::new(lowest(r.min.x(), p.x()), lowest(r.min.y(), p.y())),
                    max: Point::new(highest(r.max.x(), p.x()), highest(r.max.y(), p.y())),
                },
            })
        })
    }

    /// The bounds as (minx, miny, maxx, maxy)
    pub fn bounds(&self) -> (T, T, T, T) {
        (self.min.x(), self.min.y(), self.max.x(), self.max.y())
    }

    pub fn min_x(&self) -> T {
        self.min.x()
    }

    pub fn min_y(&self) -> T {
        self.min.y()
    }

    pub fn max_x(&self) -> T {
        self.max.x()
    }

    pub fn max_y(&self) -> T {
        self.max.y()
    }

    pub fn width(&self) -> T {
        self.max.x() - self.min.x()
    }

    pub fn height(&self) -> T {
        self.max.y() - self.min.y()
    }

    /// North west corner
    pub fn top_left(&self) -> Point<T> {
        Point::new(self.min.x(), self.max.y())
    }

    /// South east corner
    pub fn bottom_right(&self) -> Point<T> {
        Point::new(self.max.x(), self.min.y())
    }

    /// North east corner
    pub fn top_right(&self) -> Point<T> {
        self.max
    }

    /// South west corner
    pub fn bottom_left(&self) -> Point<T> {
        self.min
    }
}

fn lowest<T: PartialOrd>(a: T, b: T) -> T {
    if b < a { b } else { a }
}

fn highest<T: PartialOrd>(a: T, b: T) -> T {
    if b > a { b } else { a }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_are_normalized() {
        let r = Rect::from_bounds(4.0, 8.0, 2.0, 2.0);
        assert_eq!(r.bounds(), (2.0, 2.0, 4.0, 8.0));
        assert_eq!(r.top_left(), Point::new(2.0, 8.0));
        assert_eq!(r.bottom_right(), Point::new(4.0, 2.0));
        assert_eq!(r.top_right(), Point::new(4.0, 8.0));
        assert_eq!(r.bottom_left(), Point::new(2.0, 2.0));
        assert_eq!((r.width(), r.height()), (2.0, 6.0));
    }

    #[test]
    fn hull_of_points() {
        let hull = Rect::hull([Point::new(1.0, -1.0), Point::new(-3.0, 2.0), Point::new(0.5, 7.0)]).unwrap();
        assert_eq!(hull.bounds(), (-3.0, -1.0, 1.0, 7.0));
        assert!(Rect::<f64>::hull(std::iter::empty()).is_none());
    }
}
