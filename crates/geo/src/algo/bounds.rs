use crate::{CoordinateTransformer, Crs, Error, Point, Rect, Result};

/// Points along an edge, both corners included
fn edge_points(start: Point, end: Point, points_per_edge: usize, points: &mut Vec<Point>) {
    for i in 0..points_per_edge {
        let t = i as f64 / (points_per_edge - 1) as f64;
        points.push(Point::new(start.x() + t * (end.x() - start.x()), start.y() + t * (end.y() - start.y())));
    }
}

/// The points sampled on the outline of a bounding box, `densify_points` extra points are inserted on every edge
pub(crate) fn densified_outline(bbox: &Rect<f64>, densify_points: usize) -> Vec<Point> {
    let points_per_edge = densify_points + 2;
    let mut points = Vec::with_capacity(points_per_edge * 4);

    edge_points(bbox.top_left(), bbox.top_right(), points_per_edge, &mut points);
    edge_points(bbox.top_right(), bbox.bottom_right(), points_per_edge, &mut points);
    edge_points(bbox.bottom_right(), bbox.bottom_left(), points_per_edge, &mut points);
    edge_points(bbox.bottom_left(), bbox.top_left(), points_per_edge, &mut points);
    points
}

/// Transform a bounding box to a different coordinate system.
///
/// Instead of only the 4 corners, `densify_points` points are sampled along every edge so
/// curved edges in the target system are bounded correctly.
/// Points that cannot be represented in the target system are skipped.
pub fn transform_bounds(bbox: &Rect<f64>, src_crs: &Crs, dst_crs: &Crs, densify_points: usize) -> Result<Rect<f64>> {
    let coord_trans = CoordinateTransformer::new(src_crs, dst_crs);
    if coord_trans.is_identity() {
        return Ok(*bbox);
    }

    let points = densified_outline(bbox, densify_points);
    let transformed: Vec<Point> = points.iter().filter_map(|p| coord_trans.try_transform_point(*p)).collect();
    if transformed.len() < points.len() {
        log::debug!(
            "{} of {} bound points could not be transformed from {src_crs} to {dst_crs}",
            points.len() - transformed.len(),
            points.len()
        );
    }

    Rect::hull(transformed).ok_or_else(|| {
        Error::Runtime(format!(
            "Failed to transform bounds ({:?}) from {src_crs} to {dst_crs}",
            bbox.bounds()
        ))
    })
}
