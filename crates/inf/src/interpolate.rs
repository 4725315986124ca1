use num::Float;

/// Linear interpolation between `a` and `b`
#[inline]
pub fn lerp<T: Float>(a: T, b: T, t: T) -> T {
    a + (b - a) * t
}

/// Triangle (tent) kernel with support [-1, 1]
#[inline]
pub fn linear_weight(x: f64) -> f64 {
    let x = x.abs();
    if x < 1.0 { 1.0 - x } else { 0.0 }
}

/// Keys cubic convolution kernel with support [-2, 2].
/// `a` controls the sharpness, -0.5 gives the classic Catmull-Rom like response.
#[inline]
pub fn cubic_convolution_weight(x: f64, a: f64) -> f64 {
    let x = x.abs();
    if x <= 1.0 {
        ((a + 2.0) * x - (a + 3.0)) * x * x + 1.0
    } else if x < 2.0 {
        ((a * x - 5.0 * a) * x + 8.0 * a) * x - 4.0 * a
    } else {
        0.0
    }
}

/// Cubic B-spline kernel with support [-2, 2], smooths instead of interpolating
#[inline]
pub fn cubic_bspline_weight(x: f64) -> f64 {
    let x = x.abs();
    if x < 1.0 {
        (4.0 - 6.0 * x * x + 3.0 * x * x * x) / 6.0
    } else if x < 2.0 {
        let t = 2.0 - x;
        t * t * t / 6.0
    } else {
        0.0
    }
}

#[inline]
pub fn sinc(x: f64) -> f64 {
    if x.abs() < 1e-12 {
        1.0
    } else {
        let px = std::f64::consts::PI * x;
        px.sin() / px
    }
}

/// Windowed sinc kernel with support [-radius, radius]
#[inline]
pub fn lanczos_weight(x: f64, radius: f64) -> f64 {
    if x.abs() >= radius { 0.0 } else { sinc(x) * sinc(x / radius) }
}

/// Least squares estimate of the gradient of a surface at `origin` given scattered neighbours.
///
/// The neighbours are given as offsets relative to the origin together with the value difference.
/// Returns a zero gradient when the neighbour configuration is degenerate (all collinear).
pub fn plane_gradient(neighbours: impl IntoIterator<Item = (f64, f64, f64)>) -> (f64, f64) {
    let (mut sxx, mut sxy, mut syy, mut sxz, mut syz) = (0.0, 0.0, 0.0, 0.0, 0.0);
    for (dx, dy, dz) in neighbours {
        sxx += dx * dx;
        sxy += dx * dy;
        syy += dy * dy;
        sxz += dx * dz;
        syz += dy * dz;
    }

    let det = sxx * syy - sxy * sxy;
    let scale = (sxx * syy).max(f64::MIN_POSITIVE);
    if det.abs() <= 1e-12 * scale {
        return (0.0, 0.0);
    }

    ((sxz * syy - syz * sxy) / det, (syz * sxx - sxz * sxy) / det)
}

/// A triangle vertex for cubic patch evaluation: position, value and gradient.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PatchVertex {
    pub x: f64,
    pub y: f64,
    pub value: f64,
    pub gradient: (f64, f64),
}

/// Evaluates the cubic Bezier triangle through three vertices with prescribed gradients
/// at the barycentric coordinates `bary`.
///
/// The patch interpolates the vertex values, matches the vertex gradients and reproduces
/// linear functions exactly.
pub fn cubic_triangle_patch(vertices: &[PatchVertex; 3], bary: [f64; 3]) -> f64 {
    let edge_control = |from: &PatchVertex, to: &PatchVertex| -> f64 {
        from.value + (from.gradient.0 * (to.x - from.x) + from.gradient.1 * (to.y - from.y)) / 3.0
    };

    let [p1, p2, p3] = vertices;
    let b300 = p1.value;
    let b030 = p2.value;
    let b003 = p3.value;

    let b210 = edge_control(p1, p2);
    let b120 = edge_control(p2, p1);
    let b021 = edge_control(p2, p3);
    let b012 = edge_control(p3, p2);
    let b102 = edge_control(p3, p1);
    let b201 = edge_control(p1, p3);

    let e = (b210 + b120 + b021 + b012 + b102 + b201) / 6.0;
    let v = (b300 + b030 + b003) / 3.0;
    let b111 = e + (e - v) / 2.0;

    let [u, v, w] = bary;
    b300 * u * u * u
        + b030 * v * v * v
        + b003 * w * w * w
        + 3.0 * (b210 * u * u * v + b120 * u * v * v + b201 * u * u * w + b021 * v * v * w + b102 * u * w * w + b012 * v * w * w)
        + 6.0 * b111 * u * v * w
}
