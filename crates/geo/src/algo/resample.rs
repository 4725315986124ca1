//! Resampling of a source plane at fractional pixel locations.
//!
//! Locations are expressed in source pixel space, (0, 0) being the top left corner of the
//! top left pixel. Kernel methods interpolate between the pixel centers, footprint methods
//! aggregate all source pixels covered by the destination pixel.

use std::str::FromStr;

use inf::interpolate;
use ndarray::ArrayView2;

use crate::{ArrayNum, Error, nodata::is_missing};

/// Sharpness of the cubic convolution kernel
const CUBIC_A: f64 = -0.5;
const LANCZOS_RADIUS: i64 = 3;
const MAX_TAPS: usize = 2 * LANCZOS_RADIUS as usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Resampling {
    #[default]
    Nearest,
    Bilinear,
    Cubic,
    CubicSpline,
    Lanczos,
    Average,
    Mode,
    Max,
    Min,
    Med,
    Q1,
    Q3,
    Sum,
    Rms,
}

impl Resampling {
    pub const ALL: [Resampling; 14] = [
        Resampling::Nearest,
        Resampling::Bilinear,
        Resampling::Cubic,
        Resampling::CubicSpline,
        Resampling::Lanczos,
        Resampling::Average,
        Resampling::Mode,
        Resampling::Max,
        Resampling::Min,
        Resampling::Med,
        Resampling::Q1,
        Resampling::Q3,
        Resampling::Sum,
        Resampling::Rms,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Resampling::Nearest => "nearest",
            Resampling::Bilinear => "bilinear",
            Resampling::Cubic => "cubic",
            Resampling::CubicSpline => "cubic_spline",
            Resampling::Lanczos => "lanczos",
            Resampling::Average => "average",
            Resampling::Mode => "mode",
            Resampling::Max => "max",
            Resampling::Min => "min",
            Resampling::Med => "med",
            Resampling::Q1 => "q1",
            Resampling::Q3 => "q3",
            Resampling::Sum => "sum",
            Resampling::Rms => "rms",
        }
    }

    /// True for the methods that aggregate the destination pixel footprint
    pub fn uses_footprint(&self) -> bool {
        !matches!(
            self,
            Resampling::Nearest | Resampling::Bilinear | Resampling::Cubic | Resampling::CubicSpline | Resampling::Lanczos
        )
    }
}

impl FromStr for Resampling {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        match normalized.as_str() {
            "near" => Ok(Resampling::Nearest),
            "cubicspline" => Ok(Resampling::CubicSpline),
            name => Resampling::ALL
                .into_iter()
                .find(|method| method.name() == name)
                .ok_or_else(|| Error::UnsupportedResamplingMethod(s.to_string())),
        }
    }
}

impl std::fmt::Display for Resampling {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

struct Taps {
    taps: [(usize, f64); MAX_TAPS],
    len: usize,
}

impl Taps {
    fn new(center: f64, size: usize, radius: i64, weight: impl Fn(f64) -> f64) -> Self {
        let mut taps = [(0, 0.0); MAX_TAPS];
        let mut len = 0;

        let base = center.floor() as i64;
        for index in (base - radius + 1)..=(base + radius) {
            if index < 0 || index >= size as i64 {
                continue;
            }

            let w = weight(center - index as f64);
            if w != 0.0 {
                taps[len] = (index as usize, w);
                len += 1;
            }
        }

        Taps { taps, len }
    }

    fn iter(&self) -> impl Iterator<Item = &(usize, f64)> {
        self.taps[..self.len].iter()
    }
}

/// Separable kernel interpolation, the weights are renormalized over the valid taps
fn kernel_sample<T: ArrayNum>(
    src: &ArrayView2<T>,
    nodata: Option<f64>,
    x: f64,
    y: f64,
    radius: i64,
    weight: impl Fn(f64) -> f64,
) -> Option<T> {
    let (rows, cols) = src.dim();
    let x_taps = Taps::new(x - 0.5, cols, radius, &weight);
    let y_taps = Taps::new(y - 0.5, rows, radius, &weight);

    let mut sum = 0.0;
    let mut total = 0.0;
    for &(row, wy) in y_taps.iter() {
        for &(col, wx) in x_taps.iter() {
            let value = src[[row, col]];
            if is_missing(value, nodata) {
                continue;
            }

            let w = wx * wy;
            sum += w * value.to_f64()?;
            total += w;
        }
    }

    if total.abs() < 1e-12 {
        return None;
    }

    Some(T::from_f64_saturating(sum / total))
}

/// The valid source pixels covered by the footprint, with their overlap area
fn footprint<T: ArrayNum>(src: &ArrayView2<T>, nodata: Option<f64>, x: f64, y: f64, scale: (f64, f64)) -> Vec<(T, f64)> {
    let (rows, cols) = src.dim();
    let hx = (scale.0 / 2.0).max(0.5);
    let hy = (scale.1 / 2.0).max(0.5);

    let col_start = (x - hx).floor().max(0.0) as usize;
    let col_end = ((x + hx).ceil().max(0.0) as usize).min(cols);
    let row_start = (y - hy).floor().max(0.0) as usize;
    let row_end = ((y + hy).ceil().max(0.0) as usize).min(rows);

    let overlap = |index: usize, center: f64, half: f64| {
        let lo = (index as f64).max(center - half);
        let hi = (index as f64 + 1.0).min(center + half);
        (hi - lo).max(0.0)
    };

    let mut values = Vec::with_capacity((row_end.saturating_sub(row_start)) * (col_end.saturating_sub(col_start)));
    for row in row_start..row_end {
        let oy = overlap(row, y, hy);
        if oy <= 0.0 {
            continue;
        }

        for col in col_start..col_end {
            let value = src[[row, col]];
            let w = overlap(col, x, hx) * oy;
            if w > 0.0 && !is_missing(value, nodata) {
                values.push((value, w));
            }
        }
    }

    values
}

fn sort_values<T: ArrayNum>(values: &mut [(T, f64)]) {
    values.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
}

/// Lower quantile of the footprint values, no interpolation between values
fn quantile<T: ArrayNum>(mut values: Vec<(T, f64)>, q: f64) -> Option<T> {
    if values.is_empty() {
        return None;
    }

    sort_values(&mut values);
    let index = ((values.len() - 1) as f64 * q).floor() as usize;
    Some(values[index].0)
}

/// Most frequent value, ties are resolved in favour of the smallest value
fn mode<T: ArrayNum>(mut values: Vec<(T, f64)>) -> Option<T> {
    sort_values(&mut values);

    let mut best: Option<(T, usize)> = None;
    let mut start = 0;
    while start < values.len() {
        let value = values[start].0;
        let end = start + values[start..].iter().take_while(|(v, _)| *v == value).count();
        if best.is_none_or(|(_, count)| end - start > count) {
            best = Some((value, end - start));
        }
        start = end;
    }

    best.map(|(value, _)| value)
}

fn weighted<T: ArrayNum>(values: &[(T, f64)], f: impl Fn(f64) -> f64) -> Option<(f64, f64)> {
    if values.is_empty() {
        return None;
    }

    let (sum, total) = values
        .iter()
        .fold((0.0, 0.0), |(sum, total), (v, w)| (sum + w * f(v.to_f64().unwrap_or(0.0)), total + w));
    Some((sum, total))
}

/// Sample the plane at the fractional pixel location (`x`, `y`).
///
/// `scale` is the size of the destination pixel expressed in source pixels, it determines the
/// footprint of the aggregating methods. Returns `None` when the location is outside of the
/// plane or no valid source pixel contributes.
pub fn sample<T: ArrayNum>(src: &ArrayView2<T>, nodata: Option<f64>, method: Resampling, x: f64, y: f64, scale: (f64, f64)) -> Option<T> {
    let (rows, cols) = src.dim();
    if !(x >= 0.0 && y >= 0.0 && x < cols as f64 && y < rows as f64) {
        return None;
    }

    match method {
        Resampling::Nearest => {
            let value = src[[y as usize, x as usize]];
            (!is_missing(value, nodata)).then_some(value)
        }
        Resampling::Bilinear => kernel_sample(src, nodata, x, y, 1, interpolate::linear_weight),
        Resampling::Cubic => kernel_sample(src, nodata, x, y, 2, |d| interpolate::cubic_convolution_weight(d, CUBIC_A)),
        Resampling::CubicSpline => kernel_sample(src, nodata, x, y, 2, interpolate::cubic_bspline_weight),
        Resampling::Lanczos => kernel_sample(src, nodata, x, y, LANCZOS_RADIUS, |d| {
            interpolate::lanczos_weight(d, LANCZOS_RADIUS as f64)
        }),
        Resampling::Average => {
            let (sum, total) = weighted(&footprint(src, nodata, x, y, scale), |v| v)?;
            Some(T::from_f64_saturating(sum / total))
        }
        Resampling::Sum => {
            let (sum, _) = weighted(&footprint(src, nodata, x, y, scale), |v| v)?;
            Some(T::from_f64_saturating(sum))
        }
        Resampling::Rms => {
            let (sum, total) = weighted(&footprint(src, nodata, x, y, scale), |v| v * v)?;
            Some(T::from_f64_saturating((sum / total).sqrt()))
        }
        Resampling::Mode => mode(footprint(src, nodata, x, y, scale)),
        Resampling::Max => footprint(src, nodata, x, y, scale)
            .into_iter()
            .map(|(v, _)| v)
            .reduce(|a, b| if b > a { b } else { a }),
        Resampling::Min => footprint(src, nodata, x, y, scale)
            .into_iter()
            .map(|(v, _)| v)
            .reduce(|a, b| if b < a { b } else { a }),
        Resampling::Med => quantile(footprint(src, nodata, x, y, scale), 0.5),
        Resampling::Q1 => quantile(footprint(src, nodata, x, y, scale), 0.25),
        Resampling::Q3 => quantile(footprint(src, nodata, x, y, scale), 0.75),
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use ndarray::{Array2, array};

    use super::*;

    fn gradient() -> Array2<f64> {
        Array2::from_shape_fn((6, 6), |(row, col)| (row * 6 + col) as f64)
    }

    #[test]
    fn parse_method_names() {
        assert_eq!("nearest".parse::<Resampling>().unwrap(), Resampling::Nearest);
        assert_eq!("BILINEAR".parse::<Resampling>().unwrap(), Resampling::Bilinear);
        assert_eq!("cubic-spline".parse::<Resampling>().unwrap(), Resampling::CubicSpline);
        assert_eq!("Cubic_Spline".parse::<Resampling>().unwrap(), Resampling::CubicSpline);
        assert_eq!("q3".parse::<Resampling>().unwrap(), Resampling::Q3);
        assert!(matches!("gauss".parse::<Resampling>(), Err(Error::UnsupportedResamplingMethod(_))));

        for method in Resampling::ALL {
            assert_eq!(method.to_string().parse::<Resampling>().unwrap(), method);
        }
    }

    #[test]
    fn kernels_reproduce_pixel_centers() {
        let src = gradient();
        let view = src.view();
        for method in [Resampling::Nearest, Resampling::Bilinear, Resampling::Cubic, Resampling::Lanczos] {
            let value = sample(&view, None, method, 3.5, 2.5, (1.0, 1.0)).unwrap();
            assert_relative_eq!(value, src[[2, 3]], epsilon = 1e-9);
        }
    }

    #[test]
    fn bilinear_between_centers() {
        let src = array![[0.0, 10.0], [20.0, 30.0]];
        let value = sample(&src.view(), None, Resampling::Bilinear, 1.0, 1.0, (1.0, 1.0)).unwrap();
        assert_relative_eq!(value, 15.0);

        // The nodata tap is excluded and the weights renormalized
        let src = array![[0.0, 10.0], [20.0, -1.0]];
        let value = sample(&src.view(), Some(-1.0), Resampling::Bilinear, 1.0, 1.0, (1.0, 1.0)).unwrap();
        assert_relative_eq!(value, 10.0);
    }

    #[test]
    fn cubic_spline_preserves_constants() {
        let src = Array2::from_elem((5, 5), 7.0);
        let value = sample(&src.view(), None, Resampling::CubicSpline, 2.2, 1.7, (1.0, 1.0)).unwrap();
        assert_relative_eq!(value, 7.0, epsilon = 1e-12);
    }

    #[test]
    fn integer_results_are_rounded() {
        let src = array![[0u8, 1], [1, 1]];
        let value = sample(&src.view(), None, Resampling::Bilinear, 1.0, 1.0, (1.0, 1.0)).unwrap();
        assert_eq!(value, 1);
    }

    #[test]
    fn outside_of_the_plane() {
        let src = gradient();
        assert!(sample(&src.view(), None, Resampling::Bilinear, -0.1, 2.0, (1.0, 1.0)).is_none());
        assert!(sample(&src.view(), None, Resampling::Average, 6.0, 2.0, (1.0, 1.0)).is_none());
    }

    #[test]
    fn footprint_statistics() {
        let src = array![[1.0, 2.0, 5.0, 5.0], [3.0, 4.0, 5.0, -1.0]];
        let view = src.view();
        let s = |method| sample(&view, Some(-1.0), method, 1.0, 1.0, (2.0, 2.0)).unwrap();

        assert_relative_eq!(s(Resampling::Average), 2.5);
        assert_relative_eq!(s(Resampling::Sum), 10.0);
        assert_relative_eq!(s(Resampling::Rms), (30.0f64 / 4.0).sqrt());
        assert_eq!(s(Resampling::Min), 1.0);
        assert_eq!(s(Resampling::Max), 4.0);
        assert_eq!(s(Resampling::Med), 2.0);
        assert_eq!(s(Resampling::Q1), 1.0);
        assert_eq!(s(Resampling::Q3), 3.0);

        // Footprint over the right half, the nodata pixel is skipped
        let mode = sample(&view, Some(-1.0), Resampling::Mode, 3.0, 1.0, (2.0, 2.0)).unwrap();
        assert_eq!(mode, 5.0);
        let average = sample(&view, Some(-1.0), Resampling::Average, 3.0, 1.0, (2.0, 2.0)).unwrap();
        assert_relative_eq!(average, 5.0);
    }
}
