//! Nodata handling: per type sentinel values and resolution of the nodata value from array metadata.

use num::{NumCast, ToPrimitive};

use crate::{ArrayNum, LabeledArray};

/// Encoding/attribute key of the CF fill value
pub const FILL_VALUE: &str = "_FillValue";
/// Legacy CF attribute key
pub const MISSING_VALUE: &str = "missing_value";
/// GDAL style per band nodata list
pub const NODATAVALS: &str = "nodatavals";

/// Trait for types that can represent a no-data value in raster data.
/// Floating point types use NaN as the no-data value, while integer types use their maximum value
/// for unsigned types and minimum value for signed types.
pub trait Nodata: ToPrimitive + PartialEq + Sized + Copy {
    const NODATA: Self;

    #[inline]
    fn is_nodata(self) -> bool {
        self == Self::NODATA
    }

    fn has_nan() -> bool;
    fn is_nan(self) -> bool;
}

macro_rules! impl_nodata_fixed_point {
    ( $t:ident, $nodata:ident ) => {
        impl Nodata for $t {
            const NODATA: $t = $t::$nodata;

            fn has_nan() -> bool {
                false
            }

            fn is_nan(self) -> bool {
                false
            }
        }
    };
}

macro_rules! impl_nodata_floating_point {
    ( $t:ident ) => {
        impl Nodata for $t {
            const NODATA: $t = $t::NAN;

            fn is_nodata(self) -> bool {
                self.is_nan()
            }

            fn has_nan() -> bool {
                true
            }

            fn is_nan(self) -> bool {
                self.is_nan()
            }
        }
    };
}

impl_nodata_fixed_point!(u8, MAX);
impl_nodata_fixed_point!(u16, MAX);
impl_nodata_fixed_point!(u32, MAX);
impl_nodata_fixed_point!(u64, MAX);
impl_nodata_fixed_point!(i8, MIN);
impl_nodata_fixed_point!(i16, MIN);
impl_nodata_fixed_point!(i32, MIN);
impl_nodata_fixed_point!(i64, MIN);

impl_nodata_floating_point!(f32);
impl_nodata_floating_point!(f64);

/// Resolve the nodata value of an array.
///
/// Lookup order: explicit value, encoding `_FillValue`, attribute `_FillValue`,
/// `missing_value` and finally the first entry of `nodatavals`.
pub fn nodata_from_metadata<A: LabeledArray + ?Sized>(arr: &A) -> Option<f64> {
    if let Some(nodata) = arr.explicit_nodata() {
        return Some(nodata);
    }

    if let Some(nodata) = arr.encoding().get(FILL_VALUE).and_then(|v| v.as_f64()) {
        return Some(nodata);
    }

    [FILL_VALUE, MISSING_VALUE, NODATAVALS]
        .iter()
        .find_map(|key| arr.attrs().get(*key).and_then(|v| v.as_f64()))
}

/// True when the value is missing: NaN, or equal to the nodata value
#[inline]
pub fn is_missing<T: ArrayNum>(value: T, nodata: Option<f64>) -> bool {
    if value.is_nan() {
        return true;
    }

    match nodata {
        Some(nodata) if nodata.is_nan() => false,
        Some(nodata) => value.to_f64() == Some(nodata),
        None => false,
    }
}

/// The nodata value expressed in the pixel type, the type sentinel when it is not representable
pub fn fill_value<T: ArrayNum>(nodata: Option<f64>) -> T {
    nodata.and_then(|nodata| <T as NumCast>::from(nodata)).unwrap_or(T::NODATA)
}

/// The nodata value to declare for an output of type `T`: the requested value, the source value or the type sentinel.
///
/// The result always equals the fill value written in the pixels, see [`fill_value`].
/// A value that is not representable in `T` is replaced by the type sentinel.
pub fn output_nodata<T: ArrayNum>(requested: Option<f64>, source: Option<f64>) -> f64 {
    let wanted = requested.or(source);
    let declared = fill_value::<T>(wanted).to_f64().unwrap_or(f64::NAN);

    if let Some(wanted) = wanted {
        if !(wanted.is_nan() && declared.is_nan()) && wanted != declared {
            log::warn!("Nodata value {wanted} is not representable in the output type, using {declared}");
        }
    }

    declared
}
