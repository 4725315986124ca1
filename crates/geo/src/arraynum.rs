use crate::Nodata;

/// Type requirements for the pixel values of raster arrays
pub trait ArrayNum:
    Copy
    + Nodata
    + num::Num
    + num::NumCast
    + num::Bounded
    + std::cmp::PartialOrd
    + std::fmt::Debug
    + std::fmt::Display
    + Default
    + Send
    + Sync
    + 'static
{
    const IS_FLOAT: bool;

    /// Convert a computed value to the pixel type, integral types are rounded and saturated.
    /// NaN maps to the nodata sentinel.
    fn from_f64_saturating(value: f64) -> Self;
}

macro_rules! impl_arraynum_int {
    ( $t:ident ) => {
        impl ArrayNum for $t {
            const IS_FLOAT: bool = false;

            #[inline]
            fn from_f64_saturating(value: f64) -> Self {
                if value.is_nan() { Self::NODATA } else { value.round() as $t }
            }
        }
    };
}

macro_rules! impl_arraynum_float {
    ( $t:ident ) => {
        impl ArrayNum for $t {
            const IS_FLOAT: bool = true;

            #[inline]
            fn from_f64_saturating(value: f64) -> Self {
                value as $t
            }
        }
    };
}

impl_arraynum_int!(u8);
impl_arraynum_int!(u16);
impl_arraynum_int!(u32);
impl_arraynum_int!(u64);
impl_arraynum_int!(i8);
impl_arraynum_int!(i16);
impl_arraynum_int!(i32);
impl_arraynum_int!(i64);
impl_arraynum_float!(f32);
impl_arraynum_float!(f64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saturating_conversion() {
        assert_eq!(u8::from_f64_saturating(300.0), 255);
        assert_eq!(u8::from_f64_saturating(-3.0), 0);
        assert_eq!(i16::from_f64_saturating(2.5), 3);
        assert_eq!(u8::from_f64_saturating(f64::NAN), u8::NODATA);
        assert!(f32::from_f64_saturating(f64::NAN).is_nan());
    }
}
