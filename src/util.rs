// SPDX-License-Identifier: GPL-3.0-or-later
use std::panic;

use num_traits::{Float, Num};
use tokio::task::JoinError;

/// Parse an unsigned integer from a base-10 or base-16 string representation.
///
/// If the string starts with `0x`, the rest of the string is treated as a hexadecimal integer.
/// Otherwise the string is treated as a decimal integer.
#[allow(clippy::from_str_radix_10)]
pub fn parse_int_decimal_hex<U: Num>(num_str: &str) -> Result<U, <U as Num>::FromStrRadixErr> {
    let num_str = num_str.to_ascii_lowercase();
    if let Some(hex_str) = num_str.strip_prefix("0x") {
        U::from_str_radix(hex_str, 16)
    } else {
        U::from_str_radix(num_str.as_str(), 10)
    }
}

/// Limit `val` to the range `[min_val, max_val]`.
///
/// Unlike [`f64::clamp`] this never panics; if `min_val > max_val` the result is `max_val`. NaN
/// values resolve to `min_val`.
pub fn constrain<F: Float>(val: F, min_val: F, max_val: F) -> F {
    val.max(min_val).min(max_val)
}

/// Linearly remap `x` from `[in_min, in_max]` to `[out_min, out_max]`.
///
/// The result is unbounded; values outside the input range land outside the output range.
pub fn map_value<F: Float>(x: F, in_min: F, in_max: F, out_min: F, out_max: F) -> F {
    (x - in_min) * (out_max - out_min) / (in_max - in_min) + out_min
}

pub(crate) fn flatten_join_result<T, E>(
    join_result: Result<Result<T, E>, JoinError>,
) -> anyhow::Result<T>
where
    anyhow::Error: From<E>,
{
    match join_result {
        Ok(inner_result) => Ok(inner_result?),
        Err(join_error) => {
            if join_error.is_panic() {
                panic::resume_unwind(join_error.into_panic());
            } else {
                Err(join_error.into())
            }
        }
    }
}

#[cfg(test)]
mod test {
    use float_cmp::{approx_eq, F64Margin};

    use super::{constrain, map_value, parse_int_decimal_hex};

    #[test]
    fn decimal() {
        assert_eq!(parse_int_decimal_hex::<u32>("42"), Ok(42));
    }

    #[test]
    fn hexadecimal() {
        assert_eq!(parse_int_decimal_hex::<u8>("0x33"), Ok(0x33));
        assert_eq!(parse_int_decimal_hex::<u8>("0X33"), Ok(0x33));
    }

    #[test]
    fn not_a_number() {
        assert!(parse_int_decimal_hex::<u32>("i2c").is_err());
    }

    #[test]
    fn constrain_inside() {
        assert_eq!(constrain(0.5f64, 0.0, 1.0), 0.5);
    }

    #[test]
    fn constrain_saturates() {
        assert_eq!(constrain(-3.0f64, 0.0, 999.0), 0.0);
        assert_eq!(constrain(1200.0f64, 0.0, 999.0), 999.0);
    }

    #[test]
    fn constrain_nan_is_minimum() {
        assert_eq!(constrain(f64::NAN, 0.0, 999.0), 0.0);
    }

    #[test]
    fn remap() {
        assert!(approx_eq!(
            f64,
            map_value(35.0, 25.0, 45.0, 0.0, 999.0),
            499.5,
            F64Margin::default()
        ));
        assert!(approx_eq!(
            f64,
            map_value(25.0, 25.0, 45.0, 0.0, 999.0),
            0.0,
            F64Margin::default()
        ));
        // Inverted input ranges flip the output.
        assert!(approx_eq!(
            f64,
            map_value(45.0, 45.0, 25.0, 0.0, 999.0),
            0.0,
            F64Margin::default()
        ));
    }
}
