//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

/// Map a value from one range into another.
pub fn lin_map<T>(source_range: (T, T), target_range: (T, T), value: T) -> T
where 
    T: Float 
{
    target_range.0 
        + ((value - source_range.0) 
        * (target_range.1 - target_range.0) 
        / (source_range.1 - source_range.0))
}

/// Clamp a value into `[min, max]`.
///
/// Unlike `f64::clamp` a NaN input is returned as `min`, so the result is
/// always inside the range.
pub fn clamp<T>(value: &T, min: &T, max: &T) -> T 
where
    T: Float
{
    if value.is_nan() {
        return *min
    }

    let mut ret = *value;

    if ret > *max {
        ret = *max
    }
    if ret < *min {
        ret = *min
    }

    ret
}

/// Sign of a value where zero counts as positive.
///
/// `Float::signum` already maps `+0.0` to `1.0` but gives `-1.0` for `-0.0`,
/// which is not wanted when the sign multiplies a force component.
pub fn sign_nonzero<T>(value: T) -> T
where
    T: Float
{
    if value < T::zero() {
        -T::one()
    }
    else {
        T::one()
    }
}
