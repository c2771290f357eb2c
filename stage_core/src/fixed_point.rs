//! Microstep quantization helpers.
//!
//! Positions cross the link as integer microsteps (`i32`). Every physical value
//! passes through `quantize_to_steps` exactly once, so repeated conversions of
//! the same input always yield the same step count.

/// Round a floating-point step count to the nearest integer (ties away from
/// zero), saturating at the `i32` range. Non-finite values (NaN/±Inf) map to 0.
#[inline]
pub fn quantize_to_steps(x: f64) -> i32 {
    if !x.is_finite() {
        return 0;
    }
    let r = x.round();
    if r >= f64::from(i32::MAX) {
        i32::MAX
    } else if r <= f64::from(i32::MIN) {
        i32::MIN
    } else {
        r as i32
    }
}

/// Largest integer step count not exceeding `x`, saturating like
/// `quantize_to_steps`. Used for travel limits so the limit never lies beyond
/// the physical end of travel.
#[inline]
pub fn floor_to_steps(x: f64) -> i32 {
    if !x.is_finite() {
        return 0;
    }
    quantize_to_steps(x.floor())
}
