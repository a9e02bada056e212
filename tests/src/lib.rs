//! Shared helpers for the integration suites.

/// Single-epsilon comparison for `f32` results built from small exact values.
pub fn close_f32(a: f32, b: f32) -> bool {
    (a - b).abs() <= f32::EPSILON
}

/// Single-epsilon comparison for `f64` results built from small exact values.
pub fn close_f64(a: f64, b: f64) -> bool {
    (a - b).abs() <= f64::EPSILON
}
