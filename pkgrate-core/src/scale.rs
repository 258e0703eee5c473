//! Numeric transforms shared by the sub-metrics.
//!
//! Every function maps `[0, 1]` onto `[0, 1]` and clamps inputs outside that
//! range first, so callers never feed `ln` or `sqrt` an out-of-domain value.

use serde::{Deserialize, Serialize};

/// Clamp a value into `[0, 1]`. `NaN` maps to `0`.
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}

/// `numerator / denominator`, clamped, with `0` for an empty denominator.
pub fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        return 0.0;
    }
    clamp_unit(numerator as f64 / denominator as f64)
}

/// `ln((e - 1) * x + 1)`: fixes 0 and 1, lifts small values.
pub fn log_scale(value: f64) -> f64 {
    let x = clamp_unit(value);
    clamp_unit(((std::f64::consts::E - 1.0) * x + 1.0).ln())
}

/// `sqrt(x)`: fixes 0 and 1, lifts small values more aggressively.
pub fn sqrt_scale(value: f64) -> f64 {
    clamp_unit(value).sqrt()
}

/// `min(1, value / target)`, with `0` when the target is not positive.
pub fn linear_clamp(value: f64, target: f64) -> f64 {
    if target <= 0.0 {
        return 0.0;
    }
    clamp_unit(value / target)
}

/// Round half away from zero to `precision` decimal places.
pub fn round_to(value: f64, precision: u32) -> f64 {
    let factor = 10f64.powi(precision as i32);
    (value * factor).round() / factor
}

/// Named scaling curve selectable from the formula table.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleKind {
    /// Identity, clamped.
    Linear,
    /// [`sqrt_scale`].
    #[default]
    Sqrt,
    /// [`log_scale`].
    Log,
}

impl ScaleKind {
    /// Apply this curve to a value.
    pub fn apply(self, value: f64) -> f64 {
        match self {
            ScaleKind::Linear => clamp_unit(value),
            ScaleKind::Sqrt => sqrt_scale(value),
            ScaleKind::Log => log_scale(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_scale_fixes_endpoints() {
        assert_eq!(log_scale(0.0), 0.0);
        assert!((log_scale(1.0) - 1.0).abs() < 1e-12);
        assert!((log_scale(0.1) - 0.159).abs() < 1e-3);
        assert!(log_scale(0.1) > 0.1);
    }

    #[test]
    fn scales_clamp_out_of_range_inputs() {
        assert_eq!(log_scale(-3.0), 0.0);
        assert_eq!(sqrt_scale(-0.5), 0.0);
        assert_eq!(sqrt_scale(4.0), 1.0);
        assert_eq!(clamp_unit(f64::NAN), 0.0);
    }

    #[test]
    fn ratio_handles_zero_denominator() {
        assert_eq!(ratio(5, 0), 0.0);
        assert_eq!(ratio(0, 0), 0.0);
        assert_eq!(ratio(1, 4), 0.25);
        assert_eq!(ratio(9, 4), 1.0);
    }

    #[test]
    fn linear_clamp_caps_at_one() {
        assert_eq!(linear_clamp(6000.0, 5000.0), 1.0);
        assert_eq!(linear_clamp(2500.0, 5000.0), 0.5);
        assert_eq!(linear_clamp(10.0, 0.0), 0.0);
    }

    #[test]
    fn rounds_to_precision() {
        assert_eq!(round_to(0.53147, 3), 0.531);
        assert_eq!(round_to(0.65, 1), 0.7);
        assert_eq!(round_to(7.456, 2), 7.46);
    }

    #[test]
    fn scale_kind_dispatches() {
        assert_eq!(ScaleKind::Linear.apply(0.25), 0.25);
        assert_eq!(ScaleKind::Sqrt.apply(0.25), 0.5);
        assert_eq!(ScaleKind::Log.apply(0.0), 0.0);
    }
}
