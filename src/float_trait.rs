//! Float trait abstraction for f32/f64 support.
//!
//! This module provides a unified trait for floating-point operations,
//! enabling the background estimation pipeline to work with both f32 and
//! f64 precision.

use num_traits::{Float, FromPrimitive, NumAssign};
use std::fmt::Debug;
use std::iter::Sum;

/// Trait alias for floating point types supported by the background engine.
///
/// This trait combines all the bounds needed for the mesh pipeline:
/// - Basic float operations (Float, NumAssign)
/// - Conversion from primitive types (FromPrimitive)
/// - Iteration support (Sum)
/// - A default value for masked grid positions (Default)
/// - Thread safety for data-parallel mesh processing (Send, Sync)
pub trait BkgFloat:
    Float + FromPrimitive + NumAssign + Sum + Debug + Default + Send + Sync + 'static
{
    /// Create a value from an f64 constant.
    fn from_f64_c(val: f64) -> Self;

    /// Widen to f64.
    fn as_f64(self) -> f64;
}

impl BkgFloat for f32 {
    #[inline]
    fn from_f64_c(val: f64) -> Self {
        val as f32
    }

    #[inline]
    fn as_f64(self) -> f64 {
        self as f64
    }
}

impl BkgFloat for f64 {
    #[inline]
    fn from_f64_c(val: f64) -> Self {
        val
    }

    #[inline]
    fn as_f64(self) -> f64 {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_f32_trait_impl() {
        let val: f32 = BkgFloat::from_f64_c(std::f64::consts::PI);
        assert!((val - std::f32::consts::PI).abs() < 1e-5);

        assert_eq!(2.5f32.as_f64(), 2.5f64);
    }

    #[test]
    fn test_f64_trait_impl() {
        let val: f64 = BkgFloat::from_f64_c(std::f64::consts::PI);
        assert!((val - std::f64::consts::PI).abs() < 1e-14);

        assert_eq!((-1.25f64).as_f64(), -1.25f64);
    }
}
