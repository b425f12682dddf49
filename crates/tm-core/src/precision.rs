//! Floating-point width selection.
//!
//! The whole pipeline of one integrator instance is generic over a single
//! [`Real`] type. Widths are never mixed inside an instance; conversion to and
//! from `f64` happens only at the configuration and reporting boundaries.

use nalgebra::RealField;
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::TmError;

/// Precision tag carried in requests and configs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    /// 32-bit floats
    Single,
    /// 64-bit floats
    Double,
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Precision::Single => write!(f, "single"),
            Precision::Double => write!(f, "double"),
        }
    }
}

impl FromStr for Precision {
    type Err = TmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "single" | "f32" => Ok(Precision::Single),
            "double" | "f64" => Ok(Precision::Double),
            other => Err(TmError::config(format!("Unknown precision '{other}'"))),
        }
    }
}

/// Scalar type an integrator instance is built over.
///
/// `RealField` gives the arithmetic and the nalgebra GEMM kernels; the extra
/// methods cover the `f64` boundary and Gaussian sampling.
pub trait Real: RealField + Copy + Default + Send + Sync + fmt::Debug + 'static {
    /// Tag matching this width.
    const PRECISION: Precision;

    /// Short name used in kernel symbols and logs (`"f32"` / `"f64"`).
    const NAME: &'static str;

    /// Narrowing conversion from a configuration value.
    fn cast(value: f64) -> Self;

    /// Widening conversion for reporting.
    fn widen(self) -> f64;

    /// One zero-mean, unit-variance sample.
    fn sample_standard_normal<R: Rng + ?Sized>(rng: &mut R) -> Self;
}

impl Real for f32 {
    const PRECISION: Precision = Precision::Single;
    const NAME: &'static str = "f32";

    #[inline]
    fn cast(value: f64) -> Self {
        value as f32
    }

    #[inline]
    fn widen(self) -> f64 {
        self as f64
    }

    #[inline]
    fn sample_standard_normal<R: Rng + ?Sized>(rng: &mut R) -> Self {
        StandardNormal.sample(rng)
    }
}

impl Real for f64 {
    const PRECISION: Precision = Precision::Double;
    const NAME: &'static str = "f64";

    #[inline]
    fn cast(value: f64) -> Self {
        value
    }

    #[inline]
    fn widen(self) -> f64 {
        self
    }

    #[inline]
    fn sample_standard_normal<R: Rng + ?Sized>(rng: &mut R) -> Self {
        StandardNormal.sample(rng)
    }
}

/// Converts a slice of configuration values into the instance width.
pub fn cast_slice<T: Real>(values: &[f64]) -> Vec<T> {
    values.iter().map(|&v| T::cast(v)).collect()
}
