//! # Reference Intervals
//!
//! Non-parametric percentile intervals on the PC2 coordinate, the fixed-ratio
//! interval they are compared against, and the back-projection of the fitted
//! rotation into a closed-form equation and raw-space decision boundaries.

use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod boundary;
pub mod equation;

pub use boundary::{BoundaryCurve, BoundaryKind, DEFAULT_GRID_POINTS, DEFAULT_PC1_RANGE};
pub use equation::{EquationParameters, LogLinearForm};

/// An interval estimate needs at least two order statistics to interpolate between.
pub const MINIMUM_SAMPLES: usize = 2;

#[derive(Debug, Error, PartialEq)]
pub enum IntervalError {
    #[error(
        "A reference interval needs at least {required} samples, but only {found} were provided."
    )]
    InsufficientSamples { found: usize, required: usize },
    #[error("Percentile {value} is outside the range [0, 100].")]
    PercentileOutOfRange { value: f64 },
    #[error("The lower bound {lower} must be strictly below the upper bound {upper}.")]
    InvertedBounds { lower: f64, upper: f64 },
    #[error("Sample {index} is not a finite number ({value}).")]
    NonFiniteSample { index: usize, value: f64 },
}

/// Lower and upper percentile thresholds, on the 0 to 100 scale.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PercentileBounds {
    pub lower: f64,
    pub upper: f64,
}

impl Default for PercentileBounds {
    fn default() -> Self {
        Self {
            lower: 2.5,
            upper: 97.5,
        }
    }
}

impl PercentileBounds {
    pub fn new(lower: f64, upper: f64) -> Result<Self, IntervalError> {
        let bounds = Self { lower, upper };
        bounds.validate()?;
        Ok(bounds)
    }

    pub fn validate(&self) -> Result<(), IntervalError> {
        for value in [self.lower, self.upper] {
            if !(0.0..=100.0).contains(&value) {
                return Err(IntervalError::PercentileOutOfRange { value });
            }
        }
        if self.lower >= self.upper {
            return Err(IntervalError::InvertedBounds {
                lower: self.lower,
                upper: self.upper,
            });
        }
        Ok(())
    }
}

/// A closed `[lower, upper]` range with `lower <= upper`.
///
/// A value is classified normal only when it lies strictly inside the bounds; a
/// value equal to either bound is flagged.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReferenceInterval {
    lower: f64,
    upper: f64,
}

impl ReferenceInterval {
    pub fn new(lower: f64, upper: f64) -> Result<Self, IntervalError> {
        let interval = Self { lower, upper };
        interval.validate()?;
        Ok(interval)
    }

    /// The manufacturer's serum free light chain ratio interval.
    pub fn manufacturer_ratio() -> Self {
        Self {
            lower: 0.26,
            upper: 1.65,
        }
    }

    /// Empirical percentile interval of `samples`.
    ///
    /// Percentiles interpolate linearly between order statistics at rank
    /// `p / 100 * (n - 1)`, so no distribution is assumed.
    pub fn estimate(
        samples: ArrayView1<'_, f64>,
        percentiles: PercentileBounds,
    ) -> Result<Self, IntervalError> {
        percentiles.validate()?;
        if samples.len() < MINIMUM_SAMPLES {
            return Err(IntervalError::InsufficientSamples {
                found: samples.len(),
                required: MINIMUM_SAMPLES,
            });
        }
        if let Some((index, &value)) = samples.iter().enumerate().find(|(_, v)| !v.is_finite()) {
            return Err(IntervalError::NonFiniteSample { index, value });
        }

        let mut sorted = samples.to_vec();
        sorted.sort_unstable_by(f64::total_cmp);

        Ok(Self {
            lower: percentile_sorted(&sorted, percentiles.lower),
            upper: percentile_sorted(&sorted, percentiles.upper),
        })
    }

    pub fn validate(&self) -> Result<(), IntervalError> {
        for (index, value) in [self.lower, self.upper].into_iter().enumerate() {
            if !value.is_finite() {
                return Err(IntervalError::NonFiniteSample { index, value });
            }
        }
        if self.lower > self.upper {
            return Err(IntervalError::InvertedBounds {
                lower: self.lower,
                upper: self.upper,
            });
        }
        Ok(())
    }

    pub fn lower(&self) -> f64 {
        self.lower
    }

    pub fn upper(&self) -> f64 {
        self.upper
    }

    /// `lower < value < upper`.
    pub fn contains(&self, value: f64) -> bool {
        self.lower < value && value < self.upper
    }

    pub fn flags_abnormal(&self, value: f64) -> bool {
        !self.contains(value)
    }
}

/// Linear-interpolation percentile of an ascending, non-empty slice.
fn percentile_sorted(sorted: &[f64], percent: f64) -> f64 {
    let rank = percent / 100.0 * (sorted.len() - 1) as f64;
    let below = rank.floor() as usize;
    let above = rank.ceil() as usize;
    if below == above {
        return sorted[below];
    }
    let weight = rank - below as f64;
    sorted[below] + (sorted[above] - sorted[below]) * weight
}
