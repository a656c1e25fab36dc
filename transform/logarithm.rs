use super::{InvertibleTransform, TransformError};
use ndarray::{Array2, ArrayView2};

/// Element-wise natural logarithm, with `exp` as its inverse.
///
/// Stateless: the same instance is valid for every cohort.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LogTransform;

/// Returns the first entry that is not a strictly positive, finite number.
pub fn validate_positive(input: ArrayView2<'_, f64>) -> Result<(), TransformError> {
    match input
        .indexed_iter()
        .find(|(_, value)| !(value.is_finite() && **value > 0.0))
    {
        Some(((row, column), &value)) => Err(TransformError::Domain { row, column, value }),
        None => Ok(()),
    }
}

/// Applies `ln` (forward) or `exp` (inverse) to every entry of `input`.
///
/// The forward direction rejects zero, negative and non-finite values instead of
/// producing `-inf` or `NaN`.
pub fn log_transform(
    input: ArrayView2<'_, f64>,
    inverse: bool,
) -> Result<Array2<f64>, TransformError> {
    if inverse {
        return Ok(input.mapv(f64::exp));
    }
    validate_positive(input)?;
    Ok(input.mapv(f64::ln))
}

impl InvertibleTransform for LogTransform {
    fn forward(&self, input: ArrayView2<'_, f64>) -> Result<Array2<f64>, TransformError> {
        log_transform(input, false)
    }

    fn inverse(&self, input: ArrayView2<'_, f64>) -> Result<Array2<f64>, TransformError> {
        log_transform(input, true)
    }
}
