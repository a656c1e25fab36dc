use crate::transform::{TransformError, validate_positive};
use ndarray::{Array2, ArrayView2};
use std::ops::Deref;

/// Paired analyte concentrations, one subject per row: `x1` (kappa) in column 0,
/// `x2` (lambda) in column 1.
///
/// Construction guarantees at least one row and strictly positive, finite entries,
/// so the matrix is always a valid input to the logarithmic transform.
#[derive(Clone, Debug, PartialEq)]
pub struct MeasurementMatrix(Array2<f64>);

impl MeasurementMatrix {
    pub const ANALYTES: usize = 2;

    pub fn new(values: Array2<f64>) -> Result<Self, TransformError> {
        if values.ncols() != Self::ANALYTES {
            return Err(TransformError::ShapeMismatch {
                expected: Self::ANALYTES,
                found: values.ncols(),
            });
        }
        if values.nrows() == 0 {
            return Err(TransformError::EmptyInput);
        }
        validate_positive(values.view())?;
        Ok(Self(values))
    }

    /// Builds the matrix from two equally long columns.
    pub fn from_columns(x1: &[f64], x2: &[f64]) -> Result<Self, TransformError> {
        if x1.len() != x2.len() {
            return Err(TransformError::ShapeMismatch {
                expected: x1.len(),
                found: x2.len(),
            });
        }
        let values = Array2::from_shape_fn((x1.len(), Self::ANALYTES), |(i, j)| {
            if j == 0 { x1[i] } else { x2[i] }
        });
        Self::new(values)
    }

    pub fn as_view(&self) -> ArrayView2<'_, f64> {
        self.0.view()
    }
}

impl Deref for MeasurementMatrix {
    type Target = Array2<f64>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
