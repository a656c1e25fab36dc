//! # Invertible Transforms
//!
//! Every score in this crate is produced by the same fixed chain of transforms
//! fitted on a reference cohort:
//!
//! ```text
//! raw (x1, x2) --ln--> log space --(x - mean) / sd--> z space --· Vhᵀ--> PC space
//! ```
//!
//! Each link is a value implementing [`InvertibleTransform`]. The fitted links own
//! their statistics, are immutable once constructed and can be serialized, so the
//! exact same mapping can be rebuilt later without the reference data.

use ndarray::{Array2, ArrayView2};
use thiserror::Error;

pub mod faer_ndarray;
pub mod logarithm;
pub mod pipeline;
pub mod project;
pub mod standardize;

pub use faer_ndarray::FaerLinalgError;
pub use logarithm::{LogTransform, log_transform, validate_positive};
pub use pipeline::{FittedPipeline, ReferencePipeline, SCORE_COMPONENT};
pub use project::{Decomposition, ProjectionState};
pub use standardize::StandardizationState;

#[derive(Debug, Error, PartialEq)]
pub enum TransformError {
    #[error(
        "The logarithmic transform requires strictly positive, finite values, but found {value} at row {row}, column {column}."
    )]
    Domain {
        row: usize,
        column: usize,
        value: f64,
    },
    #[error(
        "Column {column} of the reference cohort has zero variance, so it cannot be standardized."
    )]
    DegenerateInput { column: usize },
    #[error("The transform was fitted on {expected} columns but received a matrix with {found}.")]
    ShapeMismatch { expected: usize, found: usize },
    #[error("Cannot fit a transform on a matrix with no rows.")]
    EmptyInput,
    #[error("Principal component decomposition failed: {0}")]
    Decomposition(#[from] FaerLinalgError),
}

/// A mapping between two coordinate systems with an exact inverse.
///
/// Implementations guarantee `inverse(forward(x)) == x` up to floating point error
/// for any `x` with the fitted column count.
pub trait InvertibleTransform {
    fn forward(&self, input: ArrayView2<'_, f64>) -> Result<Array2<f64>, TransformError>;

    fn inverse(&self, input: ArrayView2<'_, f64>) -> Result<Array2<f64>, TransformError>;
}

pub(crate) fn ensure_columns(
    expected: usize,
    input: ArrayView2<'_, f64>,
) -> Result<(), TransformError> {
    if input.ncols() != expected {
        return Err(TransformError::ShapeMismatch {
            expected,
            found: input.ncols(),
        });
    }
    Ok(())
}
