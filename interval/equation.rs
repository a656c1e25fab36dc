use crate::transform::{ReferencePipeline, SCORE_COMPONENT, TransformError, log_transform};
use ndarray::{Array1, ArrayView2};
use serde::{Deserialize, Serialize};

/// Closed-form PC2 score of a raw measurement pair:
///
/// `score = A * (ln(x1) - B) / C + D * (ln(x2) - E) / F`
///
/// `A` and `D` are the PC2 loadings, `B`/`C` and `E`/`F` are the log-space mean and
/// standard deviation of each analyte in the reference cohort. The formula is only
/// valid for the `ln -> standardize -> rotate` ordering used by
/// [`ReferencePipeline`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct EquationParameters {
    #[serde(rename = "A")]
    pub a: f64,
    #[serde(rename = "B")]
    pub b: f64,
    #[serde(rename = "C")]
    pub c: f64,
    #[serde(rename = "D")]
    pub d: f64,
    #[serde(rename = "E")]
    pub e: f64,
    #[serde(rename = "F")]
    pub f: f64,
}

/// The same equation collapsed to `alpha * ln(x1) + beta * ln(x2) + gamma`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LogLinearForm {
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
}

impl EquationParameters {
    /// Reads the PC2 loading vector and the standardization state out of a fitted
    /// pipeline.
    pub fn back_project(pipeline: &ReferencePipeline) -> Result<Self, TransformError> {
        let standardization = pipeline.standardization();
        let projection = pipeline.projection();
        let vh = projection.right_singular_vectors();
        for found in [standardization.n_columns(), vh.ncols()] {
            if found != 2 {
                return Err(TransformError::ShapeMismatch { expected: 2, found });
            }
        }
        let loading = projection
            .loading(SCORE_COMPONENT)
            .ok_or(TransformError::ShapeMismatch {
                expected: SCORE_COMPONENT + 1,
                found: vh.nrows(),
            })?;

        let means = standardization.means();
        let std_devs = standardization.std_devs();
        Ok(Self {
            a: loading[0],
            b: means[0],
            c: std_devs[0],
            d: loading[1],
            e: means[1],
            f: std_devs[1],
        })
    }

    pub fn score(&self, x1: f64, x2: f64) -> f64 {
        self.a * (x1.ln() - self.b) / self.c + self.d * (x2.ln() - self.e) / self.f
    }

    /// Scores every row of a raw `n x 2` matrix with the closed-form equation.
    pub fn score_matrix(&self, raw: ArrayView2<'_, f64>) -> Result<Array1<f64>, TransformError> {
        if raw.ncols() != 2 {
            return Err(TransformError::ShapeMismatch {
                expected: 2,
                found: raw.ncols(),
            });
        }
        let logged = log_transform(raw, false)?;
        Ok(logged
            .rows()
            .into_iter()
            .map(|row| {
                self.a * (row[0] - self.b) / self.c + self.d * (row[1] - self.e) / self.f
            })
            .collect())
    }

    pub fn log_linear(&self) -> LogLinearForm {
        let alpha = self.a / self.c;
        let beta = self.d / self.f;
        LogLinearForm {
            alpha,
            beta,
            gamma: -(alpha * self.b + beta * self.e),
        }
    }

    /// The six coefficients with their conventional names, in `A..F` order.
    pub fn named(&self) -> [(&'static str, f64); 6] {
        [
            ("A", self.a),
            ("B", self.b),
            ("C", self.c),
            ("D", self.d),
            ("E", self.e),
            ("F", self.f),
        ]
    }
}

impl LogLinearForm {
    pub fn score(&self, x1: f64, x2: f64) -> f64 {
        self.alpha * x1.ln() + self.beta * x2.ln() + self.gamma
    }
}
