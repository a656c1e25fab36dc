use super::logarithm::log_transform;
use super::project::{Decomposition, ProjectionState};
use super::standardize::StandardizationState;
use super::{InvertibleTransform, TransformError};
use ndarray::{Array1, Array2, ArrayView2};
use serde::{Deserialize, Serialize};

/// Index of the principal component used for classification (PC2).
pub const SCORE_COMPONENT: usize = 1;

/// Standardization followed by principal-component rotation, both fitted on the
/// log-transformed reference cohort.
///
/// `forward` expects input that has already been through [`log_transform`]; the
/// pipeline never applies the logarithm itself. [`ReferencePipeline::score_raw`]
/// and [`ReferencePipeline::to_raw`] wrap the full `ln -> z -> PC` chain for raw
/// measurements.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReferencePipeline {
    standardization: StandardizationState,
    projection: ProjectionState,
}

/// A freshly fitted pipeline together with everything computed while fitting it.
#[derive(Clone, Debug)]
pub struct FittedPipeline {
    pub pipeline: ReferencePipeline,
    pub decomposition: Decomposition,
    /// Reference cohort in principal-component space, one row per subject.
    pub reference_scores: Array2<f64>,
}

impl FittedPipeline {
    /// Column [`SCORE_COMPONENT`] of the reference scores.
    pub fn reference_pc2(&self) -> Array1<f64> {
        self.reference_scores.column(SCORE_COMPONENT).to_owned()
    }
}

impl ReferencePipeline {
    pub fn new(standardization: StandardizationState, projection: ProjectionState) -> Self {
        Self {
            standardization,
            projection,
        }
    }

    /// Fits the pipeline on raw reference measurements.
    ///
    /// Order is fixed: `ln`, fit standardization, apply it, fit the rotation on the
    /// standardized matrix, apply it.
    pub fn fit(reference: ArrayView2<'_, f64>) -> Result<FittedPipeline, TransformError> {
        let log_reference = log_transform(reference, false)?;
        let standardization = StandardizationState::fit(log_reference.view())?;
        let standardized = standardization.forward(log_reference.view())?;
        let (projection, decomposition) =
            ProjectionState::fit_with_decomposition(standardized.view())?;
        let reference_scores = projection.forward(standardized.view())?;

        log::info!(
            "Fitted pipeline on {} subjects (log means {:?}, log sds {:?}, variance shares {:?})",
            reference.nrows(),
            standardization.means(),
            standardization.std_devs(),
            projection.explained_variance_ratio().to_vec()
        );

        Ok(FittedPipeline {
            pipeline: Self::new(standardization, projection),
            decomposition,
            reference_scores,
        })
    }

    pub fn standardization(&self) -> &StandardizationState {
        &self.standardization
    }

    pub fn projection(&self) -> &ProjectionState {
        &self.projection
    }

    /// Checks that the two states describe the same columns: one finite mean and
    /// one finite positive standard deviation per column, and a square rotation of
    /// that size.
    pub fn validate(&self) -> Result<(), TransformError> {
        let n_columns = self.standardization.n_columns();
        let std_devs = self.standardization.std_devs();
        if std_devs.len() != n_columns {
            return Err(TransformError::ShapeMismatch {
                expected: n_columns,
                found: std_devs.len(),
            });
        }
        if let Some(column) = self
            .standardization
            .means()
            .iter()
            .zip(std_devs)
            .position(|(&mean, &sd)| !(mean.is_finite() && sd.is_finite() && sd > 0.0))
        {
            return Err(TransformError::DegenerateInput { column });
        }
        let vh = self.projection.right_singular_vectors();
        for found in [vh.nrows(), vh.ncols()] {
            if found != n_columns {
                return Err(TransformError::ShapeMismatch {
                    expected: n_columns,
                    found,
                });
            }
        }
        Ok(())
    }

    /// Raw measurements to principal-component scores (`ln`, then `forward`).
    pub fn score_raw(&self, raw: ArrayView2<'_, f64>) -> Result<Array2<f64>, TransformError> {
        let logged = log_transform(raw, false)?;
        self.forward(logged.view())
    }

    /// Raw measurements to PC2 scores.
    pub fn pc2_raw(&self, raw: ArrayView2<'_, f64>) -> Result<Array1<f64>, TransformError> {
        let scores = self.score_raw(raw)?;
        if scores.ncols() <= SCORE_COMPONENT {
            return Err(TransformError::ShapeMismatch {
                expected: SCORE_COMPONENT + 1,
                found: scores.ncols(),
            });
        }
        Ok(scores.column(SCORE_COMPONENT).to_owned())
    }

    /// Principal-component coordinates back to raw measurement space.
    pub fn to_raw(&self, scores: ArrayView2<'_, f64>) -> Result<Array2<f64>, TransformError> {
        let logged = self.inverse(scores)?;
        log_transform(logged.view(), true)
    }
}

impl InvertibleTransform for ReferencePipeline {
    fn forward(&self, input: ArrayView2<'_, f64>) -> Result<Array2<f64>, TransformError> {
        let standardized = self.standardization.forward(input)?;
        self.projection.forward(standardized.view())
    }

    fn inverse(&self, input: ArrayView2<'_, f64>) -> Result<Array2<f64>, TransformError> {
        let standardized = self.projection.inverse(input)?;
        self.standardization.inverse(standardized.view())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use ndarray::{Axis, array};

    fn reference() -> Array2<f64> {
        array![
            [1.21, 1.52],
            [0.95, 1.31],
            [1.64, 1.70],
            [1.10, 1.75],
            [0.72, 1.02],
            [1.38, 1.49],
            [2.05, 2.31],
            [0.88, 1.40],
            [1.55, 1.95],
            [1.02, 1.12],
        ]
    }

    #[test]
    fn reference_scores_are_centered() {
        let fitted = ReferencePipeline::fit(reference().view()).unwrap();
        for column in fitted.reference_scores.axis_iter(Axis(1)) {
            assert_abs_diff_eq!(column.mean().unwrap(), 0.0, epsilon = 1e-12);
        }
        assert_eq!(fitted.reference_pc2().len(), 10);
    }

    #[test]
    fn raw_round_trip_is_exact() {
        let fitted = ReferencePipeline::fit(reference().view()).unwrap();
        let raw = array![[0.4, 3.0], [1.0, 1.0], [12.0, 0.7]];
        let scores = fitted.pipeline.score_raw(raw.view()).unwrap();
        let back = fitted.pipeline.to_raw(scores.view()).unwrap();
        for (a, b) in back.iter().zip(raw.iter()) {
            assert_relative_eq!(a, b, max_relative = 1e-9);
        }
    }

    #[test]
    fn scoring_matches_the_explicit_chain() {
        let fitted = ReferencePipeline::fit(reference().view()).unwrap();
        let pipeline = &fitted.pipeline;
        let raw = reference();

        let logged = log_transform(raw.view(), false).unwrap();
        let z = pipeline.standardization().forward(logged.view()).unwrap();
        let manual = pipeline.projection().forward(z.view()).unwrap();

        let pc2 = pipeline.pc2_raw(raw.view()).unwrap();
        for (a, b) in pc2.iter().zip(manual.column(SCORE_COMPONENT).iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-12);
        }
        for (a, b) in fitted.reference_scores.iter().zip(manual.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-12);
        }
    }

    #[test]
    fn refitting_gives_identical_pipeline() {
        let first = ReferencePipeline::fit(reference().view()).unwrap();
        let second = ReferencePipeline::fit(reference().view()).unwrap();
        assert_eq!(first.pipeline, second.pipeline);
    }

    #[test]
    fn log_domain_errors_propagate() {
        let mut raw = reference();
        raw[[3, 0]] = -0.2;
        assert_eq!(
            ReferencePipeline::fit(raw.view()).unwrap_err(),
            TransformError::Domain {
                row: 3,
                column: 0,
                value: -0.2
            }
        );
    }

    #[test]
    fn constant_analyte_is_degenerate() {
        let mut raw = reference();
        raw.column_mut(1).fill(1.4);
        assert_eq!(
            ReferencePipeline::fit(raw.view()).unwrap_err(),
            TransformError::DegenerateInput { column: 1 }
        );
    }

    fn standardization_from_toml(text: &str) -> StandardizationState {
        toml::from_str(text).unwrap()
    }

    #[test]
    fn fitted_pipeline_is_consistent() {
        let fitted = ReferencePipeline::fit(reference().view()).unwrap();
        assert_eq!(fitted.pipeline.validate(), Ok(()));
    }

    #[test]
    fn uneven_standardization_state_is_rejected() {
        let fitted = ReferencePipeline::fit(reference().view()).unwrap();
        let projection = fitted.pipeline.projection().clone();

        let short_sds = standardization_from_toml("means = [0.1, 0.3]\nstd_devs = [0.4]\n");
        assert_eq!(
            ReferencePipeline::new(short_sds, projection.clone()).validate(),
            Err(TransformError::ShapeMismatch {
                expected: 2,
                found: 1
            })
        );

        let zero_sd = standardization_from_toml("means = [0.1, 0.3]\nstd_devs = [0.4, 0.0]\n");
        assert_eq!(
            ReferencePipeline::new(zero_sd, projection).validate(),
            Err(TransformError::DegenerateInput { column: 1 })
        );
    }

    #[test]
    fn rotation_of_the_wrong_size_is_rejected() {
        let fitted = ReferencePipeline::fit(reference().view()).unwrap();
        let wide = array![[1.0, 0.2, -0.4], [-0.5, 0.9, 0.1], [0.3, -0.7, 0.8]];
        let projection = ProjectionState::fit(wide.view()).unwrap();
        let standardization = fitted.pipeline.standardization().clone();
        let pipeline = ReferencePipeline::new(standardization, projection);
        assert_eq!(
            pipeline.validate(),
            Err(TransformError::ShapeMismatch {
                expected: 2,
                found: 3
            })
        );
    }

    #[test]
    fn single_component_pipeline_has_no_pc2() {
        let standardization = standardization_from_toml("means = [0.0]\nstd_devs = [1.0]\n");
        let projection = ProjectionState::fit(array![[1.0], [-2.0], [0.5]].view()).unwrap();
        let pipeline = ReferencePipeline::new(standardization, projection);
        assert_eq!(
            pipeline.pc2_raw(array![[1.5], [0.7]].view()).unwrap_err(),
            TransformError::ShapeMismatch {
                expected: 2,
                found: 1
            }
        );
    }
}
