use super::faer_ndarray::{FaerThinSvd, ThinSvd};
use super::{InvertibleTransform, TransformError, ensure_columns};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// Components with a smaller magnitude are skipped when choosing a sign.
const SIGN_EPSILON: f64 = 1.0e-12;

/// Full output of the decomposition `X = U · diag(S) · Vh` of the fitted matrix.
#[derive(Clone, Debug)]
pub struct Decomposition {
    pub u: Array2<f64>,
    pub singular_values: Array1<f64>,
    pub vh: Array2<f64>,
}

/// Rotation into principal-component space.
///
/// Rows of `vh` are the right singular vectors of the fitted matrix. Forward is
/// `X · Vhᵀ`, inverse is `Y · Vh`; `Vh` is orthogonal so the pair is exact.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProjectionState {
    vh: Array2<f64>,
    singular_values: Array1<f64>,
}

impl ProjectionState {
    pub fn fit(reference: ArrayView2<'_, f64>) -> Result<Self, TransformError> {
        Self::fit_with_decomposition(reference).map(|(state, _)| state)
    }

    /// Fits the rotation and also returns `U`, `S` and `Vh`.
    ///
    /// Singular vectors are only defined up to sign. Each right singular vector is
    /// flipped so that its first non-negligible component is positive, and the
    /// matching column of `U` is flipped with it, so `U · diag(S) · Vh` still
    /// reproduces the input and repeated fits give identical scores.
    pub fn fit_with_decomposition(
        reference: ArrayView2<'_, f64>,
    ) -> Result<(Self, Decomposition), TransformError> {
        if reference.nrows() == 0 {
            return Err(TransformError::EmptyInput);
        }

        let ThinSvd {
            mut u,
            singular_values,
            vt: mut vh,
        } = reference.thin_svd()?;
        canonicalize_signs(&mut u, &mut vh);

        log::debug!(
            "Projection fitted on {} x {} matrix; singular values {:?}",
            reference.nrows(),
            reference.ncols(),
            singular_values.as_slice().unwrap_or(&[])
        );

        let state = Self {
            vh: vh.clone(),
            singular_values: singular_values.clone(),
        };
        Ok((
            state,
            Decomposition {
                u,
                singular_values,
                vh,
            },
        ))
    }

    pub fn right_singular_vectors(&self) -> ArrayView2<'_, f64> {
        self.vh.view()
    }

    pub fn singular_values(&self) -> ArrayView1<'_, f64> {
        self.singular_values.view()
    }

    /// Loading vector of one principal component: the row of `Vh` whose dot
    /// product with a standardized observation gives that component's score.
    pub fn loading(&self, component: usize) -> Option<ArrayView1<'_, f64>> {
        (component < self.vh.nrows()).then(|| self.vh.row(component))
    }

    /// Fraction of total variance carried by each component.
    pub fn explained_variance_ratio(&self) -> Array1<f64> {
        let squared = self.singular_values.mapv(|s| s * s);
        let total = squared.sum();
        if total > 0.0 {
            squared / total
        } else {
            squared
        }
    }
}

fn canonicalize_signs(u: &mut Array2<f64>, vh: &mut Array2<f64>) {
    for (component, mut row) in vh.axis_iter_mut(Axis(0)).enumerate() {
        let leading = row.iter().copied().find(|v| v.abs() > SIGN_EPSILON);
        if leading.is_some_and(|v| v < 0.0) {
            row.mapv_inplace(|v| -v);
            if component < u.ncols() {
                u.column_mut(component).mapv_inplace(|v| -v);
            }
        }
    }
}

impl InvertibleTransform for ProjectionState {
    fn forward(&self, input: ArrayView2<'_, f64>) -> Result<Array2<f64>, TransformError> {
        ensure_columns(self.vh.ncols(), input)?;
        Ok(input.dot(&self.vh.t()))
    }

    fn inverse(&self, input: ArrayView2<'_, f64>) -> Result<Array2<f64>, TransformError> {
        ensure_columns(self.vh.nrows(), input)?;
        Ok(input.dot(&self.vh))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn centered_cloud() -> Array2<f64> {
        array![
            [-1.4, -1.1],
            [-0.6, -0.9],
            [-0.2, 0.3],
            [0.1, -0.2],
            [0.5, 0.8],
            [0.7, 0.4],
            [0.9, 0.7],
        ]
    }

    #[test]
    fn right_singular_vectors_are_orthonormal() {
        let state = ProjectionState::fit(centered_cloud().view()).unwrap();
        let vh = state.right_singular_vectors();
        let gram = vh.dot(&vh.t());
        assert_abs_diff_eq!(gram[[0, 0]], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(gram[[1, 1]], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(gram[[0, 1]], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn decomposition_reproduces_input() {
        let x = centered_cloud();
        let (_, decomposition) = ProjectionState::fit_with_decomposition(x.view()).unwrap();
        let rebuilt = (&decomposition.u * &decomposition.singular_values).dot(&decomposition.vh);
        for (a, b) in rebuilt.iter().zip(x.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-12);
        }
    }

    #[test]
    fn leading_loading_components_are_positive() {
        let state = ProjectionState::fit(centered_cloud().view()).unwrap();
        for component in 0..2 {
            let loading = state.loading(component).unwrap();
            let leading = loading.iter().find(|v| v.abs() > SIGN_EPSILON).unwrap();
            assert!(*leading > 0.0);
        }
        assert!(state.loading(2).is_none());
    }

    #[test]
    fn first_component_follows_the_main_axis() {
        let state = ProjectionState::fit(centered_cloud().view()).unwrap();
        let scores = state.forward(centered_cloud().view()).unwrap();
        let var_pc1 = scores.column(0).mapv(|v| v * v).sum();
        let var_pc2 = scores.column(1).mapv(|v| v * v).sum();
        assert!(var_pc1 > var_pc2);

        let ratio = state.explained_variance_ratio();
        assert_abs_diff_eq!(ratio.sum(), 1.0, epsilon = 1e-12);
        assert!(ratio[0] > 0.5);
    }

    #[test]
    fn rotation_round_trips() {
        let state = ProjectionState::fit(centered_cloud().view()).unwrap();
        let points = array![[3.0, -2.0], [0.0, 0.0], [-0.25, 8.5]];
        let back = state
            .inverse(state.forward(points.view()).unwrap().view())
            .unwrap();
        for (a, b) in back.iter().zip(points.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-12);
        }
    }

    #[test]
    fn column_mismatch_is_rejected() {
        let state = ProjectionState::fit(centered_cloud().view()).unwrap();
        let narrow = array![[1.0], [2.0]];
        assert_eq!(
            state.forward(narrow.view()).unwrap_err(),
            TransformError::ShapeMismatch {
                expected: 2,
                found: 1
            }
        );
    }
}
