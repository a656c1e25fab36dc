use super::{InvertibleTransform, TransformError, ensure_columns};
use ndarray::{Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// Per-column mean and population standard deviation captured from a reference
/// cohort.
///
/// Forward maps `x -> (x - mean) / sd`, inverse maps `z -> z * sd + mean`. The
/// column count is frozen at fit time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StandardizationState {
    means: Vec<f64>,
    std_devs: Vec<f64>,
}

impl StandardizationState {
    pub fn fit(reference: ArrayView2<'_, f64>) -> Result<Self, TransformError> {
        if reference.nrows() == 0 {
            return Err(TransformError::EmptyInput);
        }

        let mut means = Vec::with_capacity(reference.ncols());
        let mut std_devs = Vec::with_capacity(reference.ncols());
        for (column, values) in reference.axis_iter(Axis(1)).enumerate() {
            // A constant column can still yield a tiny non-zero sd through rounding
            // of the mean, so compare the values themselves.
            let first = values[0];
            if values.iter().all(|&v| v == first) {
                return Err(TransformError::DegenerateInput { column });
            }
            let mean = values.mean().ok_or(TransformError::EmptyInput)?;
            let std_dev = values.std(0.0);
            if !(std_dev.is_finite() && std_dev > 0.0) {
                return Err(TransformError::DegenerateInput { column });
            }
            means.push(mean);
            std_devs.push(std_dev);
        }

        Ok(Self { means, std_devs })
    }

    pub fn n_columns(&self) -> usize {
        self.means.len()
    }

    pub fn means(&self) -> &[f64] {
        &self.means
    }

    pub fn std_devs(&self) -> &[f64] {
        &self.std_devs
    }

    fn map_columns(
        &self,
        input: ArrayView2<'_, f64>,
        map: impl Fn(f64, f64, f64) -> f64,
    ) -> Result<Array2<f64>, TransformError> {
        ensure_columns(self.n_columns(), input)?;
        let mut output = input.to_owned();
        for ((mut column, &mean), &std_dev) in output
            .axis_iter_mut(Axis(1))
            .zip(&self.means)
            .zip(&self.std_devs)
        {
            column.mapv_inplace(|v| map(v, mean, std_dev));
        }
        Ok(output)
    }
}

impl InvertibleTransform for StandardizationState {
    fn forward(&self, input: ArrayView2<'_, f64>) -> Result<Array2<f64>, TransformError> {
        self.map_columns(input, |v, mean, std_dev| (v - mean) / std_dev)
    }

    fn inverse(&self, input: ArrayView2<'_, f64>) -> Result<Array2<f64>, TransformError> {
        self.map_columns(input, |z, mean, std_dev| z * std_dev + mean)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn fit_uses_population_standard_deviation() {
        let x = array![[1.0, 10.0], [2.0, 20.0], [3.0, 30.0], [4.0, 40.0]];
        let state = StandardizationState::fit(x.view()).unwrap();

        assert_abs_diff_eq!(state.means()[0], 2.5, epsilon = 1e-15);
        assert_abs_diff_eq!(state.means()[1], 25.0, epsilon = 1e-15);
        assert_abs_diff_eq!(state.std_devs()[0], 1.25_f64.sqrt(), epsilon = 1e-15);
        assert_abs_diff_eq!(state.std_devs()[1], 125.0_f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn forward_output_has_zero_mean_and_unit_variance() {
        let x = array![[0.3, -1.2], [1.7, 0.4], [-0.9, 2.2], [0.1, 0.0], [2.4, -0.6]];
        let state = StandardizationState::fit(x.view()).unwrap();
        let z = state.forward(x.view()).unwrap();

        for column in z.axis_iter(Axis(1)) {
            assert_abs_diff_eq!(column.mean().unwrap(), 0.0, epsilon = 1e-12);
            assert_abs_diff_eq!(column.std(0.0), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn inverse_undoes_forward() {
        let reference = array![[0.3, -1.2], [1.7, 0.4], [-0.9, 2.2]];
        let state = StandardizationState::fit(reference.view()).unwrap();

        let other = array![[10.0, -3.0], [0.0, 0.0], [-7.5, 4.25]];
        let back = state.inverse(state.forward(other.view()).unwrap().view()).unwrap();
        for (a, b) in back.iter().zip(other.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-12);
        }
    }

    #[test]
    fn constant_column_is_degenerate() {
        let x = array![[0.1, 1.0], [0.1, 2.0], [0.1, 3.0]];
        assert_eq!(
            StandardizationState::fit(x.view()).unwrap_err(),
            TransformError::DegenerateInput { column: 0 }
        );
    }

    #[test]
    fn single_row_is_degenerate() {
        let x = array![[1.0, 2.0]];
        assert!(matches!(
            StandardizationState::fit(x.view()),
            Err(TransformError::DegenerateInput { column: 0 })
        ));
    }

    #[test]
    fn empty_reference_is_rejected() {
        let x = Array2::<f64>::zeros((0, 2));
        assert_eq!(
            StandardizationState::fit(x.view()).unwrap_err(),
            TransformError::EmptyInput
        );
    }

    #[test]
    fn column_count_is_frozen_at_fit_time() {
        let x = array![[1.0, 2.0], [2.0, 5.0]];
        let state = StandardizationState::fit(x.view()).unwrap();
        let wide = array![[1.0, 2.0, 3.0]];
        assert_eq!(
            state.forward(wide.view()).unwrap_err(),
            TransformError::ShapeMismatch {
                expected: 2,
                found: 3
            }
        );
        assert!(state.inverse(wide.view()).is_err());
    }
}
