use dyn_stack::{MemBuffer, MemStack};
use faer::diag::{Diag, DiagRef};
use faer::linalg::svd::{self, ComputeSvdVectors};
use faer::{Mat, MatRef, get_global_parallelism};
use ndarray::{Array1, Array2, ArrayBase, Data, Ix2};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FaerLinalgError {
    #[error("SVD failed to converge")]
    SvdNoConvergence,
}

fn mat_to_array(mat: MatRef<'_, f64>) -> Array2<f64> {
    Array2::from_shape_fn((mat.nrows(), mat.ncols()), |(i, j)| mat[(i, j)])
}

fn diag_to_array(diag: DiagRef<'_, f64>) -> Array1<f64> {
    let mat = diag.column_vector().as_mat();
    Array1::from_shape_fn(mat.nrows(), |i| mat[(i, 0)])
}

enum FaerStorage<'a> {
    Borrowed(MatRef<'a, f64>),
    Owned(Mat<f64>),
}

impl<'a> FaerStorage<'a> {
    #[inline]
    fn as_ref(&self) -> MatRef<'_, f64> {
        match self {
            FaerStorage::Borrowed(view) => *view,
            FaerStorage::Owned(mat) => mat.as_ref(),
        }
    }
}

/// Zero-copy faer view of an ndarray matrix when the memory layout allows it.
pub struct FaerArrayView<'a> {
    storage: FaerStorage<'a>,
}

impl<'a> FaerArrayView<'a> {
    pub fn new<S: Data<Elem = f64>>(array: &'a ArrayBase<S, Ix2>) -> Self {
        let contiguous = array.as_slice_memory_order().and_then(|slice| {
            if array.is_standard_layout() {
                Some(MatRef::from_row_major_slice(
                    slice,
                    array.nrows(),
                    array.ncols(),
                ))
            } else if array.t().is_standard_layout() {
                Some(MatRef::from_column_major_slice(
                    slice,
                    array.nrows(),
                    array.ncols(),
                ))
            } else {
                None
            }
        });
        let storage = match contiguous {
            Some(view) => FaerStorage::Borrowed(view),
            None => {
                let (rows, cols) = array.dim();
                FaerStorage::Owned(Mat::from_fn(rows, cols, |i, j| array[(i, j)]))
            }
        };
        Self { storage }
    }

    #[inline]
    pub fn as_ref(&self) -> MatRef<'_, f64> {
        self.storage.as_ref()
    }
}

/// Output of a thin singular value decomposition `X = U · diag(S) · Vt`.
///
/// `u` has shape `[n_rows, min(n_rows, n_cols)]` and `vt` is the full
/// `[n_cols, n_cols]` matrix whose rows are the right singular vectors.
#[derive(Clone, Debug)]
pub struct ThinSvd {
    pub u: Array2<f64>,
    pub singular_values: Array1<f64>,
    pub vt: Array2<f64>,
}

pub trait FaerThinSvd {
    fn thin_svd(&self) -> Result<ThinSvd, FaerLinalgError>;
}

impl<S: Data<Elem = f64>> FaerThinSvd for ArrayBase<S, Ix2> {
    fn thin_svd(&self) -> Result<ThinSvd, FaerLinalgError> {
        let faer_view = FaerArrayView::new(self);
        let faer_mat = faer_view.as_ref();
        let (rows, cols) = faer_mat.shape();
        let rank = rows.min(cols);

        let mut singular = Diag::<f64>::zeros(rank);
        let mut u_storage = Mat::<f64>::zeros(rows, rank);
        let mut v_storage = Mat::<f64>::zeros(cols, cols);

        let par = get_global_parallelism();
        let mut mem = MemBuffer::new(svd::svd_scratch::<f64>(
            rows,
            cols,
            ComputeSvdVectors::Thin,
            ComputeSvdVectors::Full,
            par,
            Default::default(),
        ));
        let mut stack = MemStack::new(&mut mem);

        svd::svd(
            faer_mat,
            singular.as_mut(),
            Some(u_storage.as_mut()),
            Some(v_storage.as_mut()),
            par,
            &mut stack,
            Default::default(),
        )
        .map_err(|_| FaerLinalgError::SvdNoConvergence)?;

        let v_ref = v_storage.as_ref();
        let vt = Array2::from_shape_fn((v_ref.ncols(), v_ref.nrows()), |(i, j)| v_ref[(j, i)]);

        Ok(ThinSvd {
            u: mat_to_array(u_storage.as_ref()),
            singular_values: diag_to_array(singular.as_ref()),
            vt,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn thin_svd_reconstructs_tall_matrix() {
        let x = array![[1.0, 2.0], [3.0, 4.0], [5.0, 7.0], [-1.0, 0.5]];
        let svd = x.thin_svd().unwrap();

        assert_eq!(svd.u.dim(), (4, 2));
        assert_eq!(svd.singular_values.len(), 2);
        assert_eq!(svd.vt.dim(), (2, 2));
        assert!(svd.singular_values[0] >= svd.singular_values[1]);

        let scaled_u = &svd.u * &svd.singular_values;
        let rebuilt = scaled_u.dot(&svd.vt);
        for (a, b) in rebuilt.iter().zip(x.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-12);
        }
    }

    #[test]
    fn transposed_layout_is_read_correctly() {
        let x = array![[2.0, 0.0, 1.0], [0.0, 3.0, 1.0]];
        let xt = x.t();
        let svd = xt.thin_svd().unwrap();
        let rebuilt = (&svd.u * &svd.singular_values).dot(&svd.vt);
        for (a, b) in rebuilt.iter().zip(xt.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-12);
        }
    }
}
