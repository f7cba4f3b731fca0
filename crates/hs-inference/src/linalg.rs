//! Dense linear-algebra helpers shared by the regressions.

use hs_core::{Error, Result};
use nalgebra::DMatrix;

/// Reciprocal condition number below which a Gram matrix is treated as singular.
const RCOND_MIN: f64 = 1e-13;

/// Inverse of a symmetric positive-definite matrix (a Gram matrix such as
/// `XᵀWX`). Rank-deficient input is rejected with a `Computation` error
/// naming `what`.
pub(crate) fn spd_inverse(m: DMatrix<f64>, what: &str) -> Result<DMatrix<f64>> {
    let eig = m.clone().symmetric_eigen().eigenvalues;
    let max = eig.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = eig.iter().copied().fold(f64::INFINITY, f64::min);
    if !(max > 0.0 && min > max * RCOND_MIN) {
        return Err(Error::Computation(format!(
            "{what} is singular (eigenvalues in [{min:.3e}, {max:.3e}])"
        )));
    }
    m.cholesky()
        .map(|c| c.inverse())
        .ok_or_else(|| Error::Computation(format!("{what} is not positive definite")))
}
