//! Hessian-vector product with accumulate semantics.
//!
//! `C ← C + H·D`, where `H` is the `3N × 3N` Hessian, `D` the current `dxdp`
//! (`3N × P`) and `C` the caller's mixed partials (`3N × P`). Dense GEMM, no
//! pivoting, no sparsity.
//!
//! `dxdp` and the mixed partials are stored row-major `[P][3N]`, which nalgebra
//! reads directly as a column-major `3N × P` matrix. The Hessian is row-major, so
//! a column-major view of it is `Hᵀ` and the product uses `gemm_tr`.

use nalgebra::{DMatrixView, DMatrixViewMut};
use rayon::prelude::*;
use tm_core::{check_len, Dimensions, Real, TmError, TmResult};

/// Accumulates `H·dxdp` into `accum` in place.
///
/// Fails with a compute error if the result contains a non-finite value; `accum`
/// is left holding that result.
pub fn hessian_vector_accumulate<T: Real>(
    dims: &Dimensions,
    hessian: &[T],
    dxdp: &[T],
    accum: &mut [T],
) -> TmResult<()> {
    check_len("hessian", dims.hessian_len(), hessian.len())?;
    check_len("dxdp", dims.dxdp_len(), dxdp.len())?;
    check_len("mixed partials", dims.dxdp_len(), accum.len())?;

    let n3 = dims.coords();
    let p = dims.parameters;
    if p == 0 {
        return Ok(());
    }

    let h_t = DMatrixView::from_slice(hessian, n3, n3);
    let d = DMatrixView::from_slice(dxdp, n3, p);
    let mut c = DMatrixViewMut::from_slice(accum, n3, p);
    c.gemm_tr(T::one(), &h_t, &d, T::one());

    if accum.par_iter().any(|v| !v.is_finite()) {
        return Err(TmError::compute(
            "hessian-vector product",
            "non-finite contribution (check Hessian and mixed partials)",
        ));
    }
    Ok(())
}
