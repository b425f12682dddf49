//! State buffers owned by one integrator instance.
//!
//! Everything is allocated and zero-filled up front. Allocation goes through
//! `try_reserve_exact` so an oversized request surfaces as a resource error
//! instead of aborting the process.

use tm_core::{Dimensions, Real, TmError, TmResult};

/// All per-instance storage.
#[derive(Debug, Clone)]
pub struct StateBuffers<T: Real> {
    /// Positions `[N][3]`
    pub x: Vec<T>,
    /// Velocities `[N][3]`
    pub v: Vec<T>,
    /// Parameter derivative `[P][N][3]`
    pub dxdp: Vec<T>,
    /// Window ring, lane-major: `window[lane * W + slot]`
    pub window: Vec<T>,
    /// Sum of every contribution evicted from the window `[P][N][3]`
    pub converged: Vec<T>,
    /// Last noise draw `[N][3]`
    pub noise: Vec<T>,
    /// Per-entity force scale
    pub b: Vec<T>,
    /// Per-entity noise scale
    pub c: Vec<T>,
}

fn zeroed<T: Real>(what: &str, len: usize) -> TmResult<Vec<T>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len).map_err(|e| {
        TmError::resource(
            format!("allocating {what}"),
            format!("{len} x {} scalars: {e}", T::NAME),
        )
    })?;
    buf.resize(len, T::zero());
    Ok(buf)
}

impl<T: Real> StateBuffers<T> {
    /// Allocates zeroed buffers for `dims` and stores the coefficient vectors.
    ///
    /// Coefficient lengths are checked before the first allocation.
    pub fn allocate(dims: &Dimensions, b: Vec<T>, c: Vec<T>) -> TmResult<Self> {
        tm_core::check_len("coefficient b", dims.entities, b.len())?;
        tm_core::check_len("coefficient c", dims.entities, c.len())?;

        Ok(Self {
            x: zeroed("positions", dims.coords())?,
            v: zeroed("velocities", dims.coords())?,
            dxdp: zeroed("dxdp", dims.dxdp_len())?,
            window: zeroed("window", dims.window_len())?,
            converged: zeroed("converged", dims.dxdp_len())?,
            noise: zeroed("noise", dims.coords())?,
            b,
            c,
        })
    }

    /// Bytes held by the state buffers.
    pub fn footprint_bytes(&self) -> usize {
        let scalars = self.x.len()
            + self.v.len()
            + self.dxdp.len()
            + self.window.len()
            + self.converged.len()
            + self.noise.len()
            + self.b.len()
            + self.c.len();
        scalars * std::mem::size_of::<T>()
    }
}
