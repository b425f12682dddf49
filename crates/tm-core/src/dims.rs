//! Buffer shapes and ring-index arithmetic.
//!
//! Layout conventions (row-major unless stated):
//! - positions / velocities / gradient / noise: `[N][3]`
//! - Hessian: `[3N][3N]`
//! - dxdp / mixed partials: `[P][N][3]`, bit-identical to a column-major `3N × P` matrix
//!
//! A "lane" is one flattened scalar index into one of these buffers.

use serde::{Deserialize, Serialize};

use crate::errors::{TmError, TmResult};

/// Number of spatial axes per entity.
pub const SPATIAL_DIMS: usize = 3;

/// Sizes fixed at construction of an integrator instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Entity (particle) count N
    pub entities: usize,
    /// Force-field parameter count P
    pub parameters: usize,
    /// Window slot count W
    pub window: usize,
}

impl Dimensions {
    pub fn new(entities: usize, parameters: usize, window: usize) -> Self {
        Self {
            entities,
            parameters,
            window,
        }
    }

    /// `3N`: length of x, v, grad, noise; also the Hessian edge length.
    #[inline]
    pub fn coords(&self) -> usize {
        self.entities * SPATIAL_DIMS
    }

    /// `9N²`
    #[inline]
    pub fn hessian_len(&self) -> usize {
        self.coords() * self.coords()
    }

    /// `P·3N`: length of dxdp, mixed partials, one window slot and the converged buffer.
    #[inline]
    pub fn dxdp_len(&self) -> usize {
        self.parameters * self.coords()
    }

    /// `W·P·3N`
    #[inline]
    pub fn window_len(&self) -> usize {
        self.window * self.dxdp_len()
    }

    /// Every buffer length with overflow checks, as
    /// `(coords, hessian_len, dxdp_len, window_len, total_scalars)`.
    ///
    /// `None` when any product does not fit in `usize`. The unchecked accessors
    /// above are only valid for shapes this accepts.
    pub fn checked_lengths(&self) -> Option<(usize, usize, usize, usize, usize)> {
        let coords = self.entities.checked_mul(SPATIAL_DIMS)?;
        let hessian = coords.checked_mul(coords)?;
        let dxdp = self.parameters.checked_mul(coords)?;
        let window = self.window.checked_mul(dxdp)?;
        let total = coords
            .checked_mul(3)?
            .checked_add(self.entities.checked_mul(2)?)?
            .checked_add(dxdp.checked_mul(2)?)?
            .checked_add(window)?;
        Some((coords, hessian, dxdp, window, total))
    }

    /// Entity owning a dxdp lane (`p·3N + i·3 + d` → `i`).
    #[inline]
    pub fn entity_of_dxdp_lane(&self, lane: usize) -> usize {
        (lane / SPATIAL_DIMS) % self.entities
    }

    /// Total scalar count of every buffer an integrator allocates.
    pub fn total_scalars(&self) -> usize {
        // x, v, noise; b, c
        3 * self.coords() + 2 * self.entities
            // dxdp, converged
            + 2 * self.dxdp_len()
            + self.window_len()
    }
}

/// Wraps a possibly negative ring offset into `[0, modulus)`.
///
/// Written out explicitly so the result never depends on the sign convention of
/// the remainder operator.
#[inline]
pub fn wrap_index(index: i64, modulus: usize) -> usize {
    debug_assert!(modulus > 0);
    let m = modulus as i64;
    let mut r = index % m;
    if r < 0 {
        r += m;
    }
    r as usize
}

/// Checks a buffer length, naming the offending buffer on mismatch.
#[inline]
pub fn check_len(what: &str, expected: usize, actual: usize) -> TmResult<()> {
    if expected != actual {
        return Err(TmError::dimension(what, expected, actual));
    }
    Ok(())
}
