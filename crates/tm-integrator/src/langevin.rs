//! Velocity update: one discretized Langevin step.
//!
//! Per coordinate lane: `v = a·v − b·grad + c·noise`, then `x += v·dt`.
//! `a` retains velocity, `b` scales the deterministic force, `c` the thermal kick.

use rayon::prelude::*;
use tm_core::{check_len, Real, TmResult, SPATIAL_DIMS};

/// Advances `x` and `v` in place.
#[allow(clippy::too_many_arguments)]
pub fn advance<T: Real>(
    a: T,
    dt: T,
    b: &[T],
    c: &[T],
    grad: &[T],
    noise: &[T],
    x: &mut [T],
    v: &mut [T],
) -> TmResult<()> {
    let coords = b.len() * SPATIAL_DIMS;
    check_len("coefficient c", b.len(), c.len())?;
    check_len("gradient", coords, grad.len())?;
    check_len("noise", coords, noise.len())?;
    check_len("positions", coords, x.len())?;
    check_len("velocities", coords, v.len())?;

    x.par_iter_mut()
        .zip(v.par_iter_mut())
        .zip(grad.par_iter().zip(noise.par_iter()))
        .enumerate()
        .for_each(|(lane, ((xi, vi), (&g, &n)))| {
            let entity = lane / SPATIAL_DIMS;
            *vi = a * *vi - b[entity] * g + c[entity] * n;
            *xi += *vi * dt;
        });

    Ok(())
}
