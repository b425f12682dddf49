//! Window reduction: bounded-memory form of the decayed history sum.
//!
//! For every dxdp lane the stage keeps the last `W` per-step contributions in a
//! ring plus one converged scalar holding the sum of everything evicted. At step
//! `s` with `t = s mod W`:
//!
//! 1. evict: `converged += ring[t]`
//! 2. insert: `ring[t] = Dx`
//! 3. walk the ring newest to oldest with `prefactor += aⁿ`, `aⁿ *= a`,
//!    `accum += prefactor · ring[(t − i) mod W]`
//! 4. `dxdp = −b · dt · (accum + prefactor · converged)`
//!
//! Contributions inside the window carry their exact weight `Σ_{j≤k} aʲ`; the
//! converged tail is weighted by the final prefactor `Σ_{j<W} aʲ`.
//!
//! The host layout is lane-major (`window[lane * W + slot]`) so every lane owns
//! one contiguous chunk and rayon can hand out disjoint `&mut` slices.

use rayon::prelude::*;
use tm_core::{check_len, wrap_index, Dimensions, Real, TmResult};

/// Updates one lane's ring and converged value, returning the weighted sum
/// `accum + prefactor · converged` before the `−b·dt` scale.
#[inline]
pub fn reduce_lane<T: Real>(
    ring: &mut [T],
    converged: &mut T,
    contribution: T,
    slot: usize,
    a: T,
) -> T {
    let w = ring.len();

    *converged += ring[slot];
    ring[slot] = contribution;

    let mut prefactor = T::zero();
    let mut a_n = T::one();
    let mut accum = T::zero();
    for i in 0..w {
        let s = wrap_index(slot as i64 - i as i64, w);
        prefactor += a_n;
        a_n *= a;
        accum += prefactor * ring[s];
    }

    accum + prefactor * *converged
}

/// Slot written at `step`.
#[inline]
pub fn active_slot(step: u64, window: usize) -> usize {
    (step % window as u64) as usize
}

/// Runs the window stage over every dxdp lane.
#[allow(clippy::too_many_arguments)]
pub fn reduce_window<T: Real>(
    dims: &Dimensions,
    step: u64,
    a: T,
    dt: T,
    b: &[T],
    contribution: &[T],
    window: &mut [T],
    converged: &mut [T],
    dxdp: &mut [T],
) -> TmResult<()> {
    check_len("coefficient b", dims.entities, b.len())?;
    check_len("window contribution", dims.dxdp_len(), contribution.len())?;
    check_len("window", dims.window_len(), window.len())?;
    check_len("converged", dims.dxdp_len(), converged.len())?;
    check_len("dxdp", dims.dxdp_len(), dxdp.len())?;

    let w = dims.window;
    let slot = active_slot(step, w);

    dxdp.par_iter_mut()
        .zip(converged.par_iter_mut())
        .zip(window.par_chunks_mut(w))
        .zip(contribution.par_iter())
        .enumerate()
        .for_each(|(lane, (((out, conv), ring), &dx))| {
            let scale = -b[dims.entity_of_dxdp_lane(lane)] * dt;
            *out = scale * reduce_lane(ring, conv, dx, slot, a);
        });

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_single_slot_accumulates_history() {
        let mut ring = [0.0f64];
        let mut conv = 0.0;
        assert_eq!(reduce_lane(&mut ring, &mut conv, 1.0, 0, 0.5), 1.0);
        assert_eq!(reduce_lane(&mut ring, &mut conv, 2.0, 0, 0.5), 3.0);
        assert_eq!(reduce_lane(&mut ring, &mut conv, 4.0, 0, 0.5), 7.0);
        assert_eq!(conv, 3.0);
    }

    #[test]
    fn test_two_slot_unrolled() {
        // a = 0.5, W = 2: weights 1, 1.5 inside the window, 1.5 for the tail
        let mut ring = [0.0f64; 2];
        let mut conv = 0.0;
        let s0 = reduce_lane(&mut ring, &mut conv, 1.0, active_slot(0, 2), 0.5);
        let s1 = reduce_lane(&mut ring, &mut conv, 1.0, active_slot(1, 2), 0.5);
        let s2 = reduce_lane(&mut ring, &mut conv, 1.0, active_slot(2, 2), 0.5);
        assert_relative_eq!(s0, 1.0);
        assert_relative_eq!(s1, 2.5);
        assert_relative_eq!(s2, 4.0);
        assert_relative_eq!(conv, 1.0);
    }

    #[test]
    fn test_wraparound_reads_newest_first() {
        // after two inserts into slot 1 then slot 2 the newest is slot 2
        let mut ring = [0.0f64; 3];
        let mut conv = 0.0;
        reduce_lane(&mut ring, &mut conv, 5.0, 1, 0.0);
        let s = reduce_lane(&mut ring, &mut conv, 7.0, 2, 0.0);
        // a = 0: every slot carries weight 1
        assert_eq!(s, 12.0);
    }

    #[test]
    fn test_reduce_window_broadcasts_b_per_entity() {
        let dims = Dimensions::new(2, 2, 3);
        let b = vec![1.0f64, 2.0];
        let contribution = vec![1.0f64; dims.dxdp_len()];
        let mut window = vec![0.0; dims.window_len()];
        let mut converged = vec![0.0; dims.dxdp_len()];
        let mut dxdp = vec![0.0; dims.dxdp_len()];

        reduce_window(
            &dims, 0, 0.5, 0.1, &b, &contribution, &mut window, &mut converged, &mut dxdp,
        )
        .unwrap();

        for p in 0..dims.parameters {
            for i in 0..dims.entities {
                for d in 0..3 {
                    let lane = p * dims.coords() + i * 3 + d;
                    assert_relative_eq!(dxdp[lane], -b[i] * 0.1, epsilon = 1e-15);
                }
            }
        }
        // lane-major: lane 0 wrote slot 0
        assert_eq!(window[0], 1.0);
        assert_eq!(window[1], 0.0);
    }
}
