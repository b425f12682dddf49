//! The backend seam.
//!
//! Both the host reference integrator and the CUDA integrator implement
//! [`Stepper`], so the replica layer can drive either without knowing where the
//! buffers live. Accessors return owned host copies because a device backend has
//! to transfer anyway.

use crate::dims::Dimensions;
use crate::errors::TmResult;
use crate::precision::Real;

/// Lifecycle of an integrator instance.
///
/// `Disposed` is not represented: dropping the instance releases everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Buffers allocated and zeroed; positions not yet provided.
    Uninitialized,
    /// Positions set, no step taken yet.
    Ready,
    /// At least one step taken.
    Stepping,
}

/// One integrator instance advancing `x`, `v` and `dxdp`.
pub trait Stepper<T: Real> {
    /// Shapes fixed at construction.
    fn dimensions(&self) -> Dimensions;

    /// Number of completed steps.
    fn step_count(&self) -> u64;

    fn lifecycle(&self) -> Lifecycle;

    /// Sets positions `[N][3]`. Moves an uninitialized instance to `Ready`.
    fn set_positions(&mut self, x: &[T]) -> TmResult<()>;

    fn positions(&self) -> TmResult<Vec<T>>;

    /// Sets velocities `[N][3]`.
    fn set_velocities(&mut self, v: &[T]) -> TmResult<()>;

    fn velocities(&self) -> TmResult<Vec<T>>;

    /// Parameter derivative `[P][N][3]`.
    fn dxdp(&self) -> TmResult<Vec<T>>;

    /// Noise drawn by the most recent step `[N][3]` (zeros before the first step).
    fn noise(&self) -> TmResult<Vec<T>>;

    /// Advances one step from host-resident inputs.
    ///
    /// `mixed_partials` is consumed as the accumulator of the Hessian-vector
    /// product and holds this step's window contribution on return.
    fn step_host(&mut self, grad: &[T], hessian: &[T], mixed_partials: &mut [T]) -> TmResult<()>;
}
