//! # tm-replica
//!
//! Replica worker: runs integrator instances forward over a λ schedule and turns
//! the accumulated `dxdp` into parameter gradients on the backward pass.
//!
//! - [`forcefield`]: the [`ForceField`] seam and the [`HarmonicWell`] evaluator
//! - [`protocol`]: serde request / reply messages
//! - [`factory`]: backend selection (host, or CUDA with the `cuda` feature)
//! - [`worker`]: [`Worker`] with `forward_mode`, `backward_mode` and `reset_state`

pub mod factory;
pub mod forcefield;
pub mod protocol;
pub mod worker;

#[cfg(feature = "cuda")]
pub use factory::CudaFactory;
pub use factory::{HostFactory, StepperFactory};
pub use forcefield::{Derivatives, ForceField, HarmonicWell};
pub use protocol::{BackwardReply, BackwardRequest, ForwardReply, ForwardRequest, SystemSpec};
pub use worker::{subsample_frames, Worker};
