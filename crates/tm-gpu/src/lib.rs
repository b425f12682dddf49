//! # tm-gpu
//!
//! CUDA backend for the integrator. Each stage is one kernel over independent
//! lanes; stages are ordered on a single stream.
//!
//! Kernel source and launch geometry live in [`kernels`] and are always built.
//! The device integrator itself needs the `cuda` feature:
//!
//! ```toml
//! tm-gpu = { workspace = true, features = ["cuda"] }
//! ```

pub mod kernels;

#[cfg(feature = "cuda")]
pub mod integrator;

#[cfg(feature = "cuda")]
pub use integrator::{CudaIntegrator, GpuReal};

pub use kernels::{Stage, BLOCK_SIZE};
