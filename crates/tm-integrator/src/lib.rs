//! # tm-integrator
//!
//! Host-side integrator that advances positions and velocities with a discretized
//! Langevin step while propagating the parameter derivative `dxdp` through a
//! bounded window of Hessian-vector contributions.
//!
//! Each step runs four stages separated by implicit barriers:
//! 1. [`linalg`]: `C ← C + H·dxdp`, with `C` pre-loaded with the mixed partials
//! 2. [`window`]: evict / insert / geometric re-sum into `dxdp`
//! 3. [`noise`]: one Gaussian draw per coordinate
//! 4. [`langevin`]: `v ← a·v − b·grad + c·noise`, `x ← x + v·dt`
//!
//! Lanes inside a stage never touch each other's data and run on the rayon pool.

pub mod buffers;
pub mod integrator;
pub mod langevin;
pub mod linalg;
pub mod noise;
pub mod window;

pub use buffers::StateBuffers;
pub use integrator::Integrator;
pub use noise::RandomSource;
