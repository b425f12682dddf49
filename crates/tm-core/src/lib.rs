//! # tm-core
//!
//! Core types, traits, and errors shared by every integrator backend.
//!
//! This crate defines the fundamental abstractions used across the workspace:
//! - **Errors**: [`TmError`] and its three-way [`ErrorKind`] classification
//! - **Precision**: the [`Real`] scalar trait, implemented for `f32` and `f64`
//! - **Configuration**: [`IntegratorConfig`] and [`LangevinCoefficients`]
//! - **Layout**: [`Dimensions`] and the sign-safe ring index [`wrap_index`]
//! - **Seam**: the [`Stepper`] trait implemented by the host and CUDA backends
//!
//! ## Architecture
//! ```text
//! ┌─────────────────┐
//! │    tm-core      │  ← types / traits / errors
//! └─────────────────┘
//!         ▲
//!    ┌────┴──────────────┐
//! ┌──▼────────────┐ ┌────▼─────┐
//! │ tm-integrator │ │  tm-gpu  │
//! └───────────────┘ └──────────┘
//!         ▲              ▲
//!         └──────┬───────┘
//!         ┌──────▼───────┐
//!         │  tm-replica  │ ← forward / backward / reset
//!         └──────────────┘
//! ```

pub mod config;
pub mod dims;
pub mod errors;
pub mod precision;
pub mod stepper;

pub use config::{IntegratorConfig, LangevinCoefficients, BOLTZ};
pub use dims::{check_len, wrap_index, Dimensions, SPATIAL_DIMS};
pub use errors::{ErrorKind, TmError, TmResult};
pub use precision::{cast_slice, Precision, Real};
pub use stepper::{Lifecycle, Stepper};
