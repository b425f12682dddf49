//! Request / reply messages of the replica worker.
//!
//! Plain serde types; values are carried as `f64` regardless of the precision
//! a run executes in.

use serde::{Deserialize, Serialize};
use tm_core::{check_len, IntegratorConfig, Precision, TmError, TmResult, SPATIAL_DIMS};

use crate::forcefield::HarmonicWell;

/// Everything needed to build and drive one replica.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemSpec {
    /// Initial positions `[N][3]`
    pub x0: Vec<f64>,
    /// Initial velocities `[N][3]`; zeros when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub v0: Option<Vec<f64>>,
    /// λ per step; one step is taken per entry
    pub lambdas: Vec<f64>,
    pub integrator: IntegratorConfig,
    pub force_field: HarmonicWell,
}

impl SystemSpec {
    /// Checks that the integrator, the force field and the initial state agree.
    pub fn validate(&self) -> TmResult<()> {
        self.integrator.validate()?;
        self.force_field.validate()?;
        let n = self.integrator.entities;
        check_len("force field entities", n, self.force_field.k.len())?;
        check_len(
            "force field parameters",
            self.integrator.parameters,
            self.force_field.k.len(),
        )?;
        check_len("x0", n * SPATIAL_DIMS, self.x0.len())?;
        if let Some(v0) = &self.v0 {
            check_len("v0", n * SPATIAL_DIMS, v0.len())?;
        }
        if let Some(bad) = self.lambdas.iter().find(|l| !l.is_finite()) {
            return Err(TmError::config(format!("lambda schedule contains {bad}")));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForwardRequest {
    /// Key the backward pass refers back to
    pub key: String,
    pub precision: Precision,
    pub system: SystemSpec,
    /// Frames to return; zero returns none
    #[serde(default)]
    pub n_frames: usize,
    /// Skip storing state for a backward pass
    #[serde(default)]
    pub inference: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForwardReply {
    /// Potential energy per step
    pub energies: Vec<f64>,
    /// du/dλ per step
    pub du_dls: Vec<f64>,
    /// Subsampled positions, each `[N][3]`
    pub frames: Vec<Vec<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackwardRequest {
    pub key: String,
    /// ∂L/∂(du/dλ) per step
    pub adjoint_du_dls: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackwardReply {
    /// dL/dp per force-field parameter
    pub dl_dps: Vec<f64>,
}
