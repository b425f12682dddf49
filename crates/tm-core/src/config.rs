//! Integrator configuration.
//!
//! Provides serde-based TOML configuration for integrator instances. Values are
//! kept in `f64` here and narrowed to the instance precision at construction.
//! [`IntegratorConfig::validate`] runs before any buffer is allocated.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::dims::{check_len, Dimensions};
use crate::errors::{TmError, TmResult};

/// Boltzmann constant in kJ/(mol·K)
pub const BOLTZ: f64 = 0.008_314_462_6;

fn default_seed() -> u64 {
    2019
}

/// Construction parameters for one integrator instance.
///
/// ```toml
/// dt = 0.0025
/// window = 100
/// entities = 2
/// parameters = 4
/// a = 0.5
/// b = [0.1, 0.1]
/// c = [0.0, 0.0]
/// seed = 42
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegratorConfig {
    /// Step size
    pub dt: f64,
    /// Window slot count W (≥ 1)
    pub window: usize,
    /// Entity count N
    pub entities: usize,
    /// Parameter count P
    pub parameters: usize,
    /// Decay / velocity-retention scalar
    pub a: f64,
    /// Per-entity force scale, length N
    pub b: Vec<f64>,
    /// Per-entity noise scale, length N
    pub c: Vec<f64>,
    /// Seed of the Gaussian noise source
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Replace every noise draw with zeros
    #[serde(default)]
    pub disable_noise: bool,
}

impl IntegratorConfig {
    /// Builds a config from explicit coefficients.
    pub fn new(
        dt: f64,
        window: usize,
        entities: usize,
        parameters: usize,
        a: f64,
        b: Vec<f64>,
        c: Vec<f64>,
    ) -> Self {
        Self {
            dt,
            window,
            entities,
            parameters,
            a,
            b,
            c,
            seed: default_seed(),
            disable_noise: false,
        }
    }

    /// Builds a config from thermostat-derived coefficients.
    pub fn from_langevin(
        coefficients: LangevinCoefficients,
        dt: f64,
        window: usize,
        parameters: usize,
    ) -> Self {
        let entities = coefficients.b.len();
        Self::new(
            dt,
            window,
            entities,
            parameters,
            coefficients.a,
            coefficients.b,
            coefficients.c,
        )
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_noise_disabled(mut self) -> Self {
        self.disable_noise = true;
        self
    }

    /// Shapes implied by this config.
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.entities, self.parameters, self.window)
    }

    /// Validate configuration parameters.
    pub fn validate(&self) -> TmResult<()> {
        if self.window < 1 {
            return Err(TmError::config(format!(
                "window must be >= 1, got {}",
                self.window
            )));
        }
        if self.entities == 0 {
            return Err(TmError::config("entities must be >= 1"));
        }
        if !(self.dt.is_finite() && self.dt > 0.0) {
            return Err(TmError::config(format!(
                "dt must be finite and > 0, got {}",
                self.dt
            )));
        }
        if !(self.a.is_finite() && self.a >= 0.0) {
            return Err(TmError::config(format!(
                "a must be finite and >= 0, got {}",
                self.a
            )));
        }
        let bytes = self
            .dimensions()
            .checked_lengths()
            .and_then(|(.., total)| total.checked_mul(std::mem::size_of::<f64>()));
        if bytes.is_none() {
            return Err(TmError::config(format!(
                "buffer sizes overflow for N={} P={} W={}",
                self.entities, self.parameters, self.window
            )));
        }
        check_len("coefficient b", self.entities, self.b.len())?;
        check_len("coefficient c", self.entities, self.c.len())?;
        if let Some(bad) = self.b.iter().chain(self.c.iter()).find(|v| !v.is_finite()) {
            return Err(TmError::config(format!(
                "coefficients must be finite, got {bad}"
            )));
        }
        if self.a >= 1.0 {
            log::warn!("a = {} >= 1: history weights do not decay", self.a);
        }
        Ok(())
    }

    /// Parse from a TOML string and validate.
    pub fn from_toml_str(content: &str) -> TmResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| TmError::SerializationError(format!("TOML parse error: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file and validate.
    pub fn from_file(path: impl AsRef<Path>) -> TmResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Serialize to TOML.
    pub fn to_toml_string(&self) -> TmResult<String> {
        toml::to_string(self)
            .map_err(|e| TmError::SerializationError(format!("TOML write error: {e}")))
    }
}

/// Langevin coefficients derived from physical thermostat parameters.
///
/// With friction γ, step dt, temperature T and masses m_i:
/// - `a = exp(-γ·dt)`
/// - force scale `f = (1 - a)/γ`, or `dt` when γ = 0
/// - `b_i = f / m_i`
/// - `c_i = sqrt(k_B·T·(1 - a²)) · sqrt(1/m_i)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LangevinCoefficients {
    pub a: f64,
    pub b: Vec<f64>,
    pub c: Vec<f64>,
}

impl LangevinCoefficients {
    pub fn from_thermostat(
        masses: &[f64],
        dt: f64,
        friction: f64,
        temperature: f64,
    ) -> TmResult<Self> {
        if masses.is_empty() {
            return Err(TmError::config("masses must not be empty"));
        }
        if let Some(m) = masses.iter().find(|m| !(m.is_finite() && **m > 0.0)) {
            return Err(TmError::config(format!("masses must be > 0, got {m}")));
        }
        if !(friction.is_finite() && friction >= 0.0) {
            return Err(TmError::config(format!(
                "friction must be >= 0, got {friction}"
            )));
        }
        if !(temperature.is_finite() && temperature >= 0.0) {
            return Err(TmError::config(format!(
                "temperature must be >= 0, got {temperature}"
            )));
        }

        let a = (-dt * friction).exp();
        let force_scale = if friction == 0.0 {
            dt
        } else {
            (1.0 - a) / friction
        };
        let kt = BOLTZ * temperature;
        let noise_scale = (kt * (1.0 - a * a)).sqrt();

        Ok(Self {
            a,
            b: masses.iter().map(|m| force_scale / m).collect(),
            c: masses.iter().map(|m| noise_scale * (1.0 / m).sqrt()).collect(),
        })
    }
}
