//! Run configuration for the CLI.
//!
//! A run file is a TOML document describing one replica:
//!
//! ```toml
//! x0 = [0.1, 0.0, 0.0]
//! lambdas = [1.0, 1.0, 1.0]
//!
//! [integrator]
//! dt = 0.0015
//! window = 100
//! entities = 1
//! parameters = 1
//! a = 0.998
//! b = [0.0012]
//! c = [0.0016]
//!
//! [force_field]
//! k = [100.0]
//! centers = [0.0, 0.0, 0.0]
//! ```
//!
//! A request file is a JSON-encoded `ForwardRequest` as the worker receives it.

use anyhow::{Context, Result};
use std::path::Path;
use tm_core::{IntegratorConfig, LangevinCoefficients};
use tm_replica::{ForwardRequest, HarmonicWell, SystemSpec};

/// Load a system from a TOML file.
pub fn load_system(path: &Path) -> Result<SystemSpec> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read run file {}", path.display()))?;
    let system: SystemSpec = toml::from_str(&content)
        .with_context(|| format!("Failed to parse run file {}", path.display()))?;
    system.validate()?;
    Ok(system)
}

/// Parse a forward request from JSON and validate its system.
pub fn parse_request(json: &str) -> Result<ForwardRequest> {
    let request: ForwardRequest =
        serde_json::from_str(json).context("Failed to parse forward request")?;
    request.system.validate()?;
    Ok(request)
}

/// Load a forward request from a JSON file.
pub fn load_request(path: &Path) -> Result<ForwardRequest> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read request {}", path.display()))?;
    parse_request(&content).with_context(|| format!("Invalid request {}", path.display()))
}

/// Physical parameters of the built-in harmonic demo.
#[derive(Debug, Clone)]
pub struct DemoParams {
    pub entities: usize,
    pub steps: usize,
    pub window: usize,
    pub lambda: f64,
    pub dt: f64,
    pub friction: f64,
    pub temperature: f64,
    pub mass: f64,
    pub stiffness: f64,
}

/// N independent wells on a line, each entity displaced from its center.
pub fn demo_system(params: &DemoParams) -> Result<SystemSpec> {
    let n = params.entities;
    let masses = vec![params.mass; n];
    let coefficients = LangevinCoefficients::from_thermostat(
        &masses,
        params.dt,
        params.friction,
        params.temperature,
    )?;
    let integrator = IntegratorConfig::from_langevin(coefficients, params.dt, params.window, n);

    let centers: Vec<f64> = (0..n).flat_map(|i| [i as f64, 0.0, 0.0]).collect();
    let x0: Vec<f64> = centers
        .iter()
        .enumerate()
        .map(|(lane, c)| c + 0.05 * ((lane % 3) as f64 + 1.0))
        .collect();

    let system = SystemSpec {
        integrator,
        x0,
        v0: None,
        lambdas: vec![params.lambda; params.steps],
        force_field: HarmonicWell::new(vec![params.stiffness; n], centers)?,
    };
    system.validate()?;
    Ok(system)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> DemoParams {
        DemoParams {
            entities: 3,
            steps: 10,
            window: 5,
            lambda: 1.0,
            dt: 0.0015,
            friction: 1.0,
            temperature: 300.0,
            mass: 12.0,
            stiffness: 100.0,
        }
    }

    #[test]
    fn test_demo_system_is_consistent() {
        let sys = demo_system(&params()).unwrap();
        assert_eq!(sys.integrator.entities, 3);
        assert_eq!(sys.integrator.parameters, 3);
        assert_eq!(sys.x0.len(), 9);
        assert_eq!(sys.lambdas.len(), 10);
    }

    #[test]
    fn test_system_toml_roundtrip() {
        let sys = demo_system(&params()).unwrap();
        let text = toml::to_string(&sys).unwrap();
        let back: SystemSpec = toml::from_str(&text).unwrap();
        assert_eq!(back, sys);
    }

    #[test]
    fn test_request_json_roundtrip() {
        let request = ForwardRequest {
            key: "replica-0".to_string(),
            precision: tm_core::Precision::Single,
            system: demo_system(&params()).unwrap(),
            n_frames: 2,
            inference: true,
        };
        let json = serde_json::to_string(&request).unwrap();
        let back = parse_request(&json).unwrap();
        assert_eq!(back.key, "replica-0");
        assert_eq!(back.precision, tm_core::Precision::Single);
        assert_eq!(back.n_frames, 2);
        assert!(back.inference);
        assert_eq!(back.system, request.system);
    }

    #[test]
    fn test_request_with_bad_system_rejected() {
        let mut system = demo_system(&params()).unwrap();
        system.x0.pop();
        let json = serde_json::json!({
            "key": "bad",
            "precision": "double",
            "system": system,
        });
        assert!(parse_request(&json.to_string()).is_err());
    }
}
