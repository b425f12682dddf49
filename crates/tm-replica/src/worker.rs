//! Forward / backward / reset driver around integrator instances.
//!
//! A forward request builds a fresh integrator, takes one step per λ and, unless
//! the request is inference-only, stores the per-step total derivative
//! `d(du/dλ)/dp = ∂(du/dλ)/∂p + dxdp · ∂(du/dλ)/∂x` under the request key. The
//! backward request contracts those with the adjoint `du/dλ` values and drops
//! the stored run.

use std::collections::HashMap;
use std::time::Instant;

use parking_lot::Mutex;
use tm_core::{cast_slice, check_len, Precision, Real, Stepper, TmError, TmResult};

use crate::factory::{HostFactory, StepperFactory};
use crate::forcefield::ForceField;
use crate::protocol::{BackwardReply, BackwardRequest, ForwardReply, ForwardRequest, SystemSpec};

/// Per-step total derivatives kept for a backward pass, `[T][P]`.
#[derive(Debug, Clone)]
struct StoredRun {
    parameters: usize,
    totals: Vec<Vec<f64>>,
}

#[derive(Debug, Default)]
struct Trace {
    energies: Vec<f64>,
    du_dls: Vec<f64>,
    trajectory: Vec<Vec<f64>>,
    totals: Vec<Vec<f64>>,
}

fn widen<T: Real>(values: &[T]) -> Vec<f64> {
    values.iter().map(|v| v.widen()).collect()
}

/// `∂(du/dλ)/∂p_j + Σ_lane dxdp[j][lane] · ∂(du/dλ)/∂x[lane]`
fn total_derivative<T: Real>(du_dl_dp: &[T], du_dl_dx: &[T], dxdp: &[T]) -> Vec<f64> {
    let n3 = du_dl_dx.len();
    du_dl_dp
        .iter()
        .enumerate()
        .map(|(j, &partial)| {
            let chain: f64 = dxdp[j * n3..(j + 1) * n3]
                .iter()
                .zip(du_dl_dx)
                .map(|(&d, &g)| d.widen() * g.widen())
                .sum();
            partial.widen() + chain
        })
        .collect()
}

/// Keeps every `max(1, len / n_frames)`-th frame; none when `n_frames == 0`.
pub fn subsample_frames(trajectory: Vec<Vec<f64>>, n_frames: usize) -> Vec<Vec<f64>> {
    if n_frames == 0 {
        return Vec::new();
    }
    let interval = (trajectory.len() / n_frames).max(1);
    trajectory
        .into_iter()
        .enumerate()
        .filter(|(i, _)| i % interval == 0)
        .map(|(_, frame)| frame)
        .collect()
}

fn simulate<T: Real>(
    stepper: &mut dyn Stepper<T>,
    system: &SystemSpec,
    keep_totals: bool,
    record_frames: bool,
) -> TmResult<Trace> {
    let dims = stepper.dimensions();
    check_len(
        "force field parameters",
        dims.parameters,
        ForceField::<T>::parameters(&system.force_field),
    )?;

    stepper.set_positions(&cast_slice::<T>(&system.x0))?;
    if let Some(v0) = &system.v0 {
        stepper.set_velocities(&cast_slice::<T>(v0))?;
    }

    let steps = system.lambdas.len();
    let mut trace = Trace {
        energies: Vec::with_capacity(steps),
        du_dls: Vec::with_capacity(steps),
        ..Default::default()
    };
    if record_frames {
        trace.trajectory.push(widen(&stepper.positions()?));
    }

    for &lambda in &system.lambdas {
        let x = stepper.positions()?;
        let derivs = ForceField::<T>::evaluate(&system.force_field, &x, T::cast(lambda))?;
        trace.energies.push(derivs.energy.widen());
        trace.du_dls.push(derivs.du_dl.widen());
        if keep_totals {
            let dxdp = stepper.dxdp()?;
            trace
                .totals
                .push(total_derivative(&derivs.du_dl_dp, &derivs.du_dl_dx, &dxdp));
        }

        let mut mixed = derivs.mixed_partials;
        stepper.step_host(&derivs.grad, &derivs.hessian, &mut mixed)?;

        if record_frames {
            trace.trajectory.push(widen(&stepper.positions()?));
        }
    }

    Ok(trace)
}

/// Serves forward, backward and reset requests.
pub struct Worker<F: StepperFactory = HostFactory> {
    factory: F,
    run: Mutex<()>,
    states: Mutex<HashMap<String, StoredRun>>,
}

impl Worker<HostFactory> {
    /// Worker on the host reference backend.
    pub fn host() -> Self {
        Self::new(HostFactory)
    }
}

impl<F: StepperFactory> Worker<F> {
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            run: Mutex::new(()),
            states: Mutex::new(HashMap::new()),
        }
    }

    pub fn backend(&self) -> &'static str {
        self.factory.name()
    }

    /// Keys with a stored forward run, sorted.
    pub fn pending_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.states.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Runs one replica forward.
    pub fn forward_mode(&self, request: &ForwardRequest) -> TmResult<ForwardReply> {
        request.system.validate()?;
        let keep_totals = !request.inference;
        let record_frames = request.n_frames > 0;
        let config = &request.system.integrator;

        let started = Instant::now();
        let trace = {
            let _guard = self.run.lock();
            match request.precision {
                Precision::Single => {
                    let mut stepper = self.factory.build_single(config)?;
                    simulate(stepper.as_mut(), &request.system, keep_totals, record_frames)?
                }
                Precision::Double => {
                    let mut stepper = self.factory.build_double(config)?;
                    simulate(stepper.as_mut(), &request.system, keep_totals, record_frames)?
                }
            }
        };
        log::debug!(
            "forward '{}' ({}, {}): {} steps in {:.3}s",
            request.key,
            self.factory.name(),
            request.precision,
            request.system.lambdas.len(),
            started.elapsed().as_secs_f64()
        );

        if keep_totals {
            let stored = StoredRun {
                parameters: config.parameters,
                totals: trace.totals,
            };
            if self.states.lock().insert(request.key.clone(), stored).is_some() {
                log::warn!("forward '{}' replaced an unconsumed run", request.key);
            }
        }

        Ok(ForwardReply {
            energies: trace.energies,
            du_dls: trace.du_dls,
            frames: subsample_frames(trace.trajectory, request.n_frames),
        })
    }

    /// Contracts the stored run for `request.key` with the adjoint values.
    pub fn backward_mode(&self, request: &BackwardRequest) -> TmResult<BackwardReply> {
        let mut states = self.states.lock();
        let run = states.get(&request.key).ok_or_else(|| {
            TmError::config(format!("no forward run stored under key '{}'", request.key))
        })?;
        check_len("adjoint du/dl", run.totals.len(), request.adjoint_du_dls.len())?;

        let mut dl_dps = vec![0.0; run.parameters];
        for (adjoint, total) in request.adjoint_du_dls.iter().zip(&run.totals) {
            for (acc, t) in dl_dps.iter_mut().zip(total) {
                *acc += adjoint * t;
            }
        }
        states.remove(&request.key);
        log::debug!("backward '{}': {} parameters", request.key, dl_dps.len());

        Ok(BackwardReply { dl_dps })
    }

    /// Drops every stored run.
    pub fn reset_state(&self) {
        let mut states = self.states.lock();
        let dropped = states.len();
        states.clear();
        log::info!("reset: dropped {dropped} stored runs");
    }
}
