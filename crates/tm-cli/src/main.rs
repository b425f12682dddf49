//! tm-cli entry point.
//!
//! Runs one replica forward over a λ schedule, then backward with unit adjoints,
//! and reports energies, du/dλ and the parameter gradient.

mod config;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;
use tm_core::Precision;
use tm_replica::{
    BackwardReply, BackwardRequest, ForwardReply, ForwardRequest, StepperFactory, SystemSpec,
    Worker,
};

use crate::config::{demo_system, load_request, load_system, DemoParams};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser, Debug)]
#[command(name = "tm-cli")]
#[command(version = VERSION)]
#[command(about = "Langevin integration with windowed dxdp propagation", long_about = None)]
struct Args {
    /// TOML run file; the built-in harmonic demo is used when absent
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// JSON forward request; replaces --config, --precision and --frames
    #[arg(long, conflicts_with = "config")]
    request: Option<PathBuf>,

    /// Scalar width: single or double
    #[arg(long, default_value = "double")]
    precision: Precision,

    /// Frames to return from the trajectory (0 = none)
    #[arg(long, default_value = "0")]
    frames: usize,

    /// Override the noise seed
    #[arg(long)]
    seed: Option<u64>,

    /// Replace noise with zeros
    #[arg(long)]
    no_noise: bool,

    /// CUDA device ordinal (requires the `cuda` feature)
    #[arg(long)]
    gpu: Option<usize>,

    /// Write forward and backward replies as JSON
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    // ========================================================================
    // Demo system
    // ========================================================================
    /// Demo: entity count
    #[arg(long, default_value = "4")]
    entities: usize,

    /// Demo: step count
    #[arg(long, default_value = "500")]
    steps: usize,

    /// Demo: window slots
    #[arg(long, default_value = "100")]
    window: usize,

    /// Demo: constant λ
    #[arg(long, default_value = "1.0")]
    lambda: f64,

    /// Demo: step size (ps)
    #[arg(long, default_value = "0.0015")]
    dt: f64,

    /// Demo: friction (1/ps)
    #[arg(long, default_value = "1.0")]
    friction: f64,

    /// Demo: temperature (K)
    #[arg(long, default_value = "300.0")]
    temperature: f64,

    /// Demo: well stiffness
    #[arg(long, default_value = "100.0")]
    stiffness: f64,
}

#[derive(Serialize)]
struct RunReport<'a> {
    forward: &'a ForwardReply,
    #[serde(skip_serializing_if = "Option::is_none")]
    backward: Option<&'a BackwardReply>,
}

fn build_system(args: &Args) -> Result<SystemSpec> {
    match &args.config {
        Some(path) => load_system(path),
        None => demo_system(&DemoParams {
            entities: args.entities,
            steps: args.steps,
            window: args.window,
            lambda: args.lambda,
            dt: args.dt,
            friction: args.friction,
            temperature: args.temperature,
            mass: 12.0,
            stiffness: args.stiffness,
        }),
    }
}

fn build_request(args: &Args) -> Result<ForwardRequest> {
    let mut request = match &args.request {
        Some(path) => load_request(path)?,
        None => ForwardRequest {
            key: "tm-cli".to_string(),
            precision: args.precision,
            system: build_system(args)?,
            n_frames: args.frames,
            inference: false,
        },
    };
    if let Some(seed) = args.seed {
        request.system.integrator.seed = seed;
    }
    if args.no_noise {
        request.system.integrator.disable_noise = true;
    }
    Ok(request)
}

fn run<F: StepperFactory>(worker: Worker<F>, args: &Args, forward: ForwardRequest) -> Result<()> {
    let steps = forward.system.lambdas.len();

    log::info!(
        "Forward: {} steps, N={}, P={}, W={} on {} ({})",
        steps,
        forward.system.integrator.entities,
        forward.system.integrator.parameters,
        forward.system.integrator.window,
        worker.backend(),
        forward.precision
    );
    let start = std::time::Instant::now();
    let fwd = worker
        .forward_mode(&forward)
        .context("Forward pass failed")?;
    log::info!("Forward completed in {:.3}s", start.elapsed().as_secs_f64());

    let bwd = if forward.inference {
        log::info!("Inference request: skipping backward pass");
        None
    } else {
        let reply = worker
            .backward_mode(&BackwardRequest {
                key: forward.key.clone(),
                adjoint_du_dls: vec![1.0; steps],
            })
            .context("Backward pass failed")?;
        Some(reply)
    };

    log::info!("=== Results Summary ===");
    if let (Some(first), Some(last)) = (fwd.energies.first(), fwd.energies.last()) {
        log::info!("Energy: {:.6} → {:.6}", first, last);
    }
    let du_dl_sum: f64 = fwd.du_dls.iter().sum();
    log::info!("Σ du/dλ: {:.6}", du_dl_sum);
    for (j, g) in bwd.iter().flat_map(|r| r.dl_dps.iter()).enumerate() {
        log::info!("  dL/dp[{}] = {:.6e}", j, g);
    }
    if !fwd.frames.is_empty() {
        log::info!("Frames: {}", fwd.frames.len());
    }

    if let Some(path) = &args.output {
        let report = RunReport {
            forward: &fwd,
            backward: bwd.as_ref(),
        };
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        log::info!("Report written to: {}", path.display());
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.verbose {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
    } else {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Info)
            .init();
    }

    log::info!("tm-cli {} - Starting", VERSION);

    let request = build_request(&args)?;

    match args.gpu {
        #[cfg(feature = "cuda")]
        Some(ordinal) => run(Worker::new(tm_replica::CudaFactory { ordinal }), &args, request),
        #[cfg(not(feature = "cuda"))]
        Some(_) => anyhow::bail!("--gpu requires a build with the `cuda` feature"),
        None => run(Worker::host(), &args, request),
    }
}
