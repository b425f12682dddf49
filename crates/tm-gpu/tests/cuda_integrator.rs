//! CUDA integrator against the host reference.
//!
//! Requires a CUDA device:
//! ```bash
//! cargo test -p tm-gpu --features cuda -- --ignored
//! ```

#![cfg(feature = "cuda")]

use approx::assert_relative_eq;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tm_core::{ErrorKind, IntegratorConfig, Lifecycle, Stepper, TmError};
use tm_gpu::CudaIntegrator;
use tm_integrator::Integrator;

fn random_vec(rng: &mut ChaCha8Rng, len: usize) -> Vec<f64> {
    (0..len).map(|_| rng.gen_range(-1.0..1.0)).collect()
}

#[test]
#[ignore] // Requires GPU hardware
fn test_golden_three_steps_on_device() {
    env_logger::builder().is_test(true).try_init().ok();

    let cfg = IntegratorConfig::new(0.1, 2, 1, 1, 0.5, vec![1.0], vec![0.0]).with_noise_disabled();
    let mut gpu = CudaIntegrator::<f64>::new(&cfg, 0).expect("CUDA device not available");
    gpu.set_positions(&[0.0; 3]).unwrap();

    for want in [-0.1, -0.25, -0.4] {
        let mut mixed = vec![1.0, 0.0, 0.0];
        gpu.step_host(&[0.0; 3], &[0.0; 9], &mut mixed).unwrap();
        assert_relative_eq!(gpu.dxdp().unwrap()[0], want, epsilon = 1e-12);
    }
    assert_eq!(gpu.lifecycle(), Lifecycle::Stepping);
}

#[test]
#[ignore] // Requires GPU hardware
fn test_matches_host_backend() {
    env_logger::builder().is_test(true).try_init().ok();

    let (n, p, w) = (3, 2, 4);
    let cfg = IntegratorConfig::new(0.05, w, n, p, 0.8, vec![0.3, 0.5, 0.7], vec![0.1; 3])
        .with_seed(17);
    let mut host = Integrator::<f64>::new(&cfg).unwrap();
    let mut gpu = CudaIntegrator::<f64>::new(&cfg, 0).expect("CUDA device not available");

    let mut rng = ChaCha8Rng::seed_from_u64(3);
    let x0 = random_vec(&mut rng, 3 * n);
    host.set_positions(&x0).unwrap();
    gpu.set_positions(&x0).unwrap();

    for _ in 0..9 {
        let grad = random_vec(&mut rng, 3 * n);
        let hessian = random_vec(&mut rng, 9 * n * n);
        let mixed = random_vec(&mut rng, 3 * n * p);

        let mut host_mixed = mixed.clone();
        let mut gpu_mixed = mixed;
        host.step(&grad, &hessian, &mut host_mixed).unwrap();
        gpu.step_host(&grad, &hessian, &mut gpu_mixed).unwrap();

        for (g, h) in gpu_mixed.iter().zip(&host_mixed) {
            assert_relative_eq!(*g, *h, epsilon = 1e-10);
        }
        for (g, h) in gpu.dxdp().unwrap().iter().zip(host.dxdp().unwrap().iter()) {
            assert_relative_eq!(*g, *h, epsilon = 1e-10);
        }
        for (g, h) in gpu.positions().unwrap().iter().zip(host.positions().unwrap().iter()) {
            assert_relative_eq!(*g, *h, epsilon = 1e-10);
        }
        assert_eq!(gpu.noise().unwrap(), host.noise().unwrap());
    }
}

#[test]
#[ignore] // Requires GPU hardware
fn test_device_resident_step() {
    let cfg = IntegratorConfig::new(0.1, 1, 1, 1, 0.0, vec![1.0], vec![0.0]).with_noise_disabled();
    let mut gpu = CudaIntegrator::<f32>::new(&cfg, 0).expect("CUDA device not available");
    gpu.set_positions(&[0.0; 3]).unwrap();

    let stream = gpu.stream().clone();
    let grad = stream.clone_htod(&vec![0.0f32; 3]).unwrap();
    let hessian = stream.clone_htod(&vec![0.0f32; 9]).unwrap();
    let mut mixed = stream.clone_htod(&vec![2.0f32, 0.0, 0.0]).unwrap();
    gpu.step_device(&grad, &hessian, &mut mixed).unwrap();

    assert_relative_eq!(gpu.dxdp().unwrap()[0], -0.2f32, max_relative = 1e-6);
}

#[test]
#[ignore] // Requires GPU hardware
fn test_not_ready_and_nan_errors() {
    let cfg = IntegratorConfig::new(0.1, 2, 1, 1, 0.5, vec![1.0], vec![0.0]);
    let mut gpu = CudaIntegrator::<f64>::new(&cfg, 0).expect("CUDA device not available");

    let mut mixed = vec![1.0, 0.0, 0.0];
    let err = gpu.step_host(&[0.0; 3], &[0.0; 9], &mut mixed).unwrap_err();
    assert!(matches!(err, TmError::NotReady(_)));

    gpu.set_positions(&[0.0; 3]).unwrap();
    gpu.step_host(&[0.0; 3], &[0.0; 9], &mut mixed).unwrap();

    let mut hessian = vec![0.0; 9];
    hessian[0] = f64::NAN;
    let mut mixed = vec![0.0; 3];
    let err = gpu.step_host(&[0.0; 3], &hessian, &mut mixed).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Compute);
}
