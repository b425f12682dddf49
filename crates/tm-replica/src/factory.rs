//! Backend selection for replica runs.

use tm_core::{IntegratorConfig, Stepper, TmResult};
use tm_integrator::Integrator;

/// Builds integrator instances for the worker, one per forward request.
pub trait StepperFactory: Send + Sync {
    /// Human-readable backend name for logs.
    fn name(&self) -> &'static str;

    fn build_single(&self, config: &IntegratorConfig) -> TmResult<Box<dyn Stepper<f32>>>;

    fn build_double(&self, config: &IntegratorConfig) -> TmResult<Box<dyn Stepper<f64>>>;
}

/// Host reference backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostFactory;

impl StepperFactory for HostFactory {
    fn name(&self) -> &'static str {
        "host"
    }

    fn build_single(&self, config: &IntegratorConfig) -> TmResult<Box<dyn Stepper<f32>>> {
        Ok(Box::new(Integrator::<f32>::new(config)?))
    }

    fn build_double(&self, config: &IntegratorConfig) -> TmResult<Box<dyn Stepper<f64>>> {
        Ok(Box::new(Integrator::<f64>::new(config)?))
    }
}

/// CUDA backend on one device.
#[cfg(feature = "cuda")]
#[derive(Debug, Clone, Copy, Default)]
pub struct CudaFactory {
    pub ordinal: usize,
}

#[cfg(feature = "cuda")]
impl StepperFactory for CudaFactory {
    fn name(&self) -> &'static str {
        "cuda"
    }

    fn build_single(&self, config: &IntegratorConfig) -> TmResult<Box<dyn Stepper<f32>>> {
        Ok(Box::new(tm_gpu::CudaIntegrator::<f32>::new(config, self.ordinal)?))
    }

    fn build_double(&self, config: &IntegratorConfig) -> TmResult<Box<dyn Stepper<f64>>> {
        Ok(Box::new(tm_gpu::CudaIntegrator::<f64>::new(config, self.ordinal)?))
    }
}
