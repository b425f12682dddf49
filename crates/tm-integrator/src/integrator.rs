//! Host reference integrator.

use tm_core::{
    cast_slice, check_len, Dimensions, IntegratorConfig, Lifecycle, Real, Stepper, TmError,
    TmResult,
};

use crate::buffers::StateBuffers;
use crate::noise::RandomSource;
use crate::{langevin, linalg, window};

/// One integrator instance over scalar type `T`.
///
/// Owns every state buffer exclusively. Instances share nothing, so several can
/// run concurrently on different threads.
#[derive(Debug)]
pub struct Integrator<T: Real> {
    dims: Dimensions,
    dt: T,
    a: T,
    bufs: StateBuffers<T>,
    rng: RandomSource<T>,
    step: u64,
    lifecycle: Lifecycle,
}

impl<T: Real> Integrator<T> {
    /// Validates `config`, allocates zeroed buffers and seeds the noise source.
    pub fn new(config: &IntegratorConfig) -> TmResult<Self> {
        config.validate()?;
        let dims = config.dimensions();
        let bufs = StateBuffers::allocate(&dims, cast_slice(&config.b), cast_slice(&config.c))?;
        let rng = if config.disable_noise {
            RandomSource::disabled(config.seed)
        } else {
            RandomSource::new(config.seed)
        };

        log::info!(
            "Integrator<{}>: N={} P={} W={} dt={} a={} ({:.2} MB state)",
            T::NAME,
            dims.entities,
            dims.parameters,
            dims.window,
            config.dt,
            config.a,
            bufs.footprint_bytes() as f64 / (1024.0 * 1024.0)
        );

        Ok(Self {
            dims,
            dt: T::cast(config.dt),
            a: T::cast(config.a),
            bufs,
            rng,
            step: 0,
            lifecycle: Lifecycle::Uninitialized,
        })
    }

    pub fn dims(&self) -> &Dimensions {
        &self.dims
    }

    pub fn step_index(&self) -> u64 {
        self.step
    }

    pub fn x(&self) -> &[T] {
        &self.bufs.x
    }

    pub fn v(&self) -> &[T] {
        &self.bufs.v
    }

    pub fn dxdp_slice(&self) -> &[T] {
        &self.bufs.dxdp
    }

    pub fn noise_slice(&self) -> &[T] {
        &self.bufs.noise
    }

    pub fn footprint_bytes(&self) -> usize {
        self.bufs.footprint_bytes()
    }

    /// Restarts the noise stream. History, positions and velocities are kept.
    pub fn reseed(&mut self, seed: u64) {
        self.rng.reseed(seed);
    }

    pub fn set_x(&mut self, x: &[T]) -> TmResult<()> {
        check_len("positions", self.dims.coords(), x.len())?;
        self.bufs.x.copy_from_slice(x);
        if self.lifecycle == Lifecycle::Uninitialized {
            self.lifecycle = Lifecycle::Ready;
        }
        Ok(())
    }

    pub fn set_v(&mut self, v: &[T]) -> TmResult<()> {
        check_len("velocities", self.dims.coords(), v.len())?;
        self.bufs.v.copy_from_slice(v);
        Ok(())
    }

    /// Advances one step.
    ///
    /// `mixed_partials` (`[P][N][3]`) is used as the accumulator of the
    /// Hessian-vector product and holds the window contribution `Dx` afterwards.
    /// Input lengths and lifecycle are checked before any state is touched.
    pub fn step(&mut self, grad: &[T], hessian: &[T], mixed_partials: &mut [T]) -> TmResult<()> {
        check_len("gradient", self.dims.coords(), grad.len())?;
        check_len("hessian", self.dims.hessian_len(), hessian.len())?;
        check_len("mixed partials", self.dims.dxdp_len(), mixed_partials.len())?;
        if self.lifecycle == Lifecycle::Uninitialized {
            return Err(TmError::not_ready("positions must be set before stepping"));
        }

        linalg::hessian_vector_accumulate(&self.dims, hessian, &self.bufs.dxdp, mixed_partials)?;

        let StateBuffers {
            x,
            v,
            dxdp,
            window: ring,
            converged,
            noise,
            b,
            c,
        } = &mut self.bufs;

        window::reduce_window(
            &self.dims,
            self.step,
            self.a,
            self.dt,
            b,
            mixed_partials,
            ring,
            converged,
            dxdp,
        )?;

        self.rng.fill(noise);

        langevin::advance(self.a, self.dt, b, c, grad, noise, x, v)?;

        self.step += 1;
        self.lifecycle = Lifecycle::Stepping;
        log::trace!("step {} complete", self.step);
        Ok(())
    }
}

impl<T: Real> Stepper<T> for Integrator<T> {
    fn dimensions(&self) -> Dimensions {
        self.dims
    }

    fn step_count(&self) -> u64 {
        self.step
    }

    fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    fn set_positions(&mut self, x: &[T]) -> TmResult<()> {
        self.set_x(x)
    }

    fn positions(&self) -> TmResult<Vec<T>> {
        Ok(self.bufs.x.clone())
    }

    fn set_velocities(&mut self, v: &[T]) -> TmResult<()> {
        self.set_v(v)
    }

    fn velocities(&self) -> TmResult<Vec<T>> {
        Ok(self.bufs.v.clone())
    }

    fn dxdp(&self) -> TmResult<Vec<T>> {
        Ok(self.bufs.dxdp.clone())
    }

    fn noise(&self) -> TmResult<Vec<T>> {
        Ok(self.bufs.noise.clone())
    }

    fn step_host(&mut self, grad: &[T], hessian: &[T], mixed_partials: &mut [T]) -> TmResult<()> {
        self.step(grad, hessian, mixed_partials)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(entities: usize, parameters: usize, window: usize) -> IntegratorConfig {
        IntegratorConfig::new(
            0.1,
            window,
            entities,
            parameters,
            0.5,
            vec![1.0; entities],
            vec![0.0; entities],
        )
    }

    #[test]
    fn test_new_is_zeroed_and_uninitialized() {
        let integ = Integrator::<f64>::new(&config(2, 3, 4)).unwrap();
        assert_eq!(integ.lifecycle(), Lifecycle::Uninitialized);
        assert_eq!(integ.step_count(), 0);
        assert!(integ.x().iter().all(|&v| v == 0.0));
        assert_eq!(integ.dxdp_slice().len(), 18);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut cfg = config(1, 1, 1);
        cfg.window = 0;
        assert!(Integrator::<f32>::new(&cfg).is_err());
    }

    #[test]
    fn test_step_before_positions_is_not_ready() {
        let mut integ = Integrator::<f64>::new(&config(1, 1, 2)).unwrap();
        let mut mixed = vec![0.0; 3];
        let err = integ.step(&[0.0; 3], &[0.0; 9], &mut mixed).unwrap_err();
        assert!(matches!(err, TmError::NotReady(_)));
        assert_eq!(integ.step_count(), 0);
    }

    #[test]
    fn test_bad_gradient_leaves_state_untouched() {
        let mut integ = Integrator::<f64>::new(&config(1, 1, 2)).unwrap();
        integ.set_x(&[1.0, 2.0, 3.0]).unwrap();
        let mut mixed = vec![1.0; 3];
        let err = integ.step(&[0.0; 2], &[0.0; 9], &mut mixed).unwrap_err();
        assert!(!err.poisons_instance());
        assert_eq!(integ.step_count(), 0);
        assert_eq!(integ.x(), &[1.0, 2.0, 3.0]);
        assert_eq!(mixed, vec![1.0; 3]);
    }

    #[test]
    fn test_lifecycle_transitions() {
        let mut integ = Integrator::<f32>::new(&config(1, 0, 1)).unwrap();
        integ.set_positions(&[0.0; 3]).unwrap();
        assert_eq!(integ.lifecycle(), Lifecycle::Ready);
        integ.step(&[0.0; 3], &[0.0; 9], &mut []).unwrap();
        assert_eq!(integ.lifecycle(), Lifecycle::Stepping);
        integ.set_positions(&[1.0; 3]).unwrap();
        assert_eq!(integ.lifecycle(), Lifecycle::Stepping);
    }
}
