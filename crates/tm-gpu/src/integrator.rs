//! CUDA integrator.
//!
//! Same four stages as the host backend, each one kernel launch on a single
//! stream. Stream order gives the barrier between stages. Noise is drawn on the
//! host from the same [`RandomSource`] and uploaded, so a seed produces the same
//! trajectory on either backend up to floating-point reassociation.
//!
//! Device buffers are `CudaSlice`s owned by the instance; dropping it (or an
//! early `?` during construction) frees whatever was already allocated.

use std::sync::Arc;

use cudarc::driver::{
    CudaContext, CudaFunction, CudaSlice, CudaStream, DeviceRepr, DriverError, LaunchConfig,
    PushKernelArg, ValidAsZeroBits,
};
use cudarc::nvrtc::{compile_ptx_with_opts, CompileOptions};

use tm_core::{
    cast_slice, check_len, Dimensions, IntegratorConfig, Lifecycle, Real, Stepper, TmError,
    TmResult,
};
use tm_integrator::RandomSource;

use crate::kernels::{grid_for, Stage, BLOCK_SIZE, INTEGRATOR_SOURCE};

/// Scalar types the kernels are instantiated for.
pub trait GpuReal: Real + DeviceRepr + ValidAsZeroBits {}

impl GpuReal for f32 {}
impl GpuReal for f64 {}

fn resource(context: &'static str) -> impl Fn(DriverError) -> TmError {
    move |e| TmError::resource(context, e.to_string())
}

fn compute(stage: &'static str) -> impl Fn(DriverError) -> TmError {
    move |e| TmError::compute(stage, e.to_string())
}

fn launch_config(lanes: usize) -> LaunchConfig {
    LaunchConfig {
        grid_dim: (grid_for(lanes), 1, 1),
        block_dim: (BLOCK_SIZE, 1, 1),
        shared_mem_bytes: 0,
    }
}

fn as_i32(what: &str, value: usize) -> TmResult<i32> {
    i32::try_from(value)
        .map_err(|_| TmError::config(format!("{what} = {value} exceeds the device index range")))
}

struct Kernels {
    hvp: CudaFunction,
    window: CudaFunction,
    langevin: CudaFunction,
}

impl Kernels {
    fn load<T: GpuReal>(ctx: &Arc<CudaContext>) -> TmResult<Self> {
        let ptx = compile_ptx_with_opts(
            INTEGRATOR_SOURCE,
            CompileOptions {
                ftz: Some(false),
                prec_div: Some(true),
                prec_sqrt: Some(true),
                fmad: Some(false),
                ..Default::default()
            },
        )
        .map_err(|e| TmError::resource("compiling integrator kernels", e.to_string()))?;

        let module = ctx
            .load_module(ptx)
            .map_err(resource("loading integrator module"))?;
        let load = |stage: Stage| {
            let name = stage.symbol::<T>();
            module
                .load_function(&name)
                .map_err(|e| TmError::resource(format!("loading {name}"), e.to_string()))
        };

        Ok(Self {
            hvp: load(Stage::HessianVector)?,
            window: load(Stage::WindowReduce)?,
            langevin: load(Stage::Langevin)?,
        })
    }
}

/// Device copies of host-resident step inputs.
struct Staging<T: GpuReal> {
    grad: CudaSlice<T>,
    hessian: CudaSlice<T>,
    mixed: CudaSlice<T>,
}

/// Device-resident integrator over scalar type `T`.
pub struct CudaIntegrator<T: GpuReal> {
    ctx: Arc<CudaContext>,
    stream: Arc<CudaStream>,
    kernels: Kernels,
    dims: Dimensions,
    dt: T,
    a: T,

    d_x: CudaSlice<T>,
    d_v: CudaSlice<T>,
    d_dxdp: CudaSlice<T>,
    /// Slot-major: `window[slot * lanes + lane]`
    d_window: CudaSlice<T>,
    d_converged: CudaSlice<T>,
    d_noise: CudaSlice<T>,
    d_b: CudaSlice<T>,
    d_c: CudaSlice<T>,
    d_fault: CudaSlice<i32>,

    staging: Option<Staging<T>>,

    h_noise: Vec<T>,
    rng: RandomSource<T>,
    step: u64,
    lifecycle: Lifecycle,
}

impl<T: GpuReal> CudaIntegrator<T> {
    /// Builds an instance on device `ordinal`.
    pub fn new(config: &IntegratorConfig, ordinal: usize) -> TmResult<Self> {
        config.validate()?;
        let ctx = CudaContext::new(ordinal).map_err(resource("opening CUDA device"))?;
        Self::with_context(ctx, config)
    }

    /// Builds an instance on an existing context.
    pub fn with_context(ctx: Arc<CudaContext>, config: &IntegratorConfig) -> TmResult<Self> {
        config.validate()?;
        let dims = config.dimensions();
        as_i32("window length", dims.window_len())?;
        as_i32("hessian length", dims.hessian_len())?;

        let stream = ctx.default_stream();
        let kernels = Kernels::load::<T>(&ctx)?;

        let alloc = |what: &'static str, len: usize| {
            stream.alloc_zeros::<T>(len).map_err(resource(what))
        };
        let d_x = alloc("allocating positions", dims.coords())?;
        let d_v = alloc("allocating velocities", dims.coords())?;
        let d_dxdp = alloc("allocating dxdp", dims.dxdp_len())?;
        let d_window = alloc("allocating window", dims.window_len())?;
        let d_converged = alloc("allocating converged", dims.dxdp_len())?;
        let d_noise = alloc("allocating noise", dims.coords())?;
        let staging = Staging {
            grad: alloc("allocating gradient staging", dims.coords())?,
            hessian: alloc("allocating hessian staging", dims.hessian_len())?,
            mixed: alloc("allocating mixed-partial staging", dims.dxdp_len())?,
        };

        let b: Vec<T> = cast_slice(&config.b);
        let c: Vec<T> = cast_slice(&config.c);
        let d_b = stream.clone_htod(&b).map_err(resource("uploading b"))?;
        let d_c = stream.clone_htod(&c).map_err(resource("uploading c"))?;
        let d_fault = stream
            .alloc_zeros::<i32>(1)
            .map_err(resource("allocating fault flag"))?;

        let rng = if config.disable_noise {
            RandomSource::disabled(config.seed)
        } else {
            RandomSource::new(config.seed)
        };

        log::info!(
            "🚀 CudaIntegrator<{}> on device {}: N={} P={} W={} dt={} a={}",
            T::NAME,
            ctx.ordinal(),
            dims.entities,
            dims.parameters,
            dims.window,
            config.dt,
            config.a
        );

        Ok(Self {
            ctx,
            stream,
            kernels,
            dims,
            dt: T::cast(config.dt),
            a: T::cast(config.a),
            d_x,
            d_v,
            d_dxdp,
            d_window,
            d_converged,
            d_noise,
            d_b,
            d_c,
            d_fault,
            staging: Some(staging),
            h_noise: vec![T::zero(); dims.coords()],
            rng,
            step: 0,
            lifecycle: Lifecycle::Uninitialized,
        })
    }

    pub fn context(&self) -> &Arc<CudaContext> {
        &self.ctx
    }

    pub fn stream(&self) -> &Arc<CudaStream> {
        &self.stream
    }

    /// Device positions, for collaborators that evaluate forces on the device.
    pub fn device_positions(&self) -> &CudaSlice<T> {
        &self.d_x
    }

    /// Restarts the noise stream.
    pub fn reseed(&mut self, seed: u64) {
        self.rng.reseed(seed);
    }

    /// Advances one step from device-resident inputs.
    ///
    /// `mixed_partials` is the Hessian-vector accumulator and holds `Dx` afterwards.
    pub fn step_device(
        &mut self,
        grad: &CudaSlice<T>,
        hessian: &CudaSlice<T>,
        mixed_partials: &mut CudaSlice<T>,
    ) -> TmResult<()> {
        check_len("gradient", self.dims.coords(), grad.len())?;
        check_len("hessian", self.dims.hessian_len(), hessian.len())?;
        check_len("mixed partials", self.dims.dxdp_len(), mixed_partials.len())?;
        if self.lifecycle == Lifecycle::Uninitialized {
            return Err(TmError::not_ready("positions must be set before stepping"));
        }
        self.run_stages(grad, hessian, mixed_partials)
    }

    fn run_stages(
        &mut self,
        grad: &CudaSlice<T>,
        hessian: &CudaSlice<T>,
        mixed: &mut CudaSlice<T>,
    ) -> TmResult<()> {
        let n3 = as_i32("coords", self.dims.coords())?;
        let p = as_i32("parameters", self.dims.parameters)?;
        let lanes = self.dims.dxdp_len();
        let lanes_i32 = as_i32("dxdp lanes", lanes)?;
        let w = as_i32("window", self.dims.window)?;
        let entities = as_i32("entities", self.dims.entities)?;
        let slot = (self.step % self.dims.window as u64) as i32;

        if lanes > 0 {
            self.stream
                .memcpy_htod(&[0i32][..], &mut self.d_fault)
                .map_err(compute("hessian-vector product"))?;
            unsafe {
                let mut builder = self.stream.launch_builder(&self.kernels.hvp);
                builder.arg(&n3);
                builder.arg(&p);
                builder.arg(hessian);
                builder.arg(&self.d_dxdp);
                builder.arg(&mut *mixed);
                builder.arg(&mut self.d_fault);
                builder
                    .launch(launch_config(lanes))
                    .map_err(compute("hessian-vector product"))?;
            }

            unsafe {
                let mut builder = self.stream.launch_builder(&self.kernels.window);
                builder.arg(&lanes_i32);
                builder.arg(&w);
                builder.arg(&entities);
                builder.arg(&slot);
                builder.arg(&self.a);
                builder.arg(&self.dt);
                builder.arg(&self.d_b);
                builder.arg(&*mixed);
                builder.arg(&mut self.d_window);
                builder.arg(&mut self.d_converged);
                builder.arg(&mut self.d_dxdp);
                builder
                    .launch(launch_config(lanes))
                    .map_err(compute("window reduction"))?;
            }
        }

        self.rng.fill(&mut self.h_noise);
        self.stream
            .memcpy_htod(&self.h_noise, &mut self.d_noise)
            .map_err(compute("noise upload"))?;

        unsafe {
            let mut builder = self.stream.launch_builder(&self.kernels.langevin);
            builder.arg(&n3);
            builder.arg(&self.a);
            builder.arg(&self.dt);
            builder.arg(&self.d_b);
            builder.arg(&self.d_c);
            builder.arg(grad);
            builder.arg(&self.d_noise);
            builder.arg(&mut self.d_x);
            builder.arg(&mut self.d_v);
            builder
                .launch(launch_config(self.dims.coords()))
                .map_err(compute("velocity update"))?;
        }

        self.stream.synchronize().map_err(compute("step synchronize"))?;

        if lanes > 0 {
            let fault = self
                .stream
                .clone_dtoh(&self.d_fault)
                .map_err(compute("hessian-vector product"))?;
            if fault.first().copied().unwrap_or(0) != 0 {
                return Err(TmError::compute(
                    "hessian-vector product",
                    "non-finite contribution (check Hessian and mixed partials)",
                ));
            }
        }

        self.step += 1;
        self.lifecycle = Lifecycle::Stepping;
        log::trace!("device step {} complete", self.step);
        Ok(())
    }

    fn step_staged(
        &mut self,
        staging: &mut Staging<T>,
        grad: &[T],
        hessian: &[T],
        mixed_partials: &mut [T],
    ) -> TmResult<()> {
        self.stream
            .memcpy_htod(grad, &mut staging.grad)
            .map_err(resource("uploading gradient"))?;
        self.stream
            .memcpy_htod(hessian, &mut staging.hessian)
            .map_err(resource("uploading hessian"))?;
        self.stream
            .memcpy_htod(&*mixed_partials, &mut staging.mixed)
            .map_err(resource("uploading mixed partials"))?;
        self.run_stages(&staging.grad, &staging.hessian, &mut staging.mixed)?;
        self.stream
            .memcpy_dtoh(&staging.mixed, mixed_partials)
            .map_err(compute("downloading window contribution"))
    }

    fn download(&self, what: &'static str, src: &CudaSlice<T>) -> TmResult<Vec<T>> {
        self.stream.clone_dtoh(src).map_err(resource(what))
    }
}

impl<T: GpuReal> Stepper<T> for CudaIntegrator<T> {
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
        check_len("positions", self.dims.coords(), x.len())?;
        self.stream
            .memcpy_htod(x, &mut self.d_x)
            .map_err(resource("uploading positions"))?;
        if self.lifecycle == Lifecycle::Uninitialized {
            self.lifecycle = Lifecycle::Ready;
        }
        Ok(())
    }

    fn positions(&self) -> TmResult<Vec<T>> {
        self.download("downloading positions", &self.d_x)
    }

    fn set_velocities(&mut self, v: &[T]) -> TmResult<()> {
        check_len("velocities", self.dims.coords(), v.len())?;
        self.stream
            .memcpy_htod(v, &mut self.d_v)
            .map_err(resource("uploading velocities"))
    }

    fn velocities(&self) -> TmResult<Vec<T>> {
        self.download("downloading velocities", &self.d_v)
    }

    fn dxdp(&self) -> TmResult<Vec<T>> {
        self.download("downloading dxdp", &self.d_dxdp)
    }

    fn noise(&self) -> TmResult<Vec<T>> {
        Ok(self.h_noise.clone())
    }

    /// Uploads the inputs into staging buffers, steps, and copies `Dx` back into
    /// `mixed_partials`.
    fn step_host(&mut self, grad: &[T], hessian: &[T], mixed_partials: &mut [T]) -> TmResult<()> {
        check_len("gradient", self.dims.coords(), grad.len())?;
        check_len("hessian", self.dims.hessian_len(), hessian.len())?;
        check_len("mixed partials", self.dims.dxdp_len(), mixed_partials.len())?;
        if self.lifecycle == Lifecycle::Uninitialized {
            return Err(TmError::not_ready("positions must be set before stepping"));
        }

        let mut staging = self
            .staging
            .take()
            .ok_or_else(|| TmError::resource("staging buffers", "already in use"))?;
        let result = self.step_staged(&mut staging, grad, hessian, mixed_partials);
        self.staging = Some(staging);
        result
    }
}
