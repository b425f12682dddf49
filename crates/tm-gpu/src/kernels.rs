//! Kernel source, symbol names and launch geometry.
//!
//! Available without the `cuda` feature so the naming and grid arithmetic can be
//! tested on machines without a toolkit.

use tm_core::Real;

/// CUDA C++ source of every integrator stage.
pub const INTEGRATOR_SOURCE: &str = include_str!("kernels/integrator.cu");

/// Threads per block for every stage.
pub const BLOCK_SIZE: u32 = 256;

/// One per-step device stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    HessianVector,
    WindowReduce,
    Langevin,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::HessianVector, Stage::WindowReduce, Stage::Langevin];

    fn base_name(self) -> &'static str {
        match self {
            Stage::HessianVector => "hvp_accumulate",
            Stage::WindowReduce => "window_reduce",
            Stage::Langevin => "langevin_step",
        }
    }

    /// Exported symbol for scalar type `T`, e.g. `window_reduce_f64`.
    pub fn symbol<T: Real>(self) -> String {
        format!("{}_{}", self.base_name(), T::NAME)
    }
}

/// Grid size covering `lanes` threads at [`BLOCK_SIZE`]; zero when there is no work.
pub fn grid_for(lanes: usize) -> u32 {
    lanes.div_ceil(BLOCK_SIZE as usize) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbols_exist_in_source() {
        for stage in Stage::ALL {
            let f32_name = stage.symbol::<f32>();
            let f64_name = stage.symbol::<f64>();
            assert!(f32_name.ends_with("_f32"));
            assert!(f64_name.ends_with("_f64"));
            let stem = format!("{}_##SUFFIX", stage.base_name());
            assert!(INTEGRATOR_SOURCE.contains(&stem), "missing {stem}");
        }
        assert!(INTEGRATOR_SOURCE.contains("INSTANTIATE(float, f32)"));
        assert!(INTEGRATOR_SOURCE.contains("INSTANTIATE(double, f64)"));
    }

    #[test]
    fn test_grid_for() {
        assert_eq!(grid_for(0), 0);
        assert_eq!(grid_for(1), 1);
        assert_eq!(grid_for(256), 1);
        assert_eq!(grid_for(257), 2);
    }
}
