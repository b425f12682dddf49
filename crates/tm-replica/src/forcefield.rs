//! Force evaluation seam and a reference harmonic well.

use serde::{Deserialize, Serialize};
use tm_core::{check_len, Real, TmError, TmResult, SPATIAL_DIMS};

/// Everything one evaluation hands to the integrator and the replica bookkeeping.
///
/// Layouts follow the integrator: `grad` and `du_dl_dx` are `[N][3]`, `hessian` is
/// `[3N][3N]`, `mixed_partials` is `[P][3N]`, `du_dl_dp` is `[P]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Derivatives<T> {
    pub energy: T,
    pub du_dl: T,
    pub grad: Vec<T>,
    pub hessian: Vec<T>,
    pub mixed_partials: Vec<T>,
    pub du_dl_dx: Vec<T>,
    pub du_dl_dp: Vec<T>,
}

/// A λ-dependent potential with its first and second derivatives.
pub trait ForceField<T: Real>: Send + Sync {
    fn entities(&self) -> usize;

    fn parameters(&self) -> usize;

    fn evaluate(&self, x: &[T], lambda: T) -> TmResult<Derivatives<T>>;
}

/// `U(x; k, λ) = λ · Σ_i ½ k_i |x_i − r_i|²`, one stiffness parameter per entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarmonicWell {
    /// Stiffness per entity
    pub k: Vec<f64>,
    /// Rest positions `[N][3]`
    pub centers: Vec<f64>,
}

impl HarmonicWell {
    pub fn new(k: Vec<f64>, centers: Vec<f64>) -> TmResult<Self> {
        let well = Self { k, centers };
        well.validate()?;
        Ok(well)
    }

    pub fn validate(&self) -> TmResult<()> {
        if self.k.is_empty() {
            return Err(TmError::config("harmonic well needs at least one entity"));
        }
        check_len("well centers", self.k.len() * SPATIAL_DIMS, self.centers.len())
    }
}

impl<T: Real> ForceField<T> for HarmonicWell {
    fn entities(&self) -> usize {
        self.k.len()
    }

    fn parameters(&self) -> usize {
        self.k.len()
    }

    fn evaluate(&self, x: &[T], lambda: T) -> TmResult<Derivatives<T>> {
        let n = self.k.len();
        let n3 = n * SPATIAL_DIMS;
        check_len("positions", n3, x.len())?;
        check_len("well centers", n3, self.centers.len())?;

        let half = T::cast(0.5);
        let mut du_dl = T::zero();
        let mut grad = vec![T::zero(); n3];
        let mut hessian = vec![T::zero(); n3 * n3];
        let mut mixed_partials = vec![T::zero(); n * n3];
        let mut du_dl_dx = vec![T::zero(); n3];
        let mut du_dl_dp = vec![T::zero(); n];

        for (i, &k) in self.k.iter().enumerate() {
            let k = T::cast(k);
            let mut r2 = T::zero();
            for d in 0..SPATIAL_DIMS {
                let lane = i * SPATIAL_DIMS + d;
                let dx = x[lane] - T::cast(self.centers[lane]);
                r2 += dx * dx;
                grad[lane] = lambda * k * dx;
                hessian[lane * n3 + lane] = lambda * k;
                mixed_partials[i * n3 + lane] = lambda * dx;
                du_dl_dx[lane] = k * dx;
            }
            du_dl_dp[i] = half * r2;
            du_dl += half * k * r2;
        }

        Ok(Derivatives {
            energy: lambda * du_dl,
            du_dl,
            grad,
            hessian,
            mixed_partials,
            du_dl_dx,
            du_dl_dp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn well() -> HarmonicWell {
        HarmonicWell::new(vec![2.0, 4.0], vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0]).unwrap()
    }

    #[test]
    fn test_energy_and_gradient() {
        let x = [1.0f64, 0.0, 0.0, 1.0, 1.0, 2.0];
        let d = ForceField::<f64>::evaluate(&well(), &x, 0.5).unwrap();
        // ½·2·1 + ½·4·1
        assert_relative_eq!(d.du_dl, 3.0);
        assert_relative_eq!(d.energy, 1.5);
        assert_eq!(d.grad, vec![1.0, 0.0, 0.0, 0.0, 0.0, 2.0]);
        assert_eq!(d.du_dl_dp, vec![0.5, 0.5]);
    }

    #[test]
    fn test_gradient_matches_finite_difference() {
        let x = [0.3f64, -0.2, 0.1, 1.4, 0.9, 1.2];
        let lambda = 0.7;
        let d = ForceField::<f64>::evaluate(&well(), &x, lambda).unwrap();
        let h = 1e-6;
        for lane in 0..6 {
            let mut xp = x;
            let mut xm = x;
            xp[lane] += h;
            xm[lane] -= h;
            let ep = ForceField::<f64>::evaluate(&well(), &xp, lambda).unwrap().energy;
            let em = ForceField::<f64>::evaluate(&well(), &xm, lambda).unwrap().energy;
            assert_relative_eq!(d.grad[lane], (ep - em) / (2.0 * h), epsilon = 1e-6);
        }
    }

    #[test]
    fn test_mixed_partials_block_layout() {
        let x = [1.0f64, 2.0, 3.0, 1.0, 1.0, 1.0];
        let d = ForceField::<f64>::evaluate(&well(), &x, 1.0).unwrap();
        // parameter 0 touches only entity 0
        assert_eq!(&d.mixed_partials[..6], &[1.0, 2.0, 3.0, 0.0, 0.0, 0.0]);
        assert!(d.mixed_partials[6..].iter().all(|&m| m == 0.0));
        assert_eq!(d.hessian[0], 2.0);
        assert_eq!(d.hessian[4 * 6 + 4], 4.0);
    }

    #[test]
    fn test_center_length_checked() {
        assert!(HarmonicWell::new(vec![1.0], vec![0.0; 2]).is_err());
    }
}
