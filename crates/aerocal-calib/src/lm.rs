//! Dense Levenberg–Marquardt with Marquardt diagonal scaling.

use log::debug;
use nalgebra::{DMatrix, DVector};

use crate::params::LmParams;

/// A nonlinear least-squares problem `min ½‖r(x)‖²`.
pub trait LeastSquaresProblem {
    fn num_params(&self) -> usize;

    fn residuals(&self, x: &DVector<f64>) -> DVector<f64>;

    /// Jacobian of [`LeastSquaresProblem::residuals`]; central differences by default.
    fn jacobian(&self, x: &DVector<f64>) -> DMatrix<f64> {
        numeric_jacobian(x, |x| self.residuals(x))
    }
}

/// Outcome of a refinement.
#[derive(Clone, Debug)]
pub struct LmReport {
    pub params: DVector<f64>,
    /// Final sum of squared residuals.
    pub cost: f64,
    pub iterations: usize,
    pub converged: bool,
}

pub(crate) fn step_size(v: f64) -> f64 {
    1e-6 * v.abs().max(1.0)
}

/// Central-difference Jacobian of `f` at `x`.
pub fn numeric_jacobian(
    x: &DVector<f64>,
    f: impl Fn(&DVector<f64>) -> DVector<f64>,
) -> DMatrix<f64> {
    let base = f(x);
    let mut jac = DMatrix::zeros(base.len(), x.len());
    let mut probe = x.clone();
    for c in 0..x.len() {
        let h = step_size(x[c]);
        probe[c] = x[c] + h;
        let plus = f(&probe);
        probe[c] = x[c] - h;
        let minus = f(&probe);
        probe[c] = x[c];
        jac.set_column(c, &((plus - minus) / (2.0 * h)));
    }
    jac
}

/// Minimize `problem` starting from `x0`.
pub fn levenberg_marquardt<P: LeastSquaresProblem>(
    problem: &P,
    x0: DVector<f64>,
    params: &LmParams,
) -> LmReport {
    debug_assert_eq!(x0.len(), problem.num_params());
    let mut x = x0;
    let mut r = problem.residuals(&x);
    let mut cost = r.norm_squared();
    let mut lambda = params.lambda_init;
    let mut converged = false;
    let mut iterations = 0;

    while iterations < params.max_iterations && !converged {
        iterations += 1;
        let jac = problem.jacobian(&x);
        let jtj = jac.transpose() * &jac;
        let g = jac.transpose() * &r;

        let mut accepted = false;
        while lambda < 1e12 {
            let mut a = jtj.clone();
            for d in 0..a.nrows() {
                a[(d, d)] += lambda * jtj[(d, d)].max(1e-12);
            }
            let Some(delta) = a.cholesky().map(|c| c.solve(&(-&g))) else {
                lambda *= params.lambda_mul;
                continue;
            };
            let candidate = &x + &delta;
            let r_new = problem.residuals(&candidate);
            let cost_new = r_new.norm_squared();
            if cost_new.is_finite() && cost_new < cost {
                let small_gain = cost - cost_new <= params.cost_tolerance * cost;
                let small_step = delta.norm() <= params.step_tolerance * x.norm().max(1.0);
                x = candidate;
                r = r_new;
                cost = cost_new;
                lambda = (lambda / params.lambda_mul).max(1e-15);
                converged = small_gain || small_step;
                accepted = true;
                break;
            }
            lambda *= params.lambda_mul;
        }
        if !accepted {
            // No descent direction left at any damping.
            converged = true;
        }
    }
    debug!("lm: {iterations} iterations, cost {cost:.3e}, converged {converged}");

    LmReport {
        params: x,
        cost,
        iterations,
        converged,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    /// Fit `y = a·exp(b·t)`.
    struct ExpFit {
        t: Vec<f64>,
        y: Vec<f64>,
    }

    impl LeastSquaresProblem for ExpFit {
        fn num_params(&self) -> usize {
            2
        }

        fn residuals(&self, x: &DVector<f64>) -> DVector<f64> {
            DVector::from_iterator(
                self.t.len(),
                self.t.iter().zip(&self.y).map(|(t, y)| x[0] * (x[1] * t).exp() - y),
            )
        }
    }

    #[test]
    fn fits_exponential() {
        let t: Vec<f64> = (0..20).map(|i| i as f64 * 0.1).collect();
        let y = t.iter().map(|t| 2.5 * (-1.3 * t).exp()).collect();
        let problem = ExpFit { t, y };
        let report = levenberg_marquardt(&problem, DVector::from_vec(vec![1.0, 0.0]), &LmParams::default());
        assert!(report.converged);
        assert_abs_diff_eq!(report.params[0], 2.5, epsilon = 1e-6);
        assert_abs_diff_eq!(report.params[1], -1.3, epsilon = 1e-6);
        assert!(report.cost < 1e-12);
    }

    #[test]
    fn numeric_jacobian_matches_analytic() {
        let x = DVector::from_vec(vec![0.3, -0.7]);
        let jac = numeric_jacobian(&x, |x| DVector::from_vec(vec![x[0] * x[1], x[0].sin()]));
        assert_abs_diff_eq!(jac[(0, 0)], -0.7, epsilon = 1e-8);
        assert_abs_diff_eq!(jac[(0, 1)], 0.3, epsilon = 1e-8);
        assert_abs_diff_eq!(jac[(1, 0)], 0.3f64.cos(), epsilon = 1e-8);
        assert_abs_diff_eq!(jac[(1, 1)], 0.0, epsilon = 1e-12);
    }
}
