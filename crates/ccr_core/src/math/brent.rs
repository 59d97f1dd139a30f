//! Brent's method root finding.
//!
//! Used by the projective (semi-analytic) PFE inversion, where the target
//! tail probability is a monotone function of the exposure level.

use crate::types::SolverError;

/// Configuration for iterative solvers.
#[derive(Clone, Copy, Debug)]
pub struct SolverConfig {
    /// Absolute convergence tolerance on the root.
    pub tolerance: f64,
    /// Maximum number of iterations before giving up.
    pub max_iterations: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-12,
            max_iterations: 100,
        }
    }
}

/// Brent's method root finder.
///
/// Combines bisection, the secant method, and inverse quadratic
/// interpolation. Converges for any continuous function given a valid
/// bracket, without derivatives.
///
/// # Examples
///
/// ```
/// use ccr_core::math::{BrentSolver, SolverConfig};
///
/// let solver = BrentSolver::new(SolverConfig::default());
/// let root = solver.find_root(|x| x * x - 2.0, 0.0, 2.0).unwrap();
/// assert!((root - std::f64::consts::SQRT_2).abs() < 1e-10);
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct BrentSolver {
    config: SolverConfig,
}

impl BrentSolver {
    /// Creates a solver with the given configuration.
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }

    /// Returns the solver configuration.
    #[inline]
    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Finds a root of `f` in the bracket `[x1, x2]`.
    ///
    /// # Errors
    ///
    /// [`SolverError::NoBracket`] when `f(x1)` and `f(x2)` share a sign,
    /// [`SolverError::MaxIterationsExceeded`] when the iteration budget runs
    /// out before convergence.
    pub fn find_root<F>(&self, f: F, x1: f64, x2: f64) -> Result<f64, SolverError>
    where
        F: Fn(f64) -> f64,
    {
        let mut a = x1;
        let mut b = x2;
        let mut fa = f(a);
        let mut fb = f(b);

        if fa == 0.0 {
            return Ok(a);
        }
        if fb == 0.0 {
            return Ok(b);
        }
        if fa.signum() == fb.signum() {
            return Err(SolverError::NoBracket { a: x1, b: x2 });
        }

        let mut c = b;
        let mut fc = fb;
        let mut d = b - a;
        let mut e = d;

        for _ in 0..self.config.max_iterations {
            if fb.signum() == fc.signum() {
                // Root is bracketed by [a, b]; reset the contrapoint.
                c = a;
                fc = fa;
                d = b - a;
                e = d;
            }
            if fc.abs() < fb.abs() {
                a = b;
                b = c;
                c = a;
                fa = fb;
                fb = fc;
                fc = fa;
            }

            let tol1 = 2.0 * f64::EPSILON * b.abs() + 0.5 * self.config.tolerance;
            let xm = 0.5 * (c - b);
            if xm.abs() <= tol1 || fb == 0.0 {
                return Ok(b);
            }

            if e.abs() >= tol1 && fa.abs() > fb.abs() {
                // Try secant / inverse quadratic interpolation.
                let s = fb / fa;
                let (mut p, mut q);
                if a == c {
                    p = 2.0 * xm * s;
                    q = 1.0 - s;
                } else {
                    let qq = fa / fc;
                    let r = fb / fc;
                    p = s * (2.0 * xm * qq * (qq - r) - (b - a) * (r - 1.0));
                    q = (qq - 1.0) * (r - 1.0) * (s - 1.0);
                }
                if p > 0.0 {
                    q = -q;
                }
                p = p.abs();
                let min1 = 3.0 * xm * q - (tol1 * q).abs();
                let min2 = (e * q).abs();
                if 2.0 * p < min1.min(min2) {
                    e = d;
                    d = p / q;
                } else {
                    d = xm;
                    e = d;
                }
            } else {
                d = xm;
                e = d;
            }

            a = b;
            fa = fb;
            if d.abs() > tol1 {
                b += d;
            } else {
                b += tol1.copysign(xm);
            }
            fb = f(b);
        }

        Err(SolverError::MaxIterationsExceeded {
            iterations: self.config.max_iterations,
        })
    }
}

/// Expands a trial bracket `[lo, hi]` by doubling its width until the
/// function changes sign, up to `max_doublings` attempts.
///
/// Returns `None` when no sign change is found within the budget; callers
/// treat that as "quantile not attainable" and fall back to zero.
pub fn expand_bracket<F>(f: &F, lo: f64, hi: f64, max_doublings: usize) -> Option<(f64, f64)>
where
    F: Fn(f64) -> f64,
{
    let flo = f(lo);
    if flo == 0.0 {
        return Some((lo, lo));
    }
    let mut width = hi - lo;
    if width <= 0.0 {
        return None;
    }
    for _ in 0..=max_doublings {
        let candidate = lo + width;
        if flo.signum() != f(candidate).signum() || f(candidate) == 0.0 {
            return Some((lo, candidate));
        }
        width *= 2.0;
        if !width.is_finite() {
            return None;
        }
    }
    None
}
