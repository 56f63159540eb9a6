//! # Linear-Quadratic Regulator module
//!
//! Computes the state feedback gain `K` for the linearised discrete system
//! `dx[k+1] = A dx[k] + B du[k]` minimising `sum(dxᵀ Q dx + duᵀ R du)`.
//!
//! The steady-state cost-to-go matrix `P` is found by iterating the discrete algebraic Riccati
//! equation starting from `P = Q`:
//!
//! ```text
//! P' = Aᵀ P A - Aᵀ P B (R + Bᵀ P B)⁻¹ Bᵀ P A + Q
//! ```
//!
//! until the largest element-wise change falls below the tolerance. The iteration count is
//! bounded so the solve always completes within a known amount of work. If the pair `(A, B)` is
//! not stabilisable, for example at zero speed where the lateral position cannot be influenced,
//! the iteration does not converge and an error is returned for the caller to handle.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::trace;
use nalgebra::{Matrix2, Matrix2x4, Matrix4};

// Internal
use crate::kin_model::{ControlJacobian, StateJacobian};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Default bound on the number of Riccati iterations.
pub const DEFAULT_MAX_ITERS: usize = 2000;

/// Default relative convergence tolerance.
pub const DEFAULT_TOLERANCE: f64 = 1e-9;

// ---------------------------------------------------------------------------
// TYPES
// ---------------------------------------------------------------------------

/// Feedback gain matrix mapping a state error to a control correction.
pub type Gain = Matrix2x4<f64>;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// An LQR solver with fixed cost weights.
#[derive(Debug, Clone)]
pub struct LqrSolver {
    /// State cost weight
    q: Matrix4<f64>,

    /// Control cost weight
    r: Matrix2<f64>,

    /// Maximum number of Riccati iterations
    max_iters: usize,

    /// Relative convergence tolerance on the change in `P`
    tolerance: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors which can occur while solving for the gain.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum LqrError {
    #[error("R + BᵀPB is singular at iteration {0}")]
    Singular(usize),

    #[error("The Riccati iteration diverged at iteration {0}")]
    Diverged(usize),

    #[error("The Riccati iteration did not converge within {0} iterations (non-stabilisable?)")]
    NotConverged(usize),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl LqrSolver {
    /// Create a new solver.
    pub fn new(q: Matrix4<f64>, r: Matrix2<f64>, max_iters: usize, tolerance: f64) -> Self {
        Self {
            q,
            r,
            max_iters,
            tolerance,
        }
    }

    /// Solve for the gain of the given linearisation.
    pub fn solve(&self, a: &StateJacobian, b: &ControlJacobian) -> Result<Gain, LqrError> {
        solve(a, b, &self.q, &self.r, self.max_iters, self.tolerance)
    }
}

impl Default for LqrSolver {
    fn default() -> Self {
        Self::new(
            Matrix4::identity(),
            Matrix2::identity(),
            DEFAULT_MAX_ITERS,
            DEFAULT_TOLERANCE,
        )
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Solve the steady-state discrete LQR problem for `(A, B, Q, R)`.
pub fn solve(
    a: &StateJacobian,
    b: &ControlJacobian,
    q: &Matrix4<f64>,
    r: &Matrix2<f64>,
    max_iters: usize,
    tolerance: f64,
) -> Result<Gain, LqrError> {
    let mut p = *q;

    for i in 0..max_iters {
        let gain = gain_from_cost(a, b, r, &p).ok_or(LqrError::Singular(i))?;

        let mut p_next = a.transpose() * p * a - a.transpose() * p * b * gain + q;
        p_next = (p_next + p_next.transpose()) * 0.5;

        if p_next.iter().any(|v| !v.is_finite()) {
            return Err(LqrError::Diverged(i));
        }

        let delta = (p_next - p).amax();
        p = p_next;

        if delta <= tolerance * p.amax().max(1.0) {
            trace!("Riccati iteration converged in {} iterations", i + 1);
            return gain_from_cost(a, b, r, &p).ok_or(LqrError::Singular(i));
        }
    }

    Err(LqrError::NotConverged(max_iters))
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// `K = (R + Bᵀ P B)⁻¹ Bᵀ P A`, or `None` if the inner matrix is singular.
fn gain_from_cost(
    a: &StateJacobian,
    b: &ControlJacobian,
    r: &Matrix2<f64>,
    p: &Matrix4<f64>,
) -> Option<Gain> {
    let bt_p = b.transpose() * p;
    let s = r + bt_p * b;

    s.try_inverse().map(|s_inv| s_inv * bt_p * a)
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
