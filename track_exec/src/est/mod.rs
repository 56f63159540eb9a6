//! # State estimation module
//!
//! Extended Kalman Filter estimating the robot state from position (and optionally speed)
//! measurements.
//!
//! The filter is driven externally, once per cycle: a correction with the most recent measurement
//! followed by a prediction with the control that was actually applied. Both steps are exposed as
//! pure functions (`predict` and `correct`) and wrapped by `Ekf`, which owns the estimate and
//! keeps the covariance symmetric and positive semi-definite after every update.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::warn;
use nalgebra::{DMatrix, DVector, Matrix4};
use serde::Serialize;

// Internal
use crate::kin_model::{self, Control, MeasModel, State, StateJacobian, IDX_THETA, NUM_STATES};
use util::maths::{ang_diff, wrap_angle};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Most negative eigenvalue of the covariance tolerated before it is repaired.
const PSD_TOLERANCE: f64 = 1e-9;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Extended Kalman Filter holding the state estimate and its covariance.
#[derive(Debug, Clone)]
pub struct Ekf {
    /// Current state estimate
    x_hat: State,

    /// Current estimate covariance
    p: Matrix4<f64>,

    /// Covariance used on seeding and when the covariance has to be reset
    p0: Matrix4<f64>,

    /// Process noise covariance
    q_process: Matrix4<f64>,

    /// Measurement noise covariance, sized to match `meas_model`
    r_meas: DMatrix<f64>,

    /// The measurement model in use
    meas_model: MeasModel,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors which can occur during estimation.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum EstError {
    #[error("The innovation covariance C P Cᵀ + R is singular")]
    SingularInnovation,

    #[error("Measurement dimension mismatch, expected {expected} found {found}")]
    DimensionMismatch { expected: usize, found: usize },
}

/// The outcome of the covariance health check performed after each update.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum CovHealth {
    /// The covariance was symmetric positive semi-definite (after symmetrisation)
    Ok,

    /// Negative eigenvalues were clamped to zero
    Clamped,

    /// The covariance contained non-finite values and was reset to the initial covariance
    Reset,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Ekf {
    /// Create a new filter.
    ///
    /// The estimate starts at zero with covariance `p0`, it is expected to be seeded before use.
    pub fn new(
        p0: Matrix4<f64>,
        q_process: Matrix4<f64>,
        meas_model: MeasModel,
        r_meas: DMatrix<f64>,
    ) -> Result<Self, EstError> {
        if r_meas.nrows() != meas_model.dim() || r_meas.ncols() != meas_model.dim() {
            return Err(EstError::DimensionMismatch {
                expected: meas_model.dim(),
                found: r_meas.nrows(),
            });
        }

        Ok(Self {
            x_hat: State::zeros(),
            p: p0,
            p0,
            q_process,
            r_meas,
            meas_model,
        })
    }

    /// Re-initialise the estimate at the given state, resetting the covariance.
    pub fn seed(&mut self, state: &State) {
        self.x_hat = *state;
        self.x_hat[IDX_THETA] = wrap_angle(self.x_hat[IDX_THETA]);
        self.p = self.p0;
    }

    /// The current state estimate.
    pub fn estimate(&self) -> &State {
        &self.x_hat
    }

    /// The current estimate covariance.
    pub fn covariance(&self) -> &Matrix4<f64> {
        &self.p
    }

    /// The measurement model of the filter.
    pub fn meas_model(&self) -> MeasModel {
        self.meas_model
    }

    /// Propagate the estimate with the applied control and the linearisation `a`.
    pub fn predict(&mut self, u_applied: &Control, a: &StateJacobian, dt: f64) -> CovHealth {
        let (x_hat, p) = predict(&self.x_hat, &self.p, u_applied, a, &self.q_process, dt);

        self.x_hat = x_hat;
        self.update_covariance(p)
    }

    /// Correct the estimate with a measurement of the full state.
    ///
    /// Only the components observed by the measurement model are used. On error the estimate and
    /// covariance are left untouched.
    pub fn correct(&mut self, meas: &State) -> Result<CovHealth, EstError> {
        let z = self.meas_model.observe(meas);
        let c = self.meas_model.matrix();

        let (x_hat, p) = correct(
            &self.x_hat,
            &self.p,
            &z,
            &c,
            &self.r_meas,
            Some(self.meas_model.heading_row()),
        )?;

        self.x_hat = x_hat;
        Ok(self.update_covariance(p))
    }

    /// Store a new covariance after repairing it if needed.
    fn update_covariance(&mut self, p: Matrix4<f64>) -> CovHealth {
        let (p, health) = repair_covariance(p, &self.p0);

        match health {
            CovHealth::Ok => (),
            CovHealth::Clamped => warn!("Estimate covariance was not PSD, eigenvalues clamped"),
            CovHealth::Reset => warn!("Estimate covariance was not finite, reset to initial"),
        }

        self.p = p;
        health
    }
}

impl Default for Ekf {
    fn default() -> Self {
        let meas_model = MeasModel::Pose;

        Self {
            x_hat: State::zeros(),
            p: Matrix4::identity(),
            p0: Matrix4::identity(),
            q_process: Matrix4::identity(),
            r_meas: DMatrix::identity(meas_model.dim(), meas_model.dim()),
            meas_model,
        }
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// EKF prediction step.
///
/// The estimate is propagated through the nonlinear model with the applied control, and the
/// covariance with `A P Aᵀ + Q`.
pub fn predict(
    x_hat: &State,
    p: &Matrix4<f64>,
    u_applied: &Control,
    a: &StateJacobian,
    q_process: &Matrix4<f64>,
    dt: f64,
) -> (State, Matrix4<f64>) {
    (
        kin_model::step(x_hat, u_applied, dt),
        a * p * a.transpose() + q_process,
    )
}

/// EKF correction step (linear Kalman update with measurement matrix `c`).
///
/// If `heading_row` is given the innovation for that row is computed as a wrapped angular
/// difference.
pub fn correct(
    x_hat: &State,
    p: &Matrix4<f64>,
    z: &DVector<f64>,
    c: &DMatrix<f64>,
    r_meas: &DMatrix<f64>,
    heading_row: Option<usize>,
) -> Result<(State, Matrix4<f64>), EstError> {
    // Validate dimensions
    if c.ncols() != NUM_STATES {
        return Err(EstError::DimensionMismatch {
            expected: NUM_STATES,
            found: c.ncols(),
        });
    }
    if c.nrows() != z.len() || r_meas.nrows() != z.len() || r_meas.ncols() != z.len() {
        return Err(EstError::DimensionMismatch {
            expected: c.nrows(),
            found: z.len(),
        });
    }

    let x_d = DVector::from_column_slice(x_hat.as_slice());
    let p_d = DMatrix::from_column_slice(NUM_STATES, NUM_STATES, p.as_slice());

    // Innovation
    let z_pred = c * &x_d;
    let mut innov = z - &z_pred;
    if let Some(h) = heading_row {
        if h < innov.len() {
            innov[h] = ang_diff(z[h], z_pred[h]);
        }
    }

    // Innovation covariance and Kalman gain
    let s = c * &p_d * c.transpose() + r_meas;
    let s_inv = match s.try_inverse() {
        Some(i) if i.iter().all(|v| v.is_finite()) => i,
        _ => return Err(EstError::SingularInnovation),
    };
    let k = &p_d * c.transpose() * s_inv;

    // Update
    let x_new = x_d + &k * innov;
    let p_new = (DMatrix::<f64>::identity(NUM_STATES, NUM_STATES) - &k * c) * &p_d;

    let mut x_new = State::from_column_slice(x_new.as_slice());
    x_new[IDX_THETA] = wrap_angle(x_new[IDX_THETA]);

    Ok((x_new, Matrix4::from_column_slice(p_new.as_slice())))
}

/// Symmetrise the covariance and ensure it is positive semi-definite.
///
/// Non-finite covariances are replaced by `p0`.
pub fn repair_covariance(p: Matrix4<f64>, p0: &Matrix4<f64>) -> (Matrix4<f64>, CovHealth) {
    if p.iter().any(|v| !v.is_finite()) {
        return (*p0, CovHealth::Reset);
    }

    let p = (p + p.transpose()) * 0.5;

    let mut eigen = p.symmetric_eigen();
    let min_eigenvalue = eigen.eigenvalues.iter().cloned().fold(f64::INFINITY, f64::min);

    if min_eigenvalue >= -PSD_TOLERANCE {
        return (p, CovHealth::Ok);
    }

    eigen.eigenvalues = eigen.eigenvalues.map(|l| l.max(0.0));
    let clamped = eigen.recompose();

    (
        (clamped + clamped.transpose()) * 0.5,
        CovHealth::Clamped,
    )
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
