//! Parameters structure for TrajTracker

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::{DMatrix, DVector, Matrix2, Matrix4, Vector2, Vector4};
use serde::Deserialize;

// Internal
use super::TrajCtrlError;
use crate::kin_model::MeasModel;
use crate::lqr::{DEFAULT_MAX_ITERS, DEFAULT_TOLERANCE};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for trajectory tracking.
#[derive(Debug, Clone, Deserialize)]
pub struct Params {
    /// Control period, trajectories must be sampled at this period.
    ///
    /// Units: seconds
    pub dt_s: f64,

    /// Number of reference points tracked before handing off to the next trajectory or braking.
    pub seg_len: usize,

    /// Number of steps in the synthesised braking tail, used for trajectories which carry no
    /// points beyond `seg_len`.
    pub braking_tail_steps: usize,

    /// Re-seed the estimate from the first point of a trajectory taken over from the queue.
    pub reseed_on_handoff: bool,

    /// Diagonal of the LQR state cost, `[x, y, theta, v]`.
    pub q_lqr_diag: [f64; 4],

    /// Diagonal of the LQR control cost, `[omega, a]`.
    pub r_lqr_diag: [f64; 2],

    /// Maximum number of Riccati iterations per gain computation.
    pub lqr_max_iters: usize,

    /// Relative convergence tolerance of the Riccati iteration.
    pub lqr_tolerance: f64,

    /// Diagonal of the covariance the estimate is seeded with.
    pub p0_diag: [f64; 4],

    /// Diagonal of the EKF process noise covariance.
    pub q_ekf_diag: [f64; 4],

    /// Diagonal of the EKF measurement noise covariance, one element per measured component.
    pub r_ekf_diag: Vec<f64>,

    /// The components of the state which are measured.
    pub meas_model: MeasModel,

    /// Number of stop commands sent when braking completes.
    pub num_stop_cmds: usize,

    /// Interval between consecutive stop commands.
    ///
    /// Units: seconds
    pub stop_cmd_interval_s: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for Params {
    fn default() -> Self {
        Self {
            dt_s: 0.2,
            seg_len: 10,
            braking_tail_steps: 5,
            reseed_on_handoff: true,
            q_lqr_diag: [5.0, 5.0, 10.0, 100.0],
            r_lqr_diag: [100.0, 100.0],
            lqr_max_iters: DEFAULT_MAX_ITERS,
            lqr_tolerance: DEFAULT_TOLERANCE,
            p0_diag: [0.01, 0.01, 0.001, 0.0],
            q_ekf_diag: [1e-4, 1e-4, 5e-4, 1e-4],
            r_ekf_diag: vec![0.1, 0.1, 0.001],
            meas_model: MeasModel::Pose,
            num_stop_cmds: 5,
            stop_cmd_interval_s: 0.1,
        }
    }
}

impl Params {
    /// Check the parameters are consistent.
    pub fn validate(&self) -> Result<(), TrajCtrlError> {
        let invalid = |msg: String| Err(TrajCtrlError::InvalidParams(msg));

        if !(self.dt_s > 0.0 && self.dt_s <= 1.0) {
            return invalid(format!("dt_s must be in (0, 1], found {}", self.dt_s));
        }
        if self.seg_len == 0 {
            return invalid("seg_len must be at least 1".into());
        }
        if self.r_ekf_diag.len() != self.meas_model.dim() {
            return invalid(format!(
                "r_ekf_diag has {} elements but the {:?} measurement model needs {}",
                self.r_ekf_diag.len(),
                self.meas_model,
                self.meas_model.dim()
            ));
        }
        if self.r_lqr_diag.iter().any(|r| !(*r > 0.0)) {
            return invalid("r_lqr_diag must be strictly positive".into());
        }

        let non_neg = self
            .q_lqr_diag
            .iter()
            .chain(self.p0_diag.iter())
            .chain(self.q_ekf_diag.iter())
            .chain(self.r_ekf_diag.iter())
            .all(|v| *v >= 0.0);
        if !non_neg {
            return invalid("Cost and covariance diagonals must be non-negative".into());
        }

        if self.lqr_max_iters == 0 || !(self.lqr_tolerance > 0.0) {
            return invalid("LQR iteration bound and tolerance must be positive".into());
        }
        if !(self.stop_cmd_interval_s >= 0.0) {
            return invalid("stop_cmd_interval_s must be non-negative".into());
        }

        Ok(())
    }

    pub fn q_lqr(&self) -> Matrix4<f64> {
        Matrix4::from_diagonal(&Vector4::from_column_slice(&self.q_lqr_diag))
    }

    pub fn r_lqr(&self) -> Matrix2<f64> {
        Matrix2::from_diagonal(&Vector2::from_column_slice(&self.r_lqr_diag))
    }

    pub fn p0(&self) -> Matrix4<f64> {
        Matrix4::from_diagonal(&Vector4::from_column_slice(&self.p0_diag))
    }

    pub fn q_ekf(&self) -> Matrix4<f64> {
        Matrix4::from_diagonal(&Vector4::from_column_slice(&self.q_ekf_diag))
    }

    pub fn r_ekf(&self) -> DMatrix<f64> {
        DMatrix::from_diagonal(&DVector::from_column_slice(&self.r_ekf_diag))
    }
}
