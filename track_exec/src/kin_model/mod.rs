//! # Kinematic model module
//!
//! Unicycle-type motion model of the robot and its linearisation.
//!
//! The state of the robot is `[x, y, theta, v]`, position in the world frame, heading from the
//! world X axis and linear speed along the heading. The control is `[omega, a]`, angular rate and
//! linear acceleration. The continuous model is
//!
//! ```text
//! x'     = v cos(theta)
//! y'     = v sin(theta)
//! theta' = omega
//! v'     = a
//! ```
//!
//! which is discretised with a forward Euler step of length `dt`.
//!
//! ## Operating envelope
//!
//! The model is valid for finite inputs with `|v| <= 10 m/s`, `|omega| <= 10 rad/s` and
//! `0 < dt <= 1 s`. Within this envelope every output is finite. Heading outputs are always
//! wrapped into (-pi, pi].

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::{DMatrix, DVector, Matrix4, Matrix4x2, Vector2, Vector4};
use serde::{Deserialize, Serialize};

// Internal
use util::maths::wrap_angle;

// ---------------------------------------------------------------------------
// TYPES
// ---------------------------------------------------------------------------

/// Robot state, `[x, y, theta, v]`.
pub type State = Vector4<f64>;

/// Robot control, `[omega, a]`.
pub type Control = Vector2<f64>;

/// Jacobian of the discrete motion model with respect to the state (A).
pub type StateJacobian = Matrix4<f64>;

/// Jacobian of the discrete motion model with respect to the control (B).
pub type ControlJacobian = Matrix4x2<f64>;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Number of elements in the state.
pub const NUM_STATES: usize = 4;

/// Number of elements in the control.
pub const NUM_CONTROLS: usize = 2;

pub const IDX_X: usize = 0;
pub const IDX_Y: usize = 1;
pub const IDX_THETA: usize = 2;
pub const IDX_V: usize = 3;

pub const IDX_OMEGA: usize = 0;
pub const IDX_A: usize = 1;

/// Maximum speed magnitude of the documented operating envelope.
///
/// Units: meters/second
pub const ENVELOPE_MAX_SPEED_MS: f64 = 10.0;

/// Maximum angular rate magnitude of the documented operating envelope.
///
/// Units: radians/second
pub const ENVELOPE_MAX_RATE_RADS: f64 = 10.0;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// The subset of the state observed by a measurement source.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum MeasModel {
    /// Position and heading, `[x, y, theta]`, as given by motion capture.
    Pose,

    /// The full state, `[x, y, theta, v]`.
    Full,
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Propagate the state forward by `dt` seconds under the given control.
pub fn step(state: &State, control: &Control, dt: f64) -> State {
    let theta = state[IDX_THETA];
    let v = state[IDX_V];

    State::new(
        state[IDX_X] + v * theta.cos() * dt,
        state[IDX_Y] + v * theta.sin() * dt,
        wrap_angle(theta + control[IDX_OMEGA] * dt),
        v + control[IDX_A] * dt,
    )
}

/// Linearise the discrete motion model about the given operating point.
///
/// Returns `(A, B)`, the partial derivatives of `step` with respect to the state and the control.
/// The model is affine in the control so B does not depend on the operating point, the control
/// argument is kept so that the signature matches the linearisation point.
pub fn jacobians(state: &State, _control: &Control, dt: f64) -> (StateJacobian, ControlJacobian) {
    let (sin_t, cos_t) = state[IDX_THETA].sin_cos();
    let v = state[IDX_V];

    let a = StateJacobian::new(
        1.0, 0.0, -v * sin_t * dt, cos_t * dt,
        0.0, 1.0, v * cos_t * dt, sin_t * dt,
        0.0, 0.0, 1.0, 0.0,
        0.0, 0.0, 0.0, 1.0,
    );

    let b = ControlJacobian::new(
        0.0, 0.0,
        0.0, 0.0,
        dt, 0.0,
        0.0, dt,
    );

    (a, b)
}

/// Returns true if the operating point lies in the documented envelope of the model.
pub fn in_envelope(state: &State, control: &Control, dt: f64) -> bool {
    state.iter().all(|s| s.is_finite())
        && control.iter().all(|c| c.is_finite())
        && state[IDX_V].abs() <= ENVELOPE_MAX_SPEED_MS
        && control[IDX_OMEGA].abs() <= ENVELOPE_MAX_RATE_RADS
        && dt > 0.0
        && dt <= 1.0
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl MeasModel {
    /// Number of observed components.
    pub fn dim(&self) -> usize {
        match self {
            MeasModel::Pose => 3,
            MeasModel::Full => NUM_STATES,
        }
    }

    /// The measurement matrix C, a fixed selection of the leading state components.
    pub fn matrix(&self) -> DMatrix<f64> {
        DMatrix::identity(self.dim(), NUM_STATES)
    }

    /// Row of the measurement holding the heading, which needs angular treatment.
    pub fn heading_row(&self) -> usize {
        IDX_THETA
    }

    /// Select the observed components from a full state.
    pub fn observe(&self, state: &State) -> DVector<f64> {
        DVector::from_iterator(self.dim(), state.iter().take(self.dim()).cloned())
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use util::maths::ang_diff;

    /// Difference between two states treating the heading as an angle.
    fn state_diff(a: &State, b: &State) -> State {
        let mut d = a - b;
        d[IDX_THETA] = ang_diff(a[IDX_THETA], b[IDX_THETA]);
        d
    }

    #[test]
    fn test_step() {
        let s = State::new(1.0, 2.0, std::f64::consts::FRAC_PI_2, 0.5);
        let u = Control::new(0.1, -0.5);

        let n = step(&s, &u, 0.2);
        assert!((n[IDX_X] - 1.0).abs() < 1e-12);
        assert!((n[IDX_Y] - 2.1).abs() < 1e-12);
        assert!((n[IDX_THETA] - (std::f64::consts::FRAC_PI_2 + 0.02)).abs() < 1e-12);
        assert!((n[IDX_V] - 0.4).abs() < 1e-12);

        // Heading is wrapped across the discontinuity
        let s = State::new(0.0, 0.0, 3.1, 0.0);
        let n = step(&s, &Control::new(1.0, 0.0), 0.2);
        assert!(n[IDX_THETA] < 0.0);
        assert!((n[IDX_THETA] - (3.3 - std::f64::consts::TAU)).abs() < 1e-12);
    }

    #[test]
    fn test_jacobians_finite_difference() {
        let h = 1e-6;
        let dt = 0.2;

        for &theta in &[-2.5, -1.0, 0.0, 0.4, 1.5, 2.8] {
            for &v in &[-1.0, 0.0, 0.5, 2.0] {
                for &(omega, acc) in &[(0.0, 0.0), (0.5, -0.3), (-1.2, 0.8)] {
                    let s = State::new(0.3, -0.7, theta, v);
                    let u = Control::new(omega, acc);
                    assert!(in_envelope(&s, &u, dt));

                    let (a, b) = jacobians(&s, &u, dt);

                    for j in 0..NUM_STATES {
                        let mut sp = s;
                        let mut sm = s;
                        sp[j] += h;
                        sm[j] -= h;
                        let col = state_diff(&step(&sp, &u, dt), &step(&sm, &u, dt)) / (2.0 * h);
                        for i in 0..NUM_STATES {
                            assert!(
                                (col[i] - a[(i, j)]).abs() < 1e-6,
                                "A[{}, {}] = {}, finite difference = {}", i, j, a[(i, j)], col[i]
                            );
                        }
                    }

                    for j in 0..NUM_CONTROLS {
                        let mut up = u;
                        let mut um = u;
                        up[j] += h;
                        um[j] -= h;
                        let col = state_diff(&step(&s, &up, dt), &step(&s, &um, dt)) / (2.0 * h);
                        for i in 0..NUM_STATES {
                            assert!(
                                (col[i] - b[(i, j)]).abs() < 1e-6,
                                "B[{}, {}] = {}, finite difference = {}", i, j, b[(i, j)], col[i]
                            );
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_meas_model() {
        let s = State::new(1.0, 2.0, 0.3, 0.4);

        let pose = MeasModel::Pose;
        assert_eq!(pose.dim(), 3);
        let c = pose.matrix();
        assert_eq!((c.nrows(), c.ncols()), (3, 4));
        assert_eq!(pose.observe(&s), DVector::from_row_slice(&[1.0, 2.0, 0.3]));
        assert_eq!(&c * DVector::from_column_slice(s.as_slice()), pose.observe(&s));

        let full = MeasModel::Full;
        assert_eq!(full.matrix(), DMatrix::identity(4, 4));
        assert_eq!(full.observe(&s), DVector::from_row_slice(&[1.0, 2.0, 0.3, 0.4]));
        assert_eq!(full.heading_row(), IDX_THETA);
    }
}
