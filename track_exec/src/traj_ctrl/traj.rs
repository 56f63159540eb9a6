//! Validated reference trajectories

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::debug;

// Internal
use super::{Params, TrajCtrlError};
use crate::kin_model::{self, Control, State, IDX_V};
use comms_if::tc::traj::NominalTrajectory;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A reference trajectory accepted for tracking.
///
/// The first `seg_len` points are tracked, the remaining points form the braking tail which is
/// executed when no other trajectory is waiting. States and controls always have the same
/// length, at least `seg_len`.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    states: Vec<State>,
    controls: Vec<Control>,
    seg_len: usize,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Trajectory {
    /// Validate a set of reference points and build the trajectory, synthesising a braking tail
    /// if none is included.
    pub fn new(
        states: Vec<State>,
        controls: Vec<Control>,
        dt_s: f64,
        params: &Params,
    ) -> Result<Self, TrajCtrlError> {
        if states.len() != controls.len() {
            return Err(TrajCtrlError::LengthMismatch {
                states: states.len(),
                controls: controls.len(),
            });
        }
        if states.len() < params.seg_len {
            return Err(TrajCtrlError::TooShort {
                len: states.len(),
                seg_len: params.seg_len,
            });
        }
        if !((dt_s - params.dt_s).abs() <= 1e-6) {
            return Err(TrajCtrlError::DtMismatch {
                expected: params.dt_s,
                found: dt_s,
            });
        }
        if let Some(i) = states
            .iter()
            .zip(controls.iter())
            .position(|(s, u)| s.iter().chain(u.iter()).any(|v| !v.is_finite()))
        {
            return Err(TrajCtrlError::NonFinite(i));
        }

        let mut traj = Self {
            states,
            controls,
            seg_len: params.seg_len,
        };

        if traj.states.len() == traj.seg_len {
            traj.synthesise_tail(params.braking_tail_steps, params.dt_s);
        }

        Ok(traj)
    }

    /// Build a trajectory from a telecommand message.
    pub fn from_msg(msg: &NominalTrajectory, params: &Params) -> Result<Self, TrajCtrlError> {
        let states = msg
            .states
            .iter()
            .map(|s| State::new(s.x, s.y, s.theta, s.v))
            .collect();
        let controls = msg
            .controls
            .iter()
            .map(|c| Control::new(c.omega, c.a))
            .collect();

        Self::new(states, controls, msg.dt_s, params)
    }

    /// Total number of points, including the braking tail.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Number of points tracked before the braking tail.
    pub fn seg_len(&self) -> usize {
        self.seg_len
    }

    /// Number of points in the braking tail.
    pub fn tail_len(&self) -> usize {
        self.states.len() - self.seg_len
    }

    pub fn state(&self, index: usize) -> Option<&State> {
        self.states.get(index)
    }

    pub fn control(&self, index: usize) -> Option<&Control> {
        self.controls.get(index)
    }

    /// Append a constant deceleration to zero speed over `steps` points, starting from where
    /// the last reference point leads.
    fn synthesise_tail(&mut self, steps: usize, dt_s: f64) {
        let (last_state, last_ctrl) = match (self.states.last(), self.controls.last()) {
            (Some(s), Some(u)) => (*s, *u),
            _ => return,
        };

        if steps == 0 {
            return;
        }

        let mut state = kin_model::step(&last_state, &last_ctrl, dt_s);
        let ctrl = Control::new(0.0, -state[IDX_V] / (steps as f64 * dt_s));

        for _ in 0..steps {
            self.states.push(state);
            self.controls.push(ctrl);
            state = kin_model::step(&state, &ctrl, dt_s);
        }

        debug!(
            "Synthesised {} point braking tail, deceleration {:.3} m/s^2",
            steps, ctrl[1]
        );
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
