//! # Simulation Client
//!
//! Simulated plant used for closed loop runs without hardware. The plant integrates the
//! kinematic model with the controls applied by the tracker and reports its pose in the same
//! form as the motion capture system.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use chrono::{DateTime, Utc};
use log::trace;

use crate::kin_model::{self, Control, State, IDX_THETA, IDX_V};
use comms_if::eqpt::{drive::DriveCmd, mocap::MocapPose};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A simulated robot.
#[derive(Debug, Clone)]
pub struct SimPlant {
    state: State,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SimPlant {
    /// Create a new plant at the given state.
    pub fn new(state: State) -> Self {
        Self { state }
    }

    /// True state of the plant.
    pub fn state(&self) -> &State {
        &self.state
    }

    /// Advance the plant by one period.
    ///
    /// The control applied by the tracker drives the plant, stop commands then bring it
    /// immediately to rest.
    pub fn apply(&mut self, control: Option<&Control>, cmds: &[DriveCmd], dt_s: f64) {
        if let Some(u) = control {
            self.state = kin_model::step(&self.state, u, dt_s);
        }

        if cmds.iter().any(|c| c.is_stop()) {
            self.state[IDX_V] = 0.0;
        }

        trace!("SimPlant state: {:?}", self.state.as_slice());
    }

    /// Pose of the plant as reported by motion capture.
    pub fn pose(&self, timestamp: DateTime<Utc>) -> MocapPose {
        let half_yaw = 0.5 * self.state[IDX_THETA];

        MocapPose {
            timestamp,
            position_m: [self.state[0], self.state[1], 0.0],
            attitude_q: [0.0, 0.0, half_yaw.sin(), half_yaw.cos()],
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
