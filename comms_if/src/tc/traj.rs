//! # Nominal trajectory commands
//!
//! A nominal trajectory is produced by the planner and consumed by the tracker. It is a sequence
//! of reference states each paired with the feed-forward control applied at that state, sampled
//! every `dt_s` seconds.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use super::TcParseError;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// The state of the robot at one instant.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct StateMsg {
    /// Position along the world X axis in meters.
    pub x: f64,

    /// Position along the world Y axis in meters.
    pub y: f64,

    /// Heading in radians, measured from the world X axis, wrapped to (-pi, pi].
    pub theta: f64,

    /// Linear speed in meters/second.
    pub v: f64,
}

/// A control input associated with one trajectory step.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ControlMsg {
    /// Angular rate in radians/second.
    pub omega: f64,

    /// Linear acceleration in meters/second^2.
    pub a: f64,
}

/// A nominal trajectory to be tracked.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NominalTrajectory {
    /// Timestep between consecutive points, in seconds.
    pub dt_s: f64,

    /// Reference states.
    pub states: Vec<StateMsg>,

    /// Feed-forward controls, one per reference state.
    pub controls: Vec<ControlMsg>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl NominalTrajectory {
    /// Parse a trajectory from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self, TcParseError> {
        serde_json::from_str(json_str).map_err(TcParseError::InvalidJson)
    }

    /// Serialise the trajectory into a JSON string.
    pub fn to_json(&self) -> Result<String, TcParseError> {
        serde_json::to_string(self).map_err(TcParseError::InvalidJson)
    }

    /// Number of points in the trajectory.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_from_json() {
        let json = r#"{
            "dt_s": 0.2,
            "states": [
                {"x": 0.0, "y": 0.0, "theta": 0.0, "v": 0.5},
                {"x": 0.1, "y": 0.0, "theta": 0.0, "v": 0.5}
            ],
            "controls": [
                {"omega": 0.0, "a": 0.0},
                {"omega": 0.1, "a": -0.2}
            ]
        }"#;

        let traj = NominalTrajectory::from_json(json).unwrap();
        assert_eq!(traj.len(), 2);
        assert_eq!(traj.dt_s, 0.2);
        assert_eq!(traj.states[1].x, 0.1);
        assert_eq!(traj.controls[1], ControlMsg { omega: 0.1, a: -0.2 });
    }

    #[test]
    fn test_malformed_json() {
        // A state missing its speed is rejected at parse time
        let json = r#"{
            "dt_s": 0.2,
            "states": [{"x": 0.0, "y": 0.0, "theta": 0.0}],
            "controls": [{"omega": 0.0, "a": 0.0}]
        }"#;

        assert!(matches!(
            NominalTrajectory::from_json(json), 
            Err(TcParseError::InvalidJson(_))
        ));
    }
}
