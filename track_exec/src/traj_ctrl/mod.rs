//! # Trajectory control module
//!
//! Tracks nominal trajectories using an LQR feedback law about each reference point, with the
//! robot state estimated by an EKF.
//!
//! The tracker is a state machine with three modes:
//!
//! - `Idle`: nothing to track, no commands are produced.
//! - `Tracking`: the first `seg_len` points of the active trajectory are being tracked.
//! - `Braking`: the active trajectory finished with nothing queued after it, its braking tail is
//!   executed to bring the robot to rest, followed by a burst of stop commands.
//!
//! A trajectory received while tracking or braking is held in a single queue slot, replacing
//! any trajectory already waiting there. It is swapped in when the active trajectory reaches
//! `seg_len`, or on the tick after braking completes.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;
mod state;
mod traj;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Serialize;

// Internal
pub use params::*;
pub use state::*;
pub use traj::*;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// The execution mode of the tracker.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum TrajTrackerMode {
    Idle,
    Tracking,
    Braking,
}

/// Possible errors that can occur during TrajTracker operation.
#[derive(Debug, thiserror::Error)]
pub enum TrajCtrlError {
    #[error("Could not load the parameters: {0}")]
    ParamLoadError(#[from] util::params::LoadError),

    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("Invalid actuator mapping: {0}")]
    ActMapError(#[from] crate::act_map::ActMapError),

    #[error("Could not create the estimator: {0}")]
    EstError(#[from] crate::est::EstError),

    #[error("Archive error: {0}")]
    ArchiveError(#[from] util::archive::ArchiveError),

    #[error("Trajectory has {states} states but {controls} controls")]
    LengthMismatch { states: usize, controls: usize },

    #[error("Trajectory has {len} points, at least {seg_len} are required")]
    TooShort { len: usize, seg_len: usize },

    #[error("Trajectory timestep is {found} s, expected {expected} s")]
    DtMismatch { expected: f64, found: f64 },

    #[error("Trajectory point {0} contains a non-finite value")]
    NonFinite(usize),

    #[error("TrajTracker has not been initialised")]
    NotInitialised,
}

impl Default for TrajTrackerMode {
    fn default() -> Self {
        TrajTrackerMode::Idle
    }
}
