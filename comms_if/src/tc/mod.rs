//! # Telecommand module
//!
//! This module provides the commands received from the planner, namely nominal trajectories.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod traj;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use thiserror::Error;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible parsing errors.
#[derive(Debug, Error)]
pub enum TcParseError {
    #[error("TC contains invalid JSON: {0}")]
    InvalidJson(serde_json::Error),
}
