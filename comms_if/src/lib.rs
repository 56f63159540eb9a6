//! # Communications interface crate.
//!
//! Provides the message definitions exchanged between the tracker and the outside world. The
//! transport itself lives elsewhere, these are only the serialisable payloads.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Commands received from the planner (trajectories)
pub mod tc;

/// Command and data definitions for equipment (drive motors, motion capture)
pub mod eqpt;
