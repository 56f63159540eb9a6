//! Parameters structure for MocapPreproc

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the motion capture preprocessing.
#[derive(Debug, Clone, Deserialize)]
pub struct Params {
    /// Largest increase of the speed estimate accepted between two samples.
    ///
    /// Units: meters/second
    pub max_vel_jump_ms: f64,

    /// Largest position change accepted between two samples. Larger jumps are treated as
    /// tracking glitches and the sample is dropped.
    ///
    /// Units: meters
    pub max_pos_jump_m: f64,

    /// Shortest time between samples over which a speed is computed.
    ///
    /// Units: seconds
    pub min_dt_s: f64,

    /// Number of consecutive rejections after which the next sample is accepted anyway.
    ///
    /// A rejected pose re-anchors the position filter, a rejected speed sample replaces the
    /// speed estimate.
    pub max_consec_rejections: usize,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            max_vel_jump_ms: 0.1,
            max_pos_jump_m: 0.5,
            min_dt_s: 0.01,
            max_consec_rejections: 5,
        }
    }
}
