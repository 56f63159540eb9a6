//! # Motion Capture Equipment Data

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use chrono::{serde::ts_milliseconds, DateTime, Utc};
use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A single pose sample of the robot from the motion capture system.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct MocapPose {
    /// UTC timestamp at which the pose was captured
    #[serde(with = "ts_milliseconds")]
    pub timestamp: DateTime<Utc>,

    /// Position of the robot body in the world frame.
    ///
    /// Units: meters
    pub position_m: [f64; 3],

    /// Attitude of the robot body in the world frame, as a quaternion in `[x, y, z, w]` order.
    pub attitude_q: [f64; 4],
}
