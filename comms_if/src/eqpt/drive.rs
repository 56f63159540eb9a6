//! # Drive Equipment Commands

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Demands sent to the drive motor controller.
///
/// Both channels are in device units (normalised PWM duty), already saturated to the limits of
/// the device.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct DriveCmd {
    /// Linear (forward) channel demand.
    pub linear: f64,

    /// Angular (yaw) channel demand.
    ///
    /// Follows the right hand rule about the robot's Z+ (upwards) axis, so that a positive value
    /// turns the robot to the left.
    pub angular: f64,
}

// -----------------------------------------------------------------------------------------------
// IMPLS
// -----------------------------------------------------------------------------------------------

impl DriveCmd {
    /// An explicit stop command, both channels set to zero.
    pub fn stop() -> Self {
        Self {
            linear: 0.0,
            angular: 0.0,
        }
    }

    /// Returns true if this command demands the motors stop.
    pub fn is_stop(&self) -> bool {
        self.linear == 0.0 && self.angular == 0.0
    }
}
