//! Parameters structure for ActMap

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for actuator mapping.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct Params {
    /// Calibration of the linear channel, input in meters/second.
    pub linear: ChannelParams,

    /// Calibration of the angular channel, input in radians/second.
    pub angular: ChannelParams,
}

/// Calibration curve of a single drive channel.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ChannelParams {
    /// Inputs with a magnitude at or below this value map to zero output.
    pub deadband: f64,

    /// Calibration polynomial coefficients applied to the input magnitude.
    ///
    /// The order of these coefficients is highest power first, i.e if there are 3 coefficients
    /// it's a 2nd order polynomial with c[0]*x^2 + c[1]*x + c[2]. The sign of the input is
    /// applied to the result so the curve is symmetric for forward and reverse demands.
    pub coeffs: Vec<f64>,

    /// Lowest output the device accepts.
    ///
    /// Units: device units
    pub min_output: f64,

    /// Highest output the device accepts.
    ///
    /// Units: device units
    pub max_output: f64,
}
