//! # Actuator mapping module
//!
//! Converts physical demands (linear speed and angular rate) into the units understood by the
//! drive motor controller. Each channel uses a calibration polynomial evaluated on the demand
//! magnitude, a deadband around zero and saturation at the device limits.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::trace;
use serde::Serialize;

// Internal
pub use params::*;
use comms_if::eqpt::drive::DriveCmd;
use util::maths::{clamp, poly_val};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Actuator mapping, holding the calibration of both channels.
#[derive(Debug, Clone, Default)]
pub struct ActMap {
    params: Params,
}

/// Status report for a single mapping.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StatusReport {
    /// The linear demand was saturated at a device limit
    pub linear_limited: bool,

    /// The angular demand was saturated at a device limit
    pub angular_limited: bool,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors with the actuator mapping parameters.
#[derive(Debug, thiserror::Error)]
pub enum ActMapError {
    #[error("The {0} channel has no calibration coefficients")]
    NoCoeffs(&'static str),

    #[error("The {0} channel has invalid limits, min ({1}) must be below max ({2})")]
    InvalidLimits(&'static str, f64, f64),

    #[error("The {0} channel has a negative deadband ({1})")]
    InvalidDeadband(&'static str, f64),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ActMap {
    /// Create a new mapping, validating the calibration.
    pub fn new(params: Params) -> Result<Self, ActMapError> {
        params.linear.validate("linear")?;
        params.angular.validate("angular")?;

        Ok(Self { params })
    }

    /// Map a linear speed demand into device units.
    pub fn linear_to_actuator(&self, speed_ms: f64) -> f64 {
        self.params.linear.apply(speed_ms).0
    }

    /// Map an angular rate demand into device units.
    pub fn angular_to_actuator(&self, rate_rads: f64) -> f64 {
        self.params.angular.apply(rate_rads).0
    }

    /// Build the drive command for the given demands.
    pub fn map(&self, speed_ms: f64, rate_rads: f64) -> (DriveCmd, StatusReport) {
        let (linear, linear_limited) = self.params.linear.apply(speed_ms);
        let (angular, angular_limited) = self.params.angular.apply(rate_rads);

        trace!(
            "ActMap: v = {:.3} m/s -> {:.3}, omega = {:.3} rad/s -> {:.3}",
            speed_ms, linear, rate_rads, angular
        );

        (
            DriveCmd { linear, angular },
            StatusReport {
                linear_limited,
                angular_limited,
            },
        )
    }
}

impl ChannelParams {
    fn validate(&self, name: &'static str) -> Result<(), ActMapError> {
        if self.coeffs.is_empty() {
            return Err(ActMapError::NoCoeffs(name));
        }
        if !(self.min_output < self.max_output) {
            return Err(ActMapError::InvalidLimits(name, self.min_output, self.max_output));
        }
        if !(self.deadband >= 0.0) {
            return Err(ActMapError::InvalidDeadband(name, self.deadband));
        }

        Ok(())
    }

    /// Apply the calibration, returning the output and whether it was saturated.
    fn apply(&self, value: f64) -> (f64, bool) {
        // Non-finite demands are never passed to the device
        if !value.is_finite() || value.abs() <= self.deadband {
            return (0.0, false);
        }

        let raw = value.signum() * poly_val(&value.abs(), &self.coeffs);
        let out = clamp(&raw, &self.min_output, &self.max_output);

        (out, out != raw)
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
