//! # Measurement preprocessing module
//!
//! Turns raw motion capture poses into full state measurements for the estimator. The heading is
//! the yaw of the capture attitude and the speed is derived from the distance travelled between
//! consecutive samples. Glitches in the capture data are filtered out before they reach the
//! estimator.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use chrono::{DateTime, Utc};
use log::{debug, warn};
use nalgebra::{Quaternion, UnitQuaternion};
use serde::Serialize;

// Internal
pub use params::*;
use crate::kin_model::State;
use comms_if::eqpt::mocap::MocapPose;
use util::{maths::wrap_angle, session, time::duration_to_seconds};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Motion capture preprocessor.
#[derive(Debug, Clone, Default)]
pub struct MocapPreproc {
    params: Params,

    /// Sample the current speed was computed from
    prev_sample: Option<Sample>,

    /// Current speed estimate
    speed_ms: f64,

    /// Last measurement produced
    last_meas: Option<State>,

    /// Number of consecutive poses rejected for jumping
    num_pos_rejections: usize,

    /// Number of consecutive speed samples rejected
    num_speed_rejections: usize,
}

/// Status report for a single preprocessed pose.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StatusReport {
    /// Session elapsed time
    pub time_s: f64,

    /// The pose was rejected and the previous measurement reused
    pub pose_rejected: bool,

    /// The speed sample was rejected and the previous speed kept
    pub speed_rejected: bool,

    /// Too many consecutive poses were rejected, this one was taken as the new position anchor
    pub reanchored: bool,
}

#[derive(Debug, Clone, Copy)]
struct Sample {
    timestamp: DateTime<Utc>,
    x_m: f64,
    y_m: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl MocapPreproc {
    pub fn new(params: Params) -> Self {
        Self {
            params,
            ..Default::default()
        }
    }

    /// Process a new pose.
    ///
    /// Returns the measurement to pass to the estimator, which is the previous measurement if
    /// the pose was rejected, or `None` if no valid pose has been received yet.
    pub fn process(&mut self, pose: &MocapPose) -> (Option<State>, StatusReport) {
        let mut report = StatusReport {
            time_s: session::get_elapsed_seconds(),
            ..Default::default()
        };

        let yaw = match yaw_from_quaternion(&pose.attitude_q) {
            Some(y) => y,
            None => {
                warn!("Rejecting mocap pose with invalid attitude {:?}", pose.attitude_q);
                report.pose_rejected = true;
                return (self.last_meas, report);
            }
        };

        let sample = Sample {
            timestamp: pose.timestamp,
            x_m: pose.position_m[0],
            y_m: pose.position_m[1],
        };

        if !sample.x_m.is_finite() || !sample.y_m.is_finite() {
            warn!("Rejecting mocap pose with non-finite position {:?}", pose.position_m);
            report.pose_rejected = true;
            return (self.last_meas, report);
        }

        match self.prev_sample {
            None => {
                self.prev_sample = Some(sample);
                self.speed_ms = 0.0;
            }
            Some(prev) => {
                let dist_m = (sample.x_m - prev.x_m).hypot(sample.y_m - prev.y_m);

                if dist_m > self.params.max_pos_jump_m {
                    if self.num_pos_rejections < self.params.max_consec_rejections {
                        self.num_pos_rejections += 1;
                        warn!(
                            "Rejecting mocap pose, position jumped {:.3} m (limit {:.3} m)",
                            dist_m, self.params.max_pos_jump_m
                        );
                        report.pose_rejected = true;
                        return (self.last_meas, report);
                    }

                    // Speed over the gap is unknown, keep the previous one
                    warn!(
                        "{} consecutive mocap poses rejected, re-anchoring at ({:.3}, {:.3})",
                        self.num_pos_rejections, sample.x_m, sample.y_m
                    );
                    self.num_pos_rejections = 0;
                    self.prev_sample = Some(sample);
                    report.reanchored = true;
                } else {
                    self.num_pos_rejections = 0;
                    self.update_speed(&prev, &sample, dist_m, &mut report);
                }
            }
        }

        let meas = State::new(sample.x_m, sample.y_m, yaw, self.speed_ms);
        self.last_meas = Some(meas);

        (Some(meas), report)
    }

    /// Update the speed from the distance travelled since `prev`.
    fn update_speed(
        &mut self,
        prev: &Sample,
        sample: &Sample,
        dist_m: f64,
        report: &mut StatusReport,
    ) {
        let dt_s = duration_to_seconds(sample.timestamp - prev.timestamp).unwrap_or(0.0);

        // Too close together to give a meaningful speed, keep the previous one
        if dt_s < self.params.min_dt_s {
            return;
        }

        let speed_ms = dist_m / dt_s;

        if speed_ms - self.speed_ms < self.params.max_vel_jump_ms {
            self.speed_ms = speed_ms;
            self.num_speed_rejections = 0;
        } else if self.num_speed_rejections >= self.params.max_consec_rejections {
            debug!(
                "Accepting speed {:.3} m/s after {} rejected samples",
                speed_ms, self.num_speed_rejections
            );
            self.speed_ms = speed_ms;
            self.num_speed_rejections = 0;
        } else {
            debug!(
                "Rejecting speed sample {:.3} m/s (previous {:.3} m/s)",
                speed_ms, self.speed_ms
            );
            self.num_speed_rejections += 1;
            report.speed_rejected = true;
        }

        self.prev_sample = Some(*sample);
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Yaw angle of an `[x, y, z, w]` quaternion, wrapped into (-pi, pi].
///
/// Returns `None` if the quaternion cannot be normalised.
pub fn yaw_from_quaternion(q: &[f64; 4]) -> Option<f64> {
    let quat = Quaternion::new(q[3], q[0], q[1], q[2]);
    let norm = quat.norm();

    if !norm.is_finite() || norm < 1e-9 {
        return None;
    }

    let (_, _, yaw) = UnitQuaternion::from_quaternion(quat).euler_angles();

    Some(wrap_angle(yaw))
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use chrono::Duration;

    fn pose(t0: DateTime<Utc>, ms: i64, x: f64, y: f64, yaw: f64) -> MocapPose {
        MocapPose {
            timestamp: t0 + Duration::milliseconds(ms),
            position_m: [x, y, 0.1],
            attitude_q: [0.0, 0.0, (yaw / 2.0).sin(), (yaw / 2.0).cos()],
        }
    }

    #[test]
    fn test_yaw_from_quaternion() {
        for &yaw in &[0.0, 0.5, -1.2, 3.0, -3.0] {
            let q = [0.0, 0.0, (yaw / 2.0f64).sin(), (yaw / 2.0f64).cos()];
            assert!((yaw_from_quaternion(&q).unwrap() - yaw).abs() < 1e-9);
        }

        assert!(yaw_from_quaternion(&[0.0; 4]).is_none());
        assert!(yaw_from_quaternion(&[f64::NAN, 0.0, 0.0, 1.0]).is_none());
    }

    #[test]
    fn test_speed_from_positions() {
        let t0 = Utc::now();
        let mut pp = MocapPreproc::new(Params::default());

        let (m, _) = pp.process(&pose(t0, 0, 0.0, 0.0, 0.3));
        let m = m.unwrap();
        assert_eq!(m[3], 0.0);
        assert!((m[2] - 0.3).abs() < 1e-9);

        // Accelerate in small increments, each accepted
        let mut x = 0.0;
        for i in 1..=5 {
            x += 0.01 * i as f64;
            let (m, rpt) = pp.process(&pose(t0, 200 * i, x, 0.0, 0.0));
            assert!(!rpt.speed_rejected);
            assert!((m.unwrap()[3] - 0.05 * i as f64).abs() < 1e-9);
        }
    }

    #[test]
    fn test_glitch_rejection() {
        let t0 = Utc::now();
        let mut pp = MocapPreproc::new(Params::default());

        pp.process(&pose(t0, 0, 0.0, 0.0, 0.0));
        let (first, _) = pp.process(&pose(t0, 200, 0.01, 0.0, 0.0));

        // Speed jump from 0.05 m/s to 1 m/s is rejected, position still used
        let (m, rpt) = pp.process(&pose(t0, 400, 0.21, 0.0, 0.0));
        assert!(rpt.speed_rejected);
        let m = m.unwrap();
        assert!((m[0] - 0.21).abs() < 1e-12);
        assert!((m[3] - first.unwrap()[3]).abs() < 1e-12);

        // Position teleport, previous measurement is reused
        let (m2, rpt) = pp.process(&pose(t0, 600, 5.0, 5.0, 0.0));
        assert!(rpt.pose_rejected);
        assert_eq!(m2, Some(m));

        // Samples too close together keep the previous speed
        let (m3, rpt) = pp.process(&pose(t0, 405, 0.22, 0.0, 0.0));
        assert!(!rpt.pose_rejected && !rpt.speed_rejected);
        assert_eq!(m3.unwrap()[3], m[3]);
    }

    #[test]
    fn test_recovery_after_dropout() {
        let t0 = Utc::now();
        let mut pp = MocapPreproc::new(Params::default());

        pp.process(&pose(t0, 0, 0.0, 0.0, 0.0));

        // Capture drops out for 2 s while the robot drives at 0.5 m/s
        let mut num_pose_rejected = 0;
        let mut num_reanchored = 0;
        let mut last = None;
        for i in 0..20 {
            let x = 1.0 + 0.1 * i as f64;
            let (m, rpt) = pp.process(&pose(t0, 2000 + 200 * i, x, 0.0, 0.0));

            if rpt.pose_rejected {
                num_pose_rejected += 1;
                assert_eq!(m.unwrap()[0], 0.0);
            } else {
                assert!((m.unwrap()[0] - x).abs() < 1e-12, "sample {}", i);
            }
            if rpt.reanchored {
                num_reanchored += 1;
            }
            last = m;
        }

        assert_eq!(num_pose_rejected, 5);
        assert_eq!(num_reanchored, 1);

        // Speed recovers once the jump limit has been exceeded often enough
        let last = last.unwrap();
        assert!((last[0] - 2.9).abs() < 1e-12);
        assert!((last[3] - 0.5).abs() < 1e-6, "speed {}", last[3]);
    }
}
