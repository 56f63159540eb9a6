//! # Trajectory tracking library.
//!
//! This library allows other crates in the workspace (and the benchmarks and tests) to access
//! items defined inside the tracking crate.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Actuator mapping - converts physical demands into drive device units
pub mod act_map;

/// Control law - feed-forward plus state feedback
pub mod ctrl_law;

/// Data store - shared data of the executable and the asynchronous input slots
pub mod data_store;

/// State estimation - extended Kalman filter
pub mod est;

/// Kinematic model - unicycle motion model and its linearisation
pub mod kin_model;

/// Linear-quadratic regulator - feedback gain computation
pub mod lqr;

/// Measurement preprocessing - motion capture poses to state measurements
pub mod meas;

/// Simulation client - simulated plant for closed loop runs
pub mod sim_client;

/// Trajectory control module - tracks nominal trajectories
pub mod traj_ctrl;
