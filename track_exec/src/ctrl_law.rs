//! # Feedback control law
//!
//! Combines the feed-forward control of the reference trajectory with the LQR correction of the
//! estimated state error.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use crate::kin_model::{Control, State, IDX_THETA};
use crate::lqr::Gain;
use util::maths::ang_diff;

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Error of the estimate relative to the reference, with the heading error wrapped.
pub fn state_error(x_ref: &State, x_hat: &State) -> State {
    let mut err = x_hat - x_ref;
    err[IDX_THETA] = ang_diff(x_hat[IDX_THETA], x_ref[IDX_THETA]);
    err
}

/// Compute the control to apply: `u = u_ref - K (x_hat - x_ref)`.
pub fn control(x_ref: &State, u_ref: &Control, x_hat: &State, gain: &Gain) -> Control {
    u_ref - gain * state_error(x_ref, x_hat)
}
