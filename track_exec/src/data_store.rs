//! # Data Store
//!
//! Holds the data shared between the parts of the executable. Measurements and trajectories
//! arrive through `InputSlots`, which can be written from any thread, while everything owned by
//! the cycle lives in the `DataStore`.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use log::info;

use crate::{kin_model::State, meas, traj_ctrl};
use comms_if::tc::traj::NominalTrajectory;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Global data store for the executable.
#[derive(Default)]
pub struct DataStore {
    // Cycle management
    /// Number of cycles already executed
    pub num_cycles: u128,

    /// Session elapsed time at the start of the cycle
    pub sim_time_s: f64,

    // TrajTracker
    pub traj_tracker: traj_ctrl::TrajTracker,
    pub traj_tracker_input: traj_ctrl::InputData,
    pub traj_tracker_output: traj_ctrl::OutputData,
    pub traj_tracker_status_rpt: traj_ctrl::StatusReport,

    // MocapPreproc
    pub mocap_status_rpt: meas::StatusReport,

    // Monitoring Counters
    /// Number of consecutive cycle overruns
    pub num_consec_cycle_overruns: u64,
}

/// Slots holding the latest asynchronous inputs to the tracker.
///
/// Each slot has a single writer and is read once per cycle. Cloning gives another handle to
/// the same slots.
///
/// Up to two trajectories wait between cycles: the oldest untaken one, which an idle tracker
/// activates, and the latest one, which is the only one a newer arrival replaces.
#[derive(Clone, Default)]
pub struct InputSlots {
    measurement: Arc<Mutex<Option<State>>>,
    trajectories: Arc<Mutex<VecDeque<NominalTrajectory>>>,
}

/// Maximum number of trajectories waiting in the slots.
const MAX_PENDING_TRAJS: usize = 2;

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl DataStore {
    /// Perform actions required at the start of a cycle.
    ///
    /// Clears those items that need clearing at the start of a cycle.
    pub fn cycle_start(&mut self) {
        self.traj_tracker_input = traj_ctrl::InputData::default();
        self.traj_tracker_output = traj_ctrl::OutputData::default();
        self.traj_tracker_status_rpt = traj_ctrl::StatusReport::default();
        self.mocap_status_rpt = meas::StatusReport::default();

        self.sim_time_s = util::session::get_elapsed_seconds();
    }

    /// Perform actions required at the end of a cycle.
    pub fn cycle_end(&mut self) {
        self.num_cycles += 1;
    }

    /// Update the overrun counter for a cycle which took `cycle_dur`, returning the overrun if
    /// there was one.
    ///
    /// `burst_dur`, the time spent spacing out the stop burst, is not counted against the period.
    pub fn check_overrun(
        &mut self,
        cycle_dur: Duration,
        burst_dur: Duration,
        period: Duration,
    ) -> Option<Duration> {
        let work_dur = cycle_dur.checked_sub(burst_dur).unwrap_or_default();

        match work_dur.checked_sub(period) {
            Some(overrun) if overrun > Duration::default() => {
                self.num_consec_cycle_overruns += 1;
                Some(overrun)
            }
            _ => {
                self.num_consec_cycle_overruns = 0;
                None
            }
        }
    }
}

impl InputSlots {
    /// Store a new measurement, replacing the previous one.
    pub fn set_measurement(&self, meas: State) {
        *lock(&self.measurement) = Some(meas);
    }

    /// The latest measurement, which may be the same one as on the previous cycle.
    pub fn latest_measurement(&self) -> Option<State> {
        *lock(&self.measurement)
    }

    /// Store a newly received trajectory.
    ///
    /// If two are already waiting the latest of them is replaced, the oldest is kept.
    pub fn set_trajectory(&self, traj: NominalTrajectory) {
        let mut pending = lock(&self.trajectories);

        if pending.len() >= MAX_PENDING_TRAJS {
            pending.pop_back();
            info!("Untaken trajectory replaced by a newer one");
        }

        pending.push_back(traj);
    }

    /// Take the received trajectories in arrival order, leaving the slot empty.
    pub fn take_trajectories(&self) -> Vec<NominalTrajectory> {
        lock(&self.trajectories).drain(..).collect()
    }

    /// Returns true if a trajectory is waiting to be taken.
    pub fn has_trajectory(&self) -> bool {
        !lock(&self.trajectories).is_empty()
    }
}

/// Lock a slot, recovering the value if a writer panicked while holding it.
fn lock<T>(slot: &Mutex<T>) -> MutexGuard<T> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
