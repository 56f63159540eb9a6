//! Main trajectory tracking executable entry point.
//!
//! # Architecture
//!
//! The general execution methodology consists of:
//!
//!     - Initialise all modules
//!     - Main loop:
//!         - System input acquisition:
//!             - Motion capture pose of the (simulated) robot
//!             - Pending trajectories
//!         - Trajectory tracking processing
//!         - Drive command sending
//!         - Archiving
//!
//! Trajectories are given as JSON files on the command line. The first one is tracked
//! immediately, the others are handed to the tracker one at a time so each waits in its queue
//! until the previous one finishes. The executable stops once the tracker is idle with nothing
//! left to track.
//!
//! # Modules
//!
//! All modules (e.g. `traj_ctrl`) shall meet the following requirements:
//!     1. Provide a public struct implementing the `util::module::State` trait.
//!

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{
    eyre::{eyre, WrapErr},
    Report,
};
use log::{debug, info, trace, warn};
use std::collections::VecDeque;
use std::env;
use std::thread;
use std::time::{Duration, Instant};

// Internal
use comms_if::{eqpt::drive::DriveCmd, tc::traj::NominalTrajectory};
use track_lib::{
    data_store::{DataStore, InputSlots},
    kin_model::State as KinState,
    meas::{self, MocapPreproc},
    sim_client::SimPlant,
    traj_ctrl::{self, TrajTrackerMode},
};
use util::{
    archive::{Archived, Archiver},
    logger::{logger_init, LogParams},
    module::State,
    session::Session,
};

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    color_eyre::install()?;

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("track_exec", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    let log_params: LogParams =
        util::params::load("log.toml").wrap_err("Could not load logging params")?;
    logger_init(&log_params, &session).wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Trajectory Tracking Executable\n");
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD TRAJECTORIES ----

    let args: Vec<String> = env::args().skip(1).collect();

    debug!("CLI arguments: {:?}", args);

    if args.is_empty() {
        return Err(eyre!("Expected at least one trajectory file as argument"));
    }

    let mut pending = VecDeque::new();
    for path in args.iter() {
        let json = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("Could not read trajectory file \"{}\"", path))?;
        let traj = NominalTrajectory::from_json(&json)
            .wrap_err_with(|| format!("Could not parse trajectory file \"{}\"", path))?;

        info!("Loaded \"{}\" with {} points", path, traj.len());
        pending.push_back(traj);
    }

    // ---- LOAD PARAMETERS ----

    let meas_params: meas::Params =
        util::params::load("meas.toml").wrap_err("Could not load measurement params")?;

    info!("Exec parameters loaded");

    // ---- INITIALISE DATASTORE ----

    info!("Initialising modules...");

    let mut ds = DataStore::default();
    let slots = InputSlots::default();

    // ---- INITIALISE MODULES ----

    ds.traj_tracker
        .init(
            traj_ctrl::InitData {
                params_path: "traj_ctrl.toml",
                act_map_params_path: "act_map.toml",
            },
            &session,
        )
        .wrap_err("Failed to initialise TrajTracker")?;
    info!("TrajTracker init complete");

    let mut mocap_preproc = MocapPreproc::new(meas_params);
    let mut mocap_arch = Archiver::from_path(&session, "meas/status_report.csv")
        .wrap_err("Failed to open the MocapPreproc archive")?;
    info!("MocapPreproc init complete");

    // Start the simulated robot at the first reference point
    let start = pending
        .front()
        .and_then(|t| t.states.first())
        .map(|s| KinState::new(s.x, s.y, s.theta, s.v))
        .unwrap_or_else(KinState::zeros);
    let mut sim_plant = SimPlant::new(start);
    info!("SimPlant initialised at {:?}", start.as_slice());

    info!("Module initialisation complete\n");

    let cycle_period_s = ds.traj_tracker.params().dt_s;

    // ---- MAIN LOOP ----

    info!("Begining main loop\n");

    loop {
        // Get cycle start time
        let cycle_start_instant = Instant::now();

        // Clear items that need wiping at the start of the cycle
        ds.cycle_start();

        // ---- DATA INPUT ----

        let pose = sim_plant.pose(chrono::Utc::now());
        let (meas, mocap_rpt) = mocap_preproc.process(&pose);
        if let Some(meas) = meas {
            slots.set_measurement(meas);
        }
        ds.mocap_status_rpt = mocap_rpt;

        // Hand over the next trajectory once the tracker has room for it
        if ds.traj_tracker.queued().is_none() && !slots.has_trajectory() {
            if let Some(traj) = pending.pop_front() {
                slots.set_trajectory(traj);
            }
        }

        ds.traj_tracker_input = traj_ctrl::InputData {
            trajectories: slots.take_trajectories(),
            measurement: slots.latest_measurement(),
        };

        // ---- CONTROL ALGORITHM PROCESSING ----

        match ds.traj_tracker.proc(&ds.traj_tracker_input) {
            Ok((o, r)) => {
                ds.traj_tracker_output = o;
                ds.traj_tracker_status_rpt = r;
            }
            Err(e) => return Err(e).wrap_err("Error during TrajTracker processing"),
        }

        // ---- DRIVE COMMANDS ----

        let burst_dur =
            send_cmds(&ds.traj_tracker_output.cmds, ds.traj_tracker_output.stop_cmd_interval_s);
        sim_plant.apply(
            ds.traj_tracker_output.applied_control.as_ref(),
            &ds.traj_tracker_output.cmds,
            cycle_period_s,
        );

        // ---- WRITE ARCHIVES ----

        if let Err(e) = ds.traj_tracker.write() {
            warn!("Could not write TrajTracker archive: {}", e);
        }
        if let Err(e) = mocap_arch.serialise(ds.mocap_status_rpt) {
            warn!("Could not write MocapPreproc archive: {}", e);
        }

        // ---- EXIT CHECK ----

        if ds.traj_tracker.mode() == TrajTrackerMode::Idle
            && ds.traj_tracker.queued().is_none()
            && !slots.has_trajectory()
            && pending.is_empty()
        {
            info!("All trajectories complete, stopping");
            break;
        }

        // ---- CYCLE MANAGEMENT ----

        let cycle_period = Duration::from_secs_f64(cycle_period_s);
        let cycle_dur = Instant::now() - cycle_start_instant;

        if let Some(overrun) = ds.check_overrun(cycle_dur, burst_dur, cycle_period) {
            warn!("Cycle overran by {:.06} s", overrun.as_secs_f64());
        }

        // Get sleep duration
        if let Some(d) = cycle_period.checked_sub(cycle_dur) {
            thread::sleep(d);
        }

        ds.cycle_end();
    }

    // ---- SHUTDOWN ----

    info!(
        "End of execution after {} cycles, final position {:?}",
        ds.num_cycles,
        sim_plant.state().as_slice()
    );

    Ok(())
}

/// Send the drive commands of one cycle.
///
/// When more than one command is present (the stop burst) consecutive commands are spaced by
/// `interval_s`. Returns the time spent waiting between commands.
fn send_cmds(cmds: &[DriveCmd], interval_s: f64) -> Duration {
    let mut waited = Duration::default();

    for (i, cmd) in cmds.iter().enumerate() {
        if i > 0 && interval_s > 0.0 {
            let interval = Duration::from_secs_f64(interval_s);
            thread::sleep(interval);
            waited += interval;
        }

        if cmd.is_stop() {
            debug!("Drive stop command sent");
        } else {
            trace!("Drive command sent: {:?}", cmd);
        }
    }

    waited
}
