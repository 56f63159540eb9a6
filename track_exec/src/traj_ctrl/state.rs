//! Trajectory control module state

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info, trace, warn};
use serde::Serialize;

// Internal
use super::*;
use crate::act_map::{self, ActMap};
use crate::ctrl_law;
use crate::est::{CovHealth, Ekf};
use crate::kin_model::{self, Control, State, IDX_A, IDX_OMEGA, IDX_X};
use crate::lqr::{Gain, LqrSolver};
use comms_if::{eqpt::drive::DriveCmd, tc::traj::NominalTrajectory};
use util::{
    archive::{ArchiveError, Archived, Archiver},
    module,
    params,
    session::{self, Session},
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Trajectory tracker state
#[derive(Default)]
pub struct TrajTracker {
    params: Params,

    /// Set once the components have been built from the parameters
    initialised: bool,

    lqr: LqrSolver,
    ekf: Ekf,
    act_map: ActMap,

    /// Executing mode
    mode: TrajTrackerMode,

    /// The trajectory being tracked
    active: Option<Trajectory>,

    /// The trajectory to take over once the active one reaches its segment length
    queued: Option<Trajectory>,

    /// Index of the current reference point in the active trajectory
    index: usize,

    /// If true the estimate is seeded from the reference on the next tick
    seed_pending: bool,

    /// Speed demand, the integral of the commanded acceleration
    v_des_ms: f64,

    /// Last gain successfully computed during the current run
    last_gain: Option<Gain>,

    /// Latest measurement, reused until a newer one arrives
    measurement: Option<State>,

    report: StatusReport,
    arch_report: Archiver,
}

/// Data required to initialise the tracker.
#[derive(Debug, Clone, Copy)]
pub struct InitData {
    /// Path to the tracker parameter file, relative to the parameters directory
    pub params_path: &'static str,

    /// Path to the actuator mapping parameter file, relative to the parameters directory
    pub act_map_params_path: &'static str,
}

/// Input data to the tracker.
#[derive(Debug, Clone, Default)]
pub struct InputData {
    /// Trajectories received since the last tick, in arrival order
    pub trajectories: Vec<NominalTrajectory>,

    /// A newly received measurement, if any
    pub measurement: Option<State>,
}

/// Output of a single tick.
#[derive(Debug, Clone, Default)]
pub struct OutputData {
    /// Commands to send to the drive, in order.
    ///
    /// A single command while tracking or braking, followed by the stop burst on the tick
    /// braking completes. Empty while idle.
    pub cmds: Vec<DriveCmd>,

    /// The state estimate used for control this tick
    pub state_est: Option<State>,

    /// The control applied this tick
    pub applied_control: Option<Control>,

    /// Difference between the measured and reference X position
    ///
    /// Units: meters
    pub x_err_m: Option<f64>,

    /// Interval at which consecutive stop commands should be sent
    ///
    /// Units: seconds
    pub stop_cmd_interval_s: f64,
}

/// The status report containing various error flags and monitoring quantities.
#[derive(Debug, Default, Copy, Clone, Serialize)]
pub struct StatusReport {
    /// Session elapsed time
    pub time_s: f64,

    /// Mode in which this tick was processed
    pub mode: TrajTrackerMode,

    /// Reference index tracked this tick
    pub index: usize,

    /// The LQR solve failed and a previous (or zero) gain was used
    pub gain_fallback: bool,

    /// The estimate was not corrected this tick
    pub correction_skipped: bool,

    /// The estimate covariance had to be repaired
    pub cov_repaired: bool,

    /// A received trajectory was rejected
    pub traj_rejected: bool,

    /// A queued trajectory was replaced by a newer one
    pub queued_replaced: bool,

    /// An actuator demand was saturated
    pub act_limited: bool,

    /// Trace of the estimate covariance after the tick
    pub cov_trace: f64,

    /// Difference between the measured and reference X position
    pub x_err_m: Option<f64>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl module::State for TrajTracker {
    type InitData = InitData;
    type InitError = TrajCtrlError;

    type InputData = InputData;
    type OutputData = OutputData;
    type StatusReport = StatusReport;
    type ProcError = TrajCtrlError;

    /// Initialise the TrajTracker module.
    ///
    /// Loads both parameter files and opens the status report archive.
    fn init(&mut self, init_data: Self::InitData, session: &Session) -> Result<(), Self::InitError> {
        let params: Params = params::load(init_data.params_path)?;
        let act_map_params: act_map::Params = params::load(init_data.act_map_params_path)?;

        *self = Self::new(params, act_map_params)?;

        self.arch_report = Archiver::from_path(session, "traj_ctrl/status_report.csv")?;

        Ok(())
    }

    /// Process trajectory control.
    ///
    /// Processing involves:
    ///  1. Storing any new measurement
    ///  2. Accepting new trajectories in arrival order, either activating or queueing them
    ///  3. Performing one tracking tick
    fn proc(
        &mut self,
        input_data: &Self::InputData,
    ) -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError> {
        if !self.initialised {
            return Err(TrajCtrlError::NotInitialised);
        }

        self.report = StatusReport::default();
        self.report.time_s = session::get_elapsed_seconds();

        if let Some(ref meas) = input_data.measurement {
            self.set_measurement(meas);
        }

        for msg in input_data.trajectories.iter() {
            if let Err(e) = self.receive_trajectory(msg) {
                warn!("Rejected trajectory: {}", e);
                self.report.traj_rejected = true;
            }
        }

        let output = self.tick();

        Ok((output, self.report))
    }
}

impl Archived for TrajTracker {
    fn write(&mut self) -> Result<(), ArchiveError> {
        self.arch_report.serialise(self.report)
    }
}

impl TrajTracker {
    /// Create a new tracker from its parameters.
    pub fn new(params: Params, act_map_params: act_map::Params) -> Result<Self, TrajCtrlError> {
        params.validate()?;

        let act_map = ActMap::new(act_map_params)?;
        let ekf = Ekf::new(params.p0(), params.q_ekf(), params.meas_model, params.r_ekf())?;
        let lqr = LqrSolver::new(
            params.q_lqr(),
            params.r_lqr(),
            params.lqr_max_iters,
            params.lqr_tolerance,
        );

        Ok(Self {
            params,
            initialised: true,
            lqr,
            ekf,
            act_map,
            seed_pending: true,
            ..Default::default()
        })
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn mode(&self) -> TrajTrackerMode {
        self.mode
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn active(&self) -> Option<&Trajectory> {
        self.active.as_ref()
    }

    pub fn queued(&self) -> Option<&Trajectory> {
        self.queued.as_ref()
    }

    pub fn estimate(&self) -> &State {
        self.ekf.estimate()
    }

    /// Store the latest measurement.
    ///
    /// Measurements containing non-finite values are dropped and the previous one is kept.
    pub fn set_measurement(&mut self, meas: &State) {
        if meas.iter().all(|v| v.is_finite()) {
            self.measurement = Some(*meas);
        } else {
            warn!("Dropping non-finite measurement {:?}", meas.as_slice());
        }
    }

    /// Validate a received trajectory and either activate or queue it.
    ///
    /// On error the tracker is left unchanged.
    pub fn receive_trajectory(&mut self, msg: &NominalTrajectory) -> Result<(), TrajCtrlError> {
        let traj = Trajectory::from_msg(msg, &self.params)?;
        self.load_trajectory(traj);
        Ok(())
    }

    /// Activate a trajectory if idle, otherwise queue it.
    pub fn load_trajectory(&mut self, traj: Trajectory) {
        match self.mode {
            TrajTrackerMode::Idle => {
                if self.queued.take().is_some() {
                    info!("Queued trajectory replaced before it started");
                    self.report.queued_replaced = true;
                }
                self.activate(traj);
            }
            TrajTrackerMode::Tracking | TrajTrackerMode::Braking => {
                if self.queued.replace(traj).is_some() {
                    info!("Queued trajectory replaced by a newer one");
                    self.report.queued_replaced = true;
                } else {
                    info!("Trajectory queued");
                }
            }
        }
    }

    /// Perform a single tracking tick.
    pub fn tick(&mut self) -> OutputData {
        let mut output = OutputData {
            stop_cmd_interval_s: self.params.stop_cmd_interval_s,
            ..Default::default()
        };

        if self.mode == TrajTrackerMode::Idle {
            match self.queued.take() {
                Some(t) => self.activate(t),
                None => {
                    self.report.mode = TrajTrackerMode::Idle;
                    return output;
                }
            }
        }

        let dt = self.params.dt_s;

        let (x_ref, u_ref) = match self.reference() {
            Some(r) => r,
            None => {
                warn!("No reference point at index {}, stopping", self.index);
                self.stop(&mut output);
                return output;
            }
        };

        self.report.mode = self.mode;
        self.report.index = self.index;

        // Linearise about the reference
        if self.seed_pending {
            debug!("Seeding estimate at {:?}", x_ref.as_slice());
            self.ekf.seed(&x_ref);
            self.seed_pending = false;
        }
        let (a, b) = kin_model::jacobians(&x_ref, &u_ref, dt);

        // Correct with the latest measurement
        match self.measurement {
            Some(z) => match self.ekf.correct(&z) {
                Ok(health) => self.note_cov_health(health),
                Err(e) => {
                    warn!("Skipping estimate correction: {}", e);
                    self.report.correction_skipped = true;
                }
            },
            None => self.report.correction_skipped = true,
        }

        let x_hat = *self.ekf.estimate();
        output.state_est = Some(x_hat);

        let gain = match self.lqr.solve(&a, &b) {
            Ok(k) => {
                self.last_gain = Some(k);
                k
            }
            Err(e) => {
                self.report.gain_fallback = true;
                match self.last_gain {
                    Some(k) => {
                        debug!("LQR failed ({}), reusing previous gain", e);
                        k
                    }
                    None => {
                        warn!("LQR failed ({}), no previous gain, using feed-forward only", e);
                        Gain::zeros()
                    }
                }
            }
        };

        let u = ctrl_law::control(&x_ref, &u_ref, &x_hat, &gain);

        self.v_des_ms += dt * u[IDX_A];
        let (cmd, act_report) = self.act_map.map(self.v_des_ms, u[IDX_OMEGA]);
        self.report.act_limited = act_report.linear_limited || act_report.angular_limited;

        trace!(
            "TrajTracker [{:?} {}] u = ({:.3}, {:.3}), v_des = {:.3}",
            self.mode,
            self.index,
            u[IDX_OMEGA],
            u[IDX_A],
            self.v_des_ms
        );

        output.cmds.push(cmd);
        output.applied_control = Some(u);

        self.index += 1;
        self.advance(&mut output);

        // Predict with the control applied this tick
        let health = self.ekf.predict(&u, &a, dt);
        self.note_cov_health(health);

        if let Some(z) = self.measurement {
            let x_err_m = z[IDX_X] - x_ref[IDX_X];
            output.x_err_m = Some(x_err_m);
            self.report.x_err_m = Some(x_err_m);
        }

        self.report.cov_trace = self.ekf.covariance().trace();

        output
    }

    /// The reference state and control at the current index.
    fn reference(&self) -> Option<(State, Control)> {
        let traj = self.active.as_ref()?;
        Some((*traj.state(self.index)?, *traj.control(self.index)?))
    }

    /// Start tracking a trajectory from idle.
    fn activate(&mut self, traj: Trajectory) {
        info!(
            "Tracking new trajectory ({} points, {} braking)",
            traj.seg_len(),
            traj.tail_len()
        );

        self.v_des_ms = traj.state(0).map(|s| s[kin_model::IDX_V]).unwrap_or(0.0);
        self.active = Some(traj);
        self.mode = TrajTrackerMode::Tracking;
        self.index = 0;
        self.seed_pending = true;
        self.last_gain = None;
    }

    /// Evaluate the mode transitions after the index has been advanced.
    fn advance(&mut self, output: &mut OutputData) {
        let (seg_len, len) = match self.active {
            Some(ref t) => (t.seg_len(), t.len()),
            None => return,
        };

        if self.mode == TrajTrackerMode::Tracking && self.index >= seg_len {
            match self.queued.take() {
                Some(next) => {
                    info!(
                        "Handing off to queued trajectory ({} points)",
                        next.seg_len()
                    );
                    self.active = Some(next);
                    self.index = 0;
                    self.seed_pending = self.params.reseed_on_handoff;
                    return;
                }
                None => {
                    info!("Trajectory complete, braking over {} points", len - seg_len);
                    self.mode = TrajTrackerMode::Braking;
                }
            }
        }

        if self.mode == TrajTrackerMode::Braking && self.index >= len {
            self.stop(output);
        }
    }

    /// Return to idle, appending the stop burst to the output.
    fn stop(&mut self, output: &mut OutputData) {
        info!("Stopping, sending {} stop commands", self.params.num_stop_cmds);

        self.mode = TrajTrackerMode::Idle;
        self.active = None;
        self.index = 0;
        self.v_des_ms = 0.0;
        self.seed_pending = true;
        self.last_gain = None;

        output
            .cmds
            .extend(std::iter::repeat(DriveCmd::stop()).take(self.params.num_stop_cmds));
    }

    fn note_cov_health(&mut self, health: CovHealth) {
        if health != CovHealth::Ok {
            self.report.cov_repaired = true;
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::kin_model::IDX_V;
    use comms_if::tc::traj::{ControlMsg, StateMsg};
    use util::module::State as _;

    fn act_map_params() -> act_map::Params {
        let ch = act_map::ChannelParams {
            deadband: 0.0,
            coeffs: vec![1.0, 0.0],
            min_output: -1.0,
            max_output: 1.0,
        };
        act_map::Params {
            linear: ch.clone(),
            angular: ch,
        }
    }

    fn tracker(seg_len: usize) -> TrajTracker {
        TrajTracker::new(
            Params {
                seg_len,
                braking_tail_steps: 3,
                ..Default::default()
            },
            act_map_params(),
        )
        .unwrap()
    }

    fn line_msg(n: usize, v: f64) -> NominalTrajectory {
        let mut s = State::new(0.0, 0.0, 0.0, v);
        let u = Control::zeros();
        let mut states = Vec::new();
        for _ in 0..n {
            states.push(StateMsg { x: s[0], y: s[1], theta: s[2], v: s[3] });
            s = kin_model::step(&s, &u, 0.2);
        }
        NominalTrajectory {
            dt_s: 0.2,
            states,
            controls: vec![ControlMsg::default(); n],
        }
    }

    #[test]
    fn test_idle_produces_nothing() {
        let mut t = tracker(4);
        let out = t.tick();
        assert!(out.cmds.is_empty());
        assert!(out.state_est.is_none());
        assert_eq!(t.mode(), TrajTrackerMode::Idle);
    }

    #[test]
    fn test_uninitialised_proc() {
        let mut t = TrajTracker::default();
        assert!(matches!(
            t.proc(&InputData::default()),
            Err(TrajCtrlError::NotInitialised)
        ));
    }

    #[test]
    fn test_mode_sequence() {
        let mut t = tracker(4);
        t.receive_trajectory(&line_msg(4, 0.5)).unwrap();
        assert_eq!(t.mode(), TrajTrackerMode::Tracking);

        for i in 0..4 {
            assert_eq!(t.index(), i);
            let out = t.tick();
            assert_eq!(out.cmds.len(), 1);
        }
        assert_eq!(t.mode(), TrajTrackerMode::Braking);

        for _ in 0..2 {
            t.tick();
        }
        let out = t.tick();
        assert_eq!(t.mode(), TrajTrackerMode::Idle);
        assert_eq!(t.index(), 0);
        assert!(t.active().is_none());
        assert!(out.cmds.iter().filter(|c| c.is_stop()).count() >= 5);
    }

    #[test]
    fn test_queue_replacement() {
        let mut t = tracker(4);
        t.receive_trajectory(&line_msg(4, 0.5)).unwrap();
        t.tick();

        t.receive_trajectory(&line_msg(5, 0.3)).unwrap();
        t.receive_trajectory(&line_msg(6, 0.2)).unwrap();
        assert!(t.report.queued_replaced);
        assert_eq!(t.queued().map(|q| q.len()), Some(6));
        assert_eq!(t.active().map(|a| a.len()), Some(7));
    }

    #[test]
    fn test_queued_after_braking_starts_next_tick() {
        let mut t = tracker(2);
        t.receive_trajectory(&line_msg(2, 0.5)).unwrap();
        t.tick();
        t.tick();
        assert_eq!(t.mode(), TrajTrackerMode::Braking);

        t.receive_trajectory(&line_msg(3, 0.2)).unwrap();
        for _ in 0..3 {
            t.tick();
        }
        assert_eq!(t.mode(), TrajTrackerMode::Idle);
        assert!(t.queued().is_some());

        let out = t.tick();
        assert_eq!(t.mode(), TrajTrackerMode::Tracking);
        assert_eq!(t.index(), 1);
        assert_eq!(out.state_est.map(|s| s[IDX_V]), Some(0.2));
    }

    #[test]
    fn test_gain_fallback_at_rest() {
        let mut t = tracker(3);
        t.receive_trajectory(&line_msg(3, 0.0)).unwrap();

        let (out, rpt) = t.proc(&InputData::default()).unwrap();
        assert!(rpt.gain_fallback);
        assert!(rpt.correction_skipped);
        assert_eq!(out.applied_control, Some(Control::zeros()));
    }

    #[test]
    fn test_singular_innovation_skips_correction() {
        // Zero seed covariance and zero noise on a measured component
        let mut t = TrajTracker::new(
            Params {
                seg_len: 4,
                braking_tail_steps: 3,
                p0_diag: [0.0; 4],
                r_ekf_diag: vec![0.0, 0.1, 0.001],
                ..Default::default()
            },
            act_map_params(),
        )
        .unwrap();
        t.receive_trajectory(&line_msg(4, 0.5)).unwrap();
        let x_ref = *t.active().and_then(|a| a.state(0)).unwrap();

        let input = InputData {
            trajectories: vec![],
            measurement: Some(State::new(-0.2, 0.1, 0.0, 0.5)),
        };
        let (out, rpt) = t.proc(&input).unwrap();

        // Estimate left at the seed, command still sent and the estimate predicted
        assert!(rpt.correction_skipped);
        assert_eq!(out.state_est, Some(x_ref));
        assert_eq!(out.cmds.len(), 1);
        let u = out.applied_control.unwrap();
        assert_eq!(*t.estimate(), kin_model::step(&x_ref, &u, 0.2));
        assert_eq!(t.index(), 1);
        assert!(rpt.cov_trace > 0.0 && rpt.cov_trace.is_finite());

        // Process noise makes the next correction possible
        let (out, rpt) = t.proc(&input).unwrap();
        assert!(!rpt.correction_skipped);
        assert_eq!(rpt.index, 1);
        assert_eq!(out.cmds.len(), 1);
        assert!(out.state_est.unwrap().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_measurement_feedback() {
        let mut t = tracker(4);
        t.receive_trajectory(&line_msg(4, 0.5)).unwrap();

        // Robot measured behind the reference and to the left of it
        let input = InputData {
            trajectories: vec![],
            measurement: Some(State::new(-0.2, 0.1, 0.0, 0.5)),
        };
        let (out, rpt) = t.proc(&input).unwrap();

        assert!(!rpt.gain_fallback);
        assert!(!rpt.correction_skipped);
        let u = out.applied_control.unwrap();
        assert!(u[IDX_A] > 0.0, "should speed up, got {}", u[IDX_A]);
        assert!(u[IDX_OMEGA] < 0.0, "should turn right, got {}", u[IDX_OMEGA]);
        assert!((out.x_err_m.unwrap() + 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_rejected_trajectory_flagged() {
        let mut t = tracker(4);
        let mut msg = line_msg(4, 0.5);
        msg.controls.pop();

        let input = InputData {
            trajectories: vec![msg],
            measurement: None,
        };
        let (out, rpt) = t.proc(&input).unwrap();
        assert!(rpt.traj_rejected);
        assert!(out.cmds.is_empty());
        assert_eq!(t.mode(), TrajTrackerMode::Idle);
    }
}
