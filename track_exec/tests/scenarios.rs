//! End to end tracking scenarios

use chrono::{Duration, Utc};
use comms_if::tc::traj::{ControlMsg, NominalTrajectory, StateMsg};
use track_lib::{
    act_map::{self, ChannelParams},
    data_store::InputSlots,
    kin_model::{self, Control, State, IDX_V},
    meas::{self, MocapPreproc},
    sim_client::SimPlant,
    traj_ctrl::{InputData, Params, TrajTracker, TrajTrackerMode},
};
use util::module::State as _;

const DT: f64 = 0.2;

fn act_map_params() -> act_map::Params {
    act_map::Params {
        linear: ChannelParams {
            deadband: 0.01,
            coeffs: vec![0.35, 0.9, 0.12],
            min_output: -1.0,
            max_output: 1.0,
        },
        angular: ChannelParams {
            deadband: 0.02,
            coeffs: vec![0.4, 0.05],
            min_output: -0.8,
            max_output: 0.8,
        },
    }
}

fn tracker(seg_len: usize, braking_tail_steps: usize) -> TrajTracker {
    TrajTracker::new(
        Params {
            dt_s: DT,
            seg_len,
            braking_tail_steps,
            ..Default::default()
        },
        act_map_params(),
    )
    .unwrap()
}

/// Reference states generated by the model itself from `start` with constant `u`.
fn reference(start: State, u: Control, n: usize) -> (Vec<State>, Vec<Control>) {
    let mut states = Vec::with_capacity(n);
    let mut s = start;
    for _ in 0..n {
        states.push(s);
        s = kin_model::step(&s, &u, DT);
    }
    (states, vec![u; n])
}

fn to_msg(states: &[State], controls: &[Control]) -> NominalTrajectory {
    NominalTrajectory {
        dt_s: DT,
        states: states
            .iter()
            .map(|s| StateMsg { x: s[0], y: s[1], theta: s[2], v: s[3] })
            .collect(),
        controls: controls
            .iter()
            .map(|u| ControlMsg { omega: u[0], a: u[1] })
            .collect(),
    }
}

#[test]
fn exact_measurements_give_feed_forward() {
    let mut t = tracker(10, 5);
    let (states, controls) = reference(State::new(0.0, 0.0, 0.0, 0.5), Control::new(0.0, 0.0), 10);

    t.receive_trajectory(&to_msg(&states, &controls)).unwrap();

    for k in 0..10 {
        let input = InputData {
            trajectories: vec![],
            measurement: Some(states[k]),
        };
        let (out, rpt) = t.proc(&input).unwrap();

        assert_eq!(rpt.mode, TrajTrackerMode::Tracking);
        assert_eq!(rpt.index, k);
        assert_eq!(out.applied_control, Some(controls[k]), "step {}", k);
        assert_eq!(out.state_est, Some(states[k]), "step {}", k);
        assert_eq!(out.x_err_m, Some(0.0));
        assert_eq!(out.cmds.len(), 1);
    }

    assert_eq!(t.mode(), TrajTrackerMode::Braking);
}

#[test]
fn queued_trajectory_waits_for_active_to_finish() {
    let mut t = tracker(5, 5);
    let (a_states, a_controls) =
        reference(State::new(0.0, 0.0, 0.0, 0.5), Control::new(0.0, 0.0), 5);
    let (b_states, b_controls) =
        reference(State::new(10.0, 2.0, 1.0, 0.3), Control::new(0.1, 0.0), 5);

    t.receive_trajectory(&to_msg(&a_states, &a_controls)).unwrap();
    let a = t.active().cloned().unwrap();

    for k in 0..5 {
        let trajectories = if k == 2 {
            vec![to_msg(&b_states, &b_controls)]
        } else {
            vec![]
        };

        let (_, rpt) = t
            .proc(&InputData {
                trajectories,
                measurement: None,
            })
            .unwrap();

        // Every step of A is tracked, B only waits in the queue
        assert_eq!(rpt.index, k);
        assert_eq!(rpt.mode, TrajTrackerMode::Tracking);
        if k < 4 {
            assert_eq!(t.active(), Some(&a));
            assert_eq!(t.queued().is_some(), k >= 2);
        }
    }

    // Hand-off happened at the end of A
    assert_eq!(t.index(), 0);
    assert!(t.queued().is_none());
    assert_ne!(t.active(), Some(&a));
    assert_eq!(t.mode(), TrajTrackerMode::Tracking);

    let (out, rpt) = t.proc(&InputData::default()).unwrap();
    assert_eq!(rpt.index, 0);
    assert_eq!(out.state_est, Some(b_states[0]));
    assert_eq!(out.applied_control.map(|u| u[0]), Some(0.1));
}

#[test]
fn trajectories_arriving_together_are_taken_in_order() {
    let mut t = tracker(5, 5);
    let slots = InputSlots::default();
    let (a_states, a_controls) =
        reference(State::new(0.0, 0.0, 0.0, 0.5), Control::new(0.0, 0.0), 5);
    let (b_states, b_controls) =
        reference(State::new(100.0, 0.0, 0.0, 0.5), Control::new(0.0, 0.0), 5);

    // Both arrive between two ticks of an idle tracker
    slots.set_trajectory(to_msg(&a_states, &a_controls));
    slots.set_trajectory(to_msg(&b_states, &b_controls));

    let (out, rpt) = t
        .proc(&InputData {
            trajectories: slots.take_trajectories(),
            measurement: None,
        })
        .unwrap();

    // A is tracked, B waits for it
    assert_eq!(rpt.mode, TrajTrackerMode::Tracking);
    assert!(!rpt.queued_replaced);
    assert_eq!(out.state_est, Some(a_states[0]));
    assert_eq!(t.active().and_then(|a| a.state(0)).map(|s| s[0]), Some(0.0));
    assert_eq!(t.queued().and_then(|q| q.state(0)).map(|s| s[0]), Some(100.0));
}

#[test]
fn braking_ends_with_stop_burst() {
    let tail = 5;
    let mut t = tracker(5, tail);
    let (states, controls) = reference(State::new(0.0, 0.0, 0.0, 0.5), Control::new(0.0, 0.0), 5);

    t.receive_trajectory(&to_msg(&states, &controls)).unwrap();

    for _ in 0..5 {
        let (out, _) = t.proc(&InputData::default()).unwrap();
        assert_eq!(out.cmds.len(), 1);
    }
    assert_eq!(t.mode(), TrajTrackerMode::Braking);

    let mut last_out = None;
    for k in 0..tail {
        let (out, rpt) = t.proc(&InputData::default()).unwrap();
        assert_eq!(rpt.mode, TrajTrackerMode::Braking);
        assert_eq!(rpt.index, 5 + k);

        // Braking decelerates
        assert!(out.applied_control.unwrap()[1] <= 0.0);
        last_out = Some(out);
    }

    let out = last_out.unwrap();
    assert!(out.cmds.iter().filter(|c| c.is_stop()).count() >= 5);
    assert_eq!(t.mode(), TrajTrackerMode::Idle);
    assert_eq!(t.index(), 0);
    assert!(t.active().is_none());

    // Idle afterwards, nothing more is sent
    let (out, rpt) = t.proc(&InputData::default()).unwrap();
    assert!(out.cmds.is_empty());
    assert_eq!(rpt.mode, TrajTrackerMode::Idle);
}

#[test]
fn malformed_trajectory_is_rejected() {
    let mut t = tracker(5, 5);
    let (states, controls) = reference(State::new(0.0, 0.0, 0.0, 0.5), Control::new(0.0, 0.0), 5);

    // Rejected while idle
    let short_controls = &controls[..4];
    let (_, rpt) = t
        .proc(&InputData {
            trajectories: vec![to_msg(&states, short_controls)],
            measurement: None,
        })
        .unwrap();
    assert!(rpt.traj_rejected);
    assert_eq!(t.mode(), TrajTrackerMode::Idle);

    // Rejected while tracking, the active trajectory is untouched
    t.receive_trajectory(&to_msg(&states, &controls)).unwrap();
    t.proc(&InputData::default()).unwrap();
    let active = t.active().cloned();

    let mut bad = to_msg(&states, &controls);
    bad.controls.pop();
    assert!(t.receive_trajectory(&bad).is_err());

    let (_, rpt) = t
        .proc(&InputData {
            trajectories: vec![bad],
            measurement: None,
        })
        .unwrap();

    assert!(rpt.traj_rejected);
    assert_eq!(rpt.index, 1);
    assert_eq!(t.active().cloned(), active);
    assert!(t.queued().is_none());
}

#[test]
fn closed_loop_with_simulated_plant() {
    let mut t = tracker(50, 10);
    let mut preproc = MocapPreproc::new(meas::Params::default());
    let (states, controls) = reference(State::new(0.0, 0.0, 0.0, 0.5), Control::new(0.0, 0.0), 50);

    // Robot starts to the left of the reference
    let mut plant = SimPlant::new(State::new(0.0, 0.1, 0.0, 0.5));
    let t0 = Utc::now();

    t.receive_trajectory(&to_msg(&states, &controls)).unwrap();

    let mut cycles = 0;
    while cycles < 200 {
        let pose = plant.pose(t0 + Duration::milliseconds(200 * cycles));
        let (meas, _) = preproc.process(&pose);

        let (out, rpt) = t
            .proc(&InputData {
                trajectories: vec![],
                measurement: meas,
            })
            .unwrap();

        assert!(rpt.cov_trace.is_finite());
        plant.apply(out.applied_control.as_ref(), &out.cmds, DT);

        cycles += 1;
        if t.mode() == TrajTrackerMode::Idle {
            break;
        }
    }

    assert_eq!(cycles, 60);
    assert!(plant.state().iter().all(|v| v.is_finite()));
    assert!(plant.state()[1].abs() < 0.2, "lateral error {}", plant.state()[1]);
    assert_eq!(plant.state()[IDX_V], 0.0);
}

#[test]
fn sample_trajectory_file_is_tracked() {
    let msg = NominalTrajectory::from_json(include_str!("../../trajectories/accel_curve.json"))
        .unwrap();
    let mut t = tracker(10, 5);

    t.receive_trajectory(&msg).unwrap();

    // Embedded tail used as is
    assert_eq!(t.active().map(|a| a.len()), Some(15));
    assert_eq!(t.active().map(|a| a.tail_len()), Some(5));

    let mut plant = SimPlant::new(State::zeros());
    let mut ticks = 0;
    while t.mode() != TrajTrackerMode::Idle {
        let (out, _) = t
            .proc(&InputData {
                trajectories: vec![],
                measurement: Some(*plant.state()),
            })
            .unwrap();
        plant.apply(out.applied_control.as_ref(), &out.cmds, DT);
        ticks += 1;
        assert!(ticks <= 15);
    }

    assert_eq!(ticks, 15);
    assert!((plant.state()[0] - 1.0).abs() < 0.1);
}

#[test]
fn shipped_params_are_valid() {
    let root = concat!(env!("CARGO_MANIFEST_DIR"), "/../params/");

    let params: Params = util::params::load_from_path(format!("{}traj_ctrl.toml", root)).unwrap();
    let act_map_params: act_map::Params =
        util::params::load_from_path(format!("{}act_map.toml", root)).unwrap();
    let _: meas::Params = util::params::load_from_path(format!("{}meas.toml", root)).unwrap();
    let log_params: util::logger::LogParams =
        util::params::load_from_path(format!("{}log.toml", root)).unwrap();

    assert!(log_params.min_level().is_ok());
    assert_eq!(log_params.target_levels().unwrap().len(), 3);

    assert_eq!(params.seg_len, 10);
    assert!(TrajTracker::new(params, act_map_params).is_ok());
}
