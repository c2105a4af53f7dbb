//! End-to-end runs of the simulation kernel over the shared fixtures.

use std::sync::Arc;

use railsim_core::{Change, ChangeKind, RouteStatus, SimulationError, TrainId, TrainStatus};
use railsim_engine::{
    EventType, NamedSuccessionTable, ScheduledStop, Session, SessionState, Simulation,
    SimulationConfig, TrainSchedule,
};
use railsim_infra::{AspectSet, Infra, InfraBuilder};
use railsim_physics::Allowance;
use railsim_test_utils::{
    fast_train, junction_infra, line_infra, schedule, slow_freight, CollectingSink, FAST_TRAIN,
    SLOW_FREIGHT,
};

fn junction_run(successions: &[NamedSuccessionTable]) -> (Simulation, CollectingSink) {
    let schedules = [
        schedule("A", FAST_TRAIN, 0.0, &["RA", "RXA"]),
        schedule("B", SLOW_FREIGHT, 0.0, &["RB", "RXB"]),
    ];
    let mut sim = Simulation::new(
        junction_infra(),
        &[fast_train(), slow_freight()],
        &schedules,
        successions,
        SimulationConfig::default(),
    )
    .unwrap();
    let sink = CollectingSink::new();
    sim.add_sink(Box::new(sink.clone()));
    (sim, sink)
}

fn first_arrival(sim: &mut Simulation) -> TrainId {
    sim.run_until(&[EventType::Arrival])
        .unwrap()
        .map(|e| e.train)
        .unwrap()
}

// ── Determinism ─────────────────────────────────────────────────

#[test]
fn identical_inputs_publish_identical_streams() {
    let run = || {
        let (mut sim, sink) = junction_run(&[]);
        sim.run().unwrap();
        sink.published_json()
    };
    let first = run();
    let second = run();
    assert!(!first.is_empty());
    assert_eq!(first, second);
}

#[test]
fn every_change_is_created_before_it_is_published() {
    let (mut sim, sink) = junction_run(&[]);
    sim.run().unwrap();
    let c = sink.collected();
    assert_eq!(c.created.len(), c.published.len());
    let mut open = std::collections::HashSet::new();
    for (created, seq) in &c.order {
        if *created {
            assert!(open.insert(*seq), "change {seq} created twice");
        } else {
            assert!(open.remove(seq), "change {seq} published before creation");
        }
    }
    assert!(open.is_empty());
    let seqs: Vec<u64> = c.published.iter().map(|e| e.seq.0).collect();
    let expected: Vec<u64> = (0..seqs.len() as u64).collect();
    assert_eq!(seqs, expected);
}

// ── Contention ──────────────────────────────────────────────────

#[test]
fn first_request_wins_the_junction() {
    let (mut sim, _) = junction_run(&[]);
    assert_eq!(first_arrival(&mut sim), TrainId(0));
    sim.run().unwrap();
    assert!(sim.stats().route_denials >= 1);
}

#[test]
fn succession_table_reorders_the_junction() {
    let table = NamedSuccessionTable {
        section: "SX".into(),
        trains: vec!["B".into(), "A".into()],
    };
    let (mut sim, sink) = junction_run(&[table]);
    assert_eq!(first_arrival(&mut sim), TrainId(1));
    sim.run().unwrap();
    assert!(sim.trains().iter().all(|t| t.status() == TrainStatus::Arrived));

    // RXB is reserved before RXA ever is
    let rxa = sim.infra_state().infra().route_by_name("RXA").unwrap();
    let rxb = sim.infra_state().infra().route_by_name("RXB").unwrap();
    let reservations: Vec<_> = sink
        .collected()
        .published
        .iter()
        .filter_map(|e| match &e.change {
            Change::RouteStatus(c) if c.to == RouteStatus::Reserved => Some(c.route),
            _ => None,
        })
        .filter(|r| *r == rxa || *r == rxb)
        .collect();
    assert_eq!(reservations, vec![rxb, rxa]);
}

#[test]
fn routes_are_never_held_by_two_trains() {
    let (mut sim, sink) = junction_run(&[]);
    sim.run().unwrap();
    let routes = sim.infra_state().infra().routes().len();
    let mut holders = vec![None; routes];
    for entry in &sink.collected().published {
        if let Change::RouteStatus(c) = &entry.change {
            let slot = &mut holders[c.route.index()];
            match c.to {
                RouteStatus::Reserved => {
                    assert_eq!(*slot, None, "{} reserved while held", c.route);
                    *slot = c.train;
                }
                RouteStatus::Occupied => assert_eq!(*slot, c.train),
                RouteStatus::Free => *slot = None,
            }
        }
    }
}

// ── Stops, allowances, delays ───────────────────────────────────

#[test]
fn allowance_makes_the_train_later_but_on_time() {
    let infra = line_infra(&[4_000.0, 6_000.0]);
    let run = |allowances: Vec<Allowance>| {
        let mut s = schedule("IC", FAST_TRAIN, 0.0, &["R0", "R1"]);
        s.stops = vec![ScheduledStop {
            position: 5_000.0,
            duration: 45.0,
        }];
        s.allowances = allowances;
        let mut sim = Simulation::new(
            Arc::clone(&infra),
            &[fast_train()],
            &[s],
            &[],
            SimulationConfig::default(),
        )
        .unwrap();
        sim.run().unwrap();
        let delay = sim.train_delay(TrainId(0)).unwrap();
        (sim.time(), delay)
    };
    let (plain, plain_delay) = run(Vec::new());
    let (padded, padded_delay) = run(vec![Allowance::percentage(10.0)]);
    assert!(padded > plain + 5.0, "{padded} vs {plain}");
    assert!(plain_delay.abs() < 5.0, "delay {plain_delay}");
    assert!(padded_delay.abs() < 5.0, "delay {padded_delay}");
}

#[test]
fn freight_blocks_the_following_express() {
    let infra = line_infra(&[2_000.0, 2_000.0, 2_000.0]);
    let schedules = [
        schedule("freight", SLOW_FREIGHT, 0.0, &["R0", "R1", "R2"]),
        schedule("express", FAST_TRAIN, 30.0, &["R0", "R1", "R2"]),
    ];
    let mut sim = Simulation::new(
        infra,
        &[fast_train(), slow_freight()],
        &schedules,
        &[],
        SimulationConfig::default(),
    )
    .unwrap();
    sim.run().unwrap();
    let express = sim.train_by_name("express").unwrap();
    assert!(express.has_arrived());
    assert!(sim.train_delay(express.id()).unwrap() > 30.0);
    assert!(sim.stats().events_cancelled > 0);
}

// ── Running start ───────────────────────────────────────────────

fn running_start(route_lengths: &[f64], initial_speed: f64) -> (Simulation, CollectingSink) {
    let routes: Vec<String> = (0..route_lengths.len()).map(|i| format!("R{i}")).collect();
    let routes: Vec<&str> = routes.iter().map(String::as_str).collect();
    let mut s = schedule("IC", FAST_TRAIN, 0.0, &routes);
    s.initial_speed = initial_speed;
    let mut sim = Simulation::new(
        line_infra(route_lengths),
        &[fast_train()],
        &[s],
        &[],
        SimulationConfig::default(),
    )
    .unwrap();
    let sink = CollectingSink::new();
    sim.add_sink(Box::new(sink.clone()));
    (sim, sink)
}

#[test]
fn running_start_keeps_its_speed() {
    // 40 m/s needs 1600 m to stop, far more than the first route
    let (mut sim, sink) = running_start(&[300.0, 5_000.0, 5_000.0], 40.0);
    sim.run().unwrap();
    let c = sink.collected();
    let first_leg = c
        .published
        .iter()
        .find_map(|e| match &e.change {
            Change::TrainLeg(leg) => Some((e.seq, leg.clone())),
            _ => None,
        })
        .unwrap();
    assert_eq!(first_leg.1.positions[0], 0.0);
    assert!((first_leg.1.speeds[0] - 40.0).abs() < 1e-9, "{:?}", first_leg.1.speeds[0]);
    // the second route was granted before the first leg was planned
    let r1_reserved = c
        .published
        .iter()
        .find(|e| {
            matches!(&e.change, Change::RouteStatus(r)
                if r.route.index() == 1 && r.to == RouteStatus::Reserved)
        })
        .unwrap();
    assert!(r1_reserved.seq < first_leg.0);
    assert!(sim.train(TrainId(0)).unwrap().has_arrived());
}

#[test]
fn running_start_without_room_to_brake_aborts() {
    let (mut sim, _) = running_start(&[300.0], 40.0);
    match sim.run() {
        Err(SimulationError::Physics { train, .. }) => assert_eq!(train, TrainId(0)),
        other => panic!("expected Physics, got {other:?}"),
    }
}

#[test]
fn running_start_into_a_held_route_aborts() {
    let mut moving = schedule("moving", FAST_TRAIN, 0.0, &["R0", "R1"]);
    moving.initial_speed = 10.0;
    let schedules = [schedule("first", FAST_TRAIN, 0.0, &["R0", "R1"]), moving];
    let mut sim = Simulation::new(
        line_infra(&[1_000.0, 1_000.0]),
        &[fast_train()],
        &schedules,
        &[],
        SimulationConfig::default(),
    )
    .unwrap();
    match sim.run() {
        Err(SimulationError::Physics { train, reason }) => {
            assert_eq!(train, TrainId(1));
            assert!(reason.contains("initial speed"), "{reason}");
        }
        other => panic!("expected Physics, got {other:?}"),
    }
}

// ── Failures ────────────────────────────────────────────────────

/// Two trains heading for each other over a two-section single line.
fn head_on_infra() -> Arc<Infra> {
    let mut b = InfraBuilder::new();
    let s0 = b.add_section("S0").unwrap();
    let s1 = b.add_section("S1").unwrap();
    let west = b.add_signal("W", AspectSet::ALL).unwrap();
    let mid_east = b.add_signal("ME", AspectSet::ALL).unwrap();
    let east = b.add_signal("E", AspectSet::ALL).unwrap();
    let mid_west = b.add_signal("MW", AspectSet::ALL).unwrap();
    b.add_route("W0", &[(s0, 1_000.0)], Some(west), Some(mid_east))
        .unwrap();
    b.add_route("W1", &[(s1, 1_000.0)], Some(mid_east), None)
        .unwrap();
    b.add_route("E0", &[(s1, 1_000.0)], Some(east), Some(mid_west))
        .unwrap();
    b.add_route("E1", &[(s0, 1_000.0)], Some(mid_west), None)
        .unwrap();
    Arc::new(b.build().unwrap())
}

#[test]
fn head_on_trains_deadlock() {
    let schedules = [
        schedule("east", FAST_TRAIN, 0.0, &["W0", "W1"]),
        schedule("west", FAST_TRAIN, 0.0, &["E0", "E1"]),
    ];
    let mut sim = Simulation::new(
        head_on_infra(),
        &[fast_train()],
        &schedules,
        &[],
        SimulationConfig::default(),
    )
    .unwrap();
    match sim.run() {
        Err(SimulationError::Deadlock { waiting }) => {
            assert_eq!(waiting, vec![TrainId(0), TrainId(1)]);
        }
        other => panic!("expected Deadlock, got {other:?}"),
    }
    assert!(sim
        .trains()
        .iter()
        .all(|t| t.status() == TrainStatus::WaitingForRoute));
    assert_eq!(sim.step(), Err(SimulationError::Aborted));
}

#[test]
fn signal_cascade_limit_aborts_the_run() {
    let config = SimulationConfig {
        max_signal_cascade: 1,
        ..SimulationConfig::default()
    };
    let mut sim = Simulation::new(
        line_infra(&[1_000.0, 1_000.0, 1_000.0]),
        &[fast_train()],
        &[schedule("IC", FAST_TRAIN, 0.0, &["R0", "R1", "R2"])],
        &[],
        config,
    )
    .unwrap();
    // reserving R1 changes SIG1 and then re-evaluates SIG0
    match sim.run() {
        Err(SimulationError::InterlockingViolation { reason, .. }) => {
            assert!(reason.contains("signal cascade"), "{reason}");
        }
        other => panic!("expected InterlockingViolation, got {other:?}"),
    }
    assert_eq!(sim.step(), Err(SimulationError::Aborted));
}

#[test]
fn stop_at_route_boundary_is_reached_once() {
    let mut s = schedule("IC", FAST_TRAIN, 0.0, &["R0", "R1"]);
    s.stops = vec![ScheduledStop {
        position: 1_000.0,
        duration: 0.0,
    }];
    let mut sim = Simulation::new(
        line_infra(&[1_000.0, 1_000.0]),
        &[fast_train()],
        &[s],
        &[],
        SimulationConfig::default(),
    )
    .unwrap();
    sim.run().unwrap();
    assert_eq!(sim.train(TrainId(0)).unwrap().stops_reached(), 1);
}

// ── Session ─────────────────────────────────────────────────────

#[test]
fn session_watches_only_selected_kinds() {
    let mut session = Session::new();
    session
        .init(
            junction_infra(),
            vec![fast_train(), slow_freight()],
            SimulationConfig::default(),
        )
        .unwrap();
    let extra = CollectingSink::new();
    session
        .create_simulation(
            &[
                schedule("A", FAST_TRAIN, 0.0, &["RA", "RXA"]),
                schedule("B", SLOW_FREIGHT, 0.0, &["RB", "RXB"]),
            ],
            &[],
            vec![Box::new(extra.clone())],
        )
        .unwrap();
    session.watch(&[ChangeKind::SignalAspect, ChangeKind::StopReached]);
    let event = session.run_until(&[EventType::AuthorityEnd]).unwrap();
    assert_eq!(event.map(|e| e.train), Some(TrainId(1)));
    assert_eq!(session.state(), SessionState::Paused);

    while session.run_until(&[EventType::Arrival]).unwrap().is_some() {}
    assert_eq!(session.state(), SessionState::Initialized);
    let watched = session.take_watched();
    assert!(!watched.is_empty());
    assert!(watched
        .iter()
        .all(|e| e.change.kind() == ChangeKind::SignalAspect));
    assert!(extra.collected().published.len() > watched.len());
    assert_eq!(session.train_delays().len(), 2);
}

#[test]
fn schedules_deserialize_with_defaults() {
    let json = r#"{
        "name": "RE 7",
        "rolling_stock": "fast",
        "departure_time": 120.0,
        "initial_speed": 0.0,
        "routes": ["R0"]
    }"#;
    let s: TrainSchedule = serde_json::from_str(json).unwrap();
    assert!(s.stops.is_empty() && s.allowances.is_empty());
    let mut sim = Simulation::new(
        line_infra(&[3_000.0]),
        &[fast_train()],
        &[s],
        &[],
        SimulationConfig {
            start_time: 100.0,
            ..SimulationConfig::default()
        },
    )
    .unwrap();
    sim.run().unwrap();
    assert!(sim.time() > 120.0);
}
