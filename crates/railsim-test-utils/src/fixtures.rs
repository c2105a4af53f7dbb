//! Reusable rolling stock, infrastructure, and schedule fixtures.
//!
//! - [`fast_train`]: a 400 m, 900 t passenger train rated 300 km/h.
//! - [`slow_freight`]: a 600 m, 1600 t freight train rated 100 km/h.
//! - [`line_infra`]: a single track cut into consecutive routes.
//! - [`junction_infra`]: two lines merging into a shared route pair.

use std::sync::Arc;

use railsim_core::SimTime;
use railsim_engine::TrainSchedule;
use railsim_infra::{AspectSet, Infra, InfraBuilder};
use railsim_physics::{RollingResistance, RollingStock, TractiveEffortCurve, TractivePoint};

pub const FAST_TRAIN: &str = "fast";
pub const SLOW_FREIGHT: &str = "freight";

pub fn fast_train() -> RollingStock {
    RollingStock {
        id: FAST_TRAIN.into(),
        length: 400.0,
        mass: 900_000.0,
        inertia_coefficient: 1.05,
        max_speed: 83.3,
        rolling_resistance: RollingResistance {
            a: 2_000.0,
            b: 20.0,
            c: 6.0,
        },
        tractive_effort: TractiveEffortCurve::new([
            TractivePoint {
                speed: 0.0,
                force: 400_000.0,
            },
            TractivePoint {
                speed: 30.0,
                force: 350_000.0,
            },
            TractivePoint {
                speed: 83.3,
                force: 100_000.0,
            },
        ]),
        service_deceleration: 0.5,
    }
}

pub fn slow_freight() -> RollingStock {
    RollingStock {
        id: SLOW_FREIGHT.into(),
        length: 600.0,
        mass: 1_600_000.0,
        inertia_coefficient: 1.06,
        max_speed: 27.8,
        rolling_resistance: RollingResistance {
            a: 6_000.0,
            b: 60.0,
            c: 10.0,
        },
        tractive_effort: TractiveEffortCurve::new([
            TractivePoint {
                speed: 0.0,
                force: 250_000.0,
            },
            TractivePoint {
                speed: 27.8,
                force: 120_000.0,
            },
        ]),
        service_deceleration: 0.3,
    }
}

/// A single track with one section and one route per entry of
/// `route_lengths`.
///
/// Route `R{i}` crosses section `S{i}`, starts at signal `SIG{i}`, and
/// ends at `SIG{i+1}`; the last route ends at a buffer stop.
pub fn line_infra(route_lengths: &[f64]) -> Arc<Infra> {
    let mut b = InfraBuilder::new();
    let sections: Vec<_> = (0..route_lengths.len())
        .map(|i| b.add_section(format!("S{i}")).unwrap())
        .collect();
    let signals: Vec<_> = (0..route_lengths.len())
        .map(|i| b.add_signal(format!("SIG{i}"), AspectSet::ALL).unwrap())
        .collect();
    for (i, length) in route_lengths.iter().enumerate() {
        b.add_route(
            format!("R{i}"),
            &[(sections[i], *length)],
            Some(signals[i]),
            signals.get(i + 1).copied(),
        )
        .unwrap();
    }
    Arc::new(b.build().unwrap())
}

/// Two approach lines merging onto a shared exit.
///
/// ```text
///   SA --RA--> SIGXA --RXA--\
///                             SX -- SY (buffer)
///   SB --RB--> SIGXB --RXB--/
/// ```
///
/// `RXA` and `RXB` both cross `SX` then `SY`, so they conflict.
pub fn junction_infra() -> Arc<Infra> {
    let mut b = InfraBuilder::new();
    let sa = b.add_section("SA").unwrap();
    let sb = b.add_section("SB").unwrap();
    let sx = b.add_section("SX").unwrap();
    let sy = b.add_section("SY").unwrap();
    let sig_a = b.add_signal("SIGA", AspectSet::ALL).unwrap();
    let sig_b = b.add_signal("SIGB", AspectSet::ALL).unwrap();
    let sig_xa = b.add_signal("SIGXA", AspectSet::ALL).unwrap();
    let sig_xb = b.add_signal("SIGXB", AspectSet::ALL).unwrap();
    b.add_route("RA", &[(sa, 3_000.0)], Some(sig_a), Some(sig_xa))
        .unwrap();
    b.add_route("RB", &[(sb, 3_000.0)], Some(sig_b), Some(sig_xb))
        .unwrap();
    b.add_route("RXA", &[(sx, 500.0), (sy, 4_000.0)], Some(sig_xa), None)
        .unwrap();
    b.add_route("RXB", &[(sx, 500.0), (sy, 4_000.0)], Some(sig_xb), None)
        .unwrap();
    Arc::new(b.build().unwrap())
}

/// A standing-start schedule over `routes` with no stop, limit,
/// gradient, or allowance.
pub fn schedule(name: &str, rolling_stock: &str, departure_time: SimTime, routes: &[&str]) -> TrainSchedule {
    TrainSchedule {
        name: name.into(),
        rolling_stock: rolling_stock.into(),
        departure_time,
        initial_speed: 0.0,
        routes: routes.iter().map(|r| (*r).to_string()).collect(),
        stops: Vec::new(),
        speed_limits: Vec::new(),
        grades: Vec::new(),
        allowances: Vec::new(),
    }
}
