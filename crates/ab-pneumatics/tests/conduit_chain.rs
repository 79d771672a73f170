//! Integration test: a chain of brake pipe segments equalising.
//!
//! Chain: [c0] <-> [c1] <-> [c2], outer ends closed.
//!
//! Demonstrates:
//! - two-phase update (speeds from a snapshot, then boundary exchange)
//! - mass conservation across links
//! - pressures equalising without blowing up

use ab_core::units::m;
use ab_pneumatics::{AirVolume, ConduitLink, ConduitState, FlowConduit};

fn chain(psig: [f64; 3]) -> Vec<FlowConduit> {
    let mut pipes: Vec<FlowConduit> = psig
        .iter()
        .map(|&p| {
            let mut c = FlowConduit::brake_pipe(m(15.0)).unwrap();
            c.set_psig(p);
            c
        })
        .collect();
    for i in 0..pipes.len() {
        if i > 0 {
            pipes[i].set_prev_link(ConduitLink::joined());
        }
        if i + 1 < pipes.len() {
            pipes[i].set_next_link(ConduitLink::joined());
        }
    }
    pipes
}

fn step(pipes: &mut [FlowConduit], dt: f64) {
    let before: Vec<ConduitState> = pipes.iter().map(FlowConduit::state).collect();
    for (i, pipe) in pipes.iter_mut().enumerate() {
        let prev = i.checked_sub(1).map(|j| &before[j]);
        let next = before.get(i + 1);
        pipe.update_air_speed(dt, prev, next);
    }

    let after: Vec<ConduitState> = pipes.iter().map(FlowConduit::state).collect();
    for (i, pipe) in pipes.iter_mut().enumerate() {
        let prev = i.checked_sub(1).map(|j| &after[j]);
        let next = after.get(i + 1);
        pipe.exchange_flows(prev, next);
    }
}

fn total_mass(pipes: &[FlowConduit]) -> f64 {
    pipes.iter().map(|p| p.mass_kg()).sum()
}

#[test]
fn chain_conserves_mass() {
    let mut pipes = chain([90.0, 50.0, 50.0]);
    let m0 = total_mass(&pipes);

    for _ in 0..2_000 {
        step(&mut pipes, 0.01);
    }

    let m1 = total_mass(&pipes);
    assert!(
        ((m1 - m0) / m0).abs() < 1e-9,
        "mass drifted: {} -> {}",
        m0,
        m1
    );
}

#[test]
fn chain_equalises() {
    let mut pipes = chain([90.0, 50.0, 50.0]);

    // Air starts moving from the charged segment toward the far end.
    step(&mut pipes, 0.01);
    assert!(pipes[0].air_speed() > 0.0);
    assert!(pipes[0].psig() < 90.0);
    assert!(pipes[1].psig() > 50.0);

    for _ in 0..6_000 {
        step(&mut pipes, 0.01);
    }

    let psig: Vec<f64> = pipes.iter().map(|p| p.psig()).collect();
    let hi = psig.iter().cloned().fold(f64::MIN, f64::max);
    let lo = psig.iter().cloned().fold(f64::MAX, f64::min);
    assert!(hi - lo < 2.0, "segments did not equalise: {:?}", psig);

    // Equal volumes, so the mean gauge pressure is preserved.
    let mean = psig.iter().sum::<f64>() / 3.0;
    assert!((mean - 190.0 / 3.0).abs() < 0.5, "mean drifted: {}", mean);
    for p in &psig {
        assert!(p.is_finite());
    }
}

#[test]
fn open_rear_end_vents_chain() {
    let mut pipes = chain([70.0, 70.0, 70.0]);
    pipes[2].set_next_open(true);

    for _ in 0..3_000 {
        step(&mut pipes, 0.01);
    }

    // 30 s with the rear angle cock open empties the pipe.
    for p in &pipes {
        assert!(p.psig() < 10.0, "pipe still charged: {}", p.psig());
    }
}
