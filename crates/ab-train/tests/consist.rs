//! Coupling, uncoupling and angle cocks on a running train.

use ab_train::{End, LocomotiveParams, SettingValue, Train, TrainError, UnitId};

const DT: f64 = 0.01;

fn charged_k_cars(n: usize, psig: f64) -> (Train, Vec<UnitId>) {
    let mut train = Train::new();
    let mut ids = Vec::new();
    for _ in 0..n {
        let car = train.add_car("K").unwrap();
        if let Some(&last) = ids.last() {
            train.couple(last, car).unwrap();
        }
        ids.push(car);
    }
    train.charge(psig);
    (train, ids)
}

fn steps(train: &mut Train, n: usize) {
    for _ in 0..n {
        train.step(DT);
    }
}

#[test]
fn uncoupled_ends_hold_pressure() {
    let (mut train, ids) = charged_k_cars(3, 70.0);
    train.uncouple(ids[1], ids[2]).unwrap();
    steps(&mut train, 1_000);
    for &id in &ids {
        let car = train.brake(id).unwrap();
        assert!((car.pipe_psig() - 70.0).abs() < 1e-6);
        assert!(car.cyl_psig() < 1e-6);
    }
}

#[test]
fn opening_a_free_end_dumps_the_pipe() {
    let (mut train, ids) = charged_k_cars(3, 70.0);
    train.uncouple(ids[1], ids[2]).unwrap();
    train.set_coupling_open(ids[1], End::Next, true).unwrap();
    steps(&mut train, 1_000);

    for &id in &ids[..2] {
        let car = train.brake(id).unwrap();
        assert!(car.pipe_psig() < 10.0, "pipe at {}", car.pipe_psig());
        assert_eq!(car.state_name(0), Some("service"));
        assert!(car.cyl_psig() > 20.0, "cylinder at {}", car.cyl_psig());
    }
    // The separated car has its own closed pipe.
    let cut = train.brake(ids[2]).unwrap();
    assert!((cut.pipe_psig() - 70.0).abs() < 1e-6);
}

#[test]
fn recoupling_shares_pipe_air() {
    let (mut train, ids) = charged_k_cars(2, 70.0);
    train.uncouple(ids[0], ids[1]).unwrap();
    train.brake_mut(ids[1]).unwrap().set_cut_out(true);
    train.brake_mut(ids[1]).unwrap().set_pipe_psig(30.0);
    train.couple(ids[0], ids[1]).unwrap();
    train.brake_mut(ids[0]).unwrap().set_cut_out(true);

    steps(&mut train, 6_000);
    let a = train.brake(ids[0]).unwrap().pipe_psig();
    let b = train.brake(ids[1]).unwrap().pipe_psig();
    assert!((a - b).abs() < 2.0, "{a} vs {b}");
    assert!((0.5 * (a + b) - 50.0).abs() < 0.5);
}

#[test]
fn cut_out_car_passes_pipe_air() {
    let (mut train, ids) = charged_k_cars(3, 70.0);
    train
        .get_mut(ids[1])
        .unwrap()
        .apply_setting("cutout", &SettingValue::Scalar(1.0))
        .unwrap();
    train.set_coupling_open(ids[2], End::Next, true).unwrap();
    steps(&mut train, 1_000);

    let middle = train.brake(ids[1]).unwrap();
    assert!(middle.is_cut_out());
    assert!(middle.cyl_psig() < 1e-6);
    // The head car still sees the reduction through the cut-out car.
    let head = train.brake(ids[0]).unwrap();
    assert!(head.pipe_psig() < 10.0);
    assert!(head.cyl_psig() > 20.0);
}

#[test]
fn remove_leaves_neighbours_closed() {
    let (mut train, ids) = charged_k_cars(3, 70.0);
    let removed = train.remove(ids[1]).unwrap();
    assert_eq!(removed.brake().valve_name(), "K");
    steps(&mut train, 500);
    for &id in &[ids[0], ids[2]] {
        let car = train.brake(id).unwrap();
        assert!((car.pipe_psig() - 70.0).abs() < 1e-6);
    }
    assert_eq!(train.couple(ids[0], ids[1]), Err(TrainError::UnknownUnit));
}

#[test]
fn unknown_valve_falls_back_to_default() {
    let mut train = Train::new();
    let id = train.add_car("no-such-valve").unwrap();
    assert_eq!(train.brake(id).unwrap().valve_name(), "K");
}

#[test]
fn reopened_hose_keeps_unmatched_conduits_closed() {
    let mut train = Train::new();
    let loco = train.add_locomotive("H6", LocomotiveParams::default()).unwrap();
    let car = train.add_car("K").unwrap();
    train.couple(loco, car).unwrap();
    train.charge(90.0);

    train.set_coupling_open(loco, End::Next, false).unwrap();
    train.set_coupling_open(loco, End::Next, true).unwrap();
    assert!(train.brake(loco).unwrap().coupling(End::Next).open);
    steps(&mut train, 3_000);

    let l = train.locomotive_mut(loco).unwrap();
    let control = l.brake().tank_psig("control_pipe").unwrap();
    assert!(control > 89.5, "control pipe at {control}");
    assert!(l.main_res_psig() > 139.0, "main reservoir at {}", l.main_res_psig());
    assert!(!l.pump_on());
    assert!((train.brake(car).unwrap().pipe_psig() - 90.0).abs() < 0.5);
}
