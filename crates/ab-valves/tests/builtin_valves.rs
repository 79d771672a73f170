//! Built-in valves driven directly against their own tank arrays, no train.

use ab_pneumatics::{AirVolume, Tank};
use ab_valves::{ValveConfig, ValveRegistry, ValveState};

struct Bench {
    cfg: std::sync::Arc<ValveConfig>,
    tanks: Vec<Tank>,
    state: ValveState,
}

impl Bench {
    fn charged(name: &str, psig: f64) -> Self {
        let cfg = ValveRegistry::new().get(name).unwrap();
        let mut tanks = cfg.instantiate_tanks().unwrap();
        let vented = cfg.vented_at_rest();
        for (i, t) in tanks.iter_mut().enumerate() {
            if !vented.contains(&i) {
                t.set_psig(psig);
            }
        }
        Self {
            state: cfg.initial_state(),
            cfg,
            tanks,
        }
    }

    fn step(&mut self, dt: f64) {
        self.state = self.cfg.next_state(self.state, &self.tanks);
        self.cfg.apply_passages(self.state, dt, &mut self.tanks, 0);
    }

    fn psig(&self, slot: &str) -> f64 {
        self.tanks[self.cfg.tank_index(slot).unwrap()].psig()
    }

    fn set_pipe(&mut self, psig: f64) {
        let bp = self.cfg.brake_pipe();
        self.tanks[bp].set_psig(psig);
    }

    fn state_name(&self, piston: usize) -> &str {
        self.cfg.state_name(self.state, piston).unwrap()
    }
}

#[test]
fn k_service_then_release() {
    let mut car = Bench::charged("K", 70.0);
    car.set_pipe(50.0);
    for _ in 0..3_000 {
        car.step(0.01);
        car.set_pipe(50.0);
    }
    assert_eq!(car.state_name(0), "lap");
    let cyl = car.psig("brake_cyl");
    assert!(cyl > 40.0 && cyl < 52.0, "cylinder at {cyl}");
    assert!((car.psig("aux_res") - 50.0).abs() < 1.0);

    for _ in 0..15_000 {
        car.set_pipe(70.0);
        car.step(0.01);
    }
    assert_eq!(car.state_name(0), "release");
    assert!(car.psig("brake_cyl") < 1.0);
    assert!(car.psig("aux_res") > 66.0);
}

#[test]
fn ab_quick_action_ignores_service_rate() {
    let mut car = Bench::charged("AB", 70.0);
    let mut pipe = 70.0;
    for _ in 0..500 {
        pipe -= 2.0 * 0.01;
        car.set_pipe(pipe);
        car.step(0.01);
    }
    assert_eq!(car.state_name(1), "charge");
    assert!(car.psig("brake_cyl") > 0.0);
}

#[test]
fn ab_emergency_uses_both_reservoirs() {
    let mut car = Bench::charged("AB", 70.0);
    for _ in 0..300 {
        car.set_pipe(0.0);
        car.step(0.01);
    }
    assert_eq!(car.state_name(1), "emergency");
    assert!(car.psig("emergency_res") < 69.0);
    assert!(car.psig("brake_cyl") > 40.0);
}

#[test]
fn h6_relay_follows_application_chamber() {
    let mut loco = Bench::charged("H6", 90.0);
    let mr = loco.cfg.tank_index("main_res").unwrap();
    loco.tanks[mr].set_psig(140.0);

    for _ in 0..4_000 {
        loco.set_pipe(70.0);
        loco.step(0.01);
    }
    let app = loco.psig("app_chamber");
    let cyl = loco.psig("brake_cyl");
    assert!(app > 20.0, "application chamber at {app}");
    assert!((cyl - app).abs() < 2.0, "cylinder {cyl} vs chamber {app}");
    assert_eq!(loco.state_name(1), "lap");
}

#[test]
fn l_sudden_reduction_goes_to_emergency() {
    let mut car = Bench::charged("L", 70.0);
    for _ in 0..100 {
        car.set_pipe(0.0);
        car.step(0.01);
    }
    assert_eq!(car.state_name(0), "emergency");
}

#[test]
fn amm_quick_service_then_service() {
    let mut car = Bench::charged("AMM", 70.0);
    car.set_pipe(68.5);
    car.step(0.01);
    assert_eq!(car.state_name(0), "quick_service");

    for _ in 0..200 {
        car.set_pipe(60.0);
        car.step(0.01);
    }
    assert_ne!(car.state_name(0), "release");
    assert!(car.psig("brake_cyl") > 0.0);
}
