//! Built-in valve types.
//!
//! Sizes are the usual freight/locomotive proportions: a 2½:1 auxiliary reservoir to
//! cylinder ratio, so a full service from 70 psi equalises near 50 psi. Orifice
//! areas are tuned for a 10 ms tick.

use ab_core::units::{cu_in, m, m2, m3, psi};

use crate::builder::{PassageSpec, Transitions, ValveConfigBuilder};
use crate::config::ValveConfig;
use crate::error::ValveResult;
use crate::slots::{
    APP_CHAMBER, AUX_RES, BRAKE_CYL, BRAKE_PIPE, CONTROL_PIPE, EMERGENCY_RES, MAIN_RES,
    QUICK_ACTION, QUICK_SERVICE,
};

/// Brake pipe carried by one freight car (m).
pub const CAR_PIPE_M: f64 = 15.0;
/// Brake pipe carried by one locomotive (m).
pub const LOCO_PIPE_M: f64 = 20.0;

pub const AUX_RES_CU_IN: f64 = 2500.0;
pub const BRAKE_CYL_CU_IN: f64 = 1000.0;
pub const EMERGENCY_RES_CU_IN: f64 = 3500.0;
pub const QUICK_ACTION_CU_IN: f64 = 200.0;

/// Charging groove: pipe into the reservoirs.
pub const FEED_AREA: f64 = 1.2e-6;
/// Service port: auxiliary reservoir into the cylinder.
pub const SERVICE_AREA: f64 = 4e-6;
/// Cylinder exhaust with the retainer handle down.
pub const RELEASE_AREA: f64 = 8e-6;

const RELEASE: &str = "release";
const SERVICE: &str = "service";
const LAP: &str = "lap";
const EMERGENCY: &str = "emergency";

/// Names the registry can build.
pub const BUILTIN_NAMES: [&str; 5] = ["K", "AB", "H6", "L", "AMM"];

/// Build a built-in valve by (upper-case) name.
pub fn builtin(name: &str) -> Option<ValveResult<ValveConfig>> {
    Some(match name {
        "K" => k(),
        "AB" => ab(),
        "H6" => h6(),
        "L" => l(),
        "AMM" => amm(),
        _ => return None,
    })
}

fn add_retainers(b: &mut ValveConfigBuilder) {
    b.add_retainer_setting("EX", m2(RELEASE_AREA), psi(0.0))
        .add_retainer_setting("LP", m2(RELEASE_AREA / 4.0), psi(10.0))
        .add_retainer_setting("HP", m2(RELEASE_AREA / 4.0), psi(20.0))
        .add_retainer_setting("SD", m2(RELEASE_AREA / 8.0), psi(0.0));
}

/// Release/service/lap portion sensing pipe against auxiliary reservoir.
fn add_triple_portion(b: &mut ValveConfigBuilder, charge_emergency_res: bool) {
    b.add_piston(BRAKE_PIPE, AUX_RES)
        .add_state(RELEASE, Transitions::new().down(psi(-1.0), SERVICE))
        .add_passage(PassageSpec::between(BRAKE_PIPE, AUX_RES, m2(FEED_AREA)).one_way());
    if charge_emergency_res {
        b.add_passage(PassageSpec::between(BRAKE_PIPE, EMERGENCY_RES, m2(FEED_AREA)).one_way());
    }
    b.add_passage(PassageSpec::vent(BRAKE_CYL, m2(RELEASE_AREA)))
        .add_state(SERVICE, Transitions::new().up(psi(-0.3), LAP))
        .add_passage(PassageSpec::between(AUX_RES, BRAKE_CYL, m2(SERVICE_AREA)))
        .add_state(
            LAP,
            Transitions::new()
                .up(psi(1.5), RELEASE)
                .down(psi(-1.0), SERVICE),
        );
}

/// Plain freight triple valve.
pub fn k() -> ValveResult<ValveConfig> {
    let mut b = ValveConfigBuilder::new("K");
    b.add_conduit(BRAKE_PIPE, m(CAR_PIPE_M))
        .add_tank(AUX_RES, cu_in(AUX_RES_CU_IN))
        .add_tank(BRAKE_CYL, cu_in(BRAKE_CYL_CU_IN));
    add_triple_portion(&mut b, false);
    add_retainers(&mut b);
    b.build()
}

/// Freight control valve: service portion plus an emergency portion that watches a
/// quick-action chamber trailing the pipe through a choke.
pub fn ab() -> ValveResult<ValveConfig> {
    let mut b = ValveConfigBuilder::new("AB");
    b.add_conduit(BRAKE_PIPE, m(CAR_PIPE_M))
        .add_tank(AUX_RES, cu_in(AUX_RES_CU_IN))
        .add_tank(EMERGENCY_RES, cu_in(EMERGENCY_RES_CU_IN))
        .add_tank(BRAKE_CYL, cu_in(BRAKE_CYL_CU_IN))
        .add_tank(QUICK_ACTION, cu_in(QUICK_ACTION_CU_IN));
    add_triple_portion(&mut b, true);

    // Service-rate reductions keep the chamber within a psi or so of the pipe.
    b.add_piston(BRAKE_PIPE, QUICK_ACTION)
        .add_state("charge", Transitions::new().down(psi(-8.0), EMERGENCY))
        .add_passage(PassageSpec::between(BRAKE_PIPE, QUICK_ACTION, m2(2e-6)))
        .add_state(EMERGENCY, Transitions::new().up(psi(-1.0), "emergency_hold"))
        .add_passage(PassageSpec::vent(BRAKE_PIPE, m2(5e-5)))
        .add_passage(PassageSpec::between(EMERGENCY_RES, BRAKE_CYL, m2(1.2e-5)))
        .add_passage(PassageSpec::between(AUX_RES, BRAKE_CYL, m2(8e-6)))
        .add_passage(PassageSpec::vent(QUICK_ACTION, m2(1e-6)))
        .add_state(
            "emergency_hold",
            Transitions::new()
                .up(psi(5.0), "charge")
                .down(psi(-8.0), EMERGENCY),
        )
        .add_passage(PassageSpec::between(EMERGENCY_RES, BRAKE_CYL, m2(1.2e-5)));
    add_retainers(&mut b);
    b.build()
}

/// Locomotive distributing valve. The triple portion drives an application chamber;
/// a relay portion follows it with main reservoir air into the cylinder.
pub fn h6() -> ValveResult<ValveConfig> {
    let mut b = ValveConfigBuilder::new("H6");
    b.add_conduit(BRAKE_PIPE, m(LOCO_PIPE_M))
        .add_tank(AUX_RES, cu_in(1000.0))
        .add_tank(APP_CHAMBER, cu_in(400.0))
        .add_tank(BRAKE_CYL, cu_in(500.0))
        .add_tank(MAIN_RES, m3(0.8))
        .add_conduit(CONTROL_PIPE, m(LOCO_PIPE_M));

    b.add_piston(BRAKE_PIPE, AUX_RES)
        .add_state(RELEASE, Transitions::new().down(psi(-1.0), SERVICE))
        .add_passage(PassageSpec::between(BRAKE_PIPE, AUX_RES, m2(FEED_AREA)).one_way())
        .add_passage(PassageSpec::vent(APP_CHAMBER, m2(5e-6)))
        .add_state(SERVICE, Transitions::new().up(psi(-0.3), LAP))
        .add_passage(PassageSpec::between(AUX_RES, APP_CHAMBER, m2(3e-6)))
        .add_state(
            LAP,
            Transitions::new()
                .up(psi(1.5), RELEASE)
                .down(psi(-1.0), SERVICE),
        );

    b.add_piston(APP_CHAMBER, BRAKE_CYL)
        .add_state("released", Transitions::new().up(psi(1.0), "apply"))
        .add_passage(PassageSpec::vent(BRAKE_CYL, m2(1e-5)))
        .add_state("apply", Transitions::new().down(psi(0.2), LAP))
        .add_passage(PassageSpec::between(MAIN_RES, BRAKE_CYL, m2(1e-5)).one_way())
        .add_state(
            LAP,
            Transitions::new()
                .up(psi(1.0), "apply")
                .down(psi(-1.0), "released"),
        );
    b.build()
}

/// Passenger triple valve with an emergency reservoir and a direct pipe-to-cylinder
/// vent on sudden reductions.
pub fn l() -> ValveResult<ValveConfig> {
    let mut b = ValveConfigBuilder::new("L");
    b.add_conduit(BRAKE_PIPE, m(LOCO_PIPE_M))
        .add_tank(AUX_RES, cu_in(AUX_RES_CU_IN))
        .add_tank(EMERGENCY_RES, cu_in(AUX_RES_CU_IN))
        .add_tank(BRAKE_CYL, cu_in(BRAKE_CYL_CU_IN));

    b.add_piston(BRAKE_PIPE, AUX_RES)
        .add_state(RELEASE, Transitions::new().down(psi(-1.0), SERVICE))
        .add_passage(PassageSpec::between(BRAKE_PIPE, AUX_RES, m2(FEED_AREA)).one_way())
        .add_passage(PassageSpec::between(BRAKE_PIPE, EMERGENCY_RES, m2(FEED_AREA)).one_way())
        .add_passage(PassageSpec::vent(BRAKE_CYL, m2(RELEASE_AREA)))
        .add_state(
            SERVICE,
            Transitions::new()
                .up(psi(-0.3), LAP)
                .down(psi(-15.0), EMERGENCY),
        )
        .add_passage(PassageSpec::between(AUX_RES, BRAKE_CYL, m2(SERVICE_AREA)))
        .add_state(
            LAP,
            Transitions::new()
                .up(psi(1.5), RELEASE)
                .down(psi(-1.0), SERVICE),
        )
        .add_state(EMERGENCY, Transitions::new().up(psi(1.5), RELEASE))
        .add_passage(PassageSpec::between(AUX_RES, BRAKE_CYL, m2(1e-5)))
        .add_passage(PassageSpec::between(EMERGENCY_RES, BRAKE_CYL, m2(1e-5)))
        .add_passage(PassageSpec::between(BRAKE_PIPE, BRAKE_CYL, m2(2e-5)).one_way());
    b.build()
}

/// Automatic triple valve with quick service: the first reduction dumps a little
/// pipe air into a bulb so the reduction propagates faster.
pub fn amm() -> ValveResult<ValveConfig> {
    let mut b = ValveConfigBuilder::new("AMM");
    b.add_conduit(BRAKE_PIPE, m(CAR_PIPE_M))
        .add_tank(AUX_RES, cu_in(AUX_RES_CU_IN))
        .add_tank(BRAKE_CYL, cu_in(BRAKE_CYL_CU_IN))
        .add_tank(QUICK_SERVICE, cu_in(60.0));

    b.add_piston(BRAKE_PIPE, AUX_RES)
        .add_state(RELEASE, Transitions::new().down(psi(-1.0), "quick_service"))
        .add_passage(PassageSpec::between(BRAKE_PIPE, AUX_RES, m2(FEED_AREA)).one_way())
        .add_passage(PassageSpec::vent(BRAKE_CYL, m2(RELEASE_AREA)))
        .add_passage(PassageSpec::vent(QUICK_SERVICE, m2(2e-6)))
        .add_state(
            "quick_service",
            Transitions::new()
                .up(psi(-0.3), LAP)
                .down(psi(-3.0), SERVICE),
        )
        .add_passage(PassageSpec::between(BRAKE_PIPE, QUICK_SERVICE, m2(4e-6)))
        .add_passage(PassageSpec::between(AUX_RES, BRAKE_CYL, m2(SERVICE_AREA)))
        .add_state(
            SERVICE,
            Transitions::new()
                .up(psi(-0.3), LAP)
                .down(psi(-15.0), EMERGENCY),
        )
        .add_passage(PassageSpec::between(AUX_RES, BRAKE_CYL, m2(SERVICE_AREA)))
        .add_state(
            LAP,
            Transitions::new()
                .up(psi(1.5), RELEASE)
                .down(psi(-1.0), SERVICE),
        )
        .add_state(EMERGENCY, Transitions::new().up(psi(1.5), RELEASE))
        .add_passage(PassageSpec::between(AUX_RES, BRAKE_CYL, m2(1e-5)))
        .add_passage(PassageSpec::between(BRAKE_PIPE, BRAKE_CYL, m2(2e-5)).one_way());
    b.add_retainer_setting("EX", m2(RELEASE_AREA), psi(0.0))
        .add_retainer_setting("HP", m2(RELEASE_AREA / 4.0), psi(20.0));
    b.build()
}
