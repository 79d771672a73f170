//! Per-car brake equipment.

use std::sync::Arc;

use ab_core::units::circle_area_m2;
use ab_core::units::constants::{ATM_PA, PSI_PA};
use ab_pneumatics::{AirVolume, ConduitLink, ConduitState, FlowConduit, Tank};
use ab_valves::{ValveConfig, ValveState};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{TrainError, TrainResult};
use crate::id::UnitId;
use crate::settings::{PiecewiseLinear, SettingValue};

/// Cylinder pressure (psig) below which the rigging transmits no force.
pub const BRAKE_FORCE_THRESHOLD_PSI: f64 = 5.0;
/// Pressure above the threshold at which the multiplier saturates.
pub const BRAKE_FORCE_SPAN_PSI: f64 = 45.0;

const INCH_M: f64 = 0.0254;

/// End of a unit. `Prev` faces the front of the train.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum End {
    Prev,
    Next,
}

impl End {
    pub fn opposite(self) -> End {
        match self {
            End::Prev => End::Next,
            End::Next => End::Prev,
        }
    }
}

/// Coupler state at one end of a unit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Coupling {
    pub unit: Option<UnitId>,
    /// Angle cock open. On an uncoupled end this vents the conduits.
    pub open: bool,
}

/// Foundation brake gear turning cylinder pressure into force.
#[derive(Clone, Debug, PartialEq)]
pub struct Rigging {
    pub cylinder_diameter_m: f64,
    pub num_cylinders: u32,
    /// Cylinder psig to force multiplier; replaces the default ramp when set.
    pub force_curve: Option<PiecewiseLinear>,
}

impl Default for Rigging {
    fn default() -> Self {
        Self {
            cylinder_diameter_m: 10.0 * INCH_M,
            num_cylinders: 1,
            force_curve: None,
        }
    }
}

/// One car's brake valve and the air volumes it owns.
#[derive(Clone, Debug)]
pub struct BrakeUnit {
    config: Arc<ValveConfig>,
    tanks: Vec<Tank>,
    /// Tank index of each conduit, by ordinal.
    conduits: Vec<usize>,
    state: ValveState,
    retainer: usize,
    cut_out: bool,
    prev: Coupling,
    next: Coupling,
    rigging: Rigging,
}

impl BrakeUnit {
    /// Allocate the volumes laid out by `config`, all at atmospheric pressure.
    pub fn new(config: Arc<ValveConfig>) -> TrainResult<Self> {
        let tanks = config.instantiate_tanks()?;
        let conduits = config.conduit_indices();
        Ok(Self {
            state: config.initial_state(),
            config,
            tanks,
            conduits,
            retainer: 0,
            cut_out: false,
            prev: Coupling::default(),
            next: Coupling::default(),
            rigging: Rigging::default(),
        })
    }

    pub fn config(&self) -> &Arc<ValveConfig> {
        &self.config
    }

    pub fn valve_name(&self) -> &str {
        self.config.name()
    }

    pub fn tanks(&self) -> &[Tank] {
        &self.tanks
    }

    pub(crate) fn tank_mut(&mut self, index: usize) -> Option<&mut Tank> {
        self.tanks.get_mut(index)
    }

    pub fn conduit_count(&self) -> usize {
        self.conduits.len()
    }

    pub fn conduit(&self, ordinal: usize) -> Option<&FlowConduit> {
        let index = *self.conduits.get(ordinal)?;
        self.tanks.get(index).and_then(Tank::as_conduit)
    }

    /// Snapshot of every conduit, by ordinal.
    pub fn conduit_states(&self) -> Vec<ConduitState> {
        self.conduits
            .iter()
            .filter_map(|&i| self.tanks[i].as_conduit())
            .map(FlowConduit::state)
            .collect()
    }

    /// Smallest stable step over this unit's conduits.
    pub fn stable_dt(&self) -> f64 {
        self.conduits
            .iter()
            .filter_map(|&i| self.tanks[i].as_conduit())
            .map(FlowConduit::stable_dt)
            .fold(f64::INFINITY, f64::min)
    }

    // --- topology ---

    pub fn coupling(&self, end: End) -> Coupling {
        match end {
            End::Prev => self.prev,
            End::Next => self.next,
        }
    }

    fn coupling_mut(&mut self, end: End) -> &mut Coupling {
        match end {
            End::Prev => &mut self.prev,
            End::Next => &mut self.next,
        }
    }

    fn set_conduit_link(&mut self, end: End, f: impl Fn(usize) -> ConduitLink) {
        for (ordinal, &index) in self.conduits.iter().enumerate() {
            if let Some(c) = self.tanks[index].as_conduit_mut() {
                match end {
                    End::Prev => c.set_prev_link(f(ordinal)),
                    End::Next => c.set_next_link(f(ordinal)),
                }
            }
        }
    }

    /// Join this unit's conduits at `end` to `peer`'s, ordinal for ordinal. Conduits
    /// the peer has no match for are left as closed free ends.
    pub fn link(&mut self, end: End, peer: UnitId, peer_conduits: usize) {
        *self.coupling_mut(end) = Coupling {
            unit: Some(peer),
            open: true,
        };
        self.set_conduit_link(end, |ordinal| {
            if ordinal < peer_conduits {
                ConduitLink::joined()
            } else {
                ConduitLink::CLOSED
            }
        });
    }

    /// Drop the link at `end`; the conduits become closed free ends.
    pub fn unlink(&mut self, end: End) {
        *self.coupling_mut(end) = Coupling::default();
        self.set_conduit_link(end, |_| ConduitLink::CLOSED);
    }

    /// Open or close the angle cock at `end`. On a coupled end only the joined
    /// conduits follow the flag; conduits the peer has no match for stay dead ends.
    /// On a free end every conduit follows it.
    pub fn set_coupling_open(&mut self, end: End, open: bool) {
        let coupled = self.coupling(end).unit.is_some();
        self.coupling_mut(end).open = open;
        for &index in &self.conduits {
            if let Some(c) = self.tanks[index].as_conduit_mut() {
                let link = match end {
                    End::Prev => c.prev_link(),
                    End::Next => c.next_link(),
                };
                if coupled && !link.linked {
                    continue;
                }
                match end {
                    End::Prev => c.set_prev_open(open),
                    End::Next => c.set_next_open(open),
                }
            }
        }
    }

    // --- tick ---

    /// Phase 1. `prev`/`next` are the neighbours' conduit snapshots by ordinal.
    pub fn update_air_speeds(
        &mut self,
        dt: f64,
        prev: Option<&[ConduitState]>,
        next: Option<&[ConduitState]>,
    ) {
        for (ordinal, &index) in self.conduits.iter().enumerate() {
            if let Some(c) = self.tanks[index].as_conduit_mut() {
                c.update_air_speed(
                    dt,
                    prev.and_then(|s| s.get(ordinal)),
                    next.and_then(|s| s.get(ordinal)),
                );
            }
        }
    }

    /// Phase 2: conduit boundary flows, then the valve. A cut-out valve does nothing
    /// but the pipe still carries air through.
    pub fn update_pressures(
        &mut self,
        dt: f64,
        prev: Option<&[ConduitState]>,
        next: Option<&[ConduitState]>,
    ) {
        for (ordinal, &index) in self.conduits.iter().enumerate() {
            if let Some(c) = self.tanks[index].as_conduit_mut() {
                c.exchange_flows(
                    prev.and_then(|s| s.get(ordinal)),
                    next.and_then(|s| s.get(ordinal)),
                );
            }
        }
        if self.cut_out {
            return;
        }
        self.state = self.config.next_state(self.state, &self.tanks);
        self.config
            .apply_passages(self.state, dt, &mut self.tanks, self.retainer);
    }

    // --- gauges ---

    pub fn pipe_psig(&self) -> f64 {
        self.tanks[self.config.brake_pipe()].psig()
    }

    pub fn aux_psig(&self) -> f64 {
        self.tanks[self.config.aux_res()].psig()
    }

    pub fn cyl_psig(&self) -> f64 {
        self.tanks[self.config.brake_cyl()].psig()
    }

    pub fn tank_psig(&self, name: &str) -> Option<f64> {
        let index = self.config.tank_index(name)?;
        Some(self.tanks[index].psig())
    }

    /// Overwrite a tank's pressure. Works on cut-out units too.
    pub fn set_tank_psig(&mut self, name: &str, psig: f64) -> TrainResult<()> {
        let index = self
            .config
            .tank_index(name)
            .ok_or_else(|| TrainError::UnknownTank {
                name: name.to_string(),
            })?;
        self.tanks[index].set_psig(psig);
        Ok(())
    }

    pub fn set_pipe_psig(&mut self, psig: f64) {
        let bp = self.config.brake_pipe();
        self.tanks[bp].set_psig(psig);
    }

    pub(crate) fn set_aux_psig(&mut self, psig: f64) {
        let aux = self.config.aux_res();
        self.tanks[aux].set_psig(psig);
    }

    pub(crate) fn vent_cylinder(&mut self) {
        let bc = self.config.brake_cyl();
        self.tanks[bc].set_pressure_pa(ATM_PA);
    }

    /// Full packed state, one 4-bit field per piston.
    pub fn valve_state(&self) -> ValveState {
        self.state
    }

    /// State of the triple-valve piston.
    pub fn primary_state(&self) -> usize {
        self.state.primary()
    }

    pub fn state_name(&self, piston: usize) -> Option<&str> {
        self.config.state_name(self.state, piston)
    }

    // --- retainer ---

    pub fn retainer(&self) -> usize {
        self.retainer
    }

    pub fn retainer_name(&self) -> Option<&str> {
        self.config
            .retainers()
            .get(self.retainer)
            .map(|r| r.name.as_str())
    }

    /// Select a retainer position. Rejected if the valve has no such position.
    pub fn set_retainer(&mut self, index: usize) -> TrainResult<()> {
        let count = self.config.retainers().len();
        if index >= count {
            return Err(TrainError::OutOfRange {
                key: "retainer".into(),
                value: index as f64,
            });
        }
        if index != self.retainer {
            debug!(valve = self.valve_name(), from = self.retainer, to = index, "retainer moved");
        }
        self.retainer = index;
        Ok(())
    }

    pub fn set_retainer_by_name(&mut self, name: &str) -> TrainResult<()> {
        let index = self
            .config
            .retainers()
            .iter()
            .position(|r| r.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| TrainError::UnknownRetainer {
                name: name.to_string(),
            })?;
        self.set_retainer(index)
    }

    /// Step to the next retainer position. False at the last one.
    pub fn increment_retainer(&mut self) -> bool {
        self.set_retainer(self.retainer + 1).is_ok()
    }

    /// Step to the previous retainer position. False at the first one.
    pub fn decrement_retainer(&mut self) -> bool {
        match self.retainer.checked_sub(1) {
            Some(index) => self.set_retainer(index).is_ok(),
            None => false,
        }
    }

    // --- cut-out ---

    pub fn is_cut_out(&self) -> bool {
        self.cut_out
    }

    pub fn set_cut_out(&mut self, cut_out: bool) {
        self.cut_out = cut_out;
    }

    // --- force ---

    pub fn rigging(&self) -> &Rigging {
        &self.rigging
    }

    /// 0 below 5 psig, rising linearly to 1 at 50 psig, unless a force curve is set.
    pub fn brake_force_multiplier(&self) -> f64 {
        let psig = self.cyl_psig();
        match &self.rigging.force_curve {
            Some(curve) => curve.eval(psig).clamp(0.0, 1.0),
            None => ((psig - BRAKE_FORCE_THRESHOLD_PSI) / BRAKE_FORCE_SPAN_PSI).clamp(0.0, 1.0),
        }
    }

    /// Total piston thrust of the cylinders (N).
    pub fn cylinder_force(&self) -> f64 {
        let area = circle_area_m2(self.rigging.cylinder_diameter_m);
        let gauge = (self.cyl_psig() * PSI_PA).max(0.0);
        area * gauge * f64::from(self.rigging.num_cylinders)
    }

    // --- setup ---

    /// Charge to `psig` and release: every tank the released valve keeps at
    /// atmosphere is emptied, everything else set to `psig`, the automaton reset.
    pub fn charge(&mut self, psig: f64) {
        let vented = self.config.vented_at_rest();
        for (i, tank) in self.tanks.iter_mut().enumerate() {
            if vented.contains(&i) {
                tank.set_pressure_pa(ATM_PA);
            } else {
                tank.set_psig(psig);
            }
            if let Some(c) = tank.as_conduit_mut() {
                c.set_air_speed(0.0);
            }
        }
        self.state = self.config.initial_state();
    }

    /// Apply a named setting from the external settings reader.
    ///
    /// Keys: `cylinderdiameter` (in), `numcylinders`, `retainer` (index or name),
    /// `cutout` (0/1), `brakeforce` (curve of cylinder psig to multiplier).
    pub fn apply_setting(&mut self, key: &str, value: &SettingValue) -> TrainResult<()> {
        let result = self.try_apply_setting(key, value);
        if let Err(err) = &result {
            warn!(valve = self.valve_name(), key, %err, "setting rejected");
        }
        result
    }

    fn try_apply_setting(&mut self, key: &str, value: &SettingValue) -> TrainResult<()> {
        match (key, value) {
            ("cylinderdiameter", SettingValue::Scalar(inches)) => {
                let inches = in_range(key, *inches, 1.0, 30.0)?;
                self.rigging.cylinder_diameter_m = inches * INCH_M;
                Ok(())
            }
            ("numcylinders", SettingValue::Scalar(n)) => {
                let n = in_range(key, *n, 1.0, 16.0)?;
                if n.fract() != 0.0 {
                    return Err(TrainError::OutOfRange {
                        key: key.into(),
                        value: n,
                    });
                }
                self.rigging.num_cylinders = n as u32;
                Ok(())
            }
            ("retainer", SettingValue::Scalar(i)) => {
                if *i < 0.0 || i.fract() != 0.0 {
                    return Err(TrainError::OutOfRange {
                        key: key.into(),
                        value: *i,
                    });
                }
                self.set_retainer(*i as usize)
            }
            ("retainer", SettingValue::Text(name)) => self.set_retainer_by_name(name),
            ("cutout", SettingValue::Scalar(v)) => {
                self.set_cut_out(*v != 0.0);
                Ok(())
            }
            ("brakeforce", SettingValue::Curve(curve)) => {
                self.rigging.force_curve = Some(curve.clone());
                Ok(())
            }
            ("cylinderdiameter" | "numcylinders" | "retainer" | "cutout" | "brakeforce", _) => {
                Err(TrainError::InvalidArg {
                    what: "setting value has the wrong type",
                })
            }
            _ => Err(TrainError::UnknownSetting { key: key.into() }),
        }
    }
}

/// `value` if it lies in `[lo, hi]`, else an out-of-range error for `key`.
pub(crate) fn in_range(key: &str, value: f64, lo: f64, hi: f64) -> TrainResult<f64> {
    if value.is_finite() && (lo..=hi).contains(&value) {
        Ok(value)
    } else {
        Err(TrainError::OutOfRange {
            key: key.into(),
            value,
        })
    }
}
