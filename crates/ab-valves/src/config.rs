//! Frozen valve configuration and the automaton it drives.

use ab_core::units::circle_area_m2;
use ab_core::units::constants::ATM_PA;
use ab_pneumatics::{AirVolume, FlowConduit, GasVolume, PneumaticResult, Tank, pair_mut};

use crate::state::ValveState;

/// How a tank slot is realised at runtime.
#[derive(Clone, Debug, PartialEq)]
pub enum TankKind {
    Reservoir {
        volume_m3: f64,
    },
    Conduit {
        length_m: f64,
        diameter_m: f64,
        friction_factor: f64,
    },
}

/// A named tank slot. Its position in [`ValveConfig::tanks`] is its canonical index.
#[derive(Clone, Debug, PartialEq)]
pub struct TankDef {
    pub name: String,
    pub kind: TankKind,
}

impl TankDef {
    pub fn is_conduit(&self) -> bool {
        matches!(self.kind, TankKind::Conduit { .. })
    }

    /// Volume of the slot (m³); conduits derive it from their bore.
    pub fn volume_m3(&self) -> f64 {
        match self.kind {
            TankKind::Reservoir { volume_m3 } => volume_m3,
            TankKind::Conduit {
                length_m,
                diameter_m,
                ..
            } => length_m * circle_area_m2(diameter_m),
        }
    }

    /// Fresh runtime volume at atmospheric pressure with closed conduit ends.
    pub fn instantiate(&self) -> PneumaticResult<Tank> {
        Ok(match self.kind {
            TankKind::Reservoir { volume_m3 } => Tank::from(GasVolume::from_m3(volume_m3)?),
            TankKind::Conduit {
                length_m,
                diameter_m,
                friction_factor,
            } => Tank::from(FlowConduit::from_si(length_m, diameter_m, friction_factor)?),
        })
    }
}

/// A fixed orifice opened by a state.
#[derive(Clone, Debug, PartialEq)]
pub struct Passage {
    pub from: usize,
    /// `None` vents to atmosphere.
    pub to: Option<usize>,
    pub area_m2: f64,
    /// Only flow `from -> to`; blocked while the destination is at or above the source.
    pub one_way: bool,
    /// Absolute pressure (Pa) at which the destination stops filling.
    pub max_pressure_pa: Option<f64>,
}

/// One state of a piston, with successors already resolved to indices.
#[derive(Clone, Debug, PartialEq)]
pub struct StateDef {
    pub name: String,
    /// Differential (Pa) above which the piston moves to `up_next`.
    pub up_threshold_pa: f64,
    /// Differential (Pa) below which the piston moves to `down_next`.
    pub down_threshold_pa: f64,
    pub up_next: usize,
    pub down_next: usize,
    pub passages: Vec<Passage>,
}

/// A pressure-differential sensing automaton: `p[up_tank] - p[down_tank]` drives it.
#[derive(Clone, Debug, PartialEq)]
pub struct Piston {
    pub up_tank: usize,
    pub down_tank: usize,
    pub states: Vec<StateDef>,
}

/// Retainer position: cylinder exhaust orifice and the gauge pressure it holds.
#[derive(Clone, Debug, PartialEq)]
pub struct RetainerSetting {
    pub name: String,
    pub area_m2: f64,
    /// Gauge pressure (Pa) below which the cylinder exhaust closes.
    pub threshold_pa: f64,
}

/// Immutable description of one valve type. Built by
/// [`ValveConfigBuilder`](crate::ValveConfigBuilder); there is no way to mutate it
/// afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct ValveConfig {
    pub(crate) name: String,
    pub(crate) tanks: Vec<TankDef>,
    pub(crate) pistons: Vec<Piston>,
    pub(crate) retainers: Vec<RetainerSetting>,
    pub(crate) brake_pipe: usize,
    pub(crate) aux_res: usize,
    pub(crate) brake_cyl: usize,
}

impl ValveConfig {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tanks(&self) -> &[TankDef] {
        &self.tanks
    }

    pub fn pistons(&self) -> &[Piston] {
        &self.pistons
    }

    pub fn retainers(&self) -> &[RetainerSetting] {
        &self.retainers
    }

    pub fn brake_pipe(&self) -> usize {
        self.brake_pipe
    }

    pub fn aux_res(&self) -> usize {
        self.aux_res
    }

    pub fn brake_cyl(&self) -> usize {
        self.brake_cyl
    }

    pub fn tank_index(&self, name: &str) -> Option<usize> {
        self.tanks.iter().position(|t| t.name == name)
    }

    /// Tank indices of the conduit slots, in declaration order. The position in this
    /// list is the conduit's ordinal used when pairing with a neighbouring car.
    pub fn conduit_indices(&self) -> Vec<usize> {
        self.tanks
            .iter()
            .enumerate()
            .filter(|(_, t)| t.is_conduit())
            .map(|(i, _)| i)
            .collect()
    }

    pub fn initial_state(&self) -> ValveState {
        ValveState::INITIAL
    }

    /// Name of the state `piston` is in, if both exist.
    pub fn state_name(&self, state: ValveState, piston: usize) -> Option<&str> {
        let p = self.pistons.get(piston)?;
        p.states.get(state.piston(piston)).map(|s| s.name.as_str())
    }

    /// Tanks that the initial state exhausts to atmosphere. A charged, released
    /// car holds these at atmospheric pressure.
    pub fn vented_at_rest(&self) -> Vec<usize> {
        let mut vented: Vec<usize> = self
            .pistons
            .iter()
            .filter_map(|p| p.states.first())
            .flat_map(|s| s.passages.iter())
            .filter(|p| p.to.is_none())
            .map(|p| p.from)
            .collect();
        vented.sort_unstable();
        vented.dedup();
        vented
    }

    /// Allocate one runtime volume per tank slot, in slot order.
    pub fn instantiate_tanks(&self) -> PneumaticResult<Vec<Tank>> {
        self.tanks.iter().map(TankDef::instantiate).collect()
    }

    /// One automaton step. Reads tank pressures only; the same inputs always give
    /// the same output.
    ///
    /// A piston field holding an index past its state list is reset to 0.
    pub fn next_state<T: AirVolume>(&self, state: ValveState, tanks: &[T]) -> ValveState {
        let mut next = state;
        for (i, piston) in self.pistons.iter().enumerate() {
            let current = state.piston(i);
            let Some(def) = piston.states.get(current) else {
                next = next.with_piston(i, 0);
                continue;
            };
            let (Some(up), Some(down)) = (tanks.get(piston.up_tank), tanks.get(piston.down_tank))
            else {
                continue;
            };
            let diff = up.pressure_pa() - down.pressure_pa();
            let target = if diff > def.up_threshold_pa {
                def.up_next
            } else if diff < def.down_threshold_pa {
                def.down_next
            } else {
                current
            };
            next = next.with_piston(i, target);
        }
        next
    }

    /// Run every passage of every piston's active state, in declaration order.
    ///
    /// `retainer` selects the cylinder exhaust when the valve has retainer settings;
    /// indices past the end use the last setting.
    pub fn apply_passages<T: AirVolume>(
        &self,
        state: ValveState,
        dt: f64,
        tanks: &mut [T],
        retainer: usize,
    ) {
        for (i, piston) in self.pistons.iter().enumerate() {
            let Some(def) = piston.states.get(state.piston(i)) else {
                continue;
            };
            for passage in &def.passages {
                self.apply_passage(passage, dt, tanks, retainer);
            }
        }
    }

    fn apply_passage<T: AirVolume>(
        &self,
        passage: &Passage,
        dt: f64,
        tanks: &mut [T],
        retainer: usize,
    ) {
        match passage.to {
            Some(to) => {
                let Some((src, dst)) = pair_mut(tanks, passage.from, to) else {
                    return;
                };
                if passage.one_way && dst.pressure_pa() >= src.pressure_pa() {
                    return;
                }
                if passage
                    .max_pressure_pa
                    .is_some_and(|ceiling| dst.pressure_pa() >= ceiling)
                {
                    return;
                }
                src.move_air_through(dst, passage.area_m2, dt);
            }
            None => {
                let Some(src) = tanks.get_mut(passage.from) else {
                    return;
                };
                match self.retainer_for(passage.from, retainer) {
                    Some(setting) => {
                        if src.pressure_pa() > ATM_PA + setting.threshold_pa {
                            src.vent(setting.area_m2, dt);
                        }
                    }
                    None => {
                        src.vent(passage.area_m2, dt);
                    }
                }
            }
        }
    }

    fn retainer_for(&self, tank: usize, retainer: usize) -> Option<&RetainerSetting> {
        if tank != self.brake_cyl {
            return None;
        }
        let last = self.retainers.len().checked_sub(1)?;
        self.retainers.get(retainer.min(last))
    }
}
