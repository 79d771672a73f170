//! Incremental valve builder.

use std::collections::HashMap;

use ab_core::numeric::{ensure_finite, ensure_positive};
use ab_core::units::{Area, Length, Pressure, Volume};
use ab_pneumatics::conduit::{BRAKE_PIPE_BORE_IN, DEFAULT_FRICTION_FACTOR};

use crate::config::{Passage, Piston, RetainerSetting, StateDef, TankDef, TankKind, ValveConfig};
use crate::error::{ValveError, ValveResult};
use crate::slots;
use crate::state::{MAX_PISTONS, MAX_STATES_PER_PISTON};

/// Successor names for a state. A missing direction never fires.
#[derive(Clone, Debug, Default)]
pub struct Transitions {
    up: Option<(f64, String)>,
    down: Option<(f64, String)>,
}

impl Transitions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move to `next` when the piston differential rises above `threshold`.
    pub fn up(mut self, threshold: Pressure, next: impl Into<String>) -> Self {
        self.up = Some((threshold.value, next.into()));
        self
    }

    /// Move to `next` when the piston differential falls below `threshold`.
    pub fn down(mut self, threshold: Pressure, next: impl Into<String>) -> Self {
        self.down = Some((threshold.value, next.into()));
        self
    }
}

/// A passage referring to tanks by name.
#[derive(Clone, Debug)]
pub struct PassageSpec {
    from: String,
    to: Option<String>,
    area_m2: f64,
    one_way: bool,
    max_pressure_pa: Option<f64>,
}

impl PassageSpec {
    pub fn between(from: impl Into<String>, to: impl Into<String>, area: Area) -> Self {
        Self {
            from: from.into(),
            to: Some(to.into()),
            area_m2: area.value,
            one_way: false,
            max_pressure_pa: None,
        }
    }

    /// Exhaust to atmosphere. From the brake cylinder this goes through the retainer.
    pub fn vent(from: impl Into<String>, area: Area) -> Self {
        Self {
            from: from.into(),
            to: None,
            area_m2: area.value,
            one_way: false,
            max_pressure_pa: None,
        }
    }

    pub fn one_way(mut self) -> Self {
        self.one_way = true;
        self
    }

    /// Stop filling once the destination reaches `limit` (absolute).
    pub fn max_pressure(mut self, limit: Pressure) -> Self {
        self.max_pressure_pa = Some(limit.value);
        self
    }
}

#[derive(Clone, Debug)]
struct RawState {
    name: String,
    transitions: Transitions,
    passages: Vec<PassageSpec>,
}

#[derive(Clone, Debug)]
struct RawPiston {
    up_tank: String,
    down_tank: String,
    states: Vec<RawState>,
}

/// Builder for a [`ValveConfig`].
///
/// Tanks, pistons and retainers are declared by name in any order; a state belongs
/// to the last declared piston and a passage to the last declared state. Nothing is
/// resolved until `build()`, which either returns a fully linked config or the first
/// problem it found.
#[derive(Clone, Debug)]
pub struct ValveConfigBuilder {
    name: String,
    tanks: Vec<TankDef>,
    pistons: Vec<RawPiston>,
    retainers: Vec<RetainerSetting>,
    error: Option<ValveError>,
}

impl ValveConfigBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tanks: Vec::new(),
            pistons: Vec::new(),
            retainers: Vec::new(),
            error: None,
        }
    }

    /// Add a reservoir slot.
    pub fn add_tank(&mut self, name: impl Into<String>, volume: Volume) -> &mut Self {
        self.tanks.push(TankDef {
            name: name.into(),
            kind: TankKind::Reservoir {
                volume_m3: volume.value,
            },
        });
        self
    }

    /// Add a pipe slot with the standard 1¼" train-line bore.
    pub fn add_conduit(&mut self, name: impl Into<String>, length: Length) -> &mut Self {
        self.add_conduit_with(
            name,
            length,
            ab_core::units::inch(BRAKE_PIPE_BORE_IN),
            DEFAULT_FRICTION_FACTOR,
        )
    }

    pub fn add_conduit_with(
        &mut self,
        name: impl Into<String>,
        length: Length,
        diameter: Length,
        friction_factor: f64,
    ) -> &mut Self {
        self.tanks.push(TankDef {
            name: name.into(),
            kind: TankKind::Conduit {
                length_m: length.value,
                diameter_m: diameter.value,
                friction_factor,
            },
        });
        self
    }

    /// Start a piston sensing `p[up_tank] - p[down_tank]`.
    pub fn add_piston(
        &mut self,
        up_tank: impl Into<String>,
        down_tank: impl Into<String>,
    ) -> &mut Self {
        self.pistons.push(RawPiston {
            up_tank: up_tank.into(),
            down_tank: down_tank.into(),
            states: Vec::new(),
        });
        self
    }

    /// Add a state to the last piston. The first state of a piston is its initial state.
    pub fn add_state(&mut self, name: impl Into<String>, transitions: Transitions) -> &mut Self {
        match self.pistons.last_mut() {
            Some(piston) => piston.states.push(RawState {
                name: name.into(),
                transitions,
                passages: Vec::new(),
            }),
            None => self.fail(ValveError::Orphan {
                valve: self.name.clone(),
                what: "state",
            }),
        }
        self
    }

    /// Add a passage to the last state of the last piston.
    pub fn add_passage(&mut self, passage: PassageSpec) -> &mut Self {
        match self.pistons.last_mut().and_then(|p| p.states.last_mut()) {
            Some(state) => state.passages.push(passage),
            None => self.fail(ValveError::Orphan {
                valve: self.name.clone(),
                what: "passage",
            }),
        }
        self
    }

    /// Add a retainer position. `threshold` is the gauge pressure it retains.
    pub fn add_retainer_setting(
        &mut self,
        name: impl Into<String>,
        area: Area,
        threshold: Pressure,
    ) -> &mut Self {
        self.retainers.push(RetainerSetting {
            name: name.into(),
            area_m2: area.value,
            threshold_pa: threshold.value,
        });
        self
    }

    fn fail(&mut self, err: ValveError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }

    /// Resolve every name and validate the layout.
    pub fn build(self) -> ValveResult<ValveConfig> {
        if let Some(err) = self.error {
            return Err(err);
        }
        let valve = self.name;

        let index = index_tanks(&valve, &self.tanks)?;
        let slot = |tank: &'static str| {
            index.get(tank).copied().ok_or_else(|| ValveError::MissingSlot {
                valve: valve.clone(),
                tank,
            })
        };
        let brake_pipe = slot(slots::BRAKE_PIPE)?;
        let aux_res = slot(slots::AUX_RES)?;
        let brake_cyl = slot(slots::BRAKE_CYL)?;

        if self.tanks.iter().position(TankDef::is_conduit) != Some(brake_pipe) {
            return Err(ValveError::Layout {
                valve,
                what: "brake pipe must be the first conduit",
            });
        }

        if self.pistons.is_empty() {
            return Err(ValveError::NoPiston { valve });
        }
        if self.pistons.len() > MAX_PISTONS {
            return Err(ValveError::TooManyPistons {
                valve,
                count: self.pistons.len(),
            });
        }

        let pistons = self
            .pistons
            .iter()
            .enumerate()
            .map(|(i, raw)| resolve_piston(&valve, &index, i, raw))
            .collect::<ValveResult<Vec<_>>>()?;

        for r in &self.retainers {
            let ok = ensure_positive(r.area_m2, "retainer area must be positive")
                .and_then(|_| ensure_finite(r.threshold_pa, "retainer threshold must be finite"));
            if let Err(e) = ok {
                return Err(non_physical(&valve, e));
            }
            if r.threshold_pa < 0.0 {
                return Err(ValveError::NonPhysical {
                    valve,
                    what: "retainer threshold must not be negative",
                });
            }
        }

        Ok(ValveConfig {
            name: valve,
            tanks: self.tanks,
            pistons,
            retainers: self.retainers,
            brake_pipe,
            aux_res,
            brake_cyl,
        })
    }
}

fn non_physical(valve: &str, err: ab_core::AbError) -> ValveError {
    let what = match err {
        ab_core::AbError::NonFinite { what, .. }
        | ab_core::AbError::InvalidArg { what } => what,
    };
    ValveError::NonPhysical {
        valve: valve.to_string(),
        what,
    }
}

fn index_tanks<'a>(valve: &str, tanks: &'a [TankDef]) -> ValveResult<HashMap<&'a str, usize>> {
    let mut index = HashMap::with_capacity(tanks.len());
    for (i, tank) in tanks.iter().enumerate() {
        if index.insert(tank.name.as_str(), i).is_some() {
            return Err(ValveError::DuplicateTank {
                valve: valve.to_string(),
                tank: tank.name.clone(),
            });
        }
        let checked = match tank.kind {
            TankKind::Reservoir { volume_m3 } => {
                ensure_positive(volume_m3, "tank volume must be positive")
            }
            TankKind::Conduit {
                length_m,
                diameter_m,
                friction_factor,
            } => ensure_positive(length_m, "conduit length must be positive")
                .and_then(|_| ensure_positive(diameter_m, "conduit diameter must be positive"))
                .and_then(|_| {
                    ensure_positive(friction_factor, "friction factor must be positive")
                }),
        };
        checked.map_err(|e| non_physical(valve, e))?;
    }
    Ok(index)
}

fn lookup_tank(valve: &str, index: &HashMap<&str, usize>, name: &str) -> ValveResult<usize> {
    index
        .get(name)
        .copied()
        .ok_or_else(|| ValveError::UnknownTank {
            valve: valve.to_string(),
            tank: name.to_string(),
        })
}

fn resolve_piston(
    valve: &str,
    tanks: &HashMap<&str, usize>,
    piston: usize,
    raw: &RawPiston,
) -> ValveResult<Piston> {
    let up_tank = lookup_tank(valve, tanks, &raw.up_tank)?;
    let down_tank = lookup_tank(valve, tanks, &raw.down_tank)?;

    if raw.states.is_empty() {
        return Err(ValveError::EmptyPiston {
            valve: valve.to_string(),
            piston,
        });
    }
    if raw.states.len() > MAX_STATES_PER_PISTON {
        return Err(ValveError::TooManyStates {
            valve: valve.to_string(),
            piston,
            count: raw.states.len(),
        });
    }

    let mut names: HashMap<&str, usize> = HashMap::with_capacity(raw.states.len());
    for (i, state) in raw.states.iter().enumerate() {
        if names.insert(state.name.as_str(), i).is_some() {
            return Err(ValveError::DuplicateState {
                valve: valve.to_string(),
                piston,
                state: state.name.clone(),
            });
        }
    }

    let mut states = Vec::with_capacity(raw.states.len());
    for (i, state) in raw.states.iter().enumerate() {
        let successor = |edge: &Option<(f64, String)>, never: f64| -> ValveResult<(f64, usize)> {
            match edge {
                None => Ok((never, i)),
                Some((threshold, target)) => {
                    let threshold = ensure_finite(*threshold, "state threshold must be finite")
                        .map_err(|e| non_physical(valve, e))?;
                    let next = names.get(target.as_str()).copied().ok_or_else(|| {
                        ValveError::UnknownState {
                            valve: valve.to_string(),
                            state: state.name.clone(),
                            target: target.clone(),
                        }
                    })?;
                    Ok((threshold, next))
                }
            }
        };
        let (up_threshold_pa, up_next) = successor(&state.transitions.up, f64::INFINITY)?;
        let (down_threshold_pa, down_next) =
            successor(&state.transitions.down, f64::NEG_INFINITY)?;

        let passages = state
            .passages
            .iter()
            .map(|p| resolve_passage(valve, tanks, p))
            .collect::<ValveResult<Vec<_>>>()?;

        states.push(StateDef {
            name: state.name.clone(),
            up_threshold_pa,
            down_threshold_pa,
            up_next,
            down_next,
            passages,
        });
    }

    Ok(Piston {
        up_tank,
        down_tank,
        states,
    })
}

fn resolve_passage(
    valve: &str,
    tanks: &HashMap<&str, usize>,
    spec: &PassageSpec,
) -> ValveResult<Passage> {
    let from = lookup_tank(valve, tanks, &spec.from)?;
    let to = spec
        .to
        .as_deref()
        .map(|name| lookup_tank(valve, tanks, name))
        .transpose()?;
    if to == Some(from) {
        return Err(ValveError::Layout {
            valve: valve.to_string(),
            what: "passage connects a tank to itself",
        });
    }
    let area_m2 = ensure_positive(spec.area_m2, "passage area must be positive")
        .map_err(|e| non_physical(valve, e))?;
    let max_pressure_pa = spec
        .max_pressure_pa
        .map(|p| ensure_positive(p, "passage pressure limit must be positive"))
        .transpose()
        .map_err(|e| non_physical(valve, e))?;
    Ok(Passage {
        from,
        to,
        area_m2,
        one_way: spec.one_way,
        max_pressure_pa,
    })
}
