//! Unit arena, coupling and the two-phase tick.

use ab_pneumatics::ConduitState;
use ab_valves::ValveRegistry;
use slotmap::{SecondaryMap, SlotMap};
use tracing::debug;

use crate::error::{TrainError, TrainResult};
use crate::id::UnitId;
use crate::locomotive::{LocomotiveBrakeUnit, LocomotiveParams};
use crate::settings::SettingValue;
use crate::unit::{BrakeUnit, End};

/// Anything that can be coupled into a train.
#[derive(Clone, Debug)]
pub enum Unit {
    Car(BrakeUnit),
    Locomotive(LocomotiveBrakeUnit),
}

impl Unit {
    pub fn brake(&self) -> &BrakeUnit {
        match self {
            Unit::Car(b) => b,
            Unit::Locomotive(l) => l.brake(),
        }
    }

    pub fn brake_mut(&mut self) -> &mut BrakeUnit {
        match self {
            Unit::Car(b) => b,
            Unit::Locomotive(l) => l.brake_mut(),
        }
    }

    pub fn as_locomotive(&self) -> Option<&LocomotiveBrakeUnit> {
        match self {
            Unit::Locomotive(l) => Some(l),
            Unit::Car(_) => None,
        }
    }

    pub fn as_locomotive_mut(&mut self) -> Option<&mut LocomotiveBrakeUnit> {
        match self {
            Unit::Locomotive(l) => Some(l),
            Unit::Car(_) => None,
        }
    }

    pub fn update_air_speeds(
        &mut self,
        dt: f64,
        prev: Option<&[ConduitState]>,
        next: Option<&[ConduitState]>,
    ) {
        match self {
            Unit::Car(b) => b.update_air_speeds(dt, prev, next),
            Unit::Locomotive(l) => l.update_air_speeds(dt, prev, next),
        }
    }

    pub fn update_pressures(
        &mut self,
        dt: f64,
        prev: Option<&[ConduitState]>,
        next: Option<&[ConduitState]>,
    ) {
        match self {
            Unit::Car(b) => b.update_pressures(dt, prev, next),
            Unit::Locomotive(l) => l.update_pressures(dt, prev, next),
        }
    }

    pub fn charge(&mut self, psig: f64) {
        match self {
            Unit::Car(b) => b.charge(psig),
            Unit::Locomotive(l) => l.charge(psig),
        }
    }

    pub fn apply_setting(&mut self, key: &str, value: &SettingValue) -> TrainResult<()> {
        match self {
            Unit::Car(b) => b.apply_setting(key, value),
            Unit::Locomotive(l) => l.apply_setting(key, value),
        }
    }
}

impl From<BrakeUnit> for Unit {
    fn from(b: BrakeUnit) -> Self {
        Unit::Car(b)
    }
}

impl From<LocomotiveBrakeUnit> for Unit {
    fn from(l: LocomotiveBrakeUnit) -> Self {
        Unit::Locomotive(l)
    }
}

/// Owns every unit and the links between them.
///
/// Units refer to their neighbours by [`UnitId`] only. Coupling and uncoupling update
/// both units in one call, so the tick never sees a one-sided joint.
#[derive(Debug, Default)]
pub struct Train {
    registry: ValveRegistry,
    units: SlotMap<UnitId, Unit>,
    /// Insertion order; the tick and the gauges walk units in this order.
    order: Vec<UnitId>,
}

impl Train {
    pub fn new() -> Self {
        Self::default()
    }

    /// Train drawing valve configs from an existing registry.
    pub fn with_registry(registry: ValveRegistry) -> Self {
        Self {
            registry,
            ..Self::default()
        }
    }

    pub fn registry(&self) -> &ValveRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ValveRegistry {
        &mut self.registry
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Unit ids in insertion order.
    pub fn ids(&self) -> &[UnitId] {
        &self.order
    }

    pub fn get(&self, id: UnitId) -> Option<&Unit> {
        self.units.get(id)
    }

    pub fn get_mut(&mut self, id: UnitId) -> Option<&mut Unit> {
        self.units.get_mut(id)
    }

    pub fn brake(&self, id: UnitId) -> TrainResult<&BrakeUnit> {
        self.get(id).map(Unit::brake).ok_or(TrainError::UnknownUnit)
    }

    pub fn brake_mut(&mut self, id: UnitId) -> TrainResult<&mut BrakeUnit> {
        self.get_mut(id)
            .map(Unit::brake_mut)
            .ok_or(TrainError::UnknownUnit)
    }

    pub fn locomotive_mut(&mut self, id: UnitId) -> TrainResult<&mut LocomotiveBrakeUnit> {
        self.get_mut(id)
            .and_then(Unit::as_locomotive_mut)
            .ok_or(TrainError::UnknownUnit)
    }

    /// Add an uncoupled unit.
    pub fn add(&mut self, unit: impl Into<Unit>) -> UnitId {
        let id = self.units.insert(unit.into());
        self.order.push(id);
        id
    }

    /// Add an uncoupled car with the named valve.
    pub fn add_car(&mut self, valve: &str) -> TrainResult<UnitId> {
        let config = self.registry.get(valve)?;
        Ok(self.add(BrakeUnit::new(config)?))
    }

    /// Add an uncoupled locomotive with the named valve.
    pub fn add_locomotive(&mut self, valve: &str, params: LocomotiveParams) -> TrainResult<UnitId> {
        let config = self.registry.get(valve)?;
        let loco = LocomotiveBrakeUnit::new(BrakeUnit::new(config)?, params)?;
        Ok(self.add(loco))
    }

    /// Add a unit and couple it behind the last unit added, if there is one.
    pub fn push(&mut self, unit: impl Into<Unit>) -> TrainResult<UnitId> {
        let tail = self.order.last().copied();
        let id = self.add(unit);
        if let Some(tail) = tail {
            if let Err(err) = self.couple(tail, id) {
                self.units.remove(id);
                self.order.pop();
                return Err(err);
            }
        }
        Ok(id)
    }

    /// Couple `rear` behind `front`. Both joints are made open.
    pub fn couple(&mut self, front: UnitId, rear: UnitId) -> TrainResult<()> {
        if front == rear {
            return Err(TrainError::InvalidArg {
                what: "cannot couple a unit to itself",
            });
        }
        let front_unit = self.brake(front)?;
        let rear_unit = self.brake(rear)?;
        if front_unit.coupling(End::Next).unit.is_some() {
            return Err(TrainError::AlreadyCoupled { end: End::Next });
        }
        if rear_unit.coupling(End::Prev).unit.is_some() {
            return Err(TrainError::AlreadyCoupled { end: End::Prev });
        }
        let front_conduits = front_unit.conduit_count();
        let rear_conduits = rear_unit.conduit_count();

        self.brake_mut(front)?.link(End::Next, rear, rear_conduits);
        self.brake_mut(rear)?.link(End::Prev, front, front_conduits);
        debug!(?front, ?rear, "coupled");
        Ok(())
    }

    /// Separate two coupled units. Both new free ends are left closed.
    pub fn uncouple(&mut self, front: UnitId, rear: UnitId) -> TrainResult<()> {
        let joined = self.brake(front)?.coupling(End::Next).unit == Some(rear)
            && self.brake(rear)?.coupling(End::Prev).unit == Some(front);
        if !joined {
            return Err(TrainError::NotCoupled);
        }
        self.brake_mut(front)?.unlink(End::Next);
        self.brake_mut(rear)?.unlink(End::Prev);
        debug!(?front, ?rear, "uncoupled");
        Ok(())
    }

    /// Take a unit out of the train, uncoupling it from both neighbours first.
    pub fn remove(&mut self, id: UnitId) -> TrainResult<Unit> {
        let brake = self.brake(id)?;
        let prev = brake.coupling(End::Prev).unit;
        let next = brake.coupling(End::Next).unit;
        if let Some(prev) = prev {
            self.uncouple(prev, id)?;
        }
        if let Some(next) = next {
            self.uncouple(id, next)?;
        }
        self.order.retain(|&u| u != id);
        self.units.remove(id).ok_or(TrainError::UnknownUnit)
    }

    /// Open or close the angle cock at `end` of `id`. On a coupled end the
    /// neighbour's facing cock is set too, so the hose passes air both ways or not
    /// at all.
    pub fn set_coupling_open(&mut self, id: UnitId, end: End, open: bool) -> TrainResult<()> {
        let peer = self.brake(id)?.coupling(end).unit;
        self.brake_mut(id)?.set_coupling_open(end, open);
        if let Some(peer) = peer {
            self.brake_mut(peer)?.set_coupling_open(end.opposite(), open);
        }
        Ok(())
    }

    /// The consist containing `id`, front to rear.
    pub fn consist(&self, id: UnitId) -> TrainResult<Vec<UnitId>> {
        let mut front = id;
        while let Some(prev) = self.brake(front)?.coupling(End::Prev).unit {
            if prev == id {
                break;
            }
            front = prev;
        }
        let mut out = vec![front];
        let mut cur = front;
        while let Some(next) = self.brake(cur)?.coupling(End::Next).unit {
            if next == front {
                break;
            }
            out.push(next);
            cur = next;
        }
        Ok(out)
    }

    /// Charge every unit to `psig`.
    pub fn charge(&mut self, psig: f64) {
        for unit in self.units.values_mut() {
            unit.charge(psig);
        }
    }

    /// Largest step that keeps every conduit stable.
    pub fn stable_dt(&self) -> f64 {
        self.units
            .values()
            .map(|u| u.brake().stable_dt())
            .fold(f64::INFINITY, f64::min)
    }

    fn snapshot(&self) -> SecondaryMap<UnitId, Vec<ConduitState>> {
        self.units
            .iter()
            .map(|(id, u)| (id, u.brake().conduit_states()))
            .collect()
    }

    /// Phase 1 on every unit.
    pub fn update_air_speeds(&mut self, dt: f64) {
        let snap = self.snapshot();
        for &id in &self.order {
            let Some(unit) = self.units.get_mut(id) else {
                continue;
            };
            let (prev, next) = neighbours(&snap, unit);
            unit.update_air_speeds(dt, prev, next);
        }
    }

    /// Phase 2 on every unit.
    pub fn update_pressures(&mut self, dt: f64) {
        let snap = self.snapshot();
        for &id in &self.order {
            let Some(unit) = self.units.get_mut(id) else {
                continue;
            };
            let (prev, next) = neighbours(&snap, unit);
            unit.update_pressures(dt, prev, next);
        }
    }

    /// One full tick.
    pub fn step(&mut self, dt: f64) {
        self.update_air_speeds(dt);
        self.update_pressures(dt);
    }
}

fn neighbours<'a>(
    snap: &'a SecondaryMap<UnitId, Vec<ConduitState>>,
    unit: &Unit,
) -> (Option<&'a [ConduitState]>, Option<&'a [ConduitState]>) {
    let side = |end: End| {
        unit.brake()
            .coupling(end)
            .unit
            .and_then(|peer| snap.get(peer))
            .map(Vec::as_slice)
    };
    (side(End::Prev), side(End::Next))
}
