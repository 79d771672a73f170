//! The volumes a brake valve owns, as one closed enum.

use crate::conduit::FlowConduit;
use crate::volume::{AirVolume, GasVolume};

/// One slot of a valve's tank layout.
#[derive(Clone, Debug, PartialEq)]
pub enum Tank {
    Reservoir(GasVolume),
    Conduit(FlowConduit),
}

impl Tank {
    pub fn is_conduit(&self) -> bool {
        matches!(self, Tank::Conduit(_))
    }

    pub fn as_conduit(&self) -> Option<&FlowConduit> {
        match self {
            Tank::Conduit(c) => Some(c),
            Tank::Reservoir(_) => None,
        }
    }

    pub fn as_conduit_mut(&mut self) -> Option<&mut FlowConduit> {
        match self {
            Tank::Conduit(c) => Some(c),
            Tank::Reservoir(_) => None,
        }
    }
}

impl From<GasVolume> for Tank {
    fn from(v: GasVolume) -> Self {
        Tank::Reservoir(v)
    }
}

impl From<FlowConduit> for Tank {
    fn from(c: FlowConduit) -> Self {
        Tank::Conduit(c)
    }
}

impl AirVolume for Tank {
    fn volume_m3(&self) -> f64 {
        match self {
            Tank::Reservoir(v) => v.volume_m3(),
            Tank::Conduit(c) => c.volume_m3(),
        }
    }

    fn pressure_pa(&self) -> f64 {
        match self {
            Tank::Reservoir(v) => v.pressure_pa(),
            Tank::Conduit(c) => c.pressure_pa(),
        }
    }

    fn set_pressure_pa(&mut self, p_pa: f64) {
        match self {
            Tank::Reservoir(v) => v.set_pressure_pa(p_pa),
            Tank::Conduit(c) => c.set_pressure_pa(p_pa),
        }
    }

    fn add_air(&mut self, mass_kg: f64) {
        match self {
            Tank::Reservoir(v) => v.add_air(mass_kg),
            Tank::Conduit(c) => c.add_air(mass_kg),
        }
    }
}

/// Two distinct mutable elements of a slice. `None` if `a == b` or either is out of range.
pub fn pair_mut<T>(items: &mut [T], a: usize, b: usize) -> Option<(&mut T, &mut T)> {
    if a == b || a >= items.len() || b >= items.len() {
        return None;
    }
    if a < b {
        let (lo, hi) = items.split_at_mut(b);
        Some((&mut lo[a], &mut hi[0]))
    } else {
        let (lo, hi) = items.split_at_mut(a);
        Some((&mut hi[0], &mut lo[b]))
    }
}
