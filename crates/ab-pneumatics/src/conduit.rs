//! Pipe segment with a 1-D momentum model for the air inside it.
//!
//! A conduit is a [`GasVolume`] with a length, a bore and a signed air speed. Positive
//! speed carries air out through the `next` end and in through the `prev` end. Each
//! end has a [`ConduitLink`]: it is either joined to the matching conduit of a
//! neighbouring car, or it is a free end which is closed (dead end) or open
//! (to atmosphere).
//!
//! The conduit never holds references to its neighbours. Callers pass a
//! [`ConduitState`] snapshot of each linked neighbour to the two update phases:
//!
//! 1. [`FlowConduit::update_air_speed`] integrates the momentum equation and records
//!    `last_flow`, the mass that crosses the conduit during this step;
//! 2. [`FlowConduit::exchange_flows`] applies the averaged boundary flows at both ends,
//!    so whatever leaves one conduit arrives in its neighbour.

use crate::error::PneumaticResult;
use crate::flow::FlowConstants;
use crate::volume::{AirVolume, GasVolume};
use ab_core::numeric::ensure_positive;
use ab_core::units::constants::ATM_PA;
use ab_core::units::{Length, circle_area_m2, inch};

/// Nominal bore of a freight car brake pipe (inches).
pub const BRAKE_PIPE_BORE_IN: f64 = 1.25;

/// Darcy friction factor used for brake pipe unless a valve says otherwise.
pub const DEFAULT_FRICTION_FACTOR: f64 = 0.025;

/// Topology flags for one end of a conduit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ConduitLink {
    /// Joined to the corresponding conduit of the adjacent unit.
    pub linked: bool,
    /// Air may pass this end (angle cock open).
    pub open: bool,
}

impl ConduitLink {
    pub const CLOSED: ConduitLink = ConduitLink {
        linked: false,
        open: false,
    };

    pub fn joined() -> Self {
        Self {
            linked: true,
            open: true,
        }
    }
}

/// Read-only copy of the conduit quantities a neighbour needs.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConduitState {
    pub pressure_pa: f64,
    pub air_speed: f64,
    pub length_m: f64,
    pub density: f64,
    pub last_flow: f64,
}

/// What lies beyond one end of the conduit during a speed update.
enum Boundary<'a> {
    Closed,
    Atmosphere,
    Linked(&'a ConduitState),
}

impl<'a> Boundary<'a> {
    fn resolve(link: ConduitLink, peer: Option<&'a ConduitState>) -> Self {
        match (link.open, link.linked, peer) {
            (false, _, _) => Boundary::Closed,
            (true, false, _) => Boundary::Atmosphere,
            (true, true, Some(state)) => Boundary::Linked(state),
            // Linked on paper but no neighbour state was supplied: treat as blocked.
            (true, true, None) => Boundary::Closed,
        }
    }
}

/// Pipe segment: reservoir storage plus momentum.
#[derive(Clone, Debug, PartialEq)]
pub struct FlowConduit {
    gas: GasVolume,
    length_m: f64,
    diameter_m: f64,
    friction_factor: f64,
    air_speed: f64,
    last_flow: f64,
    prev: ConduitLink,
    next: ConduitLink,
}

impl FlowConduit {
    /// Create a conduit at atmospheric pressure with both ends closed.
    pub fn new(length: Length, diameter: Length, friction_factor: f64) -> PneumaticResult<Self> {
        Self::from_si(length.value, diameter.value, friction_factor)
    }

    /// Standard-bore brake pipe of the given length.
    pub fn brake_pipe(length: Length) -> PneumaticResult<Self> {
        Self::new(length, inch(BRAKE_PIPE_BORE_IN), DEFAULT_FRICTION_FACTOR)
    }

    pub fn from_si(length_m: f64, diameter_m: f64, friction_factor: f64) -> PneumaticResult<Self> {
        let length_m = ensure_positive(length_m, "conduit length must be positive")?;
        let diameter_m = ensure_positive(diameter_m, "conduit diameter must be positive")?;
        let friction_factor =
            ensure_positive(friction_factor, "conduit friction factor must be positive")?;
        Ok(Self {
            gas: GasVolume::from_m3(circle_area_m2(diameter_m) * length_m)?,
            length_m,
            diameter_m,
            friction_factor,
            air_speed: 0.0,
            last_flow: 0.0,
            prev: ConduitLink::CLOSED,
            next: ConduitLink::CLOSED,
        })
    }

    pub fn length_m(&self) -> f64 {
        self.length_m
    }

    pub fn diameter_m(&self) -> f64 {
        self.diameter_m
    }

    pub fn friction_factor(&self) -> f64 {
        self.friction_factor
    }

    pub fn cross_section_m2(&self) -> f64 {
        circle_area_m2(self.diameter_m)
    }

    /// Signed air speed (m/s); positive flows toward the `next` end.
    pub fn air_speed(&self) -> f64 {
        self.air_speed
    }

    pub fn set_air_speed(&mut self, speed: f64) {
        self.air_speed = speed;
    }

    /// Mass (kg) carried across the conduit during the last speed update.
    pub fn last_flow(&self) -> f64 {
        self.last_flow
    }

    pub fn prev_link(&self) -> ConduitLink {
        self.prev
    }

    pub fn next_link(&self) -> ConduitLink {
        self.next
    }

    pub fn set_prev_link(&mut self, link: ConduitLink) {
        self.prev = link;
    }

    pub fn set_next_link(&mut self, link: ConduitLink) {
        self.next = link;
    }

    pub fn set_prev_open(&mut self, open: bool) {
        self.prev.open = open;
    }

    pub fn set_next_open(&mut self, open: bool) {
        self.next.open = open;
    }

    /// Snapshot for neighbours.
    pub fn state(&self) -> ConduitState {
        ConduitState {
            pressure_pa: self.pressure_pa(),
            air_speed: self.air_speed,
            length_m: self.length_m,
            density: self.density(),
            last_flow: self.last_flow,
        }
    }

    /// Largest explicit step for which a pressure wave does not skip this segment.
    pub fn stable_dt(&self) -> f64 {
        self.length_m / FlowConstants::standard_air().speed_of_sound
    }

    /// Advance the air speed by one explicit Euler step and recompute `last_flow`.
    ///
    /// `prev_peer` / `next_peer` are the states of the linked neighbours at the start of
    /// the step; they are ignored for ends that are closed or free.
    pub fn update_air_speed(
        &mut self,
        dt: f64,
        prev_peer: Option<&ConduitState>,
        next_peer: Option<&ConduitState>,
    ) {
        let rho = self.density();
        if rho <= 0.0 {
            self.air_speed = 0.0;
            self.last_flow = 0.0;
            return;
        }

        let p = self.pressure_pa();
        let u = self.air_speed;
        let len = self.length_m;

        // Pressure drop along +x (Pa/m), convective and dead-end terms (m/s²).
        let mut dpdx = 0.0;
        let mut convective = 0.0;
        let mut dead_end = 0.0;
        let mut open_ends = 0u32;

        match Boundary::resolve(self.prev, prev_peer) {
            Boundary::Linked(n) => {
                let dx = 0.5 * (len + n.length_m);
                dpdx += (n.pressure_pa - p) / dx;
                convective -= u * (u - n.air_speed) / dx;
                open_ends += 1;
            }
            Boundary::Atmosphere => {
                dpdx += (ATM_PA - p) / (0.5 * len);
                open_ends += 1;
            }
            Boundary::Closed => {
                if u < 0.0 {
                    dead_end += u * u / len;
                }
            }
        }

        match Boundary::resolve(self.next, next_peer) {
            Boundary::Linked(n) => {
                let dx = 0.5 * (len + n.length_m);
                dpdx += (p - n.pressure_pa) / dx;
                convective -= u * (n.air_speed - u) / dx;
                open_ends += 1;
            }
            Boundary::Atmosphere => {
                dpdx += (p - ATM_PA) / (0.5 * len);
                open_ends += 1;
            }
            Boundary::Closed => {
                if u > 0.0 {
                    dead_end -= u * u / len;
                }
            }
        }

        if open_ends > 1 {
            let n = f64::from(open_ends);
            dpdx /= n;
            convective /= n;
        }

        let friction = self.friction_factor * u * u.abs() / (2.0 * self.diameter_m);
        let accel = dpdx / rho + convective + dead_end - friction;

        let mut speed = u + dt * accel;
        if speed < 0.0 {
            // Negative speed is held to the friction-limited value for the current
            // gradient; positive speed is left free.
            let limit =
                -(dpdx.abs() / rho * 2.0 * self.diameter_m / self.friction_factor).sqrt();
            if speed < limit {
                speed = limit;
            }
        }

        self.air_speed = speed;
        self.last_flow = dt * speed * rho * self.cross_section_m2();
    }

    /// Apply this step's boundary flows.
    ///
    /// An open `prev` end receives the flow, an open `next` end gives it up. Across a
    /// link the flow is the mean of the two conduits' `last_flow`, which is the same
    /// number on both sides of the joint; at a free open end the conduit's own flow is
    /// used.
    pub fn exchange_flows(
        &mut self,
        prev_peer: Option<&ConduitState>,
        next_peer: Option<&ConduitState>,
    ) {
        let own = self.last_flow;
        if let Some(flow) = boundary_flow(self.prev, own, prev_peer) {
            self.add_air(flow);
        }
        if let Some(flow) = boundary_flow(self.next, own, next_peer) {
            self.add_air(-flow);
        }
    }
}

fn boundary_flow(link: ConduitLink, own: f64, peer: Option<&ConduitState>) -> Option<f64> {
    match Boundary::resolve(link, peer) {
        Boundary::Closed => None,
        Boundary::Atmosphere => Some(own),
        Boundary::Linked(n) => Some(0.5 * (own + n.last_flow)),
    }
}

impl AirVolume for FlowConduit {
    fn volume_m3(&self) -> f64 {
        self.gas.volume_m3()
    }

    fn pressure_pa(&self) -> f64 {
        self.gas.pressure_pa()
    }

    fn set_pressure_pa(&mut self, p_pa: f64) {
        self.gas.set_pressure_pa(p_pa);
    }

    /// Also rescales the air speed by the density ratio, so momentum is roughly
    /// conserved when air is pushed into the segment.
    fn add_air(&mut self, mass_kg: f64) {
        let before = self.gas.density();
        self.gas.add_air(mass_kg);
        let after = self.gas.density();
        if after > 0.0 {
            self.air_speed *= before / after;
        }
    }
}
