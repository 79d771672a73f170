//! Fixed-volume air reservoirs.

use crate::error::PneumaticResult;
use crate::flow::FlowConstants;
use ab_core::numeric::ensure_positive;
use ab_core::units::constants::ATM_PA;
use ab_core::units::{Volume, pa_to_psig, psig_to_pa};

/// Pressure/mass bookkeeping shared by every air volume in the brake system.
///
/// Implementors provide storage for volume and pressure; everything else is derived.
/// `add_air` is the single mutation point for mass so that volumes which carry extra
/// state (see [`crate::FlowConduit`]) can react to it.
pub trait AirVolume {
    /// Fixed volume (m³).
    fn volume_m3(&self) -> f64;

    /// Absolute pressure (Pa).
    fn pressure_pa(&self) -> f64;

    /// Overwrite the absolute pressure (Pa) without touching any other state.
    fn set_pressure_pa(&mut self, p_pa: f64);

    /// Add (or with a negative argument, remove) `mass_kg` of air.
    fn add_air(&mut self, mass_kg: f64) {
        let k = FlowConstants::standard_air();
        let dp = mass_kg / self.volume_m3() / k.density_per_pa;
        self.set_pressure_pa(self.pressure_pa() + dp);
    }

    /// Air density (kg/m³).
    fn density(&self) -> f64 {
        self.pressure_pa() * FlowConstants::standard_air().density_per_pa
    }

    /// Total air mass held (kg).
    fn mass_kg(&self) -> f64 {
        self.density() * self.volume_m3()
    }

    /// Gauge pressure in psi.
    fn psig(&self) -> f64 {
        pa_to_psig(self.pressure_pa())
    }

    fn set_psig(&mut self, value: f64) {
        self.set_pressure_pa(psig_to_pa(value));
    }

    /// Move `mass_kg` of air from `self` into `other`.
    ///
    /// If the transfer carries either volume past the pressure the pair would reach at
    /// equilibrium, both are set to exactly that pressure instead.
    fn move_air<O: AirVolume + ?Sized>(&mut self, other: &mut O, mass_kg: f64) {
        let (p1, v1) = (self.pressure_pa(), self.volume_m3());
        let (p2, v2) = (other.pressure_pa(), other.volume_m3());
        let p_eq = (p1 * v1 + p2 * v2) / (v1 + v2);

        self.add_air(-mass_kg);
        other.add_air(mass_kg);

        if crossed(p1, self.pressure_pa(), p_eq) || crossed(p2, other.pressure_pa(), p_eq) {
            self.set_pressure_pa(p_eq);
            other.set_pressure_pa(p_eq);
        }
    }

    /// Flow through an orifice of `area_m2` for `dt` seconds. Returns the mass moved
    /// (negative when air flowed from `other` into `self`).
    fn move_air_through<O: AirVolume + ?Sized>(
        &mut self,
        other: &mut O,
        area_m2: f64,
        dt: f64,
    ) -> f64 {
        let k = FlowConstants::standard_air();
        let mass = dt * k.mass_flow_rate(self.pressure_pa(), other.pressure_pa(), area_m2);
        self.move_air(other, mass);
        mass
    }

    /// Vent to atmosphere through an orifice of `area_m2` for `dt` seconds.
    ///
    /// Never leaves the volume below atmospheric pressure. Returns the mass vented.
    fn vent(&mut self, area_m2: f64, dt: f64) -> f64 {
        let k = FlowConstants::standard_air();
        let mass = dt * k.mass_flow_rate(self.pressure_pa(), ATM_PA, area_m2);
        self.add_air(-mass);
        if self.pressure_pa() < ATM_PA {
            self.set_pressure_pa(ATM_PA);
        }
        mass
    }
}

/// Did a pressure that started on one side of `p_eq` end up strictly on the other?
fn crossed(before: f64, after: f64, p_eq: f64) -> bool {
    if before > p_eq {
        after < p_eq
    } else if before < p_eq {
        after > p_eq
    } else {
        false
    }
}

/// Plain reservoir: a fixed volume and a pressure.
#[derive(Clone, Debug, PartialEq)]
pub struct GasVolume {
    volume_m3: f64,
    pressure_pa: f64,
}

impl GasVolume {
    /// Create a reservoir at atmospheric pressure.
    pub fn new(volume: Volume) -> PneumaticResult<Self> {
        Self::from_m3(volume.value)
    }

    /// Create a reservoir from a volume in m³.
    pub fn from_m3(volume_m3: f64) -> PneumaticResult<Self> {
        let volume_m3 = ensure_positive(volume_m3, "reservoir volume must be positive")?;
        Ok(Self {
            volume_m3,
            pressure_pa: ATM_PA,
        })
    }

    /// Builder-style gauge pressure initialiser.
    pub fn with_psig(mut self, value: f64) -> Self {
        self.set_psig(value);
        self
    }
}

impl AirVolume for GasVolume {
    fn volume_m3(&self) -> f64 {
        self.volume_m3
    }

    fn pressure_pa(&self) -> f64 {
        self.pressure_pa
    }

    fn set_pressure_pa(&mut self, p_pa: f64) {
        self.pressure_pa = p_pa;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PneumaticError;
    use ab_core::units::{cu_in, m3};

    fn reservoir(volume: f64, psig: f64) -> GasVolume {
        GasVolume::from_m3(volume).unwrap().with_psig(psig)
    }

    #[test]
    fn new_starts_at_atmosphere() {
        let v = GasVolume::new(cu_in(2500.0)).unwrap();
        assert_eq!(v.pressure_pa(), ATM_PA);
        assert!(v.psig().abs() < 1e-12);
    }

    #[test]
    fn rejects_non_positive_volume() {
        assert!(matches!(
            GasVolume::new(m3(0.0)),
            Err(PneumaticError::NonPhysical { .. })
        ));
        assert!(GasVolume::from_m3(-1.0).is_err());
    }

    #[test]
    fn add_air_raises_pressure() {
        let mut v = reservoir(0.05, 0.0);
        let before = v.mass_kg();
        v.add_air(0.01);
        assert!(v.psig() > 0.0);
        assert!((v.mass_kg() - before - 0.01).abs() < 1e-12);
    }

    #[test]
    fn psig_round_trip() {
        let mut v = reservoir(0.01, 0.0);
        v.set_psig(72.5);
        assert!((v.psig() - 72.5).abs() < 1e-9);
    }

    #[test]
    fn move_air_conserves_mass() {
        let mut a = reservoir(0.04, 70.0);
        let mut b = reservoir(0.016, 0.0);
        let total = a.mass_kg() + b.mass_kg();
        a.move_air(&mut b, 0.005);
        assert!((a.mass_kg() + b.mass_kg() - total).abs() < 1e-12);
        assert!(a.psig() < 70.0);
        assert!(b.psig() > 0.0);
    }

    #[test]
    fn move_air_snaps_to_equilibrium_on_overshoot() {
        let mut a = reservoir(0.04, 70.0);
        let mut b = reservoir(0.04, 50.0);
        let p_eq = 0.5 * (a.pressure_pa() + b.pressure_pa());
        // Far more than needed to equalise.
        a.move_air(&mut b, 1.0);
        assert_eq!(a.pressure_pa(), p_eq);
        assert_eq!(b.pressure_pa(), p_eq);
    }

    #[test]
    fn move_air_through_returns_signed_mass() {
        let mut a = reservoir(0.04, 50.0);
        let mut b = reservoir(0.04, 70.0);
        let moved = a.move_air_through(&mut b, 1e-5, 0.01);
        assert!(moved < 0.0);
        assert!(a.psig() > 50.0);
        assert!(b.psig() < 70.0);
    }

    #[test]
    fn move_air_through_equal_pressure_is_noop() {
        let mut a = reservoir(0.04, 60.0);
        let mut b = reservoir(0.01, 60.0);
        assert_eq!(a.move_air_through(&mut b, 1e-5, 0.01), 0.0);
        assert!((a.psig() - 60.0).abs() < 1e-9);
    }

    #[test]
    fn vent_reduces_pressure() {
        let mut v = reservoir(0.016, 50.0);
        let vented = v.vent(8e-6, 0.1);
        assert!(vented > 0.0);
        assert!(v.psig() < 50.0);
    }

    #[test]
    fn vent_floors_at_atmosphere() {
        let mut v = reservoir(1e-4, 5.0);
        v.vent(1e-2, 10.0);
        assert_eq!(v.pressure_pa(), ATM_PA);
    }

    #[test]
    fn vent_lifts_subatmospheric_volume_to_floor() {
        let mut v = GasVolume::from_m3(0.01).unwrap();
        v.set_pressure_pa(0.5 * ATM_PA);
        v.vent(1e-8, 0.01);
        assert_eq!(v.pressure_pa(), ATM_PA);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use crate::flow::mass_flow_rate;
    use ab_core::numeric::{Tolerances, is_between};
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn move_air_never_overshoots(
            v1 in 1e-3_f64..1.0,
            v2 in 1e-3_f64..1.0,
            psig1 in 0.0_f64..150.0,
            psig2 in 0.0_f64..150.0,
            fraction in 0.0_f64..10.0,
        ) {
            let mut a = GasVolume::from_m3(v1).unwrap().with_psig(psig1);
            let mut b = GasVolume::from_m3(v2).unwrap().with_psig(psig2);
            let (p1, p2) = (a.pressure_pa(), b.pressure_pa());
            let p_eq = (p1 * v1 + p2 * v2) / (v1 + v2);

            // Mass in the direction the pressures push it, anywhere from a trickle to
            // ten times what equalisation needs.
            let needed = (p1 - p_eq) * v1 * FlowConstants::standard_air().density_per_pa;
            a.move_air(&mut b, fraction * needed);

            let tol = Tolerances { abs: 1e-6, rel: 1e-9 };
            prop_assert!(is_between(a.pressure_pa(), p1, p_eq, tol));
            prop_assert!(is_between(b.pressure_pa(), p2, p_eq, tol));
        }

        #[test]
        fn orifice_transfer_never_overshoots(
            v1 in 1e-3_f64..1.0,
            v2 in 1e-3_f64..1.0,
            psig1 in 0.0_f64..150.0,
            psig2 in 0.0_f64..150.0,
            area in 1e-7_f64..1e-3,
            dt in 1e-3_f64..1.0,
        ) {
            let mut a = GasVolume::from_m3(v1).unwrap().with_psig(psig1);
            let mut b = GasVolume::from_m3(v2).unwrap().with_psig(psig2);
            let (p1, p2) = (a.pressure_pa(), b.pressure_pa());
            let p_eq = (p1 * v1 + p2 * v2) / (v1 + v2);
            prop_assume!(mass_flow_rate(p1, p2, area).is_finite());

            a.move_air_through(&mut b, area, dt);

            let tol = Tolerances { abs: 1e-6, rel: 1e-9 };
            prop_assert!(is_between(a.pressure_pa(), p1, p_eq, tol));
            prop_assert!(is_between(b.pressure_pa(), p2, p_eq, tol));
        }

        #[test]
        fn vent_never_below_atmosphere(
            volume in 1e-4_f64..1.0,
            start_psig in -10.0_f64..150.0,
            area in 1e-8_f64..1e-2,
            dt in 1e-3_f64..10.0,
        ) {
            let mut v = GasVolume::from_m3(volume).unwrap().with_psig(start_psig);
            v.vent(area, dt);
            prop_assert!(v.pressure_pa() >= ATM_PA);
        }

        #[test]
        fn set_psig_round_trip(value in -14.0_f64..300.0) {
            let mut v = GasVolume::from_m3(0.01).unwrap();
            v.set_psig(value);
            prop_assert!((v.psig() - value).abs() < 1e-9);
        }
    }
}
