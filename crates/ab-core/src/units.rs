// ab-core/src/units.rs

use uom::si::f64::{
    Area as UomArea, Length as UomLength, Pressure as UomPressure, Volume as UomVolume,
};

// Public canonical unit types (SI, f64)
pub type Area = UomArea;
pub type Length = UomLength;
pub type Pressure = UomPressure;
pub type Volume = UomVolume;

#[inline]
pub fn pa(v: f64) -> Pressure {
    use uom::si::pressure::pascal;
    Pressure::new::<pascal>(v)
}

/// Pressure difference in psi. Use for thresholds and margins, never for absolute levels.
#[inline]
pub fn psi(v: f64) -> Pressure {
    use uom::si::pressure::pound_force_per_square_inch;
    Pressure::new::<pound_force_per_square_inch>(v)
}

/// Absolute pressure from a gauge reading in psi.
#[inline]
pub fn psig(v: f64) -> Pressure {
    pa(constants::ATM_PA) + psi(v)
}

#[inline]
pub fn m(v: f64) -> Length {
    use uom::si::length::meter;
    Length::new::<meter>(v)
}

#[inline]
pub fn inch(v: f64) -> Length {
    use uom::si::length::inch;
    Length::new::<inch>(v)
}

#[inline]
pub fn m2(v: f64) -> Area {
    use uom::si::area::square_meter;
    Area::new::<square_meter>(v)
}

#[inline]
pub fn m3(v: f64) -> Volume {
    use uom::si::volume::cubic_meter;
    Volume::new::<cubic_meter>(v)
}

#[inline]
pub fn cu_in(v: f64) -> Volume {
    use uom::si::volume::cubic_inch;
    Volume::new::<cubic_inch>(v)
}

/// Gauge psi -> absolute Pa.
#[inline]
pub fn psig_to_pa(psig: f64) -> f64 {
    constants::ATM_PA + psig * constants::PSI_PA
}

/// Absolute Pa -> gauge psi.
#[inline]
pub fn pa_to_psig(p_pa: f64) -> f64 {
    (p_pa - constants::ATM_PA) / constants::PSI_PA
}

/// Area (m²) of a circle of the given diameter (m).
#[inline]
pub fn circle_area_m2(diameter_m: f64) -> f64 {
    std::f64::consts::PI * 0.25 * diameter_m * diameter_m
}

pub mod constants {
    /// Standard atmosphere (Pa).
    pub const ATM_PA: f64 = 101_325.0;
    /// Pascals per psi.
    pub const PSI_PA: f64 = 6_894.757_293_168;
    /// Density of air at standard atmosphere (kg/m³).
    pub const AIR_DENSITY_STD: f64 = 1.225;
    /// Ratio of specific heats for air.
    pub const GAMMA_AIR: f64 = 1.4;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_smoke() {
        let _p = pa(101_325.0);
        let _l = m(2.0);
        let _v = cu_in(2500.0);
        let _a = m2(1e-6);
        let _q = m3(0.04);
    }

    #[test]
    fn psi_constant_matches_uom() {
        assert!((psi(1.0).value - constants::PSI_PA).abs() < 1e-6);
    }

    #[test]
    fn gauge_round_trip() {
        for v in [0.0, 20.0, 70.0, 140.0, -5.0] {
            assert!((pa_to_psig(psig_to_pa(v)) - v).abs() < 1e-9);
            assert!((psig(v).value - psig_to_pa(v)).abs() < 1e-6);
        }
    }

    #[test]
    fn cubic_inch_conversion() {
        // 2500 in³ is the classic freight auxiliary reservoir.
        assert!((cu_in(2500.0).value - 0.040_967).abs() < 1e-5);
    }

    #[test]
    fn circle_area_one_inch() {
        let a = circle_area_m2(inch(1.0).value);
        assert!((a - 5.067e-4).abs() < 1e-6);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn gauge_conversion_inverts(value in -14.0_f64..500.0) {
            prop_assert!((pa_to_psig(psig_to_pa(value)) - value).abs() < 1e-9);
        }

        #[test]
        fn gauge_is_monotonic(a in -14.0_f64..500.0, b in -14.0_f64..500.0) {
            prop_assume!(a < b);
            prop_assert!(psig_to_pa(a) < psig_to_pa(b));
        }
    }
}
