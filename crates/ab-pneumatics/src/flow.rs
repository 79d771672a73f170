//! Compressible orifice flow for air.
//!
//! The model is isothermal on the density side (`ρ = p · ρ₀ / atm`) and uses the
//! isentropic nozzle equation for the flow itself:
//!
//! - subsonic (`p2/p1 > r_crit`):
//!   `mdot = A · p1 · K_sub · sqrt(r^(2/γ) - r^((γ+1)/γ))`
//! - choked (`p2/p1 <= r_crit`):
//!   `mdot = A · p1 · K_choked`
//!
//! with `r_crit = (2/(γ+1))^(γ/(γ-1))`. The two branches meet at `r_crit`.

use ab_core::units::constants::{AIR_DENSITY_STD, ATM_PA, GAMMA_AIR};
use std::sync::OnceLock;

/// Gas constants derived once from γ, standard density and standard atmosphere.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FlowConstants {
    /// Ratio of specific heats.
    pub gamma: f64,
    /// Pressure ratio below which the orifice is choked.
    pub critical_ratio: f64,
    /// Speed of sound at standard conditions (m/s).
    pub speed_of_sound: f64,
    /// Choked mass flow per unit area per unit upstream pressure (s/m).
    pub choked_multiplier: f64,
    /// Leading coefficient of the subsonic branch (s/m).
    pub subsonic_multiplier: f64,
    /// Density per unit absolute pressure (ρ₀ / atm).
    pub density_per_pa: f64,
}

impl FlowConstants {
    /// Derive the constants for an ideal gas.
    pub fn for_gas(gamma: f64, density_std: f64, atm_pa: f64) -> Self {
        let density_per_pa = density_std / atm_pa;
        let critical_ratio = (2.0 / (gamma + 1.0)).powf(gamma / (gamma - 1.0));
        let speed_of_sound = (gamma * atm_pa / density_std).sqrt();
        let choked_multiplier = (gamma * density_per_pa).sqrt()
            * (2.0 / (gamma + 1.0)).powf((gamma + 1.0) / (2.0 * (gamma - 1.0)));
        let subsonic_multiplier = (2.0 * gamma / (gamma - 1.0) * density_per_pa).sqrt();
        Self {
            gamma,
            critical_ratio,
            speed_of_sound,
            choked_multiplier,
            subsonic_multiplier,
            density_per_pa,
        }
    }

    /// Constants for air at standard conditions, computed on first use and cached for
    /// the process lifetime.
    pub fn standard_air() -> &'static FlowConstants {
        static AIR: OnceLock<FlowConstants> = OnceLock::new();
        AIR.get_or_init(|| FlowConstants::for_gas(GAMMA_AIR, AIR_DENSITY_STD, ATM_PA))
    }

    /// Mass flow rate (kg/s) through an orifice of `area_m2` from `p1` to `p2` (absolute Pa).
    ///
    /// Antisymmetric in its pressure arguments and zero when they are equal.
    pub fn mass_flow_rate(&self, p1: f64, p2: f64, area_m2: f64) -> f64 {
        if p1 == p2 {
            return 0.0;
        }
        if p2 > p1 {
            return -self.mass_flow_rate(p2, p1, area_m2);
        }
        if p1 <= 0.0 {
            return 0.0;
        }

        let ratio = p2.max(0.0) / p1;
        if ratio > self.critical_ratio {
            let g = self.gamma;
            let term = ratio.powf(2.0 / g) - ratio.powf((g + 1.0) / g);
            area_m2 * p1 * self.subsonic_multiplier * term.max(0.0).sqrt()
        } else {
            area_m2 * p1 * self.choked_multiplier
        }
    }
}

/// Mass flow rate for standard air. See [`FlowConstants::mass_flow_rate`].
#[inline]
pub fn mass_flow_rate(p1: f64, p2: f64, area_m2: f64) -> f64 {
    FlowConstants::standard_air().mass_flow_rate(p1, p2, area_m2)
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn equal_pressures_give_zero(p in 1.0e3_f64..2.0e6, area in 1e-8_f64..1e-3) {
            prop_assert_eq!(mass_flow_rate(p, p, area), 0.0);
        }

        #[test]
        fn antisymmetric(p1 in 1.0e3_f64..2.0e6, p2 in 1.0e3_f64..2.0e6, area in 1e-8_f64..1e-3) {
            prop_assert_eq!(mass_flow_rate(p1, p2, area), -mass_flow_rate(p2, p1, area));
        }

        #[test]
        fn flows_from_high_to_low(p1 in 1.0e3_f64..2.0e6, p2 in 1.0e3_f64..2.0e6, area in 1e-8_f64..1e-3) {
            let mdot = mass_flow_rate(p1, p2, area);
            if p1 > p2 {
                prop_assert!(mdot >= 0.0);
            } else if p1 < p2 {
                prop_assert!(mdot <= 0.0);
            }
        }
    }
}
