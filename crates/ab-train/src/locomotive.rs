//! Locomotive brake equipment: compressor, reservoirs and the engineer's handles.

use ab_core::units::constants::ATM_PA;
use ab_pneumatics::{AirVolume, ConduitState, GasVolume};
use ab_valves::slots::{APP_CHAMBER, CONTROL_PIPE, MAIN_RES};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{TrainError, TrainResult};
use crate::settings::SettingValue;
use crate::unit::{BrakeUnit, in_range};

/// Weight of the previous reading in the air-flow gauge's moving average.
const AIR_FLOW_SMOOTHING: f64 = 0.98;
/// Dead band around the independent brake target (psi).
const INDEPENDENT_BAND_PSI: f64 = 0.5;

/// Locomotive brake parameters. Pressures are gauge psi, volumes m³, areas m².
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocomotiveParams {
    /// Feed valve setting: the equalizing reservoir and brake pipe target.
    pub feed_psig: f64,
    /// Compressor cuts in below `feed_psig + pump_on_delta_psi`.
    pub pump_on_delta_psi: f64,
    /// Compressor cuts out above `feed_psig + pump_off_delta_psi`.
    pub pump_off_delta_psi: f64,
    /// Main reservoir rise while the compressor runs (psi/s).
    pub pump_charge_rate_psi: f64,
    pub main_res_m3: f64,
    pub equalizing_res_m3: f64,
    pub er_bleed_area_m2: f64,
    pub er_charge_area_m2: f64,
    pub bp_charge_area_m2: f64,
    pub service_vent_area_m2: f64,
    pub emergency_vent_area_m2: f64,
    pub independent_area_m2: f64,
    pub independent_max_psig: f64,
}

impl Default for LocomotiveParams {
    fn default() -> Self {
        Self {
            feed_psig: 90.0,
            pump_on_delta_psi: 30.0,
            pump_off_delta_psi: 50.0,
            pump_charge_rate_psi: 1.0,
            main_res_m3: 0.8,
            equalizing_res_m3: 0.0049,
            er_bleed_area_m2: 3.6e-7,
            er_charge_area_m2: 1e-6,
            bp_charge_area_m2: 2e-5,
            service_vent_area_m2: 2e-5,
            emergency_vent_area_m2: 5e-5,
            independent_area_m2: 2e-5,
            independent_max_psig: 45.0,
        }
    }
}

impl LocomotiveParams {
    pub fn pump_on_psig(&self) -> f64 {
        self.feed_psig + self.pump_on_delta_psi
    }

    pub fn pump_off_psig(&self) -> f64 {
        self.feed_psig + self.pump_off_delta_psi
    }
}

/// A [`BrakeUnit`] with the locomotive's own air supply and brake controls.
#[derive(Clone, Debug)]
pub struct LocomotiveBrakeUnit {
    base: BrakeUnit,
    params: LocomotiveParams,
    main_res: GasVolume,
    equalizing_res: GasVolume,
    pump_on: bool,
    air_flow: f64,
    auto_control: f64,
    ind_control: f64,
    main_res_slot: Option<usize>,
    control_pipe_slot: Option<usize>,
    app_chamber_slot: Option<usize>,
}

impl LocomotiveBrakeUnit {
    /// Main reservoir starts at the compressor cut-out pressure, the equalizing
    /// reservoir at atmosphere.
    pub fn new(base: BrakeUnit, params: LocomotiveParams) -> TrainResult<Self> {
        let main_res = GasVolume::from_m3(params.main_res_m3)?.with_psig(params.pump_off_psig());
        let equalizing_res = GasVolume::from_m3(params.equalizing_res_m3)?;
        let cfg = base.config();
        Ok(Self {
            main_res_slot: cfg.tank_index(MAIN_RES),
            control_pipe_slot: cfg.tank_index(CONTROL_PIPE),
            app_chamber_slot: cfg.tank_index(APP_CHAMBER),
            base,
            params,
            main_res,
            equalizing_res,
            pump_on: false,
            air_flow: 0.0,
            auto_control: 0.0,
            ind_control: 0.0,
        })
    }

    pub fn brake(&self) -> &BrakeUnit {
        &self.base
    }

    pub fn brake_mut(&mut self) -> &mut BrakeUnit {
        &mut self.base
    }

    pub fn params(&self) -> &LocomotiveParams {
        &self.params
    }

    // --- controls and gauges ---

    /// Automatic brake handle in [-1, 1]. Positive bleeds the equalizing reservoir
    /// (1 also dumps the pipe), negative recharges it, 0 holds.
    pub fn set_auto_control(&mut self, value: f64) {
        self.auto_control = value.clamp(-1.0, 1.0);
    }

    pub fn auto_control(&self) -> f64 {
        self.auto_control
    }

    /// Independent brake handle in [0, 1].
    pub fn set_ind_control(&mut self, value: f64) {
        self.ind_control = value.clamp(0.0, 1.0);
    }

    pub fn ind_control(&self) -> f64 {
        self.ind_control
    }

    pub fn main_res_psig(&self) -> f64 {
        self.main_res.psig()
    }

    pub fn set_main_res_psig(&mut self, psig: f64) {
        self.main_res.set_psig(psig);
    }

    pub fn equalizing_res_psig(&self) -> f64 {
        self.equalizing_res.psig()
    }

    pub fn set_equalizing_res_psig(&mut self, psig: f64) {
        self.equalizing_res.set_psig(psig);
    }

    pub fn pump_on(&self) -> bool {
        self.pump_on
    }

    /// Smoothed brake pipe feed rate (kg/s), for the flow gauge.
    pub fn air_flow(&self) -> f64 {
        self.air_flow
    }

    /// Charge the unit and its equalizing reservoir to `psig`.
    pub fn charge(&mut self, psig: f64) {
        self.base.charge(psig);
        self.equalizing_res.set_psig(psig);
        self.air_flow = 0.0;
    }

    /// Release the locomotive brake at once: auxiliary reservoir to pipe pressure,
    /// cylinder and application chamber to atmosphere.
    pub fn bail_off(&mut self) {
        let pipe = self.base.pipe_psig();
        self.base.set_aux_psig(pipe);
        self.base.vent_cylinder();
        if let Some(tank) = self.app_chamber_slot.and_then(|i| self.base.tank_mut(i)) {
            tank.set_pressure_pa(ATM_PA);
        }
    }

    // --- tick ---

    pub fn update_air_speeds(
        &mut self,
        dt: f64,
        prev: Option<&[ConduitState]>,
        next: Option<&[ConduitState]>,
    ) {
        self.base.update_air_speeds(dt, prev, next);
    }

    /// Valve first, with the main reservoir standing in for its tank slot, then the
    /// locomotive's own supply and controls.
    pub fn update_pressures(
        &mut self,
        dt: f64,
        prev: Option<&[ConduitState]>,
        next: Option<&[ConduitState]>,
    ) {
        if let Some(tank) = self.main_res_slot.and_then(|i| self.base.tank_mut(i)) {
            tank.set_pressure_pa(self.main_res.pressure_pa());
        }
        self.base.update_pressures(dt, prev, next);
        if let Some(tank) = self.main_res_slot.and_then(|i| self.base.tank_mut(i)) {
            self.main_res.set_pressure_pa(tank.pressure_pa());
        }

        if self.base.is_cut_out() {
            return;
        }

        self.update_compressor(dt);
        self.update_automatic(dt);
        self.update_independent(dt);
        self.update_control_pipe(dt);
    }

    fn update_compressor(&mut self, dt: f64) {
        let mr = self.main_res.psig();
        if !self.pump_on && mr < self.params.pump_on_psig() {
            self.pump_on = true;
            debug!(main_res_psig = mr, "compressor on");
        } else if self.pump_on && mr > self.params.pump_off_psig() {
            self.pump_on = false;
            debug!(main_res_psig = mr, "compressor off");
        }
        if self.pump_on {
            self.main_res
                .set_psig(mr + self.params.pump_charge_rate_psi * dt);
        }
    }

    fn update_automatic(&mut self, dt: f64) {
        let bp = self.base.config().brake_pipe();
        let Some(pipe) = self.base.tank_mut(bp) else {
            return;
        };
        let p = &self.params;
        let mut fed = 0.0;

        if self.auto_control > 0.0 {
            self.equalizing_res.vent(p.er_bleed_area_m2, dt);
            if self.auto_control >= 1.0 {
                fed -= pipe.vent(p.emergency_vent_area_m2, dt);
            }
        } else if self.auto_control < 0.0 {
            if self.equalizing_res.psig() < p.feed_psig {
                self.main_res
                    .move_air_through(&mut self.equalizing_res, p.er_charge_area_m2, dt);
                if self.equalizing_res.psig() > p.feed_psig {
                    self.equalizing_res.set_psig(p.feed_psig);
                }
            }
            let target = self.equalizing_res.pressure_pa();
            if pipe.pressure_pa() < target && self.main_res.pressure_pa() > pipe.pressure_pa() {
                fed += self
                    .main_res
                    .move_air_through(pipe, p.bp_charge_area_m2, dt);
            }
        }

        if pipe.pressure_pa() > self.equalizing_res.pressure_pa() {
            fed -= pipe.vent(p.service_vent_area_m2, dt);
        }

        // A zero step moves no air and leaves the gauge alone.
        if dt > 0.0 {
            self.air_flow =
                AIR_FLOW_SMOOTHING * self.air_flow + (1.0 - AIR_FLOW_SMOOTHING) * fed / dt;
        }
    }

    fn update_independent(&mut self, dt: f64) {
        if self.ind_control <= 0.0 {
            return;
        }
        let slot = self
            .app_chamber_slot
            .unwrap_or_else(|| self.base.config().brake_cyl());
        let target = self.ind_control * self.params.independent_max_psig;
        let area = self.params.independent_area_m2;
        let Some(tank) = self.base.tank_mut(slot) else {
            return;
        };
        if tank.psig() < target - INDEPENDENT_BAND_PSI
            && self.main_res.pressure_pa() > tank.pressure_pa()
        {
            self.main_res.move_air_through(tank, area, dt);
        }
    }

    fn update_control_pipe(&mut self, dt: f64) {
        let feed = self.params.feed_psig;
        let area = self.params.bp_charge_area_m2;
        let Some(tank) = self.control_pipe_slot.and_then(|i| self.base.tank_mut(i)) else {
            return;
        };
        if tank.psig() < feed && self.main_res.pressure_pa() > tank.pressure_pa() {
            self.main_res.move_air_through(tank, area, dt);
        }
    }

    // --- settings ---

    /// Locomotive keys: `maxpressure` (feed valve psig), `pumpchargerate` (psi/s),
    /// `mainresvolume` (m³), `pumpondelta`, `pumpoffdelta` (psi above feed). Anything
    /// else goes to the car-level settings.
    pub fn apply_setting(&mut self, key: &str, value: &SettingValue) -> TrainResult<()> {
        let result = self.try_apply_setting(key, value);
        // Car keys are logged by the base unit.
        if let (Err(err), false) = (&result, is_car_key(key)) {
            warn!(valve = self.base.valve_name(), key, %err, "setting rejected");
        }
        result
    }

    fn try_apply_setting(&mut self, key: &str, value: &SettingValue) -> TrainResult<()> {
        if is_car_key(key) {
            return self.base.apply_setting(key, value);
        }
        let Some(v) = value.as_scalar() else {
            return match key {
                "maxpressure" | "pumpchargerate" | "mainresvolume" | "pumpondelta"
                | "pumpoffdelta" => Err(TrainError::InvalidArg {
                    what: "setting value has the wrong type",
                }),
                _ => Err(TrainError::UnknownSetting { key: key.into() }),
            };
        };
        match key {
            "maxpressure" => self.params.feed_psig = in_range(key, v, 20.0, 150.0)?,
            "pumpchargerate" => self.params.pump_charge_rate_psi = in_range(key, v, 0.01, 20.0)?,
            "mainresvolume" => {
                let volume = in_range(key, v, 0.05, 5.0)?;
                let psig = self.main_res.psig();
                self.main_res = GasVolume::from_m3(volume)?.with_psig(psig);
                self.params.main_res_m3 = volume;
            }
            "pumpondelta" => {
                let delta = in_range(key, v, 0.0, 100.0)?;
                if delta >= self.params.pump_off_delta_psi {
                    return Err(TrainError::OutOfRange {
                        key: key.into(),
                        value: v,
                    });
                }
                self.params.pump_on_delta_psi = delta;
            }
            "pumpoffdelta" => {
                let delta = in_range(key, v, 0.0, 150.0)?;
                if delta <= self.params.pump_on_delta_psi {
                    return Err(TrainError::OutOfRange {
                        key: key.into(),
                        value: v,
                    });
                }
                self.params.pump_off_delta_psi = delta;
            }
            _ => return Err(TrainError::UnknownSetting { key: key.into() }),
        }
        Ok(())
    }
}

fn is_car_key(key: &str) -> bool {
    matches!(
        key,
        "cylinderdiameter" | "numcylinders" | "retainer" | "cutout" | "brakeforce"
    )
}
